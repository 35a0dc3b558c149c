use std::path::PathBuf;

#[derive(clap::Parser)]
pub(crate) struct Cli {
    #[arg(
        long = "stderr-log-level",
        value_name = "LEVEL",
        value_enum,
        help = "Maximum stderr log level (warn by default)"
    )]
    pub(crate) stderr_log_level: Option<LogLevel>,
    #[arg(
        long = "log-file",
        value_name = "PATH",
        help = "File to write logs (besides stderr)"
    )]
    pub(crate) log_file: Option<PathBuf>,
    #[arg(
        long = "file-log-level",
        value_name = "LEVEL",
        value_enum,
        help = "Maximum file log level (debug by default)"
    )]
    pub(crate) file_log_level: Option<LogLevel>,
    #[arg(long = "no-progress", help = "Do not print progress")]
    pub(crate) no_progress: bool,
    #[arg(
        long = "src",
        short = 's',
        value_name = "PATH",
        help = "Source CVS history file"
    )]
    pub(crate) src: PathBuf,
    #[arg(
        long = "dest",
        short = 'd',
        value_name = "PATH",
        help = "File where the git fast-import stream will be written"
    )]
    pub(crate) dest: Option<PathBuf>,
    #[arg(
        long = "report",
        short = 'r',
        value_name = "PATH",
        help = "File where the lifted history report will be written"
    )]
    pub(crate) report: Option<PathBuf>,
    #[arg(
        long = "conv-params",
        short = 'P',
        value_name = "FILE",
        help = "Conversion parameters"
    )]
    pub(crate) conv_params: PathBuf,
    #[arg(
        long = "jobs",
        short = 'j',
        value_name = "N",
        help = "Number of threads used to read files (all cores by default)"
    )]
    pub(crate) jobs: Option<usize>,
    #[arg(
        long = "show",
        value_name = "NAME[@CHANGESET]",
        help = "Print the tree of a branch or tag, optionally after a changeset"
    )]
    pub(crate) show: Vec<String>,
}

#[derive(Copy, Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogLevel {
    #[value(name = "error")]
    Error,
    #[value(name = "warn")]
    Warn,
    #[value(name = "info")]
    Info,
    #[value(name = "debug")]
    Debug,
    #[value(name = "trace")]
    Trace,
}

impl LogLevel {
    pub(crate) fn to_log_level_filter(self) -> tracing::Level {
        match self {
            Self::Error => tracing::Level::ERROR,
            Self::Warn => tracing::Level::WARN,
            Self::Info => tracing::Level::INFO,
            Self::Debug => tracing::Level::DEBUG,
            Self::Trace => tracing::Level::TRACE,
        }
    }
}
