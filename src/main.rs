#![warn(
    rust_2018_idioms,
    trivial_casts,
    trivial_numeric_casts,
    unreachable_pub,
    unused_qualifications
)]
#![allow(clippy::enum_variant_names, clippy::type_complexity)]

use std::process::ExitCode;

mod cli;
mod convert;
mod cvs;
mod git;
mod make_meta;
mod params_file;
mod report;
mod term_out;
mod user_map;

use term_out::ProgressPrint;

type FHashMap<K, V> = std::collections::HashMap<K, V, foldhash::fast::RandomState>;
type FHashSet<T> = std::collections::HashSet<T, foldhash::fast::RandomState>;

enum RunError {
    Generic,
    Usage,
}

fn main() -> ExitCode {
    match main_inner() {
        Ok(()) => ExitCode::SUCCESS,
        Err(RunError::Generic) => ExitCode::from(1),
        Err(RunError::Usage) => ExitCode::from(2),
    }
}

fn main_inner() -> Result<(), RunError> {
    let start = std::time::Instant::now();

    let args = match <cli::Cli as clap::Parser>::try_parse() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{e}");
            return Err(RunError::Usage);
        }
    };

    let term_out = term_out::init(start, !args.no_progress);
    let progress_print = term_out.get_progress_print();

    let stderr_log_level = args
        .stderr_log_level
        .unwrap_or(cli::LogLevel::Warn)
        .to_log_level_filter();
    let file_log_level = args.file_log_level.map(cli::LogLevel::to_log_level_filter);

    if let Err(e) = init_logger(
        Some(stderr_log_level),
        args.log_file.as_deref(),
        file_log_level,
        progress_print.clone(),
    ) {
        eprintln!("failed to initialize logging: {e}");
        return Err(RunError::Generic);
    }

    let params_raw = match std::fs::read_to_string(&args.conv_params) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("failed to read {:?}: {e}", args.conv_params);
            return Err(RunError::Generic);
        }
    };
    let params: params_file::ConvParams = match toml::from_str(&params_raw) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("failed to parse {:?}: {e}", args.conv_params);
            return Err(RunError::Generic);
        }
    };

    if args.dest.is_none() && args.report.is_none() && args.show.is_empty() {
        tracing::warn!("neither --dest nor --report given, only checking the history");
    }

    let jobs = args.jobs.unwrap_or_else(|| {
        std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
    });

    let mut options = convert::Options::new(convert::InitOptions {
        trunk_name: params.trunk_name,
        commit_time_window: params.commit_time_window,
        changeset_time: match params.changeset_time {
            params_file::ChangesetTime::Earliest => convert::ChangesetTime::Earliest,
            params_file::ChangesetTime::Latest => convert::ChangesetTime::Latest,
        },
        straddle_order: match params.straddle_order {
            params_file::StraddleOrder::TrunkFirst => convert::StraddleOrder::TrunkFirst,
            params_file::StraddleOrder::Arrival => convert::StraddleOrder::Arrival,
        },
        jobs,
    });

    for (from, to) in params.rename_branches.iter() {
        options.add_branch_rename(from, to).map_err(|_| {
            tracing::error!("invalid branch rename: {from:?} -> {to:?}");
            RunError::Generic
        })?;
    }
    for (from, to) in params.rename_tags.iter() {
        options.add_tag_rename(from, to).map_err(|_| {
            tracing::error!("invalid tag rename: {from:?} -> {to:?}");
            RunError::Generic
        })?;
    }

    options.validate().map_err(|_| RunError::Generic)?;

    let user_map = match params.user_map_file {
        None => user_map::UserMap::new(),
        Some(user_map_path) => {
            let user_map_path = if user_map_path.is_relative() {
                let conv_params_path_parent = args.conv_params.parent().ok_or_else(|| {
                    tracing::error!("invalid parameters file path: {:?}", args.conv_params);
                    RunError::Generic
                })?;
                conv_params_path_parent.join(user_map_path)
            } else {
                user_map_path.to_path_buf()
            };

            let user_map_file = std::fs::OpenOptions::new()
                .read(true)
                .open(&user_map_path)
                .map_err(|e| {
                    tracing::error!("failed to open user map {user_map_path:?}: {e}");
                    RunError::Generic
                })?;

            user_map::UserMap::parse(&mut std::io::BufReader::new(user_map_file)).map_err(|e| {
                tracing::error!("failed to read user map {user_map_path:?}: {e}");
                RunError::Generic
            })?
        }
    };

    let user_fallback_template = params
        .user_fallback_template
        .as_deref()
        .unwrap_or(r#"{{ cvs_author or "no-author" }} <{{ cvs_author or "no-author" }}>"#);
    let commit_msg_template = params
        .commit_msg_template
        .as_deref()
        .unwrap_or(indoc::indoc! {r#"
            {{ cvs_log }}{% if cvs_commitid %}

            [[CVS commitid: {{ cvs_commitid }}]]{% endif %}
        "#});

    let meta_maker =
        make_meta::GitMetaMaker::new(&user_map, user_fallback_template, commit_msg_template)
            .map_err(|e| {
                tracing::error!("{e}");
                RunError::Generic
            })?;

    let r = convert::convert(
        &progress_print,
        &options,
        &meta_maker,
        &args.src,
        args.report.as_deref(),
        args.dest.as_deref(),
        &args.show,
    );

    term_out.finish();

    r.map_err(|_| RunError::Generic)
}

fn init_logger(
    stderr_level: Option<tracing::Level>,
    file_path: Option<&std::path::Path>,
    file_level: Option<tracing::Level>,
    progress_print: ProgressPrint,
) -> Result<(), std::io::Error> {
    use tracing_subscriber::layer::{Layer as _, SubscriberExt as _};
    use tracing_subscriber::util::SubscriberInitExt as _;

    let stderr_sub = if let Some(stderr_level) = stderr_level {
        let filter = tracing_subscriber::filter::LevelFilter::from_level(stderr_level);
        Some(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(MakeLogPrinter::new(progress_print))
                .with_filter(filter),
        )
    } else {
        None
    };

    let file_sub = if let Some(file_path) = file_path {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(file_path)?;

        let filter = tracing_subscriber::filter::LevelFilter::from_level(
            file_level.unwrap_or(tracing::Level::DEBUG),
        );
        Some(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(file)
                .with_filter(filter),
        )
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(stderr_sub)
        .with(file_sub)
        .init();

    Ok(())
}

struct MakeLogPrinter {
    progress_print: ProgressPrint,
}

impl MakeLogPrinter {
    fn new(progress_print: ProgressPrint) -> Self {
        Self { progress_print }
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for MakeLogPrinter {
    type Writer = LogPrinter<'a>;

    fn make_writer(&'a self) -> LogPrinter<'a> {
        LogPrinter {
            progress_print: &self.progress_print,
            buf: Vec::new(),
        }
    }
}

struct LogPrinter<'a> {
    progress_print: &'a ProgressPrint,
    buf: Vec<u8>,
}

impl Drop for LogPrinter<'_> {
    fn drop(&mut self) {
        self.progress_print.print_raw_line(self.buf.clone());
    }
}

impl std::io::Write for LogPrinter<'_> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buf.extend(buf);
        Ok(buf.len())
    }

    fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
        self.buf.extend(buf);
        Ok(())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
