mod history;

pub(crate) use history::load_history;

/// The revision records of one tracked path, as read from the history file.
#[derive(Clone, Debug)]
pub(crate) struct RawFile {
    pub(crate) path: String,
    pub(crate) executable: bool,
    /// Symbol name and the number it is attached to.
    pub(crate) symbols: Vec<(String, String)>,
    pub(crate) revs: Vec<RawRevision>,
}

#[derive(Clone, Debug)]
pub(crate) struct RawRevision {
    pub(crate) number: String,
    pub(crate) author: String,
    /// Seconds since the Unix epoch, UTC.
    pub(crate) time: i64,
    pub(crate) log: String,
    pub(crate) dead: bool,
    pub(crate) commit_id: Option<String>,
    pub(crate) content: String,
}
