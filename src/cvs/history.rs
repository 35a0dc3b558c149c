use std::collections::BTreeMap;

use super::{RawFile, RawRevision};
use crate::FHashSet;

#[derive(serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct HistoryFile {
    #[serde(default = "Vec::new")]
    files: Vec<FileEntry>,
}

#[derive(serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct FileEntry {
    path: String,
    #[serde(default = "false_")]
    executable: bool,
    #[serde(default = "BTreeMap::new")]
    symbols: BTreeMap<String, String>,
    #[serde(default = "Vec::new")]
    revs: Vec<RevEntry>,
}

#[derive(serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct RevEntry {
    number: String,
    #[serde(default = "String::new")]
    author: String,
    date: String,
    #[serde(default = "String::new")]
    log: String,
    #[serde(default = "default_state")]
    state: String,
    commitid: Option<String>,
    #[serde(default = "String::new")]
    content: String,
}

#[inline(always)]
fn false_() -> bool {
    false
}

fn default_state() -> String {
    "Exp".into()
}

#[derive(Debug)]
pub(crate) enum HistoryError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    BadPath(String),
    DuplicatePath(String),
    BadDate {
        path: String,
        number: String,
        date: String,
    },
}

impl From<std::io::Error> for HistoryError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl std::fmt::Display for HistoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => std::fmt::Display::fmt(e, f),
            Self::Parse(e) => std::fmt::Display::fmt(e, f),
            Self::BadPath(path) => write!(f, "invalid path {path:?}"),
            Self::DuplicatePath(path) => write!(f, "path {path:?} appears more than once"),
            Self::BadDate { path, number, date } => {
                write!(f, "{path}: revision {number} has invalid date {date:?}")
            }
        }
    }
}

pub(crate) fn load_history(path: &std::path::Path) -> Result<Vec<RawFile>, HistoryError> {
    let raw = std::fs::read_to_string(path)?;
    parse_history(&raw)
}

pub(crate) fn parse_history(raw: &str) -> Result<Vec<RawFile>, HistoryError> {
    let history: HistoryFile = toml::from_str(raw).map_err(HistoryError::Parse)?;

    let mut seen = FHashSet::default();
    let mut files = Vec::with_capacity(history.files.len());
    for entry in history.files {
        if !is_valid_path(&entry.path) {
            return Err(HistoryError::BadPath(entry.path));
        }
        if !seen.insert(entry.path.clone()) {
            return Err(HistoryError::DuplicatePath(entry.path));
        }

        let mut revs = Vec::with_capacity(entry.revs.len());
        for rev in entry.revs {
            let Some(time) = parse_date(&rev.date) else {
                return Err(HistoryError::BadDate {
                    path: entry.path,
                    number: rev.number,
                    date: rev.date,
                });
            };
            revs.push(RawRevision {
                number: rev.number,
                author: rev.author,
                time,
                log: rev.log,
                dead: rev.state == "dead",
                commit_id: rev.commitid.filter(|id| !id.is_empty()),
                content: rev.content,
            });
        }

        files.push(RawFile {
            path: entry.path,
            executable: entry.executable,
            symbols: entry.symbols.into_iter().collect(),
            revs,
        });
    }

    Ok(files)
}

fn is_valid_path(path: &str) -> bool {
    !path.is_empty()
        && !path.contains('\0')
        && path
            .split('/')
            .all(|component| !matches!(component, "" | "." | ".."))
}

/// Parses an RFC 3339 date, `YYYY-MM-DD HH:MM:SS` (UTC) or an RCS date
/// (`YYYY.MM.DD.HH.MM.SS`, two-digit years meaning 19xx).
fn parse_date(raw: &str) -> Option<i64> {
    if let Ok(date) = chrono::DateTime::parse_from_rfc3339(raw) {
        return Some(date.timestamp());
    }
    if let Ok(date) = chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(date.and_utc().timestamp());
    }

    let parts: Vec<&str> = raw.split('.').collect();
    let [year, month, day, hour, min, sec] = parts.as_slice() else {
        return None;
    };
    let mut year: i32 = year.parse().ok()?;
    if year < 100 {
        year += 1900;
    }
    chrono::NaiveDate::from_ymd_opt(year, month.parse().ok()?, day.parse().ok()?)?
        .and_hms_opt(hour.parse().ok()?, min.parse().ok()?, sec.parse().ok()?)
        .map(|date| date.and_utc().timestamp())
}
