use super::rev_tree::MalformedHistoryError;
use super::symbols::AmbiguousSymbolError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum SplitChangesetWarning {
    /// One logical commit touched more than one branch line.
    Straddle {
        author: String,
        time: i64,
        branches: (String, String),
    },
    /// A file would appear twice in one changeset.
    RepeatedFile {
        author: String,
        time: i64,
        branch: String,
        path: String,
    },
}

impl std::fmt::Display for SplitChangesetWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Straddle {
                author,
                time,
                branches: (a, b),
            } => write!(
                f,
                "commit by {author} at {time} touches branches {a} and {b}, splitting",
            ),
            Self::RepeatedFile {
                author,
                time,
                branch,
                path,
            } => write!(
                f,
                "commit by {author} at {time} on {branch} changes {path} twice, splitting",
            ),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum UnresolvedBranchPointError {
    NoParent { branch: String },
    ParentUnresolved { branch: String, parent: String },
    NoSproutChangeset { branch: String },
}

impl std::fmt::Display for UnresolvedBranchPointError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoParent { branch } => {
                write!(f, "branch {branch} has no live sprout on any line")
            }
            Self::ParentUnresolved { branch, parent } => {
                write!(f, "branch {branch} sprouts from unresolved branch {parent}")
            }
            Self::NoSproutChangeset { branch } => {
                write!(f, "cannot find the branch point of {branch}")
            }
        }
    }
}

/// Something that went wrong while lifting, recorded without aborting.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Issue {
    MalformedHistory {
        path: String,
        error: MalformedHistoryError,
    },
    AmbiguousSymbol(AmbiguousSymbolError),
    SplitChangeset(SplitChangesetWarning),
    UnresolvedBranchPoint(UnresolvedBranchPointError),
}

impl Issue {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Self::MalformedHistory { .. } => "malformed-history",
            Self::AmbiguousSymbol(_) => "ambiguous-symbol",
            Self::SplitChangeset(_) => "split-changeset",
            Self::UnresolvedBranchPoint(_) => "unresolved-branch-point",
        }
    }

    pub(crate) fn is_error(&self) -> bool {
        !matches!(self, Self::SplitChangeset(_))
    }
}

impl std::fmt::Display for Issue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MalformedHistory { path, error } => write!(f, "{path}: {error}"),
            Self::AmbiguousSymbol(e) => std::fmt::Display::fmt(e, f),
            Self::SplitChangeset(w) => std::fmt::Display::fmt(w, f),
            Self::UnresolvedBranchPoint(e) => std::fmt::Display::fmt(e, f),
        }
    }
}

#[derive(Default)]
pub(crate) struct Ledger {
    issues: Vec<Issue>,
}

impl Ledger {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(&mut self, issue: Issue) {
        if issue.is_error() {
            tracing::error!("{issue}");
        } else {
            tracing::warn!("{issue}");
        }
        self.issues.push(issue);
    }

    pub(crate) fn extend(&mut self, issues: impl IntoIterator<Item = Issue>) {
        for issue in issues {
            self.record(issue);
        }
    }

    #[inline]
    pub(crate) fn issues(&self) -> &[Issue] {
        &self.issues
    }

    pub(crate) fn num_errors(&self) -> usize {
        self.issues.iter().filter(|issue| issue.is_error()).count()
    }
}
