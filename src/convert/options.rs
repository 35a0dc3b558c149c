use std::borrow::Cow;

use super::ConvertError;
use crate::FHashMap;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum ChangesetTime {
    Earliest,
    Latest,
}

/// How changesets that open at the same instant on different lines are
/// ordered.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum StraddleOrder {
    TrunkFirst,
    Arrival,
}

pub(crate) struct InitOptions {
    pub(crate) trunk_name: String,
    pub(crate) commit_time_window: i64,
    pub(crate) changeset_time: ChangesetTime,
    pub(crate) straddle_order: StraddleOrder,
    pub(crate) jobs: usize,
}

pub(crate) struct Options {
    pub(super) trunk_name: String,
    pub(super) commit_time_window: i64,
    pub(super) changeset_time: ChangesetTime,
    pub(super) straddle_order: StraddleOrder,
    pub(super) jobs: usize,
    pub(crate) rename_branches: SymbolRenamer,
    pub(crate) rename_tags: SymbolRenamer,
}

pub(crate) struct SymbolRenameAddError;

impl Options {
    pub(crate) fn new(init: InitOptions) -> Self {
        Self {
            trunk_name: init.trunk_name,
            commit_time_window: init.commit_time_window,
            changeset_time: init.changeset_time,
            straddle_order: init.straddle_order,
            jobs: init.jobs,
            rename_branches: SymbolRenamer::new(),
            rename_tags: SymbolRenamer::new(),
        }
    }

    pub(crate) fn validate(&self) -> Result<(), ConvertError> {
        if self.trunk_name.is_empty() {
            tracing::error!("trunk name is empty");
            return Err(ConvertError);
        }
        if self.commit_time_window < 0 {
            tracing::error!(
                "commit time window must not be negative, got {}",
                self.commit_time_window,
            );
            return Err(ConvertError);
        }
        if self.jobs == 0 {
            tracing::error!("number of jobs must be at least 1");
            return Err(ConvertError);
        }
        Ok(())
    }

    #[inline]
    pub(crate) fn trunk_name(&self) -> &str {
        &self.trunk_name
    }

    pub(crate) fn add_branch_rename(
        &mut self,
        from: &str,
        to: &str,
    ) -> Result<(), SymbolRenameAddError> {
        self.rename_branches.add(from, to)
    }

    pub(crate) fn add_tag_rename(&mut self, from: &str, to: &str) -> Result<(), SymbolRenameAddError> {
        self.rename_tags.add(from, to)
    }
}

/// Renames symbols on export, by exact name or by `PREFIX*` pattern.
pub(crate) struct SymbolRenamer {
    exact: FHashMap<String, String>,
    prefix: Vec<(String, String)>,
}

impl SymbolRenamer {
    fn new() -> Self {
        Self {
            exact: FHashMap::default(),
            prefix: Vec::new(),
        }
    }

    fn add(&mut self, from: &str, to: &str) -> Result<(), SymbolRenameAddError> {
        if let Some(from_prefix) = from.strip_suffix('*') {
            let to_prefix = to.strip_suffix('*').ok_or(SymbolRenameAddError)?;
            if from_prefix.contains('*') || to_prefix.contains('*') {
                return Err(SymbolRenameAddError);
            }
            self.prefix.push((from_prefix.to_owned(), to_prefix.to_owned()));
            // Longest prefix first.
            self.prefix
                .sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));
        } else {
            if from.contains('*') || to.contains('*') {
                return Err(SymbolRenameAddError);
            }
            self.exact.insert(from.to_owned(), to.to_owned());
        }
        Ok(())
    }

    pub(crate) fn rename<'a>(&'a self, name: &'a str) -> Cow<'a, str> {
        if let Some(to) = self.exact.get(name) {
            return Cow::Borrowed(to);
        }
        for (from_prefix, to_prefix) in self.prefix.iter() {
            if let Some(rest) = name.strip_prefix(from_prefix.as_str()) {
                return Cow::Owned(format!("{to_prefix}{rest}"));
            }
        }
        Cow::Borrowed(name)
    }
}

#[cfg(test)]
impl Default for InitOptions {
    fn default() -> Self {
        Self {
            trunk_name: "master".into(),
            commit_time_window: 300,
            changeset_time: ChangesetTime::Latest,
            straddle_order: StraddleOrder::TrunkFirst,
            jobs: 2,
        }
    }
}
