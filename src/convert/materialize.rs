use std::collections::BTreeMap;

use super::changesets::{Changesets, Member};
use super::rev_tree::{RevId, RevisionTree};
use super::symbols::{AmbiguousSymbolError, FileId, LookupError, SymbolKind, SymbolTable, Target};
use super::topology::{BranchNode, BranchStep, Topology};

/// The files of a branch or tag at some point, with their revisions.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct TreeSnapshot {
    entries: BTreeMap<FileId, RevId>,
}

impl TreeSnapshot {
    #[inline]
    pub(crate) fn get(&self, file: FileId) -> Option<RevId> {
        self.entries.get(&file).copied()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = Member> + '_ {
        self.entries
            .iter()
            .map(|(&file, &rev)| Member { file, rev })
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Path to revision number.
    pub(crate) fn describe(&self, trees: &[RevisionTree]) -> BTreeMap<String, String> {
        self.entries
            .iter()
            .map(|(&file, &rev)| {
                let tree = &trees[file];
                (tree.path().to_owned(), tree.rev(rev).number.to_string())
            })
            .collect()
    }

    pub(crate) fn apply(&mut self, trees: &[RevisionTree], member: Member) {
        if trees[member.file].is_live(member.rev) {
            self.entries.insert(member.file, member.rev);
        } else {
            self.entries.remove(&member.file);
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum SnapshotError {
    UnknownName(String),
    Ambiguous(AmbiguousSymbolError),
    UnresolvedBranch(String),
    BeforeBranchPoint {
        branch: String,
        branch_point: usize,
        point: usize,
    },
}

impl std::fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownName(name) => write!(f, "no branch or tag named {name}"),
            Self::Ambiguous(e) => std::fmt::Display::fmt(e, f),
            Self::UnresolvedBranch(name) => {
                write!(f, "branch {name} has no resolved branch point")
            }
            Self::BeforeBranchPoint {
                branch,
                branch_point,
                point,
            } => write!(
                f,
                "branch {branch} does not exist at changeset {point} (created after {branch_point})",
            ),
        }
    }
}

/// Computes snapshots from the lifted history. Holds only shared
/// references, so it can be used from several threads.
#[derive(Copy, Clone)]
pub(crate) struct TreeMaterializer<'a> {
    trees: &'a [RevisionTree],
    symbols: &'a SymbolTable,
    changesets: &'a Changesets,
    topology: &'a Topology,
}

impl<'a> TreeMaterializer<'a> {
    pub(crate) fn new(
        trees: &'a [RevisionTree],
        symbols: &'a SymbolTable,
        changesets: &'a Changesets,
        topology: &'a Topology,
    ) -> Self {
        Self {
            trees,
            symbols,
            changesets,
            topology,
        }
    }

    /// The final tree of a branch, or the tree of a tag.
    pub(crate) fn snapshot(&self, name: &str) -> Result<TreeSnapshot, SnapshotError> {
        match self.topology.node(name) {
            Some(node) => Ok(self.branch_snapshot(node, usize::MAX)),
            None => self.tag_snapshot(name),
        }
    }

    /// The tree of a branch after the changeset at `point`. Tags do not
    /// change, so the point is irrelevant for them.
    pub(crate) fn snapshot_at(&self, name: &str, point: usize) -> Result<TreeSnapshot, SnapshotError> {
        let Some(node) = self.topology.node(name) else {
            return self.tag_snapshot(name);
        };
        match node.branch_point {
            Some(branch_point) if point < branch_point => Err(SnapshotError::BeforeBranchPoint {
                branch: node.name.clone(),
                branch_point,
                point,
            }),
            _ => Ok(self.branch_snapshot(node, point)),
        }
    }

    pub(crate) fn branch_snapshot(&self, node: &BranchNode, point: usize) -> TreeSnapshot {
        let mut snapshot = TreeSnapshot::default();
        for &member in node.initial.iter() {
            snapshot.apply(self.trees, member);
        }
        for step in node.steps.iter() {
            if step.position() > point {
                break;
            }
            match step {
                BranchStep::Commit(seq) => {
                    for &member in self.changesets.get(*seq).members.iter() {
                        snapshot.apply(self.trees, member);
                    }
                }
                BranchStep::Rejoin { members, .. } => {
                    for &member in members.iter() {
                        snapshot.apply(self.trees, member);
                    }
                }
            }
        }
        snapshot
    }

    fn tag_snapshot(&self, name: &str) -> Result<TreeSnapshot, SnapshotError> {
        let lookup_error = |e: LookupError<'_>| match e {
            LookupError::Ambiguous(e) => SnapshotError::Ambiguous(e.clone()),
            LookupError::Unknown => SnapshotError::UnknownName(name.to_owned()),
        };
        if self.symbols.kind(name).map_err(lookup_error)? == SymbolKind::Branch {
            return Err(SnapshotError::UnresolvedBranch(name.to_owned()));
        }

        let mut snapshot = TreeSnapshot::default();
        let targets = self.symbols.resolve(name).map_err(lookup_error)?;
        for (file, target) in targets.iter().enumerate() {
            if let Target::Revision(rev) = *target {
                snapshot.apply(self.trees, Member { file, rev });
            }
        }
        Ok(snapshot)
    }
}
