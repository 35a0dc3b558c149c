use std::collections::{BTreeMap, BTreeSet};

use super::changesets::{Changesets, Member};
use super::ledger::{Issue, UnresolvedBranchPointError};
use super::options::Options;
use super::rev_tree::RevisionTree;
use super::symbols::{Symbol, SymbolTable, Target};
use crate::FHashMap;

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum BranchStep {
    Commit(usize),
    /// Files whose branch sprout was committed after the branch already
    /// had commits of its own, added right after that changeset.
    Rejoin { after: usize, members: Vec<Member> },
}

impl BranchStep {
    /// Position of the step in the global changeset order.
    pub(crate) fn position(&self) -> usize {
        match *self {
            Self::Commit(seq) => seq,
            Self::Rejoin { after, .. } => after,
        }
    }
}

pub(crate) struct BranchNode {
    pub(crate) name: String,
    /// Index of the parent node, `None` for the trunk.
    pub(crate) parent: Option<usize>,
    /// Changeset the branch was taken after, `None` for the trunk.
    pub(crate) branch_point: Option<usize>,
    /// Live sprouts the branch starts with, sorted by file.
    pub(crate) initial: Vec<Member>,
    /// Sorted by position.
    pub(crate) steps: Vec<BranchStep>,
}

/// The branch DAG. The trunk is the first node and every node comes after
/// its parent.
pub(crate) struct Topology {
    nodes: Vec<BranchNode>,
    by_name: FHashMap<String, usize>,
}

impl Topology {
    #[inline]
    pub(crate) fn nodes(&self) -> &[BranchNode] {
        &self.nodes
    }

    #[inline]
    pub(crate) fn trunk(&self) -> &BranchNode {
        &self.nodes[0]
    }

    pub(crate) fn node_index(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    pub(crate) fn node(&self, name: &str) -> Option<&BranchNode> {
        self.node_index(name).map(|i| &self.nodes[i])
    }
}

pub(crate) fn resolve(
    trees: &[RevisionTree],
    symbols: &SymbolTable,
    changesets: &Changesets,
    options: &Options,
) -> (Topology, Vec<Issue>) {
    let trunk_name = options.trunk_name();
    let mut issues = Vec::new();

    let mut own_commits = BTreeMap::<&str, Vec<usize>>::new();
    for changeset in changesets.iter() {
        own_commits
            .entry(changeset.branch.as_str())
            .or_default()
            .push(changeset.seq);
    }

    let mut nodes = vec![BranchNode {
        name: trunk_name.to_owned(),
        parent: None,
        branch_point: None,
        initial: Vec::new(),
        steps: own_commits
            .get(trunk_name)
            .map(|seqs| seqs.iter().map(|&seq| BranchStep::Commit(seq)).collect())
            .unwrap_or_default(),
    }];
    let mut by_name = FHashMap::default();
    by_name.insert(trunk_name.to_owned(), 0);
    let mut claimed = BTreeSet::from([trunk_name]);

    let mut plans = Vec::new();
    for symbol in symbols.branches() {
        match majority_parent(trees, symbol) {
            Some(parent) => plans.push((symbol, parent)),
            None => issues.push(Issue::UnresolvedBranchPoint(
                UnresolvedBranchPointError::NoParent {
                    branch: symbol.name.clone(),
                },
            )),
        }
    }

    // Place branches once their parent is placed.
    while !plans.is_empty() {
        let mut placed_any = false;
        let mut waiting = Vec::new();
        for (symbol, parent_name) in plans {
            let Some(&parent_i) = by_name.get(parent_name) else {
                waiting.push((symbol, parent_name));
                continue;
            };
            placed_any = true;

            let labels = line_labels(trees, symbol);
            if !labels.contains(symbol.name.as_str()) {
                if let Some(label) = labels.first() {
                    tracing::debug!("branch {} is an alias of {label}", symbol.name);
                }
            }
            let mut own: Vec<usize> = labels
                .iter()
                .filter_map(|label| own_commits.get(label))
                .flatten()
                .copied()
                .collect();
            own.sort_unstable();
            own.dedup();

            match build_node(trees, changesets, symbol, &own, parent_i, &nodes[parent_i]) {
                Ok(node) => {
                    tracing::debug!(
                        "branch {} from {parent_name} at changeset {:?}",
                        node.name,
                        node.branch_point,
                    );
                    by_name.insert(node.name.clone(), nodes.len());
                    nodes.push(node);
                    claimed.extend(labels);
                }
                Err(e) => issues.push(Issue::UnresolvedBranchPoint(e)),
            }
        }
        plans = waiting;

        if !placed_any {
            for (symbol, parent_name) in plans.drain(..) {
                issues.push(Issue::UnresolvedBranchPoint(
                    UnresolvedBranchPointError::ParentUnresolved {
                        branch: symbol.name.clone(),
                        parent: parent_name.to_owned(),
                    },
                ));
            }
        }
    }

    for (label, seqs) in own_commits.iter() {
        if !claimed.contains(label) {
            tracing::warn!(
                "dropping {} changeset(s) on unresolved branch {label}",
                seqs.len(),
            );
        }
    }

    (Topology { nodes, by_name }, issues)
}

/// Labels of the changesets committed on a branch: the name each file
/// gives the line the branch number names. Differs from the branch name
/// for aliases.
fn line_labels<'a>(trees: &'a [RevisionTree], symbol: &Symbol) -> BTreeSet<&'a str> {
    symbol
        .targets()
        .filter_map(|(file, target)| match *target {
            Target::BranchRoot { ref root, .. } => trees[file].branch_line_name(root),
            _ => None,
        })
        .collect()
}

/// The line most sprouts of a branch live on, ties broken by name.
fn majority_parent<'a>(trees: &'a [RevisionTree], symbol: &Symbol) -> Option<&'a str> {
    let mut votes = BTreeMap::<&str, usize>::new();
    for (file, target) in symbol.targets() {
        if let Target::BranchRoot { sprout, .. } = *target {
            if let Some(line) = trees[file].line_name(sprout) {
                *votes.entry(line).or_default() += 1;
            }
        }
    }

    if votes.len() > 1 {
        tracing::warn!(
            "branch {} sprouts from several lines: {}",
            symbol.name,
            votes
                .iter()
                .map(|(line, n)| format!("{line} ({n})"))
                .collect::<Vec<_>>()
                .join(", "),
        );
    }

    // `max_by_key` keeps the last maximum, so walk names backwards.
    votes
        .into_iter()
        .rev()
        .max_by_key(|&(_, n)| n)
        .map(|(line, _)| line)
}

fn build_node(
    trees: &[RevisionTree],
    changesets: &Changesets,
    symbol: &Symbol,
    own: &[usize],
    parent_i: usize,
    parent: &BranchNode,
) -> Result<BranchNode, UnresolvedBranchPointError> {
    let first_own = own.first().copied();

    let mut branch_point = None;
    let mut initial = Vec::new();
    let mut late = BTreeMap::<usize, Vec<Member>>::new();
    for (file, target) in symbol.targets() {
        let Target::BranchRoot { sprout, .. } = *target else {
            continue;
        };
        if !trees[file].is_live(sprout) {
            continue;
        }

        let member = Member { file, rev: sprout };
        match (changesets.seq_of(file, sprout), first_own) {
            (Some(seq), Some(first)) if seq > first => {
                late.entry(seq).or_default().push(member);
            }
            (seq, _) => {
                branch_point = branch_point.max(seq);
                initial.push(member);
            }
        }
    }

    let branch_point = match branch_point {
        Some(seq) => seq,
        None => {
            // Only sprouts nothing committed (a branch made of files
            // added on it): take the parent's state before the first commit.
            let fallback = first_own.and_then(|first| {
                parent
                    .steps
                    .iter()
                    .map(BranchStep::position)
                    .take_while(|&position| position < first)
                    .last()
            });
            fallback.ok_or_else(|| UnresolvedBranchPointError::NoSproutChangeset {
                branch: symbol.name.clone(),
            })?
        }
    };

    let mut steps: Vec<_> = own.iter().map(|&seq| BranchStep::Commit(seq)).collect();
    steps.extend(
        late.into_iter()
            .map(|(after, members)| BranchStep::Rejoin { after, members }),
    );
    steps.sort_by_key(BranchStep::position);

    Ok(BranchNode {
        name: symbol.name.clone(),
        parent: Some(parent_i),
        branch_point: Some(branch_point),
        initial,
        steps,
    })
}
