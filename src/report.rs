use std::collections::BTreeMap;

use crate::convert::topology::BranchStep;
use crate::convert::{ConvertError, Lifted};

#[derive(serde::Serialize)]
struct Report {
    branches: Vec<BranchReport>,
    tags: Vec<TagReport>,
    issues: Vec<IssueReport>,
}

#[derive(serde::Serialize)]
struct BranchReport {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    parent: Option<String>,
    #[serde(rename = "branch-point", skip_serializing_if = "Option::is_none")]
    branch_point: Option<usize>,
    tree: BTreeMap<String, String>,
    changesets: Vec<ChangesetReport>,
}

#[derive(serde::Serialize)]
struct ChangesetReport {
    position: usize,
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    author: Option<String>,
    time: i64,
    log: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    commitid: Option<String>,
    members: Vec<MemberReport>,
}

#[derive(serde::Serialize)]
struct MemberReport {
    path: String,
    rev: String,
    dead: bool,
    /// Tags and branches attached to the revision.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    symbols: Vec<String>,
}

#[derive(serde::Serialize)]
struct TagReport {
    name: String,
    tree: BTreeMap<String, String>,
}

#[derive(serde::Serialize)]
struct IssueReport {
    kind: &'static str,
    message: String,
}

pub(crate) fn write_report(lifted: &Lifted, path: &std::path::Path) -> Result<(), ConvertError> {
    let report = build_report(lifted);
    let serialized = toml::to_string(&report).map_err(|e| {
        tracing::error!("failed to serialize report: {e}");
        ConvertError
    })?;
    std::fs::write(path, serialized).map_err(|e| {
        tracing::error!("failed to write report to {path:?}: {e}");
        ConvertError
    })?;
    tracing::info!("wrote report to {path:?}");
    Ok(())
}

fn build_report(lifted: &Lifted) -> Report {
    let materializer = lifted.materializer();
    let nodes = lifted.topology.nodes();

    let member_report = |member: &crate::convert::changesets::Member| {
        let tree = &lifted.trees[member.file];
        let rev = tree.rev(member.rev);
        MemberReport {
            path: tree.path().to_owned(),
            rev: rev.number.to_string(),
            dead: rev.dead,
            symbols: tree
                .symbols_at(member.rev)
                .into_iter()
                .map(String::from)
                .collect(),
        }
    };

    let branches = nodes
        .iter()
        .map(|node| {
            let changesets = node
                .steps
                .iter()
                .map(|step| match *step {
                    BranchStep::Commit(seq) => {
                        let changeset = lifted.changesets.get(seq);
                        ChangesetReport {
                            position: seq,
                            kind: "commit",
                            author: Some(changeset.author.clone()),
                            time: changeset.time,
                            log: changeset.log.clone(),
                            commitid: changeset.commit_id.clone(),
                            members: changeset.members.iter().map(member_report).collect(),
                        }
                    }
                    BranchStep::Rejoin { after, ref members } => ChangesetReport {
                        position: after,
                        kind: "rejoin",
                        author: None,
                        time: lifted.changesets.get(after).time,
                        log: String::new(),
                        commitid: None,
                        members: members.iter().map(member_report).collect(),
                    },
                })
                .collect();

            BranchReport {
                name: node.name.clone(),
                parent: node.parent.map(|i| nodes[i].name.clone()),
                branch_point: node.branch_point,
                tree: materializer
                    .branch_snapshot(node, usize::MAX)
                    .describe(&lifted.trees),
                changesets,
            }
        })
        .collect();

    let tags = lifted
        .symbols
        .tags()
        .filter_map(|tag| match materializer.snapshot(&tag.name) {
            Ok(snapshot) => Some(TagReport {
                name: tag.name.clone(),
                tree: snapshot.describe(&lifted.trees),
            }),
            Err(e) => {
                tracing::warn!("leaving tag {} out of the report: {e}", tag.name);
                None
            }
        })
        .collect();

    let issues = lifted
        .ledger
        .issues()
        .iter()
        .map(|issue| IssueReport {
            kind: issue.kind(),
            message: issue.to_string(),
        })
        .collect();

    Report {
        branches,
        tags,
        issues,
    }
}
