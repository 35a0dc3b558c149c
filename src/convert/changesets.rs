use super::ledger::{Issue, SplitChangesetWarning};
use super::options::{ChangesetTime, Options, StraddleOrder};
use super::rev_tree::{RevId, RevisionTree};
use super::symbols::FileId;
use crate::{FHashMap, FHashSet};

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct Member {
    pub(crate) file: FileId,
    pub(crate) rev: RevId,
}

/// Revisions of several files committed together on one branch line.
pub(crate) struct Changeset {
    pub(crate) seq: usize,
    pub(crate) branch: String,
    pub(crate) author: String,
    pub(crate) log: String,
    pub(crate) commit_id: Option<String>,
    pub(crate) time: i64,
    /// Sorted by file.
    pub(crate) members: Vec<Member>,
}

pub(crate) struct Changesets {
    list: Vec<Changeset>,
    by_member: FHashMap<Member, usize>,
}

impl Changesets {
    #[inline]
    pub(crate) fn get(&self, seq: usize) -> &Changeset {
        &self.list[seq]
    }

    pub(crate) fn iter(&self) -> std::slice::Iter<'_, Changeset> {
        self.list.iter()
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.list.len()
    }

    /// Sequence number of the changeset holding a revision, if any.
    pub(crate) fn seq_of(&self, file: FileId, rev: RevId) -> Option<usize> {
        self.by_member.get(&Member { file, rev }).copied()
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Hash)]
struct CommitMeta<'a> {
    author: &'a str,
    log: &'a str,
    commit_id: Option<&'a str>,
}

struct PendingChangeset<'a> {
    branch: &'a str,
    meta: CommitMeta<'a>,
    first_time: i64,
    last_time: i64,
    members: Vec<Member>,
    files: FHashSet<FileId>,
}

struct Accumulator<'a> {
    trees: &'a [RevisionTree],
    window: i64,
    pending: Vec<PendingChangeset<'a>>,
    /// The changeset still accepting revisions on each branch line.
    open: FHashMap<&'a str, usize>,
    placed: FHashMap<Member, usize>,
    issues: Vec<Issue>,
}

impl<'a> Accumulator<'a> {
    fn new(trees: &'a [RevisionTree], window: i64) -> Self {
        Self {
            trees,
            window,
            pending: Vec::new(),
            open: FHashMap::default(),
            placed: FHashMap::default(),
            issues: Vec::new(),
        }
    }

    fn in_window(&self, meta: &CommitMeta<'_>, pending_i: usize, time: i64) -> bool {
        // A shared commit id ties revisions together regardless of time.
        meta.commit_id.is_some() || time - self.pending[pending_i].last_time <= self.window
    }

    fn push(&mut self, member: Member, branch: &'a str) {
        let trees = self.trees;
        let tree = &trees[member.file];
        let rev = tree.rev(member.rev);
        let meta = CommitMeta {
            author: &rev.author,
            log: &rev.log,
            commit_id: rev.commit_id.as_deref(),
        };
        let parent_placed = tree.parent(member.rev).and_then(|parent| {
            self.placed
                .get(&Member {
                    file: member.file,
                    rev: parent,
                })
                .copied()
        });

        if let Some(&open_i) = self.open.get(branch) {
            if self.pending[open_i].meta == meta && self.in_window(&meta, open_i, rev.time) {
                let pending = &mut self.pending[open_i];
                if pending.files.contains(&member.file) {
                    self.issues.push(Issue::SplitChangeset(
                        SplitChangesetWarning::RepeatedFile {
                            author: meta.author.to_owned(),
                            time: rev.time,
                            branch: branch.to_owned(),
                            path: tree.path().to_owned(),
                        },
                    ));
                } else if parent_placed.is_none_or(|parent_i| parent_i < open_i) {
                    pending.last_time = rev.time;
                    pending.members.push(member);
                    pending.files.insert(member.file);
                    self.placed.insert(member, open_i);
                    return;
                }
            }
        }

        self.open_new(member, branch, meta, rev.time);
    }

    fn open_new(&mut self, member: Member, branch: &'a str, meta: CommitMeta<'a>, time: i64) {
        let new_i = self.pending.len();

        let straddled = self
            .open
            .iter()
            .filter(|&(&other_branch, &other_i)| {
                other_branch != branch
                    && self.pending[other_i].meta == meta
                    && self.in_window(&meta, other_i, time)
            })
            .map(|(&other_branch, _)| other_branch)
            .min();
        if let Some(other_branch) = straddled {
            self.issues.push(Issue::SplitChangeset(SplitChangesetWarning::Straddle {
                author: meta.author.to_owned(),
                time,
                branches: (other_branch.to_owned(), branch.to_owned()),
            }));
        }

        self.open.insert(branch, new_i);

        let mut files = FHashSet::default();
        files.insert(member.file);
        self.pending.push(PendingChangeset {
            branch,
            meta,
            first_time: time,
            last_time: time,
            members: vec![member],
            files,
        });
        self.placed.insert(member, new_i);
    }

    fn finish(self, options: &Options) -> (Changesets, Vec<Issue>) {
        let trunk_name = options.trunk_name();
        let pending = self.pending;

        // Opening order already follows first member time.
        let mut order: Vec<usize> = (0..pending.len()).collect();
        if options.straddle_order == StraddleOrder::TrunkFirst {
            order.sort_by_key(|&i| (pending[i].first_time, pending[i].branch != trunk_name, i));
        }

        let mut branch_times = FHashMap::<&str, i64>::default();
        let mut list = Vec::with_capacity(order.len());
        let mut by_member = FHashMap::default();
        for (seq, i) in order.into_iter().enumerate() {
            let pending = &pending[i];
            let time = match options.changeset_time {
                ChangesetTime::Earliest => pending.first_time,
                ChangesetTime::Latest => pending.last_time,
            };
            let branch_time = branch_times.entry(pending.branch).or_insert(i64::MIN);
            *branch_time = time.max(*branch_time);

            let mut members = pending.members.clone();
            members.sort_unstable();
            for &member in members.iter() {
                by_member.insert(member, seq);
            }

            list.push(Changeset {
                seq,
                branch: pending.branch.to_owned(),
                author: pending.meta.author.to_owned(),
                log: pending.meta.log.to_owned(),
                commit_id: pending.meta.commit_id.map(str::to_owned),
                time: *branch_time,
                members,
            });
        }

        (Changesets { list, by_member }, self.issues)
    }
}

/// Groups the effective revisions of all files into changesets.
pub(crate) fn assemble(trees: &[RevisionTree], options: &Options) -> (Changesets, Vec<Issue>) {
    let mut candidates = Vec::new();
    for (file, tree) in trees.iter().enumerate() {
        for (rev_id, rev) in tree.revs() {
            if !tree.is_effective(rev_id) {
                continue;
            }
            let Some(branch) = tree.line_name(rev_id) else {
                continue;
            };
            let depth = tree.path_to_root(rev_id).len();
            candidates.push((rev.time, depth, Member { file, rev: rev_id }, branch));
        }
    }
    // Trees are sorted by path and revision ids by number. At equal times,
    // shallower revisions go first, so parents precede children and an
    // import's trunk and vendor revisions are not interleaved.
    candidates.sort_by_key(|&(time, depth, member, _)| (time, depth, member));

    let mut accumulator = Accumulator::new(trees, options.commit_time_window);
    for (_, _, member, branch) in candidates {
        accumulator.push(member, branch);
    }
    accumulator.finish(options)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::{Changesets, assemble};
    use crate::convert::ledger::Issue;
    use crate::convert::options::{ChangesetTime, InitOptions, Options, StraddleOrder};
    use crate::convert::rev_tree::RevisionTree;
    use crate::convert::test_utils::{file, pathological_tags};
    use crate::cvs::RawFile;

    fn run(files: Vec<RawFile>, init: InitOptions) -> (Vec<RevisionTree>, Changesets, Vec<Issue>) {
        let mut files = files;
        files.sort_by(|a, b| a.path.cmp(&b.path));
        let trees: Vec<_> = files
            .into_iter()
            .map(|raw| RevisionTree::build(raw, "master").unwrap())
            .collect();
        let (changesets, issues) = assemble(&trees, &Options::new(init));
        (trees, changesets, issues)
    }

    fn describe(trees: &[RevisionTree], changesets: &Changesets) -> Vec<(String, Vec<String>)> {
        changesets
            .iter()
            .map(|changeset| {
                let members = changeset
                    .members
                    .iter()
                    .map(|m| {
                        let tree = &trees[m.file];
                        format!("{}@{}", tree.path(), tree.rev(m.rev).number)
                    })
                    .collect();
                (changeset.branch.clone(), members)
            })
            .collect()
    }

    #[test]
    fn test_window() {
        let (trees, changesets, issues) = run(
            vec![
                file("a").rev("1.1", 0, "init").rev("1.2", 1000, "fix").build(),
                file("b").rev("1.1", 200, "init").rev("1.2", 1400, "fix").build(),
                file("c").rev("1.1", 600, "init").build(),
            ],
            InitOptions::default(),
        );
        assert!(issues.is_empty());
        assert_eq!(
            describe(&trees, &changesets),
            [
                ("master".into(), vec!["a@1.1".into(), "b@1.1".into()]),
                ("master".into(), vec!["c@1.1".into()]),
                ("master".into(), vec!["a@1.2".into()]),
                ("master".into(), vec!["b@1.2".into()]),
            ],
        );
        // Latest member time by default.
        assert_eq!(changesets.get(0).time, 200);
    }

    #[test]
    fn test_commit_id_ignores_window() {
        let (_, changesets, _) = run(
            vec![
                file("a").rev("1.1", 0, "init").commit_id("abc").build(),
                file("b").rev("1.1", 5000, "init").commit_id("abc").build(),
                file("c").rev("1.1", 6000, "init").commit_id("xyz").build(),
            ],
            InitOptions {
                changeset_time: ChangesetTime::Earliest,
                ..InitOptions::default()
            },
        );
        assert_eq!(changesets.len(), 2);
        assert_eq!(changesets.get(0).members.len(), 2);
        assert_eq!(changesets.get(0).time, 0);
        assert_eq!(changesets.get(0).commit_id.as_deref(), Some("abc"));
    }

    #[test]
    fn test_authors_split() {
        let (_, changesets, _) = run(
            vec![
                file("a").rev_by("1.1", 0, "joe", "init").build(),
                file("b").rev_by("1.1", 0, "ann", "init").build(),
            ],
            InitOptions::default(),
        );
        assert_eq!(changesets.len(), 2);
    }

    #[test]
    fn test_interleaved_authors() {
        // Another author's commit in between closes the first one.
        let (trees, changesets, issues) = run(
            vec![
                file("a").rev_by("1.1", 0, "joe", "x").build(),
                file("b").rev_by("1.1", 5, "ann", "y").build(),
                file("c").rev_by("1.1", 10, "joe", "x").build(),
            ],
            InitOptions::default(),
        );
        assert!(issues.is_empty());
        assert_eq!(
            describe(&trees, &changesets),
            [
                ("master".into(), vec!["a@1.1".into()]),
                ("master".into(), vec!["b@1.1".into()]),
                ("master".into(), vec!["c@1.1".into()]),
            ],
        );
        let authors: Vec<_> = changesets.iter().map(|c| c.author.as_str()).collect();
        assert_eq!(authors, ["joe", "ann", "joe"]);
        assert_branch_times_ordered(&changesets);
    }

    #[test]
    fn test_other_line_does_not_close() {
        // Lines are grouped independently.
        let (trees, changesets, _) = run(
            vec![
                file("a").rev("1.1", 0, "init").build(),
                file("b")
                    .rev("1.1", 0, "init")
                    .rev("1.1.2.1", 5, "on branch")
                    .sym("B", "1.1.0.2")
                    .build(),
                file("c").rev("1.1", 10, "init").build(),
            ],
            InitOptions::default(),
        );
        assert_eq!(
            describe(&trees, &changesets),
            [
                ("master".into(), vec!["a@1.1".into(), "b@1.1".into(), "c@1.1".into()]),
                ("B".into(), vec!["b@1.1.2.1".into()]),
            ],
        );
    }

    #[test]
    fn test_import_not_interleaved() {
        // Both files only imported: their vendor revisions continue trunk.
        let (trees, changesets, _) = run(
            vec![
                file("a").rev("1.1", 0, "Initial revision").rev("1.1.1.1", 0, "import").build(),
                file("b").rev("1.1", 0, "Initial revision").rev("1.1.1.1", 0, "import").build(),
            ],
            InitOptions::default(),
        );
        assert_eq!(
            describe(&trees, &changesets),
            [
                ("master".into(), vec!["a@1.1".into(), "b@1.1".into()]),
                ("master".into(), vec!["a@1.1.1.1".into(), "b@1.1.1.1".into()]),
            ],
        );
    }

    #[test]
    fn test_repeated_file_splits() {
        let (trees, changesets, issues) = run(
            vec![
                file("a")
                    .rev("1.1", 0, "same")
                    .rev("1.2", 10, "same")
                    .build(),
            ],
            InitOptions::default(),
        );
        assert_eq!(changesets.len(), 2);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind(), "split-changeset");
        for changeset in changesets.iter() {
            assert_eq!(changeset.members.len(), 1);
            assert_eq!(trees[changeset.members[0].file].path(), "a");
        }
    }

    #[test]
    fn test_causality() {
        // b@1.2 would join the first "x" changeset by metadata, but its
        // parent b@1.1 landed in a later one.
        let (trees, changesets, _) = run(
            vec![
                file("a").rev("1.1", 0, "x").build(),
                file("b")
                    .rev("1.1", 10, "y")
                    .rev("1.2", 20, "x")
                    .build(),
            ],
            InitOptions::default(),
        );
        assert_eq!(
            describe(&trees, &changesets),
            [
                ("master".into(), vec!["a@1.1".into()]),
                ("master".into(), vec!["b@1.1".into()]),
                ("master".into(), vec!["b@1.2".into()]),
            ],
        );
    }

    #[test]
    fn test_half_trunk_half_branch() {
        let files = pathological_tags();

        let (trees, changesets, issues) = run(files.clone(), InitOptions::default());
        let straddle: Vec<_> = changesets
            .iter()
            .filter(|c| c.log == "Commit on trunk and branch B_MIXED.")
            .map(|c| {
                let m = c.members[0];
                (c.branch.clone(), trees[m.file].path().to_owned(), c.members.len())
            })
            .collect();
        assert_eq!(
            straddle,
            [
                ("master".into(), "sub2/default".into(), 1),
                ("B_MIXED".into(), "sub2/branch_B_MIXED_only".into(), 1),
            ],
        );
        let kinds: Vec<_> = issues.iter().map(|issue| issue.kind()).collect();
        assert_eq!(kinds, ["split-changeset"]);

        // Arrival order puts the branch side first (its path sorts first).
        let (_, changesets, _) = run(
            files,
            InitOptions {
                straddle_order: StraddleOrder::Arrival,
                ..InitOptions::default()
            },
        );
        let branches: Vec<_> = changesets
            .iter()
            .filter(|c| c.log == "Commit on trunk and branch B_MIXED.")
            .map(|c| c.branch.as_str())
            .collect();
        assert_eq!(branches, ["B_MIXED", "master"]);
    }

    #[test]
    fn test_pathological_sequence() {
        let (trees, changesets, _) = run(pathological_tags(), InitOptions::default());
        let summary: Vec<_> = changesets
            .iter()
            .map(|c| (c.branch.as_str(), c.members.len()))
            .collect();
        assert_eq!(
            summary,
            [
                ("master", 7),
                ("vendorbranch", 7),
                ("master", 2),
                ("master", 7),
                ("B_MIXED", 1),
                ("B_MIXED", 3),
                ("master", 1),
                ("B_MIXED", 1),
                ("B_SPLIT", 5),
                ("master", 1),
                ("B_SPLIT", 2),
            ],
        );

        // Per branch: increasing time, no file twice, parents first.
        for changeset in changesets.iter() {
            let mut files: Vec<_> = changeset.members.iter().map(|m| m.file).collect();
            files.dedup();
            assert_eq!(files.len(), changeset.members.len());
            for member in changeset.members.iter() {
                if let Some(parent) = trees[member.file].parent(member.rev) {
                    if let Some(parent_seq) = changesets.seq_of(member.file, parent) {
                        assert!(parent_seq < changeset.seq);
                    }
                }
            }
        }
        assert_branch_times_ordered(&changesets);
    }

    fn assert_branch_times_ordered(changesets: &Changesets) {
        let mut by_branch = BTreeMap::<&str, Vec<i64>>::new();
        for changeset in changesets.iter() {
            by_branch
                .entry(changeset.branch.as_str())
                .or_default()
                .push(changeset.time);
        }
        for (branch, times) in by_branch {
            assert!(
                times.windows(2).all(|w| w[0] <= w[1]),
                "times on {branch} go backwards: {times:?}",
            );
        }
    }

    #[test]
    fn test_branch_time_monotonic() {
        // Changesets on B are interleaved with trunk ones.
        let (_, changesets, _) = run(
            vec![
                file("a").rev("1.1", 0, "init").rev("1.2", 2000, "trunk").build(),
                file("b")
                    .rev("1.1", 0, "init")
                    .rev("1.1.2.1", 1000, "first")
                    .rev("1.1.2.2", 3000, "second")
                    .sym("B", "1.1.0.2")
                    .build(),
                file("c")
                    .rev("1.1", 0, "init")
                    .rev("1.1.2.1", 1500, "third")
                    .sym("B", "1.1.0.2")
                    .build(),
            ],
            InitOptions::default(),
        );
        let branches: Vec<_> = changesets.iter().map(|c| c.branch.as_str()).collect();
        assert_eq!(branches, ["master", "B", "B", "master", "B"]);
        assert_branch_times_ordered(&changesets);
    }
}
