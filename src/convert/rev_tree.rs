use std::collections::BTreeMap;

use smallvec::SmallVec;

use super::rev_number::RevNumber;
use crate::cvs::{RawFile, RawRevision};
use crate::term_out::ProgressPrint;

pub(crate) type RevId = usize;

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum MalformedHistoryError {
    BadNumber(String),
    NotARevision(RevNumber),
    DuplicateRevision(RevNumber),
    NoTrunk,
    Orphan(RevNumber),
}

impl std::fmt::Display for MalformedHistoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BadNumber(raw) => write!(f, "invalid revision number {raw:?}"),
            Self::NotARevision(number) => write!(f, "{number} is not a revision number"),
            Self::DuplicateRevision(number) => write!(f, "revision {number} appears twice"),
            Self::NoTrunk => write!(f, "no trunk revision"),
            Self::Orphan(number) => write!(f, "revision {number} has no parent revision"),
        }
    }
}

pub(crate) struct Revision {
    pub(crate) number: RevNumber,
    pub(crate) author: String,
    pub(crate) time: i64,
    pub(crate) log: String,
    pub(crate) commit_id: Option<String>,
    pub(crate) content: String,
    pub(crate) dead: bool,
    parent: Option<RevId>,
    children: SmallVec<[RevId; 2]>,
    line: usize,
}

/// A line of development within one file: the trunk or one branch number.
struct Line {
    number: Option<RevNumber>,
    /// `None` when the line was discarded.
    name: Option<String>,
    revs: Vec<RevId>,
    /// A vendor branch whose revisions continue the trunk.
    spliced: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum FileSymbol {
    /// A tag, `None` when the file lacks the tagged revision.
    Tag(Option<RevId>),
    Branch {
        number: RevNumber,
        sprout: Option<RevId>,
    },
}

/// The revision tree of one tracked path.
pub(crate) struct RevisionTree {
    path: String,
    executable: bool,
    revs: Vec<Revision>,
    lines: Vec<Line>,
    symbols: BTreeMap<String, FileSymbol>,
}

impl RevisionTree {
    pub(crate) fn build(raw: RawFile, trunk_name: &str) -> Result<Self, MalformedHistoryError> {
        let path = raw.path;

        let mut revs = Vec::with_capacity(raw.revs.len());
        for raw_rev in raw.revs {
            revs.push(make_revision(raw_rev)?);
        }
        revs.sort_by(|a, b| a.number.cmp(&b.number));
        if let Some(pair) = revs.windows(2).find(|pair| pair[0].number == pair[1].number) {
            return Err(MalformedHistoryError::DuplicateRevision(
                pair[0].number.clone(),
            ));
        }

        // Owning lines sort before the lines branching off them.
        let mut line_map = BTreeMap::<Option<RevNumber>, Vec<RevId>>::new();
        for (rev_id, rev) in revs.iter().enumerate() {
            line_map.entry(rev.number.branch()).or_default().push(rev_id);
        }
        if !line_map.contains_key(&None) {
            return Err(MalformedHistoryError::NoTrunk);
        }

        let mut lines = Vec::with_capacity(line_map.len());
        for (line_i, (number, line_revs)) in line_map.into_iter().enumerate() {
            for (i, &rev_id) in line_revs.iter().enumerate() {
                revs[rev_id].line = line_i;
                if i != 0 {
                    revs[rev_id].parent = Some(line_revs[i - 1]);
                }
            }

            if let Some(ref branch) = number {
                let first = line_revs[0];
                let sprout = find_sprout(&revs, branch)
                    .ok_or_else(|| MalformedHistoryError::Orphan(revs[first].number.clone()))?;
                revs[first].parent = Some(sprout);
            }

            lines.push(Line {
                number,
                name: None,
                revs: line_revs,
                spliced: false,
            });
        }

        for rev_id in 0..revs.len() {
            if let Some(parent) = revs[rev_id].parent {
                revs[parent].children.push(rev_id);
            }
        }

        for line in lines.iter() {
            fix_line_dates(&path, &mut revs, &line.revs);
        }

        let mut symbols = BTreeMap::new();
        for (name, raw_number) in raw.symbols {
            let Ok(number) = RevNumber::parse(&raw_number) else {
                tracing::warn!("{path}: symbol {name} has invalid number {raw_number:?}, ignoring");
                continue;
            };
            let symbol = if let Some(branch) = number.to_branch() {
                FileSymbol::Branch {
                    sprout: find_sprout(&revs, &branch),
                    number: branch,
                }
            } else if number.is_revision() {
                FileSymbol::Tag(find_rev(&revs, &number))
            } else {
                tracing::warn!("{path}: symbol {name} has invalid number {number}, ignoring");
                continue;
            };
            if symbols.insert(name.clone(), symbol).is_some() {
                tracing::warn!("{path}: symbol {name} defined more than once, keeping the last");
            }
        }

        let mut unnamed = Vec::new();
        for line_i in 0..lines.len() {
            let Some(ref line_number) = lines[line_i].number else {
                lines[line_i].name = Some(trunk_name.to_owned());
                continue;
            };

            let mut names = symbols.iter().filter_map(|(name, symbol)| match symbol {
                FileSymbol::Branch { number, .. } if number == line_number && name != trunk_name => {
                    Some(name.as_str())
                }
                _ => None,
            });

            let first_rev = &revs[lines[line_i].revs[0]];
            let name = if let Some(first_name) = names.next() {
                for alias in names {
                    tracing::warn!(
                        "{path}: branch {alias} is an alias of {first_name} ({line_number})",
                    );
                }
                if line_number.is_vendor_branch() {
                    tracing::debug!("{path}: {first_name} ({line_number}) is a vendor branch");
                }
                first_name.to_owned()
            } else if lines[line_i].revs.iter().all(|&rev_id| revs[rev_id].dead) {
                tracing::warn!("{path}: discarding dead untagged branch {line_number}");
                continue;
            } else {
                // Branch lines without a sprout were rejected as orphans.
                let Some(sprout) = first_rev.parent else {
                    return Err(MalformedHistoryError::Orphan(first_rev.number.clone()));
                };
                let parent_name = lines[revs[sprout].line]
                    .name
                    .as_deref()
                    .unwrap_or(trunk_name);
                let name = if line_number.is_vendor_branch() {
                    format!("import-{line_number}")
                } else {
                    match first_rev.commit_id {
                        Some(ref commit_id) => {
                            format!("{parent_name}-UNNAMED-BRANCH-{commit_id}")
                        }
                        None => format!("{parent_name}-UNNAMED-BRANCH"),
                    }
                };
                tracing::warn!(
                    "{path}: putting revision {} on unnamed branch {name} off {parent_name}",
                    first_rev.number,
                );
                unnamed.push((name.clone(), line_number.clone(), sprout));
                name
            };
            lines[line_i].name = Some(name);
        }
        for (name, number, sprout) in unnamed {
            symbols.entry(name).or_insert(FileSymbol::Branch {
                number,
                sprout: Some(sprout),
            });
        }

        splice_vendor_branch(&path, trunk_name, &revs, &mut lines, &mut symbols);

        let tree = Self {
            path,
            executable: raw.executable,
            revs,
            lines,
            symbols,
        };
        if cfg!(debug_assertions) {
            tree.check_leaf_paths();
        }
        Ok(tree)
    }

    /// Every leaf reaches a trunk root through strictly older numbers.
    fn check_leaf_paths(&self) {
        for (rev_id, _) in self.revs() {
            if !self.children(rev_id).is_empty() {
                continue;
            }
            let path = self.path_to_root(rev_id);
            debug_assert!(
                path.last()
                    .is_some_and(|&root| self.revs[root].number.is_trunk())
            );
            debug_assert!(
                path.windows(2)
                    .all(|pair| self.revs[pair[1]].number < self.revs[pair[0]].number)
            );
        }
    }

    #[inline]
    pub(crate) fn path(&self) -> &str {
        &self.path
    }

    #[inline]
    pub(crate) fn executable(&self) -> bool {
        self.executable
    }

    #[inline]
    pub(crate) fn rev(&self, rev_id: RevId) -> &Revision {
        &self.revs[rev_id]
    }

    pub(crate) fn revs(&self) -> impl Iterator<Item = (RevId, &Revision)> {
        self.revs.iter().enumerate()
    }

    pub(crate) fn get(&self, number: &RevNumber) -> Option<RevId> {
        find_rev(&self.revs, number)
    }

    #[inline]
    pub(crate) fn parent(&self, rev_id: RevId) -> Option<RevId> {
        self.revs[rev_id].parent
    }

    #[inline]
    pub(crate) fn children(&self, rev_id: RevId) -> &[RevId] {
        &self.revs[rev_id].children
    }

    #[inline]
    pub(crate) fn is_live(&self, rev_id: RevId) -> bool {
        !self.revs[rev_id].dead
    }

    /// Revisions from `rev_id` up to the root, `rev_id` first.
    pub(crate) fn path_to_root(&self, rev_id: RevId) -> Vec<RevId> {
        let mut path = vec![rev_id];
        let mut current = rev_id;
        while let Some(parent) = self.revs[current].parent {
            path.push(parent);
            current = parent;
        }
        path
    }

    /// Symbols attached directly to a revision: tags naming it and
    /// branches sprouting from it.
    pub(crate) fn symbols_at(&self, rev_id: RevId) -> Vec<&str> {
        self.symbols
            .iter()
            .filter(|(_, symbol)| match symbol {
                FileSymbol::Tag(target) => *target == Some(rev_id),
                FileSymbol::Branch { sprout, .. } => *sprout == Some(rev_id),
            })
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub(crate) fn symbol(&self, name: &str) -> Option<&FileSymbol> {
        self.symbols.get(name)
    }

    pub(crate) fn symbols(&self) -> impl Iterator<Item = (&str, &FileSymbol)> {
        self.symbols.iter().map(|(name, symbol)| (name.as_str(), symbol))
    }

    /// Name of the line a revision lives on, `None` if that line was
    /// discarded.
    pub(crate) fn line_name(&self, rev_id: RevId) -> Option<&str> {
        self.lines[self.revs[rev_id].line].name.as_deref()
    }

    /// Name of the line with branch number `number`. Aliased branches
    /// share the line of the first name. A vendor branch spliced into the
    /// trunk has no line of its own.
    pub(crate) fn branch_line_name(&self, number: &RevNumber) -> Option<&str> {
        self.lines
            .iter()
            .find(|line| line.number.as_ref() == Some(number))
            .filter(|line| !line.spliced)
            .and_then(|line| line.name.as_deref())
    }

    /// Whether a revision changes the file at all. A dead revision that
    /// follows nothing or another dead revision does not.
    pub(crate) fn is_effective(&self, rev_id: RevId) -> bool {
        let rev = &self.revs[rev_id];
        if self.line_name(rev_id).is_none() {
            return false;
        }
        if !rev.dead {
            return true;
        }
        match rev.parent {
            Some(parent) => !self.revs[parent].dead,
            None => false,
        }
    }
}

fn make_revision(raw: RawRevision) -> Result<Revision, MalformedHistoryError> {
    let number = RevNumber::parse(&raw.number)
        .map_err(|_| MalformedHistoryError::BadNumber(raw.number.clone()))?;
    if !number.is_revision() {
        return Err(MalformedHistoryError::NotARevision(number));
    }
    Ok(Revision {
        number,
        author: raw.author,
        time: raw.time,
        log: raw.log,
        commit_id: raw.commit_id,
        content: raw.content,
        dead: raw.dead,
        parent: None,
        children: SmallVec::new(),
        line: 0,
    })
}

fn find_rev(revs: &[Revision], number: &RevNumber) -> Option<RevId> {
    revs.binary_search_by(|rev| rev.number.cmp(number)).ok()
}

/// Finds the revision `branch` grows from: its branch point, or the
/// nearest older revision on the owning line when the branch point itself
/// is missing.
fn find_sprout(revs: &[Revision], branch: &RevNumber) -> Option<RevId> {
    let point = branch.branch_point()?;
    if let Some(rev_id) = find_rev(revs, &point) {
        return Some(rev_id);
    }
    let owning_line = point.branch();
    revs.iter()
        .enumerate()
        .rev()
        .find(|(_, rev)| rev.number < point && rev.number.branch() == owning_line)
        .map(|(rev_id, _)| rev_id)
}

/// When the trunk never got past its first revision and a vendor branch
/// grows from it, the vendor revisions become the trunk history. Branch
/// symbols naming the vendor branch then sprout from its tip.
fn splice_vendor_branch(
    path: &str,
    trunk_name: &str,
    revs: &[Revision],
    lines: &mut [Line],
    symbols: &mut BTreeMap<String, FileSymbol>,
) {
    let [trunk_rev] = lines[0].revs[..] else {
        return;
    };
    let Some(vendor_i) = lines.iter().position(|line| {
        line.name.is_some()
            && line.number.as_ref().is_some_and(RevNumber::is_vendor_branch)
            && line.revs.first().is_some_and(|&first| revs[first].parent == Some(trunk_rev))
    }) else {
        return;
    };
    let vendor = &mut lines[vendor_i];
    let Some(&tip) = vendor.revs.last() else {
        return;
    };

    tracing::debug!(
        "{path}: trunk continues on vendor branch {} up to {}",
        vendor.name.as_deref().unwrap_or_default(),
        revs[tip].number,
    );
    for symbol in symbols.values_mut() {
        if let FileSymbol::Branch { number, sprout } = symbol {
            if vendor.number.as_ref() == Some(&*number) {
                *sprout = Some(tip);
            }
        }
    }
    vendor.name = Some(trunk_name.to_owned());
    vendor.spliced = true;
}

/// Makes timestamps non-decreasing along one line, walking from the
/// newest revision back.
fn fix_line_dates(path: &str, revs: &mut [Revision], line: &[RevId]) {
    for i in (1..line.len()).rev() {
        let parent = line[i - 1];
        let child = line[i];
        if revs[parent].time <= revs[child].time {
            continue;
        }

        let grandchild = line.get(i + 1).copied();
        if grandchild.is_some_and(|grandchild| revs[parent].time <= revs[grandchild].time) {
            tracing::warn!(
                "{path}: revision {} is older than {}, moving its date forward",
                revs[child].number,
                revs[parent].number,
            );
            revs[child].time = revs[parent].time;
        } else {
            tracing::warn!(
                "{path}: revision {} is newer than {}, moving its date back",
                revs[parent].number,
                revs[child].number,
            );
            revs[parent].time = revs[child].time;
        }
    }
}

/// Builds the revision trees of all files on `jobs` worker threads.
/// Results come back in input order.
pub(super) fn build_all(
    progress_print: &ProgressPrint,
    files: Vec<RawFile>,
    trunk_name: &str,
    jobs: usize,
) -> Vec<(String, Result<RevisionTree, MalformedHistoryError>)> {
    let total = files.len();
    let paths: Vec<String> = files.iter().map(|file| file.path.clone()).collect();
    let queue = std::sync::Mutex::new(files.into_iter().enumerate());
    let done = std::sync::atomic::AtomicUsize::new(0);

    let mut results: Vec<(usize, Result<RevisionTree, MalformedHistoryError>)> =
        std::thread::scope(|scope| {
            let workers: Vec<_> = (0..jobs.max(1))
                .map(|_| {
                    scope.spawn(|| {
                        let mut out = Vec::new();
                        loop {
                            let next = queue.lock().unwrap_or_else(|e| e.into_inner()).next();
                            let Some((i, file)) = next else {
                                break;
                            };
                            out.push((i, RevisionTree::build(file, trunk_name)));

                            let n = done.fetch_add(1, std::sync::atomic::Ordering::Relaxed) + 1;
                            progress_print.set_progress(format!("reading files - {n} / {total}"));
                        }
                        out
                    })
                })
                .collect();

            workers
                .into_iter()
                .flat_map(|worker| match worker.join() {
                    Ok(out) => out,
                    Err(panic) => std::panic::resume_unwind(panic),
                })
                .collect()
        });

    results.sort_by_key(|(i, _)| *i);
    results
        .into_iter()
        .map(|(i, result)| (paths[i].clone(), result))
        .collect()
}
