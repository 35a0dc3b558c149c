use std::io::Write as _;

use crate::FHashMap;
use crate::convert::materialize::TreeSnapshot;
use crate::convert::rev_tree::RevId;
use crate::convert::symbols::{FileId, Target};
use crate::convert::topology::BranchStep;
use crate::convert::{CommitSource, ConvertError, GitMetaMaker, GitSignature, Lifted, Options};
use crate::term_out::ProgressPrint;

#[derive(Debug)]
pub(crate) enum ExportError {
    CreateFile {
        path: std::path::PathBuf,
        error: std::io::Error,
    },
    Write(std::io::Error),
    CommitMeta {
        branch: String,
        error: String,
    },
}

impl From<std::io::Error> for ExportError {
    fn from(error: std::io::Error) -> Self {
        Self::Write(error)
    }
}

impl std::fmt::Display for ExportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Self::CreateFile {
                ref path,
                ref error,
            } => write!(f, "failed to create file {path:?}: {error}"),
            Self::Write(ref error) => write!(f, "failed to write stream: {error}"),
            Self::CommitMeta {
                ref branch,
                ref error,
            } => write!(f, "failed to make commit metadata on {branch}: {error}"),
        }
    }
}

pub(crate) fn export_to_file(
    progress_print: &ProgressPrint,
    options: &Options,
    lifted: &Lifted,
    meta_maker: &dyn GitMetaMaker,
    dst_path: &std::path::Path,
) -> Result<(), ConvertError> {
    let result = std::fs::File::create(dst_path)
        .map_err(|error| ExportError::CreateFile {
            path: dst_path.to_path_buf(),
            error,
        })
        .and_then(|file| {
            let mut out = std::io::BufWriter::new(file);
            export(progress_print, options, lifted, meta_maker, &mut out)?;
            out.flush()?;
            Ok(())
        });

    result.map_err(|e| {
        tracing::error!("failed to export to {dst_path:?}: {e}");
        ConvertError
    })?;
    tracing::info!("wrote fast-import stream to {dst_path:?}");
    Ok(())
}

/// Writes the lifted history as a `git fast-import` stream.
pub(crate) fn export(
    progress_print: &ProgressPrint,
    options: &Options,
    lifted: &Lifted,
    meta_maker: &dyn GitMetaMaker,
    out: &mut dyn std::io::Write,
) -> Result<(), ExportError> {
    let nodes = lifted.topology.nodes();

    let branch_names: Vec<String> = nodes
        .iter()
        .map(|node| options.rename_branches.rename(&node.name).into_owned())
        .collect();
    let branch_refs = super::assign_ref_names("branch", &branch_names);

    let tags: Vec<_> = lifted.symbols.tags().collect();
    let tag_names: Vec<String> = tags
        .iter()
        .map(|tag| options.rename_tags.rename(&tag.name).into_owned())
        .collect();
    let tag_refs = super::assign_ref_names("tag", &tag_names);

    let mut exporter = Exporter {
        lifted,
        meta_maker,
        out,
        next_mark: 1,
        blob_marks: FHashMap::default(),
        branch_marks: Vec::with_capacity(nodes.len()),
    };

    let total = nodes.len() + tags.len();
    for (node_i, git_name) in branch_refs.iter().enumerate() {
        progress_print.set_progress(format!("exporting - {} / {total}", node_i + 1));
        exporter.export_branch(node_i, git_name)?;
    }
    for (tag_i, (tag, git_name)) in tags.iter().zip(tag_refs.iter()).enumerate() {
        progress_print.set_progress(format!(
            "exporting - {} / {total}",
            nodes.len() + tag_i + 1,
        ));
        exporter.export_tag(&tag.name, git_name)?;
    }

    exporter.out.write_all(b"done\n")?;
    Ok(())
}

struct Exporter<'a> {
    lifted: &'a Lifted,
    meta_maker: &'a dyn GitMetaMaker,
    out: &'a mut dyn std::io::Write,
    next_mark: u64,
    blob_marks: FHashMap<(FileId, RevId), u64>,
    /// Per branch node, the commit mark after each position, sorted.
    branch_marks: Vec<Vec<(usize, u64)>>,
}

enum FileChange {
    Modify(FileId, RevId),
    Delete(FileId),
}

impl Exporter<'_> {
    fn new_mark(&mut self) -> u64 {
        let mark = self.next_mark;
        self.next_mark += 1;
        mark
    }

    fn mark_at(&self, node_i: usize, point: usize) -> Option<u64> {
        let marks = &self.branch_marks[node_i];
        let i = marks.partition_point(|&(pos, _)| pos <= point);
        i.checked_sub(1).map(|i| marks[i].1)
    }

    fn export_branch(&mut self, node_i: usize, git_name: &str) -> Result<(), ExportError> {
        let lifted = self.lifted;
        let node = &lifted.topology.nodes()[node_i];
        let materializer = lifted.materializer();
        let ref_name = format!("refs/heads/{git_name}");

        // Aliased branches share the commits of the first one.
        let twin = lifted.topology.nodes()[..node_i].iter().position(|other| {
            other.parent == node.parent
                && other.branch_point == node.branch_point
                && other.initial == node.initial
                && other.steps == node.steps
        });
        if let Some(twin_i) = twin {
            let marks = self.branch_marks[twin_i].clone();
            if let Some(&(_, mark)) = marks.last() {
                write!(self.out, "reset {ref_name}\nfrom :{mark}\n\n")?;
            }
            self.branch_marks.push(marks);
            return Ok(());
        }

        let mut marks = Vec::new();
        let mut tree = TreeSnapshot::default();
        for &member in node.initial.iter() {
            tree.apply(&lifted.trees, member);
        }

        let mut from = None;
        if let (Some(parent_i), Some(branch_point)) = (node.parent, node.branch_point) {
            let base = self.mark_at(parent_i, branch_point);
            let parent_tree =
                materializer.branch_snapshot(&lifted.topology.nodes()[parent_i], branch_point);

            if base.is_some() && parent_tree == tree {
                from = base;
                marks.extend(base.map(|mark| (branch_point, mark)));
            } else if base.is_some() || !tree.is_empty() {
                tracing::debug!("branch {} needs a creation commit", node.name);
                let changes = tree
                    .iter()
                    .map(|m| FileChange::Modify(m.file, m.rev))
                    .collect::<Vec<_>>();
                let log = format!("Create branch {}.", node.name);
                let source = CommitSource {
                    author: None,
                    log: &log,
                    commit_id: None,
                    branch: &node.name,
                    time: lifted.changesets.get(branch_point).time,
                };
                let mark = self.write_commit(&ref_name, &source, base, true, &changes)?;
                marks.push((branch_point, mark));
            }
        }

        if node.steps.is_empty() {
            if let Some(mark) = from {
                write!(self.out, "reset {ref_name}\nfrom :{mark}\n\n")?;
            }
        }

        for step in node.steps.iter() {
            let (members, source) = match *step {
                BranchStep::Commit(seq) => {
                    let changeset = lifted.changesets.get(seq);
                    (
                        changeset.members.as_slice(),
                        CommitSource {
                            author: Some(&changeset.author),
                            log: &changeset.log,
                            commit_id: changeset.commit_id.as_deref(),
                            branch: &node.name,
                            time: changeset.time,
                        },
                    )
                }
                BranchStep::Rejoin { after, ref members } => (
                    members.as_slice(),
                    CommitSource {
                        author: None,
                        log: "Add files branched after the first commit on this branch.",
                        commit_id: None,
                        branch: &node.name,
                        time: lifted.changesets.get(after).time,
                    },
                ),
            };

            let mut changes = Vec::with_capacity(members.len());
            for &member in members.iter() {
                if lifted.trees[member.file].is_live(member.rev) {
                    changes.push(FileChange::Modify(member.file, member.rev));
                } else if tree.get(member.file).is_some() {
                    changes.push(FileChange::Delete(member.file));
                }
                tree.apply(&lifted.trees, member);
            }

            let mark = self.write_commit(&ref_name, &source, from.take(), false, &changes)?;
            marks.push((step.position(), mark));
        }

        self.branch_marks.push(marks);
        Ok(())
    }

    fn export_tag(&mut self, name: &str, git_name: &str) -> Result<(), ExportError> {
        let lifted = self.lifted;
        let materializer = lifted.materializer();
        let ref_name = format!("refs/tags/{git_name}");

        let tree = match materializer.snapshot(name) {
            Ok(tree) => tree,
            Err(e) => {
                tracing::warn!("skipping tag {name}: {e}");
                return Ok(());
            }
        };
        if tree.is_empty() {
            tracing::warn!("skipping tag {name}: it has no files");
            return Ok(());
        }

        // The tag goes where most of its revisions live.
        let Ok(symbol) = lifted.symbols.get(name) else {
            return Ok(());
        };
        let mut votes = FHashMap::<&str, usize>::default();
        let mut max_seq = None::<usize>;
        let mut max_time = i64::MIN;
        for (file, target) in symbol.targets() {
            let Target::Revision(rev) = *target else {
                continue;
            };
            let file_tree = &lifted.trees[file];
            if let Some(line) = file_tree.line_name(rev) {
                *votes.entry(line).or_default() += 1;
            }
            if let Some(seq) = lifted.changesets.seq_of(file, rev) {
                max_seq = Some(max_seq.map_or(seq, |max| max.max(seq)));
            }
            max_time = max_time.max(file_tree.rev(rev).time);
        }
        let home = votes
            .into_iter()
            .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(a.0)))
            .and_then(|(line, _)| lifted.topology.node_index(line))
            .unwrap_or(0);
        let home_node = &lifted.topology.nodes()[home];

        let base = max_seq.and_then(|seq| {
            let mark = self.mark_at(home, seq)?;
            Some((mark, materializer.branch_snapshot(home_node, seq)))
        });

        match base {
            Some((mark, ref base_tree)) if *base_tree == tree => {
                write!(self.out, "reset {ref_name}\nfrom :{mark}\n\n")?;
            }
            _ => {
                tracing::debug!("tag {name} needs a fixup commit");
                let changes = tree
                    .iter()
                    .map(|m| FileChange::Modify(m.file, m.rev))
                    .collect::<Vec<_>>();
                let log = format!("Create tag {name}.");
                let source = CommitSource {
                    author: None,
                    log: &log,
                    commit_id: None,
                    branch: &home_node.name,
                    time: max_time,
                };
                self.write_commit(&ref_name, &source, base.map(|(mark, _)| mark), true, &changes)?;
            }
        }

        Ok(())
    }

    fn write_blob(&mut self, file: FileId, rev: RevId) -> Result<u64, ExportError> {
        if let Some(&mark) = self.blob_marks.get(&(file, rev)) {
            return Ok(mark);
        }
        let mark = self.new_mark();
        let content = self.lifted.trees[file].rev(rev).content.as_bytes();
        writeln!(self.out, "blob\nmark :{mark}\ndata {}", content.len())?;
        self.out.write_all(content)?;
        self.out.write_all(b"\n")?;
        self.blob_marks.insert((file, rev), mark);
        Ok(mark)
    }

    fn write_commit(
        &mut self,
        ref_name: &str,
        source: &CommitSource<'_>,
        from: Option<u64>,
        delete_all: bool,
        changes: &[FileChange],
    ) -> Result<u64, ExportError> {
        let meta = self
            .meta_maker
            .make_git_commit_meta(source)
            .map_err(|error| ExportError::CommitMeta {
                branch: source.branch.into(),
                error,
            })?;

        let mut blobs = Vec::with_capacity(changes.len());
        for change in changes.iter() {
            if let FileChange::Modify(file, rev) = *change {
                blobs.push(self.write_blob(file, rev)?);
            }
        }

        let mark = self.new_mark();
        writeln!(self.out, "commit {ref_name}\nmark :{mark}")?;
        write_ident(self.out, "author", &meta.author)?;
        write_ident(self.out, "committer", &meta.committer)?;
        writeln!(self.out, "data {}", meta.message.len())?;
        self.out.write_all(meta.message.as_bytes())?;
        self.out.write_all(b"\n")?;
        if let Some(from) = from {
            writeln!(self.out, "from :{from}")?;
        }
        if delete_all {
            self.out.write_all(b"deleteall\n")?;
        }

        let mut blobs = blobs.into_iter();
        for change in changes.iter() {
            match *change {
                FileChange::Modify(file, _) => {
                    let tree = &self.lifted.trees[file];
                    let mode = if tree.executable() { "100755" } else { "100644" };
                    let blob = blobs.next().unwrap_or_default();
                    writeln!(self.out, "M {mode} :{blob} {}", quote_path(&git_path(tree.path())))?;
                }
                FileChange::Delete(file) => {
                    let path = git_path(self.lifted.trees[file].path());
                    writeln!(self.out, "D {}", quote_path(&path))?;
                }
            }
        }
        self.out.write_all(b"\n")?;

        Ok(mark)
    }
}

fn write_ident(
    out: &mut dyn std::io::Write,
    role: &str,
    signature: &GitSignature,
) -> std::io::Result<()> {
    writeln!(
        out,
        "{role} {} <{}> {} +0000",
        signature.name, signature.email, signature.time,
    )
}

/// CVS ignore files become git ignore files.
fn git_path(path: &str) -> std::borrow::Cow<'_, str> {
    match path.rsplit_once('/') {
        Some((dir, ".cvsignore")) => format!("{dir}/.gitignore").into(),
        None if path == ".cvsignore" => ".gitignore".into(),
        _ => path.into(),
    }
}

fn quote_path(path: &str) -> std::borrow::Cow<'_, str> {
    if !path.starts_with('"') && !path.contains(['\n', '\\']) {
        return path.into();
    }
    let mut quoted = String::with_capacity(path.len() + 2);
    quoted.push('"');
    for chr in path.chars() {
        match chr {
            '"' => quoted.push_str("\\\""),
            '\\' => quoted.push_str("\\\\"),
            '\n' => quoted.push_str("\\n"),
            _ => quoted.push(chr),
        }
    }
    quoted.push('"');
    quoted.into()
}

#[cfg(test)]
mod tests {
    use super::{export, git_path, quote_path};
    use crate::convert::test_utils::file;
    use crate::convert::{
        CommitSource, GitCommitMeta, GitMetaMaker, GitSignature, InitOptions, Lifted, Options,
        lift,
    };
    use crate::term_out::ProgressPrint;

    struct PlainMeta;

    impl GitMetaMaker for PlainMeta {
        fn make_git_commit_meta(
            &self,
            source: &CommitSource<'_>,
        ) -> Result<GitCommitMeta, String> {
            let name = source.author.unwrap_or("cvs2git");
            let signature = || GitSignature {
                name: name.into(),
                email: format!("{name}@example.com"),
                time: source.time,
            };
            Ok(GitCommitMeta {
                author: signature(),
                committer: signature(),
                message: source.log.into(),
            })
        }
    }

    fn export_files(files: Vec<crate::cvs::RawFile>) -> String {
        let options = Options::new(InitOptions::default());
        let progress_print = ProgressPrint::silent();
        let lifted: Lifted =
            lift(&progress_print, &options, files).unwrap_or_else(|_| panic!("lift failed"));
        let mut out = Vec::new();
        export(&progress_print, &options, &lifted, &PlainMeta, &mut out)
            .unwrap_or_else(|e| panic!("{e}"));
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_linear_with_tag() {
        let stream = export_files(vec![
            file("a")
                .rev("1.1", 0, "init")
                .rev("1.2", 1000, "second")
                .sym("T", "1.1")
                .build(),
            file("b").rev("1.1", 0, "init").sym("T", "1.1").build(),
        ]);
        assert_eq!(
            stream,
            concat!(
                "blob\nmark :1\ndata 6\na 1.1\n\n",
                "blob\nmark :2\ndata 6\nb 1.1\n\n",
                "commit refs/heads/master\nmark :3\n",
                "author joe <joe@example.com> 0 +0000\n",
                "committer joe <joe@example.com> 0 +0000\n",
                "data 4\ninit\n",
                "M 100644 :1 a\nM 100644 :2 b\n\n",
                "blob\nmark :4\ndata 6\na 1.2\n\n",
                "commit refs/heads/master\nmark :5\n",
                "author joe <joe@example.com> 1000 +0000\n",
                "committer joe <joe@example.com> 1000 +0000\n",
                "data 6\nsecond\n",
                "M 100644 :4 a\n\n",
                "reset refs/tags/T\nfrom :3\n\n",
                "done\n",
            ),
        );
    }

    #[test]
    fn test_branch_from_trunk() {
        let stream = export_files(vec![
            file("a")
                .rev("1.1", 0, "init")
                .rev("1.1.2.1", 100, "on branch")
                .sym("B", "1.1.0.2")
                .build(),
            file("b").rev("1.1", 0, "init").sym("B", "1.1.0.2").build(),
        ]);
        assert!(stream.contains(concat!(
            "blob\nmark :4\ndata 10\na 1.1.2.1\n\n",
            "commit refs/heads/B\nmark :5\n",
        )));
        assert!(stream.contains("data 9\non branch\nfrom :3\nM 100644 :4 a\n\n"));
        assert!(!stream.contains("deleteall"));
    }

    #[test]
    fn test_tag_fixup_commit() {
        let stream = export_files(vec![
            file("a")
                .rev("1.1", 0, "init")
                .rev("1.2", 1000, "second")
                .sym("T", "1.2")
                .build(),
            file("b")
                .rev("1.1", 0, "init")
                .rev("1.2", 1000, "second")
                .sym("T", "1.1")
                .build(),
        ]);
        assert!(stream.contains("commit refs/tags/T\n"));
        assert!(stream.contains("data 13\nCreate tag T.\nfrom :6\ndeleteall\n"));
        assert!(stream.contains("M 100644 :4 a\nM 100644 :2 b\n\n"));
        assert!(!stream.contains("reset refs/tags/T"));
    }

    #[test]
    fn test_aliased_branches_share_commits() {
        let stream = export_files(vec![
            file("a")
                .rev("1.1", 0, "init")
                .rev("1.1.2.1", 100, "on branch")
                .sym("ALIAS_A", "1.1.0.2")
                .sym("ALIAS_B", "1.1.0.2")
                .build(),
        ]);
        assert_eq!(stream.matches("data 9\non branch\n").count(), 1);
        assert!(stream.contains("commit refs/heads/ALIAS_A\nmark :4\n"));
        assert!(stream.contains("reset refs/heads/ALIAS_B\nfrom :4\n\n"));
    }

    #[test]
    fn test_deletion() {
        let stream = export_files(vec![
            file("a").rev("1.1", 0, "init").dead("1.2", 1000, "remove").build(),
            file("b").rev("1.1", 0, "init").build(),
        ]);
        assert!(stream.contains("data 6\nremove\nD a\n\n"));
    }

    #[test]
    fn test_paths() {
        assert_eq!(git_path(".cvsignore"), ".gitignore");
        assert_eq!(git_path("src/.cvsignore"), "src/.gitignore");
        assert_eq!(git_path("src/x.cvsignore"), "src/x.cvsignore");
        assert_eq!(quote_path("plain/path"), "plain/path");
        assert_eq!(quote_path("\"q"), "\"\\\"q\"");
        assert_eq!(quote_path("a\nb"), "\"a\\nb\"");
        assert_eq!(quote_path("a\\b"), "\"a\\\\b\"");
    }
}
