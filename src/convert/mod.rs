use crate::term_out::ProgressPrint;
use crate::{cvs, git, report};

pub(crate) mod changesets;
pub(crate) mod ledger;
pub(crate) mod materialize;
mod options;
pub(crate) mod rev_number;
pub(crate) mod rev_tree;
pub(crate) mod symbols;
#[cfg(test)]
pub(crate) mod test_utils;
pub(crate) mod topology;

pub(crate) use options::{ChangesetTime, InitOptions, Options, StraddleOrder};

pub(crate) struct ConvertError;

pub(crate) struct GitSignature {
    pub(crate) name: String,
    pub(crate) email: String,
    /// Seconds since the Unix epoch, UTC.
    pub(crate) time: i64,
}

pub(crate) struct GitCommitMeta {
    pub(crate) author: GitSignature,
    pub(crate) committer: GitSignature,
    pub(crate) message: String,
}

/// What a git commit is made from. Synthetic commits (branch creation,
/// rejoined files, tag fixups) have no CVS author.
pub(crate) struct CommitSource<'a> {
    pub(crate) author: Option<&'a str>,
    pub(crate) log: &'a str,
    pub(crate) commit_id: Option<&'a str>,
    pub(crate) branch: &'a str,
    pub(crate) time: i64,
}

pub(crate) trait GitMetaMaker {
    fn make_git_commit_meta(&self, source: &CommitSource<'_>) -> Result<GitCommitMeta, String>;
}

/// The lifted history: per-file trees, symbols, changesets and the
/// branch DAG, plus every issue found on the way.
pub(crate) struct Lifted {
    /// Sorted by path; indexes are `FileId`s.
    pub(crate) trees: Vec<rev_tree::RevisionTree>,
    pub(crate) symbols: symbols::SymbolTable,
    pub(crate) changesets: changesets::Changesets,
    pub(crate) topology: topology::Topology,
    pub(crate) ledger: ledger::Ledger,
}

impl Lifted {
    pub(crate) fn materializer(&self) -> materialize::TreeMaterializer<'_> {
        materialize::TreeMaterializer::new(
            &self.trees,
            &self.symbols,
            &self.changesets,
            &self.topology,
        )
    }
}

pub(crate) fn lift(
    progress_print: &ProgressPrint,
    options: &Options,
    mut files: Vec<cvs::RawFile>,
) -> Result<Lifted, ConvertError> {
    files.sort_by(|a, b| a.path.cmp(&b.path));

    let mut ledger = ledger::Ledger::new();

    progress_print.set_progress("reading files".into());
    let built = rev_tree::build_all(progress_print, files, options.trunk_name(), options.jobs);
    let mut trees = Vec::with_capacity(built.len());
    for (path, result) in built {
        match result {
            Ok(tree) => trees.push(tree),
            Err(error) => ledger.record(ledger::Issue::MalformedHistory { path, error }),
        }
    }
    tracing::info!("read {} files", trees.len());

    progress_print.set_progress("resolving symbols".into());
    let symbols = symbols::SymbolTable::build(&trees, options.trunk_name(), &mut ledger);

    progress_print.set_progress("assembling changesets".into());
    let (changesets, issues) = changesets::assemble(&trees, options);
    ledger.extend(issues);
    tracing::info!("assembled {} changesets", changesets.len());

    progress_print.set_progress("resolving branches".into());
    let (topology, issues) = topology::resolve(&trees, &symbols, &changesets, options);
    ledger.extend(issues);
    tracing::info!("resolved {} branches", topology.nodes().len());

    let resolved = topology
        .nodes()
        .iter()
        .any(|node| !node.steps.is_empty() || !node.initial.is_empty());
    if !resolved {
        tracing::error!("no branch resolved to any revision, nothing to lift");
        return Err(ConvertError);
    }
    if topology.trunk().steps.is_empty() {
        tracing::warn!("no revisions on {}", options.trunk_name());
    }

    Ok(Lifted {
        trees,
        symbols,
        changesets,
        topology,
        ledger,
    })
}

pub(crate) fn convert(
    progress_print: &ProgressPrint,
    options: &Options,
    meta_maker: &dyn GitMetaMaker,
    src_path: &std::path::Path,
    report_path: Option<&std::path::Path>,
    dst_path: Option<&std::path::Path>,
    show: &[String],
) -> Result<(), ConvertError> {
    progress_print.set_progress("loading history".into());
    let files = cvs::load_history(src_path).map_err(|e| {
        tracing::error!("failed to load {src_path:?}: {e}");
        ConvertError
    })?;
    tracing::info!("loaded {} files from {src_path:?}", files.len());

    let lifted = lift(progress_print, options, files)?;

    if let Some(report_path) = report_path {
        progress_print.set_progress("writing report".into());
        report::write_report(&lifted, report_path)?;
    }

    if let Some(dst_path) = dst_path {
        progress_print.set_progress("writing fast-import stream".into());
        git::fast_import::export_to_file(progress_print, options, &lifted, meta_maker, dst_path)?;
    }

    for query in show.iter() {
        show_snapshot(&lifted, query)?;
    }

    progress_print.set_progress("finished".into());
    progress_print.freeze_progress();

    let issues = lifted.ledger.issues();
    if issues.is_empty() {
        tracing::info!("lifted without issues");
    } else {
        tracing::warn!(
            "lifted with {} issue(s), {} of them errors",
            issues.len(),
            lifted.ledger.num_errors(),
        );
    }

    Ok(())
}

/// Prints the tree of `NAME` or `NAME@CHANGESET` to stdout.
fn show_snapshot(lifted: &Lifted, query: &str) -> Result<(), ConvertError> {
    use std::io::Write as _;

    let (name, point) = match query.rsplit_once('@') {
        Some((name, point)) => match point.parse::<usize>() {
            Ok(point) => (name, Some(point)),
            Err(_) => (query, None),
        },
        None => (query, None),
    };

    let materializer = lifted.materializer();
    let snapshot = match point {
        Some(point) => materializer.snapshot_at(name, point),
        None => materializer.snapshot(name),
    }
    .map_err(|e| {
        tracing::error!("cannot show {query}: {e}");
        ConvertError
    })?;
    let kind = match lifted.symbols.kind(name) {
        Ok(symbols::SymbolKind::Tag) => "tag",
        _ => "branch",
    };

    let mut out = String::new();
    out.push_str(&format!("# {kind} {query} ({} files)\n", snapshot.len()));
    for (path, number) in snapshot.describe(&lifted.trees) {
        out.push_str(&format!("{path} {number}\n"));
    }
    std::io::stdout().lock().write_all(out.as_bytes()).map_err(|e| {
        tracing::error!("failed to write to stdout: {e}");
        ConvertError
    })
}

#[cfg(test)]
mod tests {
    use super::test_utils::file;
    use super::{InitOptions, Options, lift};
    use crate::term_out::ProgressPrint;

    #[test]
    fn test_malformed_file_is_skipped() {
        let options = Options::new(InitOptions::default());
        let lifted = lift(
            &ProgressPrint::silent(),
            &options,
            vec![
                file("good").rev("1.1", 0, "init").build(),
                file("bad").rev("1.1", 0, "init").rev("1.1", 5, "again").build(),
            ],
        )
        .unwrap_or_else(|_| panic!("lift failed"));

        assert_eq!(lifted.trees.len(), 1);
        assert_eq!(lifted.trees[0].path(), "good");
        let kinds: Vec<_> = lifted.ledger.issues().iter().map(|i| i.kind()).collect();
        assert_eq!(kinds, ["malformed-history"]);
        assert_eq!(
            lifted.ledger.issues()[0].to_string(),
            "bad: revision 1.1 appears twice",
        );
    }

    #[test]
    fn test_nothing_resolved() {
        let options = Options::new(InitOptions::default());
        let r = lift(
            &ProgressPrint::silent(),
            &options,
            vec![file("bad").rev("1.x", 0, "init").build()],
        );
        assert!(r.is_err());

        // The branch has no changeset to grow from.
        let r = lift(
            &ProgressPrint::silent(),
            &options,
            vec![
                file("a")
                    .dead("1.1", 0, "file a was initially added on branch B")
                    .rev("1.1.2.1", 0, "add a")
                    .sym("B", "1.1.0.2")
                    .build(),
            ],
        );
        assert!(r.is_err());
    }
}
