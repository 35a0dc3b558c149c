use std::collections::BTreeMap;

use super::ledger::{Issue, Ledger};
use super::rev_number::RevNumber;
use super::rev_tree::{FileSymbol, RevId, RevisionTree};

/// Index of a file in the path-sorted list of revision trees.
pub(crate) type FileId = usize;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum SymbolKind {
    Branch,
    Tag,
}

impl std::fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Branch => f.write_str("branch"),
            Self::Tag => f.write_str("tag"),
        }
    }
}

/// What a symbol designates in one file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Target {
    Absent,
    Revision(RevId),
    BranchRoot { root: RevNumber, sprout: RevId },
}

pub(crate) struct Symbol {
    pub(crate) name: String,
    pub(crate) kind: SymbolKind,
    targets: Vec<Target>,
}

impl Symbol {
    pub(crate) fn targets(&self) -> impl Iterator<Item = (FileId, &Target)> {
        self.targets.iter().enumerate()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum AmbiguousSymbolError {
    BranchAndTag {
        name: String,
        branch_in: String,
        tag_in: String,
    },
    TrunkName {
        name: String,
    },
}

impl std::fmt::Display for AmbiguousSymbolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BranchAndTag {
                name,
                branch_in,
                tag_in,
            } => write!(
                f,
                "symbol {name} is a branch in {branch_in} but a tag in {tag_in}",
            ),
            Self::TrunkName { name } => {
                write!(f, "symbol {name} conflicts with the trunk name")
            }
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum LookupError<'a> {
    Unknown,
    Ambiguous(&'a AmbiguousSymbolError),
}

/// Project-level symbols, each resolved in every file.
pub(crate) struct SymbolTable {
    symbols: BTreeMap<String, Symbol>,
    ambiguous: BTreeMap<String, AmbiguousSymbolError>,
}

impl SymbolTable {
    pub(crate) fn build(trees: &[RevisionTree], trunk_name: &str, ledger: &mut Ledger) -> Self {
        // First file seen with each kind, per name.
        let mut seen = BTreeMap::<&str, (Option<FileId>, Option<FileId>)>::new();
        for (file, tree) in trees.iter().enumerate() {
            for (name, symbol) in tree.symbols() {
                let entry = seen.entry(name).or_default();
                match symbol {
                    FileSymbol::Branch { .. } => {
                        entry.0.get_or_insert(file);
                    }
                    FileSymbol::Tag(_) => {
                        entry.1.get_or_insert(file);
                    }
                }
            }
        }

        let mut symbols = BTreeMap::new();
        let mut ambiguous = BTreeMap::new();
        for (name, kinds) in seen {
            let kind = match kinds {
                (Some(branch_file), Some(tag_file)) => {
                    let error = AmbiguousSymbolError::BranchAndTag {
                        name: name.to_owned(),
                        branch_in: trees[branch_file].path().to_owned(),
                        tag_in: trees[tag_file].path().to_owned(),
                    };
                    ledger.record(Issue::AmbiguousSymbol(error.clone()));
                    ambiguous.insert(name.to_owned(), error);
                    continue;
                }
                _ if name == trunk_name => {
                    let error = AmbiguousSymbolError::TrunkName {
                        name: name.to_owned(),
                    };
                    ledger.record(Issue::AmbiguousSymbol(error.clone()));
                    ambiguous.insert(name.to_owned(), error);
                    continue;
                }
                (Some(_), None) => SymbolKind::Branch,
                (None, _) => SymbolKind::Tag,
            };

            let targets = trees
                .iter()
                .map(|tree| resolve_in_file(tree, name))
                .collect();
            symbols.insert(
                name.to_owned(),
                Symbol {
                    name: name.to_owned(),
                    kind,
                    targets,
                },
            );
        }

        Self { symbols, ambiguous }
    }

    pub(crate) fn get(&self, name: &str) -> Result<&Symbol, LookupError<'_>> {
        if let Some(symbol) = self.symbols.get(name) {
            Ok(symbol)
        } else if let Some(error) = self.ambiguous.get(name) {
            Err(LookupError::Ambiguous(error))
        } else {
            Err(LookupError::Unknown)
        }
    }

    pub(crate) fn kind(&self, name: &str) -> Result<SymbolKind, LookupError<'_>> {
        self.get(name).map(|symbol| symbol.kind)
    }

    /// Per-file targets of a symbol, indexed by file.
    pub(crate) fn resolve(&self, name: &str) -> Result<&[Target], LookupError<'_>> {
        self.get(name).map(|symbol| symbol.targets.as_slice())
    }

    pub(crate) fn branches(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols
            .values()
            .filter(|symbol| symbol.kind == SymbolKind::Branch)
    }

    pub(crate) fn tags(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols
            .values()
            .filter(|symbol| symbol.kind == SymbolKind::Tag)
    }
}

fn resolve_in_file(tree: &RevisionTree, name: &str) -> Target {
    match tree.symbol(name) {
        None => Target::Absent,
        Some(FileSymbol::Tag(Some(rev_id))) => Target::Revision(*rev_id),
        Some(FileSymbol::Tag(None)) => {
            tracing::warn!(
                "tag {name} points to a missing revision in {}, treating as absent",
                tree.path(),
            );
            Target::Absent
        }
        Some(FileSymbol::Branch {
            number,
            sprout: Some(sprout),
        }) => Target::BranchRoot {
            root: number.clone(),
            sprout: *sprout,
        },
        Some(FileSymbol::Branch { number, sprout: None }) => {
            tracing::warn!(
                "branch {name} ({number}) has no sprout revision in {}, treating as absent",
                tree.path(),
            );
            Target::Absent
        }
    }
}
