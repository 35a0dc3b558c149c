use std::collections::{BTreeMap, BTreeSet};

#[derive(serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct Test {
    #[serde(rename = "cvs-files", default = "Vec::new")]
    pub(crate) cvs_files: Vec<CvsFile>,
    #[serde(rename = "conv-params", default = "String::new")]
    pub(crate) conv_params: String,
    #[serde(rename = "user-map")]
    pub(crate) user_map: Option<String>,
    #[serde(rename = "failed", default = "false_")]
    pub(crate) failed: bool,
    #[serde(rename = "logs")]
    pub(crate) logs: Option<String>,
    /// `--show` queries passed to the converter.
    #[serde(rename = "show", default = "Vec::new")]
    pub(crate) show: Vec<String>,
    #[serde(rename = "stdout")]
    pub(crate) stdout: Option<String>,
    #[serde(rename = "branches", default = "Vec::new")]
    pub(crate) branches: Vec<ExpectedBranch>,
    #[serde(rename = "tags", default = "Vec::new")]
    pub(crate) tags: Vec<ExpectedTag>,
    #[serde(rename = "issues")]
    pub(crate) issues: Option<Vec<String>>,
    #[serde(rename = "git-refs")]
    pub(crate) git_refs: Option<BTreeSet<String>>,
    #[serde(rename = "git-revs", default = "Vec::new")]
    pub(crate) git_revs: Vec<GitRev>,
}

#[inline(always)]
fn false_() -> bool {
    false
}

/// One entry of the history file fed to the converter.
#[derive(serde::Deserialize, serde::Serialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct CvsFile {
    pub(crate) path: String,
    #[serde(default = "false_", skip_serializing_if = "is_false")]
    pub(crate) executable: bool,
    #[serde(default = "BTreeMap::new")]
    pub(crate) symbols: BTreeMap<String, String>,
    pub(crate) revs: Vec<CvsRev>,
}

#[derive(serde::Deserialize, serde::Serialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct CvsRev {
    pub(crate) number: String,
    #[serde(default = "default_author")]
    pub(crate) author: String,
    pub(crate) date: String,
    #[serde(default = "String::new")]
    pub(crate) log: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) commitid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) content: Option<String>,
}

fn is_false(v: &bool) -> bool {
    !*v
}

fn default_author() -> String {
    "joe".into()
}

#[derive(serde::Serialize)]
pub(crate) struct HistoryFile<'a> {
    pub(crate) files: &'a [CvsFile],
}

#[derive(serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ExpectedBranch {
    pub(crate) name: String,
    pub(crate) parent: Option<String>,
    #[serde(rename = "branch-point")]
    pub(crate) branch_point: Option<usize>,
    /// Kinds of the branch changesets, in order.
    pub(crate) changesets: Option<Vec<String>>,
    pub(crate) tree: Option<BTreeMap<String, String>>,
}

#[derive(serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ExpectedTag {
    pub(crate) name: String,
    pub(crate) tree: BTreeMap<String, String>,
}

#[derive(serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct GitRev {
    pub(crate) rev: String,
    pub(crate) message: Option<String>,
    pub(crate) author: Option<String>,
    pub(crate) files: Option<BTreeSet<String>>,
}

/// The parts of the converter report that tests look at.
#[derive(serde::Deserialize)]
pub(crate) struct Report {
    #[serde(default = "Vec::new")]
    pub(crate) branches: Vec<ReportBranch>,
    #[serde(default = "Vec::new")]
    pub(crate) tags: Vec<ReportTag>,
    #[serde(default = "Vec::new")]
    pub(crate) issues: Vec<ReportIssue>,
}

#[derive(serde::Deserialize)]
pub(crate) struct ReportBranch {
    pub(crate) name: String,
    pub(crate) parent: Option<String>,
    #[serde(rename = "branch-point")]
    pub(crate) branch_point: Option<usize>,
    pub(crate) tree: BTreeMap<String, String>,
    #[serde(default = "Vec::new")]
    pub(crate) changesets: Vec<ReportChangeset>,
}

#[derive(serde::Deserialize)]
pub(crate) struct ReportChangeset {
    pub(crate) kind: String,
}

#[derive(serde::Deserialize)]
pub(crate) struct ReportTag {
    pub(crate) name: String,
    pub(crate) tree: BTreeMap<String, String>,
}

#[derive(serde::Deserialize)]
pub(crate) struct ReportIssue {
    pub(crate) kind: String,
    pub(crate) message: String,
}
