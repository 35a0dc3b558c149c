use std::collections::HashMap;
use std::path::PathBuf;

#[derive(serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ConvParams {
    #[serde(rename = "trunk-name", default = "default_trunk_name")]
    pub(crate) trunk_name: String,
    #[serde(rename = "commit-time-window", default = "default_commit_time_window")]
    pub(crate) commit_time_window: i64,
    #[serde(rename = "changeset-time", default = "default_changeset_time")]
    pub(crate) changeset_time: ChangesetTime,
    #[serde(rename = "straddle-order", default = "default_straddle_order")]
    pub(crate) straddle_order: StraddleOrder,
    #[serde(rename = "rename-branches", default = "HashMap::new")]
    pub(crate) rename_branches: HashMap<String, String>,
    #[serde(rename = "rename-tags", default = "HashMap::new")]
    pub(crate) rename_tags: HashMap<String, String>,
    #[serde(rename = "user-map-file")]
    pub(crate) user_map_file: Option<PathBuf>,
    #[serde(rename = "user-fallback-template")]
    pub(crate) user_fallback_template: Option<String>,
    #[serde(rename = "commit-msg-template")]
    pub(crate) commit_msg_template: Option<String>,
}

#[derive(Copy, Clone, serde::Deserialize)]
pub(crate) enum ChangesetTime {
    #[serde(rename = "earliest")]
    Earliest,
    #[serde(rename = "latest")]
    Latest,
}

#[derive(Copy, Clone, serde::Deserialize)]
pub(crate) enum StraddleOrder {
    #[serde(rename = "trunk-first")]
    TrunkFirst,
    #[serde(rename = "arrival")]
    Arrival,
}

fn default_trunk_name() -> String {
    "master".into()
}

fn default_commit_time_window() -> i64 {
    300
}

fn default_changeset_time() -> ChangesetTime {
    ChangesetTime::Latest
}

fn default_straddle_order() -> StraddleOrder {
    StraddleOrder::TrunkFirst
}

#[cfg(test)]
mod tests {
    use super::{ChangesetTime, ConvParams, StraddleOrder};

    #[test]
    fn test_defaults() {
        let params: ConvParams = toml::from_str("").unwrap();
        assert_eq!(params.trunk_name, "master");
        assert_eq!(params.commit_time_window, 300);
        assert!(matches!(params.changeset_time, ChangesetTime::Latest));
        assert!(matches!(params.straddle_order, StraddleOrder::TrunkFirst));
        assert!(params.rename_branches.is_empty());
        assert!(params.user_map_file.is_none());
    }

    #[test]
    fn test_parse() {
        let params: ConvParams = toml::from_str(
            r#"
            trunk-name = "main"
            commit-time-window = 60
            changeset-time = "earliest"
            straddle-order = "arrival"
            rename-branches = { "REL_*" = "release/*" }
            "#,
        )
        .unwrap();
        assert_eq!(params.trunk_name, "main");
        assert_eq!(params.commit_time_window, 60);
        assert!(matches!(params.changeset_time, ChangesetTime::Earliest));
        assert!(matches!(params.straddle_order, StraddleOrder::Arrival));
        assert_eq!(params.rename_branches["REL_*"], "release/*");

        assert!(toml::from_str::<ConvParams>("split-policy = \"x\"").is_err());
        assert!(toml::from_str::<ConvParams>("changeset-time = \"middle\"").is_err());
    }
}
