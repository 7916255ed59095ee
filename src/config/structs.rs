use super::impls::deserialize_level_filter;
use serde::Deserialize;
use std::{collections::HashMap, path::PathBuf};

/// One layer of settings, as read from a config file or assembled from the
/// environment or the command line. Unset fields fall through to the next
/// layer down.
#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PartialConfig {
    #[serde(deserialize_with = "deserialize_level_filter", default)]
    pub log_level: Option<log::LevelFilter>,
    pub base_dir: Option<String>,
    pub user: Option<String>,
    pub shell: Option<String>,
    pub search_path: Option<String>,
    pub user_namespace: Option<bool>,
    pub supervise: Option<bool>,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub log_level: log::LevelFilter,
    pub base_dir: PathBuf,
    pub user: String,
    pub shell: PathBuf,
    pub search_path: String,
    pub user_namespace: bool,
    pub supervise: bool,
    pub config_files: Vec<PathBuf>,
    pub sources: HashMap<String, String>,
}

/// Keys understood by the `config` action, in display order.
pub const CONFIG_KEYS: [&str; 8] = [
    "log_level",
    "base_dir",
    "user",
    "shell",
    "search_path",
    "user_namespace",
    "supervise",
    "config_files",
];
