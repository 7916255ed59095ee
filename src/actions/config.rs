#![allow(clippy::option_map_unit_fn)]
use crate::config::{CONFIG_KEYS, Config};
use crate::outln;
use crate::util::set_json_output;
use anyhow::Result;
use log::debug;
use serde_json::Value;
use std::collections::HashMap;

pub fn config(config: &Config, keys: Option<Vec<String>>) -> Result<()> {
    let keys = keys.unwrap_or_else(|| CONFIG_KEYS.map(String::from).to_vec());
    let multi_line = keys.len() > 1;

    for key in keys {
        let (key, value) = match key.as_str() {
            "log_level" | "log-level" => {
                ("log_level", config.log_level.as_str().to_string())
            }
            "base_dir" | "base-dir" => (
                "base_dir",
                config.base_dir.to_string_lossy().into_owned(),
            ),
            "user" => ("user", config.user.clone()),
            "shell" => ("shell", config.shell.to_string_lossy().into_owned()),
            "search_path" | "search-path" => {
                ("search_path", config.search_path.clone())
            }
            "user_namespace" | "user-namespace" => {
                ("user_namespace", config.user_namespace.to_string())
            }
            "supervise" => ("supervise", config.supervise.to_string()),
            "config_files" | "config-files" => (
                "config_files",
                config
                    .config_files
                    .iter()
                    .map(|p| p.to_string_lossy())
                    .collect::<Vec<_>>()
                    .join(","),
            ),
            _ => {
                return Err(anyhow::anyhow!("Unknown key: {}", key));
            }
        };
        print_config_line(key, &value, multi_line, &config.sources);
    }

    Ok(())
}

fn print_config_line(
    key: &str,
    value: &str,
    multi_line: bool,
    sources: &HashMap<String, String>,
) {
    sources.get(key).map(|s| {
        debug!("{}={} set from {}", key, value, s);
    });
    set_json_output(key, Value::String(value.to_string()));

    if multi_line {
        outln!("{}={}", key, value);
    } else {
        outln!("{}", value);
    }
}
