use super::PartialConfig;
use super::cli::Args;
use crate::config::Config;
use crate::sandbox::{
    DEFAULT_BASE_DIR, DEFAULT_SEARCH_PATH, DEFAULT_SHELL, DEFAULT_USER,
};
use crate::util::check_path_for_mount_option_compatibility;
use anyhow::{Context, Result};
use log::trace;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const SYSTEM_CONFIG_FILE: &str = "/etc/overjail.toml";

pub fn resolve_config(cli: Args) -> Result<Config> {
    resolve_config_from(
        cli,
        Path::new(SYSTEM_CONFIG_FILE),
        &|key: &str| std::env::var(key).ok(),
    )
}

/**
 * Builds the effective configuration from, in increasing precedence, the
 * built-in defaults, the system config file, the `--config` file, `OVERJAIL_*`
 * environment variables and the command line.
 */
pub fn resolve_config_from(
    cli: Args,
    system_config: &Path,
    env: &dyn Fn(&str) -> Option<String>,
) -> Result<Config> {
    let mut config_paths = vec![];
    if !cli.no_config {
        if system_config.exists() {
            config_paths.push(system_config.to_path_buf());
        }
        if let Some(path) = &cli.config {
            config_paths.push(path.clone());
        }
    }

    let (mut partial_config, mut sources) = load_partial(&config_paths)?;

    let env_config = partial_from_env(env)?;
    partial_config.merge(env_config, "environment", &mut sources);

    let cli_config = PartialConfig {
        log_level: cli.log_level,
        base_dir: cli.base_dir,
        user: cli.user,
        shell: cli.shell,
        search_path: cli.search_path,
        user_namespace: cli.user_namespace.then_some(true),
        supervise: cli.no_supervise.then_some(false),
    };
    partial_config.merge(cli_config, "cli", &mut sources);

    // If nothing else, fill in with some default values
    for key in [
        "log_level",
        "base_dir",
        "user",
        "shell",
        "search_path",
        "user_namespace",
        "supervise",
    ] {
        sources.entry(key.into()).or_insert_with(|| "default".into());
    }

    let config = Config {
        log_level: partial_config.log_level.unwrap_or(log::LevelFilter::Info),
        base_dir: PathBuf::from(
            partial_config
                .base_dir
                .unwrap_or_else(|| DEFAULT_BASE_DIR.to_string()),
        ),
        user: partial_config
            .user
            .unwrap_or_else(|| DEFAULT_USER.to_string()),
        shell: PathBuf::from(
            partial_config
                .shell
                .unwrap_or_else(|| DEFAULT_SHELL.to_string()),
        ),
        search_path: partial_config
            .search_path
            .unwrap_or_else(|| DEFAULT_SEARCH_PATH.to_string()),
        user_namespace: partial_config.user_namespace.unwrap_or(false),
        supervise: partial_config.supervise.unwrap_or(true),
        config_files: config_paths,
        sources,
    };

    validate_config(&config)?;

    trace!("Base dir: {}", config.base_dir.display());
    trace!("User: {}", config.user);

    Ok(config)
}

pub fn load_partial(
    config_paths: &[PathBuf],
) -> Result<(PartialConfig, HashMap<String, String>)> {
    let mut sources = HashMap::new();
    let mut merged_config = PartialConfig::default();

    if config_paths.is_empty() {
        trace!("No config files found, using default config");
        return Ok((merged_config, sources));
    }

    for path in config_paths {
        let config_str = std::fs::read_to_string(path).context(format!(
            "Failed to read config file {}",
            path.display()
        ))?;

        let config: PartialConfig = toml::from_str(&config_str).context(
            format!("Failed to parse config file {}", path.display()),
        )?;

        merged_config.merge(config, &path.to_string_lossy(), &mut sources);
        trace!("Loaded config file: {}", path.display());
    }

    Ok((merged_config, sources))
}

fn partial_from_env(
    env: &dyn Fn(&str) -> Option<String>,
) -> Result<PartialConfig> {
    let var = |key: &str| env(key).filter(|value| !value.is_empty());

    let mut partial = PartialConfig::default();

    if let Some(log_level) = var("OVERJAIL_LOG_LEVEL") {
        partial.log_level = Some(
            log::LevelFilter::from_str(&log_level)
                .map_err(|_| anyhow::anyhow!("Invalid log level: {}", log_level))?,
        );
    }
    partial.base_dir = var("OVERJAIL_BASE_DIR");
    partial.user = var("OVERJAIL_USER");
    partial.shell = var("OVERJAIL_SHELL");
    partial.search_path = var("OVERJAIL_PATH");

    if let Some(value) = var("OVERJAIL_USER_NAMESPACE") {
        partial.user_namespace = Some(parse_bool("OVERJAIL_USER_NAMESPACE", &value)?);
    }
    if let Some(value) = var("OVERJAIL_SUPERVISE") {
        partial.supervise = Some(parse_bool("OVERJAIL_SUPERVISE", &value)?);
    }

    Ok(partial)
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    bool::from_str(value)
        .map_err(|_| anyhow::anyhow!("Invalid value for {}: {}", key, value))
}

fn validate_config(config: &Config) -> Result<()> {
    if !config.base_dir.is_absolute() {
        return Err(anyhow::anyhow!(
            "Base dir must be an absolute path: {}",
            config.base_dir.display()
        ));
    }
    check_path_for_mount_option_compatibility(&config.base_dir)?;

    if !config.shell.is_absolute() {
        return Err(anyhow::anyhow!(
            "Shell must be an absolute path: {}",
            config.shell.display()
        ));
    }
    if config.user.is_empty() {
        return Err(anyhow::anyhow!("User must not be empty"));
    }
    if config.search_path.is_empty() {
        return Err(anyhow::anyhow!("Search path must not be empty"));
    }

    Ok(())
}
