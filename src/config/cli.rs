use super::CONFIG_KEYS;
use clap::Parser;
use clap_complete::engine::{ArgValueCompleter, CompletionCandidate};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Actions that can be selected by invoking the binary through a symlink
/// named `overjail-<action>`.
const MULTI_CALL_ACTIONS: [&str; 4] = ["prepare", "run", "destroy", "shell"];

#[derive(Parser, Clone, Debug)]
#[command(name = "overjail", version, about, long_about = None)]
pub struct Args {
    /**********************/
    /* Flags and settings */
    /**********************/
    /// Set the log level to one of trace, debug, info, warn, or error.
    /// `-v` is shorthand for enabling verbose (trace) logging.
    #[arg(short = 'v',
        long,
        global = true,
        default_missing_value = "trace",
        num_args = 0..=1,
        require_equals = true,
        value_parser = parse_log_level
    )]
    pub log_level: Option<log::LevelFilter>,

    /// Directory holding the sandbox mounts. Defaults to `/var/lib/overjail`
    #[arg(long, global = true, value_hint = clap::ValueHint::DirPath)]
    pub base_dir: Option<String>,

    /// User the sandboxed program runs as. Defaults to `sandboxer`
    #[arg(long, global = true, value_hint = clap::ValueHint::Username)]
    pub user: Option<String>,

    /// Value of SHELL inside the sandbox, and the fallback for `shell` when the
    /// user has no login shell. Defaults to `/bin/sh`
    #[arg(long, global = true, value_hint = clap::ValueHint::ExecutablePath)]
    pub shell: Option<String>,

    /// Value of PATH inside the sandbox
    #[arg(long, global = true)]
    pub search_path: Option<String>,

    /// Run inside a new user namespace, so `run` does not need to be started as root
    #[arg(long, global = true, action = clap::ArgAction::SetTrue)]
    pub user_namespace: bool,

    /// Replace this process with the sandboxed program instead of waiting for it
    #[arg(long, global = true, action = clap::ArgAction::SetTrue)]
    pub no_supervise: bool,

    /// Additional config file, read after /etc/overjail.toml
    #[arg(long, global = true, value_hint = clap::ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Do not load config files.
    #[arg(long, global = true, action = clap::ArgAction::SetTrue)]
    pub no_config: bool,

    /// Formats action output as a JSON blob. Does nothing for sandboxed commands.
    #[arg(long, global = true, action = clap::ArgAction::SetTrue)]
    pub json: bool,

    /***************/
    /* Subcommands */
    /***************/
    #[command(subcommand)]
    pub action: Action,
}

#[derive(clap::Subcommand, Clone, Debug)]
#[command(subcommand_help_heading = "Actions")]
pub enum Action {
    /// Build the overlay, replacing any existing one. Listed paths are chowned
    /// to the sandbox user inside the overlay.
    Prepare {
        /// Paths, as seen inside the sandbox, to hand over to the sandbox user
        #[arg(value_name = "PATHS", num_args = 0.., value_hint = clap::ValueHint::AnyPath)]
        paths: Vec<PathBuf>,
    },

    /// Run a command inside the prepared sandbox as the sandbox user
    Run {
        /// The command and its arguments
        #[arg(
            value_name = "COMMAND",
            required = true,
            num_args = 1..,
            trailing_var_arg = true,
            allow_hyphen_values = true,
            value_hint = clap::ValueHint::CommandWithArguments
        )]
        command: Vec<String>,
    },

    /// Unmount the overlay and remove its directories
    Destroy,

    /// Start the sandbox user's login shell inside the sandbox
    Shell {
        /// Arguments passed to the shell
        #[arg(
            value_name = "ARGS",
            num_args = 0..,
            trailing_var_arg = true,
            allow_hyphen_values = true
        )]
        args: Vec<String>,
    },

    /// Show whether the sandbox is absent, prepared or degraded
    Status,

    /// Get current configuration options
    Config {
        /// The keys to get from the configuration
        #[arg(value_name = "KEYS", num_args = 0.., add = ArgValueCompleter::new(config_key_completion))]
        keys: Option<Vec<String>>,
    },
}

pub fn config_key_completion(
    current: &std::ffi::OsStr,
) -> Vec<CompletionCandidate> {
    let Some(current) = current.to_str() else {
        return vec![];
    };

    CONFIG_KEYS
        .iter()
        .filter(|key| key.starts_with(current))
        .map(|key| CompletionCandidate::new(*key))
        .collect()
}

/**
 * Rewrites `overjail-run ls -l` style invocations into `overjail run ls -l`, so a
 * symlink named after an action behaves like that subcommand. Anything else is
 * passed through untouched.
 */
pub fn multi_call_args<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    let mut args: Vec<OsString> = args.into_iter().collect();

    let action = args
        .first()
        .and_then(|argv0| Path::new(argv0).file_name())
        .and_then(|name| name.to_str())
        .and_then(|name| name.strip_prefix("overjail-"))
        .filter(|action| MULTI_CALL_ACTIONS.contains(action))
        .map(OsString::from);

    if let Some(action) = action {
        args[0] = OsString::from("overjail");
        args.insert(1, action);
    }

    args
}

fn parse_log_level(s: &str) -> Result<log::LevelFilter, String> {
    s.parse::<log::LevelFilter>().map_err(|e| e.to_string())
}
