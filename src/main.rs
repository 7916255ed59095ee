#![allow(
    clippy::collapsible_else_if,
    clippy::collapsible_if,
    clippy::module_inception,
    clippy::needless_range_loop,
    clippy::result_map_unit_fn,
    clippy::useless_format
)]
#![deny(
    clippy::get_unwrap,
    clippy::panic,
    clippy::print_stdout,
    clippy::unwrap_used,
    clippy::use_debug,
    clippy::used_underscore_binding,
    clippy::used_underscore_items
)]

mod actions;
mod config;
mod error;
mod logger;
mod sandbox;
mod types;
mod util;

use anyhow::{Context, Result, anyhow};
use clap::CommandFactory;
use clap_complete::CompleteEnv;
use config::{cli, resolve_config};

use log::Log;
use nix::unistd::geteuid;
use sandbox::Sandbox;
use serde_json::Value;
use util::{print_json_output, set_json_mode, set_json_output};

use clap::Parser;
pub fn main() -> Result<()> {
    let logger = logger::JailLogger::new(log::LevelFilter::Trace)
        .init()
        .map_err(|e| anyhow!("Failed to initialize logger: {}", e))?;

    // This will not return if tab completion was requested.
    CompleteEnv::with_factory(cli::Args::command).complete();

    let cli: cli::Args =
        cli::Args::parse_from(cli::multi_call_args(std::env::args_os()));

    if let Some(log_level) = cli.log_level {
        logger.set_level(log_level);
    } else {
        logger.set_level(log::LevelFilter::Info);
    };

    let config = resolve_config(cli.clone()).context("Resolving config")?;

    // Now that we've loaded the config, we can set the log level and print out any deferred messages
    // emitted while we were loading the config.
    logger.set_level(config.log_level);
    logger.print_deferred();

    set_json_mode(cli.json);

    let needs_root = match &cli.action {
        cli::Action::Status | cli::Action::Config { .. } => false,
        cli::Action::Run { .. } | cli::Action::Shell { .. } => {
            !config.user_namespace
        }
        cli::Action::Prepare { .. } | cli::Action::Destroy => true,
    };
    if needs_root && !geteuid().is_root() {
        return Err(anyhow!(
            "Insufficient permissions to manage the sandbox, please retry using `sudo` or pass --user-namespace to `run`"
        ));
    }

    let sandbox = Sandbox::from_config(&config);

    let result = match cli.action {
        cli::Action::Prepare { paths } => {
            actions::prepare(&sandbox, &paths).map(|_| 0)
        }
        cli::Action::Run { command } => actions::run(&sandbox, &command),
        cli::Action::Destroy => actions::destroy(&sandbox).map(|_| 0),
        cli::Action::Shell { args } => actions::shell(&sandbox, &args),
        cli::Action::Status => actions::status(&sandbox).map(|_| 0),
        cli::Action::Config { keys } => {
            actions::config(&config, keys).map(|_| 0)
        }
    };

    if cli.json {
        match &result {
            Ok(0) => {
                set_json_output("status", Value::String("success".to_string()));
            }
            Ok(code) => {
                set_json_output("status", Value::String("error".to_string()));
                set_json_output("exit_code", Value::from(*code));
                set_json_output(
                    "error",
                    Value::String(format!("Sandboxed command exited with code {}", code)),
                );
            }
            Err(e) => {
                set_json_output("status", Value::String("error".to_string()));
                set_json_output("error", Value::String(format!("{:#}", e)));
            }
        }
        print_json_output()?;
        if result.is_err() {
            std::process::exit(1);
        }
    }
    logger.flush();

    let code = result?;
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}
