//! # cask
//!
//! Runs one command in an isolated Linux container and mirrors its exit
//! status. The same binary is also the container init: when re-executed
//! with the reserved init marker as its first argument it takes the init
//! path instead of parsing a command line.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

mod commands;
mod logging;

use std::ffi::OsString;
use std::process::ExitCode;

use cask_common::constants::{EXIT_SETUP_FAILURE, INIT_MARKER};
use cask_common::error::CaskError;
use clap::Parser;

use crate::commands::Cli;

fn main() -> ExitCode {
    let args: Vec<OsString> = std::env::args_os().collect();
    if args.get(1).is_some_and(|arg| arg == INIT_MARKER) {
        logging::init(logging::json_from_env());
        return init_main(args.into_iter().skip(1));
    }

    let cli = Cli::parse_from(args);
    logging::init(cli.log_json);
    match commands::execute(cli) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %format_args!("{e:#}"), "cask failed");
            exit_code(e.downcast_ref::<CaskError>().map_or(EXIT_SETUP_FAILURE, CaskError::exit_code))
        }
    }
}

fn init_main(args: impl Iterator<Item = OsString>) -> ExitCode {
    let args = match args
        .map(|arg| {
            arg.into_string()
                .map_err(|raw| CaskError::protocol(format!("argument {raw:?} is not UTF-8")))
        })
        .collect::<Result<Vec<_>, _>>()
    {
        Ok(args) => args,
        Err(e) => return init_failed(&e),
    };
    match cask_runtime::init::run(args) {
        Ok(never) => match never {},
        Err(e) => init_failed(&e),
    }
}

fn init_failed(e: &CaskError) -> ExitCode {
    tracing::error!(error = %e, "container init failed");
    exit_code(e.exit_code())
}

/// Converts a status to an [`ExitCode`]; out-of-range values saturate.
pub(crate) fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(u8::MAX))
}
