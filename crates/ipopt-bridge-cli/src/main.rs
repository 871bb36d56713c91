//! `ipopt-bridge`: drive the HS071 demo and inspect native return codes.
//!
//! Exit codes: 0 on success, 1 for bad input (malformed arguments or
//! options, config files, problem shape), 2 when the solver terminates
//! without success.
//!
//! Solving needs the `native` feature:
//! `cargo build -p ipopt-bridge-cli --features native --release`

mod cli;
mod commands;

use std::io;

use anyhow::Result;
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
enum ExitCode {
    Success = 0,
    InvalidInput = 1,
    SolverError = 2,
}

impl ExitCode {
    /// `--help` and `--version` succeed; any other usage error is bad input.
    fn for_usage(err: &clap::Error) -> Self {
        if err.use_stderr() {
            ExitCode::InvalidInput
        } else {
            ExitCode::Success
        }
    }

    fn classify(err: &anyhow::Error) -> Self {
        match err.downcast_ref::<ipopt_bridge::Error>() {
            Some(ipopt_bridge::Error::Terminated(_)) | None => ExitCode::SolverError,
            Some(_) => ExitCode::InvalidInput,
        }
    }
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            std::process::exit(ExitCode::for_usage(&e) as i32);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(cli.log_level.into()))
        .with_writer(io::stderr)
        .init();

    let exit_code = match run(cli) {
        Ok(()) => ExitCode::Success,
        Err(e) => {
            error!("{e:#}");
            ExitCode::classify(&e)
        }
    };

    std::process::exit(exit_code as i32);
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Hs071 {
            warm_start,
            format,
            output_file,
            print_level,
        } => {
            let file = commands::load_options(cli.config.as_deref())?;
            let options = commands::hs071::resolve_options(file, cli.options);
            commands::hs071::handle(commands::hs071::Hs071Args {
                options,
                warm_start,
                format,
                output_file,
                print_level,
            })
        }
        Commands::Status { code } => commands::status::handle(code),
        Commands::Version => commands::version::handle(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ipopt_bridge::{SolveStatus, StatusError};

    #[test]
    fn test_exit_code_classification() {
        let terminated = anyhow::Error::new(ipopt_bridge::Error::from(StatusError {
            status: SolveStatus::MaximumIterationsExceeded,
            code: -1,
            description: SolveStatus::MaximumIterationsExceeded.description(),
        }));
        assert_eq!(ExitCode::classify(&terminated), ExitCode::SolverError);

        let bad_input = anyhow::Error::new(ipopt_bridge::Error::Config("bad".into()));
        assert_eq!(ExitCode::classify(&bad_input), ExitCode::InvalidInput);

        assert_eq!(ExitCode::classify(&anyhow::anyhow!("no backend")), ExitCode::SolverError);
    }

    #[test]
    fn test_malformed_arguments_are_invalid_input() {
        let err = Cli::try_parse_from(["ipopt-bridge", "-o", "tol", "hs071"]).unwrap_err();
        assert_eq!(ExitCode::for_usage(&err), ExitCode::InvalidInput);

        let err = Cli::try_parse_from(["ipopt-bridge", "status"]).unwrap_err();
        assert_eq!(ExitCode::for_usage(&err), ExitCode::InvalidInput);

        let err = Cli::try_parse_from(["ipopt-bridge", "--help"]).unwrap_err();
        assert_eq!(ExitCode::for_usage(&err), ExitCode::Success);
    }
}
