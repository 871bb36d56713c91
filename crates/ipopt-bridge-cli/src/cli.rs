use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum, ValueHint};
use ipopt_bridge::options::parse_assignment;
use ipopt_bridge::OptionValue;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Logging level (RUST_LOG still refines it)
    #[arg(long, global = true, default_value = "info")]
    pub log_level: tracing::Level,

    /// Options file to load instead of ~/.ipopt-bridge/options.toml
    #[arg(long, global = true, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Native option as KEY=VALUE; may be repeated and overrides the options file
    #[arg(long = "option", short = 'o', global = true, value_parser = parse_option)]
    pub options: Vec<(String, OptionValue)>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Solve Hock-Schittkowski problem 71
    Hs071 {
        /// Re-solve a perturbed problem warm-started from the first solution
        #[arg(long)]
        warm_start: bool,
        /// Report format
        #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
        format: ReportFormat,
        /// Write the solver's own log to this file
        #[arg(long, value_hint = ValueHint::FilePath)]
        output_file: Option<PathBuf>,
        /// Print level for --output-file
        #[arg(long, default_value_t = 5)]
        print_level: i32,
    },
    /// Explain a native return code
    Status {
        /// Raw code, e.g. -2
        #[arg(allow_negative_numbers = true)]
        code: i32,
    },
    /// Print the linked native library version
    Version,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReportFormat {
    Text,
    Json,
}

fn parse_option(text: &str) -> Result<(String, OptionValue), String> {
    parse_assignment(text).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_are_collected_in_order() {
        let cli = Cli::try_parse_from([
            "ipopt-bridge",
            "-o",
            "max_iter=5",
            "--option",
            "mu_strategy=adaptive",
            "hs071",
            "--warm-start",
        ])
        .unwrap();
        assert_eq!(
            cli.options,
            vec![
                ("max_iter".to_string(), OptionValue::Int(5)),
                ("mu_strategy".to_string(), OptionValue::Str("adaptive".into())),
            ]
        );
        assert!(matches!(
            cli.command,
            Commands::Hs071 {
                warm_start: true,
                format: ReportFormat::Text,
                ..
            }
        ));
    }

    #[test]
    fn test_malformed_option_is_rejected() {
        assert!(Cli::try_parse_from(["ipopt-bridge", "-o", "tol", "version"]).is_err());
    }

    #[test]
    fn test_status_accepts_negative_codes() {
        let cli = Cli::try_parse_from(["ipopt-bridge", "status", "-13"]).unwrap();
        assert!(matches!(cli.command, Commands::Status { code: -13 }));
    }
}
