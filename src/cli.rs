//! Command-line interface

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::config::Mode;

/// M2M gateway bridge - OAuth2 client credentials in, gateway tools out
#[derive(Parser, Debug)]
#[command(name = "gateway-m2m")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short, long, env = "M2M_GATEWAY_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(
        long,
        default_value = "warn",
        env = "M2M_GATEWAY_LOG_LEVEL",
        global = true
    )]
    pub log_level: String,

    /// Log format (text, json)
    #[arg(long, env = "M2M_GATEWAY_LOG_FORMAT", global = true)]
    pub log_format: Option<String>,

    /// Gateway to talk to (overrides configuration)
    #[arg(long, value_enum, global = true)]
    pub mode: Option<Mode>,

    /// Subcommand
    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch an access token and show its lifetime (never the token itself)
    Token,

    /// List the gateway's tools
    Tools {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Call a tool through the agent toolset
    Call {
        /// Tool name
        #[arg(required = true)]
        tool: String,

        /// JSON arguments to pass to the tool
        #[arg(short, long, default_value = "{}")]
        args: String,
    },

    /// Semantic search over the gateway's tools
    Search {
        /// Natural-language query
        #[arg(required = true)]
        query: String,
    },
}

/// Output format for listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable
    Text,
    /// Pretty-printed JSON
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn call_with_args() {
        let cli = Cli::try_parse_from([
            "gateway-m2m",
            "--mode",
            "local",
            "call",
            "wills___save_answers",
            "--args",
            r#"{"answers":{}}"#,
        ])
        .unwrap();

        assert_eq!(cli.mode, Some(Mode::Local));
        match cli.command {
            Command::Call { tool, args } => {
                assert_eq!(tool, "wills___save_answers");
                assert_eq!(args, r#"{"answers":{}}"#);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn tools_defaults_to_text() {
        let cli = Cli::try_parse_from(["gateway-m2m", "tools"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Tools {
                format: OutputFormat::Text
            }
        ));
    }

    #[test]
    fn subcommand_required() {
        assert!(Cli::try_parse_from(["gateway-m2m"]).is_err());
    }
}
