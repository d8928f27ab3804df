//! gateway-m2m - exercise the M2M gateway bridge from the command line

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use serde_json::Value;
use tokio::time::Instant;
use tracing::error;

use gateway_m2m::{
    Error, Result,
    bridge::AgentBridge,
    cli::{Cli, Command, OutputFormat},
    config::Config,
    gateway::GatewaySession,
    oauth::{CredentialStore, TokenProvider},
    setup_tracing,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = setup_tracing(&cli.log_level, cli.log_format.as_deref()) {
        eprintln!("Failed to setup tracing: {e}");
        return ExitCode::FAILURE;
    }

    let mut config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ {e}");
            return ExitCode::FAILURE;
        }
    };
    if let Some(mode) = cli.mode {
        config.mode = mode;
    }

    let result = match cli.command {
        Command::Token => run_token(&config).await,
        Command::Tools { format } => run_tools(&config, format).await,
        Command::Call { tool, args } => run_call(&config, &tool, &args).await,
        Command::Search { query } => run_search(&config, &query).await,
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "Command failed");
            eprintln!("❌ {e}");
            ExitCode::FAILURE
        }
    }
}

async fn token_provider(config: &Config) -> Result<Arc<TokenProvider>> {
    let credential = CredentialStore::load(config).await?;
    Ok(Arc::new(TokenProvider::from_config(credential, &config.token)?))
}

/// Fetch a token; print its metadata only
async fn run_token(config: &Config) -> Result<ExitCode> {
    let tokens = token_provider(config).await?;
    let token = tokens.get_token().await?;

    println!("✅ Token acquired from {}", tokens.credential().token_endpoint());
    println!("   Type: {}", token.token_type());
    if let Some(scope) = token.scope() {
        println!("   Scope: {scope}");
    }
    println!("   Expires in: {}s", token.remaining(Instant::now()).as_secs());
    Ok(ExitCode::SUCCESS)
}

async fn run_tools(config: &Config, format: OutputFormat) -> Result<ExitCode> {
    let bridge = AgentBridge::start(config).await?;
    let specs = bridge.toolset().specs();

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&specs)?),
        OutputFormat::Text => {
            println!("{} tool(s) at {}:\n", specs.len(), bridge.session().endpoint());
            for spec in &specs {
                println!("🔧 {}", spec.name);
                if !spec.description.is_empty() {
                    println!("   {}", spec.description);
                }
            }
        }
    }

    bridge.shutdown().await?;
    Ok(ExitCode::SUCCESS)
}

async fn run_call(config: &Config, tool: &str, args: &str) -> Result<ExitCode> {
    let arguments: Value = serde_json::from_str(args)
        .map_err(|e| Error::Config(format!("--args is not valid JSON: {e}")))?;

    let bridge = AgentBridge::start(config).await?;
    let output = bridge.toolset().dispatch(tool, arguments).await;
    bridge.shutdown().await?;
    let output = output?;

    match &output.structured_content {
        Some(value) => println!("{}", serde_json::to_string_pretty(value)?),
        None => println!("{}", output.to_text()),
    }

    if output.is_error {
        eprintln!("❌ {tool} reported an error");
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

async fn run_search(config: &Config, query: &str) -> Result<ExitCode> {
    let session = GatewaySession::open(config, token_provider(config).await?).await?;
    let found = session.search_tools(query).await;
    session.close().await?;
    let found = found?;

    if found.is_empty() {
        println!("No tools matched \"{query}\"");
        return Ok(ExitCode::SUCCESS);
    }

    println!("{} tool(s) matched \"{query}\":\n", found.len());
    for descriptor in &found {
        match &descriptor.target {
            Some(target) => println!("🔧 {} ({target})", descriptor.tool_name()),
            None => println!("🔧 {}", descriptor.name),
        }
        if !descriptor.description.is_empty() {
            println!("   {}", descriptor.description);
        }
    }
    Ok(ExitCode::SUCCESS)
}
