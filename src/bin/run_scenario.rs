//! CLI entry point: loads a scenario file, runs it end to end, and writes the
//! JSONL event stream to stdout (`spec.md` §6).

use std::collections::HashSet;
use std::fs;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::error;

use agentic_e2e_runner::config::RunnerConfig;
use agentic_e2e_runner::events::JsonlEventSink;
use agentic_e2e_runner::mcp::{HttpMcpTransport, ToolRegistry};
use agentic_e2e_runner::model::{Budgets, ScenarioSpec};
use agentic_e2e_runner::run::Run;
use agentic_e2e_runner::telemetry;

/// Runs one declarative end-to-end scenario against the browser and data
/// collaborator services.
#[derive(Parser, Debug)]
#[command(name = "run_scenario", version, about)]
struct Cli {
    /// Path to the scenario JSON file.
    scenario_path: String,

    /// Allowed navigation hosts, beyond the default `localhost`/`127.0.0.1`.
    #[arg(long = "allow-host")]
    allowed_hosts: Vec<String>,

    /// Identifier for the browser context this run opens and tears down.
    #[arg(long, default_value = "run-1")]
    context_id: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    telemetry::init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(exit_code) => exit_code,
        Err(message) => {
            error!(error = %message, "run_scenario failed before completion");
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode, String> {
    let config = RunnerConfig::from_env()?;

    let scenario_text = fs::read_to_string(&cli.scenario_path)
        .map_err(|err| format!("failed to read '{}': {err}", cli.scenario_path))?;
    let scenario: ScenarioSpec = serde_json::from_str(&scenario_text)
        .map_err(|err| format!("'{}' is not a valid scenario: {err}", cli.scenario_path))?;
    scenario.validate()?;

    let model = Arc::new(
        config
            .build_model()
            .map_err(|err| format!("failed to build model client: {err}"))?,
    );

    let browser = Box::new(
        HttpMcpTransport::new(&config.mcp_web_url)
            .map_err(|err| format!("failed to build browser transport: {err}"))?,
    );
    let data = Box::new(
        HttpMcpTransport::new(&config.mcp_data_url)
            .map_err(|err| format!("failed to build data transport: {err}"))?,
    );
    let registry = Arc::new(
        ToolRegistry::bootstrap(browser, data)
            .await
            .map_err(|err| format!("failed to bootstrap tool registry: {err}"))?,
    );

    let mut allowed_hosts: HashSet<String> =
        ["localhost".to_string(), "127.0.0.1".to_string()].into_iter().collect();
    allowed_hosts.extend(cli.allowed_hosts);

    let budgets = Budgets::new(
        scenario.constraints.max_steps,
        scenario.constraints.max_cost_usd,
        scenario.constraints.max_wall_seconds,
    );

    let mut run = Run::new(
        registry,
        model,
        config.openai_model.clone(),
        budgets,
        allowed_hosts,
        cli.context_id,
        Box::new(JsonlEventSink::new(std::io::stdout())),
    );

    let result = run.run_scenario(&scenario).await;
    let exit_code = result.status.exit_code();

    Ok(if exit_code == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
