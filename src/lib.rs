//! # agentic-e2e-runner
//!
//! A multi-agent loop that drives a browser-control collaborator and a
//! data-control collaborator over JSON-RPC to run declarative end-to-end test
//! scenarios, validating each step's observable effect against both the UI
//! and backend state before ever declaring a goal achieved.
//!
//! ## Why this shape?
//! | Concern | This crate | Ad-hoc script runners | Why this helps |
//! |---|---|---|---|
//! | Action space | One closed `Action` enum, dispatched by tag | String-typed tool calls | The dispatcher never reflects on field names |
//! | Planning | Five narrow agents, each a forced single tool call | One do-everything prompt | Each agent's output is schema-checked in isolation |
//! | Safety | A deterministic Policy Guard gates every action | Trust the model | Budgets, selectors, and hosts are enforced outside the model |
//! | Evidence | An append-only store backs every `goal.complete` | Implicit "looks done" | Completion must cite a passing, fresh outcome |
//!
//! ## Quickstart
//! ```rust,no_run
//! use std::collections::HashSet;
//! use std::sync::Arc;
//!
//! use agentic_e2e_runner::config::RunnerConfig;
//! use agentic_e2e_runner::events::JsonlEventSink;
//! use agentic_e2e_runner::mcp::{HttpMcpTransport, ToolRegistry};
//! use agentic_e2e_runner::model::{Budgets, ScenarioSpec};
//! use agentic_e2e_runner::run::Run;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = RunnerConfig::from_env()?;
//! let model = Arc::new(config.build_model()?);
//! let browser = Box::new(HttpMcpTransport::new(&config.mcp_web_url)?);
//! let data = Box::new(HttpMcpTransport::new(&config.mcp_data_url)?);
//! let registry = Arc::new(ToolRegistry::bootstrap(browser, data).await?);
//!
//! let scenario: ScenarioSpec = serde_json::from_str(r#"{
//!     "version": "1",
//!     "id": "login-smoke",
//!     "goal": { "description": "Log in and reach the dashboard", "success": "dashboard is visible" },
//!     "context": { "start_url": "http://localhost:5173/login" },
//!     "constraints": { "max_steps": 20, "max_cost_usd": 1.0 }
//! }"#)?;
//!
//! let mut run = Run::new(
//!     registry,
//!     model,
//!     config.openai_model.clone(),
//!     Budgets::new(scenario.constraints.max_steps, scenario.constraints.max_cost_usd, scenario.constraints.max_wall_seconds),
//!     HashSet::from(["localhost".to_string()]),
//!     "ctx-1",
//!     Box::new(JsonlEventSink::new(std::io::stdout())),
//! );
//!
//! let result = run.run_scenario(&scenario).await;
//! println!("{:?}", result.status);
//! # Ok(())
//! # }
//! ```
//!
//! ## Evidence in this repository
//! - Forced single tool call contract: `src/llm/contract.rs`
//! - Ordered deterministic guard checks: `src/guard.rs`
//! - Append-only evidence with staleness/conflict rules: `src/evidence.rs`
//! - The full Observe/Plan/Guard/Act/Validate/Critic loop: `src/run.rs`

/// The five LLM-backed agents, each a pure typed-prompt-in/typed-JSON-out function.
pub mod agents;
/// UI Actor: dispatches planned actions to the browser collaborator.
pub mod actor;
/// Runtime configuration read from the environment.
pub mod config;
/// Context Assembler: typed, agent-scoped projections of shared memory and evidence.
pub mod context;
/// Phase Controller: stagnation detection and critic-hint handoff.
pub mod controller;
/// Critic: deterministic adjudication of validation outcomes and done-declarations.
pub mod critic;
/// Error types returned by transports, providers, the guard, and the run loop.
pub mod error;
/// Evidence Store: append-only record of validation outcomes.
pub mod evidence;
/// JSONL event stream emitted over the lifetime of a run.
pub mod events;
/// Policy Guard: deterministic pre-action safety checks.
pub mod guard;
/// Provider abstraction and the OpenAI model adapter.
pub mod llm;
/// JSON-RPC client for the two collaborator services.
pub mod mcp;
/// Data model shared by every component.
pub mod model;
/// Probe Broker: template resolution and parallel read-only probe execution.
pub mod probe;
/// The Run object: owns a scenario execution end to end.
pub mod run;
/// Structured logging setup.
pub mod telemetry;

pub use error::{AgentError, GuardError, McpError, ProviderError, RunError};
pub use llm::{ChatModel, ModelCompletion, ModelMessage, ModelToolCall, ModelToolChoice, ModelUsage};
pub use mcp::{HttpMcpTransport, McpTransport, ToolRegistry};
pub use model::{Action, Budgets, RunStatus, ScenarioResult, ScenarioSpec, SharedMemory};
pub use run::Run;
