use thiserror::Error;

/// Errors raised talking to a collaborator service over the MCP JSON-RPC wire protocol.
#[derive(Debug, Error)]
pub enum McpError {
    #[error("collaborator service unreachable: {0}")]
    Unreachable(String),
    #[error("collaborator returned non-2xx status: {0}")]
    Status(u16),
    #[error("collaborator response was not valid JSON-RPC: {0}")]
    Malformed(String),
    #[error("tool call failed: {0}")]
    ToolError(String),
    #[error("collaborator advertised zero tools")]
    NoTools,
    #[error("unknown tool: {0}")]
    UnknownTool(String),
}

/// Errors raised invoking a [`crate::llm::ChatModel`].
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider request failed: {0}")]
    Request(String),
    #[error("provider response invalid: {0}")]
    Response(String),
}

/// Errors raised by an [`crate::llm::contract::AgentContract`] obtaining structured output.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("agent response failed schema validation even after one reparse attempt: {0}")]
    Protocol(String),
}

/// Reasons the [`crate::guard::PolicyGuard`] rejected a planned action.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GuardError {
    #[error("step budget exhausted ({used}/{max})")]
    StepBudgetExhausted { used: u32, max: u32 },
    #[error("cost budget exhausted (${used:.4}/${max:.4})")]
    CostBudgetExhausted { used: f64, max: f64 },
    #[error("wall-clock budget exhausted ({elapsed}s/{max}s)")]
    WallClockExhausted { elapsed: u64, max: u64 },
    #[error("rate limit exceeded: more than 3 actions in the last second")]
    RateLimited,
    #[error("navigation target not in allowed hosts: {0}")]
    DisallowedHost(String),
    #[error("navigation URL does not parse: {0}")]
    UnparseableUrl(String),
    #[error("element test-id not present in last observation: {0}")]
    UnknownElement(String),
    #[error("selector matches a dangerous pattern: {0}")]
    DangerousSelector(String),
    #[error("selector is an overly broad wildcard: {0}")]
    BroadWildcard(String),
}

/// Top-level error a [`crate::run::Run`] terminates with (`ScenarioResult.status = error`).
#[derive(Debug, Error)]
pub enum RunError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error(transparent)]
    Agent(#[from] AgentError),
    #[error(transparent)]
    Mcp(#[from] McpError),
    #[error("budget exceeded: {0}")]
    Budget(String),
    #[error("evidence store invariant violated: {0}")]
    Invariant(String),
    #[error("scenario spec invalid: {0}")]
    InvalidScenario(String),
}

impl RunError {
    /// Short machine-stable cause label, stored on `ScenarioResult.error`.
    pub fn cause(&self) -> &'static str {
        match self {
            RunError::Transport(_) => "transport",
            RunError::Agent(_) => "protocol",
            RunError::Mcp(_) => "transport",
            RunError::Budget(_) => "budget",
            RunError::Invariant(_) => "invariant",
            RunError::InvalidScenario(_) => "invalid_scenario",
        }
    }
}
