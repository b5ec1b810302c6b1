//! Probe Broker (`spec.md` §4.6): resolves templated parameters and runs the
//! read-only backend calls chosen by the Probe Planner, in parallel.

use serde_json::Value;

use crate::agents::ProbeSpec;
use crate::mcp::ToolRegistry;
use crate::model::{ProbeResult, SharedMemory};

/// Recursively resolves `{{variable.path}}` templates in `value` against
/// `memory`. A template that fails to resolve is left as the literal string.
///
/// Shared with precondition execution (`spec.md` §4.7.1), which resolves the
/// same template syntax against already-populated SharedMemory fields.
pub(crate) fn resolve_templates(value: &Value, memory: &SharedMemory) -> Value {
    match value {
        Value::String(text) => resolve_string_template(text, memory),
        Value::Array(items) => {
            Value::Array(items.iter().map(|item| resolve_templates(item, memory)).collect())
        }
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, val)| (key.clone(), resolve_templates(val, memory)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn resolve_string_template(text: &str, memory: &SharedMemory) -> Value {
    let trimmed = text.trim();
    if let Some(path) = trimmed.strip_prefix("{{").and_then(|s| s.strip_suffix("}}")) {
        if let Some(resolved) = memory.resolve_path(path.trim()) {
            return resolved.clone();
        }
    }
    Value::String(text.to_string())
}

/// Runs every probe in `specs` against `registry`, rejecting any whose tool
/// isn't in the read-only view, and joins all results before returning
/// (`spec.md` §4.6, §8 invariant 4).
pub async fn run_probes(
    registry: &ToolRegistry,
    specs: &[ProbeSpec],
    memory: &SharedMemory,
) -> Vec<ProbeResult> {
    let futures = specs.iter().map(|spec| async move {
        let resolved_params = resolve_templates(&spec.params, memory);
        match registry.call_read_only(&spec.tool, resolved_params).await {
            Ok(response) => ProbeResult {
                tool: spec.tool.clone(),
                success: true,
                response: Some(response),
                error: None,
            },
            Err(err) => ProbeResult {
                tool: spec.tool.clone(),
                success: false,
                response: None,
                error: Some(err.to_string()),
            },
        }
    });

    futures_util::future::join_all(futures).await
}
