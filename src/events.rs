//! JSONL event stream (`spec.md` §6 "Outputs"): one record per phase
//! transition, written as the run progresses.

use std::io::Write;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{Action, Observation, RunStatus, ScenarioResult, ValidationOutcome};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    RunStart {
        timestamp: DateTime<Utc>,
        run_id: String,
    },
    ScenarioStart {
        timestamp: DateTime<Utc>,
        scenario_id: String,
        goal: String,
    },
    Precondition {
        timestamp: DateTime<Utc>,
        instruction: String,
        tool: String,
        stored_as: String,
    },
    Step {
        timestamp: DateTime<Utc>,
        step: u32,
        action: Action,
        observation: Observation,
        reasoning: String,
        cost_usd: f64,
    },
    ValidationOutcomeEvent {
        timestamp: DateTime<Utc>,
        outcome: ValidationOutcome,
    },
    GoalCheck {
        timestamp: DateTime<Utc>,
        goal_met: bool,
        confidence: f64,
        reasoning: String,
    },
    CriticDecision {
        timestamp: DateTime<Utc>,
        decision: String,
        hint: Option<String>,
    },
    AgentTransition {
        timestamp: DateTime<Utc>,
        from: String,
        to: String,
    },
    EvidenceCitation {
        timestamp: DateTime<Utc>,
        outcome_id: String,
        accepted: bool,
    },
    ScenarioEnd {
        timestamp: DateTime<Utc>,
        result: ScenarioResult,
    },
    RunEnd {
        timestamp: DateTime<Utc>,
        exit_code: i32,
    },
}

impl RunEvent {
    pub fn exit_code_for(status: RunStatus) -> i32 {
        status.exit_code()
    }
}

/// Destination for emitted `RunEvent`s. Abstracted so tests can capture
/// events in memory instead of writing to a real stream.
pub trait EventSink: Send {
    fn emit(&mut self, event: &RunEvent) -> std::io::Result<()>;
}

/// Writes one JSON object per line to the wrapped writer, flushing after
/// every event so a crash mid-run leaves a readable partial trace.
pub struct JsonlEventSink<W: Write> {
    writer: W,
}

impl<W: Write> JsonlEventSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

impl<W: Write + Send> EventSink for JsonlEventSink<W> {
    fn emit(&mut self, event: &RunEvent) -> std::io::Result<()> {
        let line = serde_json::to_string(event).map_err(std::io::Error::other)?;
        writeln!(self.writer, "{line}")?;
        self.writer.flush()
    }
}

/// Captures emitted events in memory; used by tests and by the JSONL
/// round-trip invariant check (`spec.md` §8 invariant 7).
#[derive(Default)]
pub struct RecordingEventSink {
    pub events: Vec<RunEvent>,
}

impl EventSink for RecordingEventSink {
    fn emit(&mut self, event: &RunEvent) -> std::io::Result<()> {
        self.events.push(event.clone());
        Ok(())
    }
}

/// Parses a JSONL buffer, one `RunEvent` per non-empty line.
pub fn parse_jsonl(buffer: &str) -> Result<Vec<RunEvent>, serde_json::Error> {
    buffer
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(serde_json::from_str)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn jsonl_round_trips_run_start() {
        let mut sink = JsonlEventSink::new(Vec::new());
        let event = RunEvent::RunStart {
            timestamp: Utc::now(),
            run_id: "run-1".to_string(),
        };
        sink.emit(&event).unwrap();

        let buffer = String::from_utf8(sink.writer).unwrap();
        let parsed = parse_jsonl(&buffer).unwrap();
        assert_eq!(parsed.len(), 1);
        match &parsed[0] {
            RunEvent::RunStart { run_id, .. } => assert_eq!(run_id, "run-1"),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn recording_sink_preserves_order() {
        let mut sink = RecordingEventSink::default();
        sink.emit(&RunEvent::RunStart {
            timestamp: Utc::now(),
            run_id: "a".to_string(),
        })
        .unwrap();
        sink.emit(&RunEvent::RunEnd {
            timestamp: Utc::now(),
            exit_code: 0,
        })
        .unwrap();
        assert_eq!(sink.events.len(), 2);
    }
}
