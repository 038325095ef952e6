//! Tracing types for checker observability.
//!
//! When `CheckerConfig::trace_inference_at` covers a typing subject, the
//! generator and solver record their reasoning as [`TraceStep`]s written
//! to standard output. All tracing is opt-in; zero overhead when
//! disabled.

use serde::Serialize;

/// Which stage of inference produced a step.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TracePhase {
    /// Constraint generation while walking the expression.
    Generate,
    /// Constraint simplification or branching inside the solver.
    Solve,
    /// Applying the chosen solution back onto the tree.
    Reify,
}

/// A single step in an inference trace.
#[derive(Debug, Clone, Serialize)]
pub struct TraceStep {
    pub phase: TracePhase,
    /// The construct being worked on, rendered as text.
    pub subject: String,
    pub detail: String,
}

impl TraceStep {
    pub fn new(phase: TracePhase, subject: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            phase,
            subject: subject.into(),
            detail: detail.into(),
        }
    }
}

/// Writes trace steps to standard output while enabled.
#[derive(Debug, Default)]
pub struct InferenceTracer {
    enabled: bool,
    steps: usize,
}

impl InferenceTracer {
    pub fn new(enabled: bool) -> Self {
        Self { enabled, steps: 0 }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn emit(&mut self, step: TraceStep) {
        if !self.enabled {
            return;
        }
        let phase = match step.phase {
            TracePhase::Generate => "generate",
            TracePhase::Solve => "solve",
            TracePhase::Reify => "reify",
        };
        println!("[{:>4}] {phase}: {} — {}", self.steps, step.subject, step.detail);
        self.steps += 1;
    }
}
