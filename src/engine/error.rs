// ==========================================
// Delivery Window Planner - engine error types
// ==========================================

use crate::engine::reconciler::ReconciliationError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlannerError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Order {order_id} requests unknown window '{window_id}'")]
    UnknownWindow { order_id: String, window_id: String },

    #[error("Travel-time matrix mismatch: {0}")]
    MatrixMismatch(String),

    #[error("Router failed for window {window_id}: {message}")]
    Router { window_id: String, message: String },

    #[error("Router timed out for window {window_id} (budget {budget_ms} ms)")]
    RouterTimeout { window_id: String, budget_ms: u64 },

    #[error("Planning run cancelled")]
    Cancelled,

    #[error(transparent)]
    Reconciliation(#[from] ReconciliationError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PlannerError {
    /// Router failure or timeout confined to one window.
    pub fn is_window_failure(&self) -> bool {
        matches!(self, PlannerError::Router { .. } | PlannerError::RouterTimeout { .. })
    }
}

pub type PlannerResult<T> = Result<T, PlannerError>;
