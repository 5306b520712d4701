// ==========================================
// Delivery Window Planner - engine layer
// ==========================================
// Responsibility: allocation, routing, disposition, reconciliation
// Rule: every decision carries an audit reason
// Rule: the engine does no file I/O
// ==========================================

pub mod allocator;
pub mod disposition;
pub mod error;
pub mod insertion_router;
pub mod orchestrator;
pub mod reconciler;
pub mod relocation_queue;
pub mod router;
pub mod service_time;

// Re-export core engines
pub use allocator::{AllocationResult, WindowAllocator};
pub use disposition::{order_score, DispositionBand, DispositionResolver};
pub use error::{PlannerError, PlannerResult};
pub use insertion_router::CheapestInsertionRouter;
pub use orchestrator::{
    PlanningOrchestrator, RelocationRecord, RunContext, RunInput, RunResult, WindowReport,
};
pub use reconciler::{MovementReconciler, ReconciliationError};
pub use relocation_queue::{RelocationQueue, RelocationTask, TaskCause};
pub use router::{interpret_response, Router, RouterAdapter, RouterError};
pub use service_time::ServiceTimeModel;
