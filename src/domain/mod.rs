// ==========================================
// Delivery Window Planner - domain layer
// ==========================================
// Responsibility: entities, enums, capacity constraint interface
// Rule: no I/O, no engine logic
// ==========================================

pub mod allocation;
pub mod movement;
pub mod order;
pub mod route;
pub mod types;
pub mod window;

// Re-export core types
pub use allocation::{AllocationDecision, OrderOutcome};
pub use movement::{MovementRow, MovementTable};
pub use order::{Order, RawOrderRecord};
pub use route::{
    DroppedNode, DroppedStop, KeptNode, KeptStop, MatrixIndex, RouteMetrics, RouteRequest,
    RouteResponse, RouteResult, TravelTimeMatrix,
};
pub use types::{AllocationPass, BlockingResource, FinalState, Origin, RelocationPolicy};
pub use window::{CapacityConstraint, Window, WindowLoad};
