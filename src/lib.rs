// ==========================================
// Delivery Window Planner - core library
// ==========================================
// Same-day delivery window allocation, router adapter,
// disposition/relocation and movement reconciliation
// ==========================================

// ==========================================
// Modules
// ==========================================

// Domain layer - entities and types
pub mod domain;

// Engine layer - allocation, routing, reconciliation
pub mod engine;

// Intake layer - CSV orders
pub mod importer;

// Configuration layer
pub mod config;

// Logging
pub mod logging;

// ==========================================
// Re-exports
// ==========================================

pub use domain::{
    AllocationDecision, AllocationPass, BlockingResource, FinalState, MovementRow, MovementTable,
    Order, OrderOutcome, Origin, RelocationPolicy, RouteResult, TravelTimeMatrix, Window,
};

pub use engine::{
    CheapestInsertionRouter, MovementReconciler, PlannerError, PlannerResult, PlanningOrchestrator,
    Router, RouterAdapter, RunInput, RunResult, ServiceTimeModel, WindowAllocator,
};

pub use config::{ConfigManager, PlannerConfig};

pub use importer::{ImportError, OrderImporter};

// ==========================================
// Version
// ==========================================

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const APP_NAME: &str = "Delivery Window Planner";
