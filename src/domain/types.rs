// ==========================================
// Delivery Window Planner - domain type definitions
// ==========================================
// Serialization: SCREAMING_SNAKE_CASE (same strings as reports)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// FinalState - dispatcher-facing order state
// ==========================================
// Rule: exactly one per order, derived from physical placement
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FinalState {
    InWindow,     // kept by the router of the requested window
    Received,     // target-window view of a relocated order
    DeliverEarly, // kept by the router of an earlier window
    Reschedule,   // kept by the router of a later window
    Cancel,       // not kept by any router
}

impl FinalState {
    /// Column order of the movement table.
    pub const ALL: [FinalState; 5] = [
        FinalState::InWindow,
        FinalState::Received,
        FinalState::DeliverEarly,
        FinalState::Reschedule,
        FinalState::Cancel,
    ];

    /// Report label used in table headers.
    pub fn label(&self) -> &'static str {
        match self {
            FinalState::InWindow => "In Window",
            FinalState::Received => "Received",
            FinalState::DeliverEarly => "Deliver Early",
            FinalState::Reschedule => "Reschedule",
            FinalState::Cancel => "Cancel",
        }
    }

    /// Derives the state of a placed order from the chronological positions of its
    /// requested and final windows.
    pub fn from_placement(requested_rank: usize, assigned_rank: usize) -> Self {
        use std::cmp::Ordering;
        match assigned_rank.cmp(&requested_rank) {
            Ordering::Equal => FinalState::InWindow,
            Ordering::Less => FinalState::DeliverEarly,
            Ordering::Greater => FinalState::Reschedule,
        }
    }
}

impl fmt::Display for FinalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FinalState::InWindow => write!(f, "IN_WINDOW"),
            FinalState::Received => write!(f, "RECEIVED"),
            FinalState::DeliverEarly => write!(f, "DELIVER_EARLY"),
            FinalState::Reschedule => write!(f, "RESCHEDULE"),
            FinalState::Cancel => write!(f, "CANCEL"),
        }
    }
}

// ==========================================
// Origin - how an order entered its window
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Origin {
    Original, // requested this window
    Received, // relocated into this window
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Original => write!(f, "ORIGINAL"),
            Origin::Received => write!(f, "RECEIVED"),
        }
    }
}

// ==========================================
// BlockingResource - what stopped an order
// ==========================================
// CAPACITY: the allocator never reached the router for the order
// TIME: capacity was sufficient but a router dropped the order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlockingResource {
    Capacity,
    TimeRoute,
}

impl fmt::Display for BlockingResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockingResource::Capacity => write!(f, "CAPACITY_CONSTRAINT"),
            BlockingResource::TimeRoute => write!(f, "TIME_CONSTRAINT"),
        }
    }
}

// ==========================================
// AllocationPass - allocator stage that decided an order
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AllocationPass {
    OversizeFilter,
    PriorityLock,
    EarlyMigration,
    NativeAssignment,
    ForwardRescue,
    DeferredLarge,
}

impl fmt::Display for AllocationPass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllocationPass::OversizeFilter => write!(f, "OVERSIZE_FILTER"),
            AllocationPass::PriorityLock => write!(f, "PRIORITY_LOCK"),
            AllocationPass::EarlyMigration => write!(f, "EARLY_MIGRATION"),
            AllocationPass::NativeAssignment => write!(f, "NATIVE_ASSIGNMENT"),
            AllocationPass::ForwardRescue => write!(f, "FORWARD_RESCUE"),
            AllocationPass::DeferredLarge => write!(f, "DEFERRED_LARGE"),
        }
    }
}

// ==========================================
// RelocationPolicy - target selection among windows with capacity
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelocationPolicy {
    /// First window in chronological distance order that has room.
    #[default]
    ChronologicalNearest,
    /// Window with the most spare units; chronological distance breaks ties.
    MostSpareCapacity,
}

impl RelocationPolicy {
    /// Parses a config value, `None` when unrecognized.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "CHRONOLOGICAL_NEAREST" => Some(RelocationPolicy::ChronologicalNearest),
            "MOST_SPARE_CAPACITY" => Some(RelocationPolicy::MostSpareCapacity),
            _ => None,
        }
    }
}

impl fmt::Display for RelocationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelocationPolicy::ChronologicalNearest => write!(f, "CHRONOLOGICAL_NEAREST"),
            RelocationPolicy::MostSpareCapacity => write!(f, "MOST_SPARE_CAPACITY"),
        }
    }
}
