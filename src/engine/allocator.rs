// ==========================================
// Delivery Window Planner - cross-window allocator
// ==========================================
// Responsibility: multi-pass assignment of orders to windows
// Input: orders + windows + per-window capacity overrides + config
// Output: one AllocationDecision per order (input order)
// Rule: later passes never revisit a decision an earlier pass made
// Rule: deterministic; every tie breaks on order id
// ==========================================
// Passes:
// 1 oversize filter  2 priority lock  3 early migration  4 native assignment
// 5 overflow triage  6 forward rescue 7 deferred-large placement
// ==========================================

use crate::config::PlannerConfig;
use crate::domain::allocation::AllocationDecision;
use crate::domain::order::Order;
use crate::domain::types::{AllocationPass, BlockingResource, Origin, RelocationPolicy};
use crate::domain::window::{CapacityConstraint, Window, WindowLoad};
use crate::engine::error::{PlannerError, PlannerResult};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, instrument, warn};

// ==========================================
// AllocationResult
// ==========================================
#[derive(Debug, Clone)]
pub struct AllocationResult {
    pub decisions: Vec<AllocationDecision>, // same order as the input orders
    pub windows: Vec<Window>,               // chronological, effective capacity
    pub loads: Vec<WindowLoad>,             // same order as `windows`
}

impl AllocationResult {
    pub fn decision(&self, order_id: &str) -> Option<&AllocationDecision> {
        self.decisions.iter().find(|d| d.order_id == order_id)
    }

    /// Order ids assigned to `window_id`, in input order.
    pub fn assigned_to(&self, window_id: &str) -> Vec<String> {
        self.decisions
            .iter()
            .filter(|d| d.assigned_window.as_deref() == Some(window_id))
            .map(|d| d.order_id.clone())
            .collect()
    }

    pub fn cancelled(&self) -> Vec<&AllocationDecision> {
        self.decisions.iter().filter(|d| d.is_cancelled()).collect()
    }
}

/// Chronological sort of windows with capacity overrides applied.
pub fn ordered_windows(windows: &[Window], capacities: &HashMap<String, u32>) -> Vec<Window> {
    let mut ordered: Vec<Window> = windows
        .iter()
        .map(|w| {
            let mut w = w.clone();
            if let Some(cap) = capacities.get(&w.window_id) {
                w.capacity_units = *cap;
            }
            w
        })
        .collect();
    ordered.sort_by(|a, b| {
        a.start
            .cmp(&b.start)
            .then(a.end.cmp(&b.end))
            .then(a.window_id.cmp(&b.window_id))
    });
    ordered
}

/// Picks a target rank among `candidates` (nearest first) that can take `units`.
pub fn choose_target(
    loads: &[WindowLoad],
    candidates: &[usize],
    units: u32,
    policy: RelocationPolicy,
) -> Option<usize> {
    let mut feasible = candidates.iter().copied().filter(|&r| loads[r].can_add_units(units));
    match policy {
        RelocationPolicy::ChronologicalNearest => feasible.next(),
        RelocationPolicy::MostSpareCapacity => {
            let mut best: Option<usize> = None;
            for rank in feasible {
                // strict comparison keeps the nearer window on ties
                match best {
                    Some(b) if loads[rank].remaining_units() <= loads[b].remaining_units() => {}
                    _ => best = Some(rank),
                }
            }
            best
        }
    }
}

// ==========================================
// WindowAllocator
// ==========================================
pub struct WindowAllocator {
    // stateless
}

impl Default for WindowAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl WindowAllocator {
    pub fn new() -> Self {
        Self {}
    }

    #[instrument(skip_all, fields(orders = orders.len(), windows = windows.len()))]
    pub fn allocate(
        &self,
        orders: &[Order],
        windows: &[Window],
        capacities: &HashMap<String, u32>,
        config: &PlannerConfig,
    ) -> PlannerResult<AllocationResult> {
        if windows.is_empty() && !orders.is_empty() {
            return Err(PlannerError::InvalidInput("no delivery windows supplied".to_string()));
        }

        let windows = ordered_windows(windows, capacities);
        let rank_of: HashMap<&str, usize> = windows
            .iter()
            .enumerate()
            .map(|(i, w)| (w.window_id.as_str(), i))
            .collect();
        if rank_of.len() != windows.len() {
            return Err(PlannerError::InvalidInput("duplicate window id".to_string()));
        }

        let mut seen = HashSet::new();
        let mut requested = Vec::with_capacity(orders.len());
        for order in orders {
            if !seen.insert(order.order_id.as_str()) {
                return Err(PlannerError::InvalidInput(format!(
                    "duplicate order id {}",
                    order.order_id
                )));
            }
            let rank = rank_of.get(order.requested_window.as_str()).copied().ok_or_else(|| {
                PlannerError::UnknownWindow {
                    order_id: order.order_id.clone(),
                    window_id: order.requested_window.clone(),
                }
            })?;
            requested.push(rank);
        }

        let mut loads: Vec<WindowLoad> = windows
            .iter()
            .map(|w| WindowLoad::new(w.window_id.clone(), w.capacity_units))
            .collect();
        let mut decisions: Vec<Option<AllocationDecision>> = vec![None; orders.len()];

        let decide = |idx: usize,
                      assigned: Option<usize>,
                      pass: AllocationPass,
                      blocking: Option<BlockingResource>,
                      reason: String| {
            let order = &orders[idx];
            let origin = match assigned {
                Some(r) if r != requested[idx] => Origin::Received,
                _ => Origin::Original,
            };
            AllocationDecision {
                order_id: order.order_id.clone(),
                requested_window: order.requested_window.clone(),
                assigned_window: assigned.map(|r| windows[r].window_id.clone()),
                origin,
                pass,
                blocking,
                audit_reason: reason,
                relocations: u32::from(origin == Origin::Received),
            }
        };

        // ==========================================
        // Pass 1: oversize filter
        // ==========================================
        let max_capacity = windows.iter().map(|w| w.capacity_units).max().unwrap_or(0);
        for (idx, order) in orders.iter().enumerate() {
            if order.units > max_capacity {
                decisions[idx] = Some(decide(
                    idx,
                    None,
                    AllocationPass::OversizeFilter,
                    Some(BlockingResource::Capacity),
                    format!(
                        "OVERSIZE: {} units exceed every window capacity (max {})",
                        order.units, max_capacity
                    ),
                ));
            }
        }

        // ==========================================
        // Pass 2: priority lock (optional)
        // ==========================================
        if config.honor_priority {
            for (idx, order) in orders.iter().enumerate() {
                if decisions[idx].is_some() || !order.is_priority(&config.priority_tags) {
                    continue;
                }
                let rank = requested[idx];
                loads[rank].consume(order.units);
                let mut reason = "PRIORITY_LOCK: priority customer pinned to requested window".to_string();
                if loads[rank].is_overflow() {
                    warn!(
                        order_id = %order.order_id,
                        window_id = %windows[rank].window_id,
                        used_units = loads[rank].used_units,
                        capacity_units = loads[rank].capacity_units,
                        "priority lock overcommits window"
                    );
                    reason.push_str(&format!(
                        ", window overcommitted ({}/{})",
                        loads[rank].used_units, loads[rank].capacity_units
                    ));
                }
                decisions[idx] = Some(decide(idx, Some(rank), AllocationPass::PriorityLock, None, reason));
            }
        }

        // ==========================================
        // Pass 3: early migration (smallest first)
        // ==========================================
        let mut early: Vec<usize> = (0..orders.len())
            .filter(|&i| decisions[i].is_none() && orders[i].early_eligible)
            .collect();
        early.sort_by(|&a, &b| {
            orders[a]
                .units
                .cmp(&orders[b].units)
                .then(orders[a].order_id.cmp(&orders[b].order_id))
        });
        for idx in early {
            let order = &orders[idx];
            if !config.has_headroom(order.prior_reschedule_count, 0) {
                continue;
            }
            let origin_rank = requested[idx];
            let origin_start = windows[origin_rank].start;
            let candidates: Vec<usize> = (0..origin_rank)
                .rev()
                .filter(|&r| windows[r].hours_until(origin_start) <= config.early_migration_max_hours)
                .collect();
            if let Some(target) = choose_target(&loads, &candidates, order.units, config.relocation_policy) {
                loads[target].consume(order.units);
                debug!(order_id = %order.order_id, from = %windows[origin_rank].window_id, to = %windows[target].window_id, "early migration");
                decisions[idx] = Some(decide(
                    idx,
                    Some(target),
                    AllocationPass::EarlyMigration,
                    None,
                    format!(
                        "EARLY_MIGRATION: moved from {} to {} (capacity available)",
                        windows[origin_rank].window_id, windows[target].window_id
                    ),
                ));
            }
        }

        // ==========================================
        // Pass 4: native assignment (ascending units)
        // ==========================================
        let mut native: Vec<usize> = (0..orders.len()).filter(|&i| decisions[i].is_none()).collect();
        native.sort_by(|&a, &b| {
            orders[a]
                .units
                .cmp(&orders[b].units)
                .then(orders[a].order_id.cmp(&orders[b].order_id))
        });
        let mut overflow = Vec::new();
        for idx in native {
            let rank = requested[idx];
            if loads[rank].can_add_units(orders[idx].units) {
                loads[rank].consume(orders[idx].units);
                decisions[idx] = Some(decide(
                    idx,
                    Some(rank),
                    AllocationPass::NativeAssignment,
                    None,
                    "NATIVE_ASSIGNMENT: fits requested window".to_string(),
                ));
            } else {
                overflow.push(idx);
            }
        }

        // ==========================================
        // Pass 5: overflow triage (largest first)
        // ==========================================
        overflow.sort_by(|&a, &b| {
            orders[b]
                .units
                .cmp(&orders[a].units)
                .then(orders[a].order_id.cmp(&orders[b].order_id))
        });
        let (deferred, rescue): (Vec<usize>, Vec<usize>) = overflow
            .into_iter()
            .partition(|&i| orders[i].units >= config.large_order_threshold_units);

        // ==========================================
        // Pass 6: forward rescue
        // ==========================================
        for idx in rescue {
            let order = &orders[idx];
            let origin_rank = requested[idx];
            let origin_id = &windows[origin_rank].window_id;
            if !config.has_headroom(order.prior_reschedule_count, 0) {
                decisions[idx] = Some(decide(
                    idx,
                    None,
                    AllocationPass::ForwardRescue,
                    Some(BlockingResource::Capacity),
                    format!(
                        "RELOCATION_LIMIT: {} full and {} prior reschedules reach the limit of {}",
                        origin_id, order.prior_reschedule_count, config.max_relocations
                    ),
                ));
                continue;
            }
            let candidates: Vec<usize> = (origin_rank + 1..windows.len()).collect();
            match choose_target(&loads, &candidates, order.units, config.relocation_policy) {
                Some(target) => {
                    loads[target].consume(order.units);
                    decisions[idx] = Some(decide(
                        idx,
                        Some(target),
                        AllocationPass::ForwardRescue,
                        Some(BlockingResource::Capacity),
                        format!(
                            "CAPACITY_OVERFLOW: {} full, moved to {}",
                            origin_id, windows[target].window_id
                        ),
                    ));
                }
                None => {
                    decisions[idx] = Some(decide(
                        idx,
                        None,
                        AllocationPass::ForwardRescue,
                        Some(BlockingResource::Capacity),
                        format!(
                            "CAPACITY_EXHAUSTED: {} full and no later window has {} spare units",
                            origin_id, order.units
                        ),
                    ));
                }
            }
        }

        // ==========================================
        // Pass 7: deferred-large placement
        // ==========================================
        for idx in deferred {
            let order = &orders[idx];
            let origin_rank = requested[idx];
            let origin_id = windows[origin_rank].window_id.clone();

            if loads[origin_rank].can_add_units(order.units) {
                loads[origin_rank].consume(order.units);
                decisions[idx] = Some(decide(
                    idx,
                    Some(origin_rank),
                    AllocationPass::DeferredLarge,
                    None,
                    "DEFERRED_LARGE: placed in requested window after rescue".to_string(),
                ));
                continue;
            }

            let target = if config.has_headroom(order.prior_reschedule_count, 0) {
                let candidates: Vec<usize> = (origin_rank + 1..windows.len()).collect();
                choose_target(&loads, &candidates, order.units, config.relocation_policy)
            } else {
                None
            };
            let decision = match target {
                Some(target) => {
                    loads[target].consume(order.units);
                    decide(
                        idx,
                        Some(target),
                        AllocationPass::DeferredLarge,
                        Some(BlockingResource::Capacity),
                        format!(
                            "CAPACITY_OVERFLOW: large order ({} units) moved from {} to {}",
                            order.units, origin_id, windows[target].window_id
                        ),
                    )
                }
                None => decide(
                    idx,
                    None,
                    AllocationPass::DeferredLarge,
                    Some(BlockingResource::Capacity),
                    format!(
                        "CAPACITY_EXHAUSTED: large order ({} units) fits neither {} nor a later window",
                        order.units, origin_id
                    ),
                ),
            };
            decisions[idx] = Some(decision);
        }

        let mut out = Vec::with_capacity(orders.len());
        for (idx, decision) in decisions.into_iter().enumerate() {
            let decision = decision.ok_or_else(|| {
                PlannerError::Other(anyhow::anyhow!(
                    "allocator left order {} undecided",
                    orders[idx].order_id
                ))
            })?;
            out.push(decision);
        }

        let cancelled = out.iter().filter(|d| d.is_cancelled()).count();
        let moved = out.iter().filter(|d| d.origin == Origin::Received).count();
        info!(
            orders = out.len(),
            moved,
            cancelled,
            "allocation complete"
        );

        Ok(AllocationResult {
            decisions: out,
            windows,
            loads,
        })
    }
}
