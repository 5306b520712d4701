// ==========================================
// Delivery Window Planner - planning orchestrator
// ==========================================
// Responsibility: run one planning pipeline end to end
// Flow: allocate -> parallel initial solves -> relocation loop -> outcomes
//       -> movement reconciliation
// Rule: no global state; a RunContext is threaded through and one
// RunResult is returned
// Rule: a window's order set changes only under that window's lock, and a
// relocation (insert + re-solve) completes before the reconciler reads it
// Rule: priority-locked orders never move; a re-solve that drops one is
// rolled back
// Rule: an allocator capacity cancel is retried in any later window whose
// route frees enough units
// ==========================================

use crate::config::PlannerConfig;
use crate::domain::allocation::OrderOutcome;
use crate::domain::movement::MovementTable;
use crate::domain::order::Order;
use crate::domain::route::{RouteMetrics, RouteResult, TravelTimeMatrix};
use crate::domain::types::{AllocationPass, BlockingResource, FinalState, Origin, RelocationPolicy};
use crate::domain::window::{CapacityConstraint, Window, WindowLoad};
use crate::engine::allocator::{AllocationResult, WindowAllocator};
use crate::engine::disposition::{order_score, DispositionBand, DispositionResolver};
use crate::engine::error::{PlannerError, PlannerResult};
use crate::engine::reconciler::MovementReconciler;
use crate::engine::relocation_queue::{RelocationQueue, RelocationTask, TaskCause};
use crate::engine::router::{Router, RouterAdapter};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

// ==========================================
// Run input / context / result
// ==========================================
#[derive(Debug, Clone)]
pub struct RunInput {
    pub orders: Vec<Order>,
    pub windows: Vec<Window>,
    pub capacities: HashMap<String, u32>, // per-window capacity overrides
    pub matrix: TravelTimeMatrix,
}

/// Per-run state threaded through the pipeline.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub config: PlannerConfig,
    pub cancel: CancellationToken,
}

impl RunContext {
    pub fn new(config: PlannerConfig, cancel: CancellationToken) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            config,
            cancel,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowReport {
    pub window: Window,
    pub kept_orders: Vec<String>, // route order; allocation order when degraded
    pub route: RouteResult,
    pub metrics: Option<RouteMetrics>,
    pub degraded: bool,
    pub warning: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelocationRecord {
    pub task_id: String,
    pub order_id: String,
    pub cause: TaskCause,
    pub from_window: String,
    pub band: DispositionBand,
    pub avg_travel_to_cluster_min: Option<f64>,
    pub attempted: Vec<String>,
    pub placed_in: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub router: String,
    pub orders: Vec<Order>, // assigned_window and final_state filled in
    pub outcomes: Vec<OrderOutcome>,
    pub windows: Vec<WindowReport>,
    pub movement: MovementTable,
    pub relocations: Vec<RelocationRecord>,
    pub warnings: Vec<String>,
}

impl RunResult {
    pub fn outcome(&self, order_id: &str) -> Option<&OrderOutcome> {
        self.outcomes.iter().find(|o| o.order_id == order_id)
    }

    pub fn window(&self, window_id: &str) -> Option<&WindowReport> {
        self.windows.iter().find(|w| w.window.window_id == window_id)
    }
}

// ==========================================
// WindowSlot - mutable per-window state (behind a Mutex)
// ==========================================
#[derive(Debug)]
struct WindowSlot {
    order_ids: Vec<String>, // current kept set (assigned set when degraded)
    route: RouteResult,
    load: WindowLoad,
    degraded: bool,
    warning: Option<String>,
}

/// Terminal resolver verdict for an order that left the router's kept list.
#[derive(Debug, Clone)]
struct Verdict {
    blocking: Option<BlockingResource>,
    audit_reason: String,
    avg_to_cluster: Option<f64>,
}

// ==========================================
// PlanningOrchestrator
// ==========================================
pub struct PlanningOrchestrator<R: Router> {
    router: Arc<R>,
    config: PlannerConfig,
    allocator: WindowAllocator,
    reconciler: MovementReconciler,
}

impl<R: Router> PlanningOrchestrator<R> {
    pub fn new(router: Arc<R>, config: PlannerConfig) -> Self {
        Self {
            router,
            config,
            allocator: WindowAllocator::new(),
            reconciler: MovementReconciler::new(),
        }
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Synchronous entry point; reuses the caller's runtime when there is one.
    pub fn run_blocking(&self, input: RunInput) -> PlannerResult<RunResult> {
        let cancel = CancellationToken::new();
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            tokio::task::block_in_place(|| handle.block_on(self.run(input, cancel)))
        } else {
            let runtime = tokio::runtime::Runtime::new().map_err(|e| PlannerError::Other(e.into()))?;
            runtime.block_on(self.run(input, cancel))
        }
    }

    #[instrument(skip_all, fields(orders = input.orders.len(), windows = input.windows.len()))]
    pub async fn run(&self, input: RunInput, cancel: CancellationToken) -> PlannerResult<RunResult> {
        let ctx = RunContext::new(self.config.clone(), cancel);
        let config = &ctx.config;
        config.validate().map_err(PlannerError::Config)?;
        input.matrix.validate().map_err(PlannerError::MatrixMismatch)?;

        info!(run_id = %ctx.run_id, router = self.router.name(), "planning run started");

        // ==========================================
        // Step 0: reset pipeline-owned fields
        // ==========================================
        let orders: Vec<Order> = input.orders.iter().map(|o| o.reset_pipeline_fields()).collect();
        let matrix = Arc::new(input.matrix);
        let adapter = RouterAdapter::new(
            self.router.clone(),
            matrix.clone(),
            config.service_time_model.clone(),
            config.drop_penalty,
            config.solver_time_budget_ms,
            config.solver_timeout_grace_ms,
        );
        if let Some(missing) = orders.iter().find(|o| !adapter.matrix_index().contains(&o.order_id)) {
            return Err(PlannerError::MatrixMismatch(format!(
                "order {} has no row in the travel-time matrix",
                missing.order_id
            )));
        }

        // ==========================================
        // Step 1: cross-window allocation
        // ==========================================
        let allocation = self.allocator.allocate(&orders, &input.windows, &input.capacities, config)?;
        let windows = allocation.windows.clone();
        let rank_of: HashMap<&str, usize> = windows
            .iter()
            .enumerate()
            .map(|(i, w)| (w.window_id.as_str(), i))
            .collect();
        let by_id: HashMap<&str, &Order> = orders.iter().map(|o| (o.order_id.as_str(), o)).collect();

        // ==========================================
        // Step 2: initial solves, in parallel
        // ==========================================
        if ctx.cancel.is_cancelled() {
            return Err(PlannerError::Cancelled);
        }
        let mut warnings = Vec::new();
        let initial = self.initial_solves(&ctx, &adapter, &allocation, &by_id).await?;

        let mut slots = Vec::with_capacity(windows.len());
        let mut queue = RelocationQueue::new(self.task_budget(orders.len(), windows.len()));
        let mut hints: HashMap<String, Option<String>> = HashMap::new();
        let mut verdicts: HashMap<String, Verdict> = HashMap::new();
        let locked: HashSet<&str> = allocation
            .decisions
            .iter()
            .filter(|d| d.pass == AllocationPass::PriorityLock)
            .map(|d| d.order_id.as_str())
            .collect();

        for (rank, outcome) in initial.into_iter().enumerate() {
            let window = &windows[rank];
            let assigned = sorted_ids(allocation.assigned_to(&window.window_id));
            let mut load = allocation.loads[rank].clone();
            match outcome {
                Ok(route) => {
                    for dropped in &route.dropped {
                        if let Some(order) = by_id.get(dropped.order_id.as_str()) {
                            load.release(order.units);
                        }
                        if locked.contains(dropped.order_id.as_str()) {
                            let cluster = route.kept_ids();
                            let avg = matrix.avg_travel_to(adapter.matrix_index(), &dropped.order_id, &cluster);
                            let hint_text = dropped.hint.as_ref().map(|h| format!(" ({})", h)).unwrap_or_default();
                            info!(order_id = %dropped.order_id, window_id = %window.window_id, "priority-locked order dropped, not relocated");
                            verdicts.insert(
                                dropped.order_id.clone(),
                                Verdict {
                                    blocking: Some(BlockingResource::TimeRoute),
                                    audit_reason: format!(
                                        "PRIORITY_LOCK: dropped by the router in {}{}, pinned orders are not relocated",
                                        window.window_id, hint_text
                                    ),
                                    avg_to_cluster: avg,
                                },
                            );
                            continue;
                        }
                        hints.insert(dropped.order_id.clone(), dropped.hint.clone());
                        queue.push(RelocationTask::new(dropped.order_id.clone(), rank, TaskCause::RouterDrop));
                    }
                    slots.push(Mutex::new(WindowSlot {
                        order_ids: route.kept_ids(),
                        route,
                        load,
                        degraded: false,
                        warning: None,
                    }));
                }
                Err(e) => {
                    let message = format!(
                        "WINDOW_DEGRADED: {}; {} orders keep their allocation without a route",
                        e,
                        assigned.len()
                    );
                    warn!(window_id = %window.window_id, error = %e, "window degraded");
                    warnings.push(message.clone());
                    slots.push(Mutex::new(WindowSlot {
                        order_ids: assigned,
                        route: RouteResult {
                            window_id: window.window_id.clone(),
                            ..Default::default()
                        },
                        load,
                        degraded: true,
                        warning: Some(message),
                    }));
                }
            }
        }

        // ==========================================
        // Step 3: relocation loop (fixed point)
        // ==========================================
        let resolver = DispositionResolver::new(config);
        let mut relocations: HashMap<String, u32> = allocation
            .decisions
            .iter()
            .map(|d| (d.order_id.clone(), d.relocations))
            .collect();
        let mut records = Vec::new();
        let mut tried: HashSet<(String, usize)> = HashSet::new();
        self.queue_capacity_rescues(config, &allocation, &slots, &rank_of, &by_id, &relocations, &tried, &mut queue)
            .await;

        while let Some(task) = queue.pop() {
            if ctx.cancel.is_cancelled() {
                return Err(PlannerError::Cancelled);
            }
            let Some(order) = by_id.get(task.order_id.as_str()).copied() else {
                continue;
            };
            tried.insert((order.order_id.clone(), task.from_rank));
            let done = relocations.get(&order.order_id).copied().unwrap_or(0);

            let (record, verdict) = self
                .resolve_task(
                    &ctx,
                    &adapter,
                    &resolver,
                    &windows,
                    &slots,
                    &task,
                    order,
                    &by_id,
                    &locked,
                    done,
                    &mut tried,
                    &mut queue,
                    hints.get(&order.order_id).cloned().flatten(),
                )
                .await?;

            match verdict {
                Some(verdict) => {
                    verdicts.insert(order.order_id.clone(), verdict);
                }
                None => {
                    verdicts.remove(&order.order_id);
                    relocations.insert(order.order_id.clone(), done + 1);
                }
            }
            let committed = record.placed_in.is_some();
            records.push(record);
            if committed {
                // a displacement may have left room for a capacity cancel
                self.queue_capacity_rescues(config, &allocation, &slots, &rank_of, &by_id, &relocations, &tried, &mut queue)
                    .await;
            }
        }

        if queue.is_exhausted() && !queue.is_empty() {
            let remaining = queue.drain_remaining();
            warn!(
                processed = queue.processed(),
                remaining = remaining.len(),
                "relocation loop guard tripped"
            );
            warnings.push(format!(
                "LOOP_GUARD: relocation budget spent after {} tasks; {} orders cancelled",
                queue.processed(),
                remaining.len()
            ));
            for task in remaining {
                verdicts.insert(
                    task.order_id.clone(),
                    Verdict {
                        blocking: Some(BlockingResource::TimeRoute),
                        audit_reason: format!(
                            "LOOP_GUARD: relocation budget spent while leaving {}",
                            windows[task.from_rank].window_id
                        ),
                        avg_to_cluster: None,
                    },
                );
            }
        }

        // ==========================================
        // Step 4: final placement, outcomes, window reports
        // ==========================================
        let mut kept_by_window: HashMap<String, Vec<String>> = HashMap::new();
        let mut placed: HashMap<String, usize> = HashMap::new();
        let mut reports = Vec::with_capacity(windows.len());
        for (rank, slot) in slots.iter().enumerate() {
            let slot = slot.lock().await;
            let window = &windows[rank];
            let kept = if slot.degraded {
                slot.order_ids.clone()
            } else {
                slot.route.kept_ids()
            };
            for id in &kept {
                placed.insert(id.clone(), rank);
            }
            let metrics = if slot.degraded {
                None
            } else {
                let kept_orders: Vec<&Order> = kept.iter().filter_map(|id| by_id.get(id.as_str()).copied()).collect();
                Some(adapter.route_metrics(window, &slot.route, &kept_orders))
            };
            kept_by_window.insert(window.window_id.clone(), kept.clone());
            reports.push(WindowReport {
                window: window.clone(),
                kept_orders: kept,
                route: slot.route.clone(),
                metrics,
                degraded: slot.degraded,
                warning: slot.warning.clone(),
            });
        }

        let mut final_orders = Vec::with_capacity(orders.len());
        let mut outcomes = Vec::with_capacity(orders.len());
        for order in &orders {
            let requested_rank = rank_of[order.requested_window.as_str()];
            let decision = allocation.decision(&order.order_id);
            let verdict = verdicts.get(&order.order_id);
            let relocated = relocations.get(&order.order_id).copied().unwrap_or(0);

            let (assigned, state, sequence_index, arrival_min, avg) = match placed.get(&order.order_id) {
                Some(&rank) => {
                    let slot = slots[rank].lock().await;
                    let stop = slot.route.kept_stop(&order.order_id);
                    let cluster = kept_by_window
                        .get(&windows[rank].window_id)
                        .map(|v| v.as_slice())
                        .unwrap_or(&[]);
                    (
                        Some(windows[rank].window_id.clone()),
                        FinalState::from_placement(requested_rank, rank),
                        stop.map(|s| s.sequence_index),
                        stop.map(|s| s.arrival_min),
                        matrix.avg_travel_to(adapter.matrix_index(), &order.order_id, cluster),
                    )
                }
                None => (None, FinalState::Cancel, None, None, verdict.and_then(|v| v.avg_to_cluster)),
            };

            let (blocking, audit_reason) = match (verdict, decision) {
                (Some(v), _) if assigned.is_none() => (v.blocking, v.audit_reason.clone()),
                _ => match records.iter().rev().find(|r| r.order_id == order.order_id && r.placed_in.is_some()) {
                    Some(r) if r.cause == TaskCause::CapacityRescue => (
                        Some(BlockingResource::Capacity),
                        format!(
                            "CAPACITY_OVERFLOW: {} full, moved to {} after routing freed capacity",
                            r.from_window,
                            r.placed_in.clone().unwrap_or_default()
                        ),
                    ),
                    Some(r) => (
                        Some(BlockingResource::TimeRoute),
                        format!(
                            "TIME_ROUTE: dropped by the router in {}, relocated to {}",
                            r.from_window,
                            r.placed_in.clone().unwrap_or_default()
                        ),
                    ),
                    None => decision
                        .map(|d| (d.blocking, d.audit_reason.clone()))
                        .unwrap_or((None, String::new())),
                },
            };

            let distance = avg.unwrap_or(match state {
                FinalState::Cancel => resolver.cancel_threshold_min(),
                _ => 0.0,
            });
            let origin = match &assigned {
                Some(w) if *w != order.requested_window => Origin::Received,
                _ => Origin::Original,
            };

            let mut final_order = order.clone();
            final_order.assigned_window = assigned.clone();
            final_order.final_state = Some(state);
            final_orders.push(final_order);

            outcomes.push(OrderOutcome {
                order_id: order.order_id.clone(),
                requested_window: order.requested_window.clone(),
                assigned_window: assigned,
                origin,
                final_state: state,
                blocking,
                audit_reason,
                relocations: relocated,
                sequence_index,
                arrival_min,
                avg_travel_to_cluster_min: avg,
                score: order_score(state, distance, order.units),
            });
        }

        // ==========================================
        // Step 5: movement reconciliation (fatal on mismatch)
        // ==========================================
        let movement = self
            .reconciler
            .reconcile(&final_orders, &windows, &kept_by_window, input.orders.len())?;

        info!(
            run_id = %ctx.run_id,
            orders = final_orders.len(),
            relocation_tasks = queue.processed(),
            degraded_windows = reports.iter().filter(|r| r.degraded).count(),
            "planning run finished"
        );

        Ok(RunResult {
            run_id: ctx.run_id,
            started_at: ctx.started_at,
            finished_at: Utc::now(),
            router: self.router.name().to_string(),
            orders: final_orders,
            outcomes,
            windows: reports,
            movement,
            relocations: records,
            warnings,
        })
    }

    /// Queue budget: every order may bounce through every window a few times.
    fn task_budget(&self, orders: usize, windows: usize) -> usize {
        orders.max(1) * (self.config.max_relocations as usize + 2) * windows.max(1)
    }

    /// Solves every window's allocated set with at most
    /// `max_concurrent_solves` in flight. Router failures come back per
    /// window; cancellation and input errors abort the run.
    async fn initial_solves(
        &self,
        ctx: &RunContext,
        adapter: &RouterAdapter<R>,
        allocation: &AllocationResult,
        by_id: &HashMap<&str, &Order>,
    ) -> PlannerResult<Vec<PlannerResult<RouteResult>>> {
        let jobs: Vec<(Window, Vec<Order>)> = allocation
            .windows
            .iter()
            .map(|w| {
                let orders = sorted_ids(allocation.assigned_to(&w.window_id))
                    .iter()
                    .filter_map(|id| by_id.get(id.as_str()).map(|o| (*o).clone()))
                    .collect();
                (w.clone(), orders)
            })
            .collect();

        let mut results: Vec<PlannerResult<RouteResult>> = stream::iter(jobs.into_iter().map(|(window, orders)| {
            let adapter = adapter.clone();
            let cancel = ctx.cancel.clone();
            async move {
                let refs: Vec<&Order> = orders.iter().collect();
                adapter.solve_window(&window, &refs, &cancel).await
            }
        }))
        .buffered(ctx.config.max_concurrent_solves)
        .collect()
        .await;

        if let Some(pos) = results
            .iter()
            .position(|r| matches!(r, Err(e) if !e.is_window_failure()))
        {
            if let Err(e) = results.swap_remove(pos) {
                return Err(e);
            }
        }
        Ok(results)
    }

    /// Queues allocator capacity cancels (passes 6 and 7) that now fit a
    /// later window they have not been tried in. Orders already placed once
    /// this run are left to the displacement path.
    #[allow(clippy::too_many_arguments)]
    async fn queue_capacity_rescues(
        &self,
        config: &PlannerConfig,
        allocation: &AllocationResult,
        slots: &[Mutex<WindowSlot>],
        rank_of: &HashMap<&str, usize>,
        by_id: &HashMap<&str, &Order>,
        relocations: &HashMap<String, u32>,
        tried: &HashSet<(String, usize)>,
        queue: &mut RelocationQueue,
    ) {
        for decision in allocation.cancelled() {
            if decision.blocking != Some(BlockingResource::Capacity)
                || !matches!(decision.pass, AllocationPass::ForwardRescue | AllocationPass::DeferredLarge)
                || relocations.get(&decision.order_id).copied().unwrap_or(0) > decision.relocations
            {
                continue;
            }
            let Some(order) = by_id.get(decision.order_id.as_str()).copied() else {
                continue;
            };
            let Some(&origin) = rank_of.get(order.requested_window.as_str()) else {
                continue;
            };
            if !config.has_headroom(order.prior_reschedule_count, 0) {
                continue;
            }
            for rank in origin + 1..slots.len() {
                if tried.contains(&(order.order_id.clone(), rank)) {
                    continue;
                }
                let slot = slots[rank].lock().await;
                if !slot.degraded && slot.load.can_add_units(order.units) {
                    debug!(order_id = %order.order_id, rank, "capacity freed, rescue queued");
                    queue.push(RelocationTask::new(order.order_id.clone(), origin, TaskCause::CapacityRescue));
                    break;
                }
            }
        }
    }

    /// Disposes of one dropped order. Returns the relocation record and,
    /// when the order could not be placed, its terminal verdict.
    #[allow(clippy::too_many_arguments)]
    async fn resolve_task(
        &self,
        ctx: &RunContext,
        adapter: &RouterAdapter<R>,
        resolver: &DispositionResolver,
        windows: &[Window],
        slots: &[Mutex<WindowSlot>],
        task: &RelocationTask,
        order: &Order,
        by_id: &HashMap<&str, &Order>,
        locked: &HashSet<&str>,
        done: u32,
        tried: &mut HashSet<(String, usize)>,
        queue: &mut RelocationQueue,
        hint: Option<String>,
    ) -> PlannerResult<(RelocationRecord, Option<Verdict>)> {
        let config = &ctx.config;
        let from = &windows[task.from_rank];
        let index = adapter.matrix_index();

        let cluster = slots[task.from_rank].lock().await.route.kept_ids();
        let avg = adapter.matrix().avg_travel_to(index, &order.order_id, &cluster);
        let band = resolver.band(avg, order.early_eligible);
        let avg_text = avg.map(|a| format!("{:.1} min", a)).unwrap_or_else(|| "no kept cluster".to_string());
        let hint_text = hint.map(|h| format!(" ({})", h)).unwrap_or_default();

        let mut record = RelocationRecord {
            task_id: task.task_id.clone(),
            order_id: order.order_id.clone(),
            cause: task.cause,
            from_window: from.window_id.clone(),
            band,
            avg_travel_to_cluster_min: avg,
            attempted: Vec::new(),
            placed_in: None,
        };
        let rescue = task.cause == TaskCause::CapacityRescue;
        let blocking = if rescue {
            BlockingResource::Capacity
        } else {
            BlockingResource::TimeRoute
        };
        let cancel_with = |reason: String| Verdict {
            blocking: Some(blocking),
            audit_reason: reason,
            avg_to_cluster: avg,
        };

        if band == DispositionBand::Isolated && !rescue {
            debug!(order_id = %order.order_id, avg = ?avg, "isolated order cancelled");
            return Ok((
                record,
                Some(cancel_with(format!(
                    "ISOLATED: dropped by the router in {}{}, {} to the kept cluster",
                    from.window_id, hint_text, avg_text
                ))),
            ));
        }
        if !config.has_headroom(order.prior_reschedule_count, done) {
            return Ok((
                record,
                Some(cancel_with(format!(
                    "RELOCATION_LIMIT: dropped by the router in {}{}, {} prior + {} this run reach the limit of {}",
                    from.window_id, hint_text, order.prior_reschedule_count, done, config.max_relocations
                ))),
            ));
        }

        let mut candidates = if rescue {
            (task.from_rank + 1..windows.len()).collect()
        } else {
            resolver.candidate_ranks(band, task.from_rank, windows.len())
        };
        if config.relocation_policy == RelocationPolicy::MostSpareCapacity {
            let mut spare = HashMap::new();
            for &rank in &candidates {
                spare.insert(rank, slots[rank].lock().await.load.remaining_units());
            }
            candidates.sort_by(|a, b| spare[b].cmp(&spare[a]));
        }

        for rank in candidates {
            if tried.contains(&(order.order_id.clone(), rank)) {
                continue;
            }
            let target = &windows[rank];
            let mut slot = slots[rank].lock().await;
            if slot.degraded || !slot.load.can_add_units(order.units) {
                continue;
            }
            let target_cluster = slot.route.kept_ids();
            let avg_to_target = adapter.matrix().avg_travel_to(index, &order.order_id, &target_cluster);
            if !rescue && !resolver.fits_target_cluster(band, avg_to_target) {
                continue;
            }
            tried.insert((order.order_id.clone(), rank));
            record.attempted.push(target.window_id.clone());

            let mut submitted = slot.order_ids.clone();
            submitted.push(order.order_id.clone());
            submitted.sort();
            let refs: Vec<&Order> = submitted.iter().filter_map(|id| by_id.get(id.as_str()).copied()).collect();

            let route = match adapter.solve_window(target, &refs, &ctx.cancel).await {
                Ok(route) => route,
                Err(e) if !e.is_window_failure() => return Err(e),
                Err(e) => {
                    warn!(order_id = %order.order_id, window_id = %target.window_id, error = %e, "re-solve failed, attempt rolled back");
                    continue;
                }
            };
            if !route.is_kept(&order.order_id) {
                debug!(order_id = %order.order_id, window_id = %target.window_id, "target dropped the order, attempt rolled back");
                continue;
            }
            if let Some(pinned) = route.dropped.iter().find(|d| locked.contains(d.order_id.as_str())) {
                debug!(
                    order_id = %order.order_id,
                    pinned = %pinned.order_id,
                    window_id = %target.window_id,
                    "re-solve dropped a priority-locked order, attempt rolled back"
                );
                continue;
            }

            // commit: the target keeps the order; anything it now drops is displaced
            slot.load.consume(order.units);
            for displaced in route.dropped.iter().filter(|d| d.order_id != order.order_id) {
                if let Some(o) = by_id.get(displaced.order_id.as_str()) {
                    slot.load.release(o.units);
                }
                info!(order_id = %displaced.order_id, window_id = %target.window_id, "order displaced by relocation");
                queue.push(RelocationTask::new(displaced.order_id.clone(), rank, TaskCause::Displaced));
            }
            slot.order_ids = route.kept_ids();
            slot.route = route;

            info!(
                order_id = %order.order_id,
                from = %from.window_id,
                to = %target.window_id,
                band = %band,
                "order relocated"
            );
            record.placed_in = Some(target.window_id.clone());
            return Ok((record, None));
        }

        let reason = if rescue {
            format!(
                "CAPACITY_EXHAUSTED: {} full and no later window kept {} units after routing",
                from.window_id, order.units
            )
        } else {
            format!(
                "NO_FEASIBLE_WINDOW: dropped by the router in {}{}, {} to the kept cluster, no window kept it",
                from.window_id, hint_text, avg_text
            )
        };
        Ok((record, Some(cancel_with(reason))))
    }
}

fn sorted_ids(mut ids: Vec<String>) -> Vec<String> {
    ids.sort();
    ids
}
