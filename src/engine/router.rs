// ==========================================
// Delivery Window Planner - router seam and adapter
// ==========================================
// Router: external capacitated single-vehicle solver (trait)
// RouterAdapter: builds per-window requests, bounds each call with a
// timeout, checks the answer and maps nodes back to order ids
// Rule: the adapter has no side effects and decides no dispositions
// ==========================================

use crate::domain::order::Order;
use crate::domain::route::{
    DroppedStop, KeptStop, MatrixIndex, RouteMetrics, RouteRequest, RouteResponse, RouteResult,
    TravelTimeMatrix,
};
use crate::domain::window::Window;
use crate::engine::error::{PlannerError, PlannerResult};
use crate::engine::service_time::ServiceTimeModel;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

// ==========================================
// Router trait
// ==========================================
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RouterError {
    #[error("solver failed: {0}")]
    Failed(String),

    #[error("request infeasible: {0}")]
    Infeasible(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

#[async_trait]
pub trait Router: Send + Sync {
    fn name(&self) -> &str {
        "router"
    }

    /// Solves one window. Node 0 is the depot; every other node must come
    /// back either kept or dropped.
    async fn solve(&self, request: RouteRequest) -> Result<RouteResponse, RouterError>;
}

// ==========================================
// RouterAdapter
// ==========================================
pub struct RouterAdapter<R: Router> {
    router: Arc<R>,
    matrix: Arc<TravelTimeMatrix>,
    index: Arc<MatrixIndex>,
    service_model: ServiceTimeModel,
    drop_penalty: u64,
    time_budget_ms: u64,
    timeout_grace_ms: u64,
}

impl<R: Router> Clone for RouterAdapter<R> {
    fn clone(&self) -> Self {
        Self {
            router: self.router.clone(),
            matrix: self.matrix.clone(),
            index: self.index.clone(),
            service_model: self.service_model.clone(),
            drop_penalty: self.drop_penalty,
            time_budget_ms: self.time_budget_ms,
            timeout_grace_ms: self.timeout_grace_ms,
        }
    }
}

impl<R: Router> RouterAdapter<R> {
    pub fn new(
        router: Arc<R>,
        matrix: Arc<TravelTimeMatrix>,
        service_model: ServiceTimeModel,
        drop_penalty: u64,
        time_budget_ms: u64,
        timeout_grace_ms: u64,
    ) -> Self {
        let index = Arc::new(matrix.index());
        Self {
            router,
            matrix,
            index,
            service_model,
            drop_penalty,
            time_budget_ms,
            timeout_grace_ms,
        }
    }

    pub fn matrix(&self) -> &TravelTimeMatrix {
        &self.matrix
    }

    pub fn matrix_index(&self) -> &MatrixIndex {
        &self.index
    }

    pub fn service_model(&self) -> &ServiceTimeModel {
        &self.service_model
    }

    /// Builds the routing request for `orders` in the given sequence.
    pub fn build_request(&self, window: &Window, orders: &[&Order]) -> PlannerResult<RouteRequest> {
        let order_ids: Vec<String> = orders.iter().map(|o| o.order_id.clone()).collect();
        let travel_minutes = self.matrix.submatrix(&self.index, &order_ids).ok_or_else(|| {
            let missing: Vec<&str> = order_ids
                .iter()
                .filter(|id| !self.index.contains(id))
                .map(|s| s.as_str())
                .collect();
            PlannerError::MatrixMismatch(format!(
                "window {} has orders missing from the matrix: {}",
                window.window_id,
                missing.join(", ")
            ))
        })?;
        let units: Vec<u32> = orders.iter().map(|o| o.units).collect();

        Ok(RouteRequest {
            window_id: window.window_id.clone(),
            order_ids,
            travel_minutes,
            demands: std::iter::once(0).chain(units.iter().copied()).collect(),
            service_minutes: self.service_model.node_minutes(&units),
            vehicle_capacity: window.capacity_units,
            max_route_minutes: window.duration_minutes(),
            drop_penalty: self.drop_penalty,
            time_budget_ms: self.time_budget_ms,
        })
    }

    /// Solves one window's order set.
    #[instrument(skip(self, window, orders, cancel), fields(window_id = %window.window_id, orders = orders.len()))]
    pub async fn solve_window(
        &self,
        window: &Window,
        orders: &[&Order],
        cancel: &CancellationToken,
    ) -> PlannerResult<RouteResult> {
        if orders.is_empty() {
            return Ok(RouteResult {
                window_id: window.window_id.clone(),
                ..Default::default()
            });
        }

        let request = self.build_request(window, orders)?;
        let limit = Duration::from_millis(self.time_budget_ms.saturating_add(self.timeout_grace_ms));
        let started = Instant::now();

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PlannerError::Cancelled),
            outcome = tokio::time::timeout(limit, self.router.solve(request.clone())) => outcome,
        };
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let response = match response {
            Err(_) => {
                warn!(window_id = %window.window_id, budget_ms = self.time_budget_ms, "router timed out");
                return Err(PlannerError::RouterTimeout {
                    window_id: window.window_id.clone(),
                    budget_ms: self.time_budget_ms,
                });
            }
            Ok(Err(e)) => {
                return Err(PlannerError::Router {
                    window_id: window.window_id.clone(),
                    message: e.to_string(),
                })
            }
            Ok(Ok(response)) => response,
        };

        let result = interpret_response(&request, response, elapsed_ms).map_err(|e| PlannerError::Router {
            window_id: window.window_id.clone(),
            message: e.to_string(),
        })?;

        debug!(
            router = self.router.name(),
            kept = result.kept.len(),
            dropped = result.dropped.len(),
            elapsed_ms,
            "window solved"
        );
        Ok(result)
    }

    /// Drive, service and load figures for a solved route.
    pub fn route_metrics(&self, window: &Window, route: &RouteResult, orders: &[&Order]) -> RouteMetrics {
        let units_of = |id: &str| orders.iter().find(|o| o.order_id == id).map(|o| o.units).unwrap_or(0);

        let mut drive_minutes = 0u32;
        let mut prev = 0usize;
        for stop in &route.kept {
            if let Some(node) = self.index.node(&stop.order_id) {
                drive_minutes = drive_minutes.saturating_add(self.matrix.minutes[prev][node]);
                prev = node;
            }
        }
        if !route.kept.is_empty() {
            drive_minutes = drive_minutes.saturating_add(self.matrix.minutes[prev][0]);
        }

        let total_units: u32 = route.kept.iter().map(|s| units_of(&s.order_id)).sum();
        let service_minutes: u32 = route
            .kept
            .iter()
            .map(|s| self.service_model.minutes_for(units_of(&s.order_id)))
            .sum();
        let load_factor_pct = if window.capacity_units == 0 {
            0.0
        } else {
            (total_units as f64 / window.capacity_units as f64 * 1000.0).round() / 10.0
        };

        RouteMetrics {
            stops: route.kept.len(),
            total_units,
            load_factor_pct,
            drive_minutes,
            service_minutes,
            total_minutes: drive_minutes + service_minutes,
        }
    }
}

/// Checks that every submitted node is accounted for exactly once and maps
/// node indices back to order ids, kept stops in route order.
pub fn interpret_response(
    request: &RouteRequest,
    response: RouteResponse,
    elapsed_ms: u64,
) -> Result<RouteResult, RouterError> {
    let n = request.node_count();
    let mut seen = vec![false; n];
    let mut mark = |node: usize| -> Result<(), RouterError> {
        if node == 0 || node >= n {
            return Err(RouterError::InvalidResponse(format!(
                "node {} outside 1..{}",
                node,
                n - 1
            )));
        }
        if seen[node] {
            return Err(RouterError::InvalidResponse(format!("node {} reported twice", node)));
        }
        seen[node] = true;
        Ok(())
    };

    for k in &response.kept {
        mark(k.node)?;
    }
    for d in &response.dropped {
        mark(d.node)?;
    }
    if let Some(missing) = (1..n).find(|&node| !seen[node]) {
        return Err(RouterError::InvalidResponse(format!(
            "node {} neither kept nor dropped",
            missing
        )));
    }

    let mut kept = response.kept;
    kept.sort_by_key(|k| (k.sequence_index, k.node));

    Ok(RouteResult {
        window_id: request.window_id.clone(),
        kept: kept
            .into_iter()
            .enumerate()
            .map(|(seq, k)| KeptStop {
                order_id: request.order_ids[k.node - 1].clone(),
                sequence_index: seq,
                arrival_min: k.arrival_min,
            })
            .collect(),
        dropped: response
            .dropped
            .into_iter()
            .map(|d| DroppedStop {
                order_id: request.order_ids[d.node - 1].clone(),
                hint: d.hint,
            })
            .collect(),
        elapsed_ms,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::route::{DroppedNode, KeptNode};

    fn request() -> RouteRequest {
        RouteRequest {
            window_id: "W".to_string(),
            order_ids: vec!["A".to_string(), "B".to_string(), "C".to_string()],
            travel_minutes: vec![vec![0; 4]; 4],
            demands: vec![0, 1, 1, 1],
            service_minutes: vec![0, 2, 2, 2],
            vehicle_capacity: 10,
            max_route_minutes: 120,
            drop_penalty: 100_000,
            time_budget_ms: 100,
        }
    }

    #[test]
    fn test_interpret_orders_kept_by_sequence() {
        let response = RouteResponse {
            kept: vec![
                KeptNode { node: 3, sequence_index: 1, arrival_min: 9 },
                KeptNode { node: 1, sequence_index: 0, arrival_min: 4 },
            ],
            dropped: vec![DroppedNode { node: 2, hint: Some("duration".to_string()) }],
        };
        let result = interpret_response(&request(), response, 7).unwrap();
        assert_eq!(result.kept_ids(), vec!["A".to_string(), "C".to_string()]);
        assert_eq!(result.kept[1].sequence_index, 1);
        assert_eq!(result.dropped[0].order_id, "B");
        assert_eq!(result.elapsed_ms, 7);
    }

    #[test]
    fn test_interpret_rejects_missing_and_duplicate_nodes() {
        let missing = RouteResponse {
            kept: vec![KeptNode { node: 1, sequence_index: 0, arrival_min: 1 }],
            dropped: vec![DroppedNode { node: 2, hint: None }],
        };
        let err = interpret_response(&request(), missing, 0).unwrap_err();
        assert!(err.to_string().contains("node 3 neither kept nor dropped"));

        let duplicate = RouteResponse {
            kept: vec![
                KeptNode { node: 1, sequence_index: 0, arrival_min: 1 },
                KeptNode { node: 2, sequence_index: 1, arrival_min: 2 },
            ],
            dropped: vec![DroppedNode { node: 1, hint: None }, DroppedNode { node: 3, hint: None }],
        };
        assert!(interpret_response(&request(), duplicate, 0).is_err());

        let depot = RouteResponse {
            kept: vec![KeptNode { node: 0, sequence_index: 0, arrival_min: 0 }],
            dropped: vec![],
        };
        assert!(interpret_response(&request(), depot, 0).is_err());
    }
}
