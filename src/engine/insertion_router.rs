// ==========================================
// Delivery Window Planner - built-in single-vehicle router
// ==========================================
// Construction: cheapest insertion under capacity and route duration
// Improvement: 2-opt on the kept sequence, then retry insertion
// Route time: drive + service at the node being left (depot = 0),
// including the return leg to the depot
// ==========================================

use crate::domain::route::{DroppedNode, KeptNode, RouteRequest, RouteResponse};
use crate::engine::router::{Router, RouterError};
use async_trait::async_trait;
use std::time::{Duration, Instant};

pub const HINT_CAPACITY: &str = "capacity";
pub const HINT_DURATION: &str = "duration";

#[derive(Debug, Clone, Default)]
pub struct CheapestInsertionRouter;

impl CheapestInsertionRouter {
    pub fn new() -> Self {
        Self
    }

    /// Synchronous solve; used on a blocking thread by the async trait.
    pub fn solve_sync(&self, request: &RouteRequest) -> Result<RouteResponse, RouterError> {
        let n = request.node_count();
        if request.travel_minutes.len() != n
            || request.travel_minutes.iter().any(|row| row.len() != n)
            || request.demands.len() != n
            || request.service_minutes.len() != n
        {
            return Err(RouterError::Infeasible(format!(
                "request for {} nodes has inconsistent matrix/demand/service sizes",
                n
            )));
        }

        let deadline = Instant::now() + Duration::from_millis(request.time_budget_ms);
        let problem = Problem { request };

        let mut route: Vec<usize> = Vec::new();
        let mut load: u64 = 0;
        let mut pending: Vec<usize> = Vec::new();
        let mut hints: Vec<Option<&'static str>> = vec![None; n];

        for node in 1..n {
            if request.demands[node] > request.vehicle_capacity {
                hints[node] = Some(HINT_CAPACITY);
            } else if problem.route_minutes(&[node]) > request.max_route_minutes as u64 {
                hints[node] = Some(HINT_DURATION);
            } else {
                pending.push(node);
            }
        }

        loop {
            let inserted = problem.insert_cheapest(&mut route, &mut load, &mut pending, deadline);
            let improved = problem.two_opt(&mut route, deadline);
            if (inserted == 0 && !improved) || pending.is_empty() || Instant::now() >= deadline {
                break;
            }
        }

        for &node in &pending {
            let over_capacity = load + request.demands[node] as u64 > request.vehicle_capacity as u64;
            hints[node] = Some(if over_capacity { HINT_CAPACITY } else { HINT_DURATION });
        }

        let arrivals = problem.arrivals(&route);
        let kept = route
            .iter()
            .enumerate()
            .map(|(seq, &node)| KeptNode {
                node,
                sequence_index: seq,
                arrival_min: arrivals[seq].min(u32::MAX as u64) as u32,
            })
            .collect();
        let dropped = (1..n)
            .filter(|node| !route.contains(node))
            .map(|node| DroppedNode {
                node,
                hint: hints[node].map(|h| h.to_string()),
            })
            .collect();

        Ok(RouteResponse { kept, dropped })
    }
}

#[async_trait]
impl Router for CheapestInsertionRouter {
    fn name(&self) -> &str {
        "cheapest-insertion"
    }

    async fn solve(&self, request: RouteRequest) -> Result<RouteResponse, RouterError> {
        let router = self.clone();
        tokio::task::spawn_blocking(move || router.solve_sync(&request))
            .await
            .map_err(|e| RouterError::Failed(format!("solver task aborted: {}", e)))?
    }
}

// ==========================================
// Problem - cost evaluation helpers
// ==========================================
struct Problem<'a> {
    request: &'a RouteRequest,
}

impl Problem<'_> {
    fn leg(&self, from: usize, to: usize) -> u64 {
        self.request.travel_minutes[from][to] as u64 + self.request.service_minutes[from] as u64
    }

    /// Depot-to-depot minutes for a sequence.
    fn route_minutes(&self, route: &[usize]) -> u64 {
        let mut prev = 0;
        let mut total = 0;
        for &node in route {
            total += self.leg(prev, node);
            prev = node;
        }
        total + self.leg(prev, 0)
    }

    /// Cumulative minutes at arrival to each stop.
    fn arrivals(&self, route: &[usize]) -> Vec<u64> {
        let mut prev = 0;
        let mut time = 0;
        route
            .iter()
            .map(|&node| {
                time += self.leg(prev, node);
                prev = node;
                time
            })
            .collect()
    }

    fn insertion_delta(&self, route: &[usize], position: usize, node: usize) -> u64 {
        let prev = if position == 0 { 0 } else { route[position - 1] };
        let next = if position == route.len() { 0 } else { route[position] };
        (self.leg(prev, node) + self.leg(node, next)).saturating_sub(self.leg(prev, next))
    }

    /// Inserts pending nodes one at a time at the globally cheapest feasible
    /// position. Returns how many were inserted.
    fn insert_cheapest(
        &self,
        route: &mut Vec<usize>,
        load: &mut u64,
        pending: &mut Vec<usize>,
        deadline: Instant,
    ) -> usize {
        let max_minutes = self.request.max_route_minutes as u64;
        let capacity = self.request.vehicle_capacity as u64;
        let mut inserted = 0;

        loop {
            if Instant::now() >= deadline {
                break;
            }
            let current = self.route_minutes(route);
            let mut best: Option<(u64, usize, usize)> = None; // (delta, pending idx, position)

            for (pi, &node) in pending.iter().enumerate() {
                if *load + self.request.demands[node] as u64 > capacity {
                    continue;
                }
                for position in 0..=route.len() {
                    let delta = self.insertion_delta(route, position, node);
                    if current + delta > max_minutes || delta > self.request.drop_penalty {
                        continue;
                    }
                    let better = match best {
                        None => true,
                        Some((bd, bpi, bpos)) => {
                            (delta, node, position) < (bd, pending[bpi], bpos)
                        }
                    };
                    if better {
                        best = Some((delta, pi, position));
                    }
                }
            }

            match best {
                Some((_, pi, position)) => {
                    let node = pending.remove(pi);
                    route.insert(position, node);
                    *load += self.request.demands[node] as u64;
                    inserted += 1;
                }
                None => break,
            }
        }
        inserted
    }

    /// First-improvement 2-opt; returns whether the route got shorter.
    fn two_opt(&self, route: &mut [usize], deadline: Instant) -> bool {
        if route.len() < 3 {
            return false;
        }
        let mut best = self.route_minutes(route);
        let mut improved_any = false;
        let mut improved = true;

        while improved {
            improved = false;
            for i in 0..route.len() - 1 {
                for j in i + 1..route.len() {
                    if Instant::now() >= deadline {
                        return improved_any;
                    }
                    route[i..=j].reverse();
                    let candidate = self.route_minutes(route);
                    if candidate < best {
                        best = candidate;
                        improved = true;
                        improved_any = true;
                    } else {
                        route[i..=j].reverse();
                    }
                }
            }
        }
        improved_any
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(travel: Vec<Vec<u32>>, demands: Vec<u32>, capacity: u32, max_minutes: u32) -> RouteRequest {
        let n = travel.len();
        RouteRequest {
            window_id: "W".to_string(),
            order_ids: (1..n).map(|i| format!("O{i}")).collect(),
            travel_minutes: travel,
            demands,
            service_minutes: vec![0; n],
            vehicle_capacity: capacity,
            max_route_minutes: max_minutes,
            drop_penalty: 100_000,
            time_budget_ms: 1_000,
        }
    }

    #[test]
    fn test_keeps_all_when_feasible() {
        let travel = vec![
            vec![0, 5, 5, 5],
            vec![5, 0, 1, 2],
            vec![5, 1, 0, 1],
            vec![5, 2, 1, 0],
        ];
        let response = CheapestInsertionRouter
            .solve_sync(&request(travel, vec![0, 1, 1, 1], 10, 120))
            .unwrap();
        assert_eq!(response.kept.len(), 3);
        assert!(response.dropped.is_empty());
        let seqs: Vec<usize> = response.kept.iter().map(|k| k.sequence_index).collect();
        assert_eq!(seqs, vec![0, 1, 2]);
        assert_eq!(response.kept[0].arrival_min, 5);
    }

    #[test]
    fn test_drops_far_node_on_duration() {
        let travel = vec![
            vec![0, 5, 50],
            vec![5, 0, 50],
            vec![50, 50, 0],
        ];
        let response = CheapestInsertionRouter
            .solve_sync(&request(travel, vec![0, 1, 1], 10, 60))
            .unwrap();
        assert_eq!(response.kept.len(), 1);
        assert_eq!(response.kept[0].node, 1);
        assert_eq!(response.dropped[0].node, 2);
        assert_eq!(response.dropped[0].hint.as_deref(), Some(HINT_DURATION));
    }

    #[test]
    fn test_drops_on_capacity() {
        let travel = vec![vec![0, 1, 1], vec![1, 0, 1], vec![1, 1, 0]];
        let response = CheapestInsertionRouter
            .solve_sync(&request(travel, vec![0, 6, 6], 10, 120))
            .unwrap();
        assert_eq!(response.kept.len(), 1);
        assert_eq!(response.dropped[0].hint.as_deref(), Some(HINT_CAPACITY));
    }

    #[test]
    fn test_service_time_counts_toward_duration() {
        let travel = vec![vec![0, 10], vec![10, 0]];
        let mut req = request(travel, vec![0, 1], 10, 25);
        req.service_minutes = vec![0, 6];
        let response = CheapestInsertionRouter.solve_sync(&req).unwrap();
        // 10 out + 6 service + 10 back = 26 > 25
        assert!(response.kept.is_empty());
        assert_eq!(response.dropped[0].hint.as_deref(), Some(HINT_DURATION));
    }

    #[tokio::test]
    async fn test_async_solve_matches_sync() {
        let travel = vec![vec![0, 3, 4], vec![3, 0, 2], vec![4, 2, 0]];
        let req = request(travel, vec![0, 2, 2], 10, 60);
        let sync = CheapestInsertionRouter.solve_sync(&req).unwrap();
        let asynced = CheapestInsertionRouter.solve(req).await.unwrap();
        assert_eq!(sync, asynced);
    }
}
