// ==========================================
// Scripted router - deterministic Router for pipeline tests
// ==========================================
// Keeps every submitted order in request order unless told to:
// - always drop an order in a window
// - keep at most N stops in a window
// - fail or stall a window

use async_trait::async_trait;
use delivery_window_planner::domain::{DroppedNode, KeptNode, RouteRequest, RouteResponse};
use delivery_window_planner::engine::{Router, RouterError};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Default)]
pub struct ScriptedRouter {
    drops: HashMap<String, HashSet<String>>,
    stop_limits: HashMap<String, usize>,
    failing: HashSet<String>,
    delays: HashMap<String, Duration>,
    calls: Mutex<Vec<(String, Vec<String>)>>,
}

impl ScriptedRouter {
    pub fn keep_all() -> Self {
        Self::default()
    }

    pub fn drop_in(mut self, window_id: &str, order_id: &str) -> Self {
        self.drops
            .entry(window_id.to_string())
            .or_default()
            .insert(order_id.to_string());
        self
    }

    pub fn stop_limit(mut self, window_id: &str, stops: usize) -> Self {
        self.stop_limits.insert(window_id.to_string(), stops);
        self
    }

    pub fn fail_in(mut self, window_id: &str) -> Self {
        self.failing.insert(window_id.to_string());
        self
    }

    pub fn delay_in(mut self, window_id: &str, delay: Duration) -> Self {
        self.delays.insert(window_id.to_string(), delay);
        self
    }

    /// (window id, submitted order ids) per call, in call order.
    pub fn calls(&self) -> Vec<(String, Vec<String>)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, window_id: &str) -> usize {
        self.calls().iter().filter(|(w, _)| w == window_id).count()
    }
}

#[async_trait]
impl Router for ScriptedRouter {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn solve(&self, request: RouteRequest) -> Result<RouteResponse, RouterError> {
        {
            let mut calls = self.calls.lock().unwrap();
            calls.push((request.window_id.clone(), request.order_ids.clone()));
        }
        if let Some(delay) = self.delays.get(&request.window_id) {
            tokio::time::sleep(*delay).await;
        }
        if self.failing.contains(&request.window_id) {
            return Err(RouterError::Failed("scripted failure".to_string()));
        }

        let limit = self
            .stop_limits
            .get(&request.window_id)
            .copied()
            .unwrap_or(usize::MAX);
        let always_drop = self.drops.get(&request.window_id);

        let mut response = RouteResponse::default();
        for (i, order_id) in request.order_ids.iter().enumerate() {
            let node = i + 1;
            let scripted_drop = always_drop.map(|d| d.contains(order_id)).unwrap_or(false);
            if scripted_drop || response.kept.len() >= limit {
                response.dropped.push(DroppedNode {
                    node,
                    hint: Some("duration".to_string()),
                });
            } else {
                let seq = response.kept.len();
                response.kept.push(KeptNode {
                    node,
                    sequence_index: seq,
                    arrival_min: (seq as u32 + 1) * 10,
                });
            }
        }
        Ok(response)
    }
}
