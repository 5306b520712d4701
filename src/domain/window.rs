// ==========================================
// Delivery Window Planner - delivery window model
// ==========================================
// Rule: chronological order defines "earlier" and "later"
// ==========================================

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

// ==========================================
// Window - one same-day delivery slot
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    pub window_id: String,  // report label, e.g. "09:00 AM - 11:00 AM"
    pub start: NaiveTime,   // slot start
    pub end: NaiveTime,     // slot end
    pub capacity_units: u32, // vehicle capacity (single vehicle per window)
}

impl Window {
    pub fn new(window_id: impl Into<String>, start: NaiveTime, end: NaiveTime, capacity_units: u32) -> Self {
        Self {
            window_id: window_id.into(),
            start,
            end,
            capacity_units,
        }
    }

    /// Builds a window labelled like `09:00 AM - 11:00 AM`.
    pub fn from_times(start: NaiveTime, end: NaiveTime, capacity_units: u32) -> Self {
        Self::new(Self::label_for(start, end), start, end, capacity_units)
    }

    pub fn label_for(start: NaiveTime, end: NaiveTime) -> String {
        format!("{} - {}", start.format("%I:%M %p"), end.format("%I:%M %p"))
    }

    /// Window length in minutes (route duration cap).
    pub fn duration_minutes(&self) -> u32 {
        let minutes = (self.end - self.start).num_minutes();
        minutes.max(0) as u32
    }

    /// Hours between this window's start and a later start.
    pub fn hours_until(&self, later_start: NaiveTime) -> f64 {
        (later_start - self.start).num_minutes() as f64 / 60.0
    }
}

// ==========================================
// Trait: CapacityConstraint
// ==========================================
// Used by the allocator and the relocation resolver
pub trait CapacityConstraint {
    /// Whether `units` more fit under the limit.
    fn can_add_units(&self, units: u32) -> bool;

    /// Spare units (0 when over-committed).
    fn remaining_units(&self) -> u32;

    /// Whether the load is above the limit (priority locks may overcommit).
    fn is_overflow(&self) -> bool;
}

// ==========================================
// WindowLoad - running capacity ledger for one window
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowLoad {
    pub window_id: String,
    pub capacity_units: u32,
    pub used_units: u32,
}

impl WindowLoad {
    pub fn new(window_id: impl Into<String>, capacity_units: u32) -> Self {
        Self {
            window_id: window_id.into(),
            capacity_units,
            used_units: 0,
        }
    }

    pub fn consume(&mut self, units: u32) {
        self.used_units = self.used_units.saturating_add(units);
    }

    pub fn release(&mut self, units: u32) {
        self.used_units = self.used_units.saturating_sub(units);
    }
}

impl CapacityConstraint for WindowLoad {
    fn can_add_units(&self, units: u32) -> bool {
        self.used_units.saturating_add(units) <= self.capacity_units
    }

    fn remaining_units(&self) -> u32 {
        self.capacity_units.saturating_sub(self.used_units)
    }

    fn is_overflow(&self) -> bool {
        self.used_units > self.capacity_units
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_label_and_duration() {
        let window = Window::from_times(t(9, 0), t(11, 0), 80);
        assert_eq!(window.window_id, "09:00 AM - 11:00 AM");
        assert_eq!(window.duration_minutes(), 120);
        assert_eq!(window.hours_until(t(13, 30)), 4.5);
    }

    #[test]
    fn test_window_load_constraint() {
        let mut load = WindowLoad::new("W1", 80);
        load.consume(70);
        assert!(load.can_add_units(10));
        assert!(!load.can_add_units(11));
        assert_eq!(load.remaining_units(), 10);

        load.consume(20);
        assert!(load.is_overflow());
        assert_eq!(load.remaining_units(), 0);

        load.release(30);
        assert_eq!(load.used_units, 60);
    }
}
