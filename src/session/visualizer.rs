//! Bounded history of decibel samples for the level display

use std::collections::VecDeque;

/// Default number of samples kept, one per bar
const DEFAULT_CAPACITY: usize = 96;

/// Quietest level that still shows above the baseline
const DISPLAY_FLOOR_DB: f32 = -60.0;

#[derive(Debug, Clone)]
pub struct Visualizer {
    values: VecDeque<f32>,
    capacity: usize,
}

impl Visualizer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            values: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append a reading, evicting the oldest once full
    pub fn add_value(&mut self, decibels: f32) {
        if self.values.len() == self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(decibels);
    }

    /// Readings oldest first
    pub fn values(&self) -> impl Iterator<Item = f32> + '_ {
        self.values.iter().copied()
    }

    pub fn latest(&self) -> Option<f32> {
        self.values.back().copied()
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// Readings mapped onto `0.0..=1.0` for drawing
    pub fn levels(&self) -> Vec<f32> {
        self.values().map(normalize).collect()
    }
}

impl Default for Visualizer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

fn normalize(decibels: f32) -> f32 {
    ((decibels - DISPLAY_FLOOR_DB) / -DISPLAY_FLOOR_DB).clamp(0.0, 1.0)
}
