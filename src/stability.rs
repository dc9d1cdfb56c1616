use crate::config::StabilityConfig;

use tracing::trace;

/// Fixed-capacity ring of recent focus scores.
///
/// Storage is allocated once; pushes wrap the write index around so the
/// per-observation cost stays constant. Invariants: length never exceeds
/// capacity, iteration order is chronological, oldest entry is evicted on
/// overflow.
#[derive(Debug)]
pub struct ScoreWindow {
    slots: Vec<f64>,
    head: usize,
    len: usize,
}

impl ScoreWindow {
    pub fn new(capacity: usize) -> Self {
        if capacity == 0 {
            panic!("Score window capacity must be greater than 0");
        }
        Self {
            slots: vec![0.0; capacity],
            head: 0,
            len: 0,
        }
    }

    /// Append a score, evicting the oldest entry once full.
    pub fn push(&mut self, score: f64) {
        let capacity = self.slots.len();
        self.slots[self.head] = score;
        self.head = (self.head + 1) % capacity;
        if self.len < capacity {
            self.len += 1;
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
    }

    /// Iterate entries oldest first.
    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        let capacity = self.slots.len();
        let start = (self.head + capacity - self.len) % capacity;
        (0..self.len).map(move |i| self.slots[(start + i) % capacity])
    }

    pub fn mean(&self) -> f64 {
        if self.len == 0 {
            return 0.0;
        }
        self.iter().sum::<f64>() / self.len as f64
    }

    /// Population variance of the window contents.
    pub fn variance(&self) -> f64 {
        if self.len == 0 {
            return 0.0;
        }
        let mean = self.mean();
        self.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / self.len as f64
    }
}

/// Debounces noisy per-frame focus scores into a stable/unstable signal.
///
/// A window is classified stable when it holds at least `min_samples`
/// entries with variance below and mean above the configured thresholds.
/// Consecutive stable classifications accumulate in a streak the capture
/// controller consumes; any unstable classification resets it. This
/// component only classifies; the capture decision lives in the controller.
pub struct StabilityTracker {
    config: StabilityConfig,
    window: ScoreWindow,
    streak: u32,
}

impl StabilityTracker {
    pub fn new(config: StabilityConfig) -> Self {
        let window = ScoreWindow::new(config.window_capacity);
        Self {
            config,
            window,
            streak: 0,
        }
    }

    /// Record one focus score and classify the current window.
    ///
    /// Fewer than `min_samples` observations always classify unstable so the
    /// tracker never spuriously reports stability on startup.
    pub fn observe(&mut self, score: f64) -> bool {
        self.window.push(score);

        let stable = if self.window.len() >= self.config.min_samples {
            let mean = self.window.mean();
            let variance = self.window.variance();
            trace!(
                "Window classified: mean={:.2} variance={:.2} len={}",
                mean,
                variance,
                self.window.len()
            );
            variance < self.config.variance_threshold && mean > self.config.mean_threshold
        } else {
            false
        };

        if stable {
            self.streak += 1;
        } else {
            self.streak = 0;
        }

        stable
    }

    /// Consecutive stable classifications since the last unstable one.
    pub fn streak(&self) -> u32 {
        self.streak
    }

    /// Reset the streak, keeping the score history (used after a trigger).
    pub fn reset_streak(&mut self) {
        self.streak = 0;
    }

    /// Drop all state (used when the host leaves the scan surface).
    pub fn reset(&mut self) {
        self.window.clear();
        self.streak = 0;
    }

    pub fn config(&self) -> &StabilityConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> StabilityConfig {
        StabilityConfig {
            window_capacity: 8,
            min_samples: 6,
            variance_threshold: 8.0,
            mean_threshold: 12.0,
        }
    }

    #[test]
    fn test_window_eviction_keeps_chronological_order() {
        let mut window = ScoreWindow::new(3);
        for v in [1.0, 2.0, 3.0, 4.0, 5.0] {
            window.push(v);
        }
        assert_eq!(window.len(), 3);
        let contents: Vec<f64> = window.iter().collect();
        assert_eq!(contents, vec![3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_window_mean_and_variance() {
        let mut window = ScoreWindow::new(8);
        for v in [0.0, 40.0, 0.0, 40.0, 0.0, 40.0, 0.0, 40.0] {
            window.push(v);
        }
        assert_eq!(window.mean(), 20.0);
        assert_eq!(window.variance(), 400.0);
    }

    #[test]
    fn test_window_stats_after_wraparound() {
        let mut window = ScoreWindow::new(4);
        // First four get evicted entirely by the next four
        for v in [100.0, 100.0, 100.0, 100.0, 2.0, 4.0, 6.0, 8.0] {
            window.push(v);
        }
        assert_eq!(window.mean(), 5.0);
        let contents: Vec<f64> = window.iter().collect();
        assert_eq!(contents, vec![2.0, 4.0, 6.0, 8.0]);
    }

    #[test]
    #[should_panic(expected = "capacity must be greater than 0")]
    fn test_zero_capacity_window_panics() {
        let _ = ScoreWindow::new(0);
    }

    #[test]
    fn test_never_stable_before_min_samples() {
        let mut tracker = StabilityTracker::new(config());
        // Five perfect scores, still insufficient evidence
        for _ in 0..5 {
            assert!(!tracker.observe(20.0));
        }
        assert_eq!(tracker.streak(), 0);
        // Sixth observation crosses the evidence threshold
        assert!(tracker.observe(20.0));
        assert_eq!(tracker.streak(), 1);
    }

    #[test]
    fn test_constant_sequence_classifies_stable() {
        let mut tracker = StabilityTracker::new(config());
        let mut last = false;
        for _ in 0..8 {
            last = tracker.observe(20.0);
        }
        // variance 0 < 8, mean 20 > 12
        assert!(last);
        assert_eq!(tracker.streak(), 3);
    }

    #[test]
    fn test_oscillating_sequence_classifies_unstable() {
        let mut tracker = StabilityTracker::new(config());
        let mut last = true;
        for v in [0.0, 40.0, 0.0, 40.0, 0.0, 40.0, 0.0, 40.0] {
            last = tracker.observe(v);
        }
        // variance 400 >= 8
        assert!(!last);
        assert_eq!(tracker.streak(), 0);
    }

    #[test]
    fn test_low_mean_is_unstable_even_when_flat() {
        let mut tracker = StabilityTracker::new(config());
        let mut last = true;
        for _ in 0..8 {
            // Flat but dark: variance 0 passes, mean 5 fails the cutoff
            last = tracker.observe(5.0);
        }
        assert!(!last);
    }

    #[test]
    fn test_unstable_observation_resets_streak() {
        let mut tracker = StabilityTracker::new(config());
        for _ in 0..8 {
            tracker.observe(20.0);
        }
        assert!(tracker.streak() >= 3);

        // One shaky frame wipes the streak
        tracker.observe(400.0);
        assert_eq!(tracker.streak(), 0);
    }

    #[test]
    fn test_reset_clears_history() {
        let mut tracker = StabilityTracker::new(config());
        for _ in 0..8 {
            tracker.observe(20.0);
        }
        tracker.reset();
        assert_eq!(tracker.streak(), 0);
        // History is gone, so stability needs min_samples fresh observations
        assert!(!tracker.observe(20.0));
    }
}
