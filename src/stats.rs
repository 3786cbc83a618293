//! Run statistics for `--stats` output.

use std::time::{Duration, Instant};

/// Collects phase timings and solver counters.
///
/// Created only when `--stats` is passed.
pub struct Stats {
    total_start: Instant,
    phases: Vec<(&'static str, Duration)>,
    pub entities: usize,
    pub games: usize,
    pub workers: usize,
    pub rounds: usize,
    /// Coordinator messages while iterating.
    pub messages: usize,
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}

impl Stats {
    pub fn new() -> Self {
        Self {
            total_start: Instant::now(),
            phases: Vec::new(),
            entities: 0,
            games: 0,
            workers: 0,
            rounds: 0,
            messages: 0,
        }
    }

    /// Record a completed phase with its duration.
    pub fn add_phase(&mut self, name: &'static str, duration: Duration) {
        self.phases.push((name, duration));
    }

    #[cfg(test)]
    fn phases(&self) -> &[(&'static str, Duration)] {
        &self.phases
    }

    /// Print the stats table to stderr.
    pub fn display(&self) {
        let total = self.total_start.elapsed();
        eprintln!();
        eprintln!("=== Power Rating Stats ===");

        for (name, dur) in &self.phases {
            eprintln!("  {:<24} {:>8.3}s", name, dur.as_secs_f64());
        }

        eprintln!("  Entities:               {}", self.entities);
        eprintln!("  Games:                  {}", self.games);
        eprintln!("  Workers:                {}", self.workers);
        eprintln!("  Rounds:                 {}", self.rounds);
        if self.messages > 0 {
            eprintln!("  Coordinator messages:   {}", self.messages);
        }

        eprintln!("  ─────────────────────────────────");
        eprintln!("  Total:                  {:>8.3}s", total.as_secs_f64());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phases_keep_insertion_order() {
        let mut stats = Stats::new();
        stats.add_phase("load", Duration::from_millis(3));
        stats.add_phase("solve", Duration::from_millis(5));
        let names: Vec<_> = stats.phases().iter().map(|(n, _)| *n).collect();
        assert_eq!(names, vec!["load", "solve"]);
    }
}
