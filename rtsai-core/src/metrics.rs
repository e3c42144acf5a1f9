use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Accumulated timing and output counters for the AI engine.
#[derive(Default, Clone, Debug, Serialize, Deserialize)]
pub struct AiMetrics {
    pub total_cycles: u64,
    pub total_time: Duration,
    pub second_time: Duration,
    pub half_minute_time: Duration,
    pub minute_time: Duration,
    /// Time spent in host callbacks (unit attacked, build complete, ...).
    pub callback_time: Duration,
    pub callbacks: u64,
    /// Issued commands by [`crate::command::Command::kind`].
    pub commands: BTreeMap<String, u64>,
}

impl AiMetrics {
    pub fn cycle_avg_ms(&self) -> f64 {
        if self.total_cycles == 0 {
            0.0
        } else {
            self.total_time.as_secs_f64() * 1000.0 / self.total_cycles as f64
        }
    }

    pub fn total_commands(&self) -> u64 {
        self.commands.values().sum()
    }

    pub fn count_commands<'c>(&mut self, commands: impl IntoIterator<Item = &'c crate::command::Command>) {
        for c in commands {
            *self.commands.entry(c.kind().to_string()).or_insert(0) += 1;
        }
    }
}
