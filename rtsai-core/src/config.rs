use serde::{Deserialize, Serialize};

/// Engine-wide AI tuning. Every field has a default, so a config file only
/// needs the values it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    /// Simulation cycles per game second.
    pub cycles_per_second: u64,
    /// Seconds between resource collection passes for one player.
    pub collect_interval: u64,
    /// Minimum seconds between scout dispatches.
    pub explore_interval: u64,
    /// Placement retry wait after the first failure, in cycles.
    pub build_retry_first: u64,
    /// Placement retry wait after every later failure, in cycles.
    pub build_retry_later: u64,
    /// Cycles between attempts to clear a blocked path.
    pub cannot_move_window: u64,
    /// Buildings inspected for road access per pass.
    pub pathway_scan_cap: usize,
    /// Military score ratio, in percent, needed before declaring war.
    pub military_advantage_percent: i64,
    /// Cycle before which players without a base do not start wars.
    pub enforced_peace_cycle: u64,
    /// Radius in which idle units answer an attack.
    pub help_range: i32,
    /// Radius around a force searched for targets.
    pub defend_range: i32,
    pub workers_per_town_hall: u32,
    pub max_scouts: usize,
    pub max_forces: usize,
    /// Tiles offered to the visitor during a building placement search.
    pub placement_search_limit: usize,
    /// Tiles offered to the visitor during a resource search.
    pub resource_search_limit: usize,
    /// Tiles offered to the visitor during an enemy search.
    pub enemy_search_limit: usize,
    /// Extra cycles of delay per unit when boarding a transporter.
    pub board_delay: u32,
    /// Buy when the currency stock exceeds this multiple of the market price.
    pub buy_currency_factor: i64,
    /// Currency below which surplus goods are sold.
    pub sell_currency_threshold: i64,
    /// Stock of a non-wanted resource counted as surplus.
    pub sell_surplus: i64,
    /// Harvester count floor used when splitting workers by ratio.
    pub min_harvester_basis: u32,
    /// Distance at which a force counts as having arrived.
    pub arrive_range: i32,
    /// Distance from a settlement within which buildings belong to it.
    pub settlement_radius: i32,
    /// Script steps run per second at most.
    pub script_steps_per_second: usize,
    /// Border players examined per diplomacy pass.
    pub war_candidate_cap: usize,
    /// Allow moving a worker between resources when one is over-served.
    pub cross_resource_reassignment: bool,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            cycles_per_second: 30,
            collect_interval: 5,
            explore_interval: 5,
            build_retry_first: 150,
            build_retry_later: 450,
            cannot_move_window: 10,
            pathway_scan_cap: 2,
            military_advantage_percent: 150,
            enforced_peace_cycle: 0,
            help_range: 12,
            defend_range: 16,
            workers_per_town_hall: 8,
            max_scouts: 2,
            max_forces: 8,
            placement_search_limit: 2048,
            resource_search_limit: 8192,
            enemy_search_limit: 16384,
            board_delay: 5,
            buy_currency_factor: 3,
            sell_currency_threshold: 200,
            sell_surplus: 2000,
            min_harvester_basis: 5,
            arrive_range: 6,
            settlement_radius: 10,
            script_steps_per_second: 16,
            war_candidate_cap: 4,
            cross_resource_reassignment: false,
        }
    }
}

impl AiConfig {
    pub fn seconds(&self, seconds: u64) -> u64 {
        seconds * self.cycles_per_second
    }

    pub fn from_text(text: &str) -> Result<Self, rtstxt::Error> {
        rtstxt::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AiConfig::default();
        assert_eq!(config.cycles_per_second, 30);
        assert_eq!(config.build_retry_first, 150);
        assert_eq!(config.build_retry_later, 450);
        assert_eq!(config.pathway_scan_cap, 2);
        assert!(!config.cross_resource_reassignment);
    }

    #[test]
    fn test_partial_text_keeps_defaults() {
        let config =
            AiConfig::from_text("collect_interval = 3 cross_resource_reassignment = yes")
                .expect("config");
        assert_eq!(config.collect_interval, 3);
        assert!(config.cross_resource_reassignment);
        assert_eq!(config.board_delay, 5);
    }

    #[test]
    fn test_written_config_reads_back() {
        let config = AiConfig {
            military_advantage_percent: 200,
            ..Default::default()
        };
        let text = rtstxt::to_string(&config).expect("write");
        assert_eq!(AiConfig::from_text(&text).expect("read"), config);
    }
}
