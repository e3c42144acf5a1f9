//! Headless matches between computer players.
//!
//! The runner plays the host's part: it steps an [`AiEngine`] once per game
//! cycle, applies the returned commands to a [`SandboxWorld`], and feeds the
//! world's events back through [`AiEngine::notify`] until none are left.

use anyhow::{Context, Result};
use rtsai_core::testing::SandboxWorld;
use rtsai_core::{AiConfig, AiEngine, AiEvent, Content, PlayerId, PlayerInputs};
use std::collections::{BTreeMap, VecDeque};

/// What came out of a match.
#[derive(Debug, Default)]
pub struct MatchReport {
    pub cycles: u64,
    /// Host callbacks delivered to the engine.
    pub events: u64,
    /// Commands by player, then by kind.
    pub per_player: BTreeMap<PlayerId, BTreeMap<&'static str, u64>>,
    pub issued: Vec<PlayerInputs>,
}

impl MatchReport {
    fn record(&mut self, inputs: PlayerInputs) {
        let kinds = self.per_player.entry(inputs.player).or_default();
        for c in &inputs.commands {
            *kinds.entry(c.kind()).or_insert(0) += 1;
        }
        self.issued.push(inputs);
    }

    pub fn total_commands(&self) -> u64 {
        self.per_player.values().flat_map(|k| k.values()).sum()
    }
}

/// Sets up the two-player skirmish map with every computer player assigned.
pub fn new_match(content: Content, config: AiConfig, seed: u64) -> Result<(AiEngine, SandboxWorld)> {
    let world = SandboxWorld::skirmish(content.catalog.clone());
    let mut engine = AiEngine::new(content, config, seed).context("failed to build the AI engine")?;
    engine
        .init_computers(&world)
        .context("failed to assign AI types")?;
    log::info!(
        "match ready: {} computer players, seed {}",
        engine.players().count(),
        seed
    );
    Ok((engine, world))
}

/// Runs `cycles` game cycles.
pub fn play(engine: &mut AiEngine, world: &mut SandboxWorld, cycles: u64) -> MatchReport {
    let mut report = MatchReport::default();
    for _ in 0..cycles {
        let mut pending: VecDeque<AiEvent> = VecDeque::new();
        for inputs in engine.step(&*world) {
            pending.extend(world.apply(&inputs));
            report.record(inputs);
        }
        pending.extend(world.advance());
        while let Some(event) = pending.pop_front() {
            report.events += 1;
            if let Some(inputs) = engine.notify(&*world, &event) {
                pending.extend(world.apply(&inputs));
                report.record(inputs);
            }
        }
        report.cycles += 1;
    }
    report
}

/// Plays the same match twice and reports whether both runs issued the same
/// commands and ended with the same saved AI state.
pub fn verify_determinism(content: &Content, config: &AiConfig, seed: u64, cycles: u64) -> Result<bool> {
    let mut runs = Vec::with_capacity(2);
    for run in 0..2 {
        let (mut engine, mut world) = new_match(content.clone(), config.clone(), seed)?;
        let report = play(&mut engine, &mut world, cycles);
        let save = engine
            .save()
            .with_context(|| format!("failed to save AI state after run {}", run))?;
        runs.push((report.issued, save));
    }
    let same = runs[0] == runs[1];
    if !same {
        let diverged = runs[0]
            .0
            .iter()
            .zip(&runs[1].0)
            .position(|(a, b)| a != b);
        log::warn!("runs diverged at batch {:?}", diverged);
    }
    Ok(same)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rtsai_core::testing::{SAMPLE_CONTENT, SANDBOX_CPS};
    use rtsai_core::load_content;

    #[test]
    fn test_play_records_every_batch() {
        let content = load_content(SAMPLE_CONTENT).unwrap();
        let (mut engine, mut world) = new_match(content, AiConfig::default(), 3).unwrap();
        let report = play(&mut engine, &mut world, 20 * SANDBOX_CPS);
        assert_eq!(report.cycles, 20 * SANDBOX_CPS);
        assert!(!report.issued.is_empty());
        let issued: u64 = report.issued.iter().map(|i| i.commands.len() as u64).sum();
        assert_eq!(report.total_commands(), issued);
        assert_eq!(engine.metrics().total_commands(), issued);
    }

    #[test]
    fn test_same_seed_is_deterministic() {
        let content = load_content(SAMPLE_CONTENT).unwrap();
        let same = verify_determinism(&content, &AiConfig::default(), 8, 30 * SANDBOX_CPS).unwrap();
        assert!(same);
    }
}
