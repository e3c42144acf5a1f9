//! The AI engine: owns every computer player's state and runs their hooks.
//!
//! The host calls [`AiEngine::step`] once per simulation cycle and feeds game
//! events through [`AiEngine::notify`]. Players are processed one after
//! another in id order, each against an explicit [`TickContext`], so the
//! shared random stream advances identically on every client.

use crate::ai_type::AiType;
use crate::catalog::Catalog;
use crate::command::PlayerInputs;
use crate::config::AiConfig;
use crate::construction;
use crate::content::Content;
use crate::context::TickContext;
use crate::diplomacy;
use crate::error::AiError;
use crate::exploration;
use crate::faction;
use crate::force;
use crate::helpers::AiHelpers;
use crate::ids::PlayerId;
use crate::magic;
use crate::metrics::AiMetrics;
use crate::production;
use crate::resource;
use crate::rng::SyncRng;
use crate::script;
use crate::state::AiPlayerState;
use crate::transport;
use crate::world::{PlayerInfo, PlayerKind, WorldView};
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::instrument;

pub struct AiEngine {
    pub(crate) catalog: Catalog,
    pub(crate) helpers: AiHelpers,
    pub(crate) ai_types: Vec<AiType>,
    pub(crate) config: AiConfig,
    pub(crate) rng: SyncRng,
    pub(crate) players: BTreeMap<PlayerId, AiPlayerState>,
    pub(crate) metrics: AiMetrics,
}

impl AiEngine {
    pub fn new(content: Content, config: AiConfig, seed: u64) -> Result<Self, AiError> {
        if content.ai_types.is_empty() {
            return Err(AiError::NoAiTypes);
        }
        let helpers = AiHelpers::build(&content.catalog);
        Ok(Self {
            catalog: content.catalog,
            helpers,
            ai_types: content.ai_types,
            config,
            rng: SyncRng::new(seed),
            players: BTreeMap::new(),
            metrics: AiMetrics::default(),
        })
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn helpers(&self) -> &AiHelpers {
        &self.helpers
    }

    pub fn config(&self) -> &AiConfig {
        &self.config
    }

    pub fn metrics(&self) -> &AiMetrics {
        &self.metrics
    }

    pub fn ai_types(&self) -> &[AiType] {
        &self.ai_types
    }

    pub fn player(&self, player: PlayerId) -> Option<&AiPlayerState> {
        self.players.get(&player)
    }

    pub fn player_mut(&mut self, player: PlayerId) -> Option<&mut AiPlayerState> {
        self.players.get_mut(&player)
    }

    pub fn players(&self) -> impl Iterator<Item = &AiPlayerState> {
        self.players.values()
    }

    /// Turns per-step script logging on or off for one player.
    pub fn set_script_debug(&mut self, player: PlayerId, on: bool) -> Result<(), AiError> {
        let state = self
            .players
            .get_mut(&player)
            .ok_or(AiError::NotInitialized(player))?;
        state.script_debug = on;
        Ok(())
    }

    /// Picks the personality for `info`: its configured name, else the first
    /// type fitting its civilization, else the first type.
    pub fn select_ai_type(&self, info: &PlayerInfo) -> Result<&AiType, AiError> {
        if let Some(name) = &info.ai_name {
            return self
                .ai_types
                .iter()
                .find(|t| &t.ident == name)
                .ok_or_else(|| AiError::UnknownAiName {
                    player: info.id,
                    name: name.clone(),
                });
        }
        let civilization = info.civilization.as_deref();
        self.ai_types
            .iter()
            .find(|t| t.fits(civilization))
            .or_else(|| self.ai_types.first())
            .ok_or(AiError::NoAiTypes)
    }

    /// Allocates the AI state of `player` and seeds its collect ratios and
    /// reserve from the chosen personality.
    #[instrument(skip_all, name = "ai_init")]
    pub fn init_player(&mut self, world: &dyn WorldView, player: PlayerId) -> Result<(), AiError> {
        let info = world.player(player).ok_or(AiError::UnknownPlayer(player))?;
        let ai_type = self.select_ai_type(info)?;
        let mut state = AiPlayerState::new(player, &ai_type.ident);
        state.collect = ai_type.collect.clone();
        state.reserve = ai_type.reserve.clone();
        log::info!(
            "player {} ({}) plays AI type '{}'",
            player,
            info.name,
            ai_type.ident
        );
        self.players.insert(player, state);
        Ok(())
    }

    /// Initializes every computer player the world knows about.
    pub fn init_computers(&mut self, world: &dyn WorldView) -> Result<(), AiError> {
        for id in world.player_ids() {
            if world
                .player(id)
                .is_some_and(|p| p.kind == PlayerKind::Computer)
            {
                self.init_player(world, id)?;
            }
        }
        Ok(())
    }

    /// Builds the context for `player` and runs `f` against its state.
    /// `None` when the player has no AI state or is gone from the world.
    pub(crate) fn with_player<R>(
        &mut self,
        world: &dyn WorldView,
        player: PlayerId,
        f: impl FnOnce(&mut TickContext<'_>, &mut AiPlayerState) -> R,
    ) -> Option<(R, PlayerInputs)> {
        let Self {
            catalog,
            helpers,
            ai_types,
            config,
            rng,
            players,
            metrics,
        } = self;
        let state = players.get_mut(&player)?;
        world.player(player)?;
        let ai_type = ai_types.iter().find(|t| t.ident == state.ai_type)?;
        let mut ctx = TickContext::new(player, world, catalog, helpers, ai_type, config, rng);
        let result = f(&mut ctx, state);
        let inputs = ctx.finish();
        metrics.count_commands(&inputs.commands);
        Some((result, inputs))
    }

    /// Runs one simulation cycle: the per-second hooks on whole seconds, the
    /// half-minute and minute hooks staggered by player id.
    #[instrument(skip_all, name = "ai_step")]
    pub fn step(&mut self, world: &dyn WorldView) -> Vec<PlayerInputs> {
        let start = Instant::now();
        let cycle = world.cycle();
        let cps = self.config.cycles_per_second.max(1);
        let mut out = Vec::new();

        if cycle % cps == 0 {
            let second = cycle / cps;
            let ids: Vec<PlayerId> = self.players.keys().copied().collect();
            for player in ids {
                let mut inputs = PlayerInputs::new(player);
                let offset = player as u64;

                let t = Instant::now();
                if let Some(i) = self.each_second(world, player) {
                    inputs.commands.extend(i.commands);
                }
                self.metrics.second_time += t.elapsed();

                if second % 30 == offset % 30 {
                    let t = Instant::now();
                    if let Some(i) = self.each_half_minute(world, player) {
                        inputs.commands.extend(i.commands);
                    }
                    self.metrics.half_minute_time += t.elapsed();
                }
                if second % 60 == offset % 60 {
                    let t = Instant::now();
                    if let Some(i) = self.each_minute(world, player) {
                        inputs.commands.extend(i.commands);
                    }
                    self.metrics.minute_time += t.elapsed();
                }
                if !inputs.is_empty() {
                    out.push(inputs);
                }
            }
        }

        self.metrics.total_cycles += 1;
        self.metrics.total_time += start.elapsed();
        out
    }

    /// The fixed per-second sequence. Later passes read the needed mask and
    /// queue state the earlier ones leave behind.
    #[instrument(skip_all, name = "each_second")]
    pub fn each_second(&mut self, world: &dyn WorldView, player: PlayerId) -> Option<PlayerInputs> {
        let collect_interval = self.config.collect_interval.max(1);
        let cps = self.config.cycles_per_second.max(1);
        let (_, inputs) = self.with_player(world, player, |ctx, state| {
            let second = ctx.cycle() / cps;

            script::run_script(ctx, state);
            faction::assign_random_faction(ctx);

            state.needed_mask.clear();
            production::check_units(ctx, state);
            production::process_build_queue(ctx, state);
            let out_of_supply = ctx.me().is_some_and(|p| p.supply <= p.demand);
            if (state.need_supply || out_of_supply) && production::request_supply(ctx, state) {
                state.need_supply = false;
            }
            production::process_upgrade_requests(ctx, state);
            faction::check_faction_founding(ctx, state);

            if (second + player as u64) % collect_interval == 0 {
                resource::collect_resources(ctx, state);
                resource::toggle_production(ctx, state);
            }

            force::update_second(ctx, state);
            transport::update_site_transport(ctx, state);
            magic::check_magic(ctx, state);
            construction::check_repair(ctx, state);
            exploration::dispatch_scouts(ctx, state);
            diplomacy::check_diplomacy(ctx);
        })?;
        Some(inputs)
    }

    #[instrument(skip_all, name = "each_half_minute")]
    pub fn each_half_minute(
        &mut self,
        world: &dyn WorldView,
        player: PlayerId,
    ) -> Option<PlayerInputs> {
        let (_, inputs) = self.with_player(world, player, |ctx, state| {
            exploration::prune_scouts(ctx, state);
            construction::check_workers(ctx, state);
            construction::check_upgrades(ctx, state);
            construction::check_building_templates(ctx, state);
            construction::check_pathways(ctx, state);
            construction::check_minecarts(ctx, state);
            force::update_half_minute(ctx, state);
        })?;
        Some(inputs)
    }

    #[instrument(skip_all, name = "each_minute")]
    pub fn each_minute(&mut self, world: &dyn WorldView, player: PlayerId) -> Option<PlayerInputs> {
        let (_, inputs) = self.with_player(world, player, |ctx, state| {
            construction::check_settlements(ctx, state);
            construction::check_docks(ctx, state);
            transport::rebuild_transporters(ctx, state);
            force::update_minute(ctx, state);
        })?;
        Some(inputs)
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
