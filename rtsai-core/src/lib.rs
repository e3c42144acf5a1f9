//! # RTS Computer Player
//!
//! Strategic AI for the computer-controlled players of a real-time strategy
//! game. Each player reads a [`WorldView`] of the game and answers with
//! [`Command`]s that the host feeds through the same pipeline as human input.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌──────────────┐
//! │ Host world  │────▶│   AiEngine   │────▶│ PlayerInputs │
//! │ (WorldView) │     │ step/notify  │     │  (commands)  │
//! └─────────────┘     └──────┬───────┘     └──────────────┘
//!                            │
//!                     ┌──────▼───────┐
//!                     │ TickContext  │  one per player per hook
//!                     │  + managers  │
//!                     └──────────────┘
//! ```
//!
//! ## Key Types
//!
//! | Type | Purpose |
//! |------|---------|
//! | [`AiEngine`] | Owns every AI player, runs the per-second, half-minute and minute hooks |
//! | [`AiEvent`] | Host callbacks (unit attacked, build complete, ...) |
//! | [`Content`] | Catalog of resources, unit types and upgrades plus the AI personalities |
//! | [`AiPlayerState`] | Per-player memory: build queue, forces, transporters, scouts |
//! | [`SaveBlock`] | Persisted AI state inside a saved game |
//!
//! All randomness goes through one [`SyncRng`] shared by the engine, so every
//! client making the same calls in the same order reaches the same commands.

pub mod ai_type;
pub mod catalog;
pub mod command;
pub mod config;
pub mod construction;
pub mod content;
pub mod context;
pub mod diplomacy;
pub mod error;
pub mod events;
pub mod exploration;
pub mod faction;
pub mod force;
pub mod helpers;
pub mod ids;
pub mod magic;
pub mod metrics;
pub mod production;
pub mod resource;
pub mod resources;
pub mod rng;
pub mod save;
pub mod scheduler;
pub mod script;
pub mod state;
pub mod terrain;
pub mod testing;
pub mod transport;
pub mod world;

pub use ai_type::AiType;
pub use catalog::Catalog;
pub use command::{Command, PlayerInputs};
pub use config::AiConfig;
pub use content::{load_content, load_content_file, Content};
pub use error::{AiError, ContentError, SaveError};
pub use events::AiEvent;
pub use ids::{PlayerId, Pos, UnitRef, UnitTypeId};
pub use metrics::AiMetrics;
pub use resources::Resources;
pub use rng::SyncRng;
pub use save::SaveBlock;
pub use scheduler::AiEngine;
pub use state::AiPlayerState;
pub use world::{PlayerInfo, PlayerKind, Stance, TileMap, WorldView};
