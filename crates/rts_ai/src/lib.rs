//! # RTS AI
//!
//! Decision engine for a computer-controlled RTS faction, and for the
//! auto-pilot that plays the human side with the same rules.
//!
//! This crate contains **only** deterministic logic:
//! - No rendering
//! - No system randomness (every choice comes from a seeded `ChaCha8Rng`)
//! - No floating-point math (uses fixed-point)
//! - No IO beyond explicit strategy/config file loads
//!
//! The game itself is reached through the traits in [`world`]; a host
//! implements them and calls [`director::Director::tick`] once per frame.
//!
//! ## Crate Structure
//!
//! - [`economy`] - Resource ledger with passive regeneration
//! - [`assessor`] - Periodic battlefield sampling
//! - [`tactics`] - Defend / Attack / Siege controller and wave triggering
//! - [`production`] - Build queue, opening script, macro phase, labor
//! - [`director`] - Strategy selection, waves and fallback switching
//! - [`strategy`] - Strategy profiles and the built-in library
//! - [`world`] - Collaborator traits the host implements

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod assessor;
pub mod config;
pub mod director;
pub mod economy;
pub mod error;
pub mod events;
pub mod factions;
pub mod math;
pub mod production;
pub mod strategy;
pub mod tactics;
pub mod units;
pub mod world;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::assessor::{team_power, unit_power, Assessment, BattlefieldAssessor};
    pub use crate::config::EngineConfig;
    pub use crate::director::{Director, DirectorState, FactionContext, Snapshot, WaveStall};
    pub use crate::economy::{Cost, LedgerConfig, ResourceKind, ResourceLedger};
    pub use crate::error::{AiError, Result};
    pub use crate::events::{AiEvent, DropReason};
    pub use crate::factions::{ControlMode, Race, Team};
    pub use crate::math::{Fixed, Vec2Fixed};
    pub use crate::production::{
        weighted_pick, ProductionQueue, ProductionReport, ProductionScheduler, RuntimeBuildList,
    };
    pub use crate::strategy::{
        AttackWave, BuildStep, ExpansionPolicy, ExpansionTuning, RetreatMode, StrategyLibrary,
        StrategyProfile,
    };
    pub use crate::tactics::{TacticalController, TacticalState};
    pub use crate::units::{UnitRole, UnitType, UpgradeId};
    pub use crate::world::{
        BaseInfo, ConstructionSites, EntityId, GameWorld, Labor, LaborActivity, ResourceFields,
        UnitInfo, UnitOrders, UnitRegistry, UnitSpawner, UpgradeLedger,
    };
}
