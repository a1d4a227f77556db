//! Events emitted by the engine each tick.
//!
//! The engine reports what it decided rather than logging only, so callers
//! (metrics, replays, tests) can observe decisions without scraping logs.

use serde::{Deserialize, Serialize};

use crate::economy::ResourceKind;
use crate::strategy::BuildStep;
use crate::tactics::TacticalState;
use crate::world::EntityId;

/// Why a queued step left the queue without being bought.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DropReason {
    /// Upgrade already researched or in progress.
    Redundant,
    /// Upgrade prerequisites are not met.
    Unresearchable,
    /// Construction subsystem or outpost data unavailable.
    ConfigurationMissing,
    /// Build attempt failed after the afford check.
    BuildFailed,
    /// Unit type has no cost data or the spawner refused it.
    SpawnRefused,
}

/// Something the engine decided or observed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AiEvent {
    /// A strategy profile became active.
    StrategyActivated {
        /// Profile name.
        name: String,
    },
    /// The active strategy failed and was replaced by its fallback.
    StrategySwitched {
        /// Profile that failed.
        from: String,
        /// Fallback now active.
        to: String,
    },
    /// A step was appended to the production queue.
    Enqueued {
        /// The step.
        step: BuildStep,
    },
    /// The head step was bought.
    Purchased {
        /// The step.
        step: BuildStep,
    },
    /// The head step was removed unbought.
    Dropped {
        /// The step.
        step: BuildStep,
        /// Why.
        reason: DropReason,
    },
    /// An outpost was started.
    ExpansionBuilt,
    /// A scheduled wave launched.
    WaveLaunched {
        /// Wave index into the active profile.
        index: usize,
        /// Units ordered to attack.
        units: usize,
    },
    /// Every army unit was thrown at the enemy.
    AllOutAttack {
        /// Units ordered to attack.
        units: usize,
    },
    /// One worker moved between resource kinds.
    LaborReassigned {
        /// Worker.
        worker: EntityId,
        /// New resource kind.
        to: ResourceKind,
    },
    /// The tactical state changed.
    TacticalStateChanged {
        /// Previous state.
        from: TacticalState,
        /// New state.
        to: TacticalState,
    },
    /// A wave has been eligible for too long without launching.
    WaveStalled {
        /// Wave index into the active profile.
        index: usize,
    },
}
