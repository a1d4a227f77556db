//! Error types for the decision engine.
//!
//! Only configuration and data-loading problems surface as errors. Soft
//! in-game failures (unaffordable steps, redundant upgrades, vanished build
//! sites, unreachable waves) are absorbed by the scheduler and director and
//! never leave the engine.

use thiserror::Error;

use crate::factions::Race;

/// Result type alias using [`AiError`].
pub type Result<T> = std::result::Result<T, AiError>;

/// Top-level error type for the decision engine.
#[derive(Debug, Error)]
pub enum AiError {
    /// No strategy profile exists for a race.
    #[error("No strategy profile available for race {0:?}")]
    NoStrategyForRace(Race),

    /// A strategy was requested by name but is not in the library.
    #[error("Unknown strategy profile: {0}")]
    UnknownStrategy(String),

    /// The construction subsystem is not running.
    #[error("Construction subsystem unavailable")]
    ConstructionUnavailable,

    /// The construction subsystem has no outpost data for a race.
    #[error("No outpost data for race {0:?}")]
    OutpostDataMissing(Race),

    /// Failed to read a data file.
    #[error("Failed to read '{path}': {source}")]
    Io {
        /// Path that failed to read.
        path: String,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse a RON document.
    #[error("Failed to parse '{path}': {source}")]
    Parse {
        /// Path (or label) of the document that failed to parse.
        path: String,
        /// Underlying RON error.
        #[source]
        source: ron::error::SpannedError,
    },

    /// A strategy profile failed validation.
    #[error("Invalid strategy profile '{profile}': {reason}")]
    InvalidProfile {
        /// Profile name.
        profile: String,
        /// What is wrong with it.
        reason: String,
    },

    /// Snapshot encoding or decoding failed.
    #[error("Snapshot serialization failed: {0}")]
    Snapshot(String),
}

impl AiError {
    /// Whether this error is a missing-configuration condition.
    ///
    /// Missing configuration degrades the engine to a no-op for the
    /// affected activation instead of failing the caller.
    #[must_use]
    pub const fn is_configuration_missing(&self) -> bool {
        matches!(
            self,
            Self::NoStrategyForRace(_)
                | Self::UnknownStrategy(_)
                | Self::ConstructionUnavailable
                | Self::OutpostDataMissing(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            AiError::NoStrategyForRace(Race::Horde).to_string(),
            "No strategy profile available for race Horde"
        );
        assert_eq!(
            AiError::UnknownStrategy("Turtle".into()).to_string(),
            "Unknown strategy profile: Turtle"
        );
        assert_eq!(
            AiError::ConstructionUnavailable.to_string(),
            "Construction subsystem unavailable"
        );
    }

    #[test]
    fn test_configuration_missing_classification() {
        assert!(AiError::OutpostDataMissing(Race::Kingdom).is_configuration_missing());
        assert!(AiError::ConstructionUnavailable.is_configuration_missing());
        assert!(!AiError::Snapshot("bad".into()).is_configuration_missing());
    }
}
