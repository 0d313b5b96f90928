//! Configuration for the trust engine.
//!
//! Groups every tunable of the scoring formulas, the rating rules, flooding
//! detection and rejoin decay. Defaults reproduce the canonical constants.
//!
//! # Example
//!
//! ```
//! use itrust_core::config::{EngineConfig, EngineConfigBuilder};
//!
//! // Use defaults
//! let config = EngineConfig::default();
//! assert!(config.validate().is_ok());
//!
//! // Or use builder for customization
//! let config = EngineConfigBuilder::new()
//!     .with_trust_threshold(0.35)
//!     .with_flood_thresholds(10, 20)
//!     .build_validated()
//!     .unwrap();
//! assert_eq!(config.flooding.member_threshold, 10);
//! ```

use itrust_reputation::{
    flooding::MAX_WINDOW_SECS, AdmissionPolicy, DecayConfig, FloodingConfig, FusionConfig,
    RatingConfig,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main engine configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Trust fusion weights and the blacklist threshold.
    pub fusion: FusionConfig,

    /// Submission-time rating rules.
    pub rating: RatingConfig,

    /// Flooding detection.
    pub flooding: FloodingConfig,

    /// Decay of carried-over trust for returning devices.
    pub rejoin: DecayConfig,
}

impl EngineConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a configuration builder.
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::new()
    }

    /// Parse a JSON document. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Global trust threshold.
    #[must_use]
    pub fn trust_threshold(&self) -> f64 {
        self.fusion.threshold
    }

    /// Start a builder from this configuration.
    #[must_use]
    pub fn into_builder(self) -> EngineConfigBuilder {
        EngineConfigBuilder { config: self }
    }

    /// Admission policy derived from this configuration.
    #[must_use]
    pub fn admission_policy(&self) -> AdmissionPolicy {
        AdmissionPolicy {
            threshold: self.fusion.threshold,
            rejoin_decay: self.rejoin.clone(),
        }
    }

    /// Validate the configuration.
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Validate fusion
        unit_range("fusion.threshold", self.fusion.threshold)?;
        unit_range("fusion.direct_step", self.fusion.direct_step)?;
        unit_range("fusion.centrality_floor", self.fusion.centrality_floor)?;
        for (field, weight) in [
            ("fusion.history_weight", self.fusion.history_weight),
            ("fusion.indirect_weight", self.fusion.indirect_weight),
            ("fusion.centrality_weight", self.fusion.centrality_weight),
            ("fusion.cold_start_history_weight", self.fusion.cold_start_history_weight),
            ("fusion.cold_start_centrality_weight", self.fusion.cold_start_centrality_weight),
        ] {
            unit_range(field, weight)?;
        }
        if !self.fusion.weights_are_normalized() {
            return Err(ConfigError::InvalidValue {
                field: "fusion".into(),
                reason: "each weight set must sum to 1.0".into(),
            });
        }
        if self.fusion.centrality_saturation < 2 {
            return Err(ConfigError::InvalidValue {
                field: "fusion.centrality_saturation".into(),
                reason: "saturation point must be at least 2".into(),
            });
        }
        if self.fusion.max_peer_evaluations == 0 {
            return Err(ConfigError::InvalidValue {
                field: "fusion.max_peer_evaluations".into(),
                reason: "at least one peer evaluation must be considered".into(),
            });
        }

        // Validate rating
        unit_range("rating.badmouthing_below", self.rating.badmouthing_below)?;
        unit_range("rating.collusion_above", self.rating.collusion_above)?;
        unit_range("rating.penalty", self.rating.penalty)?;
        if self.rating.flag_threshold == 0 {
            return Err(ConfigError::InvalidValue {
                field: "rating.flag_threshold".into(),
                reason: "flag threshold must be greater than zero".into(),
            });
        }

        // Validate flooding
        if self.flooding.window_secs <= 0 {
            return Err(ConfigError::InvalidValue {
                field: "flooding.window_secs".into(),
                reason: "window must be greater than zero".into(),
            });
        }
        if self.flooding.window_secs > MAX_WINDOW_SECS {
            return Err(ConfigError::InvalidValue {
                field: "flooding.window_secs".into(),
                reason: format!("window cannot exceed {MAX_WINDOW_SECS} seconds"),
            });
        }
        if self.flooding.member_threshold == 0 || self.flooding.coordinator_threshold == 0 {
            return Err(ConfigError::InvalidValue {
                field: "flooding.member_threshold".into(),
                reason: "connection allowances must be greater than zero".into(),
            });
        }
        unit_range("flooding.base_penalty", self.flooding.base_penalty)?;
        unit_range("flooding.max_penalty", self.flooding.max_penalty)?;
        if self.flooding.penalty_slope < 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "flooding.penalty_slope".into(),
                reason: "penalty slope cannot be negative".into(),
            });
        }
        if self.flooding.flag_threshold == 0 {
            return Err(ConfigError::InvalidValue {
                field: "flooding.flag_threshold".into(),
                reason: "flag threshold must be greater than zero".into(),
            });
        }

        // Validate rejoin decay
        unit_range("rejoin.decay_rate", self.rejoin.decay_rate)?;
        unit_range("rejoin.target_score", self.rejoin.target_score)?;
        if self.rejoin.decay_interval_secs <= 0 {
            return Err(ConfigError::InvalidValue {
                field: "rejoin.decay_interval_secs".into(),
                reason: "decay interval must be greater than zero".into(),
            });
        }

        Ok(())
    }
}

fn unit_range(field: &str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            field: field.into(),
            reason: format!("{value} must be between 0.0 and 1.0"),
        })
    }
}

/// Builder for [`EngineConfig`].
#[derive(Clone, Debug, Default)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    /// Create a new builder with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the configuration.
    pub fn build(self) -> EngineConfig {
        self.config
    }

    /// Build and validate the configuration.
    ///
    /// Returns an error if validation fails.
    pub fn build_validated(self) -> Result<EngineConfig, ConfigError> {
        let config = self.build();
        config.validate()?;
        Ok(config)
    }

    // ===== Fusion Configuration =====

    /// Set the blacklist threshold.
    pub fn with_trust_threshold(mut self, threshold: f64) -> Self {
        self.config.fusion.threshold = threshold;
        self
    }

    /// Set the direct trust step.
    pub fn with_direct_step(mut self, step: f64) -> Self {
        self.config.fusion.direct_step = step;
        self
    }

    /// Set how many recent peer evaluations feed a trust update.
    pub fn with_max_peer_evaluations(mut self, max: usize) -> Self {
        self.config.fusion.max_peer_evaluations = max;
        self
    }

    /// Replace the whole fusion configuration.
    pub fn with_fusion(mut self, fusion: FusionConfig) -> Self {
        self.config.fusion = fusion;
        self
    }

    // ===== Rating Configuration =====

    /// Set the dishonest-rating penalty.
    pub fn with_rating_penalty(mut self, penalty: f64) -> Self {
        self.config.rating.penalty = penalty;
        self
    }

    /// Set how many dishonest ratings flag a rater.
    pub fn with_rating_flag_threshold(mut self, threshold: u32) -> Self {
        self.config.rating.flag_threshold = threshold;
        self
    }

    // ===== Flooding Configuration =====

    /// Set member and coordinator connection allowances.
    pub fn with_flood_thresholds(mut self, member: usize, coordinator: usize) -> Self {
        self.config.flooding = self.config.flooding.with_thresholds(member, coordinator);
        self
    }

    /// Set the flooding window.
    pub fn with_flood_window_secs(mut self, secs: i64) -> Self {
        self.config.flooding = self.config.flooding.with_window_secs(secs);
        self
    }

    /// Replace the whole flooding configuration.
    pub fn with_flooding(mut self, flooding: FloodingConfig) -> Self {
        self.config.flooding = flooding;
        self
    }

    // ===== Rejoin Configuration =====

    /// Set rejoin decay.
    pub fn with_rejoin_decay(mut self, decay: DecayConfig) -> Self {
        self.config.rejoin = decay;
        self
    }
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// Invalid configuration value.
    #[error("Invalid configuration value for '{field}': {reason}")]
    InvalidValue {
        /// The field name.
        field: String,
        /// The reason it's invalid.
        reason: String,
    },

    /// The configuration document could not be parsed.
    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.trust_threshold(), 0.3);
        assert_eq!(config.flooding.coordinator_threshold, 24);
        assert_eq!(config.rating.penalty, 0.15);
    }

    #[test]
    fn test_builder() {
        let config = EngineConfig::builder()
            .with_trust_threshold(0.4)
            .with_direct_step(0.1)
            .with_max_peer_evaluations(5)
            .with_rating_penalty(0.2)
            .with_rating_flag_threshold(2)
            .with_flood_thresholds(6, 12)
            .with_flood_window_secs(30)
            .build();
        assert_eq!(config.fusion.threshold, 0.4);
        assert_eq!(config.fusion.direct_step, 0.1);
        assert_eq!(config.fusion.max_peer_evaluations, 5);
        assert_eq!(config.rating.penalty, 0.2);
        assert_eq!(config.rating.flag_threshold, 2);
        assert_eq!(config.flooding.member_threshold, 6);
        assert_eq!(config.flooding.window_secs, 30);
        assert_eq!(config.admission_policy().threshold, 0.4);
    }

    #[test]
    fn test_validate_threshold_range() {
        let result = EngineConfig::builder().with_trust_threshold(1.5).build_validated();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "fusion.threshold"
        ));
    }

    #[test]
    fn test_validate_weights_normalized() {
        let fusion = FusionConfig {
            indirect_weight: 0.5,
            ..FusionConfig::default()
        };
        let result = EngineConfig::builder().with_fusion(fusion).build_validated();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "fusion"
        ));
    }

    #[test]
    fn test_validate_flooding() {
        let result = EngineConfig::builder().with_flood_thresholds(0, 10).build_validated();
        assert!(result.is_err());
        let result = EngineConfig::builder().with_flood_window_secs(0).build_validated();
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_flooding_window_upper_bound() {
        let result = EngineConfig::builder()
            .with_flood_window_secs(10_000_000_000_000)
            .build_validated();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "flooding.window_secs"
        ));
        let config = EngineConfig::builder()
            .with_flood_window_secs(MAX_WINDOW_SECS)
            .build_validated()
            .unwrap();
        assert_eq!(config.flooding.window_secs, MAX_WINDOW_SECS);
    }

    #[test]
    fn test_validate_rating_flag_threshold() {
        let result = EngineConfig::builder().with_rating_flag_threshold(0).build_validated();
        assert!(result.is_err());
    }

    #[test]
    fn test_from_json_partial() {
        let config = EngineConfig::from_json(
            r#"{ "flooding": { "member_threshold": 8 }, "fusion": { "threshold": 0.25 } }"#,
        )
        .unwrap();
        assert_eq!(config.flooding.member_threshold, 8);
        assert_eq!(config.flooding.coordinator_threshold, 24);
        assert_eq!(config.fusion.threshold, 0.25);
        assert_eq!(config.fusion.direct_step, 0.01);
    }

    #[test]
    fn test_from_json_invalid() {
        assert!(matches!(
            EngineConfig::from_json("{ not json"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_json_roundtrip() {
        let config = EngineConfig::builder().with_flood_thresholds(5, 9).build();
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(EngineConfig::from_json(&json).unwrap(), config);
    }
}
