//! MCTS configuration parameters.

use std::time::Duration;

use thiserror::Error;

/// Temperatures below this are treated as greedy (argmax) selection.
pub const GREEDY_TEMPERATURE: f32 = 1e-6;

/// Rejected configuration values.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("num_simulations must be at least 1")]
    ZeroSimulations,

    #[error("c_puct must be a non-negative finite number, got {0}")]
    InvalidCPuct(f32),

    #[error("temperature must be a non-negative finite number, got {0}")]
    InvalidTemperature(f32),
}

/// Configuration for Monte Carlo Tree Search.
#[derive(Debug, Clone, PartialEq)]
pub struct MctsConfig {
    /// Number of simulations to run per search. Always the hard cap.
    pub num_simulations: u32,

    /// PUCT exploration constant. Larger values lean on the priors longer.
    pub c_puct: f32,

    /// Temperature for action selection after search.
    /// 1.0 = sample proportional to visit counts
    /// 0.0 = always pick most-visited (argmax)
    pub temperature: f32,

    /// Optional wall-clock budget. The search stops early once it is spent,
    /// but always completes at least one simulation.
    pub max_duration: Option<Duration>,
}

impl Default for MctsConfig {
    fn default() -> Self {
        Self {
            num_simulations: 800,
            c_puct: 1.25,
            temperature: 1.0,
            max_duration: None,
        }
    }
}

impl MctsConfig {
    /// Config used when the engine plays against a human: a strong budget
    /// with a little randomness in the final choice.
    pub fn for_play() -> Self {
        Self {
            num_simulations: 1500,
            temperature: 0.1,
            ..Self::default()
        }
    }

    /// Create config for evaluation/inference (greedy selection).
    pub fn for_evaluation() -> Self {
        Self {
            temperature: 0.0,
            ..Self::default()
        }
    }

    /// Create a fast config for testing.
    pub fn for_testing() -> Self {
        Self {
            num_simulations: 50,
            temperature: 0.0,
            ..Self::default()
        }
    }

    /// Builder pattern: set number of simulations.
    pub fn with_simulations(mut self, n: u32) -> Self {
        self.num_simulations = n;
        self
    }

    /// Builder pattern: set c_puct exploration constant.
    pub fn with_c_puct(mut self, c: f32) -> Self {
        self.c_puct = c;
        self
    }

    /// Builder pattern: set temperature.
    pub fn with_temperature(mut self, t: f32) -> Self {
        self.temperature = t;
        self
    }

    /// Builder pattern: set the wall-clock budget.
    pub fn with_max_duration(mut self, d: Duration) -> Self {
        self.max_duration = Some(d);
        self
    }

    /// Whether the final action is the argmax of the visit counts.
    #[inline]
    pub fn is_greedy(&self) -> bool {
        self.temperature < GREEDY_TEMPERATURE
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_simulations == 0 {
            return Err(ConfigError::ZeroSimulations);
        }
        if !self.c_puct.is_finite() || self.c_puct < 0.0 {
            return Err(ConfigError::InvalidCPuct(self.c_puct));
        }
        if !self.temperature.is_finite() || self.temperature < 0.0 {
            return Err(ConfigError::InvalidTemperature(self.temperature));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MctsConfig::default();
        assert_eq!(config.num_simulations, 800);
        assert!((config.c_puct - 1.25).abs() < 1e-6);
        assert!(config.max_duration.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_pattern() {
        let config = MctsConfig::default()
            .with_simulations(100)
            .with_c_puct(2.0)
            .with_temperature(0.5)
            .with_max_duration(Duration::from_millis(250));

        assert_eq!(config.num_simulations, 100);
        assert!((config.c_puct - 2.0).abs() < 1e-6);
        assert!((config.temperature - 0.5).abs() < 1e-6);
        assert_eq!(config.max_duration, Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_presets() {
        let play = MctsConfig::for_play();
        assert_eq!(play.num_simulations, 1500);
        assert!((play.temperature - 0.1).abs() < 1e-6);
        assert!(!play.is_greedy());

        assert!(MctsConfig::for_evaluation().is_greedy());
        assert!(MctsConfig::for_testing().is_greedy());
        assert_eq!(MctsConfig::for_testing().num_simulations, 50);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert_eq!(
            MctsConfig::default().with_simulations(0).validate(),
            Err(ConfigError::ZeroSimulations)
        );
        assert_eq!(
            MctsConfig::default().with_c_puct(-0.5).validate(),
            Err(ConfigError::InvalidCPuct(-0.5))
        );
        assert!(MctsConfig::default()
            .with_c_puct(f32::NAN)
            .validate()
            .is_err());
        assert_eq!(
            MctsConfig::default().with_temperature(-1.0).validate(),
            Err(ConfigError::InvalidTemperature(-1.0))
        );
        assert!(MctsConfig::default()
            .with_temperature(f32::INFINITY)
            .validate()
            .is_err());

        // Zero exploration and zero temperature are allowed.
        assert!(MctsConfig::default()
            .with_c_puct(0.0)
            .with_temperature(0.0)
            .validate()
            .is_ok());
    }
}
