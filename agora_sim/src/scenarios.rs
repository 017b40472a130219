//! Load scenarios for the simulation.

use crate::world::SimConfig;
use std::time::Duration;

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScenarioId {
    /// Baseline: default skew, periods and connectivity
    Steady,

    /// A few agents hammer the engine
    HotSpot,

    /// Users drop in and out every second
    Churn,

    /// Engine reachable over a lossy link
    Flaky,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::Steady,
            ScenarioId::HotSpot,
            ScenarioId::Churn,
            ScenarioId::Flaky,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::Steady => "steady",
            ScenarioId::HotSpot => "hot_spot",
            ScenarioId::Churn => "churn",
            ScenarioId::Flaky => "flaky",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::Steady => "Zipf 1.1, one trigger per 100ms, 80% connected, 5s churn",
            ScenarioId::HotSpot => "Zipf 1.6, one trigger per 20ms: a handful of agents dominate",
            ScenarioId::Churn => "50% connected, connectivity redrawn every second",
            ScenarioId::Flaky => "10% of requests dropped, 250ms request timeout",
        }
    }

    /// Applies the scenario's overrides to `config`.
    pub fn apply(&self, config: &mut SimConfig) {
        match self {
            ScenarioId::Steady => {}
            ScenarioId::HotSpot => {
                config.zipf_skew = 1.6;
                config.action_interval = Duration::from_millis(20);
            }
            ScenarioId::Churn => {
                config.connect_probability = 0.5;
                config.connectivity_interval = Duration::from_secs(1);
            }
            ScenarioId::Flaky => {
                config.drop_rate = 0.1;
                config.request_timeout = Duration::from_millis(250);
            }
        }
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "steady" => Ok(ScenarioId::Steady),
            "hot_spot" | "hotspot" => Ok(ScenarioId::HotSpot),
            "churn" => Ok(ScenarioId::Churn),
            "flaky" => Ok(ScenarioId::Flaky),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}
