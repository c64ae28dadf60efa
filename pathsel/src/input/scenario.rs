use std::collections::{BTreeMap, HashMap};
use serde::Deserialize;

use super::config::Config;
use super::problem::*;

#[derive(Debug, Fail)]
pub enum ScenarioError {
    #[fail(display = "could not read scenario: {}", _0)]
    Json(String),
    #[fail(display = "edge ({},{}) has more than one weight", _0, _1)]
    DuplicateWeight(StationId, StationId),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ScenarioFile {
    paths: BTreeMap<PathName, Vec<Edge>>,
    weights: Vec<(StationId, StationId, f64)>,
    timetable: BTreeMap<StationId, f64>,
    #[serde(default)]
    passengers: Vec<Edge>,
    capacity: usize,
    #[serde(default)]
    budget: Option<Budget>,
    #[serde(default)]
    config: Config,
}

#[derive(Debug, Clone)]
pub struct Scenario {
    pub problem: Problem,
    pub config: Config,
}

/// Parses a JSON scenario:
///
/// ```json
/// { "paths": { "A": [[1,2],[2,4]] },
///   "weights": [[1,2,10.0], [2,4,10.0]],
///   "timetable": { "1": 100, "2": 110, "4": 130 },
///   "passengers": [[1,2]],
///   "capacity": 20,
///   "budget": { "costs": { "A": 200 }, "limit": 500 },
///   "config": { "stop_dwell": 5.0 } }
/// ```
///
/// `passengers`, `budget` and `config` (and every field inside
/// `config`) are optional.
pub fn parse_scenario(input: &str) -> Result<Scenario, ScenarioError> {
    let file: ScenarioFile = serde_json::from_str(input)
        .map_err(|e| ScenarioError::Json(e.to_string()))?;

    let mut weights = HashMap::new();
    for (u, v, w) in file.weights {
        if weights.insert((u, v), w).is_some() {
            return Err(ScenarioError::DuplicateWeight(u, v));
        }
    }

    let problem = Problem {
        paths: file.paths,
        weights,
        timetable: file.timetable,
        passengers: file.passengers.into_iter().map(|(o, d)| Passenger::new(o, d)).collect(),
        capacity: file.capacity,
        budget: file.budget,
    };
    Ok(Scenario { problem, config: file.config })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::config::*;

    #[test]
    fn bundled_scenario_parses() {
        let s = parse_scenario(include_str!("../../scenarios/maxpax.json")).unwrap();
        assert_eq!(s.problem.paths.len(), 4);
        assert_eq!(s.problem.paths["C"], vec![(1, 4), (4, 5), (5, 6), (6, 7)]);
        assert_eq!(s.problem.capacity, 20);
        assert_eq!(s.problem.budget.as_ref().unwrap().limit, 500.0);
        assert_eq!(s.config.objective, Objective::Coverage);
        assert_eq!(s.config.stop_dwell, 5.0);
        assert_eq!(s.config.coverage, Coverage::Endpoints);
        assert_eq!(s.config.window_guard, WindowGuard::Path);
        assert_eq!(s.config.min_service_rate, Some(0.7));
        assert!(s.problem.validate(&s.config).is_ok());
    }

    #[test]
    fn config_fields_default() {
        let s = parse_scenario(r#"{
            "paths": { "A": [[1, 2]] },
            "weights": [[1, 2, 4.0]],
            "timetable": { "1": 10, "2": 20 },
            "capacity": 3,
            "config": { "big_m": 500.0, "capacity_mode": "on-board" }
        }"#).unwrap();
        assert!(s.problem.passengers.is_empty());
        assert!(s.problem.budget.is_none());
        assert_eq!(s.config.big_m, 500.0);
        assert_eq!(s.config.capacity_mode, CapacityMode::OnBoard);
        assert_eq!(s.config.pickup_window_slack, 10.0);
        assert_eq!(s.config.objective, Objective::default());
    }

    #[test]
    fn duplicate_weight_is_rejected() {
        let r = parse_scenario(r#"{
            "paths": {}, "timetable": {}, "capacity": 1,
            "weights": [[1, 2, 4.0], [1, 2, 5.0]]
        }"#);
        assert!(matches!(r, Err(ScenarioError::DuplicateWeight(1, 2))));
    }

    #[test]
    fn unknown_field_is_rejected() {
        let r = parse_scenario(r#"{
            "paths": {}, "timetable": {}, "capacity": 1, "weights": [], "capmax": 3
        }"#);
        assert!(matches!(r, Err(ScenarioError::Json(_))));
    }
}
