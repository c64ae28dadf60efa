use std::collections::{BTreeMap, HashMap, HashSet};
use serde::{Deserialize, Serialize};

use crate::error::PlanError;
use crate::input::config::{Config, Objective};

pub type StationId = usize;
pub type Edge = (StationId, StationId);
pub type PathName = String;

/// Travel demand along a single arc of the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Passenger {
    pub origin: StationId,
    pub destination: StationId,
}

impl Passenger {
    pub fn new(origin: StationId, destination: StationId) -> Passenger {
        Passenger { origin, destination }
    }

    pub fn arc(&self) -> Edge {
        (self.origin, self.destination)
    }
}

/// Cost data enabling budget-limited selection of several paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Budget {
    pub costs: BTreeMap<PathName, f64>,
    pub limit: f64,
}

/// Everything the model is built from, constructed fresh for each solve.
#[derive(Debug, Clone, Default)]
pub struct Problem {
    /// Candidate paths, each a head-to-tail chain of edges.
    pub paths: BTreeMap<PathName, Vec<Edge>>,
    /// Travel duration per network edge. Also defines which arcs exist.
    pub weights: HashMap<Edge, f64>,
    /// Planned time per station.
    pub timetable: BTreeMap<StationId, f64>,
    pub passengers: Vec<Passenger>,
    /// Maximum number of passengers per arc (or per on-board segment).
    pub capacity: usize,
    pub budget: Option<Budget>,
}

/// Stations visited by a chain of edges, in travel order.
pub fn path_stations(edges: &[Edge]) -> Vec<StationId> {
    let mut stations = Vec::with_capacity(edges.len() + 1);
    if let Some(&(first, _)) = edges.first() {
        stations.push(first);
    }
    stations.extend(edges.iter().map(|&(_, v)| v));
    stations
}

impl Problem {
    /// Pickup window `(earliest, latest)` at a station. Stations without
    /// a timetable entry accept any time.
    pub fn pickup_window(&self, station: StationId, slack: f64) -> (f64, f64) {
        match self.timetable.get(&station) {
            Some(&planned) => (planned, planned + slack),
            None => (0.0, std::f64::INFINITY),
        }
    }

    pub fn validate(&self, config: &Config) -> Result<(), PlanError> {
        self.validate_config(config)?;

        for (name, edges) in &self.paths {
            validate_path(name, edges)?;
            for (idx, edge) in edges.iter().enumerate() {
                match self.weights.get(edge) {
                    None => return Err(PlanError::UnknownEdge {
                        from: edge.0,
                        to: edge.1,
                        context: format!("path {}", name),
                    }),
                    Some(w) if !(w.is_finite() && *w >= 0.0) => {
                        return Err(PlanError::InvalidInput(format!(
                            "edge {} of path {} has weight {}", idx, name, w)));
                    }
                    _ => {}
                }
            }
            for station in path_stations(edges) {
                match self.timetable.get(&station) {
                    None => return Err(PlanError::UnknownStation {
                        station,
                        path: name.clone(),
                    }),
                    Some(t) if !t.is_finite() => {
                        return Err(PlanError::InvalidInput(format!(
                            "planned time {} at station {}", t, station)));
                    }
                    _ => {}
                }
            }
        }

        for (idx, p) in self.passengers.iter().enumerate() {
            if p.origin == p.destination {
                return Err(PlanError::InvalidInput(format!(
                    "passenger {} has origin equal to destination ({})", idx, p.origin)));
            }
            if !self.weights.contains_key(&p.arc()) {
                return Err(PlanError::UnknownEdge {
                    from: p.origin,
                    to: p.destination,
                    context: format!("passenger {}", idx),
                });
            }
        }

        if let Some(budget) = &self.budget {
            if !(budget.limit.is_finite() && budget.limit >= 0.0) {
                return Err(PlanError::InvalidInput(format!("budget limit {}", budget.limit)));
            }
            for name in self.paths.keys() {
                match budget.costs.get(name) {
                    None => return Err(PlanError::InvalidInput(format!(
                        "path {} has no cost", name))),
                    Some(c) if !(c.is_finite() && *c >= 0.0) => {
                        return Err(PlanError::InvalidInput(format!(
                            "path {} has cost {}", name, c)));
                    }
                    _ => {}
                }
            }
        }

        Ok(())
    }

    fn validate_config(&self, config: &Config) -> Result<(), PlanError> {
        let non_negative = [
            ("pickup window slack", config.pickup_window_slack),
            ("stop dwell", config.stop_dwell),
            ("big-M", config.big_m),
        ];
        for (what, value) in non_negative.iter() {
            if !(value.is_finite() && *value >= 0.0) {
                return Err(PlanError::InvalidInput(format!("{} is {}", what, value)));
            }
        }
        if let Objective::Delay { weight_delay, weight_service } = config.objective {
            if !(weight_delay >= 0.0 && weight_service >= 0.0)
                || !weight_delay.is_finite() || !weight_service.is_finite() {
                return Err(PlanError::InvalidInput(format!(
                    "objective weights ({}, {})", weight_delay, weight_service)));
            }
        }
        if let Some(rate) = config.min_service_rate {
            if !(rate >= 0.0 && rate <= 1.0) {
                return Err(PlanError::InvalidInput(format!("service rate {}", rate)));
            }
        }
        Ok(())
    }
}

fn validate_path(name: &str, edges: &[Edge]) -> Result<(), PlanError> {
    let malformed = |index: usize, reason: String| PlanError::MalformedPath {
        path: name.to_string(),
        index,
        reason,
    };

    if edges.is_empty() {
        return Err(malformed(0, "path has no edges".to_string()));
    }

    let mut seen = HashSet::new();
    seen.insert(edges[0].0);
    for (idx, &(u, v)) in edges.iter().enumerate() {
        if u == v {
            return Err(malformed(idx, format!("self loop at station {}", u)));
        }
        if idx > 0 {
            let prev = edges[idx - 1].1;
            if prev != u {
                return Err(malformed(idx, format!(
                    "edge starts at {} but previous edge ends at {}", u, prev)));
            }
        }
        if !seen.insert(v) {
            return Err(malformed(idx, format!("station {} visited twice", v)));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use maplit::*;

    fn problem() -> Problem {
        Problem {
            paths: btreemap! {
                "A".to_string() => vec![(1, 2), (2, 4)],
            },
            weights: hashmap! { (1, 2) => 10.0, (2, 4) => 10.0, (1, 3) => 5.0 },
            timetable: btreemap! { 1 => 100.0, 2 => 0.0, 4 => 0.0 },
            passengers: vec![Passenger::new(1, 2)],
            capacity: 2,
            budget: None,
        }
    }

    #[test]
    fn accepts_consistent_input() {
        assert!(problem().validate(&Config::default()).is_ok());
    }

    #[test]
    fn rejects_broken_chain() {
        let mut p = problem();
        p.paths.insert("B".to_string(), vec![(1, 2), (3, 4)]);
        p.weights.insert((3, 4), 1.0);
        match p.validate(&Config::default()) {
            Err(PlanError::MalformedPath { path, index, .. }) => {
                assert_eq!(path, "B");
                assert_eq!(index, 1);
            }
            x => panic!("unexpected {:?}", x),
        }
    }

    #[test]
    fn rejects_revisited_station() {
        let mut p = problem();
        p.paths.insert("B".to_string(), vec![(1, 2), (2, 1)]);
        p.weights.insert((2, 1), 1.0);
        assert!(matches!(p.validate(&Config::default()),
                         Err(PlanError::MalformedPath { .. })));
    }

    #[test]
    fn rejects_missing_timetable_entry() {
        let mut p = problem();
        p.timetable.remove(&4);
        match p.validate(&Config::default()) {
            Err(PlanError::UnknownStation { station, .. }) => assert_eq!(station, 4),
            x => panic!("unexpected {:?}", x),
        }
    }

    #[test]
    fn rejects_unknown_passenger_arc() {
        let mut p = problem();
        p.passengers.push(Passenger::new(4, 7));
        assert!(matches!(p.validate(&Config::default()),
                         Err(PlanError::UnknownEdge { from: 4, to: 7, .. })));
    }

    #[test]
    fn rejects_negative_slack() {
        let config = Config { pickup_window_slack: -1.0, ..Config::default() };
        assert!(matches!(problem().validate(&config), Err(PlanError::InvalidInput(_))));
    }

    #[test]
    fn window_defaults_without_timetable_entry() {
        let p = problem();
        assert_eq!(p.pickup_window(1, 10.0), (100.0, 110.0));
        let (start, end) = p.pickup_window(3, 10.0);
        assert_eq!(start, 0.0);
        assert!(end.is_infinite());
    }
}
