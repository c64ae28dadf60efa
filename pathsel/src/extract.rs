use log::{debug, info};
use serde::Serialize;

use crate::error::PlanError;
use crate::input::problem::*;
use crate::model::PathSelectionModel;
use crate::solver::SolveStatus;

/// Binary values above this count as set. Absorbs solver noise.
pub const ACTIVE_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StopTime {
    pub station: StationId,
    pub planned: f64,
    pub arrival: f64,
    /// `max(0, arrival - planned)`
    pub delay: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivePath {
    pub name: PathName,
    pub edges: Vec<Edge>,
    pub stops: Vec<StopTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PassengerOutcome {
    pub origin: StationId,
    pub destination: StationId,
    pub served: bool,
    /// Arc travelled when served.
    pub arc: Option<Edge>,
    /// Active path carrying the passenger when served.
    pub path: Option<PathName>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Solution {
    pub objective: f64,
    pub active_paths: Vec<ActivePath>,
    pub passengers: Vec<PassengerOutcome>,
    pub served_count: usize,
}

impl Solution {
    pub fn active_path(&self, name: &str) -> Option<&ActivePath> {
        self.active_paths.iter().find(|p| p.name == name)
    }

    pub fn arrival(&self, station: StationId) -> Option<f64> {
        self.active_paths.iter()
            .flat_map(|p| p.stops.iter())
            .find(|s| s.station == station)
            .map(|s| s.arrival)
    }
}

/// Reads a solver answer back into stations, paths and passengers.
pub struct ResultExtractor<'a> {
    problem: &'a Problem,
    model: &'a PathSelectionModel,
}

impl<'a> ResultExtractor<'a> {
    pub fn new(problem: &'a Problem, model: &'a PathSelectionModel) -> ResultExtractor<'a> {
        ResultExtractor { problem, model }
    }

    pub fn extract(&self, status: SolveStatus) -> Result<Solution, PlanError> {
        match status {
            SolveStatus::Optimal { values, objective } => Ok(self.solution(&values, objective)),
            SolveStatus::Infeasible(conflict) => Err(PlanError::Infeasible(conflict)),
            SolveStatus::Unbounded => Err(PlanError::Unbounded),
            SolveStatus::TimedOut(limit) => Err(PlanError::Timeout(limit)),
            SolveStatus::Failed(msg) => Err(PlanError::Backend(msg)),
        }
    }

    fn solution(&self, values: &[f64], objective: f64) -> Solution {
        let is_set = |v: crate::milp::VarId| values[v.index()] > ACTIVE_THRESHOLD;

        let active_paths: Vec<ActivePath> = self.model.active.iter()
            .filter(|(_, v)| is_set(**v))
            .map(|(name, _)| {
                let edges = self.problem.paths[name].clone();
                let stops = path_stations(&edges).into_iter().map(|station| {
                    let planned = self.problem.timetable[&station];
                    let arrival = values[self.model.arrival[&station].index()];
                    StopTime { station, planned, arrival, delay: (arrival - planned).max(0.0) }
                }).collect();
                ActivePath { name: name.clone(), edges, stops }
            })
            .collect();
        debug!("Active paths: {:?}", active_paths.iter().map(|p| &p.name).collect::<Vec<_>>());

        let passengers: Vec<PassengerOutcome> = self.problem.passengers.iter().enumerate()
            .map(|(i, pax)| {
                let served = is_set(self.model.served[i]);
                let path = if served {
                    self.model.covering[i].iter()
                        .find(|p| is_set(self.model.active[*p]))
                        .cloned()
                } else {
                    None
                };
                PassengerOutcome {
                    origin: pax.origin,
                    destination: pax.destination,
                    served,
                    arc: if served { Some(pax.arc()) } else { None },
                    path,
                }
            })
            .collect();

        let served_count = passengers.iter().filter(|p| p.served).count();
        info!("{} of {} passengers served.", served_count, passengers.len());

        Solution { objective, active_paths, passengers, served_count }
    }
}
