use std::fmt;
use std::time::Duration;
use serde::Serialize;

use crate::input::problem::StationId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BoundSide {
    Lower,
    Upper,
}

/// A variable bound that takes part in an infeasible subsystem.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoundConflict {
    pub variable: String,
    pub side: BoundSide,
    pub value: f64,
}

/// Irreducible inconsistent subsystem reported by the solver: removing
/// any one of these constraints or bounds makes the rest feasible.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Conflict {
    pub constraints: Vec<String>,
    pub bounds: Vec<BoundConflict>,
}

impl Conflict {
    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty() && self.bounds.is_empty()
    }
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "(no conflict information)");
        }
        writeln!(f, "constraints:")?;
        for c in &self.constraints {
            writeln!(f, " - {}", c)?;
        }
        if !self.bounds.is_empty() {
            writeln!(f, "bounds:")?;
            for b in &self.bounds {
                let side = match b.side {
                    BoundSide::Lower => "LB",
                    BoundSide::Upper => "UB",
                };
                writeln!(f, " - {} ({} {})", b.variable, side, b.value)?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Fail)]
pub enum PlanError {
    #[fail(display = "path {} is malformed at edge {}: {}", path, index, reason)]
    MalformedPath { path: String, index: usize, reason: String },
    #[fail(display = "station {} on path {} has no timetable entry", station, path)]
    UnknownStation { station: StationId, path: String },
    #[fail(display = "edge ({},{}) used by {} has no travel weight", from, to, context)]
    UnknownEdge { from: StationId, to: StationId, context: String },
    #[fail(display = "invalid input: {}", _0)]
    InvalidInput(String),
    #[fail(display = "model is infeasible:\n{}", _0)]
    Infeasible(Conflict),
    #[fail(display = "model is unbounded")]
    Unbounded,
    #[fail(display = "solver gave up after {:?}", _0)]
    Timeout(Duration),
    #[fail(display = "solver failed: {}", _0)]
    Backend(String),
}
