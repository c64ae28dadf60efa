use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc::{channel, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use good_lp::{default_solver, variable, Expression, ProblemVariables, ResolutionError,
              Solution, SolverModel, Variable};
use log::{debug, info, warn};

use crate::error::{BoundConflict, BoundSide, Conflict};
use crate::milp::*;

/// What the external solver reports for an assembled model.
#[derive(Debug, Clone, PartialEq)]
pub enum SolveStatus {
    /// Values indexed like `Milp::variables()`.
    Optimal { values: Vec<f64>, objective: f64 },
    Infeasible(Conflict),
    Unbounded,
    TimedOut(Duration),
    Failed(String),
}

/// The "optimize this MILP" collaborator. Implementations must not
/// retry: identical input gives an identical answer.
pub trait MilpSolver {
    fn solve(&self, milp: &Milp) -> SolveStatus;
}

/// Solves through `good_lp`, lowering guarded constraints with the
/// model's big-M.
#[derive(Debug, Clone)]
pub struct GoodLpSolver {
    /// Run the solve on a worker thread and give up after this long.
    /// The limit also covers the conflict search; running out during the
    /// search reports `TimedOut` rather than a partial conflict.
    /// An abandoned worker keeps running until it finishes on its own.
    pub time_limit: Option<Duration>,
    /// Search for an irreducible conflict when the model is infeasible.
    pub diagnose: bool,
}

impl Default for GoodLpSolver {
    fn default() -> GoodLpSolver {
        GoodLpSolver { time_limit: None, diagnose: true }
    }
}

#[derive(Debug)]
enum Failure {
    Infeasible,
    Unbounded,
    Other(String),
}

impl MilpSolver for GoodLpSolver {
    fn solve(&self, milp: &Milp) -> SolveStatus {
        info!("Solving {} ({} variables, {} constraints).", milp.name,
              milp.variables().len(), milp.constraints().len());
        let started = Instant::now();
        let deadline = self.time_limit.map(|limit| started + limit);
        let timed_out = |limit: Option<Duration>| {
            let limit = limit.unwrap_or_default();
            warn!("No answer from solver within {:?}.", limit);
            SolveStatus::TimedOut(limit)
        };

        let result = match run_until(milp.clone(), deadline) {
            Some(r) => r,
            None => return timed_out(self.time_limit),
        };
        debug!("Solver returned after {:?}.", started.elapsed());

        match result {
            Ok(values) => {
                let objective = milp.objective.evaluate(&values);
                info!("Optimal solution, objective {}.", objective);
                SolveStatus::Optimal { values, objective }
            }
            Err(Failure::Infeasible) => {
                info!("Model is infeasible.");
                if !self.diagnose {
                    return SolveStatus::Infeasible(Conflict::default());
                }
                match find_conflict(milp, deadline) {
                    Some(conflict) => SolveStatus::Infeasible(conflict),
                    None => timed_out(self.time_limit),
                }
            }
            Err(Failure::Unbounded) => SolveStatus::Unbounded,
            Err(Failure::Other(msg)) => SolveStatus::Failed(msg),
        }
    }
}

fn run_with_limit(milp: Milp, limit: Duration) -> Option<Result<Vec<f64>, Failure>> {
    let (tx, rx) = channel();
    let spawned = thread::Builder::new()
        .name("milp-worker".into())
        .spawn(move || {
            // receiver may be gone after a timeout
            let _ = tx.send(run_guarded(&milp));
        });
    if let Err(e) = spawned {
        return Some(Err(Failure::Other(format!("could not start solver thread: {}", e))));
    }

    match rx.recv_timeout(limit) {
        Ok(r) => Some(r),
        Err(RecvTimeoutError::Timeout) => None,
        Err(RecvTimeoutError::Disconnected) => Some(Err(Failure::Other(
            "solver thread stopped without an answer".to_string()))),
    }
}

/// `None` when the deadline passes first.
fn run_until(milp: Milp, deadline: Option<Instant>) -> Option<Result<Vec<f64>, Failure>> {
    match deadline {
        None => Some(run_guarded(&milp)),
        Some(deadline) => {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining == Duration::from_secs(0) {
                return None;
            }
            run_with_limit(milp, remaining)
        }
    }
}

fn run_guarded(milp: &Milp) -> Result<Vec<f64>, Failure> {
    catch_unwind(AssertUnwindSafe(|| solve_once(milp)))
        .unwrap_or_else(|_| Err(Failure::Other("solver panicked".to_string())))
}

fn to_expression(e: &LinExpr, handles: &[Variable]) -> Expression {
    e.terms.iter().fold(Expression::from(e.constant), |acc, &(v, c)| {
        acc + c * handles[v.index()]
    })
}

fn solve_once(milp: &Milp) -> Result<Vec<f64>, Failure> {
    let mut vars = ProblemVariables::new();
    let handles: Vec<Variable> = milp.variables().iter().map(|v| {
        let mut def = variable().name(v.name.clone());
        match v.kind {
            VarKind::Binary => def = def.binary(),
            VarKind::Continuous => {
                if v.lower.is_finite() { def = def.min(v.lower); }
                if v.upper.is_finite() { def = def.max(v.upper); }
            }
        }
        vars.add(def)
    }).collect();

    let objective = to_expression(&milp.objective, &handles);
    let unsolved = match milp.direction {
        Direction::Minimise => vars.minimise(objective),
        Direction::Maximise => vars.maximise(objective),
    };
    let mut problem = unsolved.using(default_solver);

    for c in milp.constraints() {
        for (terms, sense, rhs) in c.lower(milp.big_m) {
            let e = to_expression(&terms, &handles);
            let row = match sense {
                Sense::Le => e.leq(rhs),
                Sense::Ge => e.geq(rhs),
                Sense::Eq => e.eq(rhs),
            };
            problem.add_constraint(row);
        }
    }

    match problem.solve() {
        Ok(solution) => Ok(handles.iter().map(|h| solution.value(*h)).collect()),
        Err(ResolutionError::Infeasible) => Err(Failure::Infeasible),
        Err(ResolutionError::Unbounded) => Err(Failure::Unbounded),
        Err(e) => Err(Failure::Other(e.to_string())),
    }
}

/// Deletion filter: drop each constraint, then each finite continuous
/// bound, in turn; keep it only if the rest becomes feasible without it.
/// One solve per item, so only meant for small models. `None` when the
/// deadline passes before the search completes.
fn find_conflict(milp: &Milp, deadline: Option<Instant>) -> Option<Conflict> {
    let still_infeasible = |dropped: &[bool], bounds: &[(usize, bool)]| {
        match run_until(milp.relaxed(dropped, bounds), deadline)? {
            Err(Failure::Infeasible) => Some(true),
            _ => Some(false),
        }
    };

    let n = milp.constraints().len();
    let mut dropped = vec![false; n];
    for i in 0..n {
        dropped[i] = true;
        if !still_infeasible(&dropped, &[])? {
            dropped[i] = false;
        }
    }
    debug!("Conflict search kept {} of {} constraints.",
           dropped.iter().filter(|d| !**d).count(), n);

    let bound_items: Vec<(usize, bool)> = milp.variables().iter().enumerate()
        .filter(|(_, v)| v.kind == VarKind::Continuous)
        .flat_map(|(i, v)| {
            let mut items = Vec::new();
            if v.lower.is_finite() { items.push((i, true)); }
            if v.upper.is_finite() { items.push((i, false)); }
            items
        })
        .collect();

    let mut dropped_bounds = Vec::new();
    let mut kept_bounds = Vec::new();
    for item in bound_items {
        dropped_bounds.push(item);
        if !still_infeasible(&dropped, &dropped_bounds)? {
            dropped_bounds.pop();
            kept_bounds.push(item);
        }
    }

    Some(Conflict {
        constraints: milp.constraints().iter().zip(dropped.iter())
            .filter(|(_, d)| !**d)
            .map(|(c, _)| c.name.clone())
            .collect(),
        bounds: kept_bounds.into_iter().map(|(i, lower)| {
            let v = &milp.variables()[i];
            BoundConflict {
                variable: v.name.clone(),
                side: if lower { BoundSide::Lower } else { BoundSide::Upper },
                value: if lower { v.lower } else { v.upper },
            }
        }).collect(),
    })
}
