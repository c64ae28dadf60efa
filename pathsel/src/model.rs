use std::collections::{BTreeMap, BTreeSet, HashMap};
use log::{debug, info};

use crate::error::PlanError;
use crate::input::config::*;
use crate::input::problem::*;
use crate::milp::*;

/// The assembled MILP together with the variables the extractor reads.
#[derive(Debug, Clone)]
pub struct PathSelectionModel {
    pub milp: Milp,
    pub active: BTreeMap<PathName, VarId>,
    pub arrival: BTreeMap<StationId, VarId>,
    pub served: Vec<VarId>,
    /// Paths able to carry each passenger, indexed like `Problem.passengers`.
    pub covering: Vec<Vec<PathName>>,
}

struct PathInfo<'a> {
    name: &'a PathName,
    edges: &'a [Edge],
    stations: Vec<StationId>,
    position: HashMap<StationId, usize>,
}

impl<'a> PathInfo<'a> {
    fn contains(&self, s: StationId) -> bool {
        self.position.contains_key(&s)
    }

    /// Positions of boarding and alighting when this path can carry the
    /// passenger.
    fn ride(&self, p: &Passenger, coverage: Coverage) -> Option<(usize, usize)> {
        let from = *self.position.get(&p.origin)?;
        let to = *self.position.get(&p.destination)?;
        let ok = match coverage {
            Coverage::Arc => to == from + 1,
            Coverage::Endpoints => from < to,
        };
        if ok { Some((from, to)) } else { None }
    }
}

pub struct ModelBuilder<'a> {
    problem: &'a Problem,
    config: &'a Config,
    paths: Vec<PathInfo<'a>>,
}

impl<'a> ModelBuilder<'a> {
    /// Validates the input. Fails before any variable is created.
    pub fn new(problem: &'a Problem, config: &'a Config) -> Result<ModelBuilder<'a>, PlanError> {
        problem.validate(config)?;
        let paths = problem.paths.iter().map(|(name, edges)| {
            let stations = path_stations(edges);
            let position = stations.iter().enumerate().map(|(i, s)| (*s, i)).collect();
            PathInfo { name, edges, stations, position }
        }).collect();
        Ok(ModelBuilder { problem, config, paths })
    }

    pub fn build(&self) -> PathSelectionModel {
        let mut milp = Milp::new("path_selection", self.config.big_m);

        let active: BTreeMap<PathName, VarId> = self.paths.iter()
            .map(|p| (p.name.clone(), milp.add_binary(format!("active_{}", p.name))))
            .collect();

        let all_stations: BTreeSet<StationId> = self.paths.iter()
            .flat_map(|p| p.stations.iter().cloned()).collect();
        let arrival: BTreeMap<StationId, VarId> = all_stations.into_iter()
            .map(|s| (s, milp.add_continuous(format!("arrival_{}", s), 0.0, std::f64::INFINITY)))
            .collect();

        let served: Vec<VarId> = (0..self.problem.passengers.len())
            .map(|i| milp.add_binary(format!("served_{}", i)))
            .collect();

        let covering: Vec<Vec<PathName>> = self.problem.passengers.iter()
            .map(|pax| self.paths.iter()
                 .filter(|p| p.ride(pax, self.config.coverage).is_some())
                 .map(|p| p.name.clone()).collect())
            .collect();

        let mut m = Assembly { milp, active, arrival, served, covering };
        self.selection(&mut m);
        self.time_propagation(&mut m);
        self.pickup_windows(&mut m);
        self.eligibility(&mut m);
        match self.config.capacity_mode {
            CapacityMode::PerArc => self.capacity_per_arc(&mut m),
            CapacityMode::OnBoard => self.capacity_on_board(&mut m),
        }
        self.objective(&mut m);

        info!("Built model with {} paths, {} passengers: {} variables, {} constraints.",
              self.paths.len(), self.problem.passengers.len(),
              m.milp.variables().len(), m.milp.constraints().len());

        PathSelectionModel {
            milp: m.milp,
            active: m.active,
            arrival: m.arrival,
            served: m.served,
            covering: m.covering,
        }
    }

    fn selection(&self, m: &mut Assembly) {
        let all_active = LinExpr::sum(m.active.values().cloned());
        match &self.problem.budget {
            None => {
                m.milp.add_constraint("max_one_path".to_string(), all_active, Sense::Le, 1.0);
            }
            Some(budget) => {
                let mut cost = LinExpr::new();
                for (name, v) in &m.active {
                    cost.add_term(budget.costs[name], *v);
                }
                m.milp.add_constraint("budget".to_string(), cost, Sense::Le, budget.limit);
                if self.config.single_path {
                    m.milp.add_constraint("max_one_path".to_string(), all_active, Sense::Le, 1.0);
                }
            }
        }

        if let Some(rate) = self.config.min_service_rate {
            let required = rate * self.problem.passengers.len() as f64;
            debug!("Requiring at least {} served passengers.", required);
            m.milp.add_constraint("min_service_rate".to_string(),
                                  LinExpr::sum(m.served.iter().cloned()), Sense::Ge, required);
        }
    }

    fn time_propagation(&self, m: &mut Assembly) {
        for path in &self.paths {
            let z = m.active[path.name];
            let first = path.stations[0];
            // Scaled rather than guarded: collapses to arrival >= 0 when inactive.
            let planned = self.problem.timetable[&first];
            m.milp.add_constraint(format!("start_time_{}_{}", path.name, first),
                                  LinExpr::var(m.arrival[&first]).plus(-planned, z),
                                  Sense::Ge, 0.0);

            for &(u, v) in path.edges {
                let travel = self.problem.weights[&(u, v)] + self.config.stop_dwell;
                m.milp.add_guarded(format!("time_progression_{}_{}_{}", path.name, u, v),
                                   LinExpr::var(m.arrival[&v]).plus(-1.0, m.arrival[&u]),
                                   Sense::Ge, travel, Guard::on(z));
            }
        }
    }

    fn pickup_windows(&self, m: &mut Assembly) {
        let slack = self.config.pickup_window_slack;
        match self.config.window_guard {
            WindowGuard::Path => {
                for path in &self.paths {
                    let origins: BTreeSet<StationId> = self.problem.passengers.iter()
                        .filter(|pax| path.ride(pax, self.config.coverage).is_some())
                        .map(|pax| pax.origin).collect();
                    let z = m.active[path.name];
                    for o in origins {
                        let (start, end) = self.problem.pickup_window(o, slack);
                        add_window(&mut m.milp, &format!("window_{{}}_{}_{}", path.name, o),
                                   m.arrival[&o], start, end, Guard::on(z));
                    }
                }
            }
            WindowGuard::Passenger => {
                for (i, pax) in self.problem.passengers.iter().enumerate() {
                    if m.covering[i].is_empty() {
                        continue;
                    }
                    let (start, end) = self.problem.pickup_window(pax.origin, slack);
                    add_window(&mut m.milp, &format!("pax_{}_window_{{}}", i),
                               m.arrival[&pax.origin], start, end, Guard::on(m.served[i]));
                }
            }
        }
    }

    fn eligibility(&self, m: &mut Assembly) {
        for (i, paths) in m.covering.iter().enumerate() {
            if paths.is_empty() {
                debug!("Passenger {} cannot be carried by any path.", i);
                m.milp.add_constraint(format!("unservable_{}", i),
                                      LinExpr::var(m.served[i]), Sense::Eq, 0.0);
            } else {
                let mut lhs = LinExpr::var(m.served[i]);
                for p in paths {
                    lhs.add_term(-1.0, m.active[p]);
                }
                m.milp.add_constraint(format!("eligible_{}", i), lhs, Sense::Le, 0.0);
            }
        }
    }

    fn capacity_per_arc(&self, m: &mut Assembly) {
        let mut by_arc: BTreeMap<Edge, Vec<usize>> = BTreeMap::new();
        for (i, pax) in self.problem.passengers.iter().enumerate() {
            by_arc.entry(pax.arc()).or_insert_with(Vec::new).push(i);
        }

        let capacity = self.problem.capacity as f64;
        for ((u, v), pax) in by_arc {
            let relevant: Vec<VarId> = self.paths.iter()
                .filter(|p| p.contains(u) && p.contains(v))
                .map(|p| m.active[p.name]).collect();
            if relevant.is_empty() {
                continue;
            }
            let mut lhs = LinExpr::sum(pax.iter().map(|i| m.served[*i]));
            for z in relevant {
                lhs.add_term(-capacity, z);
            }
            m.milp.add_constraint(format!("cap_{}_{}", u, v), lhs, Sense::Le, 0.0);
        }
    }

    fn capacity_on_board(&self, m: &mut Assembly) {
        let capacity = self.problem.capacity as f64;
        for path in &self.paths {
            let rides: Vec<(usize, (usize, usize))> = self.problem.passengers.iter().enumerate()
                .filter_map(|(i, pax)| path.ride(pax, self.config.coverage).map(|r| (i, r)))
                .collect();
            let z = m.active[path.name];
            for (k, &(u, v)) in path.edges.iter().enumerate() {
                let on_board: Vec<VarId> = rides.iter()
                    .filter(|(_, (from, to))| *from <= k && k < *to)
                    .map(|(i, _)| m.served[*i]).collect();
                if on_board.is_empty() {
                    continue;
                }
                m.milp.add_guarded(format!("load_{}_{}_{}", path.name, u, v),
                                   LinExpr::sum(on_board), Sense::Le, capacity, Guard::on(z));
            }
        }
    }

    fn objective(&self, m: &mut Assembly) {
        let served = LinExpr::sum(m.served.iter().cloned());
        match self.config.objective {
            Objective::Coverage => m.milp.set_objective(Direction::Maximise, served),
            Objective::Delay { weight_delay, weight_service } => {
                // delay_{p,s} = (arrival_s - planned_s) * active_p, linearized
                let mut objective = served.scaled(-weight_service);
                for path in &self.paths {
                    let z = m.active[path.name];
                    // departures only, the terminal station is not counted
                    for &(u, _) in path.edges {
                        let planned = self.problem.timetable[&u];
                        let d = m.milp.add_continuous(format!("delay_{}_{}", path.name, u),
                                                      std::f64::NEG_INFINITY, std::f64::INFINITY);
                        m.milp.add_guarded(format!("delay_{}_{}", path.name, u),
                                           LinExpr::var(d).plus(-1.0, m.arrival[&u]),
                                           Sense::Ge, -planned, Guard::on(z));
                        m.milp.add_guarded(format!("delay_off_{}_{}", path.name, u),
                                           LinExpr::var(d), Sense::Ge, 0.0, Guard::off(z));
                        objective.add_term(weight_delay, d);
                    }
                }
                m.milp.set_objective(Direction::Minimise, objective);
            }
        }
    }
}

struct Assembly {
    milp: Milp,
    active: BTreeMap<PathName, VarId>,
    arrival: BTreeMap<StationId, VarId>,
    served: Vec<VarId>,
    covering: Vec<Vec<PathName>>,
}

/// `name_pattern` has one `{}` replaced by `start`/`end`.
fn add_window(milp: &mut Milp, name_pattern: &str, arrival: VarId, start: f64, end: f64, guard: Guard) {
    milp.add_guarded(name_pattern.replace("{}", "start"), LinExpr::var(arrival),
                     Sense::Ge, start, guard);
    if end.is_finite() {
        milp.add_guarded(name_pattern.replace("{}", "end"), LinExpr::var(arrival),
                         Sense::Le, end, guard);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maplit::*;

    fn two_paths() -> Problem {
        Problem {
            paths: btreemap! {
                "A".to_string() => vec![(1, 2), (2, 4)],
                "B".to_string() => vec![(1, 3), (3, 4)],
            },
            weights: hashmap! {
                (1, 2) => 10.0, (2, 4) => 10.0, (1, 3) => 7.0, (3, 4) => 7.0,
                (1, 4) => 12.0, (5, 6) => 3.0,
            },
            timetable: btreemap! { 1 => 100.0, 2 => 110.0, 3 => 120.0, 4 => 130.0 },
            passengers: vec![
                Passenger::new(1, 2),
                Passenger::new(1, 4),
                Passenger::new(5, 6),
            ],
            capacity: 2,
            budget: None,
        }
    }

    fn build(problem: &Problem, config: &Config) -> PathSelectionModel {
        ModelBuilder::new(problem, config).unwrap().build()
    }

    #[test]
    fn variables_per_path_station_and_passenger() {
        let model = build(&two_paths(), &Config { objective: Objective::Coverage, ..Config::default() });
        assert_eq!(model.active.len(), 2);
        assert_eq!(model.arrival.keys().cloned().collect::<Vec<_>>(), vec![1, 2, 3, 4]);
        assert_eq!(model.served.len(), 3);
        assert_eq!(model.milp.variables().len(), 2 + 4 + 3);
        assert_eq!(model.milp.variable(model.arrival[&1]).lower, 0.0);
    }

    #[test]
    fn coverage_modes() {
        let problem = two_paths();
        let by_arc = build(&problem, &Config::default());
        assert_eq!(by_arc.covering[0], vec!["A".to_string()]);
        assert!(by_arc.covering[1].is_empty());
        assert!(by_arc.covering[2].is_empty());

        let by_endpoints = build(&problem, &Config { coverage: Coverage::Endpoints, ..Config::default() });
        assert_eq!(by_endpoints.covering[1], vec!["A".to_string(), "B".to_string()]);
        assert!(by_endpoints.covering[2].is_empty());
    }

    #[test]
    fn unservable_passenger_is_fixed_to_zero() {
        let model = build(&two_paths(), &Config::default());
        let c = model.milp.constraint("unservable_2").unwrap();
        assert_eq!(c.sense, Sense::Eq);
        assert_eq!(c.rhs, 0.0);
        assert!(model.milp.constraint("eligible_2").is_none());
        assert!(model.milp.constraint("eligible_0").is_some());
    }

    #[test]
    fn time_progression_is_guarded_by_path() {
        let model = build(&two_paths(), &Config::default());
        let c = model.milp.constraint("time_progression_A_2_4").unwrap();
        assert_eq!(c.rhs, 15.0);
        assert_eq!(c.guard, Some(Guard::on(model.active["A"])));

        let start = model.milp.constraint("start_time_B_1").unwrap();
        assert!(start.guard.is_none());
        assert!(start.lhs.terms.contains(&(model.active["B"], -100.0)));
    }

    #[test]
    fn windows_once_per_path_and_origin() {
        let mut problem = two_paths();
        problem.passengers.push(Passenger::new(1, 2));
        let model = build(&problem, &Config::default());
        let starts = model.milp.constraints().iter()
            .filter(|c| c.name.starts_with("window_start_")).count();
        assert_eq!(starts, 1);
        let end = model.milp.constraint("window_end_A_1").unwrap();
        assert_eq!(end.rhs, 110.0);
    }

    #[test]
    fn passenger_guarded_windows() {
        let config = Config { window_guard: WindowGuard::Passenger, ..Config::default() };
        let model = build(&two_paths(), &config);
        let c = model.milp.constraint("pax_0_window_start").unwrap();
        assert_eq!(c.guard, Some(Guard::on(model.served[0])));
        assert!(model.milp.constraint("pax_2_window_start").is_none());
    }

    #[test]
    fn budget_replaces_single_path_restriction() {
        let mut problem = two_paths();
        problem.budget = Some(Budget {
            costs: btreemap! { "A".to_string() => 200.0, "B".to_string() => 220.0 },
            limit: 500.0,
        });
        let model = build(&problem, &Config::default());
        assert!(model.milp.constraint("max_one_path").is_none());
        let budget = model.milp.constraint("budget").unwrap();
        assert_eq!(budget.rhs, 500.0);

        let single = build(&problem, &Config { single_path: true, ..Config::default() });
        assert!(single.milp.constraint("max_one_path").is_some());
    }

    #[test]
    fn capacity_scales_with_covering_paths() {
        let model = build(&two_paths(), &Config::default());
        let cap = model.milp.constraint("cap_1_4").unwrap();
        // both A and B contain stations 1 and 4
        assert!(cap.lhs.terms.contains(&(model.active["A"], -2.0)));
        assert!(cap.lhs.terms.contains(&(model.active["B"], -2.0)));
        assert!(model.milp.constraint("cap_5_6").is_none());
    }

    #[test]
    fn on_board_load_per_segment() {
        let config = Config {
            capacity_mode: CapacityMode::OnBoard,
            coverage: Coverage::Endpoints,
            ..Config::default()
        };
        let model = build(&two_paths(), &config);
        let first = model.milp.constraint("load_A_1_2").unwrap();
        assert_eq!(first.lhs.terms.len(), 2);
        let second = model.milp.constraint("load_A_2_4").unwrap();
        assert_eq!(second.lhs.terms, vec![(model.served[1], 1.0)]);
        assert_eq!(second.guard, Some(Guard::on(model.active["A"])));
    }

    #[test]
    fn delay_objective_adds_linearized_terms() {
        let model = build(&two_paths(), &Config::default());
        assert_eq!(model.milp.direction, Direction::Minimise);
        // two departures on each path
        let delays = model.milp.variables().iter()
            .filter(|v| v.name.starts_with("delay_")).count();
        assert_eq!(delays, 4);
        assert!(model.milp.constraint("delay_off_A_2").is_some());
        assert!(model.milp.constraint("delay_A_4").is_none());
        assert!(model.milp.constraint("delay_off_B_4").is_none());

        let coverage = build(&two_paths(), &Config { objective: Objective::Coverage, ..Config::default() });
        assert_eq!(coverage.milp.direction, Direction::Maximise);
    }

    #[test]
    fn malformed_input_is_rejected_before_building() {
        let mut problem = two_paths();
        problem.paths.insert("C".to_string(), vec![(1, 2), (3, 4)]);
        assert!(matches!(ModelBuilder::new(&problem, &Config::default()),
                         Err(PlanError::MalformedPath { .. })));
    }
}
