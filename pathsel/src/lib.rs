#[macro_use] extern crate failure_derive;

pub mod error;
pub mod input;
pub mod milp;
pub mod model;
pub mod solver;
pub mod extract;
pub mod output;


use std::path::Path;

pub use crate::error::{Conflict, PlanError};
pub use crate::extract::{ResultExtractor, Solution};
pub use crate::input::config::Config;
pub use crate::input::problem::{Passenger, Problem};
pub use crate::model::{ModelBuilder, PathSelectionModel};
pub use crate::solver::{GoodLpSolver, MilpSolver, SolveStatus};

/// Build the model, solve it, and read back the result.
pub fn plan<S: MilpSolver + ?Sized>(problem: &Problem, config: &Config, solver: &S)
    -> Result<Solution, PlanError> {
    let model = ModelBuilder::new(problem, config)?.build();
    let status = solver.solve(&model.milp);
    ResultExtractor::new(problem, &model).extract(status)
}

pub type AppResult<T> = Result<T, failure::Error>;

pub fn read_file(f: &Path) -> AppResult<String> {
    use std::fs::File;
    use std::io::prelude::*;
    use std::io::BufReader;

    let file = File::open(f)?;
    let mut file = BufReader::new(&file);
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;
    Ok(contents)
}

pub fn get_scenario(f: &Path) -> AppResult<input::scenario::Scenario> {
    let contents = read_file(f)?;
    let s = input::scenario::parse_scenario(&contents)?;
    Ok(s)
}
