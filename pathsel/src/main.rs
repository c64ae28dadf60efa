use failure::format_err;
use log::info;
use std::path::PathBuf;
use std::time::Duration;
use structopt::StructOpt;

use pathsel::input::config::{CapacityMode, Coverage, Objective};
use pathsel::*;

/// pathsel -- choose a dispatch path and the passengers it serves
#[derive(StructOpt, Debug)]
#[structopt(name = "pathsel")]
struct Opt {
    /// Verbose mode (-v, -vv)
    #[structopt(short = "v", long = "verbose", parse(from_occurrences))]
    verbose: u8,

    /// Scenario file (JSON)
    #[structopt(parse(from_os_str))]
    scenario: PathBuf,

    /// Objective: delay | coverage
    #[structopt(short = "o", long = "objective")]
    objective: Option<String>,

    /// Capacity mode: per-arc | on-board
    #[structopt(short = "c", long = "capacity-mode")]
    capacity_mode: Option<String>,

    /// Passenger coverage: arc | endpoints
    #[structopt(long = "coverage")]
    coverage: Option<String>,

    /// Give up solving after this many seconds
    #[structopt(short = "t", long = "time-limit")]
    time_limit: Option<f64>,

    /// Skip the conflict search on infeasible models
    #[structopt(long = "no-diagnose")]
    no_diagnose: bool,

    /// Write the model in LP format to file
    #[structopt(long = "lp", parse(from_os_str))]
    lp: Option<PathBuf>,

    /// Write the result as JSON to file
    #[structopt(short = "j", long = "json", parse(from_os_str))]
    json: Option<PathBuf>,
}

fn apply_overrides(opt: &Opt, config: &mut Config) -> AppResult<()> {
    if let Some(ref o) = opt.objective {
        config.objective = match (o.as_str(), config.objective) {
            ("coverage", _) => Objective::Coverage,
            ("delay", Objective::Delay { .. }) => config.objective,
            ("delay", Objective::Coverage) => Objective::default(),
            _ => return Err(format_err!("unknown objective \"{}\"", o)),
        };
    }
    if let Some(ref c) = opt.capacity_mode {
        config.capacity_mode = match c.as_str() {
            "per-arc" => CapacityMode::PerArc,
            "on-board" => CapacityMode::OnBoard,
            _ => return Err(format_err!("unknown capacity mode \"{}\"", c)),
        };
    }
    if let Some(ref c) = opt.coverage {
        config.coverage = match c.as_str() {
            "arc" => Coverage::Arc,
            "endpoints" => Coverage::Endpoints,
            _ => return Err(format_err!("unknown coverage \"{}\"", c)),
        };
    }
    Ok(())
}

fn parse_time_limit(secs: f64) -> AppResult<Duration> {
    if secs.is_nan() || secs <= 0.0 {
        return Err(format_err!("invalid time limit {}", secs));
    }
    Duration::try_from_secs_f64(secs)
        .map_err(|e| format_err!("invalid time limit {}: {}", secs, e))
}

fn run(opt: &Opt) -> AppResult<()> {
    let scenario = get_scenario(&opt.scenario)?;
    let problem = scenario.problem;
    let mut config = scenario.config;
    apply_overrides(opt, &mut config)?;
    info!("Config: {:?}", config);

    let model = ModelBuilder::new(&problem, &config)?.build();

    if let Some(ref lp) = opt.lp {
        use std::fs::File;
        use std::io::BufWriter;
        let file = File::create(lp)?;
        let mut writer = BufWriter::new(&file);
        model.milp.write_lp(&mut writer)?;
    }

    let time_limit = opt.time_limit.map(parse_time_limit).transpose()?;
    let solver = GoodLpSolver { time_limit, diagnose: !opt.no_diagnose };
    let status = solver.solve(&model.milp);

    let solution = match ResultExtractor::new(&problem, &model).extract(status) {
        Ok(s) => s,
        Err(PlanError::Infeasible(conflict)) => {
            if let Some(ref json) = opt.json {
                use std::fs::File;
                use std::io::BufWriter;
                let file = File::create(json)?;
                let mut writer = BufWriter::new(&file);
                pathsel::output::json::json_conflict(&conflict, &mut writer)?;
            }
            return Err(PlanError::Infeasible(conflict).into());
        }
        Err(e) => return Err(e.into()),
    };

    print!("{}", pathsel::output::table::format_solution(&solution));

    if let Some(ref json) = opt.json {
        use std::fs::File;
        use std::io::BufWriter;
        let file = File::create(json)?;
        let mut writer = BufWriter::new(&file);
        pathsel::output::json::json_solution(&solution, &mut writer)?;
    }

    Ok(())
}

pub fn main() {
    let opt = Opt::from_args();
    let level = match opt.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match run(&opt) {
        Ok(()) => {},
        Err(e) => {
            println!("Error:\n{}", e);
            std::process::exit(1);
        },
    }
}
