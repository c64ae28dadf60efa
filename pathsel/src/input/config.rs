use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "kind")]
pub enum Objective {
    /// Minimise `weight_delay * total delay - weight_service * served`.
    Delay { weight_delay: f64, weight_service: f64 },
    /// Maximise the number of served passengers.
    Coverage,
}

impl Default for Objective {
    fn default() -> Objective {
        Objective::Delay { weight_delay: 0.5, weight_service: 1.0 }
    }
}

/// How passenger load is bounded by the vehicle capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CapacityMode {
    /// Per passenger arc, scaled by the number of active paths that
    /// contain both endpoints. Simultaneously active paths add up.
    PerArc,
    /// Per segment of each active path, counting every passenger whose
    /// ride spans the segment.
    OnBoard,
}

/// Which paths may carry a passenger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Coverage {
    /// The passenger's arc is itself an edge of the path.
    Arc,
    /// Origin and destination both lie on the path, origin first.
    Endpoints,
}

/// Which flag switches the pickup window constraints on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WindowGuard {
    /// The window holds whenever a covering path is active.
    Path,
    /// The window holds only for passengers that are served.
    Passenger,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub pickup_window_slack: f64,
    pub stop_dwell: f64,
    /// Must dominate every arrival time deviation. Too small a value
    /// leaves constraints of inactive paths partially binding.
    pub big_m: f64,
    pub objective: Objective,
    pub capacity_mode: CapacityMode,
    pub coverage: Coverage,
    pub window_guard: WindowGuard,
    /// Keep the at-most-one-path restriction in budget mode.
    pub single_path: bool,
    pub min_service_rate: Option<f64>,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            pickup_window_slack: 10.0,
            stop_dwell: 5.0,
            big_m: 1e4,
            objective: Objective::default(),
            capacity_mode: CapacityMode::PerArc,
            coverage: Coverage::Arc,
            window_guard: WindowGuard::Path,
            single_path: false,
            min_service_rate: None,
        }
    }
}
