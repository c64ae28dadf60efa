use std::fmt::Write;

use crate::extract::Solution;

/// Plain text report: chosen paths, stop times with delays, and the
/// served passengers.
pub fn format_solution(solution: &Solution) -> String {
    let mut s = String::new();
    // writing to a String cannot fail
    let _ = write_solution(&mut s, solution);
    s
}

fn write_solution(s: &mut String, solution: &Solution) -> std::fmt::Result {
    writeln!(s, "Objective: {}", solution.objective)?;
    if solution.active_paths.is_empty() {
        writeln!(s, "No path selected.")?;
    }
    for path in &solution.active_paths {
        let edges: Vec<String> = path.edges.iter().map(|(u, v)| format!("({},{})", u, v)).collect();
        writeln!(s, "\nPath {}: {}", path.name, edges.join(" "))?;
        writeln!(s, "{:<10} {:<12} {:<12} {}", "Station", "Planned", "Arrival", "Delay")?;
        for stop in &path.stops {
            writeln!(s, "{:<10} {:<12.1} {:<12.1} {:.1}",
                     stop.station, stop.planned, stop.arrival, stop.delay)?;
        }
    }

    writeln!(s, "\nServed passengers: {} of {}", solution.served_count, solution.passengers.len())?;
    for (i, pax) in solution.passengers.iter().enumerate().filter(|(_, p)| p.served) {
        writeln!(s, "  {:>4}  ({},{})  path {}", i, pax.origin, pax.destination,
                 pax.path.as_ref().map(|p| p.as_str()).unwrap_or("-"))?;
    }
    Ok(())
}
