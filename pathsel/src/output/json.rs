use failure::Error;
use std::io;

use crate::error::Conflict;
use crate::extract::Solution;

pub fn json_solution<W: io::Write>(solution: &Solution, f: &mut W) -> Result<(), Error> {
    serde_json::to_writer_pretty(&mut *f, solution)?;
    writeln!(f)?;
    Ok(())
}

pub fn json_conflict<W: io::Write>(conflict: &Conflict, f: &mut W) -> Result<(), Error> {
    serde_json::to_writer_pretty(&mut *f, conflict)?;
    writeln!(f)?;
    Ok(())
}
