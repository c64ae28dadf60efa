//! Solver-neutral mixed-integer linear programs.
//!
//! Constraints that should only hold depending on a binary flag are kept
//! as guarded constraints. They are turned into big-M rows by
//! [`Constraint::lower`] when a backend needs plain linear rows, and
//! written as indicator constraints in LP exports.

use smallvec::{smallvec, SmallVec};
use std::io;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(usize);

impl VarId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarKind {
    Binary,
    Continuous,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    pub kind: VarKind,
    pub lower: f64,
    pub upper: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinExpr {
    pub terms: Vec<(VarId, f64)>,
    pub constant: f64,
}

impl LinExpr {
    pub fn new() -> LinExpr {
        LinExpr::default()
    }

    pub fn var(v: VarId) -> LinExpr {
        LinExpr::new().plus(1.0, v)
    }

    pub fn sum<I: IntoIterator<Item = VarId>>(vars: I) -> LinExpr {
        LinExpr { terms: vars.into_iter().map(|v| (v, 1.0)).collect(), constant: 0.0 }
    }

    pub fn plus(mut self, coef: f64, v: VarId) -> LinExpr {
        self.terms.push((v, coef));
        self
    }

    pub fn add_term(&mut self, coef: f64, v: VarId) {
        self.terms.push((v, coef));
    }

    pub fn scaled(mut self, k: f64) -> LinExpr {
        for (_, c) in self.terms.iter_mut() {
            *c *= k;
        }
        self.constant *= k;
        self
    }

    pub fn evaluate(&self, values: &[f64]) -> f64 {
        self.terms.iter().map(|&(v, c)| c * values[v.0]).sum::<f64>() + self.constant
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sense {
    Le,
    Ge,
    Eq,
}

impl Sense {
    fn symbol(self) -> &'static str {
        match self {
            Sense::Le => "<=",
            Sense::Ge => ">=",
            Sense::Eq => "=",
        }
    }

    pub fn holds(self, lhs: f64, rhs: f64, tol: f64) -> bool {
        match self {
            Sense::Le => lhs <= rhs + tol,
            Sense::Ge => lhs + tol >= rhs,
            Sense::Eq => (lhs - rhs).abs() <= tol,
        }
    }
}

/// The constraint holds only while `flag` takes the value `when`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Guard {
    pub flag: VarId,
    pub when: bool,
}

impl Guard {
    pub fn on(flag: VarId) -> Guard {
        Guard { flag, when: true }
    }

    pub fn off(flag: VarId) -> Guard {
        Guard { flag, when: false }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    pub name: String,
    pub lhs: LinExpr,
    pub sense: Sense,
    pub rhs: f64,
    pub guard: Option<Guard>,
}

/// A plain linear row `terms sense rhs`.
pub type Row = (LinExpr, Sense, f64);

impl Constraint {
    /// Linear rows equivalent to this constraint, with any guard replaced
    /// by big-M relaxation terms.
    pub fn lower(&self, big_m: f64) -> SmallVec<[Row; 2]> {
        let terms = LinExpr { terms: self.lhs.terms.clone(), constant: 0.0 };
        let rhs = self.rhs - self.lhs.constant;

        let guard = match self.guard {
            None => return smallvec![(terms, self.sense, rhs)],
            Some(g) => g,
        };

        let senses: SmallVec<[Sense; 2]> = match self.sense {
            Sense::Eq => smallvec![Sense::Le, Sense::Ge],
            s => smallvec![s],
        };

        senses.into_iter().map(|sense| {
            let sign = if sense == Sense::Le { 1.0 } else { -1.0 };
            if guard.when {
                // relaxed by M*(1 - flag)
                (terms.clone().plus(sign * big_m, guard.flag), sense, rhs + sign * big_m)
            } else {
                // relaxed by M*flag
                (terms.clone().plus(-sign * big_m, guard.flag), sense, rhs)
            }
        }).collect()
    }

    pub fn is_satisfied(&self, values: &[f64], tol: f64) -> bool {
        if let Some(g) = self.guard {
            let flag = values[g.flag.0] > 0.5;
            if flag != g.when {
                return true;
            }
        }
        self.sense.holds(self.lhs.evaluate(values), self.rhs, tol)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Minimise,
    Maximise,
}

#[derive(Debug, Clone)]
pub struct Milp {
    pub name: String,
    pub big_m: f64,
    pub direction: Direction,
    pub objective: LinExpr,
    variables: Vec<Variable>,
    constraints: Vec<Constraint>,
}

impl Milp {
    pub fn new(name: &str, big_m: f64) -> Milp {
        Milp {
            name: name.to_string(),
            big_m,
            direction: Direction::Minimise,
            objective: LinExpr::new(),
            variables: Vec::new(),
            constraints: Vec::new(),
        }
    }

    fn add_var(&mut self, var: Variable) -> VarId {
        self.variables.push(var);
        VarId(self.variables.len() - 1)
    }

    pub fn add_binary(&mut self, name: String) -> VarId {
        self.add_var(Variable { name, kind: VarKind::Binary, lower: 0.0, upper: 1.0 })
    }

    pub fn add_continuous(&mut self, name: String, lower: f64, upper: f64) -> VarId {
        self.add_var(Variable { name, kind: VarKind::Continuous, lower, upper })
    }

    pub fn add_constraint(&mut self, name: String, lhs: LinExpr, sense: Sense, rhs: f64) {
        self.constraints.push(Constraint { name, lhs, sense, rhs, guard: None });
    }

    pub fn add_guarded(&mut self, name: String, lhs: LinExpr, sense: Sense, rhs: f64, guard: Guard) {
        self.constraints.push(Constraint { name, lhs, sense, rhs, guard: Some(guard) });
    }

    pub fn set_objective(&mut self, direction: Direction, objective: LinExpr) {
        self.direction = direction;
        self.objective = objective;
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn variable(&self, v: VarId) -> &Variable {
        &self.variables[v.0]
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn constraint(&self, name: &str) -> Option<&Constraint> {
        self.constraints.iter().find(|c| c.name == name)
    }

    /// A copy without the given constraints, and with the given
    /// variable bounds removed. Used when searching for conflicts.
    pub fn relaxed(&self, drop_constraints: &[bool], drop_bounds: &[(usize, bool)]) -> Milp {
        let mut m = self.clone();
        m.constraints = self.constraints.iter().zip(drop_constraints.iter())
            .filter(|(_, drop)| !**drop)
            .map(|(c, _)| c.clone())
            .collect();
        for &(var, lower) in drop_bounds {
            if lower {
                m.variables[var].lower = std::f64::NEG_INFINITY;
            } else {
                m.variables[var].upper = std::f64::INFINITY;
            }
        }
        m.objective = LinExpr::new();
        m
    }

    /// Write the model in CPLEX LP format. Guarded constraints are
    /// written as indicator constraints, so the export does not depend
    /// on `big_m`.
    pub fn write_lp<W: io::Write>(&self, f: &mut W) -> io::Result<()> {
        writeln!(f, "\\ Model {}", self.name)?;
        match self.direction {
            Direction::Minimise => writeln!(f, "Minimize")?,
            Direction::Maximise => writeln!(f, "Maximize")?,
        }
        writeln!(f, " obj: {}", self.format_terms(&self.objective))?;

        writeln!(f, "Subject To")?;
        for c in &self.constraints {
            let rhs = self.rhs_string(c.rhs - c.lhs.constant);
            match c.guard {
                Some(g) => writeln!(f, " {}: {} = {} -> {} {} {}", c.name,
                    self.variables[g.flag.0].name, if g.when { 1 } else { 0 },
                    self.format_terms(&c.lhs), c.sense.symbol(), rhs)?,
                None => writeln!(f, " {}: {} {} {}", c.name,
                    self.format_terms(&c.lhs), c.sense.symbol(), rhs)?,
            }
        }

        writeln!(f, "Bounds")?;
        for v in self.variables.iter().filter(|v| v.kind == VarKind::Continuous) {
            match (v.lower.is_finite(), v.upper.is_finite()) {
                (false, false) => writeln!(f, " {} free", v.name)?,
                (true, false) if v.lower == 0.0 => {}
                (true, false) => writeln!(f, " {} >= {}", v.name, v.lower)?,
                (false, true) => writeln!(f, " -inf <= {} <= {}", v.name, v.upper)?,
                (true, true) => writeln!(f, " {} <= {} <= {}", v.lower, v.name, v.upper)?,
            }
        }

        writeln!(f, "Binaries")?;
        for v in self.variables.iter().filter(|v| v.kind == VarKind::Binary) {
            writeln!(f, " {}", v.name)?;
        }
        writeln!(f, "End")?;
        Ok(())
    }

    fn format_terms(&self, e: &LinExpr) -> String {
        if e.terms.is_empty() {
            return "0".to_string();
        }
        let mut s = String::new();
        for (i, &(v, c)) in e.terms.iter().enumerate() {
            let name = &self.variables[v.0].name;
            if i == 0 {
                if c < 0.0 { s.push_str("- "); }
            } else {
                s.push_str(if c < 0.0 { " - " } else { " + " });
            }
            s.push_str(&format!("{} {}", c.abs(), name));
        }
        s
    }

    fn rhs_string(&self, rhs: f64) -> String {
        if rhs == 0.0 { "0".to_string() } else { format!("{}", rhs) }
    }
}
