//! The abstract model input: processes, locations, edges, and declarations.
//!
//! Spec §6 calls the textual modelling language and its type-checker an
//! external collaborator and only names the AST shape the core consumes.
//! This module *is* that shape: plain structs a front-end (or, here, the
//! small in-memory builder used by the CLI and the test scenarios) fills
//! in directly, with no parser of its own. Clock indices are `1..=n_clocks`
//! (index `0` is the fixed zero reference, per [`crate::dbm`]); integer
//! variables are indices into [`System::int_vars`].

use std::collections::HashSet;

use crate::bound::Cmp;
use crate::dbm::Reset as ClockReset;

/// `x_i <cmp> k` (`i == 0` prohibited; express a lower bound as `Diff`).
#[derive(Debug, Clone)]
pub enum ClockGuard {
    True,
    Cmp { clock: usize, cmp: Cmp, bound: i32 },
    /// `x_i - x_j <cmp> k`, the general difference constraint.
    Diff { i: usize, j: usize, cmp: Cmp, bound: i32 },
    And(Vec<ClockGuard>),
}

impl ClockGuard {
    /// Flattens to the [`crate::dbm::Constraint`] list a `Dbm` consumes.
    pub fn to_constraints(&self) -> Vec<crate::dbm::Constraint> {
        let mut out = Vec::new();
        self.collect(&mut out);
        out
    }

    fn collect(&self, out: &mut Vec<crate::dbm::Constraint>) {
        match self {
            ClockGuard::True => {}
            ClockGuard::Cmp { clock, cmp, bound } => {
                out.push(crate::dbm::Constraint::new(*clock, 0, *cmp, *bound))
            }
            ClockGuard::Diff { i, j, cmp, bound } => {
                out.push(crate::dbm::Constraint::new(*i, *j, *cmp, *bound))
            }
            ClockGuard::And(cs) => {
                for c in cs {
                    c.collect(out);
                }
            }
        }
    }
}

/// Integer-variable expressions, evaluated by [`crate::vm`].
#[derive(Debug, Clone)]
pub enum IntExpr {
    Const(i32),
    Var(usize),
    Add(Box<IntExpr>, Box<IntExpr>),
    Sub(Box<IntExpr>, Box<IntExpr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone)]
pub enum IntGuard {
    True,
    Rel(IntExpr, RelOp, IntExpr),
    And(Vec<IntGuard>),
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Nop,
    Assign(usize, IntExpr),
    Seq(Vec<Stmt>),
}

/// One declared integer variable: `(size = 1, min, max, initial)`; spec §6
/// names `size` for array-valued declarations, which we do not need for
/// the scenarios in scope and therefore model as scalar slots.
#[derive(Debug, Clone, Copy)]
pub struct IntVarDecl {
    pub min: i32,
    pub max: i32,
    pub initial: i32,
}

#[derive(Debug, Clone, Default)]
pub struct Location {
    pub name: String,
    pub initial: bool,
    pub urgent: bool,
    pub committed: bool,
    pub is_final: bool,
    pub invariant_clocks: Option<ClockGuard>,
    pub invariant_ints: Option<IntGuard>,
    pub labels: HashSet<String>,
}

impl Location {
    pub fn clocks_invariant(&self) -> ClockGuard {
        self.invariant_clocks.clone().unwrap_or(ClockGuard::True)
    }
    pub fn ints_invariant(&self) -> IntGuard {
        self.invariant_ints.clone().unwrap_or(IntGuard::True)
    }
}

#[derive(Debug, Clone)]
pub struct Edge {
    pub src: usize,
    pub tgt: usize,
    pub guard_clocks: ClockGuard,
    pub guard_ints: IntGuard,
    pub stmt: Stmt,
    pub resets: Vec<ClockReset>,
    /// Synchronisation action; `None` means the edge fires asynchronously
    /// on its own. Two edges from two different processes synchronise iff
    /// they carry `Some` of the same action name and are both enabled.
    pub sync: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Process {
    pub name: String,
    pub locations: Vec<Location>,
    pub edges: Vec<Edge>,
}

impl Process {
    pub fn initial_locations(&self) -> Vec<usize> {
        self.locations
            .iter()
            .enumerate()
            .filter(|(_, l)| l.initial)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn edges_from(&self, loc: usize) -> impl Iterator<Item = (usize, &Edge)> {
        self.edges.iter().enumerate().filter(move |(_, e)| e.src == loc)
    }
}

#[derive(Debug, Clone, Default)]
pub struct System {
    pub processes: Vec<Process>,
    pub n_clocks: usize,
    pub int_vars: Vec<IntVarDecl>,
}

impl System {
    pub fn initial_int_values(&self) -> Vec<i32> {
        self.int_vars.iter().map(|d| d.initial).collect()
    }

    /// Static-analysis checks that must pass before a [`crate::ta::Ta`] is
    /// built (spec §7: "raised at system-construction time; the core
    /// refuses to build a zone-graph instance").
    pub fn validate(&self) -> Result<(), crate::error::ModelError> {
        for p in &self.processes {
            if p.initial_locations().is_empty() {
                return Err(crate::error::ModelError::NoInitialLocation { process: p.name.clone() });
            }
            for (idx, e) in p.edges.iter().enumerate() {
                if e.src >= p.locations.len() || e.tgt >= p.locations.len() {
                    return Err(crate::error::ModelError::DanglingEdge { process: p.name.clone(), edge: idx });
                }
            }
        }
        for (idx, d) in self.int_vars.iter().enumerate() {
            if d.initial < d.min || d.initial > d.max {
                return Err(crate::error::ModelError::IntVarOutOfRange { index: idx, value: d.initial, min: d.min, max: d.max });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_rejects_a_process_with_no_initial_location() {
        let p = Process { name: "P".into(), locations: vec![Location::default()], edges: vec![] };
        let system = System { processes: vec![p], n_clocks: 0, int_vars: vec![] };
        assert!(system.validate().is_err());
    }

    #[test]
    fn validate_rejects_an_out_of_range_initial_value() {
        let system = System { processes: vec![], n_clocks: 0, int_vars: vec![IntVarDecl { min: 0, max: 3, initial: 9 }] };
        assert!(system.validate().is_err());
    }

    #[test]
    fn validate_accepts_a_well_formed_system() {
        let loc = Location { initial: true, ..Default::default() };
        let p = Process { name: "P".into(), locations: vec![loc], edges: vec![] };
        let system = System { processes: vec![p], n_clocks: 0, int_vars: vec![] };
        assert!(system.validate().is_ok());
    }
}
