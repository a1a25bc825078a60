//! A tiny internal text format for describing a [`crate::model::System`] —
//! enough to express the mutual-exclusion scenarios the core's test suite
//! exercises (spec §6), not a stand-in for the textual modelling language
//! itself, which stays out of scope.
//!
//! Grammar (line-oriented; `#` starts a comment; blank lines ignored):
//!
//! ```text
//! clocks <n>
//! intvar <name> <min> <max> <init>
//! process <name>
//!   loc <name> [initial] [urgent] [committed] [final] [label=a,b]
//!   edge <src-loc> <tgt-loc> [guard=<expr>] [reset=x1:0,x2:1] [assign=name:=1] [sync=name]
//! endprocess
//! ```
//!
//! Clocks are unnamed (spec §6: "clocks declared with `(size)`") and
//! referenced positionally as `x1..xn`; integer variables are named.
//! Guard expressions are a `&`-separated conjunction of atoms, each either
//! a clock comparison (`x1>=5`, `x1-x2<=3`) or an integer comparison
//! (`id==0`); `true` denotes the empty conjunction.

use std::collections::HashMap;

use crate::bound::Cmp;
use crate::dbm::Reset;
use crate::model::{ClockGuard, Edge, IntExpr, IntGuard, IntVarDecl, Location, Process, RelOp, Stmt, System};

#[derive(Debug)]
pub struct ParseError(pub String);

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "model parse error: {}", self.0)
    }
}

impl std::error::Error for ParseError {}

struct ProcessBuilder {
    name: String,
    locations: Vec<Location>,
    edges: Vec<Edge>,
    loc_index: HashMap<String, usize>,
}

pub fn parse(text: &str) -> Result<System, ParseError> {
    let mut n_clocks = 0usize;
    let mut int_names: Vec<String> = Vec::new();
    let mut int_vars: Vec<IntVarDecl> = Vec::new();
    let mut processes: Vec<Process> = Vec::new();
    let mut current: Option<ProcessBuilder> = None;

    for raw_line in text.lines() {
        let line = raw_line.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let mut parts = line.splitn(2, |c: char| c.is_whitespace());
        let kw = parts.next().unwrap_or("");
        let rest = parts.next().unwrap_or("").trim();

        match kw {
            "clocks" => {
                n_clocks = rest.parse().map_err(|_| ParseError(format!("bad clock count {rest:?}")))?;
            }
            "intvar" => {
                let fields: Vec<&str> = rest.split_whitespace().collect();
                let [name, min, max, init]: [&str; 4] =
                    fields.as_slice().try_into().map_err(|_| ParseError(format!("malformed intvar line {rest:?}")))?;
                int_names.push(name.to_string());
                int_vars.push(IntVarDecl {
                    min: min.parse().map_err(|_| ParseError(format!("bad min in {rest:?}")))?,
                    max: max.parse().map_err(|_| ParseError(format!("bad max in {rest:?}")))?,
                    initial: init.parse().map_err(|_| ParseError(format!("bad init in {rest:?}")))?,
                });
            }
            "process" => {
                if current.is_some() {
                    return Err(ParseError("nested process declaration".into()));
                }
                current = Some(ProcessBuilder { name: rest.to_string(), locations: Vec::new(), edges: Vec::new(), loc_index: HashMap::new() });
            }
            "loc" => {
                let builder = current.as_mut().ok_or_else(|| ParseError("loc outside process".into()))?;
                let mut tokens = rest.split_whitespace();
                let name = tokens.next().ok_or_else(|| ParseError("loc needs a name".into()))?;
                let mut location = Location { name: name.to_string(), ..Default::default() };
                for tok in tokens {
                    match tok {
                        "initial" => location.initial = true,
                        "urgent" => location.urgent = true,
                        "committed" => location.committed = true,
                        "final" => location.is_final = true,
                        _ if tok.starts_with("label=") => {
                            for l in tok["label=".len()..].split(',') {
                                location.labels.insert(l.to_string());
                            }
                        }
                        _ => return Err(ParseError(format!("unknown location flag {tok:?}"))),
                    }
                }
                builder.loc_index.insert(name.to_string(), builder.locations.len());
                builder.locations.push(location);
            }
            "edge" => {
                let builder = current.as_mut().ok_or_else(|| ParseError("edge outside process".into()))?;
                let mut tokens = rest.split_whitespace();
                let src = tokens.next().ok_or_else(|| ParseError("edge needs a source".into()))?;
                let tgt = tokens.next().ok_or_else(|| ParseError("edge needs a target".into()))?;
                let src_idx = *builder.loc_index.get(src).ok_or_else(|| ParseError(format!("unknown location {src:?}")))?;
                let tgt_idx = *builder.loc_index.get(tgt).ok_or_else(|| ParseError(format!("unknown location {tgt:?}")))?;

                let mut guard_clocks = ClockGuard::True;
                let mut guard_ints = IntGuard::True;
                let mut resets = Vec::new();
                let mut stmt = Stmt::Nop;
                let mut sync = None;
                for tok in tokens {
                    if let Some(expr) = tok.strip_prefix("guard=") {
                        let (c, i) = parse_guard(expr, &int_names)?;
                        guard_clocks = c;
                        guard_ints = i;
                    } else if let Some(expr) = tok.strip_prefix("reset=") {
                        resets = parse_resets(expr)?;
                    } else if let Some(expr) = tok.strip_prefix("assign=") {
                        stmt = parse_assign(expr, &int_names)?;
                    } else if let Some(name) = tok.strip_prefix("sync=") {
                        sync = Some(name.to_string());
                    } else {
                        return Err(ParseError(format!("unknown edge attribute {tok:?}")));
                    }
                }
                builder.edges.push(Edge { src: src_idx, tgt: tgt_idx, guard_clocks, guard_ints, stmt, resets, sync });
            }
            "endprocess" => {
                let builder = current.take().ok_or_else(|| ParseError("endprocess without process".into()))?;
                processes.push(Process { name: builder.name, locations: builder.locations, edges: builder.edges });
            }
            _ => return Err(ParseError(format!("unknown directive {kw:?}"))),
        }
    }

    if current.is_some() {
        return Err(ParseError("missing endprocess at end of input".into()));
    }
    Ok(System { processes, n_clocks, int_vars })
}

fn clock_index(token: &str) -> Option<usize> {
    token.trim().strip_prefix('x').and_then(|n| n.parse().ok())
}

fn looks_like_clock_atom(lhs: &str) -> bool {
    lhs.split('-').all(|t| t.trim().starts_with('x'))
}

const RELOPS: [&str; 6] = [">=", "<=", "==", "!=", ">", "<"];

fn split_relop(atom: &str) -> Option<(&str, &str, &str)> {
    for op in RELOPS {
        if let Some(pos) = atom.find(op) {
            return Some((atom[..pos].trim(), op, atom[pos + op.len()..].trim()));
        }
    }
    None
}

fn diff_constraint(i: usize, j: usize, op: &str, k: i32) -> Result<ClockGuard, ParseError> {
    match op {
        "<=" => Ok(ClockGuard::Diff { i, j, cmp: Cmp::Le, bound: k }),
        "<" => Ok(ClockGuard::Diff { i, j, cmp: Cmp::Lt, bound: k }),
        ">=" => Ok(ClockGuard::Diff { i: j, j: i, cmp: Cmp::Le, bound: -k }),
        ">" => Ok(ClockGuard::Diff { i: j, j: i, cmp: Cmp::Lt, bound: -k }),
        "==" => Ok(ClockGuard::And(vec![
            ClockGuard::Diff { i, j, cmp: Cmp::Le, bound: k },
            ClockGuard::Diff { i: j, j: i, cmp: Cmp::Le, bound: -k },
        ])),
        _ => Err(ParseError(format!("unsupported clock operator {op:?}"))),
    }
}

fn parse_clock_atom(atom: &str) -> Result<Option<ClockGuard>, ParseError> {
    let Some((lhs, op, rhs)) = split_relop(atom) else {
        return Ok(None);
    };
    if !looks_like_clock_atom(lhs) {
        return Ok(None);
    }
    let k: i32 = rhs.parse().map_err(|_| ParseError(format!("bad bound in {atom:?}")))?;
    if let Some((l, r)) = lhs.split_once('-') {
        let i = clock_index(l).ok_or_else(|| ParseError(format!("bad clock in {atom:?}")))?;
        let j = clock_index(r).ok_or_else(|| ParseError(format!("bad clock in {atom:?}")))?;
        diff_constraint(i, j, op, k).map(Some)
    } else {
        let clock = clock_index(lhs).ok_or_else(|| ParseError(format!("bad clock in {atom:?}")))?;
        diff_constraint(clock, 0, op, k).map(Some)
    }
}

fn parse_int_expr(token: &str, int_names: &[String]) -> Result<IntExpr, ParseError> {
    if let Ok(c) = token.parse::<i32>() {
        return Ok(IntExpr::Const(c));
    }
    int_names.iter().position(|n| n == token).map(IntExpr::Var).ok_or_else(|| ParseError(format!("unknown int variable {token:?}")))
}

fn parse_int_atom(atom: &str, int_names: &[String]) -> Result<IntGuard, ParseError> {
    let (lhs, op, rhs) = split_relop(atom).ok_or_else(|| ParseError(format!("not a comparison: {atom:?}")))?;
    let a = parse_int_expr(lhs, int_names)?;
    let b = parse_int_expr(rhs, int_names)?;
    let relop = match op {
        "==" => RelOp::Eq,
        "!=" => RelOp::Ne,
        "<" => RelOp::Lt,
        "<=" => RelOp::Le,
        ">" => RelOp::Gt,
        ">=" => RelOp::Ge,
        _ => return Err(ParseError(format!("unsupported operator {op:?}"))),
    };
    Ok(IntGuard::Rel(a, relop, b))
}

fn parse_guard(expr: &str, int_names: &[String]) -> Result<(ClockGuard, IntGuard), ParseError> {
    if expr == "true" {
        return Ok((ClockGuard::True, IntGuard::True));
    }
    let mut clock_atoms = Vec::new();
    let mut int_atoms = Vec::new();
    for atom in expr.split('&') {
        let atom = atom.trim();
        if let Some(c) = parse_clock_atom(atom)? {
            clock_atoms.push(c);
        } else {
            int_atoms.push(parse_int_atom(atom, int_names)?);
        }
    }
    let clocks = if clock_atoms.is_empty() { ClockGuard::True } else { ClockGuard::And(clock_atoms) };
    let ints = if int_atoms.is_empty() { IntGuard::True } else { IntGuard::And(int_atoms) };
    Ok((clocks, ints))
}

fn parse_resets(expr: &str) -> Result<Vec<Reset>, ParseError> {
    expr.split(',')
        .map(|part| {
            let (clock, k) = part.split_once(':').ok_or_else(|| ParseError(format!("bad reset {part:?}")))?;
            let x = clock_index(clock).ok_or_else(|| ParseError(format!("bad clock in reset {part:?}")))?;
            let k: i32 = k.trim().parse().map_err(|_| ParseError(format!("bad reset value {part:?}")))?;
            Ok(Reset::to_constant(x, k))
        })
        .collect()
}

fn parse_assign(expr: &str, int_names: &[String]) -> Result<Stmt, ParseError> {
    let (name, rhs) = expr.split_once(":=").ok_or_else(|| ParseError(format!("bad assignment {expr:?}")))?;
    let idx = int_names.iter().position(|n| n == name.trim()).ok_or_else(|| ParseError(format!("unknown int variable {name:?}")))?;
    let value = parse_int_expr(rhs.trim(), int_names)?;
    Ok(Stmt::Assign(idx, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    const S1: &str = "
        clocks 1
        process P1
          loc idle initial
          loc wait
          loc crit final label=crit1
          edge idle wait reset=x1:0 sync=enter
          edge wait crit guard=x1>=5 sync=enter
          edge crit idle sync=leave
        endprocess
        process P2
          loc idle initial
          loc wait
          loc crit final label=crit2
          edge idle wait reset=x1:0 sync=enter
          edge wait crit guard=x1>=5 sync=enter
          edge crit idle sync=leave
        endprocess
    ";

    #[test]
    fn parses_two_process_mutex_model() {
        let system = parse(S1).unwrap();
        assert_eq!(system.n_clocks, 1);
        assert_eq!(system.processes.len(), 2);
        assert_eq!(system.processes[0].locations.len(), 3);
        assert_eq!(system.processes[0].edges.len(), 3);
        assert!(system.processes[0].locations[2].labels.contains("crit1"));
    }

    #[test]
    fn rejects_unknown_location_reference() {
        let bad = "clocks 1\nprocess P\nloc a initial\nedge a b\nendprocess\n";
        assert!(parse(bad).is_err());
    }

    #[test]
    fn fischer_int_guard_parses() {
        let text = "
            clocks 1
            intvar id 0 3 0
            process P
              loc a initial
              loc req
              edge a req guard=id==0 reset=x1:0
            endprocess
        ";
        let system = parse(text).unwrap();
        assert_eq!(system.int_vars.len(), 1);
        assert!(matches!(system.processes[0].edges[0].guard_ints, IntGuard::Rel(IntExpr::Var(0), RelOp::Eq, IntExpr::Const(0))));
    }
}
