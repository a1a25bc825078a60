//! Integer-variable bytecode VM — contract only.
//!
//! Spec §1 declares the bytecode VM that evaluates integer-variable
//! guards, invariants and statements an external collaborator; §4.4 gives
//! its contract: evaluation of a guard/invariant returns pass/fail, and
//! evaluation of a statement returns an updated valuation or failure. This
//! module is the minimal concrete realization of that contract needed to
//! drive [`crate::ta`] and the test scenarios — not the real language's
//! VM, which is out of scope.

use crate::model::{IntExpr, IntGuard, RelOp, Stmt};

/// Evaluates an [`IntExpr`] against a valuation.
pub fn eval_expr(e: &IntExpr, vals: &[i32]) -> i32 {
    match e {
        IntExpr::Const(c) => *c,
        IntExpr::Var(i) => vals[*i],
        IntExpr::Add(a, b) => eval_expr(a, vals) + eval_expr(b, vals),
        IntExpr::Sub(a, b) => eval_expr(a, vals) - eval_expr(b, vals),
    }
}

/// Evaluates an [`IntGuard`]; `false` maps to the caller's choice of
/// `*_GUARD_VIOLATED`/`*_INVARIANT_VIOLATED` status.
pub fn eval_guard(g: &IntGuard, vals: &[i32]) -> bool {
    match g {
        IntGuard::True => true,
        IntGuard::Rel(a, op, b) => {
            let (a, b) = (eval_expr(a, vals), eval_expr(b, vals));
            match op {
                RelOp::Eq => a == b,
                RelOp::Ne => a != b,
                RelOp::Lt => a < b,
                RelOp::Le => a <= b,
                RelOp::Gt => a > b,
                RelOp::Ge => a >= b,
            }
        }
        IntGuard::And(gs) => gs.iter().all(|g| eval_guard(g, vals)),
    }
}

/// Executes a [`Stmt`] against a valuation, returning the updated
/// valuation or `None` if the statement is ill-formed for this state (the
/// only current failure mode is a bound violation on the written variable,
/// mapping to `INTVARS_STATEMENT_FAILED`).
pub fn exec_stmt(s: &Stmt, vals: &[i32], bounds: &[(i32, i32)]) -> Option<Vec<i32>> {
    let mut out = vals.to_vec();
    exec_into(s, &mut out, bounds)?;
    Some(out)
}

fn exec_into(s: &Stmt, vals: &mut Vec<i32>, bounds: &[(i32, i32)]) -> Option<()> {
    match s {
        Stmt::Nop => Some(()),
        Stmt::Assign(i, e) => {
            let v = eval_expr(e, vals);
            let (min, max) = bounds[*i];
            if v < min || v > max {
                return None;
            }
            vals[*i] = v;
            Some(())
        }
        Stmt::Seq(stmts) => {
            for s in stmts {
                exec_into(s, vals, bounds)?;
            }
            Some(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assign_out_of_bounds_fails() {
        let s = Stmt::Assign(0, IntExpr::Const(5));
        assert!(exec_stmt(&s, &[0], &[(0, 3)]).is_none());
        assert!(exec_stmt(&s, &[0], &[(0, 5)]).is_some());
    }

    #[test]
    fn guard_conjunction() {
        let g = IntGuard::And(vec![
            IntGuard::Rel(IntExpr::Var(0), RelOp::Eq, IntExpr::Const(0)),
            IntGuard::Rel(IntExpr::Var(1), RelOp::Lt, IntExpr::Const(3)),
        ]);
        assert!(eval_guard(&g, &[0, 1]));
        assert!(!eval_guard(&g, &[1, 1]));
    }
}
