//! The decision-procedure port.
//!
//! A [`Solver`] answers two primitive questions: whether a query's goal is
//! satisfiable under its constraints, and a model refuting the goal. Every
//! other question (validity, mandatory truth, a concrete value) is derived
//! from these by the provided methods.

use std::fmt;

use log::debug;

use crate::assignment::Assignment;
use crate::builder::ExprBuilder;
use crate::error::SolverError;
use crate::query::Query;
use crate::reference::{ArrayRef, ExprRef};

/// Truth of a goal under a set of constraints.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Validity {
    /// The goal holds in every model of the constraints.
    True,
    /// The goal fails in every model of the constraints.
    False,
    /// Both outcomes are possible.
    Unknown,
}

impl fmt::Display for Validity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Validity::True => write!(f, "true"),
            Validity::False => write!(f, "false"),
            Validity::Unknown => write!(f, "unknown"),
        }
    }
}

pub trait Solver {
    /// Whether `constraints ∧ expr` has a model.
    fn compute_sat(&mut self, b: &ExprBuilder, q: Query<'_>) -> Result<bool, SolverError>;

    /// A model of `constraints ∧ ¬expr` binding `arrays`, or `None` if the
    /// goal is valid.
    fn compute_initial_values(
        &mut self,
        b: &ExprBuilder,
        q: Query<'_>,
        arrays: &[ArrayRef],
    ) -> Result<Option<Assignment>, SolverError>;

    /// Whether the last call ended in an error.
    fn failed(&self) -> bool;

    fn compute_validity(&mut self, b: &ExprBuilder, q: Query<'_>) -> Result<Validity, SolverError> {
        if !self.compute_sat(b, q.negate_expr(b))? {
            return Ok(Validity::True);
        }
        if !self.compute_sat(b, q)? {
            return Ok(Validity::False);
        }
        Ok(Validity::Unknown)
    }

    /// Whether the goal holds in every model of the constraints.
    fn compute_truth(&mut self, b: &ExprBuilder, q: Query<'_>) -> Result<bool, SolverError> {
        Ok(!self.compute_sat(b, q.negate_expr(b))?)
    }

    /// Some value the goal can take under the constraints.
    fn compute_value(&mut self, b: &ExprBuilder, q: Query<'_>) -> Result<ExprRef, SolverError> {
        let mut exprs = q.constraints.to_vec();
        exprs.push(q.expr);
        let arrays = b.find_symbolic_arrays(&exprs);

        match self.compute_initial_values(b, q.with_false(b), &arrays)? {
            Some(model) => {
                let value = model.evaluate(b, q.expr);
                debug!("compute_value: {} = {}", b.display(q.expr), b.display(value));
                if b.is_const(value) {
                    Ok(value)
                } else {
                    Err(SolverError::Malformed(format!(
                        "model leaves {} symbolic",
                        b.display(value)
                    )))
                }
            }
            None => Err(SolverError::Malformed(
                "constraints have no model".to_string(),
            )),
        }
    }

    fn must_be_true(&mut self, b: &ExprBuilder, q: Query<'_>) -> Result<bool, SolverError> {
        self.compute_truth(b, q)
    }

    fn must_be_false(&mut self, b: &ExprBuilder, q: Query<'_>) -> Result<bool, SolverError> {
        self.compute_truth(b, q.negate_expr(b))
    }

    fn may_be_true(&mut self, b: &ExprBuilder, q: Query<'_>) -> Result<bool, SolverError> {
        Ok(!self.must_be_false(b, q)?)
    }

    fn may_be_false(&mut self, b: &ExprBuilder, q: Query<'_>) -> Result<bool, SolverError> {
        Ok(!self.must_be_true(b, q)?)
    }

    /// Like [`compute_value`][Self::compute_value], without a solver call for
    /// constant goals.
    fn get_value(&mut self, b: &ExprBuilder, q: Query<'_>) -> Result<ExprRef, SolverError> {
        if b.is_const(q.expr) {
            return Ok(q.expr);
        }
        self.compute_value(b, q)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::Array;
    use crate::types::{INT32, INT8};
    use crate::updates::UpdateLog;
    use test_log::test;

    /// Tries every value of a single one-byte array.
    struct OneByte {
        calls: usize,
    }

    impl Solver for OneByte {
        fn compute_sat(&mut self, b: &ExprBuilder, q: Query<'_>) -> Result<bool, SolverError> {
            let mut exprs = q.constraints.to_vec();
            exprs.push(q.expr);
            let arrays = b.find_symbolic_arrays(&exprs);
            let m = self.compute_initial_values(b, q.negate_expr(b), &arrays)?;
            Ok(m.is_some())
        }

        fn compute_initial_values(
            &mut self,
            b: &ExprBuilder,
            q: Query<'_>,
            arrays: &[ArrayRef],
        ) -> Result<Option<Assignment>, SolverError> {
            self.calls += 1;
            let mut exprs = q.constraints.to_vec();
            exprs.push(b.mk_not(q.expr));
            for v in 0..=255u8 {
                let mut a = Assignment::new(false);
                for &arr in arrays {
                    a.bind(b, arr, vec![v]);
                }
                if a.satisfies(b, &exprs) {
                    return Ok(Some(a));
                }
            }
            Ok(None)
        }

        fn failed(&self) -> bool {
            false
        }
    }

    fn setup() -> (ExprBuilder, ExprRef) {
        let b = ExprBuilder::default();
        let a = b.mk_array(Array::symbolic("x", 1));
        let x = b.mk_read(UpdateLog::new(a), b.mk_const(0, INT32));
        (b, x)
    }

    #[test]
    fn test_validity() {
        let (b, x) = setup();
        let mut s = OneByte { calls: 0 };
        let c = [b.mk_ult(x, b.mk_const(10, INT8))];

        let q = Query::new(&c, b.mk_ult(x, b.mk_const(20, INT8)));
        assert_eq!(s.compute_validity(&b, q).unwrap(), Validity::True);

        let q = Query::new(&c, b.mk_ugt(x, b.mk_const(10, INT8)));
        assert_eq!(s.compute_validity(&b, q).unwrap(), Validity::False);

        let q = Query::new(&c, b.mk_eq(b.mk_const(3, INT8), x));
        assert_eq!(s.compute_validity(&b, q).unwrap(), Validity::Unknown);
        assert!(s.may_be_true(&b, q).unwrap());
        assert!(s.may_be_false(&b, q).unwrap());
        assert!(!s.must_be_true(&b, q).unwrap());
    }

    #[test]
    fn test_compute_value() {
        let (b, x) = setup();
        let mut s = OneByte { calls: 0 };
        let c = [b.mk_ugt(x, b.mk_const(200, INT8))];
        let q = Query::new(&c, b.mk_add(x, b.mk_const(1, INT8)));
        let v = s.compute_value(&b, q).unwrap();
        assert_eq!(v, b.mk_const(202, INT8));

        let unsat = [b.mk_ult(x, b.mk_const(0, INT8))];
        assert!(b.is_false(unsat[0]));
        let q = Query::new(&unsat, x);
        assert!(matches!(s.compute_value(&b, q), Err(SolverError::Malformed(_))));
    }

    #[test]
    fn test_get_value_constant() {
        let (b, _) = setup();
        let mut s = OneByte { calls: 0 };
        let q = Query::new(&[], b.mk_const(5, INT8));
        assert_eq!(s.get_value(&b, q).unwrap(), b.mk_const(5, INT8));
        assert_eq!(s.calls, 0);
    }

    #[test]
    fn test_display() {
        assert_eq!(Validity::Unknown.to_string(), "unknown");
    }
}
