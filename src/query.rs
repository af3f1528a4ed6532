use crate::builder::ExprBuilder;
use crate::reference::ExprRef;

/// A question for a solver: a set of constraints and a boolean goal.
///
/// Most solver entry points ask whether the goal is valid under the
/// constraints, i.e. whether `constraints ∧ ¬expr` is unsatisfiable.
#[derive(Debug, Copy, Clone)]
pub struct Query<'a> {
    pub constraints: &'a [ExprRef],
    pub expr: ExprRef,
}

impl<'a> Query<'a> {
    pub fn new(constraints: &'a [ExprRef], expr: ExprRef) -> Self {
        Self { constraints, expr }
    }

    /// Same constraints, different goal.
    pub fn with_expr(&self, expr: ExprRef) -> Self {
        Self {
            constraints: self.constraints,
            expr,
        }
    }

    /// Same constraints with goal `false`.
    ///
    /// A model falsifying this goal is just a model of the constraints.
    pub fn with_false(&self, b: &ExprBuilder) -> Self {
        self.with_expr(b.mk_false())
    }

    /// The goal replaced by its negation.
    pub fn negate_expr(&self, b: &ExprBuilder) -> Self {
        self.with_expr(b.mk_is_zero(self.expr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::Array;
    use crate::updates::UpdateLog;
    use test_log::test;

    #[test]
    fn test_query() {
        let b = ExprBuilder::default();
        let a = b.mk_array(Array::symbolic("a", 1));
        let x = b.mk_read(UpdateLog::new(a), b.mk_const(0, 32));
        let c = [b.mk_ult(x, b.mk_const(10, 8))];
        let goal = b.mk_eq(b.mk_const(3, 8), x);
        let q = Query::new(&c, goal);

        let n = q.negate_expr(&b);
        assert_eq!(n.expr, b.mk_not(goal));
        assert_eq!(n.constraints, q.constraints);
        assert_eq!(n.negate_expr(&b).expr, goal);
        assert!(b.is_false(q.with_false(&b).expr));
    }
}
