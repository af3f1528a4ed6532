//! Path constraints.
//!
//! A [`ConstraintSet`] holds the boolean expressions accumulated along one
//! execution path. New constraints are simplified against the stored ones
//! before they are added, and an equality `c == X` with constant `c`
//! substitutes `c` for `X` in everything already stored.
//!
//! The simplifier uses a substitution table derived from the stored
//! constraints. The table is rebuilt lazily whenever the set's version
//! changes.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;

use log::debug;

use crate::builder::ExprBuilder;
use crate::config::ConstraintConfig;
use crate::node::Node;
use crate::reference::ExprRef;
use crate::types::{Kind, BOOL};

/// Substitution table with the version of the set it was derived from.
struct Simplifier {
    version: u64,
    map: HashMap<ExprRef, ExprRef>,
}

pub struct ConstraintSet {
    config: ConstraintConfig,
    constraints: Vec<ExprRef>,
    version: u64,
    simplifier: RefCell<Option<Simplifier>>,
}

impl Default for ConstraintSet {
    fn default() -> Self {
        ConstraintSet::new(ConstraintConfig::default())
    }
}

impl Clone for ConstraintSet {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            constraints: self.constraints.clone(),
            version: self.version,
            simplifier: RefCell::new(None),
        }
    }
}

impl fmt::Debug for ConstraintSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstraintSet")
            .field("len", &self.constraints.len())
            .field("version", &self.version)
            .finish()
    }
}

impl ConstraintSet {
    pub fn new(config: ConstraintConfig) -> Self {
        Self {
            config,
            constraints: Vec::new(),
            version: 0,
            simplifier: RefCell::new(None),
        }
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }
    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    /// Incremented on every change of the stored constraints.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Stored constraints, in insertion order.
    pub fn as_slice(&self) -> &[ExprRef] {
        &self.constraints
    }

    pub fn iter(&self) -> impl Iterator<Item = ExprRef> + '_ {
        self.constraints.iter().copied()
    }

    fn push(&mut self, e: ExprRef) {
        self.constraints.push(e);
        self.version += 1;
    }

    /// Add a constraint.
    ///
    /// Returns `false` if the constraint simplifies to `false`, meaning the
    /// path is infeasible. Adding `true` is a no-op.
    pub fn add_constraint(&mut self, b: &ExprBuilder, e: ExprRef) -> bool {
        assert_eq!(b.width(e), BOOL, "Constraints should be boolean");
        let simplified = self.simplify_expr(b, e);
        debug!(
            "add_constraint({}) simplified to {}",
            b.display(e),
            b.display(simplified)
        );
        self.add_internal(b, simplified)
    }

    fn add_internal(&mut self, b: &ExprBuilder, e: ExprRef) -> bool {
        if let Some(c) = b.as_const(e) {
            return c.is_true();
        }

        match b.node(e) {
            Node::Binary {
                kind: Kind::And,
                left,
                right,
            } => self.add_internal(b, left) && self.add_internal(b, right),
            Node::Binary {
                kind: Kind::Eq,
                left,
                right,
            } if b.is_const(left) => {
                let ok = self.rewrite_constraints(b, right, left);
                self.push(e);
                ok
            }
            Node::Not(x) if b.is_bool(x) => {
                let ok = self.rewrite_constraints(b, x, b.mk_false());
                self.push(e);
                ok
            }
            _ => {
                self.push(e);
                true
            }
        }
    }

    /// Replace `from` by `to` in every stored constraint.
    ///
    /// Changed constraints are taken out and added again, so they get split
    /// and substituted like new ones.
    fn rewrite_constraints(&mut self, b: &ExprBuilder, from: ExprRef, to: ExprRef) -> bool {
        let map = HashMap::from([(from, to)]);
        let old = std::mem::take(&mut self.constraints);
        self.version += 1;

        let mut changed = Vec::new();
        for ce in old {
            let rewritten = self.replace(b, ce, &map);
            if rewritten == ce {
                self.constraints.push(ce);
            } else {
                debug!(
                    "rewrite_constraints: {} => {}",
                    b.display(ce),
                    b.display(rewritten)
                );
                changed.push(rewritten);
            }
        }

        let mut ok = true;
        for e in changed {
            ok &= self.add_internal(b, e);
        }
        ok
    }

    fn simplifier_map(&self, b: &ExprBuilder) -> std::cell::Ref<'_, HashMap<ExprRef, ExprRef>> {
        let stale = !matches!(&*self.simplifier.borrow(), Some(s) if s.version == self.version);
        if stale {
            debug!(
                "simplifier: rebuilding from {} constraints (version {})",
                self.constraints.len(),
                self.version
            );
            let map = self.build_map(b);
            *self.simplifier.borrow_mut() = Some(Simplifier {
                version: self.version,
                map,
            });
        }
        std::cell::Ref::map(self.simplifier.borrow(), |s| match s {
            Some(s) => &s.map,
            None => unreachable!("simplifier was just rebuilt"),
        })
    }

    fn build_map(&self, b: &ExprBuilder) -> HashMap<ExprRef, ExprRef> {
        let mut derived = HashMap::new();
        let mut map = HashMap::new();
        let t = b.mk_true();
        let f = b.mk_false();

        let mut refute = |e: ExprRef| {
            if !b.is_const(e) {
                derived.insert(e, f);
            }
        };

        for &c in &self.constraints {
            match b.node(c) {
                Node::Binary {
                    kind: Kind::Eq,
                    left,
                    right,
                } if b.is_const(left) => {
                    map.insert(right, left);
                }
                Node::Not(x) if b.is_bool(x) => {
                    map.insert(x, f);
                }
                // x < y refutes y <= x, y < x and x == y.
                Node::Binary {
                    kind: Kind::Ult,
                    left,
                    right,
                } => {
                    refute(b.mk_ule(right, left));
                    refute(b.mk_ult(right, left));
                    refute(b.mk_eq(left, right));
                    refute(b.mk_eq(right, left));
                }
                Node::Binary {
                    kind: Kind::Slt,
                    left,
                    right,
                } => {
                    refute(b.mk_sle(right, left));
                    refute(b.mk_slt(right, left));
                    refute(b.mk_eq(left, right));
                    refute(b.mk_eq(right, left));
                }
                // x <= y refutes y < x.
                Node::Binary {
                    kind: Kind::Ule,
                    left,
                    right,
                } => {
                    refute(b.mk_ult(right, left));
                }
                Node::Binary {
                    kind: Kind::Sle,
                    left,
                    right,
                } => {
                    refute(b.mk_slt(right, left));
                }
                _ => {}
            }
            map.insert(c, t);
        }

        // Direct facts win over derived ones.
        for (k, v) in derived {
            map.entry(k).or_insert(v);
        }
        map
    }

    /// Simplify `e` using the stored constraints.
    ///
    /// Rewrites bottom-up until nothing changes. If the rewrite budget runs
    /// out, `e` is returned unchanged.
    pub fn simplify_expr(&self, b: &ExprBuilder, e: ExprRef) -> ExprRef {
        if b.is_const(e) || self.constraints.is_empty() {
            return e;
        }
        let map = self.simplifier_map(b);

        let mut budget = self.config.rewrite_budget;
        let mut current = e;
        loop {
            let mut memo = HashMap::new();
            match Self::rewrite(b, current, &map, &mut memo, &mut budget) {
                Some(next) if next == current => return current,
                Some(next) => current = next,
                None => {
                    debug!("simplify_expr: budget exhausted, keeping {}", b.display(e));
                    return e;
                }
            }
        }
    }

    /// Substitute according to `map` once, within `rewrite_budget` steps.
    /// Returns `e` unchanged if the budget runs out.
    fn replace(&self, b: &ExprBuilder, e: ExprRef, map: &HashMap<ExprRef, ExprRef>) -> ExprRef {
        let mut budget = self.config.rewrite_budget;
        let mut memo = HashMap::new();
        Self::rewrite(b, e, map, &mut memo, &mut budget).unwrap_or(e)
    }

    /// One bottom-up pass. `None` if the budget ran out.
    fn rewrite(
        b: &ExprBuilder,
        e: ExprRef,
        map: &HashMap<ExprRef, ExprRef>,
        memo: &mut HashMap<ExprRef, ExprRef>,
        budget: &mut usize,
    ) -> Option<ExprRef> {
        if let Some(&r) = map.get(&e) {
            return Some(r);
        }
        if let Some(&r) = memo.get(&e) {
            return Some(r);
        }
        if b.is_const(e) {
            return Some(e);
        }
        *budget = budget.checked_sub(1)?;

        let ops = b.operands(e);
        let mut new_ops = Vec::with_capacity(ops.len());
        for op in ops {
            new_ops.push(Self::rewrite(b, op, map, memo, budget)?);
        }
        let rebuilt = b.rebuild(e, &new_ops);
        let result = map.get(&rebuilt).copied().unwrap_or(rebuilt);
        memo.insert(e, result);
        Some(result)
    }

    /// Display adaptor listing the constraints one per line.
    pub fn display<'a>(&'a self, b: &'a ExprBuilder) -> impl fmt::Display + 'a {
        ConstraintsDisplay { set: self, b }
    }
}

struct ConstraintsDisplay<'a> {
    set: &'a ConstraintSet,
    b: &'a ExprBuilder,
}

impl fmt::Display for ConstraintsDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "(constraints")?;
        for e in self.set.iter() {
            writeln!(f, "  {}", self.b.display(e))?;
        }
        write!(f, ")")
    }
}
