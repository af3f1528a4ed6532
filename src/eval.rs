//! Partial evaluation of expressions under concrete array contents.
//!
//! An [`Evaluator`] walks an expression bottom-up and rebuilds it with every
//! read it can resolve replaced by a constant. Where the contents of an array
//! come from is abstracted by [`InitialValues`]; an
//! [`Assignment`][crate::assignment::Assignment] is the usual source.

use std::collections::HashMap;

use log::debug;

use crate::builder::ExprBuilder;
use crate::node::Node;
use crate::reference::{ArrayRef, ExprRef};
use crate::types::{DOMAIN, RANGE};
use crate::updates::UpdateLog;

/// Source of array contents that are not overwritten by an update log.
pub trait InitialValues {
    /// The byte at `index` of `array`, as an expression of width 8.
    fn initial_value(&self, b: &ExprBuilder, array: ArrayRef, index: u64) -> ExprRef;
}

pub struct Evaluator<'a, V: InitialValues + ?Sized> {
    builder: &'a ExprBuilder,
    values: &'a V,
    cache: HashMap<ExprRef, ExprRef>,
    budget: Option<usize>,
    steps: usize,
    protected_division: bool,
}

impl<'a, V: InitialValues + ?Sized> Evaluator<'a, V> {
    pub fn new(builder: &'a ExprBuilder, values: &'a V) -> Self {
        Self {
            builder,
            values,
            cache: HashMap::new(),
            budget: None,
            steps: 0,
            protected_division: false,
        }
    }

    /// Limit the number of visited nodes.
    ///
    /// Once the limit is hit, [`evaluate_costly`][Self::evaluate_costly] gives up.
    pub fn with_budget(mut self, budget: usize) -> Self {
        self.budget = Some(budget);
        self
    }

    /// Whether a division by a divisor evaluating to zero was seen.
    ///
    /// Such divisions keep their original divisor instead of folding.
    pub fn protected_division(&self) -> bool {
        self.protected_division
    }

    /// Number of nodes visited so far.
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Evaluate `e`, ignoring the budget.
    pub fn evaluate(&mut self, e: ExprRef) -> ExprRef {
        let budget = self.budget.take();
        let result = self.visit(e);
        self.budget = budget;
        match result {
            Some(r) => r,
            None => unreachable!("evaluation without a budget always completes"),
        }
    }

    /// Evaluate `e` within the budget, or `None` if it runs out.
    pub fn evaluate_costly(&mut self, e: ExprRef) -> Option<ExprRef> {
        let result = self.visit(e);
        if result.is_none() {
            debug!(
                "evaluate_costly: gave up after {} steps on {}",
                self.steps,
                self.builder.display(e)
            );
        }
        result
    }

    fn visit(&mut self, e: ExprRef) -> Option<ExprRef> {
        let b = self.builder;
        if b.is_const(e) {
            return Some(e);
        }
        if let Some(&r) = self.cache.get(&e) {
            return Some(r);
        }
        self.steps += 1;
        if self.budget.is_some_and(|budget| self.steps > budget) {
            return None;
        }

        let result = match b.node(e) {
            Node::Constant(_) => e,
            Node::NotOptimized(x) | Node::Bind { bind: x, .. } => self.visit(x)?,
            Node::Let { scope, .. } => self.visit(scope)?,
            Node::Read { updates, index } => {
                let idx = self.visit(index)?;
                match b.as_const(idx).and_then(|c| c.to_u64()) {
                    Some(i) => self.read(updates, i)?,
                    None => self.visit_operands(e)?,
                }
            }
            Node::Binary { kind, left, right } if kind.is_division() => {
                let l = self.visit(left)?;
                let mut r = self.visit(right)?;
                if b.as_const(r).is_some_and(|c| c.is_zero()) {
                    debug!("evaluate: protected division by zero in {}", b.display(e));
                    r = right;
                    self.protected_division = true;
                }
                if l == left && r == right {
                    e
                } else {
                    b.mk_binary(kind, l, r)
                }
            }
            _ => self.visit_operands(e)?,
        };

        self.cache.insert(e, result);
        Some(result)
    }

    fn visit_operands(&mut self, e: ExprRef) -> Option<ExprRef> {
        let ops = self.builder.operands(e);
        let mut new_ops = Vec::with_capacity(ops.len());
        for op in ops {
            new_ops.push(self.visit(op)?);
        }
        Some(self.builder.rebuild(e, &new_ops))
    }

    /// Value of `log` at the concrete `index`.
    fn read(&mut self, log: UpdateLog, index: u64) -> Option<ExprRef> {
        let b = self.builder;
        for (u, node) in b.log_nodes(log) {
            let ui = self.visit(node.index)?;
            match b.as_const(ui).and_then(|c| c.to_u64()) {
                Some(i) if i == index => return self.visit(node.value),
                Some(_) => continue,
                None => {
                    // This write may or may not hit, read from the log as of it.
                    return Some(b.mk_read(log.suffix(Some(u)), b.mk_const(index, DOMAIN)));
                }
            }
        }

        let root = log.root();
        match b.array(root).value(index) {
            Some(byte) => Some(b.mk_const(byte as u64, RANGE)),
            None => Some(self.values.initial_value(b, root, index)),
        }
    }
}
