//! Counterexample caching.
//!
//! [`CexCachingSolver`] wraps another [`Solver`] and memoizes the models it
//! returns. A query is reduced to a *key*: the set of its constraints plus
//! the negation of its goal. Each stored key maps to a model of that set, or
//! to `None` if the set is unsatisfiable.
//!
//! A lookup tries, in order:
//!
//! 1. the exact key;
//! 2. a stored superset with a model (a model of more constraints is a model
//!    of fewer);
//! 3. a stored subset that is unsatisfiable (adding constraints keeps it so),
//!    or whose model happens to satisfy the whole key;
//! 4. optionally, every distinct model seen so far.
//!
//! Only then is the wrapped solver called. Models are deduplicated by
//! content. When their total size exceeds a budget, each one is dropped with
//! a fixed probability and the keys pointing to dropped models are forgotten.

use std::collections::HashSet;
use std::rc::Rc;

use log::{debug, info};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use crate::assignment::Assignment;
use crate::builder::ExprBuilder;
use crate::config::CacheConfig;
use crate::error::{ConsistencyError, SolverError};
use crate::map_of_sets::MapOfSets;
use crate::query::Query;
use crate::reference::{ArrayRef, ExprRef};
use crate::solver::{Solver, Validity};

type Entry = Option<Rc<Assignment>>;

/// Counters of a [`CexCachingSolver`].
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub struct CacheStats {
    pub queries: usize,
    pub exact_hits: usize,
    pub superset_hits: usize,
    pub subset_hits: usize,
    pub exhaustive_hits: usize,
    /// Queries forwarded to the wrapped solver.
    pub misses: usize,
    /// Models dropped by eviction.
    pub evictions: usize,
}

impl CacheStats {
    pub fn hits(&self) -> usize {
        self.exact_hits + self.superset_hits + self.subset_hits + self.exhaustive_hits
    }
}

pub struct CexCachingSolver<S: Solver> {
    solver: S,
    config: CacheConfig,
    cache: MapOfSets<ExprRef, Entry>,
    /// Distinct models in order of creation.
    assignments: Vec<Rc<Assignment>>,
    unique: HashSet<Rc<Assignment>>,
    assignment_bytes: usize,
    rng: ChaCha8Rng,
    stats: CacheStats,
    failed: bool,
}

impl<S: Solver> CexCachingSolver<S> {
    pub fn new(solver: S, config: CacheConfig) -> Self {
        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        Self {
            solver,
            config,
            cache: MapOfSets::new(),
            assignments: Vec::new(),
            unique: HashSet::new(),
            assignment_bytes: 0,
            rng,
            stats: CacheStats::default(),
            failed: false,
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }
    pub fn solver(&self) -> &S {
        &self.solver
    }
    pub fn solver_mut(&mut self) -> &mut S {
        &mut self.solver
    }

    /// Number of stored keys.
    pub fn num_entries(&self) -> usize {
        self.cache.len()
    }

    /// Number of distinct stored models.
    pub fn num_assignments(&self) -> usize {
        self.assignments.len()
    }

    /// Total bound bytes of the distinct stored models.
    pub fn assignment_bytes(&self) -> usize {
        self.assignment_bytes
    }

    /// Forget everything, keeping the statistics.
    pub fn clear(&mut self) {
        self.cache.clear();
        self.assignments.clear();
        self.unique.clear();
        self.assignment_bytes = 0;
    }

    /// The key of `q`, or `None` if its goal is trivially valid.
    fn key(b: &ExprBuilder, q: Query<'_>) -> Option<Vec<ExprRef>> {
        let neg = b.mk_is_zero(q.expr);
        if b.is_false(neg) {
            return None;
        }
        let mut key = q.constraints.to_vec();
        if !b.is_const(neg) {
            key.push(neg);
        }
        key.sort();
        key.dedup();
        Some(key)
    }

    fn search(&mut self, b: &ExprBuilder, key: &[ExprRef]) -> Option<Entry> {
        if let Some(entry) = self.cache.lookup(key) {
            self.stats.exact_hits += 1;
            return Some(entry.clone());
        }

        if let Some(entry) = self.cache.find_superset(key, |e| e.is_some()).cloned() {
            debug!("search: superset hit");
            self.stats.superset_hits += 1;
            self.cache.insert(key, entry.clone());
            return Some(entry);
        }

        let subset = if self.config.try_all {
            self.cache.find_subset(key, |e| e.is_none())
        } else {
            self.cache
                .find_subset(key, |e| e.as_ref().map_or(true, |a| a.satisfies(b, key)))
        };
        if let Some(entry) = subset.cloned() {
            debug!(
                "search: subset hit ({})",
                if entry.is_some() { "model" } else { "unsat" }
            );
            self.stats.subset_hits += 1;
            self.cache.insert(key, entry.clone());
            return Some(entry);
        }

        if self.config.try_all {
            let found = self.assignments.iter().find(|a| a.satisfies(b, key)).cloned();
            if let Some(a) = found {
                debug!("search: exhaustive hit");
                self.stats.exhaustive_hits += 1;
                self.cache.insert(key, Some(a.clone()));
                return Some(Some(a));
            }
        }

        None
    }

    /// A model of `constraints ∧ ¬expr`, or `None` if there is none.
    ///
    /// Answers from the cache when possible, otherwise asks the wrapped solver
    /// and records its answer. Failures are not recorded.
    pub fn get_assignment(
        &mut self,
        b: &ExprBuilder,
        q: Query<'_>,
    ) -> Result<Option<Rc<Assignment>>, SolverError> {
        self.failed = false;
        self.stats.queries += 1;

        let Some(key) = Self::key(b, q) else {
            return Ok(None);
        };
        if let Some(entry) = self.search(b, &key) {
            return Ok(entry);
        }

        self.stats.misses += 1;
        let arrays = b.find_symbolic_arrays(&key);
        let model = match self.solver.compute_initial_values(b, q, &arrays) {
            Ok(model) => model,
            Err(e) => {
                debug!("get_assignment: solver failed: {}", e);
                self.failed = true;
                return Err(e);
            }
        };

        let entry = match model {
            Some(a) => {
                if self.config.check_bindings {
                    self.check_binding(b, &a, &key)?;
                }
                Some(self.intern(a))
            }
            None => None,
        };
        debug!(
            "get_assignment: stored {} for key of {} expressions",
            if entry.is_some() { "model" } else { "unsat" },
            key.len()
        );
        self.cache.insert(&key, entry.clone());
        self.maybe_evict();
        Ok(entry)
    }

    /// The stored copy of `a`, adding it if new.
    fn intern(&mut self, a: Assignment) -> Rc<Assignment> {
        if let Some(existing) = self.unique.get(&a) {
            return existing.clone();
        }
        let a = Rc::new(a);
        self.assignment_bytes += a.binding_bytes();
        self.unique.insert(a.clone());
        self.assignments.push(a.clone());
        a
    }

    fn check_binding(
        &mut self,
        b: &ExprBuilder,
        a: &Assignment,
        key: &[ExprRef],
    ) -> Result<(), SolverError> {
        if let Some(&e) = key.iter().find(|&&e| !b.is_true(a.evaluate(b, e))) {
            self.failed = true;
            return Err(ConsistencyError {
                expr: b.display(e).to_string(),
                assignment: a.display(b).to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Drop models once over `byte_budget`. Unsatisfiable keys are always kept.
    fn maybe_evict(&mut self) {
        if self.assignment_bytes <= self.config.byte_budget {
            return;
        }
        let p = self.config.evict_probability;
        let before = self.assignments.len();
        let rng = &mut self.rng;
        self.assignments.retain(|_| !rng.random_bool(p));

        self.unique = self.assignments.iter().cloned().collect();
        self.assignment_bytes = self.assignments.iter().map(|a| a.binding_bytes()).sum();
        let evicted = before - self.assignments.len();
        self.stats.evictions += evicted;

        let unique = &self.unique;
        let dropped = self
            .cache
            .retain(|e| e.as_ref().map_or(true, |a| unique.contains(a)));
        info!(
            "Evicted {} of {} assignments and {} cache entries, {} bytes left",
            evicted, before, dropped, self.assignment_bytes
        );
    }
}

impl<S: Solver> Solver for CexCachingSolver<S> {
    fn compute_sat(&mut self, b: &ExprBuilder, q: Query<'_>) -> Result<bool, SolverError> {
        // A counterexample to the negation is a model of the goal.
        Ok(self.get_assignment(b, q.negate_expr(b))?.is_some())
    }

    fn compute_initial_values(
        &mut self,
        b: &ExprBuilder,
        q: Query<'_>,
        arrays: &[ArrayRef],
    ) -> Result<Option<Assignment>, SolverError> {
        let Some(a) = self.get_assignment(b, q)? else {
            return Ok(None);
        };
        let mut result = Assignment::new(false);
        for &array in arrays {
            let bytes = match a.binding(array) {
                Some(bytes) => bytes.to_vec(),
                None => vec![0; b.array(array).size() as usize],
            };
            result.bind(b, array, bytes);
        }
        Ok(Some(result))
    }

    fn failed(&self) -> bool {
        self.failed
    }

    fn compute_validity(&mut self, b: &ExprBuilder, q: Query<'_>) -> Result<Validity, SolverError> {
        // A model of the constraints alone says which side to check first.
        let Some(model) = self.get_assignment(b, q.with_false(b))? else {
            return Err(SolverError::Malformed(
                "constraints have no model".to_string(),
            ));
        };
        let value = model.evaluate(b, q.expr);

        if b.is_true(value) {
            let cex = self.get_assignment(b, q)?;
            Ok(if cex.is_none() { Validity::True } else { Validity::Unknown })
        } else if b.is_false(value) {
            let cex = self.get_assignment(b, q.negate_expr(b))?;
            Ok(if cex.is_none() { Validity::False } else { Validity::Unknown })
        } else {
            if self.get_assignment(b, q)?.is_none() {
                return Ok(Validity::True);
            }
            let cex = self.get_assignment(b, q.negate_expr(b))?;
            Ok(if cex.is_none() { Validity::False } else { Validity::Unknown })
        }
    }

    fn compute_value(&mut self, b: &ExprBuilder, q: Query<'_>) -> Result<ExprRef, SolverError> {
        let Some(model) = self.get_assignment(b, q.with_false(b))? else {
            return Err(SolverError::Malformed(
                "constraints have no model".to_string(),
            ));
        };
        let value = model.evaluate(b, q.expr);
        if b.is_const(value) {
            Ok(value)
        } else {
            Err(SolverError::Malformed(format!(
                "model leaves {} symbolic",
                b.display(value)
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::Array;
    use crate::types::{INT32, INT8};
    use crate::updates::UpdateLog;
    use test_log::test;

    /// Enumerates byte values of one-byte arrays, all set to the same value.
    #[derive(Default)]
    struct Uniform {
        calls: usize,
        fail: bool,
    }

    impl Solver for Uniform {
        fn compute_sat(&mut self, b: &ExprBuilder, q: Query<'_>) -> Result<bool, SolverError> {
            let mut exprs = q.constraints.to_vec();
            exprs.push(q.expr);
            let arrays = b.find_symbolic_arrays(&exprs);
            Ok(self.compute_initial_values(b, q.negate_expr(b), &arrays)?.is_some())
        }

        fn compute_initial_values(
            &mut self,
            b: &ExprBuilder,
            q: Query<'_>,
            arrays: &[ArrayRef],
        ) -> Result<Option<Assignment>, SolverError> {
            self.calls += 1;
            if self.fail {
                return Err(SolverError::Timeout);
            }
            let mut exprs = q.constraints.to_vec();
            exprs.push(b.mk_is_zero(q.expr));
            for v in 0..=255u8 {
                let mut a = Assignment::new(false);
                for &arr in arrays {
                    a.bind(b, arr, vec![v; b.array(arr).size() as usize]);
                }
                if a.satisfies(b, &exprs) {
                    return Ok(Some(a));
                }
            }
            Ok(None)
        }

        fn failed(&self) -> bool {
            self.fail
        }
    }

    fn setup() -> (ExprBuilder, ExprRef) {
        let b = ExprBuilder::default();
        let a = b.mk_array(Array::symbolic("x", 1));
        let x = b.mk_read(UpdateLog::new(a), b.mk_const(0, INT32));
        (b, x)
    }

    fn c(b: &ExprBuilder, v: u64) -> ExprRef {
        b.mk_const(v, INT8)
    }

    #[test]
    fn test_exact_hit() {
        let (b, x) = setup();
        let mut s = CexCachingSolver::new(Uniform::default(), CacheConfig::default());
        let cs = [b.mk_ult(x, c(&b, 10))];
        let q = Query::new(&cs, b.mk_false());

        let a1 = s.get_assignment(&b, q).unwrap().unwrap();
        let a2 = s.get_assignment(&b, q).unwrap().unwrap();
        assert!(Rc::ptr_eq(&a1, &a2));
        assert_eq!(s.solver().calls, 1);
        assert_eq!(s.stats().exact_hits, 1);
        assert_eq!(s.stats().misses, 1);
    }

    #[test]
    fn test_trivially_valid_goal() {
        let (b, x) = setup();
        let mut s = CexCachingSolver::new(Uniform::default(), CacheConfig::default());
        let cs = [b.mk_ult(x, c(&b, 10))];
        let q = Query::new(&cs, b.mk_true());
        assert!(s.get_assignment(&b, q).unwrap().is_none());
        assert_eq!(s.solver().calls, 0);
        assert_eq!(s.num_entries(), 0);
    }

    #[test]
    fn test_superset_hit() {
        let (b, x) = setup();
        let mut s = CexCachingSolver::new(Uniform::default(), CacheConfig::default());
        let p = b.mk_ult(c(&b, 5), x);
        let r = b.mk_ult(x, c(&b, 10));
        let both = [p, r];
        s.get_assignment(&b, Query::new(&both, b.mk_false())).unwrap();

        let a = s
            .get_assignment(&b, Query::new(&both[..1], b.mk_false()))
            .unwrap()
            .unwrap();
        assert_eq!(s.stats().superset_hits, 1);
        assert_eq!(s.solver().calls, 1);
        assert!(a.satisfies(&b, &[p]));
    }

    #[test]
    fn test_subset_unsat() {
        let (b, x) = setup();
        let mut s = CexCachingSolver::new(Uniform::default(), CacheConfig::default());
        let p = b.mk_ult(x, c(&b, 5));
        let r = b.mk_ult(c(&b, 10), x);
        let both = [p, r];
        assert!(s.get_assignment(&b, Query::new(&both, b.mk_false())).unwrap().is_none());

        let more = [p, r, b.mk_ne(x, c(&b, 3))];
        assert!(s.get_assignment(&b, Query::new(&more, b.mk_false())).unwrap().is_none());
        assert_eq!(s.stats().subset_hits, 1);
        assert_eq!(s.solver().calls, 1);
    }

    #[test]
    fn test_subset_model_reused() {
        let (b, x) = setup();
        let mut s = CexCachingSolver::new(Uniform::default(), CacheConfig::default());
        let p = b.mk_ult(x, c(&b, 10));
        s.get_assignment(&b, Query::new(&[p], b.mk_false())).unwrap();

        // x = 0 also satisfies x != 7.
        let more = [p, b.mk_ne(x, c(&b, 7))];
        let a = s.get_assignment(&b, Query::new(&more, b.mk_false())).unwrap();
        assert!(a.is_some());
        assert_eq!(s.stats().subset_hits, 1);
        assert_eq!(s.solver().calls, 1);

        // x = 0 does not satisfy x > 5.
        let other = [p, b.mk_ugt(x, c(&b, 5))];
        let a = s.get_assignment(&b, Query::new(&other, b.mk_false())).unwrap();
        assert!(a.unwrap().satisfies(&b, &other));
        assert_eq!(s.solver().calls, 2);
    }

    #[test]
    fn test_try_all() {
        let b = ExprBuilder::default();
        let arr = b.mk_array(Array::symbolic("x", 1));
        let x = b.mk_read(UpdateLog::new(arr), b.mk_const(0, INT32));
        let cfg = CacheConfig::default().with_try_all(true);
        let mut s = CexCachingSolver::new(Uniform::default(), cfg);

        let p = b.mk_ugt(x, c(&b, 50));
        s.get_assignment(&b, Query::new(&[p], b.mk_false())).unwrap();
        // Unrelated key, but x = 51 satisfies it.
        let q = b.mk_ne(x, c(&b, 0));
        let a = s.get_assignment(&b, Query::new(&[q], b.mk_false())).unwrap();
        assert!(a.is_some());
        assert_eq!(s.stats().exhaustive_hits, 1);
        assert_eq!(s.solver().calls, 1);
    }

    #[test]
    fn test_failure_not_cached() {
        let (b, x) = setup();
        let solver = Uniform {
            fail: true,
            ..Default::default()
        };
        let mut s = CexCachingSolver::new(solver, CacheConfig::default());
        let cs = [b.mk_ult(x, c(&b, 10))];
        let q = Query::new(&cs, b.mk_false());
        assert!(matches!(s.get_assignment(&b, q), Err(SolverError::Timeout)));
        assert!(s.failed());
        assert_eq!(s.num_entries(), 0);

        s.solver_mut().fail = false;
        assert!(s.get_assignment(&b, q).unwrap().is_some());
        assert!(!s.failed());
    }

    #[test]
    fn test_assignments_deduplicated() {
        let (b, x) = setup();
        let mut s = CexCachingSolver::new(Uniform::default(), CacheConfig::default());
        let a1 = s
            .get_assignment(&b, Query::new(&[b.mk_ult(x, c(&b, 10))], b.mk_false()))
            .unwrap()
            .unwrap();
        let a2 = s
            .get_assignment(&b, Query::new(&[b.mk_ne(x, c(&b, 200))], b.mk_false()))
            .unwrap()
            .unwrap();
        assert!(Rc::ptr_eq(&a1, &a2));
        assert_eq!(s.num_assignments(), 1);
        assert_eq!(s.num_entries(), 2);
    }

    #[test]
    fn test_eviction() {
        let b = ExprBuilder::default();
        let cfg = CacheConfig::default()
            .with_byte_budget(4)
            .with_evict_probability(1.0);
        let mut s = CexCachingSolver::new(Uniform::default(), cfg);

        let unsat_key = {
            let arr = b.mk_array(Array::symbolic("u", 1));
            let u = b.mk_read(UpdateLog::new(arr), b.mk_const(0, INT32));
            [b.mk_ult(u, c(&b, 0x10)), b.mk_ugt(u, c(&b, 0x20))]
        };
        assert!(s.get_assignment(&b, Query::new(&unsat_key, b.mk_false())).unwrap().is_none());

        for i in 0..5 {
            let arr = b.mk_array(Array::symbolic(format!("x{}", i), 1));
            let x = b.mk_read(UpdateLog::new(arr), b.mk_const(0, INT32));
            s.get_assignment(&b, Query::new(&[b.mk_eq(c(&b, i), x)], b.mk_false()))
                .unwrap();
        }
        // The fifth model pushed the total over the budget.
        assert_eq!(s.stats().evictions, 5);
        assert_eq!(s.num_assignments(), 0);
        assert_eq!(s.assignment_bytes(), 0);
        // Only the unsatisfiable key is left.
        assert_eq!(s.num_entries(), 1);
        assert!(s.get_assignment(&b, Query::new(&unsat_key, b.mk_false())).unwrap().is_none());
        assert_eq!(s.stats().exact_hits, 1);
    }

    #[test]
    fn test_check_bindings() {
        /// Always answers with x = 0.
        struct Liar;

        impl Solver for Liar {
            fn compute_sat(&mut self, _: &ExprBuilder, _: Query<'_>) -> Result<bool, SolverError> {
                Ok(true)
            }
            fn compute_initial_values(
                &mut self,
                b: &ExprBuilder,
                _: Query<'_>,
                arrays: &[ArrayRef],
            ) -> Result<Option<Assignment>, SolverError> {
                let mut a = Assignment::new(false);
                for &arr in arrays {
                    a.bind(b, arr, vec![0]);
                }
                Ok(Some(a))
            }
            fn failed(&self) -> bool {
                false
            }
        }

        let (b, x) = setup();
        let cfg = CacheConfig::default().with_check_bindings(true);
        let mut s = CexCachingSolver::new(Liar, cfg);
        let cs = [b.mk_ugt(x, c(&b, 10))];
        let err = s.get_assignment(&b, Query::new(&cs, b.mk_false())).unwrap_err();
        assert!(matches!(err, SolverError::Consistency(_)));
        assert!(s.failed());
    }

    #[test]
    fn test_solver_interface() {
        let (b, x) = setup();
        let mut s = CexCachingSolver::new(Uniform::default(), CacheConfig::default());
        let cs = [b.mk_ult(x, c(&b, 10))];

        let q = Query::new(&cs, b.mk_ult(x, c(&b, 20)));
        assert_eq!(s.compute_validity(&b, q).unwrap(), Validity::True);
        let q = Query::new(&cs, b.mk_ugt(x, c(&b, 10)));
        assert_eq!(s.compute_validity(&b, q).unwrap(), Validity::False);
        let q = Query::new(&cs, b.mk_eq(c(&b, 3), x));
        assert_eq!(s.compute_validity(&b, q).unwrap(), Validity::Unknown);

        assert!(s.compute_sat(&b, q).unwrap());
        let v = s.compute_value(&b, Query::new(&cs, b.mk_add(x, c(&b, 1)))).unwrap();
        assert_eq!(v, c(&b, 1));

        let arrays = b.find_symbolic_arrays(&[x]);
        let m = s
            .compute_initial_values(&b, Query::new(&cs, b.mk_false()), &arrays)
            .unwrap()
            .unwrap();
        assert_eq!(m.binding(arrays[0]), Some(&[0u8][..]));
    }
}
