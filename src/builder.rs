//! The expression manager.
//!
//! All expressions, update-log nodes and arrays live in an [`ExprBuilder`].
//! Construction goes through the `mk_*` methods (see [`rules`][crate::rules]),
//! which canonicalize before interning, so that:
//!
//! - no node has only constant operands (constants are folded eagerly);
//! - a constant operand of a commutative kind is on the left;
//! - building the same expression twice returns the same [`ExprRef`].
//!
//! Handles stay valid for the lifetime of the builder. Nothing is reclaimed
//! before the builder itself is dropped.
//!
//! # Examples
//!
//! ```
//! use symcore::array::Array;
//! use symcore::builder::ExprBuilder;
//! use symcore::updates::UpdateLog;
//!
//! let b = ExprBuilder::default();
//! let a = b.mk_array(Array::symbolic("input", 4));
//! let x = b.mk_read(UpdateLog::new(a), b.mk_const(0, 32));
//!
//! // Hash-consing: equal expressions share one node.
//! let one = b.mk_const(1, 8);
//! assert_eq!(b.mk_add(x, one), b.mk_add(one, x));
//!
//! // Constant folding.
//! let two = b.mk_add(one, one);
//! assert_eq!(b.as_const(two).and_then(|c| c.to_u64()), Some(2));
//! ```

use std::cell::{Cell, RefCell};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::rc::Rc;

use log::trace;

use crate::array::{Array, ArrayKey};
use crate::config::BuilderConfig;
use crate::constant::BitVec;
use crate::node::{ExprData, Node};
use crate::reference::{ArrayRef, ExprRef};
use crate::table::Table;
use crate::types::{Kind, Width, BOOL, RANGE};
use crate::updates::{UpdateData, UpdateLog};
use crate::utils::{hash2, hash3, hash_all};

pub struct ExprBuilder {
    config: BuilderConfig,
    exprs: RefCell<Table<ExprData>>,
    pub(crate) updates: RefCell<Table<UpdateData>>,
    arrays: RefCell<Vec<Rc<Array>>>,
    unique_arrays: RefCell<HashMap<ArrayKey, ArrayRef>>,
    next_bind_id: Cell<u32>,
    pub(crate) next_flushed_array: Cell<u32>,
}

impl ExprBuilder {
    pub fn new(config: BuilderConfig) -> Self {
        let bits = config.table_bits;
        Self {
            config,
            exprs: RefCell::new(Table::new(bits)),
            updates: RefCell::new(Table::new(bits)),
            arrays: RefCell::new(Vec::new()),
            unique_arrays: RefCell::new(HashMap::new()),
            next_bind_id: Cell::new(0),
            next_flushed_array: Cell::new(0),
        }
    }

    pub fn config(&self) -> &BuilderConfig {
        &self.config
    }

    /// Number of interned expression nodes.
    pub fn num_exprs(&self) -> usize {
        self.exprs.borrow().len()
    }

    /// Number of interned update-log nodes.
    pub fn num_updates(&self) -> usize {
        self.updates.borrow().len()
    }

    /// Number of registered arrays.
    pub fn num_arrays(&self) -> usize {
        self.arrays.borrow().len()
    }
}

impl Default for ExprBuilder {
    fn default() -> Self {
        ExprBuilder::new(BuilderConfig::default())
    }
}

impl Debug for ExprBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExprBuilder")
            .field("exprs", &self.num_exprs())
            .field("updates", &self.num_updates())
            .field("arrays", &self.num_arrays())
            .finish()
    }
}

// Accessors
impl ExprBuilder {
    fn data(&self, e: ExprRef) -> std::cell::Ref<'_, ExprData> {
        std::cell::Ref::map(self.exprs.borrow(), |t| t.value(e.index()))
    }

    pub fn node(&self, e: ExprRef) -> Node {
        self.data(e).node.clone()
    }
    pub fn kind(&self, e: ExprRef) -> Kind {
        self.data(e).node.kind()
    }
    pub fn width(&self, e: ExprRef) -> Width {
        self.data(e).width
    }
    pub fn hash(&self, e: ExprRef) -> u64 {
        self.data(e).hash
    }
    /// Hash that ignores constant values and array identity.
    pub fn skeleton(&self, e: ExprRef) -> u64 {
        self.data(e).skeleton
    }

    pub fn as_const(&self, e: ExprRef) -> Option<BitVec> {
        match &self.data(e).node {
            Node::Constant(c) => Some(c.clone()),
            _ => None,
        }
    }
    pub fn is_const(&self, e: ExprRef) -> bool {
        matches!(self.data(e).node, Node::Constant(_))
    }
    pub fn is_true(&self, e: ExprRef) -> bool {
        matches!(&self.data(e).node, Node::Constant(c) if c.is_true())
    }
    pub fn is_false(&self, e: ExprRef) -> bool {
        matches!(&self.data(e).node, Node::Constant(c) if c.is_false())
    }
    pub fn is_bool(&self, e: ExprRef) -> bool {
        self.width(e) == BOOL
    }

    /// Direct operands of `e`.
    pub fn kids(&self, e: ExprRef) -> Vec<ExprRef> {
        self.data(e).node.kids()
    }

    /// All expressions `e` depends on: its direct operands and, for a read,
    /// the index and value of every entry of its update log, newest first.
    pub fn operands(&self, e: ExprRef) -> Vec<ExprRef> {
        let node = self.node(e);
        let mut ops = node.kids();
        if let Node::Read { updates, .. } = node {
            for (index, value) in self.log_entries(updates) {
                ops.push(index);
                ops.push(value);
            }
        }
        ops
    }
}

// Arrays
impl ExprBuilder {
    /// Register a new array. Every call returns a distinct handle.
    pub fn mk_array(&self, array: Array) -> ArrayRef {
        let mut arrays = self.arrays.borrow_mut();
        let r = ArrayRef::new(arrays.len() as u32);
        trace!("mk_array({}) = {}", array, r);
        arrays.push(Rc::new(array));
        r
    }

    /// Register an array, reusing an existing one that it is interchangeable with.
    ///
    /// Constant arrays are unified by content, regardless of name.
    /// Symbolic arrays are unified by allocation key when they have one, else by name and size.
    pub fn unique_array(&self, array: Array) -> ArrayRef {
        let key = array.key();
        if let Some(&r) = self.unique_arrays.borrow().get(&key) {
            return r;
        }
        let r = self.mk_array(array);
        self.unique_arrays.borrow_mut().insert(key, r);
        r
    }

    pub fn array(&self, a: ArrayRef) -> Rc<Array> {
        Rc::clone(&self.arrays.borrow()[a.index()])
    }

    /// Order arrays by content hash, then by registration order.
    pub fn compare_arrays(&self, a: ArrayRef, b: ArrayRef) -> Ordering {
        if a == b {
            return Ordering::Equal;
        }
        self.array(a)
            .hash()
            .cmp(&self.array(b).hash())
            .then_with(|| a.cmp(&b))
    }
}

// Interning
impl ExprBuilder {
    fn compute_width(&self, node: &Node) -> Width {
        match *node {
            Node::Constant(ref c) => c.width(),
            Node::NotOptimized(e) | Node::Not(e) => self.width(e),
            Node::Read { .. } => RANGE,
            Node::Select { then, .. } => self.width(then),
            Node::Concat { left, right } => self.width(left) + self.width(right),
            Node::Extract { width, .. } | Node::Cast { width, .. } => width,
            Node::Binary { kind, left, .. } => {
                if kind.is_compare() {
                    BOOL
                } else {
                    self.width(left)
                }
            }
            Node::Let { scope, .. } => self.width(scope),
            Node::Bind { bind, .. } => self.width(bind),
        }
    }

    /// Compute `(hash, skeleton)` for a node.
    fn compute_hashes(&self, node: &Node) -> (u64, u64) {
        let kind = node.kind() as u64;
        match *node {
            Node::Constant(ref c) => (
                hash_all(kind, std::iter::once(c.width() as u64).chain(c.digits())),
                hash2(kind, c.width() as u64),
            ),
            Node::NotOptimized(e) => (self.hash(e), self.skeleton(e)),
            Node::Read { updates, index } => (
                hash3(kind, self.hash(index), self.log_hash(updates)),
                hash2(kind, self.skeleton(index)),
            ),
            Node::Extract {
                expr,
                offset,
                width,
            } => (
                hash_all(kind, [offset as u64, width as u64, self.hash(expr)]),
                hash_all(kind, [offset as u64, width as u64, self.skeleton(expr)]),
            ),
            Node::Cast { expr, width, .. } => (
                hash3(kind, width as u64, self.hash(expr)),
                hash3(kind, width as u64, self.skeleton(expr)),
            ),
            Node::Let { id, bind, scope } => (
                hash_all(kind, [id as u64, self.hash(bind), self.hash(scope)]),
                hash_all(kind, [self.skeleton(bind), self.skeleton(scope)]),
            ),
            Node::Bind { id, bind } => (
                hash3(kind, id as u64, self.hash(bind)),
                hash2(kind, self.skeleton(bind)),
            ),
            _ => {
                let kids = node.kids();
                (
                    hash_all(kind, kids.iter().map(|&k| self.hash(k))),
                    hash_all(kind, kids.iter().map(|&k| self.skeleton(k))),
                )
            }
        }
    }

    /// Intern a node as-is. Callers are responsible for canonical form.
    pub(crate) fn intern(&self, node: Node) -> ExprRef {
        let width = self.compute_width(&node);
        let (hash, skeleton) = self.compute_hashes(&node);
        let (index, fresh) = self.exprs.borrow_mut().put(ExprData {
            node,
            width,
            hash,
            skeleton,
        });
        let e = ExprRef::new(index as u32);
        if fresh {
            trace!("intern: new node {} (width {})", e, width);
        }
        e
    }

    pub(crate) fn fresh_bind_id(&self) -> u32 {
        let id = self.next_bind_id.get();
        self.next_bind_id.set(id + 1);
        id
    }
}

// Structural comparison
impl ExprBuilder {
    /// Strict total order on expressions.
    ///
    /// Identical handles compare equal; otherwise expressions are ordered by hash
    /// and, on a hash tie, by a full structural descent.
    pub fn compare(&self, a: ExprRef, b: ExprRef) -> Ordering {
        if a == b {
            return Ordering::Equal;
        }
        let (ha, hb) = (self.hash(a), self.hash(b));
        if ha != hb {
            return ha.cmp(&hb);
        }
        self.compare_deep(a, b)
    }

    fn compare_deep(&self, a: ExprRef, b: ExprRef) -> Ordering {
        let (na, nb) = (self.node(a), self.node(b));
        let ord = na
            .kind()
            .cmp(&nb.kind())
            .then_with(|| self.width(a).cmp(&self.width(b)))
            .then_with(|| self.compare_contents(&na, &nb));
        if ord != Ordering::Equal {
            return ord;
        }
        let (ka, kb) = (na.kids(), nb.kids());
        for (&x, &y) in ka.iter().zip(kb.iter()) {
            let ord = self.compare(x, y);
            if ord != Ordering::Equal {
                return ord;
            }
        }
        ka.len().cmp(&kb.len())
    }

    fn compare_contents(&self, a: &Node, b: &Node) -> Ordering {
        match (a, b) {
            (Node::Constant(x), Node::Constant(y)) => x.compare(y),
            (
                Node::Extract {
                    offset: oa,
                    width: wa,
                    ..
                },
                Node::Extract {
                    offset: ob,
                    width: wb,
                    ..
                },
            ) => oa.cmp(ob).then(wa.cmp(wb)),
            (Node::Cast { width: wa, .. }, Node::Cast { width: wb, .. }) => wa.cmp(wb),
            (Node::Read { updates: ua, .. }, Node::Read { updates: ub, .. }) => {
                self.compare_logs(*ua, *ub)
            }
            (Node::Let { id: ia, .. }, Node::Let { id: ib, .. })
            | (Node::Bind { id: ia, .. }, Node::Bind { id: ib, .. }) => ia.cmp(ib),
            _ => Ordering::Equal,
        }
    }
}

// Generic construction
impl ExprBuilder {
    /// Build an expression of the given kind from its operands.
    ///
    /// Covers every kind whose node is fully determined by its operands:
    /// `Select`, `Concat`, `Not`, `NotOptimized`, arithmetic, bitwise and all
    /// comparison kinds (including the derived ones such as `Ne` or `Sgt`).
    pub fn create(&self, kind: Kind, ops: &[ExprRef]) -> ExprRef {
        let arity = match kind {
            Kind::Select => 3,
            Kind::Not | Kind::NotOptimized => 1,
            _ => 2,
        };
        assert_eq!(
            ops.len(),
            arity,
            "{} expects {} operands, got {}",
            kind,
            arity,
            ops.len()
        );
        match kind {
            Kind::Select => self.mk_select(ops[0], ops[1], ops[2]),
            Kind::Concat => self.mk_concat(ops[0], ops[1]),
            Kind::Not => self.mk_not(ops[0]),
            Kind::NotOptimized => self.mk_not_optimized(ops[0]),
            k if k.is_binary() || k.is_compare() => self.mk_binary(k, ops[0], ops[1]),
            k => panic!("{} cannot be built from operands alone", k),
        }
    }

    /// Dispatch a two-operand kind to its constructor.
    pub fn mk_binary(&self, kind: Kind, l: ExprRef, r: ExprRef) -> ExprRef {
        match kind {
            Kind::Concat => self.mk_concat(l, r),
            Kind::Add => self.mk_add(l, r),
            Kind::Sub => self.mk_sub(l, r),
            Kind::Mul => self.mk_mul(l, r),
            Kind::UDiv => self.mk_udiv(l, r),
            Kind::SDiv => self.mk_sdiv(l, r),
            Kind::URem => self.mk_urem(l, r),
            Kind::SRem => self.mk_srem(l, r),
            Kind::And => self.mk_and(l, r),
            Kind::Or => self.mk_or(l, r),
            Kind::Xor => self.mk_xor(l, r),
            Kind::Shl => self.mk_shl(l, r),
            Kind::LShr => self.mk_lshr(l, r),
            Kind::AShr => self.mk_ashr(l, r),
            Kind::Eq => self.mk_eq(l, r),
            Kind::Ne => self.mk_ne(l, r),
            Kind::Ult => self.mk_ult(l, r),
            Kind::Ule => self.mk_ule(l, r),
            Kind::Ugt => self.mk_ugt(l, r),
            Kind::Uge => self.mk_uge(l, r),
            Kind::Slt => self.mk_slt(l, r),
            Kind::Sle => self.mk_sle(l, r),
            Kind::Sgt => self.mk_sgt(l, r),
            Kind::Sge => self.mk_sge(l, r),
            k => panic!("{} is not a binary kind", k),
        }
    }

    /// Rebuild `e` with new operands, in the layout returned by [`operands`][Self::operands].
    ///
    /// The result is canonicalized again, so it may have a different kind than `e`.
    pub fn rebuild(&self, e: ExprRef, ops: &[ExprRef]) -> ExprRef {
        if ops == self.operands(e).as_slice() {
            return e;
        }
        match self.node(e) {
            Node::Constant(_) => e,
            Node::NotOptimized(_) => self.mk_not_optimized(ops[0]),
            Node::Read { updates, .. } => {
                assert_eq!(ops.len() % 2, 1, "Read operands come in index/value pairs");
                let writes: Vec<(ExprRef, ExprRef)> =
                    ops[1..].chunks(2).rev().map(|w| (w[0], w[1])).collect();
                let log = writes
                    .into_iter()
                    .fold(UpdateLog::new(updates.root()), |log, (i, v)| {
                        self.extend(log, i, v)
                    });
                self.mk_read(log, ops[0])
            }
            Node::Select { .. } => self.mk_select(ops[0], ops[1], ops[2]),
            Node::Concat { .. } => self.mk_concat(ops[0], ops[1]),
            Node::Extract { offset, width, .. } => self.mk_extract(ops[0], offset, width),
            Node::Cast { kind, width, .. } => self.mk_cast(kind, ops[0], width),
            Node::Not(_) => self.mk_not(ops[0]),
            Node::Binary { kind, .. } => self.mk_binary(kind, ops[0], ops[1]),
            Node::Let { id, .. } => self.intern(Node::Let {
                id,
                bind: ops[0],
                scope: ops[1],
            }),
            Node::Bind { id, .. } => self.intern(Node::Bind { id, bind: ops[0] }),
        }
    }
}

// Graph queries
impl ExprBuilder {
    /// All read nodes reachable from `e`, in depth-first pre-order.
    pub fn find_reads(&self, e: ExprRef) -> Vec<ExprRef> {
        let mut seen = HashSet::new();
        let mut stack = vec![e];
        let mut reads = Vec::new();
        while let Some(e) = stack.pop() {
            if !seen.insert(e) {
                continue;
            }
            if self.kind(e) == Kind::Read {
                reads.push(e);
            }
            let mut ops = self.operands(e);
            ops.reverse();
            stack.extend(ops);
        }
        reads
    }

    /// Symbolic arrays read by any of `exprs`, in order of first appearance.
    pub fn find_symbolic_arrays(&self, exprs: &[ExprRef]) -> Vec<ArrayRef> {
        let mut seen = HashSet::new();
        let mut arrays = Vec::new();
        for &e in exprs {
            for read in self.find_reads(e) {
                if let Node::Read { updates, .. } = self.node(read) {
                    let root = updates.root();
                    if self.array(root).is_symbolic() && seen.insert(root) {
                        arrays.push(root);
                    }
                }
            }
        }
        arrays
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::updates::UpdateLog;
    use test_log::test;

    fn setup() -> (ExprBuilder, ExprRef, ExprRef) {
        let b = ExprBuilder::default();
        let a = b.mk_array(Array::symbolic("a", 8));
        let log = UpdateLog::new(a);
        let x = b.mk_read(log, b.mk_const(0, 32));
        let y = b.mk_read(log, b.mk_const(1, 32));
        (b, x, y)
    }

    #[test]
    fn test_hash_consing() {
        let (b, x, y) = setup();
        let e1 = b.mk_mul(x, y);
        let e2 = b.mk_mul(x, y);
        assert_eq!(e1, e2);
        let n = b.num_exprs();
        b.mk_mul(x, y);
        assert_eq!(b.num_exprs(), n);
    }

    #[test]
    fn test_width() {
        let (b, x, y) = setup();
        assert_eq!(b.width(x), 8);
        assert_eq!(b.width(b.mk_concat(x, y)), 16);
        assert_eq!(b.width(b.mk_ult(x, y)), 1);
        assert_eq!(b.width(b.mk_zext(x, 32)), 32);
    }

    #[test]
    fn test_compare_total_order() {
        let (b, x, y) = setup();
        let mut exprs = vec![
            x,
            y,
            b.mk_add(x, y),
            b.mk_sub(x, y),
            b.mk_const(3, 8),
            b.mk_const(4, 8),
            b.mk_concat(x, y),
            b.mk_ult(x, y),
        ];
        for &a in &exprs {
            assert_eq!(b.compare(a, a), Ordering::Equal);
            for &c in &exprs {
                assert_eq!(b.compare(a, c), b.compare(c, a).reverse());
                if a != c {
                    assert_ne!(b.compare(a, c), Ordering::Equal);
                }
            }
        }
        exprs.sort_by(|&p, &q| b.compare(p, q));
        for w in exprs.windows(3) {
            assert_eq!(b.compare(w[0], w[1]), Ordering::Less);
            assert_eq!(b.compare(w[0], w[2]), Ordering::Less);
        }
    }

    #[test]
    fn test_skeleton_ignores_constants() {
        let (b, x, _) = setup();
        let e1 = b.mk_add(b.mk_const(1, 8), x);
        let e2 = b.mk_add(b.mk_const(2, 8), x);
        assert_ne!(e1, e2);
        assert_ne!(b.hash(e1), b.hash(e2));
        assert_eq!(b.skeleton(e1), b.skeleton(e2));
    }

    #[test]
    fn test_skeleton_ignores_arrays() {
        let b = ExprBuilder::default();
        let p = b.mk_array(Array::symbolic("p", 4));
        let q = b.mk_array(Array::symbolic("q", 4));
        let i = b.mk_const(0, 32);
        let rp = b.mk_read(UpdateLog::new(p), i);
        let rq = b.mk_read(UpdateLog::new(q), i);
        assert_ne!(rp, rq);
        assert_eq!(b.skeleton(rp), b.skeleton(rq));
    }

    #[test]
    fn test_skeleton_follows_read_index() {
        let b = ExprBuilder::default();
        let p = UpdateLog::new(b.mk_array(Array::symbolic("p", 4)));
        let k = b.mk_read(p, b.mk_const(0, 32));
        let at_const = b.mk_read(p, b.mk_const(1, 32));
        let at_byte = b.mk_read(p, b.mk_zext(k, 32));
        let at_sum = b.mk_read(p, b.mk_add(b.mk_zext(k, 32), b.mk_zext(at_const, 32)));
        assert_eq!(b.skeleton(k), b.skeleton(at_const));
        assert_ne!(b.skeleton(at_const), b.skeleton(at_byte));
        assert_ne!(b.skeleton(at_byte), b.skeleton(at_sum));
    }

    #[test]
    fn test_unique_array() {
        let b = ExprBuilder::default();
        let a1 = b.unique_array(Array::constant("first", vec![1, 2, 3]));
        let a2 = b.unique_array(Array::constant("second", vec![1, 2, 3]));
        let a3 = b.unique_array(Array::constant("third", vec![1, 2, 4]));
        assert_eq!(a1, a2);
        assert_ne!(a1, a3);
        // Plain registration never unifies.
        let s1 = b.mk_array(Array::symbolic("s", 4));
        let s2 = b.mk_array(Array::symbolic("s", 4));
        assert_ne!(s1, s2);
    }

    #[test]
    fn test_create() {
        let (b, x, y) = setup();
        assert_eq!(b.create(Kind::Add, &[x, y]), b.mk_add(x, y));
        assert_eq!(b.create(Kind::Ugt, &[x, y]), b.mk_ult(y, x));
        let c = b.mk_eq(x, y);
        assert_eq!(b.create(Kind::Select, &[c, x, y]), b.mk_select(c, x, y));
    }

    #[test]
    #[should_panic(expected = "cannot be built from operands alone")]
    fn test_create_extract() {
        let (b, x, y) = setup();
        b.create(Kind::Extract, &[x, y]);
    }

    #[test]
    fn test_rebuild() {
        let (b, x, y) = setup();
        let e = b.mk_sub(x, y);
        assert_eq!(b.rebuild(e, &[x, y]), e);
        assert_eq!(b.rebuild(e, &[x, x]), b.mk_const(0, 8));
    }

    #[test]
    fn test_find_symbolic_arrays() {
        let b = ExprBuilder::default();
        let p = b.mk_array(Array::symbolic("p", 4));
        let q = b.mk_array(Array::symbolic("q", 4));
        let c = b.mk_array(Array::constant("c", vec![1, 2, 3, 4]));
        let i = b.mk_read(UpdateLog::new(q), b.mk_const(0, 32));
        let idx = b.mk_zext(i, 32);
        let rc = b.mk_read(UpdateLog::new(c), idx);
        let rp = b.mk_read(UpdateLog::new(p), b.mk_const(1, 32));
        let e = b.mk_ult(rc, rp);
        assert_eq!(b.find_symbolic_arrays(&[e]), vec![q, p]);
    }
}
