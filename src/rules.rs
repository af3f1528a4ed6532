//! Canonicalizing constructors.
//!
//! Every `mk_*` method folds constants, removes degenerate operands and
//! normalizes the operand order before interning a node. Each rewrite that
//! fires is logged at `debug` level.

use log::debug;

use crate::builder::ExprBuilder;
use crate::constant::BitVec;
use crate::node::Node;
use crate::reference::ExprRef;
use crate::types::{Kind, Width, BOOL, DOMAIN, RANGE};
use crate::updates::UpdateLog;

// Constants and markers
impl ExprBuilder {
    pub fn mk_bitvec(&self, value: BitVec) -> ExprRef {
        self.intern(Node::Constant(value))
    }

    pub fn mk_const(&self, value: u64, width: Width) -> ExprRef {
        self.mk_bitvec(BitVec::from_u64(value, width))
    }

    pub fn mk_bool(&self, value: bool) -> ExprRef {
        self.mk_bitvec(BitVec::from_bool(value))
    }
    pub fn mk_true(&self) -> ExprRef {
        self.mk_bool(true)
    }
    pub fn mk_false(&self) -> ExprRef {
        self.mk_bool(false)
    }

    fn mk_zero(&self, width: Width) -> ExprRef {
        self.mk_bitvec(BitVec::zero(width))
    }
    fn mk_ones(&self, width: Width) -> ExprRef {
        self.mk_bitvec(BitVec::all_ones(width))
    }

    /// Wrap `e` so that it is kept verbatim. Hashes like `e`.
    pub fn mk_not_optimized(&self, e: ExprRef) -> ExprRef {
        self.intern(Node::NotOptimized(e))
    }

    /// Create a fresh binding of `bind`, to be referred to inside a [`mk_let`][Self::mk_let] scope.
    pub fn mk_bind(&self, bind: ExprRef) -> ExprRef {
        let id = self.fresh_bind_id();
        self.intern(Node::Bind { id, bind })
    }

    /// Scope `scope` over the binding introduced by `bind`, a node made by [`mk_bind`][Self::mk_bind].
    pub fn mk_let(&self, bind: ExprRef, scope: ExprRef) -> ExprRef {
        match self.node(bind) {
            Node::Bind { id, bind } => self.intern(Node::Let { id, bind, scope }),
            _ => panic!("Let should scope over a Bind node"),
        }
    }

    fn check_same_width(&self, kind: Kind, l: ExprRef, r: ExprRef) -> Width {
        let (wl, wr) = (self.width(l), self.width(r));
        assert_eq!(
            wl, wr,
            "Operands of {} should have the same width: {} vs {}",
            kind, wl, wr
        );
        wl
    }

    /// Move a constant operand of a commutative kind to the left.
    fn const_left(&self, l: ExprRef, r: ExprRef) -> (ExprRef, ExprRef) {
        if self.is_const(r) && !self.is_const(l) {
            (r, l)
        } else {
            (l, r)
        }
    }

    /// `Some(k)` if `e` is `Binary { kind, left: k, right }` with constant `k`.
    fn const_left_of(&self, e: ExprRef, kind: Kind) -> Option<(BitVec, ExprRef)> {
        match self.node(e) {
            Node::Binary {
                kind: k,
                left,
                right,
            } if k == kind => self.as_const(left).map(|c| (c, right)),
            _ => None,
        }
    }

    /// Whether one of `a`, `b` is the boolean negation of the other.
    fn is_negation(&self, a: ExprRef, b: ExprRef) -> bool {
        matches!(self.node(a), Node::Not(x) if x == b) || matches!(self.node(b), Node::Not(x) if x == a)
    }

    fn zext_source(&self, e: ExprRef) -> Option<ExprRef> {
        match self.node(e) {
            Node::Cast {
                kind: Kind::ZExt,
                expr,
                ..
            } => Some(expr),
            _ => None,
        }
    }
}

// Memory
impl ExprBuilder {
    /// Read one byte at `index` through the update log.
    ///
    /// Writes are scanned newest first: a write at a provably equal index yields its value,
    /// provably different ones are skipped, and the first undecided one stops the scan.
    pub fn mk_read(&self, updates: UpdateLog, index: ExprRef) -> ExprRef {
        assert_eq!(
            self.width(index),
            DOMAIN,
            "Read index should be {} bits",
            DOMAIN
        );

        let mut decided = true;
        for (_, un) in self.log_nodes(updates) {
            let cond = self.mk_eq(index, un.index);
            if self.is_true(cond) {
                debug!("read: index matches a write");
                return un.value;
            }
            if !self.is_false(cond) {
                decided = false;
                break;
            }
        }

        if decided {
            let i = self.as_const(index).and_then(|c| c.to_u64());
            if let Some(v) = i.and_then(|i| self.array(updates.root()).value(i)) {
                debug!("read(const array, const) => const");
                return self.mk_const(v as u64, RANGE);
            }
        }

        self.intern(Node::Read { updates, index })
    }

    /// Little-endian read of `bytes` consecutive bytes starting at `index`.
    pub fn mk_read_le(&self, updates: UpdateLog, index: ExprRef, bytes: u32) -> ExprRef {
        assert!(bytes > 0, "Read of zero bytes");
        let read = |i: u32| {
            let at = self.mk_add(self.mk_const(i as u64, DOMAIN), index);
            self.mk_read(updates, at)
        };
        (1..bytes).fold(read(0), |acc, i| self.mk_concat(read(i), acc))
    }
}

// Structure
impl ExprBuilder {
    pub fn mk_select(&self, cond: ExprRef, then: ExprRef, otherwise: ExprRef) -> ExprRef {
        assert_eq!(self.width(cond), BOOL, "Select condition should be boolean");
        self.check_same_width(Kind::Select, then, otherwise);

        if let Some(c) = self.as_const(cond) {
            debug!("select(const, T, F) => branch");
            return if c.is_true() { then } else { otherwise };
        }
        if then == otherwise {
            debug!("select(C, X, X) => X");
            return then;
        }
        if self.width(then) == BOOL {
            debug!("select(C, T, F) => boolean connectives");
            return match (self.as_const(then), self.as_const(otherwise)) {
                (Some(t), _) if t.is_true() => self.mk_or(cond, otherwise),
                (Some(_), _) => self.mk_and(self.mk_not(cond), otherwise),
                (_, Some(f)) if f.is_true() => self.mk_or(self.mk_not(cond), then),
                (_, Some(_)) => self.mk_and(cond, then),
                (None, None) => self.mk_or(
                    self.mk_and(cond, then),
                    self.mk_and(self.mk_not(cond), otherwise),
                ),
            };
        }

        self.intern(Node::Select {
            cond,
            then,
            otherwise,
        })
    }

    /// Concatenate `left` (high bits) and `right` (low bits).
    pub fn mk_concat(&self, left: ExprRef, right: ExprRef) -> ExprRef {
        let width = self.width(left) + self.width(right);

        match (self.as_const(left), self.as_const(right)) {
            (Some(l), Some(r)) => return self.mk_bitvec(l.concat(&r)),
            (Some(l), None) => {
                if l.is_zero() {
                    debug!("concat(0, X) => zext(X)");
                    return self.mk_zext(right, width);
                }
                if let Node::Concat { left: rl, right: rr } = self.node(right) {
                    if let Some(k) = self.as_const(rl) {
                        debug!("concat(c0, concat(c1, X)) => concat(c0c1, X)");
                        return self.mk_concat(self.mk_bitvec(l.concat(&k)), rr);
                    }
                }
            }
            _ => {}
        }

        if let Node::Extract {
            expr: src,
            offset: ol,
            width: wl,
        } = self.node(left)
        {
            match self.node(right) {
                Node::Extract {
                    expr,
                    offset,
                    width: wr,
                } if expr == src && ol == offset + wr => {
                    debug!("concat(extract, extract) => extract");
                    return self.mk_extract(src, offset, wl + wr);
                }
                Node::Concat { left: rl, right: rr } => {
                    if let Node::Extract {
                        expr,
                        offset,
                        width: wr,
                    } = self.node(rl)
                    {
                        if expr == src && ol == offset + wr {
                            debug!("concat(extract, concat(extract, X)) => concat(extract, X)");
                            return self.mk_concat(self.mk_extract(src, offset, wl + wr), rr);
                        }
                    }
                }
                _ => {}
            }
            // The right side may be a rewritten form of the adjacent extract.
            let wr = self.width(right);
            if ol >= wr && self.mk_extract(src, ol - wr, wr) == right {
                debug!("concat(extract, adjacent part) => extract");
                return self.mk_extract(src, ol - wr, wl + wr);
            }
        }

        if let Node::Extract {
            expr: src,
            offset,
            width: wr,
        } = self.node(right)
        {
            let wl = self.width(left);
            if offset + wr + wl <= self.width(src) && self.mk_extract(src, offset + wr, wl) == left {
                debug!("concat(adjacent part, extract) => extract");
                return self.mk_extract(src, offset, wl + wr);
            }
        }

        self.intern(Node::Concat { left, right })
    }

    /// Bits `offset .. offset + width` of `expr`.
    pub fn mk_extract(&self, expr: ExprRef, offset: Width, width: Width) -> ExprRef {
        let we = self.width(expr);
        assert!(
            width > 0 && offset + width <= we,
            "Extract out of range: {}+{} of {} bits",
            offset,
            width,
            we
        );

        if offset == 0 && width == we {
            return expr;
        }
        if let Some(c) = self.as_const(expr) {
            return self.mk_bitvec(c.extract(offset, width));
        }

        match self.node(expr) {
            Node::Concat { left, right } => {
                let wr = self.width(right);
                if offset >= wr {
                    debug!("extract(concat) => left");
                    return self.mk_extract(left, offset - wr, width);
                }
                if offset + width <= wr {
                    debug!("extract(concat) => right");
                    return self.mk_extract(right, offset, width);
                }
                debug!("extract(concat) => concat(extract, extract)");
                return self.mk_concat(
                    self.mk_extract(left, 0, offset + width - wr),
                    self.mk_extract(right, offset, wr - offset),
                );
            }
            Node::Extract {
                expr: inner,
                offset: o,
                ..
            } => {
                debug!("extract(extract) => extract");
                return self.mk_extract(inner, o + offset, width);
            }
            Node::Cast {
                kind, expr: src, ..
            } => {
                let ws = self.width(src);
                if offset + width <= ws {
                    debug!("extract({}(X)) => extract(X)", kind);
                    return self.mk_extract(src, offset, width);
                }
                if offset == 0 {
                    debug!("extract({}(X), 0) => {}(X)", kind, kind);
                    return self.mk_cast(kind, src, width);
                }
                if kind == Kind::ZExt && offset >= ws {
                    debug!("extract(zext) above source => 0");
                    return self.mk_zero(width);
                }
            }
            Node::Binary { kind, left, right }
                if offset == 0
                    && matches!(
                        kind,
                        Kind::Add | Kind::Sub | Kind::Mul | Kind::And | Kind::Or | Kind::Xor
                    ) =>
            {
                debug!("extract({}(A, B), 0) => {}(extract A, extract B)", kind, kind);
                return self.mk_binary(
                    kind,
                    self.mk_extract(left, 0, width),
                    self.mk_extract(right, 0, width),
                );
            }
            _ => {}
        }

        self.intern(Node::Extract {
            expr,
            offset,
            width,
        })
    }

    pub fn mk_cast(&self, kind: Kind, expr: ExprRef, width: Width) -> ExprRef {
        match kind {
            Kind::ZExt => self.mk_zext(expr, width),
            Kind::SExt => self.mk_sext(expr, width),
            k => panic!("{} is not a cast", k),
        }
    }

    pub fn mk_zext(&self, expr: ExprRef, width: Width) -> ExprRef {
        let we = self.width(expr);
        if width == we {
            return expr;
        }
        if width < we {
            debug!("zext to smaller width => extract");
            return self.mk_extract(expr, 0, width);
        }
        if let Some(c) = self.as_const(expr) {
            return self.mk_bitvec(c.zext(width));
        }
        if we == BOOL {
            debug!("zext(bool) => select");
            return self.mk_select(expr, self.mk_const(1, width), self.mk_zero(width));
        }
        if let Some(src) = self.zext_source(expr) {
            debug!("zext(zext X) => zext X");
            return self.mk_zext(src, width);
        }
        self.intern(Node::Cast {
            kind: Kind::ZExt,
            expr,
            width,
        })
    }

    pub fn mk_sext(&self, expr: ExprRef, width: Width) -> ExprRef {
        let we = self.width(expr);
        if width == we {
            return expr;
        }
        if width < we {
            debug!("sext to smaller width => extract");
            return self.mk_extract(expr, 0, width);
        }
        if let Some(c) = self.as_const(expr) {
            return self.mk_bitvec(c.sext(width));
        }
        if we == BOOL {
            debug!("sext(bool) => select");
            return self.mk_select(expr, self.mk_ones(width), self.mk_zero(width));
        }
        match self.node(expr) {
            Node::Cast {
                kind: Kind::SExt,
                expr: src,
                ..
            } => {
                debug!("sext(sext X) => sext X");
                return self.mk_sext(src, width);
            }
            Node::Cast {
                kind: Kind::ZExt, ..
            } => {
                debug!("sext(zext X) => zext(zext X)");
                return self.mk_zext(expr, width);
            }
            Node::Concat { left, .. } if self.as_const(left).is_some_and(|c| !c.sign_bit()) => {
                debug!("sext(concat(positive, X)) => zext");
                return self.mk_zext(expr, width);
            }
            Node::Select {
                cond,
                then,
                otherwise,
            } if self.is_const(then) && self.is_const(otherwise) => {
                debug!("sext(select(C, c0, c1)) => select(C, sext c0, sext c1)");
                return self.mk_select(
                    cond,
                    self.mk_sext(then, width),
                    self.mk_sext(otherwise, width),
                );
            }
            _ => {}
        }
        self.intern(Node::Cast {
            kind: Kind::SExt,
            expr,
            width,
        })
    }

    /// Bitwise negation; boolean negation on width 1.
    pub fn mk_not(&self, expr: ExprRef) -> ExprRef {
        if let Some(c) = self.as_const(expr) {
            return self.mk_bitvec(c.not());
        }
        match self.node(expr) {
            Node::Not(x) => {
                debug!("not(not X) => X");
                return x;
            }
            Node::Binary {
                kind: Kind::Or,
                left,
                right,
            } if self.width(expr) == BOOL => {
                debug!("not(or(A, B)) => and(not A, not B)");
                return self.mk_and(self.mk_not(left), self.mk_not(right));
            }
            _ => {}
        }
        self.intern(Node::Not(expr))
    }

    /// `expr == 0`; boolean negation on width 1.
    pub fn mk_is_zero(&self, expr: ExprRef) -> ExprRef {
        if self.width(expr) == BOOL {
            self.mk_not(expr)
        } else {
            self.mk_eq(self.mk_zero(self.width(expr)), expr)
        }
    }

    pub fn mk_implies(&self, a: ExprRef, b: ExprRef) -> ExprRef {
        self.mk_or(self.mk_not(a), b)
    }
}

// Arithmetic
impl ExprBuilder {
    pub fn mk_add(&self, l: ExprRef, r: ExprRef) -> ExprRef {
        let w = self.check_same_width(Kind::Add, l, r);
        if w == BOOL {
            return self.mk_xor(l, r);
        }
        let (l, r) = self.const_left(l, r);

        if let Some(cl) = self.as_const(l) {
            if let Some(cr) = self.as_const(r) {
                return self.mk_bitvec(cl.add(&cr));
            }
            if cl.is_zero() {
                debug!("0 + X => X");
                return r;
            }
            if let Some((k, x)) = self.const_left_of(r, Kind::Add) {
                debug!("c0 + (c1 + X) => (c0 + c1) + X");
                return self.mk_add(self.mk_bitvec(cl.add(&k)), x);
            }
            if let Some((k, x)) = self.const_left_of(r, Kind::Sub) {
                debug!("c0 + (c1 - X) => (c0 + c1) - X");
                return self.mk_sub(self.mk_bitvec(cl.add(&k)), x);
            }
        } else {
            if let Some((k, a)) = self.const_left_of(l, Kind::Add) {
                debug!("(k + A) + B => k + (A + B)");
                return self.mk_add(self.mk_bitvec(k), self.mk_add(a, r));
            }
            if let Some((k, a)) = self.const_left_of(l, Kind::Sub) {
                debug!("(k - A) + B => k + (B - A)");
                return self.mk_add(self.mk_bitvec(k), self.mk_sub(r, a));
            }
            if let Some((k, b)) = self.const_left_of(r, Kind::Add) {
                debug!("A + (k + B) => k + (A + B)");
                return self.mk_add(self.mk_bitvec(k), self.mk_add(l, b));
            }
            if let Some((k, b)) = self.const_left_of(r, Kind::Sub) {
                debug!("A + (k - B) => k + (A - B)");
                return self.mk_add(self.mk_bitvec(k), self.mk_sub(l, b));
            }
        }

        self.intern(Node::Binary {
            kind: Kind::Add,
            left: l,
            right: r,
        })
    }

    pub fn mk_sub(&self, l: ExprRef, r: ExprRef) -> ExprRef {
        let w = self.check_same_width(Kind::Sub, l, r);
        if w == BOOL {
            return self.mk_xor(l, r);
        }
        if l == r {
            debug!("X - X => 0");
            return self.mk_zero(w);
        }

        match (self.as_const(l), self.as_const(r)) {
            (Some(cl), Some(cr)) => return self.mk_bitvec(cl.sub(&cr)),
            (None, Some(cr)) => {
                debug!("X - c => -c + X");
                return self.mk_add(self.mk_bitvec(cr.neg()), l);
            }
            (Some(cl), None) => {
                if let Some((k, x)) = self.const_left_of(r, Kind::Add) {
                    debug!("c0 - (c1 + X) => (c0 - c1) - X");
                    return self.mk_sub(self.mk_bitvec(cl.sub(&k)), x);
                }
                if let Some((k, x)) = self.const_left_of(r, Kind::Sub) {
                    debug!("c0 - (c1 - X) => (c0 - c1) + X");
                    return self.mk_add(self.mk_bitvec(cl.sub(&k)), x);
                }
            }
            (None, None) => {
                if let Some((k, a)) = self.const_left_of(l, Kind::Add) {
                    debug!("(k + A) - B => k + (A - B)");
                    return self.mk_add(self.mk_bitvec(k), self.mk_sub(a, r));
                }
                if let Some((k, a)) = self.const_left_of(l, Kind::Sub) {
                    debug!("(k - A) - B => k - (A + B)");
                    return self.mk_sub(self.mk_bitvec(k), self.mk_add(a, r));
                }
                if let Some((k, b)) = self.const_left_of(r, Kind::Add) {
                    debug!("A - (k + B) => -k + (A - B)");
                    return self.mk_add(self.mk_bitvec(k.neg()), self.mk_sub(l, b));
                }
                if let Some((k, b)) = self.const_left_of(r, Kind::Sub) {
                    debug!("A - (k - B) => -k + (A + B)");
                    return self.mk_add(self.mk_bitvec(k.neg()), self.mk_add(l, b));
                }
            }
        }

        self.intern(Node::Binary {
            kind: Kind::Sub,
            left: l,
            right: r,
        })
    }

    pub fn mk_mul(&self, l: ExprRef, r: ExprRef) -> ExprRef {
        let w = self.check_same_width(Kind::Mul, l, r);
        if w == BOOL {
            return self.mk_and(l, r);
        }
        let (l, r) = self.const_left(l, r);
        if let Some(cl) = self.as_const(l) {
            if let Some(cr) = self.as_const(r) {
                return self.mk_bitvec(cl.mul(&cr));
            }
            if cl.is_zero() {
                debug!("0 * X => 0");
                return l;
            }
            if cl.is_one() {
                debug!("1 * X => X");
                return r;
            }
        }
        self.intern(Node::Binary {
            kind: Kind::Mul,
            left: l,
            right: r,
        })
    }

    /// Shared shape of the four division kinds.
    fn mk_division(
        &self,
        kind: Kind,
        l: ExprRef,
        r: ExprRef,
        fold: fn(&BitVec, &BitVec) -> BitVec,
    ) -> ExprRef {
        let w = self.check_same_width(kind, l, r);
        let is_rem = matches!(kind, Kind::URem | Kind::SRem);

        if w == BOOL {
            // The divisor can only be 1.
            debug!("{}(bool) => {}", kind, if is_rem { "false" } else { "lhs" });
            return if is_rem { self.mk_false() } else { l };
        }
        match (self.as_const(l), self.as_const(r)) {
            (Some(cl), Some(cr)) => return self.mk_bitvec(fold(&cl, &cr)),
            (_, Some(cr)) if cr.is_one() => {
                debug!("{}(X, 1)", kind);
                return if is_rem { self.mk_zero(w) } else { l };
            }
            (Some(cl), _) if cl.is_zero() && is_rem => {
                debug!("{}(0, X) => 0", kind);
                return l;
            }
            _ => {}
        }
        self.intern(Node::Binary {
            kind,
            left: l,
            right: r,
        })
    }

    pub fn mk_udiv(&self, l: ExprRef, r: ExprRef) -> ExprRef {
        self.mk_division(Kind::UDiv, l, r, BitVec::udiv)
    }
    pub fn mk_sdiv(&self, l: ExprRef, r: ExprRef) -> ExprRef {
        self.mk_division(Kind::SDiv, l, r, BitVec::sdiv)
    }
    pub fn mk_urem(&self, l: ExprRef, r: ExprRef) -> ExprRef {
        self.mk_division(Kind::URem, l, r, BitVec::urem)
    }
    pub fn mk_srem(&self, l: ExprRef, r: ExprRef) -> ExprRef {
        self.mk_division(Kind::SRem, l, r, BitVec::srem)
    }
}

// Bitwise
impl ExprBuilder {
    pub fn mk_and(&self, l: ExprRef, r: ExprRef) -> ExprRef {
        let w = self.check_same_width(Kind::And, l, r);
        let (l, r) = self.const_left(l, r);

        if let Some(cl) = self.as_const(l) {
            if let Some(cr) = self.as_const(r) {
                return self.mk_bitvec(cl.and(&cr));
            }
            if cl.is_all_ones() {
                debug!("and(~0, X) => X");
                return r;
            }
            if cl.is_zero() {
                debug!("and(0, X) => 0");
                return l;
            }
            if let Node::Concat { left: a, right: b } = self.node(r) {
                debug!("and(c, concat(A, B)) => concat(and, and)");
                let wb = self.width(b);
                return self.mk_concat(
                    self.mk_and(self.mk_bitvec(cl.extract(wb, w - wb)), a),
                    self.mk_and(self.mk_bitvec(cl.extract(0, wb)), b),
                );
            }
            if let Some(k) = cl.low_mask_bits() {
                debug!("and(2^{} - 1, X) => zext(extract X)", k);
                return self.mk_zext(self.mk_extract(r, 0, k), w);
            }
        } else {
            if l == r {
                debug!("and(X, X) => X");
                return l;
            }
            if w == BOOL {
                if self.is_negation(l, r) {
                    debug!("and(A, not A) => false");
                    return self.mk_false();
                }
                if let (
                    Node::Binary {
                        kind: kl,
                        left: a,
                        right: b,
                    },
                    Node::Binary {
                        kind: kr,
                        left: c,
                        right: d,
                    },
                ) = (self.node(l), self.node(r))
                {
                    if kl == kr && a == d && b == c {
                        match kl {
                            Kind::Ule | Kind::Sle => {
                                debug!("and(X <= Y, Y <= X) => X == Y");
                                return self.mk_eq(a, b);
                            }
                            Kind::Ult | Kind::Slt => {
                                debug!("and(X < Y, Y < X) => false");
                                return self.mk_false();
                            }
                            _ => {}
                        }
                    }
                }
            }
            if let (Some(a), Some(b)) = (self.zext_source(l), self.zext_source(r)) {
                if self.width(a) == self.width(b) {
                    debug!("and(zext A, zext B) => zext(and(A, B))");
                    return self.mk_zext(self.mk_and(a, b), w);
                }
            }
        }

        self.intern(Node::Binary {
            kind: Kind::And,
            left: l,
            right: r,
        })
    }

    pub fn mk_or(&self, l: ExprRef, r: ExprRef) -> ExprRef {
        let w = self.check_same_width(Kind::Or, l, r);
        let (l, r) = self.const_left(l, r);

        if let Some(cl) = self.as_const(l) {
            if let Some(cr) = self.as_const(r) {
                return self.mk_bitvec(cl.or(&cr));
            }
            if cl.is_all_ones() {
                debug!("or(~0, X) => ~0");
                return l;
            }
            if cl.is_zero() {
                debug!("or(0, X) => X");
                return r;
            }
        } else {
            if l == r {
                debug!("or(X, X) => X");
                return l;
            }
            if w == BOOL && self.is_negation(l, r) {
                debug!("or(A, not A) => true");
                return self.mk_true();
            }
            if let (Some(a), Some(b)) = (self.zext_source(l), self.zext_source(r)) {
                if self.width(a) == self.width(b) {
                    debug!("or(zext A, zext B) => zext(or(A, B))");
                    return self.mk_zext(self.mk_or(a, b), w);
                }
            }
        }

        self.intern(Node::Binary {
            kind: Kind::Or,
            left: l,
            right: r,
        })
    }

    pub fn mk_xor(&self, l: ExprRef, r: ExprRef) -> ExprRef {
        let w = self.check_same_width(Kind::Xor, l, r);
        let (l, r) = self.const_left(l, r);

        if let Some(cl) = self.as_const(l) {
            if let Some(cr) = self.as_const(r) {
                return self.mk_bitvec(cl.xor(&cr));
            }
            if cl.is_zero() {
                debug!("xor(0, X) => X");
                return r;
            }
            if cl.is_all_ones() {
                debug!("xor(~0, X) => not X");
                return self.mk_not(r);
            }
            if let Node::Select {
                cond,
                then,
                otherwise,
            } = self.node(r)
            {
                if self.is_const(then) && self.is_const(otherwise) {
                    debug!("xor(c, select(C, c0, c1)) => select(C, xor, xor)");
                    return self.mk_select(cond, self.mk_xor(l, then), self.mk_xor(l, otherwise));
                }
            }
        } else if l == r {
            debug!("xor(X, X) => 0");
            return self.mk_zero(w);
        }

        self.intern(Node::Binary {
            kind: Kind::Xor,
            left: l,
            right: r,
        })
    }

    /// Constant shift amount below the width, or `None` if it shifts everything out.
    fn shift_amount(&self, c: &BitVec) -> Option<Width> {
        c.to_u64()
            .filter(|&s| s < c.width() as u64)
            .map(|s| s as Width)
    }

    pub fn mk_shl(&self, l: ExprRef, r: ExprRef) -> ExprRef {
        let w = self.check_same_width(Kind::Shl, l, r);
        if w == BOOL {
            return self.mk_and(l, self.mk_not(r));
        }
        match (self.as_const(l), self.as_const(r)) {
            (Some(cl), Some(cr)) => return self.mk_bitvec(cl.shl(&cr)),
            (_, Some(cr)) => match self.shift_amount(&cr) {
                Some(0) => {
                    debug!("shl(X, 0) => X");
                    return l;
                }
                None => {
                    debug!("shl(X, >= width) => 0");
                    return self.mk_zero(w);
                }
                Some(_) => {}
            },
            _ => {}
        }
        self.intern(Node::Binary {
            kind: Kind::Shl,
            left: l,
            right: r,
        })
    }

    pub fn mk_lshr(&self, l: ExprRef, r: ExprRef) -> ExprRef {
        let w = self.check_same_width(Kind::LShr, l, r);
        if w == BOOL {
            return self.mk_and(l, self.mk_not(r));
        }
        match (self.as_const(l), self.as_const(r)) {
            (Some(cl), Some(cr)) => return self.mk_bitvec(cl.lshr(&cr)),
            (_, Some(cr)) => {
                return match self.shift_amount(&cr) {
                    Some(0) => {
                        debug!("lshr(X, 0) => X");
                        l
                    }
                    Some(s) => {
                        debug!("lshr(X, c) => zext(extract X)");
                        self.mk_zext(self.mk_extract(l, s, w - s), w)
                    }
                    None => {
                        debug!("lshr(X, >= width) => 0");
                        self.mk_zero(w)
                    }
                };
            }
            _ => {}
        }
        self.intern(Node::Binary {
            kind: Kind::LShr,
            left: l,
            right: r,
        })
    }

    pub fn mk_ashr(&self, l: ExprRef, r: ExprRef) -> ExprRef {
        let w = self.check_same_width(Kind::AShr, l, r);
        if w == BOOL {
            return l;
        }
        match (self.as_const(l), self.as_const(r)) {
            (Some(cl), Some(cr)) => return self.mk_bitvec(cl.ashr(&cr)),
            (_, Some(cr)) => {
                return match self.shift_amount(&cr) {
                    Some(0) => {
                        debug!("ashr(X, 0) => X");
                        l
                    }
                    Some(s) => {
                        debug!("ashr(X, c) => sext(extract X)");
                        self.mk_sext(self.mk_extract(l, s, w - s), w)
                    }
                    None => {
                        debug!("ashr(X, >= width) => sext(sign bit)");
                        self.mk_sext(self.mk_extract(l, w - 1, 1), w)
                    }
                };
            }
            _ => {}
        }
        self.intern(Node::Binary {
            kind: Kind::AShr,
            left: l,
            right: r,
        })
    }
}

// Comparisons
impl ExprBuilder {
    pub fn mk_eq(&self, l: ExprRef, r: ExprRef) -> ExprRef {
        self.check_same_width(Kind::Eq, l, r);
        if l == r {
            debug!("X == X => true");
            return self.mk_true();
        }
        let (l, r) = self.const_left(l, r);
        if let Some(cl) = self.as_const(l) {
            if let Some(cr) = self.as_const(r) {
                return self.mk_bitvec(cl.eq(&cr));
            }
            if let Some(e) = self.mk_eq_const(l, &cl, r) {
                return e;
            }
        }
        self.intern(Node::Binary {
            kind: Kind::Eq,
            left: l,
            right: r,
        })
    }

    /// Rewrites of `c == r` for constant `c` and non-constant `r`.
    fn mk_eq_const(&self, l: ExprRef, cl: &BitVec, r: ExprRef) -> Option<ExprRef> {
        let w = cl.width();
        if w == BOOL {
            return Some(if cl.is_true() {
                debug!("true == X => X");
                r
            } else {
                debug!("false == X => not X");
                self.mk_not(r)
            });
        }

        match self.node(r) {
            Node::Cast {
                kind: Kind::ZExt,
                expr: x,
                ..
            } => {
                let wx = self.width(x);
                if cl.fits_unsigned(wx) {
                    debug!("c == zext X => trunc(c) == X");
                    Some(self.mk_eq(self.mk_bitvec(cl.extract(0, wx)), x))
                } else {
                    debug!("c == zext X with c out of range => false");
                    Some(self.mk_false())
                }
            }
            Node::Cast {
                kind: Kind::SExt,
                expr: x,
                ..
            } => {
                let t = cl.extract(0, self.width(x));
                if t.sext(w) == *cl {
                    debug!("c == sext X => trunc(c) == X");
                    Some(self.mk_eq(self.mk_bitvec(t), x))
                } else {
                    debug!("c == sext X with c out of range => false");
                    Some(self.mk_false())
                }
            }
            Node::Binary {
                kind: Kind::Add,
                left: k,
                right: b,
            } => self.as_const(k).map(|k| {
                debug!("c0 == c1 + X => (c0 - c1) == X");
                self.mk_eq(self.mk_bitvec(cl.sub(&k)), b)
            }),
            Node::Binary {
                kind: Kind::Sub,
                left: k,
                right: b,
            } => self.as_const(k).map(|k| {
                debug!("c0 == c1 - X => (c1 - c0) == X");
                self.mk_eq(self.mk_bitvec(k.sub(cl)), b)
            }),
            Node::Binary {
                kind: Kind::Xor,
                left: k,
                right: b,
            } => self.as_const(k).map(|k| {
                debug!("c0 == c1 ^ X => (c0 ^ c1) == X");
                self.mk_eq(self.mk_bitvec(cl.xor(&k)), b)
            }),
            Node::Binary {
                kind: Kind::Or,
                left: k,
                ..
            } => match self.as_const(k) {
                Some(k) if cl.and(&k) != k => {
                    debug!("c0 == c1 | X with missing bits => false");
                    Some(self.mk_false())
                }
                _ => None,
            },
            Node::Not(x) => {
                debug!("c == not X => not(c) == X");
                Some(self.mk_eq(self.mk_bitvec(cl.not()), x))
            }
            Node::Concat { left: a, right: b } => {
                debug!("c == concat(A, B) => and(hi == A, lo == B)");
                let wb = self.width(b);
                Some(self.mk_and(
                    self.mk_eq(self.mk_bitvec(cl.extract(wb, w - wb)), a),
                    self.mk_eq(self.mk_bitvec(cl.extract(0, wb)), b),
                ))
            }
            Node::Select {
                cond,
                then,
                otherwise,
            } if self.is_const(then) && self.is_const(otherwise) => {
                debug!("c == select(C, c0, c1) => C, not C or false");
                Some(match (then == l, otherwise == l) {
                    (true, _) => cond,
                    (false, true) => self.mk_not(cond),
                    (false, false) => self.mk_false(),
                })
            }
            Node::Read { updates, index } if self.config().const_array_disjunction => {
                self.mk_read_disjunction(cl, updates, index)
            }
            _ => None,
        }
    }

    /// `c == read(const_array, i)` as a disjunction of `i == k` over every
    /// index `k` holding `c`, if there are few enough of them.
    fn mk_read_disjunction(&self, c: &BitVec, updates: UpdateLog, index: ExprRef) -> Option<ExprRef> {
        if !updates.is_empty() {
            return None;
        }
        let array = self.array(updates.root());
        let bytes = array.bytes()?;
        let value = c.to_u64()?;
        let matches: Vec<u64> = bytes
            .iter()
            .enumerate()
            .filter(|&(_, &b)| b as u64 == value)
            .map(|(i, _)| i as u64)
            .collect();
        if matches.len() > self.config().const_array_disjunction_limit {
            return None;
        }
        debug!(
            "c == read(const array) => disjunction over {} indices",
            matches.len()
        );
        Some(matches.into_iter().fold(self.mk_false(), |acc, i| {
            self.mk_or(acc, self.mk_eq(self.mk_const(i, DOMAIN), index))
        }))
    }

    pub fn mk_ne(&self, l: ExprRef, r: ExprRef) -> ExprRef {
        self.mk_not(self.mk_eq(l, r))
    }

    pub fn mk_ult(&self, l: ExprRef, r: ExprRef) -> ExprRef {
        let w = self.check_same_width(Kind::Ult, l, r);
        if w == BOOL {
            return self.mk_and(self.mk_not(l), r);
        }
        if l == r {
            debug!("X < X => false");
            return self.mk_false();
        }
        match (self.as_const(l), self.as_const(r)) {
            (Some(cl), Some(cr)) => return self.mk_bitvec(cl.ult(&cr)),
            (_, Some(cr)) => {
                if cr.is_zero() {
                    debug!("X < 0 => false");
                    return self.mk_false();
                }
                if let Some(x) = self.zext_source(l) {
                    let max = BitVec::all_ones(self.width(x)).zext(w);
                    if max.ult(&cr).is_true() {
                        debug!("zext X < c with c above range => true");
                        return self.mk_true();
                    }
                }
            }
            (Some(cl), _) => {
                if cl.is_all_ones() {
                    debug!("~0 < X => false");
                    return self.mk_false();
                }
                if let Some(x) = self.zext_source(r) {
                    let max = BitVec::all_ones(self.width(x)).zext(w);
                    if max.ule(&cl).is_true() {
                        debug!("c < zext X with c at or above range => false");
                        return self.mk_false();
                    }
                }
            }
            _ => {}
        }
        self.intern(Node::Binary {
            kind: Kind::Ult,
            left: l,
            right: r,
        })
    }

    pub fn mk_ule(&self, l: ExprRef, r: ExprRef) -> ExprRef {
        let w = self.check_same_width(Kind::Ule, l, r);
        if w == BOOL {
            return self.mk_or(self.mk_not(l), r);
        }
        if l == r {
            debug!("X <= X => true");
            return self.mk_true();
        }
        match (self.as_const(l), self.as_const(r)) {
            (Some(cl), Some(cr)) => return self.mk_bitvec(cl.ule(&cr)),
            (_, Some(cr)) => {
                if cr.is_zero() {
                    debug!("X <= 0 => X == 0");
                    return self.mk_eq(r, l);
                }
                if cr.is_all_ones() {
                    debug!("X <= ~0 => true");
                    return self.mk_true();
                }
                if let Some(x) = self.zext_source(l) {
                    let max = BitVec::all_ones(self.width(x)).zext(w);
                    if max.ule(&cr).is_true() {
                        debug!("zext X <= c with c at or above range => true");
                        return self.mk_true();
                    }
                }
            }
            (Some(cl), _) => {
                if cl.is_zero() {
                    debug!("0 <= X => true");
                    return self.mk_true();
                }
                if cl.is_all_ones() {
                    debug!("~0 <= X => X == ~0");
                    return self.mk_eq(l, r);
                }
                if let Some(x) = self.zext_source(r) {
                    let max = BitVec::all_ones(self.width(x)).zext(w);
                    if max.ult(&cl).is_true() {
                        debug!("c <= zext X with c above range => false");
                        return self.mk_false();
                    }
                }
            }
            _ => {}
        }
        self.intern(Node::Binary {
            kind: Kind::Ule,
            left: l,
            right: r,
        })
    }

    pub fn mk_slt(&self, l: ExprRef, r: ExprRef) -> ExprRef {
        let w = self.check_same_width(Kind::Slt, l, r);
        if w == BOOL {
            // As signed 1-bit values, true is -1.
            return self.mk_and(l, self.mk_not(r));
        }
        if l == r {
            debug!("X <s X => false");
            return self.mk_false();
        }
        if let (Some(cl), Some(cr)) = (self.as_const(l), self.as_const(r)) {
            return self.mk_bitvec(cl.slt(&cr));
        }
        self.intern(Node::Binary {
            kind: Kind::Slt,
            left: l,
            right: r,
        })
    }

    pub fn mk_sle(&self, l: ExprRef, r: ExprRef) -> ExprRef {
        let w = self.check_same_width(Kind::Sle, l, r);
        if w == BOOL {
            return self.mk_or(l, self.mk_not(r));
        }
        if l == r {
            debug!("X <=s X => true");
            return self.mk_true();
        }
        if let (Some(cl), Some(cr)) = (self.as_const(l), self.as_const(r)) {
            return self.mk_bitvec(cl.sle(&cr));
        }
        self.intern(Node::Binary {
            kind: Kind::Sle,
            left: l,
            right: r,
        })
    }

    pub fn mk_ugt(&self, l: ExprRef, r: ExprRef) -> ExprRef {
        self.mk_ult(r, l)
    }
    pub fn mk_uge(&self, l: ExprRef, r: ExprRef) -> ExprRef {
        self.mk_ule(r, l)
    }
    pub fn mk_sgt(&self, l: ExprRef, r: ExprRef) -> ExprRef {
        self.mk_slt(r, l)
    }
    pub fn mk_sge(&self, l: ExprRef, r: ExprRef) -> ExprRef {
        self.mk_sle(r, l)
    }
}
