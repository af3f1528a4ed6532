use crate::constant::BitVec;
use crate::reference::ExprRef;
use crate::types::{Kind, Width};
use crate::updates::UpdateLog;
use crate::utils::MyHash;

/// Payload of an expression node.
///
/// Every variant is a plain value over handles, so two nodes are equal
/// exactly when they have the same kind, the same parameters and the same operands.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum Node {
    Constant(BitVec),
    /// Wrapper that stops the builder from rewriting its operand.
    NotOptimized(ExprRef),
    Read {
        updates: UpdateLog,
        index: ExprRef,
    },
    Select {
        cond: ExprRef,
        then: ExprRef,
        otherwise: ExprRef,
    },
    /// `left` holds the high bits.
    Concat {
        left: ExprRef,
        right: ExprRef,
    },
    Extract {
        expr: ExprRef,
        offset: Width,
        width: Width,
    },
    /// `kind` is either [`Kind::ZExt`] or [`Kind::SExt`].
    Cast {
        kind: Kind,
        expr: ExprRef,
        width: Width,
    },
    Not(ExprRef),
    /// Arithmetic, bitwise and comparison kinds.
    Binary {
        kind: Kind,
        left: ExprRef,
        right: ExprRef,
    },
    Let {
        id: u32,
        bind: ExprRef,
        scope: ExprRef,
    },
    Bind {
        id: u32,
        bind: ExprRef,
    },
}

impl Node {
    pub fn kind(&self) -> Kind {
        match self {
            Node::Constant(_) => Kind::Constant,
            Node::NotOptimized(_) => Kind::NotOptimized,
            Node::Read { .. } => Kind::Read,
            Node::Select { .. } => Kind::Select,
            Node::Concat { .. } => Kind::Concat,
            Node::Extract { .. } => Kind::Extract,
            Node::Cast { kind, .. } => *kind,
            Node::Not(_) => Kind::Not,
            Node::Binary { kind, .. } => *kind,
            Node::Let { .. } => Kind::Let,
            Node::Bind { .. } => Kind::Bind,
        }
    }

    /// Direct expression operands, not including update-log entries of a read.
    pub fn kids(&self) -> Vec<ExprRef> {
        match *self {
            Node::Constant(_) => vec![],
            Node::NotOptimized(e) | Node::Not(e) => vec![e],
            Node::Read { index, .. } => vec![index],
            Node::Select {
                cond,
                then,
                otherwise,
            } => vec![cond, then, otherwise],
            Node::Concat { left, right } | Node::Binary { left, right, .. } => vec![left, right],
            Node::Extract { expr, .. } | Node::Cast { expr, .. } => vec![expr],
            Node::Let { bind, scope, .. } => vec![bind, scope],
            Node::Bind { bind, .. } => vec![bind],
        }
    }
}

/// Entry of the expression table: the node plus cached derived data.
///
/// Equality only looks at the node, the rest is a function of it.
#[derive(Debug, Clone)]
pub struct ExprData {
    pub node: Node,
    pub width: Width,
    pub hash: u64,
    pub skeleton: u64,
}

impl PartialEq for ExprData {
    fn eq(&self, other: &Self) -> bool {
        self.node == other.node
    }
}

impl Eq for ExprData {}

impl MyHash for ExprData {
    fn hash(&self) -> u64 {
        self.hash
    }
}
