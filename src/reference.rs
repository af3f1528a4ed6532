//! Lightweight handles into the [`ExprBuilder`][crate::builder::ExprBuilder] arenas.
//!
//! Handles are plain indices. Because every expression is hash-consed,
//! two handles are equal if and only if the expressions they denote are
//! structurally equal.

use std::fmt::{Display, Formatter};

/// Handle to an interned expression node.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ExprRef(u32);

impl ExprRef {
    pub(crate) const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Return the index of the node in the expression table.
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl Display for ExprRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "e@{}", self.0)
    }
}

/// Handle to a registered symbolic array.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ArrayRef(u32);

impl ArrayRef {
    pub(crate) const fn new(index: u32) -> Self {
        Self(index)
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl Display for ArrayRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "a@{}", self.0)
    }
}

/// Handle to an interned update-log node.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct UpdateRef(u32);

impl UpdateRef {
    pub(crate) const fn new(index: u32) -> Self {
        Self(index)
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl Display for UpdateRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "u@{}", self.0)
    }
}
