//! Expression kinds and bit widths.

use std::fmt;

/// Bit width of an expression. Booleans have width 1.
pub type Width = u32;

pub const BOOL: Width = 1;
pub const INT8: Width = 8;
pub const INT16: Width = 16;
pub const INT32: Width = 32;
pub const INT64: Width = 64;
pub const FL80: Width = 80;

/// Width of array indices.
pub const DOMAIN: Width = INT32;
/// Width of array elements.
pub const RANGE: Width = INT8;

/// The kind tag of an expression node.
///
/// The derived ordering is the ordering used by structural comparison.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Kind {
    Constant,

    // Debug-only wrapper, transparent for hashing.
    NotOptimized,

    // Control markers.
    Let,
    Bind,

    Read,
    Select,
    Concat,
    Extract,

    // Casts
    ZExt,
    SExt,

    // Bitwise negation
    Not,

    // Arithmetic
    Add,
    Sub,
    Mul,
    UDiv,
    SDiv,
    URem,
    SRem,

    // Bitwise
    And,
    Or,
    Xor,
    Shl,
    LShr,
    AShr,

    // Comparisons
    Eq,
    Ne,
    Ult,
    Ule,
    Ugt,
    Uge,
    Slt,
    Sle,
    Sgt,
    Sge,
}

impl Kind {
    /// Kinds that are never stored in a node: they are rewritten into
    /// `Not(Eq(..))` or into their operand-swapped counterparts.
    pub fn is_derived(self) -> bool {
        matches!(self, Kind::Ne | Kind::Ugt | Kind::Uge | Kind::Sgt | Kind::Sge)
    }

    /// Arithmetic and bitwise kinds taking two operands of the same width.
    pub fn is_binary(self) -> bool {
        matches!(
            self,
            Kind::Add
                | Kind::Sub
                | Kind::Mul
                | Kind::UDiv
                | Kind::SDiv
                | Kind::URem
                | Kind::SRem
                | Kind::And
                | Kind::Or
                | Kind::Xor
                | Kind::Shl
                | Kind::LShr
                | Kind::AShr
        )
    }

    /// Comparison kinds; their result is boolean.
    pub fn is_compare(self) -> bool {
        matches!(
            self,
            Kind::Eq
                | Kind::Ne
                | Kind::Ult
                | Kind::Ule
                | Kind::Ugt
                | Kind::Uge
                | Kind::Slt
                | Kind::Sle
                | Kind::Sgt
                | Kind::Sge
        )
    }

    pub fn is_cast(self) -> bool {
        matches!(self, Kind::ZExt | Kind::SExt)
    }

    /// Kinds for which `f(a, b) = f(b, a)`.
    pub fn is_commutative(self) -> bool {
        matches!(
            self,
            Kind::Add | Kind::Mul | Kind::And | Kind::Or | Kind::Xor | Kind::Eq | Kind::Ne
        )
    }

    /// Division and remainder kinds.
    pub fn is_division(self) -> bool {
        matches!(self, Kind::UDiv | Kind::SDiv | Kind::URem | Kind::SRem)
    }

    /// Lower-case mnemonic used by the printer.
    pub fn name(self) -> &'static str {
        match self {
            Kind::Constant => "const",
            Kind::NotOptimized => "not-optimized",
            Kind::Let => "let",
            Kind::Bind => "bind",
            Kind::Read => "read",
            Kind::Select => "select",
            Kind::Concat => "concat",
            Kind::Extract => "extract",
            Kind::ZExt => "zext",
            Kind::SExt => "sext",
            Kind::Not => "not",
            Kind::Add => "add",
            Kind::Sub => "sub",
            Kind::Mul => "mul",
            Kind::UDiv => "udiv",
            Kind::SDiv => "sdiv",
            Kind::URem => "urem",
            Kind::SRem => "srem",
            Kind::And => "and",
            Kind::Or => "or",
            Kind::Xor => "xor",
            Kind::Shl => "shl",
            Kind::LShr => "lshr",
            Kind::AShr => "ashr",
            Kind::Eq => "eq",
            Kind::Ne => "ne",
            Kind::Ult => "ult",
            Kind::Ule => "ule",
            Kind::Ugt => "ugt",
            Kind::Uge => "uge",
            Kind::Slt => "slt",
            Kind::Sle => "sle",
            Kind::Sgt => "sgt",
            Kind::Sge => "sge",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn test_classification() {
        assert!(Kind::Add.is_binary());
        assert!(!Kind::Add.is_compare());
        assert!(Kind::Ule.is_compare());
        assert!(Kind::Sge.is_derived());
        assert!(!Kind::Slt.is_derived());
        assert!(Kind::ZExt.is_cast());
        assert!(Kind::Xor.is_commutative());
        assert!(!Kind::Sub.is_commutative());
        assert!(Kind::SRem.is_division());
    }

    #[test]
    fn test_display() {
        assert_eq!(Kind::LShr.to_string(), "lshr");
        assert_eq!(format!("{}", Kind::Concat), "concat");
    }

    #[test]
    fn test_order() {
        assert!(Kind::Constant < Kind::Read);
        assert!(Kind::Add < Kind::Eq);
    }
}
