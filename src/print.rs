//! Textual form of expressions.
//!
//! The format is a parenthesized prefix notation, close to the query language
//! of common symbolic executors:
//!
//! ```text
//! (eq (w8 7) (read (w32 0) input))
//! (ult (add w32 (w32 1) (zext w32 (read (w32 3) [(w32 3)=(w8 9)] @ buf))) (w32 10))
//! ```

use std::fmt;

use crate::builder::ExprBuilder;
use crate::node::Node;
use crate::reference::ExprRef;
use crate::types::{Kind, BOOL};
use crate::updates::UpdateLog;

/// Displays an expression through its builder.
pub struct ExprDisplay<'a> {
    builder: &'a ExprBuilder,
    expr: ExprRef,
}

/// Displays an update log through its builder.
pub struct LogDisplay<'a> {
    builder: &'a ExprBuilder,
    log: UpdateLog,
}

impl ExprBuilder {
    /// Display adaptor for `e`.
    ///
    /// ```
    /// use symcore::builder::ExprBuilder;
    ///
    /// let b = ExprBuilder::default();
    /// let e = b.mk_const(7, 8);
    /// assert_eq!(b.display(e).to_string(), "(w8 7)");
    /// ```
    pub fn display(&self, expr: ExprRef) -> ExprDisplay<'_> {
        ExprDisplay {
            builder: self,
            expr,
        }
    }

    pub fn display_log(&self, log: UpdateLog) -> LogDisplay<'_> {
        LogDisplay { builder: self, log }
    }
}

impl fmt::Display for LogDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = self.builder;
        let entries = b.log_entries(self.log);
        if !entries.is_empty() {
            write!(f, "[")?;
            for (i, (index, value)) in entries.into_iter().enumerate() {
                if i > 0 {
                    write!(f, " ")?;
                }
                write!(f, "{}={}", b.display(index), b.display(value))?;
            }
            write!(f, "] @ ")?;
        }
        write!(f, "{}", b.array(self.log.root()).name())
    }
}

impl fmt::Display for ExprDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = self.builder;
        let e = self.expr;
        let node = b.node(e);
        let kind = node.kind();
        match node {
            Node::Constant(c) if c.width() == BOOL => write!(f, "{}", c),
            Node::Constant(c) => write!(f, "(w{} {})", c.width(), c),
            Node::Read { updates, index } => {
                write!(f, "(read {} {})", b.display(index), b.display_log(updates))
            }
            Node::Extract {
                expr,
                offset,
                width,
            } => write!(f, "(extract {} {} {})", offset, width, b.display(expr)),
            Node::Cast { expr, width, .. } => {
                write!(f, "({} w{} {})", kind, width, b.display(expr))
            }
            Node::Let { id, bind, scope } => {
                write!(f, "(let ?{} {} {})", id, b.display(bind), b.display(scope))
            }
            Node::Bind { id, .. } => write!(f, "?{}", id),
            _ => {
                write!(f, "({}", kind)?;
                if kind.is_binary() || (kind == Kind::Select && b.width(e) != BOOL) {
                    write!(f, " w{}", b.width(e))?;
                }
                for k in node.kids() {
                    write!(f, " {}", b.display(k))?;
                }
                write!(f, ")")
            }
        }
    }
}
