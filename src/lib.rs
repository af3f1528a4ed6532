//! # symcore: the expression core of a symbolic executor
//!
//! **`symcore`** provides the data structures a symbolic executor builds its
//! path reasoning on: hash-consed bitvector expressions over symbolic byte
//! arrays, persistent update logs for memory writes, path constraint sets with
//! a simplifier, concrete assignments with an evaluator, and a counterexample
//! cache that answers most solver queries without calling the solver.
//!
//! ## Key Features
//!
//! - **Manager-Centric Architecture**: All expressions live in an
//!   [`ExprBuilder`][crate::builder::ExprBuilder]. Handles are small `Copy`
//!   indices, and structurally equal expressions share one handle.
//! - **Canonical Construction**: Every `mk_*` constructor folds constants,
//!   orders commutative operands and applies a fixed set of rewrites, so
//!   simple identities hold by handle equality.
//! - **Memory as Data**: Arrays are written through [`UpdateLog`][crate::updates::UpdateLog]s,
//!   which share structure between versions.
//! - **Cheap Queries**: [`CexCachingSolver`][crate::cex_cache::CexCachingSolver]
//!   reuses models across queries by subset and superset reasoning.
//!
//! ## Basic Usage
//!
//! ```rust
//! use symcore::array::Array;
//! use symcore::assignment::Assignment;
//! use symcore::builder::ExprBuilder;
//! use symcore::constraints::ConstraintSet;
//! use symcore::updates::UpdateLog;
//!
//! // 1. Initialize the manager
//! let b = ExprBuilder::default();
//!
//! // 2. A symbolic input byte
//! let input = b.mk_array(Array::symbolic("input", 1));
//! let x = b.mk_read(UpdateLog::new(input), b.mk_const(0, 32));
//!
//! // 3. Path constraints: x < 10, then x == 3
//! let mut path = ConstraintSet::default();
//! assert!(path.add_constraint(&b, b.mk_ult(x, b.mk_const(10, 8))));
//! assert!(path.add_constraint(&b, b.mk_eq(b.mk_const(3, 8), x)));
//!
//! // 4. The store now knows x
//! assert_eq!(path.simplify_expr(&b, x), b.mk_const(3, 8));
//!
//! // 5. Evaluate under a concrete input
//! let mut a = Assignment::new(false);
//! a.bind(&b, input, vec![3]);
//! assert!(a.satisfies(&b, path.as_slice()));
//! ```
//!
//! ## Core Components
//!
//! - **[`builder`]** and **[`rules`]**: The expression manager and its canonicalizing constructors.
//! - **[`updates`]** and **[`array`]**: The memory model.
//! - **[`constraints`]**: Path constraint sets.
//! - **[`assignment`]** and **[`eval`]**: Concrete models and evaluation.
//! - **[`solver`]** and **[`cex_cache`]**: The solver port and the counterexample cache.

pub mod array;
pub mod assignment;
pub mod builder;
pub mod cex_cache;
pub mod config;
pub mod constant;
pub mod constraints;
pub mod error;
pub mod eval;
pub mod map_of_sets;
pub mod node;
pub mod print;
pub mod query;
pub mod reference;
pub mod rules;
pub mod solver;
pub mod table;
pub mod types;
pub mod updates;
pub mod utils;
