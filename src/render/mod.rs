//! SQL text rendering for plan nodes.
//!
//! Three layers, each an `impl` block on the compiler's per-request state:
//!
//! - [`expr`]: value nodes (literals, columns, functions, CASE, semantic values, subqueries)
//! - [`condition`]: boolean trees, including the list-operator rewrite
//! - [`clause`]: the SELECT ... LIMIT assembly of a single task
//!
//! The text-only helpers are re-exported here so they can be used and tested
//! without a plan.

mod clause;
mod condition;
mod expr;

pub use clause::quote_table_ref;
pub use condition::{is_value_list, rewrite_operator};
pub use expr::{format_literal, format_scalar, quote_literal};
