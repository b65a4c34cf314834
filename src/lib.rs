//! # plan2sql
//!
//! Compiles a decomposed query plan into a single SQL statement.
//!
//! ## Architecture
//!
//! A plan is a flat list of tasks. Each task is one SQL query unit and may
//! reference other tasks through set operations or scalar/list subqueries:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                  Plan JSON (tasks)                       │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [plan::load]
//! ┌─────────────────────────────────────────────────────────┐
//! │              Plan (Task, ValueNode, ConditionNode)       │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [graph]
//! ┌─────────────────────────────────────────────────────────┐
//! │        Reference graph → root task, cycle report         │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [compile + render]
//! ┌─────────────────────────────────────────────────────────┐
//! │   Clauses, conditions, values  ◄──  SemanticResolver     │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │                    SQL text                              │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! Free-text filter values (`SEMANTIC` nodes) are resolved to concrete
//! database values by a [`resolver::SemanticResolver`]; [`resolver::IndexResolver`]
//! does this with a trigram similarity index built from a SQLite database.

pub mod compile;
pub mod config;
pub mod graph;
pub mod plan;
pub mod render;
pub mod resolver;


/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::compile::{
        compile, compile_task, try_compile, try_compile_task, CompileError, CompileOptions,
        CompileOutput, CompileWarning, FallbackReason,
    };
    pub use crate::config::Settings;
    pub use crate::graph::{find_root, ReferenceGraph};
    pub use crate::plan::{
        CaseBranch, ConditionNode, LiteralValue, Logic, OrderItem, Plan, PlanError, Scalar,
        SelectItem, SetOpKind, SortDir, SqlFragment, StructuralLogicItem, Task, TaskId, ValueNode,
    };
    pub use crate::resolver::{
        IndexResolver, NoopResolver, Resolution, ResolveRequest, SemanticResolver,
        StaticResolver, ValueIndex,
    };
}

// Also export at crate root for convenience
pub use compile::{compile, try_compile, CompileError, CompileOptions, CompileOutput};
pub use plan::{Plan, Task, TaskId};
pub use resolver::SemanticResolver;
