//! End-to-end compilation from a plan to SQL.
//!
//! ```text
//! Plan → find root → compile root task → (recursively) subqueries, set operations → SQL
//! ```
//!
//! Each task becomes a base query (SELECT, FROM, JOINs, WHERE, GROUP BY,
//! HAVING, ORDER BY, LIMIT). Its set operations then fold left to right:
//!
//! ```text
//! ((base) OP1 (t1)) OP2 (t2) ...
//! ```
//!
//! # Failure modes
//!
//! [`compile`] never fails. A reference to a missing task is replaced inline
//! by a `-- Error: ...` comment line and `SELECT NULL`, and compilation
//! carries on; a reference cycle
//! turns the whole output into that diagnostic. Both leave a
//! [`CompileWarning`] or the diagnostic text for the caller to inspect.
//! [`try_compile`] reports the same conditions as a [`CompileError`].
//!
//! # Example
//!
//! ```ignore
//! use plan2sql::compile::{compile, CompileOptions};
//! use plan2sql::plan::Plan;
//! use plan2sql::resolver::NoopResolver;
//!
//! let plan = Plan::from_json(json)?;
//! let output = compile(&plan, &NoopResolver, &CompileOptions::default());
//! println!("{}", output.sql);
//! ```

use crate::config::Settings;
use crate::graph::ReferenceGraph;
use crate::plan::{Plan, Task, TaskId};
use crate::resolver::{self, SemanticResolver};

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur during compilation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompileError {
    #[error("Task {0} not found")]
    TaskNotFound(TaskId),

    #[error("Cyclic task reference: {}", format_path(.path))]
    CyclicReference { path: Vec<TaskId> },

    #[error("No tasks found")]
    EmptyPlan,
}

pub type CompileResult<T> = Result<T, CompileError>;

fn format_path(path: &[TaskId]) -> String {
    path.iter()
        .map(TaskId::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Stands in for a missing task's query so the surrounding SQL stays valid.
const MISSING_TASK_PLACEHOLDER: &str = "SELECT NULL";

/// The inline form of an error: a SQL comment.
pub fn diagnostic(error: &CompileError) -> String {
    match error {
        CompileError::EmptyPlan => "-- No tasks found".to_string(),
        other => format!("-- Error: {}", other),
    }
}

// ============================================================================
// Warnings
// ============================================================================

/// Why a semantic phrase was emitted verbatim.
#[derive(Debug, Clone, PartialEq)]
pub enum FallbackReason {
    NoMatch,
    ResolverFailed(String),
}

/// A recoverable problem met while compiling.
#[derive(Debug, Clone, PartialEq)]
pub enum CompileWarning {
    /// A reference to an unknown task was replaced by a diagnostic comment
    /// followed by `SELECT NULL`.
    MissingTask {
        task: TaskId,
        referenced_from: Option<TaskId>,
    },

    /// A semantic value could not be resolved; the phrase was quoted as-is.
    SemanticFallback {
        table: String,
        column: String,
        phrase: String,
        reason: FallbackReason,
    },
}

// ============================================================================
// Options
// ============================================================================

/// Options for compilation.
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Operators whose right-hand side may hold several resolved values.
    pub set_compatible_operators: Vec<String>,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

impl CompileOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            set_compatible_operators: settings.resolver.set_compatible_operators.clone(),
        }
    }

    /// Set the operators that accept a list of resolved values.
    pub fn with_set_compatible_operators(mut self, operators: &[&str]) -> Self {
        self.set_compatible_operators = operators.iter().map(|op| op.to_string()).collect();
        self
    }

    pub fn is_set_compatible(&self, operator: &str) -> bool {
        resolver::is_set_compatible(operator, &self.set_compatible_operators)
    }
}

// ============================================================================
// Result Types
// ============================================================================

/// Result of compiling a plan.
#[derive(Debug, Clone, PartialEq)]
pub struct CompileOutput {
    /// The generated SQL, or a `-- ...` diagnostic.
    pub sql: String,

    /// The task compilation started from.
    pub root: Option<TaskId>,

    /// Recoverable problems, in the order they were met.
    pub warnings: Vec<CompileWarning>,
}

impl CompileOutput {
    /// True when the whole output is a diagnostic rather than SQL.
    pub fn is_diagnostic(&self) -> bool {
        self.sql.starts_with("--")
    }
}

// ============================================================================
// Compilation Functions
// ============================================================================

/// Compile a plan from its root task.
pub fn compile(
    plan: &Plan,
    resolver: &dyn SemanticResolver,
    options: &CompileOptions,
) -> CompileOutput {
    let Some(root) = ReferenceGraph::build(plan).find_root() else {
        return CompileOutput {
            sql: diagnostic(&CompileError::EmptyPlan),
            root: None,
            warnings: Vec::new(),
        };
    };
    tracing::debug!(%root, tasks = plan.len(), "compiling plan");
    compile_task(plan, root, resolver, options)
}

/// Compile one task (and whatever it references).
pub fn compile_task(
    plan: &Plan,
    task_id: TaskId,
    resolver: &dyn SemanticResolver,
    options: &CompileOptions,
) -> CompileOutput {
    if !plan.contains(task_id) {
        tracing::warn!(task = %task_id, "requested task is not in the plan");
        return CompileOutput {
            sql: diagnostic(&CompileError::TaskNotFound(task_id)),
            root: Some(task_id),
            warnings: vec![CompileWarning::MissingTask {
                task: task_id,
                referenced_from: None,
            }],
        };
    }

    let mut compiler = TaskCompiler::new(plan, resolver, options, false);
    let sql = compiler
        .compile_task(task_id)
        .unwrap_or_else(|err| diagnostic(&err));
    CompileOutput {
        sql,
        root: Some(task_id),
        warnings: compiler.warnings,
    }
}

/// Compile a plan, failing on missing tasks, cycles and empty plans.
pub fn try_compile(
    plan: &Plan,
    resolver: &dyn SemanticResolver,
    options: &CompileOptions,
) -> CompileResult<CompileOutput> {
    let root = ReferenceGraph::build(plan)
        .find_root()
        .ok_or(CompileError::EmptyPlan)?;
    try_compile_task(plan, root, resolver, options)
}

pub fn try_compile_task(
    plan: &Plan,
    task_id: TaskId,
    resolver: &dyn SemanticResolver,
    options: &CompileOptions,
) -> CompileResult<CompileOutput> {
    let mut compiler = TaskCompiler::new(plan, resolver, options, true);
    let sql = compiler.compile_task(task_id)?;
    Ok(CompileOutput {
        sql,
        root: Some(task_id),
        warnings: compiler.warnings,
    })
}

// ============================================================================
// Task Compiler
// ============================================================================

/// Per-request compilation state.
///
/// The renderers in [`crate::render`] extend this type; they call back into
/// [`TaskCompiler::compile_task`] for subquery references.
pub(crate) struct TaskCompiler<'a> {
    pub(crate) plan: &'a Plan,
    pub(crate) resolver: &'a dyn SemanticResolver,
    pub(crate) options: &'a CompileOptions,

    /// Missing tasks are errors instead of inline diagnostics.
    strict: bool,

    /// Tasks currently being compiled, outermost first
    stack: Vec<TaskId>,

    pub(crate) warnings: Vec<CompileWarning>,
}

impl<'a> TaskCompiler<'a> {
    pub(crate) fn new(
        plan: &'a Plan,
        resolver: &'a dyn SemanticResolver,
        options: &'a CompileOptions,
        strict: bool,
    ) -> Self {
        Self {
            plan,
            resolver,
            options,
            strict,
            stack: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub(crate) fn compile_task(&mut self, id: TaskId) -> CompileResult<String> {
        if let Some(start) = self.stack.iter().position(|&active| active == id) {
            let mut path = self.stack[start..].to_vec();
            path.push(id);
            tracing::warn!(task = %id, path = %format_path(&path), "cyclic task reference");
            return Err(CompileError::CyclicReference { path });
        }

        let plan = self.plan;
        let Some(task) = plan.get(id) else {
            return self.missing_task(id);
        };

        tracing::debug!(task = %id, depth = self.stack.len(), "compiling task");
        self.stack.push(id);
        let sql = self.compile_with_set_operations(task);
        self.stack.pop();
        sql
    }

    fn compile_with_set_operations(&mut self, task: &Task) -> CompileResult<String> {
        let mut sql = self.build_base_query(task)?;
        for (kind, target) in task.set_operations() {
            let target_sql = self.compile_task(target)?;
            sql = format!("({}) \n{} \n({})", sql, kind, target_sql);
        }
        Ok(sql)
    }

    fn missing_task(&mut self, id: TaskId) -> CompileResult<String> {
        let error = CompileError::TaskNotFound(id);
        if self.strict {
            return Err(error);
        }

        let referenced_from = self.stack.last().copied();
        tracing::warn!(task = %id, from = ?referenced_from, "reference to missing task");
        self.warnings.push(CompileWarning::MissingTask {
            task: id,
            referenced_from,
        });
        // The comment ends at a newline so an enclosing `)` is not swallowed
        Ok(format!("{}\n{}", diagnostic(&error), MISSING_TASK_PLACEHOLDER))
    }
}
