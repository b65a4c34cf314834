//! Query plan types.
//!
//! A [`Plan`] is the tree-shaped intermediate representation produced by the
//! decomposition stage: an ordered set of [`Task`]s, each one SQL query unit,
//! referencing each other through set operations and subquery values.
//!
//! Plans are immutable once built; compilation only reads them.

mod load;
mod node;
mod task;

pub use load::{PlanError, PlanResult};
pub use node::{CaseBranch, ConditionNode, LiteralValue, Logic, Scalar, SqlFragment, ValueNode};
pub use task::{OrderItem, SelectItem, SetOpKind, SortDir, StructuralLogicItem, Task, TaskId};

use std::collections::HashMap;

/// An ordered collection of tasks keyed by unique id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Plan {
    /// Tasks in declaration order
    tasks: Vec<Task>,

    /// Index: task id → position in `tasks`
    index: HashMap<TaskId, usize>,
}

impl Plan {
    /// Build a plan, rejecting duplicate task ids.
    pub fn new(tasks: Vec<Task>) -> PlanResult<Self> {
        let mut index = HashMap::with_capacity(tasks.len());
        for (position, task) in tasks.iter().enumerate() {
            if index.insert(task.id, position).is_some() {
                return Err(PlanError::DuplicateTask(task.id));
            }
        }
        Ok(Self { tasks, index })
    }

    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.index.get(&id).map(|&position| &self.tasks[position])
    }

    pub fn contains(&self, id: TaskId) -> bool {
        self.index.contains_key(&id)
    }

    /// Tasks in declaration order.
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Task ids in declaration order.
    pub fn ids(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.tasks.iter().map(|task| task.id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Fail on the first task the decomposition stage marked as not achievable.
    ///
    /// The compiler itself assumes every task is achievable; callers run this
    /// first and surface the reason instead of compiling.
    pub fn check_achievable(&self) -> PlanResult<()> {
        match self.tasks.iter().find(|task| !task.achievable) {
            Some(task) => Err(PlanError::Unachievable {
                task: task.id,
                reason: task
                    .error
                    .clone()
                    .unwrap_or_else(|| "no reason given".to_string()),
            }),
            None => Ok(()),
        }
    }
}
