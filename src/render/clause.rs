//! Base query assembly for a single task.
//!
//! Non-empty clauses are newline-joined in a fixed order:
//! SELECT, FROM, JOIN(s), WHERE, GROUP BY, HAVING, ORDER BY, LIMIT.

use crate::compile::{CompileResult, TaskCompiler};
use crate::plan::{ConditionNode, OrderItem, SqlFragment, Task};

/// Double-quote the table name of a `name [as alias]` reference.
///
/// Only the first token is quoted, and only when not already quoted; the
/// remaining tokens pass through unchanged.
pub fn quote_table_ref(table_ref: &str) -> String {
    let mut tokens = table_ref.split_whitespace();
    let Some(name) = tokens.next() else {
        return String::new();
    };

    let name = if name.starts_with('"') {
        name.to_string()
    } else {
        format!("\"{}\"", name)
    };
    let rest: Vec<&str> = tokens.collect();
    if rest.is_empty() {
        name
    } else {
        format!("{} {}", name, rest.join(" "))
    }
}

impl TaskCompiler<'_> {
    pub(crate) fn build_base_query(&mut self, task: &Task) -> CompileResult<String> {
        let clauses = [
            Some(self.build_select(task)?),
            build_from(task.main_table.as_deref()),
            self.build_joins(task)?,
            self.build_condition_clause("WHERE", task.where_clause.as_ref())?,
            build_group_by(&task.group_by),
            self.build_condition_clause("HAVING", task.having.as_ref())?,
            self.build_order_by(&task.order_by)?,
            build_limit(task.limit),
        ];

        Ok(clauses.into_iter().flatten().collect::<Vec<_>>().join("\n"))
    }

    fn build_select(&mut self, task: &Task) -> CompileResult<String> {
        if task.targets.is_empty() {
            return Ok("SELECT *".to_string());
        }

        let mut columns = Vec::with_capacity(task.targets.len());
        for item in &task.targets {
            let value = self.render_value(&item.value, "")?;
            match item.alias.as_deref().filter(|alias| !alias.is_empty()) {
                Some(alias) => columns.push(format!("{} AS {}", value, alias)),
                None => columns.push(value),
            }
        }

        let keyword = if task.distinct {
            "SELECT DISTINCT"
        } else {
            "SELECT"
        };
        Ok(format!("{} {}", keyword, columns.join(", ")))
    }

    fn build_joins(&mut self, task: &Task) -> CompileResult<Option<String>> {
        let mut joins = Vec::new();
        for (kind, table, condition) in task.joins() {
            let condition = self.render_condition(condition)?;
            joins.push(format!("{} {} ON {}", kind, quote_table_ref(table), condition));
        }
        Ok((!joins.is_empty()).then(|| joins.join("\n")))
    }

    fn build_condition_clause(
        &mut self,
        keyword: &str,
        condition: Option<&ConditionNode>,
    ) -> CompileResult<Option<String>> {
        match condition {
            Some(node) => Ok(Some(format!("{} {}", keyword, self.render_condition(node)?))),
            None => Ok(None),
        }
    }

    fn build_order_by(&mut self, items: &[OrderItem]) -> CompileResult<Option<String>> {
        if items.is_empty() {
            return Ok(None);
        }

        let mut parts = Vec::with_capacity(items.len());
        for item in items {
            let value = self.render_value(&item.value, "")?;
            parts.push(format!("{} {}", value, item.direction.as_str()));
        }
        Ok(Some(format!("ORDER BY {}", parts.join(", "))))
    }
}

fn build_from(main_table: Option<&str>) -> Option<String> {
    main_table
        .filter(|table| !table.trim().is_empty())
        .map(|table| format!("FROM {}", quote_table_ref(table)))
}

fn build_group_by(columns: &[SqlFragment]) -> Option<String> {
    if columns.is_empty() {
        return None;
    }
    let columns: Vec<&str> = columns.iter().map(SqlFragment::as_str).collect();
    Some(format!("GROUP BY {}", columns.join(", ")))
}

fn build_limit(limit: Option<u64>) -> Option<String> {
    limit.filter(|&n| n > 0).map(|n| format!("LIMIT {}", n))
}
