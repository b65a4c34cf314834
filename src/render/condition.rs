//! Boolean tree rendering.
//!
//! A leaf renders as `(left operator right)`. When the rendered right side is
//! a parenthesized value list, equality operators are rewritten to their set
//! form so a multi-valued semantic match stays valid SQL:
//!
//! ```text
//! c.gender = ('F', 'W')    →  c.gender IN ('F', 'W')
//! c.gender != ('F', 'W')   →  c.gender NOT IN ('F', 'W')
//! c.id = (SELECT ...)      →  unchanged
//! ```

use std::sync::LazyLock;

use regex::Regex;

use crate::compile::{CompileResult, TaskCompiler};
use crate::plan::ConditionNode;

static SUBQUERY_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[\s(]*SELECT\b").expect("valid regex")
});

/// True for rendered text shaped like `('a', 'b')`: parenthesized, comma
/// separated, and not a subquery.
pub fn is_value_list(rendered: &str) -> bool {
    let rendered = rendered.trim();
    rendered.starts_with('(')
        && rendered.ends_with(')')
        && rendered.contains(',')
        && !SUBQUERY_PREFIX.is_match(rendered)
}

/// The operator to emit given the rendered right-hand side.
pub fn rewrite_operator<'a>(operator: &'a str, rendered_right: &str) -> &'a str {
    if !is_value_list(rendered_right) {
        return operator;
    }
    match operator.trim() {
        "=" => "IN",
        "!=" | "<>" => "NOT IN",
        _ => operator,
    }
}

impl TaskCompiler<'_> {
    pub(crate) fn render_condition(&mut self, node: &ConditionNode) -> CompileResult<String> {
        match node {
            ConditionNode::Branch { logic, children } => {
                let rendered = children
                    .iter()
                    .map(|child| self.render_condition(child))
                    .collect::<CompileResult<Vec<_>>>()?;
                Ok(format!("({})", rendered.join(&format!(" {} ", logic))))
            }
            ConditionNode::Leaf {
                left,
                operator,
                right,
            } => {
                let left = self.render_value(left, operator)?;
                let right = self.render_value(right, operator)?;
                let operator = rewrite_operator(operator, &right);
                Ok(format!("({} {} {})", left, operator, right))
            }
        }
    }
}
