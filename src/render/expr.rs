//! Value node rendering.

use crate::compile::{CompileResult, CompileWarning, FallbackReason, TaskCompiler};
use crate::plan::{CaseBranch, LiteralValue, Scalar, ValueNode};
use crate::resolver::{Resolution, ResolveRequest};

/// Single-quote a string, doubling embedded quotes.
pub fn quote_literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// Render a literal value.
///
/// Strings starting with `(`, after leading whitespace, are pre-rendered
/// fragments and pass through.
pub fn format_literal(value: &LiteralValue) -> String {
    match value {
        LiteralValue::Null => "NULL".to_string(),
        LiteralValue::Bool(b) => format_bool(*b),
        LiteralValue::Number(n) => n.to_string(),
        LiteralValue::String(s) if s.trim_start().starts_with('(') => s.clone(),
        LiteralValue::String(s) => quote_literal(s),
        LiteralValue::List(items) => format!(
            "({})",
            items.iter().map(format_scalar).collect::<Vec<_>>().join(", ")
        ),
    }
}

/// Render one element of a literal list. Strings are always quoted.
pub fn format_scalar(value: &Scalar) -> String {
    match value {
        Scalar::Null => "NULL".to_string(),
        Scalar::Bool(b) => format_bool(*b),
        Scalar::Number(n) => n.to_string(),
        Scalar::String(s) => quote_literal(s),
    }
}

fn format_bool(b: bool) -> String {
    let keyword = if b { "TRUE" } else { "FALSE" };
    keyword.to_string()
}

impl TaskCompiler<'_> {
    /// Render a value; `operator` is the enclosing comparison, empty outside one.
    pub(crate) fn render_value(&mut self, node: &ValueNode, operator: &str) -> CompileResult<String> {
        match node {
            ValueNode::Literal { value } => Ok(format_literal(value)),
            ValueNode::ColumnRef { value } => Ok(value.to_string()),
            ValueNode::FunctionCall { name, params } => self.render_function(name, params),
            ValueNode::Case {
                branches,
                otherwise,
            } => self.render_case(branches, otherwise.as_deref()),
            ValueNode::ConditionAsValue { condition } => self.render_condition(condition),
            ValueNode::Semantic {
                table,
                column,
                phrase,
            } => Ok(self.render_semantic(table, column, phrase, operator)),
            ValueNode::SubqueryRef { target_task_id } => {
                Ok(format!("({})", self.compile_task(*target_task_id)?))
            }
        }
    }

    fn render_function(&mut self, name: &str, params: &[ValueNode]) -> CompileResult<String> {
        let name = name.to_uppercase();
        let args = params
            .iter()
            .map(|param| self.render_value(param, ""))
            .collect::<CompileResult<Vec<_>>>()?;

        Ok(match (name.as_str(), args.as_slice()) {
            ("COUNT", []) => "COUNT(*)".to_string(),
            ("CAST", [expr, type_name]) => {
                format!("CAST({} AS {})", expr, type_name.replace(['\'', '"'], ""))
            }
            _ => format!("{}({})", name, args.join(", ")),
        })
    }

    fn render_case(
        &mut self,
        branches: &[CaseBranch],
        otherwise: Option<&ValueNode>,
    ) -> CompileResult<String> {
        let mut parts = Vec::with_capacity(branches.len());
        for branch in branches {
            let when = self.render_value(&branch.when, "")?;
            let then = self.render_value(&branch.then, "")?;
            parts.push(format!("WHEN {} THEN {}", when, then));
        }

        let else_part = match otherwise {
            Some(value) => format!(" ELSE {}", self.render_value(value, "")?),
            None => String::new(),
        };
        Ok(format!("CASE {}{} END", parts.join(" "), else_part))
    }

    /// Resolve a phrase to concrete values, falling back to the quoted phrase.
    fn render_semantic(&mut self, table: &str, column: &str, phrase: &str, operator: &str) -> String {
        let allows_multiple = self.options.is_set_compatible(operator);
        let request = ResolveRequest {
            table,
            column,
            phrase,
            operator,
            allows_multiple,
        };

        tracing::trace!(table, column, phrase, operator, allows_multiple, "resolving semantic value");
        let reason = match self.resolver.resolve(&request) {
            Ok(Resolution::Match { values, confidence }) if !values.is_empty() => {
                tracing::debug!(table, column, phrase, ?values, confidence, "resolved semantic value");
                if allows_multiple && values.len() > 1 {
                    let quoted: Vec<String> = values.iter().map(|v| quote_literal(v)).collect();
                    return format!("({})", quoted.join(", "));
                }
                return quote_literal(&values[0]);
            }
            Ok(_) => FallbackReason::NoMatch,
            Err(err) => {
                tracing::warn!(table, column, phrase, error = %err, "semantic resolver failed");
                FallbackReason::ResolverFailed(err.to_string())
            }
        };

        tracing::debug!(table, column, phrase, "no semantic match, using phrase");
        self.warnings.push(CompileWarning::SemanticFallback {
            table: table.to_string(),
            column: column.to_string(),
            phrase: phrase.to_string(),
            reason,
        });
        quote_literal(phrase)
    }
}
