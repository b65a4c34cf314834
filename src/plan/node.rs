//! Expression and condition nodes.
//!
//! Every variant must be handled by the renderers in [`crate::render`] - the
//! compiler enforces this through exhaustive matching. The serde layout mirrors
//! the decomposition stage's JSON: value nodes are tagged by `"type"`, condition
//! nodes are told apart by their fields.

use serde::{Deserialize, Deserializer, Serialize};

use super::task::TaskId;

// =============================================================================
// Raw SQL fragments
// =============================================================================

/// A trusted, pre-rendered SQL fragment.
///
/// Column references and GROUP BY entries are emitted verbatim without
/// validation or escaping. Wrapping them in a newtype keeps that trust
/// boundary visible: whoever builds the plan vouches for the fragment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SqlFragment(String);

impl SqlFragment {
    pub fn new(fragment: impl Into<String>) -> Self {
        Self(fragment.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SqlFragment {
    fn from(fragment: &str) -> Self {
        Self::new(fragment)
    }
}

impl From<String> for SqlFragment {
    fn from(fragment: String) -> Self {
        Self(fragment)
    }
}

impl std::fmt::Display for SqlFragment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Literals
// =============================================================================

/// A single literal element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
}

/// The payload of a `LITERAL` node.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LiteralValue {
    #[default]
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    /// Rendered as a parenthesized list: `(v1, v2, ...)`
    List(Vec<Scalar>),
}

impl From<Scalar> for LiteralValue {
    fn from(scalar: Scalar) -> Self {
        match scalar {
            Scalar::Null => LiteralValue::Null,
            Scalar::Bool(b) => LiteralValue::Bool(b),
            Scalar::Number(n) => LiteralValue::Number(n),
            Scalar::String(s) => LiteralValue::String(s),
        }
    }
}

// =============================================================================
// Value nodes
// =============================================================================

/// One `WHEN ... THEN ...` arm of a CASE expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseBranch {
    pub when: ValueNode,
    pub then: ValueNode,
}

/// An expression in value position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ValueNode {
    /// NULL, string, number, boolean or a list of those.
    #[serde(rename = "LITERAL")]
    Literal {
        #[serde(default)]
        value: LiteralValue,
    },

    /// Already-qualified column or raw SQL fragment, passed through verbatim.
    #[serde(rename = "COLUMN")]
    ColumnRef { value: SqlFragment },

    /// Function call: NAME(params...)
    #[serde(rename = "FUNCTION")]
    FunctionCall {
        name: String,
        #[serde(default, deserialize_with = "null_as_default")]
        params: Vec<ValueNode>,
    },

    /// CASE WHEN ... THEN ... ELSE ... END
    #[serde(rename = "CASE")]
    Case {
        #[serde(rename = "cases", default, deserialize_with = "null_as_default")]
        branches: Vec<CaseBranch>,
        #[serde(rename = "else", default, skip_serializing_if = "Option::is_none")]
        otherwise: Option<Box<ValueNode>>,
    },

    /// A condition (boolean logic or arithmetic) used as a value.
    #[serde(rename = "CONDITION")]
    ConditionAsValue {
        #[serde(rename = "value")]
        condition: Box<ConditionNode>,
    },

    /// Free-text value resolved against the database at compile time.
    #[serde(rename = "SEMANTIC")]
    Semantic {
        table: String,
        column: String,
        #[serde(rename = "value")]
        phrase: String,
    },

    /// The compiled output of another task.
    #[serde(rename = "SUBQUERY")]
    SubqueryRef { target_task_id: TaskId },
}

impl ValueNode {
    pub fn null() -> Self {
        ValueNode::Literal {
            value: LiteralValue::Null,
        }
    }

    pub fn literal(value: impl Into<LiteralValue>) -> Self {
        ValueNode::Literal {
            value: value.into(),
        }
    }

    pub fn lit_str(value: impl Into<String>) -> Self {
        ValueNode::Literal {
            value: LiteralValue::String(value.into()),
        }
    }

    pub fn lit_int(value: i64) -> Self {
        ValueNode::Literal {
            value: LiteralValue::Number(value.into()),
        }
    }

    pub fn lit_list(items: Vec<Scalar>) -> Self {
        ValueNode::Literal {
            value: LiteralValue::List(items),
        }
    }

    pub fn column(fragment: impl Into<SqlFragment>) -> Self {
        ValueNode::ColumnRef {
            value: fragment.into(),
        }
    }

    pub fn func(name: impl Into<String>, params: Vec<ValueNode>) -> Self {
        ValueNode::FunctionCall {
            name: name.into(),
            params,
        }
    }

    pub fn case(branches: Vec<CaseBranch>, otherwise: Option<ValueNode>) -> Self {
        ValueNode::Case {
            branches,
            otherwise: otherwise.map(Box::new),
        }
    }

    pub fn condition(condition: ConditionNode) -> Self {
        ValueNode::ConditionAsValue {
            condition: Box::new(condition),
        }
    }

    pub fn semantic(
        table: impl Into<String>,
        column: impl Into<String>,
        phrase: impl Into<String>,
    ) -> Self {
        ValueNode::Semantic {
            table: table.into(),
            column: column.into(),
            phrase: phrase.into(),
        }
    }

    pub fn subquery(target: impl Into<TaskId>) -> Self {
        ValueNode::SubqueryRef {
            target_task_id: target.into(),
        }
    }
}

impl From<&str> for LiteralValue {
    fn from(s: &str) -> Self {
        LiteralValue::String(s.to_string())
    }
}

impl From<i64> for LiteralValue {
    fn from(n: i64) -> Self {
        LiteralValue::Number(n.into())
    }
}

impl From<bool> for LiteralValue {
    fn from(b: bool) -> Self {
        LiteralValue::Bool(b)
    }
}

// =============================================================================
// Condition nodes
// =============================================================================

/// Combinator of a condition branch.
///
/// Anything other than AND/OR is passed through verbatim, which lets function
/// style combinators such as `IFNULL` share the same slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Logic {
    And,
    Or,
    Other(String),
}

impl Logic {
    pub fn as_str(&self) -> &str {
        match self {
            Logic::And => "AND",
            Logic::Or => "OR",
            Logic::Other(keyword) => keyword,
        }
    }
}

impl From<String> for Logic {
    fn from(keyword: String) -> Self {
        match keyword.trim().to_ascii_uppercase().as_str() {
            "AND" => Logic::And,
            "OR" => Logic::Or,
            _ => Logic::Other(keyword),
        }
    }
}

impl From<Logic> for String {
    fn from(logic: Logic) -> Self {
        logic.as_str().to_string()
    }
}

impl std::fmt::Display for Logic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A boolean expression tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionNode {
    /// Children joined by the combinator and wrapped in parentheses.
    Branch {
        logic: Logic,
        #[serde(rename = "conditions", default, deserialize_with = "null_as_default")]
        children: Vec<ConditionNode>,
    },

    /// `left operator right`
    Leaf {
        #[serde(default = "boxed_null", deserialize_with = "null_as_literal")]
        left: Box<ValueNode>,
        operator: String,
        #[serde(default = "boxed_null", deserialize_with = "null_as_literal")]
        right: Box<ValueNode>,
    },
}

impl ConditionNode {
    pub fn leaf(left: ValueNode, operator: impl Into<String>, right: ValueNode) -> Self {
        ConditionNode::Leaf {
            left: Box::new(left),
            operator: operator.into(),
            right: Box::new(right),
        }
    }

    pub fn branch(logic: Logic, children: Vec<ConditionNode>) -> Self {
        ConditionNode::Branch { logic, children }
    }

    pub fn and(children: Vec<ConditionNode>) -> Self {
        Self::branch(Logic::And, children)
    }

    pub fn or(children: Vec<ConditionNode>) -> Self {
        Self::branch(Logic::Or, children)
    }
}

// =============================================================================
// Serde helpers
// =============================================================================

fn boxed_null() -> Box<ValueNode> {
    Box::new(ValueNode::null())
}

/// A JSON `null` operand means the NULL literal.
fn null_as_literal<'de, D>(deserializer: D) -> Result<Box<ValueNode>, D::Error>
where
    D: Deserializer<'de>,
{
    let node = Option::<ValueNode>::deserialize(deserializer)?;
    Ok(Box::new(node.unwrap_or_else(ValueNode::null)))
}

/// A JSON `null` collection is treated as an empty one.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
