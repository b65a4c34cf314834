//! Tasks and structural logic.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::node::{null_as_default, ConditionNode, SqlFragment, ValueNode};

// =============================================================================
// Task ids
// =============================================================================

/// Identifier of a task, unique within a plan.
///
/// Deserializes from an integer or a numeric string (`2` or `"2"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(pub u32);

impl From<u32> for TaskId {
    fn from(id: u32) -> Self {
        TaskId(id)
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for TaskId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.0)
    }
}

impl<'de> Deserialize<'de> for TaskId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Int(u32),
            Text(String),
        }

        match RawId::deserialize(deserializer)? {
            RawId::Int(id) => Ok(TaskId(id)),
            RawId::Text(text) => text.trim().parse().map(TaskId).map_err(|_| {
                serde::de::Error::custom(format!("invalid task id: {:?}", text))
            }),
        }
    }
}

// =============================================================================
// Select / order items
// =============================================================================

/// A SELECT list item: value with optional alias.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectItem {
    pub value: ValueNode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

impl SelectItem {
    pub fn new(value: ValueNode) -> Self {
        Self { value, alias: None }
    }

    pub fn with_alias(mut self, alias: &str) -> Self {
        self.alias = Some(alias.into());
        self
    }
}

impl From<ValueNode> for SelectItem {
    fn from(value: ValueNode) -> Self {
        SelectItem::new(value)
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SortDir {
    #[default]
    Asc,
    Desc,
}

impl SortDir {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDir::Asc => "ASC",
            SortDir::Desc => "DESC",
        }
    }
}

impl TryFrom<String> for SortDir {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_uppercase().as_str() {
            "" | "ASC" => Ok(SortDir::Asc),
            "DESC" => Ok(SortDir::Desc),
            _ => Err(format!("unknown sort direction: {:?}", value)),
        }
    }
}

impl From<SortDir> for String {
    fn from(dir: SortDir) -> Self {
        dir.as_str().to_string()
    }
}

/// An ORDER BY item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub value: ValueNode,
    #[serde(default, deserialize_with = "null_as_default")]
    pub direction: SortDir,
}

impl OrderItem {
    pub fn asc(value: ValueNode) -> Self {
        Self {
            value,
            direction: SortDir::Asc,
        }
    }

    pub fn desc(value: ValueNode) -> Self {
        Self {
            value,
            direction: SortDir::Desc,
        }
    }
}

// =============================================================================
// Structural logic
// =============================================================================

/// Set operation combining two task queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOpKind {
    Union,
    Intersect,
    Except,
}

impl SetOpKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SetOpKind::Union => "UNION",
            SetOpKind::Intersect => "INTERSECT",
            SetOpKind::Except => "EXCEPT",
        }
    }

    fn parse(keyword: &str) -> Option<Self> {
        match keyword {
            "UNION" => Some(SetOpKind::Union),
            "INTERSECT" => Some(SetOpKind::Intersect),
            "EXCEPT" => Some(SetOpKind::Except),
            _ => None,
        }
    }
}

impl std::fmt::Display for SetOpKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A join or set operation, in declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawStructuralItem", into = "RawStructuralItem")]
pub enum StructuralLogicItem {
    /// `<kind> <table> ON <condition>`; `kind` is emitted verbatim (`INNER JOIN`, `LEFT JOIN`, ...).
    Join {
        kind: String,
        table: String,
        condition: ConditionNode,
    },
    SetOp {
        kind: SetOpKind,
        target_task_id: TaskId,
    },
}

impl StructuralLogicItem {
    pub fn join(kind: &str, table: &str, condition: ConditionNode) -> Self {
        StructuralLogicItem::Join {
            kind: kind.into(),
            table: table.into(),
            condition,
        }
    }

    pub fn set_op(kind: SetOpKind, target: impl Into<TaskId>) -> Self {
        StructuralLogicItem::SetOp {
            kind,
            target_task_id: target.into(),
        }
    }
}

/// Wire shape of a structural item: `{"type": ..., "table": ..., "condition": ..., "target_task_id": ...}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawStructuralItem {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    table: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    condition: Option<ConditionNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    target_task_id: Option<TaskId>,
}

impl TryFrom<RawStructuralItem> for StructuralLogicItem {
    type Error = String;

    fn try_from(raw: RawStructuralItem) -> Result<Self, Self::Error> {
        let keyword = raw.kind.trim().to_ascii_uppercase();

        if keyword.contains("JOIN") {
            let table = raw
                .table
                .ok_or_else(|| format!("{} is missing its table", raw.kind))?;
            let condition = raw
                .condition
                .ok_or_else(|| format!("{} {} is missing its condition", raw.kind, table))?;
            return Ok(StructuralLogicItem::Join {
                kind: raw.kind,
                table,
                condition,
            });
        }

        match SetOpKind::parse(&keyword) {
            Some(kind) => {
                let target_task_id = raw
                    .target_task_id
                    .ok_or_else(|| format!("{} is missing target_task_id", keyword))?;
                Ok(StructuralLogicItem::SetOp {
                    kind,
                    target_task_id,
                })
            }
            None => Err(format!("unknown structural logic type: {:?}", raw.kind)),
        }
    }
}

impl From<StructuralLogicItem> for RawStructuralItem {
    fn from(item: StructuralLogicItem) -> Self {
        match item {
            StructuralLogicItem::Join {
                kind,
                table,
                condition,
            } => RawStructuralItem {
                kind,
                table: Some(table),
                condition: Some(condition),
                target_task_id: None,
            },
            StructuralLogicItem::SetOp {
                kind,
                target_task_id,
            } => RawStructuralItem {
                kind: kind.as_str().to_string(),
                table: None,
                condition: None,
                target_task_id: Some(target_task_id),
            },
        }
    }
}

// =============================================================================
// Task
// =============================================================================

/// One SQL query unit within a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    #[serde(rename = "task_id")]
    pub id: TaskId,

    /// When false, `error` explains why and the task must not be compiled.
    #[serde(rename = "is_achievable", default = "default_true")]
    pub achievable: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// `name` or `name as alias`; absent for pure subquery wrappers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_table: Option<String>,

    #[serde(rename = "is_distinct", default, deserialize_with = "null_as_default")]
    pub distinct: bool,

    #[serde(rename = "target", default, deserialize_with = "null_as_default")]
    pub targets: Vec<SelectItem>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub structural_logic: Vec<StructuralLogicItem>,

    #[serde(
        rename = "where_clause",
        default,
        deserialize_with = "optional_condition",
        skip_serializing_if = "Option::is_none"
    )]
    pub where_clause: Option<ConditionNode>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub group_by: Vec<SqlFragment>,

    #[serde(
        rename = "having_clause",
        default,
        deserialize_with = "optional_condition",
        skip_serializing_if = "Option::is_none"
    )]
    pub having: Option<ConditionNode>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub order_by: Vec<OrderItem>,

    #[serde(rename = "limit_by", default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
}

impl Task {
    pub fn new(id: impl Into<TaskId>) -> Self {
        Self {
            id: id.into(),
            achievable: true,
            error: None,
            main_table: None,
            distinct: false,
            targets: Vec::new(),
            structural_logic: Vec::new(),
            where_clause: None,
            group_by: Vec::new(),
            having: None,
            order_by: Vec::new(),
            limit: None,
        }
    }

    pub fn from_table(mut self, table: &str) -> Self {
        self.main_table = Some(table.into());
        self
    }

    pub fn select(mut self, items: Vec<impl Into<SelectItem>>) -> Self {
        self.targets = items.into_iter().map(Into::into).collect();
        self
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    pub fn with_logic(mut self, item: StructuralLogicItem) -> Self {
        self.structural_logic.push(item);
        self
    }

    pub fn filter(mut self, condition: ConditionNode) -> Self {
        self.where_clause = Some(condition);
        self
    }

    pub fn group_by(mut self, columns: Vec<&str>) -> Self {
        self.group_by = columns.into_iter().map(SqlFragment::from).collect();
        self
    }

    pub fn having(mut self, condition: ConditionNode) -> Self {
        self.having = Some(condition);
        self
    }

    pub fn order_by(mut self, items: Vec<OrderItem>) -> Self {
        self.order_by = items;
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn unachievable(mut self, reason: &str) -> Self {
        self.achievable = false;
        self.error = Some(reason.into());
        self
    }

    /// Joins in declaration order.
    pub fn joins(&self) -> impl Iterator<Item = (&str, &str, &ConditionNode)> {
        self.structural_logic.iter().filter_map(|item| match item {
            StructuralLogicItem::Join {
                kind,
                table,
                condition,
            } => Some((kind.as_str(), table.as_str(), condition)),
            StructuralLogicItem::SetOp { .. } => None,
        })
    }

    /// Set operations in declaration order.
    pub fn set_operations(&self) -> impl Iterator<Item = (SetOpKind, TaskId)> + '_ {
        self.structural_logic.iter().filter_map(|item| match item {
            StructuralLogicItem::SetOp {
                kind,
                target_task_id,
            } => Some((*kind, *target_task_id)),
            StructuralLogicItem::Join { .. } => None,
        })
    }
}

fn default_true() -> bool {
    true
}

/// `null` and `{}` both mean "no condition".
fn optional_condition<'de, D>(deserializer: D) -> Result<Option<ConditionNode>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    match raw {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::Object(map)) if map.is_empty() => Ok(None),
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}
