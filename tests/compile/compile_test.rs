//! Integration tests for the end-to-end plan → SQL compilation pipeline.

use plan2sql::compile::{
    compile, compile_task, try_compile, CompileError, CompileOptions, CompileWarning,
};
use plan2sql::plan::{
    CaseBranch, ConditionNode, OrderItem, Plan, SelectItem, StructuralLogicItem, Task, TaskId,
    ValueNode,
};
use plan2sql::resolver::{NoopResolver, StaticResolver};
use sqlparser::dialect::SQLiteDialect;
use sqlparser::parser::Parser;

fn options() -> CompileOptions {
    CompileOptions::default()
}

fn assert_valid_sql(sql: &str) {
    if let Err(e) = Parser::parse_sql(&SQLiteDialect {}, sql) {
        panic!("Invalid SQL: {}\nSQL: {}", e, sql);
    }
}

// ============================================================================
// Basic Compilation Tests
// ============================================================================

#[test]
fn test_semantic_filter_scenario() {
    let plan = Plan::new(vec![Task::new(1)
        .from_table("clients as c")
        .select(vec![ValueNode::column("c.name")])
        .filter(ConditionNode::leaf(
            ValueNode::column("c.gender"),
            "=",
            ValueNode::semantic("clients", "gender", "female"),
        ))])
    .unwrap();
    let resolver = StaticResolver::new().with_match("clients", "gender", "female", &["F"]);

    let output = compile(&plan, &resolver, &options());
    assert_eq!(output.root, Some(TaskId(1)));
    assert!(output.warnings.is_empty());
    insta::assert_snapshot!(output.sql, @r#"
    SELECT c.name
    FROM "clients" as c
    WHERE (c.gender = 'F')
    "#);
}

#[test]
fn test_base_query_has_no_set_operation_wrapping() {
    let plan = Plan::new(vec![Task::new(1)
        .from_table("district")
        .select(vec![ValueNode::column("district.A2")])])
    .unwrap();

    let output = compile(&plan, &NoopResolver, &options());
    assert_eq!(output.sql, "SELECT district.A2\nFROM \"district\"");
    assert!(!output.sql.contains("UNION"));
    assert!(!output.sql.starts_with('('));
}

#[test]
fn test_scalar_subquery_in_where() {
    // Accounts whose loan amount is above the average loan amount
    let plan = Plan::from_json(
        r#"
        {"tasks": [
          {"task_id": 1, "main_table": "loan",
           "target": [{"value": {"type": "FUNCTION", "name": "avg", "params": [{"type": "COLUMN", "value": "loan.amount"}]}}]},
          {"task_id": 2, "main_table": "loan as l",
           "target": [{"value": {"type": "COLUMN", "value": "l.account_id"}}],
           "where_clause": {
             "left": {"type": "COLUMN", "value": "l.amount"},
             "operator": ">",
             "right": {"type": "SUBQUERY", "target_task_id": 1}
           },
           "order_by": [{"value": {"type": "COLUMN", "value": "l.amount"}, "direction": "DESC"}],
           "limit_by": 3}
        ]}
        "#,
    )
    .unwrap();

    let output = compile(&plan, &NoopResolver, &options());
    assert_eq!(output.root, Some(TaskId(2)));
    insta::assert_snapshot!(output.sql, @r#"
    SELECT l.account_id
    FROM "loan" as l
    WHERE (l.amount > (SELECT AVG(loan.amount)
    FROM "loan"))
    ORDER BY l.amount DESC
    LIMIT 3
    "#);
}

#[test]
fn test_joins_case_and_grouping() {
    let status_case = ValueNode::case(
        vec![CaseBranch {
            when: ValueNode::condition(ConditionNode::leaf(
                ValueNode::column("l.status"),
                "=",
                ValueNode::lit_str("D"),
            )),
            then: ValueNode::lit_int(1),
        }],
        Some(ValueNode::lit_int(0)),
    );
    let task = Task::new(1)
        .from_table("district as d")
        .select(vec![
            SelectItem::new(ValueNode::column("d.A2")),
            SelectItem::new(ValueNode::func("sum", vec![status_case])).with_alias("defaults"),
        ])
        .with_logic(StructuralLogicItem::join(
            "INNER JOIN",
            "account as a",
            ConditionNode::leaf(
                ValueNode::column("a.district_id"),
                "=",
                ValueNode::column("d.district_id"),
            ),
        ))
        .with_logic(StructuralLogicItem::join(
            "INNER JOIN",
            "loan as l",
            ConditionNode::leaf(
                ValueNode::column("l.account_id"),
                "=",
                ValueNode::column("a.account_id"),
            ),
        ))
        .group_by(vec!["d.A2"])
        .having(ConditionNode::leaf(
            ValueNode::column("defaults"),
            ">",
            ValueNode::lit_int(0),
        ))
        .order_by(vec![OrderItem::desc(ValueNode::column("defaults"))]);
    let plan = Plan::new(vec![task]).unwrap();

    let output = compile(&plan, &NoopResolver, &options());
    insta::assert_snapshot!(output.sql, @r#"
    SELECT d.A2, SUM(CASE WHEN (l.status = 'D') THEN 1 ELSE 0 END) AS defaults
    FROM "district" as d
    INNER JOIN "account" as a ON (a.district_id = d.district_id)
    INNER JOIN "loan" as l ON (l.account_id = a.account_id)
    GROUP BY d.A2
    HAVING (defaults > 0)
    ORDER BY defaults DESC
    "#);
}

#[test]
fn test_subquery_recompiled_per_reference() {
    let plan = Plan::new(vec![
        Task::new(1)
            .from_table("loan")
            .select(vec![ValueNode::func("max", vec![ValueNode::column("loan.amount")])]),
        Task::new(2).from_table("loan as l").filter(ConditionNode::or(vec![
            ConditionNode::leaf(ValueNode::column("l.amount"), "=", ValueNode::subquery(1)),
            ConditionNode::leaf(ValueNode::column("l.payments"), "<", ValueNode::subquery(1)),
        ])),
    ])
    .unwrap();

    let output = compile(&plan, &NoopResolver, &options());
    assert_eq!(output.sql.matches("SELECT MAX(loan.amount)").count(), 2);
    assert!(output.sql.starts_with("SELECT *\nFROM \"loan\" as l\nWHERE ((l.amount = (SELECT"));
}

// ============================================================================
// Error Handling Tests
// ============================================================================

#[test]
fn test_missing_subquery_task_degrades_inline() {
    let plan = Plan::new(vec![Task::new(1)
        .from_table("client as c")
        .filter(ConditionNode::leaf(
            ValueNode::column("c.client_id"),
            "IN",
            ValueNode::subquery(42),
        ))
        .limit(3)])
    .unwrap();

    let output = compile(&plan, &NoopResolver, &options());
    insta::assert_snapshot!(output.sql, @r#"
    SELECT *
    FROM "client" as c
    WHERE (c.client_id IN (-- Error: Task 42 not found
    SELECT NULL))
    LIMIT 3
    "#);
    assert_valid_sql(&output.sql);
    assert_eq!(
        output.warnings,
        vec![CompileWarning::MissingTask {
            task: TaskId(42),
            referenced_from: Some(TaskId(1)),
        }]
    );

    let err = try_compile(&plan, &NoopResolver, &options()).unwrap_err();
    assert_eq!(err, CompileError::TaskNotFound(TaskId(42)));
}

#[test]
fn test_self_reference_is_a_cycle() {
    let plan = Plan::new(vec![Task::new(1)
        .from_table("client")
        .select(vec![ValueNode::subquery(1)])])
    .unwrap();

    let output = compile(&plan, &NoopResolver, &options());
    assert!(output.is_diagnostic());
    assert_eq!(output.sql, "-- Error: Cyclic task reference: 1 -> 1");

    assert_eq!(
        try_compile(&plan, &NoopResolver, &options()).unwrap_err(),
        CompileError::CyclicReference {
            path: vec![TaskId(1), TaskId(1)]
        }
    );
}

#[test]
fn test_compile_non_root_task() {
    let plan = Plan::new(vec![
        Task::new(1)
            .from_table("card")
            .with_logic(StructuralLogicItem::set_op(
                plan2sql::plan::SetOpKind::Union,
                2,
            )),
        Task::new(2).from_table("disp"),
    ])
    .unwrap();

    let output = compile_task(&plan, TaskId(2), &NoopResolver, &options());
    assert_eq!(output.sql, "SELECT *\nFROM \"disp\"");
    assert_eq!(output.root, Some(TaskId(2)));
}

#[test]
fn test_compilation_does_not_mutate_plan() {
    let plan = Plan::new(vec![Task::new(1)
        .from_table("client as c")
        .filter(ConditionNode::leaf(
            ValueNode::column("c.gender"),
            "=",
            ValueNode::semantic("client", "gender", "female"),
        ))])
    .unwrap();
    let before = plan.clone();

    let first = compile(&plan, &NoopResolver, &options());
    let second = compile(&plan, &NoopResolver, &options());
    assert_eq!(plan, before);
    assert_eq!(first, second);
}
