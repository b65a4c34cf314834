//! Integration tests for UNION / INTERSECT / EXCEPT folding.

use plan2sql::compile::{compile, compile_task, CompileOptions};
use plan2sql::plan::{Plan, SetOpKind, StructuralLogicItem, Task, TaskId, ValueNode};
use plan2sql::resolver::NoopResolver;
use sqlparser::dialect::SQLiteDialect;
use sqlparser::parser::Parser;

fn assert_valid_sql(sql: &str) {
    if let Err(e) = Parser::parse_sql(&SQLiteDialect {}, sql) {
        panic!("Invalid SQL: {}\nSQL: {}", e, sql);
    }
}

fn select(id: u32, table: &str, column: &str) -> Task {
    Task::new(id)
        .from_table(table)
        .select(vec![ValueNode::column(column)])
}

#[test]
fn test_union_scenario() {
    let plan = Plan::new(vec![
        select(1, "clients as c", "c.id")
            .with_logic(StructuralLogicItem::set_op(SetOpKind::Union, 2)),
        select(2, "cards as d", "d.client_id"),
    ])
    .unwrap();

    let output = compile(&plan, &NoopResolver, &CompileOptions::default());
    assert_eq!(output.root, Some(TaskId(1)));
    assert_eq!(
        output.sql,
        "(SELECT c.id\nFROM \"clients\" as c) \nUNION \n(SELECT d.client_id\nFROM \"cards\" as d)"
    );
}

#[test]
fn test_set_operations_fold_left_in_declaration_order() {
    let plan = Plan::new(vec![
        select(1, "a", "a.x")
            .with_logic(StructuralLogicItem::set_op(SetOpKind::Union, 2))
            .with_logic(StructuralLogicItem::set_op(SetOpKind::Intersect, 3))
            .with_logic(StructuralLogicItem::set_op(SetOpKind::Except, 4)),
        select(2, "b", "b.x"),
        select(3, "c", "c.x"),
        select(4, "d", "d.x"),
    ])
    .unwrap();

    let output = compile(&plan, &NoopResolver, &CompileOptions::default());
    let a = "SELECT a.x\nFROM \"a\"";
    let b = "SELECT b.x\nFROM \"b\"";
    let c = "SELECT c.x\nFROM \"c\"";
    let d = "SELECT d.x\nFROM \"d\"";
    let expected = format!(
        "((({a}) \nUNION \n({b})) \nINTERSECT \n({c})) \nEXCEPT \n({d})",
        a = a,
        b = b,
        c = c,
        d = d
    );
    assert_eq!(output.sql, expected);
}

#[test]
fn test_joins_stay_in_base_query_when_mixed_with_set_operations() {
    let join = StructuralLogicItem::join(
        "LEFT JOIN",
        "disp as p",
        plan2sql::plan::ConditionNode::leaf(
            ValueNode::column("p.client_id"),
            "=",
            ValueNode::column("c.client_id"),
        ),
    );
    let plan = Plan::new(vec![
        select(1, "client as c", "c.client_id")
            .with_logic(StructuralLogicItem::set_op(SetOpKind::Except, 2))
            .with_logic(join),
        select(2, "card as k", "k.disp_id"),
    ])
    .unwrap();

    let output = compile(&plan, &NoopResolver, &CompileOptions::default());
    assert_eq!(
        output.sql,
        "(SELECT c.client_id\nFROM \"client\" as c\nLEFT JOIN \"disp\" as p ON (p.client_id = c.client_id)) \nEXCEPT \n(SELECT k.disp_id\nFROM \"card\" as k)"
    );
}

#[test]
fn test_nested_set_operations() {
    // 2 is itself a union; its folded SQL becomes the right operand of 1
    let plan = Plan::new(vec![
        select(1, "a", "a.x").with_logic(StructuralLogicItem::set_op(SetOpKind::Union, 2)),
        select(2, "b", "b.x").with_logic(StructuralLogicItem::set_op(SetOpKind::Union, 3)),
        select(3, "c", "c.x"),
    ])
    .unwrap();

    let output = compile(&plan, &NoopResolver, &CompileOptions::default());
    assert_eq!(
        output.sql,
        "(SELECT a.x\nFROM \"a\") \nUNION \n((SELECT b.x\nFROM \"b\") \nUNION \n(SELECT c.x\nFROM \"c\"))"
    );
}

#[test]
fn test_missing_set_operation_target() {
    let plan = Plan::new(vec![
        select(1, "a", "a.x").with_logic(StructuralLogicItem::set_op(SetOpKind::Union, 5))
    ])
    .unwrap();

    let output = compile_task(&plan, TaskId(1), &NoopResolver, &CompileOptions::default());
    assert_eq!(
        output.sql,
        "(SELECT a.x\nFROM \"a\") \nUNION \n(-- Error: Task 5 not found\nSELECT NULL)"
    );
    assert_valid_sql(&output.sql);
    assert_eq!(output.warnings.len(), 1);
}
