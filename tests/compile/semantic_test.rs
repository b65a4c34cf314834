//! Integration tests for semantic value resolution inside compiled SQL.

use plan2sql::compile::{compile, CompileOptions, CompileWarning, FallbackReason};
use plan2sql::plan::{ConditionNode, Plan, Task, ValueNode};
use plan2sql::resolver::{
    NoopResolver, Resolution, ResolveRequest, ResolverError, ResolverResult, SemanticResolver,
    StaticResolver,
};

fn region_filter(operator: &str) -> Plan {
    Plan::new(vec![Task::new(1)
        .from_table("district as d")
        .select(vec![ValueNode::column("d.A2")])
        .filter(ConditionNode::leaf(
            ValueNode::column("d.A3"),
            operator,
            ValueNode::semantic("district", "A3", "moravia"),
        ))])
    .unwrap()
}

fn moravia() -> StaticResolver {
    StaticResolver::new().with_match(
        "district",
        "A3",
        "moravia",
        &["south Moravia", "north Moravia"],
    )
}

#[test]
fn test_multiple_matches_rewrite_equality_to_in() {
    let output = compile(&region_filter("="), &moravia(), &CompileOptions::default());
    insta::assert_snapshot!(output.sql, @r#"
    SELECT d.A2
    FROM "district" as d
    WHERE (d.A3 IN ('south Moravia', 'north Moravia'))
    "#);
}

#[test]
fn test_multiple_matches_rewrite_inequality_to_not_in() {
    let output = compile(&region_filter("!="), &moravia(), &CompileOptions::default());
    assert!(output
        .sql
        .ends_with("WHERE (d.A3 NOT IN ('south Moravia', 'north Moravia'))"));
}

#[test]
fn test_non_set_operator_gets_single_value() {
    let output = compile(&region_filter("LIKE"), &moravia(), &CompileOptions::default());
    assert!(output.sql.ends_with("WHERE (d.A3 LIKE 'south Moravia')"));
}

#[test]
fn test_configured_operators_limit_multiplicity() {
    let options = CompileOptions::default().with_set_compatible_operators(&["IN", "NOT IN"]);
    let output = compile(&region_filter("="), &moravia(), &options);
    assert!(output.sql.ends_with("WHERE (d.A3 = 'south Moravia')"));
}

#[test]
fn test_unresolved_phrase_is_quoted_and_reported() {
    let output = compile(&region_filter("="), &NoopResolver, &CompileOptions::default());
    assert!(output.sql.ends_with("WHERE (d.A3 = 'moravia')"));
    assert_eq!(
        output.warnings,
        vec![CompileWarning::SemanticFallback {
            table: "district".into(),
            column: "A3".into(),
            phrase: "moravia".into(),
            reason: FallbackReason::NoMatch,
        }]
    );
}

/// Records every request it sees and returns an empty match.
#[derive(Default)]
struct RecordingResolver {
    seen: std::cell::RefCell<Vec<(String, bool)>>,
}

impl SemanticResolver for RecordingResolver {
    fn resolve(&self, request: &ResolveRequest<'_>) -> ResolverResult<Resolution> {
        self.seen
            .borrow_mut()
            .push((request.operator.to_string(), request.allows_multiple));
        Ok(Resolution::Match {
            values: Vec::new(),
            confidence: 0.0,
        })
    }
}

#[test]
fn test_operator_context_reaches_resolver() {
    let plan = Plan::new(vec![Task::new(1)
        .select(vec![ValueNode::semantic("client", "gender", "woman")])
        .filter(ConditionNode::and(vec![
            ConditionNode::leaf(
                ValueNode::column("c.gender"),
                "NOT IN",
                ValueNode::semantic("client", "gender", "man"),
            ),
            ConditionNode::leaf(
                ValueNode::column("d.A11"),
                ">",
                ValueNode::semantic("district", "A11", "high salary"),
            ),
        ]))])
    .unwrap();

    let resolver = RecordingResolver::default();
    let output = compile(&plan, &resolver, &CompileOptions::default());

    assert_eq!(
        *resolver.seen.borrow(),
        vec![
            (String::new(), false),
            ("NOT IN".to_string(), true),
            (">".to_string(), false),
        ]
    );
    // Empty matches fall back to the phrase
    assert_eq!(output.warnings.len(), 3);
    assert!(output.sql.starts_with("SELECT 'woman'\nWHERE"));
}

struct OfflineResolver;

impl SemanticResolver for OfflineResolver {
    fn resolve(&self, _request: &ResolveRequest<'_>) -> ResolverResult<Resolution> {
        Err(ResolverError::Unavailable("connection refused".into()))
    }
}

#[test]
fn test_resolver_failure_never_aborts_compilation() {
    let output = compile(&region_filter("="), &OfflineResolver, &CompileOptions::default());
    assert!(!output.is_diagnostic());
    assert!(output.sql.ends_with("WHERE (d.A3 = 'moravia')"));
    assert!(matches!(
        &output.warnings[0],
        CompileWarning::SemanticFallback {
            reason: FallbackReason::ResolverFailed(message),
            ..
        } if message.contains("connection refused")
    ));
}

#[test]
fn test_phrase_quotes_are_escaped() {
    let plan = Plan::new(vec![Task::new(1)
        .from_table("client")
        .filter(ConditionNode::leaf(
            ValueNode::column("client.name"),
            "=",
            ValueNode::semantic("client", "name", "O'Neil"),
        ))])
    .unwrap();
    let output = compile(&plan, &NoopResolver, &CompileOptions::default());
    assert!(output.sql.ends_with("WHERE (client.name = 'O''Neil')"));
}
