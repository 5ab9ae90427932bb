//! Query tests.
//!
//! Tests cover the four query forms, cost bounds, vacuous truth and the
//! textual query syntax, mostly on the Yale shooting domain.

use action_graph::compile::compile;
use action_graph::graph::TransitionGraph;
use action_graph::query::{Condition, Query, QueryEngine, QueryOutcome};
use action_graph::state::State;
use action_graph::types::{Action, Fluent};

fn yale(extra: &[&str]) -> TransitionGraph {
    let mut statements = vec![
        "initially alive",
        "initially ~loaded",
        "Load causes loaded",
        "Shoot causes ~alive if loaded",
        "Shoot causes ~loaded",
    ];
    statements.extend_from_slice(extra);
    compile(&statements).unwrap()
}

fn plan(names: &[&str]) -> Vec<Action> {
    names.iter().map(|&n| Action::new(n)).collect()
}

fn cond(text: &str) -> Condition {
    Condition::parse(text).unwrap()
}

fn ask(graph: &TransitionGraph, query: &str) -> QueryOutcome {
    QueryEngine::new(graph).answer(&query.parse().unwrap()).unwrap()
}

// ─── Alpha After ───────────────────────────────────────────────────────────────

#[test]
fn necessary_alpha_after() {
    let graph = yale(&[]);
    let engine = QueryEngine::new(&graph);
    let dead = cond("~alive");

    assert!(engine
        .necessary_alpha_after(&dead, &plan(&["Load", "Shoot"]), &Condition::always())
        .unwrap());
    assert!(!engine
        .necessary_alpha_after(&dead, &plan(&["Shoot"]), &Condition::always())
        .unwrap());
    assert!(engine
        .necessary_alpha_after(&dead, &plan(&["Shoot"]), &cond("loaded"))
        .unwrap());
}

#[test]
fn possibly_alpha_after() {
    let graph = yale(&[]);
    let engine = QueryEngine::new(&graph);

    assert!(engine
        .possibly_alpha_after(&cond("~alive"), &plan(&["Shoot"]), &Condition::always())
        .unwrap());
    assert!(!engine
        .possibly_alpha_after(&cond("alive"), &plan(&["Shoot"]), &cond("loaded"))
        .unwrap());
}

#[test]
fn alpha_after_empty_plan() {
    let graph = yale(&[]);
    let engine = QueryEngine::new(&graph);
    assert!(engine
        .necessary_alpha_after(&cond("alive"), &[], &cond("alive and loaded"))
        .unwrap());
}

// ─── Executability ─────────────────────────────────────────────────────────────

#[test]
fn executable_with_veto() {
    let graph = yale(&["impossible Shoot if ~loaded"]);
    let engine = QueryEngine::new(&graph);
    let any = Condition::always();

    assert!(!engine.necessary_executable(&plan(&["Shoot"]), &any).unwrap());
    assert!(engine.possibly_executable(&plan(&["Shoot"]), &any).unwrap());
    assert!(engine.necessary_executable(&plan(&["Load", "Shoot"]), &any).unwrap());
    assert!(!engine
        .possibly_executable(&plan(&["Shoot", "Shoot"]), &any)
        .unwrap());
}

#[test]
fn executable_with_cost() {
    let graph = yale(&["Load lasts 1", "Shoot lasts 3"]);
    let engine = QueryEngine::new(&graph);
    let steps = plan(&["Load", "Shoot"]);
    let any = Condition::always();

    let outcome = engine.necessary_executable_with_cost(&steps, &any, 4).unwrap();
    assert_eq!(outcome, QueryOutcome { holds: true, min_cost: Some(3) });

    let outcome = engine.necessary_executable_with_cost(&steps, &any, 3).unwrap();
    assert!(!outcome.holds);

    let outcome = engine.possibly_executable_with_cost(&steps, &any, 3).unwrap();
    assert_eq!(outcome, QueryOutcome { holds: true, min_cost: Some(3) });

    let outcome = engine
        .possibly_executable_with_cost(&steps, &cond("alive and ~loaded"), 3)
        .unwrap();
    assert_eq!(outcome, QueryOutcome { holds: false, min_cost: None });
}

#[test]
fn self_loops_are_free() {
    let graph = yale(&["Load lasts 5"]);
    let engine = QueryEngine::new(&graph);
    let outcome = engine
        .necessary_executable_with_cost(&plan(&["Load"]), &cond("loaded"), 0)
        .unwrap();
    assert!(outcome.holds);
}

// ─── Vacuous Truth ─────────────────────────────────────────────────────────────

#[test]
fn no_start_state() {
    let graph = compile(&["always alive", "Shoot causes ~alive"]).unwrap();
    let engine = QueryEngine::new(&graph);
    let pi = cond("~alive");
    let steps = plan(&["Shoot"]);

    assert!(engine.necessary_executable(&steps, &pi).unwrap());
    assert!(!engine.possibly_executable(&steps, &pi).unwrap());
    assert!(engine.necessary_alpha_after(&cond("alive"), &steps, &pi).unwrap());
    assert!(!engine.possibly_alpha_after(&cond("alive"), &steps, &pi).unwrap());
}

// ─── Steps ─────────────────────────────────────────────────────────────────────

#[test]
fn step_and_run() {
    let graph = yale(&["Shoot lasts 2"]);
    let engine = QueryEngine::new(&graph);
    let start = State::from_values([(Fluent::new("alive"), true), (Fluent::new("loaded"), false)]);

    let edge = engine.step(&start, &Action::new("Load")).unwrap();
    assert_eq!(edge.target().get("loaded"), Some(true));

    let run = engine.run(&start, &plan(&["Load", "Shoot"])).unwrap();
    assert_eq!(run.state.get("alive"), Some(false));
    assert_eq!(run.cost, 2);
}

#[test]
fn missing_edge_stops_run() {
    let graph = compile(&["Shoot causes ~alive if loaded"]).unwrap();
    let engine = QueryEngine::new(&graph);
    let start = State::from_values([(Fluent::new("alive"), true), (Fluent::new("loaded"), false)]);
    assert!(engine.step(&start, &Action::new("Shoot")).is_none());
    assert!(engine.run(&start, &plan(&["Shoot"])).is_none());
}

// ─── Errors ────────────────────────────────────────────────────────────────────

#[test]
fn unknown_names() {
    let graph = yale(&[]);
    let engine = QueryEngine::new(&graph);

    let err = engine
        .necessary_alpha_after(&cond("hungry"), &plan(&["Load"]), &Condition::always())
        .unwrap_err();
    assert!(err.is_lookup());

    let err = engine
        .possibly_executable(&plan(&["Load", "Dance"]), &Condition::always())
        .unwrap_err();
    assert!(err.is_lookup());
    assert!(err.to_string().contains("Dance"));

    let err = engine.necessary_executable(&plan(&["Load"]), &cond("hungry")).unwrap_err();
    assert!(err.is_lookup());
}

#[test]
fn non_conjunctive_condition() {
    assert!(Condition::parse("alive or loaded").unwrap_err().is_parse());
    assert!(Condition::parse("alive => loaded").unwrap_err().is_parse());
}

// ─── Query Text ────────────────────────────────────────────────────────────────

#[test]
fn textual_queries() {
    let graph = yale(&["Load lasts 1", "Shoot lasts 3"]);

    assert!(ask(&graph, "necessary ~alive after Load, Shoot").holds);
    assert!(!ask(&graph, "necessary ~alive after Shoot").holds);
    assert!(ask(&graph, "possibly ~alive after Shoot").holds);
    assert!(ask(&graph, "necessary ~alive after Shoot from loaded").holds);
    assert!(ask(&graph, "necessary executable Load, Shoot").holds);
    assert!(ask(&graph, "necessary executable Load, Shoot with cost 4 from alive").holds);
    assert!(!ask(&graph, "necessary executable Load, Shoot with cost 3 from ~loaded").holds);
}

#[test]
fn textual_query_errors() {
    let graph = yale(&[]);
    let engine = QueryEngine::new(&graph);

    let query: Query = "necessary ghost after Load".parse().unwrap();
    let err = engine.answer(&query).unwrap_err();
    assert!(err.is_lookup());
    assert_eq!(err.input(), "necessary ghost after Load");

    assert!(Query::parse("maybe executable Load").unwrap_err().is_parse());
    assert!(Query::parse("necessary executable Load with cost").unwrap_err().is_parse());
}
