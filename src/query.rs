//! Modal queries over a compiled [`TransitionGraph`].
//!
//! A query starts from every possible state satisfying a condition `pi` and
//! runs a sequence of actions, following the first matching edge at each step.
//! `necessary` queries must hold for every such start state, `possibly`
//! queries for at least one. With no start state, `necessary` queries hold
//! vacuously and `possibly` queries fail.
//!
//! Conditions are conjunctions of literals such as `alive and ~loaded`.
//!
//! # Example
//!
//! ```
//! use action_graph::compile::compile;
//! use action_graph::query::{Query, QueryEngine};
//!
//! let graph = compile(&[
//!     "Load causes loaded",
//!     "Shoot causes ~alive if loaded",
//!     "Shoot causes ~loaded",
//! ])
//! .unwrap();
//! let engine = QueryEngine::new(&graph);
//!
//! let query: Query = "necessary ~alive after Load, Shoot from alive".parse().unwrap();
//! assert!(engine.answer(&query).unwrap().holds);
//! ```

use std::fmt;
use std::str::FromStr;

use log::debug;

use crate::error::{Error, Result};
use crate::formula;
use crate::graph::{Edge, TransitionGraph};
use crate::state::State;
use crate::statement::split_keyword;
use crate::types::{Action, Lit};

/// A conjunction of literals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    text: String,
    lits: Vec<Lit>,
}

impl Condition {
    /// Parses a conjunction of literals; `true` is the empty conjunction.
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        let expr = formula::parse(text)?;
        let lits = expr
            .as_conjunction()
            .ok_or_else(|| Error::parse(text, "condition must be a conjunction of literals"))?;
        Ok(Condition {
            text: text.to_string(),
            lits,
        })
    }

    /// The condition satisfied by every state.
    pub fn always() -> Self {
        Condition {
            text: "true".to_string(),
            lits: Vec::new(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn lits(&self) -> &[Lit] {
        &self.lits
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

impl FromStr for Condition {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Condition::parse(s)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Quantifier {
    Necessary,
    Possibly,
}

impl fmt::Display for Quantifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quantifier::Necessary => write!(f, "necessary"),
            Quantifier::Possibly => write!(f, "possibly"),
        }
    }
}

/// What a successful run has to achieve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Goal {
    /// The final state satisfies the condition.
    Reach(Condition),
    /// Every action is executable.
    Executable,
    /// Every action is executable and the total duration is at most the bound.
    ExecutableWithCost(u64),
}

/// A parsed query.
///
/// ```text
/// necessary|possibly <alpha> after A1, ..., An [from <pi>]
/// necessary|possibly executable A1, ..., An [with cost <n>] [from <pi>]
/// ```
///
/// Without `from`, the query ranges over every possible state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub text: String,
    pub quantifier: Quantifier,
    pub goal: Goal,
    pub actions: Vec<Action>,
    pub pi: Condition,
}

impl Query {
    pub fn parse(input: &str) -> Result<Self> {
        let text = input.trim().trim_end_matches(';').trim();
        parse_query(text).map_err(|e| e.with_input(text))
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

impl FromStr for Query {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Query::parse(s)
    }
}

fn parse_actions(list: &str) -> Result<Vec<Action>> {
    let mut actions = Vec::new();
    for name in list.split(',').map(str::trim) {
        if !formula::is_identifier(name) {
            return Err(Error::parse(list, format!("'{}' is not a valid action name", name)));
        }
        actions.push(Action::new(name));
    }
    Ok(actions)
}

fn parse_query(text: &str) -> Result<Query> {
    let (head, body) = text
        .split_once(char::is_whitespace)
        .ok_or_else(|| Error::parse(text, "incomplete query"))?;
    let quantifier = match head {
        "necessary" => Quantifier::Necessary,
        "possibly" => Quantifier::Possibly,
        other => {
            return Err(Error::parse(
                text,
                format!("expected 'necessary' or 'possibly', found '{}'", other),
            ))
        }
    };

    let (body, pi) = match split_keyword(body, "from") {
        Some((body, pi)) => (body, Condition::parse(pi)?),
        None => (body.trim(), Condition::always()),
    };

    let executable = body
        .strip_prefix("executable")
        .filter(|rest| rest.starts_with(char::is_whitespace));
    let (goal, actions) = if let Some(rest) = executable {
        match split_keyword(rest, "with") {
            Some((list, cost)) => {
                let bound = cost
                    .strip_prefix("cost")
                    .map(str::trim)
                    .ok_or_else(|| Error::parse(text, "expected 'with cost <n>'"))?;
                let bound = bound
                    .parse::<u64>()
                    .map_err(|_| Error::parse(text, format!("invalid cost bound '{}'", bound)))?;
                (Goal::ExecutableWithCost(bound), parse_actions(list)?)
            }
            None => (Goal::Executable, parse_actions(rest.trim())?),
        }
    } else {
        let (alpha, list) =
            split_keyword(body, "after").ok_or_else(|| Error::parse(text, "expected 'after' or 'executable'"))?;
        (Goal::Reach(Condition::parse(alpha)?), parse_actions(list)?)
    };

    Ok(Query {
        text: text.to_string(),
        quantifier,
        goal,
        actions,
        pi,
    })
}

/// The answer to a query.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct QueryOutcome {
    pub holds: bool,
    /// Smallest total duration among the runs that met the goal.
    pub min_cost: Option<u64>,
}

/// A run of an action sequence from one start state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Run {
    pub state: State,
    pub cost: u64,
}

/// Answers queries against a compiled graph.
pub struct QueryEngine<'g> {
    graph: &'g TransitionGraph,
}

impl<'g> QueryEngine<'g> {
    pub fn new(graph: &'g TransitionGraph) -> Self {
        Self { graph }
    }

    pub fn graph(&self) -> &'g TransitionGraph {
        self.graph
    }

    /// True iff `state` assigns every literal of `condition` its polarity.
    ///
    /// Fails with [`Error::Lookup`] if the state lacks one of the fluents.
    pub fn state_satisfies(&self, state: &State, condition: &Condition) -> Result<bool> {
        for lit in condition.lits() {
            match state.get(lit.fluent().name()) {
                Some(value) if value == lit.polarity() => {}
                Some(_) => return Ok(false),
                None => return Err(Error::unknown_fluent(condition.text(), lit.fluent().name())),
            }
        }
        Ok(true)
    }

    /// The first edge labeled `action` leaving `state`, if any.
    ///
    /// Only the first edge is followed even when the action is
    /// nondeterministic in `state`.
    pub fn step(&self, state: &State, action: &Action) -> Option<&'g Edge> {
        self.graph.edges().iter().find(|e| e.source() == state && e.action() == action)
    }

    /// Runs `actions` from `state`, or returns `None` if some step has no edge.
    pub fn run(&self, state: &State, actions: &[Action]) -> Option<Run> {
        let mut current = state;
        let mut cost = 0u64;
        for action in actions {
            let edge = self.step(current, action)?;
            cost = cost.saturating_add(edge.duration());
            current = edge.target();
        }
        Some(Run {
            state: current.clone(),
            cost,
        })
    }

    fn check_condition(&self, input: &str, condition: &Condition) -> Result<()> {
        for lit in condition.lits() {
            if !self.graph.has_fluent(lit.fluent().name()) {
                return Err(Error::unknown_fluent(input, lit.fluent().name()));
            }
        }
        Ok(())
    }

    fn check_actions(&self, input: &str, actions: &[Action]) -> Result<()> {
        for action in actions {
            if !self.graph.has_action(action.name()) {
                return Err(Error::unknown_action(input, action.name()));
            }
        }
        Ok(())
    }

    /// Evaluates a query.
    ///
    /// Every start state is examined so that `min_cost` covers all of them.
    pub fn answer(&self, query: &Query) -> Result<QueryOutcome> {
        self.check_condition(&query.text, &query.pi)?;
        if let Goal::Reach(alpha) = &query.goal {
            self.check_condition(&query.text, alpha)?;
        }
        self.check_actions(&query.text, &query.actions)?;

        let mut starts = 0usize;
        let mut successes = 0usize;
        let mut min_cost: Option<u64> = None;
        for state in self.graph.states() {
            if !self.state_satisfies(state, &query.pi)? {
                continue;
            }
            starts += 1;
            let ok = match self.run(state, &query.actions) {
                None => false,
                Some(run) => {
                    let ok = match &query.goal {
                        Goal::Reach(alpha) => self.state_satisfies(&run.state, alpha)?,
                        Goal::Executable => true,
                        Goal::ExecutableWithCost(bound) => run.cost <= *bound,
                    };
                    if ok {
                        min_cost = Some(min_cost.map_or(run.cost, |c| c.min(run.cost)));
                    }
                    ok
                }
            };
            if ok {
                successes += 1;
            }
        }

        let holds = match query.quantifier {
            Quantifier::Necessary => successes == starts,
            Quantifier::Possibly => successes > 0,
        };
        debug!(
            "answer: '{}': {} of {} start states succeed, holds = {}",
            query.text, successes, starts, holds
        );
        Ok(QueryOutcome { holds, min_cost })
    }

    fn ask(&self, quantifier: Quantifier, goal: Goal, actions: &[Action], pi: &Condition) -> Result<QueryOutcome> {
        let verb = match &goal {
            Goal::Reach(alpha) => format!("{} after", alpha),
            Goal::Executable => "executable".to_string(),
            Goal::ExecutableWithCost(_) => "executable".to_string(),
        };
        let names: Vec<&str> = actions.iter().map(|a| a.name()).collect();
        let mut text = format!("{} {} {}", quantifier, verb, names.join(", "));
        if let Goal::ExecutableWithCost(bound) = &goal {
            text.push_str(&format!(" with cost {}", bound));
        }
        text.push_str(&format!(" from {}", pi));
        self.answer(&Query {
            text,
            quantifier,
            goal,
            actions: actions.to_vec(),
            pi: pi.clone(),
        })
    }

    /// Every `pi`-state reaches an `alpha`-state by executing `actions`.
    pub fn necessary_alpha_after(&self, alpha: &Condition, actions: &[Action], pi: &Condition) -> Result<bool> {
        Ok(self
            .ask(Quantifier::Necessary, Goal::Reach(alpha.clone()), actions, pi)?
            .holds)
    }

    /// Some `pi`-state reaches an `alpha`-state by executing `actions`.
    pub fn possibly_alpha_after(&self, alpha: &Condition, actions: &[Action], pi: &Condition) -> Result<bool> {
        Ok(self
            .ask(Quantifier::Possibly, Goal::Reach(alpha.clone()), actions, pi)?
            .holds)
    }

    /// `actions` can be executed from every `pi`-state.
    pub fn necessary_executable(&self, actions: &[Action], pi: &Condition) -> Result<bool> {
        Ok(self.ask(Quantifier::Necessary, Goal::Executable, actions, pi)?.holds)
    }

    /// `actions` can be executed from some `pi`-state.
    pub fn possibly_executable(&self, actions: &[Action], pi: &Condition) -> Result<bool> {
        Ok(self.ask(Quantifier::Possibly, Goal::Executable, actions, pi)?.holds)
    }

    /// `actions` can be executed from every `pi`-state within `max_cost`.
    pub fn necessary_executable_with_cost(
        &self,
        actions: &[Action],
        pi: &Condition,
        max_cost: u64,
    ) -> Result<QueryOutcome> {
        self.ask(Quantifier::Necessary, Goal::ExecutableWithCost(max_cost), actions, pi)
    }

    /// `actions` can be executed from some `pi`-state within `max_cost`.
    pub fn possibly_executable_with_cost(
        &self,
        actions: &[Action],
        pi: &Condition,
        max_cost: u64,
    ) -> Result<QueryOutcome> {
        self.ask(Quantifier::Possibly, Goal::ExecutableWithCost(max_cost), actions, pi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    use crate::compile::compile;

    fn actions(names: &[&str]) -> Vec<Action> {
        names.iter().map(|&n| Action::new(n)).collect()
    }

    fn cond(text: &str) -> Condition {
        Condition::parse(text).unwrap()
    }

    #[test]
    fn test_condition_parse() {
        let c = cond("alive and ~loaded");
        assert_eq!(c.lits().len(), 2);
        assert!(cond("true").lits().is_empty());
        assert!(Condition::parse("alive or loaded").unwrap_err().is_parse());
    }

    #[test]
    fn test_query_parse() {
        let q: Query = "necessary ~alive after Load, Shoot from alive".parse().unwrap();
        assert_eq!(q.quantifier, Quantifier::Necessary);
        assert_eq!(q.goal, Goal::Reach(cond("~alive")));
        assert_eq!(q.actions, actions(&["Load", "Shoot"]));
        assert_eq!(q.pi, cond("alive"));

        let q: Query = "possibly executable Load, Shoot with cost 5".parse().unwrap();
        assert_eq!(q.quantifier, Quantifier::Possibly);
        assert_eq!(q.goal, Goal::ExecutableWithCost(5));
        assert_eq!(q.pi, Condition::always());

        let q: Query = "necessary executable Shoot from loaded".parse().unwrap();
        assert_eq!(q.goal, Goal::Executable);
        assert_eq!(q.actions, actions(&["Shoot"]));

        assert!(Query::parse("surely executable Shoot").is_err());
        assert!(Query::parse("necessary alive").is_err());
        assert!(Query::parse("necessary executable Shoot with cost many").is_err());
        assert!(Query::parse("necessary executable").is_err());
    }

    #[test]
    fn test_state_satisfies_unknown_fluent() {
        let graph = compile(&["initially alive"]).unwrap();
        let engine = QueryEngine::new(&graph);
        let state = graph.states().iter().next().unwrap().clone();
        let err = engine.state_satisfies(&state, &cond("ghost")).unwrap_err();
        assert!(err.is_lookup());
        assert!(engine.state_satisfies(&state, &Condition::always()).unwrap());
    }

    #[test]
    fn test_step_takes_first_edge() {
        let graph = compile(&["Toss releases heads"]).unwrap();
        let engine = QueryEngine::new(&graph);
        let toss = Action::new("Toss");
        for state in graph.states() {
            let first = graph.edges_from(state, &toss).next();
            assert_eq!(engine.step(state, &toss), first);
        }
    }

    #[test]
    fn test_unknown_action_is_lookup_error() {
        let graph = compile(&["Load causes loaded"]).unwrap();
        let engine = QueryEngine::new(&graph);
        let err = engine
            .necessary_executable(&actions(&["Fire"]), &Condition::always())
            .unwrap_err();
        assert!(err.is_lookup());
    }

    #[test]
    fn test_vacuous_truth() {
        let graph = compile(&["Load causes loaded", "always loaded"]).unwrap();
        let engine = QueryEngine::new(&graph);
        let pi = cond("~loaded");
        assert!(engine.necessary_executable(&actions(&["Load"]), &pi).unwrap());
        assert!(!engine.possibly_executable(&actions(&["Load"]), &pi).unwrap());
        let outcome = engine
            .necessary_executable_with_cost(&actions(&["Load"]), &pi, 0)
            .unwrap();
        assert_eq!(outcome, QueryOutcome { holds: true, min_cost: None });
    }
}
