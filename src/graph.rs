//! Explicit transition graphs and their state space.
//!
//! A [`TransitionGraph`] owns everything a compile run produces: the fluent and
//! action vocabularies, the possible states, the labeled edges with their
//! durations, the possible initial and ending states, and the global
//! constraints (`always` invariants, `impossible` states and action vetoes).
//!
//! The graph is populated by the [compiler](crate::compile) and is read-only for
//! everybody else; all mutators are crate-private.
//!
//! # Example
//!
//! ```
//! use action_graph::compile::compile;
//!
//! let graph = compile(&["initially alive", "Shoot causes ~alive"]).unwrap();
//! assert_eq!(graph.states().len(), 2);
//! assert_eq!(graph.initial_states().len(), 1);
//! for edge in graph.edges() {
//!     println!("{}", edge);
//! }
//! ```

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use log::{debug, trace};
use num_bigint::BigUint;

use crate::error::{Error, Result};
use crate::formula::Dnf;
use crate::state::State;
use crate::types::{Action, Fluent};

/// A labeled transition between two states.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Edge {
    source: State,
    action: Action,
    target: State,
    duration: u64,
}

impl Edge {
    pub fn new(source: State, action: Action, target: State, duration: u64) -> Self {
        Edge {
            source,
            action,
            target,
            duration,
        }
    }

    pub fn source(&self) -> &State {
        &self.source
    }

    pub fn action(&self) -> &Action {
        &self.action
    }

    pub fn target(&self) -> &State {
        &self.target
    }

    pub fn duration(&self) -> u64 {
        self.duration
    }

    pub fn is_self_loop(&self) -> bool {
        self.source == self.target
    }

    /// Label for display: the action and its duration.
    pub fn label(&self) -> String {
        format!("{} ({})", self.action, self.duration)
    }

    fn key(&self) -> (State, Action, State) {
        (self.source.clone(), self.action.clone(), self.target.clone())
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} --{}--> {} ({})",
            self.source, self.action, self.target, self.duration
        )
    }
}

/// A global state constraint together with its source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraint {
    pub text: String,
    pub dnf: Dnf,
}

/// An `impossible <action> if <precondition>` rule.
///
/// Every edge labeled `action` whose source satisfies the precondition is
/// forbidden, whatever its target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Veto {
    pub text: String,
    pub action: Action,
    pub precondition: Option<Dnf>,
}

impl Veto {
    /// True if this rule forbids `action` in `state`.
    pub fn forbids(&self, state: &State, action: &Action) -> bool {
        &self.action == action && self.precondition.as_ref().map_or(true, |pre| pre.eval(state))
    }
}

/// The compiled transition system.
#[derive(Debug, Clone, Default)]
pub struct TransitionGraph {
    fluents: BTreeSet<Fluent>,
    actions: BTreeSet<Action>,
    states: BTreeSet<State>,
    edges: Vec<Edge>,
    edge_index: HashMap<(State, Action, State), usize>,
    initial_states: BTreeSet<State>,
    ending_states: BTreeSet<State>,
    always: Vec<Constraint>,
    impossible: Vec<Constraint>,
    vetoes: Vec<Veto>,
    noninertial: BTreeSet<Fluent>,
}

impl TransitionGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fluents(&self) -> &BTreeSet<Fluent> {
        &self.fluents
    }

    pub fn actions(&self) -> &BTreeSet<Action> {
        &self.actions
    }

    /// The possible states: all valuations allowed by the global constraints.
    pub fn states(&self) -> &BTreeSet<State> {
        &self.states
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn initial_states(&self) -> &BTreeSet<State> {
        &self.initial_states
    }

    pub fn ending_states(&self) -> &BTreeSet<State> {
        &self.ending_states
    }

    pub fn always(&self) -> &[Constraint] {
        &self.always
    }

    pub fn impossible(&self) -> &[Constraint] {
        &self.impossible
    }

    pub fn vetoes(&self) -> &[Veto] {
        &self.vetoes
    }

    pub fn noninertial(&self) -> &BTreeSet<Fluent> {
        &self.noninertial
    }

    pub fn has_fluent(&self, name: &str) -> bool {
        self.fluents.contains(name)
    }

    pub fn has_action(&self, name: &str) -> bool {
        self.actions.contains(name)
    }

    pub fn is_possible(&self, state: &State) -> bool {
        self.states.contains(state)
    }

    pub fn is_initial(&self, state: &State) -> bool {
        self.initial_states.contains(state)
    }

    pub fn is_ending(&self, state: &State) -> bool {
        self.ending_states.contains(state)
    }

    /// Number of total valuations over the fluent set, `2^|fluents|`.
    pub fn state_space_size(&self) -> BigUint {
        BigUint::from(1u32) << self.fluents.len()
    }

    /// Enumerates every total valuation over the fluent set.
    ///
    /// Returns exactly `2^|fluents|` distinct states.
    ///
    /// # Panics
    ///
    /// Panics if there are 64 fluents or more. The compiler rejects such
    /// vocabularies long before this point.
    pub fn generate_all_states(&self) -> Vec<State> {
        let n = self.fluents.len();
        assert!(n < 64, "Too many fluents to enumerate: {}", n);
        let fluents: Vec<Fluent> = self.fluents.iter().cloned().collect();
        (0..1u64 << n).map(|bits| State::from_bits(&fluents, bits)).collect()
    }

    /// Enumerates the states allowed by the `always` and `impossible` constraints.
    ///
    /// A state is allowed iff it satisfies every `always` formula and no
    /// `impossible` formula. Fails with [`Error::Contradiction`] if some state
    /// satisfying every `always` formula also satisfies an `impossible`
    /// formula, or if the constraints leave no state at all.
    pub fn generate_possible_states(&self) -> Result<Vec<State>> {
        let all = self.generate_all_states();
        let total = all.len();
        let always_states: Vec<State> = all
            .into_iter()
            .filter(|s| self.always.iter().all(|c| c.dnf.eval(s)))
            .collect();

        if !self.always.is_empty() {
            if let Some(state) = always_states
                .iter()
                .find(|s| self.impossible.iter().any(|c| c.dnf.eval(s)))
            {
                debug!("generate_possible_states: {} is both required and forbidden", state);
                return Err(Error::contradiction(
                    self.constraint_texts(),
                    "always and impossible constraints overlap",
                ));
            }
        }

        let possible: Vec<State> = always_states
            .into_iter()
            .filter(|s| !self.impossible.iter().any(|c| c.dnf.eval(s)))
            .collect();
        debug!(
            "generate_possible_states: {} of {} states remain",
            possible.len(),
            total
        );

        if possible.is_empty() {
            return Err(Error::contradiction(
                self.constraint_texts(),
                "always and impossible constraints leave no possible state",
            ));
        }

        Ok(possible)
    }

    fn constraint_texts(&self) -> String {
        self.always
            .iter()
            .chain(&self.impossible)
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// True if some `impossible` action rule forbids `action` in `state`.
    pub fn is_vetoed(&self, state: &State, action: &Action) -> bool {
        self.vetoes.iter().any(|v| v.forbids(state, action))
    }

    /// All edges leaving `state` labeled `action`, in insertion order.
    pub fn edges_from<'a>(&'a self, state: &'a State, action: &'a Action) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges
            .iter()
            .filter(move |e| &e.source == state && &e.action == action)
    }

    /// All edges labeled `action`.
    pub fn edges_labeled<'a>(&'a self, action: &'a Action) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| &e.action == action)
    }

    /// Sources of `action` edges whose target lies in `targets`.
    pub fn predecessors(&self, targets: &BTreeSet<State>, action: &Action) -> BTreeSet<State> {
        self.edges_labeled(action)
            .filter(|e| targets.contains(&e.target))
            .map(|e| e.source.clone())
            .collect()
    }

    pub fn find_edge(&self, source: &State, action: &Action, target: &State) -> Option<&Edge> {
        self.edge_index
            .get(&(source.clone(), action.clone(), target.clone()))
            .map(|&i| &self.edges[i])
    }

    pub(crate) fn add_fluent(&mut self, fluent: Fluent) {
        self.fluents.insert(fluent);
    }

    pub(crate) fn add_action(&mut self, action: Action) {
        self.actions.insert(action);
    }

    pub(crate) fn add_always(&mut self, constraint: Constraint) {
        self.always.push(constraint);
    }

    pub(crate) fn add_impossible(&mut self, constraint: Constraint) {
        self.impossible.push(constraint);
    }

    pub(crate) fn add_veto(&mut self, veto: Veto) {
        self.vetoes.push(veto);
    }

    pub(crate) fn add_noninertial(&mut self, fluent: Fluent) {
        self.noninertial.insert(fluent);
    }

    pub(crate) fn set_states(&mut self, states: impl IntoIterator<Item = State>) {
        self.states = states.into_iter().collect();
    }

    pub(crate) fn set_initial_states(&mut self, states: impl IntoIterator<Item = State>) {
        self.initial_states = states.into_iter().collect();
    }

    pub(crate) fn add_ending_states(&mut self, states: impl IntoIterator<Item = State>) {
        self.ending_states.extend(states);
    }

    /// Adds an edge, or overwrites the duration of an existing edge with the
    /// same `(source, action, target)`.
    ///
    /// Edges touching a state outside the possible set are dropped; returns
    /// whether the edge is now present.
    pub(crate) fn add_edge(&mut self, edge: Edge) -> bool {
        if !self.states.contains(&edge.source) || !self.states.contains(&edge.target) {
            trace!("add_edge: dropping {} (endpoint not possible)", edge);
            return false;
        }
        let key = edge.key();
        match self.edge_index.get(&key) {
            Some(&i) => {
                self.edges[i].duration = edge.duration;
            }
            None => {
                self.edge_index.insert(key, self.edges.len());
                self.edges.push(edge);
            }
        }
        true
    }

    /// Sets the duration of every non-self-loop edge labeled `action`.
    ///
    /// Returns the number of edges updated.
    pub(crate) fn set_duration(&mut self, action: &Action, duration: u64) -> usize {
        let mut count = 0;
        for edge in self.edges.iter_mut() {
            if &edge.action == action && !edge.is_self_loop() {
                edge.duration = duration;
                count += 1;
            }
        }
        count
    }
}

impl fmt::Display for TransitionGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fluents: Vec<&str> = self.fluents.iter().map(|x| x.name()).collect();
        let actions: Vec<&str> = self.actions.iter().map(|x| x.name()).collect();
        writeln!(f, "fluents: {}", fluents.join(", "))?;
        writeln!(f, "actions: {}", actions.join(", "))?;
        writeln!(f, "states ({}):", self.states.len())?;
        for state in &self.states {
            let mut marks = String::new();
            if self.is_initial(state) {
                marks.push_str(" [initial]");
            }
            if self.is_ending(state) {
                marks.push_str(" [ending]");
            }
            writeln!(f, "  {}{}", state, marks)?;
        }
        writeln!(f, "edges ({}):", self.edges.len())?;
        for edge in &self.edges {
            writeln!(f, "  {}", edge)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    use crate::formula::normalize;

    fn graph_with(fluents: &[&str]) -> TransitionGraph {
        let mut graph = TransitionGraph::new();
        for &f in fluents {
            graph.add_fluent(Fluent::new(f));
        }
        graph
    }

    fn constraint(text: &str) -> Constraint {
        Constraint {
            text: text.to_string(),
            dnf: normalize(text).unwrap(),
        }
    }

    #[test]
    fn test_generate_all_states() {
        for n in 0..6 {
            let names: Vec<String> = (0..n).map(|i| format!("f{}", i)).collect();
            let refs: Vec<&str> = names.iter().map(|s| s.as_str()).collect();
            let graph = graph_with(&refs);
            let states = graph.generate_all_states();
            let distinct: BTreeSet<_> = states.iter().cloned().collect();
            assert_eq!(states.len(), 1 << n);
            assert_eq!(distinct.len(), 1 << n);
            assert_eq!(graph.state_space_size(), BigUint::from(1u32 << n));
            assert!(states.iter().all(|s| s.len() == n));
        }
    }

    #[test]
    fn test_possible_states_always() {
        let mut graph = graph_with(&["a", "b"]);
        graph.add_always(constraint("a or b"));
        let states = graph.generate_possible_states().unwrap();
        assert_eq!(states.len(), 3);
        assert!(states.iter().all(|s| s.get("a") == Some(true) || s.get("b") == Some(true)));
    }

    #[test]
    fn test_possible_states_impossible() {
        let mut graph = graph_with(&["a", "b"]);
        graph.add_impossible(constraint("a and b"));
        let states = graph.generate_possible_states().unwrap();
        assert_eq!(states.len(), 3);
    }

    #[test]
    fn test_possible_states_contradiction() {
        let mut graph = graph_with(&["a"]);
        graph.add_always(constraint("a"));
        graph.add_impossible(constraint("a"));
        let err = graph.generate_possible_states().unwrap_err();
        assert!(err.is_contradiction());
        assert_eq!(err.input(), "a; a");
    }

    #[test]
    fn test_possible_states_overlap() {
        let mut graph = graph_with(&["a", "b"]);
        graph.add_always(constraint("a"));
        graph.add_impossible(constraint("a and b"));
        let err = graph.generate_possible_states().unwrap_err();
        assert!(err.is_contradiction());
        assert_eq!(err.input(), "a; a and b");
    }

    #[test]
    fn test_possible_states_disjoint() {
        let mut graph = graph_with(&["a", "b"]);
        graph.add_always(constraint("a"));
        graph.add_impossible(constraint("~a and b"));
        let states = graph.generate_possible_states().unwrap();
        assert_eq!(states.len(), 2);
        assert!(states.iter().all(|s| s.get("a") == Some(true)));
    }

    #[test]
    fn test_add_edge_overwrites_duration() {
        let mut graph = graph_with(&["a"]);
        graph.set_states(graph.generate_all_states());
        let fluents: Vec<Fluent> = graph.fluents().iter().cloned().collect();
        let s0 = State::from_bits(&fluents, 0);
        let s1 = State::from_bits(&fluents, 1);
        let act = Action::new("Flip");

        assert!(graph.add_edge(Edge::new(s0.clone(), act.clone(), s1.clone(), 1)));
        assert!(graph.add_edge(Edge::new(s0.clone(), act.clone(), s1.clone(), 7)));
        assert_eq!(graph.edges().len(), 1);
        assert_eq!(graph.find_edge(&s0, &act, &s1).unwrap().duration(), 7);
    }

    #[test]
    fn test_add_edge_rejects_impossible_endpoint() {
        let mut graph = graph_with(&["a"]);
        graph.add_impossible(constraint("a"));
        let possible = graph.generate_possible_states().unwrap();
        graph.set_states(possible);
        let fluents: Vec<Fluent> = graph.fluents().iter().cloned().collect();
        let s0 = State::from_bits(&fluents, 0);
        let s1 = State::from_bits(&fluents, 1);
        assert!(!graph.add_edge(Edge::new(s0, Action::new("Flip"), s1, 0)));
        assert!(graph.edges().is_empty());
    }

    #[test]
    fn test_set_duration_skips_self_loops() {
        let mut graph = graph_with(&["a"]);
        graph.set_states(graph.generate_all_states());
        let fluents: Vec<Fluent> = graph.fluents().iter().cloned().collect();
        let s0 = State::from_bits(&fluents, 0);
        let s1 = State::from_bits(&fluents, 1);
        let act = Action::new("Set");
        graph.add_edge(Edge::new(s0.clone(), act.clone(), s1.clone(), 0));
        graph.add_edge(Edge::new(s1.clone(), act.clone(), s1.clone(), 0));

        assert_eq!(graph.set_duration(&act, 5), 1);
        assert_eq!(graph.find_edge(&s0, &act, &s1).unwrap().duration(), 5);
        assert_eq!(graph.find_edge(&s1, &act, &s1).unwrap().duration(), 0);
    }

    #[test]
    fn test_predecessors() {
        let mut graph = graph_with(&["a"]);
        graph.set_states(graph.generate_all_states());
        let fluents: Vec<Fluent> = graph.fluents().iter().cloned().collect();
        let s0 = State::from_bits(&fluents, 0);
        let s1 = State::from_bits(&fluents, 1);
        let act = Action::new("Set");
        graph.add_edge(Edge::new(s0.clone(), act.clone(), s1.clone(), 0));
        graph.add_edge(Edge::new(s1.clone(), act.clone(), s1.clone(), 0));

        let targets: BTreeSet<State> = [s1.clone()].into_iter().collect();
        let preds = graph.predecessors(&targets, &act);
        assert_eq!(preds.len(), 2);
        let preds = graph.predecessors(&targets, &Action::new("Other"));
        assert!(preds.is_empty());
    }

    #[test]
    fn test_veto() {
        let veto = Veto {
            text: "impossible Shoot if ~loaded".to_string(),
            action: Action::new("Shoot"),
            precondition: Some(normalize("~loaded").unwrap()),
        };
        let fluents = vec![Fluent::new("loaded")];
        let unloaded = State::from_bits(&fluents, 0);
        let loaded = State::from_bits(&fluents, 1);
        assert!(veto.forbids(&unloaded, &Action::new("Shoot")));
        assert!(!veto.forbids(&loaded, &Action::new("Shoot")));
        assert!(!veto.forbids(&unloaded, &Action::new("Load")));
    }
}
