//! Compilation of action-language domains into transition graphs.
//!
//! Compilation runs in two passes. The collection pass parses every statement,
//! resolves bare `impossible <name>` statements and collects the fluent and
//! action vocabularies; nothing is built if any statement is malformed. The
//! construction pass then runs one phase per statement kind, in a fixed order:
//!
//! 1. `always`: global invariants
//! 2. `impossible`: forbidden states and action vetoes, then the possible states
//! 3. `initially`: the possible initial states
//! 4. `causes`: effect edges, by minimal change
//! 5. `releases`: nondeterministic edges for released fluents
//! 6. `after`: pruning of initial states, marking of ending states
//! 7. `lasts`: edge durations
//! 8. `noninertial`: recorded only
//!
//! Each phase produces [`Contribution`]s that are applied to the graph before
//! the next phase starts, so later phases see the effects of earlier ones.
//!
//! # Example
//!
//! ```
//! use action_graph::compile::compile;
//!
//! let graph = compile(&[
//!     "initially alive",
//!     "initially ~loaded",
//!     "Load causes loaded",
//!     "Shoot causes ~alive if loaded",
//!     "Shoot causes ~loaded",
//! ])
//! .unwrap();
//!
//! assert_eq!(graph.states().len(), 4);
//! assert_eq!(graph.initial_states().len(), 1);
//! ```

use std::collections::{BTreeMap, BTreeSet};

use log::{debug, trace, warn};

use crate::cache::Cache;
use crate::config::CompilerConfig;
use crate::error::{Error, Result};
use crate::formula::{Dnf, Expr};
use crate::graph::{Constraint, Edge, TransitionGraph, Veto};
use crate::state::State;
use crate::statement::{Forbidden, Kind, Statement};
use crate::types::{Action, Fluent};

/// A unit of change produced by a compilation phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Contribution {
    Always(Constraint),
    ForbiddenStates(Constraint),
    Veto(Veto),
    /// Replaces the set of initial states.
    InitialStates(BTreeSet<State>),
    Edges(Vec<Edge>),
    /// Replaces the initial states and adds ending states.
    After {
        initial: BTreeSet<State>,
        ending: BTreeSet<State>,
    },
    Duration {
        text: String,
        action: Action,
        duration: u64,
    },
    Noninertial(Vec<Fluent>),
}

impl Contribution {
    fn apply(self, graph: &mut TransitionGraph) {
        match self {
            Contribution::Always(c) => graph.add_always(c),
            Contribution::ForbiddenStates(c) => graph.add_impossible(c),
            Contribution::Veto(v) => graph.add_veto(v),
            Contribution::InitialStates(states) => graph.set_initial_states(states),
            Contribution::Edges(edges) => {
                for edge in edges {
                    graph.add_edge(edge);
                }
            }
            Contribution::After { initial, ending } => {
                graph.set_initial_states(initial);
                graph.add_ending_states(ending);
            }
            Contribution::Duration { text, action, duration } => {
                let updated = graph.set_duration(&action, duration);
                if updated == 0 {
                    warn!("'{}' does not match any edge", text);
                } else {
                    trace!("'{}' updated {} edges", text, updated);
                }
            }
            Contribution::Noninertial(fluents) => {
                for fluent in fluents {
                    graph.add_noninertial(fluent);
                }
            }
        }
    }
}

/// Fluents and actions of a domain.
#[derive(Debug, Default)]
struct Vocabulary {
    fluents: BTreeSet<Fluent>,
    actions: BTreeSet<Action>,
}

impl Vocabulary {
    /// Collects the vocabulary and resolves bare `impossible` statements.
    fn collect(statements: &mut [Statement], limit: usize) -> Result<Self> {
        let actions: BTreeSet<Action> = statements.iter().flat_map(Statement::actions).collect();
        for statement in statements.iter_mut() {
            statement.resolve(&actions);
        }

        let mut fluents = BTreeSet::new();
        let mut overflow = None;
        for statement in statements.iter() {
            for fluent in statement.fluents() {
                if actions.contains(fluent.name()) {
                    return Err(Error::parse(
                        statement.text(),
                        format!("'{}' is used both as a fluent and as an action", fluent),
                    ));
                }
                fluents.insert(fluent);
            }
            if overflow.is_none() && fluents.len() > limit {
                overflow = Some(statement.text().to_string());
            }
        }
        if let Some(input) = overflow {
            return Err(Error::parse(
                input,
                format!(
                    "domain has {} fluents, more than the limit of {}",
                    fluents.len(),
                    limit
                ),
            ));
        }

        Ok(Vocabulary { fluents, actions })
    }
}

/// A `causes` rule with normalized formulas.
struct EffectRule {
    effect: Dnf,
    precondition: Option<Dnf>,
}

/// A `releases` rule with a normalized precondition.
struct ReleaseRule {
    fluent: Fluent,
    precondition: Option<Dnf>,
}

fn precondition_holds(precondition: &Option<Dnf>, state: &State) -> bool {
    precondition.as_ref().map_or(true, |pre| pre.eval(state))
}

/// States satisfying `effect` that differ from `source` on the fewest fluents.
pub fn minimal_change<'a>(
    states: impl IntoIterator<Item = &'a State>,
    source: &State,
    effect: &Dnf,
) -> Vec<State> {
    let mut best = usize::MAX;
    let mut targets = Vec::new();
    for state in states.into_iter().filter(|s| effect.eval(s)) {
        let d = source.distance(state);
        if d < best {
            best = d;
            targets.clear();
        }
        if d == best {
            targets.push(state.clone());
        }
    }
    targets
}

/// Compiles statements into a [`TransitionGraph`].
pub struct Compiler {
    config: CompilerConfig,
    cache: Cache<Expr, Dnf>,
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new(CompilerConfig::default())
    }
}

impl Compiler {
    pub fn new(config: CompilerConfig) -> Self {
        let cache = Cache::new(config.memoize_formulas);
        Self { config, cache }
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// The formula cache of the last compile run.
    pub fn cache(&self) -> &Cache<Expr, Dnf> {
        &self.cache
    }

    /// Compiles a program given as text; see [`split_program`](crate::statement::split_program).
    pub fn compile_program(&mut self, text: &str) -> Result<TransitionGraph> {
        self.compile(&crate::statement::split_program(text))
    }

    /// Compiles a list of statements.
    ///
    /// The result does not depend on the order of statements of different
    /// kinds; within a kind, only `after` and `lasts` are order-sensitive.
    pub fn compile<S: AsRef<str>>(&mut self, statements: &[S]) -> Result<TransitionGraph> {
        self.cache.clear();

        let mut statements = statements
            .iter()
            .map(|s| Statement::parse(s.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        let vocabulary = Vocabulary::collect(&mut statements, self.config.fluent_limit())?;
        debug!(
            "compile: {} statements, {} fluents, {} actions",
            statements.len(),
            vocabulary.fluents.len(),
            vocabulary.actions.len()
        );

        let mut graph = TransitionGraph::new();
        for fluent in vocabulary.fluents {
            graph.add_fluent(fluent);
        }
        for action in vocabulary.actions {
            graph.add_action(action);
        }

        for kind in Kind::PHASES {
            let group: Vec<&Statement> = statements.iter().filter(|s| s.kind() == kind).collect();
            let contributions = match kind {
                Kind::Always => self.always(&group)?,
                Kind::Impossible => self.impossible(&group)?,
                Kind::Initially => vec![self.initially(&graph, &group)?],
                Kind::Causes => self.causes(&graph, &group)?,
                Kind::Releases => {
                    let causes: Vec<&Statement> = statements.iter().filter(|s| s.kind() == Kind::Causes).collect();
                    self.releases(&graph, &group, &causes)?
                }
                Kind::After => {
                    // Each chain prunes the initial states the next one sees.
                    for statement in &group {
                        self.after(&graph, statement)?.apply(&mut graph);
                    }
                    Vec::new()
                }
                Kind::Lasts => lasts(&group),
                Kind::Noninertial => noninertial(&group),
            };
            for contribution in contributions {
                contribution.apply(&mut graph);
            }
            if kind == Kind::Impossible {
                let states = graph.generate_possible_states()?;
                graph.set_states(states);
            }
            debug!(
                "compile: after '{}' phase: {} states, {} initial, {} edges",
                kind,
                graph.states().len(),
                graph.initial_states().len(),
                graph.edges().len()
            );
        }

        debug!(
            "compile: done, formula cache {} hits / {} misses",
            self.cache.hits(),
            self.cache.misses()
        );
        Ok(graph)
    }

    fn dnf(&mut self, expr: &Expr) -> Result<Dnf> {
        self.cache.get_or_try_insert(expr.clone(), |e| Ok(e.to_dnf()))
    }

    fn dnf_opt(&mut self, expr: &Option<Expr>) -> Result<Option<Dnf>> {
        expr.as_ref().map(|e| self.dnf(e)).transpose()
    }

    fn always(&mut self, group: &[&Statement]) -> Result<Vec<Contribution>> {
        let mut out = Vec::new();
        for statement in group {
            if let Statement::Always { text, formula } = statement {
                let dnf = self.dnf(formula)?;
                if dnf.is_unsatisfiable() {
                    return Err(Error::contradiction(text.as_str(), "invariant is unsatisfiable"));
                }
                out.push(Contribution::Always(Constraint {
                    text: text.clone(),
                    dnf,
                }));
            }
        }
        Ok(out)
    }

    fn impossible(&mut self, group: &[&Statement]) -> Result<Vec<Contribution>> {
        let mut out = Vec::new();
        for statement in group {
            if let Statement::Impossible { text, body } = statement {
                match body {
                    Forbidden::Action { action, precondition } => {
                        out.push(Contribution::Veto(Veto {
                            text: text.clone(),
                            action: action.clone(),
                            precondition: self.dnf_opt(precondition)?,
                        }));
                    }
                    Forbidden::States(formula) => {
                        out.push(Contribution::ForbiddenStates(Constraint {
                            text: text.clone(),
                            dnf: self.dnf(formula)?,
                        }));
                    }
                    Forbidden::Unresolved(name) => {
                        return Err(Error::parse(text.as_str(), format!("unresolved name '{}'", name)));
                    }
                }
            }
        }
        Ok(out)
    }

    fn initially(&mut self, graph: &TransitionGraph, group: &[&Statement]) -> Result<Contribution> {
        if group.is_empty() {
            return Ok(Contribution::InitialStates(graph.states().clone()));
        }

        let mut texts = Vec::new();
        let mut dnfs = Vec::new();
        for statement in group {
            if let Statement::Initially { text, formula } = statement {
                texts.push(text.as_str());
                dnfs.push(self.dnf(formula)?);
            }
        }
        let input = texts.join("; ");

        let condition = Dnf::all(&dnfs);
        if condition.is_unsatisfiable() {
            return Err(Error::contradiction(input, "initial conditions are unsatisfiable"));
        }
        let initial: BTreeSet<State> = graph.states().iter().filter(|s| condition.eval(s)).cloned().collect();
        if initial.is_empty() {
            return Err(Error::contradiction(input, "no possible state satisfies the initial conditions"));
        }
        Ok(Contribution::InitialStates(initial))
    }

    fn effect_rules(&mut self, statements: &[&Statement]) -> Result<BTreeMap<Action, Vec<EffectRule>>> {
        let mut rules: BTreeMap<Action, Vec<EffectRule>> = BTreeMap::new();
        for statement in statements {
            if let Statement::Causes {
                action,
                effect,
                precondition,
                ..
            } = statement
            {
                let rule = EffectRule {
                    effect: self.dnf(effect)?,
                    precondition: self.dnf_opt(precondition)?,
                };
                rules.entry(action.clone()).or_default().push(rule);
            }
        }
        Ok(rules)
    }

    /// Conjunction of the effects of every rule triggered in `source`, or
    /// `None` if no rule is triggered.
    fn triggered_effect(rules: &[EffectRule], source: &State) -> Option<Dnf> {
        let triggered: Vec<&Dnf> = rules
            .iter()
            .filter(|r| precondition_holds(&r.precondition, source))
            .map(|r| &r.effect)
            .collect();
        if triggered.is_empty() {
            None
        } else {
            Some(Dnf::all(triggered))
        }
    }

    fn edges_to(&self, graph: &TransitionGraph, source: &State, action: &Action, effect: &Dnf) -> Vec<Edge> {
        let targets = minimal_change(graph.states(), source, effect);
        if targets.is_empty() {
            debug!("{} has no consistent outcome in {}", action, source);
        }
        targets
            .into_iter()
            .map(|t| Edge::new(source.clone(), action.clone(), t, self.config.default_duration))
            .collect()
    }

    fn causes(&mut self, graph: &TransitionGraph, group: &[&Statement]) -> Result<Vec<Contribution>> {
        let rules = self.effect_rules(group)?;
        let mut out = Vec::new();
        for (action, rules) in &rules {
            let mut edges = Vec::new();
            for source in graph.states() {
                if graph.is_vetoed(source, action) {
                    trace!("{} is vetoed in {}", action, source);
                    continue;
                }
                if let Some(effect) = Self::triggered_effect(rules, source) {
                    edges.extend(self.edges_to(graph, source, action, &effect));
                }
            }
            debug!("causes: {} produces {} edges", action, edges.len());
            out.push(Contribution::Edges(edges));
        }
        Ok(out)
    }

    fn releases(
        &mut self,
        graph: &TransitionGraph,
        group: &[&Statement],
        causes: &[&Statement],
    ) -> Result<Vec<Contribution>> {
        let mut releases: BTreeMap<Action, Vec<ReleaseRule>> = BTreeMap::new();
        for statement in group {
            if let Statement::Releases {
                action,
                fluent,
                precondition,
                ..
            } = statement
            {
                let rule = ReleaseRule {
                    fluent: fluent.clone(),
                    precondition: self.dnf_opt(precondition)?,
                };
                releases.entry(action.clone()).or_default().push(rule);
            }
        }
        if releases.is_empty() {
            return Ok(Vec::new());
        }

        // Released fluents are combined with whatever the action causes.
        let mut effects = self.effect_rules(causes)?;
        let mut out = Vec::new();
        for (action, rules) in &releases {
            let effects = effects.remove(action).unwrap_or_default();
            let mut edges = Vec::new();
            for source in graph.states() {
                if graph.is_vetoed(source, action) {
                    continue;
                }
                let base = Self::triggered_effect(&effects, source).unwrap_or_else(Dnf::valid);
                for rule in rules.iter().filter(|r| precondition_holds(&r.precondition, source)) {
                    for lit in [rule.fluent.pos(), rule.fluent.neg()] {
                        let effect = base.and(&Expr::lit(&lit).to_dnf());
                        edges.extend(self.edges_to(graph, source, action, &effect));
                    }
                }
            }
            debug!("releases: {} produces {} edges", action, edges.len());
            out.push(Contribution::Edges(edges));
        }
        Ok(out)
    }

    /// Walks an `after` chain backwards from its ending states.
    ///
    /// Actions run in the listed order, so the last listed action is executed
    /// last. Ending candidates are the targets of its edges that satisfy the
    /// effect; predecessor sets are then taken through the listed actions from
    /// last to first, and the initial states are pruned to those the walk
    /// reaches.
    fn after(&mut self, graph: &TransitionGraph, statement: &Statement) -> Result<Contribution> {
        let (text, effect, actions) = match statement {
            Statement::After { text, effect, actions } => (text, effect, actions),
            other => return Err(Error::parse(other.text(), "not an 'after' statement")),
        };
        let effect = self.dnf(effect)?;
        let last = actions
            .last()
            .ok_or_else(|| Error::parse(text.as_str(), "missing actions after 'after'"))?;

        let ending: BTreeSet<State> = graph
            .edges_labeled(last)
            .map(Edge::target)
            .filter(|t| effect.eval(t))
            .cloned()
            .collect();
        if ending.is_empty() {
            return Err(Error::contradiction(
                text.as_str(),
                format!("no {} transition reaches a state satisfying the effect", last),
            ));
        }

        let mut frontier = ending.clone();
        for action in actions.iter().rev() {
            frontier = graph.predecessors(&frontier, action);
            trace!("after: {} predecessors through {}", frontier.len(), action);
            if frontier.is_empty() {
                return Err(Error::contradiction(
                    text.as_str(),
                    format!("no state leads into the chain through {}", action),
                ));
            }
        }

        let initial: BTreeSet<State> = graph.initial_states().intersection(&frontier).cloned().collect();
        if initial.is_empty() {
            return Err(Error::contradiction(
                text.as_str(),
                "no initial state can execute the action chain",
            ));
        }
        debug!(
            "after: '{}' keeps {} initial states, marks {} ending states",
            text,
            initial.len(),
            ending.len()
        );
        Ok(Contribution::After { initial, ending })
    }
}

fn lasts(group: &[&Statement]) -> Vec<Contribution> {
    group
        .iter()
        .filter_map(|statement| match statement {
            Statement::Lasts { text, action, duration } => Some(Contribution::Duration {
                text: text.clone(),
                action: action.clone(),
                duration: *duration,
            }),
            _ => None,
        })
        .collect()
}

fn noninertial(group: &[&Statement]) -> Vec<Contribution> {
    group
        .iter()
        .filter_map(|statement| match statement {
            Statement::Noninertial { text, fluents } => {
                warn!("'{}' is recorded but has no effect on transitions", text);
                Some(Contribution::Noninertial(fluents.clone()))
            }
            _ => None,
        })
        .collect()
}

/// Compiles statements with the default configuration.
pub fn compile<S: AsRef<str>>(statements: &[S]) -> Result<TransitionGraph> {
    Compiler::default().compile(statements)
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    use crate::formula::normalize;

    fn state(pairs: &[(&str, bool)]) -> State {
        State::from_values(pairs.iter().map(|&(f, v)| (Fluent::new(f), v)))
    }

    #[test]
    fn test_minimal_change() {
        let fluents: Vec<Fluent> = ["a", "b", "c"].iter().map(|&n| Fluent::new(n)).collect();
        let states: Vec<State> = (0..8).map(|bits| State::from_bits(&fluents, bits)).collect();
        let source = state(&[("a", false), ("b", false), ("c", false)]);

        let effect = normalize("a").unwrap();
        let targets = minimal_change(&states, &source, &effect);
        assert_eq!(targets, vec![state(&[("a", true), ("b", false), ("c", false)])]);

        // Two equally close ways to satisfy a disjunction.
        let effect = normalize("a | b").unwrap();
        assert_eq!(minimal_change(&states, &source, &effect).len(), 2);

        let effect = normalize("a & ~a").unwrap();
        assert!(minimal_change(&states, &source, &effect).is_empty());
    }

    #[test]
    fn test_minimal_change_keeps_satisfied_source() {
        let fluents = vec![Fluent::new("a")];
        let states: Vec<State> = (0..2).map(|bits| State::from_bits(&fluents, bits)).collect();
        let source = state(&[("a", true)]);
        let effect = normalize("a").unwrap();
        assert_eq!(minimal_change(&states, &source, &effect), vec![source]);
    }

    #[test]
    fn test_bare_impossible_resolution() {
        let graph = compile(&["Shoot causes ~alive", "impossible Shoot"]).unwrap();
        assert_eq!(graph.vetoes().len(), 1);
        assert!(graph.impossible().is_empty());
        assert!(graph.edges().is_empty());

        let graph = compile(&["Shoot causes ~alive", "impossible alive"]).unwrap();
        assert!(graph.vetoes().is_empty());
        assert_eq!(graph.impossible().len(), 1);
        assert_eq!(graph.states().len(), 1);
    }

    #[test]
    fn test_fluent_action_clash() {
        let err = compile(&["Load causes loaded", "initially Load"]).unwrap_err();
        assert!(err.is_parse());
        assert_eq!(err.input(), "initially Load");
    }

    #[test]
    fn test_fluent_limit() {
        let mut compiler = Compiler::new(CompilerConfig::default().with_max_fluents(2));
        let err = compiler.compile(&["initially a", "initially b & c"]).unwrap_err();
        assert!(err.is_parse());
        assert_eq!(err.input(), "initially b & c");
        assert!(err.to_string().contains("3 fluents"));

        assert!(compiler.compile(&["initially a", "initially b"]).is_ok());
    }

    #[test]
    fn test_default_duration() {
        let mut compiler = Compiler::new(CompilerConfig::default().with_default_duration(3));
        let graph = compiler.compile(&["Toggle causes on if ~on"]).unwrap();
        assert_eq!(graph.edges().len(), 1);
        assert_eq!(graph.edges()[0].duration(), 3);
    }

    #[test]
    fn test_formula_cache() {
        let mut compiler = Compiler::default();
        compiler
            .compile(&["A causes x if y", "B causes x if y", "initially y"])
            .unwrap();
        assert!(compiler.cache().hits() > 0);

        let mut compiler = Compiler::new(CompilerConfig::default().with_memoize_formulas(false));
        compiler
            .compile(&["A causes x if y", "B causes x if y", "initially y"])
            .unwrap();
        assert_eq!(compiler.cache().hits(), 0);
        assert!(compiler.cache().is_empty());
    }

    #[test]
    fn test_parse_error_builds_nothing() {
        let err = compile(&["initially alive", "Load causes (loaded"]).unwrap_err();
        assert!(err.is_parse());
        assert_eq!(err.input(), "Load causes (loaded");
    }

    #[test]
    fn test_compile_program() {
        let program = "# toggle\ninitially ~on\nToggle causes on if ~on; Toggle causes ~on if on\n";
        let graph = Compiler::default().compile_program(program).unwrap();
        assert_eq!(graph.edges().len(), 2);
        assert_eq!(graph.initial_states().len(), 1);
    }
}
