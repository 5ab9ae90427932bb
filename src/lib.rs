//! # action-graph: an action language with durations, compiled to explicit graphs
//!
//! **`action-graph`** compiles a small action language into an explicit **transition graph**
//! over all truth assignments of its fluents, and answers modal queries over the result.
//!
//! ## The action language
//!
//! A domain is a list of statements:
//!
//! - `initially <formula>`: constrains the possible initial states.
//! - `<A> causes <formula> [if <formula>]`: executing `A` makes the effect true, changing as few fluents as possible.
//! - `<A> releases <fluent> [if <formula>]`: executing `A` may leave the fluent either true or false.
//! - `<A> lasts <n>`: every (non-self-loop) `A` transition takes `n` time units.
//! - `<formula> after <A1>, ..., <An>`: the formula holds after the chain, which prunes the initial states.
//! - `always <formula>` and `impossible <formula>`: global state constraints.
//! - `impossible <A> [if <formula>]`: `A` cannot be executed where the condition holds.
//!
//! Formulas use `and`/`&`, `or`/`|`, `not`/`~`, `implies`/`=>` and `iff`/`<=>`.
//!
//! ## Basic Usage
//!
//! ```rust
//! use action_graph::compile::compile;
//! use action_graph::query::{Condition, QueryEngine};
//! use action_graph::types::Action;
//!
//! // 1. Compile the Yale shooting domain
//! let graph = compile(&[
//!     "initially alive",
//!     "initially ~loaded",
//!     "Load causes loaded",
//!     "Shoot causes ~alive if loaded",
//!     "Shoot causes ~loaded",
//!     "Shoot lasts 2",
//! ])
//! .unwrap();
//! assert_eq!(graph.states().len(), 4);
//!
//! // 2. Ask questions about it
//! let engine = QueryEngine::new(&graph);
//! let plan = [Action::new("Load"), Action::new("Shoot")];
//! let pi = Condition::parse("alive and ~loaded").unwrap();
//!
//! let dead = Condition::parse("~alive").unwrap();
//! assert!(engine.necessary_alpha_after(&dead, &plan, &pi).unwrap());
//!
//! let outcome = engine.necessary_executable_with_cost(&plan, &pi, 2).unwrap();
//! assert!(outcome.holds);
//! assert_eq!(outcome.min_cost, Some(2));
//! ```
//!
//! ## Core Components
//!
//! - **[`formula`]**: Formula parsing and normalization to DNF.
//! - **[`graph`]**: The state space and the [`TransitionGraph`][crate::graph::TransitionGraph].
//! - **[`compile`]**: The [`Compiler`][crate::compile::Compiler], which runs the statement phases in a fixed order.
//! - **[`query`]**: The [`QueryEngine`][crate::query::QueryEngine] for `necessary`/`possibly` queries.

pub mod cache;
pub mod compile;
pub mod config;
pub mod error;
pub mod formula;
pub mod graph;
pub mod query;
pub mod state;
pub mod statement;
pub mod types;
