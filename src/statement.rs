//! Statements of the action language.
//!
//! ```text
//! initially  <formula>
//! <A> causes   <formula> [if <formula>]
//! <A> releases <fluent>  [if <formula>]
//! <A> lasts    <duration>
//! <formula> after <A1>, <A2>, ..., <An>
//! always     <formula>
//! impossible <A> [if <formula>]
//! impossible <formula>
//! noninertial <fluent>, ..., <fluent>
//! ```
//!
//! Keywords are case-sensitive whole words. A bare `impossible X` is ambiguous
//! on its own: it forbids the action `X` when `X` is used as an action
//! elsewhere, and the states satisfying fluent `X` otherwise. The compiler
//! resolves it once the whole vocabulary is known.

use std::collections::BTreeSet;
use std::fmt;

use crate::error::{Error, Result};
use crate::formula::{self, is_identifier, Expr};
use crate::types::{Action, Fluent};

/// Statement keywords; these can name neither fluents nor actions.
pub const KEYWORDS: [&str; 10] = [
    "initially",
    "causes",
    "releases",
    "lasts",
    "after",
    "always",
    "impossible",
    "noninertial",
    "if",
    "from",
];

/// The statement kinds, in the order the compiler processes them.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Kind {
    Always,
    Impossible,
    Initially,
    Causes,
    Releases,
    After,
    Lasts,
    Noninertial,
}

impl Kind {
    /// All kinds in compilation phase order.
    pub const PHASES: [Kind; 8] = [
        Kind::Always,
        Kind::Impossible,
        Kind::Initially,
        Kind::Causes,
        Kind::Releases,
        Kind::After,
        Kind::Lasts,
        Kind::Noninertial,
    ];

    pub fn keyword(self) -> &'static str {
        match self {
            Kind::Always => "always",
            Kind::Impossible => "impossible",
            Kind::Initially => "initially",
            Kind::Causes => "causes",
            Kind::Releases => "releases",
            Kind::After => "after",
            Kind::Lasts => "lasts",
            Kind::Noninertial => "noninertial",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.keyword())
    }
}

/// Body of an `impossible` statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Forbidden {
    /// `impossible <A> [if <pre>]`: the action is vetoed where `pre` holds.
    Action { action: Action, precondition: Option<Expr> },
    /// `impossible <formula>`: states satisfying the formula are excluded.
    States(Expr),
    /// `impossible <name>`: not yet known whether `name` is an action or a fluent.
    Unresolved(String),
}

/// A parsed statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    Initially {
        text: String,
        formula: Expr,
    },
    Causes {
        text: String,
        action: Action,
        effect: Expr,
        precondition: Option<Expr>,
    },
    Releases {
        text: String,
        action: Action,
        fluent: Fluent,
        precondition: Option<Expr>,
    },
    Lasts {
        text: String,
        action: Action,
        duration: u64,
    },
    After {
        text: String,
        effect: Expr,
        actions: Vec<Action>,
    },
    Always {
        text: String,
        formula: Expr,
    },
    Impossible {
        text: String,
        body: Forbidden,
    },
    Noninertial {
        text: String,
        fluents: Vec<Fluent>,
    },
}

impl Statement {
    /// Parses one statement.
    pub fn parse(input: &str) -> Result<Statement> {
        let text = input.trim().trim_end_matches(';').trim();
        if text.is_empty() {
            return Err(Error::parse(input, "empty statement"));
        }
        parse_statement(text).map_err(|e| e.with_input(text))
    }

    pub fn kind(&self) -> Kind {
        match self {
            Statement::Initially { .. } => Kind::Initially,
            Statement::Causes { .. } => Kind::Causes,
            Statement::Releases { .. } => Kind::Releases,
            Statement::Lasts { .. } => Kind::Lasts,
            Statement::After { .. } => Kind::After,
            Statement::Always { .. } => Kind::Always,
            Statement::Impossible { .. } => Kind::Impossible,
            Statement::Noninertial { .. } => Kind::Noninertial,
        }
    }

    /// The statement text as given (trimmed).
    pub fn text(&self) -> &str {
        match self {
            Statement::Initially { text, .. }
            | Statement::Causes { text, .. }
            | Statement::Releases { text, .. }
            | Statement::Lasts { text, .. }
            | Statement::After { text, .. }
            | Statement::Always { text, .. }
            | Statement::Impossible { text, .. }
            | Statement::Noninertial { text, .. } => text,
        }
    }

    /// Actions this statement refers to.
    ///
    /// An unresolved `impossible <name>` contributes nothing here.
    pub fn actions(&self) -> Vec<Action> {
        match self {
            Statement::Causes { action, .. }
            | Statement::Releases { action, .. }
            | Statement::Lasts { action, .. } => vec![action.clone()],
            Statement::After { actions, .. } => actions.clone(),
            Statement::Impossible {
                body: Forbidden::Action { action, .. },
                ..
            } => vec![action.clone()],
            _ => Vec::new(),
        }
    }

    /// Fluents this statement refers to.
    ///
    /// An unresolved `impossible <name>` contributes nothing here.
    pub fn fluents(&self) -> BTreeSet<Fluent> {
        let (formulas, named): (Vec<&Expr>, Vec<&Fluent>) = match self {
            Statement::Initially { formula, .. } | Statement::Always { formula, .. } => (vec![formula], vec![]),
            Statement::Causes {
                effect, precondition, ..
            } => (std::iter::once(effect).chain(precondition).collect(), vec![]),
            Statement::Releases {
                fluent, precondition, ..
            } => (precondition.iter().collect(), vec![fluent]),
            Statement::After { effect, .. } => (vec![effect], vec![]),
            Statement::Impossible { body, .. } => match body {
                Forbidden::Action { precondition, .. } => (precondition.iter().collect(), vec![]),
                Forbidden::States(formula) => (vec![formula], vec![]),
                Forbidden::Unresolved(_) => (vec![], vec![]),
            },
            Statement::Noninertial { fluents, .. } => (vec![], fluents.iter().collect()),
            Statement::Lasts { .. } => (vec![], vec![]),
        };
        formulas
            .into_iter()
            .flat_map(Expr::fluents)
            .chain(named.into_iter().cloned())
            .collect()
    }

    /// Resolves a bare `impossible <name>` once the action vocabulary is known.
    pub fn resolve(&mut self, actions: &BTreeSet<Action>) {
        if let Statement::Impossible { body, .. } = self {
            if let Forbidden::Unresolved(name) = body {
                *body = if actions.contains(name.as_str()) {
                    Forbidden::Action {
                        action: Action::new(name.clone()),
                        precondition: None,
                    }
                } else {
                    Forbidden::States(Expr::var(name.clone()))
                };
            }
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text())
    }
}

impl std::str::FromStr for Statement {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Statement::parse(s)
    }
}

/// Finds the first whole-word occurrence of `keyword` in `text`.
///
/// Returns the byte range of the match.
pub(crate) fn find_keyword(text: &str, keyword: &str) -> Option<(usize, usize)> {
    let is_word = |c: char| c.is_ascii_alphanumeric() || c == '_';
    let mut start = 0;
    while let Some(pos) = text[start..].find(keyword) {
        let begin = start + pos;
        let end = begin + keyword.len();
        let before_ok = text[..begin].chars().next_back().map_or(true, |c| !is_word(c));
        let after_ok = text[end..].chars().next().map_or(true, |c| !is_word(c));
        if before_ok && after_ok {
            return Some((begin, end));
        }
        start = end;
    }
    None
}

/// Splits `text` around the first whole-word `keyword`.
pub(crate) fn split_keyword<'a>(text: &'a str, keyword: &str) -> Option<(&'a str, &'a str)> {
    find_keyword(text, keyword).map(|(b, e)| (text[..b].trim(), text[e..].trim()))
}

fn check_name(text: &str, name: &str, what: &str) -> Result<()> {
    if !is_identifier(name) {
        return Err(Error::parse(text, format!("'{}' is not a valid {} name", name, what)));
    }
    if KEYWORDS.contains(&name) {
        return Err(Error::parse(text, format!("'{}' is a reserved word", name)));
    }
    Ok(())
}

fn parse_formula(text: &str, formula: &str) -> Result<Expr> {
    let expr = formula::parse(formula)?;
    for fluent in expr.fluents() {
        check_name(text, fluent.name(), "fluent")?;
    }
    Ok(expr)
}

/// Parses `<effect> [if <precondition>]`. An empty precondition means none.
fn parse_conditional(text: &str, body: &str) -> Result<(String, Option<Expr>)> {
    match split_keyword(body, "if") {
        Some((head, pre)) if pre.is_empty() => Ok((head.to_string(), None)),
        Some((head, pre)) => Ok((head.to_string(), Some(parse_formula(text, pre)?))),
        None => Ok((body.to_string(), None)),
    }
}

fn parse_actions(text: &str, list: &str) -> Result<Vec<Action>> {
    let mut actions = Vec::new();
    for name in list.split(',').map(str::trim) {
        if name.is_empty() {
            return Err(Error::parse(text, "empty action in action list"));
        }
        check_name(text, name, "action")?;
        actions.push(Action::new(name));
    }
    Ok(actions)
}

fn parse_statement(text: &str) -> Result<Statement> {
    let mut words = text.split_whitespace();
    let first = words.next().unwrap_or_default();
    let second = words.next().unwrap_or_default();
    let rest_after = |n: usize| -> &str {
        let mut rest = text;
        for _ in 0..n {
            rest = rest.trim_start();
            let cut = rest.find(char::is_whitespace).unwrap_or(rest.len());
            rest = &rest[cut..];
        }
        rest.trim()
    };
    let owned = text.to_string();

    match first {
        "initially" => {
            let formula = parse_formula(text, rest_after(1))?;
            return Ok(Statement::Initially { text: owned, formula });
        }
        "always" => {
            let formula = parse_formula(text, rest_after(1))?;
            return Ok(Statement::Always { text: owned, formula });
        }
        "impossible" => {
            let body = rest_after(1);
            if body.is_empty() {
                return Err(Error::parse(text, "missing action or formula after 'impossible'"));
            }
            let body = match split_keyword(body, "if") {
                Some((head, pre)) => {
                    check_name(text, head, "action")?;
                    let precondition = if pre.is_empty() {
                        None
                    } else {
                        Some(parse_formula(text, pre)?)
                    };
                    Forbidden::Action {
                        action: Action::new(head),
                        precondition,
                    }
                }
                None if is_identifier(body) => {
                    check_name(text, body, "action or fluent")?;
                    Forbidden::Unresolved(body.to_string())
                }
                None => Forbidden::States(parse_formula(text, body)?),
            };
            return Ok(Statement::Impossible { text: owned, body });
        }
        "noninertial" => {
            let list = rest_after(1);
            if list.is_empty() {
                return Err(Error::parse(text, "missing fluents after 'noninertial'"));
            }
            let mut fluents = Vec::new();
            for name in list.split(|c: char| c == ',' || c.is_whitespace()).filter(|s| !s.is_empty()) {
                check_name(text, name, "fluent")?;
                fluents.push(Fluent::new(name));
            }
            return Ok(Statement::Noninertial { text: owned, fluents });
        }
        _ => {}
    }

    match second {
        "causes" => {
            check_name(text, first, "action")?;
            let (effect, precondition) = parse_conditional(text, rest_after(2))?;
            if effect.is_empty() {
                return Err(Error::parse(text, "missing effect formula"));
            }
            let effect = parse_formula(text, &effect)?;
            return Ok(Statement::Causes {
                text: owned,
                action: Action::new(first),
                effect,
                precondition,
            });
        }
        "releases" => {
            check_name(text, first, "action")?;
            let (fluent, precondition) = parse_conditional(text, rest_after(2))?;
            if fluent.is_empty() {
                return Err(Error::parse(text, "missing released fluent"));
            }
            check_name(text, &fluent, "fluent")?;
            return Ok(Statement::Releases {
                text: owned,
                action: Action::new(first),
                fluent: Fluent::new(fluent),
                precondition,
            });
        }
        "lasts" => {
            check_name(text, first, "action")?;
            let value = rest_after(2);
            let duration = value
                .parse::<u64>()
                .map_err(|_| Error::parse(text, format!("invalid duration '{}'", value)))?;
            return Ok(Statement::Lasts {
                text: owned,
                action: Action::new(first),
                duration,
            });
        }
        _ => {}
    }

    if let Some((effect, list)) = split_keyword(text, "after") {
        if effect.is_empty() {
            return Err(Error::parse(text, "missing effect formula before 'after'"));
        }
        if list.is_empty() {
            return Err(Error::parse(text, "missing actions after 'after'"));
        }
        let effect = parse_formula(text, effect)?;
        let actions = parse_actions(text, list)?;
        return Ok(Statement::After {
            text: owned,
            effect,
            actions,
        });
    }

    Err(Error::parse(text, "unknown statement kind"))
}

/// Splits program text into statements.
///
/// Statements are separated by newlines or `;`. Blank lines and lines starting
/// with `#` are skipped.
pub fn split_program(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.starts_with('#'))
        .flat_map(|line| line.split(';'))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
