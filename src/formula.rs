//! Propositional formulas over fluents.
//!
//! Formulas are written with the connectives `and`/`&`, `or`/`|`,
//! `not`/`~`/`¬`, `implies`/`=>` and `iff`/`<=>`, plus the constants `true`
//! and `false`. Parsing produces an [`Expr`] tree, which is then normalized to
//! disjunctive normal form ([`Dnf`]): an OR of clauses, each clause an AND of
//! signed literals.
//!
//! Precedence, loosest first: `<=>`, `=>` (right-associative), `or`, `and`, `not`.
//!
//! # Example
//!
//! ```
//! use action_graph::formula::normalize;
//!
//! let dnf = normalize("loaded implies alive").unwrap();
//! assert_eq!(dnf.to_string(), "(alive) or (~loaded)");
//!
//! let contradiction = normalize("alive and not alive").unwrap();
//! assert!(contradiction.is_unsatisfiable());
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::error::{Error, Result};
use crate::state::State;
use crate::types::{Fluent, Lit};

/// A propositional formula tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Expr {
    Const(bool),
    Var(Fluent),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Implies(Box<Expr>, Box<Expr>),
    Iff(Box<Expr>, Box<Expr>),
}

impl Expr {
    pub fn var(fluent: impl Into<Fluent>) -> Self {
        Expr::Var(fluent.into())
    }

    pub fn lit(lit: &Lit) -> Self {
        let var = Expr::Var(lit.fluent().clone());
        if lit.polarity() {
            var
        } else {
            Expr::not(var)
        }
    }

    pub fn not(value: Self) -> Self {
        match value {
            Expr::Not(inner) => *inner,
            Expr::Const(b) => Expr::Const(!b),
            _ => Expr::Not(Box::new(value)),
        }
    }

    pub fn and(lhs: Self, rhs: Self) -> Self {
        Expr::And(Box::new(lhs), Box::new(rhs))
    }

    pub fn or(lhs: Self, rhs: Self) -> Self {
        Expr::Or(Box::new(lhs), Box::new(rhs))
    }

    pub fn implies(lhs: Self, rhs: Self) -> Self {
        Expr::Implies(Box::new(lhs), Box::new(rhs))
    }

    pub fn iff(lhs: Self, rhs: Self) -> Self {
        Expr::Iff(Box::new(lhs), Box::new(rhs))
    }

    /// Conjunction of all given formulas; `true` when there are none.
    pub fn all(exprs: impl IntoIterator<Item = Expr>) -> Self {
        exprs.into_iter().reduce(Expr::and).unwrap_or(Expr::Const(true))
    }

    /// Every fluent mentioned in this formula.
    pub fn fluents(&self) -> BTreeSet<Fluent> {
        let mut out = BTreeSet::new();
        self.collect_fluents(&mut out);
        out
    }

    fn collect_fluents(&self, out: &mut BTreeSet<Fluent>) {
        match self {
            Expr::Const(_) => {}
            Expr::Var(f) => {
                out.insert(f.clone());
            }
            Expr::Not(e) => e.collect_fluents(out),
            Expr::And(a, b) | Expr::Or(a, b) | Expr::Implies(a, b) | Expr::Iff(a, b) => {
                a.collect_fluents(out);
                b.collect_fluents(out);
            }
        }
    }

    /// If this formula is a conjunction of literals, returns those literals.
    pub fn as_conjunction(&self) -> Option<Vec<Lit>> {
        match self {
            Expr::Const(true) => Some(Vec::new()),
            Expr::Var(f) => Some(vec![f.pos()]),
            Expr::Not(e) => match e.as_ref() {
                Expr::Var(f) => Some(vec![f.neg()]),
                _ => None,
            },
            Expr::And(a, b) => {
                let mut lits = a.as_conjunction()?;
                lits.extend(b.as_conjunction()?);
                Some(lits)
            }
            _ => None,
        }
    }

    /// Normalizes this formula to disjunctive normal form.
    pub fn to_dnf(&self) -> Dnf {
        let mut dnf = Dnf {
            clauses: self.clauses(true),
        };
        dnf.simplify();
        dnf
    }

    // Negation is pushed inwards while expanding, so `positive == false`
    // yields the clauses of the negated subformula.
    fn clauses(&self, positive: bool) -> Vec<Clause> {
        match self {
            Expr::Const(b) => {
                if *b == positive {
                    vec![Clause::default()]
                } else {
                    vec![]
                }
            }
            Expr::Var(f) => vec![Clause::unit(Lit::new(f.clone(), positive))],
            Expr::Not(e) => e.clauses(!positive),
            Expr::And(a, b) => {
                if positive {
                    product(a.clauses(true), b.clauses(true))
                } else {
                    union(a.clauses(false), b.clauses(false))
                }
            }
            Expr::Or(a, b) => {
                if positive {
                    union(a.clauses(true), b.clauses(true))
                } else {
                    product(a.clauses(false), b.clauses(false))
                }
            }
            Expr::Implies(a, b) => {
                if positive {
                    union(a.clauses(false), b.clauses(true))
                } else {
                    product(a.clauses(true), b.clauses(false))
                }
            }
            Expr::Iff(a, b) => {
                if positive {
                    union(
                        product(a.clauses(true), b.clauses(true)),
                        product(a.clauses(false), b.clauses(false)),
                    )
                } else {
                    union(
                        product(a.clauses(true), b.clauses(false)),
                        product(a.clauses(false), b.clauses(true)),
                    )
                }
            }
        }
    }
}

fn union(mut lhs: Vec<Clause>, rhs: Vec<Clause>) -> Vec<Clause> {
    lhs.extend(rhs);
    lhs
}

fn product(lhs: Vec<Clause>, rhs: Vec<Clause>) -> Vec<Clause> {
    let mut out = Vec::with_capacity(lhs.len() * rhs.len());
    for a in &lhs {
        for b in &rhs {
            if let Some(c) = a.merge(b) {
                out.push(c);
            }
        }
    }
    out
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Const(b) => write!(f, "{}", b),
            Expr::Var(v) => write!(f, "{}", v),
            Expr::Not(e) => write!(f, "~{}", e),
            Expr::And(a, b) => write!(f, "({} and {})", a, b),
            Expr::Or(a, b) => write!(f, "({} or {})", a, b),
            Expr::Implies(a, b) => write!(f, "({} => {})", a, b),
            Expr::Iff(a, b) => write!(f, "({} <=> {})", a, b),
        }
    }
}

/// A conjunction of signed literals, at most one per fluent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Clause {
    lits: BTreeMap<Fluent, bool>,
}

impl Clause {
    pub fn unit(lit: Lit) -> Self {
        let mut lits = BTreeMap::new();
        lits.insert(lit.fluent().clone(), lit.polarity());
        Clause { lits }
    }

    /// Number of literals.
    pub fn len(&self) -> usize {
        self.lits.len()
    }

    /// An empty clause is the constant `true`.
    pub fn is_empty(&self) -> bool {
        self.lits.is_empty()
    }

    pub fn lits(&self) -> impl Iterator<Item = Lit> + '_ {
        self.lits.iter().map(|(f, &v)| Lit::new(f.clone(), v))
    }

    /// Conjunction of two clauses, or `None` if they clash on some fluent.
    pub fn merge(&self, other: &Clause) -> Option<Clause> {
        let mut lits = self.lits.clone();
        for (f, &v) in &other.lits {
            match lits.get(f) {
                Some(&w) if w != v => return None,
                Some(_) => {}
                None => {
                    lits.insert(f.clone(), v);
                }
            }
        }
        Some(Clause { lits })
    }

    /// True if every literal of `self` also appears in `other`.
    pub fn subsumes(&self, other: &Clause) -> bool {
        self.lits.iter().all(|(f, v)| other.lits.get(f) == Some(v))
    }

    /// True if the state assigns every literal its required value.
    pub fn eval(&self, state: &State) -> bool {
        self.lits.iter().all(|(f, &v)| state.get(f.name()) == Some(v))
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.lits.is_empty() {
            return write!(f, "true");
        }
        for (i, lit) in self.lits().enumerate() {
            if i > 0 {
                write!(f, " and ")?;
            }
            write!(f, "{}", lit)?;
        }
        Ok(())
    }
}

/// A formula in disjunctive normal form.
///
/// An empty DNF is unsatisfiable; a DNF containing the empty clause is valid.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Dnf {
    clauses: Vec<Clause>,
}

impl Dnf {
    /// The constant `true`.
    pub fn valid() -> Self {
        Dnf {
            clauses: vec![Clause::default()],
        }
    }

    /// The constant `false`.
    pub fn unsatisfiable() -> Self {
        Dnf { clauses: Vec::new() }
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn is_unsatisfiable(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn is_valid(&self) -> bool {
        self.clauses.iter().any(Clause::is_empty)
    }

    /// True iff at least one clause is fully matched by the state.
    pub fn eval(&self, state: &State) -> bool {
        self.clauses.iter().any(|c| c.eval(state))
    }

    /// Conjunction of two DNFs.
    pub fn and(&self, other: &Dnf) -> Dnf {
        let mut dnf = Dnf {
            clauses: product(self.clauses.clone(), other.clauses.clone()),
        };
        dnf.simplify();
        dnf
    }

    /// Conjunction of all given DNFs; `true` when there are none.
    pub fn all<'a>(dnfs: impl IntoIterator<Item = &'a Dnf>) -> Dnf {
        dnfs.into_iter().fold(Dnf::valid(), |acc, d| acc.and(d))
    }

    /// Every fluent mentioned by some clause.
    pub fn fluents(&self) -> BTreeSet<Fluent> {
        self.clauses
            .iter()
            .flat_map(|c| c.lits.keys().cloned())
            .collect()
    }

    /// Removes duplicate and subsumed clauses, keeping a canonical order.
    fn simplify(&mut self) {
        self.clauses.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
        self.clauses.dedup();
        let mut kept: Vec<Clause> = Vec::with_capacity(self.clauses.len());
        for clause in self.clauses.drain(..) {
            if !kept.iter().any(|k| k.subsumes(&clause)) {
                kept.push(clause);
            }
        }
        self.clauses = kept;
    }
}

impl fmt::Display for Dnf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.clauses.is_empty() {
            return write!(f, "false");
        }
        for (i, clause) in self.clauses.iter().enumerate() {
            if i > 0 {
                write!(f, " or ")?;
            }
            write!(f, "({})", clause)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident(String),
    True,
    False,
    Not,
    And,
    Or,
    Implies,
    Iff,
    LParen,
    RParen,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Ident(s) => write!(f, "'{}'", s),
            Token::True => write!(f, "'true'"),
            Token::False => write!(f, "'false'"),
            Token::Not => write!(f, "negation"),
            Token::And => write!(f, "'and'"),
            Token::Or => write!(f, "'or'"),
            Token::Implies => write!(f, "'=>'"),
            Token::Iff => write!(f, "'<=>'"),
            Token::LParen => write!(f, "'('"),
            Token::RParen => write!(f, "')'"),
        }
    }
}

/// Returns true for words that are connectives or constants, not identifiers.
pub fn is_keyword(word: &str) -> bool {
    matches!(word, "and" | "or" | "not" | "implies" | "iff" | "true" | "false")
}

/// Returns true if `word` is a valid fluent or action identifier.
pub fn is_identifier(word: &str) -> bool {
    let mut chars = word.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_') && !is_keyword(word)
}

fn tokenize(text: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = text.char_indices().peekable();

    while let Some(&(i, c)) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '~' | '¬' | '!' => {
                chars.next();
                tokens.push(Token::Not);
            }
            '&' => {
                chars.next();
                tokens.push(Token::And);
            }
            '|' => {
                chars.next();
                tokens.push(Token::Or);
            }
            '=' => {
                if text[i..].starts_with("=>") {
                    chars.next();
                    chars.next();
                    tokens.push(Token::Implies);
                } else {
                    return Err(Error::parse(text, format!("unexpected '=' at offset {}", i)));
                }
            }
            '<' => {
                if text[i..].starts_with("<=>") {
                    chars.next();
                    chars.next();
                    chars.next();
                    tokens.push(Token::Iff);
                } else {
                    return Err(Error::parse(text, format!("unexpected '<' at offset {}", i)));
                }
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                let mut end = i;
                while let Some(&(j, d)) = chars.peek() {
                    if d.is_ascii_alphanumeric() || d == '_' {
                        end = j + d.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                let word = &text[start..end];
                tokens.push(match word {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    "implies" => Token::Implies,
                    "iff" => Token::Iff,
                    "true" => Token::True,
                    "false" => Token::False,
                    _ => Token::Ident(word.to_string()),
                });
            }
            other => {
                return Err(Error::parse(
                    text,
                    format!("unexpected character '{}' at offset {}", other, i),
                ));
            }
        }
    }

    Ok(tokens)
}

struct Parser<'a> {
    text: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn error(&self, reason: impl Into<String>) -> Error {
        Error::parse(self.text, reason)
    }

    fn parse_iff(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_implies()?;
        while self.eat(&Token::Iff) {
            let rhs = self.parse_implies()?;
            lhs = Expr::iff(lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_implies(&mut self) -> Result<Expr> {
        let lhs = self.parse_or()?;
        if self.eat(&Token::Implies) {
            let rhs = self.parse_implies()?;
            return Ok(Expr::implies(lhs, rhs));
        }
        Ok(lhs)
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_and()?;
        while self.eat(&Token::Or) {
            let rhs = self.parse_and()?;
            lhs = Expr::or(lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_unary()?;
        while self.eat(&Token::And) {
            let rhs = self.parse_unary()?;
            lhs = Expr::and(lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        if self.eat(&Token::Not) {
            let inner = self.parse_unary()?;
            return Ok(Expr::not(inner));
        }
        self.parse_atom()
    }

    fn parse_atom(&mut self) -> Result<Expr> {
        let token = match self.tokens.get(self.pos) {
            Some(t) => t.clone(),
            None => return Err(self.error("unexpected end of formula")),
        };
        self.pos += 1;
        match token {
            Token::Ident(name) => Ok(Expr::var(name)),
            Token::True => Ok(Expr::Const(true)),
            Token::False => Ok(Expr::Const(false)),
            Token::LParen => {
                let inner = self.parse_iff()?;
                if !self.eat(&Token::RParen) {
                    return Err(self.error("missing closing parenthesis"));
                }
                Ok(inner)
            }
            other => Err(self.error(format!("unexpected {}", other))),
        }
    }
}

/// Parses formula text into an [`Expr`].
pub fn parse(text: &str) -> Result<Expr> {
    let tokens = tokenize(text)?;
    if tokens.is_empty() {
        return Err(Error::parse(text, "empty formula"));
    }
    let mut parser = Parser { text, tokens, pos: 0 };
    let expr = parser.parse_iff()?;
    if let Some(token) = parser.peek() {
        return Err(parser.error(format!("unexpected {} after end of formula", token)));
    }
    Ok(expr)
}

/// Parses formula text and normalizes it to DNF.
pub fn normalize(text: &str) -> Result<Dnf> {
    Ok(parse(text)?.to_dnf())
}

/// Evaluates formula text against a state.
pub fn evaluate(text: &str, state: &State) -> Result<bool> {
    Ok(normalize(text)?.eval(state))
}

/// Every identifier in the formula text (connectives and parentheses excluded).
pub fn extract_fluents(text: &str) -> Result<BTreeSet<Fluent>> {
    Ok(tokenize(text)?
        .into_iter()
        .filter_map(|t| match t {
            Token::Ident(name) => Some(Fluent::new(name)),
            _ => None,
        })
        .collect())
}
