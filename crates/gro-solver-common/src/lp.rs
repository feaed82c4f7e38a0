//! Canonical MILP problem form and its CPLEX LP text codec.
//!
//! Both sides of the worker pipe share this representation: the engine's
//! model builder produces an [`LpProblem`], the pool transmits the rendered
//! LP text, and the worker parses it back before handing it to the solver
//! library. All coefficients, bounds and right-hand sides are integers; the
//! engine's scaling guarantees this, and keeping the wire integer-only makes
//! solves reproducible across platforms.
//!
//! The dialect is standard CPLEX LP format restricted to what the engine
//! emits: `Minimize`, `Subject To`, `Bounds`, `General`, `Binary`, `End`;
//! one constraint per line; named constraints `c0..`; variables `x0..`/`y0..`.

use crate::error::LpParseError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Variable integrality class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VarKind {
    /// General integer with explicit bounds.
    Integer,
    /// Binary selector (0/1).
    Binary,
}

/// One decision variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LpVariable {
    pub name: String,
    pub kind: VarKind,
    pub lower: i64,
    /// `i64::MAX` encodes "unbounded above"; the engine never emits it.
    pub upper: i64,
}

/// One `coefficient × variable` term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LpTerm {
    pub coeff: i64,
    /// Index into [`LpProblem::variables`].
    pub var: usize,
}

/// Constraint comparison sense.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cmp {
    Ge,
    Le,
    Eq,
}

impl Cmp {
    fn as_str(&self) -> &'static str {
        match self {
            Cmp::Ge => ">=",
            Cmp::Le => "<=",
            Cmp::Eq => "=",
        }
    }
}

/// One linear constraint `Σ terms  cmp  rhs`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LpConstraint {
    pub name: String,
    pub terms: Vec<LpTerm>,
    pub cmp: Cmp,
    pub rhs: i64,
}

/// A complete minimization MILP with integer data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LpProblem {
    pub variables: Vec<LpVariable>,
    /// Objective terms (minimized).
    pub objective: Vec<LpTerm>,
    pub constraints: Vec<LpConstraint>,
}

impl LpProblem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a variable, returning its index.
    pub fn add_variable(
        &mut self,
        name: impl Into<String>,
        kind: VarKind,
        lower: i64,
        upper: i64,
    ) -> usize {
        self.variables.push(LpVariable {
            name: name.into(),
            kind,
            lower,
            upper,
        });
        self.variables.len() - 1
    }

    /// Add a named constraint, returning its index.
    pub fn add_constraint(&mut self, terms: Vec<LpTerm>, cmp: Cmp, rhs: i64) -> usize {
        let name = format!("c{}", self.constraints.len());
        self.constraints.push(LpConstraint {
            name,
            terms,
            cmp,
            rhs,
        });
        self.constraints.len() - 1
    }

    pub fn variable_index(&self, name: &str) -> Option<usize> {
        self.variables.iter().position(|v| v.name == name)
    }

    /// Render the canonical LP text.
    ///
    /// Deterministic: identical problems render to identical bytes.
    pub fn to_lp_format(&self) -> String {
        let mut out = String::new();
        out.push_str("Minimize\n obj:");
        self.push_terms(&mut out, &self.objective);
        out.push('\n');

        out.push_str("Subject To\n");
        for constraint in &self.constraints {
            out.push(' ');
            out.push_str(&constraint.name);
            out.push(':');
            self.push_terms(&mut out, &constraint.terms);
            out.push(' ');
            out.push_str(constraint.cmp.as_str());
            out.push(' ');
            out.push_str(&constraint.rhs.to_string());
            out.push('\n');
        }

        let integers: Vec<&LpVariable> = self
            .variables
            .iter()
            .filter(|v| v.kind == VarKind::Integer)
            .collect();
        let binaries: Vec<&LpVariable> = self
            .variables
            .iter()
            .filter(|v| v.kind == VarKind::Binary)
            .collect();

        if !integers.is_empty() {
            out.push_str("Bounds\n");
            for variable in &integers {
                out.push_str(&format!(
                    " {} <= {} <= {}\n",
                    variable.lower, variable.name, variable.upper
                ));
            }
            out.push_str("General\n ");
            out.push_str(
                &integers
                    .iter()
                    .map(|v| v.name.as_str())
                    .collect::<Vec<_>>()
                    .join(" "),
            );
            out.push('\n');
        }

        if !binaries.is_empty() {
            out.push_str("Binary\n ");
            out.push_str(
                &binaries
                    .iter()
                    .map(|v| v.name.as_str())
                    .collect::<Vec<_>>()
                    .join(" "),
            );
            out.push('\n');
        }

        out.push_str("End\n");
        out
    }

    // An all-zero constraint still needs a syntactically valid body, so a
    // lone zero-coefficient term on the first variable stands in.
    fn push_terms(&self, out: &mut String, terms: &[LpTerm]) {
        if terms.is_empty() {
            let name = self
                .variables
                .first()
                .map(|v| v.name.as_str())
                .unwrap_or("x0");
            out.push_str(&format!(" 0 {}", name));
            return;
        }
        for (i, term) in terms.iter().enumerate() {
            let name = &self.variables[term.var].name;
            if i == 0 {
                out.push_str(&format!(" {} {}", term.coeff, name));
            } else if term.coeff < 0 {
                out.push_str(&format!(" - {} {}", -term.coeff, name));
            } else {
                out.push_str(&format!(" + {} {}", term.coeff, name));
            }
        }
    }

    /// Parse the canonical LP dialect back into a problem.
    pub fn parse(text: &str) -> Result<LpProblem, LpParseError> {
        Parser::default().parse(text)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Plus,
    Minus,
    Colon,
    Cmp(Cmp),
    Num(i64),
    Ident(String),
}

fn tokenize(line: &str, lineno: usize) -> Result<Vec<Token>, LpParseError> {
    let mut tokens = Vec::new();
    let mut chars = line.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '+' => {
                chars.next();
                tokens.push(Token::Plus);
            }
            '-' => {
                chars.next();
                tokens.push(Token::Minus);
            }
            ':' => {
                chars.next();
                tokens.push(Token::Colon);
            }
            '<' | '>' | '=' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                }
                tokens.push(Token::Cmp(match c {
                    '<' => Cmp::Le,
                    '>' => Cmp::Ge,
                    _ => Cmp::Eq,
                }));
            }
            c if c.is_ascii_digit() => {
                let mut literal = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' {
                        literal.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let value: f64 = literal
                    .parse()
                    .map_err(|_| LpParseError::new(lineno, format!("bad number {literal:?}")))?;
                if value.fract() != 0.0 {
                    return Err(LpParseError::new(
                        lineno,
                        format!("non-integer coefficient {literal}"),
                    ));
                }
                tokens.push(Token::Num(value as i64));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut ident = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_alphanumeric() || d == '_' {
                        ident.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(ident));
            }
            other => {
                return Err(LpParseError::new(
                    lineno,
                    format!("unexpected character {other:?}"),
                ));
            }
        }
    }
    Ok(tokens)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Preamble,
    Objective,
    Constraints,
    Bounds,
    General,
    Binary,
}

#[derive(Default)]
struct Parser {
    problem: LpProblem,
    index: HashMap<String, usize>,
}

impl Parser {
    fn var(&mut self, name: &str) -> usize {
        if let Some(&i) = self.index.get(name) {
            return i;
        }
        let i = self
            .problem
            .add_variable(name, VarKind::Integer, 0, i64::MAX);
        self.index.insert(name.to_string(), i);
        i
    }

    fn parse(mut self, text: &str) -> Result<LpProblem, LpParseError> {
        let mut section = Section::Preamble;
        let mut objective_tokens: Vec<Token> = Vec::new();
        let mut objective_line = 0usize;

        for (i, raw) in text.lines().enumerate() {
            let lineno = i + 1;
            // '\' starts a comment in LP format
            let line = raw.split('\\').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            match section_keyword(line) {
                Some(next) => {
                    section = next;
                    continue;
                }
                None if line.eq_ignore_ascii_case("end") => break,
                None => {}
            }

            let tokens = tokenize(line, lineno)?;
            match section {
                Section::Preamble => {
                    return Err(LpParseError::new(lineno, "expected Minimize header"));
                }
                Section::Objective => {
                    objective_line = lineno;
                    objective_tokens.extend(tokens);
                }
                Section::Constraints => self.parse_constraint(tokens, lineno)?,
                Section::Bounds => self.parse_bound(tokens, lineno)?,
                Section::General => self.mark_vars(tokens, VarKind::Integer, lineno)?,
                Section::Binary => self.mark_vars(tokens, VarKind::Binary, lineno)?,
            }
        }

        let tokens = strip_label(objective_tokens);
        let (terms, rest) = self.parse_terms(tokens, objective_line)?;
        if !rest.is_empty() {
            return Err(LpParseError::new(
                objective_line,
                "trailing tokens after objective",
            ));
        }
        self.problem.objective = terms;
        Ok(self.problem)
    }

    fn parse_constraint(&mut self, tokens: Vec<Token>, lineno: usize) -> Result<(), LpParseError> {
        let mut tokens = tokens;
        let name = match (tokens.first(), tokens.get(1)) {
            (Some(Token::Ident(_)), Some(Token::Colon)) => {
                let Token::Ident(name) = tokens.remove(0) else {
                    unreachable!()
                };
                tokens.remove(0); // colon
                name
            }
            _ => format!("c{}", self.problem.constraints.len()),
        };
        let (terms, rest) = self.parse_terms(tokens, lineno)?;
        let mut rest = rest.into_iter();
        let cmp = match rest.next() {
            Some(Token::Cmp(cmp)) => cmp,
            _ => return Err(LpParseError::new(lineno, "constraint missing comparison")),
        };
        let rhs = match (rest.next(), rest.next()) {
            (Some(Token::Num(n)), None) => n,
            (Some(Token::Minus), Some(Token::Num(n))) => -n,
            _ => return Err(LpParseError::new(lineno, "constraint missing integer rhs")),
        };
        if rest.next().is_some() {
            return Err(LpParseError::new(lineno, "trailing tokens after rhs"));
        }
        self.problem.constraints.push(LpConstraint {
            name,
            terms,
            cmp,
            rhs,
        });
        Ok(())
    }

    /// Parse `[sign] [coeff] ident` terms up to the comparison operator (or
    /// end of input); returns the terms and the remaining tokens.
    fn parse_terms(
        &mut self,
        tokens: Vec<Token>,
        lineno: usize,
    ) -> Result<(Vec<LpTerm>, Vec<Token>), LpParseError> {
        let split = tokens
            .iter()
            .position(|t| matches!(t, Token::Cmp(_)))
            .unwrap_or(tokens.len());
        let rest: Vec<Token> = tokens[split..].to_vec();
        let mut terms = Vec::new();
        let mut iter = tokens.into_iter().take(split);
        while let Some(token) = iter.next() {
            let (sign, token) = match token {
                Token::Plus => (1, iter.next()),
                Token::Minus => (-1, iter.next()),
                other => (1, Some(other)),
            };
            let (coeff, token) = match token {
                Some(Token::Num(n)) => (n, iter.next()),
                other => (1, other),
            };
            match token {
                Some(Token::Ident(name)) => {
                    let var = self.var(&name);
                    terms.push(LpTerm {
                        coeff: sign * coeff,
                        var,
                    });
                }
                _ => return Err(LpParseError::new(lineno, "malformed term")),
            }
        }
        Ok((terms, rest))
    }

    fn parse_bound(&mut self, tokens: Vec<Token>, lineno: usize) -> Result<(), LpParseError> {
        match tokens.as_slice() {
            // lo <= var <= hi
            [Token::Num(lo), Token::Cmp(Cmp::Le), Token::Ident(name), Token::Cmp(Cmp::Le), Token::Num(hi)] =>
            {
                let var = self.var(name);
                self.problem.variables[var].lower = *lo;
                self.problem.variables[var].upper = *hi;
                Ok(())
            }
            [Token::Ident(name), Token::Cmp(Cmp::Le), Token::Num(hi)] => {
                let var = self.var(name);
                self.problem.variables[var].upper = *hi;
                Ok(())
            }
            [Token::Ident(name), Token::Cmp(Cmp::Ge), Token::Num(lo)] => {
                let var = self.var(name);
                self.problem.variables[var].lower = *lo;
                Ok(())
            }
            [Token::Ident(name), Token::Cmp(Cmp::Eq), Token::Num(value)] => {
                let var = self.var(name);
                self.problem.variables[var].lower = *value;
                self.problem.variables[var].upper = *value;
                Ok(())
            }
            _ => Err(LpParseError::new(lineno, "unsupported bound form")),
        }
    }

    fn mark_vars(
        &mut self,
        tokens: Vec<Token>,
        kind: VarKind,
        lineno: usize,
    ) -> Result<(), LpParseError> {
        for token in tokens {
            match token {
                Token::Ident(name) => {
                    let var = self.var(&name);
                    self.problem.variables[var].kind = kind;
                    if kind == VarKind::Binary {
                        self.problem.variables[var].lower = 0;
                        self.problem.variables[var].upper = 1;
                    }
                }
                _ => {
                    return Err(LpParseError::new(
                        lineno,
                        "expected variable names in integrality section",
                    ))
                }
            }
        }
        Ok(())
    }
}

fn strip_label(mut tokens: Vec<Token>) -> Vec<Token> {
    if tokens.len() >= 2
        && matches!(tokens[0], Token::Ident(_))
        && matches!(tokens[1], Token::Colon)
    {
        tokens.drain(0..2);
    }
    tokens
}

fn section_keyword(line: &str) -> Option<Section> {
    let lower = line.to_ascii_lowercase();
    match lower.as_str() {
        "minimize" | "min" | "minimise" => Some(Section::Objective),
        "subject to" | "st" | "s.t." | "such that" => Some(Section::Constraints),
        "bounds" | "bound" => Some(Section::Bounds),
        "general" | "generals" | "gen" => Some(Section::General),
        "binary" | "binaries" | "bin" => Some(Section::Binary),
        _ => None,
    }
}
