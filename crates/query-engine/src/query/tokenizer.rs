//! Tokenizer: one token per step, taken from the first consumer that matches.
//!
//! Consumers are tried in a fixed order: whitespace, combinator, group,
//! filter, then word or phrase.

use std::ops::Range;

use regex::Regex;

use crate::types::QueryError;

use super::graph::{QueryNodeType, Span};
use super::lexer::{first_lexeme, Lexeme};
use super::operation::FilterClause;

#[derive(Debug, Clone)]
pub(crate) enum Token<'a> {
    Whitespace,
    Combinator(QueryNodeType),
    /// Parenthesized group; `inner` excludes the parentheses.
    Group { inner: Range<usize> },
    Filter(FilterClause<'a>),
    Word { text: &'a str, exact: bool },
}

#[derive(Debug, Clone)]
pub(crate) struct Lexed<'a> {
    pub token: Token<'a>,
    pub span: Span,
}

impl<'a> Lexed<'a> {
    fn new(token: Token<'a>, index: usize, length: usize) -> Self {
        Self {
            token,
            span: Span::new(index, length),
        }
    }
}

/// Recognizes `token(param)<op>value` clauses for one operator set.
///
/// The operator is the longest registered one at its position; a shorter
/// operator is never tried in its place. An unquoted value may not start
/// with an operator, so `age>=` and `age==` are not filters.
#[derive(Debug, Clone)]
pub(crate) struct FilterPattern {
    head: Regex,
    value: Regex,
    operators: Vec<String>,
}

/// Builds the filter pattern for a set of operator tokens.
pub(crate) fn filter_pattern<'a>(
    operators: impl IntoIterator<Item = &'a str>,
) -> Option<FilterPattern> {
    let mut operators = operators
        .into_iter()
        .map(str::to_string)
        .collect::<Vec<_>>();
    if operators.is_empty() {
        return None;
    }
    operators.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    let build = |pattern: &str| match Regex::new(pattern) {
        Ok(regex) => Some(regex),
        Err(err) => {
            log::warn!("failed to build filter pattern: {err}");
            None
        }
    };
    Some(FilterPattern {
        head: build(r"^(?P<token>[\w.#]+)(?:\((?P<param>[^()]*)\))?")?,
        value: build(r#"^(?:"[^"]*"|[^\s()]+)"#)?,
        operators,
    })
}

impl FilterPattern {
    fn clause<'a>(&self, text: &'a str, pos: usize, end: usize) -> Option<FilterClause<'a>> {
        let rest = &text[pos..end];
        let head = self.head.captures(rest)?;
        let operator_start = head.get(0)?.end();
        let operator = self
            .operators
            .iter()
            .find(|operator| rest[operator_start..].starts_with(operator.as_str()))?;
        let value_start = operator_start + operator.len();
        let value = self.value.find(&rest[value_start..])?.as_str();
        if !value.starts_with('"')
            && self
                .operators
                .iter()
                .any(|operator| value.starts_with(operator.as_str()))
        {
            return None;
        }

        let part = |start: usize, end: usize| {
            (
                &text[pos + start..pos + end],
                Span::new(pos + start, end - start),
            )
        };
        let value_end = value_start + value.len();
        Some(FilterClause {
            text: &rest[..value_end],
            span: Span::new(pos, value_end),
            token: head
                .name("token")
                .map(|found| part(found.start(), found.end()))?,
            param: head
                .name("param")
                .map(|found| part(found.start(), found.end())),
            operator: part(operator_start, value_start),
            value: part(value_start, value_end),
        })
    }
}

/// Reads the token starting at `pos`, never looking past `end`.
pub(crate) fn next_token<'a>(
    text: &'a str,
    pos: usize,
    end: usize,
    pattern: Option<&FilterPattern>,
) -> Result<Lexed<'a>, QueryError> {
    let rest = &text[pos..end];
    let lexeme = first_lexeme(rest);

    // Whitespace
    if let Some((Lexeme::Whitespace, length)) = lexeme {
        return Ok(Lexed::new(Token::Whitespace, pos, length));
    }

    // Combinator
    if let Some(length) = dash_not(rest) {
        return Ok(Lexed::new(Token::Combinator(QueryNodeType::Not), pos, length));
    }
    let combinator = match lexeme {
        Some((Lexeme::And, length)) => Some((QueryNodeType::And, length)),
        Some((Lexeme::Or, length)) => Some((QueryNodeType::Or, length)),
        Some((Lexeme::Not, length)) => Some((QueryNodeType::Not, length)),
        _ => None,
    };
    if let Some((kind, length)) = combinator {
        return Ok(Lexed::new(Token::Combinator(kind), pos, length));
    }

    // Group
    if rest.starts_with('(') || rest.starts_with(')') {
        let close = matching_paren(rest)
            .ok_or_else(|| QueryError::new(pos, "Unbalanced parenthesis"))?;
        return Ok(Lexed::new(
            Token::Group {
                inner: pos + 1..pos + close,
            },
            pos,
            close + 1,
        ));
    }

    // Filter
    if let Some(clause) = pattern.and_then(|pattern| pattern.clause(text, pos, end)) {
        let span = clause.span;
        return Ok(Lexed {
            token: Token::Filter(clause),
            span,
        });
    }

    // Word or phrase
    let exact = rest.starts_with('!');
    let body = if exact { &rest[1..] } else { rest };
    let prefix = usize::from(exact);
    match first_lexeme(body) {
        Some((Lexeme::Phrase, length)) => Ok(Lexed::new(
            Token::Word {
                text: &body[1..length - 1],
                exact,
            },
            pos,
            prefix + length,
        )),
        Some((Lexeme::Word | Lexeme::And | Lexeme::Or | Lexeme::Not, length)) => Ok(Lexed::new(
            Token::Word {
                text: &body[..length],
                exact,
            },
            pos,
            prefix + length,
        )),
        _ => Err(QueryError::new(pos, "No token could be deduced")),
    }
}

/// `-` negates when it directly prefixes a term.
fn dash_not(rest: &str) -> Option<usize> {
    let mut chars = rest.chars();
    match (chars.next(), chars.next()) {
        (Some('-'), Some(next)) if !next.is_whitespace() => Some(1),
        _ => None,
    }
}

/// Byte offset of the `)` closing the `(` at the start of `rest`. Quoted
/// phrases are skipped.
fn matching_paren(rest: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_phrase = false;
    for (offset, ch) in rest.char_indices() {
        match ch {
            '"' if in_phrase => in_phrase = false,
            '"' => in_phrase = rest[offset + 1..].contains('"'),
            _ if in_phrase => {}
            '(' => depth += 1,
            ')' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(offset);
                }
            }
            _ => {}
        }
    }
    None
}
