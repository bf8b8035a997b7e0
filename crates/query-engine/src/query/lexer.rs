//! Fixed lexemes of the query language.

use logos::Logos;

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Lexeme {
    #[regex(r"\s+")]
    Whitespace,

    #[token("and", ignore(ascii_case))]
    And,

    #[token("or", ignore(ascii_case))]
    Or,

    #[token("not", ignore(ascii_case))]
    Not,

    #[regex(r#""[^"]*""#)]
    Phrase,

    #[regex(r"[^\s()!][^\s()]*")]
    Word,
}

/// Lexes the lexeme at the start of `input`, returning it with its length.
pub(crate) fn first_lexeme(input: &str) -> Option<(Lexeme, usize)> {
    let mut lexer = Lexeme::lexer(input);
    match lexer.next() {
        Some(Ok(lexeme)) if lexer.span().start == 0 => Some((lexeme, lexer.span().end)),
        _ => None,
    }
}
