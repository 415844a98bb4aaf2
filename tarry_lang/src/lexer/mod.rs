//! The lexer turns source text into a stream of spanned tokens.
//! Whitespace, newlines and `//` comments are skipped, but newlines are
//! counted so that errors can point back at the offending line.

use std::borrow::Cow;

use logos::{Lexer, Logos, Skip};

use crate::context::{ContextSpan, ErrorContext};

pub use self::error::{LexError, LexResult};

#[derive(Debug, Clone, PartialEq, Logos)]
#[logos(extras = LexerContext)]
#[logos(error = LexError)]
#[logos(skip r"[ \t\r\f]+")]
pub enum Token {
    // Keywords
    #[token("let")]
    Let,
    #[token("return")]
    Return,
    #[token("if")]
    If,
    #[token("else")]
    Else,
    // Operators
    #[token("==")]
    Equals,
    #[token("!=")]
    DoesNotEqual,
    #[token("<=")]
    LessThanEquals,
    #[token(">=")]
    GreaterThanEquals,
    #[token("<")]
    LessThan,
    #[token(">")]
    GreaterThan,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Multiply,
    #[token("/")]
    Divide,
    #[token("=")]
    Assign,
    // Misc Symbols
    #[token("(")]
    LeftParenthesis,
    #[token(")")]
    RightParenthesis,
    #[token("{")]
    LeftCurlyBrace,
    #[token("}")]
    RightCurlyBrace,
    #[token(",")]
    Comma,
    #[token(";")]
    Semicolon,
    #[token("\n", |lex| {
        lex.extras.log_newlines(1);
        Skip
    })]
    Newline,
    // Identifiers
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string())]
    Identifier(String),
    // Literals
    #[regex(r#""([^"\\\n]|\\.)*""#, |lex| escape_str(trim_str(lex.slice(), 1, 1)))]
    String(String),
    #[regex(r"[0-9]+", |lex| lex.slice().parse::<i64>())]
    Integer(i64),
    #[token("true", |_| true)]
    #[token("false", |_| false)]
    Boolean(bool),
    #[token("null")]
    Null,
    #[regex(r"//[^\n]*", |_| Skip)]
    Comment,
}

#[derive(Debug, PartialEq, Logos)]
enum EscapedString<'s> {
    #[regex(r"[^\\]+")]
    Verbatim(&'s str),
    #[regex(r"\\.", |lex| escape_lookup(lex.slice()))]
    Escaped(String),
}

impl<'s> From<EscapedString<'s>> for Cow<'s, str> {
    fn from(fragment: EscapedString<'s>) -> Self {
        match fragment {
            EscapedString::Verbatim(slice) => slice.into(),
            EscapedString::Escaped(string) => string.into(),
        }
    }
}

fn trim_str(s: &str, trim_start: usize, trim_end: usize) -> &str {
    &s[trim_start..s.len() - trim_end]
}

fn escape_lookup(s: &str) -> Option<String> {
    match s {
        r"\n" => Some("\n".to_string()),
        r"\t" => Some("\t".to_string()),
        r"\\" => Some("\\".to_string()),
        r#"\""# => Some("\"".to_string()),
        _ => None,
    }
}

fn escape_str(source: &str) -> LexResult<String> {
    let mut escape_lexer = EscapedString::lexer(source);
    let mut fragments: Vec<Cow<'_, str>> = Vec::new();
    while let Some(fragment) = escape_lexer.next() {
        match fragment {
            Ok(fragment) => fragments.push(fragment.into()),
            Err(()) => {
                return Err(LexError::General(format!(
                    "Illegal escape sequence in string: \"{}\"",
                    escape_lexer.slice()
                )))
            }
        }
    }
    Ok(fragments.concat())
}

pub struct SpannedLexer<'s> {
    file_name: String,
    logos: Lexer<'s, Token>,
    stored_next: Option<<Self as Iterator>::Item>,
}

impl<'s> SpannedLexer<'s> {
    pub fn new(input: &'s str, file_name: String) -> Self {
        Self {
            logos: Token::lexer(input),
            file_name,
            stored_next: None,
        }
    }

    pub fn get_file_name(&self) -> &str {
        &self.file_name
    }

    pub fn get_source(&self) -> &'s str {
        self.logos.source()
    }

    pub fn current_line(&self) -> u32 {
        self.logos.extras.get_line()
    }

    pub fn current_offset(&self) -> usize {
        self.logos.span().end
    }

    fn next_internal(&mut self) -> Option<<Self as Iterator>::Item> {
        let token = self.logos.next()?;
        Some(
            token
                .map(|tok| {
                    (
                        tok,
                        ContextSpan::new(self.logos.span(), self.logos.extras.get_line()),
                    )
                })
                .map_err(|err| err.with_context(&self.logos, self.file_name.clone())),
        )
    }

    pub fn peek(&mut self) -> Option<&<Self as Iterator>::Item> {
        if self.stored_next.is_none() {
            self.stored_next = self.next_internal();
        }
        self.stored_next.as_ref()
    }
}

impl Iterator for SpannedLexer<'_> {
    type Item = Result<(Token, ContextSpan), ErrorContext>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(next) = self.stored_next.take() {
            Some(next)
        } else {
            self.next_internal()
        }
    }
}

#[derive(Debug)]
pub struct LexerContext {
    line_num: u32,
}

impl Default for LexerContext {
    fn default() -> Self {
        Self { line_num: 1 }
    }
}

impl LexerContext {
    pub fn get_line(&self) -> u32 {
        self.line_num
    }

    pub fn log_newlines(&mut self, count: u32) {
        self.line_num += count;
    }
}

mod error {
    use std::num::ParseIntError;

    use logos::Lexer;

    use crate::context::ErrorContext;

    use super::Token;

    pub type LexResult<T> = Result<T, LexError>;

    #[derive(Debug, Clone, PartialEq, Default)]
    pub enum LexError {
        ParseIntError(ParseIntError),
        #[default]
        UnknownToken,
        General(String),
    }

    impl LexError {
        pub fn with_context(self, lexer: &Lexer<'_, Token>, file_name: String) -> ErrorContext {
            let message = match self {
                LexError::ParseIntError(err) => {
                    format!("Failed to parse integer literal: {}", err)
                }
                LexError::UnknownToken => "Unknown token".to_string(),
                LexError::General(msg) => msg,
            };
            ErrorContext::new(
                file_name,
                lexer.extras.get_line(),
                lexer.source(),
                lexer.span(),
                message,
            )
        }
    }

    impl From<ParseIntError> for LexError {
        fn from(err: ParseIntError) -> Self {
            LexError::ParseIntError(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(input: &str) -> Vec<Result<Token, LexError>> {
        Token::lexer(input).collect()
    }

    #[test]
    fn single_token_test() {
        assert_eq!(vec![Ok(Token::Let)], lex("let"));
        assert_eq!(vec![Ok(Token::Boolean(true))], lex("true"));
        assert_eq!(vec![Ok(Token::Null)], lex("null"));
        assert_eq!(
            vec![Ok(Token::Identifier("letter".into()))],
            lex("letter")
        );
        assert_eq!(vec![Ok(Token::Integer(123))], lex("123"));
        assert_eq!(vec![Ok(Token::LessThanEquals)], lex("<="));
    }

    #[test]
    fn string_escape_test() {
        assert_eq!(
            vec![Ok(Token::String("Hello World".into()))],
            lex(r#""Hello World""#)
        );
        assert_eq!(
            vec![Ok(Token::String("Hello\"World\n".into()))],
            lex(r#""Hello\"World\n""#)
        );
        assert!(matches!(
            lex(r#""bad \q escape""#).as_slice(),
            [Err(LexError::General(_))]
        ));
    }

    #[test]
    fn skips_comments_and_counts_lines() {
        let source = "a(); // call a\n\nb();";
        let tokens = SpannedLexer::new(source, "test".into())
            .collect::<Result<Vec<_>, _>>()
            .expect("lexing failed");
        let kinds: Vec<_> = tokens.iter().map(|(tok, _)| tok.clone()).collect();
        assert_eq!(
            kinds,
            vec![
                Token::Identifier("a".into()),
                Token::LeftParenthesis,
                Token::RightParenthesis,
                Token::Semicolon,
                Token::Identifier("b".into()),
                Token::LeftParenthesis,
                Token::RightParenthesis,
                Token::Semicolon,
            ]
        );
        assert_eq!(tokens.last().map(|(_, span)| span.end_line), Some(3));
    }

    #[test]
    fn unknown_token_has_context() {
        let err = SpannedLexer::new("x = 1;\ny = $;", "test".into())
            .collect::<Result<Vec<_>, _>>()
            .unwrap_err();
        assert_eq!(err.line_num, 2);
        assert_eq!(err.message, "Unknown token");
    }
}
