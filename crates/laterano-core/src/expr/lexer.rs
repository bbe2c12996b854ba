use std::borrow::Cow;
use std::fmt;

use chumsky::prelude::*;

use super::ParseError;

pub type Span = SimpleSpan;
pub type Spanned<T> = (T, Span);

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Token<'src> {
    Ident(&'src str),
    /// `.name` or `.0`: a property read, never a fraction.
    Member(&'src str),
    Number(f64),
    /// Raw string body, escapes still in place.
    Str(&'src str),
    Unterminated,
    Comma,
    Colon,
    Semicolon,
    Question,
    ParenOpen,
    ParenClose,
    BracketOpen,
    BracketClose,
    Bang,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    EqEq,
    NotEq,
    AndAnd,
    OrOr,
    Assign,
    PlusAssign,
    MinusAssign,
    PlusPlus,
    MinusMinus,
}

impl<'src> Token<'src> {
    pub fn into_cow_str(self) -> Cow<'src, str> {
        match self {
            Self::Ident(name) => name.into(),
            Self::Member(prop) => format!(".{prop}").into(),
            Self::Number(n) => n.to_string().into(),
            Self::Str(s) => format!("'{s}'").into(),
            Self::Unterminated => "unterminated string".into(),
            Self::Comma => ",".into(),
            Self::Colon => ":".into(),
            Self::Semicolon => ";".into(),
            Self::Question => "?".into(),
            Self::ParenOpen => "(".into(),
            Self::ParenClose => ")".into(),
            Self::BracketOpen => "[".into(),
            Self::BracketClose => "]".into(),
            Self::Bang => "!".into(),
            Self::Plus => "+".into(),
            Self::Minus => "-".into(),
            Self::Star => "*".into(),
            Self::Slash => "/".into(),
            Self::Percent => "%".into(),
            Self::Less => "<".into(),
            Self::LessEq => "<=".into(),
            Self::Greater => ">".into(),
            Self::GreaterEq => ">=".into(),
            Self::EqEq => "==".into(),
            Self::NotEq => "!=".into(),
            Self::AndAnd => "&&".into(),
            Self::OrOr => "||".into(),
            Self::Assign => "=".into(),
            Self::PlusAssign => "+=".into(),
            Self::MinusAssign => "-=".into(),
            Self::PlusPlus => "++".into(),
            Self::MinusMinus => "--".into(),
        }
    }
}

impl fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.into_cow_str())
    }
}

pub fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

pub fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    chars.next().is_some_and(is_ident_start) && chars.all(is_ident_continue)
}

pub fn lexer<'src>() -> impl Parser<'src, &'src str, Vec<Spanned<Token<'src>>>, extra::Err<Rich<'src, char>>> {
    let ident = any()
        .filter(|c: &char| is_ident_start(*c))
        .then(any().filter(|c: &char| is_ident_continue(*c)).repeated())
        .to_slice();

    // `items.0.done` is two member reads, so a number never starts at a dot.
    let member = just('.')
        .ignore_then(ident.clone().or(text::digits(10).to_slice()))
        .map(Token::Member);

    let number = text::int(10)
        .then(just('.').then(text::digits(10)).or_not())
        .to_slice()
        .from_str()
        .unwrapped()
        .map(Token::Number);

    let string = |quote: char| {
        let escaped = just('\\').then(any()).to_slice();
        let plain = none_of([quote, '\\']).to_slice();
        just(quote)
            .ignore_then(escaped.or(plain).repeated().to_slice())
            .then(just(quote).or_not())
            .map(|(body, close)| match close {
                Some(_) => Token::Str(body),
                None => Token::Unterminated,
            })
    };

    let operator = choice((
        just("===").to(Token::EqEq),
        just("!==").to(Token::NotEq),
        just("==").to(Token::EqEq),
        just("!=").to(Token::NotEq),
        just("<=").to(Token::LessEq),
        just(">=").to(Token::GreaterEq),
        just("&&").to(Token::AndAnd),
        just("||").to(Token::OrOr),
        just("++").to(Token::PlusPlus),
        just("--").to(Token::MinusMinus),
        just("+=").to(Token::PlusAssign),
        just("-=").to(Token::MinusAssign),
        just('=').to(Token::Assign),
        just('!').to(Token::Bang),
        just('<').to(Token::Less),
        just('>').to(Token::Greater),
        just('+').to(Token::Plus),
        just('-').to(Token::Minus),
        just('*').to(Token::Star),
        just('/').to(Token::Slash),
        just('%').to(Token::Percent),
    ));

    let punctuation = choice((
        just(',').to(Token::Comma),
        just(':').to(Token::Colon),
        just(';').to(Token::Semicolon),
        just('?').to(Token::Question),
        just('(').to(Token::ParenOpen),
        just(')').to(Token::ParenClose),
        just('[').to(Token::BracketOpen),
        just(']').to(Token::BracketClose),
    ));

    let token = choice((
        number,
        member,
        string('\''),
        string('"'),
        operator,
        punctuation,
        ident.map(Token::Ident),
    ));

    token
        .map_with(|token, extra| (token, extra.span()))
        .padded()
        .repeated()
        .collect()
        .padded()
        .then_ignore(end())
}

/// Tokenizes `src`, turning the first lexing failure into a [`ParseError`].
pub fn tokenize(src: &str) -> Result<Vec<Spanned<Token<'_>>>, ParseError> {
    let (tokens, errors) = lexer().parse(src).into_output_errors();
    if let Some(e) = errors.first() {
        let pos = e.span().start;
        return Err(match e.found() {
            Some(ch) => ParseError::UnexpectedChar { ch: *ch, pos },
            None => ParseError::UnexpectedEnd,
        });
    }
    let tokens = tokens.unwrap_or_default();
    if let Some((_, span)) = tokens.iter().find(|(t, _)| *t == Token::Unterminated) {
        return Err(ParseError::UnterminatedString { pos: span.start });
    }
    Ok(tokens)
}

/// Every identifier-like token in `text`, excluding literal keywords.
///
/// Deliberately textual: property names after a dot and words inside string
/// literals are included.
pub fn identifiers(text: &str) -> Vec<String> {
    const KEYWORDS: &[&str] = &["true", "false", "null", "undefined", "this"];
    let mut out: Vec<String> = Vec::new();
    let mut current = String::new();
    let flush = |current: &mut String, out: &mut Vec<String>| {
        if !current.is_empty() {
            let word = std::mem::take(current);
            if !KEYWORDS.contains(&word.as_str()) && !out.contains(&word) {
                out.push(word);
            }
        }
    };
    for c in text.chars() {
        if (current.is_empty() && is_ident_start(c)) || (!current.is_empty() && is_ident_continue(c)) {
            current.push(c);
        } else {
            flush(&mut current, &mut out);
        }
    }
    flush(&mut current, &mut out);
    out
}
