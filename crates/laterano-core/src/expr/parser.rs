//! Expression and handler-statement grammar over [`Token`]s.

use chumsky::{input::ValueInput, pratt::*, prelude::*};

use super::ParseError;
use super::ast::{AssignOp, BinaryOp, Expr, LogicalOp, Stmt, UnaryOp};
use super::lexer::{Span, Spanned, Token, tokenize};
use crate::value::{Value, number};

type Extra<'tokens, 'src> = extra::Err<Rich<'tokens, Token<'src>, Span>>;

enum Access {
    Member(String),
    Index(Expr),
}

enum Tail {
    Assign(AssignOp, Expr),
    Update(f64),
}

fn binary(op: BinaryOp, l: Expr, r: Expr) -> Expr {
    Expr::Binary(op, Box::new(l), Box::new(r))
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

fn expression<'tokens, 'src: 'tokens, I>() -> impl Parser<'tokens, I, Expr, Extra<'tokens, 'src>> + Clone
where
    I: ValueInput<'tokens, Token = Token<'src>, Span = Span>,
{
    recursive(|expr| {
        let args = expr
            .clone()
            .separated_by(just(Token::Comma))
            .allow_trailing()
            .collect::<Vec<_>>();

        let literal = select! {
            Token::Number(n) => Expr::Literal(number(n)),
            Token::Str(s) => Expr::Literal(Value::String(unescape(s))),
            Token::Ident("true") => Expr::Literal(Value::Bool(true)),
            Token::Ident("false") => Expr::Literal(Value::Bool(false)),
            Token::Ident("null") => Expr::Literal(Value::Null),
            Token::Ident("undefined") => Expr::Undefined,
        };

        let name = select! { Token::Ident(name) => name.to_string() };

        let call = name
            .clone()
            .then(
                args.clone()
                    .delimited_by(just(Token::ParenOpen), just(Token::ParenClose)),
            )
            .map(|(name, args)| Expr::Call(name, args));

        let array = args
            .delimited_by(just(Token::BracketOpen), just(Token::BracketClose))
            .map(Expr::Array);

        let group = expr
            .clone()
            .delimited_by(just(Token::ParenOpen), just(Token::ParenClose));

        let atom = choice((literal, call, name.map(Expr::Ident), array, group));

        let access = choice((
            select! { Token::Member(prop) => Access::Member(prop.to_string()) },
            expr.clone()
                .delimited_by(just(Token::BracketOpen), just(Token::BracketClose))
                .map(Access::Index),
        ));

        let postfixed = atom.foldl(access.repeated(), |base, access| match access {
            Access::Member(prop) => Expr::Member(Box::new(base), prop),
            Access::Index(index) => Expr::Index(Box::new(base), Box::new(index)),
        });

        let unary = select! {
            Token::Bang => UnaryOp::Not,
            Token::Minus => UnaryOp::Neg,
            Token::Plus => UnaryOp::Plus,
        };
        let equality = select! {
            Token::EqEq => BinaryOp::Eq,
            Token::NotEq => BinaryOp::Ne,
        };
        let comparison = select! {
            Token::Less => BinaryOp::Lt,
            Token::LessEq => BinaryOp::Le,
            Token::Greater => BinaryOp::Gt,
            Token::GreaterEq => BinaryOp::Ge,
        };
        let additive = select! {
            Token::Plus => BinaryOp::Add,
            Token::Minus => BinaryOp::Sub,
        };
        let multiplicative = select! {
            Token::Star => BinaryOp::Mul,
            Token::Slash => BinaryOp::Div,
            Token::Percent => BinaryOp::Rem,
        };
        let operand = postfixed.pratt((
            prefix(8, unary, |op, rhs, _| Expr::Unary(op, Box::new(rhs))),
            infix(left(7), multiplicative, |l, op, r, _| binary(op, l, r)),
            infix(left(6), additive, |l, op, r, _| binary(op, l, r)),
            infix(left(5), comparison, |l, op, r, _| binary(op, l, r)),
            infix(left(4), equality, |l, op, r, _| binary(op, l, r)),
            infix(left(3), just(Token::AndAnd), |l, _, r, _| {
                Expr::Logical(LogicalOp::And, Box::new(l), Box::new(r))
            }),
            infix(left(2), just(Token::OrOr), |l, _, r, _| {
                Expr::Logical(LogicalOp::Or, Box::new(l), Box::new(r))
            }),
        ));

        // The ternary binds loosest and nests to the right.
        operand
            .then(
                just(Token::Question)
                    .ignore_then(expr.clone())
                    .then_ignore(just(Token::Colon))
                    .then(expr)
                    .or_not(),
            )
            .map(|(cond, branches)| match branches {
                Some((then, otherwise)) => {
                    Expr::Conditional(Box::new(cond), Box::new(then), Box::new(otherwise))
                }
                None => cond,
            })
    })
}

fn program<'tokens, 'src: 'tokens, I>() -> impl Parser<'tokens, I, Vec<Spanned<Stmt>>, Extra<'tokens, 'src>>
where
    I: ValueInput<'tokens, Token = Token<'src>, Span = Span>,
{
    let update = select! {
        Token::PlusPlus => 1.0,
        Token::MinusMinus => -1.0,
    };
    let assign = select! {
        Token::Assign => AssignOp::Set,
        Token::PlusAssign => AssignOp::Add,
        Token::MinusAssign => AssignOp::Sub,
    };

    let expr = expression();

    let prefix_update = update
        .clone()
        .then(expr.clone())
        .map(|(delta, target)| Stmt::Update { target, delta });

    let tail = choice((
        assign.then(expr.clone()).map(|(op, value)| Tail::Assign(op, value)),
        update.map(Tail::Update),
    ));

    let suffixed = expr
        .then(tail.or_not())
        .map(|(lhs, tail)| match tail {
            None => Stmt::Expr(lhs),
            Some(Tail::Assign(op, value)) => Stmt::Assign { target: lhs, op, value },
            Some(Tail::Update(delta)) => Stmt::Update { target: lhs, delta },
        });

    choice((prefix_update, suffixed))
        .map_with(|stmt, extra| (stmt, extra.span()))
        .separated_by(just(Token::Semicolon).repeated().at_least(1))
        .allow_leading()
        .allow_trailing()
        .collect()
        .then_ignore(end())
}

/// Lexes `src` and rejects call syntax on anything but a plain name, which
/// the grammar would otherwise report as a stray `(`.
fn tokens(src: &str) -> Result<Vec<Spanned<Token<'_>>>, ParseError> {
    let tokens = tokenize(src)?;
    if tokens.is_empty() {
        return Err(ParseError::Empty);
    }
    for pair in tokens.windows(2) {
        let [(before, _), (Token::ParenOpen, span)] = pair else {
            continue;
        };
        if matches!(before, Token::Member(_) | Token::BracketClose | Token::ParenClose) {
            return Err(ParseError::UnsupportedCall { pos: span.start });
        }
    }
    Ok(tokens)
}

fn syntax_error(e: &Rich<'_, Token<'_>, Span>) -> ParseError {
    match e.found() {
        Some(token) => ParseError::UnexpectedToken {
            found: token.to_string(),
            pos: e.span().start,
        },
        None => ParseError::UnexpectedEnd,
    }
}

pub fn parse_expression(src: &str) -> Result<Expr, ParseError> {
    let tokens = tokens(src)?;
    let eoi = Span::from(src.len()..src.len());
    let (expr, errors) = expression()
        .then_ignore(end())
        .parse(tokens.as_slice().map(eoi, |(t, s)| (t, s)))
        .into_output_errors();
    if let Some(e) = errors.first() {
        return Err(syntax_error(e));
    }
    expr.ok_or(ParseError::UnexpectedEnd)
}

/// Parses `;`-separated handler statements.
pub fn parse_program(src: &str) -> Result<Vec<Stmt>, ParseError> {
    let tokens = tokens(src)?;
    if tokens.iter().all(|(t, _)| *t == Token::Semicolon) {
        return Err(ParseError::Empty);
    }
    let eoi = Span::from(src.len()..src.len());
    let (stmts, errors) = program()
        .parse(tokens.as_slice().map(eoi, |(t, s)| (t, s)))
        .into_output_errors();
    if let Some(e) = errors.first() {
        return Err(syntax_error(e));
    }
    let stmts = stmts.unwrap_or_default();
    if stmts.is_empty() {
        return Err(ParseError::Empty);
    }
    stmts
        .into_iter()
        .map(|(stmt, span)| match &stmt {
            Stmt::Assign { target, .. } | Stmt::Update { target, .. } if target.path().is_none() => {
                Err(ParseError::InvalidAssignTarget { pos: span.start })
            }
            _ => Ok(stmt),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(n: &str) -> Box<Expr> {
        Box::new(Expr::Ident(n.into()))
    }

    #[test]
    fn precedence_and_associativity() {
        let e = parse_expression("a - b - c * d").unwrap();
        assert_eq!(
            e,
            Expr::Binary(
                BinaryOp::Sub,
                Box::new(Expr::Binary(BinaryOp::Sub, ident("a"), ident("b"))),
                Box::new(Expr::Binary(BinaryOp::Mul, ident("c"), ident("d"))),
            )
        );
    }

    #[test]
    fn logical_binds_looser_than_comparison() {
        let e = parse_expression("!done && count > 0").unwrap();
        assert_eq!(
            e,
            Expr::Logical(
                LogicalOp::And,
                Box::new(Expr::Unary(UnaryOp::Not, ident("done"))),
                Box::new(Expr::Binary(
                    BinaryOp::Gt,
                    ident("count"),
                    Box::new(Expr::Literal(Value::from(0)))
                )),
            )
        );
    }

    #[test]
    fn nested_ternary_is_right_associative() {
        let e = parse_expression("a ? 1 : b ? 2 : 3").unwrap();
        let Expr::Conditional(_, _, otherwise) = e else {
            panic!("expected conditional");
        };
        assert!(matches!(*otherwise, Expr::Conditional(..)));
    }

    #[test]
    fn member_index_and_paths() {
        let e = parse_expression("items[0].title + user.name").unwrap();
        assert_eq!(e.read_paths(), vec!["items.0.title", "user.name"]);
        let e = parse_expression("items.0.done").unwrap();
        assert_eq!(e.path().as_deref(), Some("items.0.done"));
        let e = parse_expression("todos.0.text + '!'").unwrap();
        assert_eq!(e.read_paths(), vec!["todos.0.text"]);
    }

    #[test]
    fn strings_keep_escapes_decoded() {
        let e = parse_expression(r#"'it\'s' + "a\tb""#).unwrap();
        assert_eq!(
            e,
            Expr::Binary(
                BinaryOp::Add,
                Box::new(Expr::Literal(Value::String("it's".into()))),
                Box::new(Expr::Literal(Value::String("a\tb".into()))),
            )
        );
    }

    #[test]
    fn calls_and_statements() {
        let prog = parse_program("count++; total += price * 2; setState('x', [1, 2])").unwrap();
        assert_eq!(prog.len(), 3);
        assert!(matches!(prog[0], Stmt::Update { delta, .. } if delta == 1.0));
        assert!(matches!(prog[1], Stmt::Assign { op: AssignOp::Add, .. }));
        assert!(matches!(&prog[2], Stmt::Expr(Expr::Call(name, args)) if name == "setState" && args.len() == 2));

        let prog = parse_program(";todos.0.done = true;;").unwrap();
        let [Stmt::Assign { target, .. }] = prog.as_slice() else {
            panic!("expected one assignment, got {prog:?}");
        };
        assert_eq!(target.path().as_deref(), Some("todos.0.done"));
    }

    #[test]
    fn rejects_bad_input() {
        assert_eq!(parse_expression(""), Err(ParseError::Empty));
        assert_eq!(parse_program(" ; "), Err(ParseError::Empty));
        assert_eq!(parse_expression("a +"), Err(ParseError::UnexpectedEnd));
        assert!(matches!(
            parse_program("1 = 2"),
            Err(ParseError::InvalidAssignTarget { pos: 0 })
        ));
        assert!(matches!(
            parse_expression("a.b()"),
            Err(ParseError::UnsupportedCall { pos: 3 })
        ));
        assert!(matches!(
            parse_expression("a b"),
            Err(ParseError::UnexpectedToken { .. })
        ));
        assert!(matches!(
            parse_program("a b"),
            Err(ParseError::UnexpectedToken { .. })
        ));
    }
}
