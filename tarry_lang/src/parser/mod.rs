//! Recursive descent parser producing the statement tree the backend walks.
//!
//! A function definition is written `name(a, b) { ... }`. It is parsed as a
//! call expression first and converted once the opening brace shows up, so
//! no backtracking is needed.

pub mod ast;

use logos::Span;

use crate::context::{ContextSpan, ErrorContext};
use crate::lexer::{SpannedLexer, Token};

use self::ast::{BinaryOp, Block, Expr, FunctionDef, Literal, Statement};
use self::error::{ParseError, ParseResult};

pub fn parse(source: &str, file_name: &str) -> Result<Block, ErrorContext> {
    let mut tokens = SpannedLexer::new(source, file_name.to_string());
    parse_statements(&mut tokens, None)
        .map(Block::from)
        .map_err(|err| err.with_context(&tokens))
}

fn next_token(tokens: &mut SpannedLexer<'_>) -> ParseResult<(Token, ContextSpan)> {
    Ok(tokens.next().ok_or(ParseError::UnexpectedEof)??)
}

fn peek_is(tokens: &mut SpannedLexer<'_>, expected: &Token) -> bool {
    matches!(tokens.peek(), Some(Ok((tok, _))) if tok == expected)
}

fn expect(tokens: &mut SpannedLexer<'_>, expected: Token) -> ParseResult<ContextSpan> {
    let (tok, ctx) = next_token(tokens)?;
    if tok == expected {
        Ok(ctx)
    } else {
        Err(ParseError::UnexpectedToken(tok, ctx))
    }
}

fn parse_statements(
    tokens: &mut SpannedLexer<'_>,
    end_token: Option<Token>,
) -> ParseResult<Vec<Statement>> {
    let mut statements = Vec::new();
    loop {
        match (tokens.peek(), &end_token) {
            // Expected EOF
            (None, None) => break,
            (None, Some(_)) => return Err(ParseError::UnexpectedEof),
            // Expected End of Block
            (Some(Ok((tok, _))), Some(end_token)) if tok == end_token => {
                tokens.next();
                break;
            }
            _ => {}
        }
        statements.push(parse_statement(tokens)?);
    }
    Ok(statements)
}

fn parse_block(tokens: &mut SpannedLexer<'_>) -> ParseResult<Block> {
    expect(tokens, Token::LeftCurlyBrace)?;
    parse_statements(tokens, Some(Token::RightCurlyBrace)).map(Block::from)
}

fn parse_statement(tokens: &mut SpannedLexer<'_>) -> ParseResult<Statement> {
    let first = match tokens.peek() {
        Some(Ok((tok, _))) => tok.clone(),
        _ => {
            let (tok, ctx) = next_token(tokens)?;
            return Err(ParseError::UnexpectedToken(tok, ctx));
        }
    };
    match first {
        Token::Semicolon => {
            tokens.next();
            Ok(Statement::Empty)
        }
        Token::Let => {
            tokens.next();
            let name = parse_identifier(tokens)?;
            expect(tokens, Token::Assign)?;
            let value = parse_expression(tokens)?;
            expect(tokens, Token::Semicolon)?;
            Ok(Statement::Let { name, value })
        }
        Token::Return => {
            tokens.next();
            if peek_is(tokens, &Token::Semicolon) {
                tokens.next();
                return Ok(Statement::Return(None));
            }
            let value = parse_expression(tokens)?;
            expect(tokens, Token::Semicolon)?;
            Ok(Statement::Return(Some(value)))
        }
        Token::If => {
            tokens.next();
            parse_if(tokens)
        }
        _ => parse_expression_statement(tokens),
    }
}

fn parse_if(tokens: &mut SpannedLexer<'_>) -> ParseResult<Statement> {
    let condition = parse_expression(tokens)?;
    let then = parse_block(tokens)?;
    let otherwise = if peek_is(tokens, &Token::Else) {
        tokens.next();
        if peek_is(tokens, &Token::If) {
            tokens.next();
            Some(Block::from(vec![parse_if(tokens)?]))
        } else {
            Some(parse_block(tokens)?)
        }
    } else {
        None
    };
    Ok(Statement::If {
        condition,
        then,
        otherwise,
    })
}

fn parse_expression_statement(tokens: &mut SpannedLexer<'_>) -> ParseResult<Statement> {
    let start = match tokens.peek() {
        Some(Ok((_, ctx))) => *ctx,
        _ => return Err(ParseError::UnexpectedEof),
    };
    let expr = parse_expression(tokens)?;

    if peek_is(tokens, &Token::LeftCurlyBrace) {
        let (name, params) = function_signature(expr, start)?;
        let body = parse_block(tokens)?;
        return Ok(Statement::Function(FunctionDef { name, params, body }.into()));
    }

    if peek_is(tokens, &Token::Assign) {
        let (tok, ctx) = next_token(tokens)?;
        let name = match expr {
            Expr::Reference(name) => name,
            _ => return Err(ParseError::UnexpectedToken(tok, ctx)),
        };
        let value = parse_expression(tokens)?;
        expect(tokens, Token::Semicolon)?;
        return Ok(Statement::Assign { name, value });
    }

    expect(tokens, Token::Semicolon)?;
    Ok(Statement::Expr(expr))
}

fn function_signature(expr: Expr, start: ContextSpan) -> ParseResult<(String, Vec<String>)> {
    let invalid = || ParseError::Invalid("Expected a function signature".to_string(), start);
    let (callee, args) = match expr {
        Expr::Call { callee, args } => (callee, args),
        _ => return Err(invalid()),
    };
    let name = match *callee {
        Expr::Reference(name) => name,
        _ => return Err(invalid()),
    };
    let params = args
        .into_iter()
        .map(|arg| match arg {
            Expr::Reference(param) => Ok(param),
            _ => Err(invalid()),
        })
        .collect::<ParseResult<Vec<_>>>()?;
    Ok((name, params))
}

fn parse_identifier(tokens: &mut SpannedLexer<'_>) -> ParseResult<String> {
    match next_token(tokens)? {
        (Token::Identifier(name), _) => Ok(name),
        (tok, ctx) => Err(ParseError::UnexpectedToken(tok, ctx)),
    }
}

pub fn parse_expression(tokens: &mut SpannedLexer<'_>) -> ParseResult<Expr> {
    parse_equality(tokens)
}

fn binary_op(tokens: &mut SpannedLexer<'_>, ops: &[(Token, BinaryOp)]) -> Option<BinaryOp> {
    let found = match tokens.peek() {
        Some(Ok((tok, _))) => ops.iter().find(|(candidate, _)| candidate == tok),
        _ => None,
    };
    let op = found.map(|(_, op)| *op);
    if op.is_some() {
        tokens.next();
    }
    op
}

macro_rules! binary_level {
    ($name:ident, $next:ident, [$(($tok:expr, $op:expr)),*]) => {
        fn $name(tokens: &mut SpannedLexer<'_>) -> ParseResult<Expr> {
            let mut lhs = $next(tokens)?;
            while let Some(op) = binary_op(tokens, &[$(($tok, $op)),*]) {
                let rhs = $next(tokens)?;
                lhs = Expr::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                };
            }
            Ok(lhs)
        }
    };
}

binary_level!(parse_equality, parse_comparison, [
    (Token::Equals, BinaryOp::Eq),
    (Token::DoesNotEqual, BinaryOp::NotEq)
]);
binary_level!(parse_comparison, parse_additive, [
    (Token::LessThan, BinaryOp::Less),
    (Token::LessThanEquals, BinaryOp::LessEq),
    (Token::GreaterThan, BinaryOp::Greater),
    (Token::GreaterThanEquals, BinaryOp::GreaterEq)
]);
binary_level!(parse_additive, parse_multiplicative, [
    (Token::Plus, BinaryOp::Add),
    (Token::Minus, BinaryOp::Sub)
]);
binary_level!(parse_multiplicative, parse_unary, [
    (Token::Multiply, BinaryOp::Mul),
    (Token::Divide, BinaryOp::Div)
]);

fn parse_unary(tokens: &mut SpannedLexer<'_>) -> ParseResult<Expr> {
    if peek_is(tokens, &Token::Minus) {
        tokens.next();
        return Ok(Expr::Negate(Box::new(parse_unary(tokens)?)));
    }
    parse_postfix(tokens)
}

fn parse_postfix(tokens: &mut SpannedLexer<'_>) -> ParseResult<Expr> {
    let mut expr = parse_primary(tokens)?;
    while peek_is(tokens, &Token::LeftParenthesis) {
        tokens.next();
        let mut args = Vec::new();
        if peek_is(tokens, &Token::RightParenthesis) {
            tokens.next();
        } else {
            loop {
                args.push(parse_expression(tokens)?);
                match next_token(tokens)? {
                    (Token::Comma, _) => continue,
                    (Token::RightParenthesis, _) => break,
                    (tok, ctx) => return Err(ParseError::UnexpectedToken(tok, ctx)),
                }
            }
        }
        expr = Expr::Call {
            callee: Box::new(expr),
            args,
        };
    }
    Ok(expr)
}

fn parse_primary(tokens: &mut SpannedLexer<'_>) -> ParseResult<Expr> {
    let (tok, ctx) = next_token(tokens)?;
    let expr = match tok {
        Token::Integer(value) => Expr::Literal(Literal::Integer(value)),
        Token::String(value) => Expr::Literal(Literal::String(value)),
        Token::Boolean(value) => Expr::Literal(Literal::Boolean(value)),
        Token::Null => Expr::Literal(Literal::Null),
        Token::Identifier(name) => Expr::Reference(name),
        Token::LeftParenthesis => {
            let inner = parse_expression(tokens)?;
            expect(tokens, Token::RightParenthesis)?;
            inner
        }
        Token::LeftCurlyBrace => Expr::Block(
            parse_statements(tokens, Some(Token::RightCurlyBrace))?.into(),
        ),
        other => return Err(ParseError::UnexpectedToken(other, ctx)),
    };
    Ok(expr)
}

mod error {
    use super::*;

    pub type ParseResult<T> = Result<T, ParseError>;

    #[derive(Debug)]
    pub enum ParseError {
        UnexpectedToken(Token, ContextSpan),
        UnexpectedEof,
        Invalid(String, ContextSpan),
        ErrorContext(ErrorContext),
    }

    impl From<ErrorContext> for ParseError {
        fn from(ctx: ErrorContext) -> Self {
            Self::ErrorContext(ctx)
        }
    }

    impl ParseError {
        pub fn with_context(self, ctx: &SpannedLexer<'_>) -> ErrorContext {
            match self {
                ParseError::UnexpectedToken(tok, span) => ErrorContext::new(
                    ctx.get_file_name().to_string(),
                    span.end_line,
                    ctx.get_source(),
                    span.into(),
                    format!("Unexpected token {:?}", tok),
                ),
                ParseError::Invalid(message, span) => ErrorContext::new(
                    ctx.get_file_name().to_string(),
                    span.end_line,
                    ctx.get_source(),
                    span.into(),
                    message,
                ),
                ParseError::UnexpectedEof => ErrorContext::new(
                    ctx.get_file_name().to_string(),
                    ctx.current_line(),
                    ctx.get_source(),
                    Span {
                        start: ctx.current_offset(),
                        end: ctx.current_offset(),
                    },
                    "Unexpected eof".to_string(),
                ),
                ParseError::ErrorContext(err) => err,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(source: &str) -> Block {
        parse(source, "test").unwrap_or_else(|err| panic!("{:#}", err))
    }

    #[test]
    fn nested_function_definitions() {
        let program = parse_ok("a() { b() { breakpoint(); } b(); } a();");
        assert_eq!(program.len(), 2);
        let a = match &program[0] {
            Statement::Function(def) => def,
            other => panic!("expected function, got {:?}", other),
        };
        assert_eq!(a.name, "a");
        assert!(a.params.is_empty());
        assert_eq!(a.body.len(), 2);
        assert!(matches!(&a.body[0], Statement::Function(b) if b.name == "b"));
        assert!(matches!(&program[1], Statement::Expr(Expr::Call { .. })));
    }

    #[test]
    fn precedence_and_blocks() {
        let program = parse_ok("let x = 1 + 2 * 3; pause({ x - 1; });");
        match &program[0] {
            Statement::Let { name, value } => {
                assert_eq!(name, "x");
                match value {
                    Expr::Binary { op, rhs, .. } => {
                        assert_eq!(*op, BinaryOp::Add);
                        assert!(matches!(**rhs, Expr::Binary { op: BinaryOp::Mul, .. }));
                    }
                    other => panic!("expected binary, got {:?}", other),
                }
            }
            other => panic!("expected let, got {:?}", other),
        }
        match &program[1] {
            Statement::Expr(Expr::Call { args, .. }) => {
                assert!(matches!(&args[0], Expr::Block(block) if block.len() == 1));
            }
            other => panic!("expected call, got {:?}", other),
        }
    }

    #[test]
    fn params_and_control_flow() {
        let program = parse_ok(
            "fib(n) { if n < 2 { return n; } else { return fib(n - 1) + fib(n - 2); } } x = fib(5);",
        );
        match &program[0] {
            Statement::Function(def) => {
                assert_eq!(def.params, vec!["n".to_string()]);
                assert!(matches!(&def.body[0], Statement::If { otherwise: Some(_), .. }));
            }
            other => panic!("expected function, got {:?}", other),
        }
        assert!(matches!(&program[1], Statement::Assign { name, .. } if name == "x"));
    }

    #[test]
    fn errors_point_at_token() {
        let err = parse("let x = ;", "test").unwrap_err();
        assert_eq!(err.line_num, 1);
        assert!(err.message.starts_with("Unexpected token Semicolon"));

        let err = parse("f(1) { }", "test").unwrap_err();
        assert_eq!(err.message, "Expected a function signature");

        let err = parse("a(", "test").unwrap_err();
        assert_eq!(err.message, "Unexpected eof");
    }
}
