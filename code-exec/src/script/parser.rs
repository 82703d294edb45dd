use std::collections::HashSet;
use std::rc::Rc;

use super::ast::{BinaryOp, Block, ElseBranch, Expr, FunctionDecl, Program, Stmt, UnaryOp};
use super::error::{ScriptError, ScriptResult};
use super::token::{Keyword, Operator, Position, Punct, Token, TokenKind};

/// Deepest syntactic nesting accepted before the parser gives up.
pub const MAX_NESTING: usize = 256;

/// Parse a token stream produced by [`super::lexer::tokenize`].
pub fn parse(tokens: Vec<Token>) -> ScriptResult<Program> {
    Parser::new(tokens).program()
}

/// Recursive-descent parser, one routine per grammar rule and a single token
/// of lookahead.
pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    depth: usize,
    function_depth: usize,
    loop_depth: usize,
}

impl Parser {
    pub fn new(mut tokens: Vec<Token>) -> Self {
        if !tokens.last().is_some_and(Token::is_eof) {
            let position = tokens.last().map(|t| t.position).unwrap_or_default();
            tokens.push(Token::new(TokenKind::Eof, "", position));
        }
        Self {
            tokens,
            current: 0,
            depth: 0,
            function_depth: 0,
            loop_depth: 0,
        }
    }

    pub fn program(mut self) -> ScriptResult<Program> {
        let mut statements = Vec::new();
        while !self.peek().is_eof() {
            statements.push(self.statement()?);
        }
        Ok(Program { statements })
    }

    fn statement(&mut self) -> ScriptResult<Stmt> {
        self.nested(|p| match p.peek().kind {
            TokenKind::Keyword(Keyword::Fn) => p.function_decl(),
            TokenKind::Keyword(Keyword::Let) => p.let_stmt(),
            TokenKind::Keyword(Keyword::Return) => p.return_stmt(),
            TokenKind::Keyword(Keyword::If) => p.if_stmt(),
            TokenKind::Keyword(Keyword::While) => p.while_stmt(),
            TokenKind::Keyword(Keyword::For) => p.for_stmt(),
            TokenKind::Keyword(Keyword::Break) => p.loop_control(Keyword::Break),
            TokenKind::Keyword(Keyword::Continue) => p.loop_control(Keyword::Continue),
            TokenKind::Punct(Punct::LeftBrace) => Ok(Stmt::Block(p.block()?)),
            _ => p.expression_stmt(),
        })
    }

    fn function_decl(&mut self) -> ScriptResult<Stmt> {
        let position = self.advance().position;
        let name = self.identifier("function name")?;
        self.expect_punct(Punct::LeftParen, "`(` after function name")?;

        let mut params = Vec::new();
        let mut seen = HashSet::new();
        if !self.check_punct(Punct::RightParen) {
            loop {
                let param_position = self.peek().position;
                let param = self.identifier("parameter name")?;
                if !seen.insert(param.clone()) {
                    return Err(ScriptError::parse(
                        "unique parameter name",
                        format!("duplicate parameter `{param}`"),
                        param_position,
                    ));
                }
                params.push(param);
                if !self.eat_punct(Punct::Comma) {
                    break;
                }
            }
        }
        self.expect_punct(Punct::RightParen, "`,` or `)` in parameter list")?;

        let enclosing_loops = std::mem::take(&mut self.loop_depth);
        self.function_depth += 1;
        let body = self.block();
        self.function_depth -= 1;
        self.loop_depth = enclosing_loops;

        Ok(Stmt::Function(Rc::new(FunctionDecl {
            name,
            params,
            body: body?,
            position,
        })))
    }

    fn let_stmt(&mut self) -> ScriptResult<Stmt> {
        let position = self.advance().position;
        let name = self.identifier("variable name after `let`")?;
        self.expect_operator(Operator::Assign, "`=` after variable name")?;
        let value = self.expression()?;
        self.terminator()?;
        Ok(Stmt::Let {
            name,
            value,
            position,
        })
    }

    fn return_stmt(&mut self) -> ScriptResult<Stmt> {
        let token = self.advance();
        if self.function_depth == 0 {
            return Err(ScriptError::parse(
                "statement",
                "`return` outside of a function",
                token.position,
            ));
        }
        let value = if self.at_terminator() {
            None
        } else {
            Some(self.expression()?)
        };
        self.terminator()?;
        Ok(Stmt::Return {
            value,
            position: token.position,
        })
    }

    fn if_stmt(&mut self) -> ScriptResult<Stmt> {
        let position = self.advance().position;
        let condition = self.expression()?;
        let then_branch = self.block()?;

        let else_branch = if self.eat_keyword(Keyword::Else) {
            if self.check_keyword(Keyword::If) {
                Some(ElseBranch::If(Box::new(self.nested(Self::if_stmt)?)))
            } else {
                Some(ElseBranch::Block(self.block()?))
            }
        } else {
            None
        };

        Ok(Stmt::If {
            condition,
            then_branch,
            else_branch,
            position,
        })
    }

    fn while_stmt(&mut self) -> ScriptResult<Stmt> {
        let position = self.advance().position;
        let condition = self.expression()?;
        self.loop_depth += 1;
        let body = self.block();
        self.loop_depth -= 1;
        Ok(Stmt::While {
            condition,
            body: body?,
            position,
        })
    }

    fn for_stmt(&mut self) -> ScriptResult<Stmt> {
        let position = self.advance().position;
        self.expect_punct(Punct::LeftParen, "`(` after `for`")?;

        let init = if self.eat_punct(Punct::Semicolon) {
            None
        } else if self.check_keyword(Keyword::Let) {
            Some(Box::new(self.let_stmt()?))
        } else {
            let init = self.assignment_or_expression()?;
            self.expect_punct(Punct::Semicolon, "`;` after loop initializer")?;
            Some(Box::new(init))
        };

        let condition = if self.check_punct(Punct::Semicolon) {
            None
        } else {
            Some(self.expression()?)
        };
        self.expect_punct(Punct::Semicolon, "`;` after loop condition")?;

        let update = if self.check_punct(Punct::RightParen) {
            None
        } else {
            Some(Box::new(self.assignment_or_expression()?))
        };
        self.expect_punct(Punct::RightParen, "`)` to close loop header")?;

        self.loop_depth += 1;
        let body = self.block();
        self.loop_depth -= 1;
        Ok(Stmt::For {
            init,
            condition,
            update,
            body: body?,
            position,
        })
    }

    fn loop_control(&mut self, keyword: Keyword) -> ScriptResult<Stmt> {
        let position = self.advance().position;
        if self.loop_depth == 0 {
            return Err(ScriptError::parse(
                "statement",
                format!("`{}` outside of a loop", keyword.as_str()),
                position,
            ));
        }
        self.terminator()?;
        Ok(match keyword {
            Keyword::Break => Stmt::Break(position),
            _ => Stmt::Continue(position),
        })
    }

    fn block(&mut self) -> ScriptResult<Block> {
        let position = self.expect_punct(Punct::LeftBrace, "`{`")?;
        let mut statements = Vec::new();
        while !self.check_punct(Punct::RightBrace) {
            if self.peek().is_eof() {
                return Err(self.unexpected("`}` to close block"));
            }
            statements.push(self.statement()?);
        }
        self.advance();
        Ok(Block {
            statements,
            position,
        })
    }

    fn expression_stmt(&mut self) -> ScriptResult<Stmt> {
        let stmt = self.assignment_or_expression()?;
        self.terminator()?;
        Ok(stmt)
    }

    /// Expression, or assignment when the expression turns out to be a bare
    /// identifier followed by `=`. Leaves the terminator to the caller.
    fn assignment_or_expression(&mut self) -> ScriptResult<Stmt> {
        let expr = self.expression()?;

        if !self.check_operator(Operator::Assign) {
            return Ok(Stmt::Expr(expr));
        }
        let Expr::Identifier { name, position } = expr else {
            return Err(self.unexpected("`;` (only variables can be assigned)"));
        };
        self.advance();
        let value = self.expression()?;
        Ok(Stmt::Assign {
            name,
            value,
            position,
        })
    }

    pub fn expression(&mut self) -> ScriptResult<Expr> {
        self.binary(1)
    }

    /// Precedence climbing over the binary operator table.
    fn binary(&mut self, min_precedence: u8) -> ScriptResult<Expr> {
        let mut left = self.unary()?;

        while let Some((op, precedence)) = self.peek_binary_op() {
            if precedence < min_precedence {
                break;
            }
            let position = self.advance().position;
            let right = self.nested(|p| p.binary(precedence + 1))?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
                position,
            };
        }

        Ok(left)
    }

    fn unary(&mut self) -> ScriptResult<Expr> {
        let op = match self.peek().kind {
            TokenKind::Operator(Operator::Minus) => UnaryOp::Neg,
            TokenKind::Operator(Operator::Bang) => UnaryOp::Not,
            _ => return self.call(),
        };
        let position = self.advance().position;
        let operand = self.nested(Self::unary)?;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
            position,
        })
    }

    /// Primary expression followed by any number of `(args)` calls and
    /// `[index]` lookups.
    fn call(&mut self) -> ScriptResult<Expr> {
        let mut expr = self.primary()?;

        loop {
            if self.check_punct(Punct::LeftParen) {
                let position = self.advance().position;
                let args =
                    self.expression_list(Punct::RightParen, "`,` or `)` in argument list")?;
                expr = Expr::Call {
                    callee: Box::new(expr),
                    args,
                    position,
                };
            } else if self.check_punct(Punct::LeftBracket) {
                let position = self.advance().position;
                let index = self.nested(Self::expression)?;
                self.expect_punct(Punct::RightBracket, "`]` after index")?;
                expr = Expr::Index {
                    target: Box::new(expr),
                    index: Box::new(index),
                    position,
                };
            } else {
                return Ok(expr);
            }
        }
    }

    /// Comma separated expressions up to and including `close`. A trailing
    /// comma is accepted only in array literals.
    fn expression_list(&mut self, close: Punct, expected: &str) -> ScriptResult<Vec<Expr>> {
        let mut items = Vec::new();
        while !self.check_punct(close) {
            items.push(self.nested(Self::expression)?);
            if !self.eat_punct(Punct::Comma) {
                break;
            }
            if close == Punct::RightParen && self.check_punct(close) {
                return Err(self.unexpected("expression"));
            }
        }
        self.expect_punct(close, expected)?;
        Ok(items)
    }

    fn primary(&mut self) -> ScriptResult<Expr> {
        let token = self.peek().clone();
        let expr = match token.kind {
            TokenKind::Number(n) => Expr::Number(n),
            TokenKind::Str(s) => Expr::Str(s),
            TokenKind::Keyword(Keyword::True) => Expr::Bool(true),
            TokenKind::Keyword(Keyword::False) => Expr::Bool(false),
            TokenKind::Identifier(name) => Expr::Identifier {
                name,
                position: token.position,
            },
            TokenKind::Punct(Punct::LeftParen) => {
                self.advance();
                let inner = self.nested(Self::expression)?;
                self.expect_punct(Punct::RightParen, "`)`")?;
                return Ok(inner);
            }
            TokenKind::Punct(Punct::LeftBracket) => {
                self.advance();
                let elements = self.nested(|p| {
                    p.expression_list(Punct::RightBracket, "`,` or `]` in array literal")
                })?;
                return Ok(Expr::Array {
                    elements,
                    position: token.position,
                });
            }
            _ => return Err(self.unexpected("expression")),
        };
        self.advance();
        Ok(expr)
    }

    fn peek_binary_op(&self) -> Option<(BinaryOp, u8)> {
        let TokenKind::Operator(op) = self.peek().kind else {
            return None;
        };
        let entry = match op {
            Operator::OrOr => (BinaryOp::Or, 1),
            Operator::AndAnd => (BinaryOp::And, 2),
            Operator::EqualEqual => (BinaryOp::Equal, 3),
            Operator::BangEqual => (BinaryOp::NotEqual, 3),
            Operator::Less => (BinaryOp::Less, 4),
            Operator::LessEqual => (BinaryOp::LessEqual, 4),
            Operator::Greater => (BinaryOp::Greater, 4),
            Operator::GreaterEqual => (BinaryOp::GreaterEqual, 4),
            Operator::Plus => (BinaryOp::Add, 5),
            Operator::Minus => (BinaryOp::Sub, 5),
            Operator::Star => (BinaryOp::Mul, 6),
            Operator::Slash => (BinaryOp::Div, 6),
            Operator::Percent => (BinaryOp::Mod, 6),
            Operator::Bang | Operator::Assign => return None,
        };
        Some(entry)
    }

    fn nested<T>(&mut self, rule: impl FnOnce(&mut Self) -> ScriptResult<T>) -> ScriptResult<T> {
        if self.depth >= MAX_NESTING {
            return Err(ScriptError::parse(
                format!("at most {MAX_NESTING} levels of nesting"),
                self.peek().kind.describe(),
                self.peek().position,
            ));
        }
        self.depth += 1;
        let result = rule(self);
        self.depth -= 1;
        result
    }

    /// `;` ends a simple statement; it may be left out right before `}` or
    /// the end of input.
    fn terminator(&mut self) -> ScriptResult<()> {
        if self.eat_punct(Punct::Semicolon) || self.at_block_end() {
            Ok(())
        } else {
            Err(self.unexpected("`;`"))
        }
    }

    fn at_terminator(&self) -> bool {
        self.check_punct(Punct::Semicolon) || self.at_block_end()
    }

    fn at_block_end(&self) -> bool {
        self.check_punct(Punct::RightBrace) || self.peek().is_eof()
    }

    fn identifier(&mut self, expected: &str) -> ScriptResult<String> {
        match &self.peek().kind {
            TokenKind::Identifier(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected(expected)),
        }
    }

    fn expect_punct(&mut self, punct: Punct, expected: &str) -> ScriptResult<Position> {
        if self.check_punct(punct) {
            Ok(self.advance().position)
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn expect_operator(&mut self, op: Operator, expected: &str) -> ScriptResult<()> {
        if self.check_operator(op) {
            self.advance();
            Ok(())
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn eat_punct(&mut self, punct: Punct) -> bool {
        let matched = self.check_punct(punct);
        if matched {
            self.advance();
        }
        matched
    }

    fn eat_keyword(&mut self, keyword: Keyword) -> bool {
        let matched = self.check_keyword(keyword);
        if matched {
            self.advance();
        }
        matched
    }

    fn check_punct(&self, punct: Punct) -> bool {
        self.peek().kind == TokenKind::Punct(punct)
    }

    fn check_keyword(&self, keyword: Keyword) -> bool {
        self.peek().kind == TokenKind::Keyword(keyword)
    }

    fn check_operator(&self, op: Operator) -> bool {
        self.peek().kind == TokenKind::Operator(op)
    }

    fn unexpected(&self, expected: &str) -> ScriptError {
        let token = self.peek();
        ScriptError::parse(expected, token.kind.describe(), token.position)
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current.min(self.tokens.len() - 1)]
    }

    /// Consume the current token. The trailing EOF is never consumed.
    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if !token.is_eof() {
            self.current += 1;
        }
        token
    }
}
