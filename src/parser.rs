use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::ast::{Accessor, Expr, ExprKind, FunctionDecl, Stmt, StmtKind};
use crate::error::{Error, ErrorKind, SharedErrorReporter};
use crate::object::Object;
use crate::token::{Token, TokenType};

type PResult<T> = Result<T, Error>;

/// Recursive-descent parser with one token of lookahead. Parse errors are
/// reported through the shared reporter; the parser synchronizes to the
/// next statement boundary and keeps going.
pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    error_reporter: Option<SharedErrorReporter>,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            current: 0,
            error_reporter: None,
        }
    }

    pub fn with_error_reporting(self, error_reporter: SharedErrorReporter) -> Self {
        Self {
            error_reporter: Some(error_reporter),
            ..self
        }
    }

    pub fn parse(&mut self) -> Vec<Rc<Stmt>> {
        let mut statements = vec![];
        while !self.is_at_end() {
            statements.push(self.declaration());
        }

        statements
    }

    fn declaration(&mut self) -> Rc<Stmt> {
        let result = match self.peek().token_type {
            TokenType::Var => {
                self.advance();
                self.var_declaration()
            }
            TokenType::Class => {
                self.advance();
                self.class_declaration()
            }
            // `func name(..)` declares; a bare `func (..)` is a lambda
            // expression and falls through to the statement rule.
            TokenType::Func if self.check_next(TokenType::Identifier) => {
                self.advance();
                self.advance();
                self.function_declaration()
            }
            _ => self.statement(),
        };

        match result {
            Ok(stmt) => Rc::new(stmt),
            Err(e) => {
                self.report(&e);
                self.synchronize();
                Rc::new(Stmt::new(StmtKind::Error, e.pos_start, e.pos_end))
            }
        }
    }

    fn var_declaration(&mut self) -> PResult<Stmt> {
        let start = self.previous().pos_start.clone();
        let mut statements = vec![];

        loop {
            let name = self.expect(TokenType::Identifier, "Expected identifier")?;

            let initializer = if self.match_tt(&[TokenType::Equal]) {
                Some(self.ternary()?)
            } else {
                None
            };

            let end = self.previous().pos_end.clone();
            statements.push(Stmt::new(
                StmtKind::VarDecl {
                    name: name.clone(),
                    initializer,
                },
                name.pos_start.clone(),
                end,
            ));

            if !self.match_tt(&[TokenType::Comma]) {
                break;
            }
        }

        self.expect(TokenType::Semicolon, "Expect ';' after variable declaration")?;

        if statements.len() == 1 {
            Ok(statements.pop().unwrap())
        } else {
            let end = self.previous().pos_end.clone();
            Ok(Stmt::new(
                StmtKind::Pack {
                    statements: statements.into_iter().map(Rc::new).collect(),
                },
                start,
                end,
            ))
        }
    }

    fn function_declaration(&mut self) -> PResult<Stmt> {
        let decl = self.method_declaration()?;
        let name = decl.name.clone().expect("function declaration has a name");
        let end = self.previous().pos_end.clone();

        Ok(Stmt::new(
            StmtKind::FuncDecl { decl },
            name.pos_start,
            end,
        ))
    }

    /// Parses the body of a named function whose name token was just
    /// consumed. Shared between `func` declarations and class methods.
    fn method_declaration(&mut self) -> PResult<Rc<FunctionDecl>> {
        let name = self.previous().clone();
        let (params, defaults, body) = self.func_body()?;

        Ok(Rc::new(FunctionDecl {
            name: Some(name),
            params,
            defaults,
            body,
        }))
    }

    fn class_declaration(&mut self) -> PResult<Stmt> {
        let start = self.previous().pos_start.clone();
        let name = self.expect(TokenType::Identifier, "Expect Class name")?;

        let superclass = if self.match_tt(&[TokenType::Greater]) {
            let super_name = self.expect(TokenType::Identifier, "Expect SuperClass name")?;
            let (ps, pe) = (super_name.pos_start.clone(), super_name.pos_end.clone());
            Some(Expr::new(
                ExprKind::Variable {
                    name: super_name,
                    depth: std::cell::Cell::new(-1),
                },
                ps,
                pe,
            ))
        } else {
            None
        };

        self.expect(TokenType::LeftBrace, "Expect '{' before class body")?;

        let mut methods = vec![];
        while !self.check(TokenType::RightBrace) && !self.is_at_end() {
            self.expect(TokenType::Identifier, "Expect method name")?;
            methods.push(self.method_declaration()?);
        }

        self.expect(TokenType::RightBrace, "Expect '}' to close up class body")?;
        let end = self.previous().pos_end.clone();

        Ok(Stmt::new(
            StmtKind::ClassDecl {
                name,
                methods,
                superclass,
            },
            start,
            end,
        ))
    }

    fn statement(&mut self) -> PResult<Stmt> {
        match self.peek().token_type {
            TokenType::LeftBrace => {
                self.advance();
                let start = self.previous().pos_start.clone();
                let statements = self.block()?;
                let end = self.previous().pos_end.clone();
                Ok(Stmt::new(StmtKind::Block { statements }, start, end))
            }
            TokenType::If => {
                self.advance();
                self.if_statement()
            }
            TokenType::While => {
                self.advance();
                self.while_statement()
            }
            TokenType::For => {
                self.advance();
                self.for_statement()
            }
            TokenType::Break => {
                self.advance();
                let keyword = self.previous().clone();
                self.expect(TokenType::Semicolon, "Expect ';' after break")?;
                let (ps, pe) = (keyword.pos_start.clone(), keyword.pos_end.clone());
                Ok(Stmt::new(StmtKind::Break { keyword }, ps, pe))
            }
            TokenType::Continue => {
                self.advance();
                let keyword = self.previous().clone();
                self.expect(TokenType::Semicolon, "Expect ';' after continue")?;
                let (ps, pe) = (keyword.pos_start.clone(), keyword.pos_end.clone());
                Ok(Stmt::new(StmtKind::Continue { keyword }, ps, pe))
            }
            TokenType::Return => {
                self.advance();
                self.return_statement()
            }
            TokenType::Import => {
                self.advance();
                self.import_statement()
            }
            _ => self.expression_statement(),
        }
    }

    fn if_statement(&mut self) -> PResult<Stmt> {
        let start = self.previous().pos_start.clone();
        self.expect(TokenType::LeftParen, "Expect '(' after if")?;
        let condition = self.expression()?;
        self.expect(TokenType::RightParen, "Expect ')' to close up condition")?;

        let then_branch = Rc::new(self.statement()?);
        let else_branch = if self.match_tt(&[TokenType::Else]) {
            Some(Rc::new(self.statement()?))
        } else {
            None
        };

        let end = self.previous().pos_end.clone();
        Ok(Stmt::new(
            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            },
            start,
            end,
        ))
    }

    fn while_statement(&mut self) -> PResult<Stmt> {
        let start = self.previous().pos_start.clone();
        self.expect(TokenType::LeftParen, "Expect '(' after while")?;
        let condition = self.expression()?;
        self.expect(TokenType::RightParen, "Expect ')' to close up condition")?;

        let body = Rc::new(self.statement()?);
        let end = self.previous().pos_end.clone();

        Ok(Stmt::new(StmtKind::While { condition, body }, start, end))
    }

    fn for_statement(&mut self) -> PResult<Stmt> {
        let start = self.previous().pos_start.clone();
        self.expect(TokenType::LeftParen, "Expect '(' after for")?;

        let initializer = if self.match_tt(&[TokenType::Semicolon]) {
            None
        } else if self.match_tt(&[TokenType::Var]) {
            Some(Rc::new(self.var_declaration()?))
        } else {
            Some(Rc::new(self.expression_statement()?))
        };

        let condition = if !self.check(TokenType::Semicolon) {
            Some(self.expression()?)
        } else {
            None
        };
        self.expect(TokenType::Semicolon, "Expect ';' after condition")?;

        let increment = if !self.check(TokenType::RightParen) {
            Some(self.expression()?)
        } else {
            None
        };
        self.expect(TokenType::RightParen, "Expect ')' after for clauses")?;

        let body = Rc::new(self.statement()?);
        let end = self.previous().pos_end.clone();

        Ok(Stmt::new(
            StmtKind::For {
                initializer,
                condition,
                increment,
                body,
            },
            start,
            end,
        ))
    }

    fn return_statement(&mut self) -> PResult<Stmt> {
        let keyword = self.previous().clone();
        let value = if !self.check(TokenType::Semicolon) {
            Some(self.expression()?)
        } else {
            None
        };
        self.expect(TokenType::Semicolon, "Expected ';' after return statement")?;

        let (ps, pe) = (keyword.pos_start.clone(), self.previous().pos_end.clone());
        Ok(Stmt::new(StmtKind::Return { keyword, value }, ps, pe))
    }

    fn import_statement(&mut self) -> PResult<Stmt> {
        let start = self.previous().pos_start.clone();
        self.expect(TokenType::LeftBrace, "Expect '{' after import.")?;

        let mut symbols = BTreeMap::new();
        if self.match_tt(&[TokenType::Star]) {
            symbols.insert(self.previous().clone(), None);
        } else {
            loop {
                self.expect(TokenType::Identifier, "Expect symbol list")?;
                let symbol = self.previous().clone();

                let alias = if self.match_tt(&[TokenType::As]) {
                    self.expect(TokenType::Identifier, "Expect identifier for alias")?;
                    Some(self.previous().clone())
                } else {
                    None
                };

                symbols.insert(symbol, alias);
                if !self.match_tt(&[TokenType::Comma]) {
                    break;
                }
            }
        }

        self.expect(TokenType::RightBrace, "Expect '}' to close up import list")?;
        self.expect(TokenType::From, "Expect 'from' before import path")?;
        self.expect(TokenType::StringLiteral, "Expect module path string")?;
        let path = self.previous().clone();
        self.expect(TokenType::Semicolon, "Expect ';' after import statement")?;

        let end = self.previous().pos_end.clone();
        Ok(Stmt::new(
            StmtKind::Import {
                symbols,
                path,
                resolved: RefCell::new(None),
            },
            start,
            end,
        ))
    }

    fn block(&mut self) -> PResult<Vec<Rc<Stmt>>> {
        let mut statements = vec![];
        while !self.check(TokenType::RightBrace) && !self.is_at_end() {
            statements.push(self.declaration());
        }

        self.expect(TokenType::RightBrace, "Expected '}' at the end of a block")?;
        Ok(statements)
    }

    fn expression_statement(&mut self) -> PResult<Stmt> {
        let expr = self.expression()?;
        self.expect(TokenType::Semicolon, "Expect ';' at the end of an expression.")?;

        let (ps, pe) = (expr.pos_start.clone(), self.previous().pos_end.clone());
        Ok(Stmt::new(StmtKind::Expression { expr }, ps, pe))
    }

    pub fn expression(&mut self) -> PResult<Expr> {
        self.comma()
    }

    fn comma(&mut self) -> PResult<Expr> {
        let mut expressions = vec![self.assignment()?];
        while self.match_tt(&[TokenType::Comma]) {
            expressions.push(self.assignment()?);
        }

        if expressions.len() == 1 {
            Ok(expressions.pop().unwrap())
        } else {
            let ps = expressions.first().unwrap().pos_start.clone();
            let pe = expressions.last().unwrap().pos_end.clone();
            Ok(Expr::new(ExprKind::Pack { expressions }, ps, pe))
        }
    }

    fn assignment(&mut self) -> PResult<Expr> {
        let expr = self.ternary()?;

        if self.match_tt(&[
            TokenType::Equal,
            TokenType::PlusEqual,
            TokenType::MinusEqual,
            TokenType::StarEqual,
            TokenType::SlashEqual,
        ]) {
            let op = self.previous().clone();
            // Right-associative: allows a = b = ... = 1;
            let value = self.assignment()?;
            let (ps, pe) = (expr.pos_start.clone(), value.pos_end.clone());

            return match expr.kind {
                ExprKind::Variable { name, .. } => Ok(Expr::new(
                    ExprKind::Assignment {
                        name,
                        op,
                        value: Box::new(value),
                        depth: std::cell::Cell::new(-1),
                    },
                    ps,
                    pe,
                )),
                ExprKind::Retrieve { holder, accessor } => Ok(Expr::new(
                    ExprKind::Set {
                        holder,
                        accessor,
                        op,
                        value: Box::new(value),
                    },
                    ps,
                    pe,
                )),
                _ => Err(Error::new(
                    ErrorKind::Parsing,
                    ps,
                    pe,
                    "Invalid assignment target",
                )),
            };
        }

        Ok(expr)
    }

    fn ternary(&mut self) -> PResult<Expr> {
        let expr = self.logic_or()?;

        if self.match_tt(&[TokenType::QuestionMark]) {
            let then_branch = self.assignment()?;
            self.expect(
                TokenType::Colon,
                "Expect ':' after then branch for ternary expression",
            )?;
            let else_branch = self.assignment()?;

            let (ps, pe) = (expr.pos_start.clone(), else_branch.pos_end.clone());
            return Ok(Expr::new(
                ExprKind::Ternary {
                    condition: Box::new(expr),
                    then_branch: Box::new(then_branch),
                    else_branch: Box::new(else_branch),
                },
                ps,
                pe,
            ));
        }

        Ok(expr)
    }

    fn logic_or(&mut self) -> PResult<Expr> {
        let mut expr = self.logic_and()?;

        while self.match_tt(&[TokenType::Or]) {
            let right = self.logic_and()?;
            let (ps, pe) = (expr.pos_start.clone(), right.pos_end.clone());
            expr = Expr::new(
                ExprKind::Or {
                    left: Box::new(expr),
                    right: Box::new(right),
                },
                ps,
                pe,
            );
        }

        Ok(expr)
    }

    fn logic_and(&mut self) -> PResult<Expr> {
        let mut expr = self.equality()?;

        while self.match_tt(&[TokenType::And]) {
            let right = self.equality()?;
            let (ps, pe) = (expr.pos_start.clone(), right.pos_end.clone());
            expr = Expr::new(
                ExprKind::And {
                    left: Box::new(expr),
                    right: Box::new(right),
                },
                ps,
                pe,
            );
        }

        Ok(expr)
    }

    fn equality(&mut self) -> PResult<Expr> {
        self.bin_op(
            Self::comparison,
            &[TokenType::EqualEqual, TokenType::BangEqual],
        )
    }

    fn comparison(&mut self) -> PResult<Expr> {
        self.bin_op(
            Self::term,
            &[
                TokenType::Greater,
                TokenType::GreaterEqual,
                TokenType::Less,
                TokenType::LessEqual,
            ],
        )
    }

    fn term(&mut self) -> PResult<Expr> {
        self.bin_op(Self::factor, &[TokenType::Plus, TokenType::Minus])
    }

    fn factor(&mut self) -> PResult<Expr> {
        self.bin_op(
            Self::unary,
            &[TokenType::Star, TokenType::Slash, TokenType::Percent],
        )
    }

    fn bin_op(
        &mut self,
        operand: fn(&mut Self) -> PResult<Expr>,
        ops: &[TokenType],
    ) -> PResult<Expr> {
        let mut expr = operand(self)?;

        while self.match_tt(ops) {
            let op = self.previous().clone();
            let right = operand(self)?;
            let (ps, pe) = (expr.pos_start.clone(), right.pos_end.clone());
            expr = Expr::new(
                ExprKind::Binary {
                    left: Box::new(expr),
                    op,
                    right: Box::new(right),
                },
                ps,
                pe,
            );
        }

        Ok(expr)
    }

    fn unary(&mut self) -> PResult<Expr> {
        if self.match_tt(&[TokenType::Minus, TokenType::Bang]) {
            let op = self.previous().clone();
            let right = self.unary()?;
            let (ps, pe) = (op.pos_start.clone(), right.pos_end.clone());
            return Ok(Expr::new(
                ExprKind::Unary {
                    op,
                    right: Box::new(right),
                },
                ps,
                pe,
            ));
        }

        self.prefix()
    }

    fn prefix(&mut self) -> PResult<Expr> {
        if self.match_tt(&[TokenType::PlusPlus, TokenType::MinusMinus]) {
            let op = self.previous().clone();
            let target = self.call()?;
            return self.crement(op, target, true);
        }

        self.postfix()
    }

    fn postfix(&mut self) -> PResult<Expr> {
        let expr = self.call()?;

        if self.match_tt(&[TokenType::PlusPlus, TokenType::MinusMinus]) {
            let op = self.previous().clone();
            return self.crement(op, expr, false);
        }

        Ok(expr)
    }

    fn crement(&mut self, op: Token, target: Expr, prefix: bool) -> PResult<Expr> {
        if !matches!(
            target.kind,
            ExprKind::Variable { .. } | ExprKind::Retrieve { .. }
        ) {
            return Err(Error::new(
                ErrorKind::Parsing,
                target.pos_start,
                target.pos_end,
                "Can only '++' or '--' a variable",
            ));
        }

        let (ps, pe) = if prefix {
            (op.pos_start.clone(), target.pos_end.clone())
        } else {
            (target.pos_start.clone(), op.pos_end.clone())
        };
        let kind = if op.token_type == TokenType::PlusPlus {
            ExprKind::Increment {
                target: Box::new(target),
                prefix,
            }
        } else {
            ExprKind::Decrement {
                target: Box::new(target),
                prefix,
            }
        };

        Ok(Expr::new(kind, ps, pe))
    }

    fn call(&mut self) -> PResult<Expr> {
        let mut expr = self.primary()?;

        loop {
            if self.match_tt(&[TokenType::LeftParen]) {
                let arguments = self.arguments(TokenType::RightParen)?;
                self.expect(TokenType::RightParen, "Expect ')' to close up argument list")?;
                let (ps, pe) = (expr.pos_start.clone(), self.previous().pos_end.clone());
                expr = Expr::new(
                    ExprKind::Call {
                        callee: Box::new(expr),
                        arguments,
                    },
                    ps,
                    pe,
                );
            } else if self.match_tt(&[TokenType::Dot]) {
                self.expect(TokenType::Identifier, "Expect property name after '.'")?;
                let prop = self.previous().clone();
                let (ps, pe) = (expr.pos_start.clone(), prop.pos_end.clone());
                expr = Expr::new(
                    ExprKind::Retrieve {
                        holder: Box::new(expr),
                        accessor: Accessor::Property(prop),
                    },
                    ps,
                    pe,
                );
            } else if self.match_tt(&[TokenType::LeftBracket]) {
                let index = self.logic_or()?;
                self.expect(TokenType::RightBracket, "Expect ']' to close up indexing")?;
                let (ps, pe) = (expr.pos_start.clone(), self.previous().pos_end.clone());
                expr = Expr::new(
                    ExprKind::Retrieve {
                        holder: Box::new(expr),
                        accessor: Accessor::Index(Box::new(index)),
                    },
                    ps,
                    pe,
                );
            } else {
                break;
            }
        }

        Ok(expr)
    }

    fn arguments(&mut self, ending: TokenType) -> PResult<Vec<Expr>> {
        let mut arguments = vec![];
        if !self.check(ending) {
            loop {
                arguments.push(self.ternary()?);
                if !self.match_tt(&[TokenType::Comma]) {
                    break;
                }
            }
        }

        Ok(arguments)
    }

    fn primary(&mut self) -> PResult<Expr> {
        if self.match_tt(&[
            TokenType::Number,
            TokenType::StringLiteral,
            TokenType::True,
            TokenType::False,
            TokenType::Nil,
        ]) {
            let token = self.previous().clone();
            let value = Object::from_literal_token(&token).map_err(|msg| {
                Error::new(
                    ErrorKind::Parsing,
                    token.pos_start.clone(),
                    token.pos_end.clone(),
                    msg,
                )
            })?;
            return Ok(Expr::new(
                ExprKind::Literal { value },
                token.pos_start,
                token.pos_end,
            ));
        }

        if self.match_tt(&[TokenType::Identifier]) {
            let name = self.previous().clone();
            let (ps, pe) = (name.pos_start.clone(), name.pos_end.clone());
            return Ok(Expr::new(
                ExprKind::Variable {
                    name,
                    depth: std::cell::Cell::new(-1),
                },
                ps,
                pe,
            ));
        }

        if self.match_tt(&[TokenType::LeftParen]) {
            let expr = self.expression()?;
            self.expect(TokenType::RightParen, "Expected ')' for closure")?;
            return Ok(expr);
        }

        if self.match_tt(&[TokenType::This]) {
            let keyword = self.previous().clone();
            let (ps, pe) = (keyword.pos_start.clone(), keyword.pos_end.clone());
            return Ok(Expr::new(
                ExprKind::This {
                    keyword,
                    depth: std::cell::Cell::new(-1),
                },
                ps,
                pe,
            ));
        }

        if self.match_tt(&[TokenType::Super]) {
            let keyword = self.previous().clone();
            self.expect(TokenType::Dot, "Expected '.' to access super fields")?;
            self.expect(TokenType::Identifier, "Expected identifier after '.'")?;
            let method = self.previous().clone();
            let (ps, pe) = (keyword.pos_start.clone(), method.pos_end.clone());
            return Ok(Expr::new(
                ExprKind::Super {
                    keyword,
                    method,
                    depth: std::cell::Cell::new(-1),
                },
                ps,
                pe,
            ));
        }

        if self.match_tt(&[TokenType::Func]) {
            let start = self.previous().pos_start.clone();
            let (params, defaults, body) = self.func_body()?;
            let end = self.previous().pos_end.clone();
            return Ok(Expr::new(
                ExprKind::Lambda(Rc::new(FunctionDecl {
                    name: None,
                    params,
                    defaults,
                    body,
                })),
                start,
                end,
            ));
        }

        if self.match_tt(&[TokenType::LeftBracket]) {
            let start = self.previous().pos_start.clone();
            let items = self.arguments(TokenType::RightBracket)?;
            self.expect(TokenType::RightBracket, "Expect ']' to close up List")?;
            let end = self.previous().pos_end.clone();
            return Ok(Expr::new(ExprKind::List { items }, start, end));
        }

        Err(Error::new(
            ErrorKind::Parsing,
            self.peek().pos_start.clone(),
            self.peek().pos_end.clone(),
            "Expected expression",
        ))
    }

    fn func_body(&mut self) -> PResult<(Vec<Token>, Vec<Expr>, Vec<Rc<Stmt>>)> {
        self.expect(TokenType::LeftParen, "Expected '(' before parameter list")?;

        let mut params = vec![];
        let mut defaults = vec![];

        if !self.check(TokenType::RightParen) {
            let start = self.peek().pos_start.clone();
            let mut first_optional = usize::MAX;
            let mut last_required = 0usize;
            let mut idx = 0usize;

            loop {
                self.expect(TokenType::Identifier, "Expected a parameter name")?;
                params.push(self.previous().clone());

                if self.match_tt(&[TokenType::Equal]) {
                    defaults.push(self.ternary()?);
                    if first_optional > idx {
                        first_optional = idx;
                    }
                } else {
                    last_required = idx;
                }

                idx += 1;
                if !self.match_tt(&[TokenType::Comma]) {
                    break;
                }
            }

            if last_required > first_optional {
                return Err(Error::new(
                    ErrorKind::Parsing,
                    start,
                    self.peek().pos_end.clone(),
                    "Optional parameters cannot precede required one.",
                ));
            }
        }

        self.expect(TokenType::RightParen, "Expected ')' after parameter list")?;
        self.expect(TokenType::LeftBrace, "Expected '{' before function body")?;
        let body = self.block()?;

        Ok((params, defaults, body))
    }

    fn expect(&mut self, token_type: TokenType, message: &str) -> PResult<Token> {
        if self.check(token_type) {
            self.advance();
            return Ok(self.previous().clone());
        }

        Err(Error::new(
            ErrorKind::Parsing,
            self.peek().pos_start.clone(),
            self.peek().pos_end.clone(),
            message,
        ))
    }

    fn match_tt(&mut self, types: &[TokenType]) -> bool {
        for tt in types {
            if self.check(*tt) {
                self.advance();
                return true;
            }
        }

        false
    }

    fn check(&self, token_type: TokenType) -> bool {
        if self.is_at_end() {
            return false;
        }

        self.peek().token_type == token_type
    }

    fn check_next(&self, token_type: TokenType) -> bool {
        self.tokens
            .get(self.current + 1)
            .map(|t| t.token_type == token_type)
            .unwrap_or(false)
    }

    fn advance(&mut self) {
        if !self.is_at_end() {
            self.current += 1;
        }
    }

    fn is_at_end(&self) -> bool {
        self.peek().token_type == TokenType::EndOfFile
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current - 1]
    }

    fn report(&self, error: &Error) {
        match &self.error_reporter {
            Some(reporter) => reporter.borrow_mut().report(error),
            None => eprintln!("{error}"),
        }
    }

    fn synchronize(&mut self) {
        while !self.is_at_end() {
            self.advance();

            if self.previous().token_type == TokenType::Semicolon {
                return;
            }

            match self.peek().token_type {
                TokenType::Var
                | TokenType::If
                | TokenType::While
                | TokenType::For
                | TokenType::Func
                | TokenType::Class
                | TokenType::Return => return,
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::AstPrinter;
    use crate::scanner::Scanner;

    fn parse(source: &str) -> Vec<Rc<Stmt>> {
        let tokens = Scanner::new("<test>", source)
            .scan_tokens()
            .expect("failed to scan");
        Parser::new(tokens).parse()
    }

    fn first_printed(source: &str) -> String {
        let stmts = parse(source);
        AstPrinter::stmt_to_string(&stmts[0])
    }

    #[test]
    fn precedence_of_arithmetic() {
        assert_eq!(first_printed("1 + 2 * 3;"), "(+ 1 (* 2 3));");
        assert_eq!(first_printed("(1 + 2) * 3;"), "(* (+ 1 2) 3);");
        assert_eq!(first_printed("7 % 3 - 1;"), "(- (% 7 3) 1);");
    }

    #[test]
    fn ternary_and_logic() {
        assert_eq!(
            first_printed("a and b or c ? 1 : 2;"),
            "(?: (or (and a b) c) 1 2);"
        );
    }

    #[test]
    fn assignment_is_right_associative() {
        assert_eq!(first_printed("a = b = 1;"), "(= a (= b 1));");
        assert_eq!(first_printed("a += 2;"), "(+= a 2);");
    }

    #[test]
    fn member_and_index_assignments_become_set() {
        assert_eq!(first_printed("a.b = 1;"), "(= a.b 1);");
        assert_eq!(first_printed("a[0] *= 2;"), "(*= a[0] 2);");
    }

    #[test]
    fn invalid_assignment_target_recovers() {
        let stmts = parse("1 = 2; var ok = 3;");
        assert!(matches!(stmts[0].kind, StmtKind::Error));
        assert!(matches!(stmts[1].kind, StmtKind::VarDecl { .. }));
    }

    #[test]
    fn prefix_and_postfix_crement() {
        assert_eq!(first_printed("++i;"), "(++ i);");
        assert_eq!(first_printed("i--;"), "(i --);");
        let stmts = parse("++3;");
        assert!(matches!(stmts[0].kind, StmtKind::Error));
    }

    #[test]
    fn packed_var_declarations() {
        assert_eq!(
            first_printed("var a, b = 1, c;"),
            "(pack var a; var b = 1; var c;)"
        );
    }

    #[test]
    fn class_with_superclass_and_methods() {
        assert_eq!(
            first_printed("class B > A { greet() { return 1; } }"),
            "(class B > A [greet])"
        );
    }

    #[test]
    fn lambda_in_expression_position() {
        assert_eq!(
            first_printed("var f = func(x) { return x; };"),
            "var f = (lambda/1);"
        );
    }

    #[test]
    fn optional_parameter_before_required_is_an_error() {
        let stmts = parse("func f(a = 1, b) { }");
        assert!(matches!(stmts[0].kind, StmtKind::Error));
    }

    #[test]
    fn import_with_aliases() {
        assert_eq!(
            first_printed(r#"import { a, b as c } from "lib.lox";"#),
            "(import { a, b } from \"lib.lox\")"
        );
    }

    #[test]
    fn call_member_index_chain() {
        assert_eq!(first_printed("a.b(1)[2];"), "(call a.b [1])[2];");
    }

    #[test]
    fn list_literals_parse_at_ternary_precedence() {
        assert_eq!(first_printed("[1, 2, x ? 3 : 4];"), "[1, 2, (?: x 3 4)];");
    }
}
