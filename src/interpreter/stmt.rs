use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::ast::{Expr, FunctionDecl, Stmt, StmtKind};
use crate::object::Object;
use crate::token::{Token, TokenType};

use super::class::{Class, ClassObject};
use super::context::Context;
use super::error::RuntimeError;
use super::func::Function;
use super::Interpreter;

impl Interpreter {
    pub(super) fn execute_stmt(&mut self, stmt: &Stmt) -> Result<(), RuntimeError> {
        match &stmt.kind {
            StmtKind::Expression { expr } => {
                let result = self.evaluate_expr(expr)?;

                if self.repl_echo && !matches!(result, Object::Nil) {
                    let rendered = self.stringify(&result)?;
                    println!("{rendered}");
                }
            }
            StmtKind::VarDecl { name, initializer } => {
                let value = match initializer {
                    Some(expr) => self.evaluate_expr(expr)?,
                    None => Object::Nil,
                };

                self.context.borrow_mut().set(&name.lexeme, value);
            }
            StmtKind::FuncDecl { decl } => {
                // The closure is the context in effect at declaration
                // time, not at call time.
                let function = Function::new(decl.clone(), self.context.clone(), None, self)?;
                let name = decl.name.as_ref().expect("function declaration has a name");
                self.context
                    .borrow_mut()
                    .set(&name.lexeme, Object::Callable(Rc::new(function)));
            }
            StmtKind::ClassDecl {
                name,
                methods,
                superclass,
            } => self.execute_class_decl(name, methods, superclass)?,
            StmtKind::Block { statements } => {
                // Expression echo stays quiet inside blocks.
                let saved_echo = std::mem::replace(&mut self.repl_echo, false);
                let context = Context::with_parent(self.context.clone()).as_shared();
                let result = self.execute_block(statements, context);
                self.repl_echo = saved_echo;
                result?;
            }
            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate_expr(condition)?.is_true() {
                    self.execute(then_branch)?;
                } else if let Some(else_branch) = else_branch {
                    self.execute(else_branch)?;
                }
            }
            StmtKind::While { condition, body } => {
                while self.evaluate_expr(condition)?.is_true() {
                    match self.execute(body) {
                        Err(RuntimeError::Break) => break,
                        Err(RuntimeError::Continue) => {}
                        Err(e) => return Err(e),
                        Ok(()) => {}
                    }

                    if self.has_pending_return() {
                        break;
                    }
                }
            }
            StmtKind::For {
                initializer,
                condition,
                increment,
                body,
            } => {
                // The whole statement gets its own scope so the declared
                // loop variable dies with it.
                let scope = Context::with_parent(self.context.clone()).as_shared();
                let prev = std::mem::replace(&mut self.context, scope);
                let result = self.run_for(initializer, condition, increment, body);
                self.context = prev;
                self.run_pending_destructors();
                result?;
            }
            StmtKind::Break { .. } => return Err(RuntimeError::Break),
            StmtKind::Continue { .. } => return Err(RuntimeError::Continue),
            StmtKind::Return { value, .. } => {
                let value = match value {
                    Some(expr) => self.evaluate_expr(expr)?,
                    None => Object::Nil,
                };

                self.set_pending_return(value);
            }
            StmtKind::Import {
                symbols,
                path,
                resolved,
            } => self.execute_import(symbols, path, resolved)?,
            StmtKind::Pack { statements } => {
                for s in statements {
                    self.execute(s)?;
                }
            }
            StmtKind::Error => {}
        }

        Ok(())
    }

    fn run_for(
        &mut self,
        initializer: &Option<Rc<Stmt>>,
        condition: &Option<Expr>,
        increment: &Option<Expr>,
        body: &Rc<Stmt>,
    ) -> Result<(), RuntimeError> {
        if let Some(initializer) = initializer {
            self.execute(initializer)?;
        }

        loop {
            if let Some(condition) = condition {
                if !self.evaluate_expr(condition)?.is_true() {
                    return Ok(());
                }
            }

            match self.execute(body) {
                // `break` skips the increment; `continue` still runs it.
                Err(RuntimeError::Break) => return Ok(()),
                Err(RuntimeError::Continue) => {}
                Err(e) => return Err(e),
                Ok(()) => {}
            }

            if self.has_pending_return() {
                return Ok(());
            }

            if let Some(increment) = increment {
                self.evaluate_expr(increment)?;
            }
        }
    }

    fn execute_class_decl(
        &mut self,
        name: &Token,
        methods: &[Rc<FunctionDecl>],
        superclass: &Option<Expr>,
    ) -> Result<(), RuntimeError> {
        // Native classes may not be shadowed.
        if let Some(Object::Callable(prev)) = self.context.borrow().get(&name.lexeme) {
            if let Some(class) = prev.as_class() {
                if class.is_native {
                    return Err(RuntimeError::new(
                        &name.pos_start,
                        &name.pos_end,
                        "Not allowed to redefine NativeClass",
                    ));
                }
            }
        }

        let superclass_rc = match superclass {
            Some(expr) => {
                let value = self.evaluate_expr(expr)?;
                let class = match &value {
                    Object::Callable(callable) => callable.as_class(),
                    _ => None,
                };

                match class {
                    Some(class) => Some(class),
                    None => {
                        return Err(RuntimeError::new(
                            &expr.pos_start,
                            &expr.pos_end,
                            "SuperClass must be a Class",
                        ))
                    }
                }
            }
            None => None,
        };

        // Declare first, then fill in methods, so methods can refer to
        // the class they belong to.
        self.context.borrow_mut().set(&name.lexeme, Object::Nil);

        let class = Rc::new(Class::new(name.lexeme.clone(), superclass_rc));
        self.context.borrow_mut().change(
            &name.lexeme,
            Object::Callable(Rc::new(ClassObject(class.clone()))),
        );

        for method in methods {
            let method_name = method
                .name
                .as_ref()
                .expect("class method has a name")
                .lexeme
                .clone();
            let function =
                Function::new(method.clone(), self.context.clone(), Some(class.clone()), self)?;
            class.define_method(&method_name, Rc::new(function));
        }

        Ok(())
    }

    fn execute_import(
        &mut self,
        symbols: &BTreeMap<Token, Option<Token>>,
        path: &Token,
        resolved: &RefCell<Option<String>>,
    ) -> Result<(), RuntimeError> {
        let resolved_path = resolved.borrow().clone().ok_or_else(|| {
            RuntimeError::new(
                &path.pos_start,
                &path.pos_end,
                "Import path was not resolved",
            )
        })?;

        let module = match self.cached_module(&resolved_path) {
            Some(module) => module,
            None => {
                let module = self.load_module(&resolved_path, path)?;
                self.cache_module(resolved_path, module.clone());
                module
            }
        };

        let import_all = symbols
            .keys()
            .next()
            .map(|t| t.token_type == TokenType::Star)
            .unwrap_or(false);

        if import_all {
            for (name, value) in module.values() {
                self.context.borrow_mut().set(name, value.clone());
            }
            return Ok(());
        }

        for (symbol, alias) in symbols {
            match module.get(&symbol.lexeme) {
                Some(value) => {
                    let bound_name = alias
                        .as_ref()
                        .map(|a| a.lexeme.as_str())
                        .unwrap_or(symbol.lexeme.as_str());
                    self.context.borrow_mut().set(bound_name, value);
                }
                None => {
                    return Err(RuntimeError::new(
                        &symbol.pos_start,
                        &symbol.pos_end,
                        format!(
                            "Can't find `{}` from module \"{}\".",
                            symbol.lexeme, path.lexeme
                        ),
                    ))
                }
            }
        }

        Ok(())
    }
}
