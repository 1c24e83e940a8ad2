use std::rc::Rc;

use crate::ast::{Accessor, Expr, ExprKind};
use crate::object::{repeat_string, Object};
use crate::token::{Token, TokenType};

use super::context::Context;
use super::error::RuntimeError;
use super::func::Lambda;
use super::meta_list::with_meta_list;
use super::native_class::{belongs_to, class_name, instantiate_list};
use super::Interpreter;

type EvalResult = Result<Object, RuntimeError>;

impl Interpreter {
    pub(super) fn eval(&mut self, expr: &Expr) -> EvalResult {
        match &expr.kind {
            ExprKind::Literal { value } => Ok(value.clone()),
            ExprKind::Binary { left, op, right } => self.eval_binary(expr, left, op, right),
            ExprKind::Unary { op, right } => self.eval_unary(expr, op, right),
            ExprKind::Variable { name, depth } => {
                match self.lookup_variable(&name.lexeme, depth.get()) {
                    Some(value) => Ok(value),
                    None => Err(RuntimeError::new(
                        &name.pos_start,
                        &name.pos_end,
                        format!("Undefined variable {}", name.lexeme),
                    )),
                }
            }
            ExprKind::Assignment {
                name,
                op,
                value,
                depth,
            } => self.eval_assignment(name, op, value, depth.get()),
            ExprKind::Ternary {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate_expr(condition)?.is_true() {
                    self.evaluate_expr(then_branch)
                } else {
                    self.evaluate_expr(else_branch)
                }
            }
            ExprKind::Or { left, right } => {
                // One true operand makes the whole thing true.
                if self.evaluate_expr(left)?.is_true() {
                    return Ok(Object::Boolean(true));
                }
                let rhs = self.evaluate_expr(right)?;
                Ok(Object::Boolean(rhs.is_true()))
            }
            ExprKind::And { left, right } => {
                // One false operand makes the whole thing false.
                if !self.evaluate_expr(left)?.is_true() {
                    return Ok(Object::Boolean(false));
                }
                let rhs = self.evaluate_expr(right)?;
                Ok(Object::Boolean(rhs.is_true()))
            }
            ExprKind::Increment { target, prefix } => self.eval_crement(target, *prefix, 1.0),
            ExprKind::Decrement { target, prefix } => self.eval_crement(target, *prefix, -1.0),
            ExprKind::Call { callee, arguments } => self.eval_call(expr, callee, arguments),
            ExprKind::Retrieve { holder, accessor } => self.eval_retrieve(expr, holder, accessor),
            ExprKind::Set {
                holder,
                accessor,
                op,
                value,
            } => self.eval_set(expr, holder, accessor, op, value),
            ExprKind::This { keyword, depth } => Ok(self
                .lookup_variable(&keyword.lexeme, depth.get())
                .unwrap_or(Object::Nil)),
            ExprKind::Super { method, depth, .. } => self.eval_super(expr, method, depth.get()),
            ExprKind::Lambda(decl) => {
                let lambda = Lambda::new(decl.clone(), self.context.clone(), self)?;
                Ok(Object::Callable(Rc::new(lambda)))
            }
            ExprKind::List { items } => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.evaluate_expr(item)?);
                }
                Ok(instantiate_list(values))
            }
            ExprKind::Pack { expressions } => {
                let mut result = Object::Nil;
                for e in expressions {
                    result = self.evaluate_expr(e)?;
                }
                Ok(result)
            }
        }
    }

    fn lookup_variable(&self, name: &str, depth: i32) -> Option<Object> {
        if depth >= 0 {
            Context::get_at(&self.context, name, depth)
        } else {
            self.globals.borrow().get(name)
        }
    }

    fn eval_assignment(
        &mut self,
        name: &Token,
        op: &Token,
        value: &Expr,
        depth: i32,
    ) -> EvalResult {
        // Unlike a read, assigning to an unbound name is not an error:
        // the right-hand side still evaluates, and the store falls
        // through to `Context::change`, which is a silent no-op.
        let prev = self.lookup_variable(&name.lexeme, depth);

        let value = self.evaluate_expr(value)?;
        let result = match prev {
            Some(prev) => self.apply_assign_op(&prev, &value, op.token_type)?,
            None => value,
        };

        if depth >= 0 {
            Context::change_at(&self.context, &name.lexeme, result.clone(), depth);
        } else {
            self.globals.borrow_mut().change(&name.lexeme, result.clone());
        }

        Ok(result)
    }

    /// `=` replaces; the compound forms compute through the matching
    /// binary operator first.
    pub(super) fn apply_assign_op(
        &mut self,
        prev: &Object,
        value: &Object,
        op: TokenType,
    ) -> EvalResult {
        match op {
            TokenType::Equal => Ok(value.clone()),
            TokenType::PlusEqual => self.op_add(prev, value),
            TokenType::MinusEqual => self.op_sub(prev, value),
            TokenType::StarEqual => self.op_mul(prev, value),
            TokenType::SlashEqual => self.op_div(prev, value),
            _ => Err(self.error("Invalid assignment operator")),
        }
    }

    fn eval_binary(&mut self, expr: &Expr, left: &Expr, op: &Token, right: &Expr) -> EvalResult {
        let left_value = self.evaluate_expr(left)?;
        let right_value = self.evaluate_expr(right)?;

        // Operator errors should point at the whole expression, not the
        // last evaluated operand.
        self.restore_span(&expr.pos_start, &expr.pos_end);

        match op.token_type {
            TokenType::Plus => self.op_add(&left_value, &right_value),
            TokenType::Minus => self.op_sub(&left_value, &right_value),
            TokenType::Star => self.op_mul(&left_value, &right_value),
            TokenType::Slash => self.op_div(&left_value, &right_value),
            TokenType::Percent => self.op_rem(&left_value, &right_value),
            TokenType::EqualEqual => self
                .objects_equal(&left_value, &right_value)
                .map(Object::Boolean),
            TokenType::BangEqual => self
                .objects_equal(&left_value, &right_value)
                .map(|eq| Object::Boolean(!eq)),
            TokenType::Greater
            | TokenType::GreaterEqual
            | TokenType::Less
            | TokenType::LessEqual => self.op_compare(&left_value, &right_value, op),
            _ => Err(self.error("Invalid Binary operand")),
        }
    }

    fn eval_unary(&mut self, expr: &Expr, op: &Token, right: &Expr) -> EvalResult {
        let value = self.evaluate_expr(right)?;
        self.restore_span(&expr.pos_start, &expr.pos_end);

        match op.token_type {
            TokenType::Minus => match value {
                Object::Number(n) => Ok(Object::Number(-n)),
                other => Err(self.error(format!(
                    "Illegal operator '-' for operand type({})",
                    other.type_name()
                ))),
            },
            TokenType::Bang => match value {
                Object::Boolean(_) | Object::Number(_) => Ok(Object::Boolean(!value.is_true())),
                other => Err(self.error(format!(
                    "Illegal operator '!' for operand type({})",
                    other.type_name()
                ))),
            },
            _ => Err(self.error("Invalid Unary operand")),
        }
    }

    pub(super) fn op_add(&mut self, lhs: &Object, rhs: &Object) -> EvalResult {
        match (lhs, rhs) {
            (Object::Number(a), Object::Number(b)) => Ok(Object::Number(a + b)),
            (Object::Str(a), Object::Str(b)) => Ok(Object::Str(format!("{a}{b}"))),
            _ => self.overload_or_swap(lhs, rhs, "__add__", "+", Self::op_add),
        }
    }

    pub(super) fn op_sub(&mut self, lhs: &Object, rhs: &Object) -> EvalResult {
        match (lhs, rhs) {
            (Object::Number(a), Object::Number(b)) => Ok(Object::Number(a - b)),
            _ => self.overload_or_swap(lhs, rhs, "__sub__", "-", Self::op_sub),
        }
    }

    pub(super) fn op_mul(&mut self, lhs: &Object, rhs: &Object) -> EvalResult {
        match (lhs, rhs) {
            (Object::Number(a), Object::Number(b)) => Ok(Object::Number(a * b)),
            (Object::Number(times), Object::Str(s)) | (Object::Str(s), Object::Number(times)) => {
                Ok(Object::Str(repeat_string(s, *times)))
            }
            _ => self.overload_or_swap(lhs, rhs, "__mul__", "*", Self::op_mul),
        }
    }

    pub(super) fn op_div(&mut self, lhs: &Object, rhs: &Object) -> EvalResult {
        match (lhs, rhs) {
            (Object::Number(a), Object::Number(b)) => {
                if *b == 0.0 {
                    return Err(self.error("Divided by 0!"));
                }
                Ok(Object::Number(a / b))
            }
            _ => self.overload_or_swap(lhs, rhs, "__div__", "/", Self::op_div),
        }
    }

    pub(super) fn op_rem(&mut self, lhs: &Object, rhs: &Object) -> EvalResult {
        match (lhs, rhs) {
            (Object::Number(a), Object::Number(b)) => {
                let (a, b) = (*a as i64, *b as i64);
                if b == 0 {
                    return Err(self.error("Divided by 0!"));
                }
                Ok(Object::Number((a % b) as f64))
            }
            _ => self.overload_or_swap(lhs, rhs, "__mod__", "%", Self::op_rem),
        }
    }

    /// Instance operands dispatch to the reserved overload method. When
    /// only the right operand is an instance the operands swap and retry
    /// — for every operator, commutative or not.
    fn overload_or_swap(
        &mut self,
        lhs: &Object,
        rhs: &Object,
        method: &str,
        op: &str,
        retry: fn(&mut Self, &Object, &Object) -> EvalResult,
    ) -> EvalResult {
        if let Object::Instance(instance) = lhs {
            let overload = {
                let borrowed = instance.borrow();
                borrowed.class.find_method(method)
            };

            return match overload.and_then(|m| m.bind_this(instance.clone())) {
                Some(bound) => bound.call(self, vec![rhs.clone()]),
                None => Err(self.error(format!(
                    "{} does not have overloading function {}(other)",
                    class_name(lhs),
                    method
                ))),
            };
        }

        if matches!(rhs, Object::Instance(_)) {
            return retry(self, rhs, lhs);
        }

        Err(self.error(format!(
            "Illegal operator '{}' for operands type({}) and type({})",
            op,
            lhs.type_name(),
            rhs.type_name()
        )))
    }

    /// `> >= < <=` are defined on two numbers or two strings only.
    fn op_compare(&mut self, lhs: &Object, rhs: &Object, op: &Token) -> EvalResult {
        fn ordered<T: PartialOrd + ?Sized>(a: &T, b: &T, op: TokenType) -> bool {
            match op {
                TokenType::Greater => a > b,
                TokenType::GreaterEqual => a >= b,
                TokenType::Less => a < b,
                TokenType::LessEqual => a <= b,
                _ => false,
            }
        }

        match (lhs, rhs) {
            (Object::Number(a), Object::Number(b)) => {
                Ok(Object::Boolean(ordered(a, b, op.token_type)))
            }
            (Object::Str(a), Object::Str(b)) => Ok(Object::Boolean(ordered(
                a.as_str(),
                b.as_str(),
                op.token_type,
            ))),
            _ => Err(self.error(format!(
                "Illegal operator '{}' for operands type({}) and type({})",
                op.lexeme,
                lhs.type_name(),
                rhs.type_name()
            ))),
        }
    }

    /// `++`/`--`. Prefix yields the new value, postfix the previous one;
    /// the write goes back through the variable or retrieve path.
    fn eval_crement(&mut self, target: &Expr, prefix: bool, delta: f64) -> EvalResult {
        let prev = self.evaluate_expr(target)?;
        let n = match prev.number() {
            Some(n) => n,
            None => {
                let op = if delta > 0.0 { "++" } else { "--" };
                return Err(RuntimeError::new(
                    &target.pos_start,
                    &target.pos_end,
                    format!("Operator '{}' does not support type({})", op, prev.type_name()),
                ));
            }
        };

        let result = Object::Number(n + delta);

        match &target.kind {
            ExprKind::Variable { name, .. } => {
                self.context.borrow_mut().change(&name.lexeme, result.clone());
            }
            ExprKind::Retrieve { holder, accessor } => {
                let holder_obj = self.evaluate_expr(holder)?;
                match accessor {
                    Accessor::Index(index_expr) if belongs_to(&holder_obj, "List") => {
                        let index = self.evaluate_expr(index_expr)?;
                        let index = index.number().ok_or_else(|| {
                            RuntimeError::new(
                                &index_expr.pos_start,
                                &index_expr.pos_end,
                                "Index should be a number",
                            )
                        })?;
                        self.list_set(&holder_obj, index, result.clone())?;
                    }
                    Accessor::Property(name) => {
                        if let Object::Instance(instance) = &holder_obj {
                            instance.borrow_mut().set(&name.lexeme, result.clone());
                        }
                    }
                    _ => {}
                }
            }
            _ => {}
        }

        if prefix {
            Ok(result)
        } else {
            Ok(prev)
        }
    }

    fn eval_call(&mut self, expr: &Expr, callee: &Expr, arguments: &[Expr]) -> EvalResult {
        let callee_value = self.evaluate_expr(callee)?;

        let callable = match callee_value {
            Object::Callable(callable) => callable,
            _ => {
                return Err(RuntimeError::new(
                    &callee.pos_start,
                    &callee.pos_end,
                    "Expression is not callable",
                ))
            }
        };

        let mut args = Vec::with_capacity(arguments.len());
        for arg in arguments {
            args.push(self.evaluate_expr(arg)?);
        }

        self.restore_span(&expr.pos_start, &expr.pos_end);

        // Arity -1 accepts anything; otherwise the argument count must
        // land between the required and declared parameter counts.
        let arity = callable.arity();
        if arity != -1 {
            let required = callable.required_params();
            let given = args.len();
            if given < required || given > arity as usize {
                return Err(self.error(format!(
                    "Function expected {} argument(s), including {} optional, instead got {}",
                    arity,
                    arity as usize - required,
                    given
                )));
            }
        }

        let prev = self.swap_current_callable(Some(callable.clone()));
        let result = callable.call(self, args);
        self.swap_current_callable(prev);

        result
    }

    fn eval_retrieve(&mut self, expr: &Expr, holder: &Expr, accessor: &Accessor) -> EvalResult {
        let holder_value = self.evaluate_expr(holder)?;

        match accessor {
            Accessor::Index(index_expr) => {
                if !belongs_to(&holder_value, "List") {
                    self.restore_span(&expr.pos_start, &expr.pos_end);
                    return Err(self.error(format!(
                        "Cannot apply [] to object type({})",
                        holder_value.type_name()
                    )));
                }

                let index = self.evaluate_expr(index_expr)?;
                let index = index.number().ok_or_else(|| {
                    RuntimeError::new(
                        &index_expr.pos_start,
                        &index_expr.pos_end,
                        "Index should be a number",
                    )
                })?;

                self.restore_span(&expr.pos_start, &expr.pos_end);
                self.list_get(&holder_value, index)
            }
            Accessor::Property(name) => match &holder_value {
                Object::Instance(instance) => {
                    let value = instance.borrow().get(&name.lexeme, instance);
                    Ok(value)
                }
                other => {
                    self.restore_span(&expr.pos_start, &expr.pos_end);
                    Err(self.error(format!(
                        "Cannot apply . to object type({})",
                        other.type_name()
                    )))
                }
            },
        }
    }

    fn eval_set(
        &mut self,
        expr: &Expr,
        holder: &Expr,
        accessor: &Accessor,
        op: &Token,
        value: &Expr,
    ) -> EvalResult {
        let holder_value = self.evaluate_expr(holder)?;

        match accessor {
            Accessor::Property(name) => {
                if let Object::Instance(instance) = &holder_value {
                    let prev = instance.borrow().get(&name.lexeme, instance);
                    let value = self.evaluate_expr(value)?;
                    let result = self.apply_assign_op(&prev, &value, op.token_type)?;
                    instance.borrow_mut().set(&name.lexeme, result.clone());
                    return Ok(result);
                }

                Ok(Object::Nil)
            }
            Accessor::Index(index_expr) => {
                if belongs_to(&holder_value, "List") {
                    let index = self.evaluate_expr(index_expr)?;
                    let index = index.number().ok_or_else(|| {
                        RuntimeError::new(
                            &index_expr.pos_start,
                            &index_expr.pos_end,
                            "Index should be a number",
                        )
                    })?;

                    self.restore_span(&expr.pos_start, &expr.pos_end);
                    let prev = self.list_get(&holder_value, index)?;
                    let value = self.evaluate_expr(value)?;
                    let result = self.apply_assign_op(&prev, &value, op.token_type)?;
                    self.list_set(&holder_value, index, result.clone())?;
                    return Ok(result);
                }

                Ok(Object::Nil)
            }
        }
    }

    fn eval_super(&mut self, expr: &Expr, method: &Token, depth: i32) -> EvalResult {
        self.restore_span(&expr.pos_start, &expr.pos_end);

        // The resolver has verified this only appears inside subclass
        // methods; the running callable knows which class that is.
        let current = self
            .current_callable()
            .ok_or_else(|| self.error("'super' used outside of a method"))?;
        let superclass = current
            .owned_super()
            .ok_or_else(|| self.error("'super' used in a class with no superclass"))?;

        let found = superclass.find_method(&method.lexeme).ok_or_else(|| {
            self.error(format!("Undefined method {}", method.lexeme))
        })?;

        let instance = match Context::get_at(&self.context, "this", depth) {
            Some(Object::Instance(instance)) => instance,
            _ => return Err(self.error("'this' is not bound in the current scope")),
        };

        match found.bind_this(instance) {
            Some(bound) => Ok(Object::Callable(bound)),
            None => Err(self.error(format!("Cannot bind method {}", method.lexeme))),
        }
    }

    /// Element read on a List instance's backing store.
    pub(super) fn list_get(&mut self, holder: &Object, index: f64) -> EvalResult {
        let items = match holder {
            Object::Instance(instance) => instance.borrow().fields.get("@items").cloned(),
            _ => None,
        };
        let items =
            items.ok_or_else(|| self.error("List instance is missing its backing store"))?;

        let value = with_meta_list(&items, |list| {
            list.normalize_index(index as i64)
                .map(|i| list.items[i].clone())
        })
        .ok_or_else(|| self.error("List instance is missing its backing store"))?;

        value.ok_or_else(|| self.error("List index out of bound"))
    }

    pub(super) fn list_set(
        &mut self,
        holder: &Object,
        index: f64,
        value: Object,
    ) -> Result<(), RuntimeError> {
        let items = match holder {
            Object::Instance(instance) => instance.borrow().fields.get("@items").cloned(),
            _ => None,
        };
        let items =
            items.ok_or_else(|| self.error("List instance is missing its backing store"))?;

        let stored = with_meta_list(&items, |list| match list.normalize_index(index as i64) {
            Some(i) => {
                list.items[i] = value;
                true
            }
            None => false,
        })
        .ok_or_else(|| self.error("List instance is missing its backing store"))?;

        if stored {
            Ok(())
        } else {
            Err(self.error("List index out of bound"))
        }
    }
}
