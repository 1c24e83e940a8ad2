mod class;
mod context;
mod error;
mod expr;
mod func;
mod meta_list;
mod module;
mod native;
mod native_class;
mod stmt;

use std::collections::HashMap;
use std::rc::Rc;

pub use class::{Class, ClassObject, Instance, RESERVED_METHODS};
pub use context::{Context, SharedContext};
pub use error::RuntimeError;
pub use func::{Callable, CallableKind, Function, Lambda};
pub use meta_list::{is_meta_list, with_meta_list, Container, MetaList};
pub use module::Module;
pub use native::NativeFunction;
pub use native_class::{
    belongs_to, class_name, instantiate_list, instantiate_string, list_class, math_instance,
    string_class, NativeMethod,
};

use crate::ast::Stmt;
use crate::error::SharedErrorReporter;
use crate::object::Object;
use crate::parser::Parser;
use crate::position::Position;
use crate::resolver::Resolver;
use crate::scanner::Scanner;

/// The tree-walking evaluator. Execution threads the active scope chain
/// and a pending-return cell along with the walk; `super` resolves
/// against the callable currently on the (virtual) call stack.
pub struct Interpreter {
    pub preset: SharedContext,
    pub globals: SharedContext,
    pub context: SharedContext,
    /// Echo non-nil expression-statement results (REPL mode).
    pub repl_echo: bool,
    pending_return: Option<Object>,
    current_callable: Option<Rc<dyn Callable>>,
    modules: HashMap<String, Rc<Module>>,
    pos_start: Position,
    pos_end: Position,
    error_reporter: Option<SharedErrorReporter>,
}

impl Interpreter {
    pub fn new() -> Self {
        let preset = Context::new().as_shared();
        let globals = Context::with_parent(preset.clone()).as_shared();
        globals
            .borrow_mut()
            .set("__name__", Object::Str("__main__".to_owned()));

        load_preset_environment(&preset);

        Self {
            context: globals.clone(),
            preset,
            globals,
            repl_echo: false,
            pending_return: None,
            current_callable: None,
            modules: HashMap::new(),
            pos_start: Position::preset(),
            pos_end: Position::preset(),
            error_reporter: None,
        }
    }

    pub fn with_error_reporting(mut self, error_reporter: SharedErrorReporter) -> Self {
        self.error_reporter = Some(error_reporter);
        self
    }

    /// Runs a resolved program. The first runtime error aborts the run
    /// and is returned to the caller.
    pub fn interpret(&mut self, statements: &[Rc<Stmt>]) -> Result<(), RuntimeError> {
        for stmt in statements {
            self.execute(stmt)?;
            self.run_pending_destructors();
        }

        Ok(())
    }

    pub fn execute(&mut self, stmt: &Stmt) -> Result<(), RuntimeError> {
        self.pos_start = stmt.pos_start.clone();
        self.pos_end = stmt.pos_end.clone();
        self.execute_stmt(stmt)
    }

    pub fn evaluate_expr(&mut self, expr: &crate::ast::Expr) -> Result<Object, RuntimeError> {
        self.pos_start = expr.pos_start.clone();
        self.pos_end = expr.pos_end.clone();
        self.eval(expr)
    }

    /// Runs the statements of a block in the given context, restoring the
    /// previous context on every exit path. A set pending-return cell
    /// short-circuits the rest of the block.
    pub fn execute_block(
        &mut self,
        statements: &[Rc<Stmt>],
        context: SharedContext,
    ) -> Result<(), RuntimeError> {
        let prev = std::mem::replace(&mut self.context, context);

        for stmt in statements {
            if let Err(e) = self.execute(stmt) {
                self.context = prev;
                return Err(e);
            }

            if self.pending_return.is_some() {
                break;
            }
        }

        self.context = prev;
        self.run_pending_destructors();
        Ok(())
    }

    /// Executes a function body in its frame and yields the pending
    /// return value, or `Nil` when the body falls off the end.
    pub(crate) fn run_function_body(
        &mut self,
        body: &[Rc<Stmt>],
        frame: SharedContext,
    ) -> Result<Object, RuntimeError> {
        let prev = std::mem::replace(&mut self.context, frame);

        for stmt in body {
            if let Err(e) = self.execute(stmt) {
                self.context = prev;
                return Err(e);
            }

            if self.pending_return.is_some() {
                break;
            }
        }

        self.context = prev;
        self.run_pending_destructors();
        Ok(self.pending_return.take().unwrap_or(Object::Nil))
    }

    pub(crate) fn set_pending_return(&mut self, value: Object) {
        self.pending_return = Some(value);
    }

    pub(crate) fn has_pending_return(&self) -> bool {
        self.pending_return.is_some()
    }

    pub(crate) fn current_callable(&self) -> Option<Rc<dyn Callable>> {
        self.current_callable.clone()
    }

    pub(crate) fn swap_current_callable(
        &mut self,
        callable: Option<Rc<dyn Callable>>,
    ) -> Option<Rc<dyn Callable>> {
        std::mem::replace(&mut self.current_callable, callable)
    }

    /// A runtime error at the node currently being evaluated.
    pub(crate) fn error(&self, msg: impl Into<String>) -> RuntimeError {
        RuntimeError::new(&self.pos_start, &self.pos_end, msg)
    }

    pub(crate) fn restore_span(&mut self, pos_start: &Position, pos_end: &Position) {
        self.pos_start = pos_start.clone();
        self.pos_end = pos_end.clone();
    }

    /// The printable form of a value. Instances are asked for `__repr__`
    /// first; list containers render their items recursively.
    pub fn stringify(&mut self, value: &Object) -> Result<String, RuntimeError> {
        match value {
            Object::Instance(instance) => {
                let repr = {
                    let borrowed = instance.borrow();
                    borrowed.class.find_method("__repr__")
                };

                if let Some(repr) = repr {
                    if let Some(bound) = repr.bind_this(instance.clone()) {
                        // Expression echo must stay quiet while __repr__
                        // runs.
                        let saved_echo = std::mem::replace(&mut self.repl_echo, false);
                        let result = bound.call(self, vec![]);
                        self.repl_echo = saved_echo;

                        return match result? {
                            Object::Str(s) => Ok(s),
                            other => self.stringify(&other),
                        };
                    }
                }

                let (class_name, fields) = {
                    let borrowed = instance.borrow();
                    let fields: Vec<(String, Object)> = borrowed
                        .fields
                        .iter()
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .collect();
                    (borrowed.class.name.clone(), fields)
                };

                let mut out = format!("<Instance of {class_name}>");
                if !fields.is_empty() {
                    out.push_str("\n{\n");
                    for (name, value) in fields {
                        let rendered = self.stringify(&value)?;
                        out.push_str(&format!("  {name}: {rendered}\n"));
                    }
                    out.push('}');
                }

                Ok(out)
            }
            Object::Container(container) => {
                let items = {
                    let borrowed = container.borrow();
                    borrowed
                        .as_any()
                        .downcast_ref::<MetaList>()
                        .map(|list| list.items.clone())
                };

                match items {
                    Some(items) => {
                        let mut parts = Vec::with_capacity(items.len());
                        for item in &items {
                            // A list that contains itself renders as "..."
                            // instead of recursing forever.
                            let self_referential = native_class::list_backing(item)
                                .map(|backing| {
                                    matches!(&backing, Object::Container(c) if Rc::ptr_eq(c, container))
                                })
                                .unwrap_or(false);

                            if self_referential {
                                parts.push("...".to_owned());
                            } else {
                                parts.push(self.stringify(item)?);
                            }
                        }
                        Ok(format!("[{}]", parts.join(", ")))
                    }
                    None => Ok(format!("<{}>", container.borrow().type_tag())),
                }
            }
            other => Ok(other.to_string()),
        }
    }

    /// `==` semantics: primitives by value, callables and containers by
    /// identity, instances through their own `__equal__` when present.
    pub fn objects_equal(&mut self, lhs: &Object, rhs: &Object) -> Result<bool, RuntimeError> {
        match (lhs, rhs) {
            (Object::Instance(a), Object::Instance(b)) => {
                let equal_method = {
                    let borrowed = a.borrow();
                    borrowed.class.find_method("__equal__")
                };

                if let Some(method) = equal_method {
                    if let Some(bound) = method.bind_this(a.clone()) {
                        let result = bound.call(self, vec![rhs.clone()])?;
                        return Ok(result.boolean().unwrap_or(false));
                    }
                }

                Ok(Rc::ptr_eq(a, b))
            }
            _ => Ok(lhs == rhs),
        }
    }

    /// Destructors run here, at statement and scope boundaries, instead
    /// of inside `Drop`. Errors are reported but never fatal.
    pub fn run_pending_destructors(&mut self) {
        self.drain_destructors(true);
    }

    fn drain_destructors(&mut self, report_errors: bool) {
        loop {
            let pending = class::take_pending_destructors();
            if pending.is_empty() {
                return;
            }

            for instance in pending {
                // Walks from the instance's class toward the root; each
                // class runs only its own __del__.
                let mut class = Some(instance.borrow().class.clone());
                while let Some(c) = class {
                    let destructor = c.methods.borrow().get("__del__").cloned();
                    if let Some(destructor) = destructor {
                        if let Some(bound) = destructor.bind_this(instance.clone()) {
                            if let Err(e) = bound.call(self, vec![]) {
                                if report_errors {
                                    self.report(&e);
                                }
                            }
                        }
                    }

                    class = c.superclass.clone();
                }
            }
        }
    }

    fn report(&self, error: &dyn std::fmt::Display) {
        match &self.error_reporter {
            Some(reporter) => reporter.borrow_mut().report(error),
            None => eprintln!("{error}"),
        }
    }

    fn consume_error_count(&self) -> usize {
        self.error_reporter
            .as_ref()
            .map(|r| r.borrow_mut().count())
            .unwrap_or(0)
    }

    /// Loads a module: full pipeline in a fresh interpreter whose
    /// `__name__` is the file path, then capture of its global bindings.
    pub(crate) fn load_module(
        &mut self,
        resolved_path: &str,
        path_token: &crate::token::Token,
    ) -> Result<Rc<Module>, RuntimeError> {
        log::debug!("loading module {resolved_path}");

        let import_error = |msg: &str| {
            RuntimeError::new(&path_token.pos_start, &path_token.pos_end, msg)
        };

        let content = std::fs::read_to_string(resolved_path).map_err(|_| {
            import_error(&format!(
                "Error in loading Module from file:{resolved_path}"
            ))
        })?;

        let tokens = match Scanner::new(resolved_path, &content).scan_tokens() {
            Ok(tokens) => tokens,
            Err(e) => {
                self.report(&e);
                return Err(import_error("Failed to import Module, error occured"));
            }
        };

        let mut parser = Parser::new(tokens);
        if let Some(reporter) = &self.error_reporter {
            parser = parser.with_error_reporting(reporter.clone());
        }
        let statements = parser.parse();
        if self.consume_error_count() > 0 {
            return Err(import_error("Failed to import Module, error occured"));
        }

        let mut resolver = Resolver::new();
        if let Some(reporter) = &self.error_reporter {
            resolver = resolver.with_error_reporting(reporter.clone());
        }
        let clean = resolver.resolve_module(&statements);
        self.consume_error_count();
        if !clean {
            return Err(import_error("Failed to import Module, error occured"));
        }

        let mut interpreter = Interpreter::new();
        if let Some(reporter) = &self.error_reporter {
            interpreter = interpreter.with_error_reporting(reporter.clone());
        }
        interpreter
            .globals
            .borrow_mut()
            .set("__name__", Object::Str(resolved_path.to_owned()));

        interpreter.interpret(&statements)?;

        let mut values = interpreter.globals.borrow().variables.clone();
        values.remove("__name__");

        Ok(Rc::new(Module::new(values)))
    }

    pub(crate) fn cached_module(&self, path: &str) -> Option<Rc<Module>> {
        self.modules.get(path).cloned()
    }

    pub(crate) fn cache_module(&mut self, path: String, module: Rc<Module>) {
        self.modules.insert(path, module);
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Interpreter {
    fn drop(&mut self) {
        // Whatever is already queued still gets finalized, with failures
        // swallowed. Instances that die with the interpreter's own
        // contexts are past the point where their destructors could run
        // safely; those are skipped.
        self.drain_destructors(false);
    }
}

fn load_preset_environment(preset: &SharedContext) {
    let mut context = preset.borrow_mut();

    for function in native::all() {
        let name = function.name();
        context.set(&name, Object::Callable(function));
    }

    context.set(
        "String",
        Object::Callable(Rc::new(ClassObject(string_class()))),
    );
    context.set(
        "List",
        Object::Callable(Rc::new(ClassObject(list_class()))),
    );
    context.set("Math", math_instance());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;
    use crate::resolver::Resolver;
    use crate::scanner::Scanner;

    fn run(source: &str) -> Interpreter {
        let tokens = Scanner::new("<test>", source)
            .scan_tokens()
            .expect("failed to scan");
        let statements = Parser::new(tokens).parse();
        let mut resolver = Resolver::new();
        assert!(resolver.resolve(&statements), "resolver rejected source");

        let mut interpreter = Interpreter::new();
        interpreter
            .interpret(&statements)
            .expect("runtime error while interpreting");
        interpreter
    }

    fn run_err(source: &str) -> RuntimeError {
        let tokens = Scanner::new("<test>", source)
            .scan_tokens()
            .expect("failed to scan");
        let statements = Parser::new(tokens).parse();
        let mut resolver = Resolver::new();
        assert!(resolver.resolve(&statements), "resolver rejected source");

        let mut interpreter = Interpreter::new();
        interpreter
            .interpret(&statements)
            .expect_err("expected a runtime error")
    }

    fn global(interpreter: &Interpreter, name: &str) -> Object {
        interpreter
            .globals
            .borrow()
            .get(name)
            .unwrap_or_else(|| panic!("global '{name}' is not defined"))
    }

    fn global_number(interpreter: &Interpreter, name: &str) -> f64 {
        global(interpreter, name)
            .number()
            .unwrap_or_else(|| panic!("global '{name}' is not a number"))
    }

    fn global_string(interpreter: &Interpreter, name: &str) -> String {
        global(interpreter, name)
            .string()
            .unwrap_or_else(|| panic!("global '{name}' is not a string"))
    }

    fn error_message(error: &RuntimeError) -> String {
        match error {
            RuntimeError::Error { msg, .. } => msg.clone(),
            other => panic!("expected an error, got {other:?}"),
        }
    }

    #[test]
    fn closures_capture_their_defining_frame() {
        let ipr = run(
            "func make() { var i = 0; func inc() { i = i + 1; return i; } return inc; } \
             var c = make(); \
             var a = c(); var b = c(); var d = c();",
        );

        assert_eq!(global_number(&ipr, "a"), 1.0);
        assert_eq!(global_number(&ipr, "b"), 2.0);
        assert_eq!(global_number(&ipr, "d"), 3.0);
    }

    #[test]
    fn super_calls_walk_to_the_parent_class() {
        let ipr = run(
            "class A { greet() { return \"A\"; } } \
             class B > A { greet() { return super.greet() + \"B\"; } } \
             var got = B().greet();",
        );

        assert_eq!(global_string(&ipr, "got"), "AB");
    }

    #[test]
    fn operator_overloading_dispatches_to_reserved_methods() {
        let ipr = run(
            "class V { init(x) { this.x = x; } \
                       __add__(o) { return V(this.x + o.x); } \
                       __repr__() { return \"V(\" + str(this.x) + \")\"; } } \
             var sum = V(1) + V(2); \
             var shown = str(sum); \
             var x = sum.x;",
        );

        assert_eq!(global_number(&ipr, "x"), 3.0);
        assert_eq!(global_string(&ipr, "shown"), "V(3)");
    }

    #[test]
    fn reserved_methods_are_not_inherited() {
        let err = run_err(
            "class A { __add__(o) { return 1; } } \
             class B > A { } \
             var x = B() + B();",
        );

        assert!(error_message(&err).contains("__add__"));
    }

    #[test]
    fn for_loop_with_break_and_continue() {
        let ipr = run(
            "var s = 0; \
             for (var i = 0; i < 10; i = i + 1) { \
               if (i == 3) continue; \
               if (i == 7) break; \
               s = s + i; \
             }",
        );

        assert_eq!(global_number(&ipr, "s"), 15.0);
    }

    #[test]
    fn list_slice_and_map() {
        let ipr = run(
            "var xs = List(1, 2, 3, 4); \
             var sliced = str(xs.slice(1, 3)); \
             var mapped = str(xs.map(func(x) { return x * x; }));",
        );

        assert_eq!(global_string(&ipr, "sliced"), "[2, 3]");
        assert_eq!(global_string(&ipr, "mapped"), "[1, 4, 9, 16]");
    }

    #[test]
    fn list_literals_and_indexing() {
        let ipr = run(
            "var xs = [10, 20, 30]; \
             var a = xs[0]; \
             var b = xs[-1]; \
             xs[1] = 5; \
             var c = xs[1];",
        );

        assert_eq!(global_number(&ipr, "a"), 10.0);
        assert_eq!(global_number(&ipr, "b"), 30.0);
        assert_eq!(global_number(&ipr, "c"), 5.0);
    }

    #[test]
    fn list_index_out_of_bound() {
        let err = run_err("var xs = [1]; var y = xs[3];");
        assert!(error_message(&err).contains("List index out of bound"));
    }

    #[test]
    fn default_arguments_fill_tail_aligned() {
        let ipr = run(
            "func f(a, b = 10, c = 20) { return a + b + c; } \
             var x = f(1); \
             var y = f(1, 2); \
             var z = f(1, 2, 3);",
        );

        assert_eq!(global_number(&ipr, "x"), 31.0);
        assert_eq!(global_number(&ipr, "y"), 23.0);
        assert_eq!(global_number(&ipr, "z"), 6.0);
    }

    #[test]
    fn default_arguments_are_evaluated_once() {
        let ipr = run(
            "var n = 0; \
             func bump() { n = n + 1; return n; } \
             func f(a = bump()) { return a; } \
             var x = f(); var y = f();",
        );

        assert_eq!(global_number(&ipr, "n"), 1.0);
        assert_eq!(global_number(&ipr, "x"), 1.0);
        assert_eq!(global_number(&ipr, "y"), 1.0);
    }

    #[test]
    fn arity_checks_cover_optional_parameters() {
        let err = run_err("func f(a, b = 1) { return a; } f();");
        assert!(error_message(&err).contains("expected"));

        let err = run_err("func f(a) { return a; } f(1, 2);");
        assert!(error_message(&err).contains("expected"));
    }

    #[test]
    fn compound_assignment_and_crements() {
        let ipr = run(
            "var a = 10; a += 5; a -= 3; a *= 2; a /= 4; \
             var b = 1; var pre = ++b; var post = b++; var after = b;",
        );

        assert_eq!(global_number(&ipr, "a"), 6.0);
        assert_eq!(global_number(&ipr, "pre"), 2.0);
        assert_eq!(global_number(&ipr, "post"), 2.0);
        assert_eq!(global_number(&ipr, "after"), 3.0);
    }

    #[test]
    fn ternary_evaluates_exactly_one_branch() {
        let ipr = run(
            "var n = 0; \
             func bump() { n = n + 1; return n; } \
             var x = true ? 1 : bump(); \
             var y = false ? bump() : 2;",
        );

        assert_eq!(global_number(&ipr, "n"), 0.0);
        assert_eq!(global_number(&ipr, "x"), 1.0);
        assert_eq!(global_number(&ipr, "y"), 2.0);
    }

    #[test]
    fn logic_operators_normalize_to_booleans() {
        let ipr = run("var a = 1 or 2; var b = 0 and 1; var c = 1 and 2;");

        assert_eq!(global(&ipr, "a"), Object::Boolean(true));
        assert_eq!(global(&ipr, "b"), Object::Boolean(false));
        assert_eq!(global(&ipr, "c"), Object::Boolean(true));
    }

    #[test]
    fn string_repetition_and_concat() {
        let ipr = run(
            "var a = \"ab\" * 3; var b = 2 * \"xy\"; var c = \"x\" + \"y\";",
        );

        assert_eq!(global_string(&ipr, "a"), "ababab");
        assert_eq!(global_string(&ipr, "b"), "xyxy");
        assert_eq!(global_string(&ipr, "c"), "xy");
    }

    #[test]
    fn modulo_coerces_to_integers() {
        let ipr = run("var a = 7.9 % 3.2;");
        assert_eq!(global_number(&ipr, "a"), 1.0);
    }

    #[test]
    fn division_by_zero_is_a_runtime_error() {
        let err = run_err("var x = 1 / 0;");
        assert!(error_message(&err).contains("Divided by 0"));
    }

    #[test]
    fn swapped_operands_retry_when_rhs_is_an_instance() {
        // The swap applies to non-commutative operators as well.
        let ipr = run(
            "class W { init(x) { this.x = x; } \
                       __sub__(o) { return this.x - o; } } \
             var a = 10 - W(4);",
        );

        assert_eq!(global_number(&ipr, "a"), -6.0);
    }

    #[test]
    fn undefined_variable_is_a_runtime_error() {
        let err = run_err("var x = ghost;");
        assert!(error_message(&err).contains("Undefined variable"));
    }

    #[test]
    fn assignment_to_an_unbound_name_is_a_silent_no_op() {
        // The right-hand side still runs; the store goes nowhere and no
        // binding appears. Reads of the same name keep raising.
        let ipr = run(
            "var n = 0; \
             func bump() { n = n + 1; return n; } \
             ghost = bump();",
        );

        assert_eq!(global_number(&ipr, "n"), 1.0);
        assert!(ipr.globals.borrow().get("ghost").is_none());

        let err = run_err("var x = ghost;");
        assert!(error_message(&err).contains("Undefined variable"));
    }

    #[test]
    fn missing_instance_properties_are_nil() {
        let ipr = run("class A { } var a = A(); var missing = a.nothing == nil;");
        assert_eq!(global(&ipr, "missing"), Object::Boolean(true));
    }

    #[test]
    fn native_class_fields_are_guarded() {
        let ipr = run(
            "var s = String(\"hi\"); \
             s.other = 1; \
             s.str = 42; \
             var kept = s.str;",
        );

        // Unauthorized names and mismatched kinds are dropped silently.
        assert_eq!(global_string(&ipr, "kept"), "hi");
    }

    #[test]
    fn string_class_methods() {
        let ipr = run(
            "var s = String(\"  hi there  \"); \
             var t = s.trim(); \
             var n = t.length(); \
             var parts = t.split(\" \"); \
             var first = parts[0]; \
             var eq = String(\"a\") == String(\"a\");",
        );

        assert_eq!(global_number(&ipr, "n"), 8.0);
        assert_eq!(global_string(&ipr, "first"), "hi");
        assert_eq!(global(&ipr, "eq"), Object::Boolean(true));
    }

    #[test]
    fn list_methods() {
        let ipr = run(
            "var xs = List(3, 1, 2); \
             xs.append(4); \
             xs.unshift(0); \
             var popped = xs.pop(); \
             xs.remove(1); \
             var len = xs.length(); \
             var idx = xs.indexOf(2); \
             var total = xs.reduce(func(a, b) { return a + b; }); \
             xs.reverse(); \
             var head = xs[0]; \
             var eq = List(1, 2) == List(1, 2);",
        );

        assert_eq!(global_number(&ipr, "popped"), 4.0);
        assert_eq!(global_number(&ipr, "len"), 3.0);
        assert_eq!(global_number(&ipr, "idx"), 2.0);
        assert_eq!(global_number(&ipr, "total"), 5.0);
        assert_eq!(global_number(&ipr, "head"), 2.0);
        assert_eq!(global(&ipr, "eq"), Object::Boolean(true));
    }

    #[test]
    fn math_builtins() {
        let ipr = run(
            "var f = Math.floor(2.7); \
             var c = Math.ceil(2.1); \
             var p = Math.pow(2, 10); \
             var m = Math.max(1, 5, 3); \
             var bad = Math.min(1, \"x\"); \
             var r = Math.random(); \
             var in_range = r >= 0 and r < 1; \
             var pi = Math.PI > 3.14 and Math.PI < 3.15;",
        );

        assert_eq!(global_number(&ipr, "f"), 2.0);
        assert_eq!(global_number(&ipr, "c"), 3.0);
        assert_eq!(global_number(&ipr, "p"), 1024.0);
        assert_eq!(global_number(&ipr, "m"), 5.0);
        assert_eq!(global(&ipr, "bad"), Object::Nil);
        assert_eq!(global(&ipr, "in_range"), Object::Boolean(true));
        assert_eq!(global(&ipr, "pi"), Object::Boolean(true));
    }

    #[test]
    fn typeof_reports_kind_or_class() {
        let ipr = run(
            "class A { } \
             var t1 = typeof(1); \
             var t2 = typeof(A); \
             var t3 = typeof(A()); \
             var t4 = typeof(typeof); \
             var t5 = typeof(nil);",
        );

        assert_eq!(global_string(&ipr, "t1"), "number");
        assert_eq!(global_string(&ipr, "t2"), "Class");
        assert_eq!(global_string(&ipr, "t3"), "A");
        assert_eq!(global_string(&ipr, "t4"), "Function");
        assert_eq!(global_string(&ipr, "t5"), "nil");
    }

    #[test]
    fn getattr_falls_back_to_the_default() {
        let ipr = run(
            "class A { init() { this.x = 1; } } \
             var a = A(); \
             var x = getattr(a, \"x\"); \
             var y = getattr(a, \"y\", 42);",
        );

        assert_eq!(global_number(&ipr, "x"), 1.0);
        assert_eq!(global_number(&ipr, "y"), 42.0);
    }

    #[test]
    fn destructors_run_when_the_last_reference_drops() {
        let ipr = run(
            "var log = List(); \
             class A { __del__() { log.append(\"a\"); } } \
             class B > A { __del__() { log.append(\"b\"); } } \
             func f() { var x = B(); } \
             f(); \
             var shown = str(log);",
        );

        // Subclass first, then up the chain.
        assert_eq!(global_string(&ipr, "shown"), "[b, a]");
    }

    #[test]
    fn lambdas_are_first_class() {
        let ipr = run(
            "var twice = func(f, x) { return f(f(x)); }; \
             var inc = func(x) { return x + 1; }; \
             var four = twice(inc, 2);",
        );

        assert_eq!(global_number(&ipr, "four"), 4.0);
    }

    #[test]
    fn pack_expressions_yield_the_last_value() {
        let ipr = run("var a = (1, 2, 3);");
        assert_eq!(global_number(&ipr, "a"), 3.0);
    }

    #[test]
    fn native_classes_cannot_be_redefined() {
        let err = run_err("class List { }");
        assert!(error_message(&err).contains("NativeClass"));
    }

    #[test]
    fn str_of_numbers_round_trips_integer_literals() {
        let ipr = run("var a = str(42); var b = str(2.5); var c = str(0x10);");
        assert_eq!(global_string(&ipr, "a"), "42");
        assert_eq!(global_string(&ipr, "b"), "2.5");
        assert_eq!(global_string(&ipr, "c"), "16");
    }
}
