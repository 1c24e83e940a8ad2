use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::ast::{Accessor, Expr, ExprKind, FunctionDecl, Stmt, StmtKind};
use crate::error::{Error, ErrorKind, SharedErrorReporter};
use crate::position::Position;
use crate::token::Token;

#[derive(Debug, Clone, Copy, PartialEq)]
enum FunctionType {
    None,
    Function,
    Initializer,
    Method,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ClassType {
    None,
    Class,
    SubClass,
}

/// The resolver probes the file system to normalize import paths; tests
/// inject a fake tree through this seam.
pub trait FileSystem {
    fn exists(&self, path: &Path) -> bool;
    fn absolute(&self, path: &Path) -> PathBuf;
}

pub struct OsFileSystem;

impl FileSystem for OsFileSystem {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn absolute(&self, path: &Path) -> PathBuf {
        std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
    }
}

/// Static pass over the AST: writes lexical depths into the
/// `Variable`/`Assignment`/`This`/`Super` nodes, enforces structural rules
/// and rewrites import paths to absolute ones. Errors are reported and
/// resolution continues so as many problems as possible are collected.
pub struct Resolver {
    scopes: Vec<HashMap<String, bool>>,
    current_function: FunctionType,
    current_class: ClassType,
    loop_depth: usize,
    errors: usize,
    error_reporter: Option<SharedErrorReporter>,
    fs: Box<dyn FileSystem>,
}

impl Resolver {
    pub fn new() -> Self {
        Self {
            scopes: vec![],
            current_function: FunctionType::None,
            current_class: ClassType::None,
            loop_depth: 0,
            errors: 0,
            error_reporter: None,
            fs: Box::new(OsFileSystem),
        }
    }

    pub fn with_error_reporting(self, error_reporter: SharedErrorReporter) -> Self {
        Self {
            error_reporter: Some(error_reporter),
            ..self
        }
    }

    pub fn with_file_system(self, fs: Box<dyn FileSystem>) -> Self {
        Self { fs, ..self }
    }

    /// Returns true when this pass reported no errors.
    pub fn resolve(&mut self, statements: &[Rc<Stmt>]) -> bool {
        let before = self.errors;
        for stmt in statements {
            self.resolve_stmt(stmt);
        }

        self.errors == before
    }

    /// Module bodies get one extra scope so their top-level bindings
    /// resolve locally while the module runs in its own global context.
    pub fn resolve_module(&mut self, statements: &[Rc<Stmt>]) -> bool {
        self.begin_scope();
        let clean = self.resolve(statements);
        self.end_scope();
        clean
    }

    fn resolve_stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Expression { expr } => self.resolve_expr(expr),
            StmtKind::VarDecl { name, initializer } => {
                self.declare(name);
                if let Some(initializer) = initializer {
                    self.resolve_expr(initializer);
                }
                self.define(name);
            }
            StmtKind::FuncDecl { decl } => {
                // Declared and defined up front so functions can call
                // themselves recursively.
                if let Some(name) = &decl.name {
                    self.declare(name);
                    self.define(name);
                }
                self.resolve_function(decl, FunctionType::Function);
            }
            StmtKind::ClassDecl {
                name,
                methods,
                superclass,
            } => self.resolve_class(stmt, name, methods, superclass),
            StmtKind::Block { statements } => {
                self.begin_scope();
                for s in statements {
                    self.resolve_stmt(s);
                }
                self.end_scope();
            }
            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expr(condition);
                self.resolve_stmt(then_branch);
                if let Some(else_branch) = else_branch {
                    self.resolve_stmt(else_branch);
                }
            }
            StmtKind::While { condition, body } => {
                self.loop_depth += 1;
                self.resolve_expr(condition);
                self.resolve_stmt(body);
                self.loop_depth -= 1;
            }
            StmtKind::For {
                initializer,
                condition,
                increment,
                body,
            } => {
                self.loop_depth += 1;
                self.begin_scope();
                if let Some(initializer) = initializer {
                    self.resolve_stmt(initializer);
                }
                if let Some(condition) = condition {
                    self.resolve_expr(condition);
                }
                if let Some(increment) = increment {
                    self.resolve_expr(increment);
                }
                self.resolve_stmt(body);
                self.end_scope();
                self.loop_depth -= 1;
            }
            StmtKind::Break { keyword } => {
                if self.loop_depth == 0 {
                    self.report(
                        &keyword.pos_start,
                        &keyword.pos_end,
                        "'break' must be inside a loop",
                    );
                }
            }
            StmtKind::Continue { keyword } => {
                if self.loop_depth == 0 {
                    self.report(
                        &keyword.pos_start,
                        &keyword.pos_end,
                        "'continue' must be inside a loop",
                    );
                }
            }
            StmtKind::Return { keyword, value } => {
                if self.current_function == FunctionType::None {
                    self.report(
                        &keyword.pos_start,
                        &keyword.pos_end,
                        "'return' must be inside a function",
                    );
                    return;
                }

                if let Some(value) = value {
                    if self.current_function == FunctionType::Initializer {
                        self.report(
                            &stmt.pos_start,
                            &stmt.pos_end,
                            "Can't 'return' non-nil value from an initializer",
                        );
                        return;
                    }
                    self.resolve_expr(value);
                }
            }
            StmtKind::Import {
                symbols,
                path,
                resolved,
            } => {
                self.resolve_import_path(path, resolved);
                for symbol in symbols.keys() {
                    self.declare(symbol);
                    self.define(symbol);
                }
            }
            StmtKind::Pack { statements } => {
                for s in statements {
                    self.resolve_stmt(s);
                }
            }
            StmtKind::Error => {}
        }
    }

    fn resolve_class(
        &mut self,
        stmt: &Stmt,
        name: &Token,
        methods: &[Rc<FunctionDecl>],
        superclass: &Option<Expr>,
    ) {
        let enclosing = self.current_class;
        self.current_class = ClassType::Class;

        self.declare(name);
        self.define(name);

        if let Some(superclass) = superclass {
            self.current_class = ClassType::SubClass;

            if let ExprKind::Variable {
                name: super_name, ..
            } = &superclass.kind
            {
                if super_name.lexeme == name.lexeme {
                    self.report(
                        &stmt.pos_start,
                        &superclass.pos_end,
                        "A Class can't derive from itself",
                    );
                    self.current_class = enclosing;
                    return;
                }
            }

            self.resolve_expr(superclass);
        }

        self.begin_scope();
        let scope = self.scopes.last_mut().expect("scope was just pushed");
        scope.insert("this".to_owned(), true);
        if superclass.is_some() {
            scope.insert("super".to_owned(), true);
        }

        for method in methods {
            let method_name = method
                .name
                .as_ref()
                .map(|t| t.lexeme.as_str())
                .unwrap_or_default();

            let func_type = if method_name == "init" {
                FunctionType::Initializer
            } else {
                FunctionType::Method
            };

            if method_name == "__del__" && !method.params.is_empty() {
                let first = &method.params[0];
                let last = &method.params[method.params.len() - 1];
                self.report(
                    &first.pos_start,
                    &last.pos_end,
                    "Destructor shouldn't take arguments",
                );
                continue;
            }

            self.resolve_function(method, func_type);
        }

        self.end_scope();
        self.current_class = enclosing;
    }

    fn resolve_expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Literal { .. } => {}
            ExprKind::Binary { left, right, .. } => {
                self.resolve_expr(left);
                self.resolve_expr(right);
            }
            ExprKind::Unary { right, .. } => self.resolve_expr(right),
            ExprKind::Variable { name, depth } => {
                if let Some(scope) = self.scopes.last() {
                    if scope.get(&name.lexeme) == Some(&false) {
                        self.report(
                            &expr.pos_start,
                            &expr.pos_end,
                            "Can't read local variable in its own initializer",
                        );
                        return;
                    }
                }

                depth.set(self.resolve_local(name));
            }
            ExprKind::Assignment {
                name, value, depth, ..
            } => {
                self.resolve_expr(value);
                depth.set(self.resolve_local(name));
            }
            ExprKind::Ternary {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expr(condition);
                self.resolve_expr(then_branch);
                self.resolve_expr(else_branch);
            }
            ExprKind::Or { left, right } | ExprKind::And { left, right } => {
                self.resolve_expr(left);
                self.resolve_expr(right);
            }
            ExprKind::Increment { target, .. } | ExprKind::Decrement { target, .. } => {
                self.resolve_expr(target);
            }
            ExprKind::Call { callee, arguments } => {
                self.resolve_expr(callee);
                for arg in arguments {
                    self.resolve_expr(arg);
                }
            }
            ExprKind::Retrieve { holder, accessor } => {
                self.resolve_expr(holder);
                if let Accessor::Index(index) = accessor {
                    self.resolve_expr(index);
                }
            }
            ExprKind::Set {
                holder,
                accessor,
                value,
                ..
            } => {
                self.resolve_expr(holder);
                if let Accessor::Index(index) = accessor {
                    self.resolve_expr(index);
                }
                self.resolve_expr(value);
            }
            ExprKind::This { depth, .. } => {
                if self.current_class == ClassType::None {
                    self.report(
                        &expr.pos_start,
                        &expr.pos_end,
                        "\"this\" can only be used inside a class method",
                    );
                    return;
                }

                depth.set(self.resolve_local_name("this"));
            }
            ExprKind::Super { depth, .. } => {
                if self.current_class != ClassType::SubClass {
                    self.report(
                        &expr.pos_start,
                        &expr.pos_end,
                        "Cannot use 'super' outside of a subclass",
                    );
                    return;
                }

                depth.set(self.resolve_local_name("super"));
            }
            ExprKind::Lambda(decl) => self.resolve_function(decl, FunctionType::Function),
            ExprKind::List { items } => {
                for item in items {
                    self.resolve_expr(item);
                }
            }
            ExprKind::Pack { expressions } => {
                for e in expressions {
                    self.resolve_expr(e);
                }
            }
        }
    }

    fn resolve_function(&mut self, decl: &FunctionDecl, func_type: FunctionType) {
        // Defaults are evaluated at function construction, in the
        // enclosing scope, so they resolve there as well.
        for default in &decl.defaults {
            self.resolve_expr(default);
        }

        let enclosing = self.current_function;
        self.current_function = func_type;

        self.begin_scope();
        for param in &decl.params {
            self.declare(param);
            self.define(param);
        }
        for stmt in &decl.body {
            self.resolve_stmt(stmt);
        }
        self.end_scope();

        self.current_function = enclosing;
    }

    fn resolve_import_path(&mut self, path: &Token, resolved: &std::cell::RefCell<Option<String>>) {
        let mut filepath = PathBuf::from(&path.lexeme);
        if filepath.extension().is_none() {
            filepath.set_extension("lox");
        }

        let mut existed = false;
        if filepath.is_absolute() {
            existed = self.fs.exists(&filepath);
        } else {
            // Current directory first, then each LOXLIB entry.
            let absolute = self.fs.absolute(&filepath);
            if self.fs.exists(&absolute) {
                filepath = absolute;
                existed = true;
            } else if let Ok(loxlib) = std::env::var("LOXLIB") {
                for folder in loxlib.split(';') {
                    if folder.is_empty() {
                        continue;
                    }
                    let candidate = Path::new(folder).join(&filepath);
                    if self.fs.exists(&candidate) {
                        filepath = self.fs.absolute(&candidate);
                        existed = true;
                        break;
                    }
                }
            }
        }

        if !existed {
            self.report(&path.pos_start, &path.pos_end, "Invalid import path");
            return;
        }

        *resolved.borrow_mut() = Some(filepath.to_string_lossy().into_owned());
    }

    fn resolve_local(&self, name: &Token) -> i32 {
        self.resolve_local_name(&name.lexeme)
    }

    fn resolve_local_name(&self, name: &str) -> i32 {
        let total = self.scopes.len();
        for (i, scope) in self.scopes.iter().enumerate().rev() {
            if scope.contains_key(name) {
                return (total - i - 1) as i32;
            }
        }

        // Not found locally: the name is global.
        -1
    }

    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn end_scope(&mut self) {
        self.scopes.pop();
    }

    fn declare(&mut self, name: &Token) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.lexeme.clone(), false);
        }
    }

    fn define(&mut self, name: &Token) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.lexeme.clone(), true);
        }
    }

    fn report(&mut self, pos_start: &Position, pos_end: &Position, msg: &str) {
        self.errors += 1;
        let error = Error::new(
            ErrorKind::Resolving,
            pos_start.clone(),
            pos_end.clone(),
            msg,
        );
        match &self.error_reporter {
            Some(reporter) => reporter.borrow_mut().report(&error),
            None => eprintln!("{error}"),
        }
    }
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;
    use crate::scanner::Scanner;

    fn parse(source: &str) -> Vec<Rc<Stmt>> {
        let tokens = Scanner::new("<test>", source)
            .scan_tokens()
            .expect("failed to scan");
        Parser::new(tokens).parse()
    }

    fn resolve(source: &str) -> (Vec<Rc<Stmt>>, bool) {
        let stmts = parse(source);
        let mut resolver = Resolver::new();
        let clean = resolver.resolve(&stmts);
        (stmts, clean)
    }

    fn function_body(stmt: &Stmt) -> &[Rc<Stmt>] {
        match &stmt.kind {
            StmtKind::FuncDecl { decl } => &decl.body,
            _ => panic!("expected a function declaration"),
        }
    }

    #[test]
    fn closure_depths_walk_to_the_defining_frame() {
        let (stmts, clean) = resolve(
            "func make() { var i = 0; func inc() { i = i + 1; return i; } return inc; }",
        );
        assert!(clean);

        let make_body = function_body(&stmts[0]);
        let inc_body = function_body(&make_body[1]);

        // `i = i + 1;` — both sides one hop from inc's body scope.
        if let StmtKind::Expression { expr } = &inc_body[0].kind {
            if let ExprKind::Assignment { depth, value, .. } = &expr.kind {
                assert_eq!(depth.get(), 1);
                if let ExprKind::Binary { left, .. } = &value.kind {
                    if let ExprKind::Variable { depth, .. } = &left.kind {
                        assert_eq!(depth.get(), 1);
                        return;
                    }
                }
            }
        }
        panic!("unexpected AST shape");
    }

    #[test]
    fn globals_resolve_to_minus_one() {
        let (stmts, clean) = resolve("var g = 1; func f() { return g; }");
        assert!(clean);

        let body = function_body(&stmts[1]);
        if let StmtKind::Return {
            value: Some(value), ..
        } = &body[0].kind
        {
            if let ExprKind::Variable { depth, .. } = &value.kind {
                assert_eq!(depth.get(), -1);
                return;
            }
        }
        panic!("unexpected AST shape");
    }

    #[test]
    fn break_outside_loop_is_rejected() {
        let (_, clean) = resolve("break;");
        assert!(!clean);
        let (_, clean) = resolve("while (true) { break; }");
        assert!(clean);
        let (_, clean) = resolve("func f() { continue; }");
        assert!(!clean);
    }

    #[test]
    fn return_rules() {
        let (_, clean) = resolve("return 1;");
        assert!(!clean);
        let (_, clean) = resolve("class A { init() { return 1; } }");
        assert!(!clean);
        let (_, clean) = resolve("class A { init() { return; } }");
        assert!(clean);
    }

    #[test]
    fn this_and_super_rules() {
        let (_, clean) = resolve("print(this);");
        assert!(!clean);
        let (_, clean) = resolve("class A { m() { return super.m(); } }");
        assert!(!clean);
        let (_, clean) = resolve("class A { } class B > A { m() { return super.m(); } }");
        assert!(clean);
    }

    #[test]
    fn self_inheritance_is_rejected() {
        let (_, clean) = resolve("class A > A { }");
        assert!(!clean);
    }

    #[test]
    fn destructor_must_take_no_arguments() {
        let (_, clean) = resolve("class A { __del__(x) { } }");
        assert!(!clean);
        let (_, clean) = resolve("class A { __del__() { } }");
        assert!(clean);
    }

    #[test]
    fn var_in_its_own_initializer_is_rejected() {
        let (_, clean) = resolve("func f() { var x = x; }");
        assert!(!clean);
    }

    struct FakeFs {
        files: Vec<PathBuf>,
    }

    impl FileSystem for FakeFs {
        fn exists(&self, path: &Path) -> bool {
            self.files.iter().any(|f| f == path)
        }

        fn absolute(&self, path: &Path) -> PathBuf {
            if path.is_absolute() {
                path.to_path_buf()
            } else {
                Path::new("/abs").join(path)
            }
        }
    }

    #[test]
    fn import_paths_get_the_lox_extension_and_an_absolute_rewrite() {
        let stmts = parse(r#"import { hello } from "lib";"#);
        let fake = FakeFs {
            files: vec![PathBuf::from("/abs/lib.lox")],
        };
        let mut resolver = Resolver::new().with_file_system(Box::new(fake));
        assert!(resolver.resolve(&stmts));

        if let StmtKind::Import { resolved, .. } = &stmts[0].kind {
            assert_eq!(resolved.borrow().as_deref(), Some("/abs/lib.lox"));
        } else {
            panic!("expected an import statement");
        }
    }

    #[test]
    fn missing_import_is_a_resolving_error() {
        let stmts = parse(r#"import { hello } from "nowhere";"#);
        let fake = FakeFs { files: vec![] };
        let mut resolver = Resolver::new().with_file_system(Box::new(fake));
        assert!(!resolver.resolve(&stmts));
    }
}
