#![allow(clippy::new_without_default)]
mod ast;
mod error;
mod interpreter;
mod object;
mod parser;
mod position;
mod resolver;
mod scanner;
mod token;

pub mod prelude {
    pub use crate::ast::*;
    pub use crate::error::*;
    pub use crate::interpreter::*;
    pub use crate::object::*;
    pub use crate::parser::*;
    pub use crate::position::*;
    pub use crate::resolver::*;
    pub use crate::scanner::*;
    pub use crate::token::*;
}

use std::io::Write;

use prelude::{
    shared_reporter, AstPrinter, Interpreter, Parser, Resolver, Scanner, SharedErrorReporter,
};

/// Ties the pipeline together: scan, parse, resolve, interpret, with the
/// shared error reporter gating each stage.
pub struct Lox {
    interpreter: Interpreter,
    error_reporter: SharedErrorReporter,
}

impl Lox {
    pub fn new() -> Self {
        let error_reporter = shared_reporter();
        let interpreter = Interpreter::new().with_error_reporting(error_reporter.clone());

        Self {
            interpreter,
            error_reporter,
        }
    }

    /// Expression-statement results echo back in REPL mode.
    pub fn set_repl_echo(&mut self, enabled: bool) {
        self.interpreter.repl_echo = enabled;
    }

    pub fn run_file(&mut self, filename: &str) -> Result<usize, anyhow::Error> {
        let content = std::fs::read_to_string(filename)?;
        Ok(self.run(filename, &content))
    }

    pub fn run_prompt(&mut self) -> Result<(), anyhow::Error> {
        let reader = std::io::stdin();
        self.set_repl_echo(true);

        loop {
            print!("lox > ");
            std::io::stdout().flush()?;

            let mut line = String::new();
            let n = reader.read_line(&mut line)?;
            if n == 0 {
                return Ok(());
            }

            let line = line.trim_end();
            if line == "exit" {
                return Ok(());
            }

            // Errors are reported and forgotten in the prompt.
            let _ = self.run("<stdin>", line);
        }
    }

    /// Parses and runs `source` as the contents of `filename`. Returns
    /// the number of errors reported while doing so.
    pub fn run(&mut self, filename: &str, source: &str) -> usize {
        let tokens = match Scanner::new(filename, source).scan_tokens() {
            Ok(tokens) => tokens,
            Err(e) => {
                self.error_reporter.borrow_mut().report(&e);
                return self.error_reporter.borrow_mut().count();
            }
        };

        if log::log_enabled!(log::Level::Debug) {
            for token in &tokens {
                log::debug!("{token}");
            }
        }

        let statements = Parser::new(tokens)
            .with_error_reporting(self.error_reporter.clone())
            .parse();
        let count = self.error_reporter.borrow_mut().count();
        if count > 0 {
            return count;
        }

        if log::log_enabled!(log::Level::Debug) {
            for stmt in &statements {
                log::debug!("{}", AstPrinter::stmt_to_string(stmt));
            }
        }

        let mut resolver = Resolver::new().with_error_reporting(self.error_reporter.clone());
        resolver.resolve(&statements);
        let count = self.error_reporter.borrow_mut().count();
        if count > 0 {
            return count;
        }

        if let Err(e) = self.interpreter.interpret(&statements) {
            self.error_reporter.borrow_mut().report(&e);
        }

        self.error_reporter.borrow_mut().count()
    }
}
