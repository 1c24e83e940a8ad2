use std::cell::RefCell;
use std::fmt::{self, Display};
use std::rc::Rc;

use crate::position::Position;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    IllegalChar,
    ExpectChar,
    Parsing,
    Resolving,
    Runtime,
}

impl ErrorKind {
    pub fn name(&self) -> &'static str {
        match self {
            ErrorKind::IllegalChar => "IllegalChar",
            ErrorKind::ExpectChar => "ExpectChar",
            ErrorKind::Parsing => "ParsingError",
            ErrorKind::Resolving => "ResolvingError",
            ErrorKind::Runtime => "RuntimeError",
        }
    }
}

/// A diagnostic with a source span. Rendering includes the offending line
/// with a caret marker under the span.
#[derive(Debug, Clone)]
pub struct Error {
    pub kind: ErrorKind,
    pub pos_start: Position,
    pub pos_end: Position,
    pub details: String,
}

impl Error {
    pub fn new(
        kind: ErrorKind,
        pos_start: Position,
        pos_end: Position,
        details: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            pos_start,
            pos_end,
            details: details.into(),
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}: {}", self.kind.name(), self.details)?;
        writeln!(
            f,
            "File {}, line {}",
            self.pos_start.file_name,
            self.pos_start.row + 1
        )?;
        writeln!(f)?;
        write!(
            f,
            "{}",
            string_with_arrows(&self.pos_start.file_content, &self.pos_start, &self.pos_end)
        )
    }
}

impl std::error::Error for Error {}

/// Renders the source line(s) covered by `start..end` with `^` markers
/// underneath the offending columns.
pub fn string_with_arrows(content: &str, start: &Position, end: &Position) -> String {
    let mut result = String::new();

    let mut idx_start = content[..start.index.min(content.len())]
        .rfind('\n')
        .map(|i| i + 1)
        .unwrap_or(0);

    let line_count = end.row.saturating_sub(start.row) + 1;
    for i in 0..line_count {
        let idx_end = content[idx_start..]
            .find('\n')
            .map(|offset| idx_start + offset)
            .unwrap_or(content.len());
        let line = &content[idx_start..idx_end];

        let col_start = if i == 0 { start.column } else { 0 };
        let col_end = if i == line_count - 1 {
            end.column
        } else {
            line.len().saturating_sub(1)
        };

        result.push_str(line);
        result.push('\n');
        for _ in 0..col_start {
            result.push(' ');
        }
        let arrows = col_end.saturating_sub(col_start).max(1);
        for _ in 0..arrows {
            result.push('^');
        }
        result.push('\n');

        idx_start = (idx_end + 1).min(content.len());
    }

    result.replace('\t', "")
}

/// Process-wide error sink shared by every pipeline stage. Stages look at
/// the count to decide whether the next stage should run at all.
#[derive(Debug, Default)]
pub struct ErrorReporter {
    errors: usize,
}

impl ErrorReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&mut self, error: &dyn Display) {
        eprintln!("{error}");
        self.errors += 1;
    }

    pub fn reset(&mut self) {
        self.errors = 0;
    }

    /// Reads and clears the error count.
    pub fn count(&mut self) -> usize {
        std::mem::take(&mut self.errors)
    }

    pub fn has_errors(&self) -> bool {
        self.errors > 0
    }
}

pub type SharedErrorReporter = Rc<RefCell<ErrorReporter>>;

pub fn shared_reporter() -> SharedErrorReporter {
    Rc::new(RefCell::new(ErrorReporter::new()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(content: &Rc<str>, index: usize, row: usize, column: usize) -> Position {
        let mut pos = Position::new(Rc::from("test"), content.clone());
        pos.index = index;
        pos.row = row;
        pos.column = column;
        pos
    }

    #[test]
    fn arrows_underline_the_span() {
        let content: Rc<str> = Rc::from("var x = $;\n");
        let start = position(&content, 8, 0, 8);
        let end = position(&content, 9, 0, 9);

        let rendered = string_with_arrows(&content, &start, &end);
        assert_eq!(rendered, "var x = $;\n        ^\n");
    }

    #[test]
    fn reporter_count_reads_and_clears() {
        let mut reporter = ErrorReporter::new();
        let err = Error::new(
            ErrorKind::Parsing,
            Position::preset(),
            Position::preset(),
            "boom",
        );
        reporter.report(&err);
        reporter.report(&err);

        assert!(reporter.has_errors());
        assert_eq!(reporter.count(), 2);
        assert_eq!(reporter.count(), 0);
    }
}
