use std::fmt::{self, Display};

use crate::error::{Error, ErrorKind};
use crate::position::Position;

/// Runtime unwinding. `Break` and `Continue` are control-flow signals
/// caught by the enclosing loop; only `Error` ever reaches the user.
#[derive(Debug, Clone)]
pub enum RuntimeError {
    Error {
        pos_start: Position,
        pos_end: Position,
        msg: String,
    },
    Break,
    Continue,
}

impl RuntimeError {
    pub fn new(pos_start: &Position, pos_end: &Position, msg: impl Into<String>) -> Self {
        Self::Error {
            pos_start: pos_start.clone(),
            pos_end: pos_end.clone(),
            msg: msg.into(),
        }
    }
}

impl From<RuntimeError> for Error {
    fn from(value: RuntimeError) -> Self {
        match value {
            RuntimeError::Error {
                pos_start,
                pos_end,
                msg,
            } => Error::new(ErrorKind::Runtime, pos_start, pos_end, msg),
            RuntimeError::Break => Error::new(
                ErrorKind::Runtime,
                Position::preset(),
                Position::preset(),
                "Unexpected break statement",
            ),
            RuntimeError::Continue => Error::new(
                ErrorKind::Runtime,
                Position::preset(),
                Position::preset(),
                "Unexpected continue statement",
            ),
        }
    }
}

impl Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let error: Error = self.clone().into();
        write!(f, "{error}")
    }
}

impl std::error::Error for RuntimeError {}
