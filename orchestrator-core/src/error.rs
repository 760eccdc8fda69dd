//! Shared error taxonomy (§7). Every component error enum implements
//! [`HasErrorKind`] so `serve` can render a uniform `{type:"error"}` surface
//! without matching on each component's variants individually.

use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub enum ErrorKind {
    NotFound,
    Unauthorized,
    ValidationError,
    SchemaError,
    Timeout,
    Cancelled,
    TransportError,
    ExecutorError,
    BudgetExceeded,
    ProviderError,
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Maps a component error onto the shared reporting taxonomy.
pub trait HasErrorKind {
    fn kind(&self) -> ErrorKind;
}
