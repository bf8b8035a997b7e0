use crate::registry::ValueType;

/// Boxed error returned by fallible filter getters and resolvers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Configuration and evaluation errors.
///
/// Malformed query text never produces one of these; it is reported through
/// [`QueryError`](crate::types::QueryError) values on the parsed query.
#[derive(Debug, thiserror::Error)]
pub enum QueryEngineError {
    #[error("Engine is sealed: cannot change {0} after the first parse")]
    Sealed(String),

    #[error("Filter already registered: {0}")]
    DuplicateFilter(String),

    #[error("Invalid token: {0:?}")]
    InvalidToken(String),

    #[error("Unknown operator: {0}")]
    UnknownOperator(String),

    #[error("No operator handler accepts values of type {value_type} for filter \"{filter}\"")]
    MissingHandler {
        filter: String,
        value_type: ValueType,
    },

    #[error("No type parser registered for {0}")]
    MissingParser(ValueType),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Filter \"{filter}\" failed with operator \"{operator}\" and value \"{value}\": {source}")]
    Evaluation {
        filter: String,
        operator: String,
        value: String,
        #[source]
        source: BoxError,
    },
}

pub type Result<T> = std::result::Result<T, QueryEngineError>;
