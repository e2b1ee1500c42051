//! Error taxonomy for the reactive runtime.
//!
//! Getter and callback failures of `user` watchers are isolated and routed to
//! the error sink (see [`crate::config::handle_error`]). Failures of other
//! watchers propagate to whoever triggered the evaluation.

use thiserror::Error;

use crate::reactive::WatcherId;

pub type Result<T> = std::result::Result<T, ReactiveError>;

#[derive(Error, Debug)]
pub enum ReactiveError {
    /// An error raised by user code (a getter, callback or hook).
    #[error("{0}")]
    User(String),

    #[error("getter for watcher \"{expression}\" failed: {source}")]
    Getter {
        expression: String,
        #[source]
        source: Box<ReactiveError>,
    },

    #[error("callback for watcher \"{expression}\" failed: {source}")]
    Callback {
        expression: String,
        #[source]
        source: Box<ReactiveError>,
    },

    #[error("failed watching path \"{0}\": only simple dot-delimited paths are accepted")]
    InvalidPath(String),

    #[error("infinite update loop in watcher {id} with expression \"{expression}\"")]
    InfiniteLoop { id: WatcherId, expression: String },

    #[error("configuration error: {0}")]
    Config(#[from] serde_json::Error),
}

impl ReactiveError {
    /// Shorthand for an error raised by user code.
    pub fn user(message: impl Into<String>) -> Self {
        Self::User(message.into())
    }

    pub(crate) fn getter(expression: &str, source: ReactiveError) -> Self {
        Self::Getter {
            expression: expression.to_string(),
            source: Box::new(source),
        }
    }

    pub(crate) fn callback(expression: &str, source: ReactiveError) -> Self {
        Self::Callback {
            expression: expression.to_string(),
            source: Box::new(source),
        }
    }
}

impl From<&str> for ReactiveError {
    fn from(message: &str) -> Self {
        Self::User(message.to_string())
    }
}

impl From<String> for ReactiveError {
    fn from(message: String) -> Self {
        Self::User(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrapped_errors_keep_the_expression() {
        let err = ReactiveError::getter("a.b", ReactiveError::user("boom"));
        assert_eq!(err.to_string(), "getter for watcher \"a.b\" failed: boom");

        let err = ReactiveError::callback("count", "bad".into());
        assert!(err.to_string().starts_with("callback for watcher \"count\""));
    }
}
