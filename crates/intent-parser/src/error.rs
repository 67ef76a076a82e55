use crate::Action;
use thiserror::Error;

pub type Result<T, E = IntentError> = core::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum IntentError {
    #[error("invalid pattern for {action}: {source}")]
    Pattern {
        action: Action,
        #[source]
        source: regex::Error,
    },
    #[error("patterns cannot be registered for action: {0}")]
    UnmatchableAction(Action),
}
