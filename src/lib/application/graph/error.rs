use crate::application::tooling::ToolInvokeError;
use crate::infrastructure::model::ModelError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Tool(#[from] ToolInvokeError),
    #[error("stopped after {limit} assistant turns without a final answer")]
    CycleLimitExceeded { limit: usize },
    #[error("graph run ended unexpectedly: {0}")]
    Aborted(String),
}

impl GraphError {
    /// Whether the console can keep the session going after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, GraphError::CycleLimitExceeded { .. })
    }

    pub fn user_message(&self) -> String {
        match self {
            GraphError::Model(err) => err.user_message(),
            GraphError::Tool(err) => format!("Tool server failure: {err}"),
            GraphError::CycleLimitExceeded { limit } => format!(
                "The agent used {limit} turns without reaching a final resolution. Try rephrasing or splitting the request."
            ),
            GraphError::Aborted(reason) => format!("The agent stopped unexpectedly: {reason}"),
        }
    }
}
