use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("No active tab found")]
    NoActiveTab,

    #[error("Cannot access browser internal page: {0}")]
    NavigationRestricted(String),

    #[error(
        "No such element found in the snapshot (uid {uid}). The page content may have changed, please call take_snapshot again."
    )]
    StaleSnapshot { uid: String },

    #[error(
        "Element {uid} is no longer attached to the page. The page content may have changed, please call take_snapshot again."
    )]
    ElementDetached { uid: String },

    #[error("Element is not actionable: {0}")]
    ElementNotActionable(String),

    #[error("Element is not an input field: {0}")]
    NotAnInputField(String),

    #[error("No supported editor found: {0}")]
    NotSupportedEditor(String),

    #[error("CDP error in {method}: {message}")]
    Cdp { method: String, message: String },

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Tool error: {0}")]
    Tool(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether the agent should take a fresh snapshot before retrying.
    pub fn needs_resnapshot(&self) -> bool {
        matches!(self, Error::StaleSnapshot { .. } | Error::ElementDetached { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
