use thiserror::Error;

#[derive(Debug, Error)]
pub enum LunchbellError {
    // Content source errors
    #[error("Source fetch failed: {0}")]
    Source(String),

    #[error("Fetched content too short ({chars} chars, need more than {min})")]
    ContentTooShort { chars: usize, min: usize },

    // LLM errors
    #[error("LLM request failed: {0}")]
    LlmRequest(String),

    #[error("LLM response parse error: {0}")]
    LlmParse(String),

    #[error("Empty response from {0}")]
    EmptyResponse(String),

    // Channel errors
    #[error("Channel error: {channel}: {message}")]
    Channel { channel: String, message: String },

    #[error("Delivery to {destination} was not accepted")]
    DeliveryRejected { destination: String },

    // Context contract errors
    #[error("Missing context field for {node}: {field}")]
    MissingContext { node: String, field: String },

    // Graph errors
    #[error("Graph error: {0}")]
    Graph(String),

    // Config errors
    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    #[error("Run timed out after {0}s")]
    Timeout(u64),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LunchbellError {
    /// True for failures that mean the shared context or the graph is wired
    /// wrong, as opposed to an external system misbehaving.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            LunchbellError::MissingContext { .. }
                | LunchbellError::Graph(_)
                | LunchbellError::Config(_)
        )
    }

    pub fn missing(node: impl Into<String>, field: impl Into<String>) -> Self {
        LunchbellError::MissingContext {
            node: node.into(),
            field: field.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LunchbellError>;
