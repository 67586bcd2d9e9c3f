use thiserror::Error;

/// Message shown when a key is submitted blank.
pub const EMPTY_API_KEY_MESSAGE: &str = "Please enter your LlamaCloud API key.";

/// Fallback used when a non-2xx response carries no usable message.
pub const GENERIC_REQUEST_FAILURE: &str = "Request failed";

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("{}", EMPTY_API_KEY_MESSAGE)]
    EmptyApiKey,

    #[error("Please enter a tweet URL.")]
    EmptyTweetUrl,

    #[error("A validated LlamaCloud API key is required before parsing.")]
    NotAuthenticated,

    #[error("A parse request is already in progress.")]
    ParseInFlight,

    #[error("{message}")]
    Remote { status: u16, message: String },

    #[error("Failed to reach the parsing service: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("Unexpected response from the parsing service: {0}")]
    Decode(String),

    #[error("Result discarded because the session was reset.")]
    Superseded,

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ClientError {
    /// True for errors raised before any network call was attempted.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            ClientError::EmptyApiKey
                | ClientError::EmptyTweetUrl
                | ClientError::NotAuthenticated
                | ClientError::ParseInFlight
        )
    }

    /// The message the remote service sent, if this is a remote rejection.
    pub fn remote_message(&self) -> Option<&str> {
        match self {
            ClientError::Remote { message, .. } => Some(message),
            _ => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to access credential store at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Credential store at {path} is malformed: {source}")]
    Malformed {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to serialize credential store: {0}")]
    Serialize(#[from] toml::ser::Error),
}

pub type Result<T> = std::result::Result<T, ClientError>;
