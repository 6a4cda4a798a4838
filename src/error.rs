use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum NotifierError {
    #[error("{0} is not set in the environment")]
    MissingToken(&'static str),

    #[error("{url} responded with status {status}")]
    UnexpectedStatus {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("{url} responded with an empty body")]
    EmptyBody { url: String },

    #[error("websocket authentication failed: {0}")]
    AuthFailed(String),

    #[error("event subscription rejected")]
    SubscribeRejected,

    #[error("websocket stream closed")]
    StreamClosed,

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, NotifierError>;
