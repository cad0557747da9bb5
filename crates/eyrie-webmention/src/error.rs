use eyrie_build::BuildError;
use eyrie_entry::EntryError;
use eyrie_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WebmentionError {
    /// The URL resolves to a loopback, private or otherwise internal address.
    #[error("refusing to contact {url}: {reason}")]
    SecurityRejection { url: String, reason: String },

    /// Discovery or delivery failed at the transport or HTTP level.
    #[error("network error: {0}")]
    Network(String),

    /// An inbound notification carried the wrong shared secret.
    #[error("invalid webmention secret")]
    InvalidSecret,

    /// An inbound target is not a URL on this site.
    #[error("target is not on this site: {0}")]
    UnknownTarget(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// One failure per target, in delivery order.
    #[error("{} webmention deliveries failed: {}", .0.len(), describe(.0))]
    Multiple(Vec<(String, WebmentionError)>),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Entry(#[from] EntryError),
}

impl From<reqwest::Error> for WebmentionError {
    /// A redirect stopped by the address guard keeps its rejection.
    fn from(e: reqwest::Error) -> Self {
        let mut source = std::error::Error::source(&e);
        while let Some(cause) = source {
            let rejection = cause.downcast_ref::<WebmentionError>();
            if let Some(WebmentionError::SecurityRejection { url, reason }) = rejection {
                return WebmentionError::SecurityRejection {
                    url: url.clone(),
                    reason: reason.clone(),
                };
            }
            source = std::error::Error::source(cause);
        }
        WebmentionError::Network(e.to_string())
    }
}

fn describe(errors: &[(String, WebmentionError)]) -> String {
    errors
        .iter()
        .map(|(target, e)| format!("{target}: {e}"))
        .collect::<Vec<_>>()
        .join("; ")
}

pub type WebmentionResult<T> = Result<T, WebmentionError>;
