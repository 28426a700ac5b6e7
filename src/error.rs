use http::StatusCode;
use thiserror::Error;

/// Request-level errors surfaced to clients as structured JSON.
///
/// Every variant is detected either while validating the request or while
/// fetching the source image, and carries a stable error code plus a
/// human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProxyError {
    /// Missing `url` argument or unsupported scheme
    #[error("{0}")]
    Url(String),

    /// Operation not allowed, unknown, or too many operations requested
    #[error("{0}")]
    Operation(String),

    /// Query signature did not verify against the client key
    #[error("{0}")]
    Signature(String),

    /// `client` argument does not match the configured client name
    #[error("{0}")]
    Client(String),

    /// Source host is not in the allow-list
    #[error("{0}")]
    Host(String),

    /// Invalid or out-of-bounds operation argument
    #[error("{0}")]
    Dimensions(String),

    /// Upstream fetch failed (DNS, connection, HTTP status or timeout)
    #[error("{0}")]
    Fetch(String),

    /// An option value failed the codec's sanity check
    #[error("{message}")]
    Option {
        /// Name of the offending option (e.g. "mode", "quality")
        option: &'static str,
        message: String,
    },
}

impl ProxyError {
    /// HTTP status mapped to this error kind.
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::Signature(_) | ProxyError::Client(_) | ProxyError::Host(_) => {
                StatusCode::FORBIDDEN
            }
            ProxyError::Fetch(_) => StatusCode::NOT_FOUND,
            ProxyError::Url(_)
            | ProxyError::Operation(_)
            | ProxyError::Dimensions(_)
            | ProxyError::Option { .. } => StatusCode::BAD_REQUEST,
        }
    }

    /// Stable machine-readable error code.
    pub fn code(&self) -> String {
        match self {
            ProxyError::Url(_) => "url_error".to_string(),
            ProxyError::Operation(_) => "operation_error".to_string(),
            ProxyError::Signature(_) => "signature_error".to_string(),
            ProxyError::Client(_) => "client_error".to_string(),
            ProxyError::Host(_) => "host_error".to_string(),
            ProxyError::Dimensions(_) => "dimensions_error".to_string(),
            ProxyError::Fetch(_) => "fetch_error".to_string(),
            ProxyError::Option { option, .. } => format!("{}_error", option),
        }
    }
}

/// Errors raised by the image codec.
///
/// These are not part of the client-facing taxonomy: apart from
/// `InvalidOption`, which the validator converts into
/// [`ProxyError::Option`], they surface as a plain 500.
#[derive(Debug, Clone, Error)]
pub enum ImageError {
    /// Source bytes could not be decoded
    #[error("Failed to decode image: {0}")]
    Decode(String),

    /// Output could not be encoded
    #[error("Failed to encode image: {0}")]
    Encode(String),

    /// An option string could not be parsed
    #[error("Invalid {option}: {message}")]
    InvalidOption {
        option: &'static str,
        message: String,
    },

    /// Watermark could not be rendered or composited
    #[error("Watermark error: {0}")]
    Watermark(String),

    /// Resize target exceeds the configured maximum
    #[error("Resize target {width}x{height} is too large")]
    TooLarge { width: u32, height: u32 },
}

impl ImageError {
    pub(crate) fn invalid(option: &'static str, message: impl Into<String>) -> Self {
        ImageError::InvalidOption {
            option,
            message: message.into(),
        }
    }
}

/// Errors raised while building the outbound HTTP client at startup.
#[derive(Debug, Error)]
pub enum FetcherBuildError {
    /// CA bundle could not be read or parsed
    #[error("Invalid CA bundle {path}: {message}")]
    CaBundle { path: String, message: String },

    /// Proxy settings could not be turned into a proxy URL
    #[error("Invalid proxy: {0}")]
    Proxy(String),

    /// The HTTP client itself could not be constructed
    #[error("Failed to create HTTP client: {0}")]
    Client(String),
}
