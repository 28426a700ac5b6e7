//! Process-wide, immutable settings.
//!
//! [`Settings`] is built once at startup (see [`crate::config::ServeConfig::to_settings`])
//! and shared read-only behind an `Arc` by every request. Builder-style
//! `with_*` methods exist for embedding and tests; nothing mutates a
//! `Settings` once the router owns it.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use crate::codec::WatermarkFont;
use crate::request::Operation;

/// Default cap on the number of distinct operations per request.
pub const DEFAULT_MAX_OPERATIONS: usize = 10;

/// Default maximum resize width in pixels.
pub const DEFAULT_MAX_RESIZE_WIDTH: u32 = 15000;

/// Default maximum resize height in pixels.
pub const DEFAULT_MAX_RESIZE_HEIGHT: u32 = 15000;

/// Default cap on concurrent outbound fetches.
pub const DEFAULT_MAX_REQUESTS: usize = 40;

/// Default outbound request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Configured fallbacks for per-operation options.
///
/// Values are kept as strings, exactly like request arguments, so that
/// the option resolver can substitute them without conversion and the
/// codec validates both sources the same way.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionDefaults {
    pub background: Option<String>,
    pub expand: Option<String>,
    pub filter: Option<String>,
    pub format: Option<String>,
    pub mode: Option<String>,
    pub optimize: Option<String>,
    pub position: Option<String>,
    pub progressive: Option<String>,
    pub quality: Option<String>,
    pub retain: Option<String>,
    pub preserve_exif: Option<String>,
    pub watermark_pos: Option<String>,
    pub watermark_txt_size: Option<String>,
    pub watermark_txt_color: Option<String>,
    pub watermark_img_ratio: Option<String>,
}

/// Immutable configuration shared by all requests.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Required value of the `client` argument, when set
    pub client_name: Option<String>,

    /// Key used to verify the `sig` argument, when set
    pub client_key: Option<String>,

    /// Hosts a source URL may point at (empty = any host)
    pub allowed_hosts: HashSet<String>,

    /// Operations a request may ask for
    pub allowed_operations: HashSet<Operation>,

    /// Maximum number of distinct operations per request
    pub max_operations: usize,

    /// Maximum `w` accepted by resize
    pub max_resize_width: u32,

    /// Maximum `h` accepted by resize
    pub max_resize_height: u32,

    /// Maximum concurrent outbound fetches
    pub max_requests: usize,

    /// Timeout for each outbound fetch
    pub timeout: Duration,

    /// Base URL that root-relative `url` arguments are resolved against
    pub implicit_base_url: Option<String>,

    /// PEM bundle of additional trusted CA certificates
    pub ca_certs: Option<PathBuf>,

    /// Whether upstream TLS certificates are validated
    pub validate_cert: bool,

    /// HTTP proxy host for outbound fetches
    pub proxy_host: Option<String>,

    /// HTTP proxy port for outbound fetches
    pub proxy_port: Option<u16>,

    /// User-Agent header sent upstream
    pub user_agent: Option<String>,

    /// Always derive Content-Type from the encoded image format
    pub content_type_from_image: bool,

    /// Operation list used when the request has no `op`
    pub operation: Option<String>,

    /// Per-operation option fallbacks
    pub defaults: OptionDefaults,

    /// Font used for text watermarks
    pub watermark_font: Option<WatermarkFont>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            client_name: None,
            client_key: None,
            allowed_hosts: HashSet::new(),
            allowed_operations: Operation::ALL.into_iter().collect(),
            max_operations: DEFAULT_MAX_OPERATIONS,
            max_resize_width: DEFAULT_MAX_RESIZE_WIDTH,
            max_resize_height: DEFAULT_MAX_RESIZE_HEIGHT,
            max_requests: DEFAULT_MAX_REQUESTS,
            timeout: DEFAULT_TIMEOUT,
            implicit_base_url: None,
            ca_certs: None,
            validate_cert: true,
            proxy_host: None,
            proxy_port: None,
            user_agent: None,
            content_type_from_image: false,
            operation: None,
            defaults: OptionDefaults::default(),
            watermark_font: None,
        }
    }
}

impl Settings {
    /// Require and verify a client name and signing key.
    pub fn with_client(mut self, name: impl Into<String>, key: impl Into<String>) -> Self {
        self.client_name = Some(name.into());
        self.client_key = Some(key.into());
        self
    }

    /// Restrict source URLs to the given hosts.
    pub fn with_allowed_hosts<I, S>(mut self, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_hosts = hosts.into_iter().map(Into::into).collect();
        self
    }

    /// Restrict requests to the given operations.
    pub fn with_allowed_operations<I>(mut self, operations: I) -> Self
    where
        I: IntoIterator<Item = Operation>,
    {
        self.allowed_operations = operations.into_iter().collect();
        self
    }

    pub fn with_max_operations(mut self, max: usize) -> Self {
        self.max_operations = max;
        self
    }

    pub fn with_max_resize(mut self, width: u32, height: u32) -> Self {
        self.max_resize_width = width;
        self.max_resize_height = height;
        self
    }

    pub fn with_max_requests(mut self, max: usize) -> Self {
        self.max_requests = max;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Resolve root-relative `url` arguments against `base`.
    pub fn with_implicit_base_url(mut self, base: impl Into<String>) -> Self {
        self.implicit_base_url = Some(base.into());
        self
    }

    pub fn with_content_type_from_image(mut self, enabled: bool) -> Self {
        self.content_type_from_image = enabled;
        self
    }

    /// Operation list used when the request has no `op` argument.
    pub fn with_default_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    pub fn with_defaults(mut self, defaults: OptionDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn with_watermark_font(mut self, font: WatermarkFont) -> Self {
        self.watermark_font = Some(font);
        self
    }
}
