//! Configuration management.
//!
//! This module provides the command-line interface:
//! - Command-line arguments via clap
//! - Environment variables with `PIXRELAY_` prefix
//! - Defaults matching [`crate::settings`]
//!
//! # Commands
//!
//! - `pixrelay serve` (or no subcommand) - run the proxy
//! - `pixrelay sign` - append a signature to a query string
//!
//! # Environment Variables
//!
//! Every `serve` flag has an environment variable, for example:
//!
//! - `PIXRELAY_PORT` - Server port (default: 8888)
//! - `PIXRELAY_CLIENT_NAME` / `PIXRELAY_CLIENT_KEY` - Client identity and signing key
//! - `PIXRELAY_ALLOWED_HOSTS` - Comma-separated source host allow-list
//! - `PIXRELAY_MAX_REQUESTS` - Concurrent outbound fetch limit (default: 40)
//! - `PIXRELAY_TIMEOUT` - Outbound fetch timeout in seconds (default: 10)

use std::collections::HashSet;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

use crate::codec::{
    parse_flag, parse_watermark_color, parse_watermark_position, parse_watermark_ratio,
    parse_watermark_text_size, Background, OutputFormat, Position, Quality, ResizeFilter,
    ResizeMode, Retain, WatermarkFont,
};
use crate::error::ImageError;
use crate::request::{parse_operations, Operation};
use crate::settings::{
    OptionDefaults, Settings, DEFAULT_MAX_OPERATIONS, DEFAULT_MAX_REQUESTS,
    DEFAULT_MAX_RESIZE_HEIGHT, DEFAULT_MAX_RESIZE_WIDTH,
};

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 8888;

/// Default outbound timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: f64 = 10.0;

// =============================================================================
// CLI Arguments
// =============================================================================

/// pixrelay - an on-demand image transformation proxy.
#[derive(Parser, Debug, Clone)]
#[command(name = "pixrelay")]
#[command(author, version, about, long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Serve options, used when no subcommand is given
    #[command(flatten)]
    pub serve: ServeConfig,
}

impl Cli {
    /// The command to run; `serve` when none was named.
    pub fn into_command(self) -> Command {
        self.command.unwrap_or(Command::Serve(self.serve))
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the image proxy
    Serve(ServeConfig),

    /// Sign a query string with a client key
    Sign(SignConfig),
}

/// Options of the `serve` command.
#[derive(Args, Debug, Clone)]
pub struct ServeConfig {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "PIXRELAY_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "PIXRELAY_PORT")]
    pub port: u16,

    /// Worker threads (0 = one per CPU).
    #[arg(long, default_value_t = 0, env = "PIXRELAY_WORKERS")]
    pub workers: usize,

    /// Enable debug logging.
    #[arg(long, default_value_t = false, env = "PIXRELAY_DEBUG")]
    pub debug: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,

    // =========================================================================
    // Security Configuration
    // =========================================================================
    /// Client name every request must carry as `client`.
    #[arg(long, env = "PIXRELAY_CLIENT_NAME")]
    pub client_name: Option<String>,

    /// Key used to verify request signatures (`sig`).
    #[arg(long, env = "PIXRELAY_CLIENT_KEY")]
    pub client_key: Option<String>,

    /// Hosts source images may be fetched from (comma-separated; empty = any).
    #[arg(long, env = "PIXRELAY_ALLOWED_HOSTS", value_delimiter = ',')]
    pub allowed_hosts: Vec<String>,

    /// Operations requests may use (comma-separated; default: all).
    #[arg(long, env = "PIXRELAY_ALLOWED_OPERATIONS", value_delimiter = ',')]
    pub allowed_operations: Vec<String>,

    /// Maximum number of distinct operations per request.
    #[arg(long, default_value_t = DEFAULT_MAX_OPERATIONS, env = "PIXRELAY_MAX_OPERATIONS")]
    pub max_operations: usize,

    /// Maximum resize width.
    #[arg(long, default_value_t = DEFAULT_MAX_RESIZE_WIDTH, env = "PIXRELAY_MAX_RESIZE_WIDTH")]
    pub max_resize_width: u32,

    /// Maximum resize height.
    #[arg(long, default_value_t = DEFAULT_MAX_RESIZE_HEIGHT, env = "PIXRELAY_MAX_RESIZE_HEIGHT")]
    pub max_resize_height: u32,

    // =========================================================================
    // Network Configuration
    // =========================================================================
    /// Maximum concurrent outbound fetches.
    #[arg(long, default_value_t = DEFAULT_MAX_REQUESTS, env = "PIXRELAY_MAX_REQUESTS")]
    pub max_requests: usize,

    /// Outbound fetch timeout in seconds.
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS, env = "PIXRELAY_TIMEOUT")]
    pub timeout: f64,

    /// Base URL for root-relative `url` arguments.
    #[arg(long, env = "PIXRELAY_IMPLICIT_BASE_URL")]
    pub implicit_base_url: Option<String>,

    /// PEM bundle of extra trusted CA certificates.
    #[arg(long, env = "PIXRELAY_CA_CERTS")]
    pub ca_certs: Option<PathBuf>,

    /// Validate upstream TLS certificates.
    #[arg(long, default_value_t = true, action = ArgAction::Set, env = "PIXRELAY_VALIDATE_CERT")]
    pub validate_cert: bool,

    /// HTTP proxy host for outbound fetches.
    #[arg(long, env = "PIXRELAY_PROXY_HOST")]
    pub proxy_host: Option<String>,

    /// HTTP proxy port for outbound fetches.
    #[arg(long, env = "PIXRELAY_PROXY_PORT")]
    pub proxy_port: Option<u16>,

    /// User-Agent sent upstream.
    #[arg(long, env = "PIXRELAY_USER_AGENT")]
    pub user_agent: Option<String>,

    // =========================================================================
    // Response Configuration
    // =========================================================================
    /// Always derive Content-Type from the encoded image.
    #[arg(long, default_value_t = false, env = "PIXRELAY_CONTENT_TYPE_FROM_IMAGE")]
    pub content_type_from_image: bool,

    /// Font file used for text watermarks.
    #[arg(long, env = "PIXRELAY_WATERMARK_FONT")]
    pub watermark_font: Option<PathBuf>,

    // =========================================================================
    // Operation Defaults
    // =========================================================================
    /// Operation list used when a request has no `op`.
    #[arg(long, env = "PIXRELAY_OPERATION")]
    pub operation: Option<String>,

    /// Default background colour (resize fill, JPEG flattening).
    #[arg(long, env = "PIXRELAY_BACKGROUND")]
    pub background: Option<String>,

    /// Default rotate expand flag (0/1).
    #[arg(long, env = "PIXRELAY_EXPAND")]
    pub expand: Option<String>,

    /// Default resize filter.
    #[arg(long, env = "PIXRELAY_FILTER")]
    pub filter: Option<String>,

    /// Default output format.
    #[arg(long, env = "PIXRELAY_FORMAT")]
    pub format: Option<String>,

    /// Default resize mode.
    #[arg(long, env = "PIXRELAY_MODE")]
    pub mode: Option<String>,

    /// Default PNG optimisation flag (0/1).
    #[arg(long, env = "PIXRELAY_OPTIMIZE")]
    pub optimize: Option<String>,

    /// Default crop/pad position.
    #[arg(long, env = "PIXRELAY_POSITION")]
    pub position: Option<String>,

    /// Default progressive flag (0/1).
    #[arg(long, env = "PIXRELAY_PROGRESSIVE")]
    pub progressive: Option<String>,

    /// Default output quality (1-100).
    #[arg(long, env = "PIXRELAY_QUALITY")]
    pub quality: Option<String>,

    /// Default adapt retain percentage (1-99).
    #[arg(long, env = "PIXRELAY_RETAIN")]
    pub retain: Option<String>,

    /// Default EXIF preservation flag (0/1).
    #[arg(long, env = "PIXRELAY_PRESERVE_EXIF")]
    pub preserve_exif: Option<String>,

    /// Default watermark position.
    #[arg(long, env = "PIXRELAY_WATERMARK_POS")]
    pub watermark_pos: Option<String>,

    /// Default watermark text size in pixels.
    #[arg(long, env = "PIXRELAY_WATERMARK_TXT_SIZE")]
    pub watermark_txt_size: Option<String>,

    /// Default watermark text colour.
    #[arg(long, env = "PIXRELAY_WATERMARK_TXT_COLOR")]
    pub watermark_txt_color: Option<String>,

    /// Default watermark image width ratio.
    #[arg(long, env = "PIXRELAY_WATERMARK_IMG_RATIO")]
    pub watermark_img_ratio: Option<String>,
}

impl ServeConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_operations == 0 {
            return Err("max_operations must be greater than 0".to_string());
        }
        if self.max_requests == 0 {
            return Err("max_requests must be greater than 0".to_string());
        }
        if !self.timeout.is_finite() || self.timeout <= 0.0 {
            return Err("timeout must be a positive number of seconds".to_string());
        }
        if self.proxy_port.is_some() && self.proxy_host.is_none() {
            return Err("proxy_port requires proxy_host".to_string());
        }

        if let Some(base) = &self.implicit_base_url {
            let parsed = url::Url::parse(base)
                .map_err(|e| format!("Invalid implicit_base_url {}: {}", base, e))?;
            if parsed.host_str().is_none() {
                return Err(format!("implicit_base_url {} has no host", base));
            }
        }

        self.allowed_operation_set()?;
        if let Some(operation) = &self.operation {
            parse_operations(operation)
                .map_err(|e| format!("Unknown default operation: {}", e.0))?;
        }

        self.check_defaults()
            .map_err(|e| format!("Invalid default: {}", e))?;

        Ok(())
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Collect the per-operation defaults.
    pub fn defaults(&self) -> OptionDefaults {
        OptionDefaults {
            background: self.background.clone(),
            expand: self.expand.clone(),
            filter: self.filter.clone(),
            format: self.format.clone(),
            mode: self.mode.clone(),
            optimize: self.optimize.clone(),
            position: self.position.clone(),
            progressive: self.progressive.clone(),
            quality: self.quality.clone(),
            retain: self.retain.clone(),
            preserve_exif: self.preserve_exif.clone(),
            watermark_pos: self.watermark_pos.clone(),
            watermark_txt_size: self.watermark_txt_size.clone(),
            watermark_txt_color: self.watermark_txt_color.clone(),
            watermark_img_ratio: self.watermark_img_ratio.clone(),
        }
    }

    /// Build the immutable [`Settings`] (call `validate()` first).
    ///
    /// Loads the watermark font, if configured.
    pub fn to_settings(&self) -> Result<Settings, String> {
        let watermark_font = match &self.watermark_font {
            Some(path) => Some(WatermarkFont::load(path).map_err(|e| e.to_string())?),
            None => None,
        };

        Ok(Settings {
            client_name: self.client_name.clone(),
            client_key: self.client_key.clone(),
            allowed_hosts: self
                .allowed_hosts
                .iter()
                .map(|host| host.trim().to_string())
                .filter(|host| !host.is_empty())
                .collect(),
            allowed_operations: self.allowed_operation_set()?,
            max_operations: self.max_operations,
            max_resize_width: self.max_resize_width,
            max_resize_height: self.max_resize_height,
            max_requests: self.max_requests,
            timeout: Duration::from_secs_f64(self.timeout),
            implicit_base_url: self.implicit_base_url.clone(),
            ca_certs: self.ca_certs.clone(),
            validate_cert: self.validate_cert,
            proxy_host: self.proxy_host.clone(),
            proxy_port: self.proxy_port,
            user_agent: self.user_agent.clone(),
            content_type_from_image: self.content_type_from_image,
            operation: self.operation.clone(),
            defaults: self.defaults(),
            watermark_font,
        })
    }

    fn allowed_operation_set(&self) -> Result<HashSet<Operation>, String> {
        let names: Vec<&str> = self
            .allowed_operations
            .iter()
            .map(|name| name.trim())
            .filter(|name| !name.is_empty())
            .collect();

        if names.is_empty() {
            return Ok(Operation::ALL.into_iter().collect());
        }

        names
            .into_iter()
            .map(|name| {
                name.parse()
                    .map_err(|_| format!("Unknown allowed operation: {}", name))
            })
            .collect()
    }

    fn check_defaults(&self) -> Result<(), ImageError> {
        fn check<T: FromStr<Err = ImageError>>(value: &Option<String>) -> Result<(), ImageError> {
            value.as_deref().map(str::parse::<T>).transpose().map(|_| ())
        }
        fn check_with<T>(
            value: &Option<String>,
            parse: impl Fn(&str) -> Result<T, ImageError>,
        ) -> Result<(), ImageError> {
            value.as_deref().map(parse).transpose().map(|_| ())
        }

        check::<Background>(&self.background)?;
        check::<ResizeFilter>(&self.filter)?;
        check::<OutputFormat>(&self.format)?;
        check::<ResizeMode>(&self.mode)?;
        check::<Position>(&self.position)?;
        check::<Quality>(&self.quality)?;
        check::<Retain>(&self.retain)?;
        check_with(&self.expand, |v| parse_flag("expand", v))?;
        check_with(&self.optimize, |v| parse_flag("optimize", v))?;
        check_with(&self.progressive, |v| parse_flag("progressive", v))?;
        check_with(&self.preserve_exif, |v| parse_flag("preserve_exif", v))?;
        check_with(&self.watermark_pos, parse_watermark_position)?;
        check_with(&self.watermark_txt_size, parse_watermark_text_size)?;
        check_with(&self.watermark_txt_color, parse_watermark_color)?;
        check_with(&self.watermark_img_ratio, parse_watermark_ratio)?;
        Ok(())
    }
}

// =============================================================================
// Sign Command
// =============================================================================

/// Output format of the `sign` command.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignOutputFormat {
    /// The query string with `sig` appended
    #[default]
    Query,
    /// A full URL (requires --base-url)
    Url,
    /// Only the hex signature
    Signature,
    /// JSON object with every field
    Json,
}

/// Options of the `sign` command.
#[derive(Args, Debug, Clone)]
pub struct SignConfig {
    /// Client key to sign with.
    #[arg(long, env = "PIXRELAY_CLIENT_KEY")]
    pub key: String,

    /// Query string to sign, e.g. "url=...&op=resize&w=100".
    #[arg(long)]
    pub query: String,

    /// Base URL of the proxy, used by the url output format.
    #[arg(long)]
    pub base_url: Option<String>,

    /// Output format.
    #[arg(long, value_enum, default_value_t = SignOutputFormat::Query)]
    pub format: SignOutputFormat,
}

impl SignConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.key.is_empty() {
            return Err("Signing key must not be empty. Set --key or PIXRELAY_CLIENT_KEY".to_string());
        }
        if self.query.trim_start_matches('?').is_empty() {
            return Err("Query must not be empty".to_string());
        }
        if self.format == SignOutputFormat::Url && self.base_url.is_none() {
            return Err("--format url requires --base-url".to_string());
        }
        Ok(())
    }

    /// The query without a leading `?`.
    pub fn query(&self) -> &str {
        self.query.trim_start_matches('?')
    }
}

// =============================================================================
// Tests
// =============================================================================
