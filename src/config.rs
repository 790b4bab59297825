//! Application configuration.
//!
//! [`Config`] is consulted by the dispatcher and the built-in middlewares. It is built once
//! before serving and never changes afterwards.
use http::{HeaderMap, HeaderName, HeaderValue};
use serde::Deserialize;
use std::{collections::BTreeMap, fmt, str::FromStr};

/// Errors from building a [`Config`].
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("bad response type {0:?}, must be one of: 'plain', 'json', 'html'")]
    ResponseType(String),
    #[error("invalid default header name {0:?}")]
    HeaderName(String),
    #[error("invalid value for default header {0:?}")]
    HeaderValue(String),
    #[error("invalid boolean {value:?} for {key}")]
    Bool { key: &'static str, value: String },
}

/// Format of generated error bodies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorFormat {
    #[default]
    Plain,
    Json,
    Html,
}

impl FromStr for ErrorFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "plain" => Ok(Self::Plain),
            "json" => Ok(Self::Json),
            "html" => Ok(Self::Html),
            _ => Err(ConfigError::ResponseType(s.to_owned())),
        }
    }
}

impl fmt::Display for ErrorFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Self::Plain => "plain",
            Self::Json => "json",
            Self::Html => "html",
        })
    }
}

/// Immutable set of options.
///
/// ```
/// use fournil::{Config, ErrorFormat};
///
/// let config = Config::new()
///     .debug(true)
///     .error_response_type(ErrorFormat::Json)
///     .default_header("server", "fournil")
///     .unwrap();
///
/// assert!(config.is_debug());
/// assert!(config.include_error_description());
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    debug: bool,
    default_headers: HeaderMap,
    error_response_type: ErrorFormat,
    error_include_description: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    /// Create new `Config` with every option at its default.
    pub fn new() -> Self {
        Self {
            debug: false,
            default_headers: HeaderMap::new(),
            error_response_type: ErrorFormat::Plain,
            error_include_description: true,
        }
    }

    /// Read options from `FOURNIL_*` environment variables, unset ones keep their default.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::new();
        if let Ok(value) = std::env::var("FOURNIL_DEBUG") {
            config = config.debug(parse_bool("FOURNIL_DEBUG", &value)?);
        }
        if let Ok(value) = std::env::var("FOURNIL_ERROR_RESPONSE_TYPE") {
            config = config.error_response_type(value.parse()?);
        }
        if let Ok(value) = std::env::var("FOURNIL_ERROR_INCLUDE_DESCRIPTION") {
            let include = parse_bool("FOURNIL_ERROR_INCLUDE_DESCRIPTION", &value)?;
            config = config.error_include_description(include);
        }
        Ok(config)
    }

    /// Expose failure traces in error responses.
    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Append a header merged into every response.
    pub fn default_header(mut self, name: &str, value: &str) -> Result<Self, ConfigError> {
        let key = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| ConfigError::HeaderName(name.to_owned()))?;
        let value =
            HeaderValue::from_str(value).map_err(|_| ConfigError::HeaderValue(name.to_owned()))?;
        self.default_headers.append(key, value);
        Ok(self)
    }

    /// Replace every default header.
    pub fn default_headers(mut self, headers: HeaderMap) -> Self {
        self.default_headers = headers;
        self
    }

    pub fn error_response_type(mut self, format: ErrorFormat) -> Self {
        self.error_response_type = format;
        self
    }

    pub fn error_include_description(mut self, include: bool) -> Self {
        self.error_include_description = include;
        self
    }

    pub fn is_debug(&self) -> bool {
        self.debug
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.default_headers
    }

    pub fn error_format(&self) -> ErrorFormat {
        self.error_response_type
    }

    /// Whether failure descriptions reach clients, always true in debug mode.
    pub fn include_error_description(&self) -> bool {
        self.error_include_description || self.debug
    }
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::Bool { key, value: value.to_owned() }),
    }
}

// ===== serde =====

#[derive(Deserialize)]
#[serde(default)]
struct RawConfig {
    debug: bool,
    default_headers: BTreeMap<String, String>,
    error_response_type: ErrorFormat,
    error_include_description: bool,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            debug: false,
            default_headers: BTreeMap::new(),
            error_response_type: ErrorFormat::Plain,
            error_include_description: true,
        }
    }
}

impl TryFrom<RawConfig> for Config {
    type Error = ConfigError;

    fn try_from(raw: RawConfig) -> Result<Self, Self::Error> {
        let mut config = Config::new()
            .debug(raw.debug)
            .error_response_type(raw.error_response_type)
            .error_include_description(raw.error_include_description);
        for (name, value) in &raw.default_headers {
            config = config.default_header(name, value)?;
        }
        Ok(config)
    }
}

impl<'de> Deserialize<'de> for Config {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = RawConfig::deserialize(deserializer)?;
        Config::try_from(raw).map_err(serde::de::Error::custom)
    }
}
