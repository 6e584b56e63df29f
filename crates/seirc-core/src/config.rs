//! Configuration management
//!
//! Settings are resolved in this order:
//! 1. Environment variables
//! 2. `seirc.toml` configuration file
//! 3. Default values
//!
//! `${VAR_NAME}` inside the configuration file is expanded from the environment.

use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

use crate::Error;

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = "seirc.toml";

/// Main configuration for the gateway
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Where the IRC listener binds
    #[serde(default)]
    pub listen: ListenConfig,

    /// Chat service endpoints
    #[serde(default)]
    pub chat: ChatConfig,

    /// IRC presentation settings
    #[serde(default)]
    pub irc: IrcConfig,
}

/// IRC listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenConfig {
    /// Host to bind
    #[serde(default = "default_bind_host")]
    pub host: String,

    /// Port to bind
    #[serde(default = "default_bind_port")]
    pub port: u16,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            host: default_bind_host(),
            port: default_bind_port(),
        }
    }
}

impl ListenConfig {
    /// `host:port` string suitable for `TcpListener::bind`
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Chat service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Chat host origin; relative links in messages resolve against it
    #[serde(default = "default_chat_origin")]
    pub origin: String,

    /// Origin hosting the account login form
    #[serde(default = "default_login_origin")]
    pub login_origin: String,

    /// Seconds between event polls for each joined room
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            origin: default_chat_origin(),
            login_origin: default_login_origin(),
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

impl ChatConfig {
    /// Parsed chat origin
    pub fn origin_url(&self) -> crate::Result<Url> {
        Ok(Url::parse(&self.origin)?)
    }
}

/// IRC presentation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IrcConfig {
    /// Prefix used on server-originated lines
    #[serde(default = "default_server_name")]
    pub server_name: String,

    /// Recent-message cache capacity
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    /// Characters of parent message shown in reply context
    #[serde(default = "default_reply_preview_len")]
    pub reply_preview_len: usize,

    /// Unchanged characters kept around an edit diff
    #[serde(default = "default_edit_context")]
    pub edit_context: usize,
}

impl Default for IrcConfig {
    fn default() -> Self {
        Self {
            server_name: default_server_name(),
            cache_capacity: default_cache_capacity(),
            reply_preview_len: default_reply_preview_len(),
            edit_context: default_edit_context(),
        }
    }
}

fn default_bind_host() -> String {
    "localhost".to_string()
}

fn default_bind_port() -> u16 {
    7825
}

fn default_chat_origin() -> String {
    "https://chat.stackexchange.com".to_string()
}

fn default_login_origin() -> String {
    "https://meta.stackexchange.com".to_string()
}

fn default_poll_interval_secs() -> u64 {
    2
}

fn default_server_name() -> String {
    "SEIRC".to_string()
}

fn default_cache_capacity() -> usize {
    256
}

fn default_reply_preview_len() -> usize {
    16
}

fn default_edit_context() -> usize {
    8
}

impl Config {
    /// Expand `${VAR_NAME}` references from the environment.
    ///
    /// Unset variables expand to the empty string.
    fn expand_env_vars(value: &str) -> String {
        let mut result = String::new();
        let mut chars = value.chars().peekable();

        while let Some(c) = chars.next() {
            if c == '$' && chars.peek() == Some(&'{') {
                chars.next();

                let mut var_name = String::new();
                for c in chars.by_ref() {
                    if c == '}' {
                        break;
                    }
                    var_name.push(c);
                }

                if let Ok(env_value) = std::env::var(&var_name) {
                    result.push_str(&env_value);
                }
            } else {
                result.push(c);
            }
        }

        result
    }

    /// Load configuration from a TOML file, then apply environment overrides
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let path = path.as_ref();

        let toml_content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;

        let mut cfg = Self::from_toml_str(&toml_content)?;
        cfg.apply_env_overrides();
        cfg.validate()?;

        Ok(cfg)
    }

    /// Parse configuration from TOML text (after env expansion)
    pub fn from_toml_str(content: &str) -> crate::Result<Self> {
        let expanded = Self::expand_env_vars(content);
        toml::from_str(&expanded).map_err(|e| Error::Config(format!("Failed to parse TOML: {}", e)))
    }

    /// Load configuration from the default location.
    ///
    /// Uses `./seirc.toml` when present, otherwise defaults plus environment.
    pub fn load() -> crate::Result<Self> {
        if Path::new(DEFAULT_CONFIG_FILE).exists() {
            return Self::from_toml_file(DEFAULT_CONFIG_FILE);
        }

        Self::from_env()
    }

    /// Defaults overridden by environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut cfg = Self::default();
        cfg.apply_env_overrides();
        cfg.validate()?;
        Ok(cfg)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("SEIRC_BIND_HOST") {
            if !host.is_empty() {
                self.listen.host = host;
            }
        }
        if let Ok(port) = std::env::var("SEIRC_BIND_PORT") {
            if let Ok(p) = port.parse() {
                self.listen.port = p;
            }
        }

        if let Ok(origin) = std::env::var("SEIRC_CHAT_ORIGIN") {
            if !origin.is_empty() {
                self.chat.origin = origin;
            }
        }
        if let Ok(origin) = std::env::var("SEIRC_LOGIN_ORIGIN") {
            if !origin.is_empty() {
                self.chat.login_origin = origin;
            }
        }
        if let Ok(secs) = std::env::var("SEIRC_POLL_INTERVAL_SECS") {
            if let Ok(s) = secs.parse() {
                self.chat.poll_interval_secs = s;
            }
        }

        if let Ok(name) = std::env::var("SEIRC_SERVER_NAME") {
            if !name.is_empty() {
                self.irc.server_name = name;
            }
        }
    }

    /// Reject values the gateway cannot run with
    pub fn validate(&self) -> crate::Result<()> {
        self.chat.origin_url()?;
        Url::parse(&self.chat.login_origin)?;

        if self.irc.cache_capacity == 0 {
            return Err(Error::Config("irc.cache_capacity must be at least 1".to_string()));
        }
        if self.chat.poll_interval_secs == 0 {
            return Err(Error::Config("chat.poll_interval_secs must be at least 1".to_string()));
        }
        if self.irc.server_name.contains(char::is_whitespace) {
            return Err(Error::Config("irc.server_name must not contain whitespace".to_string()));
        }

        Ok(())
    }
}
