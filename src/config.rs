//! Configuration management for Libro Reader

use serde::Deserialize;
use std::env;
use std::str::FromStr;

use crate::engine::{Flow, Theme, ThemeName};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub reader: ReaderConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    /// 0 picks an ephemeral port
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReaderConfig {
    pub ready_delay_ms: u64,
    pub font_size: f64,
    pub line_height: f64,
    pub theme: ThemeName,
    pub flow: Flow,
}

impl ReaderConfig {
    /// Initial engine theme built from these settings
    pub fn theme(&self) -> Theme {
        Theme::default()
            .with_name(self.theme)
            .with_flow(self.flow)
            .with_font_size(self.font_size)
            .with_line_height(self.line_height)
    }
}

impl Default for ReaderConfig {
    fn default() -> Self {
        let theme = Theme::default();
        ReaderConfig {
            ready_delay_ms: 0,
            font_size: theme.style.font_size,
            line_height: theme.style.line_height,
            theme: ThemeName::Light,
            flow: Flow::Paginated,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
            },
            database: DatabaseConfig {
                url: "sqlite:./libro.db".to_string(),
            },
            reader: ReaderConfig::default(),
        }
    }
}

impl Config {
    /// Read configuration from the process environment.
    ///
    /// Unset variables take their defaults; unparseable ones are logged and
    /// also fall back to the default.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Config::default();

        Config {
            server: ServerConfig {
                host: lookup("SERVER_HOST").unwrap_or(defaults.server.host),
                port: parse_var(&lookup, "SERVER_PORT", defaults.server.port),
            },
            database: DatabaseConfig {
                url: lookup("DATABASE_URL").unwrap_or(defaults.database.url),
            },
            reader: ReaderConfig {
                ready_delay_ms: parse_var(
                    &lookup,
                    "READER_READY_DELAY_MS",
                    defaults.reader.ready_delay_ms,
                ),
                font_size: parse_var(&lookup, "READER_FONT_SIZE", defaults.reader.font_size),
                line_height: parse_var(&lookup, "READER_LINE_HEIGHT", defaults.reader.line_height),
                theme: match lookup("READER_THEME") {
                    Some(value) => ThemeName::parse(&value).unwrap_or_else(|| {
                        tracing::warn!("Unknown READER_THEME {:?}, using light", value);
                        defaults.reader.theme
                    }),
                    None => defaults.reader.theme,
                },
                flow: match lookup("READER_FLOW") {
                    Some(value) => Flow::parse(&value).unwrap_or_else(|| {
                        tracing::warn!("Unknown READER_FLOW {:?}, using paginated", value);
                        defaults.reader.flow
                    }),
                    None => defaults.reader.flow,
                },
            },
        }
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    match lookup(key) {
        Some(value) => value.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid value for {}: {:?}, using default", key, value);
            default
        }),
        None => default,
    }
}
