use std::{env, net::SocketAddr, path::PathBuf};

use thiserror::Error;

use crate::DEFAULT_MAX_BODY_BYTES;

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1";
pub const DEFAULT_BIND_PORT: u16 = 3030;
pub const DEFAULT_WIDGET_PATH: &str = "web/dist/dailycard.js";

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub bind_port: u16,
    pub widget_path: PathBuf,
    pub max_body_bytes: usize,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("BIND_PORT must be a valid u16")]
    InvalidPort,
    #[error("DAILYCARD_WIDGET_PATH must not be empty")]
    EmptyWidgetPath,
    #[error("MCP_MAX_BODY_BYTES must be a positive integer")]
    InvalidBodyLimit,
    #[error("invalid bind address or port")]
    InvalidSocket,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind_addr = lookup("BIND_ADDR")
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_port = lookup("BIND_PORT")
            .map(|value| {
                value
                    .trim()
                    .parse::<u16>()
                    .map_err(|_| ConfigError::InvalidPort)
            })
            .transpose()?
            .unwrap_or(DEFAULT_BIND_PORT);
        let widget_path = match lookup("DAILYCARD_WIDGET_PATH") {
            Some(value) if value.trim().is_empty() => return Err(ConfigError::EmptyWidgetPath),
            Some(value) => PathBuf::from(value.trim()),
            None => PathBuf::from(DEFAULT_WIDGET_PATH),
        };
        let max_body_bytes = lookup("MCP_MAX_BODY_BYTES")
            .map(|value| {
                value
                    .trim()
                    .parse::<usize>()
                    .ok()
                    .filter(|limit| *limit > 0)
                    .ok_or(ConfigError::InvalidBodyLimit)
            })
            .transpose()?
            .unwrap_or(DEFAULT_MAX_BODY_BYTES);

        let config = Self {
            bind_addr,
            bind_port,
            widget_path,
            max_body_bytes,
        };

        let _ = config.bind_socket()?;
        Ok(config)
    }

    pub fn bind_socket(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.bind_addr, self.bind_port)
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::InvalidSocket)
    }
}
