use std::path::Path;
use std::time::Duration;

use comrpc_frame::{StreamConfig, BLOCK_SIZE, DEFAULT_MAX_MESSAGE};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Per-exchange settings.
///
/// The proxy-stub path and trace categories are handed to every peer in its
/// `Setup` reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeConfig {
    /// Where peers look for proxy/stub libraries.
    pub proxy_stub_path: String,
    /// Trace directives peers should install.
    pub trace_categories: String,
    /// Largest message accepted on the channel, in bytes.
    pub max_message_size: usize,
    /// Bytes moved per `serialize`/`deserialize` call.
    pub chunk_size: usize,
    /// Timeout for each blocking request/response turn, in milliseconds.
    pub timeout_ms: u64,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            proxy_stub_path: String::new(),
            trace_categories: String::new(),
            max_message_size: DEFAULT_MAX_MESSAGE,
            chunk_size: BLOCK_SIZE,
            timeout_ms: 5_000,
        }
    }
}

impl ExchangeConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Stream settings for channels serving this exchange.
    ///
    /// Blocking reads wake up once per timeout so deadlines are observed.
    /// A zero timeout leaves the channel fully blocking.
    pub fn stream_config(&self) -> StreamConfig {
        let timeout = (self.timeout_ms > 0).then(|| self.timeout());
        StreamConfig {
            max_message_size: self.max_message_size,
            chunk_size: self.chunk_size,
            read_timeout: timeout,
            write_timeout: timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_stream_defaults() {
        let config = ExchangeConfig::default();
        assert_eq!(config.chunk_size, 512);
        assert_eq!(config.max_message_size, 16 * 1024 * 1024);
        assert_eq!(config.timeout(), Duration::from_secs(5));

        let stream = config.stream_config();
        assert_eq!(stream.chunk_size, config.chunk_size);
        assert_eq!(stream.read_timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config = ExchangeConfig::from_json(
            r#"{"proxy_stub_path": "/usr/lib/comrpc/proxystubs", "timeout_ms": 250}"#,
        )
        .unwrap();

        assert_eq!(config.proxy_stub_path, "/usr/lib/comrpc/proxystubs");
        assert_eq!(config.timeout(), Duration::from_millis(250));
        assert_eq!(config.chunk_size, 512);
        assert!(config.trace_categories.is_empty());
    }

    #[test]
    fn zero_timeout_blocks() {
        let config = ExchangeConfig {
            timeout_ms: 0,
            ..ExchangeConfig::default()
        };
        assert_eq!(config.stream_config().read_timeout, None);
    }

    #[test]
    fn invalid_json_is_error() {
        let err = ExchangeConfig::from_json("{ not json").unwrap_err();
        assert!(matches!(err, crate::error::ExchangeError::Json(_)));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = ExchangeConfig::from_file("/nonexistent/comrpc.json").unwrap_err();
        assert!(matches!(err, crate::error::ExchangeError::Io(_)));
    }

    #[test]
    fn roundtrips_through_json() {
        let config = ExchangeConfig {
            trace_categories: "comrpc=debug".to_string(),
            ..ExchangeConfig::default()
        };
        let text = serde_json::to_string(&config).unwrap();
        assert_eq!(ExchangeConfig::from_json(&text).unwrap(), config);
    }
}
