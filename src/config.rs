//! Runtime knobs shared by every role.
//!
//! ```
//! use nacabe::config::NacAbeConfig;
//! let config = NacAbeConfig::from_toml_str("interest_retries = 0").unwrap();
//! assert_eq!(config.interest_retries, 0);
//! assert_eq!(config.interest_lifetime_ms, NacAbeConfig::default().interest_lifetime_ms);
//! ```
use std::{fs, path::Path, time::Duration};
use serde::{Deserialize, Serialize};
use crate::error::NacAbeError;

/// Upper bound of `token_lifetime_secs`, one hundred years.
pub const MAX_TOKEN_LIFETIME_SECS: i64 = 100 * 365 * 24 * 60 * 60;

#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Debug)]
#[serde(default)]
pub struct NacAbeConfig {
    /// How long a single request waits for its response.
    pub interest_lifetime_ms: u64,
    /// Extra attempts after a timed out request.
    pub interest_retries: u32,
    /// Validity of attribute-grant tokens, `0` for tokens that never expire.
    pub token_lifetime_secs: i64,
    /// Queue depth of a registered prefix.
    pub channel_capacity: usize,
}

impl Default for NacAbeConfig {
    fn default() -> Self {
        NacAbeConfig {
            interest_lifetime_ms: 4000,
            interest_retries: 2,
            token_lifetime_secs: 3600,
            channel_capacity: 64,
        }
    }
}

impl NacAbeConfig {
    pub fn from_toml_str(content: &str) -> Result<NacAbeConfig, NacAbeError> {
        let config: NacAbeConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<NacAbeConfig, NacAbeError> {
        NacAbeConfig::from_toml_str(&fs::read_to_string(path)?)
    }

    pub fn validate(&self) -> Result<(), NacAbeError> {
        if self.interest_lifetime_ms == 0 {
            return Err(NacAbeError::encoding("interest_lifetime_ms must be positive"));
        }
        if self.channel_capacity == 0 {
            return Err(NacAbeError::encoding("channel_capacity must be positive"));
        }
        self.token_lifetime()?;
        Ok(())
    }

    pub fn interest_lifetime(&self) -> Duration {
        Duration::from_millis(self.interest_lifetime_ms)
    }

    /// `None` for tokens that never expire.
    pub fn token_lifetime(&self) -> Result<Option<chrono::Duration>, NacAbeError> {
        match self.token_lifetime_secs {
            0 => Ok(None),
            secs if !(0..=MAX_TOKEN_LIFETIME_SECS).contains(&secs) => Err(NacAbeError::encoding(&format!(
                "token_lifetime_secs must be between 0 and {}",
                MAX_TOKEN_LIFETIME_SECS
            ))),
            secs => chrono::Duration::try_seconds(secs)
                .map(Some)
                .ok_or_else(|| NacAbeError::encoding("token_lifetime_secs is out of range")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn partial_file_keeps_defaults() {
        let config = NacAbeConfig::from_toml_str(
            r#"
            interest_lifetime_ms = 250
            token_lifetime_secs = 0
            "#,
        )
        .unwrap();
        assert_eq!(config.interest_lifetime(), Duration::from_millis(250));
        assert_eq!(config.token_lifetime().unwrap(), None);
        assert_eq!(config.channel_capacity, 64);
    }

    #[test]
    fn rejects_zero_lifetime() {
        let err = NacAbeConfig::from_toml_str("interest_lifetime_ms = 0").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Encoding);
        assert!(NacAbeConfig::from_toml_str("interest_retries = \"many\"").is_err());
    }

    #[test]
    fn token_lifetime_is_bounded() {
        for secs in [-1, MAX_TOKEN_LIFETIME_SECS + 1, 10_000_000_000_000, i64::MAX] {
            let err = NacAbeConfig::from_toml_str(&format!("token_lifetime_secs = {}", secs)).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Encoding, "{}", secs);
            let unchecked = NacAbeConfig { token_lifetime_secs: secs, ..NacAbeConfig::default() };
            assert!(unchecked.token_lifetime().is_err());
        }
        let longest = NacAbeConfig { token_lifetime_secs: MAX_TOKEN_LIFETIME_SECS, ..NacAbeConfig::default() };
        assert!(longest.token_lifetime().unwrap().is_some());
    }
}
