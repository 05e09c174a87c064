//! 演示入口的配置。
//!
//! ```toml
//! rounds = 5
//! simulate_failure = false
//!
//! [startup]
//! setup_delay_ms = 5000
//! log_filter = "info"
//! ```
use std::fs;
use std::path::{Path, PathBuf};

use postinit_core::{ConfigError, StartupConfig};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DemoConfigError {
    #[error("failed to read config file `{}`: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error(transparent)]
    Startup(#[from] ConfigError),
    #[error("rounds must be at least 1")]
    NoRounds,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DemoConfig {
    /// 每个调用方发起的调用次数。
    pub rounds: usize,
    /// 让模拟初始化步骤返回失败，用于观察服务永久未就绪的行为。
    pub simulate_failure: bool,
    pub startup: StartupConfig,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            rounds: 5,
            simulate_failure: false,
            startup: StartupConfig::default(),
        }
    }
}

impl DemoConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, DemoConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, DemoConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| DemoConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), DemoConfigError> {
        if self.rounds == 0 {
            return Err(DemoConfigError::NoRounds);
        }
        self.startup.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_startup_section_is_parsed() {
        let config = DemoConfig::from_toml_str(
            r#"
            rounds = 2
            [startup]
            setup_delay_ms = 10
            "#,
        )
        .expect("合法配置应解析成功");
        assert_eq!(config.rounds, 2);
        assert!(!config.simulate_failure);
        assert_eq!(config.startup.setup_delay_ms, 10);
    }

    #[test]
    fn zero_rounds_is_rejected() {
        let err = DemoConfig::from_toml_str("rounds = 0").expect_err("0 轮必须被拒绝");
        assert!(matches!(err, DemoConfigError::NoRounds));
    }

    #[test]
    fn startup_validation_is_applied() {
        let err = DemoConfig::from_toml_str("[startup]\nlog_filter = \"\"")
            .expect_err("空过滤表达式必须被拒绝");
        assert!(matches!(err, DemoConfigError::Startup(ConfigError::Invalid(_))));
    }
}
