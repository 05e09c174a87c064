//! 启动参数。
//!
//! # 契约说明（What）
//! - 以 TOML 表示，所有字段均有默认值，未知字段直接拒绝，避免拼写错误被静默忽略；
//! - [`StartupConfig::validate`] 在加载后执行，保证线程名与日志过滤表达式可用。
//!
//! ```toml
//! setup_delay_ms = 5000
//! init_thread_name = "postinit-init"
//! log_filter = "info,postinit=debug"
//! ```
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::initializer::DEFAULT_THREAD_NAME;

/// 配置加载与校验错误。
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file `{}`: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// 服务启动参数。
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StartupConfig {
    /// 模拟初始化步骤的耗时（毫秒）。
    pub setup_delay_ms: u64,
    /// 后台初始化线程名称。
    pub init_thread_name: String,
    /// `RUST_LOG` 未设置时使用的过滤表达式。
    pub log_filter: String,
}

impl Default for StartupConfig {
    fn default() -> Self {
        Self {
            setup_delay_ms: 5_000,
            init_thread_name: DEFAULT_THREAD_NAME.to_owned(),
            log_filter: "info".to_owned(),
        }
    }
}

impl StartupConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.init_thread_name.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "init_thread_name must not be empty".to_owned(),
            ));
        }
        // 线程名最终会转为 C 字符串。
        if self.init_thread_name.contains('\0') {
            return Err(ConfigError::Invalid(
                "init_thread_name must not contain NUL".to_owned(),
            ));
        }
        if self.log_filter.trim().is_empty() {
            return Err(ConfigError::Invalid("log_filter must not be empty".to_owned()));
        }
        Ok(())
    }

    pub fn setup_delay(&self) -> Duration {
        Duration::from_millis(self.setup_delay_ms)
    }
}
