//! 配置路径管理
//!
//! 持久化配置保存在 ~/.kitwarden/config.json，日志文件只在传入 `--log-file` 时写入

use crate::config::{CONFIG_DIRECTORY, CONFIG_FILE_NAME};
use crate::error::ConfigError;
use std::path::PathBuf;

/// 配置文件路径集合
#[derive(Debug, Clone)]
pub struct ConfigPaths {
    /// 持久化配置目录（~/.kitwarden/）
    pub config_dir: PathBuf,
    /// 主配置文件
    pub config_file: PathBuf,
}

impl ConfigPaths {
    pub fn new() -> Result<Self, ConfigError> {
        let home_dir = dirs::home_dir().ok_or(ConfigError::NoHomeDirectory)?;
        Ok(Self::under(home_dir))
    }

    /// 以指定的 home 目录为根
    pub fn under(home_dir: PathBuf) -> Self {
        let config_dir = home_dir.join(CONFIG_DIRECTORY);
        Self {
            config_file: config_dir.join(CONFIG_FILE_NAME),
            config_dir,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_under_home() {
        let paths = ConfigPaths::under(PathBuf::from("/home/ci"));
        assert_eq!(paths.config_dir, PathBuf::from("/home/ci/.kitwarden"));
        assert_eq!(paths.config_file, PathBuf::from("/home/ci/.kitwarden/config.json"));
    }
}
