//! 工具模块
//!
//! 日志初始化与配置路径

pub mod config_paths;
pub mod logger;

pub use config_paths::ConfigPaths;
pub use logger::init_logger;
