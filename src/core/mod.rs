//! 核心数据模块
//!
//! 进程ID、进程ID集合、重试策略与收敛目标

pub mod models;
pub mod pid_set;
