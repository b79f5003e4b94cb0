//! CLI 命令行参数解析
//!
//! 使用 clap 定义命令行接口并进行参数解析

use clap::{Args, Parser, Subcommand};
use std::ffi::OsString;
use std::path::PathBuf;

/// kitwarden - 检查 kit 进程收敛并回收 kit 进程
#[derive(Parser, Debug, Clone)]
#[command(
    name = "kitwarden",
    about = "Kit process convergence checker and reaper",
    version,
    disable_help_subcommand = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// 全局参数
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct GlobalArgs {
    /// 配置文件路径（默认 ~/.kitwarden/config.json）
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// 日志级别或过滤表达式（默认读取 RUST_LOG）
    #[arg(long, global = true, value_name = "FILTER")]
    pub log_level: Option<String>,

    /// 同时写入日志文件
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// 以 JSON 输出报告
    #[arg(long, global = true)]
    pub json: bool,

    /// 指定 supervisor 进程 PID（跳过按名称查找）
    #[arg(long, global = true, value_name = "PID", allow_negative_numbers = true)]
    pub supervisor_pid: Option<i64>,

    /// supervisor 进程名称
    #[arg(long, global = true, value_name = "NAME")]
    pub supervisor_name: Option<String>,
}

/// 超时与轮询间隔覆盖
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyArgs {
    /// 总超时（毫秒）
    #[arg(long = "timeout-ms", value_name = "MS")]
    pub timeout_ms: Option<u64>,

    /// 轮询间隔（毫秒）
    #[arg(long = "retry-ms", value_name = "MS")]
    pub retry_ms: Option<u64>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// 显示当前的 kit 进程
    Status,

    /// 等待 kit 进程达到期望数量
    Wait {
        #[command(flatten)]
        policy: PolicyArgs,

        /// 期望的文档 kit 数量（精确匹配）
        #[arg(long = "doc-kits", value_name = "N")]
        doc_kits: Option<usize>,

        /// 最少空闲 kit 数量
        #[arg(long = "min-spare", value_name = "N")]
        min_spare: Option<usize>,

        /// 最多空闲 kit 数量
        #[arg(long = "max-spare", value_name = "N")]
        max_spare: Option<usize>,
    },

    /// 杀掉所有 kit 进程并等待它们退出
    Reap {
        #[command(flatten)]
        policy: PolicyArgs,
    },

    /// 向指定进程发送 SIGKILL
    Kill {
        /// 进程 PID（必须 > 0）
        #[arg(value_name = "PID", required = true, allow_negative_numbers = true)]
        pids: Vec<i64>,
    },
}

impl Cli {
    /// 尝试解析命令行参数（用于测试或自定义 argv）
    pub fn try_parse_args_from<I, T>(iter: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        Cli::try_parse_from(iter)
    }
}
