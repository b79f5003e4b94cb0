//! 收敛与清理报告
//!
//! poller 和 reaper 成功时返回，可直接打印，也可序列化为 JSON 供测试框架归档

use crate::core::models::{ConvergenceTarget, KitSnapshot};
use crate::core::pid_set::ProcessIdSet;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

/// 等待报告
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WaitReport {
    pub label: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub attempts: u32,
    pub sleeps: u32,
    pub elapsed_ms: u64,
    /// State seen by the successful attempt
    pub observed: KitSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<ConvergenceTarget>,
    /// Spare kits above the target minimum
    pub surplus_spare_kits: usize,
}

impl WaitReport {
    pub fn elapsed(&self) -> Duration {
        Duration::from_millis(self.elapsed_ms)
    }

    /// 打印报告
    pub fn print(&self) {
        println!("\n=== Kit Convergence Report ===");
        println!("Condition: {}", self.label);
        println!("Attempts: {} ({} sleeps)", self.attempts, self.sleeps);
        println!("Duration: {:.3}s", self.elapsed().as_secs_f64());
        println!("Kits: {}", self.observed.describe(self.target.as_ref()));

        if self.surplus_spare_kits > 0 {
            println!(
                "⚠️  {} more spare kit(s) than wanted; system may be too slow",
                self.surplus_spare_kits
            );
        }
        println!();
    }
}

/// 清理报告
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReapReport {
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub attempts: u32,
    pub sleeps: u32,
    pub elapsed_ms: u64,
    /// Kits alive when reaping started
    pub before: ProcessIdSet,
    /// Kits alive at the final check; replacements spawned meanwhile show up here
    pub current: ProcessIdSet,
    pub kill_requests: usize,
}

impl ReapReport {
    pub fn elapsed(&self) -> Duration {
        Duration::from_millis(self.elapsed_ms)
    }

    /// 打印报告
    pub fn print(&self) {
        println!("\n=== Kit Reap Report ===");
        println!("Killed: {} ({} kill requests)", self.before, self.kill_requests);
        println!("Attempts: {} ({} sleeps)", self.attempts, self.sleeps);
        println!("Duration: {:.3}s", self.elapsed().as_secs_f64());
        if self.current.is_empty() {
            println!("✓ No kit processes left");
        } else {
            println!("Kits alive now (none from before): {}", self.current);
        }
        println!();
    }
}

pub(crate) fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
