//! CLI 命令处理模块
//!
//! 解析配置、构造 provider，然后把子命令分发给 poller、reaper 或 terminator

pub mod parser;

pub use parser::{Cli, Commands, GlobalArgs, PolicyArgs};

use crate::config::{PolicyConfig, WatchConfig};
use crate::convergence::{log_kit_processes, ConvergencePoller};
use crate::core::models::{KitSnapshot, ProcessId};
use crate::core::pid_set::ProcessIdSet;
use crate::error::{KitWardenError, PreconditionViolation};
use crate::provider::{supervisor_process_id, ProcessTableProvider};
use crate::reaper::Reaper;
use crate::terminator::{terminate_all, SigkillTerminator};
use crate::utils::ConfigPaths;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

/// Output of `status`
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub supervisor: ProcessId,
    pub kits: KitSnapshot,
}

/// Output of `kill`
#[derive(Debug, Clone, Serialize)]
pub struct KillReport {
    pub requested: ProcessIdSet,
}

/// Load the configuration the command runs with.
///
/// File (or defaults), then environment, then global flags. Subcommand flags
/// are applied by [`run`].
pub fn resolve_config(global: &GlobalArgs) -> Result<WatchConfig, KitWardenError> {
    let path = match &global.config {
        Some(path) => path.clone(),
        None => ConfigPaths::new()?.config_file,
    };
    let mut config = WatchConfig::load(&path)?;
    config.apply_env()?;

    if let Some(pid) = global.supervisor_pid {
        config.process_table.supervisor_pid = Some(pid);
    }
    if let Some(name) = &global.supervisor_name {
        config.process_table.supervisor_name = name.clone();
    }

    debug!(path = %path.display(), ?config, "Resolved configuration");
    Ok(config)
}

fn override_policy(base: PolicyConfig, args: &PolicyArgs) -> PolicyConfig {
    PolicyConfig::new(
        args.timeout_ms.unwrap_or(base.timeout_ms),
        args.retry_ms.unwrap_or(base.retry_ms),
    )
}

/// Execute one parsed command line.
pub fn run(cli: &Cli) -> Result<(), KitWardenError> {
    let config = resolve_config(&cli.global)?;
    let json = cli.global.json;

    match &cli.command {
        Commands::Status => {
            let provider = ProcessTableProvider::new(config.process_table);
            let supervisor = supervisor_process_id(&provider)?;
            let kits = log_kit_processes(&provider)?;
            let report = StatusReport { supervisor, kits };
            emit(json, &report, |report| {
                println!("Supervisor: {}", report.supervisor);
                println!("{}", report.kits.describe(None));
            });
        }

        Commands::Wait {
            policy,
            doc_kits,
            min_spare,
            max_spare,
        } => {
            let policy = override_policy(config.wait, policy).to_policy()?;
            let mut target = config.target;
            if let Some(doc_kits) = doc_kits {
                target.doc_kits = *doc_kits;
            }
            if let Some(min_spare) = min_spare {
                target.min_spare_kits = *min_spare;
            }
            if let Some(max_spare) = max_spare {
                target.max_spare_kits = Some(*max_spare);
            }

            let poller = ConvergencePoller::new(Arc::new(ProcessTableProvider::new(config.process_table)));
            let report = poller.wait_for_kit_pids_ready(&target, &policy)?;
            emit(json, &report, |report| report.print());
        }

        Commands::Reap { policy } => {
            let policy = override_policy(config.reap, policy).to_policy()?;
            let reaper = Reaper::new(
                Arc::new(ProcessTableProvider::new(config.process_table)),
                SigkillTerminator,
            );
            let report = reaper.reap_all(&policy)?;
            emit(json, &report, |report| report.print());
        }

        Commands::Kill { pids } => {
            // Nothing is signalled unless every pid is valid
            let requested = pids
                .iter()
                .map(|raw| ProcessId::new(*raw))
                .collect::<Result<ProcessIdSet, PreconditionViolation>>()?;
            let count = terminate_all(&SigkillTerminator, &requested);
            info!(count, "Sent kill requests");
            emit(json, &KillReport { requested }, |report| {
                println!("Kill requested: {}", report.requested);
            });
        }
    }

    Ok(())
}

fn emit<T, F>(json: bool, value: &T, human: F)
where
    T: Serialize,
    F: FnOnce(&T),
{
    if !json {
        human(value);
        return;
    }
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{}", text),
        Err(err) => tracing::error!("Failed to serialize report: {}", err),
    }
}
