//! Process table provider
//!
//! Derives the kit population from the OS process table.
//!
//! - The supervisor is either a configured pid (checked alive) or the lowest
//!   pid whose process name equals `supervisor_name`.
//! - Kits are direct children of the supervisor whose process name starts
//!   with `spare_prefix` (idle) or `doc_prefix` (serving a document).
//! - Zombies count as dead: a kit that has exited but not yet been reaped
//!   by its parent is gone as far as convergence is concerned.
//!
//! Every query re-reads the table. Processes that exit while the table is
//! being read are skipped.

use crate::config::{DEFAULT_DOC_PREFIX, DEFAULT_SPARE_PREFIX, DEFAULT_SUPERVISOR_NAME};
use crate::core::models::ProcessId;
use crate::core::pid_set::ProcessIdSet;
use crate::error::{ProviderError, ProviderResult};
use crate::platform;
use crate::provider::PidSetProvider;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessTableConfig {
    /// Process name of the kit supervisor
    pub supervisor_name: String,
    /// Explicit supervisor pid; takes precedence over the name lookup
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supervisor_pid: Option<i64>,
    /// Name prefix of idle kits
    pub spare_prefix: String,
    /// Name prefix of kits bound to a document
    pub doc_prefix: String,
}

impl Default for ProcessTableConfig {
    fn default() -> Self {
        Self {
            supervisor_name: DEFAULT_SUPERVISOR_NAME.to_string(),
            supervisor_pid: None,
            spare_prefix: DEFAULT_SPARE_PREFIX.to_string(),
            doc_prefix: DEFAULT_DOC_PREFIX.to_string(),
        }
    }
}

/// One row of the process table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessEntry {
    pub pid: i64,
    pub ppid: Option<i64>,
    pub name: String,
    pub zombie: bool,
}

/// Kits found under one supervisor in one table read
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KitPopulation {
    pub spare: ProcessIdSet,
    pub doc: ProcessIdSet,
}

impl KitPopulation {
    pub fn all(&self) -> ProcessIdSet {
        self.spare.union(&self.doc)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProcessTableProvider {
    config: ProcessTableConfig,
}

impl ProcessTableProvider {
    pub fn new(config: ProcessTableConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ProcessTableConfig {
        &self.config
    }

    fn population(&self) -> ProviderResult<KitPopulation> {
        let table = read_process_table()?;
        let supervisor = match self.config.supervisor_pid {
            Some(raw) => self.check_configured_supervisor(raw)?,
            None => locate_supervisor(&table, &self.config.supervisor_name)?,
        };
        let supervisor = ProcessId::for_role("supervisor", supervisor)?;
        let population = classify(&table, supervisor, &self.config)?;
        debug!(
            supervisor = %supervisor,
            spare = %population.spare,
            doc = %population.doc,
            "Scanned process table"
        );
        Ok(population)
    }

    fn check_configured_supervisor(&self, raw: i64) -> ProviderResult<i64> {
        // Non-positive pids are handed back untouched so callers see the
        // precondition violation rather than a lookup failure.
        let Ok(pid) = ProcessId::for_role("supervisor", raw) else {
            return Ok(raw);
        };
        if platform::process_alive(pid) {
            Ok(raw)
        } else {
            Err(ProviderError::SupervisorNotFound(format!(
                "configured supervisor pid {} is not running",
                raw
            )))
        }
    }
}

impl PidSetProvider for ProcessTableProvider {
    fn all_kit_pids(&self) -> ProviderResult<ProcessIdSet> {
        Ok(self.population()?.all())
    }

    fn spare_kit_pids(&self) -> ProviderResult<ProcessIdSet> {
        Ok(self.population()?.spare)
    }

    fn doc_kit_pids(&self) -> ProviderResult<ProcessIdSet> {
        Ok(self.population()?.doc)
    }

    fn supervisor_pid(&self) -> ProviderResult<i64> {
        match self.config.supervisor_pid {
            Some(raw) => self.check_configured_supervisor(raw),
            None => locate_supervisor(&read_process_table()?, &self.config.supervisor_name),
        }
    }
}

/// Lowest live pid whose name is exactly `name`.
pub fn locate_supervisor(table: &[ProcessEntry], name: &str) -> ProviderResult<i64> {
    let mut candidates: Vec<i64> = table
        .iter()
        .filter(|entry| !entry.zombie && entry.name == name)
        .map(|entry| entry.pid)
        .collect();
    candidates.sort_unstable();

    match candidates.as_slice() {
        [] => Err(ProviderError::SupervisorNotFound(format!(
            "no process named '{}'",
            name
        ))),
        [only] => Ok(*only),
        [first, rest @ ..] => {
            debug!(
                supervisor_name = name,
                chosen = first,
                others = ?rest,
                "Multiple supervisor candidates, using the lowest pid"
            );
            Ok(*first)
        }
    }
}

/// Split the supervisor's live children into spare and document kits.
pub fn classify(
    table: &[ProcessEntry],
    supervisor: ProcessId,
    config: &ProcessTableConfig,
) -> ProviderResult<KitPopulation> {
    let parent = i64::from(supervisor.as_raw());
    let mut population = KitPopulation::default();

    for entry in table {
        if entry.zombie || entry.ppid != Some(parent) {
            continue;
        }
        if !config.spare_prefix.is_empty() && entry.name.starts_with(&config.spare_prefix) {
            population.spare.insert(ProcessId::new(entry.pid)?);
        } else if !config.doc_prefix.is_empty() && entry.name.starts_with(&config.doc_prefix) {
            population.doc.insert(ProcessId::new(entry.pid)?);
        }
    }

    Ok(population)
}

#[cfg(unix)]
fn read_process_table() -> ProviderResult<Vec<ProcessEntry>> {
    use psutil::process::{processes, Status};

    let listed = processes().map_err(|err| ProviderError::ProcessTable(err.to_string()))?;
    let mut table = Vec::with_capacity(listed.len());

    for result in listed {
        let Ok(process) = result else {
            continue;
        };
        let (Ok(name), Ok(ppid)) = (process.name(), process.ppid()) else {
            continue;
        };
        let zombie = matches!(process.status(), Ok(Status::Zombie) | Ok(Status::Dead));
        table.push(ProcessEntry {
            pid: i64::from(process.pid()),
            ppid: ppid.map(i64::from),
            name,
            zombie,
        });
    }

    Ok(table)
}

#[cfg(not(unix))]
fn read_process_table() -> ProviderResult<Vec<ProcessEntry>> {
    Err(ProviderError::UnsupportedPlatform)
}
