use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::BookError;
use crate::models::{DestinationTarget, ManagedRole};
use crate::scheduler::{BurstShape, Pacing, RunMode, SchedulerConfig};
use crate::supervisor::RoleCommand;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub scrape: ServerConfig,
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub destinations: Vec<DestinationTarget>,
    #[serde(default)]
    pub supervisor: SupervisorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Global wait before each destination, in seconds.
    pub interval_secs: u64,
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    /// Gap between probes inside one burst.
    #[serde(default = "default_probe_gap_ms")]
    pub probe_gap_ms: u64,
    #[serde(default)]
    pub mode: RunMode,
    #[serde(default)]
    pub pacing: Pacing,
    #[serde(default)]
    pub burst_shape: BurstShape,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Print a report block per destination to stdout.
    #[serde(default = "default_console_report")]
    pub console_report: bool,
}

fn default_probe_timeout_ms() -> u64 {
    1000
}

fn default_probe_gap_ms() -> u64 {
    1000
}

fn default_concurrency() -> usize {
    1
}

fn default_console_report() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorConfig {
    #[serde(default = "default_stop_timeout_secs")]
    pub stop_timeout_secs: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics_backend: Option<RoleCommand>,
    /// Defaults to this executable's `collect` subcommand.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collector: Option<RoleCommand>,
}

fn default_stop_timeout_secs() -> u64 {
    5
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            stop_timeout_secs: default_stop_timeout_secs(),
            metrics_backend: None,
            collector: None,
        }
    }
}

impl SupervisorConfig {
    /// Launch commands per role. `config_path` is handed to the default collector.
    pub fn commands(
        &self,
        config_path: &Path,
    ) -> anyhow::Result<BTreeMap<ManagedRole, RoleCommand>> {
        let mut commands = BTreeMap::new();
        if let Some(cmd) = &self.metrics_backend {
            commands.insert(ManagedRole::MetricsBackend, cmd.clone());
        }
        let collector = match &self.collector {
            Some(cmd) => cmd.clone(),
            None => {
                let exe = std::env::current_exe()?;
                RoleCommand::new(exe.to_string_lossy())
                    .arg("--config")
                    .arg(config_path.to_string_lossy())
                    .arg("collect")
            }
        };
        commands.insert(ManagedRole::Collector, collector);
        Ok(commands)
    }
}

impl MonitorConfig {
    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            mode: self.mode,
            pacing: self.pacing,
            burst_shape: self.burst_shape,
            concurrency: self.concurrency,
        }
    }
}

impl AppConfig {
    pub fn load_from_path(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("reading {}: {}", path.display(), e))?;
        Self::load_from_str(&s)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let mut config: AppConfig = toml::from_str(s)?;
        config.dedupe_destinations();
        config.validate()?;
        Ok(config)
    }

    /// Keeps one entry per address; a later duplicate replaces the earlier one in place.
    fn dedupe_destinations(&mut self) {
        let mut out: Vec<DestinationTarget> = Vec::with_capacity(self.destinations.len());
        for target in self.destinations.drain(..) {
            match out.iter_mut().find(|t| t.address == target.address) {
                Some(existing) => {
                    tracing::warn!(
                        address = %target.address,
                        "duplicate destination; keeping last entry"
                    );
                    *existing = target;
                }
                None => out.push(target),
            }
        }
        self.destinations = out;
    }

    // Destination entries are not rejected here: the scheduler skips bad ones.
    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.server.port > 0,
            "server.port must be between 1 and 65535, got {}",
            self.server.port
        );
        anyhow::ensure!(
            !self.server.host.is_empty(),
            "server.host must be non-empty"
        );
        anyhow::ensure!(
            self.scrape.port > 0,
            "scrape.port must be between 1 and 65535, got {}",
            self.scrape.port
        );
        anyhow::ensure!(
            !self.scrape.host.is_empty(),
            "scrape.host must be non-empty"
        );
        anyhow::ensure!(
            self.monitor.probe_timeout_ms > 0,
            "monitor.probe_timeout_ms must be > 0, got {}",
            self.monitor.probe_timeout_ms
        );
        anyhow::ensure!(
            self.monitor.concurrency > 0,
            "monitor.concurrency must be > 0, got {}",
            self.monitor.concurrency
        );
        anyhow::ensure!(
            self.supervisor.stop_timeout_secs > 0,
            "supervisor.stop_timeout_secs must be > 0, got {}",
            self.supervisor.stop_timeout_secs
        );
        for (role, cmd) in [
            ("metrics_backend", &self.supervisor.metrics_backend),
            ("collector", &self.supervisor.collector),
        ] {
            if let Some(cmd) = cmd {
                anyhow::ensure!(
                    !cmd.program.is_empty(),
                    "supervisor.{}.program must be non-empty",
                    role
                );
            }
        }
        Ok(())
    }
}

/// Result of [`DestinationBook::add`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddOutcome {
    Added,
    Updated,
}

/// Editable destination list and global interval, persisted back to the config file.
#[derive(Debug, Clone)]
pub struct DestinationBook {
    path: PathBuf,
    config: AppConfig,
}

impl DestinationBook {
    pub fn open(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();
        let config = AppConfig::load_from_path(&path)?;
        Ok(Self { path, config })
    }

    pub fn from_config(config: AppConfig, path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            config,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn destinations(&self) -> &[DestinationTarget] {
        &self.config.destinations
    }

    pub fn interval_secs(&self) -> u64 {
        self.config.monitor.interval_secs
    }

    /// Inserts or, for a known address, updates in place. Never duplicates.
    pub fn add(&mut self, target: DestinationTarget) -> Result<AddOutcome, BookError> {
        let address = target.address.trim().to_string();
        if address.is_empty() {
            return Err(BookError::Invalid(
                "destination address must be non-empty".into(),
            ));
        }
        if target.probe_count == 0 {
            return Err(BookError::Invalid(format!(
                "probe count must be a positive integer, got {}",
                target.probe_count
            )));
        }
        let target = DestinationTarget { address, ..target };

        let mut next = self.config.clone();
        let outcome = match next
            .destinations
            .iter_mut()
            .find(|t| t.address == target.address)
        {
            Some(existing) => {
                *existing = target;
                AddOutcome::Updated
            }
            None => {
                next.destinations.push(target);
                AddOutcome::Added
            }
        };
        self.commit(next)?;
        Ok(outcome)
    }

    pub fn update_interval(&mut self, interval_secs: u64) -> Result<(), BookError> {
        let mut next = self.config.clone();
        next.monitor.interval_secs = interval_secs;
        self.commit(next)
    }

    /// Returns `false` when the address was not present.
    pub fn remove(&mut self, address: &str) -> Result<bool, BookError> {
        let mut next = self.config.clone();
        next.destinations.retain(|t| t.address != address);
        if next.destinations.len() == self.config.destinations.len() {
            return Ok(false);
        }
        self.commit(next)?;
        Ok(true)
    }

    // The in-memory config only changes once the file is written.
    fn commit(&mut self, next: AppConfig) -> Result<(), BookError> {
        write_config(&self.path, &next)?;
        self.config = next;
        Ok(())
    }
}

/// Writes through a temp file and rename so readers never see a partial file.
fn write_config(path: &Path, config: &AppConfig) -> Result<(), BookError> {
    let body = toml::to_string_pretty(config)?;
    let mut tmp = path.to_path_buf().into_os_string();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    let persist = |source| BookError::Persist {
        path: path.to_path_buf(),
        source,
    };
    std::fs::write(&tmp, body).map_err(persist)?;
    std::fs::rename(&tmp, path).map_err(persist)?;
    tracing::debug!(path = %path.display(), "configuration saved");
    Ok(())
}
