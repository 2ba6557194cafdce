//! A collection job: the collector plus its schedule, retry budget and output.

use std::io::Write;
use std::time::{Duration, SystemTime};

use tracing::{debug, error, warn};

use crate::collector::{Collector, CollectorState};
use crate::control::StatsSource;
use crate::error::Result;
use crate::output::ChartWriter;
use crate::plugin_config::PluginConfig;

/// Scheduling settings of a job.
#[derive(Debug, Clone)]
pub struct JobSettings {
    /// Type part of the chart ids
    pub name: String,
    pub update_every: Duration,
    /// Consecutive failed cycles tolerated before disabling
    pub retries: u32,
    /// Priority of the first chart
    pub priority: i64,
}

impl From<&PluginConfig> for JobSettings {
    fn from(config: &PluginConfig) -> Self {
        Self {
            name: config.name.clone(),
            update_every: config.update_interval(),
            retries: config.retries,
            priority: config.priority,
        }
    }
}

/// Result of one scheduled cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Chart updates were written
    Emitted,
    /// The cycle failed, retries remain
    Skipped { failures: u32 },
    /// The retry budget is exhausted
    Disabled,
}

pub struct Job<S> {
    collector: Collector<S>,
    settings: JobSettings,
    writer: ChartWriter,
    failures: u32,
    disabled: bool,
}

impl<S: StatsSource> Job<S> {
    pub fn new(collector: Collector<S>, settings: JobSettings) -> Self {
        Self {
            collector,
            settings,
            writer: ChartWriter::new(),
            failures: 0,
            disabled: false,
        }
    }

    pub fn collector(&self) -> &Collector<S> {
        &self.collector
    }

    pub fn settings(&self) -> &JobSettings {
        &self.settings
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// Check the collector and write every chart definition.
    ///
    /// A failed check disables the job for good.
    pub async fn start(&mut self) -> Result<()> {
        if let Err(e) = self.collector.check().await {
            error!("job '{}' check failed: {}", self.settings.name, e);
            self.disabled = true;
            self.writer.write_disable();
            return Err(e);
        }

        self.writer.write_trust_durations();
        for (index, chart) in self.collector.charts().iter().enumerate() {
            self.writer.write_chart_definition(
                &self.settings.name,
                chart,
                self.settings.priority + index as i64,
                self.settings.update_every,
            );
        }
        Ok(())
    }

    /// Run one collection cycle and buffer its output.
    pub async fn tick(&mut self, now: SystemTime) -> TickOutcome {
        if self.disabled || self.collector.state() != CollectorState::Active {
            return TickOutcome::Disabled;
        }

        match self.collector.collect().await {
            Ok(updates) => {
                self.failures = 0;
                for update in &updates {
                    self.writer.write_update(
                        &self.settings.name,
                        update,
                        self.settings.update_every,
                        now,
                    );
                }
                debug!("emitted {} charts", updates.len());
                TickOutcome::Emitted
            }
            Err(e) => {
                self.failures += 1;
                if self.failures >= self.settings.retries {
                    error!(
                        "job '{}' failed {} times in a row, disabling: {}",
                        self.settings.name, self.failures, e
                    );
                    self.disabled = true;
                    self.writer.write_disable();
                    TickOutcome::Disabled
                } else {
                    warn!(
                        "collection failed ({}/{}): {}",
                        self.failures, self.settings.retries, e
                    );
                    TickOutcome::Skipped {
                        failures: self.failures,
                    }
                }
            }
        }
    }

    /// Write everything buffered so far to `out`.
    pub fn flush_to<W: Write>(&mut self, out: &mut W) -> std::io::Result<()> {
        self.writer.flush_to(out)
    }
}
