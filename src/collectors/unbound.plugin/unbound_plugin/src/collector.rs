//! Collection state machine: check once, then collect every cycle.

use tracing::{debug, info};

use crate::control::StatsSource;
use crate::error::{CollectorError, Result};
use crate::projector::{project, ChartUpdate};
use crate::schema::ChartDefinition;
use crate::stats::{self, StatsMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectorState {
    /// Not validated yet, or validation failed
    Unchecked,
    /// Validated, collecting every cycle
    Active,
}

/// Owns the stats source and the stats map carried across cycles.
pub struct Collector<S> {
    source: S,
    state: CollectorState,
    stats: StatsMap,
    charts: &'static [ChartDefinition],
}

impl<S: StatsSource> Collector<S> {
    pub fn new(source: S, charts: &'static [ChartDefinition]) -> Self {
        Self {
            source,
            state: CollectorState::Unchecked,
            stats: StatsMap::new(),
            charts,
        }
    }

    pub fn state(&self) -> CollectorState {
        self.state
    }

    pub fn stats(&self) -> &StatsMap {
        &self.stats
    }

    pub fn charts(&self) -> &'static [ChartDefinition] {
        self.charts
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Locate the source and run it once.
    ///
    /// Any error here is fatal for the job and leaves the collector
    /// `Unchecked`. On success the stats map is seeded and the collector
    /// becomes `Active`.
    pub async fn check(&mut self) -> Result<()> {
        self.source.locate()?;
        self.source.fetch().await?;

        self.stats = stats::initialize();
        self.state = CollectorState::Active;
        info!("collector is active, {} charts", self.charts.len());
        Ok(())
    }

    /// Run one collection cycle and project the result onto the chart set.
    ///
    /// A fetch failure is reported to the caller but keeps the collector
    /// `Active`.
    pub async fn collect(&mut self) -> Result<Vec<ChartUpdate>> {
        if self.state != CollectorState::Active {
            return Err(CollectorError::NotActive);
        }

        let fetched = self.source.fetch().await;
        match stats::parse(fetched.as_deref().ok(), &mut self.stats) {
            Some(stats) => debug!(known = stats.len(), "stats known after this cycle"),
            // no output this cycle, the map keeps its previous values
            None => fetched.map(drop)?,
        }

        Ok(project(&self.stats, self.charts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::CHARTS;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Replays queued outputs; `None` entries fail the fetch.
    struct ScriptedSource {
        found: bool,
        outputs: Mutex<Vec<Option<&'static str>>>,
    }

    impl ScriptedSource {
        fn new(found: bool, outputs: Vec<Option<&'static str>>) -> Self {
            Self {
                found,
                outputs: Mutex::new(outputs),
            }
        }
    }

    #[async_trait]
    impl StatsSource for ScriptedSource {
        fn locate(&mut self) -> Result<()> {
            if self.found {
                Ok(())
            } else {
                Err(CollectorError::BinaryNotFound {
                    name: String::from("unbound-control"),
                })
            }
        }

        async fn fetch(&self) -> Result<String> {
            let mut outputs = self.outputs.lock().unwrap();
            match outputs.remove(0) {
                Some(out) => Ok(out.to_string()),
                None => Err(CollectorError::CommandFailed {
                    command: String::from("unbound-control stats_noreset"),
                    status: String::from("exit status: 1"),
                    stderr: String::new(),
                }),
            }
        }
    }

    #[tokio::test]
    async fn test_missing_binary_stays_unchecked() {
        let mut collector = Collector::new(ScriptedSource::new(false, vec![]), CHARTS);

        let err = collector.check().await.unwrap_err();
        assert!(matches!(err, CollectorError::BinaryNotFound { .. }));
        assert_eq!(collector.state(), CollectorState::Unchecked);
    }

    #[tokio::test]
    async fn test_failed_validation_stays_unchecked() {
        let mut collector = Collector::new(ScriptedSource::new(true, vec![None]), CHARTS);

        assert!(collector.check().await.is_err());
        assert_eq!(collector.state(), CollectorState::Unchecked);
        assert!(matches!(
            collector.collect().await,
            Err(CollectorError::NotActive)
        ));
    }

    #[tokio::test]
    async fn test_check_seeds_stats() {
        let mut collector =
            Collector::new(ScriptedSource::new(true, vec![Some("total.num.queries=5")]), CHARTS);

        collector.check().await.unwrap();
        assert_eq!(collector.state(), CollectorState::Active);
        // validation output is not parsed
        assert_eq!(
            collector.stats().get("total.num.queries").map(|v| v.as_str()),
            Some("0")
        );
    }

    #[tokio::test]
    async fn test_collect_failure_keeps_active() {
        let source = ScriptedSource::new(
            true,
            vec![
                Some(""),
                Some("total.num.queries=100\nnum.query.tcp=4"),
                None,
                Some("total.num.queries=150"),
            ],
        );
        let mut collector = Collector::new(source, CHARTS);
        collector.check().await.unwrap();

        let updates = collector.collect().await.unwrap();
        let cache = updates.iter().find(|u| u.chart.id == "cache").unwrap();
        assert_eq!(cache.value_of("total queries"), Some(100.0));
        assert_eq!(cache.value_of("TCP"), Some(4.0));

        assert!(collector.collect().await.is_err());
        assert_eq!(collector.state(), CollectorState::Active);

        let updates = collector.collect().await.unwrap();
        let cache = updates.iter().find(|u| u.chart.id == "cache").unwrap();
        assert_eq!(cache.value_of("total queries"), Some(150.0));
        // stale value is kept
        assert_eq!(cache.value_of("TCP"), Some(4.0));
    }
}
