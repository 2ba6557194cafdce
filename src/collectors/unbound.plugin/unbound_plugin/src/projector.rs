//! Projection of the stats map onto the chart set.

use crate::schema::ChartDefinition;
use crate::stats::StatsMap;

/// A line value ready to be emitted.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectedLine {
    /// Dimension id (the stats key)
    pub id: &'static str,
    /// Display label
    pub name: &'static str,
    pub value: f64,
}

/// The values of one chart for one cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartUpdate {
    pub chart: &'static ChartDefinition,
    pub lines: Vec<ProjectedLine>,
}

impl ChartUpdate {
    /// Value of the line with the given display label.
    pub fn value_of(&self, name: &str) -> Option<f64> {
        self.lines.iter().find(|l| l.name == name).map(|l| l.value)
    }
}

/// Project `map` onto every chart in `charts`, keeping chart order.
///
/// Lines whose key is missing from the map, or whose value is not numeric,
/// are left out of this cycle.
pub fn project(map: &StatsMap, charts: &'static [ChartDefinition]) -> Vec<ChartUpdate> {
    charts.iter().map(|chart| project_chart(map, chart)).collect()
}

/// Project `map` onto a single chart.
pub fn project_chart(map: &StatsMap, chart: &'static ChartDefinition) -> ChartUpdate {
    let mut lines = Vec::with_capacity(chart.lines.len());

    for line in chart.lines {
        let Some(raw) = map.get(line.key) else {
            continue;
        };

        match raw.as_f64() {
            Some(value) => lines.push(ProjectedLine {
                id: line.key,
                name: line.name,
                value: line.transform(value),
            }),
            None => {
                tracing::trace!(key = line.key, value = %raw, "skipping non-numeric value");
            }
        }
    }

    ChartUpdate { chart, lines }
}
