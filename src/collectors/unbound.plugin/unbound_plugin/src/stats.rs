//! Parser for the `key=value` text printed by `unbound-control stats_noreset`.
//!
//! Parsing never fails on individual lines. Anything that is not a usable
//! `key=value` pair is skipped and the key keeps whatever value it had in a
//! previous cycle.

use std::collections::HashMap;
use std::fmt;

use crate::schema::GLOBAL_METRICS;

/// The raw value token of a statistic, kept as text until a chart needs it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricValue(String);

impl MetricValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric interpretation of the token, `None` if it is not a finite number.
    pub fn as_f64(&self) -> Option<f64> {
        self.0.parse::<f64>().ok().filter(|v| v.is_finite())
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Statistic values by key, kept across collection cycles.
///
/// Keys are matched exactly. Entries are only ever inserted or overwritten.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatsMap {
    values: HashMap<String, MetricValue>,
}

impl StatsMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&MetricValue> {
        self.values.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: MetricValue) {
        self.values.insert(key.into(), value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetricValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Upsert every well-formed line. Returns the number of keys written.
    pub fn update_from_lines<I, L>(&mut self, lines: I) -> usize
    where
        I: IntoIterator<Item = L>,
        L: AsRef<str>,
    {
        let mut updated = 0;

        for line in lines {
            if let Some((key, value)) = parse_line(line.as_ref()) {
                match self.values.get_mut(key) {
                    Some(existing) => {
                        existing.0.clear();
                        existing.0.push_str(value);
                    }
                    None => {
                        self.values
                            .insert(key.to_string(), MetricValue::new(value));
                    }
                }
                updated += 1;
            }
        }

        updated
    }
}

/// A map holding every global key at zero.
pub fn initialize() -> StatsMap {
    let mut map = StatsMap::new();
    for key in GLOBAL_METRICS {
        map.insert(*key, MetricValue::new("0"));
    }
    map
}

/// Fold raw control output into `map`.
///
/// `None` means the output itself was unavailable; the map is left alone and
/// `None` is returned. Otherwise the same map is returned, even when no line
/// was usable.
pub fn parse<'m>(raw: Option<&str>, map: &'m mut StatsMap) -> Option<&'m mut StatsMap> {
    let raw = raw?;
    let updated = map.update_from_lines(raw.lines());
    tracing::trace!(updated, total = map.len(), "parsed stats output");
    Some(map)
}

/// Split one line into key and value token.
///
/// Splits on the first `=` only. The value is the first whitespace-delimited
/// token after trimming, so trailing text is dropped. An empty key is kept.
pub fn parse_line(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once('=')?;
    let key = key.trim();
    let value = value.split_whitespace().next()?;
    Some((key, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_line_takes_first_token() {
        assert_eq!(parse_line("a.b.c=42 ignored"), Some(("a.b.c", "42")));
        assert_eq!(parse_line("  a.b.c =  7.5 s  "), Some(("a.b.c", "7.5")));
    }

    #[test]
    fn test_parse_line_splits_on_first_equals() {
        assert_eq!(parse_line("a=b=c"), Some(("a", "b=c")));
    }

    #[test]
    fn test_parse_line_rejects_malformed() {
        assert_eq!(parse_line(""), None);
        assert_eq!(parse_line("no equals here"), None);
        assert_eq!(parse_line("a.b.c="), None);
        assert_eq!(parse_line("a.b.c=   "), None);
    }

    #[test]
    fn test_empty_key_is_stored() {
        assert_eq!(parse_line(" = 5"), Some(("", "5")));

        let mut map = StatsMap::new();
        parse(Some("=5"), &mut map).unwrap();
        assert_eq!(map.get("").map(|v| v.as_str()), Some("5"));
    }

    #[test]
    fn test_parse_updates_value() {
        let mut map = StatsMap::new();
        parse(Some("a.b.c=42 ignored"), &mut map).unwrap();
        assert_eq!(map.get("a.b.c").map(|v| v.as_str()), Some("42"));
    }

    #[test]
    fn test_malformed_lines_leave_map_unchanged() {
        let mut map = initialize();
        let before = map.clone();

        parse(Some("thread0 stats\n\n   \ngarbage line\n"), &mut map).unwrap();
        assert_eq!(map, before);
    }

    #[test]
    fn test_empty_value_keeps_previous() {
        let mut map = StatsMap::new();
        parse(Some("a.b.c=1"), &mut map).unwrap();
        parse(Some("a.b.c="), &mut map).unwrap();
        assert_eq!(map.get("a.b.c").map(|v| v.as_str()), Some("1"));
    }

    #[test]
    fn test_parse_is_idempotent() {
        let raw = "total.num.queries=100\nnum.query.type.A=3 extra\nbroken\n";

        let mut once = initialize();
        parse(Some(raw), &mut once).unwrap();

        let mut twice = initialize();
        parse(Some(raw), &mut twice).unwrap();
        parse(Some(raw), &mut twice).unwrap();

        assert_eq!(once, twice);
    }

    #[test]
    fn test_stale_keys_survive() {
        let mut map = StatsMap::new();
        parse(Some("num.query.type.MX=4\ntotal.num.queries=10"), &mut map).unwrap();
        parse(Some("total.num.queries=11"), &mut map).unwrap();

        assert_eq!(map.get("num.query.type.MX").map(|v| v.as_str()), Some("4"));
        assert_eq!(map.get("total.num.queries").map(|v| v.as_str()), Some("11"));
    }

    #[test]
    fn test_unavailable_input() {
        let mut map = initialize();
        let before = map.clone();

        assert!(parse(None, &mut map).is_none());
        assert_eq!(map, before);

        // no usable lines is still a successful parse
        assert!(parse(Some(""), &mut map).is_some());
    }

    #[test]
    fn test_keys_are_case_sensitive() {
        let mut map = StatsMap::new();
        parse(Some("num.query.type.A=1\nnum.query.type.a=2"), &mut map).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("num.query.type.A").map(|v| v.as_str()), Some("1"));
    }

    #[test]
    fn test_initialize_seeds_global_keys() {
        let map = initialize();
        assert_eq!(map.len(), GLOBAL_METRICS.len());
        assert!(map.iter().all(|(_, v)| v.as_f64() == Some(0.0)));
    }

    #[test]
    fn test_update_count() {
        let mut map = StatsMap::new();
        let updated = map.update_from_lines(["a=1", "b=", "c", "d=2 3"]);
        assert_eq!(updated, 2);
    }

    #[test]
    fn test_metric_value_coercion() {
        assert_eq!(MetricValue::new("42").as_f64(), Some(42.0));
        assert_eq!(MetricValue::new("0.000123").as_f64(), Some(0.000123));
        assert_eq!(MetricValue::new("n/a").as_f64(), None);
        assert_eq!(MetricValue::new("NaN").as_f64(), None);
    }
}
