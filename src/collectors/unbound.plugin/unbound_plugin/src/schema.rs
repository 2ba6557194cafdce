//! Static description of the statistics `unbound-control` reports and of the
//! charts built from them.
//!
//! Key lists are documentation and seeding hints. Nothing here acts as an
//! allow-list: the parser keeps every key it sees, and the projector looks
//! lines up by presence in the stats map.

/// Whether a statistic is reported per worker thread or resolver-wide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Reported as `threadN.<key>` for each worker thread.
    Thread,
    /// Aggregated over all threads, or not thread related at all.
    Global,
}

/// Per-thread statistics, without the `threadN.` prefix.
pub const THREAD_METRICS: &[&str] = &[
    "num.queries",
    "num.queries_ip_ratelimited",
    "num.cachehits",
    "num.cachemiss",
    "num.dnscrypt.crypted",
    "num.dnscrypt.cert",
    "num.dnscrypt.cleartext",
    "num.dnscrypt.malformed",
    "num.prefetch",
    "num.zero_ttl",
    "num.recursivereplies",
    "requestlist.avg",
    "requestlist.max",
    "requestlist.overwritten",
    "requestlist.exceeded",
    "requestlist.current.all",
    "requestlist.current.user",
    "recursion.time.avg",
    "recursion.time.median",
    "tcpusage",
];

/// Resolver-wide statistics. All of them are seeded with zero on activation.
pub const GLOBAL_METRICS: &[&str] = &[
    // summed, averaged or maxed over threads
    "total.num.queries",
    "total.num.cachehits",
    "total.num.cachemiss",
    "total.num.dnscrypt.crypted",
    "total.num.dnscrypt.cert",
    "total.num.dnscrypt.cleartext",
    "total.num.dnscrypt.malformed",
    "total.num.prefetch",
    "total.num.zero_ttl",
    "total.num.recursivereplies",
    "total.requestlist.avg",
    "total.requestlist.max",
    "total.requestlist.overwritten",
    "total.requestlist.exceeded",
    "total.requestlist.current.all",
    "total.recursion.time.median",
    "total.tcpusage",
    // clock
    "time.now",
    "time.up",
    "time.elapsed",
    // memory, in bytes
    "mem.cache.rrset",
    "mem.cache.message",
    "mem.cache.dnscrypt_shared_secret",
    "mem.cache.dnscrypt_nonce",
    "mem.mod.iterator",
    "mem.mod.validator",
    // query types; only types that received queries are printed
    "num.query.type.A",
    "num.query.type.AAAA",
    "num.query.type.CNAME",
    "num.query.type.MX",
    "num.query.type.NS",
    "num.query.type.PTR",
    "num.query.type.SOA",
    "num.query.type.SRV",
    "num.query.type.TXT",
    "num.query.type.other",
    "num.query.class.IN",
    "num.query.opcode.QUERY",
    "num.query.tcp",
    "num.query.tcpout",
    "num.query.ipv6",
    "num.query.flags.RD",
    "num.query.flags.QR",
    "num.query.flags.AA",
    "num.query.flags.TC",
    "num.query.flags.RA",
    "num.query.flags.Z",
    "num.query.flags.AD",
    "num.query.flags.CD",
    "num.query.edns.present",
    "num.query.edns.DO",
    "num.query.ratelimited",
    "num.query.dnscrypt.shared_secret.cachemiss",
    "num.query.dnscrypt.replay",
    "num.answer.rcode.NXDOMAIN",
    "num.answer.rcode.nodata",
    "num.answer.secure",
    "num.answer.bogus",
    "num.rrset.bogus",
    "unwanted.queries",
    "unwanted.replies",
    // cache item counts
    "msg.cache.count",
    "rrset.cache.count",
    "infra.cache.count",
    "key.cache.count",
    "dnscrypt_shared_secret.cache.count",
    "dnscrypt_nonce.cache.count",
];

/// Enumerate the declared keys of a scope.
pub fn metric_keys(scope: Scope) -> &'static [&'static str] {
    match scope {
        Scope::Thread => THREAD_METRICS,
        Scope::Global => GLOBAL_METRICS,
    }
}

/// Chart type hint passed to the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChartType {
    #[default]
    Line,
    Area,
    Stacked,
}

impl ChartType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChartType::Line => "line",
            ChartType::Area => "area",
            ChartType::Stacked => "stacked",
        }
    }
}

/// How the agent treats the values of a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DimensionAlgorithm {
    /// Store the value as-is
    #[default]
    Absolute,
}

impl DimensionAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            DimensionAlgorithm::Absolute => "absolute",
        }
    }
}

/// One plotted series, bound to exactly one stats key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineDefinition {
    /// Stats key, also used as the dimension id
    pub key: &'static str,
    /// Display label
    pub name: &'static str,
    pub algorithm: DimensionAlgorithm,
    pub multiplier: i64,
    pub divisor: i64,
}

impl LineDefinition {
    /// A line passing the raw value through unchanged.
    pub const fn absolute(key: &'static str, name: &'static str) -> Self {
        Self::scaled(key, name, 1, 1)
    }

    /// A line whose value is `raw * multiplier / divisor`.
    pub const fn scaled(
        key: &'static str,
        name: &'static str,
        multiplier: i64,
        divisor: i64,
    ) -> Self {
        Self {
            key,
            name,
            algorithm: DimensionAlgorithm::Absolute,
            multiplier,
            divisor,
        }
    }

    /// Apply the unit conversion of this line to a raw value.
    pub fn transform(&self, raw: f64) -> f64 {
        let divisor = if self.divisor == 0 { 1 } else { self.divisor };
        raw * self.multiplier as f64 / divisor as f64
    }
}

/// A named, ordered group of lines shown together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartDefinition {
    /// Chart id, prefixed with the job name when emitted
    pub id: &'static str,
    pub title: &'static str,
    pub units: &'static str,
    pub family: &'static str,
    pub context: &'static str,
    pub chart_type: ChartType,
    pub lines: &'static [LineDefinition],
}

/// The chart set, in display order.
pub const CHARTS: &[ChartDefinition] = &[
    ChartDefinition {
        id: "answers",
        title: "Answers",
        units: "count",
        family: "answers",
        context: "unbound.answers",
        chart_type: ChartType::Line,
        lines: &[
            // not part of GLOBAL_METRICS, printed by the resolver anyway
            LineDefinition::absolute("num.answer.rcode.NOERROR", "NOERROR"),
            LineDefinition::absolute("num.answer.rcode.SERVFAIL", "SERVFAIL"),
            LineDefinition::absolute("num.answer.rcode.NXDOMAIN", "NXDOMAIN"),
            LineDefinition::absolute("num.answer.rcode.nodata", "nodata"),
            LineDefinition::absolute("num.answer.secure", "answer secure"),
            LineDefinition::absolute("num.answer.bogus", "answer bogus"),
            LineDefinition::absolute("num.rrset.bogus", "rrsets bogus"),
        ],
    },
    ChartDefinition {
        id: "num_queries",
        title: "By type",
        units: "count",
        family: "queries",
        context: "unbound.num_queries",
        chart_type: ChartType::Stacked,
        lines: &[
            LineDefinition::absolute("num.query.type.A", "A"),
            LineDefinition::absolute("num.query.type.AAAA", "AAAA"),
            LineDefinition::absolute("num.query.type.CNAME", "CNAME"),
            LineDefinition::absolute("num.query.type.MX", "MX"),
            LineDefinition::absolute("num.query.type.NS", "NS"),
            LineDefinition::absolute("num.query.type.PTR", "PTR"),
            LineDefinition::absolute("num.query.type.SOA", "SOA"),
            LineDefinition::absolute("num.query.type.SRV", "SRV"),
            LineDefinition::absolute("num.query.type.TXT", "TXT"),
            LineDefinition::absolute("num.query.type.other", "other"),
        ],
    },
    ChartDefinition {
        id: "num_queries_flags",
        title: "By flag",
        units: "count",
        family: "queries",
        context: "unbound.num_queries_flags",
        chart_type: ChartType::Line,
        lines: &[
            LineDefinition::absolute("num.query.flags.QR", "query reply"),
            LineDefinition::absolute("num.query.flags.AA", "auth answer"),
            LineDefinition::absolute("num.query.flags.TC", "truncated"),
            LineDefinition::absolute("num.query.flags.RD", "recursion desired"),
            LineDefinition::absolute("num.query.flags.RA", "rec available"),
            LineDefinition::absolute("num.query.flags.Z", "zero"),
            LineDefinition::absolute("num.query.flags.AD", "auth data"),
            LineDefinition::absolute("num.query.flags.CD", "check disabled"),
            LineDefinition::absolute("num.query.edns.present", "EDNS OPT present"),
            LineDefinition::absolute("num.query.edns.DO", "DNSSEC OK"),
        ],
    },
    ChartDefinition {
        id: "memory",
        title: "Memory",
        units: "KB",
        family: "memory",
        context: "unbound.memory",
        chart_type: ChartType::Stacked,
        lines: &[
            LineDefinition::scaled("mem.cache.rrset", "RRset cache", 1, 1024),
            LineDefinition::scaled("mem.cache.message", "Messages cache", 1, 1024),
            LineDefinition::scaled(
                "mem.cache.dnscrypt_shared_secret",
                "dnscrypt shared secret",
                1,
                1024,
            ),
            LineDefinition::scaled("mem.cache.dnscrypt_nonce", "dnscrypt nonce", 1, 1024),
            LineDefinition::scaled("mem.mod.iterator", "Iterator", 1, 1024),
            LineDefinition::scaled("mem.mod.validator", "Validator", 1, 1024),
        ],
    },
    ChartDefinition {
        id: "cache",
        title: "Unwanted",
        units: "count",
        family: "totals",
        context: "unbound.totals",
        chart_type: ChartType::Line,
        lines: &[
            LineDefinition::absolute("total.num.queries", "total queries"),
            LineDefinition::absolute("total.num.cachehits", "cache hits"),
            LineDefinition::absolute("total.requestlist.overwritten", "requestlist overwritten"),
            LineDefinition::absolute("total.requestlist.exceeded", "requestlist exceeded"),
            LineDefinition::absolute("unwanted.queries", "unwanted queries"),
            LineDefinition::absolute("unwanted.replies", "unwanted replies"),
            LineDefinition::absolute("num.query.tcp", "TCP"),
            LineDefinition::absolute("num.query.ipv6", "IPv6"),
        ],
    },
];

/// Look a chart up by its (unprefixed) id.
pub fn chart(id: &str) -> Option<&'static ChartDefinition> {
    CHARTS.iter().find(|c| c.id == id)
}
