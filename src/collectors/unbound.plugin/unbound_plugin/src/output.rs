//! Writer for the Netdata external plugin protocol.

use bytes::{BufMut, BytesMut};
use std::io::{self, Write};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::projector::ChartUpdate;
use crate::schema::ChartDefinition;

/// Fixed precision divisor for float-to-integer scaling.
///
/// SET values are integers. Values are multiplied by this divisor and
/// rounded, and every DIMENSION declares it, so the agent divides it back
/// out for display.
pub const PRECISION_DIVISOR: i64 = 1000;

/// Plugin name reported in chart definitions.
const PLUGIN_NAME: &str = "unbound.plugin";

/// Buffered writer for chart definitions and updates.
///
/// The buffer is reused across cycles and only grows when necessary.
pub struct ChartWriter {
    buffer: BytesMut,
}

impl ChartWriter {
    pub fn new() -> Self {
        Self::with_capacity(4096)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(capacity),
        }
    }

    /// Ask the agent to trust the durations sent with BEGIN/END.
    pub fn write_trust_durations(&mut self) {
        self.buffer.put_slice(b"TRUST_DURATIONS 1\n");
    }

    /// Write a chart definition (CHART + DIMENSION commands)
    pub fn write_chart_definition(
        &mut self,
        type_id: &str,
        chart: &ChartDefinition,
        priority: i64,
        update_every: Duration,
    ) {
        self.buffer.put_slice(b"CHART ");
        self.write_chart_id(type_id, chart.id);
        self.buffer.put_slice(b" '' '");
        self.write_quoted(chart.title);
        self.buffer.put_slice(b"' '");
        self.write_quoted(chart.units);
        self.buffer.put_slice(b"' '");
        self.write_quoted(chart.family);
        self.buffer.put_slice(b"' '");
        self.write_quoted(chart.context);
        self.buffer.put_slice(b"' ");
        self.buffer.put_slice(chart.chart_type.as_str().as_bytes());
        self.buffer.put_u8(b' ');
        self.write_i64(priority);
        self.buffer.put_u8(b' ');
        self.write_u64(update_every.as_secs().max(1));
        self.buffer.put_slice(b" '' '");
        self.buffer.put_slice(PLUGIN_NAME.as_bytes());
        self.buffer.put_slice(b"'\n");

        for line in chart.lines {
            self.buffer.put_slice(b"DIMENSION ");
            self.buffer.put_slice(line.key.as_bytes());
            self.buffer.put_slice(b" '");
            self.write_quoted(line.name);
            self.buffer.put_slice(b"' ");
            self.buffer.put_slice(line.algorithm.as_str().as_bytes());
            self.buffer.put_slice(b" 1 ");
            self.write_i64(PRECISION_DIVISOR);
            self.buffer.put_u8(b'\n');
        }
    }

    /// Write one chart update (BEGIN + SET for each projected line + END).
    ///
    /// BEGIN carries the collection interval in microseconds, END the
    /// collection time as a unix timestamp in seconds.
    pub fn write_update(
        &mut self,
        type_id: &str,
        update: &ChartUpdate,
        update_every: Duration,
        collection_time: SystemTime,
    ) {
        self.buffer.put_slice(b"BEGIN ");
        self.write_chart_id(type_id, update.chart.id);
        self.buffer.put_u8(b' ');
        self.write_u64(update_every.as_micros() as u64);
        self.buffer.put_u8(b'\n');

        for line in &update.lines {
            self.buffer.put_slice(b"SET ");
            self.buffer.put_slice(line.id.as_bytes());
            self.buffer.put_slice(b" = ");
            self.write_i64((line.value * PRECISION_DIVISOR as f64).round() as i64);
            self.buffer.put_u8(b'\n');
        }

        self.buffer.put_slice(b"END ");
        let secs = collection_time
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_secs();
        self.write_u64(secs);
        self.buffer.put_u8(b'\n');
    }

    /// Tell the agent to stop restarting this plugin.
    pub fn write_disable(&mut self) {
        self.buffer.put_slice(b"DISABLE\n");
    }

    fn write_chart_id(&mut self, type_id: &str, chart_id: &str) {
        self.buffer.put_slice(type_id.as_bytes());
        self.buffer.put_u8(b'.');
        self.buffer.put_slice(chart_id.as_bytes());
    }

    /// The protocol has no escaping, so single quotes become double quotes.
    fn write_quoted(&mut self, value: &str) {
        for &b in value.as_bytes() {
            self.buffer.put_u8(if b == b'\'' { b'"' } else { b });
        }
    }

    #[inline]
    fn write_i64(&mut self, value: i64) {
        let mut buf = itoa::Buffer::new();
        self.buffer.put_slice(buf.format(value).as_bytes());
    }

    #[inline]
    fn write_u64(&mut self, value: u64) {
        let mut buf = itoa::Buffer::new();
        self.buffer.put_slice(buf.format(value).as_bytes());
    }

    /// Write the buffered commands to `out` and clear the buffer.
    pub fn flush_to<W: Write>(&mut self, out: &mut W) -> io::Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        out.write_all(&self.buffer)?;
        out.flush()?;
        self.buffer.clear();
        Ok(())
    }

    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }
}

impl Default for ChartWriter {
    fn default() -> Self {
        Self::new()
    }
}
