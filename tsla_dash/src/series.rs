use crate::data::RawRow;
use crate::debug_hooks;
use crate::error::DataFormatError;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// LONG markers sit this far below the candle low, SHORT ones above the high.
const MARKER_OFFSET: f64 = 0.01;

#[derive(Debug, Clone, PartialEq)]
pub struct PricePoint {
    pub ts: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl PricePoint {
    pub fn is_bullish(&self) -> bool {
        self.close >= self.open
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelRange {
    pub lower: f64,
    pub upper: f64,
}

impl LevelRange {
    pub fn mid(&self) -> f64 {
        (self.lower + self.upper) / 2.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Band {
    pub ts: DateTime<Utc>,
    pub support: Option<LevelRange>,
    pub resistance: Option<LevelRange>,
}

impl Band {
    pub fn support_level(&self) -> Option<f64> {
        self.support.map(|r| r.mid())
    }

    pub fn resistance_level(&self) -> Option<f64> {
        self.resistance.map(|r| r.mid())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerKind {
    Long,
    Short,
}

impl MarkerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarkerKind::Long => "LONG",
            MarkerKind::Short => "SHORT",
        }
    }

    /// Anything but LONG / SHORT (blank, "None", "NEUTRAL", …) is no signal.
    pub fn from_cell(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LONG" => Some(MarkerKind::Long),
            "SHORT" => Some(MarkerKind::Short),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DirectionMarker {
    pub ts: DateTime<Utc>,
    /// Position of the candle this marker belongs to.
    pub index: usize,
    pub kind: MarkerKind,
    /// Where the marker is drawn.
    pub price: f64,
}

/// The full, validated series. Candles and bands are parallel; markers are
/// sparse and ordered by `index`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Series {
    candles: Vec<PricePoint>,
    bands: Vec<Band>,
    markers: Vec<DirectionMarker>,
}

#[derive(Debug, Clone, Copy)]
pub struct SeriesView<'a> {
    pub candles: &'a [PricePoint],
    pub bands: &'a [Band],
    pub markers: &'a [DirectionMarker],
}

impl<'a> SeriesView<'a> {
    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SeriesSummary {
    pub rows: usize,
    pub first_ts: DateTime<Utc>,
    pub last_ts: DateTime<Utc>,
    pub highest: (f64, DateTime<Utc>),
    pub lowest: (f64, DateTime<Utc>),
    pub last_close: f64,
    pub avg_volume: f64,
    pub longs: usize,
    pub shorts: usize,
}

impl Series {
    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn candles(&self) -> &[PricePoint] {
        &self.candles
    }

    pub fn bands(&self) -> &[Band] {
        &self.bands
    }

    pub fn markers(&self) -> &[DirectionMarker] {
        &self.markers
    }

    /// The first `cursor` rows (clamped).
    pub fn prefix(&self, cursor: usize) -> SeriesView<'_> {
        let n = cursor.min(self.candles.len());
        let m = self.markers.partition_point(|mk| mk.index < n);
        SeriesView {
            candles: &self.candles[..n],
            bands: &self.bands[..n],
            markers: &self.markers[..m],
        }
    }

    pub fn summary(&self) -> Option<SeriesSummary> {
        let first = self.candles.first()?;
        let last = self.candles.last()?;

        let mut highest = (first.high, first.ts);
        let mut lowest = (first.low, first.ts);
        let mut volume_sum = 0.0;
        for c in &self.candles {
            if c.high > highest.0 {
                highest = (c.high, c.ts);
            }
            if c.low < lowest.0 {
                lowest = (c.low, c.ts);
            }
            volume_sum += c.volume as f64;
        }

        let longs = self
            .markers
            .iter()
            .filter(|m| m.kind == MarkerKind::Long)
            .count();

        Some(SeriesSummary {
            rows: self.candles.len(),
            first_ts: first.ts,
            last_ts: last.ts,
            highest,
            lowest,
            last_close: last.close,
            avg_volume: volume_sum / self.candles.len() as f64,
            longs,
            shorts: self.markers.len() - longs,
        })
    }
}

/// Raw text rows in, chart-ready series out. Pure.
pub struct SeriesAdapter;

impl SeriesAdapter {
    pub fn adapt(rows: &[RawRow]) -> Result<Series, DataFormatError> {
        let mut candles = Vec::with_capacity(rows.len());
        let mut bands = Vec::with_capacity(rows.len());
        let mut markers = Vec::new();
        let mut prev_ts: Option<DateTime<Utc>> = None;

        for (index, raw) in rows.iter().enumerate() {
            let row = raw.row;

            let ts_cell = required(row, "timestamp", &raw.timestamp)?;
            let ts = parse_timestamp(ts_cell).ok_or_else(|| DataFormatError::InvalidTimestamp {
                row,
                value: ts_cell.to_string(),
            })?;
            if let Some(prev) = prev_ts {
                if ts <= prev {
                    return Err(DataFormatError::NonIncreasingTimestamp {
                        row,
                        previous: prev.to_rfc3339(),
                        current: ts.to_rfc3339(),
                    });
                }
            }
            prev_ts = Some(ts);

            let candle = PricePoint {
                ts,
                open: price(row, "open", &raw.open)?,
                high: price(row, "high", &raw.high)?,
                low: price(row, "low", &raw.low)?,
                close: price(row, "close", &raw.close)?,
                volume: volume(row, &raw.volume)?,
            };

            bands.push(Band {
                ts,
                support: level_range(row, "support", raw.support.as_deref())?,
                resistance: level_range(row, "resistance", raw.resistance.as_deref())?,
            });

            if let Some(kind) = raw.direction.as_deref().and_then(MarkerKind::from_cell) {
                let price = match kind {
                    MarkerKind::Long => candle.low * (1.0 - MARKER_OFFSET),
                    MarkerKind::Short => candle.high * (1.0 + MARKER_OFFSET),
                };
                markers.push(DirectionMarker {
                    ts,
                    index,
                    kind,
                    price,
                });
            }

            candles.push(candle);
        }

        let with_levels = bands
            .iter()
            .filter(|b| b.support.is_some() || b.resistance.is_some())
            .count();
        debug_hooks::log_series_adapted(candles.len(), with_levels, markers.len());

        Ok(Series {
            candles,
            bands,
            markers,
        })
    }
}

fn required<'a>(row: usize, field: &str, value: &'a Option<String>) -> Result<&'a str, DataFormatError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| DataFormatError::MissingField {
            row,
            field: field.to_string(),
        })
}

fn parse_number(row: usize, field: &str, s: &str) -> Result<f64, DataFormatError> {
    s.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| DataFormatError::InvalidNumber {
            row,
            field: field.to_string(),
            value: s.to_string(),
        })
}

fn price(row: usize, field: &str, value: &Option<String>) -> Result<f64, DataFormatError> {
    parse_number(row, field, required(row, field, value)?)
}

/// Integers, or integral floats such as `53230000.0`.
fn volume(row: usize, value: &Option<String>) -> Result<u64, DataFormatError> {
    let s = required(row, "volume", value)?;
    if let Ok(v) = s.parse::<u64>() {
        return Ok(v);
    }
    let invalid = || DataFormatError::InvalidNumber {
        row,
        field: "volume".to_string(),
        value: s.to_string(),
    };
    let v = s.parse::<f64>().map_err(|_| invalid())?;
    // 2^64 and above would saturate on the cast
    if v.is_finite() && v >= 0.0 && v.fract() == 0.0 && v < u64::MAX as f64 {
        Ok(v as u64)
    } else {
        Err(invalid())
    }
}

/// `241.5`, `[240.1, 242.3]`, `[]` or blank. Lists collapse to min..max.
fn level_range(row: usize, field: &str, cell: Option<&str>) -> Result<Option<LevelRange>, DataFormatError> {
    let Some(cell) = cell.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    if cell.eq_ignore_ascii_case("nan") || cell.eq_ignore_ascii_case("none") {
        return Ok(None);
    }

    let inner = cell
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .unwrap_or(cell);

    let mut range: Option<LevelRange> = None;
    for part in inner.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let v = parse_number(row, field, part)?;
        range = Some(match range {
            None => LevelRange { lower: v, upper: v },
            Some(r) => LevelRange {
                lower: r.lower.min(v),
                upper: r.upper.max(v),
            },
        });
    }
    Ok(range)
}

const OFFSET_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%z"];

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y"];

/// Naive timestamps are taken as UTC. Bare integers are unix seconds, or
/// milliseconds when they have 13+ digits.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.and_utc());
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return d.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
        }
    }
    if let Ok(n) = s.parse::<i64>() {
        return if n.unsigned_abs() >= 1_000_000_000_000 {
            DateTime::from_timestamp_millis(n)
        } else {
            DateTime::from_timestamp(n, 0)
        };
    }
    None
}
