//! Chart primitives for the visible part of a replay.
//!
//! `build_frame` is a pure function of the series and the replay cursor; the
//! terminal layer only draws what it returns.

use crate::replay::ReplayController;
use crate::series::{Band, LevelRange, MarkerKind, Series};
use chrono::{DateTime, Utc};

const PRICE_PAD: f64 = 0.02;
const PRICE_TICKS: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct CandleGlyph {
    /// Absolute row index in the series.
    pub x: f64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub bullish: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandColumn {
    pub x: f64,
    pub lower: f64,
    pub upper: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarkerGlyph {
    pub x: f64,
    pub price: f64,
    pub kind: MarkerKind,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AxisTick {
    pub value: f64,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChartFrame {
    pub candles: Vec<CandleGlyph>,
    pub support: Vec<BandColumn>,
    pub resistance: Vec<BandColumn>,
    pub markers: Vec<MarkerGlyph>,
    pub x_bounds: [f64; 2],
    pub y_bounds: [f64; 2],
    pub price_ticks: Vec<AxisTick>,
    pub time_ticks: Vec<AxisTick>,
    pub status: String,
}

impl ChartFrame {
    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }
}

/// Closed outline of a band: upper edge left to right, lower edge back.
pub fn band_polygon(columns: &[BandColumn]) -> Vec<(f64, f64)> {
    let mut out: Vec<(f64, f64)> = columns.iter().map(|c| (c.x, c.upper)).collect();
    out.extend(columns.iter().rev().map(|c| (c.x, c.lower)));
    out
}

fn band_columns<F>(bands: &[Band], start: usize, pick: F) -> Vec<BandColumn>
where
    F: Fn(&Band) -> Option<LevelRange>,
{
    bands
        .iter()
        .enumerate()
        .filter_map(|(i, b)| {
            pick(b).map(|r| BandColumn {
                x: (start + i) as f64,
                lower: r.lower,
                upper: r.upper,
            })
        })
        .collect()
}

/// Builds the frame for rows `[0, cursor)`, keeping only the last
/// `max_candles` of them so the view follows the replay head.
pub fn build_frame(series: &Series, replay: &ReplayController, max_candles: usize) -> ChartFrame {
    let max_candles = max_candles.max(1);
    let view = series.prefix(replay.cursor());
    let end = view.len();
    let start = end.saturating_sub(max_candles);

    let state = replay.state();
    let status = format!(
        "{} {}/{} step {}",
        state.phase.as_str(),
        state.cursor,
        replay.len(),
        replay.step()
    );

    let x_bounds = [start as f64 - 1.0, (start + max_candles) as f64];

    if start == end {
        return ChartFrame {
            x_bounds,
            y_bounds: [0.0, 1.0],
            status,
            ..ChartFrame::default()
        };
    }

    let candles: Vec<CandleGlyph> = view.candles[start..end]
        .iter()
        .enumerate()
        .map(|(i, c)| CandleGlyph {
            x: (start + i) as f64,
            open: c.open,
            high: c.high,
            low: c.low,
            close: c.close,
            bullish: c.is_bullish(),
        })
        .collect();

    let bands = &view.bands[start..end];
    let support = band_columns(bands, start, |b| b.support);
    let resistance = band_columns(bands, start, |b| b.resistance);

    let markers: Vec<MarkerGlyph> = view
        .markers
        .iter()
        .filter(|m| m.index >= start)
        .map(|m| MarkerGlyph {
            x: m.index as f64,
            price: m.price,
            kind: m.kind,
        })
        .collect();

    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    for c in &candles {
        lo = lo.min(c.low);
        hi = hi.max(c.high);
    }
    for col in support.iter().chain(resistance.iter()) {
        lo = lo.min(col.lower);
        hi = hi.max(col.upper);
    }
    for m in &markers {
        lo = lo.min(m.price);
        hi = hi.max(m.price);
    }
    let y_bounds = padded_bounds(lo, hi);

    let stamps: Vec<DateTime<Utc>> = view.candles[start..end].iter().map(|c| c.ts).collect();
    let time_ticks = build_time_ticks(&stamps, start);

    ChartFrame {
        price_ticks: build_price_ticks(y_bounds),
        time_ticks,
        candles,
        support,
        resistance,
        markers,
        x_bounds,
        y_bounds,
        status,
    }
}

fn padded_bounds(mut lo: f64, mut hi: f64) -> [f64; 2] {
    let mut span = hi - lo;
    if !span.is_finite() || span <= 0.0 {
        span = hi.abs().max(1.0);
        lo = hi - span / 2.0;
        hi = lo + span;
    }
    let pad = span * PRICE_PAD;
    [lo - pad, hi + pad]
}

fn build_price_ticks(y_bounds: [f64; 2]) -> Vec<AxisTick> {
    let [lo, hi] = y_bounds;
    let span = hi - lo;
    let decimals = if span >= 1000.0 {
        0
    } else if span >= 100.0 {
        1
    } else if span >= 1.0 {
        2
    } else {
        4
    };

    (0..PRICE_TICKS)
        .map(|i| {
            let frac = i as f64 / (PRICE_TICKS - 1) as f64;
            let value = lo + frac * span;
            AxisTick {
                value,
                label: format!("{value:.decimals$}"),
            }
        })
        .collect()
}

fn build_time_ticks(ts: &[DateTime<Utc>], start: usize) -> Vec<AxisTick> {
    let (Some(first), Some(last)) = (ts.first(), ts.last()) else {
        return Vec::new();
    };
    let intraday = (*last - *first).num_days() < 3;
    let fmt = if intraday { "%m-%d %H:%M" } else { "%Y-%m-%d" };

    let mut picks = vec![0, ts.len() / 2, ts.len() - 1];
    picks.dedup();
    picks
        .into_iter()
        .map(|i| AxisTick {
            value: (start + i) as f64,
            label: ts[i].format(fmt).to_string(),
        })
        .collect()
}
