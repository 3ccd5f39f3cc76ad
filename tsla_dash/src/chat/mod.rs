pub mod bridge;
pub mod gemini;

pub use bridge::ChatBridge;

use crate::error::ChatRequestError;
use crate::series::{LevelRange, MarkerKind, Series};
use async_trait::async_trait;
use std::sync::Arc;

pub const EXAMPLE_QUESTIONS: [&str; 6] = [
    "What was the highest price in the dataset?",
    "Show me the trading patterns for the last month",
    "What were the most common support levels?",
    "Analyze the volume trends",
    "What was the average trading volume?",
    "Show me the price trend over the last 30 days",
];

#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, ChatRequestError>;
}

#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub id: u64,
    pub question: String,
    pub context: Arc<DataContext>,
}

impl ChatRequest {
    pub fn prompt(&self) -> String {
        build_prompt(&self.question, &self.context)
    }
}

/// What the model gets to see about the dataset: a short summary and the
/// rows themselves as CSV.
#[derive(Debug, Clone, PartialEq)]
pub struct DataContext {
    pub summary: String,
    pub csv: String,
    pub rows: usize,
}

fn format_levels(range: Option<LevelRange>) -> String {
    match range {
        None => "[]".to_string(),
        Some(r) if r.lower == r.upper => format!("[{}]", r.lower),
        Some(r) => format!("[{}, {}]", r.lower, r.upper),
    }
}

impl DataContext {
    /// `row_limit` keeps only the most recent rows.
    pub fn build(series: &Series, row_limit: Option<usize>) -> Result<Self, csv::Error> {
        let total = series.len();
        let start = row_limit.map_or(0, |n| total.saturating_sub(n));

        let mut direction: Vec<Option<MarkerKind>> = vec![None; total];
        for m in series.markers() {
            direction[m.index] = Some(m.kind);
        }

        let mut wtr = csv::Writer::from_writer(Vec::new());
        wtr.write_record([
            "timestamp",
            "direction",
            "Support",
            "Resistance",
            "open",
            "high",
            "low",
            "close",
            "volume",
        ])?;
        for i in start..total {
            let c = &series.candles()[i];
            let b = &series.bands()[i];
            wtr.write_record([
                c.ts.format("%Y-%m-%d %H:%M:%S").to_string(),
                direction[i].map(|k| k.as_str()).unwrap_or("").to_string(),
                format_levels(b.support),
                format_levels(b.resistance),
                c.open.to_string(),
                c.high.to_string(),
                c.low.to_string(),
                c.close.to_string(),
                c.volume.to_string(),
            ])?;
        }
        let bytes = wtr.into_inner().map_err(|e| e.into_error())?;
        let csv = String::from_utf8_lossy(&bytes).into_owned();

        let summary = match series.summary() {
            None => "The dataset is empty.".to_string(),
            Some(s) => {
                let mut out = format!(
                    "{} rows from {} to {}. Highest high {:.2} on {}, lowest low {:.2} on {}. \
                     Last close {:.2}. Average volume {:.0}. {} LONG and {} SHORT signals.",
                    s.rows,
                    s.first_ts.format("%Y-%m-%d %H:%M"),
                    s.last_ts.format("%Y-%m-%d %H:%M"),
                    s.highest.0,
                    s.highest.1.format("%Y-%m-%d"),
                    s.lowest.0,
                    s.lowest.1.format("%Y-%m-%d"),
                    s.last_close,
                    s.avg_volume,
                    s.longs,
                    s.shorts,
                );
                let bands = series.bands();
                let latest_support = bands.iter().rev().find_map(|b| b.support_level());
                let latest_resistance = bands.iter().rev().find_map(|b| b.resistance_level());
                if let Some(v) = latest_support {
                    out.push_str(&format!(" Latest support {v:.2}."));
                }
                if let Some(v) = latest_resistance {
                    out.push_str(&format!(" Latest resistance {v:.2}."));
                }
                if start > 0 {
                    out.push_str(&format!(" Only the last {} rows are included below.", total - start));
                }
                out
            }
        };

        Ok(Self {
            summary,
            csv,
            rows: total - start,
        })
    }
}

pub fn build_prompt(question: &str, context: &DataContext) -> String {
    format!(
        "I have loaded TSLA stock data. Each row has a timestamp, a trading direction \
         (LONG/SHORT or blank), support and resistance levels, OHLC prices and volume.\n\
         Summary: {summary}\n\n\
         The data in CSV format:\n{csv}\n\
         Using this data, answer the following question:\n{question}\n\n\
         Give a detailed analysis with specific data points from the CSV, \
         including relevant statistics, trends and insights.",
        summary = context.summary,
        csv = context.csv,
        question = question.trim(),
    )
}
