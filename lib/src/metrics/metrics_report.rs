// lib/src/metrics/metrics_report.rs
use std::fmt;

use serde::Serialize;

use crate::metrics::metrics_recorder::{MetricSample, MetricSeries};
use crate::metrics::{API_LATENCY_PREFIX, DRAFT_CREATION_MS, FINALIZATION_MS, GAS_FINALIZE, PINATA_UPLOAD_MS};

/// Summary of the headline performance figures.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsReport {
    pub draft_creation_ms: Option<f64>,
    pub finalization_ms: Option<f64>,
    pub api_latency_ms: Option<f64>,
    pub gas_finalize: Option<f64>,
    pub pinata_upload_ms: Option<f64>,
}

fn average<'a>(samples: impl IntoIterator<Item = &'a MetricSample>) -> Option<f64> {
    let (sum, count) = samples.into_iter().fold((0.0, 0usize), |(sum, n), s| (sum + s.value, n + 1));
    (count > 0).then(|| sum / count as f64)
}

pub fn format_ms(ms: Option<f64>) -> String {
    match ms {
        None => "n/a".to_string(),
        Some(ms) if ms > 1000.0 => format!("{:.2} s", ms / 1000.0),
        Some(ms) => format!("{:.0} ms", ms),
    }
}

pub fn format_gas(units: Option<f64>) -> String {
    let Some(units) = units else {
        return "n/a".to_string();
    };
    let rounded = units.round();
    let digits = format!("{:.0}", rounded.abs());
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    let sign = if rounded < 0.0 { "-" } else { "" };
    format!("{}{} units", sign, grouped)
}

impl MetricsReport {
    pub fn from_series(series: &MetricSeries) -> Self {
        let named = |name: &str| series.get(name).and_then(|samples| average(samples));
        let api_latency_ms = average(
            series
                .iter()
                .filter(|(name, _)| name.starts_with(API_LATENCY_PREFIX))
                .flat_map(|(_, samples)| samples),
        );
        MetricsReport {
            draft_creation_ms: named(DRAFT_CREATION_MS),
            finalization_ms: named(FINALIZATION_MS),
            api_latency_ms,
            gas_finalize: named(GAS_FINALIZE),
            pinata_upload_ms: named(PINATA_UPLOAD_MS),
        }
    }

    pub fn rows(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Average Draft Creation Time", format_ms(self.draft_creation_ms)),
            ("Finalization Time (on-chain)", format_ms(self.finalization_ms)),
            ("API Latency (overall)", format_ms(self.api_latency_ms)),
            ("Gas Usage (finalize)", format_gas(self.gas_finalize)),
            ("Pinata Upload Latency", format_ms(self.pinata_upload_ms)),
        ]
    }
}

impl fmt::Display for MetricsReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rows = self.rows();
        let width = rows.iter().map(|(label, _)| label.len()).max().unwrap_or(0).max("Metric".len());
        writeln!(f, "Measured Performance Metrics")?;
        writeln!(f)?;
        writeln!(f, "{:<width$}  {}", "Metric", "Result", width = width)?;
        writeln!(f, "{:-<width$}  {:-<6}", "", "", width = width)?;
        for (label, value) in rows {
            writeln!(f, "{:<width$}  {}", label, value, width = width)?;
        }
        Ok(())
    }
}
