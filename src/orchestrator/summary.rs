//! Run summary reporting.

use crate::engine::RunStats;
use chrono::{DateTime, Utc};
use log::info;

/// Counts and settings for one pipeline run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub phase: String,
    pub input: String,
    pub zoom: Option<u8>,
    pub linkage: Option<String>,
    pub scope: Option<String>,
    pub format: Option<String>,
    pub stats: RunStats,
    pub started_utc: DateTime<Utc>,
    pub ended_utc: DateTime<Utc>,
    pub duration_secs: f64,
}

impl RunSummary {
    /// Key/value rows in display order; also the summary CSV body.
    pub fn rows(&self) -> Vec<(&'static str, String)> {
        let s = &self.stats;
        let mut rows = vec![
            ("Phase", self.phase.clone()),
            ("Input", self.input.clone()),
        ];
        if let Some(z) = self.zoom {
            rows.push(("Zoom", z.to_string()));
        }
        if let Some(l) = &self.linkage {
            rows.push(("Linkage", l.clone()));
        }
        if let Some(sc) = &self.scope {
            rows.push(("Scope", sc.clone()));
        }
        if let Some(f) = &self.format {
            rows.push(("Format", f.clone()));
        }
        rows.push(("Input records", s.input_records.to_string()));
        rows.push(("Skipped lines", s.skipped.to_string()));
        if s.groups > 0 {
            rows.push(("Groups", s.groups.to_string()));
        }
        if s.areas > 0 {
            rows.push(("Areas", s.areas.to_string()));
        }
        rows.push(("Output records", s.output_records.to_string()));
        if self.phase == "reduce" {
            rows.push(("Merged clusters", s.multi_clusters.to_string()));
            rows.push(("Chained clusters", s.chained_clusters.to_string()));
            rows.push(("Repeated hashes", s.repeated_hashes.to_string()));
        }
        rows.push(("Started (UTC)", self.started_utc.to_rfc3339()));
        rows.push(("Ended (UTC)", self.ended_utc.to_rfc3339()));
        rows.push(("Duration (s)", format!("{:.3}", self.duration_secs)));
        rows
    }

    pub fn log(&self) {
        for (k, v) in self.rows() {
            info!("{}: {}", k, v);
        }
    }
}

/// Builder for [`RunSummary`].
#[derive(Debug, Clone)]
pub struct SummaryBuilder {
    phase: String,
    input: String,
    zoom: Option<u8>,
    linkage: Option<String>,
    scope: Option<String>,
    format: Option<String>,
    stats: RunStats,
    started_utc: DateTime<Utc>,
}

impl SummaryBuilder {
    /// Start timing a run of `phase` over `input`.
    pub fn new(phase: &str, input: Option<&str>) -> Self {
        Self {
            phase: phase.to_string(),
            input: input.unwrap_or("-").to_string(),
            zoom: None,
            linkage: None,
            scope: None,
            format: None,
            stats: RunStats::default(),
            started_utc: Utc::now(),
        }
    }

    pub fn with_zoom(mut self, zoom: u8) -> Self {
        self.zoom = Some(zoom);
        self
    }

    pub fn with_matching(mut self, linkage: &str, scope: &str) -> Self {
        self.linkage = Some(linkage.to_string());
        self.scope = Some(scope.to_string());
        self
    }

    pub fn with_format(mut self, format: &str) -> Self {
        self.format = Some(format.to_string());
        self
    }

    pub fn with_stats(mut self, stats: RunStats) -> Self {
        self.stats = stats;
        self
    }

    /// Stamp the end time and build.
    pub fn build(self) -> RunSummary {
        let ended_utc = Utc::now();
        let duration_secs = (ended_utc - self.started_utc).num_milliseconds() as f64 / 1000.0;
        RunSummary {
            phase: self.phase,
            input: self.input,
            zoom: self.zoom,
            linkage: self.linkage,
            scope: self.scope,
            format: self.format,
            stats: self.stats,
            started_utc: self.started_utc,
            ended_utc,
            duration_secs,
        }
    }
}
