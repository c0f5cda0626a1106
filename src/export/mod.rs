pub mod csv_export;
pub mod geojson_export;

use crate::config::OutputFormat;
use crate::models::MergedRecord;
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

pub use csv_export::{MergedCsvWriter, export_summary_csv};
pub use geojson_export::GeoJsonWriter;

/// Destination for merged records.
pub trait MergedSink {
    fn write_merged(&mut self, record: &MergedRecord) -> Result<()>;
    /// Close any open structure and flush. Safe to call more than once.
    fn finish(&mut self) -> Result<()>;
}

/// Buffered writer over a file, or stdout when `path` is `None`.
pub fn open_output(path: Option<&Path>) -> Result<Box<dyn Write>> {
    Ok(match path {
        Some(p) => {
            let file = File::create(p).with_context(|| format!("creating {}", p.display()))?;
            Box::new(BufWriter::with_capacity(512 * 1024, file))
        }
        None => Box::new(BufWriter::new(std::io::stdout())),
    })
}

pub fn open_sink(format: OutputFormat, path: Option<&Path>) -> Result<Box<dyn MergedSink>> {
    let out = open_output(path)?;
    Ok(match format {
        OutputFormat::Csv => Box::new(MergedCsvWriter::new(out)?),
        OutputFormat::Geojson => Box::new(GeoJsonWriter::new(out)?),
    })
}

/// Collects merged records in memory.
#[derive(Debug, Default)]
pub struct VecSink {
    pub records: Vec<MergedRecord>,
    pub finished: bool,
}

impl MergedSink for VecSink {
    fn write_merged(&mut self, record: &MergedRecord) -> Result<()> {
        self.records.push(record.clone());
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.finished = true;
        Ok(())
    }
}
