use super::MergedSink;
use crate::models::MergedRecord;
use crate::orchestrator::summary::RunSummary;
use anyhow::Result;
use csv::{Writer, WriterBuilder};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

pub const MERGED_HEADERS: [&str; 7] = ["NUMBER", "STREET", "UNIT", "LAT", "LON", "COUNT", "RADIUS"];

/// Streams merged records as CSV, one row per cluster.
pub struct MergedCsvWriter<W: Write> {
    writer: Writer<W>,
}

impl<W: Write> MergedCsvWriter<W> {
    pub fn new(out: W) -> Result<Self> {
        let mut writer = WriterBuilder::new().from_writer(out);
        writer.write_record(MERGED_HEADERS)?;
        Ok(Self { writer })
    }

    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| anyhow::anyhow!("flushing csv output: {}", e.error()))
    }
}

impl<W: Write> MergedSink for MergedCsvWriter<W> {
    fn write_merged(&mut self, m: &MergedRecord) -> Result<()> {
        let lat = m.lat.to_string();
        let lon = m.lon.to_string();
        let count = m.count.to_string();
        let radius = m.radius.map(|r| r.to_string()).unwrap_or_default();
        self.writer.write_record([
            m.number.as_str(),
            m.street.as_str(),
            m.unit.as_str(),
            lat.as_str(),
            lon.as_str(),
            count.as_str(),
            radius.as_str(),
        ])?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

pub fn export_summary_csv(path: &Path, summary: &RunSummary) -> Result<()> {
    let file = File::create(path)?;
    let buf_writer = BufWriter::new(file);
    let mut w = WriterBuilder::new().from_writer(buf_writer);
    w.write_record(["Key", "Value"])?;
    for (k, v) in summary.rows() {
        w.write_record([k, v.as_str()])?;
    }
    w.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MergedRecord;

    fn merged(count: usize, radius: Option<f64>) -> MergedRecord {
        MergedRecord {
            hash: "h".into(),
            number: "20820".into(),
            street: "BONNY DR".into(),
            unit: "".into(),
            lon: -122.5,
            lat: 37.25,
            x: 0.0,
            y: 0.0,
            count,
            radius,
            city: None,
            district: None,
            region: None,
            postcode: None,
            members: vec![[-122.5, 37.25]; count],
            chained: false,
        }
    }

    #[test]
    fn writes_header_and_rows() {
        let mut w = MergedCsvWriter::new(Vec::new()).unwrap();
        w.write_merged(&merged(2, Some(12.5))).unwrap();
        w.write_merged(&merged(1, None)).unwrap();
        w.finish().unwrap();
        let text = String::from_utf8(w.into_inner().unwrap()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "NUMBER,STREET,UNIT,LAT,LON,COUNT,RADIUS");
        assert_eq!(lines[1], "20820,BONNY DR,,37.25,-122.5,2,12.5");
        assert_eq!(lines[2], "20820,BONNY DR,,37.25,-122.5,1,");
    }

    #[test]
    fn summary_csv_is_key_value() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.csv");
        let s = crate::orchestrator::summary::SummaryBuilder::new("map", Some("in.txt")).build();
        export_summary_csv(&path, &s).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("Key,Value\n"));
        assert!(text.contains("Phase,map\n"));
        assert!(text.contains("Input,in.txt\n"));
    }
}
