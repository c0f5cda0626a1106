use super::MergedSink;
use crate::models::MergedRecord;
use anyhow::Result;
use serde_json::json;
use std::io::Write;

/// Streams merged records as a GeoJSON FeatureCollection. Singletons are
/// Points; clusters are MultiPoints of their members. The collection is
/// closed by [`MergedSink::finish`].
pub struct GeoJsonWriter<W: Write> {
    out: W,
    written: usize,
    closed: bool,
}

impl<W: Write> GeoJsonWriter<W> {
    pub fn new(mut out: W) -> Result<Self> {
        out.write_all(b"{\"type\":\"FeatureCollection\",\"features\":[\n")?;
        Ok(Self {
            out,
            written: 0,
            closed: false,
        })
    }

    pub fn into_inner(mut self) -> Result<W> {
        self.finish()?;
        Ok(self.out)
    }
}

pub fn feature(m: &MergedRecord) -> serde_json::Value {
    let geometry = if m.members.len() > 1 {
        json!({ "type": "MultiPoint", "coordinates": m.members })
    } else {
        json!({ "type": "Point", "coordinates": [m.lon, m.lat] })
    };
    json!({
        "type": "Feature",
        "geometry": geometry,
        "properties": {
            "hash": m.hash,
            "number": m.number,
            "street": m.street,
            "unit": m.unit,
            "count": m.count,
            "radius": m.radius,
        },
    })
}

impl<W: Write> MergedSink for GeoJsonWriter<W> {
    fn write_merged(&mut self, m: &MergedRecord) -> Result<()> {
        if self.written > 0 {
            self.out.write_all(b",\n")?;
        }
        serde_json::to_writer(&mut self.out, &feature(m))?;
        self.written += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if !self.closed {
            self.out.write_all(b"\n]}\n")?;
            self.closed = true;
        }
        self.out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn merged(number: &str, count: usize, radius: Option<f64>) -> MergedRecord {
        let members = (0..count).map(|i| [1.0 + i as f64, 2.5]).collect();
        MergedRecord {
            hash: "h".into(),
            number: number.into(),
            street: "Main St".into(),
            unit: "".into(),
            lon: 1.5,
            lat: 2.5,
            x: 0.0,
            y: 0.0,
            count,
            radius,
            city: None,
            district: None,
            region: None,
            postcode: None,
            members,
            chained: false,
        }
    }

    #[test]
    fn writes_a_valid_collection() {
        let mut w = GeoJsonWriter::new(Vec::new()).unwrap();
        w.write_merged(&merged("1", 3, Some(4.0))).unwrap();
        w.write_merged(&merged("2", 1, None)).unwrap();
        let bytes = w.into_inner().unwrap();
        let doc: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(doc["type"], "FeatureCollection");
        let features = doc["features"].as_array().unwrap();
        assert_eq!(features.len(), 2);
        assert_eq!(features[0]["geometry"]["type"], "MultiPoint");
        let coords = features[0]["geometry"]["coordinates"].as_array().unwrap();
        assert_eq!(coords.len(), 3);
        assert_eq!(coords[2], serde_json::json!([3.0, 2.5]));
        assert_eq!(features[0]["properties"]["hash"], "h");
        assert_eq!(features[0]["properties"]["count"], 3);
        assert_eq!(features[1]["geometry"]["type"], "Point");
        assert_eq!(features[1]["geometry"]["coordinates"][0], 1.5);
        assert_eq!(features[0]["properties"]["radius"], 4.0);
        assert!(features[1]["properties"]["radius"].is_null());
    }

    #[test]
    fn empty_collection_and_repeated_finish() {
        let mut w = GeoJsonWriter::new(Vec::new()).unwrap();
        w.finish().unwrap();
        w.finish().unwrap();
        let bytes = w.into_inner().unwrap();
        let doc: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(doc["features"].as_array().unwrap().len(), 0);
    }
}
