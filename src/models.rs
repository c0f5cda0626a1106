use crate::error::RecordError;
use crate::normalize::TokenNormalizer;
use crate::tiling::in_extent;
use serde_json::{Number, Value};

/// Fields of the wire array, in on-disk order.
pub const WIRE_FIELDS: [&str; 13] = [
    "source", "hash", "lon", "lat", "x", "y", "number", "street", "unit", "city", "district",
    "region", "postcode",
];
const REQUIRED_FIELDS: usize = 9;

/// Raw address fields as read from a source, before normalization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AddressFields {
    pub source: String,
    pub hash: String,
    pub lon: f64,
    pub lat: f64,
    pub x: f64,
    pub y: f64,
    pub number: String,
    pub street: String,
    pub unit: String,
    pub city: Option<String>,
    pub district: Option<String>,
    pub region: Option<String>,
    pub postcode: Option<String>,
}

/// One address point plus its normalized street. Read-only once built.
#[derive(Debug, Clone, PartialEq)]
pub struct AddressRecord {
    pub source: String,
    pub hash: String,
    pub lon: f64,
    pub lat: f64,
    pub x: f64,
    pub y: f64,
    pub number: String,
    pub street: String,
    pub unit: String,
    pub city: Option<String>,
    pub district: Option<String>,
    pub region: Option<String>,
    pub postcode: Option<String>,
    street_normal: String,
}

impl AddressRecord {
    pub fn new(fields: AddressFields, normalizer: &TokenNormalizer) -> Self {
        let street_normal = normalizer.normalize(&fields.street);
        Self {
            source: fields.source,
            hash: fields.hash,
            lon: fields.lon,
            lat: fields.lat,
            x: fields.x,
            y: fields.y,
            number: fields.number,
            street: fields.street,
            unit: fields.unit,
            city: fields.city,
            district: fields.district,
            region: fields.region,
            postcode: fields.postcode,
            street_normal,
        }
    }

    pub fn street_normal(&self) -> &str {
        &self.street_normal
    }

    fn has_locality(&self) -> bool {
        self.city.is_some()
            || self.district.is_some()
            || self.region.is_some()
            || self.postcode.is_some()
    }

    /// Parse the positional JSON array used between the map and reduce phases.
    pub fn from_json(text: &str, normalizer: &TokenNormalizer) -> Result<Self, RecordError> {
        let values: Vec<Value> = serde_json::from_str(text.trim())?;
        if values.len() < REQUIRED_FIELDS {
            return Err(RecordError::TooFewFields {
                found: values.len(),
                expected: REQUIRED_FIELDS,
            });
        }
        let fields = AddressFields {
            source: text_field(&values, 0)?,
            hash: text_field(&values, 1)?,
            lon: number_field(&values, 2)?,
            lat: number_field(&values, 3)?,
            x: projected_field(&values, 4)?,
            y: projected_field(&values, 5)?,
            number: text_field(&values, 6)?,
            street: text_field(&values, 7)?,
            unit: match &values[8] {
                Value::Null => String::new(),
                _ => text_field(&values, 8)?,
            },
            city: optional_field(&values, 9)?,
            district: optional_field(&values, 10)?,
            region: optional_field(&values, 11)?,
            postcode: optional_field(&values, 12)?,
        };
        Ok(Self::new(fields, normalizer))
    }

    /// Inverse of [`AddressRecord::from_json`]. Locality fields are written
    /// only when at least one of them is present.
    pub fn to_json(&self) -> String {
        let mut values = vec![
            Value::String(self.source.clone()),
            Value::String(self.hash.clone()),
            float(self.lon),
            float(self.lat),
            float(self.x),
            float(self.y),
            Value::String(self.number.clone()),
            Value::String(self.street.clone()),
            Value::String(self.unit.clone()),
        ];
        if self.has_locality() {
            for v in [&self.city, &self.district, &self.region, &self.postcode] {
                values.push(v.clone().map(Value::String).unwrap_or(Value::Null));
            }
        }
        Value::Array(values).to_string()
    }
}

fn float(v: f64) -> Value {
    Number::from_f64(v).map(Value::Number).unwrap_or(Value::Null)
}

fn text_field(values: &[Value], i: usize) -> Result<String, RecordError> {
    match &values[i] {
        Value::String(s) => Ok(s.clone()),
        _ => Err(RecordError::FieldType {
            field: WIRE_FIELDS[i],
            expected: "string",
        }),
    }
}

fn number_field(values: &[Value], i: usize) -> Result<f64, RecordError> {
    let v = values[i].as_f64().ok_or(RecordError::FieldType {
        field: WIRE_FIELDS[i],
        expected: "number",
    })?;
    if v.is_finite() {
        Ok(v)
    } else {
        Err(RecordError::NonFinite {
            field: WIRE_FIELDS[i],
        })
    }
}

fn projected_field(values: &[Value], i: usize) -> Result<f64, RecordError> {
    let v = number_field(values, i)?;
    if in_extent(v) {
        Ok(v)
    } else {
        Err(RecordError::OutOfRange {
            field: WIRE_FIELDS[i],
        })
    }
}

fn optional_field(values: &[Value], i: usize) -> Result<Option<String>, RecordError> {
    match values.get(i) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(RecordError::FieldType {
            field: WIRE_FIELDS[i],
            expected: "string or null",
        }),
    }
}

/// Split a `<key> <payload>` wire line at its first space.
pub fn split_keyed_line(line: &str) -> Result<(&str, &str), RecordError> {
    let line = line.trim_end_matches(['\n', '\r']);
    match line.split_once(' ') {
        Some((key, rest)) if !key.is_empty() => Ok((key, rest)),
        _ => Err(RecordError::MissingKey),
    }
}

/// One output point standing in for a cluster of duplicate records.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedRecord {
    /// Hash of the representative (first) member.
    pub hash: String,
    pub number: String,
    pub street: String,
    pub unit: String,
    pub lon: f64,
    pub lat: f64,
    pub x: f64,
    pub y: f64,
    pub count: usize,
    /// Mean member distance from the centroid in Mercator meters; `None` for singletons.
    pub radius: Option<f64>,
    pub city: Option<String>,
    pub district: Option<String>,
    pub region: Option<String>,
    pub postcode: Option<String>,
    /// `[lon, lat]` of every member, representative first.
    pub members: Vec<[f64; 2]>,
    /// Some pair of members does not match directly.
    pub chained: bool,
}

impl MergedRecord {
    /// Merge a cluster; text fields come from the first member. Returns `None`
    /// for an empty cluster.
    pub fn from_members(members: &[&AddressRecord], chained: bool) -> Option<Self> {
        let first = *members.first()?;
        let n = members.len() as f64;
        let mean = |f: fn(&AddressRecord) -> f64| members.iter().map(|m| f(m)).sum::<f64>() / n;
        let (lon, lat) = (mean(|m| m.lon), mean(|m| m.lat));
        let (x, y) = (mean(|m| m.x), mean(|m| m.y));
        let radius = (members.len() > 1).then(|| {
            members
                .iter()
                .map(|m| (m.x - x).hypot(m.y - y))
                .sum::<f64>()
                / n
        });
        Some(Self {
            hash: first.hash.clone(),
            number: first.number.clone(),
            street: first.street.clone(),
            unit: first.unit.clone(),
            lon,
            lat,
            x,
            y,
            count: members.len(),
            radius,
            city: first.city.clone(),
            district: first.district.clone(),
            region: first.region.clone(),
            postcode: first.postcode.clone(),
            members: members.iter().map(|m| [m.lon, m.lat]).collect(),
            chained,
        })
    }
}
