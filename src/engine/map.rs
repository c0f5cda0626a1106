//! Map phase: tag each record with its tile keys.

use super::{RunStats, read_line};
use crate::error::RecordError;
use crate::models::{AddressRecord, split_keyed_line};
use crate::normalize::TokenNormalizer;
use crate::tiling::KeyAssigner;
use anyhow::{Context, Result};
use log::{debug, info};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Split a map input line into an optional area key and the record json.
/// Bare records start with `[`.
pub fn parse_map_line(line: &str) -> Result<(Option<&str>, &str), RecordError> {
    let trimmed = line.trim_start();
    if trimmed.starts_with('[') {
        return Ok((None, trimmed));
    }
    let (key, rest) = split_keyed_line(trimmed)?;
    Ok((Some(key), rest))
}

/// File name for an area's tile lines; unsafe characters become `_`.
pub fn area_file_name(key: &str) -> String {
    let clean: String = key
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("addresses-{}.txt", if clean.is_empty() { "_" } else { &clean })
}

pub struct MapEngine<'n, A> {
    assigner: A,
    normalizer: &'n TokenNormalizer,
}

impl<'n, A: KeyAssigner> MapEngine<'n, A> {
    pub fn new(assigner: A, normalizer: &'n TokenNormalizer) -> Self {
        Self {
            assigner,
            normalizer,
        }
    }

    fn write_tiles<W: Write>(&self, record: &AddressRecord, out: &mut W) -> Result<usize> {
        let json = record.to_json();
        let keys = self.assigner.keys(record);
        for key in &keys {
            writeln!(out, "{} {}", key, json)?;
        }
        Ok(keys.len())
    }

    /// Read records (bare or area-keyed) and write one `<tile> <json>` line per tile.
    pub fn run<R: BufRead, W: Write>(&self, mut input: R, out: &mut W) -> Result<RunStats> {
        let mut stats = RunStats::default();
        let mut buf = Vec::new();
        while let Some(line) = read_line(&mut input, &mut buf)? {
            let Some(line) = line else {
                stats.skipped += 1;
                continue;
            };
            if line.trim().is_empty() {
                continue;
            }
            let parsed = parse_map_line(&line)
                .and_then(|(_, json)| AddressRecord::from_json(json, self.normalizer));
            match parsed {
                Ok(record) => {
                    stats.input_records += 1;
                    stats.output_records += self.write_tiles(&record, out)?;
                }
                Err(e) => {
                    debug!("skipping line: {}", e);
                    stats.skipped += 1;
                }
            }
        }
        out.flush().context("flushing map output")?;
        info!("- {} address rows.", stats.input_records);
        Ok(stats)
    }

    /// Read area-keyed records and append tile lines to one file per area
    /// under `dir`. Returns the files touched, in order of first use.
    pub fn run_by_area<R: BufRead>(
        &self,
        mut input: R,
        dir: &Path,
    ) -> Result<(RunStats, Vec<PathBuf>)> {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
        let mut stats = RunStats::default();
        let mut files: Vec<PathBuf> = Vec::new();
        let mut current: Option<(String, PathBuf, BufWriter<File>, usize)> = None;
        let mut buf = Vec::new();

        let close = |entry: Option<(String, PathBuf, BufWriter<File>, usize)>| -> Result<()> {
            if let Some((_, path, mut w, count)) = entry {
                w.flush()
                    .with_context(|| format!("writing {}", path.display()))?;
                info!("Added {} addresses to {}", count, path.display());
            }
            Ok(())
        };

        while let Some(line) = read_line(&mut input, &mut buf)? {
            let Some(line) = line else {
                stats.skipped += 1;
                continue;
            };
            if line.trim().is_empty() {
                continue;
            }
            let (key, record) = match parse_map_line(&line) {
                Ok((Some(key), json)) => match AddressRecord::from_json(json, self.normalizer) {
                    Ok(r) => (key.to_string(), r),
                    Err(e) => {
                        debug!("skipping line: {}", e);
                        stats.skipped += 1;
                        continue;
                    }
                },
                Ok((None, _)) => {
                    debug!("skipping line without area key");
                    stats.skipped += 1;
                    continue;
                }
                Err(e) => {
                    debug!("skipping line: {}", e);
                    stats.skipped += 1;
                    continue;
                }
            };

            if current.as_ref().map(|c| c.0 != key).unwrap_or(true) {
                close(current.take())?;
                let path = dir.join(area_file_name(&key));
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&path)
                    .with_context(|| format!("opening {}", path.display()))?;
                if !files.contains(&path) {
                    files.push(path.clone());
                }
                current = Some((key, path, BufWriter::new(file), 0));
            }
            if let Some((_, _, w, count)) = current.as_mut() {
                stats.input_records += 1;
                stats.output_records += self.write_tiles(&record, w)?;
                *count += 1;
            }
        }
        close(current.take())?;
        stats.areas = files.len();
        Ok((stats, files))
    }
}
