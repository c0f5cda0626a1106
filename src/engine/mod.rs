//! Streaming map and reduce drivers.
//!
//! The reduce side consumes `<key> <record-json>` lines that are already
//! contiguous by key, builds one duplicate graph per key and streams merged
//! records to a sink. Only one group is held in memory at a time unless the
//! global scope is selected.

pub mod import;
pub mod map;
pub mod sorter;

use crate::config::Scope;
use crate::export::MergedSink;
use crate::matching::{DuplicateGraph, Linkage, Matcher};
use crate::models::{AddressRecord, split_keyed_line};
use crate::normalize::TokenNormalizer;
use anyhow::{Context, Result};
use log::{debug, info};
use std::io::BufRead;

const PROGRESS_EVERY: usize = 100_000;

/// Counters reported at the end of every phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub groups: usize,
    pub input_records: usize,
    pub skipped: usize,
    pub output_records: usize,
    pub multi_clusters: usize,
    pub chained_clusters: usize,
    pub repeated_hashes: usize,
    pub areas: usize,
}

/// Read one line as raw bytes. `Ok(None)` at end of input, `Ok(Some(None))`
/// for a line that is not valid UTF-8.
pub(crate) fn read_line<R: BufRead>(
    input: &mut R,
    buf: &mut Vec<u8>,
) -> Result<Option<Option<String>>> {
    buf.clear();
    let n = input.read_until(b'\n', buf).context("reading input")?;
    if n == 0 {
        return Ok(None);
    }
    while matches!(buf.last(), Some(b'\n' | b'\r')) {
        buf.pop();
    }
    Ok(Some(String::from_utf8(buf.clone()).ok()))
}

/// All lines sharing one key, in input order, key stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub key: String,
    pub payloads: Vec<String>,
}

/// Splits key-contiguous input into groups at each key change. Lines without
/// a key (or not UTF-8) are counted as skipped; blank lines are ignored.
pub struct GroupReader<R> {
    input: R,
    buf: Vec<u8>,
    pending: Option<(String, String)>,
    skipped: usize,
}

impl<R: BufRead> GroupReader<R> {
    pub fn new(input: R) -> Self {
        Self {
            input,
            buf: Vec::with_capacity(512),
            pending: None,
            skipped: 0,
        }
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }

    fn next_keyed(&mut self) -> Result<Option<(String, String)>> {
        if let Some(p) = self.pending.take() {
            return Ok(Some(p));
        }
        loop {
            let line = match read_line(&mut self.input, &mut self.buf)? {
                None => return Ok(None),
                Some(None) => {
                    self.skipped += 1;
                    continue;
                }
                Some(Some(line)) => line,
            };
            if line.trim().is_empty() {
                continue;
            }
            match split_keyed_line(&line) {
                Ok((key, payload)) => return Ok(Some((key.to_string(), payload.to_string()))),
                Err(e) => {
                    debug!("skipping line: {}", e);
                    self.skipped += 1;
                }
            }
        }
    }

    pub fn next_group(&mut self) -> Result<Option<Group>> {
        let Some((key, first)) = self.next_keyed()? else {
            return Ok(None);
        };
        let mut payloads = vec![first];
        while let Some((k, payload)) = self.next_keyed()? {
            if k != key {
                self.pending = Some((k, payload));
                break;
            }
            payloads.push(payload);
        }
        Ok(Some(Group { key, payloads }))
    }
}

/// Reduce phase: one duplicate graph per key group.
pub struct ReduceEngine<'n, M> {
    matcher: M,
    normalizer: &'n TokenNormalizer,
    linkage: Linkage,
    scope: Scope,
}

impl<'n, M: Matcher> ReduceEngine<'n, M> {
    pub fn new(
        matcher: M,
        normalizer: &'n TokenNormalizer,
        linkage: Linkage,
        scope: Scope,
    ) -> Self {
        Self {
            matcher,
            normalizer,
            linkage,
            scope,
        }
    }

    /// Parse a group's payloads into a linked graph; bad payloads are skipped.
    pub fn build_graph(&self, group: &Group, stats: &mut RunStats) -> DuplicateGraph {
        let mut graph = DuplicateGraph::new();
        for payload in &group.payloads {
            match AddressRecord::from_json(payload, self.normalizer) {
                Ok(record) => {
                    stats.input_records += 1;
                    graph.add(record);
                }
                Err(e) => {
                    debug!("group {}: skipping record: {}", group.key, e);
                    stats.skipped += 1;
                }
            }
        }
        stats.repeated_hashes += graph.repeated_hashes();
        graph.link(&self.matcher);
        graph
    }

    fn emit(
        &self,
        graph: &DuplicateGraph,
        sink: &mut dyn MergedSink,
        stats: &mut RunStats,
    ) -> Result<()> {
        for merged in graph.merge(self.linkage, &self.matcher) {
            sink.write_merged(&merged)?;
            stats.output_records += 1;
            if merged.count > 1 {
                stats.multi_clusters += 1;
            }
            if merged.chained {
                stats.chained_clusters += 1;
            }
        }
        Ok(())
    }

    /// Consume grouped input to the end, writing merged records to `sink`.
    /// The sink is not finished here.
    pub fn run<R: BufRead>(&self, input: R, sink: &mut dyn MergedSink) -> Result<RunStats> {
        let mut reader = GroupReader::new(input);
        let mut stats = RunStats::default();
        let mut global = DuplicateGraph::new();

        while let Some(group) = reader.next_group()? {
            stats.groups += 1;
            let graph = self.build_graph(&group, &mut stats);
            debug!(
                "group {}: {} records, {} links",
                group.key,
                graph.len(),
                graph.edge_count()
            );
            match self.scope {
                Scope::PerGroup => self.emit(&graph, sink, &mut stats)?,
                Scope::Global => global.absorb(graph),
            }
            if stats.groups % PROGRESS_EVERY == 0 {
                info!(
                    "{} groups, {} records, {} merged so far",
                    stats.groups, stats.input_records, stats.output_records
                );
            }
        }
        if self.scope == Scope::Global {
            info!(
                "merging {} distinct records across {} groups",
                global.len(),
                stats.groups
            );
            self.emit(&global, sink, &mut stats)?;
        }
        stats.skipped += reader.skipped();
        info!("- {} address tiles.", stats.groups);
        info!("{} merged records.", stats.output_records);
        Ok(stats)
    }
}
