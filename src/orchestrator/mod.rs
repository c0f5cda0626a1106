//! Orchestrator: wires configuration, inputs, engines and sinks for each
//! pipeline phase and reports a [`RunSummary`].

pub mod summary;

use crate::config::AppConfig;
use crate::engine::ReduceEngine;
use crate::engine::import::import_csv;
use crate::engine::map::MapEngine;
use crate::engine::sorter::ExternalSort;
use crate::export::{export_summary_csv, open_output, open_sink};
use crate::matching::AddressMatcher;
use crate::tiling::QuadtileAssigner;
use anyhow::{Context, Result, bail};
use log::{info, warn};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;

pub use summary::{RunSummary, SummaryBuilder};

/// Buffered reader over a file, or stdin when `path` is `None`.
pub fn open_input(path: Option<&Path>) -> Result<Box<dyn BufRead>> {
    Ok(match path {
        Some(p) => {
            let file = File::open(p).with_context(|| format!("opening {}", p.display()))?;
            Box::new(BufReader::with_capacity(512 * 1024, file))
        }
        None => Box::new(BufReader::new(io::stdin())),
    })
}

/// Log the summary and write it as CSV when a summary path is configured.
pub fn report(cfg: &AppConfig, summary: &RunSummary) -> Result<()> {
    summary.log();
    if let Some(path) = &cfg.export.summary_path {
        export_summary_csv(Path::new(path), summary)
            .with_context(|| format!("writing summary {}", path))?;
        info!("Summary written to {}", path);
    }
    Ok(())
}

/// CSV import: OpenAddresses rows in, bare wire records out.
pub fn run_import(cfg: &AppConfig, source: Option<&str>) -> Result<RunSummary> {
    cfg.validate()?;
    let builder = SummaryBuilder::new("import", cfg.input.as_deref());
    let normalizer = cfg.normalizer()?;
    let input = open_input(cfg.input_path())?;
    let mut out = open_output(cfg.out_path())?;
    let stats = import_csv(input, &mut out, source, &normalizer)?;
    let summary = builder.with_stats(stats).build();
    report(cfg, &summary)?;
    Ok(summary)
}

/// Map phase. With `by_area`, tile lines are appended to one file per area
/// under that directory and the file names are printed to stdout.
pub fn run_map(cfg: &AppConfig, by_area: Option<&Path>) -> Result<RunSummary> {
    cfg.validate()?;
    let builder = SummaryBuilder::new("map", cfg.input.as_deref()).with_zoom(cfg.tiling.zoom);
    let normalizer = cfg.normalizer()?;
    let engine = MapEngine::new(QuadtileAssigner::new(cfg.tiling.zoom)?, &normalizer);
    let input = open_input(cfg.input_path())?;

    let stats = match by_area {
        Some(dir) => {
            let (stats, files) = engine.run_by_area(input, dir)?;
            let stdout = io::stdout();
            let mut lock = stdout.lock();
            for f in &files {
                writeln!(lock, "{}", f.display())?;
            }
            lock.flush()?;
            stats
        }
        None => {
            let mut out = open_output(cfg.out_path())?;
            engine.run(input, &mut out)?
        }
    };
    let summary = builder.with_stats(stats).build();
    report(cfg, &summary)?;
    Ok(summary)
}

/// Reduce phase. Unless the input is marked presorted it is piped through
/// the external sort first. The sink is finished even when the run fails.
pub fn run_reduce(cfg: &AppConfig) -> Result<RunSummary> {
    cfg.validate()?;
    let builder = SummaryBuilder::new("reduce", cfg.input.as_deref())
        .with_matching(cfg.matching.linkage.as_str(), cfg.matching.scope.as_str())
        .with_format(cfg.export.format.as_str());
    let normalizer = cfg.normalizer()?;
    let engine = ReduceEngine::new(
        AddressMatcher,
        &normalizer,
        cfg.matching.linkage,
        cfg.matching.scope,
    );
    if let Some(p) = cfg.input_path() {
        if !p.is_file() {
            bail!("input {} does not exist", p.display());
        }
    }

    let mut sink = open_sink(cfg.export.format, cfg.out_path())?;
    let result = if cfg.streaming.presorted {
        open_input(cfg.input_path()).and_then(|input| engine.run(input, sink.as_mut()))
    } else {
        let (sort, sorted) = ExternalSort::spawn(&cfg.streaming.sort_program, cfg.input_path())?;
        match engine.run(sorted, sink.as_mut()) {
            Ok(stats) => sort.wait().map(|_| stats).map_err(anyhow::Error::from),
            Err(e) => {
                sort.abort();
                Err(e)
            }
        }
    };
    let finished = sink.finish().context("finishing output");
    let stats = match (result, finished) {
        (Ok(stats), Ok(())) => stats,
        (Err(e), finished) => {
            if let Err(f) = finished {
                warn!("{:#}", f);
            }
            return Err(e);
        }
        (Ok(_), Err(f)) => return Err(f),
    };

    let summary = builder.with_stats(stats).build();
    report(cfg, &summary)?;
    Ok(summary)
}
