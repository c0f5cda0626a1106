use crate::config::{
    AppConfig, DEFAULT_ZOOM, ExportConfig, MatchingConfig, OutputFormat, Scope, StreamingConfig,
    TilingConfig,
};
use crate::error::ConfigError;
use crate::matching::Linkage;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "addr_dedupe",
    version,
    about = "Tile-based deduplication of address points (map/reduce)",
    disable_help_subcommand = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Convert OpenAddresses CSV into wire records
    Import(ImportArgs),
    /// Tag each record with its four quadtile keys
    Map(MapArgs),
    /// Sort tile lines, merge duplicates per tile and write merged points
    Reduce(ReduceArgs),
    /// Write a commented .env.template
    EnvTemplate {
        #[arg(value_name = "PATH", default_value = crate::util::envfile::DEFAULT_TEMPLATE_PATH)]
        path: PathBuf,
    },
}

#[derive(Args, Debug)]
pub struct ImportArgs {
    /// CSV input (`-` for stdin)
    #[arg(value_name = "INPUT", default_value = "-")]
    pub input: String,
    /// Source label stored on every record; defaults to the OA:Source column
    #[arg(long, value_name = "LABEL")]
    pub source: Option<String>,
    /// Output path (stdout when omitted)
    #[arg(short, long, value_name = "PATH")]
    pub out: Option<String>,
    /// Write the run summary as CSV (env: ADDR_DEDUPE_SUMMARY)
    #[arg(long, value_name = "PATH", env = "ADDR_DEDUPE_SUMMARY")]
    pub summary: Option<String>,
}

#[derive(Args, Debug)]
pub struct MapArgs {
    /// Record lines, bare or `<area> <record>` (`-` for stdin)
    #[arg(value_name = "INPUT", default_value = "-")]
    pub input: String,
    /// Quadtile zoom level (env: ADDR_DEDUPE_ZOOM)
    #[arg(short, long, env = "ADDR_DEDUPE_ZOOM", default_value_t = DEFAULT_ZOOM)]
    pub zoom: u8,
    /// Append to addresses-<area>.txt files in this directory instead of writing one stream
    #[arg(long = "by-area", value_name = "DIR", conflicts_with = "out")]
    pub by_area: Option<PathBuf>,
    /// Output path (stdout when omitted)
    #[arg(short, long, value_name = "PATH")]
    pub out: Option<String>,
    /// Write the run summary as CSV (env: ADDR_DEDUPE_SUMMARY)
    #[arg(long, value_name = "PATH", env = "ADDR_DEDUPE_SUMMARY")]
    pub summary: Option<String>,
}

#[derive(Args, Debug)]
pub struct ReduceArgs {
    /// Tile lines from `map` (`-` for stdin)
    #[arg(value_name = "INPUT", default_value = "-")]
    pub input: String,
    /// Output path (stdout when omitted)
    #[arg(short, long, value_name = "PATH")]
    pub out: Option<String>,
    /// Output format (env: ADDR_DEDUPE_FORMAT)
    #[arg(short, long, value_enum, env = "ADDR_DEDUPE_FORMAT", default_value_t = OutputFormat::Csv)]
    pub format: OutputFormat,
    /// Cluster rule (env: ADDR_DEDUPE_LINKAGE)
    #[arg(long, value_enum, env = "ADDR_DEDUPE_LINKAGE", default_value_t = Linkage::Connected)]
    pub linkage: Linkage,
    /// Merge per tile or across all tiles (env: ADDR_DEDUPE_SCOPE)
    #[arg(long, value_enum, env = "ADDR_DEDUPE_SCOPE", default_value_t = Scope::PerGroup)]
    pub scope: Scope,
    /// Input is already grouped by key; skip the external sort (env: ADDR_DEDUPE_PRESORTED)
    #[arg(long, env = "ADDR_DEDUPE_PRESORTED")]
    pub presorted: bool,
    /// Street synonym table (env: ADDR_DEDUPE_TOKENS)
    #[arg(long, value_name = "PATH", env = "ADDR_DEDUPE_TOKENS")]
    pub tokens: Option<String>,
    /// Sort program to spawn (env: ADDR_DEDUPE_SORT)
    #[arg(
        long = "sort-program",
        value_name = "PROGRAM",
        env = "ADDR_DEDUPE_SORT",
        default_value = "sort"
    )]
    pub sort_program: String,
    /// Write the run summary as CSV (env: ADDR_DEDUPE_SUMMARY)
    #[arg(long, value_name = "PATH", env = "ADDR_DEDUPE_SUMMARY")]
    pub summary: Option<String>,
}

impl ImportArgs {
    pub fn to_app_config(&self) -> Result<AppConfig, ConfigError> {
        let cfg = AppConfig {
            input: Some(self.input.clone()),
            export: ExportConfig {
                out_path: self.out.clone(),
                summary_path: self.summary.clone(),
                ..Default::default()
            },
            ..Default::default()
        };
        cfg.validate()?;
        Ok(cfg)
    }
}

impl MapArgs {
    pub fn to_app_config(&self) -> Result<AppConfig, ConfigError> {
        let cfg = AppConfig {
            input: Some(self.input.clone()),
            tiling: TilingConfig { zoom: self.zoom },
            export: ExportConfig {
                out_path: self.out.clone(),
                summary_path: self.summary.clone(),
                ..Default::default()
            },
            ..Default::default()
        };
        cfg.validate()?;
        Ok(cfg)
    }
}

impl ReduceArgs {
    pub fn to_app_config(&self) -> Result<AppConfig, ConfigError> {
        let cfg = AppConfig {
            input: Some(self.input.clone()),
            tiling: TilingConfig::default(),
            matching: MatchingConfig {
                linkage: self.linkage,
                scope: self.scope,
                tokens_path: self.tokens.clone(),
            },
            export: ExportConfig {
                out_path: self.out.clone(),
                format: self.format,
                summary_path: self.summary.clone(),
            },
            streaming: StreamingConfig {
                presorted: self.presorted,
                sort_program: self.sort_program.clone(),
            },
        };
        cfg.validate()?;
        Ok(cfg)
    }
}
