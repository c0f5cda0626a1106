//! Command-line interface: subcommand parsing and conversion to [`AppConfig`].
//!
//! [`AppConfig`]: crate::config::AppConfig

mod clap_parser;

pub use clap_parser::{Cli, Command, ImportArgs, MapArgs, ReduceArgs};
