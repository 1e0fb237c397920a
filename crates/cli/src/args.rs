//! Command line arguments.

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "ebookbatch")]
#[command(version, about = "Batch convert a folder tree of documents into Kindle-ready ebooks", long_about = None)]
pub struct Cli {
    /// Log output format (logs go to stderr)
    #[arg(long, value_enum, default_value = "pretty", global = true)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Convert every matching file under INPUT into OUTPUT
    Run(RunArgs),
    /// Locate ebook-convert and print its version
    Check(CheckArgs),
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Folder to scan for source documents
    #[arg(value_name = "INPUT")]
    pub input: Option<PathBuf>,

    /// Folder that receives the converted files
    #[arg(value_name = "OUTPUT")]
    pub output: Option<PathBuf>,

    /// Configuration file (TOML); defaults to $EBOOKBATCH_CONFIG
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Descend into subfolders (default)
    #[arg(long, conflicts_with = "no_recursive")]
    pub recursive: bool,

    /// Only look at files directly inside INPUT
    #[arg(long)]
    pub no_recursive: bool,

    /// Extensions to pick up, comma separated ("pdf,epub" or "common")
    #[arg(short, long, value_name = "LIST")]
    pub ext: Option<String>,

    /// kindle-app (EPUB), kindle-device (AZW3), copy, or any output format
    #[arg(short, long)]
    pub target: Option<String>,

    /// Convert again even if the destination already exists
    #[arg(long)]
    pub overwrite: bool,

    /// Number of conversions to run at once
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Path to ebook-convert
    #[arg(long, value_name = "PATH")]
    pub converter: Option<PathBuf>,

    /// Calibre output profile; empty string to omit
    #[arg(long)]
    pub profile: Option<String>,

    /// Extra argument passed to ebook-convert (repeatable)
    #[arg(long = "extra-arg", value_name = "ARG", allow_hyphen_values = true)]
    pub extra_args: Vec<String>,

    /// Per-file time limit in seconds; 0 disables it
    #[arg(long, value_name = "SECS")]
    pub timeout_secs: Option<u64>,

    /// Put every output directly in OUTPUT, folding folders into the name
    #[arg(long)]
    pub flatten: bool,

    /// Write a JSON report to this path
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,

    /// Print Prometheus metrics after the run
    #[arg(long)]
    pub metrics: bool,
}

#[derive(Debug, Args)]
pub struct CheckArgs {
    /// Path to ebook-convert; searched for when omitted
    #[arg(long, value_name = "PATH")]
    pub converter: Option<PathBuf>,
}

/// Settings given on the command line. Unset fields leave lower layers alone.
#[derive(Debug, Default, Serialize, PartialEq)]
pub struct SettingsOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_root: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_root: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recursive: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overwrite: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub converter_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_profile: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_args: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flatten: Option<bool>,
}

impl RunArgs {
    /// Config file path: `--config`, else `$EBOOKBATCH_CONFIG`.
    pub fn config_path(&self) -> Option<PathBuf> {
        self.config
            .clone()
            .or_else(|| std::env::var_os("EBOOKBATCH_CONFIG").map(PathBuf::from))
    }

    pub fn overrides(&self) -> SettingsOverrides {
        let recursive = match (self.recursive, self.no_recursive) {
            (_, true) => Some(false),
            (true, false) => Some(true),
            (false, false) => None,
        };

        SettingsOverrides {
            input_root: self.input.clone(),
            output_root: self.output.clone(),
            recursive,
            extensions: self.ext.clone().map(|ext| vec![ext]),
            target: self.target.clone(),
            // Boolean flags can only switch a feature on
            overwrite: self.overwrite.then_some(true),
            workers: self.workers,
            converter_path: self.converter.clone(),
            output_profile: self.profile.clone(),
            extra_args: (!self.extra_args.is_empty()).then(|| self.extra_args.clone()),
            timeout_secs: self.timeout_secs,
            flatten: self.flatten.then_some(true),
        }
    }
}
