//! CLI argument parsing with clap

use camino::Utf8PathBuf;
use clap::Parser;
use std::str::FromStr;
use tracing::warn;
use zx3dl_core::types::{CoreType, GroupingMode, KeepPolicy, Kind, Selection, Tag};

/// zx3dl - Builds the ZX3 microSD card layout
#[derive(Parser, Debug)]
#[command(name = "zx3dl")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "Downloads files for ZX3 microSD")]
pub struct Cli {
    /// Make a clean build of the SD (takes precedence over --keep)
    #[arg(short = 'c', long)]
    pub clean_sd: bool,

    /// Cache directory
    #[arg(short = 'C', long, default_value = "cache")]
    pub cache_dir: Utf8PathBuf,

    /// Output directory (the SD root)
    #[arg(short = 'O', long, default_value = "SD")]
    pub out_dir: Utf8PathBuf,

    /// Directory whose contents are copied verbatim into the SD
    #[arg(short = 'E', long)]
    pub extra_dir: Option<Utf8PathBuf>,

    /// Keep previous existing files and directories
    #[arg(short = 'K', long)]
    pub keep: bool,

    /// FPGA kinds to include (a35t, a100t, a200t)
    #[arg(short = 'k', long, required = true)]
    pub kinds: Vec<String>,

    /// Core file types to include (bit, zx3)
    #[arg(short = 't', long, default_value = "bit,zx3")]
    pub types: Vec<String>,

    /// Tags to include (arcade, console, computer, util)
    #[arg(short = 'T', long, default_value = "arcade,console,computer,util")]
    pub tags: Vec<String>,

    /// Group core files by file type
    #[arg(short = 'g', long)]
    pub group_types: bool,

    /// Group core files by tag
    #[arg(short = 'G', long)]
    pub group_tags: bool,

    /// Directory the autoboot file starts in
    #[arg(short = 'a', long)]
    pub autoboot_dir: Option<String>,

    /// Do not install an autoboot file
    #[arg(short = 'n', long)]
    pub no_autoboot: bool,

    /// Re-download the arcade catalogs
    #[arg(short = 'r', long)]
    pub refresh: bool,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress output
    #[arg(short, long)]
    pub quiet: bool,
}

impl Cli {
    /// Kind, type and tag filters; invalid entries are logged and dropped
    pub fn selection(&self) -> zx3dl_core::Result<Selection> {
        let kinds: Vec<Kind> = parse_list("kinds", &self.kinds)?;
        let types: Vec<CoreType> = parse_list("types", &self.types)?;
        let tags: Vec<Tag> = parse_list("tags", &self.tags)?;

        let selection = Selection::new(kinds, types, tags);
        selection.validate()?;
        Ok(selection)
    }

    pub fn grouping(&self) -> GroupingMode {
        GroupingMode::from_flags(self.group_types, self.group_tags)
    }

    pub fn policy(&self) -> KeepPolicy {
        KeepPolicy::from_flags(self.clean_sd, self.keep)
    }
}

fn parse_list<T>(field: &str, values: &[String]) -> zx3dl_core::Result<Vec<T>>
where
    T: FromStr<Err = zx3dl_core::Error> + Ord,
{
    let (valid, invalid) = Selection::parse_values::<T>(values);
    for value in &invalid {
        warn!("Ignoring unknown {} value: {}", field, value);
    }
    if valid.is_empty() {
        return Err(zx3dl_core::Error::empty_selection(field));
    }
    Ok(valid)
}
