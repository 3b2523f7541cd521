//! Command-line configuration.
//!
//! Arguments can be provided via:
//! - CLI flags (`--alignment`, `--key-set`, etc.)
//! - Environment variables (`HASHPACK_ALIGNMENT`, `HASHPACK_KEY_SETS`, etc.)
//! - Default values
//!
//! Every command is validated before it touches the filesystem, so a bad
//! alignment or an existing output fails fast instead of half-way through.
//!
//! # Example
//!
//! ```no_run
//! use hashpack_cli::Cli;
//!
//! let cli = Cli::from_args();
//! cli.validate().expect("Invalid configuration");
//! ```

use crate::error::ConfigError;
use clap::{Args, Parser, Subcommand};
use hashpack_crypto::PreimageSearch;
use hashpack_crypto::preimage::{DEFAULT_BODY_LEN, DEFAULT_SEPARATOR};
use hashpack_formats::archive::constants::{DEFAULT_ALIGNMENT, DEFAULT_UNKNOWN_DIR};
use hashpack_formats::archive::{BuildOptions, ExtractOptions, is_valid_alignment};
use hashpack_formats::names::IndexSources;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level arguments.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "hashpack",
    about = "Build, unpack and name hash-addressed asset archives",
    version
)]
pub struct Cli {
    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Command to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Print the key of one or more paths
    Hash(HashArgs),
    /// Pack a directory into a table/blob pair
    Build(BuildArgs),
    /// Unpack a table/blob pair into a directory
    Extract(ExtractArgs),
    /// Resolve a key through the name datasets
    Lookup(LookupArgs),
    /// Search for a string hashing to a key
    Search(SearchArgs),
}

/// Arguments for `hash`.
#[derive(Debug, Clone, Args)]
pub struct HashArgs {
    /// Paths to hash, byte for byte (no separator normalization)
    #[arg(required = true)]
    pub inputs: Vec<String>,
}

/// Archive layout options shared by `build` and `extract`.
#[derive(Debug, Clone, Args)]
pub struct LayoutArgs {
    /// Payload alignment in bytes (power of two)
    #[arg(long, env = "HASHPACK_ALIGNMENT", default_value_t = DEFAULT_ALIGNMENT)]
    pub alignment: u32,

    /// Directory whose files are named by literal hex keys
    #[arg(long, env = "HASHPACK_UNKNOWN_DIR", default_value = DEFAULT_UNKNOWN_DIR)]
    pub unknown_dir: String,

    /// Extensions never packed, comma-separated (replaces the default list)
    #[arg(long = "deny-ext", value_delimiter = ',')]
    pub denied_extensions: Option<Vec<String>>,
}

impl LayoutArgs {
    /// Library build options for these arguments
    pub fn build_options(&self) -> BuildOptions {
        let options = BuildOptions::default()
            .with_alignment(self.alignment)
            .with_unknown_dir(self.unknown_dir.clone());
        match &self.denied_extensions {
            Some(extensions) => options.with_denied_extensions(extensions),
            None => options,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !is_valid_alignment(self.alignment) {
            return Err(ConfigError::InvalidValue {
                name: "alignment",
                reason: format!("{} is not a non-zero power of two", self.alignment),
            });
        }
        if self.unknown_dir.is_empty() || self.unknown_dir.contains(['/', '\\']) {
            return Err(ConfigError::InvalidValue {
                name: "unknown-dir",
                reason: format!("{:?} must be a single path segment", self.unknown_dir),
            });
        }
        Ok(())
    }
}

/// Arguments for `build`.
#[derive(Debug, Clone, Args)]
pub struct BuildArgs {
    /// Directory to pack
    pub source: PathBuf,

    /// Table file to write
    pub table: PathBuf,

    /// Blob file to write
    pub blob: PathBuf,

    #[command(flatten)]
    pub layout: LayoutArgs,

    /// Abort on the first skipped file instead of reporting it
    #[arg(long)]
    pub fail_fast: bool,

    /// Replace existing table and blob files
    #[arg(long)]
    pub force: bool,
}

impl BuildArgs {
    fn validate(&self) -> Result<(), ConfigError> {
        self.layout.validate()?;
        require_dir(&self.source, "source directory")?;
        if self.table == self.blob {
            return Err(ConfigError::InvalidValue {
                name: "blob",
                reason: "table and blob must be different files".to_string(),
            });
        }
        if !self.force {
            refuse_existing(&self.table)?;
            refuse_existing(&self.blob)?;
        }
        Ok(())
    }
}

/// Name dataset locations.
#[derive(Debug, Clone, Default, Args)]
pub struct NameSourceArgs {
    /// Key set files, comma-separated or repeated
    #[arg(long = "key-set", env = "HASHPACK_KEY_SETS", value_delimiter = ',')]
    pub key_sets: Vec<PathBuf>,

    /// Cross-reference file
    #[arg(long = "xref", env = "HASHPACK_XREF")]
    pub cross_reference: Option<PathBuf>,
}

impl NameSourceArgs {
    /// Library sources for these arguments
    pub fn sources(&self) -> IndexSources {
        IndexSources {
            key_sets: self.key_sets.clone(),
            cross_reference: self.cross_reference.clone(),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for path in self.key_sets.iter().chain(&self.cross_reference) {
            if !path.is_file() {
                return Err(ConfigError::MissingRequired(format!(
                    "name dataset not found: {}",
                    path.display()
                )));
            }
        }
        Ok(())
    }
}

/// Arguments for `extract`.
#[derive(Debug, Clone, Args)]
pub struct ExtractArgs {
    /// Table file to read
    pub table: PathBuf,

    /// Blob file to read
    pub blob: PathBuf,

    /// Directory to write into
    pub out_dir: PathBuf,

    #[command(flatten)]
    pub layout: LayoutArgs,

    #[command(flatten)]
    pub names: NameSourceArgs,

    /// Write into a non-empty output directory
    #[arg(long)]
    pub force: bool,
}

impl ExtractArgs {
    /// Library extract options for these arguments
    pub fn extract_options(&self) -> ExtractOptions {
        ExtractOptions::for_rebuild(self.layout.build_options())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.layout.validate()?;
        self.names.validate()?;
        require_file(&self.table, "table file")?;
        require_file(&self.blob, "blob file")?;
        if !self.force && is_non_empty_dir(&self.out_dir) {
            return Err(ConfigError::OutputExists(self.out_dir.clone()));
        }
        if self.out_dir.exists() && !self.out_dir.is_dir() {
            return Err(ConfigError::InvalidValue {
                name: "out-dir",
                reason: format!("{} is not a directory", self.out_dir.display()),
            });
        }
        Ok(())
    }
}

/// Preimage search tuning shared by `lookup --brute-force` and `search`.
#[derive(Debug, Clone, Args)]
pub struct SearchTuning {
    /// Fixed text before the separator
    #[arg(long, default_value = "")]
    pub prefix: String,

    /// Extension appended after `.`
    #[arg(long, default_value = "")]
    pub suffix: String,

    /// Separator between prefix and random body
    #[arg(long, default_value_t = DEFAULT_SEPARATOR)]
    pub separator: char,

    /// Random characters per candidate
    #[arg(long, default_value_t = DEFAULT_BODY_LEN)]
    pub body_len: usize,

    /// Characters candidates are drawn from (defaults to [a-zA-Z0-9_-])
    #[arg(long)]
    pub alphabet: Option<String>,

    /// Worker threads (defaults to one per CPU)
    #[arg(long, env = "HASHPACK_WORKERS")]
    pub workers: Option<usize>,

    /// Give up after this many seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,
}

impl SearchTuning {
    /// Configure a search for `target`
    pub fn search(&self, target: hashpack_crypto::AssetKey) -> PreimageSearch {
        let mut search = PreimageSearch::new(target)
            .with_prefix(self.prefix.clone())
            .with_suffix(self.suffix.clone())
            .with_separator(self.separator)
            .with_body_len(self.body_len);
        if let Some(alphabet) = &self.alphabet {
            search = search.with_alphabet(alphabet.as_bytes());
        }
        if let Some(workers) = self.workers {
            search = search.with_workers(workers);
        }
        search
    }

    /// Timeout as a duration
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == Some(0) {
            return Err(ConfigError::InvalidValue {
                name: "workers",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.body_len == 0 {
            return Err(ConfigError::InvalidValue {
                name: "body-len",
                reason: "must be at least 1".to_string(),
            });
        }
        if let Some(alphabet) = &self.alphabet
            && (alphabet.is_empty() || !alphabet.is_ascii())
        {
            return Err(ConfigError::InvalidValue {
                name: "alphabet",
                reason: "must be non-empty ASCII".to_string(),
            });
        }
        if self.timeout_secs == Some(0) {
            return Err(ConfigError::InvalidValue {
                name: "timeout-secs",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Arguments for `lookup`.
#[derive(Debug, Clone, Args)]
pub struct LookupArgs {
    /// Key to resolve (hex, optional 0x prefix)
    pub key: String,

    #[command(flatten)]
    pub names: NameSourceArgs,

    /// Run a preimage search when no dataset knows the key
    #[arg(long)]
    pub brute_force: bool,

    #[command(flatten)]
    pub search: SearchTuning,
}

/// Arguments for `search`.
#[derive(Debug, Clone, Args)]
pub struct SearchArgs {
    /// Key to find a preimage for (hex, optional 0x prefix)
    pub key: String,

    #[command(flatten)]
    pub search: SearchTuning,
}

impl Cli {
    /// Parse configuration from command-line arguments.
    #[must_use]
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Validate configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Alignment is not a power of two or the unknown directory is not a
    ///   single path segment
    /// - An input file or directory does not exist
    /// - An output exists and `--force` was not given
    /// - Search tuning values are out of range
    pub fn validate(&self) -> Result<(), ConfigError> {
        match &self.command {
            Command::Hash(_) => Ok(()),
            Command::Build(args) => args.validate(),
            Command::Extract(args) => args.validate(),
            Command::Lookup(args) => {
                args.names.validate()?;
                args.search.validate()
            }
            Command::Search(args) => args.search.validate(),
        }
    }
}

fn require_dir(path: &Path, what: &str) -> Result<(), ConfigError> {
    if path.is_dir() {
        Ok(())
    } else {
        Err(ConfigError::MissingRequired(format!(
            "{what} not found: {}",
            path.display()
        )))
    }
}

fn require_file(path: &Path, what: &str) -> Result<(), ConfigError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(ConfigError::MissingRequired(format!(
            "{what} not found: {}",
            path.display()
        )))
    }
}

fn refuse_existing(path: &Path) -> Result<(), ConfigError> {
    if path.exists() {
        return Err(ConfigError::OutputExists(path.to_path_buf()));
    }
    Ok(())
}

fn is_non_empty_dir(path: &Path) -> bool {
    std::fs::read_dir(path).is_ok_and(|mut entries| entries.next().is_some())
}
