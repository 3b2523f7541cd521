//! Command execution and output rendering.
//!
//! Each command produces a serializable outcome. Outcomes are printed either
//! as human-readable text or, with `--json`, as one pretty-printed JSON
//! document.

use crate::config::{
    BuildArgs, Cli, Command, ExtractArgs, HashArgs, LookupArgs, SearchArgs, SearchTuning,
};
use crate::error::CommandError;
use hashpack_crypto::{AssetKey, CancelToken, PreimageSearch, SearchError, hash_path};
use hashpack_formats::archive::{
    ArchiveBuilder, ArchiveReader, BuildReport, ExtractReport, extract,
};
use hashpack_formats::names::{LoadReport, LookupResult, NameIndex, ResolveResult};
use serde::Serialize;
use std::io::Write;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Key of one `hash` input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HashedInput {
    /// Input as given
    pub input: String,
    /// Its key
    pub key: AssetKey,
    /// The key with its bytes reversed
    pub swapped: AssetKey,
}

/// Result of `build`.
#[derive(Debug, Clone, Serialize)]
pub struct BuildOutcome {
    /// Table file written
    pub table: String,
    /// Blob file written
    pub blob: String,
    /// Build summary
    pub report: BuildReport,
}

/// Result of `extract`.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractOutcome {
    /// Output directory
    pub out_dir: String,
    /// Extraction summary
    pub report: ExtractReport,
}

/// Result of a preimage search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchOutcome {
    /// Key searched for
    pub target: AssetKey,
    /// Matching string, if one was found
    pub preimage: Option<String>,
    /// Candidates tried
    pub attempts: u64,
    /// Wall-clock time spent, in milliseconds
    pub elapsed_ms: u64,
}

/// Result of `lookup`.
#[derive(Debug, Clone, Serialize)]
pub struct LookupOutcome {
    /// Dataset load summary
    pub datasets: LoadReport,
    /// Results for the key in both byte orders
    pub result: LookupResult,
    /// Preimage search run because nothing was found
    pub search: Option<SearchOutcome>,
}

/// Output of any command.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Outcome {
    /// `hash`
    Hash {
        /// One entry per input
        keys: Vec<HashedInput>,
    },
    /// `build`
    Build(BuildOutcome),
    /// `extract`
    Extract(ExtractOutcome),
    /// `lookup`
    Lookup(LookupOutcome),
    /// `search`
    Search(SearchOutcome),
}

impl Outcome {
    /// Check whether the command achieved what was asked
    ///
    /// A lookup miss without brute force, or a search that ran out of time,
    /// still prints a result but is not a success.
    pub fn is_success(&self) -> bool {
        match self {
            Self::Hash { .. } | Self::Build(_) | Self::Extract(_) => true,
            Self::Lookup(lookup) => match &lookup.search {
                Some(search) => search.preimage.is_some(),
                None => !lookup.result.is_miss(),
            },
            Self::Search(search) => search.preimage.is_some(),
        }
    }

    /// Print the outcome as text or JSON
    pub fn render(&self, json: bool, out: &mut dyn Write) -> Result<(), CommandError> {
        if json {
            serde_json::to_writer_pretty(&mut *out, self)?;
            writeln!(out)?;
            return Ok(());
        }

        match self {
            Self::Hash { keys } => {
                for hashed in keys {
                    writeln!(
                        out,
                        "{}  {}  (swapped {})",
                        hashed.key, hashed.input, hashed.swapped
                    )?;
                }
            }
            Self::Build(build) => render_build(build, out)?,
            Self::Extract(extracted) => {
                let report = &extracted.report;
                writeln!(
                    out,
                    "Extracted {} entries to {} ({} named, {} unnamed, {} names rejected)",
                    report.total(),
                    extracted.out_dir,
                    report.named,
                    report.unnamed,
                    report.rejected_names
                )?;
            }
            Self::Lookup(lookup) => render_lookup(lookup, out)?,
            Self::Search(search) => render_search(search, out)?,
        }
        Ok(())
    }
}

/// Validate `cli` and run its command
pub fn run(cli: &Cli) -> Result<Outcome, CommandError> {
    cli.validate()?;
    match &cli.command {
        Command::Hash(args) => Ok(hash_inputs(args)),
        Command::Build(args) => build_archive(args).map(Outcome::Build),
        Command::Extract(args) => extract_archive(args).map(Outcome::Extract),
        Command::Lookup(args) => lookup_key(args).map(Outcome::Lookup),
        Command::Search(args) => search_key(args).map(Outcome::Search),
    }
}

/// Hash every input
pub fn hash_inputs(args: &HashArgs) -> Outcome {
    let keys = args
        .inputs
        .iter()
        .map(|input| {
            let key = hash_path(input);
            HashedInput {
                input: input.clone(),
                key,
                swapped: key.swap_bytes(),
            }
        })
        .collect();
    Outcome::Hash { keys }
}

/// Pack a directory
pub fn build_archive(args: &BuildArgs) -> Result<BuildOutcome, CommandError> {
    let options = args.layout.build_options().with_fail_fast(args.fail_fast);
    let report = ArchiveBuilder::new(options).build(&args.source, &args.table, &args.blob)?;
    Ok(BuildOutcome {
        table: args.table.display().to_string(),
        blob: args.blob.display().to_string(),
        report,
    })
}

/// Unpack an archive
pub fn extract_archive(args: &ExtractArgs) -> Result<ExtractOutcome, CommandError> {
    let names = if args.names.sources().is_empty() {
        None
    } else {
        Some(NameIndex::load(&args.names.sources())?)
    };

    let mut reader = ArchiveReader::open(&args.table, &args.blob)?;
    let report = extract(
        &mut reader,
        &args.out_dir,
        names.as_ref(),
        &args.extract_options(),
    )?;
    Ok(ExtractOutcome {
        out_dir: args.out_dir.display().to_string(),
        report,
    })
}

/// Resolve a key, brute-forcing it on a miss when asked
pub fn lookup_key(args: &LookupArgs) -> Result<LookupOutcome, CommandError> {
    let index = NameIndex::load(&args.names.sources())?;
    let result = index.lookup(&args.key)?;

    let search = if result.is_miss() && args.brute_force {
        info!(key = %result.forward.key, "No dataset knows the key, starting preimage search");
        Some(run_search(&args.search, result.forward.key)?)
    } else {
        None
    };

    Ok(LookupOutcome {
        datasets: index.report().clone(),
        result,
        search,
    })
}

/// Search for a preimage
pub fn search_key(args: &SearchArgs) -> Result<SearchOutcome, CommandError> {
    let target = AssetKey::parse_query(&args.key)?;
    run_search(&args.search, target)
}

/// Run a configured search, cancelling it when the timeout elapses
fn run_search(tuning: &SearchTuning, target: AssetKey) -> Result<SearchOutcome, CommandError> {
    let search = tuning.search(target);
    let started = Instant::now();
    let result = run_with_timeout(&search, tuning.timeout());

    let preimage = match result {
        Ok(found) => Some(found),
        Err(SearchError::NoPreimageFound { .. }) => None,
        Err(e) => return Err(e.into()),
    };

    Ok(SearchOutcome {
        target,
        preimage,
        attempts: search.progress().attempts(),
        elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
    })
}

fn run_with_timeout(
    search: &PreimageSearch,
    timeout: Option<Duration>,
) -> Result<String, SearchError> {
    let cancel = CancelToken::new();
    let Some(timeout) = timeout else {
        return search.run(&cancel);
    };

    thread::scope(|scope| {
        let (done, finished) = mpsc::channel::<()>();
        let watchdog = cancel.clone();
        scope.spawn(move || {
            if matches!(finished.recv_timeout(timeout), Err(RecvTimeoutError::Timeout)) {
                warn!(timeout_secs = timeout.as_secs(), "Search timed out, cancelling");
                watchdog.cancel();
            }
        });

        let result = search.run(&cancel);
        drop(done);
        result
    })
}

fn render_build(build: &BuildOutcome, out: &mut dyn Write) -> Result<(), CommandError> {
    let report = &build.report;
    writeln!(
        out,
        "Wrote {} entries to {} + {} ({} bytes)",
        report.written, build.table, build.blob, report.blob_size
    )?;
    writeln!(
        out,
        "Skipped {}: {} denied, {} not a hash, {} collisions, {} unreadable, {} too large",
        report.skipped_count(),
        report.denied,
        report.not_a_hash,
        report.collisions,
        report.unreadable,
        report.too_large
    )?;
    for skipped in &report.skipped {
        writeln!(out, "  {}: {}", skipped.path, skipped.reason)?;
    }
    Ok(())
}

fn render_resolve(
    label: &str,
    result: &ResolveResult,
    out: &mut dyn Write,
) -> Result<(), CommandError> {
    if result.is_empty() {
        writeln!(out, "{label} {}: no match", result.key)?;
        return Ok(());
    }
    writeln!(out, "{label} {}:", result.key)?;
    if let Some(name) = &result.literal_name {
        writeln!(out, "  name: {name}")?;
    }
    if !result.found_in_sets.is_empty() {
        writeln!(out, "  found in: {}", result.found_in_sets.join(", "))?;
    }
    for usage in &result.usages {
        match &usage.name {
            Some(name) => writeln!(out, "  used in: {name} ({})", usage.key)?,
            None => writeln!(out, "  used in: {}", usage.key)?,
        }
    }
    Ok(())
}

fn render_lookup(lookup: &LookupOutcome, out: &mut dyn Write) -> Result<(), CommandError> {
    render_resolve("Key", &lookup.result.forward, out)?;
    render_resolve("Swapped", &lookup.result.swapped, out)?;
    if lookup.result.swapped_only_hit() {
        writeln!(
            out,
            "Only the byte-swapped key matched; the input is probably in reversed byte order"
        )?;
    }
    if let Some(search) = &lookup.search {
        render_search(search, out)?;
    }
    Ok(())
}

fn render_search(search: &SearchOutcome, out: &mut dyn Write) -> Result<(), CommandError> {
    match &search.preimage {
        Some(found) => writeln!(
            out,
            "Preimage for {}: {found} ({} attempts, {} ms)",
            search.target, search.attempts, search.elapsed_ms
        )?,
        None => writeln!(
            out,
            "No preimage for {} after {} attempts ({} ms)",
            search.target, search.attempts, search.elapsed_ms
        )?,
    }
    Ok(())
}
