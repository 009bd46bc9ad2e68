//! unproto - Decode Protocol Buffer payloads without a schema
//!
//! This tool reads protobuf-encoded files, decodes them field by field
//! without a `.proto` definition, and prints the inferred structure.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, ValueEnum};
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace, warn, Level};
use tracing_subscriber::EnvFilter;
use unproto_core::decode::DEFAULT_MAX_DEPTH;
use unproto_core::{
    render_text, walk, Decoder, DecoderConfig, Disambiguation, Message, StatsVisitor,
};
use walkdir::WalkDir;

/// Decode Protocol Buffer payloads without a schema
#[derive(Parser, Debug)]
#[command(name = "unproto")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(flatten)]
    input: InputMode,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Output format
    #[arg(long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Input files contain hex text instead of raw bytes
    #[arg(long)]
    hex: bool,

    /// Maximum nested message depth before decoding is aborted
    #[arg(long, env = "UNPROTO_MAX_DEPTH", default_value_t = DEFAULT_MAX_DEPTH)]
    max_depth: usize,

    /// Keep printable length-delimited payloads as text even if they parse as messages
    #[arg(long)]
    prefer_text: bool,
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct InputMode {
    /// Path to a single encoded message
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Path to a directory of encoded messages to process
    #[arg(short, long)]
    directory: Option<PathBuf>,
}

/// Output format for decoded messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Pretty-printed JSON keyed by field number
    Json,
    /// Indented text listing
    Text,
    /// Summary counts only
    Stats,
}

/// Tracks seen payloads so identical inputs are decoded once
#[derive(Default)]
struct PayloadRegistry {
    /// Maps content hash -> first path it was seen at
    seen: HashMap<String, PathBuf>,
    /// Statistics
    stats: RegistryStats,
}

#[derive(Default)]
struct RegistryStats {
    total_found: usize,
    duplicates_skipped: usize,
    decoded: usize,
    failed: usize,
}

impl PayloadRegistry {
    fn new() -> Self {
        Self::default()
    }

    /// Compute a short hash of the content (first 8 chars of blake3)
    fn content_hash(data: &[u8]) -> String {
        let hash = blake3::hash(data);
        hash.to_hex()[..8].to_string()
    }

    /// Register a payload; returns its hash, or `None` if identical content
    /// was already registered
    fn register(&mut self, path: &Path, data: &[u8]) -> Option<String> {
        self.stats.total_found += 1;

        let content_hash = Self::content_hash(data);
        if let Some(first) = self.seen.get(&content_hash) {
            debug!(
                "Skipping duplicate: {} (same content as {}, hash: {})",
                path.display(),
                first.display(),
                content_hash
            );
            self.stats.duplicates_skipped += 1;
            return None;
        }

        self.seen.insert(content_hash.clone(), path.to_path_buf());
        Some(content_hash)
    }

    fn print_summary(&self) {
        info!(
            "Summary: {} found, {} duplicates skipped, {} decoded, {} failed",
            self.stats.total_found,
            self.stats.duplicates_skipped,
            self.stats.decoded,
            self.stats.failed
        );
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Dispatch based on input mode
    if let Some(ref file) = cli.input.file {
        process_single_file(&cli, file)
    } else if let Some(ref directory) = cli.input.directory {
        process_directory(&cli, directory)
    } else {
        bail!("Either --file or --directory must be specified")
    }
}

/// Builds the decoder described by the command line
fn decoder(cli: &Cli) -> Decoder {
    let disambiguation = if cli.prefer_text {
        Disambiguation::PrintableTextFirst
    } else {
        Disambiguation::MessageFirst
    };

    Decoder::with_config(
        DecoderConfig::new()
            .max_depth(cli.max_depth)
            .disambiguation(disambiguation),
    )
}

/// Decode a single file and print the result
fn process_single_file(cli: &Cli, file: &Path) -> Result<()> {
    if !file.exists() {
        bail!("Input file does not exist: {}", file.display());
    }
    if !file.is_file() {
        bail!("Input path is not a file: {}", file.display());
    }

    let data = read_input(file, cli.hex)?;
    let message = decoder(cli)
        .decode(&data)
        .with_context(|| format!("Failed to decode {}", file.display()))?;

    let output = render(&message, cli.format)?;
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(output.as_bytes())?;

    Ok(())
}

/// Decode every file in a directory recursively
fn process_directory(cli: &Cli, directory: &Path) -> Result<()> {
    if !directory.exists() {
        bail!("Directory does not exist: {}", directory.display());
    }
    if !directory.is_dir() {
        bail!("Path is not a directory: {}", directory.display());
    }

    info!("Scanning directory: {}", directory.display());

    let decoder = decoder(cli);
    let mut registry = PayloadRegistry::new();
    let mut stdout = std::io::stdout().lock();

    // Walk the directory
    for entry in WalkDir::new(directory)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();

        // Skip directories
        if !path.is_file() {
            continue;
        }

        // Skip hidden files
        if path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with('.'))
            .unwrap_or(false)
        {
            trace!("Skipping hidden file: {}", path.display());
            continue;
        }

        let data = match read_input(path, cli.hex) {
            Ok(data) => data,
            Err(e) => {
                // Log error but continue with other files
                warn!("Error reading {}: {:#}", path.display(), e);
                registry.stats.failed += 1;
                continue;
            }
        };

        let Some(content_hash) = registry.register(path, &data) else {
            continue;
        };

        debug!("Decoding {} ({} bytes)", path.display(), data.len());
        match decoder.decode(&data) {
            Ok(message) => {
                registry.stats.decoded += 1;
                writeln!(stdout, "==> {} ({}) <==", path.display(), content_hash)?;
                stdout.write_all(render(&message, cli.format)?.as_bytes())?;
                writeln!(stdout)?;
            }
            Err(e) => {
                warn!("Failed to decode {}: {}", path.display(), e);
                registry.stats.failed += 1;
            }
        }
    }

    registry.print_summary();
    Ok(())
}

/// Read an input file, decoding hex text if requested
fn read_input(path: &Path, hex_text: bool) -> Result<Vec<u8>> {
    trace!("Reading {}", path.display());
    let data =
        fs::read(path).with_context(|| format!("Failed to read input file: {}", path.display()))?;

    if !hex_text {
        return Ok(data);
    }

    let text = String::from_utf8(data)
        .with_context(|| format!("Hex input is not valid UTF-8: {}", path.display()))?;
    let digits: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    hex::decode(&digits).with_context(|| format!("Invalid hex input: {}", path.display()))
}

/// Render a decoded message in the requested format
fn render(message: &Message, format: OutputFormat) -> Result<String> {
    let output = match format {
        OutputFormat::Json => {
            let mut json = serde_json::to_string_pretty(&message.to_json())
                .context("Failed to serialize JSON")?;
            json.push('\n');
            json
        }
        OutputFormat::Text => render_text(message),
        OutputFormat::Stats => {
            let mut stats = StatsVisitor::default();
            walk(message, &mut stats).context("Failed to collect statistics")?;
            format!(
                "messages: {}\nvalues: {}\nintegers: {}\nstrings: {}\nbytes: {}\nmax depth: {}\n",
                stats.message_count,
                stats.value_count,
                stats.integer_count,
                stats.string_count,
                stats.bytes_count,
                stats.max_depth
            )
        }
    };
    Ok(output)
}
