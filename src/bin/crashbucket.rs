use anyhow::Context;
use clap::{Parser, Subcommand};
use crashbucket::assertion::extract_abort_message;
use crashbucket::config::TriageConfig;
use crashbucket::sanitize::sanitize_patterns;
use crashbucket::{store, Report, ReportEntry, Signature, TriageEngine};
use serde_json::json;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Once};

fn init_parallelism() {
    static START: Once = Once::new();
    START.call_once(|| {
        let n = num_cpus::get();
        let _ = rayon::ThreadPoolBuilder::new().num_threads(n).build_global();
    });
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .with_writer(io::stderr)
        .init();
}

#[derive(Parser, Debug)]
#[command(name = "crashbucket", version, about = "Crash report triage against bucket signatures")]
struct Cli {
    /// Triage settings (TOML)
    #[arg(long = "config", global = true)]
    config: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(long = "verbose", short = 'v', global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the abort message found in crash output and its sanitized pattern
    Extract {
        /// Output file (`-` for stdin)
        input: String,
        /// Ignore sanitizer and libc aborts
        #[arg(long = "program-only", default_value_t = false)]
        program_only: bool,
    },
    /// Print a starting signature for a report
    Signature { report: PathBuf },
    /// Test one signature against one report and show each symptom result
    Match { signature: PathBuf, report: PathBuf },
    /// Triage a single report against the bucket store
    Triage {
        #[arg(long = "buckets")]
        buckets: PathBuf,
        #[arg(long = "report")]
        report: PathBuf,
    },
    /// Triage every pending entry of a report store
    TriageAll {
        #[arg(long = "buckets")]
        buckets: PathBuf,
        #[arg(long = "reports")]
        reports: PathBuf,
        /// Where to write updated entries (defaults to stdout)
        #[arg(long = "out")]
        out: Option<PathBuf>,
        #[arg(long = "cache-capacity")]
        cache_capacity: Option<usize>,
        #[arg(long = "max-buckets")]
        max_buckets: Option<usize>,
    },
}

fn read_lines(input: &str) -> io::Result<Vec<String>> {
    if input == "-" {
        io::stdin().lock().lines().collect()
    } else {
        BufReader::new(File::open(input)?).lines().collect()
    }
}

fn load_report(path: &Path, program_only: bool) -> anyhow::Result<Report> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let value = serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
    Report::from_value(value, program_only).with_context(|| format!("decoding report {}", path.display()))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    init_parallelism();

    let mut config = match &cli.config {
        Some(path) => TriageConfig::from_file(path).with_context(|| format!("loading {}", path.display()))?,
        None => TriageConfig::default(),
    };

    match cli.command {
        Command::Extract { input, program_only } => {
            let lines = read_lines(&input).with_context(|| format!("reading {input}"))?;
            let found = extract_abort_message(&lines, program_only || config.program_aborts_only);
            let patterns = found.as_ref().map(|m| sanitize_patterns(&m.lines()));
            let out = json!({ "message": found, "patterns": patterns });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        Command::Signature { report } => {
            let report = load_report(&report, config.program_aborts_only)?;
            println!("{}", report.create_signature()?);
        }
        Command::Match { signature, report } => {
            let text = std::fs::read_to_string(&signature)
                .with_context(|| format!("reading {}", signature.display()))?;
            let signature = Signature::parse(&text)?;
            let report = load_report(&report, config.program_aborts_only)?;
            let mut trace = Vec::new();
            let matched = signature.matches_traced(&report, |symptom, hit| {
                trace.push(json!({ "symptom": symptom.source(), "matched": hit }));
            });
            let out = json!({ "matched": matched, "evaluated": trace });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        Command::Triage { buckets, report } => {
            let buckets = store::load_buckets(&buckets)?;
            let report = load_report(&report, config.program_aborts_only)?;
            let mut engine = TriageEngine::new(config);
            let outcome = engine.triage(&report, &buckets);
            let out = json!({
                "short_signature": report.short_signature,
                "bucket": outcome.bucket,
                "buckets_tested": outcome.buckets_tested,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        Command::TriageAll { buckets, reports, out, cache_capacity, max_buckets } => {
            if let Some(cap) = cache_capacity {
                config.cache_capacity = cap;
            }
            if max_buckets.is_some() {
                config.max_buckets_scanned = max_buckets;
            }
            let buckets = store::load_buckets(&buckets)?;
            let mut entries: Vec<ReportEntry> = store::load_entries(&reports, config.program_aborts_only)?;

            let running = Arc::new(AtomicBool::new(true));
            {
                let r = running.clone();
                let _ = ctrlc::set_handler(move || {
                    r.store(false, Ordering::SeqCst);
                });
            }

            let mut engine = TriageEngine::new(config);
            let done = engine.triage_pending(&mut entries, &buckets, || running.load(Ordering::SeqCst));
            let bucketed = entries.iter().filter(|e| e.bucket.is_some()).count();
            eprintln!("[triage] triaged={} bucketed={} total={}", done, bucketed, entries.len());

            match out {
                Some(path) => {
                    let f = File::create(&path).with_context(|| format!("creating {}", path.display()))?;
                    store::write_entries(BufWriter::new(f), &entries)?;
                }
                None => store::write_entries(io::stdout().lock(), &entries)?,
            }
        }
    }
    Ok(())
}

