// CLI entry point
//
// Subcommands: scan a repository, re-format a saved report, write the
// default configuration, validate a single identifier. Exit codes: 0 clean,
// 1 when findings at HIGH or above exist, 2 on startup failure.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use pi_scanner::report::{to_sarif, write_csv, ScanReport};
use pi_scanner::risk_assessment::RiskLevel;
use pi_scanner::testdata;
use pi_scanner::types::PIType;
use pi_scanner::validators::Validators;
use pi_scanner::{ScanConfig, Scanner};

#[derive(Parser)]
#[command(name = "pi-scanner", version, about = "Scan repositories for Australian PI")]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbose (debug-level) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan a repository directory
    Scan {
        /// Repository root to scan
        path: PathBuf,

        #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,

        /// Report destination; stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Worker count override
        #[arg(long)]
        workers: Option<usize>,
    },

    /// Re-format a saved JSON report
    Report {
        /// A report produced by `scan --format json`
        input: PathBuf,

        #[arg(long, value_enum, default_value_t = OutputFormat::Csv)]
        format: OutputFormat,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write the default configuration file
    Configure {
        /// Destination; the user config directory when omitted
        #[arg(long)]
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Validate one identifier against its checksum or form rules
    Validate {
        /// PI type (TFN, ABN, ACN, MEDICARE, BSB, CREDIT_CARD, ...)
        pi_type: String,

        /// Value to check; omit with --sample
        value: Option<String>,

        /// Print a generated, checksum-valid sample instead
        #[arg(long)]
        sample: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Csv,
    Sarif,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "fatal");
            ExitCode::from(2)
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Command::Scan { path, format, output, workers } => {
            let mut config = load_config(cli.config.as_deref())?;
            if let Some(workers) = workers {
                config.workers = workers;
            }

            let report = Scanner::new(config).scan_path(&path).await?;
            print_summary(&report);
            emit(&report, format, output.as_deref())?;

            let has_high = report.findings.iter().any(|f| {
                f.risk
                    .as_ref()
                    .map(|r| r.risk_level >= RiskLevel::High)
                    .unwrap_or(false)
            });
            Ok(if has_high { ExitCode::from(1) } else { ExitCode::SUCCESS })
        }

        Command::Report { input, format, output } => {
            let raw = std::fs::read_to_string(&input)
                .with_context(|| format!("reading {}", input.display()))?;
            let report: ScanReport =
                serde_json::from_str(&raw).context("parsing report JSON")?;
            emit(&report, format, output.as_deref())?;
            Ok(ExitCode::SUCCESS)
        }

        Command::Configure { path, force } => {
            let path = match path.or_else(ScanConfig::default_path) {
                Some(path) => path,
                None => return Err(anyhow!("no config directory available, pass --path")),
            };
            if path.exists() && !force {
                return Err(anyhow!(
                    "{} already exists, use --force to overwrite",
                    path.display()
                ));
            }
            ScanConfig::default().save(&path)?;
            info!(path = %path.display(), "wrote default configuration");
            Ok(ExitCode::SUCCESS)
        }

        Command::Validate { pi_type, value, sample } => {
            let pi_type = PIType::from_str(&pi_type).map_err(|e| anyhow!(e))?;

            if sample {
                let mut rng = StdRng::from_entropy();
                let generated = match pi_type {
                    PIType::Tfn => testdata::generate_tfn(&mut rng),
                    PIType::Abn => testdata::generate_abn(&mut rng),
                    PIType::Acn => testdata::generate_acn(&mut rng),
                    PIType::Medicare => testdata::generate_medicare(&mut rng),
                    other => return Err(anyhow!("no generator for {other}")),
                };
                println!("{generated}");
                return Ok(ExitCode::SUCCESS);
            }

            let value = value.ok_or_else(|| anyhow!("provide a value or --sample"))?;
            let config = load_config(cli.config.as_deref())?;
            let validators = Validators::with_bsb_prefixes(config.bank_bsb_prefixes);
            if validators.validate(pi_type, &value) {
                println!("valid {pi_type}");
                Ok(ExitCode::SUCCESS)
            } else {
                println!("invalid {pi_type}");
                Ok(ExitCode::from(1))
            }
        }
    }
}

fn load_config(explicit: Option<&Path>) -> Result<ScanConfig> {
    match explicit {
        Some(path) => ScanConfig::load_or_default(Some(path)),
        None => match ScanConfig::default_path() {
            Some(path) if path.exists() => ScanConfig::load(&path),
            _ => Ok(ScanConfig::default()),
        },
    }
}

fn emit(report: &ScanReport, format: OutputFormat, output: Option<&Path>) -> Result<()> {
    let rendered = match format {
        OutputFormat::Json => serde_json::to_string_pretty(&report.sanitized())?,
        OutputFormat::Sarif => serde_json::to_string_pretty(&to_sarif(report))?,
        OutputFormat::Csv => {
            let mut buffer = Vec::new();
            write_csv(report, &mut buffer)?;
            String::from_utf8(buffer).context("csv output was not utf-8")?
        }
    };

    match output {
        Some(path) => std::fs::write(path, rendered)
            .with_context(|| format!("writing {}", path.display()))?,
        None => println!("{rendered}"),
    }
    Ok(())
}

fn print_summary(report: &ScanReport) {
    let s = &report.summary;
    info!(
        scan_id = %s.scan_id,
        files = s.files_scanned,
        bytes = s.bytes_scanned,
        findings = s.findings_total,
        critical = s.by_risk_level.critical,
        high = s.by_risk_level.high,
        medium = s.by_risk_level.medium,
        low = s.by_risk_level.low,
        validated = s.validated_count,
        test_data = s.test_data_count,
        errors = s.errors.len(),
        "scan complete"
    );
    for (file, count) in &s.top_files {
        info!(file = %file, findings = count, "top affected file");
    }
}
