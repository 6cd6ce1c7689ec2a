use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use npm_auditor::{
    checker::{NpmRegistry, OsvClient},
    input::{read_lock_file, read_stdin},
    output::{print_report, to_json, OutputFormat},
    AuditOptions, AuditReport, Auditor, Config, LockFormat, MetadataCache, Rating, SeverityFilter,
    Target,
};
use std::process::ExitCode;
use std::str::FromStr;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// Exit codes for CI integration
mod exit_codes {
    pub const SUCCESS: u8 = 0;
    pub const CRITICAL_VULN: u8 = 2;
    pub const HIGH_VULN: u8 = 3;
    pub const MEDIUM_VULN: u8 = 4;
    pub const LOW_VULN: u8 = 5;
    pub const ERROR: u8 = 1;
}

#[derive(Parser)]
#[command(name = "npm-auditor")]
#[command(
    author,
    version,
    about = "Audit npm packages and lock files for known vulnerabilities"
)]
struct Cli {
    /// Log traversal details to stderr
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Audit a package, a lock file, or lock-file content on stdin (`-`)
    Audit {
        /// Package name, lock-file path, or `-` for stdin
        target: String,

        /// Package version to audit (defaults to the latest release)
        #[arg(short = 'V', long = "version", value_name = "VERSION")]
        package_version: Option<String>,

        /// Only report these severities (comma separated: LOW,MEDIUM,HIGH,CRITICAL)
        #[arg(short, long)]
        severity: Option<SeverityFilter>,

        /// Lock-file dialect (npm, yarn, pnpm); detected from the file name if omitted
        #[arg(short, long)]
        format: Option<LockFormat>,

        /// Output format (table, json)
        #[arg(short, long)]
        output: Option<String>,

        /// Write the report to a file as JSON
        #[arg(long)]
        out_file: Option<String>,

        /// Exit with error if vulnerabilities at or above this severity are found
        #[arg(long, value_enum)]
        fail_on: Option<FailLevel>,

        /// Number of lookups in flight at once
        #[arg(long)]
        concurrency: Option<usize>,

        /// Per-request timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Show or create config file
    Config {
        /// Generate default config file
        #[arg(long)]
        init: bool,

        /// Show config file path
        #[arg(long)]
        path: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum FailLevel {
    Critical,
    High,
    Medium,
    Low,
}

impl FailLevel {
    fn rating(self) -> Rating {
        match self {
            FailLevel::Critical => Rating::Critical,
            FailLevel::High => Rating::High,
            FailLevel::Medium => Rating::Medium,
            FailLevel::Low => Rating::Low,
        }
    }
}

/// Settings for one `audit` invocation, after flags are merged over config.
struct AuditRequest {
    target: Target,
    package_version: Option<String>,
    format: Option<LockFormat>,
    output: OutputFormat,
    out_file: Option<String>,
    fail_on: Option<FailLevel>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.debug);

    match run(cli.command).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(exit_codes::ERROR)
        }
    }
}

fn init_logging(debug: bool) {
    let default = if debug { "npm_auditor=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(command: Commands) -> Result<u8> {
    let mut config = Config::load().unwrap_or_else(|e| {
        warn!("Ignoring unreadable config file: {:#}", e);
        Config::default()
    });

    match command {
        Commands::Audit {
            target,
            package_version,
            severity,
            format,
            output,
            out_file,
            fail_on,
            concurrency,
            timeout,
        } => {
            if let Some(concurrency) = concurrency {
                config.concurrency = concurrency;
            }
            if let Some(timeout) = timeout {
                config.request_timeout_secs = timeout;
            }

            let output = output.unwrap_or_else(|| config.default_format.clone());
            let output = OutputFormat::from_str(&output).map_err(|e| anyhow::anyhow!(e))?;

            let mut options = AuditOptions::from_config(&config);
            if let Some(severity) = severity {
                options.severity = severity;
            }

            let request = AuditRequest {
                target: Target::parse(&target),
                package_version,
                format,
                output,
                out_file,
                fail_on,
            };
            run_audit(&config, options, request).await
        }
        Commands::Config { init, path } => {
            handle_config(init, path)?;
            Ok(exit_codes::SUCCESS)
        }
    }
}

async fn run_audit(config: &Config, options: AuditOptions, request: AuditRequest) -> Result<u8> {
    let is_interactive = request.output == OutputFormat::Table;
    let timeout = config.request_timeout();

    let registry = MetadataCache::new(NpmRegistry::with_settings(
        &config.registry_url,
        timeout,
        config.max_response_bytes,
    ));
    let osv = OsvClient::with_settings(&config.osv_url, timeout, config.max_response_bytes);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let auditor = Auditor::new(registry, osv, options).with_cancellation(cancel);

    let progress = if is_interactive {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::with_template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.enable_steady_tick(Duration::from_millis(100));
        pb.set_message(format!("Auditing {}...", request.target.label()));
        Some(pb)
    } else {
        None
    };

    let result = audit_target(&auditor, &request).await;

    if let Some(pb) = progress {
        pb.finish_and_clear();
    }
    let report = result?;

    // Handle output
    if let Some(path) = &request.out_file {
        // Tables are for terminals; files always get JSON
        let contents = to_json(&report)?;
        std::fs::write(path, contents).with_context(|| format!("Failed to write {}", path))?;
        if is_interactive {
            println!("Results written to: {}", path);
        }
    } else {
        print_report(&report, request.output)?;
    }

    // Determine exit code based on --fail-on
    Ok(determine_exit_code(&report, request.fail_on))
}

async fn audit_target(
    auditor: &Auditor<MetadataCache<NpmRegistry>, OsvClient>,
    request: &AuditRequest,
) -> Result<AuditReport> {
    let target = &request.target;
    let lock_format = || {
        request
            .format
            .or_else(|| target.detected_format())
            .unwrap_or(LockFormat::Npm)
    };

    if request.package_version.is_some() && !matches!(target, Target::Package(_)) {
        warn!("--version only applies to package audits; ignoring it");
    }

    let report = match target {
        Target::Package(name) => {
            auditor
                .audit_package(name, request.package_version.as_deref())
                .await?
        }
        Target::LockFile(path) => {
            let content = read_lock_file(path)?;
            auditor
                .audit_lock(&content, lock_format(), &target.label())
                .await?
        }
        Target::Stdin => {
            let content = tokio::task::spawn_blocking(read_stdin).await??;
            auditor
                .audit_lock(&content, lock_format(), &target.label())
                .await?
        }
    };
    Ok(report)
}

/// Determine the exit code based on the findings and --fail-on setting
fn determine_exit_code(report: &AuditReport, fail_on: Option<FailLevel>) -> u8 {
    let Some(fail_on) = fail_on else {
        return exit_codes::SUCCESS;
    };

    match report.worst_rating() {
        Some(worst) if worst.priority() <= fail_on.rating().priority() => match worst {
            Rating::Critical => exit_codes::CRITICAL_VULN,
            Rating::High => exit_codes::HIGH_VULN,
            Rating::Medium => exit_codes::MEDIUM_VULN,
            Rating::Low => exit_codes::LOW_VULN,
            Rating::Unknown | Rating::NotApplicable => exit_codes::SUCCESS,
        },
        _ => exit_codes::SUCCESS,
    }
}

fn handle_config(init: bool, show_path: bool) -> Result<()> {
    let path = Config::config_path();

    match (show_path, init, path.is_file()) {
        (true, _, _) => println!("{}", path.display()),
        (false, true, true) => {
            println!("Config file already exists at: {}", path.display());
        }
        (false, true, false) => {
            Config::default().save()?;
            println!("Created {} with the defaults:", path.display());
            println!();
            println!("{}", Config::generate_default_config());
        }
        (false, false, true) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            println!("# {}", path.display());
            println!("{}", content);
        }
        (false, false, false) => {
            println!("No config file at {}", path.display());
            println!("Run 'npm-auditor config --init' to create one.");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use npm_auditor::{Category, Finding};

    fn report_with(ratings: &[Rating]) -> AuditReport {
        let mut report = AuditReport::new("app");
        report.findings = ratings
            .iter()
            .enumerate()
            .map(|(i, rating)| Finding {
                package: format!("pkg{}", i),
                version: "1.0.0".to_string(),
                id: format!("GHSA-{}", i),
                cve: None,
                summary: String::new(),
                severity: None,
                vector: None,
                rating: *rating,
                fixed_version: None,
                category: Category::Mandatory,
                path: vec![format!("pkg{}", i)],
            })
            .collect();
        report
    }

    #[test]
    fn test_exit_code_without_fail_on() {
        let report = report_with(&[Rating::Critical]);
        assert_eq!(determine_exit_code(&report, None), exit_codes::SUCCESS);
    }

    #[test]
    fn test_exit_code_reports_worst_rating() {
        let report = report_with(&[Rating::Medium, Rating::High]);
        assert_eq!(
            determine_exit_code(&report, Some(FailLevel::Low)),
            exit_codes::HIGH_VULN
        );
        assert_eq!(
            determine_exit_code(&report, Some(FailLevel::High)),
            exit_codes::HIGH_VULN
        );
        assert_eq!(
            determine_exit_code(&report, Some(FailLevel::Critical)),
            exit_codes::SUCCESS
        );
    }

    #[test]
    fn test_unrated_findings_never_fail() {
        let report = report_with(&[Rating::Unknown, Rating::NotApplicable]);
        assert_eq!(
            determine_exit_code(&report, Some(FailLevel::Low)),
            exit_codes::SUCCESS
        );
    }

    #[test]
    fn test_cli_parses_audit_flags() {
        let cli = Cli::try_parse_from([
            "npm-auditor",
            "audit",
            "lodash",
            "-V",
            "4.17.20",
            "-s",
            "high,critical",
            "--fail-on",
            "high",
        ])
        .unwrap();

        match cli.command {
            Commands::Audit {
                target,
                package_version,
                severity,
                ..
            } => {
                assert_eq!(target, "lodash");
                assert_eq!(package_version.as_deref(), Some("4.17.20"));
                let severity = severity.unwrap();
                assert!(severity.accepts(Rating::High));
                assert!(!severity.accepts(Rating::Low));
            }
            Commands::Config { .. } => panic!("expected audit"),
        }
    }

    #[test]
    fn test_cli_rejects_unknown_severity() {
        let result = Cli::try_parse_from(["npm-auditor", "audit", "lodash", "-s", "urgent"]);
        assert!(result.is_err());
    }
}
