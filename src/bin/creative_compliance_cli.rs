//! Creative Compliance CLI - bridge interface for the web app
//!
//! Commands: rules, formats, validate, resize, report, certify
//! Outputs JSON (or markdown for `report`) to stdout, logs to stderr
//! Returns 2 on failing validation or rejected certification

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde_json::json;
use tracing_subscriber::EnvFilter;

use creative_compliance::{
    render_compliance_report, AuditEntry, Certifier, ComplianceError, ComplianceStatus, CreativeEngine,
    CreativeSubmission, Ed25519Signer, EngineConfig, LayoutGraph,
};

const SIGNING_KEY_ENV: &str = "CREATIVE_SIGNING_KEY";

#[derive(Parser)]
#[command(name = "creative-compliance-cli")]
#[command(about = "Creative Compliance CLI - retail creative validation and resize")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to engine config (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Rules directory (overrides config)
    #[arg(long)]
    rules_dir: Option<PathBuf>,

    /// Formats directory (overrides config)
    #[arg(long)]
    formats_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// List rules in scope
    Rules {
        /// Retailer scope (general rules are always included)
        #[arg(short, long)]
        retailer: Option<String>,
    },

    /// List output formats
    Formats,

    /// Validate a creative
    Validate {
        /// JSON payload (CreativeSubmission), or @path to a file
        #[arg(short, long)]
        payload: String,
    },

    /// Resize a layout to one or more formats
    Resize {
        /// JSON payload (LayoutGraph), or @path to a file
        #[arg(short, long)]
        layout: String,

        #[arg(long)]
        source_width: f64,

        #[arg(long)]
        source_height: f64,

        /// Format ID (repeatable)
        #[arg(short, long = "format", required = true)]
        formats: Vec<String>,
    },

    /// Render a markdown compliance report
    Report {
        /// JSON payload (CreativeSubmission), or @path to a file
        #[arg(short, long)]
        payload: String,

        /// JSON array of audit entries, or @path to a file
        #[arg(short, long)]
        audit: Option<String>,
    },

    /// Validate and issue a signed certificate
    Certify {
        /// JSON payload (CreativeSubmission), or @path to a file
        #[arg(short, long)]
        payload: String,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let engine = match load_engine(&cli) {
        Ok(e) => e,
        Err(e) => {
            print_json(&json!({"success": false, "error": format!("Failed to load engine: {}", e)}));
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Commands::Rules { retailer } => {
            let rules = engine.validator().catalog().rules_for(retailer.as_deref());
            print_json(&json!({
                "catalogVersion": engine.validator().catalog().version,
                "predicates": creative_compliance::rules::Predicate::KNOWN_TYPES,
                "rules": rules,
            }));
            ExitCode::SUCCESS
        }

        Commands::Formats => {
            print_json(&engine.formats().list());
            ExitCode::SUCCESS
        }

        Commands::Validate { payload } => {
            let submission: CreativeSubmission = match parse_payload(&payload) {
                Ok(s) => s,
                Err(e) => return invalid_payload(e),
            };
            match engine.validate_creative(&submission) {
                Ok(validated) => {
                    print_json(&validated);
                    if validated.report.status == ComplianceStatus::Fail {
                        ExitCode::from(2)
                    } else {
                        ExitCode::SUCCESS
                    }
                }
                Err(e) => error_exit(e),
            }
        }

        Commands::Resize {
            layout,
            source_width,
            source_height,
            formats,
        } => {
            let layout: LayoutGraph = match parse_payload(&layout) {
                Ok(l) => l,
                Err(e) => return invalid_payload(e),
            };
            let ids: Vec<&str> = formats.iter().map(String::as_str).collect();
            match engine.resize_to_formats(&layout, source_width, source_height, &ids) {
                Ok(resized) => {
                    print_json(&json!({"success": true, "layouts": resized}));
                    ExitCode::SUCCESS
                }
                Err(e) => error_exit(e),
            }
        }

        Commands::Report { payload, audit } => {
            let submission: CreativeSubmission = match parse_payload(&payload) {
                Ok(s) => s,
                Err(e) => return invalid_payload(e),
            };
            let audit_log: Vec<AuditEntry> = match audit.as_deref().map(parse_payload::<Vec<AuditEntry>>).transpose() {
                Ok(log) => log.unwrap_or_default(),
                Err(e) => return invalid_payload(e),
            };
            match engine.validate_creative(&submission) {
                Ok(validated) => {
                    print!("{}", render_compliance_report(&validated.report, &submission.name, &audit_log));
                    ExitCode::SUCCESS
                }
                Err(e) => error_exit(e),
            }
        }

        Commands::Certify { payload } => {
            let submission: CreativeSubmission = match parse_payload(&payload) {
                Ok(s) => s,
                Err(e) => return invalid_payload(e),
            };
            let signer = match std::env::var(SIGNING_KEY_ENV) {
                Ok(secret) => match Ed25519Signer::from_hex(&secret) {
                    Ok(s) => s,
                    Err(e) => return error_exit(e),
                },
                Err(_) => {
                    print_json(&json!({"success": false, "error": format!("{} is not set", SIGNING_KEY_ENV)}));
                    return ExitCode::FAILURE;
                }
            };
            let certifier = Certifier::new(signer);
            match engine.certify_creative(&certifier, &submission) {
                Ok((validated, certificate)) => {
                    print_json(&json!({
                        "success": true,
                        "report": validated.report,
                        "certificate": certificate,
                    }));
                    ExitCode::SUCCESS
                }
                Err(e @ ComplianceError::BusinessRule(_)) => {
                    print_json(&json!({"success": false, "error": e.to_string()}));
                    ExitCode::from(2)
                }
                Err(e) => error_exit(e),
            }
        }
    }
}

fn load_engine(cli: &Cli) -> Result<CreativeEngine, ComplianceError> {
    let mut config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    if cli.rules_dir.is_some() {
        config.rules_dir = cli.rules_dir.clone();
    }
    if cli.formats_dir.is_some() {
        config.formats_dir = cli.formats_dir.clone();
    }
    CreativeEngine::from_config(config)
}

/// Inline JSON, or `@path` to read it from a file.
fn parse_payload<T: serde::de::DeserializeOwned>(arg: &str) -> Result<T, String> {
    let content = match arg.strip_prefix('@') {
        Some(path) => fs::read_to_string(path).map_err(|e| format!("cannot read {}: {}", path, e))?,
        None => arg.to_string(),
    };
    serde_json::from_str(&content).map_err(|e| e.to_string())
}

fn print_json(value: &impl serde::Serialize) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{}", s),
        Err(e) => eprintln!("failed to serialize output: {}", e),
    }
}

fn invalid_payload(error: String) -> ExitCode {
    print_json(&json!({"success": false, "error": format!("Invalid payload: {}", error)}));
    ExitCode::FAILURE
}

fn error_exit(error: ComplianceError) -> ExitCode {
    tracing::error!(error = %error, "command failed");
    print_json(&json!({"success": false, "error": error.to_string()}));
    ExitCode::FAILURE
}
