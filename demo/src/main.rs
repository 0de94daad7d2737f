//! PERMIT ERP Reference Runtime: Demo CLI
//!
//! Runs one or all of the four ERP approval scenarios, or gates a single
//! action described in a JSON file.
//!
//! Usage:
//!   cargo run -p demo -- run-all
//!   cargo run -p demo -- invoice-approval
//!   cargo run -p demo -- timesheet-lock
//!   cargo run -p demo -- ack-override
//!   cargo run -p demo -- staged-quorum
//!   cargo run -p demo -- evaluate --policies crates/permit-ref-erp/policies/erp.toml \
//!                                 --input demo/inputs/late-entry.json
//!
//! `evaluate` runs against empty in-memory stores, so only guards that pass
//! on empty data (or fail on missing input) are meaningful there.

use std::path::{Path, PathBuf};

use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use permit_contracts::{
    config::PermitConfig,
    error::{PermitError, PermitResult},
    request::EvaluationInput,
};
use permit_policy::load_config_file;
use permit_ref_erp::{
    scenarios::{ack_override, invoice_approval, staged_quorum, timesheet_lock},
    ErpRuntime,
};

// ── CLI definition ────────────────────────────────────────────────────────────

/// PERMIT: policy-gated approval workflows, ERP demo.
#[derive(Parser)]
#[command(
    name = "demo",
    about = "PERMIT ERP reference runtime demo",
    long_about = "Runs PERMIT ERP scenarios showing policy matching, guards,\n\
                  approval ladders, the legacy fallback, and audit chain integrity."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run all four ERP scenarios in sequence.
    RunAll,
    /// Scenario 1: Invoice approval (default ladder, approval_open guard).
    InvoiceApproval,
    /// Scenario 2: Timesheet lock (project, period, and edit window guards).
    TimesheetLock,
    /// Scenario 3: Acknowledgement override (admin override with reason).
    AckOverride,
    /// Scenario 4: Staged quorum (two-of-three, then finance).
    StagedQuorum,
    /// Gate one action and print the decision as JSON.
    Evaluate {
        /// Policy document (TOML, `[[policies]]` tables).
        #[arg(long)]
        policies: PathBuf,
        /// Evaluation input (JSON).
        #[arg(long)]
        input: PathBuf,
        /// Engine settings (TOML). Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    // Set RUST_LOG=debug for the full evaluation trace.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::RunAll => {
            print_banner();
            run_all()
        }
        Command::InvoiceApproval => invoice_approval::run_scenario(),
        Command::TimesheetLock => timesheet_lock::run_scenario(),
        Command::AckOverride => ack_override::run_scenario(),
        Command::StagedQuorum => staged_quorum::run_scenario(),
        Command::Evaluate {
            policies,
            input,
            config,
        } => evaluate(&policies, &input, config.as_deref()),
    };

    if let Err(e) = result {
        eprintln!("Demo error: {}", e);
        std::process::exit(1);
    }
}

// ── Scenario dispatch ─────────────────────────────────────────────────────────

fn run_all() -> PermitResult<()> {
    invoice_approval::run_scenario()?;
    timesheet_lock::run_scenario()?;
    ack_override::run_scenario()?;
    staged_quorum::run_scenario()?;
    println!("All scenarios completed successfully.");
    Ok(())
}

// ── Single evaluation ─────────────────────────────────────────────────────────

fn read(path: &Path, what: &str) -> PermitResult<String> {
    std::fs::read_to_string(path).map_err(|e| PermitError::ConfigError {
        reason: format!("failed to read {} '{}': {}", what, path.display(), e),
    })
}

fn evaluate(policies: &Path, input: &Path, config: Option<&Path>) -> PermitResult<()> {
    let config = match config {
        Some(path) => load_config_file(path)?,
        None => PermitConfig::default(),
    };

    let policies_toml = read(policies, "policy file")?;
    let input: EvaluationInput =
        serde_json::from_str(&read(input, "input file")?).map_err(|e| PermitError::ConfigError {
            reason: format!("invalid evaluation input: {}", e),
        })?;
    debug!(flow_type = %input.flow_type, action = %input.action_key, "evaluating input file");

    let runtime = ErpRuntime::new(&policies_toml, &config, Utc::now())?;
    let outcome = runtime.evaluate(&input)?;

    let rendered = serde_json::to_string_pretty(&outcome).map_err(|e| PermitError::ConfigError {
        reason: format!("failed to render decision: {}", e),
    })?;
    println!("{}", rendered);
    Ok(())
}

// ── Banner ────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("PERMIT: Policy-gated Approval Workflows");
    println!("ERP Reference Demo");
    println!("=======================================");
    println!();
    println!("Every approval action passes through:");
    println!("  [1] Policy matcher: priority scan, state and subject filters");
    println!("  [2] Guards: open approvals, closed projects, period locks, edit window, chat acks");
    println!("  [3] Fallback: unconfigured actions allowed; admins may override ack guards with a reason");
    println!("  [4] Approval flow: stage completion by all / any / quorum");
    println!("  [5] Decision record appended to a SHA-256 audit chain");
    println!();
}
