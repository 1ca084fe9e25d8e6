// src/main.rs

use clap::Parser;
use color_eyre::eyre::Result;
use std::path::PathBuf;
use tracing::warn;
use uuid::Uuid;

use warden_rs_recon::core::budget::BudgetConfig;
use warden_rs_recon::core::models::RunConfig;
use warden_rs_recon::core::{policy, run};
use warden_rs_recon::logging;

/// Defensive reconnaissance of a domain's DNS and email-security posture,
/// with every outbound request mediated, budgeted and ledgered.
#[derive(Debug, Parser)]
#[command(name = "warden-rs-recon", version, about)]
struct Cli {
    /// Target apex domain, e.g. example.com.
    #[arg(long)]
    domain: String,

    /// passive (default): no target HTTP; low-noise: tiny capped target HEAD
    /// checks. Aliases: enhanced, active (deprecated).
    #[arg(long, default_value = "passive")]
    mode: String,

    /// none: no DNS; minimal: apex TXT+MX and _dmarc TXT; full: A/AAAA/NS/MX/TXT
    /// plus the DKIM safelist in low-noise.
    #[arg(long, default_value = "minimal")]
    dns_policy: String,

    #[arg(long, default_value_t = 60)]
    max_requests_per_minute: u32,

    /// Optional hard cap on the total number of requests for the whole run.
    #[arg(long)]
    max_total_requests: Option<u32>,

    /// Permit GET in addition to HEAD for target HTTP (low-noise only).
    #[arg(long)]
    allow_get: bool,

    #[arg(long, default_value = "./output")]
    out: PathBuf,

    /// Per-request timeout for collector execution.
    #[arg(long, default_value_t = 8)]
    timeout_seconds: u64,

    /// Accepted for configuration parity with third-party intel collectors;
    /// always stripped from the run manifest.
    #[arg(long, env = "SHODAN_KEY", hide_env_values = true)]
    shodan_key: Option<String>,

    #[arg(long, env = "CENSYS_ID", hide_env_values = true)]
    censys_id: Option<String>,

    #[arg(long, env = "CENSYS_SECRET", hide_env_values = true)]
    censys_secret: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    logging::initialize_logging()?;
    let cli = Cli::parse();

    let policy = policy::resolve(&cli.mode, &cli.dns_policy, &cli.domain, cli.allow_get)?;
    if policy.deprecated_alias {
        eprintln!(
            "[deprecation] --mode {} is deprecated; use --mode low-noise",
            cli.mode.trim().to_ascii_lowercase()
        );
        warn!(raw_mode = %cli.mode, "deprecated mode alias mapped to low-noise");
    }

    let config = RunConfig {
        domain: policy.domain.clone(),
        out_dir: cli.out,
        budget: BudgetConfig::new(cli.max_requests_per_minute, cli.max_total_requests)?,
        allow_get: cli.allow_get,
        timeout_seconds: cli.timeout_seconds,
        run_id: Uuid::new_v4(),
        shodan_key: cli.shodan_key,
        censys_id: cli.censys_id,
        censys_secret: cli.censys_secret,
    };

    let summary = run::execute(config, policy).await?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
