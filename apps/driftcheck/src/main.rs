//! driftcheck - deployment-state verification for Terraform-managed buckets.
//!
//! Runs one or more scenarios: apply a configuration, verify the bucket,
//! inject drift, re-apply and verify again. Exits non-zero when any
//! scenario fails.
//!
//! # Usage
//!
//! ```text
//! driftcheck simple drift_add      # run the named scenarios
//! driftcheck --all                 # run every built-in scenario
//! driftcheck --list                # list built-in scenarios
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `AWS_REGION` | `ap-northeast-1` | Region of the bucket under test |
//! | `S3_ENDPOINT_URL` | *(unset)* | Custom endpoint (e.g. a local emulator) |
//! | `TF_BINARY` | `terraform` | Provisioning tool binary |
//! | `TF_DIR` | `deploy` | Directory holding one configuration per module |
//! | `FIXTURE_DIR` | `fixtures` | Directory holding expected-state fixtures |
//! | `TF_PLATFORM` / `TF_VERSION` | `unknown` | Bucket name suffixes |
//! | `DRIFTCHECK_SCENARIO` | *(unset)* | Scenario to run when no argument is given |
//! | `LOG_LEVEL` | `info` | Log level filter |
//! | `RUST_LOG` | *(unset)* | Fine-grained tracing filter (overrides `LOG_LEVEL`) |

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use aws_credential_types::Credentials;
use driftcheck_core::HarnessConfig;
use driftcheck_core::scenario::{BUILTIN_SCENARIOS, ScenarioRunner, builtin};
use driftcheck_s3::{S3ObjectStore, build_client};
use driftcheck_terraform::TerraformCli;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Harness version.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the tracing subscriber.
///
/// Uses `RUST_LOG` if set, otherwise falls back to the `LOG_LEVEL` config value.
fn init_tracing(log_level: &str) -> Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::try_new(log_level)
            .with_context(|| format!("invalid log level filter: {log_level}"))?
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    Ok(())
}

/// Static credentials from `ACCESS_KEY` / `SECRET_KEY` (local emulators),
/// falling back to the SDK's default provider chain when unset.
fn static_credentials() -> Option<Credentials> {
    let access_key = std::env::var("ACCESS_KEY").ok()?;
    let secret_key = std::env::var("SECRET_KEY").ok()?;
    info!(access_key = %access_key, "using static credentials from environment");
    Some(Credentials::new(access_key, secret_key, None, None, "driftcheck-env"))
}

/// Resolve which scenarios to run from command-line arguments.
fn select_scenarios(args: &[String], fallback: Option<String>) -> Result<Vec<String>> {
    if args.iter().any(|a| a == "--all") {
        return Ok(BUILTIN_SCENARIOS.iter().map(|s| (*s).to_owned()).collect());
    }
    let named: Vec<String> = args.iter().filter(|a| !a.starts_with("--")).cloned().collect();
    if !named.is_empty() {
        return Ok(named);
    }
    fallback.map(|s| vec![s]).with_context(|| {
        format!(
            "no scenario given; pass one of {} or --all",
            BUILTIN_SCENARIOS.join(", ")
        )
    })
}

async fn run(config: &HarnessConfig, scenarios: &[String]) -> Result<bool> {
    let store = Arc::new(S3ObjectStore::new(
        build_client(config, static_credentials()).await,
    ));
    let tool = Arc::new(TerraformCli::from_config(config));
    let runner = ScenarioRunner::new(store, tool, config.retry_policy());

    let mut all_passed = true;
    for name in scenarios {
        let scenario =
            builtin(name, config).with_context(|| format!("failed to load scenario {name}"))?;
        let report = runner
            .run(&scenario)
            .await
            .with_context(|| format!("scenario {name} aborted"))?;
        println!("{report}");
        all_passed &= report.is_pass();
    }
    Ok(all_passed)
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.iter().any(|a| a == "--list") {
        for name in BUILTIN_SCENARIOS {
            println!("{name}");
        }
        return Ok(ExitCode::SUCCESS);
    }

    let config = HarnessConfig::from_env();
    init_tracing(&config.log_level)?;

    let scenarios = select_scenarios(&args, std::env::var("DRIFTCHECK_SCENARIO").ok())?;
    info!(
        region = %config.region,
        endpoint_url = ?config.endpoint_url,
        terraform_binary = %config.terraform_binary,
        platform = %config.platform,
        tf_version = %config.tf_version,
        scenarios = ?scenarios,
        version = VERSION,
        "starting driftcheck",
    );

    if run(&config, &scenarios).await? {
        Ok(ExitCode::SUCCESS)
    } else {
        error!("one or more scenarios failed");
        Ok(ExitCode::FAILURE)
    }
}
