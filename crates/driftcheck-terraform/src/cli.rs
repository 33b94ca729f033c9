//! Process-level driver.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use driftcheck_core::config::HarnessConfig;
use driftcheck_core::driver::{ApplyOptions, ApplyResult, ProvisioningTool};
use driftcheck_core::error::{HarnessError, HarnessResult};
use serde_json::Value;
use tokio::process::Command;
use tracing::{debug, info};

use crate::args::{apply_args, init_args, output_args};

/// Runs a `terraform` or `tofu` binary as a child process.
#[derive(Debug, Clone)]
pub struct TerraformCli {
    binary: String,
}

impl TerraformCli {
    /// Create a driver for `binary` (a name on `PATH` or a path).
    #[must_use]
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Create a driver for the binary named in `config`.
    #[must_use]
    pub fn from_config(config: &HarnessConfig) -> Self {
        Self::new(config.terraform_binary.clone())
    }

    /// The binary this driver runs.
    #[must_use]
    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// Run one sub-command in `dir` and return its stdout.
    async fn run(&self, dir: &Path, args: &[String]) -> HarnessResult<String> {
        let command = args.first().cloned().unwrap_or_default();
        debug!(binary = %self.binary, dir = %dir.display(), args = ?args, "running provisioning tool");

        let output = Command::new(&self.binary)
            .args(args)
            .current_dir(dir)
            .env("TF_IN_AUTOMATION", "1")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| HarnessError::Tool {
                command: command.clone(),
                message: format!("failed to spawn {}: {e}", self.binary),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        debug!(command = %command, stdout = %stdout, "provisioning tool output");
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(HarnessError::Tool {
                command,
                message: format!("{}: {}", output.status, stderr.trim()),
            });
        }
        Ok(stdout)
    }
}

#[async_trait]
impl ProvisioningTool for TerraformCli {
    async fn init_and_apply(&self, options: &ApplyOptions) -> HarnessResult<ApplyResult> {
        self.run(&options.working_dir, &init_args(options)).await?;
        info!(dir = %options.working_dir.display(), "initialized");
        self.apply(options).await
    }

    async fn apply(&self, options: &ApplyOptions) -> HarnessResult<ApplyResult> {
        let stdout = self.run(&options.working_dir, &apply_args(options)).await?;
        ApplyResult::parse(&stdout)
    }

    async fn output(&self, options: &ApplyOptions, name: &str) -> HarnessResult<Value> {
        let stdout = self.run(&options.working_dir, &output_args(name)).await?;
        serde_json::from_str(&stdout).map_err(|e| HarnessError::Tool {
            command: "output".to_owned(),
            message: format!("output {name} is not valid JSON: {e}"),
        })
    }
}
