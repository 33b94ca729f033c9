//! Terraform / OpenTofu driver for driftcheck.
//!
//! [`TerraformCli`] implements
//! [`ProvisioningTool`](driftcheck_core::driver::ProvisioningTool) by running
//! the tool binary non-interactively: `init`, `apply -auto-approve`, and
//! `output -json`. The apply summary line is parsed from stdout.

pub mod args;
mod cli;

pub use cli::TerraformCli;
