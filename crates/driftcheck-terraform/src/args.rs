//! Command-line argument construction.
//!
//! Kept free of I/O so the exact argument lists can be tested.

use driftcheck_core::driver::ApplyOptions;
use serde_json::Value;

/// Render a variable value the way `-var` expects it: strings verbatim,
/// everything else as JSON (which the tool parses as an HCL expression).
#[must_use]
pub fn format_var(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn lock_timeout(options: &ApplyOptions) -> Option<String> {
    options
        .lock_timeout
        .as_ref()
        .map(|t| format!("-lock-timeout={t}"))
}

/// Arguments for `init`.
#[must_use]
pub fn init_args(options: &ApplyOptions) -> Vec<String> {
    let mut args = vec!["init".to_owned(), "-input=false".to_owned(), "-no-color".to_owned()];
    if options.upgrade {
        args.push("-upgrade".to_owned());
    }
    if options.reconfigure {
        args.push("-reconfigure".to_owned());
    }
    args.extend(lock_timeout(options));
    args.extend(
        options
            .backend_config
            .iter()
            .map(|(k, v)| format!("-backend-config={k}={v}")),
    );
    args
}

/// Arguments for a non-interactive `apply`.
#[must_use]
pub fn apply_args(options: &ApplyOptions) -> Vec<String> {
    let mut args = vec![
        "apply".to_owned(),
        "-input=false".to_owned(),
        "-auto-approve".to_owned(),
        "-no-color".to_owned(),
    ];
    args.extend(lock_timeout(options));
    args.extend(
        options
            .vars
            .iter()
            .map(|(k, v)| format!("-var={k}={}", format_var(v))),
    );
    args
}

/// Arguments for reading one output as JSON.
#[must_use]
pub fn output_args(name: &str) -> Vec<String> {
    vec![
        "output".to_owned(),
        "-no-color".to_owned(),
        "-json".to_owned(),
        name.to_owned(),
    ]
}
