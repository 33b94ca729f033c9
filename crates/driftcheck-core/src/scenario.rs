//! Deployment scenarios.
//!
//! A [`Scenario`] is an ordered list of [`Step`]s run against one bucket:
//! apply the configuration, verify the bucket, inject drift out of band,
//! re-apply and verify again. [`ScenarioRunner`] executes the steps and
//! collects every assertion failure into a [`ScenarioReport`]. Only broken
//! preconditions (tool failures, unusable store, missing fixtures) abort a
//! scenario early.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use serde_json::{Map, Value};
use tracing::{info, warn};
use typed_builder::TypedBuilder;

use crate::compare::{CompareOptions, VerificationVerdict};
use crate::config::HarnessConfig;
use crate::driver::{ApplyOptions, ApplyResult, ProvisioningTool, empty_bucket};
use crate::error::{HarnessError, HarnessResult};
use crate::fixture::{load_expected, load_outputs, outputs_match};
use crate::retry::RetryPolicy;
use crate::store::{ObjectStoreClient, PutObject};
use crate::types::{ExpectedState, ObjectKey, ObservedMetadata};
use crate::verify::Verifier;

/// Names accepted by [`builtin`].
pub const BUILTIN_SCENARIOS: [&str; 5] =
    ["simple", "advanced", "drift_add", "drift_delete", "idempotent"];

// ---------------------------------------------------------------------------
// Scenario definition
// ---------------------------------------------------------------------------

/// An out-of-band mutation of the bucket.
#[derive(Debug, Clone, PartialEq)]
pub enum Drift {
    /// Copy `source` to a new, undeclared `key`.
    Add {
        /// Existing key to copy from.
        source: ObjectKey,
        /// Key the copy is written to.
        key: ObjectKey,
    },
    /// Delete a declared key.
    Delete {
        /// Key to delete.
        key: ObjectKey,
    },
    /// Overwrite a declared key with different metadata and body.
    Update {
        /// Key to overwrite.
        key: ObjectKey,
        /// Replacement metadata.
        metadata: ObservedMetadata,
        /// Replacement body.
        body: Bytes,
    },
}

impl fmt::Display for Drift {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Add { source, key } => write!(f, "add \"{key}\" copied from {source}"),
            Self::Delete { key } => write!(f, "delete {key}"),
            Self::Update { key, .. } => write!(f, "overwrite {key}"),
        }
    }
}

/// One step of a scenario.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Apply (initializing on first use) and verify the bucket.
    ApplyAndVerify,
    /// Apply again: the tool must report no changes and verification must
    /// give the same verdict as the previous one.
    ReapplyIdempotent,
    /// Mutate the bucket behind the tool's back.
    Drift(Drift),
    /// Apply to correct drift, then verify.
    ReapplyAndVerify,
    /// Compare the tool's declared objects output against the expected one.
    AssertOutputs,
    /// Delete every object in the bucket.
    EmptyBucket,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ApplyAndVerify => f.write_str("apply and verify"),
            Self::ReapplyIdempotent => f.write_str("re-apply (idempotent)"),
            Self::Drift(drift) => write!(f, "drift: {drift}"),
            Self::ReapplyAndVerify => f.write_str("re-apply and verify"),
            Self::AssertOutputs => f.write_str("assert outputs"),
            Self::EmptyBucket => f.write_str("empty bucket"),
        }
    }
}

/// A named sequence of steps against one bucket.
#[derive(Debug, Clone, TypedBuilder)]
pub struct Scenario {
    /// Scenario name, used in logs and reports.
    #[builder(setter(into))]
    pub name: String,

    /// How to run the provisioning tool.
    pub options: ApplyOptions,

    /// Bucket the configuration deploys to.
    #[builder(setter(into))]
    pub bucket: String,

    /// Expected bucket state after every apply.
    pub expected: ExpectedState,

    /// Expected tool output, for [`Step::AssertOutputs`].
    #[builder(default, setter(strip_option))]
    pub expected_outputs: Option<Map<String, Value>>,

    /// How observed state is compared.
    #[builder(default)]
    pub compare: CompareOptions,

    /// Steps, in order.
    #[builder(default)]
    pub steps: Vec<Step>,
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Outcome of one step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepReport {
    /// Human-readable step description.
    pub step: String,
    /// Apply summary, for steps that apply.
    pub apply: Option<ApplyResult>,
    /// Verification verdict, for steps that verify.
    pub verdict: Option<VerificationVerdict>,
    /// Assertion failures other than the verdict.
    pub failures: Vec<String>,
}

impl StepReport {
    fn new(step: &Step) -> Self {
        Self {
            step: step.to_string(),
            apply: None,
            verdict: None,
            failures: Vec::new(),
        }
    }

    /// Whether every assertion of this step held.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.failures.is_empty() && self.verdict.as_ref().is_none_or(VerificationVerdict::is_pass)
    }
}

/// Outcome of a whole scenario.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioReport {
    /// Scenario name.
    pub scenario: String,
    /// One entry per executed step.
    pub steps: Vec<StepReport>,
}

impl ScenarioReport {
    /// Whether every step passed.
    #[must_use]
    pub fn is_pass(&self) -> bool {
        self.steps.iter().all(StepReport::passed)
    }
}

impl fmt::Display for ScenarioReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.is_pass() { "PASS" } else { "FAIL" };
        writeln!(f, "scenario {}: {status}", self.scenario)?;
        for (i, step) in self.steps.iter().enumerate() {
            let mark = if step.passed() { "ok" } else { "FAILED" };
            write!(f, "  {}. {} ... {mark}", i + 1, step.step)?;
            if let Some(apply) = &step.apply {
                write!(
                    f,
                    " ({} added, {} changed, {} destroyed)",
                    apply.added, apply.changed, apply.destroyed
                )?;
            }
            writeln!(f)?;
            if let Some(verdict) = step.verdict.as_ref().filter(|v| !v.is_pass()) {
                for line in verdict.to_string().lines() {
                    writeln!(f, "       {line}")?;
                }
            }
            for line in step.failures.iter().flat_map(|failure| failure.lines()) {
                writeln!(f, "       {line}")?;
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Runner
// ---------------------------------------------------------------------------

/// Runs scenarios against an object store and a provisioning tool.
pub struct ScenarioRunner<S: ?Sized, T: ?Sized> {
    store: Arc<S>,
    tool: Arc<T>,
    policy: RetryPolicy,
}

impl<S: ?Sized, T: ?Sized> fmt::Debug for ScenarioRunner<S, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScenarioRunner")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

/// Mutable state carried between the steps of one run.
#[derive(Debug, Default)]
struct RunState {
    initialized: bool,
    drift_pending: bool,
    last_verdict: Option<VerificationVerdict>,
}

impl<S, T> ScenarioRunner<S, T>
where
    S: ObjectStoreClient + ?Sized + 'static,
    T: ProvisioningTool + ?Sized,
{
    /// Create a runner.
    #[must_use]
    pub fn new(store: Arc<S>, tool: Arc<T>, policy: RetryPolicy) -> Self {
        Self {
            store,
            tool,
            policy,
        }
    }

    /// Run every step of `scenario`.
    ///
    /// Assertion failures are recorded and later steps still run. Any
    /// [`HarnessError`] aborts the scenario.
    pub async fn run(&self, scenario: &Scenario) -> HarnessResult<ScenarioReport> {
        info!(scenario = %scenario.name, bucket = %scenario.bucket, "running scenario");
        let verifier = Verifier::new(Arc::clone(&self.store), scenario.compare, self.policy);
        let mut state = RunState::default();
        let mut report = ScenarioReport {
            scenario: scenario.name.clone(),
            steps: Vec::with_capacity(scenario.steps.len()),
        };

        for step in &scenario.steps {
            let mut outcome = StepReport::new(step);
            match step {
                Step::ApplyAndVerify => {
                    outcome.apply = Some(self.apply(scenario, &mut state).await?);
                    let verdict = verifier.verify(&scenario.bucket, &scenario.expected).await?;
                    state.last_verdict = Some(verdict.clone());
                    outcome.verdict = Some(verdict);
                }
                Step::ReapplyIdempotent => {
                    let apply = self.apply(scenario, &mut state).await?;
                    if !apply.is_noop() {
                        outcome.failures.push(format!(
                            "second apply was not a no-op: {} added, {} changed, {} destroyed",
                            apply.added, apply.changed, apply.destroyed
                        ));
                    }
                    outcome.apply = Some(apply);
                    let verdict = verifier.verify(&scenario.bucket, &scenario.expected).await?;
                    if state.last_verdict.as_ref().is_some_and(|prev| *prev != verdict) {
                        outcome
                            .failures
                            .push("verification result changed between applies".to_owned());
                    }
                    state.last_verdict = Some(verdict.clone());
                    outcome.verdict = Some(verdict);
                }
                Step::Drift(drift) => {
                    self.inject(&scenario.bucket, drift).await?;
                    state.drift_pending = true;
                }
                Step::ReapplyAndVerify => {
                    let apply = self.apply(scenario, &mut state).await?;
                    if std::mem::take(&mut state.drift_pending) && apply.is_noop() {
                        outcome
                            .failures
                            .push("re-apply after drift reported no changes".to_owned());
                    }
                    outcome.apply = Some(apply);
                    let verdict = verifier.verify(&scenario.bucket, &scenario.expected).await?;
                    state.last_verdict = Some(verdict.clone());
                    outcome.verdict = Some(verdict);
                }
                Step::AssertOutputs => {
                    let Some(expected) = &scenario.expected_outputs else {
                        return Err(HarnessError::Config(format!(
                            "scenario {} asserts outputs but declares none",
                            scenario.name
                        )));
                    };
                    let actual = self
                        .tool
                        .output(&scenario.options, &scenario.options.output_name)
                        .await?;
                    if !outputs_match(expected, &actual) {
                        outcome.failures.push(format!(
                            "output {} differs\n  expected: {}\n  actual:   {actual}",
                            scenario.options.output_name,
                            Value::Object(expected.clone())
                        ));
                    }
                }
                Step::EmptyBucket => empty_bucket(self.store.as_ref(), &scenario.bucket).await?,
            }

            if !outcome.passed() {
                warn!(scenario = %scenario.name, step = %outcome.step, "step failed");
            }
            report.steps.push(outcome);
        }

        info!(scenario = %scenario.name, passed = report.is_pass(), "scenario finished");
        Ok(report)
    }

    async fn apply(&self, scenario: &Scenario, state: &mut RunState) -> HarnessResult<ApplyResult> {
        let result = if state.initialized {
            self.tool.apply(&scenario.options).await?
        } else {
            self.tool.init_and_apply(&scenario.options).await?
        };
        state.initialized = true;
        info!(
            scenario = %scenario.name,
            added = result.added,
            changed = result.changed,
            destroyed = result.destroyed,
            "apply complete"
        );
        Ok(result)
    }

    async fn inject(&self, bucket: &str, drift: &Drift) -> HarnessResult<()> {
        match drift {
            Drift::Add { source, key } => self.store.copy(bucket, source, key).await?,
            Drift::Delete { key } => self.store.delete(bucket, key).await?,
            Drift::Update {
                key,
                metadata,
                body,
            } => {
                let object = PutObject::new(body.clone()).with_metadata(metadata.clone());
                self.store.put(bucket, key, object).await?;
            }
        }
        info!(bucket = %bucket, drift = %drift, "drift injected");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Built-in scenarios
// ---------------------------------------------------------------------------

/// Build one of the [`BUILTIN_SCENARIOS`] from `config`.
///
/// Configuration directories are resolved under `terraform_dir` and
/// fixtures under `fixture_dir`.
pub fn builtin(name: &str, config: &HarnessConfig) -> HarnessResult<Scenario> {
    match name {
        "simple" => simple(config),
        "advanced" => advanced(config),
        "drift_add" => drift_add(config),
        "drift_delete" => drift_delete(config),
        "idempotent" => idempotent(config),
        other => Err(HarnessError::Config(format!(
            "unknown scenario {other:?}, expected one of {}",
            BUILTIN_SCENARIOS.join(", ")
        ))),
    }
}

fn base(config: &HarnessConfig, name: &str, module: &str) -> HarnessResult<Scenario> {
    let bucket = config.bucket_name(name);
    let options = ApplyOptions::builder()
        .working_dir(Path::new(&config.terraform_dir).join(module))
        .lock_timeout(config.lock_timeout.clone())
        .upgrade(true)
        .reconfigure(true)
        .build()
        .with_var("bucket", bucket.clone())
        .with_backend("key", config.backend_key(name));
    let expected = load_expected(Path::new(&config.fixture_dir).join(format!("{module}.json")))?;

    Ok(Scenario::builder()
        .name(name)
        .options(options)
        .bucket(bucket)
        .expected(expected)
        .compare(config.compare_options())
        .build())
}

/// Deploy the minimal configuration and verify it once.
pub fn simple(config: &HarnessConfig) -> HarnessResult<Scenario> {
    let mut scenario = base(config, "simple", "simple")?;
    scenario.steps = vec![Step::ApplyAndVerify];
    Ok(scenario)
}

/// Deploy per-object metadata overrides, verify them and the tool output.
pub fn advanced(config: &HarnessConfig) -> HarnessResult<Scenario> {
    let mut scenario = base(config, "advanced", "advanced")?;
    let outputs = Path::new(&config.fixture_dir).join("advanced_outputs.json");
    scenario.expected_outputs = Some(load_outputs(outputs)?);
    scenario.steps = vec![Step::ApplyAndVerify, Step::AssertOutputs];
    Ok(scenario)
}

/// An undeclared object appears; re-apply must remove it.
pub fn drift_add(config: &HarnessConfig) -> HarnessResult<Scenario> {
    let mut scenario = base(config, "drift_add", "simple")?;
    scenario.steps = vec![
        Step::ApplyAndVerify,
        Step::Drift(Drift::Add {
            source: ObjectKey::new("a.json"),
            key: ObjectKey::new("delete me"),
        }),
        Step::ReapplyAndVerify,
    ];
    Ok(scenario)
}

/// A declared object disappears; re-apply must restore it byte for byte.
pub fn drift_delete(config: &HarnessConfig) -> HarnessResult<Scenario> {
    let mut scenario = base(config, "drift_delete", "simple")?;
    scenario.compare.check_content = true;
    scenario.steps = vec![
        Step::ApplyAndVerify,
        Step::Drift(Drift::Delete {
            key: ObjectKey::new("a.json"),
        }),
        Step::ReapplyAndVerify,
    ];
    Ok(scenario)
}

/// A second apply without drift must change nothing.
pub fn idempotent(config: &HarnessConfig) -> HarnessResult<Scenario> {
    let mut scenario = base(config, "idempotent", "simple")?;
    scenario.steps = vec![Step::ApplyAndVerify, Step::ReapplyIdempotent];
    Ok(scenario)
}
