//! Run scheduling: operations across worker threads, playbooks in phases
//!
//! Phases are separated by a barrier:
//!
//! 1. ordinary playbooks on every operation except DELETE
//! 2. ordinary playbooks on DELETE operations, so deletes can be correlated
//!    with the POSTs of phase 1
//! 3. stateful playbooks, which consume what the first two phases recorded
//!
//! Within a phase, operations are spread over `workers` scoped threads.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;

use tracing::{info, warn};

use negfuzz_core::config::Config;
use negfuzz_core::context::GlobalContext;
use negfuzz_core::dryrun::{DryRunPlan, DryRunRecorder, ValidationStatus, validate_config};
use negfuzz_core::http::HttpMethod;
use negfuzz_core::operation::OperationData;
use negfuzz_core::refdata::PathValues;
use negfuzz_core::report::{MemoryReporter, Reporter};

use crate::caller::{Caller, CallerError, ServiceCaller};
use crate::executor::ExecutionContext;
use crate::mutators::{CustomMutator, custom};
use crate::playbook::{PlaybookError, RandomPlaybook, RandomRun, Registry};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Caller(#[from] CallerError),
    #[error(transparent)]
    Playbook(#[from] PlaybookError),
}

/// What [`Engine::run`] did.
#[derive(Debug)]
pub enum RunOutcome {
    /// Requests were sent and results reported
    Sent { operations: usize },
    /// Dry run: nothing was sent
    Planned(DryRunPlan),
}

pub struct Engine {
    config: Config,
    caller: Arc<dyn Caller>,
    global: Arc<GlobalContext>,
    ref_data: PathValues,
    registry: Registry,
    custom_mutators: Vec<CustomMutator>,
}

impl Engine {
    /// Build the production pipeline from `config`.
    ///
    /// # Errors
    ///
    /// Returns error if a value file cannot be loaded or the playbook
    /// selection names an unknown playbook.
    pub fn from_config(config: &Config) -> Result<Self, EngineError> {
        let global = Arc::new(GlobalContext::new(config.max_stored_posts));
        let caller = ServiceCaller::new(config, global.clone())?;
        let ref_data = caller.ref_data().clone();
        let registry = Registry::from_selection(&config.playbooks, &config.skip_playbooks)?;
        let custom_mutators = config
            .custom_mutators_dir
            .as_deref()
            .map(custom::load_dir)
            .unwrap_or_default();
        Ok(Self {
            config: config.clone(),
            caller: Arc::new(caller),
            global,
            ref_data,
            registry,
            custom_mutators,
        })
    }

    /// Swap the caller, keeping everything else.
    #[must_use]
    pub fn with_caller(mut self, caller: Arc<dyn Caller>) -> Self {
        self.caller = caller;
        self
    }

    #[must_use]
    pub fn with_registry(mut self, registry: Registry) -> Self {
        self.registry = registry;
        self
    }

    #[must_use]
    pub const fn registry(&self) -> &Registry {
        &self.registry
    }

    #[must_use]
    pub fn global(&self) -> &Arc<GlobalContext> {
        &self.global
    }

    fn context(&self, reporter: Arc<dyn Reporter>, recorder: Option<Arc<DryRunRecorder>>) -> ExecutionContext {
        let ctx = ExecutionContext::new(self.caller.clone(), reporter, self.global.clone())
            .with_ref_data(self.ref_data.clone())
            .with_skip_fields(self.config.skip_fields.iter().cloned())
            .with_skip_headers(self.config.skip_headers.iter().cloned());
        match recorder {
            Some(recorder) => ctx.with_dry_run(recorder),
            None => ctx,
        }
    }

    /// Run every selected playbook against `operations`, or plan them when
    /// the configuration asks for a dry run.
    pub fn run(&self, operations: &[OperationData], reporter: Arc<dyn Reporter>) -> RunOutcome {
        if self.config.dry_run {
            return RunOutcome::Planned(self.plan(operations));
        }
        let started = Instant::now();
        info!(
            operations = operations.len(),
            playbooks = self.registry.len(),
            workers = self.config.workers,
            base_url = %self.caller.base_url(),
            "starting run"
        );
        let ctx = self.context(reporter, None);
        self.run_phases(&ctx, operations);
        info!(elapsed_ms = started.elapsed().as_millis(), "run finished");
        RunOutcome::Sent {
            operations: operations.len(),
        }
    }

    /// Walk every playbook without sending anything and count the tests.
    #[must_use]
    pub fn plan(&self, operations: &[OperationData]) -> DryRunPlan {
        let recorder = Arc::new(DryRunRecorder::new());
        let ctx = self.context(Arc::new(MemoryReporter::new()), Some(recorder.clone()));
        self.run_phases(&ctx, operations);
        let validations = validate_config(&self.config);
        for v in validations.iter().filter(|v| v.status != ValidationStatus::Ok) {
            warn!(check = %v.check, status = %v.status, "{}", v.message);
        }
        recorder.plan(validations)
    }

    /// Run the random mutation loop on every operation.
    ///
    /// # Errors
    ///
    /// Returns error if the random settings have no stop condition or an
    /// invalid match pattern.
    pub fn run_random(
        &self,
        operations: &[OperationData],
        reporter: Arc<dyn Reporter>,
    ) -> Result<RandomRun, EngineError> {
        let playbook = RandomPlaybook::from_config(&self.config.random, self.custom_mutators.clone())?;
        info!(
            operations = operations.len(),
            custom_mutators = self.custom_mutators.len(),
            "starting random fuzzing"
        );
        let ctx = self.context(reporter, None);
        let tests = AtomicU64::new(0);
        let errors = AtomicU64::new(0);
        self.parallel(operations, |op| {
            let run = playbook.run(&ctx, op);
            tests.fetch_add(run.tests, Ordering::Relaxed);
            errors.fetch_add(run.errors, Ordering::Relaxed);
        });
        Ok(RandomRun {
            tests: tests.into_inner(),
            errors: errors.into_inner(),
        })
    }

    fn run_phases(&self, ctx: &ExecutionContext, operations: &[OperationData]) {
        let (deletes, others): (Vec<&OperationData>, Vec<&OperationData>) = operations
            .iter()
            .partition(|op| op.method == HttpMethod::Delete);

        for (phase, ops) in [("ordinary", &others), ("delete", &deletes)] {
            self.parallel(ops, |op| {
                info!(operation = %op.label(), phase, "running playbooks");
                for playbook in self.registry.ordinary() {
                    playbook.run(ctx, op);
                }
            });
        }

        let all: Vec<&OperationData> = operations.iter().collect();
        self.parallel(&all, |op| {
            for playbook in self.registry.stateful() {
                playbook.run(ctx, op);
            }
        });
    }

    /// Apply `work` to every item on up to `workers` threads.
    fn parallel<T: Sync>(&self, items: &[T], work: impl Fn(&T) + Sync) {
        if items.is_empty() {
            return;
        }
        let workers = self.config.workers.clamp(1, items.len());
        let next = AtomicUsize::new(0);
        std::thread::scope(|scope| {
            for _ in 0..workers {
                scope.spawn(|| {
                    while let Some(item) = items.get(next.fetch_add(1, Ordering::Relaxed)) {
                        work(item);
                    }
                });
            }
        });
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("base_url", &self.caller.base_url())
            .field("playbooks", &self.registry.len())
            .field("workers", &self.config.workers)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::testing::FakeCaller;
    use negfuzz_core::operation::{FieldInfo, FieldType};
    use negfuzz_core::report::Outcome;
    use serde_json::json;

    fn operations() -> Vec<OperationData> {
        let mut post = OperationData::new("/pets", HttpMethod::Post);
        post.payload = json!({"name": "rex"}).to_string();
        post.fields = vec![FieldInfo::new("name", FieldType::String).required()];
        let mut get = OperationData::new("/pets/{id}", HttpMethod::Get);
        get.path_params = ["id".to_string()].into();
        let mut delete = OperationData::new("/pets/{id}", HttpMethod::Delete);
        delete.path_params = ["id".to_string()].into();
        vec![post, get, delete]
    }

    fn engine(config: &Config, caller: Arc<FakeCaller>) -> Engine {
        Engine::from_config(config).unwrap().with_caller(caller)
    }

    #[test]
    fn runs_every_applicable_playbook() {
        let config = Config {
            playbooks: vec!["TrailingSpacesInFields".into(), "EmptyJsonBody".into()],
            ..Config::default()
        };
        let caller = Arc::new(FakeCaller::answering(400));
        let reporter = Arc::new(MemoryReporter::new());
        let outcome = engine(&config, caller.clone()).run(&operations(), reporter.clone());

        assert!(matches!(outcome, RunOutcome::Sent { operations: 3 }));
        // two trailing variants on POST /pets plus one empty body
        assert_eq!(caller.sent().len(), 3);
        assert!(reporter.results().iter().all(|r| r.outcome == Outcome::Success));
    }

    #[test]
    fn dry_run_plans_without_sending() {
        let config = Config {
            dry_run: true,
            playbooks: vec!["TrailingSpacesInFields".into()],
            ..Config::default()
        };
        let caller = Arc::new(FakeCaller::answering(400));
        let reporter = Arc::new(MemoryReporter::new());
        let RunOutcome::Planned(plan) = engine(&config, caller.clone()).run(&operations(), reporter.clone()) else {
            panic!("expected a plan");
        };
        assert!(caller.sent().is_empty());
        assert!(reporter.is_empty());
        assert_eq!(plan.total_tests, 2);
        assert_eq!(plan.operations[0].playbooks["TrailingSpacesInFields"], 2);
    }

    #[test]
    fn unknown_playbook_is_rejected() {
        let config = Config {
            skip_playbooks: vec!["NoSuchThing".into()],
            ..Config::default()
        };
        assert!(matches!(
            Engine::from_config(&config),
            Err(EngineError::Playbook(PlaybookError::UnknownPlaybook(_)))
        ));
    }

    #[test]
    fn stateful_phase_sees_deletes_from_earlier_phases() {
        let config = Config {
            playbooks: vec!["DeletedResourcesNotAvailable".into()],
            workers: 2,
            ..Config::default()
        };
        let caller = Arc::new(FakeCaller::answering(404));
        let engine = engine(&config, caller.clone());
        engine.global().record_successful_delete("http://fake/pets/9");
        engine.run(&operations(), Arc::new(MemoryReporter::new()));
        let sent = caller.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].relative_path(), "/pets/9");
    }

    #[test]
    fn random_needs_stop_condition() {
        let caller = Arc::new(FakeCaller::answering(200));
        let engine = engine(&Config::default(), caller);
        let err = engine
            .run_random(&operations(), Arc::new(MemoryReporter::new()))
            .unwrap_err();
        assert!(matches!(err, EngineError::Playbook(PlaybookError::NoStopCondition)));
    }

    #[test]
    fn random_runs_per_operation() {
        let mut config = Config::default();
        config.random.max_tests = Some(2);
        config.random.seed = Some(11);
        let caller = Arc::new(FakeCaller::answering(200));
        let engine = engine(&config, caller.clone());
        let run = engine
            .run_random(&operations(), Arc::new(MemoryReporter::new()))
            .unwrap();
        // only POST /pets carries a payload
        assert_eq!(run.tests, 2);
        assert_eq!(caller.sent().len(), 2);
    }
}
