//! Continuous random mutation
//!
//! Each iteration picks a field present in the payload and a mutator, sends
//! the mutated request and checks the response against the match predicates.
//! A match is reported as an error, anything else as skipped. The loop ends
//! when the first configured stop condition fires.

use std::time::{Duration, Instant};

use rand::rngs::SmallRng;
use rand::{Rng, RngCore, SeedableRng};
use serde_json::Value;
use tracing::{debug, info, warn};

use negfuzz_core::config::RandomConfig;
use negfuzz_core::http::Header;
use negfuzz_core::matcher::ResponseMatcher;
use negfuzz_core::mutation::{FieldPath, field_exists, get_values};
use negfuzz_core::operation::{FieldInfo, OperationData};
use negfuzz_core::report::{Outcome, TestCaseResult};
use negfuzz_core::strategy::stringify;

use super::PlaybookError;
use crate::executor::{Dispatch, ExecutionContext, ExecutorError, TestCase, service_data};
use crate::mutators::{self, CustomMutator, Mutator, MutatorCapability};

const PLAYBOOK_NAME: &str = "RandomFuzzing";

/// When to stop. Whichever configured limit is reached first wins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StopConditions {
    pub max_duration: Option<Duration>,
    pub max_errors: Option<u64>,
    pub max_tests: Option<u64>,
}

impl StopConditions {
    #[must_use]
    pub fn from_config(config: &RandomConfig) -> Self {
        Self {
            max_duration: config.max_duration_secs.map(Duration::from_secs),
            max_errors: config.max_errors,
            max_tests: config.max_tests,
        }
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.max_duration.is_none() && self.max_errors.is_none() && self.max_tests.is_none()
    }

    /// Name of the limit that has been reached, if any.
    #[must_use]
    pub fn reached(&self, elapsed: Duration, errors: u64, tests: u64) -> Option<&'static str> {
        if self.max_tests.is_some_and(|max| tests >= max) {
            return Some("max tests");
        }
        if self.max_errors.is_some_and(|max| errors >= max) {
            return Some("max errors");
        }
        if self.max_duration.is_some_and(|max| elapsed >= max) {
            return Some("max duration");
        }
        None
    }
}

/// Counts from one loop run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RandomRun {
    pub tests: u64,
    pub errors: u64,
}

pub struct RandomPlaybook {
    stop: StopConditions,
    matcher: ResponseMatcher,
    mutators: Vec<Box<dyn Mutator>>,
    seed: Option<u64>,
}

impl RandomPlaybook {
    /// # Errors
    ///
    /// Returns error if no stop condition is set or `mutators` is empty.
    pub fn new(
        stop: StopConditions,
        matcher: ResponseMatcher,
        mutators: Vec<Box<dyn Mutator>>,
    ) -> Result<Self, PlaybookError> {
        if stop.is_empty() {
            return Err(PlaybookError::NoStopCondition);
        }
        if mutators.is_empty() {
            return Err(PlaybookError::NoMutators);
        }
        if matcher.is_empty() {
            warn!("random playbook has no match predicates, every test will be skipped");
        }
        Ok(Self {
            stop,
            matcher,
            mutators,
            seed: None,
        })
    }

    /// Built-in mutators plus `custom`, limits and predicates from `config`.
    ///
    /// # Errors
    ///
    /// Returns error if no stop condition is configured or the body regex
    /// does not compile.
    pub fn from_config(config: &RandomConfig, custom: Vec<CustomMutator>) -> Result<Self, PlaybookError> {
        let matcher = ResponseMatcher::from_config(&config.matchers)?;
        let mut all = mutators::registry();
        all.extend(custom.into_iter().map(|m| Box::new(m) as Box<dyn Mutator>));
        let playbook = Self::new(StopConditions::from_config(config), matcher, all)?;
        Ok(match config.seed {
            Some(seed) => playbook.with_seed(seed),
            None => playbook,
        })
    }

    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    #[must_use]
    pub const fn stop_conditions(&self) -> &StopConditions {
        &self.stop
    }

    /// Mutate and send until a stop condition fires. An operation without a
    /// JSON payload, or whose fields are all absent from it, runs nothing.
    pub fn run(&self, ctx: &ExecutionContext, op: &OperationData) -> RandomRun {
        let mut run = RandomRun::default();
        let Some(doc) = parse_payload(&op.payload) else {
            debug!(operation = %op.label(), "no payload to mutate");
            return run;
        };
        let candidates: Vec<(&FieldInfo, FieldPath)> = op
            .fields
            .iter()
            .filter_map(|f| FieldPath::parse(&f.path).ok().map(|p| (f, p)))
            .filter(|(_, path)| field_exists(&doc, path))
            .collect();
        if candidates.is_empty() {
            debug!(operation = %op.label(), "no payload field to mutate");
            return run;
        }

        let mut rng = match self.seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_entropy(),
        };
        let started = Instant::now();
        loop {
            if let Some(limit) = self.stop.reached(started.elapsed(), run.errors, run.tests) {
                info!(
                    operation = %op.label(),
                    tests = run.tests,
                    errors = run.errors,
                    "random fuzzing stopped: {limit}"
                );
                break;
            }
            let (field, path) = &candidates[rng.gen_range(0..candidates.len())];
            let mutator = &self.mutators[rng.gen_range(0..self.mutators.len())];
            let case = ctx.test_case(PLAYBOOK_NAME, scenario(mutator.as_ref(), field), op);
            let outcome = ctx.run_test_case(&case, || {
                self.iteration(ctx, op, &doc, field, path, mutator.as_ref(), &case, &mut rng)
            });
            run.tests += 1;
            if outcome == Some(Outcome::Error) {
                run.errors += 1;
            }
        }
        run
    }

    #[allow(clippy::too_many_arguments)]
    fn iteration(
        &self,
        ctx: &ExecutionContext,
        op: &OperationData,
        doc: &Value,
        field: &FieldInfo,
        path: &FieldPath,
        mutator: &dyn Mutator,
        case: &TestCase,
        rng: &mut dyn RngCore,
    ) -> Result<Option<TestCaseResult>, ExecutorError> {
        let mut builder = service_data(op, case);
        let fuzzed_input = match mutator.capability() {
            MutatorCapability::Body => {
                let mutated = mutator.mutate_body(doc, path, rng)?;
                let input = get_values(&mutated, path)
                    .first()
                    .map_or_else(|| stringify(&mutated), |v| stringify(v));
                builder = builder
                    .payload(mutated.to_string())
                    .tested_fields([field.path.clone()]);
                input
            }
            MutatorCapability::Headers => {
                let headers: Vec<Header> = op
                    .headers
                    .iter()
                    .map(|h| Header::new(h.name.clone(), h.example.clone()))
                    .collect();
                let mutated = mutator.mutate_headers(&headers, rng);
                builder = builder.headers(&mutated);
                String::new()
            }
        };
        let exchange = match ctx.dispatch(case, &builder.build())? {
            Dispatch::Planned => return Ok(None),
            Dispatch::Sent(exchange) => exchange,
        };
        let result = if exchange.response.is_synthetic() {
            let failure = exchange
                .response
                .transport_failure_kind()
                .map_or_else(|| "unknown".to_string(), |f| f.to_string());
            case.result(
                Outcome::Error,
                format!("transport failure: {failure} ({})", exchange.response.status_code),
            )
        } else {
            match self.matcher.describe_match(&exchange.response, &fuzzed_input) {
                Some(why) => case.result(Outcome::Error, format!("interesting response: {why}")),
                None => case.result(Outcome::Skipped, "response matched no predicate"),
            }
        };
        Ok(Some(
            result
                .with_exchange(exchange.request, &exchange.response)
                .with_context("mutator", mutator.name())
                .with_context("field", field.path.clone()),
        ))
    }
}

impl std::fmt::Debug for RandomPlaybook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RandomPlaybook")
            .field("stop", &self.stop)
            .field("mutators", &self.mutators.len())
            .field("seed", &self.seed)
            .finish_non_exhaustive()
    }
}

fn parse_payload(payload: &str) -> Option<Value> {
    match serde_json::from_str::<Value>(payload).ok()? {
        Value::Object(map) if map.is_empty() => None,
        Value::Null => None,
        doc => Some(doc),
    }
}

fn scenario(mutator: &dyn Mutator, field: &FieldInfo) -> String {
    match mutator.capability() {
        MutatorCapability::Body => format!("{} on field '{}'", mutator.description(), field.path),
        MutatorCapability::Headers => mutator.description().to_string(),
    }
}
