//! negfuzz-core: Data model and pure logic for negative API testing
//!
//! This crate provides fuzzing strategies, the field mutation engine,
//! response code families, request/response records, run-wide correlation
//! state, and the result types used to classify and report test cases.
//! Nothing here touches the network.

pub mod codes;
pub mod config;
pub mod context;
pub mod dryrun;
pub mod http;
pub mod matcher;
pub mod mutation;
pub mod operation;
pub mod refdata;
pub mod report;
pub mod strategy;

pub use codes::{ParseFamilyError, ResponseCodeFamily};
pub use config::{AuthConfig, Config, ConfigError, HttpConfig, RandomConfig};
pub use context::GlobalContext;
pub use dryrun::{DryRunPlan, DryRunRecorder};
pub use http::{Header, HttpMethod, HttpRequest, HttpResponse, ServiceData, TransportFailure};
pub use matcher::{MatchConfig, ResponseMatcher};
pub use mutation::{FieldPath, FuzzedDocument, MutationError};
pub use operation::{FieldInfo, FieldType, HeaderInfo, OperationData};
pub use refdata::{PathValues, RefValue, ValuesFileError};
pub use report::{
    Classification, FieldExpectations, MemoryReporter, Outcome, Reporter, RunReport, RunSummary,
    SkipReason, TestCaseResult,
};
pub use strategy::{FuzzingStrategy, StrategyKind, merge_fuzzing};
