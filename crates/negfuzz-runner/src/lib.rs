//! negfuzz-runner: Request pipeline and test execution for negative API testing
//!
//! [`caller`] turns a request intent into one HTTP exchange, [`executor`]
//! runs the select → mutate → call → classify → report protocol,
//! [`playbook`] holds the declarative test generators and the random
//! mutation loop, and [`engine`] schedules all of it across workers.

pub mod auth;
pub mod caller;
pub mod dsl;
pub mod engine;
pub mod executor;
pub mod mutators;
pub mod playbook;

pub use auth::{AuthError, AuthScript};
pub use caller::{Caller, CallerError, Exchange, ServiceCaller};
pub use dsl::Dsl;
pub use engine::{Engine, EngineError, RunOutcome};
pub use executor::{ExecutionContext, ExecutorError};
pub use mutators::{Mutator, MutatorCapability};
pub use playbook::{Capability, Playbook, PlaybookError, RandomPlaybook, Registry};
