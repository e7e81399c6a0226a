#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Build step registry and fail-fast workflow runner
//!
//! A script registers [`BuildStep`]s into a [`StepRegistry`]; the
//! [`WorkflowRunner`] then awaits them one after another, recording a
//! [`StepResult`] for every step that ran.

pub mod outcome;
pub mod registry;
pub mod result;
pub mod runner;
pub mod tools;

pub use outcome::{StepOutcome, STEP_RETURNED_FALSE};
pub use registry::{BuildStep, StepAction, StepFuture, StepKind, StepRegistry, LOG_STEP_NAME};
pub use result::{StepResult, WorkflowResult};
pub use runner::{RunState, StepState, WorkflowRunner};
pub use tools::{CommandToolChecker, MissingTool, ToolChecker, ToolCheckerRegistry};
