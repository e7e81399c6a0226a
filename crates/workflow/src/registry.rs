//! Ordered list of registered build steps

use futures::future::BoxFuture;
use futures::FutureExt;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use stevedore_types::LogLevel;

use crate::outcome::StepOutcome;

/// Future produced by one invocation of a step's action
pub type StepFuture = BoxFuture<'static, StepOutcome>;

/// Zero-argument executable unit captured at registration time
pub type StepAction = Arc<dyn Fn() -> StepFuture + Send + Sync>;

/// Step name used for log-only steps
pub const LOG_STEP_NAME: &str = "Log";

/// What a step does when the runner reaches it
#[derive(Clone)]
pub enum StepKind {
    Action(StepAction),
    /// Emit a message; always succeeds without running anything
    Log { level: LogLevel, message: String },
}

/// One registered step
///
/// Immutable once built. The action owns everything it needs (executor,
/// options); the runner only decides whether and when to await it.
#[derive(Clone)]
pub struct BuildStep {
    name: String,
    context: Option<String>,
    kind: StepKind,
}

impl BuildStep {
    /// Step that awaits `action` when run
    pub fn action<F, Fut>(name: impl Into<String>, context: Option<String>, action: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = StepOutcome> + Send + 'static,
    {
        Self {
            name: name.into(),
            context,
            kind: StepKind::Action(Arc::new(move || action().boxed())),
        }
    }

    #[must_use]
    pub fn log(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            name: LOG_STEP_NAME.to_string(),
            context: None,
            kind: StepKind::Log {
                level,
                message: message.into(),
            },
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    #[must_use]
    pub fn kind(&self) -> &StepKind {
        &self.kind
    }

    #[must_use]
    pub fn is_log_step(&self) -> bool {
        matches!(self.kind, StepKind::Log { .. })
    }

    #[must_use]
    pub fn log_level(&self) -> Option<LogLevel> {
        match &self.kind {
            StepKind::Log { level, .. } => Some(*level),
            StepKind::Action(_) => None,
        }
    }

    #[must_use]
    pub fn log_message(&self) -> Option<&str> {
        match &self.kind {
            StepKind::Log { message, .. } => Some(message),
            StepKind::Action(_) => None,
        }
    }
}

impl fmt::Debug for BuildStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("BuildStep");
        s.field("name", &self.name).field("context", &self.context);
        match &self.kind {
            StepKind::Action(_) => s.field("kind", &"action"),
            StepKind::Log { level, message } => s.field("level", level).field("message", message),
        };
        s.finish()
    }
}

/// Steps in registration order
///
/// No deduplication and no validation; the same name may appear any
/// number of times.
#[derive(Debug, Default, Clone)]
pub struct StepRegistry {
    steps: Vec<BuildStep>,
}

impl StepRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, step: BuildStep) {
        self.steps.push(step);
    }

    #[must_use]
    pub fn steps(&self) -> &[BuildStep] {
        &self.steps
    }

    pub fn clear(&mut self) {
        self.steps.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Move the steps out, leaving the registry empty
    pub fn take(&mut self) -> Vec<BuildStep> {
        std::mem::take(&mut self.steps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_preserves_order_and_duplicates() {
        let mut registry = StepRegistry::new();
        registry.register(BuildStep::action("Dotnet.Restore", None, || async {
            StepOutcome::Succeeded
        }));
        registry.register(BuildStep::log(LogLevel::Info, "building"));
        registry.register(BuildStep::action("Dotnet.Restore", None, || async {
            StepOutcome::Succeeded
        }));

        let names: Vec<&str> = registry.steps().iter().map(BuildStep::name).collect();
        assert_eq!(names, vec!["Dotnet.Restore", "Log", "Dotnet.Restore"]);
        assert!(registry.steps()[1].is_log_step());
        assert_eq!(registry.steps()[1].log_message(), Some("building"));

        let taken = registry.take();
        assert_eq!(taken.len(), 3);
        assert!(registry.is_empty());
    }

    #[test]
    fn clear_empties_the_registry() {
        let mut registry = StepRegistry::new();
        registry.register(BuildStep::log(LogLevel::Debug, "x"));
        registry.clear();
        assert_eq!(registry.len(), 0);
    }
}
