//! Tool-availability diagnostics for failed steps
//!
//! When a step fails, the runner asks the registry whether the step belongs
//! to a tool it knows about. If that tool is missing from the environment the
//! step ran in, the user gets install instructions instead of a bare exit code.

use async_trait::async_trait;
use std::fmt::Debug;
use stevedore_platform::SharedExecutor;

/// Checks whether the tool behind a family of steps is installed
#[async_trait]
pub trait ToolChecker: Send + Sync + Debug {
    /// Display name of the tool
    fn tool_name(&self) -> &str;

    /// Whether this checker covers the given step
    fn can_check(&self, step_name: &str) -> bool;

    async fn is_available(&self) -> bool;

    fn install_instructions(&self) -> String;

    fn documentation_url(&self) -> Option<String> {
        None
    }
}

/// Checker that looks a binary up on the executor's search path
///
/// Covers every step whose name starts with `<prefix>.`. Without an
/// executor the host `PATH` is searched.
#[derive(Debug, Clone)]
pub struct CommandToolChecker {
    tool_name: String,
    command: String,
    step_prefix: String,
    install_instructions: String,
    documentation_url: Option<String>,
    executor: Option<SharedExecutor>,
}

impl CommandToolChecker {
    #[must_use]
    pub fn new(
        tool_name: impl Into<String>,
        command: impl Into<String>,
        step_prefix: impl Into<String>,
        install_instructions: impl Into<String>,
    ) -> Self {
        Self {
            tool_name: tool_name.into(),
            command: command.into(),
            step_prefix: step_prefix.into(),
            install_instructions: install_instructions.into(),
            documentation_url: None,
            executor: None,
        }
    }

    #[must_use]
    pub fn with_documentation_url(mut self, url: impl Into<String>) -> Self {
        self.documentation_url = Some(url.into());
        self
    }

    /// Look the command up through `executor` instead of the host
    #[must_use]
    pub fn with_executor(mut self, executor: SharedExecutor) -> Self {
        self.executor = Some(executor);
        self
    }

    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }
}

#[async_trait]
impl ToolChecker for CommandToolChecker {
    fn tool_name(&self) -> &str {
        &self.tool_name
    }

    fn can_check(&self, step_name: &str) -> bool {
        step_name
            .strip_prefix(self.step_prefix.as_str())
            .is_some_and(|rest| rest.starts_with('.'))
    }

    async fn is_available(&self) -> bool {
        match &self.executor {
            Some(executor) => executor.is_available(&self.command).await,
            None => which::which(&self.command).is_ok(),
        }
    }

    fn install_instructions(&self) -> String {
        self.install_instructions.clone()
    }

    fn documentation_url(&self) -> Option<String> {
        self.documentation_url.clone()
    }
}

/// A tool found missing after a step failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingTool {
    pub tool: String,
    pub install_instructions: String,
    pub documentation_url: Option<String>,
}

/// Ordered set of checkers consulted in registration order
#[derive(Debug, Default)]
pub struct ToolCheckerRegistry {
    checkers: Vec<Box<dyn ToolChecker>>,
}

impl ToolCheckerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry covering the built-in operation wrappers
    ///
    /// Lookups go through `executor` when given, so a container run checks
    /// the container rather than the host.
    #[must_use]
    pub fn with_defaults(executor: Option<SharedExecutor>) -> Self {
        let mut registry = Self::new();
        for checker in default_checkers() {
            let checker = match &executor {
                Some(executor) => checker.with_executor(executor.clone()),
                None => checker,
            };
            registry.register(Box::new(checker));
        }
        registry
    }

    pub fn register(&mut self, checker: Box<dyn ToolChecker>) {
        self.checkers.push(checker);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.checkers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.checkers.is_empty()
    }

    /// Report the first missing tool behind `step_name`, if any
    ///
    /// Every checker covering the step is consulted; available tools are
    /// skipped.
    pub async fn check(&self, step_name: &str) -> Option<MissingTool> {
        for checker in self.checkers.iter().filter(|c| c.can_check(step_name)) {
            if checker.is_available().await {
                continue;
            }
            return Some(MissingTool {
                tool: checker.tool_name().to_string(),
                install_instructions: checker.install_instructions(),
                documentation_url: checker.documentation_url(),
            });
        }
        None
    }
}

fn default_checkers() -> Vec<CommandToolChecker> {
    vec![
        CommandToolChecker::new(
            ".NET SDK",
            "dotnet",
            "Dotnet",
            "Install the .NET SDK from Microsoft's package feed or use the mcr.microsoft.com/dotnet/sdk image",
        )
        .with_documentation_url("https://learn.microsoft.com/dotnet/core/install/"),
        CommandToolChecker::new(
            "Cargo",
            "cargo",
            "Cargo",
            "Install the Rust toolchain with rustup (curl https://sh.rustup.rs -sSf | sh)",
        )
        .with_documentation_url("https://rustup.rs"),
        CommandToolChecker::new(
            "npm",
            "npm",
            "Npm",
            "Install Node.js, which ships npm, via your package manager or a version manager",
        )
        .with_documentation_url("https://nodejs.org/en/download"),
        CommandToolChecker::new(
            "Docker",
            "docker",
            "Docker",
            "Install Docker Engine and make sure the daemon is running",
        )
        .with_documentation_url("https://docs.docker.com/engine/install/"),
        CommandToolChecker::new(
            "AWS CLI",
            "aws",
            "Aws",
            "Install AWS CLI v2 and configure credentials with `aws configure`",
        )
        .with_documentation_url("https://docs.aws.amazon.com/cli/latest/userguide/getting-started-install.html"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_match_requires_a_dot() {
        let checker = CommandToolChecker::new("npm", "npm", "Npm", "install node");
        assert!(checker.can_check("Npm.Install"));
        assert!(!checker.can_check("Npm"));
        assert!(!checker.can_check("Npmx.Install"));
        assert!(!checker.can_check("Dotnet.Build"));
    }

    #[derive(Debug)]
    struct FixedChecker {
        name: &'static str,
        prefix: &'static str,
        available: bool,
    }

    #[async_trait]
    impl ToolChecker for FixedChecker {
        fn tool_name(&self) -> &str {
            self.name
        }

        fn can_check(&self, step_name: &str) -> bool {
            step_name.starts_with(self.prefix)
        }

        async fn is_available(&self) -> bool {
            self.available
        }

        fn install_instructions(&self) -> String {
            format!("install {}", self.name)
        }
    }

    fn registry_of(checkers: Vec<FixedChecker>) -> ToolCheckerRegistry {
        let mut registry = ToolCheckerRegistry::new();
        for checker in checkers {
            registry.register(Box::new(checker));
        }
        registry
    }

    #[tokio::test]
    async fn later_checker_reports_when_earlier_tool_is_present() {
        let registry = registry_of(vec![
            FixedChecker { name: "dotnet", prefix: "Dotnet.", available: true },
            FixedChecker { name: "workload", prefix: "Dotnet.", available: false },
        ]);

        let missing = registry.check("Dotnet.Publish").await.unwrap();
        assert_eq!(missing.tool, "workload");
        assert_eq!(missing.install_instructions, "install workload");
        assert!(missing.documentation_url.is_none());
    }

    #[tokio::test]
    async fn first_absent_checker_wins_and_present_tools_report_nothing() {
        let registry = registry_of(vec![
            FixedChecker { name: "sdk", prefix: "Dotnet.", available: false },
            FixedChecker { name: "workload", prefix: "Dotnet.", available: false },
            FixedChecker { name: "cargo", prefix: "Cargo.", available: true },
        ]);

        assert_eq!(registry.check("Dotnet.Build").await.unwrap().tool, "sdk");
        assert!(registry.check("Cargo.Build").await.is_none());
        assert!(registry.check("Shell").await.is_none());
    }

    #[test]
    fn defaults_cover_builtin_wrappers() {
        let registry = ToolCheckerRegistry::with_defaults(None);
        assert_eq!(registry.len(), 5);
    }
}
