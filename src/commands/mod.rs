//! Command handlers: the trait the engine dispatches to, plus the built-in
//! command set.
//!
//! Each handler reads its arguments and the previous stage's output from a
//! [`CommandContext`] and writes its own output back into it.

/// Background jobs: bg, jobs, job, kill, wait, clean.
pub mod jobs;
/// Script execution: run.
pub mod script;
/// Synchronous OS processes: system.
pub mod system;
/// Text filters and utilities: print, grep, wc, upper, sleep, help.
pub mod text;
/// Variable and alias management: set, unset, vars, alias, unalias.
pub mod vars;

use crate::error::Result;
use crate::eval::{CommandContext, CommandRegistry};

/// A registered command.
pub trait Command: Send + Sync {
    /// Usage line shown by `help` and in usage errors.
    fn usage(&self) -> &str;

    /// Minimum number of arguments; fewer is a usage error and the handler
    /// is not called.
    fn min_args(&self) -> usize {
        0
    }

    /// Run the command.
    fn run(&self, ctx: &mut CommandContext<'_>) -> Result<()>;
}

/// A command backed by a closure.
pub struct FnCommand<F> {
    usage: String,
    min_args: usize,
    f: F,
}

impl<F> FnCommand<F>
where
    F: Fn(&mut CommandContext<'_>) -> Result<()> + Send + Sync,
{
    pub fn new(usage: impl Into<String>, f: F) -> Self {
        Self {
            usage: usage.into(),
            min_args: 0,
            f,
        }
    }

    pub fn min_args(mut self, n: usize) -> Self {
        self.min_args = n;
        self
    }
}

impl<F> Command for FnCommand<F>
where
    F: Fn(&mut CommandContext<'_>) -> Result<()> + Send + Sync,
{
    fn usage(&self) -> &str {
        &self.usage
    }

    fn min_args(&self) -> usize {
        self.min_args
    }

    fn run(&self, ctx: &mut CommandContext<'_>) -> Result<()> {
        (self.f)(ctx)
    }
}

/// Register every built-in command.
pub fn register_builtins(registry: &mut CommandRegistry) {
    registry.register("print", text::Print);
    registry.register("echo", text::Print);
    registry.register("grep", text::Grep);
    registry.register("wc", text::Wc);
    registry.register("upper", text::Upper);
    registry.register("sleep", text::Sleep);
    registry.register("help", text::Help);

    registry.register("set", vars::Set);
    registry.register("unset", vars::Unset);
    registry.register("vars", vars::Vars);
    registry.register("alias", vars::Alias);
    registry.register("unalias", vars::Unalias);

    registry.register("bg", jobs::Background);
    registry.register("jobs", jobs::Jobs);
    registry.register("job", jobs::JobReport);
    registry.register("kill", jobs::Kill);
    registry.register("wait", jobs::Wait);
    registry.register("clean", jobs::Clean);

    registry.register("system", system::System);
    registry.register("run", script::Run);
}
