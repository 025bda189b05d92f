use std::fmt;

use crate::error::Error;
use crate::eval::{Engine, Execution};
use crate::jobs::JobSupervisor;
use crate::parse::PipelineStage;
use crate::store::Store;
use crate::subst::Scope;

/// Everything a command handler sees for one pipeline stage.
///
/// `input` is the captured output of the previous stage (empty for the
/// first stage). Whatever the handler writes becomes the input of the next
/// stage, or the group's output if this is the last stage.
pub struct CommandContext<'a> {
    engine: &'a Engine,
    stage: &'a PipelineStage,
    input: &'a str,
    scope: Option<&'a Scope>,
    depth: usize,
    output: String,
}

impl<'a> CommandContext<'a> {
    pub(crate) fn new(
        engine: &'a Engine,
        stage: &'a PipelineStage,
        input: &'a str,
        scope: Option<&'a Scope>,
        depth: usize,
    ) -> Self {
        Self {
            engine,
            stage,
            input,
            scope,
            depth,
            output: String::new(),
        }
    }

    /// The command name as typed.
    pub fn name(&self) -> &str {
        &self.stage.name
    }

    /// Arguments after the command name.
    pub fn args(&self) -> &[String] {
        &self.stage.args
    }

    pub fn arg(&self, index: usize) -> Option<&str> {
        self.stage.args.get(index).map(String::as_str)
    }

    /// Check if any argument matches a flag.
    pub fn has_flag(&self, flag: &str) -> bool {
        self.stage.args.iter().any(|a| a == flag)
    }

    /// Output of the previous stage.
    pub fn input(&self) -> &str {
        self.input
    }

    pub fn print(&mut self, text: &str) {
        self.output.push_str(text);
    }

    pub fn println(&mut self, text: &str) {
        self.output.push_str(text);
        self.output.push('\n');
    }

    /// Build a handler error for this command.
    pub fn fail(&self, message: impl Into<String>) -> Error {
        Error::command(self.name(), message)
    }

    pub fn engine(&self) -> &Engine {
        self.engine
    }

    pub fn variables(&self) -> &Store {
        self.engine.variables()
    }

    pub fn aliases(&self) -> &Store {
        self.engine.aliases()
    }

    pub fn jobs(&self) -> &JobSupervisor {
        self.engine.jobs()
    }

    /// Run a nested line through the full engine, one level deeper and with
    /// this call's variable scope.
    pub fn execute(&self, line: &str) -> Execution {
        self.engine.run_line(line, "", self.scope, self.depth + 1)
    }

    pub(crate) fn into_output(self) -> String {
        self.output
    }
}

impl fmt::Write for CommandContext<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.output.push_str(s);
        Ok(())
    }
}
