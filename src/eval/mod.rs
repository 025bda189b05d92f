pub mod context;
pub mod registry;

pub use context::CommandContext;
pub use registry::CommandRegistry;

use std::sync::{Arc, mpsc};
use std::thread;
use std::time::Duration;

use log::{debug, warn};

use crate::config::Config;
use crate::error::{Error, ParseError, Result};
use crate::jobs::{JobId, JobSupervisor};
use crate::parse::{self, ParseResult, PipelineStage};
use crate::store::Store;
use crate::subst::{Scope, Substituter, TokenReplacer};

/// Nesting limit for `@exec:` tokens and script runs.
pub const MAX_DEPTH: usize = 16;

/// Outcome of one `execute` call.
///
/// `output` holds the combined output of every command group that
/// succeeded; `errors` holds one entry per failure, in the order they
/// happened. A failing group does not stop later groups.
#[derive(Debug, Default)]
pub struct Execution {
    pub output: String,
    pub errors: Vec<Error>,
}

impl Execution {
    fn failed(error: Error) -> Self {
        Self {
            output: String::new(),
            errors: vec![error],
        }
    }

    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// The first error, if any.
    pub fn error(&self) -> Option<&Error> {
        self.errors.first()
    }

    /// Output if nothing failed, else the first error.
    pub fn into_result(self) -> Result<String> {
        match self.errors.into_iter().next() {
            None => Ok(self.output),
            Some(e) => Err(e),
        }
    }
}

/// The command-language engine: substitution, parsing and pipeline
/// execution over a fixed command registry, plus the shared variable,
/// alias and job state.
///
/// Cloning is cheap and every clone shares the same state, so one engine
/// can serve any number of concurrent sessions. No lock is held while a
/// command runs, which is what makes nested execution safe.
#[derive(Clone)]
pub struct Engine {
    registry: Arc<CommandRegistry>,
    variables: Arc<Store>,
    aliases: Arc<Store>,
    jobs: Arc<JobSupervisor>,
    replacers: Arc<Vec<Arc<dyn TokenReplacer>>>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(CommandRegistry::with_builtins())
    }
}

impl Engine {
    pub fn new(registry: CommandRegistry) -> Self {
        Self::with_jobs(registry, JobSupervisor::new())
    }

    pub fn with_jobs(registry: CommandRegistry, jobs: JobSupervisor) -> Self {
        Self {
            registry: Arc::new(registry),
            variables: Arc::new(Store::variables()),
            aliases: Arc::new(Store::aliases()),
            jobs: Arc::new(jobs),
            replacers: Arc::new(Vec::new()),
        }
    }

    /// Built-in commands plus the aliases, defaults and job settings from
    /// configuration.
    pub fn from_config(config: &Config) -> Self {
        let jobs = JobSupervisor::with_poll_interval(Duration::from_millis(config.settings.job_poll_ms));
        let engine = Self::with_jobs(CommandRegistry::with_builtins(), jobs);
        for (name, expansion) in &config.aliases {
            engine.aliases.set(name.clone(), expansion.clone());
        }
        for (name, value) in &config.defaults {
            engine.variables.set(engine.variables.key_for(name), value.clone());
        }
        engine
    }

    /// Add a token replacer, run before alias and variable substitution.
    pub fn with_replacer(mut self, replacer: impl TokenReplacer + 'static) -> Self {
        Arc::make_mut(&mut self.replacers).push(Arc::new(replacer));
        self
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    pub fn variables(&self) -> &Store {
        &self.variables
    }

    pub fn aliases(&self) -> &Store {
        &self.aliases
    }

    pub fn jobs(&self) -> &JobSupervisor {
        &self.jobs
    }

    /// Substitute, parse and execute one line.
    pub fn execute(&self, line: &str) -> Execution {
        self.run_line(line, "", None, 0)
    }

    /// Execute with `input` as the initial input of every command group,
    /// so the first stage of each chain reads it like piped output.
    pub fn execute_with_input(&self, line: &str, input: &str) -> Execution {
        self.run_line(line, input, None, 0)
    }

    /// Like [`execute`](Self::execute) with a per-call variable overlay.
    /// Keys carry the token prefix (`@name`).
    pub fn execute_scoped(&self, line: &str, scope: Option<&Scope>) -> Execution {
        self.run_line(line, "", scope, 0)
    }

    /// Execute on a worker thread and give up waiting after `timeout`.
    ///
    /// A timed-out call keeps running in the background; its result is
    /// discarded.
    pub fn execute_timeout(&self, line: &str, timeout: Duration) -> Execution {
        let engine = self.clone();
        let line = line.to_string();
        let (tx, rx) = mpsc::channel();
        let spawned = thread::Builder::new()
            .name("replkit-exec".into())
            .spawn(move || {
                let _ = tx.send(engine.execute(&line));
            });
        if let Err(e) = spawned {
            return Execution::failed(Error::Io(e));
        }
        rx.recv_timeout(timeout)
            .unwrap_or_else(|_| Execution::failed(Error::Timeout(timeout)))
    }

    /// Run only the substitution pass.
    pub fn expand(&self, line: &str) -> String {
        self.expand_at(line, None, 0)
    }

    /// Execute an already parsed line.
    pub fn execute_parsed(&self, parsed: &ParseResult) -> Execution {
        self.run(parsed, "", None, 0)
    }

    /// Launch a single command as a supervised background process.
    ///
    /// The line is substituted and parsed like any other, but must hold
    /// exactly one command: pipes, `;` and redirection are rejected.
    pub fn spawn(&self, line: &str) -> Result<JobId> {
        let expanded = self.expand(line);
        let parsed = parse::parse(&expanded)?;
        let [head] = parsed.groups.as_slice() else {
            if parsed.is_empty() {
                return Err(ParseError::InvalidSyntax(expanded).into());
            }
            return Err(Error::BackgroundPipeline);
        };
        if head.next.is_some() || parsed.redirect.is_some() {
            return Err(Error::BackgroundPipeline);
        }
        self.spawn_words(&stage_words(head))
    }

    /// Launch `words[0]` with the remaining words as arguments.
    pub fn spawn_words(&self, words: &[String]) -> Result<JobId> {
        let command_line = parse::tokenize::join(words);
        Ok(self.jobs.launch(command_line, words)?)
    }

    pub(crate) fn run_line(
        &self,
        line: &str,
        input: &str,
        scope: Option<&Scope>,
        depth: usize,
    ) -> Execution {
        if depth > MAX_DEPTH {
            return Execution::failed(Error::RecursionLimit(MAX_DEPTH));
        }
        let expanded = self.expand_at(line, scope, depth);
        debug!("expanded {line:?} -> {expanded:?}");
        match parse::parse(&expanded) {
            Ok(parsed) => self.run(&parsed, input, scope, depth),
            Err(e) => Execution::failed(e.into()),
        }
    }

    fn expand_at(&self, line: &str, scope: Option<&Scope>, depth: usize) -> String {
        let exec = |command: &str| self.run_line(command, "", scope, depth + 1).into_result();
        Substituter::new(&self.variables, &self.aliases, &exec)
            .with_scope(scope)
            .with_replacers(&self.replacers)
            .expand(line)
    }

    fn run(
        &self,
        parsed: &ParseResult,
        input: &str,
        scope: Option<&Scope>,
        depth: usize,
    ) -> Execution {
        let mut execution = Execution::default();

        for group in &parsed.groups {
            match self.run_chain(group, input, scope, depth) {
                Ok(output) => execution.output.push_str(&output),
                Err(e) => {
                    warn!("{}: {e}", group.name);
                    execution.errors.push(e);
                }
            }
        }

        if let Some(target) = &parsed.redirect
            && let Err(e) = write_redirect(target, &execution.output)
        {
            warn!("redirect to {target:?} failed: {e}");
            execution.errors.push(e);
        }

        execution
    }

    /// Run one stage chain, feeding each stage's output to the next.
    /// Stops at the first failing stage.
    fn run_chain(
        &self,
        head: &PipelineStage,
        input: &str,
        scope: Option<&Scope>,
        depth: usize,
    ) -> Result<String> {
        let mut input = input.to_string();

        for stage in head.iter() {
            let command = self
                .registry
                .get(&stage.name)
                .ok_or_else(|| Error::UnknownCommand(stage.name.clone()))?;
            if stage.args.len() < command.min_args() {
                return Err(Error::Usage {
                    name: stage.name.clone(),
                    usage: command.usage().to_string(),
                });
            }

            let mut ctx = CommandContext::new(self, stage, &input, scope, depth);
            command.run(&mut ctx)?;
            input = ctx.into_output();
        }

        Ok(input)
    }
}

fn stage_words(stage: &PipelineStage) -> Vec<String> {
    std::iter::once(stage.name.clone())
        .chain(stage.args.iter().cloned())
        .collect()
}

/// Write the whole buffer to `target`, creating or truncating it.
/// `~` and `$VAR` in the target are expanded first.
fn write_redirect(target: &str, output: &str) -> Result<()> {
    let path = shellexpand::full(target)
        .map(|p| p.into_owned())
        .unwrap_or_else(|_| shellexpand::tilde(target).into_owned());
    std::fs::write(&path, output)?;
    debug!("wrote {} byte(s) to {path}", output.len());
    Ok(())
}
