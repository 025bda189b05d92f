use std::collections::HashMap;
use std::sync::Arc;

use crate::commands::{Command, FnCommand};
use crate::error::Result;
use crate::eval::CommandContext;

/// Registry of all commands, keyed by command name.
///
/// Built once before the engine starts; lookups never mutate it.
#[derive(Clone, Default)]
pub struct CommandRegistry {
    commands: HashMap<String, Arc<dyn Command>>,
}

impl CommandRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in commands.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        crate::commands::register_builtins(&mut registry);
        registry
    }

    /// Register a command. Replaces any existing command with the same name.
    pub fn register(&mut self, name: impl Into<String>, command: impl Command + 'static) {
        self.commands.insert(name.into(), Arc::new(command));
    }

    /// Register a closure as a command.
    pub fn register_fn<F>(&mut self, name: impl Into<String>, usage: impl Into<String>, f: F)
    where
        F: Fn(&mut CommandContext<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.register(name, FnCommand::new(usage, f));
    }

    /// Look up a command by exact name.
    pub fn get(&self, name: &str) -> Option<&dyn Command> {
        self.commands.get(name).map(|c| c.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.commands.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
