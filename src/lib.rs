//! replkit: a small command-language engine for interactive consoles.
//!
//! A line of input goes through three phases: token substitution (aliases,
//! default variables, `@env:` and `@exec:` tokens), parsing into `;`-separated
//! groups of `|`-chained stages with an optional `>` redirect, and execution
//! against a [`CommandRegistry`], where each stage's output becomes the next
//! stage's input. Long-running OS processes run as supervised background jobs.
//!
//! # Architecture
//!
//! - **[`parse`]**: quote-aware splitting, shlex tokenizer, line parser, pipeline types.
//! - **[`subst`]**: the substitution pass and the [`subst::TokenReplacer`] extension point.
//! - **[`eval`]**: the [`Engine`], command registry, per-stage context.
//! - **[`commands`]**: the command trait and the built-in command set.
//! - **[`jobs`]**: background process supervision.
//! - **[`store`]**: shared variable and alias stores.
//! - **[`config`]**: embedded defaults plus user overlay merge.
//! - **[`logging`]**: file logging to `~/.local/share/replkit/replkit.log`.

/// Command trait and built-in commands.
pub mod commands;
/// Configuration types, loading, and overlay merge logic.
pub mod config;
/// Error types.
pub mod error;
/// Execution engine: registry, pipeline runner, command context.
pub mod eval;
/// Background job supervision.
pub mod jobs;
/// File-based logging.
pub mod logging;
/// Line parsing: quote-aware splitting, tokenizer, pipeline types.
pub mod parse;
/// Thread-safe key/value stores.
pub mod store;
/// Token substitution.
pub mod subst;

pub use error::{Error, Result};
pub use eval::{CommandRegistry, Engine, Execution};
pub use jobs::JobSupervisor;

/// Execute one line against a fresh engine with the built-in commands.
///
/// Handy for tests and one-shot use; state does not persist between calls.
/// Build an [`Engine`] to keep variables, aliases and jobs around.
pub fn execute(line: &str) -> Execution {
    Engine::default().execute(line)
}
