//! Substitution pass run on every input line before it is parsed.
//!
//! Order of operations:
//!
//! 1. Pluggable [`TokenReplacer`]s, any of which may stop further processing.
//! 2. Whole-line alias lookup (the trimmed line must match an alias exactly).
//! 3. Default-variable substitution: plain substring replacement of every
//!    registered key, longest key first.
//! 4. Token resolution: every word starting with `@` (or a quoted word whose
//!    content starts with `@`) is resolved as `@env:NAME`, `@exec:COMMAND`
//!    or a variable lookup. Unresolvable tokens are left as written.

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, warn};

use crate::error::Result;
use crate::parse::split::word_spans;
use crate::store::{Store, TOKEN_PREFIX};

/// Outcome of a [`TokenReplacer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Replaced {
    /// Keep going with the (possibly rewritten) line.
    Continue(String),
    /// Use this line as the final expansion; skip the remaining steps.
    Stop(String),
}

/// Extension point run before aliases and variables.
pub trait TokenReplacer: Send + Sync {
    fn replace(&self, line: &str) -> Replaced;
}

/// Per-call variable overlay consulted before the shared store.
pub type Scope = HashMap<String, String>;

const ENV_TOKEN: &str = "@env:";
const EXEC_TOKEN: &str = "@exec:";

/// Expands one line against the stores it borrows.
///
/// `exec` runs a nested command line through the full engine; its errors are
/// logged and the token expands to an empty string.
pub struct Substituter<'a> {
    variables: &'a Store,
    aliases: &'a Store,
    scope: Option<&'a Scope>,
    replacers: &'a [Arc<dyn TokenReplacer>],
    exec: &'a dyn Fn(&str) -> Result<String>,
}

impl<'a> Substituter<'a> {
    pub fn new(
        variables: &'a Store,
        aliases: &'a Store,
        exec: &'a dyn Fn(&str) -> Result<String>,
    ) -> Self {
        Self {
            variables,
            aliases,
            scope: None,
            replacers: &[],
            exec,
        }
    }

    pub fn with_scope(mut self, scope: Option<&'a Scope>) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_replacers(mut self, replacers: &'a [Arc<dyn TokenReplacer>]) -> Self {
        self.replacers = replacers;
        self
    }

    /// Run all substitution steps over `line`.
    pub fn expand(&self, line: &str) -> String {
        let mut line = line.to_string();

        for replacer in self.replacers {
            match replacer.replace(&line) {
                Replaced::Continue(next) => line = next,
                Replaced::Stop(done) => return done,
            }
        }

        if let Some(expansion) = self.aliases.get(line.trim()) {
            debug!("alias {:?} -> {:?}", line.trim(), expansion);
            line = expansion;
        }

        let line = self.apply_defaults(&line);
        self.resolve_tokens(&line)
    }

    fn defaults(&self) -> Vec<(String, String)> {
        let mut entries: HashMap<String, String> = self.variables.snapshot().into_iter().collect();
        if let Some(scope) = self.scope {
            entries.extend(scope.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        let mut entries: Vec<(String, String)> = entries.into_iter().collect();
        entries.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));
        entries
    }

    fn apply_defaults(&self, line: &str) -> String {
        let mut out = line.to_string();
        for (key, value) in self.defaults() {
            if !key.is_empty() && out.contains(&key) {
                out = out.replace(&key, &value);
            }
        }
        out
    }

    fn resolve_tokens(&self, line: &str) -> String {
        let mut out = String::with_capacity(line.len());
        let mut last = 0;

        for (start, end) in word_spans(line) {
            out.push_str(&line[last..start]);
            let word = &line[start..end];
            match self.resolve_word(word) {
                Some(resolved) => out.push_str(&resolved),
                None => out.push_str(word),
            }
            last = end;
        }
        out.push_str(&line[last..]);

        out
    }

    fn resolve_word(&self, word: &str) -> Option<String> {
        if word.starts_with(TOKEN_PREFIX) {
            return Some(self.resolve_token(word));
        }

        let quote = word.chars().next().filter(|c| *c == '"' || *c == '\'')?;
        let inner = word
            .strip_prefix(quote)?
            .strip_suffix(quote)
            .filter(|inner| inner.starts_with(TOKEN_PREFIX))?;
        Some(format!("{quote}{}{quote}", self.resolve_token(inner)))
    }

    fn resolve_token(&self, token: &str) -> String {
        if let Some(name) = token.strip_prefix(ENV_TOKEN) {
            return std::env::var(name).unwrap_or_else(|_| token.to_string());
        }

        if let Some(command) = token.strip_prefix(EXEC_TOKEN) {
            return match (self.exec)(command) {
                Ok(output) => output.trim_end_matches(['\n', '\r']).to_string(),
                Err(e) => {
                    warn!("nested execution of {command:?} failed: {e}");
                    String::new()
                }
            };
        }

        self.scope
            .and_then(|scope| scope.get(token).cloned())
            .or_else(|| self.variables.get(token))
            .unwrap_or_else(|| token.to_string())
    }
}
