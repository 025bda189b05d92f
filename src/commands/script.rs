use log::{debug, warn};

use crate::commands::Command;
use crate::error::Result;
use crate::eval::CommandContext;
use crate::parse::logical_lines;

/// `run FILE`: execute a script, one logical line at a time.
///
/// Scripts use the interactive conventions: `#` comment lines and trailing
/// backslash continuations. Each line goes through the full engine. A
/// failing line does not stop the script; its error is written to the
/// output as `error: ...` and the next line runs.
pub struct Run;

impl Command for Run {
    fn usage(&self) -> &str {
        "run FILE"
    }

    fn min_args(&self) -> usize {
        1
    }

    fn run(&self, ctx: &mut CommandContext<'_>) -> Result<()> {
        let raw = ctx.arg(0).unwrap_or_default();
        let path = shellexpand::tilde(raw).into_owned();
        let text = std::fs::read_to_string(&path).map_err(|e| ctx.fail(format!("{path}: {e}")))?;

        let lines = logical_lines(&text);
        debug!("run {path}: {} line(s)", lines.len());

        for line in lines {
            let execution = ctx.execute(&line);
            ctx.print(&execution.output);
            for error in &execution.errors {
                warn!("{path}: {line:?}: {error}");
                ctx.println(&format!("error: {error}"));
            }
        }
        Ok(())
    }
}
