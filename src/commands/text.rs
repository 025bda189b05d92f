use std::time::Duration;

use crate::commands::Command;
use crate::error::Result;
use crate::eval::CommandContext;

/// `print WORDS...`: words joined by spaces. With no words, passes the
/// input through unchanged.
pub struct Print;

impl Command for Print {
    fn usage(&self) -> &str {
        "print [WORDS...]"
    }

    fn run(&self, ctx: &mut CommandContext<'_>) -> Result<()> {
        if ctx.args().is_empty() {
            let input = ctx.input().to_string();
            ctx.print(&input);
        } else {
            let line = ctx.args().join(" ");
            ctx.println(&line);
        }
        Ok(())
    }
}

/// `grep [-v] PATTERN`: keep input lines containing PATTERN (or not, with -v).
pub struct Grep;

impl Command for Grep {
    fn usage(&self) -> &str {
        "grep [-v] PATTERN"
    }

    fn min_args(&self) -> usize {
        1
    }

    fn run(&self, ctx: &mut CommandContext<'_>) -> Result<()> {
        let (invert, pattern) = match ctx.args() {
            [flag, pattern] if flag == "-v" => (true, pattern.clone()),
            [pattern] => (false, pattern.clone()),
            _ => return Err(ctx.fail(format!("usage: {}", self.usage()))),
        };
        let kept: Vec<String> = ctx
            .input()
            .lines()
            .filter(|line| line.contains(&pattern) != invert)
            .map(|line| format!("{line}\n"))
            .collect();
        for line in kept {
            ctx.print(&line);
        }
        Ok(())
    }
}

/// `wc`: line, word and byte counts of the input.
pub struct Wc;

impl Command for Wc {
    fn usage(&self) -> &str {
        "wc"
    }

    fn run(&self, ctx: &mut CommandContext<'_>) -> Result<()> {
        let input = ctx.input();
        let counts = format!(
            "{} {} {}",
            input.lines().count(),
            input.split_whitespace().count(),
            input.len()
        );
        ctx.println(&counts);
        Ok(())
    }
}

/// `upper`: the input in upper case.
pub struct Upper;

impl Command for Upper {
    fn usage(&self) -> &str {
        "upper"
    }

    fn run(&self, ctx: &mut CommandContext<'_>) -> Result<()> {
        let upper = ctx.input().to_uppercase();
        ctx.print(&upper);
        Ok(())
    }
}

/// `sleep SECONDS`: block for a (fractional) number of seconds.
pub struct Sleep;

impl Command for Sleep {
    fn usage(&self) -> &str {
        "sleep SECONDS"
    }

    fn min_args(&self) -> usize {
        1
    }

    fn run(&self, ctx: &mut CommandContext<'_>) -> Result<()> {
        let duration = ctx
            .arg(0)
            .and_then(|s| s.parse::<f64>().ok())
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
            .ok_or_else(|| ctx.fail("invalid duration"))?;
        std::thread::sleep(duration);
        Ok(())
    }
}

/// `help`: usage of every registered command.
pub struct Help;

impl Command for Help {
    fn usage(&self) -> &str {
        "help"
    }

    fn run(&self, ctx: &mut CommandContext<'_>) -> Result<()> {
        let registry = ctx.engine().registry();
        let lines: Vec<String> = registry
            .names()
            .into_iter()
            .filter_map(|name| registry.get(name).map(|c| format!("{name:<10} {}", c.usage())))
            .collect();
        for line in lines {
            ctx.println(&line);
        }
        Ok(())
    }
}
