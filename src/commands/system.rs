use std::io::Write;
use std::process::{Command as Process, Stdio};
use std::thread;

use log::debug;

use crate::commands::Command;
use crate::error::Result;
use crate::eval::CommandContext;

/// `system PROGRAM [ARGS...]`: run an OS process to completion.
///
/// The stage input is written to the process's stdin; stdout followed by
/// stderr becomes the stage output. A non-zero exit fails the stage.
pub struct System;

impl Command for System {
    fn usage(&self) -> &str {
        "system PROGRAM [ARGS...]"
    }

    fn min_args(&self) -> usize {
        1
    }

    fn run(&self, ctx: &mut CommandContext<'_>) -> Result<()> {
        let (program, args) = ctx.args().split_first().ok_or_else(|| ctx.fail("missing program"))?;
        let mut child = Process::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ctx.fail(format!("{program}: {e}")))?;

        // stdin is fed from its own thread; inline writes deadlock once the
        // child's stdout pipe fills
        let feeder = child.stdin.take().map(|mut stdin| {
            let input = ctx.input().to_string();
            thread::spawn(move || {
                let _ = stdin.write_all(input.as_bytes());
            })
        });

        let output = child.wait_with_output()?;
        if let Some(feeder) = feeder {
            let _ = feeder.join();
        }
        debug!("system {program}: {}", output.status);

        let program = program.clone();
        ctx.print(&String::from_utf8_lossy(&output.stdout));
        ctx.print(&String::from_utf8_lossy(&output.stderr));

        if !output.status.success() {
            let code = output
                .status
                .code()
                .map_or_else(|| "signal".to_string(), |c| c.to_string());
            return Err(ctx.fail(format!("{program} exited with {code}")));
        }
        Ok(())
    }
}
