use std::fmt::Write as _;

use crate::commands::Command;
use crate::error::Result;
use crate::eval::CommandContext;
use crate::jobs::{JobId, JobInfo};
use crate::logging::timestamp;

/// Parse the job id argument; a leading `%` is accepted.
fn job_id(ctx: &CommandContext<'_>) -> Result<JobId> {
    let raw = ctx.arg(0).unwrap_or_default();
    raw.trim_start_matches('%')
        .parse()
        .map_err(|_| ctx.fail(format!("invalid job id: {raw}")))
}

fn summary(job: &JobInfo) -> String {
    format!(
        "[{}] {:<9} {} {}",
        job.id,
        job.status.as_str(),
        timestamp(job.start_time),
        job.command_line
    )
}

/// `bg PROGRAM [ARGS...]`: launch an OS process in the background.
pub struct Background;

impl Command for Background {
    fn usage(&self) -> &str {
        "bg PROGRAM [ARGS...]"
    }

    fn min_args(&self) -> usize {
        1
    }

    fn run(&self, ctx: &mut CommandContext<'_>) -> Result<()> {
        let id = ctx.engine().spawn_words(ctx.args())?;
        ctx.println(&format!("[{id}]"));
        Ok(())
    }
}

/// `jobs [--json]`: one line per job, or the full snapshots as JSON.
pub struct Jobs;

impl Command for Jobs {
    fn usage(&self) -> &str {
        "jobs [--json]"
    }

    fn run(&self, ctx: &mut CommandContext<'_>) -> Result<()> {
        let jobs = ctx.jobs().list();
        if ctx.has_flag("--json") {
            let json = serde_json::to_string_pretty(&jobs).map_err(|e| ctx.fail(e.to_string()))?;
            ctx.println(&json);
            return Ok(());
        }
        for job in &jobs {
            ctx.println(&summary(job));
        }
        Ok(())
    }
}

/// `job JOB_ID`: status and captured output of one job.
pub struct JobReport;

impl Command for JobReport {
    fn usage(&self) -> &str {
        "job JOB_ID"
    }

    fn min_args(&self) -> usize {
        1
    }

    fn run(&self, ctx: &mut CommandContext<'_>) -> Result<()> {
        let id = job_id(ctx)?;
        let job = ctx
            .jobs()
            .get(id)
            .ok_or(crate::error::JobError::NotFound(id))?;

        let mut report = summary(&job);
        report.push('\n');
        if let Some(end) = job.end_time {
            let _ = writeln!(report, "ended: {}", timestamp(end));
        }
        if let Some(code) = job.exit_code {
            let _ = writeln!(report, "exit code: {code}");
        }
        report.push_str(&job.output);
        ctx.print(&report);
        Ok(())
    }
}

/// `kill JOB_ID`: terminate a running job.
pub struct Kill;

impl Command for Kill {
    fn usage(&self) -> &str {
        "kill JOB_ID"
    }

    fn min_args(&self) -> usize {
        1
    }

    fn run(&self, ctx: &mut CommandContext<'_>) -> Result<()> {
        let id = job_id(ctx)?;
        ctx.jobs().kill(id)?;
        Ok(())
    }
}

/// `wait JOB_ID`: block until the job finishes, then print its output.
pub struct Wait;

impl Command for Wait {
    fn usage(&self) -> &str {
        "wait JOB_ID"
    }

    fn min_args(&self) -> usize {
        1
    }

    fn run(&self, ctx: &mut CommandContext<'_>) -> Result<()> {
        let id = job_id(ctx)?;
        ctx.jobs().wait(id)?;
        let output = ctx.jobs().get(id).map(|job| job.output).unwrap_or_default();
        ctx.print(&output);
        Ok(())
    }
}

/// `clean`: forget every finished job.
pub struct Clean;

impl Command for Clean {
    fn usage(&self) -> &str {
        "clean"
    }

    fn run(&self, ctx: &mut CommandContext<'_>) -> Result<()> {
        let removed = ctx.jobs().clean();
        ctx.println(&format!("removed {removed} job(s)"));
        Ok(())
    }
}
