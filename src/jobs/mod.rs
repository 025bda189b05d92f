//! Background job supervision.
//!
//! The registry map is guarded by one `RwLock` for insert/delete; each job
//! carries its own `Mutex` for status, end time and output so that reading
//! one job never contends with another job's watcher.
//!
//! Every job gets a watcher thread that owns the polling of its process
//! and performs the single natural-exit transition (`Running → Completed |
//! Failed`) the moment the process is reaped, while still holding the
//! process lock. `kill` performs `Running → Killed` under the same lock, so
//! a reaped process can never be recorded as killed. Whichever transition
//! happens first wins; terminal states are final.
//!
//! Output is drained by separate reader threads and may outlive the
//! process (a grandchild can keep the pipe open). `output_complete` turns
//! true once every stream hits EOF; [`JobSupervisor::wait`] gives readers
//! at most [`OUTPUT_GRACE`] after exit to catch up.

mod process;

pub use process::{Exit, Process, launch};

use std::collections::BTreeMap;
use std::io::{self, Read};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, RwLock};
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime};

use log::{debug, info, warn};
use serde::{Serialize, Serializer};

use crate::error::JobError;

/// Job identifier. Allocated from 1 upward and never reused.
pub type JobId = u64;

/// Cancellation hook bound to a job at launch. Runs at most once.
pub type CancelFn = Box<dyn FnOnce() + Send>;

/// Default interval between exit checks.
pub const DEFAULT_POLL: Duration = Duration::from_millis(20);

/// How long `wait` lingers after exit for output readers to reach EOF.
pub const OUTPUT_GRACE: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Running,
    Completed,
    Killed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        self != JobStatus::Running
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Killed => "killed",
            JobStatus::Failed => "failed",
        }
    }
}

/// Point-in-time copy of a job.
#[derive(Debug, Clone, Serialize)]
pub struct JobInfo {
    pub id: JobId,
    pub command_line: String,
    pub status: JobStatus,
    pub exit_code: Option<i32>,
    #[serde(serialize_with = "serialize_time")]
    pub start_time: SystemTime,
    #[serde(serialize_with = "serialize_opt_time")]
    pub end_time: Option<SystemTime>,
    pub output: String,
    /// Every output stream reached EOF.
    pub output_complete: bool,
}

fn serialize_time<S: Serializer>(t: &SystemTime, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&crate::logging::timestamp(*t))
}

fn serialize_opt_time<S: Serializer>(t: &Option<SystemTime>, s: S) -> Result<S::Ok, S::Error> {
    match t {
        Some(t) => serialize_time(t, s),
        None => s.serialize_none(),
    }
}

#[derive(Debug)]
struct JobState {
    status: JobStatus,
    exit_code: Option<i32>,
    end_time: Option<SystemTime>,
    output: String,
    output_complete: bool,
}

struct Job {
    id: JobId,
    command_line: String,
    start_time: SystemTime,
    state: Mutex<JobState>,
    finished: Condvar,
    process: Mutex<Box<dyn Process>>,
    cancel: Mutex<Option<CancelFn>>,
}

fn lock<T: ?Sized>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Job {
    fn snapshot(&self) -> JobInfo {
        let state = lock(&self.state);
        JobInfo {
            id: self.id,
            command_line: self.command_line.clone(),
            status: state.status,
            exit_code: state.exit_code,
            start_time: self.start_time,
            end_time: state.end_time,
            output: state.output.clone(),
            output_complete: state.output_complete,
        }
    }

    fn status(&self) -> JobStatus {
        lock(&self.state).status
    }

    /// Move a running job to `status`. Returns false if it was already terminal.
    fn transition(&self, status: JobStatus, exit_code: Option<i32>) -> bool {
        let mut state = lock(&self.state);
        if state.status.is_terminal() {
            return false;
        }
        state.status = status;
        state.exit_code = exit_code;
        state.end_time = Some(SystemTime::now());
        drop(state);
        self.finished.notify_all();
        info!("job {} {} ({})", self.id, status.as_str(), self.command_line);
        true
    }

    fn append_output(&self, chunk: &str) {
        lock(&self.state).output.push_str(chunk);
    }

    fn finish_output(&self) {
        lock(&self.state).output_complete = true;
        self.finished.notify_all();
    }
}

/// Concurrency-safe registry of background jobs.
pub struct JobSupervisor {
    next_id: AtomicU64,
    jobs: RwLock<BTreeMap<JobId, Arc<Job>>>,
    poll: Duration,
}

impl Default for JobSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl JobSupervisor {
    pub fn new() -> Self {
        Self::with_poll_interval(DEFAULT_POLL)
    }

    /// Supervisor whose watchers check for process exit every `poll`.
    pub fn with_poll_interval(poll: Duration) -> Self {
        Self {
            next_id: AtomicU64::new(1),
            jobs: RwLock::new(BTreeMap::new()),
            poll,
        }
    }

    /// Launch `words` as an OS process and supervise it.
    pub fn launch(&self, command_line: impl Into<String>, words: &[String]) -> io::Result<JobId> {
        let child = launch(words)?;
        Ok(self.add(command_line, child, None))
    }

    /// Register a started process and begin watching it. Returns immediately.
    pub fn add(
        &self,
        command_line: impl Into<String>,
        mut process: impl Process,
        cancel: Option<CancelFn>,
    ) -> JobId {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let streams = process.take_output();
        let process: Box<dyn Process> = Box::new(process);
        let job = Arc::new(Job {
            id,
            command_line: command_line.into(),
            start_time: SystemTime::now(),
            state: Mutex::new(JobState {
                status: JobStatus::Running,
                exit_code: None,
                end_time: None,
                output: String::new(),
                output_complete: false,
            }),
            finished: Condvar::new(),
            process: Mutex::new(process),
            cancel: Mutex::new(cancel),
        });

        self.jobs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, Arc::clone(&job));
        info!("job {id} started ({})", job.command_line);

        let watched = Arc::clone(&job);
        let poll = self.poll;
        let spawned = thread::Builder::new()
            .name(format!("job-{id}-watch"))
            .spawn(move || watch(watched, streams, poll));
        if let Err(e) = spawned {
            warn!("job {id}: cannot start watcher: {e}");
            job.append_output(&format!("cannot start watcher: {e}\n"));
            job.transition(JobStatus::Failed, None);
            job.finish_output();
        }

        id
    }

    fn job(&self, id: JobId) -> Result<Arc<Job>, JobError> {
        self.jobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
            .ok_or(JobError::NotFound(id))
    }

    pub fn get(&self, id: JobId) -> Option<JobInfo> {
        self.job(id).ok().map(|job| job.snapshot())
    }

    /// Snapshots of all jobs, ordered by id.
    pub fn list(&self) -> Vec<JobInfo> {
        let jobs: Vec<Arc<Job>> = self
            .jobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        jobs.iter().map(|job| job.snapshot()).collect()
    }

    /// Terminate a job. Killing a job that already finished is a no-op.
    pub fn kill(&self, id: JobId) -> Result<(), JobError> {
        let job = self.job(id)?;
        if job.status().is_terminal() {
            debug!("job {id} already terminal; kill ignored");
            return Ok(());
        }

        if let Some(cancel) = lock(&job.cancel).take() {
            cancel();
        }

        // The watcher reaps and transitions under this lock, so a Running
        // status seen here means the process has not been reaped yet.
        let mut process = lock(&job.process);
        if job.status().is_terminal() {
            debug!("job {id} exited before kill");
            return Ok(());
        }
        if let Err(source) = process.kill() {
            // InvalidInput: the process was already reaped by the watcher
            if source.kind() == io::ErrorKind::InvalidInput || job.status().is_terminal() {
                return Ok(());
            }
            return Err(JobError::Io { id, source });
        }

        job.transition(JobStatus::Killed, None);
        Ok(())
    }

    /// Block until the job is terminal. `Ok` only if it completed successfully.
    ///
    /// After exit, waits up to [`OUTPUT_GRACE`] for the output streams to
    /// close; a pipe held open by a leftover grandchild does not block.
    pub fn wait(&self, id: JobId) -> Result<(), JobError> {
        let job = self.job(id)?;
        let mut state = lock(&job.state);
        while !state.status.is_terminal() {
            state = job
                .finished
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        let (state, _) = job
            .finished
            .wait_timeout_while(state, OUTPUT_GRACE, |s| !s.output_complete)
            .unwrap_or_else(PoisonError::into_inner);
        match state.status {
            JobStatus::Completed => Ok(()),
            JobStatus::Killed => Err(JobError::Killed(id)),
            _ => Err(JobError::Failed {
                id,
                code: state.exit_code,
            }),
        }
    }

    /// Like [`wait`](Self::wait) but gives up after `timeout`, returning the
    /// status observed at that moment.
    pub fn wait_timeout(&self, id: JobId, timeout: Duration) -> Result<JobStatus, JobError> {
        let job = self.job(id)?;
        let state = lock(&job.state);
        let (state, _) = job
            .finished
            .wait_timeout_while(state, timeout, |s| !s.status.is_terminal())
            .unwrap_or_else(PoisonError::into_inner);
        Ok(state.status)
    }

    /// Drop every terminal job from the registry. Running jobs stay.
    pub fn clean(&self) -> usize {
        let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
        let before = jobs.len();
        jobs.retain(|_, job| !job.status().is_terminal());
        let removed = before - jobs.len();
        debug!("cleaned {removed} job(s)");
        removed
    }

    pub fn len(&self) -> usize {
        self.jobs.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn watch(job: Arc<Job>, streams: Vec<Box<dyn Read + Send>>, poll: Duration) {
    let readers: Vec<JoinHandle<()>> = streams
        .into_iter()
        .filter_map(|stream| {
            let job = Arc::clone(&job);
            thread::Builder::new()
                .name(format!("job-{}-output", job.id))
                .spawn(move || drain(&job, stream))
                .ok()
        })
        .collect();

    loop {
        let mut process = lock(&job.process);
        match process.try_wait() {
            Ok(Some(exit)) if exit.success() => {
                job.transition(JobStatus::Completed, exit.code());
                break;
            }
            Ok(Some(exit)) => {
                job.transition(JobStatus::Failed, exit.code());
                break;
            }
            Ok(None) => {
                drop(process);
                thread::sleep(poll);
            }
            Err(e) => {
                warn!("job {}: wait failed: {e}", job.id);
                job.transition(JobStatus::Failed, None);
                break;
            }
        }
    }

    for reader in readers {
        let _ = reader.join();
    }
    job.finish_output();
    debug!("job {}: output closed", job.id);
}

fn drain(job: &Job, mut stream: Box<dyn Read + Send>) {
    let mut buf = [0u8; 4096];
    loop {
        match stream.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => job.append_output(&String::from_utf8_lossy(&buf[..n])),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                debug!("job {}: output read failed: {e}", job.id);
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::mpsc;
    use std::time::Instant;

    /// Scripted process: exits with `exit` once `polls` checks have passed.
    struct FakeProcess {
        polls: usize,
        exit: Exit,
        killed: Arc<AtomicUsize>,
    }

    impl FakeProcess {
        fn new(polls: usize, exit: Exit) -> Self {
            Self {
                polls,
                exit,
                killed: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl Process for FakeProcess {
        fn try_wait(&mut self) -> io::Result<Option<Exit>> {
            if self.killed.load(Ordering::SeqCst) > 0 {
                return Ok(Some(Exit::Signaled));
            }
            if self.polls == 0 {
                return Ok(Some(self.exit));
            }
            self.polls -= 1;
            Ok(None)
        }

        fn kill(&mut self) -> io::Result<()> {
            self.killed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn take_output(&mut self) -> Vec<Box<dyn Read + Send>> {
            vec![Box::new(io::Cursor::new(b"fake output\n".to_vec()))]
        }
    }

    /// Output stream that stays open until its sender is dropped, like a
    /// pipe inherited by a grandchild that outlives the process.
    struct HeldOpen(mpsc::Receiver<()>);

    impl Read for HeldOpen {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            let _ = self.0.recv();
            Ok(0)
        }
    }

    struct LingeringOutput {
        inner: FakeProcess,
        stream: Option<HeldOpen>,
    }

    impl LingeringOutput {
        fn new(exit: Exit) -> (Self, mpsc::Sender<()>) {
            let (tx, rx) = mpsc::channel();
            let process = Self {
                inner: FakeProcess::new(0, exit),
                stream: Some(HeldOpen(rx)),
            };
            (process, tx)
        }
    }

    impl Process for LingeringOutput {
        fn try_wait(&mut self) -> io::Result<Option<Exit>> {
            self.inner.try_wait()
        }

        fn kill(&mut self) -> io::Result<()> {
            self.inner.kill()
        }

        fn take_output(&mut self) -> Vec<Box<dyn Read + Send>> {
            self.stream
                .take()
                .map(|s| vec![Box::new(s) as Box<dyn Read + Send>])
                .unwrap_or_default()
        }
    }

    fn supervisor() -> JobSupervisor {
        JobSupervisor::with_poll_interval(Duration::from_millis(2))
    }

    #[test]
    fn ids_start_at_one_and_increase() {
        let sup = supervisor();
        let a = sup.add("a", FakeProcess::new(0, Exit::Code(0)), None);
        let b = sup.add("b", FakeProcess::new(0, Exit::Code(0)), None);
        let c = sup.add("c", FakeProcess::new(0, Exit::Code(0)), None);
        assert_eq!((a, b, c), (1, 2, 3));
    }

    #[test]
    fn natural_exit_completes() {
        let sup = supervisor();
        let id = sup.add("ok", FakeProcess::new(3, Exit::Code(0)), None);
        sup.wait(id).unwrap();
        let info = sup.get(id).unwrap();
        assert_eq!(info.status, JobStatus::Completed);
        assert_eq!(info.exit_code, Some(0));
        assert!(info.end_time.is_some());
        assert_eq!(info.output, "fake output\n");
        assert!(info.output_complete);
    }

    #[test]
    fn exit_recorded_while_output_still_open() {
        let sup = supervisor();
        let (process, hold) = LingeringOutput::new(Exit::Code(0));
        let id = sup.add("daemonizes", process, None);

        let status = sup.wait_timeout(id, Duration::from_secs(5)).unwrap();
        assert_eq!(status, JobStatus::Completed);

        // the process is gone; kill must not rewrite its outcome
        sup.kill(id).unwrap();
        let info = sup.get(id).unwrap();
        assert_eq!(info.status, JobStatus::Completed);
        assert_eq!(info.exit_code, Some(0));
        assert!(!info.output_complete);
        sup.wait(id).unwrap();
        drop(hold);
    }

    #[test]
    fn wait_not_held_by_open_output() {
        let sup = supervisor();
        let (process, hold) = LingeringOutput::new(Exit::Code(0));
        let id = sup.add("daemonizes", process, None);

        let started = Instant::now();
        sup.wait(id).unwrap();
        assert!(started.elapsed() < OUTPUT_GRACE + Duration::from_secs(2));
        assert!(!sup.get(id).unwrap().output_complete);

        drop(hold);
        for _ in 0..200 {
            if sup.get(id).unwrap().output_complete {
                return;
            }
            thread::sleep(Duration::from_millis(5));
        }
        panic!("output never completed after the stream closed");
    }

    #[test]
    fn nonzero_exit_fails() {
        let sup = supervisor();
        let id = sup.add("bad", FakeProcess::new(1, Exit::Code(3)), None);
        let err = sup.wait(id).unwrap_err();
        assert!(matches!(err, JobError::Failed { code: Some(3), .. }));
        assert_eq!(sup.get(id).unwrap().status, JobStatus::Failed);
    }

    #[test]
    fn kill_is_idempotent_and_runs_cancel_once() {
        let sup = supervisor();
        let cancels = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&cancels);
        let id = sup.add(
            "long",
            FakeProcess::new(usize::MAX, Exit::Code(0)),
            Some(Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })),
        );
        sup.kill(id).unwrap();
        sup.kill(id).unwrap();
        assert_eq!(cancels.load(Ordering::SeqCst), 1);
        assert_eq!(sup.get(id).unwrap().status, JobStatus::Killed);
        assert!(matches!(sup.wait(id), Err(JobError::Killed(_))));
    }

    #[test]
    fn kill_after_natural_exit_keeps_status() {
        let sup = supervisor();
        let id = sup.add("quick", FakeProcess::new(0, Exit::Code(0)), None);
        sup.wait(id).unwrap();
        sup.kill(id).unwrap();
        assert_eq!(sup.get(id).unwrap().status, JobStatus::Completed);
    }

    #[test]
    fn unknown_id() {
        let sup = supervisor();
        assert!(sup.get(42).is_none());
        assert!(matches!(sup.kill(42), Err(JobError::NotFound(42))));
        assert!(matches!(sup.wait(42), Err(JobError::NotFound(42))));
    }

    #[test]
    fn clean_removes_only_terminal() {
        let sup = supervisor();
        let done = sup.add("done", FakeProcess::new(0, Exit::Code(0)), None);
        let failed = sup.add("failed", FakeProcess::new(0, Exit::Code(1)), None);
        let running = sup.add("running", FakeProcess::new(usize::MAX, Exit::Code(0)), None);
        sup.wait(done).unwrap();
        let _ = sup.wait(failed);

        assert_eq!(sup.clean(), 2);
        let ids: Vec<JobId> = sup.list().iter().map(|j| j.id).collect();
        assert_eq!(ids, vec![running]);

        sup.kill(running).unwrap();
        assert_eq!(sup.clean(), 1);
        assert!(sup.is_empty());

        let next = sup.add("after", FakeProcess::new(0, Exit::Code(0)), None);
        assert_eq!(next, 4);
    }

    #[test]
    fn wait_timeout_reports_running() {
        let sup = supervisor();
        let id = sup.add("long", FakeProcess::new(usize::MAX, Exit::Code(0)), None);
        let status = sup.wait_timeout(id, Duration::from_millis(20)).unwrap();
        assert_eq!(status, JobStatus::Running);
        sup.kill(id).unwrap();
    }

    #[test]
    fn list_is_ordered_by_id() {
        let sup = supervisor();
        for i in 0..5 {
            sup.add(format!("job {i}"), FakeProcess::new(0, Exit::Code(0)), None);
        }
        let ids: Vec<JobId> = sup.list().iter().map(|j| j.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn info_serializes_to_json() {
        let sup = supervisor();
        let id = sup.add("ok", FakeProcess::new(0, Exit::Code(0)), None);
        sup.wait(id).unwrap();
        let json = serde_json::to_value(sup.get(id).unwrap()).unwrap();
        assert_eq!(json["id"], 1);
        assert_eq!(json["status"], "completed");
        assert!(json["start_time"].is_string());
    }

    #[cfg(unix)]
    #[test]
    fn real_process_lifecycle() {
        let sup = supervisor();
        let words: Vec<String> = ["sh", "-c", "echo hello"].iter().map(|s| s.to_string()).collect();
        let id = sup.launch("sh -c 'echo hello'", &words).unwrap();
        sup.wait(id).unwrap();
        assert_eq!(sup.get(id).unwrap().output, "hello\n");

        let sleeper = sup
            .launch("sleep 30", &["sleep".to_string(), "30".to_string()])
            .unwrap();
        assert_eq!(sup.get(sleeper).unwrap().status, JobStatus::Running);
        sup.kill(sleeper).unwrap();
        assert_eq!(sup.get(sleeper).unwrap().status, JobStatus::Killed);
        sup.kill(sleeper).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn backgrounded_grandchild_does_not_hold_job() {
        let sup = supervisor();
        let words: Vec<String> = ["sh", "-c", "sleep 3 & exit 0"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let id = sup.launch("sh -c 'sleep 3 & exit 0'", &words).unwrap();

        let started = Instant::now();
        sup.wait(id).unwrap();
        assert!(started.elapsed() < Duration::from_secs(2));

        sup.kill(id).unwrap();
        let info = sup.get(id).unwrap();
        assert_eq!(info.status, JobStatus::Completed);
        assert_eq!(info.exit_code, Some(0));
    }
}
