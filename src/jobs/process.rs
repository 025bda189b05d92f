//! OS process handles owned by supervised jobs.

use std::io::{self, Read};
use std::process::{Child, Command, Stdio};

/// How a process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    /// Exited on its own with this status code.
    Code(i32),
    /// Terminated by a signal; no status code.
    Signaled,
}

impl Exit {
    pub fn success(self) -> bool {
        self == Exit::Code(0)
    }

    pub fn code(self) -> Option<i32> {
        match self {
            Exit::Code(c) => Some(c),
            Exit::Signaled => None,
        }
    }
}

/// A running process the supervisor can poll, kill and read output from.
pub trait Process: Send + 'static {
    /// Non-blocking exit check.
    fn try_wait(&mut self) -> io::Result<Option<Exit>>;

    /// Request termination.
    fn kill(&mut self) -> io::Result<()>;

    /// Take the captured output streams, leaving none behind.
    fn take_output(&mut self) -> Vec<Box<dyn Read + Send>>;
}

impl Process for Child {
    fn try_wait(&mut self) -> io::Result<Option<Exit>> {
        Ok(Child::try_wait(self)?.map(|status| match status.code() {
            Some(code) => Exit::Code(code),
            None => Exit::Signaled,
        }))
    }

    fn kill(&mut self) -> io::Result<()> {
        Child::kill(self)
    }

    fn take_output(&mut self) -> Vec<Box<dyn Read + Send>> {
        let mut streams: Vec<Box<dyn Read + Send>> = Vec::new();
        if let Some(out) = self.stdout.take() {
            streams.push(Box::new(out));
        }
        if let Some(err) = self.stderr.take() {
            streams.push(Box::new(err));
        }
        streams
    }
}

/// Start `words[0]` with the remaining words as arguments, stdin closed and
/// stdout/stderr piped for capture.
pub fn launch(words: &[String]) -> io::Result<Child> {
    let (program, args) = words
        .split_first()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "empty command"))?;
    Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
}
