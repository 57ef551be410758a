//! Interactive subprocess driving a commit trace.
//!
//! The controller owns the child process. Two reader threads push lines from
//! stdout and stderr into one channel; the controller is the single consumer
//! and runs them through a [`CommitParser`]. Lines from the stream that does
//! not carry the trace are logged and otherwise ignored.

mod reader;

pub use reader::Stream;

use std::io::Write;
use std::path::PathBuf;
use std::process::{Child, ChildStdin, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TryRecvError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use friscv_trace::{CommitParser, State};
use tracing::{debug, trace, warn};

use crate::error::ProcessError;
use crate::source::{CommitSource, EndReason};
use reader::Line;

/// Poll interval while waiting for a child to exit.
const EXIT_POLL: Duration = Duration::from_millis(20);

/// How a controller talks to its process.
#[derive(Debug, Clone)]
pub struct ProcessOptions {
    /// Stream carrying the commit trace.
    pub trace_stream: Stream,
    /// Written to stdin before each fetch; `None` for free-running producers.
    pub step_command: Option<String>,
    /// Written to stdin on stop, before the grace period starts.
    pub quit_command: Option<String>,
    /// Stepped producers only: after a commit header, how long to keep
    /// waiting for more lines of the same instruction. Zero drains only what
    /// is already queued. Free-running producers always close a commit on
    /// the next header, end of output, or the fetch timeout.
    pub drain_settle: Duration,
    /// How long to wait for a voluntary exit on stop before killing.
    pub stop_grace: Duration,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self {
            trace_stream: Stream::Stderr,
            step_command: None,
            quit_command: None,
            drain_settle: Duration::ZERO,
            stop_grace: Duration::from_millis(200),
        }
    }
}

impl ProcessOptions {
    pub const fn with_trace_stream(mut self, stream: Stream) -> Self {
        self.trace_stream = stream;
        self
    }

    pub fn with_step_command(mut self, command: impl Into<String>) -> Self {
        self.step_command = Some(command.into());
        self
    }

    pub fn with_quit_command(mut self, command: impl Into<String>) -> Self {
        self.quit_command = Some(command.into());
        self
    }

    pub const fn with_drain_settle(mut self, settle: Duration) -> Self {
        self.drain_settle = settle;
        self
    }

    pub const fn with_stop_grace(mut self, grace: Duration) -> Self {
        self.stop_grace = grace;
        self
    }
}

struct Running {
    child: Child,
    stdin: Option<ChildStdin>,
    lines: Receiver<Line>,
    readers: Vec<JoinHandle<()>>,
}

/// Outcome of one queue poll.
enum Poll {
    Line(Line),
    Empty,
    Closed,
}

/// Owns a trace-producing subprocess and turns its output into commits.
pub struct ProcessController {
    name: String,
    command: Command,
    options: ProcessOptions,
    running: Option<Running>,
    parser: CommitParser,
    end: Option<EndReason>,
    commits: u64,
}

impl ProcessController {
    /// Prepare a controller. Nothing runs until [`start`](Self::start).
    pub fn new(name: impl Into<String>, command: Command, options: ProcessOptions) -> Self {
        Self {
            name: name.into(),
            command,
            options,
            running: None,
            parser: CommitParser::new(),
            end: None,
            commits: 0,
        }
    }

    /// Launch the process and its reader threads.
    pub fn start(&mut self) -> Result<(), ProcessError> {
        if self.running.is_some() || self.end.is_some() {
            return Err(ProcessError::AlreadyStarted(self.name.clone()));
        }

        let mut child = self
            .command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ProcessError::Launch {
                path: PathBuf::from(self.command.get_program()),
                source,
            })?;

        let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(ProcessError::MissingPipe(self.name.clone(), "output"));
        };

        let (tx, lines) = mpsc::channel();
        let spawned = reader::spawn(&self.name, Stream::Stdout, stdout, tx.clone()).and_then(
            |out| Ok(vec![out, reader::spawn(&self.name, Stream::Stderr, stderr, tx)?]),
        );
        let readers = match spawned {
            Ok(readers) => readers,
            Err(err) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(err.into());
            }
        };

        debug!(name = %self.name, pid = child.id(), "started");
        self.running = Some(Running {
            stdin: child.stdin.take(),
            child,
            lines,
            readers,
        });
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Commits returned so far.
    pub const fn commits(&self) -> u64 {
        self.commits
    }

    /// Malformed trace lines skipped so far.
    pub const fn anomalies(&self) -> usize {
        self.parser.anomalies()
    }

    /// Terminate the process and wait for it. Safe to call repeatedly and on
    /// a controller that never started.
    pub fn stop(&mut self) {
        let Some(mut running) = self.running.take() else {
            return;
        };

        if let Some(mut stdin) = running.stdin.take() {
            if let Some(quit) = &self.options.quit_command {
                let _ = writeln!(stdin, "{quit}").and_then(|()| stdin.flush());
            }
        }

        let status = match wait_with_grace(&mut running.child, self.options.stop_grace) {
            Some(status) => Some(status),
            None => {
                debug!(name = %self.name, "killing");
                let _ = running.child.kill();
                running.child.wait().ok()
            }
        };
        debug!(name = %self.name, ?status, "stopped");

        // Readers of a killed child see end of stream; grandchildren holding
        // the pipes open can keep one alive, so never block on it.
        for handle in running.readers {
            if handle.is_finished() {
                let _ = handle.join();
            }
        }

        self.end.get_or_insert(EndReason::Stopped);
    }

    fn send_step(&mut self) {
        let Some(command) = &self.options.step_command else {
            return;
        };
        let Some(stdin) = self.running.as_mut().and_then(|running| running.stdin.as_mut()) else {
            return;
        };
        if let Err(err) = writeln!(stdin, "{command}").and_then(|()| stdin.flush()) {
            debug!(name = %self.name, "step command not delivered: {err}");
        }
    }

    /// Take the next queued line, waiting up to `wait` but never past
    /// `deadline`. An expired deadline reads as an empty queue.
    fn poll_until(&self, deadline: Instant, wait: Duration) -> Poll {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Poll::Empty;
        }
        self.poll(wait.min(remaining))
    }

    /// Take the next queued line, waiting up to `wait` for one.
    fn poll(&self, wait: Duration) -> Poll {
        let Some(running) = &self.running else {
            return Poll::Closed;
        };
        if wait.is_zero() {
            return match running.lines.try_recv() {
                Ok(line) => Poll::Line(line),
                Err(TryRecvError::Empty) => Poll::Empty,
                Err(TryRecvError::Disconnected) => Poll::Closed,
            };
        }
        match running.lines.recv_timeout(wait) {
            Ok(line) => Poll::Line(line),
            Err(RecvTimeoutError::Timeout) => Poll::Empty,
            Err(RecvTimeoutError::Disconnected) => Poll::Closed,
        }
    }

    /// Route one line. Returns a commit closed by this line.
    fn accept(&mut self, (stream, line): Line) -> Option<State> {
        if stream == self.options.trace_stream {
            self.parser.feed(&line)
        } else {
            trace!(name = %self.name, %stream, "{line}");
            None
        }
    }

    /// Both streams closed: collect the exit status.
    fn reap(&mut self) -> EndReason {
        let status = self.running.as_mut().and_then(|running| {
            wait_with_grace(&mut running.child, self.options.stop_grace)
        });
        match status {
            Some(status) => exit_reason(status),
            None => {
                warn!(name = %self.name, "closed its output but is still running");
                EndReason::OutputClosed
            }
        }
    }

    /// Nothing arrived in time: distinguish an exit from a hang.
    fn silence(&mut self, timeout: Duration) -> EndReason {
        let status = self
            .running
            .as_mut()
            .and_then(|running| running.child.try_wait().ok().flatten());
        status.map_or(EndReason::TimedOut(timeout), exit_reason)
    }

    fn end(&mut self, reason: EndReason) -> Option<State> {
        debug!(name = %self.name, commits = self.commits, %reason, "end of trace");
        self.end = Some(reason);
        None
    }
}

impl CommitSource for ProcessController {
    fn name(&self) -> &str {
        &self.name
    }

    fn next_commit(&mut self, timeout: Duration) -> Option<State> {
        if self.end.is_some() {
            return None;
        }
        if self.running.is_none() {
            warn!(name = %self.name, "fetch from a process that is not running");
            return None;
        }

        let deadline = Instant::now() + timeout;
        let stepped = self.options.step_command.is_some();

        // A header left over from the previous drain already opens this
        // commit; otherwise ask for one and wait for it.
        if !self.parser.is_accumulating() {
            self.send_step();
        }
        while !self.parser.is_accumulating() {
            // After a malformed header a stepped producer only needs to settle
            // before it is asked for the next instruction.
            let wait = if stepped && self.parser.is_discarding() {
                self.options.drain_settle
            } else {
                timeout
            };
            match self.poll_until(deadline, wait) {
                Poll::Line(line) => {
                    // The parser is not accumulating, so no commit can close here.
                    let _ = self.accept(line);
                }
                Poll::Empty
                    if stepped && self.parser.is_discarding() && Instant::now() < deadline =>
                {
                    self.send_step();
                }
                Poll::Empty => {
                    let reason = self.silence(timeout);
                    return self.end(reason);
                }
                Poll::Closed => {
                    let reason = self.reap();
                    return self.end(reason);
                }
            }
        }

        // A stepped producer goes quiet after one instruction, so its commit
        // closes once the queue settles.
        let drain = if stepped {
            self.options.drain_settle
        } else {
            timeout
        };
        loop {
            match self.poll_until(deadline, drain) {
                Poll::Line(line) => {
                    if let Some(state) = self.accept(line) {
                        self.commits += 1;
                        return Some(state);
                    }
                }
                Poll::Empty => break,
                Poll::Closed => {
                    self.end = Some(self.reap());
                    break;
                }
            }
        }

        let state = self.parser.finish();
        if state.is_some() {
            self.commits += 1;
        }
        state
    }

    fn end_reason(&self) -> Option<EndReason> {
        self.end
    }
}

impl Drop for ProcessController {
    fn drop(&mut self) {
        self.stop();
    }
}

fn exit_reason(status: ExitStatus) -> EndReason {
    if status.success() {
        EndReason::Finished
    } else {
        EndReason::Exited {
            code: status.code(),
        }
    }
}

/// Poll `child` until it exits or `grace` elapses.
fn wait_with_grace(child: &mut Child, grace: Duration) -> Option<ExitStatus> {
    let start = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Some(status),
            Ok(None) if start.elapsed() < grace => std::thread::sleep(EXIT_POLL),
            Ok(None) => return None,
            Err(err) => {
                debug!("wait failed: {err}");
                return None;
            }
        }
    }
}
