//! Signal relay: the asynchronous half of the shell.
//!
//! `SIGCHLD` reaps every child that changed state and updates the job table;
//! `SIGINT`/`SIGTSTP` are forwarded to the foreground process group. The
//! handlers only decode wait statuses, call `waitpid`/`kill`, and mutate the
//! fixed-size state below. They never allocate, lock or print; anything the
//! user should see goes through the notice ring and is printed by the main
//! flow.

use std::cell::UnsafeCell;
use std::fmt;
use std::io;

use libc::{c_int, pid_t};

use crate::error::unix_error;
use crate::job_control::{self, ErrnoGuard, SignalMaskGuard, SignalSet};
use crate::jobs::{JobState, JobTable};
use crate::status::ChildEvent;

pub const NOTICE_CAPACITY: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Stopped(c_int),
    Terminated(c_int),
    /// A background job finished; carries the last member's exit code.
    Done(i32),
}

/// Something the user should hear about on the next chance to print.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Notice {
    pub seq: usize,
    pub pid: pid_t,
    pub kind: NoticeKind,
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            NoticeKind::Stopped(signal) => write!(
                f,
                "Job [{}] ({}) stopped by signal {signal}",
                self.seq, self.pid
            ),
            NoticeKind::Terminated(signal) => write!(
                f,
                "Job [{}] ({}) terminated by signal {signal}",
                self.seq, self.pid
            ),
            NoticeKind::Done(0) => write!(f, "[{}] ({}) Done", self.seq, self.pid),
            NoticeKind::Done(code) => write!(f, "[{}] ({}) Exit {code}", self.seq, self.pid),
        }
    }
}

/// Fixed-capacity ring of pending notices. When full the oldest is dropped.
pub struct NoticeQueue {
    buf: [Option<Notice>; NOTICE_CAPACITY],
    head: usize,
    len: usize,
}

impl NoticeQueue {
    pub const fn new() -> Self {
        Self {
            buf: [None; NOTICE_CAPACITY],
            head: 0,
            len: 0,
        }
    }

    pub fn push(&mut self, notice: Notice) {
        let tail = (self.head + self.len) % NOTICE_CAPACITY;
        self.buf[tail] = Some(notice);
        if self.len == NOTICE_CAPACITY {
            self.head = (self.head + 1) % NOTICE_CAPACITY;
        } else {
            self.len += 1;
        }
    }

    /// Remove and return everything queued, oldest first.
    pub fn drain(&mut self) -> Vec<Notice> {
        let mut out = Vec::with_capacity(self.len);
        for i in 0..self.len {
            if let Some(notice) = self.buf[(self.head + i) % NOTICE_CAPACITY].take() {
                out.push(notice);
            }
        }
        self.head = 0;
        self.len = 0;
        out
    }
}

/// Everything shared between the main flow and the handlers.
pub struct ShellState {
    pub jobs: JobTable,
    pub notices: NoticeQueue,
}

impl Default for ShellState {
    fn default() -> Self {
        Self::new()
    }
}

impl ShellState {
    pub const fn new() -> Self {
        Self {
            jobs: JobTable::new(),
            notices: NoticeQueue::new(),
        }
    }

    /// Apply one `waitpid` report to the job table.
    ///
    /// Running → Stopped on a stop, Stopped → Running (background) on a
    /// continue, and removal of the process on exit or fatal signal.
    pub fn apply_child_event(&mut self, pid: pid_t, event: ChildEvent) {
        match event {
            ChildEvent::Stopped(signal) => {
                let (Some(pgid), Some(seq)) =
                    (self.jobs.group_of(pid), self.jobs.sequence_of(pid))
                else {
                    return;
                };
                if self.jobs.state_of(pgid) != Some(JobState::Stopped)
                    && self.jobs.set_state(pgid, JobState::Stopped).is_ok()
                {
                    self.notices.push(Notice {
                        seq,
                        pid,
                        kind: NoticeKind::Stopped(signal),
                    });
                }
            }
            ChildEvent::Continued => {
                if let Some(pgid) = self.jobs.group_of(pid) {
                    if self.jobs.state_of(pgid) == Some(JobState::Stopped) {
                        let _ = self.jobs.set_state(pgid, JobState::Background);
                    }
                }
            }
            ChildEvent::Exited(_) | ChildEvent::Signaled(_) => {
                let Some(removal) = self.jobs.remove_member(pid) else {
                    return;
                };
                match event {
                    ChildEvent::Signaled(signal) if signal != libc::SIGPIPE => {
                        self.notices.push(Notice {
                            seq: removal.seq,
                            pid,
                            kind: NoticeKind::Terminated(signal),
                        });
                    }
                    ChildEvent::Exited(code)
                        if removal.job_finished && removal.state == JobState::Background =>
                    {
                        self.notices.push(Notice {
                            seq: removal.seq,
                            pid: removal.pgid,
                            kind: NoticeKind::Done(code),
                        });
                    }
                    _ => {}
                }
            }
        }
    }
}

struct SharedState(UnsafeCell<ShellState>);

// SAFETY: the shell runs one thread. The main flow reaches the state only
// through `with_state`, which blocks every relayed signal first, and each
// handler is installed with all relayed signals in its `sa_mask`. So at most
// one reference to the state is live at any moment.
unsafe impl Sync for SharedState {}

static SHELL: SharedState = SharedState(UnsafeCell::new(ShellState::new()));

/// Signals whose handlers touch [`ShellState`].
fn relay_signals() -> SignalSet {
    SignalSet::of(&[libc::SIGCHLD, libc::SIGINT, libc::SIGTSTP])
}

/// Block the relayed signals until the guard drops.
pub fn block_relay() -> SignalMaskGuard {
    match SignalMaskGuard::block(&relay_signals()) {
        Ok(guard) => guard,
        Err(err) => unix_error("sigprocmask error", err),
    }
}

/// Run `f` with exclusive access to the shared state.
///
/// `f` must not call `with_state` again.
pub fn with_state<R>(f: impl FnOnce(&mut ShellState) -> R) -> R {
    let _guard = block_relay();
    // SAFETY: relayed signals are blocked, so no handler can observe the
    // state while this reference is live (see `SharedState`).
    let state = unsafe { &mut *SHELL.0.get() };
    f(state)
}

/// Take every notice queued by the handlers.
pub fn take_notices() -> Vec<Notice> {
    with_state(|state| state.notices.drain())
}

/// Install the shell's handlers. Failure here is fatal to the caller.
pub fn install() -> io::Result<()> {
    let relay = relay_signals();
    job_control::install_handler(libc::SIGCHLD, on_child_status, &relay)?;
    job_control::install_handler(libc::SIGINT, on_keyboard_signal, &relay)?;
    job_control::install_handler(libc::SIGTSTP, on_keyboard_signal, &relay)?;
    job_control::install_handler(libc::SIGQUIT, on_quit, &SignalSet::empty())?;
    Ok(())
}

/// Reap every child with a pending status change. Signals do not queue, so
/// one delivery may stand for several children.
extern "C" fn on_child_status(_signal: c_int) {
    let _errno = ErrnoGuard::save();
    // SAFETY: the handler runs with every relayed signal blocked, and the
    // main flow never holds the state with them unblocked.
    let state = unsafe { &mut *SHELL.0.get() };

    loop {
        let mut raw_status: c_int = 0;
        let pid = unsafe {
            libc::waitpid(
                -1,
                &mut raw_status,
                libc::WNOHANG | libc::WUNTRACED | libc::WCONTINUED,
            )
        };
        if pid <= 0 {
            break;
        }
        if let Some(event) = ChildEvent::from_wait_status(raw_status) {
            state.apply_child_event(pid, event);
        }
    }
}

/// Forward ctrl-c / ctrl-z to the foreground job; the shell itself is unaffected.
extern "C" fn on_keyboard_signal(signal: c_int) {
    let _errno = ErrnoGuard::save();
    // SAFETY: see `on_child_status`.
    let state = unsafe { &*SHELL.0.get() };

    if let Some(pgid) = state.jobs.foreground_group() {
        let _ = job_control::signal_group(pgid, signal);
    }
}

extern "C" fn on_quit(_signal: c_int) {
    const MESSAGE: &[u8] = b"Terminating after receipt of SIGQUIT signal\n";
    // SAFETY: write(2) and _exit(2) are async-signal-safe.
    unsafe {
        libc::write(libc::STDOUT_FILENO, MESSAGE.as_ptr().cast(), MESSAGE.len());
        libc::_exit(1);
    }
}
