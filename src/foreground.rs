use libc::pid_t;
use tracing::debug;

use crate::job_control::{self, ForegroundTerminalGuard};
use crate::signals;

/// Who owns the controlling terminal while a foreground job runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TerminalPolicy {
    /// The shell keeps the terminal and forwards keyboard signals.
    #[default]
    Retain,
    /// The job's group becomes the terminal's foreground group until it
    /// leaves the foreground.
    Handoff,
}

/// A foreground job the shell is about to wait on. Under
/// [`TerminalPolicy::Handoff`] the terminal belongs to the job for the
/// lifetime of this value.
pub struct ForegroundWait {
    pgid: pid_t,
    _terminal: Option<ForegroundTerminalGuard>,
}

impl ForegroundWait {
    pub fn claim(pgid: pid_t, policy: TerminalPolicy) -> Self {
        let terminal = match policy {
            TerminalPolicy::Retain => None,
            TerminalPolicy::Handoff => match ForegroundTerminalGuard::new(pgid) {
                Ok(guard) => Some(guard),
                Err(err) => {
                    debug!(pgid, error = %err, "terminal handoff failed; keeping terminal");
                    None
                }
            },
        };
        Self {
            pgid,
            _terminal: terminal,
        }
    }

    /// Block until the job is no longer in the foreground: reaped, stopped,
    /// or demoted.
    ///
    /// The check runs with the relayed signals blocked and `sigsuspend`
    /// unblocks them atomically, so a `SIGCHLD` landing between the check
    /// and the sleep still wakes us.
    pub fn wait(self) {
        let blocked = signals::block_relay();
        let mut wake_mask = *blocked.previous();
        for signal in [libc::SIGCHLD, libc::SIGINT, libc::SIGTSTP] {
            wake_mask.remove(signal);
        }

        while signals::with_state(|state| state.jobs.is_foreground(self.pgid)) {
            job_control::suspend(&wake_mask);
        }
        drop(blocked);
        debug!(pgid = self.pgid, "foreground wait finished");
    }
}

/// Wait for a freshly launched foreground job.
pub fn wait_foreground(pgid: pid_t, policy: TerminalPolicy) {
    ForegroundWait::claim(pgid, policy).wait();
}
