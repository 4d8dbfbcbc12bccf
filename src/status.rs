/// A status change reported by `waitpid` for one child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildEvent {
    /// Normal termination with an exit code.
    Exited(i32),
    /// Terminated by a signal.
    Signaled(i32),
    /// Stopped by a signal (`WUNTRACED`).
    Stopped(i32),
    /// Resumed by `SIGCONT` (`WCONTINUED`).
    Continued,
}

impl ChildEvent {
    /// Decode a raw wait status. Only the libc status macros are used, so
    /// this is safe to call from a signal handler.
    pub fn from_wait_status(raw_status: libc::c_int) -> Option<Self> {
        if libc::WIFEXITED(raw_status) {
            return Some(ChildEvent::Exited(libc::WEXITSTATUS(raw_status)));
        }
        if libc::WIFSIGNALED(raw_status) {
            return Some(ChildEvent::Signaled(libc::WTERMSIG(raw_status)));
        }
        if libc::WIFSTOPPED(raw_status) {
            return Some(ChildEvent::Stopped(libc::WSTOPSIG(raw_status)));
        }
        if libc::WIFCONTINUED(raw_status) {
            return Some(ChildEvent::Continued);
        }
        None
    }
}

#[cfg(all(test, target_os = "linux"))]
mod tests {
    use super::*;

    #[test]
    fn decodes_exit() {
        assert_eq!(ChildEvent::from_wait_status(7 << 8), Some(ChildEvent::Exited(7)));
    }

    #[test]
    fn decodes_signal_termination() {
        let event = ChildEvent::from_wait_status(libc::SIGINT).unwrap();
        assert_eq!(event, ChildEvent::Signaled(libc::SIGINT));
    }

    #[test]
    fn decodes_stop_and_continue() {
        let stopped = ChildEvent::from_wait_status((libc::SIGTSTP << 8) | 0x7f).unwrap();
        assert_eq!(stopped, ChildEvent::Stopped(libc::SIGTSTP));
        assert_eq!(ChildEvent::from_wait_status(0xffff), Some(ChildEvent::Continued));
    }
}
