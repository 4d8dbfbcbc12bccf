//! Thin wrappers over the process-group, signal-mask and terminal syscalls.

use std::io;
use std::mem::MaybeUninit;
use std::ptr;

use crossterm::tty::IsTty;

pub(crate) fn set_process_group(pid: libc::pid_t, pgid: libc::pid_t) -> io::Result<()> {
    loop {
        let rc = unsafe { libc::setpgid(pid, pgid) };
        if rc == 0 {
            return Ok(());
        }

        let err = io::Error::last_os_error();
        match err.raw_os_error() {
            Some(code) if code == libc::EINTR => continue,
            // Already exec'd or gone; the child's own setpgid covered it.
            Some(code) if code == libc::EACCES || code == libc::ESRCH => return Ok(()),
            _ => return Err(err),
        }
    }
}

/// Deliver `signal` to every process in `pgid`.
pub(crate) fn signal_group(pgid: libc::pid_t, signal: libc::c_int) -> io::Result<()> {
    if pgid <= 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "invalid process group id",
        ));
    }

    loop {
        let rc = unsafe { libc::kill(-pgid, signal) };
        if rc == 0 {
            return Ok(());
        }

        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::EINTR) {
            continue;
        }
        return Err(err);
    }
}

// ── Signal sets and masks ──

#[derive(Clone, Copy)]
pub(crate) struct SignalSet(libc::sigset_t);

impl SignalSet {
    pub(crate) fn empty() -> Self {
        let mut set = MaybeUninit::<libc::sigset_t>::uninit();
        unsafe {
            libc::sigemptyset(set.as_mut_ptr());
            Self(set.assume_init())
        }
    }

    pub(crate) fn of(signals: &[libc::c_int]) -> Self {
        let mut set = Self::empty();
        for &signal in signals {
            set.add(signal);
        }
        set
    }

    pub(crate) fn add(&mut self, signal: libc::c_int) {
        unsafe {
            libc::sigaddset(&mut self.0, signal);
        }
    }

    pub(crate) fn remove(&mut self, signal: libc::c_int) {
        unsafe {
            libc::sigdelset(&mut self.0, signal);
        }
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, signal: libc::c_int) -> bool {
        unsafe { libc::sigismember(&self.0, signal) == 1 }
    }
}

fn change_mask(how: libc::c_int, set: &SignalSet) -> io::Result<SignalSet> {
    let mut previous = SignalSet::empty();
    let rc = unsafe { libc::sigprocmask(how, &set.0, &mut previous.0) };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(previous)
}

/// RAII guard: blocks a set of signals and restores the previous mask on drop.
pub(crate) struct SignalMaskGuard {
    previous: SignalSet,
}

impl SignalMaskGuard {
    pub(crate) fn block(set: &SignalSet) -> io::Result<Self> {
        let previous = change_mask(libc::SIG_BLOCK, set)?;
        Ok(Self { previous })
    }

    /// The mask in force before this guard was taken.
    pub(crate) fn previous(&self) -> &SignalSet {
        &self.previous
    }
}

impl Drop for SignalMaskGuard {
    fn drop(&mut self) {
        let _ = change_mask(libc::SIG_SETMASK, &self.previous);
    }
}

/// Atomically install `mask` and sleep until a signal handler has run.
pub(crate) fn suspend(mask: &SignalSet) {
    // sigsuspend always returns -1/EINTR once a handler ran.
    unsafe {
        libc::sigsuspend(&mask.0);
    }
}

pub(crate) fn install_handler(
    signal: libc::c_int,
    handler: extern "C" fn(libc::c_int),
    blocked_while_running: &SignalSet,
) -> io::Result<()> {
    let mut action: libc::sigaction = unsafe { std::mem::zeroed() };
    action.sa_sigaction = handler as libc::sighandler_t;
    action.sa_mask = blocked_while_running.0;
    action.sa_flags = libc::SA_RESTART;

    if unsafe { libc::sigaction(signal, &action, ptr::null_mut()) } < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

// ── errno preservation for handlers ──

/// Saves `errno` on creation and puts it back on drop so a handler never
/// disturbs the code it interrupted.
pub(crate) struct ErrnoGuard(libc::c_int);

impl ErrnoGuard {
    pub(crate) fn save() -> Self {
        Self(unsafe { *errno_location() })
    }
}

impl Drop for ErrnoGuard {
    fn drop(&mut self) {
        unsafe {
            *errno_location() = self.0;
        }
    }
}

#[cfg(any(target_os = "linux", target_os = "android"))]
unsafe fn errno_location() -> *mut libc::c_int {
    unsafe { libc::__errno_location() }
}

#[cfg(any(target_os = "macos", target_os = "ios", target_os = "freebsd"))]
unsafe fn errno_location() -> *mut libc::c_int {
    unsafe { libc::__error() }
}

#[cfg(any(target_os = "netbsd", target_os = "openbsd"))]
unsafe fn errno_location() -> *mut libc::c_int {
    unsafe { libc::__errno() }
}

// ── Terminal handoff ──

/// Hands the controlling terminal to a job's process group and gives it
/// back to the shell on drop. A no-op when stdin is not a terminal.
pub(crate) struct ForegroundTerminalGuard {
    tty_fd: Option<libc::c_int>,
    shell_pgid: libc::pid_t,
}

impl ForegroundTerminalGuard {
    pub(crate) fn new(target_pgid: libc::pid_t) -> io::Result<Self> {
        let tty_fd = io::stdin().is_tty().then_some(libc::STDIN_FILENO);

        let shell_pgid = unsafe { libc::getpgrp() };
        let guard = Self { tty_fd, shell_pgid };

        if let Some(fd) = guard.tty_fd {
            set_terminal_foreground(fd, target_pgid)?;
        }

        Ok(guard)
    }
}

impl Drop for ForegroundTerminalGuard {
    fn drop(&mut self) {
        if let Some(fd) = self.tty_fd {
            let _ = set_terminal_foreground(fd, self.shell_pgid);
        }
    }
}

struct SignalIgnoreGuard {
    signal: libc::c_int,
    previous: libc::sighandler_t,
}

impl SignalIgnoreGuard {
    fn ignore(signal: libc::c_int) -> io::Result<Self> {
        let previous = unsafe { libc::signal(signal, libc::SIG_IGN) };
        if previous == libc::SIG_ERR {
            return Err(io::Error::last_os_error());
        }
        Ok(Self { signal, previous })
    }
}

impl Drop for SignalIgnoreGuard {
    fn drop(&mut self) {
        unsafe {
            libc::signal(self.signal, self.previous);
        }
    }
}

fn set_terminal_foreground(fd: libc::c_int, pgid: libc::pid_t) -> io::Result<()> {
    if pgid <= 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "invalid process group id",
        ));
    }

    // A background shell reclaiming the terminal would otherwise get SIGTTOU.
    let _sigttou = SignalIgnoreGuard::ignore(libc::SIGTTOU)?;
    loop {
        let rc = unsafe { libc::tcsetpgrp(fd, pgid) };
        if rc == 0 {
            return Ok(());
        }

        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::EINTR) {
            continue;
        }
        return Err(err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_set_membership() {
        let mut set = SignalSet::of(&[libc::SIGCHLD, libc::SIGINT]);
        assert!(set.contains(libc::SIGCHLD));
        assert!(set.contains(libc::SIGINT));
        assert!(!set.contains(libc::SIGTSTP));
        set.remove(libc::SIGINT);
        assert!(!set.contains(libc::SIGINT));
    }

    #[test]
    fn mask_guard_restores_previous_mask() {
        // SIGURG is not touched by anything else in the test binary.
        let set = SignalSet::of(&[libc::SIGURG]);
        let before = change_mask(libc::SIG_BLOCK, &SignalSet::empty()).unwrap();
        {
            let guard = SignalMaskGuard::block(&set).unwrap();
            assert_eq!(guard.previous().contains(libc::SIGURG), before.contains(libc::SIGURG));
            let during = change_mask(libc::SIG_BLOCK, &SignalSet::empty()).unwrap();
            assert!(during.contains(libc::SIGURG));
        }
        let after = change_mask(libc::SIG_BLOCK, &SignalSet::empty()).unwrap();
        assert_eq!(after.contains(libc::SIGURG), before.contains(libc::SIGURG));
    }

    #[test]
    fn errno_guard_restores_value() {
        unsafe { *errno_location() = libc::EAGAIN };
        {
            let _guard = ErrnoGuard::save();
            unsafe { *errno_location() = libc::ECHILD };
        }
        assert_eq!(unsafe { *errno_location() }, libc::EAGAIN);
    }

    #[test]
    fn signal_group_rejects_invalid_group() {
        let err = signal_group(0, libc::SIGCONT).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }
}
