use std::io::Write;

use libc::pid_t;
use tracing::{debug, warn};

use crate::error::JobError;
use crate::foreground::ForegroundWait;
use crate::job_control;
use crate::jobs::{JobSnapshot, JobState};
use crate::pipeline::Stage;
use crate::shell::{Flow, Shell};
use crate::signals;

/// Execute a builtin command, writing output to the provided streams.
pub fn execute(
    stage: &Stage,
    shell: &mut Shell,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) -> Flow {
    let args = stage.args();
    match stage.program() {
        "quit" => builtin_quit(args, stderr),
        "jobs" => builtin_jobs(stdout),
        "fg" => builtin_fg(args, shell, stdout, stderr),
        "bg" => builtin_bg(args, stdout, stderr),
        "alias" => builtin_alias(args, shell, stdout, stderr),
        program => {
            let _ = writeln!(stderr, "{program}: unknown builtin");
            Flow::Continue
        }
    }
}

fn builtin_quit(args: &[String], stderr: &mut dyn Write) -> Flow {
    match args.first() {
        None => Flow::Exit(0),
        Some(s) => match s.parse::<i32>() {
            Ok(code) => Flow::Exit(code),
            Err(_) => {
                let _ = writeln!(stderr, "quit: {s}: numeric argument required");
                Flow::Continue
            }
        },
    }
}

// ── Job control builtins ──

/// List all tracked jobs.
fn builtin_jobs(stdout: &mut dyn Write) -> Flow {
    let jobs = signals::with_state(|state| state.jobs.list());
    for job in &jobs {
        let _ = writeln!(stdout, "{}", format_job(job));
    }
    Flow::Continue
}

pub(crate) fn format_job(job: &JobSnapshot) -> String {
    format!(
        "[{}] ({}) {} {}",
        job.seq,
        job.pgid,
        job.state.label(),
        job.command
    )
}

/// Continue a job in the foreground and wait for it.
fn builtin_fg(
    args: &[String],
    shell: &mut Shell,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) -> Flow {
    let Some(job) = lookup_job("fg", args, stderr) else {
        return Flow::Continue;
    };

    // Under terminal handoff the job must own the tty before it resumes.
    let wait = ForegroundWait::claim(job.pgid, shell.policy);
    let resumed = signals::with_state(|state| {
        state.jobs.set_state(job.pgid, JobState::Foreground)?;
        resume_group(job.pgid);
        Ok::<_, JobError>(())
    });
    if let Err(err) = resumed {
        let _ = writeln!(stderr, "fg: {err}");
        return Flow::Continue;
    }

    debug!(seq = job.seq, pgid = job.pgid, members = ?job.members, "resumed in foreground");
    let _ = writeln!(stdout, "{}", job.command);
    let _ = stdout.flush();
    wait.wait();
    Flow::Continue
}

/// Resume a stopped job in the background.
fn builtin_bg(args: &[String], stdout: &mut dyn Write, stderr: &mut dyn Write) -> Flow {
    let Some(job) = lookup_job("bg", args, stderr) else {
        return Flow::Continue;
    };

    let resumed = signals::with_state(|state| match state.jobs.state_of(job.pgid) {
        Some(JobState::Stopped) => {
            let _ = state.jobs.set_state(job.pgid, JobState::Background);
            resume_group(job.pgid);
            Ok(())
        }
        Some(_) => Err(format!("bg: job {} already in background", job.seq)),
        None => Err(format!("%{}: no such job", job.seq)),
    });

    match resumed {
        Ok(()) => {
            let _ = writeln!(stdout, "[{}] ({}) {}", job.seq, job.pgid, job.command);
        }
        Err(message) => {
            let _ = writeln!(stderr, "{message}");
        }
    }
    Flow::Continue
}

fn resume_group(pgid: pid_t) {
    if let Err(err) = job_control::signal_group(pgid, libc::SIGCONT) {
        warn!(pgid, error = %err, "failed to send SIGCONT");
    }
}

// ── Alias builtin ──

fn builtin_alias(
    args: &[String],
    shell: &mut Shell,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) -> Flow {
    if args.is_empty() {
        for (name, value) in shell.aliases.iter() {
            let _ = writeln!(stdout, "alias {name}='{value}'");
        }
        return Flow::Continue;
    }

    for arg in args {
        if arg.contains('=') {
            if let Err(err) = shell.aliases.define(arg) {
                let _ = writeln!(stderr, "{err}");
            }
        } else {
            match shell.aliases.get(arg) {
                Some(value) => {
                    let _ = writeln!(stdout, "alias {arg}='{value}'");
                }
                None => {
                    let _ = writeln!(stderr, "alias: {arg}: not found");
                }
            }
        }
    }
    Flow::Continue
}

// ── Helpers ──

/// How `fg`/`bg` name their target.
#[derive(Debug, PartialEq, Eq)]
enum JobRef {
    Sequence(usize),
    Pid(pid_t),
}

/// Parse `%N` (job number) or `N` (process id).
fn parse_job_ref(command: &str, arg: Option<&String>) -> Result<JobRef, String> {
    let Some(arg) = arg else {
        return Err(format!("{command} command requires PID or %jobid argument"));
    };
    let invalid = || format!("{command}: argument must be a PID or %jobid");

    if let Some(seq) = arg.strip_prefix('%') {
        return seq.parse().map(JobRef::Sequence).map_err(|_| invalid());
    }
    match arg.parse::<pid_t>() {
        Ok(pid) if pid > 0 => Ok(JobRef::Pid(pid)),
        _ => Err(invalid()),
    }
}

fn lookup_job(command: &str, args: &[String], stderr: &mut dyn Write) -> Option<JobSnapshot> {
    let job_ref = match parse_job_ref(command, args.first()) {
        Ok(job_ref) => job_ref,
        Err(message) => {
            let _ = writeln!(stderr, "{message}");
            return None;
        }
    };

    let found = signals::with_state(|state| match job_ref {
        JobRef::Sequence(seq) => state.jobs.find_by_sequence(seq),
        JobRef::Pid(pid) => state.jobs.find_by_pid(pid),
    });
    if found.is_none() {
        let _ = match job_ref {
            JobRef::Sequence(seq) => writeln!(stderr, "%{seq}: no such job"),
            JobRef::Pid(pid) => writeln!(stderr, "({pid}): no such process"),
        };
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aliases::AliasTable;
    use crate::foreground::TerminalPolicy;
    use crate::parser::parse;
    use crate::pipeline::build;
    use crate::search_path::SearchPath;

    fn shell() -> Shell {
        Shell::new(SearchPath::default(), TerminalPolicy::Retain)
    }

    fn run(shell: &mut Shell, line: &str) -> (Flow, String, String) {
        let pipeline = build(parse(line).unwrap(), &AliasTable::new()).unwrap();
        let stage = pipeline.builtin().unwrap();
        let mut out = Vec::new();
        let mut err = Vec::new();
        let flow = execute(stage, shell, &mut out, &mut err);
        (
            flow,
            String::from_utf8(out).unwrap(),
            String::from_utf8(err).unwrap(),
        )
    }

    #[test]
    fn quit_exit_codes() {
        let mut sh = shell();
        assert_eq!(run(&mut sh, "quit").0, Flow::Exit(0));
        assert_eq!(run(&mut sh, "quit 3").0, Flow::Exit(3));
        let (flow, _, err) = run(&mut sh, "quit nope");
        assert_eq!(flow, Flow::Continue);
        assert!(err.contains("numeric argument required"));
    }

    #[test]
    fn alias_define_list_and_show() {
        let mut sh = shell();
        run(&mut sh, "alias ll='ls -l' la='ls -a'");
        let (_, out, _) = run(&mut sh, "alias");
        assert_eq!(out, "alias la='ls -a'\nalias ll='ls -l'\n");

        let (_, out, _) = run(&mut sh, "alias ll");
        assert_eq!(out, "alias ll='ls -l'\n");

        let (_, _, err) = run(&mut sh, "alias missing");
        assert!(err.contains("missing: not found"));
    }

    #[test]
    fn alias_reports_malformed_definition() {
        let mut sh = shell();
        let (_, _, err) = run(&mut sh, "alias =oops");
        assert!(err.contains("expected name='command'"));
    }

    #[test]
    fn job_ref_parsing() {
        assert_eq!(parse_job_ref("fg", Some(&"%2".into())), Ok(JobRef::Sequence(2)));
        assert_eq!(parse_job_ref("bg", Some(&"4321".into())), Ok(JobRef::Pid(4321)));
        assert_eq!(
            parse_job_ref("fg", None),
            Err("fg command requires PID or %jobid argument".into())
        );
        assert_eq!(
            parse_job_ref("bg", Some(&"abc".into())),
            Err("bg: argument must be a PID or %jobid".into())
        );
        assert!(parse_job_ref("bg", Some(&"%x".into())).is_err());
        assert!(parse_job_ref("bg", Some(&"0".into())).is_err());
    }

    #[test]
    fn job_line_format() {
        let job = JobSnapshot {
            seq: 2,
            pgid: 4242,
            members: vec![4242],
            state: JobState::Background,
            command: "sleep 5 &".into(),
        };
        assert_eq!(format_job(&job), "[2] (4242) Running sleep 5 &");
        let stopped = JobSnapshot {
            state: JobState::Stopped,
            ..job
        };
        assert_eq!(format_job(&stopped), "[2] (4242) Stopped sleep 5 &");
    }
}
