use std::os::unix::process::CommandExt;
use std::path::PathBuf;
use std::process::Command;

use libc::pid_t;
use os_pipe::{PipeReader, PipeWriter};
use tracing::{debug, warn};

use crate::error::{JobError, LaunchError};
use crate::job_control;
use crate::jobs::JobState;
use crate::pipeline::Pipeline;
use crate::search_path::SearchPath;
use crate::signals;

/// A pipeline whose processes are running and registered.
#[derive(Debug)]
pub struct Launched {
    pub pgid: pid_t,
    pub seq: usize,
    /// Stages after the first that could not be started. Earlier stages
    /// keep running.
    pub problems: Vec<LaunchError>,
}

/// Start every stage of `pipeline` in one new process group and register the
/// group as a job.
///
/// Nothing is spawned when the first stage cannot be resolved or the job
/// table is full. The relayed signals stay blocked from the first spawn until
/// the job is registered, so no member can be reaped before the table knows
/// about it.
pub fn launch(
    pipeline: &Pipeline,
    cmdline: &str,
    search_path: &SearchPath,
) -> Result<Launched, LaunchError> {
    let mut problems = Vec::new();
    let mut resolved: Vec<Option<PathBuf>> = Vec::with_capacity(pipeline.stages.len());
    for (i, stage) in pipeline.stages.iter().enumerate() {
        match search_path.resolve(stage.program()) {
            Some(path) => resolved.push(Some(path)),
            None if i == 0 => {
                return Err(LaunchError::CommandNotFound(stage.program().to_string()));
            }
            None => {
                problems.push(LaunchError::CommandNotFound(stage.program().to_string()));
                resolved.push(None);
            }
        }
    }

    if !signals::with_state(|state| state.jobs.has_capacity()) {
        return Err(JobError::TableFull.into());
    }

    let (mut readers, mut writers) = create_pipes(pipeline.stages.len() - 1)?;

    let critical = signals::block_relay();
    let mut pgid: pid_t = 0;
    let mut members = Vec::with_capacity(pipeline.stages.len());

    for (i, (stage, path)) in pipeline.stages.iter().zip(&resolved).enumerate() {
        // Taking the ends unconditionally means a skipped stage still closes
        // its side of both pipes, so its neighbours see EOF / EPIPE.
        let stdin = if i > 0 { readers[i - 1].take() } else { None };
        let stdout = writers.get_mut(i).and_then(Option::take);

        let Some(path) = path else {
            continue;
        };

        let mut command = Command::new(path);
        command
            .arg0(stage.program())
            .args(stage.args())
            .process_group(pgid);
        if let Some(reader) = stdin {
            command.stdin(reader);
        }
        if let Some(writer) = stdout {
            command.stdout(writer);
        }

        match command.spawn() {
            Ok(child) => {
                let pid = child.id() as pid_t;
                if pgid == 0 {
                    pgid = pid;
                }
                // Mirrors the child's own setpgid so the group exists
                // before the next stage asks to join it.
                if let Err(err) = job_control::set_process_group(pid, pgid) {
                    warn!(pid, pgid, error = %err, "setpgid failed in parent");
                }
                debug!(pid, pgid, program = stage.program(), "spawned stage");
                members.push(pid);
            }
            Err(source) => {
                let err = LaunchError::Spawn {
                    program: stage.program().to_string(),
                    source,
                };
                if members.is_empty() {
                    return Err(err);
                }
                problems.push(err);
                break;
            }
        }
    }
    drop(readers);
    drop(writers);

    let state = if pipeline.background {
        JobState::Background
    } else {
        JobState::Foreground
    };
    let registered = signals::with_state(|shell| {
        let result = shell.jobs.register(pgid, &members, state, cmdline);
        (result, shell.jobs.len())
    });
    let seq = match registered {
        (Ok(seq), live) => {
            debug!(seq, pgid, members = ?members, live, command = cmdline, "added job");
            seq
        }
        (Err(err), _) => {
            // Processes the table cannot track must not outlive the launch.
            let _ = job_control::signal_group(pgid, libc::SIGKILL);
            return Err(err.into());
        }
    };
    drop(critical);

    Ok(Launched {
        pgid,
        seq,
        problems,
    })
}

type PipeEnds = (Vec<Option<PipeReader>>, Vec<Option<PipeWriter>>);

fn create_pipes(count: usize) -> Result<PipeEnds, LaunchError> {
    let mut readers = Vec::with_capacity(count);
    let mut writers = Vec::with_capacity(count);
    for _ in 0..count {
        let (reader, writer) = os_pipe::pipe().map_err(LaunchError::Pipe)?;
        readers.push(Some(reader));
        writers.push(Some(writer));
    }
    Ok((readers, writers))
}
