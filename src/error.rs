use std::io;

use thiserror::Error;

/// Failure to split a command line into words.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("unmatched single quote")]
    MalformedQuote,
}

/// Failure to turn a word sequence into a runnable pipeline.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("syntax error: empty pipeline stage")]
    EmptyStage,
    #[error("{0}: builtin commands cannot be used in a pipeline")]
    BuiltinInPipeline(String),
    #[error("{0}: alias expansion does not terminate")]
    AliasCycle(String),
    #[error("pipeline has {count} stages (at most {max} supported)")]
    TooManyStages { count: usize, max: usize },
    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Job table rejections. Nothing here allocates, so the signal path can
/// observe these values safely.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum JobError {
    #[error("Tried to create too many jobs")]
    TableFull,
    #[error("a job needs at least one process")]
    NoMembers,
    #[error("job has {count} processes (at most {max} supported)")]
    TooManyMembers { count: usize, max: usize },
    #[error("process {0} already belongs to a job")]
    DuplicatePid(libc::pid_t),
    #[error("process group {existing} is already in the foreground")]
    ForegroundConflict { existing: libc::pid_t },
    #[error("({0}): no such job")]
    NoSuchJob(libc::pid_t),
}

/// Failure to start a pipeline's processes.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("{0}: Command not found")]
    CommandNotFound(String),
    #[error(transparent)]
    Job(#[from] JobError),
    #[error("failed to create pipe: {0}")]
    Pipe(#[source] io::Error),
    #[error("{program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
}

/// Malformed `alias` definition.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AliasError {
    #[error("alias: {0}: expected name='command'")]
    Malformed(String),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Anything the read-evaluate loop reports and then moves past.
#[derive(Debug, Error)]
pub enum ShellError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error(transparent)]
    Launch(#[from] LaunchError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Report an unrecoverable OS failure and terminate the shell.
pub fn unix_error(context: &str, err: io::Error) -> ! {
    tracing::error!(%context, error = %err, "fatal OS error");
    eprintln!("{context}: {err}");
    std::process::exit(1);
}
