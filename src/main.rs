#[cfg(not(unix))]
compile_error!("cai-shell needs POSIX process groups and signals");

mod aliases;
mod builtins;
mod cli;
mod error;
mod expander;
mod foreground;
mod job_control;
mod jobs;
mod launcher;
mod line_source;
mod logging;
mod parser;
mod pipeline;
mod search_path;
mod shell;
mod signals;
mod status;

use std::io::{self, Write};

use clap::Parser;
use tracing::debug;

use crate::cli::Cli;
use crate::line_source::LineSource;
use crate::search_path::SearchPath;
use crate::shell::{Flow, Shell};

fn main() {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);

    if let Err(err) = signals::install() {
        error::unix_error("Signal error", err);
    }

    let search_path = SearchPath::load(&cli.config);
    debug!(dirs = ?search_path.dirs(), "search path ready");
    let mut shell = Shell::new(search_path, cli.terminal_policy());

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut stderr = io::stderr();
    let mut lines = LineSource::new(
        stdin.lock(),
        line_source::interactive_prompt(!cli.no_prompt),
    );

    let exit_code = loop {
        shell::report_notices(&mut stdout);

        match lines.next_line(&mut stdout) {
            Ok(None) => break 0,
            Ok(Some(line)) => match shell.eval(&line, &mut stdout, &mut stderr) {
                Flow::Continue => {}
                Flow::Exit(code) => break code,
            },
            Err(error) => {
                eprintln!("Error reading input: {error}");
                break 1;
            }
        }
    };

    let _ = stdout.flush();
    std::process::exit(exit_code);
}
