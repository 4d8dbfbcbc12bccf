use std::path::PathBuf;

use clap::Parser;

use crate::foreground::TerminalPolicy;

/// A tiny shell with job control.
#[derive(Debug, Parser)]
#[command(name = "cai-shell", version)]
pub struct Cli {
    /// Print additional diagnostic information
    #[arg(short, long)]
    pub verbose: bool,

    /// Do not emit a command prompt
    #[arg(short = 'p', long)]
    pub no_prompt: bool,

    /// File with `export PATH=dir:dir` lines used to find programs
    #[arg(short, long, default_value = "myconf")]
    pub config: PathBuf,

    /// Give the terminal to foreground jobs instead of forwarding ctrl-c/ctrl-z
    #[arg(long)]
    pub tty_handoff: bool,
}

impl Cli {
    pub fn terminal_policy(&self) -> TerminalPolicy {
        if self.tty_handoff {
            TerminalPolicy::Handoff
        } else {
            TerminalPolicy::Retain
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cli = Cli::try_parse_from(["cai-shell"]).unwrap();
        assert!(!cli.verbose);
        assert!(!cli.no_prompt);
        assert_eq!(cli.config, PathBuf::from("myconf"));
        assert_eq!(cli.terminal_policy(), TerminalPolicy::Retain);
    }

    #[test]
    fn short_flags_combine() {
        let cli = Cli::try_parse_from(["cai-shell", "-vp", "-c", "/etc/cairc"]).unwrap();
        assert!(cli.verbose);
        assert!(cli.no_prompt);
        assert_eq!(cli.config, PathBuf::from("/etc/cairc"));
    }

    #[test]
    fn tty_handoff_selects_policy() {
        let cli = Cli::try_parse_from(["cai-shell", "--tty-handoff"]).unwrap();
        assert_eq!(cli.terminal_policy(), TerminalPolicy::Handoff);
    }

    #[test]
    fn unknown_flag_is_rejected() {
        assert!(Cli::try_parse_from(["cai-shell", "-x"]).is_err());
    }
}
