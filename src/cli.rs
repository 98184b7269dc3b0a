// src/cli.rs

//! Command-line definition.

use clap::Parser;

/// loupe: watch a command's output and system calls side by side.
///
/// The command runs under the configured tracer (strace by default). Its
/// stdout, stderr and trace are shown in separate tabs, along with the
/// files it opened and the addresses it connected to.
///
/// Example: `loupe curl -s https://example.com`
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// The command to trace, followed by its arguments.
    ///
    /// Everything after the first positional argument is passed through to
    /// the command untouched, including arguments that start with `-`.
    #[arg(
        required = true,
        value_name = "COMMAND",
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    pub command: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_and_its_flags_are_kept_verbatim() {
        let cli = Cli::try_parse_from(["loupe", "ls", "-la", "--color=never", "/tmp"]).unwrap();
        assert_eq!(cli.command, vec!["ls", "-la", "--color=never", "/tmp"]);
    }

    #[test]
    fn test_missing_command_is_rejected() {
        assert!(Cli::try_parse_from(["loupe"]).is_err());
    }
}
