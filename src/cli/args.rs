//! Command-line argument parsing for the convo-stream CLI.
//!
//! This module handles parsing command-line arguments and determining
//! which CLI command to execute.

/// Options of a single turn sent from the command line.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SendArgs {
    /// Backend base URL override (`--url`)
    pub url: Option<String>,
    /// `false` when `--no-fallback` was given
    pub fallback: bool,
    /// Print only the final text (`--collect`)
    pub collect: bool,
    /// Message text (remaining arguments joined by spaces)
    pub message: String,
}

/// Parsed CLI command to execute.
#[derive(Debug, Clone, PartialEq)]
pub enum CliCommand {
    /// Show version information
    Version,
    /// Show usage
    Help,
    /// Send one message and stream the reply
    Send(SendArgs),
    /// Arguments could not be parsed
    Invalid(String),
}

/// Usage text printed by `--help` and on argument errors.
pub const USAGE: &str = "\
Usage: convo-stream [OPTIONS] MESSAGE

Options:
  --url URL        Backend base URL (default: $CONVO_STREAM_URL or http://localhost:8000)
  --no-fallback    Never fall back to the JSON endpoint
  --collect        Print the final text only, instead of streaming chunks
  -V, --version    Print version
  -h, --help       Print this help";

/// Parse command-line arguments and return the appropriate command.
///
/// # Arguments
///
/// * `args` - Iterator of command-line arguments (typically `std::env::args()`)
///
/// # Examples
///
/// ```
/// use convo_stream::cli::args::{parse_args, CliCommand};
///
/// let args = vec!["convo-stream".to_string(), "--version".to_string()];
/// assert_eq!(parse_args(args.into_iter()), CliCommand::Version);
/// ```
pub fn parse_args<I>(args: I) -> CliCommand
where
    I: Iterator<Item = String>,
{
    let mut send = SendArgs {
        fallback: true,
        ..SendArgs::default()
    };
    let mut words: Vec<String> = Vec::new();

    // Skip the program name
    let mut args = args.skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--version" | "-V" => return CliCommand::Version,
            "--help" | "-h" => return CliCommand::Help,
            "--no-fallback" => send.fallback = false,
            "--collect" => send.collect = true,
            "--url" => match args.next() {
                Some(url) => send.url = Some(url),
                None => return CliCommand::Invalid("--url needs a value".to_string()),
            },
            "--" => {
                words.extend(args.by_ref());
            }
            flag if flag.starts_with("--") => {
                return CliCommand::Invalid(format!("unknown option '{}'", flag));
            }
            _ => words.push(arg),
        }
    }

    send.message = words.join(" ");
    if send.message.trim().is_empty() {
        return CliCommand::Invalid("missing MESSAGE".to_string());
    }
    CliCommand::Send(send)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliCommand {
        let mut all = vec!["convo-stream".to_string()];
        all.extend(args.iter().map(|a| a.to_string()));
        parse_args(all.into_iter())
    }

    #[test]
    fn test_parse_version_flag() {
        assert_eq!(parse(&["--version"]), CliCommand::Version);
        assert_eq!(parse(&["-V"]), CliCommand::Version);
    }

    #[test]
    fn test_parse_help_flag() {
        assert_eq!(parse(&["-h"]), CliCommand::Help);
    }

    #[test]
    fn test_parse_message_with_options() {
        let command = parse(&["--url", "https://api.example.com", "--no-fallback", "Olá", "mundo"]);
        assert_eq!(
            command,
            CliCommand::Send(SendArgs {
                url: Some("https://api.example.com".to_string()),
                fallback: false,
                collect: false,
                message: "Olá mundo".to_string(),
            })
        );
    }

    #[test]
    fn test_parse_defaults() {
        match parse(&["--collect", "oi"]) {
            CliCommand::Send(args) => {
                assert!(args.fallback);
                assert!(args.collect);
                assert_eq!(args.url, None);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_double_dash_keeps_flags_as_text() {
        match parse(&["--", "--collect"]) {
            CliCommand::Send(args) => assert_eq!(args.message, "--collect"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(parse(&[]), CliCommand::Invalid(_)));
        assert!(matches!(parse(&["--url"]), CliCommand::Invalid(_)));
        assert!(matches!(parse(&["--unknown", "oi"]), CliCommand::Invalid(_)));
    }
}
