//! REPL command parsing

use copilot_analysis::RequestId;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("empty input")]
    Empty,

    #[error("missing ticker for /{0}")]
    MissingTicker(&'static str),

    #[error("'{0}' is not a request id")]
    BadRequestId(String),

    #[error("unknown command: /{0} (try /help)")]
    Unknown(String),
}

/// Parsed command from a REPL line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Submit a ticker; runs in the background
    Analyze { ticker: String },
    /// Show a request, or the most recent one
    Status { request_id: Option<RequestId> },
    /// Cancel a request, or the one loading
    Cancel { request_id: Option<RequestId> },
    /// List the card slots
    Slots,
    Help,
    Exit,
}

impl Command {
    /// Parse one line of input
    ///
    /// A line without a leading `/` is taken as a ticker to analyze. Tickers
    /// are passed through untouched; validation belongs to the orchestrator.
    pub fn parse(input: &str) -> Result<Self, CommandError> {
        let input = input.trim();

        if input.is_empty() {
            return Err(CommandError::Empty);
        }

        let Some(rest) = input.strip_prefix('/') else {
            return Ok(Command::Analyze {
                ticker: input.to_string(),
            });
        };

        let mut parts = rest.split_whitespace();
        let Some(cmd) = parts.next() else {
            return Err(CommandError::Empty);
        };
        let arg = parts.next();

        match cmd.to_lowercase().as_str() {
            "analyze" | "a" => {
                let ticker = arg.ok_or(CommandError::MissingTicker("analyze"))?;
                Ok(Command::Analyze {
                    ticker: ticker.to_string(),
                })
            }
            "status" | "s" => Ok(Command::Status {
                request_id: parse_request_id(arg)?,
            }),
            "cancel" | "c" => Ok(Command::Cancel {
                request_id: parse_request_id(arg)?,
            }),
            "slots" | "cards" => Ok(Command::Slots),
            "help" | "h" | "?" => Ok(Command::Help),
            "exit" | "quit" | "q" => Ok(Command::Exit),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }

    /// Help text for all commands
    pub fn help_text() -> &'static str {
        r"
Commands:
  /analyze <ticker>   Start an analysis (runs in the background)
  /status [id]        Show an analysis, the latest one by default
  /cancel [id]        Cancel an analysis, the running one by default
  /slots              List the seven analysis cards
  /help               Show this help
  /exit               Exit

Aliases:
  /a = /analyze   /s = /status   /c = /cancel   /q = /exit

A line without a leading slash is analyzed as a ticker, e.g. `msft`.
"
    }
}

fn parse_request_id(arg: Option<&str>) -> Result<Option<RequestId>, CommandError> {
    arg.map(|raw| {
        raw.parse()
            .map_err(|_| CommandError::BadRequestId(raw.to_string()))
    })
    .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_analyze() {
        assert_eq!(
            Command::parse("/analyze aapl").unwrap(),
            Command::Analyze {
                ticker: "aapl".to_string()
            }
        );
        assert_eq!(
            Command::parse("/A BRK.B").unwrap(),
            Command::Analyze {
                ticker: "BRK.B".to_string()
            }
        );
        assert_eq!(
            Command::parse("/analyze"),
            Err(CommandError::MissingTicker("analyze"))
        );
    }

    #[test]
    fn test_bare_input_is_a_ticker() {
        assert_eq!(
            Command::parse("  msft ").unwrap(),
            Command::Analyze {
                ticker: "msft".to_string()
            }
        );
    }

    #[test]
    fn test_parse_status_and_cancel() {
        assert_eq!(
            Command::parse("/status").unwrap(),
            Command::Status { request_id: None }
        );

        let id = RequestId::new();
        assert_eq!(
            Command::parse(&format!("/cancel {id}")).unwrap(),
            Command::Cancel {
                request_id: Some(id)
            }
        );
        assert_eq!(
            Command::parse("/s not-an-id"),
            Err(CommandError::BadRequestId("not-an-id".to_string()))
        );
    }

    #[test]
    fn test_parse_misc() {
        assert_eq!(Command::parse("/slots").unwrap(), Command::Slots);
        assert_eq!(Command::parse("/?").unwrap(), Command::Help);
        assert_eq!(Command::parse("/QUIT").unwrap(), Command::Exit);
        assert_eq!(Command::parse(""), Err(CommandError::Empty));
        assert_eq!(Command::parse("/"), Err(CommandError::Empty));
        assert!(matches!(
            Command::parse("/compare AAPL MSFT"),
            Err(CommandError::Unknown(cmd)) if cmd == "compare"
        ));
    }
}
