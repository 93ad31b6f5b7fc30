use clap::{builder::ValueParser, Arg, Command};

pub const ARG_VERBOSITY: &str = "verbosity";

/// Accept either a level name or its numeric position.
#[must_use]
pub fn validator_log_level() -> ValueParser {
    ValueParser::from(move |level: &str| -> std::result::Result<u8, String> {
        if let Ok(parsed) = level.parse::<u8>() {
            if parsed <= 5 {
                return Ok(parsed);
            }
        }

        match level.to_lowercase().as_str() {
            "error" => Ok(0),
            "warn" => Ok(1),
            "info" => Ok(2),
            "debug" => Ok(3),
            "trace" => Ok(4),
            _ => Err("invalid log level".to_string()),
        }
    })
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command.arg(
        Arg::new(ARG_VERBOSITY)
            .short('v')
            .long("verbose")
            .help("Verbosity level: ERROR, WARN, INFO, DEBUG, TRACE (default: ERROR)")
            .env("AUTHGATE_LOG_LEVEL")
            .global(true)
            .action(clap::ArgAction::Count)
            .value_parser(validator_log_level()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unknown_levels() {
        temp_env::with_vars([("AUTHGATE_LOG_LEVEL", Some("loud"))], || {
            let command = with_args(Command::new("authgate"));
            assert!(command.try_get_matches_from(["authgate"]).is_err());
        });
    }

    #[test]
    fn accepts_numeric_levels() {
        let parser = validator_log_level();
        let command = Command::new("authgate").arg(Arg::new("level").value_parser(parser));
        let matches = command.get_matches_from(["authgate", "3"]);
        assert_eq!(matches.get_one::<u8>("level").copied(), Some(3));
    }
}
