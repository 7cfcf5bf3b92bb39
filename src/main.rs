use std::{env, fs, process::ExitCode};

use chrono::Utc;
use colored::Colorize;
use log::{error, info};
use musicroom_collab::{LogError, SignalLog};
use serde_json::json;
use thiserror::Error;

mod logging;

const USAGE: &str = "Usage: musicroom replay <signal-log> [--user <user-id>]";

#[derive(Debug, Error)]
enum AppError {
    #[error("{0}")]
    Usage(String),
    #[error("Could not read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("Could not replay the signal log: {0}")]
    Log(#[from] LogError),
    #[error("Could not encode the room: {0}")]
    Encode(#[from] serde_json::Error),
}

/// What the app was asked to do
#[derive(Debug, PartialEq, Eq)]
enum Command {
    Replay {
        path: String,
        user_id: Option<String>,
    },
}

impl AppError {
    fn hint(&self) -> String {
        match self {
            AppError::Usage(_) => USAGE.to_string(),
            AppError::Io { .. } => "Make sure the file exists and is readable.".to_string(),
            AppError::Log(_) => {
                "The file must hold one JSON entry per line, starting with the room's creation."
                    .to_string()
            }
            AppError::Encode(_) => "This error should not happen.".to_string(),
        }
    }
}

impl Command {
    fn parse<I>(args: I) -> Result<Self, AppError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut args = args.into_iter();

        match args.next().as_deref() {
            Some("replay") => {}
            Some(other) => return Err(AppError::Usage(format!("Unknown command \"{other}\""))),
            None => return Err(AppError::Usage("No command given".to_string())),
        }

        let path = args
            .next()
            .ok_or_else(|| AppError::Usage("No signal log given".to_string()))?;

        let user_id = match (args.next().as_deref(), args.next()) {
            (Some("--user"), Some(user_id)) => Some(user_id),
            (None, _) => None,
            _ => return Err(AppError::Usage("Expected --user <user-id>".to_string())),
        };

        Ok(Self::Replay { path, user_id })
    }
}

/// Rebuilds a room from its signal log and prints its state and users as JSON.
fn replay(path: &str, user_id: Option<&String>) -> Result<String, AppError> {
    let text = fs::read_to_string(path).map_err(|source| AppError::Io {
        path: path.to_string(),
        source,
    })?;

    let log = SignalLog::from_json_lines(&text)?;
    let room = log.replay()?;

    info!(
        "Replayed {} entries of room {}",
        log.entries().len(),
        room.id()
    );

    let at = log.last_at().unwrap_or_else(Utc::now);
    let output = json!({
        "state": room.export(at, user_id),
        "users": room.users_list(),
    });

    Ok(serde_json::to_string_pretty(&output)?)
}

fn run() -> Result<(), AppError> {
    match Command::parse(env::args().skip(1))? {
        Command::Replay { path, user_id } => {
            let output = replay(&path, user_id.as_ref())?;
            println!("{output}");
        }
    }

    Ok(())
}

fn main() -> ExitCode {
    if let Err(error) = logging::init_logger() {
        eprintln!("Logging could not be initialized: {error}");
    }

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            error!("{}", "Musicroom failed!".bold().red());
            error!("{}", error);
            error!("{}", format!("Hint: {}", error.hint()).dimmed().italic());

            ExitCode::FAILURE
        }
    }
}
