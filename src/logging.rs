use colored::{ColoredString, Colorize};
use log::{Level, LevelFilter, SetLoggerError};

/// Crates logging at info level. Everything else only gets warnings and errors through.
const LOCAL_CRATES: [&str; 3] = ["musicroom", "musicroom_core", "musicroom_collab"];

/// Logs to stderr, so stdout only carries command output.
pub fn init_logger() -> Result<(), SetLoggerError> {
    let dispatch = LOCAL_CRATES
        .iter()
        .fold(fern::Dispatch::new().level(LevelFilter::Warn), |d, name| {
            d.level_for(*name, LevelFilter::Info)
        });

    dispatch
        .format(|out, message, record| {
            let now = chrono::Local::now();

            out.finish(format_args!(
                "{:^5} {} {:^8} {}",
                badge(record.level()),
                now.format("%H:%M:%S").to_string().bright_black(),
                label(record.target()),
                message
            ))
        })
        .chain(std::io::stderr())
        .apply()
}

/// Names the crate a record comes from
fn label(target: &str) -> ColoredString {
    let name = target.split("::").next().unwrap_or(target);

    match name {
        "musicroom_core" => "CORE".blue(),
        "musicroom_collab" => "COLLAB".bright_purple(),
        "musicroom" => "APP".bright_green(),
        other => other.clear(),
    }
}

fn badge(level: Level) -> String {
    let badge = match level {
        Level::Error => " ERR ".black().on_red(),
        Level::Warn => " WRN ".black().on_yellow(),
        // Nothing below info passes the filter
        _ => " INF ".black().on_blue(),
    };

    badge.bold().to_string()
}
