//! Logging init (C8, ambient): a leveled facade over `simplelog`, configured
//! from [`crate::config::Settings`].
//!
//! Ported in spirit from `uploadterrain::logger` in the original
//! implementation: there, a fixed debug-level file logger; here, level and
//! target both come from configuration, and failures to init are reported
//! rather than silently swallowed, since a server process has no page to
//! write a `Debug` log to if it isn't logging yet.

use anyhow::{Context as _, Error};
use log::LevelFilter;

use crate::config::Settings;

fn parse_level(name: &str) -> LevelFilter {
    match name.to_ascii_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "info" => LevelFilter::Info,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        other => {
            // Not yet logging: this has to go to stderr directly.
            eprintln!("unrecognized log_level {:?}, defaulting to info", other);
            LevelFilter::Info
        }
    }
}

/// Initialize the global logger from `settings`. Idempotent: a second call
/// from the same process returns `Ok(())` without re-installing a logger.
pub fn init(settings: &Settings) -> Result<(), Error> {
    let level = parse_level(&settings.log_level);
    let config = simplelog::Config::default();

    let result = match &settings.log_file {
        Some(path) => {
            let file = std::fs::File::create(path).with_context(|| format!("opening log file {:?}", path))?;
            simplelog::WriteLogger::init(level, config, file)
        }
        None => simplelog::TermLogger::init(
            level,
            config,
            simplelog::TerminalMode::Stderr,
            simplelog::ColorChoice::Never,
        ),
    };

    match result {
        Ok(()) => {
            log::info!("logging initialized at {:?}", level);
            Ok(())
        }
        Err(_) => {
            // A logger is already installed (e.g. a second `init` call, or a
            // test harness running in the same process). Not a hard failure.
            Ok(())
        }
    }
}
