use owo_colors::{OwoColorize, Stream::Stdout};

/// Setting this variable (to anything) raises the log level to `Trace`
const TRACE_ENV_VAR: &str = "IPAMD_TRACE";

/// Level labels are padded to keep the output looking somewhat sane
fn level_label(level: log::Level) -> String {
    let label = match level {
        log::Level::Error => "ERROR",
        log::Level::Warn => "WARN ",
        log::Level::Info => "INFO ",
        log::Level::Debug => "DEBUG",
        log::Level::Trace => "TRACE",
    };
    label
        .if_supports_color(Stdout, |text| match level {
            log::Level::Error => text.red().to_string(),
            log::Level::Warn => text.yellow().to_string(),
            log::Level::Info => text.green().to_string(),
            log::Level::Debug => text.bright_blue().to_string(),
            log::Level::Trace => text.bright_white().to_string(),
        })
        .if_supports_color(Stdout, |text| text.bold())
        .to_string()
}

/// Pick the log level from the CLI flag and environment
fn level_filter(verbose: bool, trace: bool) -> log::LevelFilter {
    match (trace, verbose) {
        (true, _) => log::LevelFilter::Trace,
        (false, true) => log::LevelFilter::Debug,
        (false, false) => log::LevelFilter::Info,
    }
}

/// Enable the logger
pub fn enable_logger(verbose: bool) -> Result<(), log::SetLoggerError> {
    let trace = std::env::var_os(TRACE_ENV_VAR).is_some();
    fern::Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "{}{}: {}",
                level_label(record.level()),
                // Only show the originating crate if verbose logging is enabled
                match verbose || trace {
                    true => format!(
                        " [{}]",
                        record.target().split("::").next().unwrap_or_default()
                    ),
                    false => String::new(),
                }
                .if_supports_color(Stdout, |text| text.bright_black()),
                message
            ));
        })
        .level(level_filter(verbose, trace))
        // Output to STDOUT
        .chain(std::io::stdout())
        .apply()?;

    log::debug!("Verbose logging enabled");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_filter() {
        assert_eq!(level_filter(false, false), log::LevelFilter::Info);
        assert_eq!(level_filter(true, false), log::LevelFilter::Debug);
        assert_eq!(level_filter(false, true), log::LevelFilter::Trace);
        assert_eq!(level_filter(true, true), log::LevelFilter::Trace);
    }

    #[test]
    fn test_labels_are_padded() {
        for level in [log::Level::Warn, log::Level::Info, log::Level::Debug] {
            assert!(level_label(level).contains(&format!("{:<5}", level.as_str())));
        }
    }
}
