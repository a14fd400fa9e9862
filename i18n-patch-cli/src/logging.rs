//! Logger setup for the command-line tool.

use log::LevelFilter;

/// Initializes env_logger for the library and the tool.
///
/// Warnings are shown by default and `verbose` raises the level to info. `RUST_LOG` is applied
/// last, so it overrides both.
pub fn init_log(verbose: bool) -> Result<(), log::SetLoggerError> {
    let level = if verbose {
        LevelFilter::Info
    } else {
        LevelFilter::Warn
    };

    env_logger::builder()
        .format_timestamp(None)
        .format_target(false)
        .filter_level(LevelFilter::Warn)
        .filter_module("i18n_patch", level)
        .filter_module("i18n_patch_cli", level)
        .parse_default_env()
        .try_init()
}
