//! Logger setup: `console_log` in the browser, `env_logger` (stderr) on native targets.

use log::LevelFilter;

/// Install the logger. Safe to call more than once; later calls only update the level.
#[cfg(target_arch = "wasm32")]
pub fn init(level: LevelFilter) {
    if let Some(level) = level.to_level() {
        // Errs once a logger is installed.
        let _ = console_log::init_with_level(level);
    }
    log::set_max_level(level);
}

/// Install the logger. Safe to call more than once; later calls only update the level.
#[cfg(not(target_arch = "wasm32"))]
pub fn init(level: LevelFilter) {
    // The global max level does the filtering so re-initialising can change it.
    let _ = env_logger::Builder::new()
        .filter_level(LevelFilter::Trace)
        .is_test(cfg!(test))
        .try_init();
    log::set_max_level(level);
}

/// Parse a level name, falling back to `Info`.
pub fn parse_level(name: &str) -> LevelFilter {
    name.trim().parse().unwrap_or(LevelFilter::Info)
}
