//! Process-wide configuration handle.
//!
//! Most applications build one [`Config`] at startup and read it from
//! anywhere. The handle is swapped atomically, so installing a rebuilt
//! configuration never tears reads in other threads.

use crate::config::Config;
use arc_swap::ArcSwapOption;
use std::sync::Arc;
use tracing::info;

static CURRENT: ArcSwapOption<Config> = ArcSwapOption::const_empty();

/// Install a configuration as the process-wide instance, replacing any
/// previous one, and return the shared handle.
pub fn install(config: Config) -> Arc<Config> {
    let config = Arc::new(config);
    CURRENT.store(Some(Arc::clone(&config)));
    info!("global configuration installed");
    config
}

/// The currently installed configuration, if any.
pub fn current() -> Option<Arc<Config>> {
    CURRENT.load_full()
}

/// Drop the process-wide instance. Handles already obtained stay valid.
pub fn teardown() {
    CURRENT.store(None);
}
