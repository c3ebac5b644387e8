use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Once;

/// Global flag to control verbose routing debug logging
pub static ROUTE_DEBUG_ENABLED: AtomicBool = AtomicBool::new(false);

/// Set routing debug logging on/off
pub fn set_route_debug(enabled: bool) {
    ROUTE_DEBUG_ENABLED.store(enabled, Ordering::Relaxed);
    println!(
        "🔧 Routing debug logging {}",
        if enabled { "ENABLED" } else { "DISABLED" }
    );
}

/// Check if routing debug logging is enabled
pub fn is_route_debug_enabled() -> bool {
    ROUTE_DEBUG_ENABLED.load(Ordering::Relaxed)
}

/// Routing debug macro - only prints if routing debug is enabled
#[macro_export]
macro_rules! route_debug {
    ($($arg:tt)*) => {
        if $crate::log::ROUTE_DEBUG_ENABLED.load(std::sync::atomic::Ordering::Relaxed) {
            println!($($arg)*);
        }
    };
}

static TRACING_INIT: Once = Once::new();

/// Install the env-filter tracing subscriber. Safe to call more than once;
/// only the first call installs anything (tests share one process).
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .try_init();
    });
}
