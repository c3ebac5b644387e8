pub mod audio;
pub mod log;

// Re-export audio types for testing and external use
pub use audio::{
    AudioServer, CallMode, DeviceMask, DrainMode, HalError, InputSource, NullDriver,
    OffloadEvent, OffloadState, PlatformConfig, PlatformDriver, Result, RoutePath, RoutingCore,
    SampleFormat, ServerStats, StreamLifecycle, StreamSettings, TtyMode, UsecaseId,
};
pub use log::{init_tracing, is_route_debug_enabled, set_route_debug};
