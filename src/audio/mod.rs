// Audio module - Modularized HAL core for CodecDeck
//
// This module provides the device-side audio system broken down into logical components:
// - types: Core data types, device masks, route paths, usecases
// - platform: Board config, the hardware driver seam, card status monitoring
// - routing: Usecase registry, path selection and the conflict arbiter
// - offload: Compressed playback state machine and its worker
// - stream: Client-facing playback/capture stream endpoints
// - server: High-level orchestration and API

pub mod error;
pub mod offload;
pub mod platform;
pub mod routing;
pub mod server;
pub mod stream;
pub mod types;

// Re-export commonly used types for easier imports
pub use types::{
    AudioUsecase, CallMode, DeviceMask, DrainMode, InputSource, OffloadMetadata, RoutePath,
    RoutingStats, SampleFormat, StreamSettings, TtyMode, UsecaseId, UsecaseKind,
};

pub use error::{HalError, Result};

pub use platform::{
    CardStatusEvent, CardStatusMonitor, NullDriver, PlatformConfig, PlatformDriver,
};

pub use routing::{ActiveUsecase, RoutingCore};

pub use offload::{OffloadEvent, OffloadState};

pub use stream::{InputStream, OutputStream, StreamLifecycle};

// Re-export the high-level server facade
pub use server::{AudioServer, ServerStats};
