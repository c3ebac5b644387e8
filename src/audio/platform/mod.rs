// Platform module - Hardware description and driver boundary
//
// Everything the routing core knows about the physical codec lives here:
// - config: path/backend tables, combo table and retry tuning
// - driver: the PlatformDriver trait plus the no-hardware NullDriver
// - mock: scripted FakeDriver used by the test suites
// - monitor: card online/offline tracking

pub mod config;
pub mod driver;
pub mod mock;
pub mod monitor;

// Re-export the types the rest of the crate works with
pub use config::{ComboSpec, PathSpec, PlatformConfig};
pub use driver::{DriverHandle, NullDriver, PlatformDriver};
pub use mock::{DriverEvent, FakeDriver};
pub use monitor::{CardStatusEvent, CardStatusMonitor};
