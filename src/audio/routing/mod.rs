// Routing module - Usecase arbitration over shared codec paths
//
// Layered bottom-up:
// - registry: active usecases and per-path reference counts
// - selection: device mask to routing path tables
// - conflict: backend sharing relation and displaced-path derivation
// - arbiter: RoutingCore, the device-wide decision engine

pub mod arbiter;
pub mod conflict;
pub mod registry;
pub mod selection;

// Re-export the arbitration surface
pub use arbiter::{ActiveUsecase, RoutingCore};
pub use conflict::{derive_displaced_path, BackendConflictMap};
pub use registry::{PathRefCounts, UsecaseRegistry};
pub use selection::{select_input_path, select_output_path, SelectionContext};
