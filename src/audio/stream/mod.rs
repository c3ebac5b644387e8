// Stream endpoints
//
// Client-facing playback and capture streams. Each stream owns its
// lifecycle (standby/active), talks to the routing core when it activates
// or retargets, and enforces the write/read error contracts.

pub mod input;
pub mod output;

pub use input::InputStream;
pub use output::{OutputStream, StreamLifecycle};
