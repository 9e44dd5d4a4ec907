pub mod replay;

pub use replay::{parse_raw, read_raw, ReplayBackend, SidecarBackend, SIDECAR_SUFFIX};
