//! Ports, port specifications and scan targets.

mod port;
mod target;

pub use port::{expand, Port, PortError, PortRange, PortSet, PortSpec, COMMON_PORTS};
pub use target::{Target, TargetError};
