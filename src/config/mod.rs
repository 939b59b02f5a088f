//! Configuration for portsweep.
//!
//! Built-in timing profiles plus optional user settings loaded from an
//! XDG-compliant config file.

mod settings;
pub mod timing;

pub use settings::{AppSettings, Paths};
pub use timing::{resolve, TimingProfile, DEFAULT_LEVEL};
