//! PitLink Node
//!
//! Settings loading and the two component sets a node can run; [`launch`]
//! picks one from the resolved role.

mod launch;
mod settings;

pub use launch::{launch, run_car, run_ground, shutdown_signal, ComponentSet};
pub use settings::{CarSettings, GroundSettings, LogSettings, Settings};
