mod blackstart;
mod bus_types;
mod command;
mod contingency;
mod dispatch;
mod engine;
mod error;
mod fd;
mod frequency;
mod gauss;
mod grid;
mod jac;
mod lu;
mod network;
mod newton;
mod options;
mod pf;
mod realtime;
mod sbus;
mod state;
mod traits;
mod voltage;
mod ybus;

pub mod cases;
pub mod debug;
pub mod math;
pub mod standards;

pub use blackstart::*;
pub use bus_types::*;
pub use command::*;
pub use contingency::*;
pub use dispatch::*;
pub use engine::*;
pub use error::*;
pub use frequency::*;
pub use grid::*;
pub use jac::*;
pub use lu::*;
pub use network::*;
pub use options::*;
pub use pf::*;
pub use realtime::*;
pub use sbus::*;
pub use state::*;
pub use traits::*;
pub use voltage::*;
pub use ybus::*;

#[cfg(test)]
mod tests;
