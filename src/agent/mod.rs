//! Agents that perform work on the controller side on behalf of program code

pub mod correlator;
pub mod io;
pub mod simulator;

pub use correlator::{CommandCorrelator, Correlated};
pub use io::IoAgent;
pub use simulator::SimulatorAgent;
