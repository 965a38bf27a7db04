//! Program runtime: queues, executor, handler and the controller socket
//!
//! The [`ProgramHandler`] owns the queues between program and controller.
//! [`RuntimeServer`] bridges those queues to a controller connected over a
//! local socket.

pub mod client;
pub mod dispatch;
pub mod executor;
pub mod handler;
pub mod queues;
pub mod server;
pub mod transport;

pub use client::ControllerClient;
pub use dispatch::DebugCmdProcessor;
pub use executor::{EventHandler, ProgramExecutor, Worker};
pub use handler::{Outbound, ProgramHandler};
pub use server::RuntimeServer;
pub use transport::Envelope;
