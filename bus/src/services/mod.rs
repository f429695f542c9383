//! Message bus services

pub mod client_registry;
pub mod connection;
pub mod dispatcher;
pub mod heartbeat;
pub mod message_bus;

#[cfg(test)]
mod tests;

pub use client_registry::ClientRegistry;
pub use connection::ClientConnection;
pub use message_bus::MessageBus;
