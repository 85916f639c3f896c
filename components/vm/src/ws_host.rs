//! The optional, host-injected WebSocket collaborator behind the `ws-*`
//! opcodes.
//!
//! The transport itself — accepting connections, framing, the event loop —
//! is out of scope for the core; a host wires a concrete implementation of
//! this trait in before executing bytecode that uses it.

use core_types::Value;

/// The WebSocket host interface consulted by `ws-*` opcodes.
///
/// Every method may fail with a host-defined error string, which the VM
/// surfaces as [`core_types::RuntimeError::HostError`].
pub trait WebSocketHost: Send + Sync {
    /// Sends `value` to the current connection.
    fn send(&self, value: &Value) -> Result<(), String>;
    /// Broadcasts `value` to every connection.
    fn broadcast(&self, value: &Value) -> Result<(), String>;
    /// Broadcasts `value` to every connection in `room`.
    fn broadcast_to_room(&self, room: &str, value: &Value) -> Result<(), String>;
    /// Joins the current connection to `room`.
    fn join_room(&self, room: &str) -> Result<(), String>;
    /// Removes the current connection from `room`.
    fn leave_room(&self, room: &str) -> Result<(), String>;
    /// Closes the current connection with `reason`.
    fn close(&self, reason: &str) -> Result<(), String>;
    /// Every room name currently known to the host.
    fn rooms(&self) -> Vec<String>;
    /// The connection ids currently joined to `room`.
    fn room_clients(&self, room: &str) -> Result<Vec<String>, String>;
    /// The id of the current connection. Not surfaced by any opcode today,
    /// but part of the host interface a concrete implementation exposes to
    /// its own transport layer (and to `room_clients`'s returned ids).
    fn connection_id(&self) -> String;
    /// The number of live connections.
    fn connection_count(&self) -> i64;
    /// How long the host has been running, in seconds.
    fn uptime_seconds(&self) -> i64;
}
