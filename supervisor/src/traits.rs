//! Trait definitions with mockall annotations for testing

/// Probe of the OS process table
///
/// Used by the liveness poll to notice a worker that vanished without the
/// exit event being observed.
#[mockall::automock]
pub trait ProcessProbe: Send + Sync {
    /// Whether a process with this pid currently exists
    fn is_alive(&self, pid: u32) -> bool;
}
