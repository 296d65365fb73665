//! Connectivity observation seam.
//!
//! When the probe reports offline, every cache policy downgrades to
//! `CacheDontLoad` before evaluation. The probe is a consumed contract;
//! the platform layer wires in its reachability monitor.

/// Reports whether a remote fetch has any chance of succeeding right now.
pub trait ConnectivityProbe: Send + Sync {
    /// Best-effort connectivity check. May be stale by design; the worst
    /// case of a wrong `true` is a failed fetch, of a wrong `false` a
    /// cache-only answer.
    fn is_online(&self) -> bool;
}

/// Probe that always reports connectivity, for servers and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysOnline;

impl ConnectivityProbe for AlwaysOnline {
    fn is_online(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_always_online() {
        assert!(AlwaysOnline.is_online());
    }
}
