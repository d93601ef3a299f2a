//! Per-process identity used to stamp root spans: a stable runtime-id and
//! the local hostname.

use std::sync::RwLock;

use uuid::Uuid;

static RUNTIME_ID: RwLock<Option<Uuid>> = RwLock::new(None);

/// Returns the runtime-id for this process, generating one on first use.
///
/// The runtime-id is stable for the lifetime of the process and is stamped
/// onto every root span so the backend can correlate traces with
/// runtime-metrics emitted by the same process. It is regenerated after a
/// fork is detected (see `regenerate_runtime_id`), since the child is a
/// distinct runtime even though it inherited the parent's memory.
pub fn runtime_id() -> Uuid {
    if let Some(id) = *RUNTIME_ID.read().expect("runtime id lock poisoned") {
        return id;
    }
    let mut slot = RUNTIME_ID.write().expect("runtime id lock poisoned");
    *slot.get_or_insert_with(Uuid::new_v4)
}

/// Mints a fresh runtime-id, replacing whatever was previously cached.
/// Called by the tracer immediately after fork reconciliation.
pub fn regenerate_runtime_id() -> Uuid {
    let mut slot = RUNTIME_ID.write().expect("runtime id lock poisoned");
    let id = Uuid::new_v4();
    *slot = Some(id);
    id
}

/// Best-effort local hostname lookup, used for the `_dd.hostname` tag when
/// hostname reporting is enabled in [`crate::TracerConfig`].
///
/// This intentionally avoids a dedicated `hostname`/`gethostname` crate
/// dependency: the tag is advisory, a lookup failure is not an error
/// condition, and `HOSTNAME`/`COMPUTERNAME` cover the overwhelming majority
/// of real deployment environments (containers set `HOSTNAME`).
pub fn hostname() -> String {
    std::env::var("HOSTNAME")
        .or_else(|_| std::env::var("COMPUTERNAME"))
        .unwrap_or_else(|_| {
            tracing::warn!("could not determine local hostname, using fallback");
            "unknown-host".to_string()
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_id_is_stable_across_calls() {
        let first = runtime_id();
        let second = runtime_id();
        assert_eq!(first, second);
    }

    #[test]
    fn regenerate_changes_the_id() {
        let first = runtime_id();
        let second = regenerate_runtime_id();
        assert_ne!(first, second);
        assert_eq!(runtime_id(), second);
    }

    #[test]
    fn hostname_is_never_empty() {
        assert!(!hostname().is_empty());
    }
}
