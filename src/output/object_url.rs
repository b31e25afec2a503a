//! Revocable in-memory references to artifact payloads.
//!
//! Each payload gets a `blob:utterify/<n>` handle. A handle stays resolvable
//! until it is revoked, after which its bytes are released.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

/// Reference to a registered payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactHandle {
    url: String,
    len: usize,
}

impl ArtifactHandle {
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Payload size in bytes.
    pub fn len(&self) -> usize {
        self.len
    }
}

impl fmt::Display for ArtifactHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    entries: HashMap<String, Arc<[u8]>>,
}

/// Registry of live object URLs.
#[derive(Clone, Default)]
pub struct ObjectUrls {
    inner: Arc<Mutex<Registry>>,
}

impl ObjectUrls {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `payload` and return a fresh handle for it.
    pub fn create(&self, payload: Vec<u8>) -> ArtifactHandle {
        let mut registry = self.inner.lock();
        registry.next_id += 1;
        let url = format!("blob:utterify/{}", registry.next_id);
        let len = payload.len();
        registry.entries.insert(url.clone(), Arc::from(payload));
        ArtifactHandle { url, len }
    }

    /// Release the payload behind `handle`. Returns whether it was still live.
    pub fn revoke(&self, handle: &ArtifactHandle) -> bool {
        self.inner.lock().entries.remove(&handle.url).is_some()
    }

    /// Bytes behind `handle`, if it has not been revoked.
    pub fn resolve(&self, handle: &ArtifactHandle) -> Option<Arc<[u8]>> {
        self.inner.lock().entries.get(&handle.url).cloned()
    }

    /// Number of handles not yet revoked.
    pub fn live_count(&self) -> usize {
        self.inner.lock().entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_resolve_revoke() {
        let urls = ObjectUrls::new();
        let a = urls.create(vec![1, 2, 3]);
        let b = urls.create(vec![4]);

        assert_ne!(a, b);
        assert!(a.url().starts_with("blob:utterify/"));
        assert_eq!(a.len(), 3);
        assert_eq!(urls.live_count(), 2);

        assert!(urls.revoke(&a));
        assert!(!urls.revoke(&a));
        assert!(urls.resolve(&a).is_none());
        assert_eq!(&*urls.resolve(&b).unwrap(), &[4]);
        assert_eq!(urls.live_count(), 1);
    }
}
