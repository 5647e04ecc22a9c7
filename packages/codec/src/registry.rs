//! External input buffers registered with the encoder.
//!
//! Registering a caller buffer lets the encoder read it directly instead of
//! copying into an input slot. The registry keeps the owning frame alive for
//! as long as the registration exists.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::input::FrameSource;
use crate::provider::{EncodeProvider, RegistrationHandle};
use crate::{CodecError, PixelFormat};

struct Registration {
    handle: RegistrationHandle,
    _owner: Arc<dyn FrameSource>,
}

/// Pointer-keyed set of encoder registrations.
#[derive(Default)]
pub struct InputRegistry {
    entries: HashMap<u64, Registration>,
}

impl InputRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `ptr` with the encoder unless it already is.
    ///
    /// `owner` is retained until [`InputRegistry::unregister_all`].
    pub fn register<P>(
        &mut self,
        provider: &mut P,
        ptr: u64,
        pitch: usize,
        format: PixelFormat,
        owner: Arc<dyn FrameSource>,
    ) -> Result<RegistrationHandle, CodecError>
    where
        P: EncodeProvider + ?Sized,
    {
        if let Some(existing) = self.entries.get(&ptr) {
            return Ok(existing.handle);
        }
        let handle = provider.register_resource(ptr, pitch, format)?;
        debug!(ptr, pitch, ?format, "registered input buffer");
        self.entries.insert(
            ptr,
            Registration {
                handle,
                _owner: owner,
            },
        );
        Ok(handle)
    }

    /// Handle of the registration for `ptr`, if any.
    #[must_use]
    pub fn handle(&self, ptr: u64) -> Option<RegistrationHandle> {
        self.entries.get(&ptr).map(|r| r.handle)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Release every registration and its owner.
    ///
    /// All registrations are attempted; the first failure is returned.
    pub fn unregister_all<P>(&mut self, provider: &mut P) -> Result<(), CodecError>
    where
        P: EncodeProvider + ?Sized,
    {
        let mut first_error = None;
        for (ptr, registration) in self.entries.drain() {
            if let Err(e) = provider.unregister_resource(registration.handle) {
                warn!(ptr, error = %e, "failed to unregister input buffer");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeEncodeProvider, TestFrame};

    #[test]
    fn test_register_is_deduplicated() {
        let mut provider = FakeEncodeProvider::default();
        let mut registry = InputRegistry::new();
        let owner: Arc<dyn FrameSource> = Arc::new(TestFrame::default());

        let a = registry
            .register(&mut provider, 0x1000, 64, PixelFormat::Nv12, owner.clone())
            .unwrap();
        let b = registry
            .register(&mut provider, 0x1000, 64, PixelFormat::Nv12, owner.clone())
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(registry.len(), 1);
        assert_eq!(provider.registrations.len(), 1);
        assert_eq!(registry.handle(0x1000), Some(a));
        assert_eq!(Arc::strong_count(&owner), 2);
    }

    #[test]
    fn test_unregister_releases_owners() {
        let mut provider = FakeEncodeProvider::default();
        let mut registry = InputRegistry::new();
        let owner: Arc<dyn FrameSource> = Arc::new(TestFrame::default());
        for ptr in [0x1000, 0x2000] {
            registry
                .register(&mut provider, ptr, 64, PixelFormat::Nv12, owner.clone())
                .unwrap();
        }

        registry.unregister_all(&mut provider).unwrap();
        assert!(registry.is_empty());
        assert_eq!(provider.unregistered.len(), 2);
        assert_eq!(Arc::strong_count(&owner), 1);
    }

    #[test]
    fn test_unregister_continues_after_failure() {
        let mut provider = FakeEncodeProvider::default();
        let mut registry = InputRegistry::new();
        let owner: Arc<dyn FrameSource> = Arc::new(TestFrame::default());
        for ptr in [0x1000, 0x2000, 0x3000] {
            registry
                .register(&mut provider, ptr, 64, PixelFormat::Nv12, owner.clone())
                .unwrap();
        }

        provider.fail_unregister = true;
        assert!(registry.unregister_all(&mut provider).is_err());
        assert!(registry.is_empty());
        assert_eq!(Arc::strong_count(&owner), 1);
    }
}
