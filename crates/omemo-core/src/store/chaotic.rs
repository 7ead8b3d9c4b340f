//! Chaotic store wrapper for fault injection testing
//!
//! Randomly fails calls so tests can check that a failed save never leaves
//! a session half-advanced.

use std::sync::{Arc, Mutex};

use omemo_proto::{DeviceId, PeerId};

use super::{OmemoStore, StoreError};
use crate::{bundle::OmemoBundle, state::RatchetState};

/// Store wrapper that randomly injects failures
///
/// Delegates to an inner store but fails calls with `StoreError::Io` at the
/// configured rate. The RNG lives in an `Arc<Mutex<..>>`, so clones share one
/// failure sequence.
#[derive(Clone)]
pub struct ChaoticStore<S: OmemoStore> {
    inner: S,
    /// Failure rate (0.0 = never fail, 1.0 = always fail)
    failure_rate: f64,
    rng: Arc<Mutex<ChaoticRng>>,
    operation_count: Arc<Mutex<usize>>,
}

/// Linear congruential generator, so chaos runs replay from a seed
struct ChaoticRng {
    state: u64,
}

impl ChaoticRng {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Next value in [0.0, 1.0)
    #[allow(clippy::cast_precision_loss)]
    fn next(&mut self) -> f64 {
        // Numerical Recipes constants
        const A: u64 = 1_664_525;
        const C: u64 = 1_013_904_223;
        const M: u64 = 1u64 << 32;

        self.state = (A.wrapping_mul(self.state).wrapping_add(C)) % M;
        (self.state as f64) / (M as f64)
    }

    fn should_fail(&mut self, failure_rate: f64) -> bool {
        self.next() < failure_rate
    }
}

impl<S: OmemoStore> ChaoticStore<S> {
    /// Wrap `inner` with a fixed default seed.
    ///
    /// # Panics
    ///
    /// Panics if `failure_rate` is not in [0.0, 1.0]
    pub fn new(inner: S, failure_rate: f64) -> Self {
        Self::with_seed(inner, failure_rate, 0x1234_5678_9ABC_DEF0)
    }

    /// Wrap `inner` with an explicit seed for reproducible chaos.
    ///
    /// # Panics
    ///
    /// Panics if `failure_rate` is not in [0.0, 1.0]
    pub fn with_seed(inner: S, failure_rate: f64, seed: u64) -> Self {
        assert!(
            (0.0..=1.0).contains(&failure_rate),
            "failure_rate must be between 0.0 and 1.0, got {failure_rate}"
        );

        Self {
            inner,
            failure_rate,
            rng: Arc::new(Mutex::new(ChaoticRng::new(seed))),
            operation_count: Arc::new(Mutex::new(0)),
        }
    }

    /// Underlying store, for checking state after chaos.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Calls attempted so far, failed ones included.
    pub fn operation_count(&self) -> usize {
        #[allow(clippy::expect_used)]
        *self.operation_count.lock().expect("operation_count mutex poisoned")
    }

    fn inject(&self) -> Result<(), StoreError> {
        #[allow(clippy::expect_used)]
        let mut count = self.operation_count.lock().expect("operation_count mutex poisoned");
        *count += 1;
        drop(count);

        #[allow(clippy::expect_used)]
        let fail =
            self.rng.lock().expect("ChaoticRng mutex poisoned").should_fail(self.failure_rate);
        if fail {
            tracing::debug!("chaotic store failure injected");
            return Err(StoreError::Io("chaotic failure injection".to_string()));
        }
        Ok(())
    }
}

impl<S: OmemoStore> OmemoStore for ChaoticStore<S> {
    fn current_device_bundle(&self) -> Result<Option<OmemoBundle>, StoreError> {
        self.inject()?;
        self.inner.current_device_bundle()
    }

    fn save_current_device_bundle(&self, bundle: &OmemoBundle) -> Result<(), StoreError> {
        self.inject()?;
        self.inner.save_current_device_bundle(bundle)
    }

    fn save_device_id(&self, peer: &PeerId, device: DeviceId) -> Result<(), StoreError> {
        self.inject()?;
        self.inner.save_device_id(peer, device)
    }

    fn device_ids(&self, peer: &PeerId) -> Result<Vec<DeviceId>, StoreError> {
        self.inject()?;
        self.inner.device_ids(peer)
    }

    fn save_bundle(&self, device: DeviceId, bundle: &OmemoBundle) -> Result<(), StoreError> {
        self.inject()?;
        self.inner.save_bundle(device, bundle)
    }

    fn bundle(&self, device: DeviceId) -> Result<Option<OmemoBundle>, StoreError> {
        self.inject()?;
        self.inner.bundle(device)
    }

    fn save_session(&self, device: DeviceId, state: &RatchetState) -> Result<(), StoreError> {
        self.inject()?;
        self.inner.save_session(device, state)
    }

    fn session(&self, device: DeviceId) -> Result<Option<RatchetState>, StoreError> {
        self.inject()?;
        self.inner.session(device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn zero_rate_never_fails() {
        let store = ChaoticStore::new(MemoryStore::new(), 0.0);
        let bob = PeerId::from("bob");

        for i in 0..100 {
            store.save_device_id(&bob, DeviceId(i)).unwrap();
        }
        assert_eq!(store.device_ids(&bob).unwrap().len(), 100);
        assert_eq!(store.operation_count(), 101);
    }

    #[test]
    fn full_rate_always_fails_and_leaves_inner_untouched() {
        let store = ChaoticStore::new(MemoryStore::new(), 1.0);
        let bob = PeerId::from("bob");

        let err = store.save_device_id(&bob, DeviceId(1)).unwrap_err();
        assert_eq!(err, StoreError::Io("chaotic failure injection".to_string()));
        assert!(store.inner().device_ids(&bob).unwrap().is_empty());
    }

    #[test]
    fn same_seed_same_failures() {
        let pattern = |seed| {
            let store = ChaoticStore::with_seed(MemoryStore::new(), 0.5, seed);
            (0..64).map(|_| store.session(DeviceId(0)).is_err()).collect::<Vec<_>>()
        };

        assert_eq!(pattern(7), pattern(7));
        assert!(pattern(7).iter().any(|failed| *failed));
        assert!(pattern(7).iter().any(|failed| !failed));
    }

    #[test]
    #[should_panic(expected = "failure_rate must be between 0.0 and 1.0")]
    fn rejects_invalid_rate() {
        let _ = ChaoticStore::new(MemoryStore::new(), 1.5);
    }
}
