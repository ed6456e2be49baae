//! # Station State
//!
//! State shared between the reader and processor loops.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Shared Station State                               │
//! │                                                                         │
//! │   reader loop                              processor loop               │
//! │   ───────────                              ──────────────               │
//! │   status ──► with_carts()                                               │
//! │   reset  ──► gate.try_acquire() ──┐        gate.try_acquire()           │
//! │              with_carts_mut()     │          │                          │
//! │                                   ▼          ▼                          │
//! │                        ┌──────────────────────────┐                     │
//! │                        │ ProcessingGate           │ one holder at most  │
//! │                        │ Arc<AtomicBool>          │                     │
//! │                        └──────────────────────────┘                     │
//! │                        ┌──────────────────────────┐                     │
//! │                        │ SharedCarts              │ locks never held    │
//! │                        │ Arc<Mutex<CartContainer>>│ across .await       │
//! │                        └──────────────────────────┘                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use ptl_core::CartContainer;

// =============================================================================
// Processing Gate
// =============================================================================

/// Admits one picking operation (or reset) at a time.
///
/// Never waits: a caller that finds the gate held drops its work.
#[derive(Debug, Clone, Default)]
pub struct ProcessingGate {
    busy: Arc<AtomicBool>,
}

impl ProcessingGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the gate if it is free. Released when the guard drops.
    pub fn try_acquire(&self) -> Option<GateGuard> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| GateGuard {
                busy: Arc::clone(&self.busy),
            })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Holds the [`ProcessingGate`] until dropped.
#[derive(Debug)]
pub struct GateGuard {
    busy: Arc<AtomicBool>,
}

impl Drop for GateGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

// =============================================================================
// Shared Carts
// =============================================================================

/// The cart container behind a mutex.
///
/// ## Why Not RwLock?
/// Every access is short and most of them mutate.
#[derive(Debug, Clone)]
pub struct SharedCarts {
    carts: Arc<Mutex<CartContainer>>,
}

impl SharedCarts {
    pub fn new(carts: CartContainer) -> Self {
        SharedCarts {
            carts: Arc::new(Mutex::new(carts)),
        }
    }

    // Every mutation is one method call; a poisoned container is still consistent.
    fn lock(&self) -> MutexGuard<'_, CartContainer> {
        self.carts.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Executes a function with read access to the carts.
    pub fn with_carts<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&CartContainer) -> R,
    {
        let carts = self.lock();
        f(&carts)
    }

    /// Executes a function with write access to the carts.
    pub fn with_carts_mut<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut CartContainer) -> R,
    {
        let mut carts = self.lock();
        f(&mut carts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ptl_core::{Basket, Cart, ModuleAddress};

    #[test]
    fn test_gate_single_holder() {
        let gate = ProcessingGate::new();
        let other = gate.clone();

        let guard = gate.try_acquire().unwrap();
        assert!(other.is_busy());
        assert!(other.try_acquire().is_none());

        drop(guard);
        assert!(!gate.is_busy());
        assert!(other.try_acquire().is_some());
    }

    #[test]
    fn test_guard_released_on_early_return() {
        fn work(gate: &ProcessingGate) -> Result<(), ()> {
            let _guard = gate.try_acquire().ok_or(())?;
            Err(())
        }

        let gate = ProcessingGate::new();
        assert!(work(&gate).is_err());
        assert!(!gate.is_busy());
    }

    #[test]
    fn test_shared_carts() {
        let address = ModuleAddress::new(1).unwrap();
        let container =
            CartContainer::new(vec![Cart::new("1", vec![Basket::new("1", address)])]).unwrap();
        let carts = SharedCarts::new(container);
        let clone = carts.clone();

        let result = carts.with_carts_mut(|c| c.assign_item("X", 2));
        assert!(result.is_success());
        assert_eq!(clone.with_carts(|c| c.occupancy()), 1);
    }
}
