//! Atomic integer operations
//!
//! Every operation is a single sequentially consistent read-modify-write and
//! returns the value *after* the update. Arithmetic wraps in two's
//! complement; overflow is not reported.

use std::sync::atomic::{AtomicI32, AtomicI64, Ordering};

/// 32-bit atomic integer
pub type Atomic = AtomicI32;

/// 64-bit atomic integer
pub type Atomic64 = AtomicI64;

/// Read-modify-write operations returning the updated value
pub trait AtomicOps {
    /// Integer type stored in the atomic
    type Value: Copy;

    /// Add one
    fn increment(&self) -> Self::Value;

    /// Add `num`
    fn add(&self, num: Self::Value) -> Self::Value;

    /// Subtract one
    fn decrement(&self) -> Self::Value;

    /// Subtract `num`
    ///
    /// Performed as an add of the wrapping negation, so `MIN` (whose
    /// negation is itself) still subtracts correctly modulo 2^N.
    fn subtract(&self, num: Self::Value) -> Self::Value;
}

macro_rules! impl_atomic_ops {
    ($atomic:ty, $value:ty) => {
        impl AtomicOps for $atomic {
            type Value = $value;

            #[inline]
            fn increment(&self) -> $value {
                self.add(1)
            }

            #[inline]
            fn add(&self, num: $value) -> $value {
                self.fetch_add(num, Ordering::SeqCst).wrapping_add(num)
            }

            #[inline]
            fn decrement(&self) -> $value {
                self.subtract(1)
            }

            #[inline]
            fn subtract(&self, num: $value) -> $value {
                self.add(num.wrapping_neg())
            }
        }
    };
}

impl_atomic_ops!(AtomicI32, i32);
impl_atomic_ops!(AtomicI64, i64);
