//! # modeldb-core
//!
//! Observable building blocks shared by the realtime model and the
//! path store:
//! - [`ChangeSignal`] - synchronous typed publish/subscribe
//! - [`ScalarValue`] - observable box around one JSON value
//! - change arguments emitted by every container
//! - the [`Disposable`] lifecycle contract

pub mod change;
pub mod signal;
pub mod value;

pub use change::{
    MapChange, MapChangeType, StringChange, StringChangeType, ValueChange, VectorChange,
    VectorChangeType,
};
pub use signal::{ChangeSignal, ListenerId};
pub use value::ScalarValue;

/// Something holding listeners or remote subscriptions that must be released.
///
/// Disposing twice is always a no-op.
pub trait Disposable: Send + Sync {
    fn dispose(&self);

    fn is_disposed(&self) -> bool;
}
