/*!
This crate contains small types shared by every lodestar crate: ordered floats, run ids, the softmax and argmax helpers, the error returned when a model cannot be fit, and the per-epoch progress report emitted by iterative models.
*/

pub mod error;
pub mod finite;
pub mod id;
pub mod ops;
pub mod progress;

pub use self::error::FitError;
pub use self::finite::{Finite, NotFiniteError, ToFinite};
pub use self::id::Id;
pub use self::ops::{argmax, softmax};
pub use self::progress::EpochProgress;
