//! Transaction attempts.
//!
//! An attempt reads committed data without locking and buffers its writes
//! in one [`exchange::Exchange`] per touched tree. Commit validates every
//! exchange against the current committed state and either journals the
//! writes or fails with a conflict.

pub(crate) mod exchange;
mod handle;

pub use handle::WriteableStorage;
