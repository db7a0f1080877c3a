//! Error type for slot-addressed operations.

use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum XMapError {
    /// A slot number at or past the end of the slot store. Usually a slot
    /// number held across `rebuild_index`.
    #[error("slot {slot} out of range (slot store length {len})")]
    OutOfRange { slot: usize, len: usize },
}

pub type Result<T> = std::result::Result<T, XMapError>;
