//! Error kinds the heap propagates to its caller rather than silently
//! absorbing. Allocation failure due to insufficient space is *not* one of
//! these — it is a normal result, signalled by `allocate` returning `None`.

use thiserror::Error;

/// Failure modes of the simulated heap's public operations.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeapError {
    /// `free(address)` was called with an address not currently present in
    /// the allocation map — never allocated, already freed, or not a valid
    /// block start.
    #[error("address {address:#x} is not a currently allocated block")]
    InvalidFree { address: usize },

    /// `read`/`write` targeted an address outside every currently-allocated
    /// block.
    #[error("address {address:#x} is not within any currently allocated block")]
    InvalidAccess { address: usize },

    /// `allocate` was invoked under a strategy value the implementation does
    /// not recognise. A programmer error, not a runtime condition reachable
    /// through this crate's closed `Strategy` enum.
    #[error("allocate() invoked under an unrecognised placement strategy")]
    UnknownStrategy,
}
