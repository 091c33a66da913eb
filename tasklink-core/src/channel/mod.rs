//! Sync channel to the remote agent
//!
//! The channel abstraction keeps the core transport-agnostic: anything
//! that can deliver [`InboundEvent`]s in order and accept
//! [`OutboundEvent`]s can back it.

pub mod memory;
pub mod traits;

pub use memory::MemoryChannel;
pub use traits::SyncChannel;
