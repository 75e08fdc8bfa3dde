//! Address management
//!
//! This module parses and formats `10.N.0.0/24` address blocks and allocates
//! collision-free blocks and host addresses for new tunnels.

mod allocator;
mod block;

pub use allocator::{
    agent_host, allocate_block, gateway_host, AllocationPolicy, TunnelAllocation,
    AGENT_HOST_OCTET, MAX_GATEWAY_INDEX,
};
pub use block::{AddressBlock, MAX_BLOCK, MIN_BLOCK, PREFIX_LEN};
