//! Address allocation
//!
//! Allocation is a pure function over an explicit snapshot of block numbers
//! already in use. Callers that share a store must serialize the whole
//! "read used numbers, allocate, persist" sequence themselves; the allocator
//! holds no state and takes no lock.

use crate::error::{MeshError, Result};
use crate::fleet::Fleet;
use crate::ipam::block::{AddressBlock, MAX_BLOCK, MIN_BLOCK};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::net::Ipv4Addr;
use tracing::{debug, warn};

/// Highest gateway index inside a block (`10.N.0.1` .. `10.N.0.99`)
pub const MAX_GATEWAY_INDEX: u8 = 98;

/// Offset from gateway index to host octet (index 0 is `.1`)
const GATEWAY_HOST_OFFSET: u8 = 1;

/// Host octet the agent always occupies
pub const AGENT_HOST_OCTET: u8 = 100;

/// Pick the smallest block number in `1..=254` not present in `used`.
///
/// Numbers outside the usable range are ignored.
pub fn allocate_block(used: &BTreeSet<u8>) -> Result<AddressBlock> {
    let free = (MIN_BLOCK..=MAX_BLOCK)
        .find(|n| !used.contains(n))
        .ok_or_else(|| {
            MeshError::Exhausted(format!(
                "all {} address blocks are in use",
                MAX_BLOCK - MIN_BLOCK + 1
            ))
        })?;

    AddressBlock::new(free)
}

/// Gateway host `10.N.0.(index+1)` for `index` in `0..=98`
pub fn gateway_host(block: &AddressBlock, index: u8) -> Result<Ipv4Addr> {
    if index > MAX_GATEWAY_INDEX {
        return Err(MeshError::Validation(format!(
            "Gateway index {} out of range (max: {})",
            index, MAX_GATEWAY_INDEX
        )));
    }
    Ok(block.host(index + GATEWAY_HOST_OFFSET))
}

/// Agent host `10.N.0.100`
pub fn agent_host(block: &AddressBlock) -> Ipv4Addr {
    block.host(AGENT_HOST_OCTET)
}

/// Addresses handed to storage when a tunnel is created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TunnelAllocation {
    /// The tunnel's own block
    pub subnet: AddressBlock,
    /// Gateway end of the tunnel
    pub gateway_ip: Ipv4Addr,
    /// Agent end of the tunnel
    pub agent_ip: Ipv4Addr,
}

impl TunnelAllocation {
    /// Derive the fixed host addresses of `block`
    pub fn for_block(block: AddressBlock) -> Self {
        Self {
            subnet: block,
            gateway_ip: block.host(GATEWAY_HOST_OFFSET),
            agent_ip: agent_host(&block),
        }
    }
}

/// Which records reserve block numbers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationPolicy {
    /// Count legacy per-agent subnets as used
    #[serde(default = "default_reserve_legacy")]
    pub reserve_legacy_agent_blocks: bool,
}

impl AllocationPolicy {
    /// Collect every block number currently occupied in `fleet`
    pub fn used_block_numbers(&self, fleet: &Fleet) -> BTreeSet<u8> {
        let mut used = BTreeSet::new();

        for tunnel in &fleet.tunnels {
            let Some(subnet) = tunnel.subnet.as_deref() else {
                continue;
            };
            match AddressBlock::parse(subnet) {
                Some(block) => {
                    if !used.insert(block.number()) {
                        warn!(
                            "Block {} is assigned to more than one tunnel (seen again on {})",
                            block, tunnel.id
                        );
                    }
                }
                None => debug!("Ignoring malformed subnet '{}' on tunnel {}", subnet, tunnel.id),
            }
        }

        if self.reserve_legacy_agent_blocks {
            used.extend(
                fleet
                    .agents
                    .iter()
                    .filter_map(|a| a.subnet.as_deref())
                    .filter_map(AddressBlock::parse)
                    .map(|b| b.number()),
            );
        }

        used
    }

    /// Allocate the next free block for a tunnel in `fleet`
    pub fn allocate_tunnel(&self, fleet: &Fleet) -> Result<TunnelAllocation> {
        let used = self.used_block_numbers(fleet);
        let block = allocate_block(&used)?;
        debug!("Allocated block {} ({} blocks in use)", block, used.len());
        Ok(TunnelAllocation::for_block(block))
    }
}

impl Default for AllocationPolicy {
    fn default() -> Self {
        Self {
            reserve_legacy_agent_blocks: default_reserve_legacy(),
        }
    }
}

fn default_reserve_legacy() -> bool {
    true
}
