//! Drivers that wire several VMs, or one VM and a device, together.
//!
//! # Modules
//!
//! - [`amplifier`]: pipelines and feedback loops of cloned VMs with phase search
//! - [`ascii`]: text encoding for VMs that speak ASCII
//! - [`device`]: a single VM driving a frame-oriented device
//! - [`star`]: a packet-switched star network with a NAT

pub mod amplifier;
pub mod ascii;
pub mod device;
pub mod star;

use crate::virtual_machine::errors::VMError;

/// Errors raised by composition drivers.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum CompositionError {
    /// A VM failed; `node` is its index in the driver.
    #[error("node {node} failed: {source}")]
    Vm {
        node: usize,
        #[source]
        source: VMError,
    },
    /// The driver was built with no VMs.
    #[error("no nodes to run")]
    NoNodes,
    /// The last VM of a chain never produced a value.
    #[error("chain produced no output")]
    NoOutput,
    /// A packet named an address outside the network.
    #[error("node {node} sent a packet to unknown address {address}")]
    UnknownAddress { node: usize, address: i64 },
    /// Every node went idle and there was nothing to reinject.
    #[error("network stalled in round {round} with no packet held by the NAT")]
    Stalled { round: u64 },
    /// The driver ran for its configured number of rounds without finishing.
    #[error("round limit of {limit} exceeded")]
    RoundLimit { limit: u64 },
}

impl CompositionError {
    pub(crate) fn vm(node: usize) -> impl FnOnce(VMError) -> CompositionError {
        move |source| CompositionError::Vm { node, source }
    }
}
