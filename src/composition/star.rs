//! Packet-switched star network of VMs with a NAT.
//!
//! Every node is a clone of one program booted with its address as the first
//! input. Nodes emit packets as three consecutive outputs `(address, x, y)`;
//! the router appends `x, y` to the destination's inbox. Address
//! [`NAT_ADDRESS`] is intercepted by a NAT that keeps only the most recent
//! packet and reinjects it into node 0 once a whole round passes with every
//! node idle.
//!
//! A node polling an empty inbox receives `-1` once per turn. Its next poll
//! in the same turn suspends it until the following round.

use crate::composition::CompositionError;
use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::io::{IoPort, PortError};
use crate::virtual_machine::vm::VM;
use crate::{debug, info, warn};
use std::collections::VecDeque;

/// Address intercepted by the NAT.
pub const NAT_ADDRESS: i64 = 255;
/// Node count used by [`Network::with_default_size`].
pub const DEFAULT_NODES: usize = 50;
/// Value a node reads when its inbox is empty.
pub const EMPTY_INPUT: i64 = -1;
const PACKET_LEN: usize = 3;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Packet {
    pub dest: i64,
    pub x: i64,
    pub y: i64,
}

/// Summary of one call to [`Network::step`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RoundReport {
    /// 1-based round number.
    pub round: u64,
    /// Packets routed this round, in send order, NAT-bound ones included.
    pub delivered: Vec<Packet>,
    /// True if every node was idle for the whole round.
    pub idle: bool,
    /// Packet the NAT reinjected into node 0 at the end of the round.
    pub wake: Option<Packet>,
}

#[derive(Clone, Debug, Default)]
struct NodePort {
    inbox: VecDeque<i64>,
    outbox: Vec<i64>,
    /// Handed out the empty marker this turn.
    polled_empty: bool,
    /// Consumed a queued value this turn.
    received: bool,
}

impl NodePort {
    fn begin_turn(&mut self) {
        self.polled_empty = false;
        self.received = false;
    }

    /// Drains complete packets from the outbox, leaving any partial one.
    fn take_packets(&mut self) -> Vec<Packet> {
        let complete = self.outbox.len() - self.outbox.len() % PACKET_LEN;
        self.outbox
            .drain(..complete)
            .collect::<Vec<_>>()
            .chunks_exact(PACKET_LEN)
            .map(|c| Packet {
                dest: c[0],
                x: c[1],
                y: c[2],
            })
            .collect()
    }
}

impl IoPort for NodePort {
    fn fetch(&mut self) -> Result<Option<i64>, PortError> {
        if let Some(value) = self.inbox.pop_front() {
            self.received = true;
            return Ok(Some(value));
        }
        if self.polled_empty {
            return Ok(None);
        }
        self.polled_empty = true;
        Ok(Some(EMPTY_INPUT))
    }

    fn put(&mut self, value: i64) -> Result<(), PortError> {
        self.outbox.push(value);
        Ok(())
    }
}

#[derive(Clone, Debug)]
struct Node {
    vm: VM,
    port: NodePort,
}

/// A star network of cloned VMs.
#[derive(Clone, Debug)]
pub struct Network {
    nodes: Vec<Node>,
    nat: Option<Packet>,
    last_wake: Option<Packet>,
    round: u64,
    round_limit: Option<u64>,
}

impl Network {
    /// Boots `size` clones of `program`, addresses `0..size`.
    pub fn new(program: &VM, size: usize) -> Result<Self, CompositionError> {
        if size == 0 {
            return Err(CompositionError::NoNodes);
        }
        let nodes = (0..size)
            .map(|address| {
                let mut port = NodePort::default();
                port.inbox.push_back(address as i64);
                Node {
                    vm: program.clone(),
                    port,
                }
            })
            .collect();
        Ok(Self {
            nodes,
            nat: None,
            last_wake: None,
            round: 0,
            round_limit: None,
        })
    }

    pub fn with_default_size(program: &VM) -> Result<Self, CompositionError> {
        Self::new(program, DEFAULT_NODES)
    }

    /// Fails any further [`step`](Network::step) once `limit` rounds have run.
    pub fn with_round_limit(mut self, limit: u64) -> Self {
        self.round_limit = Some(limit);
        self
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Rounds completed so far.
    pub fn round(&self) -> u64 {
        self.round
    }

    /// Packet currently held by the NAT.
    pub fn nat_packet(&self) -> Option<Packet> {
        self.nat
    }

    /// The VM at `address`, for inspection.
    pub fn node(&self, address: usize) -> Option<&VM> {
        self.nodes.get(address).map(|n| &n.vm)
    }

    /// Mutable access to the VM at `address`, e.g. to patch memory before the
    /// first round.
    pub fn node_mut(&mut self, address: usize) -> Option<&mut VM> {
        self.nodes.get_mut(address).map(|n| &mut n.vm)
    }

    /// Gives every node one turn in address order, routing packets as each
    /// turn ends, then lets the NAT act if the round was idle.
    pub fn step(&mut self) -> Result<RoundReport, CompositionError> {
        if let Some(limit) = self.round_limit
            && self.round >= limit
        {
            return Err(CompositionError::RoundLimit { limit });
        }
        self.round += 1;

        let mut report = RoundReport {
            round: self.round,
            ..RoundReport::default()
        };
        let mut senders = vec![false; self.nodes.len()];

        for i in 0..self.nodes.len() {
            let node = &mut self.nodes[i];
            node.port.begin_turn();
            if node.vm.status().is_terminal() {
                continue;
            }
            node.vm
                .run(&mut node.port)
                .map_err(CompositionError::vm(i))?;

            let packets = node.port.take_packets();
            senders[i] = !packets.is_empty();
            for packet in packets {
                self.route(i, packet)?;
                report.delivered.push(packet);
            }
        }

        report.idle = self.nodes.iter().zip(&senders).all(|(node, &sent)| {
            node.vm.status().is_terminal()
                || (node.port.polled_empty
                    && !node.port.received
                    && !sent
                    && node.port.inbox.is_empty())
        });
        debug!(
            "round {}: {} packet(s), idle={}",
            report.round,
            report.delivered.len(),
            report.idle
        );

        if report.idle {
            let Some(packet) = self.nat else {
                warn!("network idle in round {} with nothing to reinject", self.round);
                return Err(CompositionError::Stalled { round: self.round });
            };
            info!("NAT wakes node 0 with x={} y={}", packet.x, packet.y);
            self.nodes[0].port.inbox.extend([packet.x, packet.y]);
            report.wake = Some(packet);
        }

        Ok(report)
    }

    fn route(&mut self, from: usize, packet: Packet) -> Result<(), CompositionError> {
        if packet.dest == NAT_ADDRESS {
            self.nat = Some(packet);
            return Ok(());
        }
        let node = usize::try_from(packet.dest)
            .ok()
            .and_then(|dest| self.nodes.get_mut(dest))
            .ok_or(CompositionError::UnknownAddress {
                node: from,
                address: packet.dest,
            })?;
        node.port.inbox.extend([packet.x, packet.y]);
        Ok(())
    }

    /// Runs rounds until some node sends a packet to the NAT.
    pub fn run_until_first_nat_packet(&mut self) -> Result<Packet, CompositionError> {
        loop {
            let report = self.step()?;
            if let Some(packet) = report.delivered.iter().find(|p| p.dest == NAT_ADDRESS) {
                return Ok(*packet);
            }
        }
    }

    /// Runs rounds until the NAT reinjects the same `y` twice in a row and
    /// returns that packet.
    pub fn run_until_repeated_wake(&mut self) -> Result<Packet, CompositionError> {
        loop {
            let Some(packet) = self.step()?.wake else {
                continue;
            };
            if self.last_wake.is_some_and(|last| last.y == packet.y) {
                return Ok(packet);
            }
            self.last_wake = Some(packet);
        }
    }

    /// Errors of every node that has failed, by address.
    pub fn faults(&self) -> Vec<(usize, &VMError)> {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(i, n)| n.vm.fault().map(|e| (i, e)))
            .collect()
    }
}
