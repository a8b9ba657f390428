//! Chains of cloned VMs passing signals down a pipeline.
//!
//! Each stage is a clone of one program with a private input queue seeded
//! with its phase setting. A round-robin pass runs every stage until it
//! yields, blocks or halts and forwards its outputs to the next stage. In
//! feedback mode the last stage feeds the first. Passes repeat until one
//! produces no output at all.

use crate::composition::CompositionError;
use crate::virtual_machine::io::QueuePort;
use crate::virtual_machine::vm::VM;

/// A pipeline of amplifier stages.
#[derive(Clone, Debug)]
pub struct Chain {
    stages: Vec<(VM, QueuePort)>,
    feedback: bool,
}

impl Chain {
    /// Builds one stage per phase, each a clone of `program`.
    pub fn new(program: &VM, phases: &[i64], feedback: bool) -> Result<Self, CompositionError> {
        if phases.is_empty() {
            return Err(CompositionError::NoNodes);
        }
        let stages = phases
            .iter()
            .map(|&phase| {
                let mut port = QueuePort::interactive();
                port.push(phase);
                (program.clone(), port)
            })
            .collect();
        Ok(Self { stages, feedback })
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Feeds `signal` to the first stage and returns the last value the final
    /// stage produced.
    pub fn run(&mut self, signal: i64) -> Result<i64, CompositionError> {
        let last = self.stages.len() - 1;
        self.stages[0].1.push(signal);
        let mut result = None;

        loop {
            let mut produced = false;
            for i in 0..self.stages.len() {
                let (vm, port) = &mut self.stages[i];
                if vm.status().is_terminal() {
                    continue;
                }
                vm.run(&mut *port).map_err(CompositionError::vm(i))?;

                let out = port.drain_output();
                let Some(&tail) = out.last() else {
                    continue;
                };
                produced = true;
                if i == last {
                    result = Some(tail);
                    if self.feedback {
                        self.stages[0].1.extend(out);
                    }
                } else {
                    self.stages[i + 1].1.extend(out);
                }
            }
            if !produced {
                break;
            }
        }

        result.ok_or(CompositionError::NoOutput)
    }
}

/// Every ordering of `items`.
pub fn permutations(items: &[i64]) -> Vec<Vec<i64>> {
    if items.len() <= 1 {
        return vec![items.to_vec()];
    }
    let mut out = Vec::new();
    for i in 0..items.len() {
        let mut rest = items.to_vec();
        let head = rest.remove(i);
        for mut tail in permutations(&rest) {
            tail.insert(0, head);
            out.push(tail);
        }
    }
    out
}

/// Tries every ordering of `phases` with an initial signal of 0 and returns
/// the highest final signal along with the ordering that produced it.
pub fn max_thrust(
    program: &VM,
    phases: &[i64],
    feedback: bool,
) -> Result<(i64, Vec<i64>), CompositionError> {
    let mut best: Option<(i64, Vec<i64>)> = None;
    for order in permutations(phases) {
        let signal = Chain::new(program, &order, feedback)?.run(0)?;
        if best.as_ref().is_none_or(|(b, _)| signal > *b) {
            best = Some((signal, order));
        }
    }
    best.ok_or(CompositionError::NoNodes)
}
