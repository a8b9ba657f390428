//! A single VM driving a device through fixed-size output frames.
//!
//! The device answers every input request from its own state and consumes
//! outputs in frames of [`Device::FRAME`] values, e.g. `(color, turn)` for a
//! painting robot or `(x, y, tile)` for a screen.

use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::io::{IoPort, PortError};
use crate::virtual_machine::vm::{Status, VM};

/// Hardware controlled by an Intcode program.
pub trait Device {
    /// Number of outputs that make up one command.
    const FRAME: usize;

    /// Value returned to the next input instruction. `None` blocks the VM.
    fn sense(&mut self) -> Option<i64>;

    /// Applies one complete frame of outputs.
    fn actuate(&mut self, frame: &[i64]) -> Result<(), PortError>;
}

/// Adapts a [`Device`] to the [`IoPort`] interface.
pub struct DevicePort<'a, D: Device> {
    device: &'a mut D,
    pending: Vec<i64>,
    yield_on_frame: bool,
    frame_done: bool,
}

impl<'a, D: Device> DevicePort<'a, D> {
    pub fn new(device: &'a mut D) -> Self {
        Self {
            device,
            pending: Vec::with_capacity(D::FRAME),
            yield_on_frame: false,
            frame_done: false,
        }
    }

    /// Like [`new`](DevicePort::new), but returns control after every frame.
    pub fn yielding(device: &'a mut D) -> Self {
        Self {
            yield_on_frame: true,
            ..Self::new(device)
        }
    }

    pub fn device(&self) -> &D {
        &*self.device
    }

    /// Outputs received since the last complete frame.
    pub fn pending(&self) -> &[i64] {
        &self.pending
    }
}

impl<D: Device> IoPort for DevicePort<'_, D> {
    fn fetch(&mut self) -> Result<Option<i64>, PortError> {
        Ok(self.device.sense())
    }

    fn put(&mut self, value: i64) -> Result<(), PortError> {
        self.frame_done = false;
        self.pending.push(value);
        if self.pending.len() >= D::FRAME {
            self.device.actuate(&self.pending)?;
            self.pending.clear();
            self.frame_done = true;
        }
        Ok(())
    }

    fn should_yield(&self) -> bool {
        self.yield_on_frame && self.frame_done
    }
}

/// Runs `vm` to halt against `device`.
pub fn drive<D: Device>(vm: &mut VM, device: &mut D) -> Result<(), VMError> {
    drive_with(vm, device, |_| {})
}

/// Runs `vm` to halt against `device`, calling `on_frame` after each frame.
///
/// Fails with [`VMError::NotHalted`] if the device stops supplying input.
pub fn drive_with<D: Device>(
    vm: &mut VM,
    device: &mut D,
    mut on_frame: impl FnMut(&D),
) -> Result<(), VMError> {
    let mut port = DevicePort::yielding(device);
    loop {
        match vm.run(&mut port)? {
            Status::Halted => return Ok(()),
            Status::Yielded => on_frame(port.device()),
            _ => return Err(VMError::NotHalted { ip: vm.ip() }),
        }
    }
}
