use crate::graph::{mask, Direction};
use crate::ir::ModuleGraph;

use std::sync::Arc;

/// A behavioral model standing in for the logic of a black-box module.
///
/// Every evaluation pass calls [`update`] once per instance, which reads the current values of the instance's ports and sets the next values of its outputs. Every output must be set on every pass; an output left unset is reported as a [`CombinationalDivergence`]. State that should only change on a clock edge is committed in [`clock`], which runs right after registers latch.
///
/// # Examples
///
/// ```
/// use kumo::*;
///
/// #[derive(Default)]
/// struct Accumulator {
///     sum: u128,
///     pending: u128,
/// }
///
/// impl BlackBox for Accumulator {
///     fn update(&mut self, io: &mut BlackBoxIo) {
///         self.pending = (self.sum + io.get("add")) & 0xff;
///         io.set("sum", self.sum);
///     }
///
///     fn clock(&mut self) {
///         self.sum = self.pending;
///     }
///
///     fn reset(&mut self) {
///         self.sum = 0;
///     }
/// }
///
/// let c = Context::new();
/// let acc = c.black_box("Accumulator", Accumulator::default);
/// acc.input("add", 8);
/// acc.output("sum", 8);
/// ```
///
/// [`update`]: #tymethod.update
/// [`clock`]: #method.clock
/// [`CombinationalDivergence`]: ../enum.SimulationError.html#variant.CombinationalDivergence
pub trait BlackBox: Send {
    fn update(&mut self, io: &mut BlackBoxIo<'_>);

    fn clock(&mut self) {}

    fn reset(&mut self) {}
}

/// Creates a fresh model for one black-box instance of one simulation run.
pub type BlackBoxFactory = Arc<dyn Fn() -> Box<dyn BlackBox> + Send + Sync>;

/// The ports of one black-box instance during an evaluation pass.
pub struct BlackBoxIo<'s> {
    pub(super) module: &'s ModuleGraph,
    pub(super) slots: &'s [usize],
    pub(super) current: &'s [u128],
    pub(super) next: &'s mut [u128],
    pub(super) written: &'s mut [bool],
}

impl<'s> BlackBoxIo<'s> {
    fn port(&self, name: &str) -> (usize, Direction, u32) {
        let id = match self.module.find_signal(name) {
            Some(id) => id,
            _ => panic!(
                "Black-box module \"{}\" doesn't have a port called \"{}\".",
                self.module.name, name
            ),
        };
        let decl = self.module.signal(id);
        (self.slots[id.0], decl.direction, decl.bit_width())
    }

    /// Returns the current value of the port called `name`.
    ///
    /// # Panics
    ///
    /// Panics if the module doesn't have a port called `name`.
    pub fn get(&self, name: &str) -> u128 {
        let (slot, _, _) = self.port(name);
        self.current[slot]
    }

    /// Sets the next value of the output called `name`. Bits above the output's width are dropped.
    ///
    /// # Panics
    ///
    /// Panics if the module doesn't have a port called `name`, or if that port is an input.
    pub fn set(&mut self, name: &str, value: u128) {
        let (slot, direction, bit_width) = self.port(name);
        if direction == Direction::Input {
            panic!(
                "Cannot set \"{}\" of black-box module \"{}\", which is an input.",
                name, self.module.name
            );
        }
        self.next[slot] = value & mask(bit_width);
        self.written[slot] = true;
    }
}

/// A word-addressed memory with asynchronous reads and clocked writes, for use as a black-box model.
///
/// Ports: `addr` (input), `write_enable` (input, 1 bit), `write_data` (input), `read_data` (output). `read_data` always shows the word at `addr`; a write requested during a step lands at the clock edge.
///
/// # Examples
///
/// ```
/// use kumo::*;
/// use kumo::sim::Ram;
///
/// let c = Context::new();
/// let ram = c.black_box("Ram", || Ram::new(16));
/// ram.input("addr", 4);
/// ram.input("write_enable", 1);
/// ram.input("write_data", 8);
/// ram.output("read_data", 8);
/// ```
pub struct Ram {
    words: Vec<u128>,
    pending_write: Option<(usize, u128)>,
}

impl Ram {
    pub fn new(depth: usize) -> Ram {
        Ram {
            words: vec![0; depth],
            pending_write: None,
        }
    }
}

impl BlackBox for Ram {
    fn update(&mut self, io: &mut BlackBoxIo<'_>) {
        let addr = io.get("addr") as usize % self.words.len().max(1);
        self.pending_write = if io.get("write_enable") != 0 {
            Some((addr, io.get("write_data")))
        } else {
            None
        };
        io.set("read_data", self.words.get(addr).copied().unwrap_or(0));
    }

    fn clock(&mut self) {
        if let Some((addr, value)) = self.pending_write.take() {
            if let Some(word) = self.words.get_mut(addr) {
                *word = value;
            }
        }
    }

    fn reset(&mut self) {
        self.words.iter_mut().for_each(|word| *word = 0);
        self.pending_write = None;
    }
}
