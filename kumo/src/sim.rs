//! Event-driven simulation of elaborated [`Design`]s.
//!
//! A [`Simulation`] is one run over a shared, read-only [`Design`]. It owns all of its signal storage and black-box models, so any number of runs over the same design can proceed in parallel.
//!
//! Each evaluation pass runs the units of the design's [`Schedule`] in dependency order. A computed combinational value commits as soon as it is written, so later units read it in the same pass. For a design without combinational cycles, one pass reaches the fixed point. Otherwise passes repeat until no combinational value changes. Registers only take their next value on [`Simulation::advance_clock`].
//!
//! [`Design`]: ../struct.Design.html
//! [`Schedule`]: ../struct.Schedule.html
//! [`Simulation`]: ./struct.Simulation.html
//! [`Simulation::advance_clock`]: ./struct.Simulation.html#method.advance_clock

mod black_box;
mod eval;

pub use black_box::*;

use eval::*;

use crate::elaborate::{Design, SlotClass, Unit};
use crate::error::SimulationError;
use crate::graph::mask;
use crate::runtime::tracing::{Trace, TraceValue, TraceValueType};

use log::{debug, trace};

use std::io;

/// Settings of one simulation run.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SimConfig {
    /// Names the run in errors and logs.
    pub name: String,
    /// Upper bound on evaluation passes before a run is considered to oscillate.
    pub max_iterations: usize,
}

impl SimConfig {
    pub fn name(mut self, name: impl Into<String>) -> SimConfig {
        self.name = name.into();
        self
    }

    pub fn max_iterations(mut self, max_iterations: usize) -> SimConfig {
        self.max_iterations = max_iterations;
        self
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        SimConfig {
            name: "sim".into(),
            max_iterations: 32,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SimState {
    Idle,
    Evaluating,
    Settled,
    Aborted,
}

struct AttachedTrace<'d> {
    trace: Box<dyn Trace + 'd>,
    // Slot, trace id and value type of every traced signal
    signals: Vec<(usize, usize, TraceValueType)>,
}

/// One simulation run over a [`Design`].
///
/// # Examples
///
/// ```
/// use kumo::*;
/// use kumo::sim::*;
///
/// let c = Context::new();
///
/// let m = c.module("Counter");
/// let enable = m.input("enable", 1);
/// let count = m.output("count", 2);
/// let value = m.reg("value", 2);
/// m.update(|b| {
///     b.if_(enable.current(), |b| {
///         b.assign(value, value.current() + m.lit(1u32, 2));
///     });
///     b.assign(count, value.current());
/// });
///
/// let design = elaborate(m).unwrap();
/// let mut sim = Simulation::new(&design, SimConfig::default());
///
/// let mut counts = Vec::new();
/// for &e in [1, 1, 0, 1].iter() {
///     sim.set("enable", e).unwrap();
///     sim.advance_clock().unwrap();
///     counts.push(sim.get("count").unwrap());
/// }
/// assert_eq!(counts, vec![1, 2, 2, 3]);
/// ```
///
/// [`Design`]: ../struct.Design.html
pub struct Simulation<'d> {
    design: &'d Design,
    config: SimConfig,

    state: SimState,
    step: u64,
    passes: usize,

    current: Vec<u128>,
    next: Vec<u128>,
    written: Vec<bool>,
    masks: Vec<u128>,
    /// Per instance, the arm each branch point took in the latest pass.
    taken: Vec<Vec<Option<usize>>>,
    /// Per instance, the local versions computed so far this pass.
    versions: Vec<Vec<Option<u128>>>,
    black_boxes: Vec<Option<Box<dyn BlackBox>>>,

    trace: Option<AttachedTrace<'d>>,
}

impl<'d> Simulation<'d> {
    /// Creates a run in its reset state. Nothing is evaluated until [`settle`] or [`advance_clock`] is called.
    ///
    /// [`settle`]: #method.settle
    /// [`advance_clock`]: #method.advance_clock
    pub fn new(design: &'d Design, config: SimConfig) -> Simulation<'d> {
        let slot_count = design.slots.len();
        let masks = design
            .slots
            .values()
            .map(|slot| mask(slot.bit_width))
            .collect();
        let taken = design
            .instances
            .iter()
            .map(|node| vec![None; design.module_of(node).branches.len()])
            .collect();
        let versions = design
            .instances
            .iter()
            .map(|node| vec![None; design.module_of(node).versions.len()])
            .collect();
        let black_boxes = design
            .instances
            .iter()
            .map(|node| design.black_boxes.get(&node.module).map(|factory| factory()))
            .collect();

        debug!(
            "Created simulation \"{}\" of design \"{}\" ({} slot(s))",
            config.name, design.top, slot_count
        );

        let mut sim = Simulation {
            design,
            config,

            state: SimState::Idle,
            step: 0,
            passes: 0,

            current: vec![0; slot_count],
            next: vec![0; slot_count],
            written: vec![false; slot_count],
            masks,
            taken,
            versions,
            black_boxes,

            trace: None,
        };
        sim.load_reset_values();
        sim
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn state(&self) -> SimState {
        self.state
    }

    /// Number of completed clock steps since creation or the last reset.
    pub fn step(&self) -> u64 {
        self.step
    }

    /// Number of passes the latest evaluation phase needed to reach its fixed point. For [`advance_clock`], this is the phase before registers latch.
    ///
    /// [`advance_clock`]: #method.advance_clock
    pub fn passes(&self) -> usize {
        self.passes
    }

    /// Returns the run to its initial state: registers take their reset values, everything else is cleared and black-box models are reset. Clears an abort.
    pub fn reset(&mut self) {
        self.load_reset_values();
        for model in self.black_boxes.iter_mut().flatten() {
            model.reset();
        }
        self.step = 0;
        self.passes = 0;
        self.state = SimState::Idle;
        debug!("Reset simulation \"{}\"", self.config.name);
    }

    /// Drives the top-level input at `path` with `value`. The new value is visible to the next evaluation.
    pub fn set(&mut self, path: &str, value: u128) -> Result<(), SimulationError> {
        self.check_live()?;
        let design = self.design;
        let slot = self.lookup(path)?;
        let (_, info) = design
            .slots
            .get_index(slot)
            .ok_or_else(|| self.unknown_signal(path))?;
        if info.class != SlotClass::Input {
            return Err(SimulationError::NotAnInput {
                run: self.config.name.clone(),
                path: path.into(),
            });
        }
        if value & !self.masks[slot] != 0 {
            return Err(SimulationError::ValueOutOfRange {
                run: self.config.name.clone(),
                path: path.into(),
                value,
                bit_width: info.bit_width,
            });
        }
        if !info.kind.is_valid(value) {
            return Err(SimulationError::InvalidValue {
                run: self.config.name.clone(),
                path: path.into(),
                value,
                kind: info.kind.clone(),
            });
        }
        self.current[slot] = value;
        self.next[slot] = value;
        Ok(())
    }

    /// Returns the current value of the signal at `path`, relative to the top-level instance (eg. `count` or `child/count`).
    pub fn get(&self, path: &str) -> Result<u128, SimulationError> {
        self.check_live()?;
        Ok(self.current[self.lookup(path)?])
    }

    /// Returns the next value of the signal at `path`, as computed by the latest pass.
    pub fn get_next(&self, path: &str) -> Result<u128, SimulationError> {
        self.check_live()?;
        Ok(self.next[self.lookup(path)?])
    }

    /// Evaluates combinational logic until it settles, without a clock event.
    pub fn settle(&mut self) -> Result<(), SimulationError> {
        self.run(|sim| {
            sim.converge()?;
            sim.state = SimState::Settled;
            Ok(())
        })
    }

    /// Performs one clock step: settles combinational logic, latches every register's next value, clocks black-box models, then settles again so outputs reflect the new register values.
    pub fn advance_clock(&mut self) -> Result<(), SimulationError> {
        self.run(|sim| {
            sim.converge()?;
            let passes = sim.passes;
            sim.state = SimState::Settled;

            for (slot, info) in sim.design.slots.values().enumerate() {
                if let SlotClass::Register { .. } = info.class {
                    sim.current[slot] = sim.next[slot];
                }
            }
            for model in sim.black_boxes.iter_mut().flatten() {
                model.clock();
            }
            sim.step += 1;

            sim.converge()?;
            sim.passes = passes;
            sim.write_trace()?;
            sim.state = SimState::Idle;
            Ok(())
        })
    }

    /// Attaches `trace`, declares the instance hierarchy to it and records the current values.
    pub fn attach_trace(&mut self, trace: impl Trace + 'd) -> Result<(), SimulationError> {
        let mut trace: Box<dyn Trace + 'd> = Box::new(trace);
        let mut signals = Vec::new();
        self.declare_trace(trace.as_mut(), 0, &mut signals)?;

        trace.update_time_stamp(self.step)?;
        for &(slot, id, type_) in signals.iter() {
            trace.update_signal(id, TraceValue::new(type_, self.current[slot]))?;
        }

        self.trace = Some(AttachedTrace { trace, signals });
        Ok(())
    }

    fn declare_trace(
        &self,
        trace: &mut (dyn Trace + 'd),
        instance: usize,
        signals: &mut Vec<(usize, usize, TraceValueType)>,
    ) -> io::Result<()> {
        let node = &self.design.instances[instance];
        let name = node.path.rsplit('/').next().unwrap_or(node.path.as_str());
        trace.push_module(name)?;

        let graph = self.design.module_of(node);
        for (decl, &slot) in graph.signals.iter().zip(node.signal_slots.iter()) {
            let type_ = TraceValueType::from_bit_width(decl.bit_width());
            let id = trace.add_signal(&decl.name, decl.bit_width(), type_)?;
            signals.push((slot, id, type_));
        }
        for &child in node.children.iter() {
            self.declare_trace(trace, child, signals)?;
        }

        trace.pop_module()
    }

    fn write_trace(&mut self) -> io::Result<()> {
        if let Some(attached) = self.trace.as_mut() {
            attached.trace.update_time_stamp(self.step)?;
            for &(slot, id, type_) in attached.signals.iter() {
                attached
                    .trace
                    .update_signal(id, TraceValue::new(type_, self.current[slot]))?;
            }
        }
        Ok(())
    }

    fn load_reset_values(&mut self) {
        for (slot, info) in self.design.slots.values().enumerate() {
            let value = match info.class {
                SlotClass::Register { reset } => reset,
                SlotClass::Constant { value } => value,
                _ => 0,
            };
            self.current[slot] = value;
            self.next[slot] = value;
            self.written[slot] = false;
        }
    }

    fn run(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<(), SimulationError>,
    ) -> Result<(), SimulationError> {
        self.check_live()?;
        let result = f(self);
        if let Err(error) = &result {
            debug!("Simulation \"{}\" aborted: {}", self.config.name, error);
            self.state = SimState::Aborted;
        }
        result
    }

    fn check_live(&self) -> Result<(), SimulationError> {
        if self.state == SimState::Aborted {
            return Err(SimulationError::Aborted {
                run: self.config.name.clone(),
            });
        }
        Ok(())
    }

    fn lookup(&self, path: &str) -> Result<usize, SimulationError> {
        self.design
            .slot_index(&format!("{}/{}", self.design.top, path))
            .ok_or_else(|| self.unknown_signal(path))
    }

    fn unknown_signal(&self, path: &str) -> SimulationError {
        SimulationError::UnknownSignal {
            run: self.config.name.clone(),
            path: path.into(),
        }
    }

    fn converge(&mut self) -> Result<(), SimulationError> {
        self.state = SimState::Evaluating;
        for pass in 1..=self.config.max_iterations {
            let changed = self.pass();
            trace!(
                "Simulation \"{}\" step {} pass {}: {}",
                self.config.name,
                self.step,
                pass,
                if changed { "changed" } else { "stable" }
            );
            if !changed || self.design.schedule.acyclic {
                self.passes = pass;
                return self.check_divergence();
            }
        }
        Err(SimulationError::ConvergenceTimeout {
            run: self.config.name.clone(),
            step: self.step,
            iterations: self.config.max_iterations,
        })
    }

    // One pass over the schedule; returns whether a combinational value changed
    fn pass(&mut self) -> bool {
        let design = self.design;

        for (slot, info) in design.slots.values().enumerate() {
            if let SlotClass::Register { .. } = info.class {
                self.next[slot] = self.current[slot];
            }
        }
        self.written.iter_mut().for_each(|written| *written = false);
        self.versions
            .iter_mut()
            .flatten()
            .for_each(|version| *version = None);

        let mut changed = false;
        for unit in design.schedule.units.iter() {
            match *unit {
                Unit::Branch { instance, branch } => {
                    let node = &design.instances[instance];
                    let point = &design.module_of(node).branches[branch];
                    let arm = Evaluator {
                        design,
                        node,
                        current: &self.current,
                        taken: &self.taken[instance],
                        versions: &mut self.versions[instance],
                    }
                    .take(point);
                    self.taken[instance][branch] = arm;
                }
                Unit::Target { instance, target } => {
                    let node = &design.instances[instance];
                    let (signal, assignments) = match design.module_of(node).assignments.get_index(target) {
                        Some(entry) => entry,
                        None => continue,
                    };
                    let mut evaluator = Evaluator {
                        design,
                        node,
                        current: &self.current,
                        taken: &self.taken[instance],
                        versions: &mut self.versions[instance],
                    };
                    // Last write wins
                    let assignment = assignments
                        .iter()
                        .rev()
                        .find(|assignment| evaluator.guard_holds(&assignment.guard));
                    if let Some(assignment) = assignment {
                        let value = evaluator.eval(&assignment.expr);
                        changed |= self.write(design.resolve(node, *signal), value);
                    }
                }
                Unit::BlackBox { instance } => {
                    let node = &design.instances[instance];
                    if let Some(model) = self.black_boxes[instance].as_mut() {
                        let mut io = BlackBoxIo {
                            module: design.module_of(node),
                            slots: &node.signal_slots,
                            current: &self.current,
                            next: &mut self.next,
                            written: &mut self.written,
                        };
                        model.update(&mut io);
                    }
                    for &slot in node.signal_slots.iter() {
                        if self.written[slot] {
                            changed |= self.commit(slot);
                        }
                    }
                }
                Unit::Wire(index) => {
                    let wire = &design.wires[index];
                    changed |= self.write(wire.sink, self.current[wire.driver]);
                }
            }
        }
        changed
    }

    fn write(&mut self, slot: usize, value: u128) -> bool {
        self.next[slot] = value & self.masks[slot];
        self.written[slot] = true;
        self.commit(slot)
    }

    // Combinational and local slots take their next value right away; registers wait for the clock
    fn commit(&mut self, slot: usize) -> bool {
        match self.design.slots.get_index(slot).map(|(_, info)| &info.class) {
            Some(SlotClass::Combinational) => {
                let changed = self.current[slot] != self.next[slot];
                self.current[slot] = self.next[slot];
                changed
            }
            Some(SlotClass::Local) => {
                self.current[slot] = self.next[slot];
                false
            }
            _ => false,
        }
    }

    fn check_divergence(&self) -> Result<(), SimulationError> {
        for (slot, (path, info)) in self.design.slots.iter().enumerate() {
            if info.class == SlotClass::Combinational && info.driven && !self.written[slot] {
                return Err(SimulationError::CombinationalDivergence {
                    run: self.config.name.clone(),
                    step: self.step,
                    signal: path.clone(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::elaborate::elaborate;
    use crate::graph::{Context, Direction, EnumBuilder};

    #[test]
    fn config_builder() {
        let config = SimConfig::default().name("fast").max_iterations(4);

        assert_eq!(config.name, "fast");
        assert_eq!(config.max_iterations, 4);
        assert_eq!(SimConfig::default().max_iterations, 32);
    }

    #[test]
    fn lookup_errors() {
        let c = Context::new();

        let m = c.module("A");
        let i = m.input("i", 4);
        let o = m.output("o", 4);
        m.update(|b| b.assign(o, i.current()));

        let design = elaborate(m).unwrap();
        let mut sim = Simulation::new(&design, SimConfig::default().name("lookups"));

        assert!(matches!(
            sim.get("nope"),
            Err(SimulationError::UnknownSignal { ref path, .. }) if path == "nope"
        ));
        assert!(matches!(sim.set("o", 1), Err(SimulationError::NotAnInput { .. })));
        assert!(matches!(
            sim.set("i", 16),
            Err(SimulationError::ValueOutOfRange { bit_width: 4, .. })
        ));

        sim.set("i", 9).unwrap();
        sim.settle().unwrap();
        assert_eq!(sim.get("o").unwrap(), 9);
        assert_eq!(sim.state(), SimState::Settled);
    }

    #[test]
    fn combinational_loop_aborts_run() {
        let c = Context::new();

        let m = c.module("Loop");
        let o = m.output("o", 1);
        m.update(|b| b.assign(o, !o.current()));

        let design = elaborate(m).unwrap();
        let mut sim = Simulation::new(&design, SimConfig::default().name("osc").max_iterations(8));

        match sim.advance_clock() {
            Err(SimulationError::ConvergenceTimeout {
                run,
                step,
                iterations,
            }) => {
                assert_eq!(run, "osc");
                assert_eq!(step, 0);
                assert_eq!(iterations, 8);
            }
            _ => panic!("Expected a convergence timeout"),
        }
        assert_eq!(sim.state(), SimState::Aborted);
        assert!(matches!(sim.get("o"), Err(SimulationError::Aborted { .. })));
        assert!(matches!(sim.advance_clock(), Err(SimulationError::Aborted { .. })));

        sim.reset();
        assert_eq!(sim.state(), SimState::Idle);
        assert_eq!(sim.get("o").unwrap(), 0);
    }

    #[test]
    fn deep_chains_settle_in_one_pass() {
        let c = Context::new();

        let m = c.module("Chain");
        let i = m.input("i", 8);
        let o = m.output("o", 8);
        let wires = (0..40)
            .map(|index| m.wire(format!("w{}", index), 8))
            .collect::<Vec<_>>();
        m.update(|b| {
            // Assigned from the end of the chain backwards
            b.assign(o, wires[39].current() + m.lit(1u32, 8));
            for index in (1..40).rev() {
                b.assign(wires[index], wires[index - 1].current() + m.lit(1u32, 8));
            }
            b.assign(wires[0], i.current());
        });

        let design = elaborate(m).unwrap();
        let mut sim = Simulation::new(&design, SimConfig::default().max_iterations(2));

        sim.set("i", 1).unwrap();
        sim.settle().unwrap();
        assert_eq!(sim.get("o").unwrap(), 41);
        assert_eq!(sim.passes(), 1);

        sim.set("i", 250).unwrap();
        sim.settle().unwrap();
        assert_eq!(sim.get("o").unwrap(), 34);
    }

    #[test]
    fn set_rejects_undeclared_variants() {
        let c = Context::new();

        let state = EnumBuilder::new("State")
            .variant("Idle")
            .variant("Busy")
            .variant("Done")
            .build();
        let m = c.module("A");
        let s = m.signal("s", Direction::Input, &state);
        let o = m.output("o", 2);
        m.update(|b| b.assign(o, s.current().discriminant()));

        let design = elaborate(m).unwrap();
        let mut sim = Simulation::new(&design, SimConfig::default().name("enums"));

        assert!(matches!(
            sim.set("s", 3),
            Err(SimulationError::InvalidValue { value: 3, ref path, .. }) if path == "s"
        ));
        assert_eq!(sim.state(), SimState::Idle);

        sim.set("s", 2).unwrap();
        sim.settle().unwrap();
        assert_eq!(sim.get("o").unwrap(), 2);
    }

    #[test]
    fn reset_restores_registers() {
        let c = Context::new();

        let m = c.module("A");
        let r = m.reg("r", 4);
        r.reset_value(5u32);
        let o = m.output("o", 4);
        m.update(|b| {
            b.assign(r, r.current() + m.lit(1u32, 4));
            b.assign(o, r.current());
        });

        let design = elaborate(m).unwrap();
        let mut sim = Simulation::new(&design, SimConfig::default());

        assert_eq!(sim.get("r").unwrap(), 5);
        sim.advance_clock().unwrap();
        sim.advance_clock().unwrap();
        assert_eq!(sim.get("o").unwrap(), 7);
        assert_eq!(sim.get_next("r").unwrap(), 8);
        assert_eq!(sim.step(), 2);

        sim.reset();
        assert_eq!(sim.get("r").unwrap(), 5);
        assert_eq!(sim.step(), 0);
    }
}
