//! Hierarchy composition: turns a top-level [`Module`] into a self-contained, simulatable [`Design`].
//!
//! [`Module`]: ../struct.Module.html

mod schedule;

pub use schedule::{Schedule, Unit};

use crate::code_writer::CodeWriter;
use crate::error::{Error, TranslationError};
use crate::graph::{Direction, Kind, Module};
use crate::ir::*;
use crate::sim::BlackBoxFactory;
use crate::translate::translate;
use crate::validation::validate;

use indexmap::IndexMap;
use log::debug;
use serde::Serialize;

use std::io;
use std::ptr;

/// An elaborated design: every reachable module definition translated and validated once, and the instance hierarchy laid out with one storage slot per declared signal.
///
/// A `Design` owns all of its data and doesn't borrow from the [`Context`] it was elaborated from, so it can be shared between threads and simulated by several independent runs at once.
///
/// [`Context`]: ./struct.Context.html
#[derive(Serialize)]
pub struct Design {
    pub top: String,
    /// Module definitions in the order they were first reached.
    pub modules: IndexMap<String, ModuleGraph>,
    /// Instances in hierarchy pre-order; the top-level instance comes first.
    pub instances: Vec<InstanceNode>,
    /// Storage slots keyed by hierarchical path, eg. `Top/child/count` for a top-level module called `Top`.
    pub slots: IndexMap<String, Slot>,
    pub wires: Vec<SlotWire>,
    pub schedule: Schedule,

    #[serde(skip)]
    pub(crate) black_boxes: IndexMap<String, BlackBoxFactory>,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct InstanceNode {
    pub path: String,
    pub module: String,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    /// Slot of each signal of the module, indexed like the module's signal declarations.
    pub signal_slots: Vec<usize>,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub enum SlotClass {
    Combinational,
    Register { reset: u128 },
    Constant { value: u128 },
    /// An input of the top-level instance, driven by the simulation harness.
    Input,
    Local,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Slot {
    pub bit_width: u32,
    pub kind: Kind,
    pub class: SlotClass,
    /// Whether anything in the design drives this slot: an assignment, a join wire or a black-box model.
    pub driven: bool,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub struct SlotWire {
    pub driver: usize,
    pub sink: usize,
}

/// Elaborates the hierarchy rooted at `top`.
///
/// # Examples
///
/// ```
/// use kumo::*;
///
/// let c = Context::new();
///
/// let inner = c.module("Inner");
/// let i = inner.input("i", 4);
/// let o = inner.output("o", 4);
/// inner.update(|b| b.assign(o, !i.current()));
///
/// let top = c.module("Top");
/// let x = top.input("x", 4);
/// let y = top.output("y", 4);
/// let child = top.instance("child", "Inner");
/// top.update(|b| {
///     b.assign(child.port("i"), x.current());
///     b.assign(y, child.port("o").current());
/// });
///
/// let design = elaborate(top).unwrap();
/// assert_eq!(design.instances[1].path, "Top/child");
/// assert!(design.slots.contains_key("Top/child/o"));
/// ```
pub fn elaborate<'a>(top: &'a Module<'a>) -> Result<Design, Error> {
    check_recursion(top, &ModuleStackFrame { parent: None, module: top, instance: "" })?;

    let mut modules = IndexMap::new();
    let mut black_boxes = IndexMap::new();
    collect_definitions(top, &mut modules, &mut black_boxes)?;

    let mut design = Design {
        top: top.name.clone(),
        modules,
        instances: Vec::new(),
        slots: IndexMap::new(),
        wires: Vec::new(),
        schedule: Schedule::default(),

        black_boxes,
    };
    design.instantiate(top.name.clone(), &top.name, None);
    design.connect();
    design.schedule = schedule::schedule(&design);

    debug!(
        "Elaborated design \"{}\": {} module(s), {} instance(s), {} slot(s), {} wire(s), {} scheduled unit(s){}",
        design.top,
        design.modules.len(),
        design.instances.len(),
        design.slots.len(),
        design.wires.len(),
        design.schedule.units.len(),
        if design.schedule.acyclic {
            ""
        } else {
            " with a combinational cycle"
        }
    );

    Ok(design)
}

struct ModuleStackFrame<'graph, 'frame> {
    parent: Option<&'frame ModuleStackFrame<'graph, 'frame>>,
    module: &'graph Module<'graph>,
    instance: &'graph str,
}

fn check_recursion<'graph, 'frame>(
    m: &'graph Module<'graph>,
    module_stack_frame: &ModuleStackFrame<'graph, 'frame>,
) -> Result<(), TranslationError> {
    for &instance in m.instances.borrow().iter() {
        let instantiated_module = instance.instantiated_module;

        let mut frame = module_stack_frame;
        loop {
            if ptr::eq(instantiated_module, frame.module) {
                let mut path = vec![instance.name.as_str()];
                let mut outer = Some(module_stack_frame);
                while let Some(f) = outer {
                    if ptr::eq(f.module, instantiated_module) {
                        break;
                    }
                    path.push(f.instance);
                    outer = f.parent;
                }
                path.reverse();
                return Err(TranslationError::RecursiveInstantiation {
                    module: instantiated_module.name.clone(),
                    path: path.join("/"),
                });
            }

            if let Some(parent) = frame.parent {
                frame = parent;
            } else {
                break;
            }
        }

        check_recursion(
            instantiated_module,
            &ModuleStackFrame {
                parent: Some(module_stack_frame),
                module: instantiated_module,
                instance: &instance.name,
            },
        )?;
    }
    Ok(())
}

fn collect_definitions<'a>(
    m: &'a Module<'a>,
    modules: &mut IndexMap<String, ModuleGraph>,
    black_boxes: &mut IndexMap<String, BlackBoxFactory>,
) -> Result<(), TranslationError> {
    if modules.contains_key(&m.name) {
        return Ok(());
    }

    let graph = translate(m)?;
    validate(&graph)?;
    debug!("Validated module \"{}\"", m.name);
    modules.insert(m.name.clone(), graph);
    if let Some(factory) = &m.black_box {
        black_boxes.insert(m.name.clone(), factory.clone());
    }

    for instance in m.instances.borrow().iter() {
        collect_definitions(instance.instantiated_module, modules, black_boxes)?;
    }
    Ok(())
}

impl Design {
    /// Returns the definition of the module instantiated by `node`.
    pub fn module_of(&self, node: &InstanceNode) -> &ModuleGraph {
        &self.modules[&node.module]
    }

    /// Returns the slot index of `signal` as seen from instance `node`.
    pub fn resolve(&self, node: &InstanceNode, signal: SignalRef) -> usize {
        match signal {
            SignalRef::Own(id) => node.signal_slots[id.0],
            SignalRef::Port(instance, id) => {
                self.instances[node.children[instance.0]].signal_slots[id.0]
            }
        }
    }

    /// Returns the index of the slot at `path`, eg. `Top/child/count`.
    pub fn slot_index(&self, path: &str) -> Option<usize> {
        self.slots.get_index_of(path)
    }

    /// Returns the hierarchical path of the slot at `index`.
    pub fn slot_path(&self, index: usize) -> &str {
        self.slots
            .get_index(index)
            .map_or("", |(path, _)| path.as_str())
    }

    fn instantiate(&mut self, path: String, module: &str, parent: Option<usize>) -> usize {
        let index = self.instances.len();
        let graph = &self.modules[module];
        let is_top = parent.is_none();

        let mut signal_slots = Vec::with_capacity(graph.signals.len());
        let mut slots = Vec::with_capacity(graph.signals.len());
        for (signal, decl) in graph.signals.iter().enumerate() {
            let class = match (&decl.class, decl.direction) {
                (SignalClass::Register { reset }, _) => SlotClass::Register { reset: *reset },
                (SignalClass::Constant { value }, _) => SlotClass::Constant { value: *value },
                (SignalClass::Local, _) => SlotClass::Local,
                (SignalClass::Wire, Direction::Input) if is_top => SlotClass::Input,
                (SignalClass::Wire, _) => SlotClass::Combinational,
            };
            let driven = match decl.direction {
                Direction::Output => {
                    graph.is_black_box
                        || graph.assignments.contains_key(&SignalRef::Own(SignalId(signal)))
                }
                // Resolved against the parent once the whole hierarchy exists
                Direction::Input => is_top,
                _ => true,
            };
            slots.push((
                format!("{}/{}", path, decl.name),
                Slot {
                    bit_width: decl.bit_width(),
                    kind: decl.kind.clone(),
                    class,
                    driven,
                },
            ));
        }
        for (slot_path, slot) in slots {
            let (slot_index, _) = self.slots.insert_full(slot_path, slot);
            signal_slots.push(slot_index);
        }

        let children = graph
            .instances
            .iter()
            .map(|instance| (instance.name.clone(), instance.module.clone()))
            .collect::<Vec<_>>();
        self.instances.push(InstanceNode {
            path: path.clone(),
            module: module.to_string(),
            parent,
            children: Vec::new(),
            signal_slots,
        });

        for (name, child_module) in children {
            let child = self.instantiate(format!("{}/{}", path, name), &child_module, Some(index));
            self.instances[index].children.push(child);
        }

        index
    }

    // Join wires become slot-to-slot wires, and child inputs learn whether their parent drives them
    fn connect(&mut self) {
        let mut wires = Vec::new();
        let mut driven = Vec::new();
        for node in self.instances.iter() {
            let graph = self.module_of(node);
            for wire in graph.wires() {
                wires.push(SlotWire {
                    driver: self.resolve(node, wire.driver),
                    sink: self.resolve(node, wire.sink),
                });
            }
            for target in graph.assignments.keys() {
                if let SignalRef::Port(..) = target {
                    driven.push(self.resolve(node, *target));
                }
            }
        }
        driven.extend(wires.iter().map(|wire| wire.sink));
        for index in driven {
            if let Some((_, slot)) = self.slots.get_index_mut(index) {
                slot.driven = true;
            }
        }
        self.wires = wires;
    }

    /// Writes a human-readable netlist: every module definition with its guarded assignments, then the instance hierarchy and its wiring.
    pub fn write_netlist<W: io::Write>(&self, w: &mut W) -> Result<(), Error> {
        let mut w = CodeWriter::new(w);

        w.append_line(&format!("design {}", self.top))?;
        w.append_newline()?;

        for graph in self.modules.values() {
            let header = if graph.is_black_box {
                format!("black box {}:", graph.name)
            } else {
                format!("module {}:", graph.name)
            };
            w.section(&header, |w| {
                w.section("signals:", |w| {
                    for (index, decl) in graph.signals.iter().enumerate() {
                        let class = match &decl.class {
                            SignalClass::Wire => String::new(),
                            SignalClass::Register { reset } => format!(" register (reset {:#x})", reset),
                            SignalClass::Constant { value } => format!(" constant {:#x}", value),
                            SignalClass::Local => " local".to_string(),
                        };
                        w.append_line(&format!(
                            "s{} {}: {} {}{}",
                            index, decl.name, decl.direction, decl.kind, class
                        ))?;
                    }
                    Ok(())
                })?;
                if !graph.instances.is_empty() {
                    w.section("instances:", |w| {
                        for (index, instance) in graph.instances.iter().enumerate() {
                            w.append_line(&format!("i{} {}: {}", index, instance.name, instance.module))?;
                        }
                        Ok(())
                    })?;
                }
                if !graph.branches.is_empty() {
                    w.section("branches:", |w| {
                        for (index, branch) in graph.branches.iter().enumerate() {
                            let arms = branch
                                .arms
                                .iter()
                                .enumerate()
                                .map(|(arm, a)| match &a.test {
                                    ArmTest::When(cond) => format!("{}={} if {}", arm, a.label, cond),
                                    ArmTest::Equals { value, mask } => {
                                        format!("{}={} if & {:#x} == {:#x}", arm, a.label, mask, value)
                                    }
                                    ArmTest::Otherwise => format!("{}={}", arm, a.label),
                                })
                                .collect::<Vec<_>>();
                            let scrutinee = branch
                                .scrutinee
                                .as_ref()
                                .map_or(String::new(), |s| format!(" on {}", s));
                            w.append_line(&format!(
                                "b{} at {}{}{}: {}",
                                index,
                                branch.location,
                                guard_suffix(&branch.guard),
                                scrutinee,
                                arms.join(", ")
                            ))?;
                        }
                        Ok(())
                    })?;
                }
                if !graph.assignments.is_empty() {
                    w.section("assignments:", |w| {
                        for (target, assignments) in graph.assignments.iter() {
                            w.section(&format!("{}:", graph.name_of(*target)), |w| {
                                for assignment in assignments.iter() {
                                    w.append_line(&format!(
                                        "{} at {}{}",
                                        assignment.expr,
                                        assignment.location,
                                        guard_suffix(&assignment.guard)
                                    ))?;
                                }
                                Ok(())
                            })?;
                        }
                        Ok(())
                    })?;
                }
                if !graph.versions.is_empty() {
                    w.section("versions:", |w| {
                        for (index, version) in graph.versions.iter().enumerate() {
                            w.append_line(&format!(
                                "v{} = {} after {} assignment(s)",
                                index,
                                graph.name_of(version.signal),
                                version.preceding
                            ))?;
                        }
                        Ok(())
                    })?;
                }
                if !graph.joins.is_empty() {
                    w.section("joins:", |w| {
                        for join in graph.joins.iter() {
                            w.append_line(&format!("{} <-> {} at {}", join.a, join.b, join.location))?;
                        }
                        Ok(())
                    })?;
                }
                Ok(())
            })?;
            w.append_newline()?;
        }

        w.section("instances:", |w| {
            for node in self.instances.iter() {
                w.append_line(&format!("{}: {}", node.path, node.module))?;
            }
            Ok(())
        })?;
        if !self.wires.is_empty() {
            w.section("wires:", |w| {
                for wire in self.wires.iter() {
                    w.append_line(&format!(
                        "{} -> {}",
                        self.slot_path(wire.driver),
                        self.slot_path(wire.sink)
                    ))?;
                }
                Ok(())
            })?;
        }

        Ok(())
    }
}

fn guard_suffix(guard: &Guard) -> String {
    if guard.is_unconditional() {
        return String::new();
    }
    let conditions = guard
        .0
        .iter()
        .map(|condition| format!("b{}.{}", condition.branch.0, condition.arm))
        .collect::<Vec<_>>();
    format!(" when {}", conditions.join(" && "))
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::graph::Context;

    #[test]
    fn hierarchy_is_laid_out_in_pre_order() {
        let c = Context::new();

        let leaf = c.module("Leaf");
        let i = leaf.input("i", 1);
        let o = leaf.output("o", 1);
        leaf.update(|b| b.assign(o, i.current()));

        let mid = c.module("Mid");
        let mi = mid.input("i", 1);
        let mo = mid.output("o", 1);
        let l0 = mid.instance("l0", "Leaf");
        let l1 = mid.instance("l1", "Leaf");
        mid.update(|b| {
            b.assign(l0.port("i"), mi.current());
            b.assign(l1.port("i"), l0.port("o").current());
            b.assign(mo, l1.port("o").current());
        });

        let top = c.module("Top");
        let ti = top.input("i", 1);
        let to = top.output("o", 1);
        let m = top.instance("mid", "Mid");
        top.update(|b| {
            b.assign(m.port("i"), ti.current());
            b.assign(to, m.port("o").current());
        });

        let design = elaborate(top).unwrap();

        let paths = design
            .instances
            .iter()
            .map(|node| node.path.as_str())
            .collect::<Vec<_>>();
        assert_eq!(paths, vec!["Top", "Top/mid", "Top/mid/l0", "Top/mid/l1"]);
        assert_eq!(design.instances[1].children, vec![2, 3]);
        assert_eq!(design.instances[3].parent, Some(1));
        assert_eq!(design.modules.len(), 3);

        assert_eq!(design.slots["Top/i"].class, SlotClass::Input);
        assert_eq!(design.slots["Top/mid/i"].class, SlotClass::Combinational);
        assert!(design.slots.values().all(|slot| slot.driven));

        let mid_node = &design.instances[1];
        let l1_i = design.resolve(mid_node, SignalRef::Port(InstanceId(1), SignalId(0)));
        assert_eq!(design.slot_path(l1_i), "Top/mid/l1/i");
    }

    #[test]
    fn recursive_instantiation() {
        let c = Context::new();

        let a = c.module("A");
        let b = c.module("B");
        let _ = a.instance("b", "B");
        let _ = b.instance("a", "A");

        match elaborate(a) {
            Err(Error::Translation(TranslationError::RecursiveInstantiation { module, path })) => {
                assert_eq!(module, "A");
                assert_eq!(path, "b/a");
            }
            _ => panic!("Expected a recursive instantiation"),
        }
    }

    #[test]
    fn direct_recursion() {
        let c = Context::new();

        let a = c.module("A");
        let _ = a.instance("me", "A");

        assert!(matches!(
            elaborate(a),
            Err(Error::Translation(TranslationError::RecursiveInstantiation { .. }))
        ));
    }

    #[test]
    fn validation_errors_surface() {
        let c = Context::new();

        let m = c.module("A");
        let _ = m.output("o", 1);

        assert!(matches!(
            elaborate(m),
            Err(Error::Translation(TranslationError::LatchInferred { .. }))
        ));
    }

    #[test]
    fn netlist_dump() {
        let c = Context::new();

        let m = c.module("Counter");
        let en = m.input("en", 1);
        let r = m.reg("r", 2);
        let o = m.output("o", 2);
        m.update(|b| {
            b.if_(en.current(), |b| b.assign(r, r.current() + m.lit(1u32, 2)));
            b.assign(o, r.current());
        });

        let design = elaborate(m).unwrap();
        let mut buf = Vec::new();
        design.write_netlist(&mut buf).unwrap();
        let netlist = String::from_utf8(buf).unwrap();

        assert!(netlist.starts_with("design Counter\n"));
        assert!(netlist.contains("    signals:\n        s0 en: input 1 bit(s)\n        s1 r: internal 2 bit(s) register (reset 0x0)\n"));
        assert!(netlist.contains("        b0 at update/0: 0=then if s0\n"));
        assert!(netlist.contains("        r:\n            (s1 + 2'h1) at update/0/then/0 when b0.0\n"));
        assert!(netlist.contains("instances:\n    Counter: Counter\n"));
    }

    #[test]
    fn root_path_follows_top_module_name() {
        let c = Context::new();

        let leaf = c.module("Leaf");
        let i = leaf.input("i", 1);
        let o = leaf.output("o", 1);
        leaf.update(|b| b.assign(o, i.current()));

        let cpu = c.module("Cpu");
        let x = cpu.input("x", 1);
        let y = cpu.output("y", 1);
        let l = cpu.instance("leaf", "Leaf");
        cpu.update(|b| {
            b.assign(l.port("i"), x.current());
            b.assign(y, l.port("o").current());
        });

        let design = elaborate(cpu).unwrap();

        assert_eq!(design.instances[0].path, "Cpu");
        assert_eq!(design.instances[1].path, "Cpu/leaf");
        assert!(design.slots.keys().all(|path| path.starts_with("Cpu/")));
        assert_eq!(design.slot_index("top/x"), None);
    }

    #[test]
    fn netlist_lists_local_versions() {
        let c = Context::new();

        let m = c.module("A");
        let i = m.input("i", 4);
        let acc = m.local("acc", 4);
        let o = m.output("o", 4);
        m.update(|b| {
            b.assign(acc, i.current());
            b.assign(acc, acc.current() + acc.current());
            b.assign(o, acc.current());
        });

        let design = elaborate(m).unwrap();
        let mut buf = Vec::new();
        design.write_netlist(&mut buf).unwrap();
        let netlist = String::from_utf8(buf).unwrap();

        assert!(netlist.contains("            (v0 + v0) at update/1\n"));
        assert!(netlist.contains("    versions:\n        v0 = acc after 1 assignment(s)\n        v1 = acc after 2 assignment(s)\n"));
        assert_eq!(design.slots["A/acc"].kind, Kind::Bits(4));
    }

    #[test]
    fn module_graph_export() {
        let c = Context::new();

        let m = c.module("Counter");
        let en = m.input("en", 1);
        let r = m.reg("r", 2);
        let o = m.output("o", 2);
        m.update(|b| {
            b.if_(en.current(), |b| b.assign(r, r.current() + m.lit(1u32, 2)));
            b.assign(o, r.current());
        });

        let design = elaborate(m).unwrap();
        let json = serde_json::to_value(&design.modules["Counter"]).unwrap();

        assert_eq!(json["signals"][1]["class"], serde_json::json!({ "Register": { "reset": 0 } }));
        // Assignments export as (target, list) pairs in first-write order
        assert_eq!(json["assignments"][0][0], serde_json::json!({ "Own": 1 }));
        assert_eq!(json["assignments"][1][0], serde_json::json!({ "Own": 2 }));
        assert_eq!(json["branches"][0]["arms"][0]["label"], "then");
    }
}
