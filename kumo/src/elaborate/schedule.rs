use super::{Design, SlotClass};

use crate::graph::Direction;
use crate::ir::*;

use serde::Serialize;

use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap, HashMap};

/// One piece of work of an evaluation pass.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub enum Unit {
    /// Decide which arm a branch point of an instance takes.
    Branch { instance: usize, branch: usize },
    /// Compute one assignment target of an instance, indexed like the module's assignment lists.
    Target { instance: usize, target: usize },
    /// Run a black-box model.
    BlackBox { instance: usize },
    /// Copy a join wire's driver to its sink.
    Wire(usize),
}

/// The order in which a pass evaluates the design.
///
/// Units come in dependency order: every unit runs after the units producing the combinational values and branch decisions it reads. Units caught in a combinational cycle can't be ordered; they follow in hierarchy order, and passes repeat until the cycle settles.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct Schedule {
    pub units: Vec<Unit>,
    /// Whether every unit could be ordered, so one pass reaches the fixed point.
    pub acyclic: bool,
}

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
enum Need {
    Slot(usize),
    Branch(usize, usize),
}

// Signals and branch decisions something reads, as seen from inside one module definition
#[derive(Clone, Debug, Default)]
struct Reads {
    signals: BTreeSet<SignalRef>,
    branches: BTreeSet<BranchId>,
}

impl Reads {
    fn guard(&mut self, guard: &Guard) {
        self.branches
            .extend(guard.0.iter().map(|condition| condition.branch));
    }

    fn merge(&mut self, other: &Reads) {
        self.signals.extend(other.signals.iter().copied());
        self.branches.extend(other.branches.iter().copied());
    }

    fn expr(&mut self, expr: &Expr, versions: &[Reads]) {
        match expr {
            Expr::Const { .. } | Expr::Undefined { .. } => (),
            Expr::Signal { signal, .. } => {
                self.signals.insert(*signal);
            }
            Expr::Local { version, .. } => {
                if let Some(reads) = versions.get(version.0) {
                    self.merge(reads);
                }
            }
            Expr::Not { source, .. } | Expr::Slice { source, .. } | Expr::Resize { source, .. } => {
                self.expr(source, versions)
            }
            Expr::Binary { lhs, rhs, .. } | Expr::Concat { lhs, rhs, .. } => {
                self.expr(lhs, versions);
                self.expr(rhs, versions);
            }
            Expr::Mux {
                cond,
                when_true,
                when_false,
            } => {
                self.expr(cond, versions);
                self.expr(when_true, versions);
                self.expr(when_false, versions);
            }
        }
    }
}

// A version only folds assignments made before it was first read, so it only refers to older versions
fn version_reads(graph: &ModuleGraph) -> Vec<Reads> {
    let mut versions = Vec::with_capacity(graph.versions.len());
    for version in 0..graph.versions.len() {
        let mut reads = Reads::default();
        for assignment in graph.version_assignments(VersionId(version)) {
            reads.guard(&assignment.guard);
            reads.expr(&assignment.expr, &versions);
        }
        versions.push(reads);
    }
    versions
}

/// Orders the units of `design` with Kahn's algorithm, breaking ties by hierarchy order.
pub(super) fn schedule(design: &Design) -> Schedule {
    let classes = design
        .slots
        .values()
        .map(|slot| slot.class.clone())
        .collect::<Vec<_>>();
    // Registers only change on a clock edge, so writing one doesn't feed anything in the same pass
    let is_produced = |slot: usize| {
        matches!(
            classes.get(slot),
            Some(SlotClass::Combinational) | Some(SlotClass::Local)
        )
    };

    let mut units = Vec::new();
    let mut needs: Vec<BTreeSet<Need>> = Vec::new();
    let mut producers: HashMap<Need, Vec<usize>> = HashMap::new();
    let mut version_cache: HashMap<&str, Vec<Reads>> = HashMap::new();

    for (instance, node) in design.instances.iter().enumerate() {
        let graph = design.module_of(node);

        if graph.is_black_box {
            let mut unit_needs = BTreeSet::new();
            for (signal, decl) in graph.signals.iter().enumerate() {
                let slot = node.signal_slots[signal];
                if decl.direction == Direction::Input {
                    unit_needs.insert(Need::Slot(slot));
                } else if is_produced(slot) {
                    producers.entry(Need::Slot(slot)).or_default().push(units.len());
                }
            }
            units.push(Unit::BlackBox { instance });
            needs.push(unit_needs);
            continue;
        }

        let versions = version_cache
            .entry(graph.name.as_str())
            .or_insert_with(|| version_reads(graph));
        let resolve = |reads: &Reads| {
            reads
                .signals
                .iter()
                .map(|signal| Need::Slot(design.resolve(node, *signal)))
                .chain(
                    reads
                        .branches
                        .iter()
                        .map(|branch| Need::Branch(instance, branch.0)),
                )
                .collect::<BTreeSet<_>>()
        };

        for (branch, point) in graph.branches.iter().enumerate() {
            let mut reads = Reads::default();
            reads.guard(&point.guard);
            if let Some(scrutinee) = &point.scrutinee {
                reads.expr(scrutinee, versions);
            }
            for arm in point.arms.iter() {
                if let ArmTest::When(cond) = &arm.test {
                    reads.expr(cond, versions);
                }
            }
            producers
                .entry(Need::Branch(instance, branch))
                .or_default()
                .push(units.len());
            units.push(Unit::Branch { instance, branch });
            needs.push(resolve(&reads));
        }

        for (target, (signal, assignments)) in graph.assignments.iter().enumerate() {
            let mut reads = Reads::default();
            for assignment in assignments.iter() {
                reads.guard(&assignment.guard);
                reads.expr(&assignment.expr, versions);
            }
            let slot = design.resolve(node, *signal);
            if is_produced(slot) {
                producers.entry(Need::Slot(slot)).or_default().push(units.len());
            }
            units.push(Unit::Target { instance, target });
            needs.push(resolve(&reads));
        }
    }

    for (index, wire) in design.wires.iter().enumerate() {
        if is_produced(wire.sink) {
            producers
                .entry(Need::Slot(wire.sink))
                .or_default()
                .push(units.len());
        }
        units.push(Unit::Wire(index));
        needs.push(std::iter::once(Need::Slot(wire.driver)).collect());
    }

    let mut in_degree = vec![0usize; units.len()];
    let mut successors = vec![BTreeSet::new(); units.len()];
    for (unit, unit_needs) in needs.iter().enumerate() {
        let predecessors = unit_needs
            .iter()
            .filter_map(|need| producers.get(need))
            .flatten()
            .copied()
            .collect::<BTreeSet<_>>();
        in_degree[unit] = predecessors.len();
        for predecessor in predecessors {
            successors[predecessor].insert(unit);
        }
    }

    let mut ready = (0..units.len())
        .filter(|&unit| in_degree[unit] == 0)
        .map(Reverse)
        .collect::<BinaryHeap<_>>();
    let mut order = Vec::with_capacity(units.len());
    let mut placed = vec![false; units.len()];
    while let Some(Reverse(unit)) = ready.pop() {
        order.push(unit);
        placed[unit] = true;
        for &successor in successors[unit].iter() {
            in_degree[successor] -= 1;
            if in_degree[successor] == 0 {
                ready.push(Reverse(successor));
            }
        }
    }

    let acyclic = order.len() == units.len();
    order.extend((0..units.len()).filter(|&unit| !placed[unit]));

    Schedule {
        units: order.into_iter().map(|unit| units[unit]).collect(),
        acyclic,
    }
}
