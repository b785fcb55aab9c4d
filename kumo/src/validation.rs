//! Static checks over a translated [`ModuleGraph`].

use crate::error::TranslationError;
use crate::graph::{Direction, Kind};
use crate::ir::*;

use log::warn;

use std::collections::BTreeSet;

/// Checks `graph` and returns the first defect found.
///
/// Checks run in a fixed order: signal directions and drivers, uninitialized reads, match exhaustiveness, and finally latches and undriven child inputs.
pub fn validate(graph: &ModuleGraph) -> Result<(), TranslationError> {
    // Black boxes drive their own outputs
    if graph.is_black_box {
        return Ok(());
    }

    let v = Validator { graph };

    v.check_drivers()?;
    v.check_reads()?;
    v.check_matches()?;
    v.check_latches()?;
    v.warn_unread_locals();

    Ok(())
}

struct Validator<'g> {
    graph: &'g ModuleGraph,
}

impl<'g> Validator<'g> {
    fn module(&self) -> String {
        self.graph.name.clone()
    }

    fn check_drivers(&self) -> Result<(), TranslationError> {
        for (target, assignments) in self.graph.assignments.iter() {
            let reason = match target {
                SignalRef::Own(id) => {
                    let decl = self.graph.signal(*id);
                    match (&decl.class, decl.direction) {
                        (SignalClass::Constant { .. }, _) => Some("constants can't be assigned"),
                        (_, Direction::Input) => {
                            Some("inputs are driven from outside the module that declares them")
                        }
                        _ => None,
                    }
                }
                SignalRef::Port(..) => match self.graph.describe(*target).0 {
                    Direction::Output => Some("outputs of a child instance are driven by the child itself"),
                    _ => None,
                },
            };
            if let Some(reason) = reason {
                return Err(TranslationError::DirectionMismatch {
                    module: self.module(),
                    signal: self.graph.name_of(*target),
                    location: assignments[0].location.clone(),
                    reason: reason.to_string(),
                });
            }
        }

        let mut sinks = BTreeSet::new();
        for wire in self.graph.wires() {
            if self.graph.assignments.contains_key(&wire.sink) || !sinks.insert(wire.sink) {
                return Err(TranslationError::MultipleDrivers {
                    module: self.module(),
                    signal: self.graph.name_of(wire.sink),
                });
            }
        }

        Ok(())
    }

    fn check_reads(&self) -> Result<(), TranslationError> {
        for read in self.graph.reads.iter() {
            let initialized = match read.endpoint {
                Endpoint::Next => false,
                Endpoint::Current => {
                    let assignments: &[GuardedAssignment] =
                        match self.graph.assignments.get(&read.signal) {
                            Some(assignments) => &assignments[..read.preceding],
                            None => &[],
                        };
                    Coverage::new(self.graph, assignments).covers(&read.guard)
                }
            };
            if !initialized {
                return Err(TranslationError::UninitializedRead {
                    module: self.module(),
                    signal: self.graph.name_of(read.signal),
                    endpoint: read.endpoint,
                    location: read.location.clone(),
                });
            }
        }
        Ok(())
    }

    fn check_matches(&self) -> Result<(), TranslationError> {
        for branch in self.graph.branches.iter() {
            let missing = missing_patterns(branch);
            if !missing.is_empty() {
                return Err(TranslationError::NonExhaustiveMatch {
                    module: self.module(),
                    location: branch.location.clone(),
                    missing,
                });
            }
        }
        Ok(())
    }

    fn check_latches(&self) -> Result<(), TranslationError> {
        let no_assignments = Vec::new();

        for (index, decl) in self.graph.signals.iter().enumerate() {
            if decl.class != SignalClass::Wire || decl.direction == Direction::Input {
                continue;
            }
            let target = SignalRef::Own(SignalId(index));
            let assignments = self.graph.assignments.get(&target).unwrap_or(&no_assignments);
            self.check_complete(target, assignments)?;
        }

        let sinks = self.graph.wires().map(|wire| wire.sink).collect::<BTreeSet<_>>();
        for (index, instance) in self.graph.instances.iter().enumerate() {
            for port in instance.ports.iter() {
                if port.direction != Direction::Input {
                    continue;
                }
                let target = SignalRef::Port(InstanceId(index), port.signal);
                match self.graph.assignments.get(&target) {
                    Some(assignments) => self.check_complete(target, assignments)?,
                    None if sinks.contains(&target) => (),
                    None => {
                        return Err(TranslationError::UndrivenInput {
                            module: self.module(),
                            instance: instance.name.clone(),
                            port: port.name.clone(),
                        });
                    }
                }
            }
        }

        Ok(())
    }

    fn check_complete(
        &self,
        target: SignalRef,
        assignments: &[GuardedAssignment],
    ) -> Result<(), TranslationError> {
        let coverage = Coverage::new(self.graph, assignments);
        let root = Guard::default();
        if coverage.full(&root) {
            return Ok(());
        }
        Err(TranslationError::LatchInferred {
            module: self.module(),
            signal: self.graph.name_of(target),
            path: coverage.uncovered_path(&root),
        })
    }

    fn warn_unread_locals(&self) {
        for target in self.graph.assignments.keys() {
            if let SignalRef::Own(id) = target {
                let decl = self.graph.signal(*id);
                if decl.class == SignalClass::Local
                    && !self.graph.reads.iter().any(|read| read.signal == *target)
                {
                    warn!(
                        "Module \"{}\" assigns local \"{}\", but never reads it",
                        self.graph.name, decl.name
                    );
                }
            }
        }
    }
}

/// Answers whether a set of guarded assignments stores a value on every path through a guard.
struct Coverage<'g> {
    graph: &'g ModuleGraph,
    assignments: &'g [GuardedAssignment],
}

impl<'g> Coverage<'g> {
    fn new(graph: &'g ModuleGraph, assignments: &'g [GuardedAssignment]) -> Coverage<'g> {
        Coverage { graph, assignments }
    }

    /// Whether every path that satisfies `guard` executes one of the assignments.
    fn covers(&self, guard: &Guard) -> bool {
        (0..=guard.0.len()).any(|len| self.full(&Guard(guard.0[..len].to_vec())))
    }

    // Assigned directly under `guard`, or in every arm of some exhaustive branch directly under it
    fn full(&self, guard: &Guard) -> bool {
        self.assignments
            .iter()
            .any(|assignment| assignment.guard == *guard)
            || self.exhaustive_branches(guard).any(|(id, branch)| {
                (0..branch.arms.len()).all(|arm| self.full(&guard.with(Condition { branch: id, arm })))
            })
    }

    fn exhaustive_branches<'s>(
        &'s self,
        guard: &'s Guard,
    ) -> impl Iterator<Item = (BranchId, &'g BranchPoint)> + 's {
        self.graph
            .branches
            .iter()
            .enumerate()
            .filter(move |(_, branch)| branch.guard == *guard && is_exhaustive(branch))
            .map(|(index, branch)| (BranchId(index), branch))
    }

    fn uncovered_path(&self, guard: &Guard) -> String {
        let mut steps = Vec::new();
        let mut guard = guard.clone();
        loop {
            let next = self.exhaustive_branches(&guard).find_map(|(id, branch)| {
                (0..branch.arms.len())
                    .map(|arm| (arm, guard.with(Condition { branch: id, arm })))
                    .find(|(_, inner)| !self.full(inner))
                    .map(|(arm, inner)| {
                        (
                            format!("{}:{}", branch.location, branch.arms[arm].label),
                            inner,
                        )
                    })
            });
            match next {
                Some((step, inner)) => {
                    steps.push(step);
                    guard = inner;
                }
                None => {
                    if let Some(branch) = self
                        .graph
                        .branches
                        .iter()
                        .find(|branch| branch.guard == guard && !is_exhaustive(branch))
                    {
                        let label = match branch.kind {
                            BranchKind::If => "else",
                            BranchKind::Match => "_",
                        };
                        steps.push(format!("{}:{}", branch.location, label));
                    }
                    break;
                }
            }
        }
        if steps.is_empty() {
            "update".to_string()
        } else {
            steps.join(", ")
        }
    }
}

fn is_exhaustive(branch: &BranchPoint) -> bool {
    match branch.kind {
        BranchKind::If => branch.has_catch_all(),
        BranchKind::Match => missing_patterns(branch).is_empty(),
    }
}

// Names of the variants or values a match leaves uncovered
fn missing_patterns(branch: &BranchPoint) -> Vec<String> {
    if branch.kind != BranchKind::Match || branch.has_catch_all() {
        return Vec::new();
    }
    let covered = branch
        .arms
        .iter()
        .filter_map(|arm| match arm.test {
            ArmTest::Equals { value, .. } => Some(value),
            _ => None,
        })
        .collect::<BTreeSet<_>>();
    match &branch.scrutinee_kind {
        Some(Kind::Enum(layout)) => layout
            .variants
            .iter()
            .filter(|variant| !covered.contains(&variant.discriminant))
            .map(|variant| variant.name.clone())
            .collect(),
        Some(Kind::Bits(bit_width)) | Some(Kind::Signed(bit_width)) => {
            let total = 1u128.checked_shl(*bit_width).unwrap_or(0);
            if total != 0 && covered.len() as u128 == total {
                Vec::new()
            } else if *bit_width <= 4 {
                (0..total)
                    .filter(|value| !covered.contains(value))
                    .map(|value| format!("{:#x}", value))
                    .collect()
            } else {
                vec![format!("{} other value(s)", describe_remaining(total, covered.len()))]
            }
        }
        // Only catch-all patterns apply to these, so an uncovered match has no arms at all
        Some(Kind::Struct(_)) | Some(Kind::Array(_)) => vec!["_".to_string()],
        None => Vec::new(),
    }
}

fn describe_remaining(total: u128, covered: usize) -> String {
    if total == 0 {
        "all".to_string()
    } else {
        (total - covered as u128).to_string()
    }
}
