//! Compiles a module's update routine (a statement tree) into its circuit graph.

mod stack;

use stack::*;

use crate::error::TranslationError;
use crate::graph::{self, Direction, ExprData, Interface, Kind, Module, Pattern, Signal, Stmt};
use crate::ir::*;

use indexmap::IndexMap;
use log::{debug, warn};

use std::collections::{BTreeSet, HashMap};

/// Translates the update routine of `m` into a [`ModuleGraph`].
///
/// Only join contracts are checked here; everything else about the routine is left to static validation.
pub fn translate<'a>(m: &'a Module<'a>) -> Result<ModuleGraph, TranslationError> {
    let mut t = Translator {
        module: m,
        graph: ModuleGraph {
            name: m.name.clone(),
            is_black_box: m.is_black_box(),
            signals: m.signals.borrow().iter().map(|s| signal_decl(s)).collect(),
            instances: m
                .instances
                .borrow()
                .iter()
                .map(|instance| {
                    let child = instance.instantiated_module;
                    InstanceDecl {
                        name: instance.name.clone(),
                        module: child.name.clone(),
                        ports: child
                            .signals
                            .borrow()
                            .iter()
                            .filter(|port| port.direction().is_port())
                            .map(|port| PortDecl {
                                signal: SignalId(port.index()),
                                name: port.name().to_string(),
                                direction: port.direction(),
                                bit_width: port.bit_width(),
                            })
                            .collect(),
                    }
                })
                .collect(),
            interfaces: m
                .interfaces
                .borrow()
                .iter()
                .map(|interface| InterfaceDecl {
                    name: interface.name().to_string(),
                    members: interface
                        .members()
                        .into_iter()
                        .map(|(name, signal)| (name.to_string(), SignalId(signal.index())))
                        .collect(),
                })
                .collect(),
            assignments: IndexMap::new(),
            branches: Vec::new(),
            joins: Vec::new(),
            reads: Vec::new(),
            versions: Vec::new(),
        },
        versions: HashMap::new(),
    };

    if let Some(stmts) = m.update.borrow().as_ref() {
        let scope = TranslationScope {
            guard: Guard::default(),
            location: Stack::new(),
            loop_indices: Stack::new(),
        };
        t.block(stmts, &scope)?;
    }

    debug!(
        "Translated module \"{}\": {} assignment target(s), {} branch point(s), {} join(s), {} local version(s)",
        t.graph.name,
        t.graph.assignments.len(),
        t.graph.branches.len(),
        t.graph.joins.len(),
        t.graph.versions.len()
    );

    Ok(t.graph)
}

fn signal_decl(signal: &Signal<'_>) -> SignalDecl {
    let class = match &signal.data {
        graph::SignalData::Declared { class, .. } => match class {
            graph::SignalClass::Wire if signal.direction() == Direction::Local => SignalClass::Local,
            graph::SignalClass::Wire => SignalClass::Wire,
            graph::SignalClass::Register { reset } => SignalClass::Register {
                reset: reset.get().unwrap_or(0),
            },
            graph::SignalClass::Constant { value } => SignalClass::Constant { value: *value },
        },
        graph::SignalData::InstancePort { .. } => unreachable!(),
    };
    SignalDecl {
        name: signal.name().to_string(),
        direction: signal.direction(),
        kind: signal.kind().clone(),
        class,
    }
}

fn signal_ref(signal: &Signal<'_>) -> SignalRef {
    match signal.instance() {
        Some(instance) => SignalRef::Port(InstanceId(instance.index), SignalId(signal.index())),
        None => SignalRef::Own(SignalId(signal.index())),
    }
}

#[derive(Clone)]
struct TranslationScope {
    guard: Guard,
    location: Stack<Step>,
    loop_indices: Stack<(usize, u32)>,
}

impl TranslationScope {
    fn at(&self, step: Step) -> TranslationScope {
        TranslationScope {
            location: self.location.push(step),
            ..self.clone()
        }
    }

    fn location(&self) -> Location {
        Location(self.location.to_vec())
    }
}

struct Translator<'a> {
    module: &'a Module<'a>,
    graph: ModuleGraph,
    versions: HashMap<LocalVersion, VersionId>,
}

impl<'a> Translator<'a> {
    fn block(&mut self, stmts: &[Stmt<'a>], scope: &TranslationScope) -> Result<(), TranslationError> {
        for (index, stmt) in stmts.iter().enumerate() {
            self.stmt(stmt, &scope.at(Step::Statement(index)))?;
        }
        Ok(())
    }

    fn stmt(&mut self, stmt: &Stmt<'a>, scope: &TranslationScope) -> Result<(), TranslationError> {
        match stmt {
            Stmt::Assign { target, expr } => {
                let expr = self.expr(expr, scope);
                self.graph
                    .assignments
                    .entry(signal_ref(target))
                    .or_default()
                    .push(GuardedAssignment {
                        guard: scope.guard.clone(),
                        expr,
                        location: scope.location(),
                    });
            }
            Stmt::If { arms, otherwise } => {
                // Conditions are lowered before any arm body, so local reads see the values from before the branch
                let mut branch_arms = arms
                    .iter()
                    .enumerate()
                    .map(|(index, (cond, _))| Arm {
                        label: if index == 0 {
                            "then".to_string()
                        } else {
                            format!("elif{}", index)
                        },
                        test: ArmTest::When(self.expr(cond, scope)),
                    })
                    .collect::<Vec<_>>();
                if otherwise.is_some() {
                    branch_arms.push(Arm {
                        label: "else".to_string(),
                        test: ArmTest::Otherwise,
                    });
                }
                let bodies = arms
                    .iter()
                    .map(|(_, body)| body)
                    .chain(otherwise.iter())
                    .collect::<Vec<_>>();
                self.branch(BranchKind::If, None, None, branch_arms, &bodies, scope)?;
            }
            Stmt::Match { scrutinee, arms } => {
                let kind = scrutinee.kind().clone();
                let lowered = self.expr(scrutinee, scope);
                let branch_arms = arms
                    .iter()
                    .map(|(pattern, _)| match_arm(pattern, &kind))
                    .collect::<Vec<_>>();
                let bodies = arms.iter().map(|(_, body)| body).collect::<Vec<_>>();
                self.branch(
                    BranchKind::Match,
                    Some(lowered),
                    Some(kind),
                    branch_arms,
                    &bodies,
                    scope,
                )?;
            }
            Stmt::For { var, range, body } => {
                for value in range.clone() {
                    let scope = TranslationScope {
                        loop_indices: scope.loop_indices.push((*var, value)),
                        ..scope.at(Step::Iteration(value))
                    };
                    self.block(body, &scope)?;
                }
            }
            Stmt::Scope { body } => {
                self.block(body, scope)?;
            }
            Stmt::Join { a, b } => {
                self.join(a, b, scope)?;
            }
        }
        Ok(())
    }

    fn branch(
        &mut self,
        kind: BranchKind,
        scrutinee: Option<Expr>,
        scrutinee_kind: Option<Kind>,
        arms: Vec<Arm>,
        bodies: &[&Vec<Stmt<'a>>],
        scope: &TranslationScope,
    ) -> Result<(), TranslationError> {
        let branch = BranchId(self.graph.branches.len());
        let labels = arms.iter().map(|arm| arm.label.clone()).collect::<Vec<_>>();
        self.graph.branches.push(BranchPoint {
            guard: scope.guard.clone(),
            location: scope.location(),
            kind,
            scrutinee,
            scrutinee_kind,
            arms,
        });
        for (arm, (label, body)) in labels.into_iter().zip(bodies.iter()).enumerate() {
            let scope = TranslationScope {
                guard: scope.guard.with(Condition { branch, arm }),
                ..scope.at(Step::Arm(label))
            };
            self.block(body, &scope)?;
        }
        Ok(())
    }

    fn join(
        &mut self,
        a: &'a Interface<'a>,
        b: &'a Interface<'a>,
        scope: &TranslationScope,
    ) -> Result<(), TranslationError> {
        let location = scope.location();
        if !scope.guard.is_unconditional() {
            warn!(
                "Module \"{}\" joins \"{}\" and \"{}\" inside a branch at {}; joins are structural and apply unconditionally",
                self.module.name,
                a.path(),
                b.path(),
                location
            );
        }

        let a_members = a.members();
        let b_members = b.members();
        let a_names = a_members.iter().map(|(name, _)| *name).collect::<BTreeSet<_>>();
        let b_names = b_members.iter().map(|(name, _)| *name).collect::<BTreeSet<_>>();
        if a_names != b_names {
            return Err(TranslationError::SignalSetMismatch {
                module: self.module.name.clone(),
                location,
                a: a.path(),
                b: b.path(),
                missing: a_names
                    .symmetric_difference(&b_names)
                    .map(|name| name.to_string())
                    .collect(),
            });
        }

        let mut wires = Vec::new();
        for (name, a_signal) in a_members.iter() {
            let b_signal = b.signal(name);
            let (driver, sink) = match (a_signal.direction(), b_signal.direction()) {
                (Direction::Output, Direction::Input) => (*a_signal, b_signal),
                (Direction::Input, Direction::Output) => (b_signal, *a_signal),
                (direction, _) => {
                    return Err(TranslationError::DirectionMismatch {
                        module: self.module.name.clone(),
                        signal: name.to_string(),
                        location,
                        reason: format!(
                            "member \"{}\" is an {} on both \"{}\" and \"{}\"",
                            name,
                            direction,
                            a.path(),
                            b.path()
                        ),
                    });
                }
            };
            if a_signal.kind() != b_signal.kind() {
                return Err(TranslationError::KindMismatch {
                    module: self.module.name.clone(),
                    location,
                    a: a.path(),
                    b: b.path(),
                    member: name.to_string(),
                    a_kind: a_signal.kind().clone(),
                    b_kind: b_signal.kind().clone(),
                });
            }
            if sink.instance().is_none() {
                return Err(TranslationError::DirectionMismatch {
                    module: self.module.name.clone(),
                    signal: name.to_string(),
                    location,
                    reason: format!(
                        "the input side of member \"{}\" must be a port of a child instance",
                        name
                    ),
                });
            }
            wires.push(Wire {
                driver: signal_ref(driver),
                sink: signal_ref(sink),
            });
        }
        wires.sort();

        self.graph.joins.push(Join {
            location,
            a: a.path(),
            b: b.path(),
            wires,
        });
        Ok(())
    }

    fn expr(&mut self, expr: &graph::Expr<'a>, scope: &TranslationScope) -> Expr {
        match &expr.data {
            ExprData::Lit { value, bit_width } => Expr::Const {
                value: *value,
                bit_width: *bit_width,
            },
            ExprData::Current { signal } => {
                let signal_ref = signal_ref(signal);
                if signal.direction() == Direction::Local {
                    return self.local_read(signal_ref, signal.bit_width(), scope);
                }
                Expr::Signal {
                    signal: signal_ref,
                    bit_width: signal.bit_width(),
                }
            }
            ExprData::Next { signal } => {
                let signal_ref = signal_ref(signal);
                self.read_site(signal_ref, Endpoint::Next, scope);
                Expr::Undefined {
                    bit_width: signal.bit_width(),
                }
            }
            ExprData::LoopIndex { var, bit_width } => {
                match scope.loop_indices.iter().find(|(bound, _)| bound == var) {
                    Some((_, value)) => Expr::Const {
                        value: *value as u128,
                        bit_width: *bit_width,
                    },
                    None => panic!(
                        "A loop index of module \"{}\" was used outside of the body of its loop.",
                        self.module.name
                    ),
                }
            }
            ExprData::Not { source } => Expr::Not {
                source: Box::new(self.expr(source, scope)),
                bit_width: expr.bit_width(),
            },
            ExprData::BinOp { lhs, rhs, op } => Expr::Binary {
                op: *op,
                lhs: Box::new(self.expr(lhs, scope)),
                rhs: Box::new(self.expr(rhs, scope)),
                bit_width: expr.bit_width(),
            },
            ExprData::Bits {
                source,
                range_high,
                range_low,
            } => Expr::Slice {
                source: Box::new(self.expr(source, scope)),
                range_high: *range_high,
                range_low: *range_low,
            },
            ExprData::Concat { lhs, rhs } => Expr::Concat {
                lhs: Box::new(self.expr(lhs, scope)),
                rhs: Box::new(self.expr(rhs, scope)),
                bit_width: expr.bit_width(),
            },
            ExprData::Resize { source, bit_width } => Expr::Resize {
                source: Box::new(self.expr(source, scope)),
                bit_width: *bit_width,
                signed: source.kind().is_signed(),
            },
            ExprData::Mux {
                cond,
                when_true,
                when_false,
            } => Expr::Mux {
                cond: Box::new(self.expr(cond, scope)),
                when_true: Box::new(self.expr(when_true, scope)),
                when_false: Box::new(self.expr(when_false, scope)),
            },
            ExprData::Variant {
                layout,
                variant,
                fields,
            } => {
                let variant = layout.expect_variant(variant);
                let parts = variant
                    .fields
                    .iter()
                    .zip(fields.iter())
                    .map(|(field, value)| (field.offset, *value))
                    .collect::<Vec<_>>();
                self.pack(variant.discriminant, layout.bit_width(), &parts, scope)
            }
            ExprData::Aggregate { parts } => self.pack(0, expr.bit_width(), parts, scope),
            ExprData::Cast { source } => self.expr(source, scope),
        }
    }

    // `base | (part0 << offset0) | (part1 << offset1) | ...`, all at `bit_width` bits
    fn pack(
        &mut self,
        base: u128,
        bit_width: u32,
        parts: &[(u32, &'a graph::Expr<'a>)],
        scope: &TranslationScope,
    ) -> Expr {
        let mut ret = Expr::Const {
            value: base,
            bit_width,
        };
        for (offset, part) in parts.iter() {
            let value = Expr::Resize {
                source: Box::new(self.expr(part, scope)),
                bit_width,
                signed: false,
            };
            let shifted = Expr::Binary {
                op: BinOp::Shl,
                lhs: Box::new(value),
                rhs: Box::new(Expr::Const {
                    value: *offset as u128,
                    bit_width: graph::bits_for(*offset as u128),
                }),
                bit_width,
            };
            ret = Expr::Binary {
                op: BinOp::BitOr,
                lhs: Box::new(ret),
                rhs: Box::new(shifted),
                bit_width,
            };
        }
        ret
    }

    fn read_site(&mut self, signal: SignalRef, endpoint: Endpoint, scope: &TranslationScope) -> usize {
        let preceding = self
            .graph
            .assignments
            .get(&signal)
            .map_or(0, |assignments| assignments.len());
        self.graph.reads.push(ReadSite {
            signal,
            endpoint,
            guard: scope.guard.clone(),
            preceding,
            location: scope.location(),
        });
        preceding
    }

    // A local holds whatever its latest executed assignment stored. Reads made with the same assignments behind
    // them share one version.
    fn local_read(&mut self, signal: SignalRef, bit_width: u32, scope: &TranslationScope) -> Expr {
        let preceding = self.read_site(signal, Endpoint::Current, scope);
        if preceding == 0 {
            return Expr::Undefined { bit_width };
        }
        let key = LocalVersion { signal, preceding };
        let next_id = VersionId(self.graph.versions.len());
        let version = *self.versions.entry(key).or_insert(next_id);
        if version == next_id {
            self.graph.versions.push(key);
        }
        Expr::Local { version, bit_width }
    }
}

fn match_arm(pattern: &Pattern, kind: &Kind) -> Arm {
    match (pattern, kind) {
        (Pattern::Variant(name), Kind::Enum(layout)) => Arm {
            label: name.clone(),
            test: ArmTest::Equals {
                value: layout.expect_variant(name).discriminant,
                mask: layout.discriminant_mask(),
            },
        },
        (Pattern::Value(value), _) => Arm {
            label: format!("{:#x}", value),
            test: ArmTest::Equals {
                value: *value,
                mask: graph::mask(kind.bit_width()),
            },
        },
        (Pattern::Wildcard, _) => Arm {
            label: "_".to_string(),
            test: ArmTest::Otherwise,
        },
        (Pattern::Variant(_), _) => unreachable!(),
    }
}
