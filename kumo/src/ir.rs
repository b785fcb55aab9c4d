//! The circuit graph: a translated update routine, expressed as guarded assignments.
//!
//! A [`ModuleGraph`] is produced once per module definition and shared by static validation, elaboration and simulation. Every type here is plain owned data and can be serialized for external netlist tools.

use crate::graph::{Direction, Kind};

use indexmap::IndexMap;
use serde::Serialize;

use std::fmt;

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct SignalId(pub usize);

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct InstanceId(pub usize);

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct BranchId(pub usize);

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct VersionId(pub usize);

/// A signal as seen from inside one module definition: one of its own signals, or a port of one of its child instances.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum SignalRef {
    Own(SignalId),
    Port(InstanceId, SignalId),
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub enum SignalClass {
    Wire,
    Register { reset: u128 },
    Constant { value: u128 },
    Local,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct SignalDecl {
    pub name: String,
    pub direction: Direction,
    pub kind: Kind,
    pub class: SignalClass,
}

impl SignalDecl {
    pub fn bit_width(&self) -> u32 {
        self.kind.bit_width()
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct PortDecl {
    /// The port's signal in the instantiated module.
    pub signal: SignalId,
    pub name: String,
    pub direction: Direction,
    pub bit_width: u32,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct InstanceDecl {
    pub name: String,
    pub module: String,
    pub ports: Vec<PortDecl>,
}

impl InstanceDecl {
    pub fn port(&self, signal: SignalId) -> Option<&PortDecl> {
        self.ports.iter().find(|port| port.signal == signal)
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct InterfaceDecl {
    pub name: String,
    /// Member name and the module signal backing it, in declaration order.
    pub members: Vec<(String, SignalId)>,
}

/// Taken when branch point `branch` selects arm `arm`.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize)]
pub struct Condition {
    pub branch: BranchId,
    pub arm: usize,
}

/// A conjunction of conditions, outermost first. The empty guard always holds.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq, Serialize)]
pub struct Guard(pub Vec<Condition>);

impl Guard {
    pub fn is_unconditional(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_prefix_of(&self, other: &Guard) -> bool {
        other.0.starts_with(&self.0)
    }

    pub(crate) fn with(&self, condition: Condition) -> Guard {
        let mut conditions = self.0.clone();
        conditions.push(condition);
        Guard(conditions)
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub enum Step {
    Statement(usize),
    Arm(String),
    Iteration(u32),
}

/// Where a statement sits in its update routine, eg. `update/1/then/0` or `update/2/iter3/0`.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct Location(pub Vec<Step>);

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "update")?;
        for step in self.0.iter() {
            match step {
                Step::Statement(index) => write!(f, "/{}", index)?,
                Step::Arm(label) => write!(f, "/{}", label)?,
                Step::Iteration(index) => write!(f, "/iter{}", index)?,
            }
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub enum BinOp {
    Add,
    Sub,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    Equal,
    NotEqual,
    LessThan,
    LessThanEqual,
    GreaterThan,
    GreaterThanEqual,
    /// Arithmetic right shift: vacated bits copy the sign bit.
    Sar,
    SignedLessThan,
    SignedLessThanEqual,
    SignedGreaterThan,
    SignedGreaterThanEqual,
}

impl BinOp {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinOp::Equal
                | BinOp::NotEqual
                | BinOp::LessThan
                | BinOp::LessThanEqual
                | BinOp::GreaterThan
                | BinOp::GreaterThanEqual
                | BinOp::SignedLessThan
                | BinOp::SignedLessThanEqual
                | BinOp::SignedGreaterThan
                | BinOp::SignedGreaterThanEqual
        )
    }

    /// The two's complement counterpart of an unsigned comparison or shift, or `self` if there is none.
    pub fn signed(self) -> BinOp {
        match self {
            BinOp::Shr => BinOp::Sar,
            BinOp::LessThan => BinOp::SignedLessThan,
            BinOp::LessThanEqual => BinOp::SignedLessThanEqual,
            BinOp::GreaterThan => BinOp::SignedGreaterThan,
            BinOp::GreaterThanEqual => BinOp::SignedGreaterThanEqual,
            op => op,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::BitAnd => "&",
            BinOp::BitOr => "|",
            BinOp::BitXor => "^",
            BinOp::Shl => "<<",
            BinOp::Shr => ">>",
            BinOp::Equal => "==",
            BinOp::NotEqual => "!=",
            BinOp::LessThan => "<",
            BinOp::LessThanEqual => "<=",
            BinOp::GreaterThan => ">",
            BinOp::GreaterThanEqual => ">=",
            BinOp::Sar => ">>>",
            BinOp::SignedLessThan => "<s",
            BinOp::SignedLessThanEqual => "<=s",
            BinOp::SignedGreaterThan => ">s",
            BinOp::SignedGreaterThanEqual => ">=s",
        }
    }
}

/// A combinational expression over current values.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub enum Expr {
    Const {
        value: u128,
        bit_width: u32,
    },
    Signal {
        signal: SignalRef,
        bit_width: u32,
    },
    Not {
        source: Box<Expr>,
        bit_width: u32,
    },
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        bit_width: u32,
    },
    Slice {
        source: Box<Expr>,
        range_high: u32,
        range_low: u32,
    },
    Concat {
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        bit_width: u32,
    },
    /// Truncates or extends `source`; extension copies the sign bit when `signed` is set and fills with zeros otherwise.
    Resize {
        source: Box<Expr>,
        bit_width: u32,
        signed: bool,
    },
    Mux {
        cond: Box<Expr>,
        when_true: Box<Expr>,
        when_false: Box<Expr>,
    },
    /// The value a local holds at one point of the routine; see [`LocalVersion`].
    Local {
        version: VersionId,
        bit_width: u32,
    },
    /// A value that doesn't exist yet, eg. a local read before any assignment. Routines containing one never pass validation.
    Undefined {
        bit_width: u32,
    },
}

impl Expr {
    pub fn bit_width(&self) -> u32 {
        match self {
            Expr::Const { bit_width, .. } => *bit_width,
            Expr::Signal { bit_width, .. } => *bit_width,
            Expr::Not { bit_width, .. } => *bit_width,
            Expr::Binary { bit_width, .. } => *bit_width,
            Expr::Slice {
                range_high,
                range_low,
                ..
            } => range_high - range_low + 1,
            Expr::Concat { bit_width, .. } => *bit_width,
            Expr::Resize { bit_width, .. } => *bit_width,
            Expr::Mux { when_true, .. } => when_true.bit_width(),
            Expr::Local { bit_width, .. } => *bit_width,
            Expr::Undefined { bit_width } => *bit_width,
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Const { value, bit_width } => write!(f, "{}'h{:x}", bit_width, value),
            Expr::Signal { signal, .. } => match signal {
                SignalRef::Own(SignalId(index)) => write!(f, "s{}", index),
                SignalRef::Port(InstanceId(instance), SignalId(index)) => {
                    write!(f, "i{}.s{}", instance, index)
                }
            },
            Expr::Not { source, .. } => write!(f, "!{}", source),
            Expr::Binary { op, lhs, rhs, .. } => write!(f, "({} {} {})", lhs, op.symbol(), rhs),
            Expr::Slice {
                source,
                range_high,
                range_low,
            } => write!(f, "{}[{}:{}]", source, range_high, range_low),
            Expr::Concat { lhs, rhs, .. } => write!(f, "{{{}, {}}}", lhs, rhs),
            Expr::Resize {
                source,
                bit_width,
                signed: false,
            } => write!(f, "resize({}, {})", source, bit_width),
            Expr::Resize {
                source,
                bit_width,
                signed: true,
            } => write!(f, "sext({}, {})", source, bit_width),
            Expr::Mux {
                cond,
                when_true,
                when_false,
            } => write!(f, "({} ? {} : {})", cond, when_true, when_false),
            Expr::Local { version, .. } => write!(f, "v{}", version.0),
            Expr::Undefined { bit_width } => write!(f, "{}'hx", bit_width),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct GuardedAssignment {
    pub guard: Guard,
    pub expr: Expr,
    pub location: Location,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub enum BranchKind {
    If,
    Match,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub enum ArmTest {
    /// Taken when the 1-bit expression is high.
    When(Expr),
    /// Taken when `scrutinee & mask == value`.
    Equals { value: u128, mask: u128 },
    Otherwise,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Arm {
    pub label: String,
    pub test: ArmTest,
}

/// An `if` or `match` statement. Arms are tested in order and at most one is taken, only when `guard` holds.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct BranchPoint {
    pub guard: Guard,
    pub location: Location,
    pub kind: BranchKind,
    pub scrutinee: Option<Expr>,
    pub scrutinee_kind: Option<Kind>,
    pub arms: Vec<Arm>,
}

impl BranchPoint {
    pub fn has_catch_all(&self) -> bool {
        self.arms
            .iter()
            .any(|arm| matches!(arm.test, ArmTest::Otherwise))
    }
}

/// A permanent connection: `sink`'s next value is `driver`'s current value.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Wire {
    pub driver: SignalRef,
    pub sink: SignalRef,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Join {
    pub location: Location,
    pub a: String,
    pub b: String,
    pub wires: Vec<Wire>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub enum Endpoint {
    Current,
    Next,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Current => write!(f, "current value"),
            Endpoint::Next => write!(f, "next value"),
        }
    }
}

/// A read that needs checking: a read of a local, or of any signal's write-only next endpoint.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ReadSite {
    pub signal: SignalRef,
    pub endpoint: Endpoint,
    pub guard: Guard,
    /// Number of assignments to `signal` that precede the read in program order.
    pub preceding: usize,
    pub location: Location,
}

/// A local as left by the first `preceding` assignments to it: the value of the last of them whose guard holds.
///
/// Every read of a local refers to one of these instead of repeating the assignments it folds, so a value threaded
/// through an unrolled loop stays linear in the number of iterations.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize)]
pub struct LocalVersion {
    pub signal: SignalRef,
    pub preceding: usize,
}

/// The circuit graph of one module definition.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ModuleGraph {
    pub name: String,
    pub is_black_box: bool,
    pub signals: Vec<SignalDecl>,
    pub instances: Vec<InstanceDecl>,
    pub interfaces: Vec<InterfaceDecl>,
    /// Per target, its guarded assignments in program order. Targets appear in order of their first assignment.
    #[serde(serialize_with = "indexmap::map::serde_seq::serialize")]
    pub assignments: IndexMap<SignalRef, Vec<GuardedAssignment>>,
    pub branches: Vec<BranchPoint>,
    pub joins: Vec<Join>,
    pub reads: Vec<ReadSite>,
    pub versions: Vec<LocalVersion>,
}

impl ModuleGraph {
    pub fn signal(&self, id: SignalId) -> &SignalDecl {
        &self.signals[id.0]
    }

    pub fn find_signal(&self, name: &str) -> Option<SignalId> {
        self.signals
            .iter()
            .position(|signal| signal.name == name)
            .map(SignalId)
    }

    /// Direction and bit width of `signal` as declared, and a display name as seen from this module.
    pub fn describe(&self, signal: SignalRef) -> (Direction, u32, String) {
        match signal {
            SignalRef::Own(id) => {
                let decl = self.signal(id);
                (decl.direction, decl.bit_width(), decl.name.clone())
            }
            SignalRef::Port(instance, id) => {
                let instance = &self.instances[instance.0];
                match instance.port(id) {
                    Some(port) => (
                        port.direction,
                        port.bit_width,
                        format!("{}.{}", instance.name, port.name),
                    ),
                    None => (Direction::Internal, 0, format!("{}.?", instance.name)),
                }
            }
        }
    }

    pub fn name_of(&self, signal: SignalRef) -> String {
        self.describe(signal).2
    }

    pub fn wires(&self) -> impl Iterator<Item = &Wire> {
        self.joins.iter().flat_map(|join| join.wires.iter())
    }

    /// The assignments whose last holding guard decides the value of `version`.
    pub fn version_assignments(&self, version: VersionId) -> &[GuardedAssignment] {
        let version = &self.versions[version.0];
        self.assignments
            .get(&version.signal)
            .map_or(&[][..], |assignments| &assignments[..version.preceding])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_display() {
        let location = Location(vec![
            Step::Statement(1),
            Step::Arm("then".into()),
            Step::Statement(0),
            Step::Iteration(3),
            Step::Statement(2),
        ]);

        assert_eq!(location.to_string(), "update/1/then/0/iter3/2");
        assert_eq!(Location::default().to_string(), "update");
    }

    #[test]
    fn guard_prefixes() {
        let a = Condition {
            branch: BranchId(0),
            arm: 1,
        };
        let b = Condition {
            branch: BranchId(2),
            arm: 0,
        };
        let root = Guard::default();
        let outer = root.with(a);
        let inner = outer.with(b);

        assert!(root.is_prefix_of(&inner));
        assert!(outer.is_prefix_of(&inner));
        assert!(!inner.is_prefix_of(&outer));
        assert!(root.is_unconditional());
    }

    #[test]
    fn expr_display() {
        let expr = Expr::Binary {
            op: BinOp::Add,
            lhs: Box::new(Expr::Signal {
                signal: SignalRef::Port(InstanceId(1), SignalId(2)),
                bit_width: 4,
            }),
            rhs: Box::new(Expr::Const {
                value: 10,
                bit_width: 4,
            }),
            bit_width: 4,
        };

        assert_eq!(expr.to_string(), "(i1.s2 + 4'ha)");
        assert_eq!(expr.bit_width(), 4);

        let expr = Expr::Binary {
            op: BinOp::Sar,
            lhs: Box::new(Expr::Resize {
                source: Box::new(Expr::Local {
                    version: VersionId(3),
                    bit_width: 4,
                }),
                bit_width: 8,
                signed: true,
            }),
            rhs: Box::new(Expr::Const {
                value: 1,
                bit_width: 1,
            }),
            bit_width: 8,
        };

        assert_eq!(expr.to_string(), "(sext(v3, 8) >>> 1'h1)");
    }

    #[test]
    fn signed_counterparts() {
        assert_eq!(BinOp::Shr.signed(), BinOp::Sar);
        assert_eq!(BinOp::LessThan.signed(), BinOp::SignedLessThan);
        assert_eq!(BinOp::Add.signed(), BinOp::Add);
        assert!(BinOp::SignedGreaterThanEqual.is_comparison());
    }
}
