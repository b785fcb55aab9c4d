use super::constant::*;
use super::expr::*;
use super::instance::*;
use super::kind::*;
use super::module::*;

use serde::Serialize;

use std::cell::Cell;
use std::fmt;

/// The direction of a [`Signal`], as seen from the module that declares it.
///
/// [`Signal`]: ./struct.Signal.html
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize)]
pub enum Direction {
    /// Driven from outside the declaring module.
    Input,
    /// Driven by the declaring module and visible to its parent.
    Output,
    /// A variable scoped to a single invocation of the update routine.
    Local,
    /// Driven by the declaring module and not exposed.
    Internal,
}

impl Direction {
    pub fn is_port(self) -> bool {
        matches!(self, Direction::Input | Direction::Output)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Direction::Input => "input",
            Direction::Output => "output",
            Direction::Local => "local",
            Direction::Internal => "internal",
        };
        f.write_str(s)
    }
}

/// A named value holder with two endpoints: its *current* value, which is readable during an evaluation step, and its *next* value, which the update routine assigns.
///
/// `Signal`s are created by [`Module`] methods (eg. [`input`], [`reg`]) and by [`Instance::port`], which exposes a child's port in the parent's scope. `Signal`s are local to their respective [`Module`]s.
///
/// # Examples
///
/// ```
/// use kumo::*;
///
/// let c = Context::new();
///
/// let m = c.module("MyModule");
/// let i = m.input("i", 8);
/// let r = m.reg("r", 8);
/// let o = m.output("o", 8);
/// m.update(|b| {
///     b.assign(r, i.current());
///     b.assign(o, r.current() ^ i.current());
/// });
/// ```
///
/// [`Instance::port`]: ./struct.Instance.html#method.port
/// [`input`]: ./struct.Module.html#method.input
/// [`reg`]: ./struct.Module.html#method.reg
/// [`Module`]: ./struct.Module.html
#[must_use]
pub struct Signal<'a> {
    pub(crate) module: &'a Module<'a>,

    pub(crate) data: SignalData<'a>,
}

pub(crate) enum SignalData<'a> {
    Declared {
        index: usize,
        name: String,
        direction: Direction,
        kind: Kind,
        class: SignalClass,
    },
    InstancePort {
        instance: &'a Instance<'a>,
        port: &'a Signal<'a>,
    },
}

pub(crate) enum SignalClass {
    Wire,
    Register { reset: Cell<Option<u128>> },
    Constant { value: u128 },
}

impl<'a> Signal<'a> {
    /// Returns the name of this `Signal`. For an instance port, this is the name of the port in the child module.
    pub fn name(&self) -> &str {
        match &self.data {
            SignalData::Declared { name, .. } => name,
            SignalData::InstancePort { port, .. } => port.name(),
        }
    }

    pub fn direction(&self) -> Direction {
        match &self.data {
            SignalData::Declared { direction, .. } => *direction,
            SignalData::InstancePort { port, .. } => port.direction(),
        }
    }

    pub fn kind(&self) -> &Kind {
        match &self.data {
            SignalData::Declared { kind, .. } => kind,
            SignalData::InstancePort { port, .. } => port.kind(),
        }
    }

    /// Returns the bit width of the given `Signal`.
    ///
    /// # Examples
    ///
    /// ```
    /// use kumo::*;
    ///
    /// let c = Context::new();
    ///
    /// let m = c.module("MyModule");
    ///
    /// assert_eq!(m.input("i", 27).bit_width(), 27);
    /// assert_eq!(m.reg("some_reg", 46).bit_width(), 46);
    /// assert_eq!(m.constant("k", 3u32, 5).bit_width(), 5);
    /// ```
    pub fn bit_width(&self) -> u32 {
        self.kind().bit_width()
    }

    pub fn is_register(&self) -> bool {
        matches!(
            self.data,
            SignalData::Declared {
                class: SignalClass::Register { .. },
                ..
            }
        )
    }

    /// Returns the [`Instance`] this `Signal` is a port of, if it was obtained through [`Instance::port`].
    ///
    /// [`Instance`]: ./struct.Instance.html
    /// [`Instance::port`]: ./struct.Instance.html#method.port
    pub fn instance(&self) -> Option<&'a Instance<'a>> {
        match &self.data {
            SignalData::Declared { .. } => None,
            SignalData::InstancePort { instance, .. } => Some(*instance),
        }
    }

    /// Creates an [`Expr`] that reads the current value of this `Signal`.
    ///
    /// [`Expr`]: ./struct.Expr.html
    pub fn current(&'a self) -> &'a Expr<'a> {
        self.module
            .expr(ExprData::Current { signal: self }, self.kind().clone())
    }

    /// Creates an [`Expr`] that reads the next value of this `Signal`.
    ///
    /// The next endpoint is write-only: an update routine containing such a read fails translation with an uninitialized read. This exists so that such mistakes are reported with their location rather than silently reading stale data.
    ///
    /// [`Expr`]: ./struct.Expr.html
    pub fn next(&'a self) -> &'a Expr<'a> {
        self.module
            .expr(ExprData::Next { signal: self }, self.kind().clone())
    }

    /// Specifies the value this register takes when a simulation is reset.
    ///
    /// # Panics
    ///
    /// Panics if this `Signal` isn't a register, if its reset value has already been specified, if `value` doesn't fit into the register's bit width, or if it isn't a valid encoding of the register's [`Kind`] (eg. an undeclared enum discriminant).
    ///
    /// [`Kind`]: ./enum.Kind.html
    ///
    /// # Examples
    ///
    /// ```
    /// use kumo::*;
    ///
    /// let c = Context::new();
    ///
    /// let m = c.module("MyModule");
    ///
    /// let my_reg = m.reg("my_reg", 32);
    /// my_reg.reset_value(0xfadebabeu32);
    /// ```
    pub fn reset_value(&self, value: impl Into<Constant>) {
        let reset = match &self.data {
            SignalData::Declared {
                class: SignalClass::Register { reset },
                ..
            } => reset,
            _ => panic!(
                "Cannot specify a reset value for \"{}\", which is not a register.",
                self.name()
            ),
        };
        if reset.get().is_some() {
            panic!(
                "The reset value of register \"{}\" has already been specified.",
                self.name()
            );
        }
        let what = format!("register \"{}\"", self.name());
        let value = value.into().fit(self.bit_width(), &what);
        if !self.kind().is_valid(value) {
            panic!(
                "Cannot use '{}' as the reset value of register \"{}\", which is not a valid value of {}.",
                value,
                self.name(),
                self.kind()
            );
        }
        reset.set(Some(value));
    }

    pub(crate) fn index(&self) -> usize {
        match &self.data {
            SignalData::Declared { index, .. } => *index,
            SignalData::InstancePort { port, .. } => port.index(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::context::*;
    use super::*;

    #[test]
    #[should_panic(
        expected = "Cannot specify a reset value for \"w\", which is not a register."
    )]
    fn reset_value_on_wire_error() {
        let c = Context::new();

        let m = c.module("A");
        let w = m.wire("w", 4);

        // Panic
        w.reset_value(1u32);
    }

    #[test]
    #[should_panic(expected = "The reset value of register \"r\" has already been specified.")]
    fn reset_value_twice_error() {
        let c = Context::new();

        let m = c.module("A");
        let r = m.reg("r", 4);
        r.reset_value(1u32);

        // Panic
        r.reset_value(2u32);
    }

    #[test]
    #[should_panic(
        expected = "Cannot fit the specified value '16' into the specified bit width '4' of register \"r\". The value '16' requires a bit width of at least 5 bit(s)."
    )]
    fn reset_value_too_wide_error() {
        let c = Context::new();

        let m = c.module("A");
        let r = m.reg("r", 4);

        // Panic
        r.reset_value(16u32);
    }

    #[test]
    #[should_panic(
        expected = "Cannot use '3' as the reset value of register \"state\", which is not a valid value of enum State (2 bit(s))."
    )]
    fn reset_value_undeclared_variant_error() {
        let state = EnumBuilder::new("State").variant("A").variant("B").variant("C").build();

        let c = Context::new();

        let m = c.module("A");
        let r = m.reg("state", &state);

        // Panic
        r.reset_value(3u32);
    }

    #[test]
    fn instance_ports_mirror_child_declarations() {
        let c = Context::new();

        let inner = c.module("Inner");
        let _ = inner.input("i", 3);
        let _ = inner.output("o", 5);

        let outer = c.module("Outer");
        let inst = outer.instance("inst", "Inner");

        let o = inst.port("o");
        assert_eq!(o.name(), "o");
        assert_eq!(o.direction(), Direction::Output);
        assert_eq!(o.bit_width(), 5);
        assert_eq!(o.index(), 1);
        assert!(o.instance().is_some());
        assert!(!o.is_register());
    }
}
