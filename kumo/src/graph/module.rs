use super::constant::*;
use super::context::*;
use super::expr::*;
use super::instance::*;
use super::interface::*;
use super::kind::*;
use super::signal::*;
use super::stmt::*;

use crate::sim::BlackBoxFactory;

use indexmap::IndexMap;

use std::cell::{Cell, RefCell};
use std::ptr;
use std::sync::Arc;

/// A self-contained and potentially-reusable hardware design unit, created by the [`Context`]::[`module`] method.
///
/// A `Module` is declared in two steps: its members (signals, registers, constants, child instances and interfaces) are created first, in declaration order, and then its behavior is described by an [`update`] routine that assigns the members' next values.
///
/// # Examples
///
/// ```
/// use kumo::*;
///
/// let c = Context::new();
///
/// let m = c.module("Counter");
/// let enable = m.input("enable", 1);
/// let count = m.output("count", 2);
/// let value = m.reg("value", 2);
/// value.reset_value(0u32);
/// m.update(|b| {
///     b.if_(enable.current(), |b| {
///         b.assign(value, value.current() + m.lit(1u32, 2));
///     });
///     b.assign(count, value.current());
/// });
/// ```
///
/// [`Context`]: ./struct.Context.html
/// [`module`]: ./struct.Context.html#method.module
/// [`update`]: #method.update
#[must_use]
pub struct Module<'a> {
    context: &'a Context<'a>,

    pub(crate) name: String,

    pub(crate) signals: RefCell<Vec<&'a Signal<'a>>>,
    pub(crate) instances: RefCell<Vec<&'a Instance<'a>>>,
    pub(crate) interfaces: RefCell<Vec<&'a Interface<'a>>>,
    pub(crate) update: RefCell<Option<Vec<Stmt<'a>>>>,
    pub(crate) black_box: Option<BlackBoxFactory>,

    next_loop_var: Cell<usize>,
}

impl<'a> Module<'a> {
    pub(super) fn new(
        context: &'a Context<'a>,
        name: String,
        black_box: Option<BlackBoxFactory>,
    ) -> Module<'a> {
        Module {
            context,

            name,

            signals: RefCell::new(Vec::new()),
            instances: RefCell::new(Vec::new()),
            interfaces: RefCell::new(Vec::new()),
            update: RefCell::new(None),
            black_box,

            next_loop_var: Cell::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns `true` if this module was declared with [`Context::black_box`].
    ///
    /// [`Context::black_box`]: ./struct.Context.html#method.black_box
    pub fn is_black_box(&self) -> bool {
        self.black_box.is_some()
    }

    /// Creates an [`Expr`] that represents the constant literal specified by `value` with `bit_width` bits.
    ///
    /// The bit width of the type provided by `value` doesn't need to match `bit_width`, but the value represented by `value` must fit into `bit_width` bits.
    ///
    /// # Panics
    ///
    /// Panics if `bit_width` is less than [`MIN_SIGNAL_BIT_WIDTH`] or greater than [`MAX_SIGNAL_BIT_WIDTH`], respectively, or if the specified `value` doesn't fit into `bit_width` bits.
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
    /// let eight_bit_const = m.lit(0xffu32, 8);
    /// let one_bit_const = m.lit(0u32, 1);
    /// let twenty_seven_bit_const = m.lit(true, 27);
    /// ```
    ///
    /// [`Expr`]: ./struct.Expr.html
    /// [`MIN_SIGNAL_BIT_WIDTH`]: ./constant.MIN_SIGNAL_BIT_WIDTH.html
    /// [`MAX_SIGNAL_BIT_WIDTH`]: ./constant.MAX_SIGNAL_BIT_WIDTH.html
    pub fn lit(&'a self, value: impl Into<Constant>, bit_width: u32) -> &'a Expr<'a> {
        check_bit_width(bit_width, "a literal");
        let value = value.into().fit(bit_width, "a literal");
        self.expr(ExprData::Lit { value, bit_width }, Kind::Bits(bit_width))
    }

    /// Convenience method to create an [`Expr`] that represents a single `0` bit.
    ///
    /// [`Expr`]: ./struct.Expr.html
    pub fn low(&'a self) -> &'a Expr<'a> {
        self.lit(false, 1)
    }

    /// Convenience method to create an [`Expr`] that represents a single `1` bit.
    ///
    /// [`Expr`]: ./struct.Expr.html
    pub fn high(&'a self) -> &'a Expr<'a> {
        self.lit(true, 1)
    }

    /// Creates an input for this `Module` called `name` with `bit_width` bits.
    ///
    /// Inputs are driven from outside the module: by the parent instance, by an interface join, or by the simulation harness when the module is the top of a design.
    ///
    /// # Panics
    ///
    /// Panics if `bit_width` is less than [`MIN_SIGNAL_BIT_WIDTH`] or greater than [`MAX_SIGNAL_BIT_WIDTH`], respectively, or if this `Module` already has a member called `name`.
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
    /// let my_input = m.input("my_input", 80);
    /// ```
    ///
    /// [`MIN_SIGNAL_BIT_WIDTH`]: ./constant.MIN_SIGNAL_BIT_WIDTH.html
    /// [`MAX_SIGNAL_BIT_WIDTH`]: ./constant.MAX_SIGNAL_BIT_WIDTH.html
    pub fn input(&'a self, name: impl Into<String>, bit_width: u32) -> &'a Signal<'a> {
        self.signal(name, Direction::Input, bit_width)
    }

    /// Creates an output for this `Module` called `name` with `bit_width` bits.
    ///
    /// Outputs are combinational: the update routine must assign them on every path.
    ///
    /// # Panics
    ///
    /// Panics if `bit_width` is less than [`MIN_SIGNAL_BIT_WIDTH`] or greater than [`MAX_SIGNAL_BIT_WIDTH`], respectively, or if this `Module` already has a member called `name`.
    ///
    /// [`MIN_SIGNAL_BIT_WIDTH`]: ./constant.MIN_SIGNAL_BIT_WIDTH.html
    /// [`MAX_SIGNAL_BIT_WIDTH`]: ./constant.MAX_SIGNAL_BIT_WIDTH.html
    pub fn output(&'a self, name: impl Into<String>, bit_width: u32) -> &'a Signal<'a> {
        self.signal(name, Direction::Output, bit_width)
    }

    /// Creates an internal (unexposed) combinational wire.
    pub fn wire(&'a self, name: impl Into<String>, bit_width: u32) -> &'a Signal<'a> {
        self.signal(name, Direction::Internal, bit_width)
    }

    /// Creates a local variable, scoped to a single invocation of the update routine.
    ///
    /// A local holds no state between invocations: it must be assigned before it's read, and every read observes the assignments made earlier in the routine.
    pub fn local(&'a self, name: impl Into<String>, bit_width: u32) -> &'a Signal<'a> {
        self.signal(name, Direction::Local, bit_width)
    }

    /// Creates a combinational signal of any [`Kind`] with the given [`Direction`].
    ///
    /// # Examples
    ///
    /// ```
    /// use kumo::*;
    ///
    /// let state = EnumBuilder::new("State").variant("Idle").variant("Busy").build();
    ///
    /// let c = Context::new();
    ///
    /// let m = c.module("MyModule");
    /// let s = m.signal("s", Direction::Output, &state);
    /// assert_eq!(s.bit_width(), 1);
    /// ```
    ///
    /// [`Direction`]: ./enum.Direction.html
    /// [`Kind`]: ./enum.Kind.html
    pub fn signal(
        &'a self,
        name: impl Into<String>,
        direction: Direction,
        kind: impl Into<Kind>,
    ) -> &'a Signal<'a> {
        let what = match direction {
            Direction::Input => "an input",
            Direction::Output => "an output",
            Direction::Local => "a local",
            Direction::Internal => "a wire",
        };
        if self.is_black_box() && !direction.is_port() {
            self.black_box_error(what);
        }
        self.declare_signal(name.into(), direction, kind.into(), SignalClass::Wire, what)
    }

    /// Creates a register in this `Module` called `name`.
    ///
    /// A register's current value only changes on a clock edge, when it takes the next value computed by the update routine. Paths that don't assign it keep its current value. Its reset value is `0` unless specified with [`Signal::reset_value`].
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
    /// m.update(|b| {
    ///     b.assign(my_reg, !my_reg.current());
    /// });
    /// ```
    ///
    /// [`Signal::reset_value`]: ./struct.Signal.html#method.reset_value
    pub fn reg(&'a self, name: impl Into<String>, kind: impl Into<Kind>) -> &'a Signal<'a> {
        if self.is_black_box() {
            self.black_box_error("a register");
        }
        self.declare_signal(
            name.into(),
            Direction::Internal,
            kind.into(),
            SignalClass::Register {
                reset: Cell::new(None),
            },
            "a register",
        )
    }

    /// Creates a named constant element holding `value` in `bit_width` bits.
    ///
    /// # Panics
    ///
    /// Panics if `value` doesn't fit into `bit_width` bits, or if this `Module` already has a member called `name`.
    pub fn constant(
        &'a self,
        name: impl Into<String>,
        value: impl Into<Constant>,
        bit_width: u32,
    ) -> &'a Signal<'a> {
        if self.is_black_box() {
            self.black_box_error("a constant");
        }
        check_bit_width(bit_width, "a constant");
        let value = value.into().fit(bit_width, "a constant");
        self.declare_signal(
            name.into(),
            Direction::Internal,
            Kind::Bits(bit_width),
            SignalClass::Constant { value },
            "a constant",
        )
    }

    /// Creates an [`Expr`] that selects `when_true` if `cond` is high and `when_false` otherwise.
    ///
    /// # Panics
    ///
    /// Panics if the operands belong to different `Module`s, if `cond` isn't 1 bit wide, or if `when_true` and `when_false` have different bit widths or kinds.
    ///
    /// [`Expr`]: ./struct.Expr.html
    pub fn mux(
        &'a self,
        cond: &'a Expr<'a>,
        when_true: &'a Expr<'a>,
        when_false: &'a Expr<'a>,
    ) -> &'a Expr<'a> {
        cond.mux(when_true, when_false)
    }

    /// Creates an [`Expr`] holding the variant `name` of the enumeration `layout`, carrying `fields` in declaration order.
    ///
    /// # Panics
    ///
    /// Panics if `layout` doesn't have a variant called `name`, if the number of fields doesn't match, or if a field's bit width differs from the corresponding expression's.
    ///
    /// # Examples
    ///
    /// ```
    /// use kumo::*;
    ///
    /// let cmd = EnumBuilder::new("Cmd")
    ///     .variant("Nop")
    ///     .variant_with_fields("Write", &[("addr", 4), ("data", 8)])
    ///     .build();
    ///
    /// let c = Context::new();
    ///
    /// let m = c.module("MyModule");
    /// let write = m.variant(&cmd, "Write", &[m.lit(3u32, 4), m.lit(0xaau32, 8)]);
    /// assert_eq!(write.bit_width(), 13);
    /// ```
    ///
    /// [`Expr`]: ./struct.Expr.html
    pub fn variant(
        &'a self,
        layout: &Arc<EnumLayout>,
        name: &str,
        fields: &[&'a Expr<'a>],
    ) -> &'a Expr<'a> {
        let variant = layout.expect_variant(name);
        if variant.fields.len() != fields.len() {
            panic!(
                "Variant \"{}\" of enum \"{}\" has {} field(s), but {} value(s) were given.",
                name,
                layout.name,
                variant.fields.len(),
                fields.len()
            );
        }
        for (field, expr) in variant.fields.iter().zip(fields.iter()) {
            if !ptr::eq(self, expr.module) {
                panic!("Attempted to combine signals from different modules.");
            }
            if field.bit_width != expr.bit_width() {
                panic!(
                    "Field \"{}\" of variant \"{}\" is {} bit(s) wide, but the given value is {} bit(s) wide.",
                    field.name,
                    name,
                    field.bit_width,
                    expr.bit_width()
                );
            }
        }
        self.expr(
            ExprData::Variant {
                layout: layout.clone(),
                variant: name.to_string(),
                fields: fields.to_vec(),
            },
            Kind::Enum(layout.clone()),
        )
    }

    /// Creates an [`Expr`] holding a value of the struct `layout`, with one value per member in declaration order.
    ///
    /// # Panics
    ///
    /// Panics if the number of values doesn't match, or if a value's [`Kind`] differs from its member's.
    ///
    /// # Examples
    ///
    /// ```
    /// use kumo::*;
    ///
    /// let point = StructBuilder::new("Point").member("x", 4).member("y", 4).build();
    ///
    /// let c = Context::new();
    ///
    /// let m = c.module("MyModule");
    /// let p = m.structure(&point, &[m.lit(1u32, 4), m.lit(2u32, 4)]);
    /// assert_eq!(p.bit_width(), 8);
    /// ```
    ///
    /// [`Expr`]: ./struct.Expr.html
    /// [`Kind`]: ./enum.Kind.html
    pub fn structure(&'a self, layout: &Arc<StructLayout>, values: &[&'a Expr<'a>]) -> &'a Expr<'a> {
        if layout.members.len() != values.len() {
            panic!(
                "Struct \"{}\" has {} member(s), but {} value(s) were given.",
                layout.name,
                layout.members.len(),
                values.len()
            );
        }
        for (member, expr) in layout.members.iter().zip(values.iter()) {
            if !ptr::eq(self, expr.module) {
                panic!("Attempted to combine signals from different modules.");
            }
            if member.kind != *expr.kind() {
                panic!(
                    "Member \"{}\" of struct \"{}\" has {}, but the given value has {}.",
                    member.name,
                    layout.name,
                    member.kind,
                    expr.kind()
                );
            }
        }
        let parts = layout
            .members
            .iter()
            .zip(values.iter())
            .map(|(member, expr)| (member.offset, *expr))
            .collect();
        self.expr(ExprData::Aggregate { parts }, Kind::Struct(layout.clone()))
    }

    /// Creates an array-valued [`Expr`] from `elements`, element 0 first.
    ///
    /// # Panics
    ///
    /// Panics if `elements` is empty, if the elements' [`Kind`]s differ, or if the array would be wider than [`MAX_SIGNAL_BIT_WIDTH`].
    ///
    /// [`Expr`]: ./struct.Expr.html
    /// [`Kind`]: ./enum.Kind.html
    /// [`MAX_SIGNAL_BIT_WIDTH`]: ./constant.MAX_SIGNAL_BIT_WIDTH.html
    pub fn array(&'a self, elements: &[&'a Expr<'a>]) -> &'a Expr<'a> {
        let first = match elements.first() {
            Some(first) => first,
            None => panic!("Cannot create an array with 0 elements."),
        };
        for expr in elements.iter() {
            if !ptr::eq(self, expr.module) {
                panic!("Attempted to combine signals from different modules.");
            }
            if expr.kind() != first.kind() {
                panic!(
                    "Array elements must all have the same kind, but {} and {} were given.",
                    first.kind(),
                    expr.kind()
                );
            }
        }
        let layout = ArrayLayout::new(first.kind().clone(), elements.len() as u32);
        let parts = elements
            .iter()
            .enumerate()
            .map(|(index, expr)| (layout.offset(index as u32), *expr))
            .collect();
        self.expr(ExprData::Aggregate { parts }, Kind::Array(layout))
    }

    /// Creates an [`Instance`] called `instance_name` of the `Module` identified by `module_name` in this [`Context`] inside this `Module` definition.
    ///
    /// Children are instantiated in declaration order.
    ///
    /// # Panics
    ///
    /// Panics if a `Module` identified by `module_name` doesn't exist in this [`Context`], or if this `Module` already has a member called `instance_name`.
    ///
    /// # Examples
    ///
    /// ```
    /// use kumo::*;
    ///
    /// let c = Context::new();
    ///
    /// // Inner module (simple pass-through)
    /// let inner = c.module("Inner");
    /// let inner_i = inner.input("i", 32);
    /// let inner_o = inner.output("o", 32);
    /// inner.update(|b| b.assign(inner_o, inner_i.current()));
    ///
    /// // Outer module (wraps a single `Inner` instance)
    /// let outer = c.module("Outer");
    /// let i = outer.input("i", 32);
    /// let o = outer.output("o", 32);
    /// let inner_inst = outer.instance("inner_inst", "Inner");
    /// outer.update(|b| {
    ///     b.assign(inner_inst.port("i"), i.current());
    ///     b.assign(o, inner_inst.port("o").current());
    /// });
    /// ```
    ///
    /// [`Context`]: ./struct.Context.html
    /// [`Instance`]: ./struct.Instance.html
    pub fn instance(
        &'a self,
        instance_name: impl Into<String>,
        module_name: &str,
    ) -> &'a Instance<'a> {
        if self.is_black_box() {
            self.black_box_error("an instance");
        }
        let instance_name = instance_name.into();
        let instantiated_module = match self.context.modules.borrow().get(module_name) {
            Some(instantiated_module) => *instantiated_module,
            _ => panic!("Attempted to instantiate a module identified by \"{}\", but no such module exists in this context.", module_name),
        };
        self.check_unique_name(&instance_name);
        let mut instances = self.instances.borrow_mut();
        let ret = self.context.instance_arena.alloc(Instance {
            context: self.context,
            module: self,

            instantiated_module,
            name: instance_name,
            index: instances.len(),
        });
        instances.push(ret);
        ret
    }

    /// Creates an [`Interface`] called `name`, a bundle of input and output signals declared by `f`.
    ///
    /// Member `x` of interface `bus` is an ordinary signal of this `Module` called `bus.x`.
    ///
    /// # Examples
    ///
    /// ```
    /// use kumo::*;
    ///
    /// let c = Context::new();
    ///
    /// let producer = c.module("Producer");
    /// let bus = producer.interface("bus", |i| {
    ///     i.output("data", 8);
    ///     i.output("valid", 1);
    ///     i.input("ready", 1);
    /// });
    /// assert_eq!(bus.signal("data").name(), "bus.data");
    /// ```
    ///
    /// [`Interface`]: ./struct.Interface.html
    pub fn interface(
        &'a self,
        name: impl Into<String>,
        f: impl FnOnce(&mut InterfaceBuilder<'a>),
    ) -> &'a Interface<'a> {
        let name = name.into();
        self.check_unique_name(&name);
        let mut builder = InterfaceBuilder {
            module: self,
            name: name.clone(),
            signals: IndexMap::new(),
        };
        f(&mut builder);
        if builder.signals.is_empty() {
            panic!(
                "Interface \"{}\" of module \"{}\" must have at least one signal.",
                name, self.name
            );
        }
        let ret = self.context.interface_arena.alloc(Interface {
            module: self,

            data: InterfaceData::Declared {
                name,
                signals: builder.signals,
            },
        });
        self.interfaces.borrow_mut().push(ret);
        ret
    }

    /// Records the update routine of this `Module`.
    ///
    /// `f` describes one invocation of the routine as a tree of statements built through the given [`Block`]. The tree is compiled into guarded assignments when the design is elaborated.
    ///
    /// # Panics
    ///
    /// Panics if this `Module` already has an update routine, or if it's a black box.
    ///
    /// [`Block`]: ./struct.Block.html
    pub fn update(&'a self, f: impl FnOnce(&mut Block<'a>)) {
        if self.is_black_box() {
            panic!(
                "Black-box module \"{}\" can't have an update routine.",
                self.name
            );
        }
        if self.update.borrow().is_some() {
            panic!(
                "Module \"{}\" already has an update routine.",
                self.name
            );
        }
        let mut block = Block::new(self);
        f(&mut block);
        *self.update.borrow_mut() = Some(block.stmts);
    }

    pub(crate) fn expr(&'a self, data: ExprData<'a>, kind: Kind) -> &'a Expr<'a> {
        self.context.expr_arena.alloc(Expr {
            module: self,

            data,
            kind,
        })
    }

    pub(crate) fn alloc_loop_var(&self) -> usize {
        let var = self.next_loop_var.get();
        self.next_loop_var.set(var + 1);
        var
    }

    pub(crate) fn find_signal(&self, name: &str) -> Option<&'a Signal<'a>> {
        self.signals
            .borrow()
            .iter()
            .find(|signal| signal.name() == name)
            .copied()
    }

    pub(crate) fn find_interface(&self, name: &str) -> Option<&'a Interface<'a>> {
        self.interfaces
            .borrow()
            .iter()
            .find(|interface| interface.name() == name)
            .copied()
    }

    pub(super) fn declare_signal(
        &'a self,
        name: String,
        direction: Direction,
        kind: Kind,
        class: SignalClass,
        what: &str,
    ) -> &'a Signal<'a> {
        check_bit_width(kind.bit_width(), what);
        self.check_unique_name(&name);
        let mut signals = self.signals.borrow_mut();
        let ret = self.context.signal_arena.alloc(Signal {
            module: self,

            data: SignalData::Declared {
                index: signals.len(),
                name,
                direction,
                kind,
                class,
            },
        });
        signals.push(ret);
        ret
    }

    fn check_unique_name(&self, name: &str) {
        let taken = self.find_signal(name).is_some()
            || self.find_interface(name).is_some()
            || self
                .instances
                .borrow()
                .iter()
                .any(|instance| instance.name == name);
        if taken {
            panic!(
                "Module \"{}\" already has a member called \"{}\".",
                self.name, name
            );
        }
    }

    fn black_box_error(&self, what: &str) -> ! {
        panic!(
            "Cannot create {} in black-box module \"{}\". Black boxes only declare inputs, outputs and interfaces.",
            what, self.name
        );
    }
}
