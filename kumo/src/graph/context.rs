use super::expr::*;
use super::instance::*;
use super::interface::*;
use super::module::*;
use super::signal::*;

use crate::sim::{BlackBox, BlackBoxFactory};

use indexmap::IndexMap;
use typed_arena::Arena;

use std::cell::RefCell;
use std::sync::Arc;

/// A top-level container/owner object for a [`Module`] graph.
///
/// A `Context` owns all parts of a module graph, and provides an API for creating [`Module`] definitions.
///
/// # Examples
///
/// ```
/// use kumo::*;
///
/// let c = Context::new();
///
/// let m = c.module("Inverter");
/// let i = m.input("i", 1);
/// let o = m.output("o", 1);
/// m.update(|b| {
///     b.assign(o, !i.current());
/// });
/// ```
///
/// [`Module`]: ./struct.Module.html
#[must_use]
pub struct Context<'a> {
    pub(super) module_arena: Arena<Module<'a>>,
    pub(super) signal_arena: Arena<Signal<'a>>,
    pub(super) expr_arena: Arena<Expr<'a>>,
    pub(super) instance_arena: Arena<Instance<'a>>,
    pub(super) interface_arena: Arena<Interface<'a>>,

    pub(crate) modules: RefCell<IndexMap<String, &'a Module<'a>>>,
}

impl<'a> Context<'a> {
    /// Creates a new, empty `Context`.
    ///
    /// # Examples
    ///
    /// ```
    /// use kumo::*;
    ///
    /// let c = Context::new();
    /// ```
    pub fn new() -> Context<'a> {
        Context {
            module_arena: Arena::new(),
            signal_arena: Arena::new(),
            expr_arena: Arena::new(),
            instance_arena: Arena::new(),
            interface_arena: Arena::new(),

            modules: RefCell::new(IndexMap::new()),
        }
    }

    /// Creates a new [`Module`] definition called `name` in this `Context`.
    ///
    /// Conventionally, `name` should be `CamelCase`, though this is not enforced.
    ///
    /// # Panics
    ///
    /// Panics if a [`Module`] with the same `name` already exists in this `Context`.
    ///
    /// # Examples
    ///
    /// ```
    /// use kumo::*;
    ///
    /// let c = Context::new();
    ///
    /// let my_module = c.module("MyModule");
    /// let another_mod = c.module("AnotherMod");
    /// ```
    ///
    /// The following example panics by creating a `Module` with the same `name` as a previously-created `Module` in the same `Context`:
    ///
    /// ```should_panic
    /// use kumo::*;
    ///
    /// let c = Context::new();
    ///
    /// let _ = c.module("A"); // Unique name, OK
    /// let _ = c.module("B"); // Unique name, OK
    ///
    /// let _ = c.module("A"); // Non-unique name, panic!
    /// ```
    ///
    /// [`Module`]: ./struct.Module.html
    pub fn module(&'a self, name: impl Into<String>) -> &'a Module<'a> {
        self.declare(name.into(), None)
    }

    /// Creates a behavioral black-box [`Module`] definition called `name`.
    ///
    /// The returned module only declares its boundary (inputs, outputs and interfaces); it can't have an update routine. Every simulation run calls `factory` once per instance of this module to create the model that stands in for its logic.
    ///
    /// # Panics
    ///
    /// Panics if a [`Module`] with the same `name` already exists in this `Context`.
    ///
    /// # Examples
    ///
    /// ```
    /// use kumo::*;
    ///
    /// struct Doubler;
    ///
    /// impl BlackBox for Doubler {
    ///     fn update(&mut self, io: &mut BlackBoxIo) {
    ///         let value = io.get("i");
    ///         io.set("o", value << 1);
    ///     }
    /// }
    ///
    /// let c = Context::new();
    ///
    /// let doubler = c.black_box("Doubler", || Doubler);
    /// doubler.input("i", 8);
    /// doubler.output("o", 9);
    /// ```
    ///
    /// [`Module`]: ./struct.Module.html
    pub fn black_box<F, B>(&'a self, name: impl Into<String>, factory: F) -> &'a Module<'a>
    where
        F: Fn() -> B + Send + Sync + 'static,
        B: BlackBox + 'static,
    {
        let factory: BlackBoxFactory = Arc::new(move || Box::new(factory()) as Box<dyn BlackBox>);
        self.declare(name.into(), Some(factory))
    }

    fn declare(&'a self, name: String, black_box: Option<BlackBoxFactory>) -> &'a Module<'a> {
        if self.modules.borrow().contains_key(&name) {
            panic!(
                "A module with the name \"{}\" already exists in this context.",
                name
            );
        }
        let module = self
            .module_arena
            .alloc(Module::new(self, name.clone(), black_box));
        self.modules.borrow_mut().insert(name, module);
        module
    }
}

impl<'a> Default for Context<'a> {
    fn default() -> Self {
        Context::new()
    }
}
