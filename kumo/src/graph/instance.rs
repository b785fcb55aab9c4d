use super::context::*;
use super::interface::*;
use super::module::*;
use super::signal::*;

/// An instance of a [`Module`], created by the [`Module`]::[`instance`] method.
///
/// An instance's ports are reached from the parent's update routine through [`port`]: the parent assigns the child's inputs and reads its outputs.
///
/// # Examples
///
/// ```
/// use kumo::*;
///
/// let c = Context::new();
///
/// let inner = c.module("Inner");
/// let i = inner.input("i", 32);
/// let o = inner.output("o", 32);
/// inner.update(|b| b.assign(o, !i.current()));
///
/// let outer = c.module("Outer");
/// let outer_o = outer.output("o", 32);
/// let inner_inst = outer.instance("inner_inst", "Inner");
/// outer.update(|b| {
///     // Drive inner_inst's "i" input with a 32-bit literal
///     b.assign(inner_inst.port("i"), outer.lit(0xfadebabeu32, 32));
///     b.assign(outer_o, inner_inst.port("o").current());
/// });
/// ```
///
/// [`instance`]: ./struct.Module.html#method.instance
/// [`Module`]: ./struct.Module.html
/// [`port`]: #method.port
#[must_use]
pub struct Instance<'a> {
    pub(super) context: &'a Context<'a>,
    pub(super) module: &'a Module<'a>,

    pub(crate) instantiated_module: &'a Module<'a>,
    pub(crate) name: String,
    pub(crate) index: usize,
}

impl<'a> Instance<'a> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the [`Module`] definition this `Instance` instantiates.
    ///
    /// [`Module`]: ./struct.Module.html
    pub fn instantiated_module(&self) -> &'a Module<'a> {
        self.instantiated_module
    }

    /// Returns a [`Signal`] that refers to the input or output called `name` of this `Instance`, in the scope of the parent module.
    ///
    /// # Panics
    ///
    /// Panics if the instantiated module doesn't have an input or output called `name`.
    ///
    /// [`Signal`]: ./struct.Signal.html
    pub fn port(&'a self, name: &str) -> &'a Signal<'a> {
        let port = match self.instantiated_module.find_signal(name) {
            Some(port) if port.direction().is_port() => port,
            _ => panic!("Attempted to access a port called \"{}\" on an instance of \"{}\", but no such input or output exists on this module.", name, self.instantiated_module.name),
        };
        self.context.signal_arena.alloc(Signal {
            module: self.module,

            data: SignalData::InstancePort {
                instance: self,
                port,
            },
        })
    }

    /// Returns the [`Interface`] called `name` of this `Instance`, in the scope of the parent module. Its members are this `Instance`'s ports.
    ///
    /// # Panics
    ///
    /// Panics if the instantiated module doesn't have an interface called `name`.
    ///
    /// [`Interface`]: ./struct.Interface.html
    pub fn interface(&'a self, name: &str) -> &'a Interface<'a> {
        let interface = match self.instantiated_module.find_interface(name) {
            Some(interface) => interface,
            _ => panic!("Attempted to access an interface called \"{}\" on an instance of \"{}\", but no such interface exists on this module.", name, self.instantiated_module.name),
        };
        self.context.interface_arena.alloc(Interface {
            module: self.module,

            data: InterfaceData::Instance {
                instance: self,
                interface,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::ptr;

    #[test]
    #[should_panic(
        expected = "Attempted to access a port called \"nope\" on an instance of \"A\", but no such input or output exists on this module."
    )]
    fn port_nonexistent_error() {
        let c = Context::new();

        let a = c.module("A");
        let _ = a.input("i", 1);

        let b = c.module("B");
        let inst = b.instance("a", "A");

        // Panic
        let _ = inst.port("nope");
    }

    #[test]
    #[should_panic(
        expected = "Attempted to access a port called \"w\" on an instance of \"A\", but no such input or output exists on this module."
    )]
    fn port_internal_error() {
        let c = Context::new();

        let a = c.module("A");
        let _ = a.wire("w", 1);

        let b = c.module("B");
        let inst = b.instance("a", "A");

        // Panic
        let _ = inst.port("w");
    }

    #[test]
    #[should_panic(
        expected = "Attempted to access an interface called \"bus\" on an instance of \"A\", but no such interface exists on this module."
    )]
    fn interface_nonexistent_error() {
        let c = Context::new();

        let _ = c.module("A");

        let b = c.module("B");
        let inst = b.instance("a", "A");

        // Panic
        let _ = inst.interface("bus");
    }

    #[test]
    fn instances_are_indexed_in_declaration_order() {
        let c = Context::new();

        let a = c.module("A");
        let b = c.module("B");
        let first = b.instance("first", "A");
        let second = b.instance("second", "A");

        assert_eq!(first.index, 0);
        assert_eq!(second.index, 1);
        assert!(ptr::eq(second.instantiated_module(), a));
        assert!(ptr::eq(first.module, b));
    }
}
