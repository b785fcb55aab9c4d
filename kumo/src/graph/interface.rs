use super::instance::*;
use super::kind::*;
use super::module::*;
use super::signal::*;

use indexmap::IndexMap;

/// A named bundle of input and output [`Signal`]s, created by the [`Module`]::[`interface`] method.
///
/// Two interfaces can be joined with [`Block::join`] when they have the same member names and every member pair has complementary directions: the output side drives the input side.
///
/// [`Block::join`]: ./struct.Block.html#method.join
/// [`interface`]: ./struct.Module.html#method.interface
/// [`Module`]: ./struct.Module.html
/// [`Signal`]: ./struct.Signal.html
#[must_use]
pub struct Interface<'a> {
    pub(crate) module: &'a Module<'a>,

    pub(crate) data: InterfaceData<'a>,
}

pub(crate) enum InterfaceData<'a> {
    Declared {
        name: String,
        signals: IndexMap<String, &'a Signal<'a>>,
    },
    Instance {
        instance: &'a Instance<'a>,
        interface: &'a Interface<'a>,
    },
}

impl<'a> Interface<'a> {
    /// Returns the declared name of this `Interface`.
    pub fn name(&self) -> &str {
        match &self.data {
            InterfaceData::Declared { name, .. } => name,
            InterfaceData::Instance { interface, .. } => interface.name(),
        }
    }

    /// Returns the name of this `Interface` as seen from the module it's used in, eg. `fifo.push` for interface `push` of instance `fifo`.
    pub fn path(&self) -> String {
        match &self.data {
            InterfaceData::Declared { name, .. } => name.clone(),
            InterfaceData::Instance {
                instance,
                interface,
            } => format!("{}.{}", instance.name, interface.name()),
        }
    }

    /// Returns the member names of this `Interface` in declaration order.
    pub fn member_names(&self) -> Vec<&str> {
        match &self.data {
            InterfaceData::Declared { signals, .. } => signals.keys().map(|name| name.as_str()).collect(),
            InterfaceData::Instance { interface, .. } => interface.member_names(),
        }
    }

    /// Returns the member called `name` of this `Interface`. For an interface of an [`Instance`], this is the corresponding port of the instance.
    ///
    /// # Panics
    ///
    /// Panics if this `Interface` doesn't have a member called `name`.
    ///
    /// [`Instance`]: ./struct.Instance.html
    pub fn signal(&'a self, name: &str) -> &'a Signal<'a> {
        match &self.data {
            InterfaceData::Declared { signals, .. } => match signals.get(name) {
                Some(signal) => *signal,
                None => self.unknown_member(name),
            },
            InterfaceData::Instance {
                instance,
                interface,
            } => {
                let member = interface.signal(name);
                instance.port(member.name())
            }
        }
    }

    pub(crate) fn members(&'a self) -> Vec<(&'a str, &'a Signal<'a>)> {
        match &self.data {
            InterfaceData::Declared { signals, .. } => signals
                .iter()
                .map(|(name, signal)| (name.as_str(), *signal))
                .collect(),
            InterfaceData::Instance {
                instance,
                interface,
            } => interface
                .members()
                .into_iter()
                .map(|(name, member)| (name, instance.port(member.name())))
                .collect(),
        }
    }

    fn unknown_member(&self, name: &str) -> ! {
        panic!(
            "Interface \"{}\" doesn't have a member called \"{}\".",
            self.path(),
            name
        );
    }
}

/// Declares the members of an [`Interface`]; see [`Module::interface`].
///
/// [`Interface`]: ./struct.Interface.html
/// [`Module::interface`]: ./struct.Module.html#method.interface
pub struct InterfaceBuilder<'a> {
    pub(super) module: &'a Module<'a>,
    pub(super) name: String,
    pub(super) signals: IndexMap<String, &'a Signal<'a>>,
}

impl<'a> InterfaceBuilder<'a> {
    pub fn input(&mut self, name: &str, bit_width: u32) -> &'a Signal<'a> {
        self.signal(name, Direction::Input, bit_width)
    }

    pub fn output(&mut self, name: &str, bit_width: u32) -> &'a Signal<'a> {
        self.signal(name, Direction::Output, bit_width)
    }

    /// # Panics
    ///
    /// Panics if `direction` is neither [`Direction::Input`] nor [`Direction::Output`], or if this interface already has a member called `name`.
    ///
    /// [`Direction::Input`]: ./enum.Direction.html#variant.Input
    /// [`Direction::Output`]: ./enum.Direction.html#variant.Output
    pub fn signal(&mut self, name: &str, direction: Direction, kind: impl Into<Kind>) -> &'a Signal<'a> {
        if !direction.is_port() {
            panic!(
                "Interface members must be inputs or outputs, but member \"{}\" of interface \"{}\" was declared as {}.",
                name, self.name, direction
            );
        }
        if self.signals.contains_key(name) {
            panic!(
                "Interface \"{}\" already has a member called \"{}\".",
                self.name, name
            );
        }
        let signal = self
            .module
            .signal(format!("{}.{}", self.name, name), direction, kind);
        self.signals.insert(name.to_string(), signal);
        signal
    }
}
