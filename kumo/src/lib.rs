//! An [HDL](https://en.wikipedia.org/wiki/Hardware_description_language) core embedded in [Rust](https://www.rust-lang.org/), with procedural update routines and an event-driven simulator.
//!
//! kumo describes hardware as [`Module`]s whose behavior is written as an ordinary-looking update routine: assignments, `if`/`match`, loops and scoped locals. Each routine is translated into a graph of guarded assignments, statically checked for latches, uninitialized reads, non-exhaustive matches and direction errors, and then [elaborated](fn.elaborate.html) into a [`Design`] that can be [simulated](sim/struct.Simulation.html), exported with [`serde`](https://serde.rs/) or dumped as a textual netlist.
//!
//! Like any HDL, every [`Signal`] has a *current* value, which the routine reads, and a *next* value, which the routine assigns. Registers take their next value on a clock step; every other signal takes it as soon as the design settles.
//!
//! # Usage
//!
//! ```toml
//! [dependencies]
//! kumo = "0.1"
//! ```
//!
//! # Examples
//!
//! ```rust
//! # fn main() -> Result<(), kumo::Error> {
//! use kumo::*;
//! use kumo::sim::*;
//!
//! // Create a context, which will contain our module(s)
//! let c = Context::new();
//!
//! // A 2-bit counter that counts while `enable` is high
//! let counter = c.module("Counter");
//! let enable = counter.input("enable", 1);
//! let count = counter.output("count", 2);
//! let value = counter.reg("value", 2);
//! value.reset_value(0u32);
//! counter.update(|b| {
//!     b.if_(enable.current(), |b| {
//!         b.assign(value, value.current() + counter.lit(1u32, 2));
//!     });
//!     b.assign(count, value.current());
//! });
//!
//! // Translate, validate and lay out the hierarchy
//! let design = elaborate(counter)?;
//!
//! // Simulate it
//! let mut sim = Simulation::new(&design, SimConfig::default());
//! for &e in [1, 1, 0, 1].iter() {
//!     sim.set("enable", e)?;
//!     sim.advance_clock()?;
//! }
//! assert_eq!(sim.get("count")?, 3);
//!
//! // Dump a netlist
//! design.write_netlist(&mut std::io::stdout())?;
//! # Ok(())
//! # }
//! ```
//!
//! [`Design`]: ./struct.Design.html
//! [`Module`]: ./struct.Module.html
//! [`Signal`]: ./struct.Signal.html

// Must be kept up-to-date with version in Cargo.toml
#![doc(html_root_url = "https://docs.rs/kumo/0.1.0")]

mod code_writer;
mod elaborate;
mod error;
mod graph;
pub mod ir;
pub mod runtime;
pub mod sim;
mod translate;
mod validation;

pub use code_writer::CodeWriterError;
pub use elaborate::*;
pub use error::*;
pub use graph::*;
pub use sim::{BlackBox, BlackBoxFactory, BlackBoxIo};
pub use translate::translate;
pub use validation::validate;
