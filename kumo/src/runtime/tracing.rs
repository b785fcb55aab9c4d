//! Value-change tracing for simulation runs.
//!
//! A [`Simulation`] with an attached [`Trace`] declares its instance hierarchy once, then reports every slot's value after each clock step.
//!
//! [`Simulation`]: ../../sim/struct.Simulation.html
//! [`Trace`]: ./trait.Trace.html

pub mod vcd;

use std::io;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TraceValue {
    /// Contains a boolean value
    Bool(bool),
    /// Contains an unsigned, 32-bit value
    U32(u32),
    /// Contains an unsigned, 64-bit value
    U64(u64),
    /// Contains an unsigned, 128-bit value
    U128(u128),
}

impl TraceValue {
    pub(crate) fn new(type_: TraceValueType, value: u128) -> TraceValue {
        match type_ {
            TraceValueType::Bool => TraceValue::Bool(value != 0),
            TraceValueType::U32 => TraceValue::U32(value as _),
            TraceValueType::U64 => TraceValue::U64(value as _),
            TraceValueType::U128 => TraceValue::U128(value),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TraceValueType {
    Bool,
    U32,
    U64,
    U128,
}

impl TraceValueType {
    pub(crate) fn from_bit_width(bit_width: u32) -> TraceValueType {
        if bit_width == 1 {
            TraceValueType::Bool
        } else if bit_width <= 32 {
            TraceValueType::U32
        } else if bit_width <= 64 {
            TraceValueType::U64
        } else {
            TraceValueType::U128
        }
    }
}

/// A sink for value changes.
///
/// Declarations arrive first: `push_module`/`pop_module` pairs bracket each instance, with `add_signal` calls for the instance's signals in between. After that, each clock step reports a time stamp followed by one `update_signal` call per declared signal, using the id `add_signal` returned.
pub trait Trace {
    fn push_module(&mut self, name: &str) -> io::Result<()>;
    fn pop_module(&mut self) -> io::Result<()>;
    fn add_signal(&mut self, name: &str, bit_width: u32, type_: TraceValueType) -> io::Result<usize>;

    fn update_time_stamp(&mut self, time_stamp: u64) -> io::Result<()>;
    fn update_signal(&mut self, signal_id: usize, value: TraceValue) -> io::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_types_by_width() {
        assert_eq!(TraceValueType::from_bit_width(1), TraceValueType::Bool);
        assert_eq!(TraceValueType::from_bit_width(2), TraceValueType::U32);
        assert_eq!(TraceValueType::from_bit_width(33), TraceValueType::U64);
        assert_eq!(TraceValueType::from_bit_width(128), TraceValueType::U128);

        assert_eq!(TraceValue::new(TraceValueType::Bool, 1), TraceValue::Bool(true));
        assert_eq!(TraceValue::new(TraceValueType::U64, 0xdead_beef_f00d), TraceValue::U64(0xdead_beef_f00d));
    }
}
