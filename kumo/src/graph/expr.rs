use super::kind::*;
use super::module::*;
use super::signal::*;

use crate::ir::BinOp;

use std::ops::{Add, BitAnd, BitOr, BitXor, Not, Sub};
use std::ptr;
use std::sync::Arc;

/// A value computed from literals and the current values of [`Signal`]s.
///
/// `Expr`s are created by [`Signal::current`], by [`Module`] methods (eg. [`lit`], [`mux`]) or by combining existing `Expr`s. An `Expr` describes combinational logic; it only has meaning inside the update routine of the [`Module`] it belongs to.
///
/// # Examples
///
/// ```
/// use kumo::*;
///
/// let c = Context::new();
///
/// let m = c.module("MyModule");
/// let a = m.lit(0xffu8, 8); // 8-bit value
/// let b = m.input("my_input", 27).current(); // 27-bit value
/// let c = b.bits(7, 0); // 8-bit value
/// let d = a + c; // 8-bit value
/// assert_eq!(d.bit_width(), 8);
/// ```
///
/// [`lit`]: ./struct.Module.html#method.lit
/// [`mux`]: ./struct.Module.html#method.mux
/// [`Module`]: ./struct.Module.html
/// [`Signal`]: ./struct.Signal.html
/// [`Signal::current`]: ./struct.Signal.html#method.current
#[must_use]
pub struct Expr<'a> {
    pub(crate) module: &'a Module<'a>,

    pub(crate) data: ExprData<'a>,
    pub(crate) kind: Kind,
}

pub(crate) enum ExprData<'a> {
    Lit {
        value: u128,
        bit_width: u32,
    },
    Current {
        signal: &'a Signal<'a>,
    },
    Next {
        signal: &'a Signal<'a>,
    },
    LoopIndex {
        var: usize,
        bit_width: u32,
    },
    Not {
        source: &'a Expr<'a>,
    },
    BinOp {
        lhs: &'a Expr<'a>,
        rhs: &'a Expr<'a>,
        op: BinOp,
    },
    Bits {
        source: &'a Expr<'a>,
        range_high: u32,
        range_low: u32,
    },
    Concat {
        lhs: &'a Expr<'a>,
        rhs: &'a Expr<'a>,
    },
    Resize {
        source: &'a Expr<'a>,
        bit_width: u32,
    },
    Mux {
        cond: &'a Expr<'a>,
        when_true: &'a Expr<'a>,
        when_false: &'a Expr<'a>,
    },
    Variant {
        layout: Arc<EnumLayout>,
        variant: String,
        fields: Vec<&'a Expr<'a>>,
    },
    /// Struct or array members, each placed at its bit offset.
    Aggregate {
        parts: Vec<(u32, &'a Expr<'a>)>,
    },
    /// Same bits as `source`, read as this `Expr`'s kind.
    Cast {
        source: &'a Expr<'a>,
    },
}

impl<'a> Expr<'a> {
    /// Returns the bit width of the given `Expr`.
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
    /// assert_eq!(m.lit(42u32, 7).bit_width(), 7);
    /// assert_eq!(m.input("i", 27).current().bit_width(), 27);
    /// assert_eq!((!m.low()).bit_width(), 1);
    /// assert_eq!((m.lit(25u8, 8) + m.lit(42u8, 8)).bit_width(), 8);
    /// assert_eq!(m.lit(12u32, 100).bit(30).bit_width(), 1);
    /// assert_eq!(m.lit(1u32, 99).bits(37, 29).bit_width(), 9);
    /// assert_eq!(m.lit(1u32, 20).concat(m.high()).bit_width(), 21);
    /// assert_eq!(m.lit(1u32, 20).resize(3).bit_width(), 3);
    /// assert_eq!(m.lit(0xaau32, 8).eq(m.lit(0xaau32, 8)).bit_width(), 1);
    /// assert_eq!(m.lit(0xaau32, 8).lt(m.lit(0xaau32, 8)).bit_width(), 1);
    /// assert_eq!(m.mux(m.low(), m.lit(5u32, 4), m.lit(6u32, 4)).bit_width(), 4);
    /// ```
    pub fn bit_width(&self) -> u32 {
        self.kind.bit_width()
    }

    pub fn kind(&self) -> &Kind {
        &self.kind
    }

    fn alloc(&'a self, data: ExprData<'a>, bit_width: u32) -> &'a Expr<'a> {
        self.module.expr(data, Kind::Bits(bit_width))
    }

    // Signed results stay signed; everything else collapses to plain bits.
    fn numeric_kind(&self, bit_width: u32) -> Kind {
        if self.kind.is_signed() {
            Kind::Signed(bit_width)
        } else {
            Kind::Bits(bit_width)
        }
    }

    fn check_same_module(&self, other: &Expr<'a>) {
        if !ptr::eq(self.module, other.module) {
            panic!("Attempted to combine signals from different modules.");
        }
    }

    fn check_same_bit_width(&self, other: &Expr<'a>) {
        if self.bit_width() != other.bit_width() {
            panic!(
                "Signals have different bit widths ({} and {}, respectively).",
                self.bit_width(),
                other.bit_width()
            );
        }
    }

    fn check_same_signedness(&self, other: &Expr<'a>) {
        if self.kind.is_signed() != other.kind.is_signed() {
            panic!(
                "Cannot combine a signed and an unsigned value ({} and {}, respectively).",
                self.kind, other.kind
            );
        }
    }

    fn bin_op(&'a self, rhs: &'a Expr<'a>, op: BinOp) -> &'a Expr<'a> {
        self.check_same_module(rhs);
        self.check_same_bit_width(rhs);
        self.check_same_signedness(rhs);
        let op = if self.kind.is_signed() { op.signed() } else { op };
        let kind = if op.is_comparison() {
            Kind::Bits(1)
        } else {
            self.numeric_kind(self.bit_width())
        };
        self.module.expr(ExprData::BinOp { lhs: self, rhs, op }, kind)
    }

    fn shift(&'a self, rhs: &'a Expr<'a>, op: BinOp) -> &'a Expr<'a> {
        self.check_same_module(rhs);
        let op = if self.kind.is_signed() { op.signed() } else { op };
        self.module.expr(
            ExprData::BinOp { lhs: self, rhs, op },
            self.numeric_kind(self.bit_width()),
        )
    }

    // A slice of this `Expr` starting at `range_low`, typed as `kind`.
    fn view(&'a self, range_low: u32, kind: Kind) -> &'a Expr<'a> {
        self.module.expr(
            ExprData::Bits {
                source: self,
                range_high: range_low + kind.bit_width() - 1,
                range_low,
            },
            kind,
        )
    }

    /// Creates an `Expr` that represents the value of the single bit of this `Expr` at index `index`, where `index` equal to `0` represents this `Expr`'s least significant bit.
    ///
    /// # Panics
    ///
    /// Panics if `index` is greater than or equal to this `Expr`'s `bit_width`.
    pub fn bit(&'a self, index: u32) -> &'a Expr<'a> {
        if index >= self.bit_width() {
            panic!("Attempted to take bit index {} from a signal with a width of {} bits. Bit indices must be in the range [0, {}] for a signal with a width of {} bits.", index, self.bit_width(), self.bit_width() - 1, self.bit_width());
        }
        self.bits(index, index)
    }

    /// Creates an `Expr` that represents a contiguous subset of the bits of this `Expr`, starting at `range_low` as the least significant bit and ending at `range_high` as the most significant bit, inclusive.
    ///
    /// # Panics
    ///
    /// Panics if either `range_low` or `range_high` is greater than or equal to the bit width of this `Expr`, or if `range_low` is greater than `range_high`.
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
    /// let lit = m.lit(0b0110u32, 4);
    /// let bits_210 = lit.bits(2, 0); // Represents 0b110
    /// let bits_321 = lit.bits(3, 1); // Represents 0b011
    /// ```
    pub fn bits(&'a self, range_high: u32, range_low: u32) -> &'a Expr<'a> {
        if range_low >= self.bit_width() {
            panic!("Cannot specify a range of bits where the lower bound is greater than or equal to the number of bits in the source signal. The bounds must be in the range [0, {}] for a signal with a width of {} bits, but a lower bound of {} was given.", self.bit_width() - 1, self.bit_width(), range_low);
        }
        if range_high >= self.bit_width() {
            panic!("Cannot specify a range of bits where the upper bound is greater than or equal to the number of bits in the source signal. The bounds must be in the range [0, {}] for a signal with a width of {} bits, but an upper bound of {} was given.", self.bit_width() - 1, self.bit_width(), range_high);
        }
        if range_low > range_high {
            panic!("Cannot specify a range of bits where the lower bound is greater than the upper bound.");
        }
        self.alloc(
            ExprData::Bits {
                source: self,
                range_high,
                range_low,
            },
            range_high - range_low + 1,
        )
    }

    /// Creates an `Expr` that represents this `Expr` concatenated with `rhs`, with `rhs` in the least significant bits.
    ///
    /// # Panics
    ///
    /// Panics if the resulting bit width would be greater than [`MAX_SIGNAL_BIT_WIDTH`].
    ///
    /// [`MAX_SIGNAL_BIT_WIDTH`]: ./constant.MAX_SIGNAL_BIT_WIDTH.html
    pub fn concat(&'a self, rhs: &'a Expr<'a>) -> &'a Expr<'a> {
        self.check_same_module(rhs);
        let target_bit_width = self.bit_width() + rhs.bit_width();
        if target_bit_width > MAX_SIGNAL_BIT_WIDTH {
            panic!("Attempted to concatenate signals with {} bit(s) and {} bit(s) respectively, but this would result in a bit width of {}, which is greater than the maximum signal bit width of {} bit(s).", self.bit_width(), rhs.bit_width(), target_bit_width, MAX_SIGNAL_BIT_WIDTH);
        }
        self.alloc(ExprData::Concat { lhs: self, rhs }, target_bit_width)
    }

    /// Creates an `Expr` that truncates or extends this `Expr` to `bit_width` bits. Signed values are sign-extended; everything else is zero-extended.
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
    /// let wide = m.lit(0b101u32, 3).as_signed().resize(8); // 0b1111_1101
    /// assert_eq!(*wide.kind(), Kind::Signed(8));
    /// ```
    pub fn resize(&'a self, bit_width: u32) -> &'a Expr<'a> {
        check_bit_width(bit_width, "a resized signal");
        self.module.expr(
            ExprData::Resize {
                source: self,
                bit_width,
            },
            self.numeric_kind(bit_width),
        )
    }

    /// Reinterprets this plain bit vector as a two's complement value, which changes how it compares, shifts right and extends.
    ///
    /// # Panics
    ///
    /// Panics if this `Expr` isn't a plain bit vector.
    pub fn as_signed(&'a self) -> &'a Expr<'a> {
        if !matches!(self.kind, Kind::Bits(_)) {
            panic!(
                "Cannot reinterpret a value with {} as signed; only plain bit vectors can be.",
                self.kind
            );
        }
        self.module
            .expr(ExprData::Cast { source: self }, Kind::Signed(self.bit_width()))
    }

    /// Reinterprets this signed value as a plain bit vector.
    ///
    /// # Panics
    ///
    /// Panics if this `Expr` isn't signed.
    pub fn as_unsigned(&'a self) -> &'a Expr<'a> {
        if !self.kind.is_signed() {
            panic!(
                "Cannot reinterpret a value with {} as unsigned; it is not signed.",
                self.kind
            );
        }
        self.alloc(ExprData::Cast { source: self }, self.bit_width())
    }

    /// Creates a 1-bit `Expr` that's high when this `Expr` and `rhs` hold equal values.
    ///
    /// # Panics
    ///
    /// Panics if `lhs` and `rhs` belong to different [`Module`]s, or if the bit widths of `lhs` and `rhs` aren't equal.
    ///
    /// [`Module`]: ./struct.Module.html
    pub fn eq(&'a self, rhs: &'a Expr<'a>) -> &'a Expr<'a> {
        self.bin_op(rhs, BinOp::Equal)
    }

    pub fn ne(&'a self, rhs: &'a Expr<'a>) -> &'a Expr<'a> {
        self.bin_op(rhs, BinOp::NotEqual)
    }

    /// Less-than comparison; unsigned unless both operands are signed.
    ///
    /// # Panics
    ///
    /// Panics if the operands belong to different [`Module`]s, if their bit widths aren't equal, or if only one of them is signed.
    ///
    /// [`Module`]: ./struct.Module.html
    pub fn lt(&'a self, rhs: &'a Expr<'a>) -> &'a Expr<'a> {
        self.bin_op(rhs, BinOp::LessThan)
    }

    pub fn le(&'a self, rhs: &'a Expr<'a>) -> &'a Expr<'a> {
        self.bin_op(rhs, BinOp::LessThanEqual)
    }

    pub fn gt(&'a self, rhs: &'a Expr<'a>) -> &'a Expr<'a> {
        self.bin_op(rhs, BinOp::GreaterThan)
    }

    pub fn ge(&'a self, rhs: &'a Expr<'a>) -> &'a Expr<'a> {
        self.bin_op(rhs, BinOp::GreaterThanEqual)
    }

    /// Shifts this `Expr` left by the amount held in `rhs`, keeping this `Expr`'s bit width. `rhs` may have any bit width; shifting by the bit width or more yields `0`.
    pub fn shl(&'a self, rhs: &'a Expr<'a>) -> &'a Expr<'a> {
        self.shift(rhs, BinOp::Shl)
    }

    /// Right shift; see [`shl`](#method.shl). Signed values shift arithmetically, copying the sign bit into the vacated bits.
    pub fn shr(&'a self, rhs: &'a Expr<'a>) -> &'a Expr<'a> {
        self.shift(rhs, BinOp::Shr)
    }

    /// Creates an `Expr` that selects `when_true` if this 1-bit `Expr` is high and `when_false` otherwise.
    ///
    /// # Panics
    ///
    /// Panics if the operands belong to different [`Module`]s, if this `Expr` isn't 1 bit wide, or if `when_true` and `when_false` have different bit widths or kinds.
    ///
    /// [`Module`]: ./struct.Module.html
    pub fn mux(&'a self, when_true: &'a Expr<'a>, when_false: &'a Expr<'a>) -> &'a Expr<'a> {
        self.check_same_module(when_true);
        self.check_same_module(when_false);
        if self.bit_width() != 1 {
            panic!(
                "Multiplexer conditionals can only be 1 bit wide, but a conditional with {} bits was given.",
                self.bit_width()
            );
        }
        when_true.check_same_bit_width(when_false);
        if when_true.kind != when_false.kind {
            panic!(
                "Multiplexer inputs have different kinds ({} and {}, respectively).",
                when_true.kind, when_false.kind
            );
        }
        self.module.expr(
            ExprData::Mux {
                cond: self,
                when_true,
                when_false,
            },
            when_true.kind.clone(),
        )
    }

    fn enum_layout(&self, what: &str) -> &Arc<EnumLayout> {
        match self.kind.as_enum() {
            Some(layout) => layout,
            None => panic!(
                "Cannot take the {} of a value with {}, which is not an enum.",
                what, self.kind
            ),
        }
    }

    /// Creates an `Expr` holding the discriminant bits of this enum-valued `Expr`.
    ///
    /// # Panics
    ///
    /// Panics if this `Expr` isn't enum-valued.
    pub fn discriminant(&'a self) -> &'a Expr<'a> {
        let width = self.enum_layout("discriminant").discriminant_width;
        self.bits(width - 1, 0)
    }

    /// Creates an `Expr` holding the whole payload region of this enum-valued `Expr`.
    ///
    /// # Panics
    ///
    /// Panics if this `Expr` isn't enum-valued, or if its enum carries no payload.
    pub fn payload(&'a self) -> &'a Expr<'a> {
        let layout = self.enum_layout("payload");
        if layout.payload_width == 0 {
            panic!("Enum \"{}\" has no payload.", layout.name);
        }
        self.bits(layout.bit_width() - 1, layout.discriminant_width)
    }

    /// Creates an `Expr` holding field `field` of variant `variant` of this enum-valued `Expr`.
    ///
    /// The bits are extracted regardless of which variant the value actually holds; pair this with [`is_variant`] or a match arm.
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
    /// let i = m.signal("cmd", Direction::Input, &cmd);
    /// let data = i.current().field("Write", "data");
    /// assert_eq!(data.bit_width(), 8);
    /// ```
    ///
    /// [`is_variant`]: #method.is_variant
    pub fn field(&'a self, variant: &str, field: &str) -> &'a Expr<'a> {
        let layout = self.enum_layout("field");
        let variant_layout = layout.expect_variant(variant);
        let field_layout = match variant_layout.fields.iter().find(|f| f.name == field) {
            Some(field_layout) => field_layout,
            None => panic!(
                "Variant \"{}\" of enum \"{}\" doesn't have a field called \"{}\".",
                variant, layout.name, field
            ),
        };
        self.bits(
            field_layout.offset + field_layout.bit_width - 1,
            field_layout.offset,
        )
    }

    /// Creates an `Expr` holding member `name` of this struct-valued `Expr`, typed as the member.
    ///
    /// # Panics
    ///
    /// Panics if this `Expr` isn't struct-valued, or if its struct doesn't have a member called `name`.
    ///
    /// # Examples
    ///
    /// ```
    /// use kumo::*;
    ///
    /// let point = StructBuilder::new("Point")
    ///     .member("x", Kind::Signed(8))
    ///     .member("y", Kind::Signed(8))
    ///     .build();
    ///
    /// let c = Context::new();
    ///
    /// let m = c.module("MyModule");
    /// let p = m.signal("p", Direction::Input, &point).current();
    /// assert_eq!(*p.member("y").kind(), Kind::Signed(8));
    /// ```
    pub fn member(&'a self, name: &str) -> &'a Expr<'a> {
        let layout = match &self.kind {
            Kind::Struct(layout) => layout.clone(),
            _ => panic!(
                "Cannot take member \"{}\" of a value with {}, which is not a struct.",
                name, self.kind
            ),
        };
        let member = layout.expect_member(name);
        self.view(member.offset, member.kind.clone())
    }

    /// Creates an `Expr` holding element `index` of this array-valued `Expr`.
    ///
    /// # Panics
    ///
    /// Panics if this `Expr` isn't array-valued, or if `index` is out of bounds.
    pub fn index(&'a self, index: u32) -> &'a Expr<'a> {
        let layout = match &self.kind {
            Kind::Array(layout) => layout.clone(),
            _ => panic!(
                "Cannot index a value with {}, which is not an array.",
                self.kind
            ),
        };
        if index >= layout.len {
            panic!(
                "Attempted to take element {} of an array with {} element(s).",
                index, layout.len
            );
        }
        self.view(layout.offset(index), layout.element.clone())
    }

    /// Creates a 1-bit `Expr` that's high when this enum-valued `Expr` holds variant `variant`.
    pub fn is_variant(&'a self, variant: &str) -> &'a Expr<'a> {
        let layout = self.enum_layout("variant");
        let discriminant = layout.expect_variant(variant).discriminant;
        let expected = self.module.lit(discriminant, layout.discriminant_width);
        self.discriminant().eq(expected)
    }
}

impl<'a> Add for &'a Expr<'a> {
    type Output = Self;

    /// Combines two `Expr`s, producing a new `Expr` that represents the sum of the original two `Expr`s.
    ///
    /// The sum is truncated to the `Expr`'s `bit_width`. If a carry bit is desired, the operands can be [`concat`]enated with a `0` bit before the operation.
    ///
    /// # Panics
    ///
    /// Panics if `lhs` and `rhs` belong to different [`Module`]s, or if the bit widths of `lhs` and `rhs` aren't equal.
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
    /// let lhs = m.low().concat(m.lit(0xffffffffu32, 32)); // Concat 0 bits with operands for carry
    /// let rhs = m.low().concat(m.lit(0x00000001u32, 32));
    /// let carry_sum = lhs + rhs;
    /// let carry = carry_sum.bit(32);
    /// ```
    ///
    /// [`concat`]: ./struct.Expr.html#method.concat
    /// [`Module`]: ./struct.Module.html
    fn add(self, rhs: Self) -> Self {
        self.bin_op(rhs, BinOp::Add)
    }
}

impl<'a> Sub for &'a Expr<'a> {
    type Output = Self;

    /// Wrapping subtraction, truncated to the operands' bit width.
    fn sub(self, rhs: Self) -> Self {
        self.bin_op(rhs, BinOp::Sub)
    }
}

impl<'a> BitAnd for &'a Expr<'a> {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        self.bin_op(rhs, BinOp::BitAnd)
    }
}

impl<'a> BitOr for &'a Expr<'a> {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.bin_op(rhs, BinOp::BitOr)
    }
}

impl<'a> BitXor for &'a Expr<'a> {
    type Output = Self;

    fn bitxor(self, rhs: Self) -> Self {
        self.bin_op(rhs, BinOp::BitXor)
    }
}

impl<'a> Not for &'a Expr<'a> {
    type Output = Self;

    /// Produces a new `Expr` that represents the bitwise complement of the original `Expr`.
    fn not(self) -> Self {
        self.module
            .expr(ExprData::Not { source: self }, self.numeric_kind(self.bit_width()))
    }
}

#[cfg(test)]
mod tests {
    use super::super::context::*;
    use super::*;

    #[test]
    #[should_panic(
        expected = "Attempted to take bit index 3 from a signal with a width of 3 bits. Bit indices must be in the range [0, 2] for a signal with a width of 3 bits."
    )]
    fn bit_index_oob_error() {
        let c = Context::new();

        let m = c.module("A");
        let i = m.input("i", 3).current();

        // Panic
        let _ = i.bit(3);
    }

    #[test]
    #[should_panic(
        expected = "Cannot specify a range of bits where the lower bound is greater than the upper bound."
    )]
    fn bits_range_low_gt_high_error() {
        let c = Context::new();

        let m = c.module("A");
        let i = m.input("i", 8).current();

        // Panic
        let _ = i.bits(2, 5);
    }

    #[test]
    #[should_panic(
        expected = "Attempted to concatenate signals with 128 bit(s) and 1 bit(s) respectively, but this would result in a bit width of 129, which is greater than the maximum signal bit width of 128 bit(s)."
    )]
    fn concat_oob_error() {
        let c = Context::new();

        let m = c.module("A");
        let i = m.input("i", 128).current();

        // Panic
        let _ = i.concat(m.high());
    }

    #[test]
    #[should_panic(expected = "Attempted to combine signals from different modules.")]
    fn add_separate_module_error() {
        let c = Context::new();

        let a = c.module("A");
        let b = c.module("B");

        // Panic
        let _ = a.lit(1u32, 4) + b.lit(1u32, 4);
    }

    #[test]
    #[should_panic(expected = "Signals have different bit widths (3 and 5, respectively).")]
    fn eq_incompatible_bit_widths_error() {
        let c = Context::new();

        let m = c.module("A");

        // Panic
        let _ = m.lit(1u32, 3).eq(m.lit(1u32, 5));
    }

    #[test]
    #[should_panic(
        expected = "Multiplexer conditionals can only be 1 bit wide, but a conditional with 2 bits was given."
    )]
    fn mux_cond_bit_width_error() {
        let c = Context::new();

        let m = c.module("A");

        // Panic
        let _ = m.mux(m.lit(1u32, 2), m.lit(1u32, 4), m.lit(2u32, 4));
    }

    #[test]
    #[should_panic(
        expected = "Cannot take the discriminant of a value with 4 bit(s), which is not an enum."
    )]
    fn discriminant_of_bits_error() {
        let c = Context::new();

        let m = c.module("A");

        // Panic
        let _ = m.lit(1u32, 4).discriminant();
    }

    #[test]
    fn comparisons_are_one_bit_and_shifts_keep_width() {
        let c = Context::new();

        let m = c.module("A");
        let a = m.input("a", 12).current();
        let s = m.input("s", 3).current();

        assert_eq!(a.ge(a).bit_width(), 1);
        assert_eq!(a.shl(s).bit_width(), 12);
        assert_eq!(a.shr(s).bit_width(), 12);
        assert_eq!((a - a).bit_width(), 12);
    }

    #[test]
    fn enum_accessors() {
        let op = EnumBuilder::new("Op")
            .variant("Nop")
            .variant_with_fields("Load", &[("addr", 5)])
            .variant_with_fields("Store", &[("addr", 5), ("data", 7)])
            .build();

        let c = Context::new();

        let m = c.module("A");
        let v = m.signal("op", crate::graph::Direction::Input, &op).current();

        assert_eq!(v.bit_width(), 14);
        assert_eq!(v.discriminant().bit_width(), 2);
        assert_eq!(v.payload().bit_width(), 12);
        assert_eq!(v.field("Store", "data").bit_width(), 7);
        assert_eq!(v.is_variant("Load").bit_width(), 1);
        assert!(v.kind().as_enum().is_some());
        assert!(m.mux(m.high(), v, v).kind().as_enum().is_some());
    }

    #[test]
    fn signed_operators_keep_signedness() {
        let c = Context::new();

        let m = c.module("A");
        let a = m.input("a", 8).current().as_signed();
        let s = m.input("s", 3).current();

        assert_eq!(*(a + a).kind(), Kind::Signed(8));
        assert_eq!(*(!a).kind(), Kind::Signed(8));
        assert_eq!(*a.lt(a).kind(), Kind::Bits(1));
        assert_eq!(*a.resize(16).kind(), Kind::Signed(16));
        assert_eq!(*a.as_unsigned().kind(), Kind::Bits(8));
        match &a.shr(s).data {
            ExprData::BinOp { op, .. } => assert_eq!(*op, BinOp::Sar),
            _ => panic!("Expected a binary operator"),
        }
        match &a.ge(a).data {
            ExprData::BinOp { op, .. } => assert_eq!(*op, BinOp::SignedGreaterThanEqual),
            _ => panic!("Expected a binary operator"),
        }
    }

    #[test]
    #[should_panic(
        expected = "Cannot combine a signed and an unsigned value (signed 4 bit(s) and 4 bit(s), respectively)."
    )]
    fn mixed_signedness_error() {
        let c = Context::new();

        let m = c.module("A");
        let a = m.lit(1u32, 4);

        // Panic
        let _ = a.as_signed().lt(a);
    }

    #[test]
    #[should_panic(
        expected = "Multiplexer inputs have different kinds (enum E (1 bit(s)) and 1 bit(s), respectively)."
    )]
    fn mux_kind_mismatch_error() {
        let e = EnumBuilder::new("E").variant("A").variant("B").build();

        let c = Context::new();

        let m = c.module("A");

        // Panic
        let _ = m.mux(m.high(), m.variant(&e, "B", &[]), m.low());
    }

    #[test]
    fn struct_and_array_views() {
        let e = EnumBuilder::new("E").variant("A").variant("B").build();
        let entry = StructBuilder::new("Entry")
            .member("valid", 1)
            .member("tag", &e)
            .member("delta", Kind::Signed(6))
            .build();
        let table = ArrayLayout::new(&entry, 4);

        let c = Context::new();

        let m = c.module("A");
        let t = m.signal("t", crate::graph::Direction::Input, &table).current();
        let delta = t.index(2).member("delta");

        assert_eq!(t.bit_width(), 32);
        assert_eq!(*delta.kind(), Kind::Signed(6));
        assert!(t.index(3).member("tag").kind().as_enum().is_some());
        match &delta.data {
            ExprData::Bits {
                range_high,
                range_low,
                ..
            } => assert_eq!((*range_high, *range_low), (7, 2)),
            _ => panic!("Expected a slice"),
        }
    }

    #[test]
    #[should_panic(expected = "Attempted to take element 4 of an array with 4 element(s).")]
    fn index_oob_error() {
        let c = Context::new();

        let m = c.module("A");
        let t = m.signal("t", crate::graph::Direction::Input, &ArrayLayout::new(2, 4));

        // Panic
        let _ = t.current().index(4);
    }
}
