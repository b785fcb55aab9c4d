use serde::Serialize;

use std::fmt;
use std::sync::Arc;

/// The minimum allowed bit width for any given [`Signal`] or [`Expr`].
///
/// [`Signal`]: ./struct.Signal.html
/// [`Expr`]: ./struct.Expr.html
pub const MIN_SIGNAL_BIT_WIDTH: u32 = 1;
/// The maximum allowed bit width for any given [`Signal`] or [`Expr`].
///
/// This is currently set to `128`, which allows the simulator to hold every value in a single native integer.
///
/// [`Signal`]: ./struct.Signal.html
/// [`Expr`]: ./struct.Expr.html
pub const MAX_SIGNAL_BIT_WIDTH: u32 = 128;

pub(crate) fn check_bit_width(bit_width: u32, what: &str) {
    if bit_width < MIN_SIGNAL_BIT_WIDTH {
        panic!(
            "Cannot create {} with {} bit(s). Signals must not be narrower than {} bit(s).",
            what, bit_width, MIN_SIGNAL_BIT_WIDTH
        );
    }
    if bit_width > MAX_SIGNAL_BIT_WIDTH {
        panic!(
            "Cannot create {} with {} bit(s). Signals must not be wider than {} bit(s).",
            what, bit_width, MAX_SIGNAL_BIT_WIDTH
        );
    }
}

/// Returns a mask covering the low `bit_width` bits.
pub(crate) fn mask(bit_width: u32) -> u128 {
    if bit_width >= 128 {
        u128::MAX
    } else {
        (1u128 << bit_width) - 1
    }
}

/// Number of bits needed to represent `value`, but never less than 1.
pub(crate) fn bits_for(value: u128) -> u32 {
    (128 - value.leading_zeros()).max(1)
}

/// The shape of the value carried by a [`Signal`] or [`Expr`].
///
/// [`Signal`]: ./struct.Signal.html
/// [`Expr`]: ./struct.Expr.html
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub enum Kind {
    /// A plain bit vector of the given width, compared and shifted as an unsigned integer.
    Bits(u32),
    /// A two's complement bit vector of the given width.
    Signed(u32),
    /// A value of an enumeration with an explicit tagged-union layout.
    Enum(Arc<EnumLayout>),
    /// A record of named members packed from the least significant bit upward.
    Struct(Arc<StructLayout>),
    /// A fixed number of elements of the same kind, element 0 in the least significant bits.
    Array(Arc<ArrayLayout>),
}

impl Kind {
    pub fn bit_width(&self) -> u32 {
        match self {
            Kind::Bits(bit_width) | Kind::Signed(bit_width) => *bit_width,
            Kind::Enum(layout) => layout.bit_width(),
            Kind::Struct(layout) => layout.bit_width,
            Kind::Array(layout) => layout.bit_width(),
        }
    }

    pub fn as_enum(&self) -> Option<&Arc<EnumLayout>> {
        match self {
            Kind::Enum(layout) => Some(layout),
            _ => None,
        }
    }

    pub fn is_signed(&self) -> bool {
        matches!(self, Kind::Signed(_))
    }

    /// Returns true for plain and signed bit vectors, the kinds arithmetic is defined on.
    pub fn is_numeric(&self) -> bool {
        matches!(self, Kind::Bits(_) | Kind::Signed(_))
    }

    /// Returns whether `value` is a legal encoding of this kind.
    ///
    /// Bits above the kind's width must be clear, and every enum discriminant inside the value (including those of
    /// struct members and array elements) must name a declared variant.
    ///
    /// # Examples
    ///
    /// ```
    /// use kumo::*;
    ///
    /// let state = EnumBuilder::new("State").variant("A").variant("B").variant("C").build();
    /// let kind = Kind::Enum(state);
    ///
    /// assert!(kind.is_valid(2));
    /// assert!(!kind.is_valid(3));
    /// assert!(!Kind::Bits(4).is_valid(0x10));
    /// ```
    pub fn is_valid(&self, value: u128) -> bool {
        if value & !mask(self.bit_width()) != 0 {
            return false;
        }
        match self {
            Kind::Bits(_) | Kind::Signed(_) => true,
            Kind::Enum(layout) => layout.decode_discriminant(value).is_some(),
            Kind::Struct(layout) => layout
                .members
                .iter()
                .all(|member| member.kind.is_valid((value >> member.offset) & mask(member.kind.bit_width()))),
            Kind::Array(layout) => {
                let element_width = layout.element.bit_width();
                (0..layout.len).all(|i| {
                    layout
                        .element
                        .is_valid((value >> (i * element_width)) & mask(element_width))
                })
            }
        }
    }
}

impl From<u32> for Kind {
    fn from(bit_width: u32) -> Self {
        Kind::Bits(bit_width)
    }
}

impl From<&Arc<EnumLayout>> for Kind {
    fn from(layout: &Arc<EnumLayout>) -> Self {
        Kind::Enum(layout.clone())
    }
}

impl From<&Arc<StructLayout>> for Kind {
    fn from(layout: &Arc<StructLayout>) -> Self {
        Kind::Struct(layout.clone())
    }
}

impl From<&Arc<ArrayLayout>> for Kind {
    fn from(layout: &Arc<ArrayLayout>) -> Self {
        Kind::Array(layout.clone())
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kind::Bits(bit_width) => write!(f, "{} bit(s)", bit_width),
            Kind::Signed(bit_width) => write!(f, "signed {} bit(s)", bit_width),
            Kind::Enum(layout) => write!(f, "enum {} ({} bit(s))", layout.name, layout.bit_width()),
            Kind::Struct(layout) => write!(f, "struct {} ({} bit(s))", layout.name, layout.bit_width),
            Kind::Array(layout) => write!(f, "[{}; {}]", layout.element, layout.len),
        }
    }
}

/// Bit-level layout of a struct.
///
/// Members are packed from bit 0 upward in declaration order, with no padding.
///
/// # Examples
///
/// ```
/// use kumo::*;
///
/// let pixel = StructBuilder::new("Pixel")
///     .member("r", 5)
///     .member("g", 6)
///     .member("b", 5)
///     .build();
///
/// assert_eq!(pixel.bit_width, 16);
/// assert_eq!(pixel.member("g").unwrap().offset, 5);
/// assert_eq!(pixel.encode(&[0x1f, 0, 0x1f]), 0xf81f);
/// ```
#[derive(Debug, Eq, PartialEq, Serialize)]
pub struct StructLayout {
    pub name: String,
    pub members: Vec<MemberLayout>,
    pub bit_width: u32,
}

#[derive(Debug, Eq, PartialEq, Serialize)]
pub struct MemberLayout {
    pub name: String,
    /// Offset of the member's least significant bit within the whole value.
    pub offset: u32,
    pub kind: Kind,
}

impl StructLayout {
    pub fn member(&self, name: &str) -> Option<&MemberLayout> {
        self.members.iter().find(|member| member.name == name)
    }

    pub(crate) fn expect_member(&self, name: &str) -> &MemberLayout {
        match self.member(name) {
            Some(member) => member,
            None => panic!(
                "Struct \"{}\" doesn't have a member called \"{}\".",
                self.name, name
            ),
        }
    }

    /// Encodes `values` (one per member, in declaration order) into the struct's bit-level representation.
    ///
    /// # Panics
    ///
    /// Panics if the number of values doesn't match, or if a value isn't valid for its member's kind.
    pub fn encode(&self, values: &[u128]) -> u128 {
        if self.members.len() != values.len() {
            panic!(
                "Struct \"{}\" has {} member(s), but {} value(s) were given.",
                self.name,
                self.members.len(),
                values.len()
            );
        }
        let mut value = 0;
        for (member, member_value) in self.members.iter().zip(values.iter()) {
            if !member.kind.is_valid(*member_value) {
                panic!(
                    "Cannot fit the value '{}' into member \"{}\" of struct \"{}\", which is {}.",
                    member_value, member.name, self.name, member.kind
                );
            }
            value |= member_value << member.offset;
        }
        value
    }
}

/// Builder for [`StructLayout`]s.
///
/// [`StructLayout`]: ./struct.StructLayout.html
#[must_use]
pub struct StructBuilder {
    name: String,
    members: Vec<(String, Kind)>,
}

impl StructBuilder {
    pub fn new(name: impl Into<String>) -> StructBuilder {
        StructBuilder {
            name: name.into(),
            members: Vec::new(),
        }
    }

    pub fn member(mut self, name: impl Into<String>, kind: impl Into<Kind>) -> StructBuilder {
        let name = name.into();
        let kind = kind.into();
        if let Kind::Bits(bit_width) | Kind::Signed(bit_width) = kind {
            check_bit_width(bit_width, &format!("member \"{}\" of struct \"{}\"", name, self.name));
        }
        if self.members.iter().any(|(existing, _)| *existing == name) {
            panic!(
                "Struct \"{}\" already has a member called \"{}\".",
                self.name, name
            );
        }
        self.members.push((name, kind));
        self
    }

    /// # Panics
    ///
    /// Panics if no members were declared, or if the resulting layout is wider than [`MAX_SIGNAL_BIT_WIDTH`].
    ///
    /// [`MAX_SIGNAL_BIT_WIDTH`]: ./constant.MAX_SIGNAL_BIT_WIDTH.html
    pub fn build(self) -> Arc<StructLayout> {
        if self.members.is_empty() {
            panic!("Struct \"{}\" must have at least one member.", self.name);
        }
        let bit_width = self.members.iter().map(|(_, kind)| kind.bit_width()).sum::<u32>();
        if bit_width > MAX_SIGNAL_BIT_WIDTH {
            panic!(
                "Struct \"{}\" requires {} bit(s), but values must not be wider than {} bit(s).",
                self.name, bit_width, MAX_SIGNAL_BIT_WIDTH
            );
        }
        let mut offset = 0;
        let members = self
            .members
            .into_iter()
            .map(|(name, kind)| {
                let member = MemberLayout { name, offset, kind };
                offset += member.kind.bit_width();
                member
            })
            .collect();
        Arc::new(StructLayout {
            name: self.name,
            members,
            bit_width,
        })
    }
}

/// Bit-level layout of an array: `len` elements of `element`, element `i` at offset `i * element.bit_width()`.
#[derive(Debug, Eq, PartialEq, Serialize)]
pub struct ArrayLayout {
    pub element: Kind,
    pub len: u32,
}

impl ArrayLayout {
    /// # Panics
    ///
    /// Panics if `len` is zero, or if the array would be wider than [`MAX_SIGNAL_BIT_WIDTH`].
    ///
    /// [`MAX_SIGNAL_BIT_WIDTH`]: ./constant.MAX_SIGNAL_BIT_WIDTH.html
    pub fn new(element: impl Into<Kind>, len: u32) -> Arc<ArrayLayout> {
        let element = element.into();
        if let Kind::Bits(bit_width) | Kind::Signed(bit_width) = element {
            check_bit_width(bit_width, "an array element");
        }
        if len == 0 {
            panic!("Cannot create an array with 0 elements.");
        }
        let bit_width = element.bit_width() as u64 * len as u64;
        if bit_width > MAX_SIGNAL_BIT_WIDTH as u64 {
            panic!(
                "An array of {} element(s) of {} requires {} bit(s), but values must not be wider than {} bit(s).",
                len, element, bit_width, MAX_SIGNAL_BIT_WIDTH
            );
        }
        Arc::new(ArrayLayout { element, len })
    }

    pub fn bit_width(&self) -> u32 {
        self.element.bit_width() * self.len
    }

    /// Offset of element `index`'s least significant bit.
    pub fn offset(&self, index: u32) -> u32 {
        index * self.element.bit_width()
    }
}

/// Bit-level layout of an enumeration.
///
/// The discriminant occupies the low `discriminant_width` bits. The payload region sits directly above it and is
/// as wide as the widest variant; each variant packs its fields upward from the bottom of the payload region, in
/// declaration order. Variants carrying narrower payloads leave the remaining payload bits zero.
///
/// # Examples
///
/// ```
/// use kumo::*;
///
/// let state = EnumBuilder::new("State")
///     .variant("Idle")
///     .variant_with_fields("Load", &[("addr", 4), ("last", 1)])
///     .variant("Done")
///     .build();
///
/// assert_eq!(state.discriminant_width, 2);
/// assert_eq!(state.payload_width, 5);
/// assert_eq!(state.bit_width(), 7);
/// assert_eq!(state.encode("Load", &[0xa, 1]), 0b1_1010_01);
/// ```
#[derive(Debug, Eq, PartialEq, Serialize)]
pub struct EnumLayout {
    pub name: String,
    pub variants: Vec<VariantLayout>,
    pub discriminant_width: u32,
    pub payload_width: u32,
}

#[derive(Debug, Eq, PartialEq, Serialize)]
pub struct VariantLayout {
    pub name: String,
    pub discriminant: u128,
    pub fields: Vec<FieldLayout>,
}

#[derive(Debug, Eq, PartialEq, Serialize)]
pub struct FieldLayout {
    pub name: String,
    /// Offset of the field's least significant bit within the whole value.
    pub offset: u32,
    pub bit_width: u32,
}

impl EnumLayout {
    pub fn bit_width(&self) -> u32 {
        self.discriminant_width + self.payload_width
    }

    pub fn discriminant_mask(&self) -> u128 {
        mask(self.discriminant_width)
    }

    pub fn variant(&self, name: &str) -> Option<&VariantLayout> {
        self.variants.iter().find(|variant| variant.name == name)
    }

    pub(crate) fn expect_variant(&self, name: &str) -> &VariantLayout {
        match self.variant(name) {
            Some(variant) => variant,
            None => panic!(
                "Enum \"{}\" doesn't have a variant called \"{}\".",
                self.name, name
            ),
        }
    }

    /// Encodes `variant` carrying `fields` (in declaration order) into its bit-level representation.
    ///
    /// # Panics
    ///
    /// Panics if `variant` doesn't exist, if the number of field values doesn't match, or if a value doesn't fit its field.
    pub fn encode(&self, variant: &str, fields: &[u128]) -> u128 {
        let layout = self.expect_variant(variant);
        if layout.fields.len() != fields.len() {
            panic!(
                "Variant \"{}\" of enum \"{}\" has {} field(s), but {} value(s) were given.",
                variant,
                self.name,
                layout.fields.len(),
                fields.len()
            );
        }
        let mut value = layout.discriminant;
        for (field, field_value) in layout.fields.iter().zip(fields.iter()) {
            if *field_value & !mask(field.bit_width) != 0 {
                panic!(
                    "Cannot fit the value '{}' into field \"{}\" of variant \"{}\", which is {} bit(s) wide.",
                    field_value, field.name, variant, field.bit_width
                );
            }
            value |= field_value << field.offset;
        }
        value
    }

    pub fn decode_discriminant(&self, value: u128) -> Option<&VariantLayout> {
        let discriminant = value & self.discriminant_mask();
        self.variants
            .iter()
            .find(|variant| variant.discriminant == discriminant)
    }
}

/// Builder for [`EnumLayout`]s.
///
/// [`EnumLayout`]: ./struct.EnumLayout.html
#[must_use]
pub struct EnumBuilder {
    name: String,
    variants: Vec<(String, Vec<(String, u32)>)>,
}

impl EnumBuilder {
    pub fn new(name: impl Into<String>) -> EnumBuilder {
        EnumBuilder {
            name: name.into(),
            variants: Vec::new(),
        }
    }

    pub fn variant(self, name: impl Into<String>) -> EnumBuilder {
        self.variant_with_fields(name, &[])
    }

    pub fn variant_with_fields(mut self, name: impl Into<String>, fields: &[(&str, u32)]) -> EnumBuilder {
        let name = name.into();
        if self.variants.iter().any(|(existing, _)| *existing == name) {
            panic!(
                "Enum \"{}\" already has a variant called \"{}\".",
                self.name, name
            );
        }
        for (i, (field, bit_width)) in fields.iter().enumerate() {
            check_bit_width(*bit_width, &format!("field \"{}\" of variant \"{}\"", field, name));
            if fields[..i].iter().any(|(other, _)| other == field) {
                panic!(
                    "Variant \"{}\" of enum \"{}\" already has a field called \"{}\".",
                    name, self.name, field
                );
            }
        }
        self.variants.push((
            name,
            fields
                .iter()
                .map(|(field, bit_width)| (field.to_string(), *bit_width))
                .collect(),
        ));
        self
    }

    /// # Panics
    ///
    /// Panics if no variants were declared, or if the resulting layout is wider than [`MAX_SIGNAL_BIT_WIDTH`].
    ///
    /// [`MAX_SIGNAL_BIT_WIDTH`]: ./constant.MAX_SIGNAL_BIT_WIDTH.html
    pub fn build(self) -> Arc<EnumLayout> {
        if self.variants.is_empty() {
            panic!("Enum \"{}\" must have at least one variant.", self.name);
        }
        let discriminant_width = bits_for(self.variants.len() as u128 - 1);
        let payload_width = self
            .variants
            .iter()
            .map(|(_, fields)| fields.iter().map(|(_, bit_width)| *bit_width).sum::<u32>())
            .max()
            .unwrap_or(0);
        if discriminant_width + payload_width > MAX_SIGNAL_BIT_WIDTH {
            panic!(
                "Enum \"{}\" requires {} bit(s), but values must not be wider than {} bit(s).",
                self.name,
                discriminant_width + payload_width,
                MAX_SIGNAL_BIT_WIDTH
            );
        }
        let variants = self
            .variants
            .into_iter()
            .enumerate()
            .map(|(discriminant, (name, fields))| {
                let mut offset = discriminant_width;
                let fields = fields
                    .into_iter()
                    .map(|(name, bit_width)| {
                        let field = FieldLayout {
                            name,
                            offset,
                            bit_width,
                        };
                        offset += bit_width;
                        field
                    })
                    .collect();
                VariantLayout {
                    name,
                    discriminant: discriminant as u128,
                    fields,
                }
            })
            .collect();
        Arc::new(EnumLayout {
            name: self.name,
            variants,
            discriminant_width,
            payload_width,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_variant_enum_still_has_a_discriminant_bit() {
        let e = EnumBuilder::new("Only").variant("A").build();

        assert_eq!(e.discriminant_width, 1);
        assert_eq!(e.payload_width, 0);
        assert_eq!(e.bit_width(), 1);
    }

    #[test]
    fn payload_is_sized_to_widest_variant() {
        let e = EnumBuilder::new("Op")
            .variant_with_fields("Add", &[("a", 8), ("b", 8)])
            .variant_with_fields("Not", &[("a", 8)])
            .variant("Nop")
            .variant("Halt")
            .variant("Reset")
            .build();

        assert_eq!(e.discriminant_width, 3);
        assert_eq!(e.payload_width, 16);
        assert_eq!(e.variants[0].fields[1].offset, 11);
        assert_eq!(e.variants[1].fields[0].offset, 3);
        assert_eq!(e.variants[4].discriminant, 4);
    }

    #[test]
    fn encode_and_decode_discriminant() {
        let e = EnumBuilder::new("Op")
            .variant("Nop")
            .variant_with_fields("Imm", &[("value", 6)])
            .build();

        let value = e.encode("Imm", &[0x2a]);
        assert_eq!(value, (0x2a << 1) | 1);
        assert_eq!(e.decode_discriminant(value).unwrap().name, "Imm");
        assert_eq!(e.decode_discriminant(e.encode("Nop", &[])).unwrap().name, "Nop");
    }

    #[test]
    #[should_panic(expected = "Enum \"E\" already has a variant called \"A\".")]
    fn duplicate_variant_error() {
        let _ = EnumBuilder::new("E").variant("A").variant("A");
    }

    #[test]
    #[should_panic(expected = "Enum \"E\" must have at least one variant.")]
    fn empty_enum_error() {
        let _ = EnumBuilder::new("E").build();
    }

    #[test]
    #[should_panic(expected = "Enum \"Wide\" requires 130 bit(s), but values must not be wider than 128 bit(s).")]
    fn too_wide_enum_error() {
        let _ = EnumBuilder::new("Wide")
            .variant_with_fields("A", &[("x", 128)])
            .variant_with_fields("B", &[("y", 1)])
            .variant("C")
            .build();
    }

    #[test]
    fn struct_members_pack_from_bit_zero() {
        let inner = StructBuilder::new("Inner").member("a", 3).member("b", Kind::Signed(2)).build();
        let outer = StructBuilder::new("Outer")
            .member("flag", 1)
            .member("inner", &inner)
            .member("tail", 4)
            .build();

        assert_eq!(outer.bit_width, 10);
        assert_eq!(outer.member("inner").unwrap().offset, 1);
        assert_eq!(outer.member("tail").unwrap().offset, 6);
        assert_eq!(outer.encode(&[1, inner.encode(&[0b101, 0b10]), 0xf]), 0b1111_10_101_1);
    }

    #[test]
    #[should_panic(expected = "Struct \"S\" already has a member called \"a\".")]
    fn duplicate_member_error() {
        let _ = StructBuilder::new("S").member("a", 1).member("a", 2);
    }

    #[test]
    #[should_panic(expected = "Cannot fit the value '3' into member \"e\" of struct \"S\", which is enum E (2 bit(s)).")]
    fn struct_encode_rejects_invalid_enum_member() {
        let e = EnumBuilder::new("E").variant("A").variant("B").variant("C").build();
        let s = StructBuilder::new("S").member("e", &e).build();

        s.encode(&[3]);
    }

    #[test]
    fn array_elements_are_laid_out_in_index_order() {
        let a = ArrayLayout::new(4, 3);

        assert_eq!(a.bit_width(), 12);
        assert_eq!(a.offset(2), 8);
        assert_eq!(Kind::Array(a.clone()).to_string(), "[4 bit(s); 3]");
    }

    #[test]
    #[should_panic(expected = "An array of 9 element(s) of 16 bit(s) requires 144 bit(s), but values must not be wider than 128 bit(s).")]
    fn too_wide_array_error() {
        let _ = ArrayLayout::new(16, 9);
    }

    #[test]
    fn validity_follows_nested_discriminants() {
        let e = EnumBuilder::new("E").variant("A").variant("B").variant("C").build();
        let pair = StructBuilder::new("Pair").member("x", 2).member("e", &e).build();
        let pairs = Kind::Array(ArrayLayout::new(&pair, 2));

        assert!(pairs.is_valid(0b10_11_01_00));
        assert!(!pairs.is_valid(0b11_00_00_00));
        assert!(!pairs.is_valid(1 << 8));
        assert!(Kind::Signed(3).is_valid(0b111));
    }

    #[test]
    fn mask_edges() {
        assert_eq!(mask(1), 1);
        assert_eq!(mask(8), 0xff);
        assert_eq!(mask(128), u128::MAX);
        assert_eq!(bits_for(0), 1);
        assert_eq!(bits_for(3), 2);
        assert_eq!(bits_for(4), 3);
    }
}
