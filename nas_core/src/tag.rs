use std::fmt;

use crate::sample::ElementType;

/// Numeric kind of a sample element. Each kind owns one bit of the tag byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericKind {
    Float,
    Int,
    Unsigned,
}

impl NumericKind {
    pub const fn bits(self) -> u8 {
        match self {
            NumericKind::Float => 0b0001_0000,
            NumericKind::Int => 0b0010_0000,
            NumericKind::Unsigned => 0b0100_0000,
        }
    }

    fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            0b0001_0000 => Some(NumericKind::Float),
            0b0010_0000 => Some(NumericKind::Int),
            0b0100_0000 => Some(NumericKind::Unsigned),
            _ => None,
        }
    }
}

/// Width class of a sample element.
///
/// The width codes are not proportional to the bit width; they occupy the low
/// nibble of the tag byte and never collide with the kind bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Width {
    W8,
    W16,
    W32,
}

impl Width {
    pub const fn bits(self) -> u8 {
        match self {
            Width::W8 => 0b0000_0001,
            Width::W16 => 0b0000_0011,
            Width::W32 => 0b0000_1001,
        }
    }

    fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            0b0000_0001 => Some(Width::W8),
            0b0000_0011 => Some(Width::W16),
            0b0000_1001 => Some(Width::W32),
            _ => None,
        }
    }

    pub const fn bit_width(self) -> u32 {
        match self {
            Width::W8 => 8,
            Width::W16 => 16,
            Width::W32 => 32,
        }
    }
}

/// One-byte element descriptor stored at header offset 3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeTag {
    Typed { kind: NumericKind, width: Width },
    /// Fallback for element types with no tag of their own: no kind bits, 8-bit width code.
    Generic,
}

impl TypeTag {
    const KIND_MASK: u8 = 0b0111_0000;
    const WIDTH_MASK: u8 = 0b0000_1111;

    /// Tag for an element type. Types without a tag of their own get
    /// [`TypeTag::Generic`]; rejecting them is left to the block encoder.
    pub fn for_element(element: ElementType) -> Self {
        let (kind, width) = match element {
            ElementType::F16 => (NumericKind::Float, Width::W16),
            ElementType::F32 => (NumericKind::Float, Width::W32),
            ElementType::I8 => (NumericKind::Int, Width::W8),
            ElementType::I16 => (NumericKind::Int, Width::W16),
            ElementType::I32 => (NumericKind::Int, Width::W32),
            ElementType::U8 => (NumericKind::Unsigned, Width::W8),
            ElementType::U16 => (NumericKind::Unsigned, Width::W16),
            ElementType::U32 => (NumericKind::Unsigned, Width::W32),
            ElementType::F64 | ElementType::I64 | ElementType::U64 => return TypeTag::Generic,
        };
        TypeTag::Typed { kind, width }
    }

    pub fn to_byte(self) -> u8 {
        match self {
            TypeTag::Typed { kind, width } => kind.bits() | width.bits(),
            TypeTag::Generic => Width::W8.bits(),
        }
    }

    /// Inverse of [`to_byte`](Self::to_byte). `None` for bytes no tag produces.
    pub fn from_byte(byte: u8) -> Option<Self> {
        if byte & !(Self::KIND_MASK | Self::WIDTH_MASK) != 0 {
            return None;
        }
        let width = Width::from_bits(byte & Self::WIDTH_MASK)?;
        match byte & Self::KIND_MASK {
            0 if width == Width::W8 => Some(TypeTag::Generic),
            bits => NumericKind::from_bits(bits).map(|kind| TypeTag::Typed { kind, width }),
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeTag::Typed { kind, width } => {
                let prefix = match kind {
                    NumericKind::Float => "float",
                    NumericKind::Int => "int",
                    NumericKind::Unsigned => "uint",
                };
                write!(f, "{}{} (0x{:02x})", prefix, width.bit_width(), self.to_byte())
            }
            TypeTag::Generic => write!(f, "generic (0x{:02x})", self.to_byte()),
        }
    }
}
