use core::fmt;

use serde::{Deserialize, Serialize};

/// Base of the console's cached main-RAM window.  Decoded guest addresses
/// are offsets into this window.
pub const GC_RAM_BASE: u32 = 0x8000_0000;

/// A 32-bit address in the guest's address space.
pub type GuestAddr = u32;

/// The data width selected by the `size` field of a command word.
#[derive(
    Copy,
    Clone,
    Debug,
    Eq,
    PartialEq,
    Hash,
    FromPrimitive,
    ToPrimitive,
    Serialize,
    Deserialize,
)]
pub enum DataSize {
    /// 8-bit operations, with a repeat count for fills
    Byte,

    /// 16-bit operations, with a repeat count for fills
    Halfword,

    /// 32-bit integer operations
    Word,

    /// 32-bit operations where in-place addition treats the operand as an
    /// IEEE-754 single.  Writes and comparisons behave as [`DataSize::Word`].
    WordFloat,
}

impl DataSize {
    /// Number of guest-memory bytes touched by one access of this width
    #[must_use]
    pub const fn width_bytes(self) -> u32 {
        match self {
            Self::Byte => 1,
            Self::Halfword => 2,
            Self::Word | Self::WordFloat => 4,
        }
    }
}

impl fmt::Display for DataSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Byte => write!(f, "8-bit"),
            Self::Halfword => write!(f, "16-bit"),
            Self::Word => write!(f, "32-bit"),
            Self::WordFloat => write!(f, "32-bit float"),
        }
    }
}

/// The operation selected by the `subtype` field when the `type` field is
/// zero (the normal write family).
#[derive(
    Copy,
    Clone,
    Debug,
    Eq,
    PartialEq,
    Hash,
    FromPrimitive,
    ToPrimitive,
    Serialize,
    Deserialize,
)]
pub enum WriteSubtype {
    /// Write the operand at the effective address, repeated for 8/16-bit
    /// widths by the count packed into the operand's upper bits
    WriteFill,

    /// Read a pointer from the effective address and write the operand
    /// relative to wherever it points
    WritePointer,

    /// In-place add of the operand to the value at the effective address
    AddCode,

    /// Hardware-boot master code.  Not executed by an emulated engine.
    MasterCode,
}

#[allow(
    clippy::use_debug,
    reason = "Debug formatter used to get the subtype mnemonic from enum \
              value"
)]
impl fmt::Display for WriteSubtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Use Debug formatter to get the identifier of this variant
        write!(f, "{self:?}")
    }
}

/// The comparison operator selected by a non-zero `type` field.
///
/// A command word whose `type` field is zero belongs to the write family and
/// has no comparison operator.
#[derive(
    Copy,
    Clone,
    Debug,
    Eq,
    PartialEq,
    Hash,
    FromPrimitive,
    ToPrimitive,
    Serialize,
    Deserialize,
)]
pub enum CondOp {
    /// Operand at the effective address equals the value word
    Equal = 1,

    /// Operand differs from the value word
    NotEqual = 2,

    /// Operand is less than the value word, both signed at the chosen width
    LessSigned = 3,

    /// Operand is greater than the value word, both signed at the chosen
    /// width
    GreaterSigned = 4,

    /// Operand is less than the value word, unsigned
    LessUnsigned = 5,

    /// Operand is greater than the value word, unsigned
    GreaterUnsigned = 6,

    /// Bitwise AND of operand and value word is non-zero
    MaskSet = 7,
}

impl fmt::Display for CondOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Equal => write!(f, "=="),
            Self::NotEqual => write!(f, "!="),
            Self::LessSigned => write!(f, "<(signed)"),
            Self::GreaterSigned => write!(f, ">(signed)"),
            Self::LessUnsigned => write!(f, "<(unsigned)"),
            Self::GreaterUnsigned => write!(f, ">(unsigned)"),
            Self::MaskSet => write!(f, "&"),
        }
    }
}

/// What a failed conditional does to the remainder of the code, selected by
/// the `subtype` field of a conditional command word.
#[derive(
    Copy,
    Clone,
    Debug,
    Eq,
    PartialEq,
    Hash,
    FromPrimitive,
    ToPrimitive,
    Serialize,
    Deserialize,
)]
pub enum CondAction {
    /// Skip the next instruction
    SkipLine,

    /// Skip the next two instructions
    SkipTwoLines,

    /// Skip until an endif marker instruction is reached
    SkipUntilEndif,

    /// Abandon the remainder of this code for the current tick
    SkipAllCodes,
}

#[allow(
    clippy::use_debug,
    reason = "Debug formatter used to get the action mnemonic from enum value"
)]
impl fmt::Display for CondAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Use Debug formatter to get the identifier of this variant
        write!(f, "{self:?}")
    }
}

/// The packed 32-bit command-address word of an instruction.
///
/// Wraps the raw word and exposes the decoded fields.  Equality is defined
/// on the raw word, so sentinel comparisons (such as the endif marker) stay
/// on the undecoded value.
///
/// | field   | bits (inclusive) | meaning                          |
/// |---------|------------------|----------------------------------|
/// | gcaddr  | 0..=24           | guest address within main RAM    |
/// | size    | 25..=26          | data width selector              |
/// | type    | 27..=29          | 0 = write family, 1..=7 compare  |
/// | subtype | 30..=31          | family-specific subtype          |
#[derive(
    Copy, Clone, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize,
)]
pub struct ArAddr {
    /// The packed word as it appears in a listing
    raw: u32,
}

impl ArAddr {
    /// Wrap a raw command-address word
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self { raw }
    }

    /// The packed word, undecoded
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.raw
    }

    /// The 25-bit guest address field
    #[must_use]
    pub const fn gcaddr(self) -> u32 {
        self.raw & 0x01FF_FFFF
    }

    /// The guest address this word targets, inside the cached main-RAM
    /// window
    #[must_use]
    pub const fn effective(self) -> GuestAddr {
        self.gcaddr() | GC_RAM_BASE
    }

    /// The decoded data width selector
    #[must_use]
    pub const fn size(self) -> DataSize {
        match (self.raw >> 25) & 0x3 {
            0 => DataSize::Byte,
            1 => DataSize::Halfword,
            2 => DataSize::Word,
            _ => DataSize::WordFloat,
        }
    }

    /// The raw 3-bit `type` field.  Zero selects the write family; any other
    /// value selects a conditional operator.
    #[must_use]
    pub const fn code_type(self) -> u32 {
        (self.raw >> 27) & 0x7
    }

    /// The raw 2-bit `subtype` field
    #[must_use]
    pub const fn subtype(self) -> u32 {
        (self.raw >> 30) & 0x3
    }

    /// The write-family operation selected by `subtype`.
    ///
    /// Only meaningful when [`Self::code_type`] is zero.
    #[must_use]
    pub const fn write_subtype(self) -> WriteSubtype {
        match self.subtype() {
            0 => WriteSubtype::WriteFill,
            1 => WriteSubtype::WritePointer,
            2 => WriteSubtype::AddCode,
            _ => WriteSubtype::MasterCode,
        }
    }

    /// The comparison operator selected by a non-zero `type` field, or
    /// `None` for a write-family word
    #[must_use]
    pub fn cond_op(self) -> Option<CondOp> {
        num_traits::FromPrimitive::from_u32(self.code_type())
    }

    /// The conditional follow-through selected by `subtype`.
    ///
    /// Only meaningful when [`Self::code_type`] is non-zero.
    #[must_use]
    pub const fn cond_action(self) -> CondAction {
        match self.subtype() {
            0 => CondAction::SkipLine,
            1 => CondAction::SkipTwoLines,
            2 => CondAction::SkipUntilEndif,
            _ => CondAction::SkipAllCodes,
        }
    }

    /// Pack a write-family command word
    #[allow(
        clippy::unwrap_used,
        reason = "arcode tests guarantee that all field enums convert to u32"
    )]
    #[must_use]
    pub fn write(subtype: WriteSubtype, size: DataSize, gcaddr: u32) -> Self {
        use num_traits::ToPrimitive;
        let size_bits = size.to_u32().unwrap();
        let subtype_bits = subtype.to_u32().unwrap();
        Self {
            raw: (gcaddr & 0x01FF_FFFF)
                | (size_bits << 25)
                | (subtype_bits << 30),
        }
    }

    /// Pack a conditional command word
    #[allow(
        clippy::unwrap_used,
        reason = "arcode tests guarantee that all field enums convert to u32"
    )]
    #[must_use]
    pub fn conditional(
        op: CondOp,
        action: CondAction,
        size: DataSize,
        gcaddr: u32,
    ) -> Self {
        use num_traits::ToPrimitive;
        let size_bits = size.to_u32().unwrap();
        let op_bits = op.to_u32().unwrap();
        let action_bits = action.to_u32().unwrap();
        Self {
            raw: (gcaddr & 0x01FF_FFFF)
                | (size_bits << 25)
                | (op_bits << 27)
                | (action_bits << 30),
        }
    }
}

impl fmt::Display for ArAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08X}", self.raw)
    }
}

/// Utilities for enumerating every decodable command-word field combination
pub mod test_utils {
    use super::{ArAddr, CondAction, CondOp, DataSize, WriteSubtype};

    /// All data width selectors
    pub const DATA_SIZES: [DataSize; 4] = [
        DataSize::Byte,
        DataSize::Halfword,
        DataSize::Word,
        DataSize::WordFloat,
    ];

    /// All write-family subtypes
    pub const WRITE_SUBTYPES: [WriteSubtype; 4] = [
        WriteSubtype::WriteFill,
        WriteSubtype::WritePointer,
        WriteSubtype::AddCode,
        WriteSubtype::MasterCode,
    ];

    /// All conditional comparison operators
    pub const COND_OPS: [CondOp; 7] = [
        CondOp::Equal,
        CondOp::NotEqual,
        CondOp::LessSigned,
        CondOp::GreaterSigned,
        CondOp::LessUnsigned,
        CondOp::GreaterUnsigned,
        CondOp::MaskSet,
    ];

    /// All conditional follow-through actions
    pub const COND_ACTIONS: [CondAction; 4] = [
        CondAction::SkipLine,
        CondAction::SkipTwoLines,
        CondAction::SkipUntilEndif,
        CondAction::SkipAllCodes,
    ];

    /// Iterate over every write-family command word at one guest address
    pub fn all_write_addrs(gcaddr: u32) -> impl Iterator<Item = ArAddr> {
        itertools::iproduct!(WRITE_SUBTYPES.iter(), DATA_SIZES.iter())
            .map(move |(sub, size)| ArAddr::write(*sub, *size, gcaddr))
    }

    /// Iterate over every conditional command word at one guest address
    pub fn all_conditional_addrs(gcaddr: u32) -> impl Iterator<Item = ArAddr> {
        itertools::iproduct!(
            COND_OPS.iter(),
            COND_ACTIONS.iter(),
            DATA_SIZES.iter()
        )
        .map(move |(op, action, size)| {
            ArAddr::conditional(*op, *action, *size, gcaddr)
        })
    }
}

#[cfg(test)]
mod tests {
    use coverage_helper::test;
    use itertools::Itertools;

    use super::*;

    #[test]
    fn write_words_decode_to_their_fields() {
        for sub in test_utils::WRITE_SUBTYPES {
            for size in test_utils::DATA_SIZES {
                let addr = ArAddr::write(sub, size, 0x0012_3456);
                assert_eq!(addr.gcaddr(), 0x0012_3456);
                assert_eq!(addr.size(), size);
                assert_eq!(addr.code_type(), 0);
                assert_eq!(addr.write_subtype(), sub);
                assert_eq!(
                    addr.cond_op(),
                    None,
                    "a write-family word has no comparison operator"
                );
            }
        }
    }

    #[test]
    fn conditional_words_decode_to_their_fields() {
        for op in test_utils::COND_OPS {
            for action in test_utils::COND_ACTIONS {
                let addr = ArAddr::conditional(
                    op,
                    action,
                    DataSize::Halfword,
                    0x0020_0000,
                );
                assert_eq!(addr.cond_op(), Some(op));
                assert_eq!(addr.cond_action(), action);
                assert_eq!(addr.size(), DataSize::Halfword);
            }
        }
    }

    #[test]
    fn effective_address_sits_in_the_ram_window() {
        let addr = ArAddr::write(
            WriteSubtype::WriteFill,
            DataSize::Byte,
            0x0010_0000,
        );
        assert_eq!(addr.effective(), 0x8010_0000);
    }

    #[test]
    fn gcaddr_field_is_masked_to_25_bits() {
        // Packing ignores bits of the guest address that collide with the
        // selector fields
        let addr =
            ArAddr::write(WriteSubtype::WriteFill, DataSize::Byte, 0xFFFF_FFFF);
        assert_eq!(addr.gcaddr(), 0x01FF_FFFF);
        assert_eq!(addr.size(), DataSize::Byte);
    }

    #[test]
    fn enumerated_words_are_unique() {
        let words: Vec<u32> = test_utils::all_write_addrs(0x100)
            .chain(test_utils::all_conditional_addrs(0x100))
            .map(ArAddr::raw)
            .collect();
        let unique = words.iter().unique().count();
        assert_eq!(
            unique,
            words.len(),
            "distinct field combinations should pack to distinct words"
        );
    }

    #[test]
    fn equality_is_on_the_raw_word() {
        assert_eq!(ArAddr::new(0x4A20_0000), ArAddr::new(0x4A20_0000));
        assert_ne!(ArAddr::new(0), ArAddr::new(1));
    }

    #[test]
    fn all_values_support_to_u32() {
        use num_traits::cast::ToPrimitive;
        // num_traits specifies that if the number of variants is within the
        // range of the specified type, then ToPrimitive should always return
        // Some.  The packing constructors rely on this.
        for size in test_utils::DATA_SIZES {
            assert!(size.to_u32().is_some());
        }
        for sub in test_utils::WRITE_SUBTYPES {
            assert!(sub.to_u32().is_some());
        }
        for op in test_utils::COND_OPS {
            assert!(op.to_u32().is_some());
        }
        for action in test_utils::COND_ACTIONS {
            assert!(action.to_u32().is_some());
        }
    }
}
