use core::fmt;

use serde::{Deserialize, Serialize};

use crate::addr::ArAddr;

/// The opcode of a zero-code, taken from the top three bits of the value
/// word when the command-address word is zero.
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
pub enum ZeroCode {
    /// Terminate the current code successfully
    End = 0x0,

    /// On a physical device this adjusts an internal engine register.  The
    /// emulated engine treats it as a no-op.
    Norm = 0x2,

    /// Row-write zero-code.  Not executed by an emulated engine.
    Row = 0x3,

    /// Arm a two-line composite: fill-and-slide, or memory-copy when bits
    /// 25..=26 of the value word are both set.  The following instruction
    /// supplies the parameters.
    Composite = 0x4,
}

#[allow(
    clippy::use_debug,
    reason = "Debug formatter used to get the zero-code mnemonic from enum \
              value"
)]
impl fmt::Display for ZeroCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Use Debug formatter to get the identifier of this variant
        write!(f, "{self:?}")
    }
}

/// One 64-bit instruction: a packed command-address word and an operand.
#[derive(
    Copy, Clone, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize,
)]
pub struct AREntry {
    /// The packed command-address word
    pub cmd_addr: u32,
    /// The operand word
    pub value: u32,
}

impl AREntry {
    /// The literal instruction that terminates a skip-until region.
    ///
    /// Compared against the raw words, never the decoded fields.
    pub const ENDIF: Self = Self {
        cmd_addr: 0x0000_0000,
        value: 0x4000_0000,
    };

    /// Build an instruction from its two words
    #[must_use]
    pub const fn new(cmd_addr: u32, value: u32) -> Self {
        Self { cmd_addr, value }
    }

    /// The command-address word with field accessors
    #[must_use]
    pub const fn addr(self) -> ArAddr {
        ArAddr::new(self.cmd_addr)
    }

    /// True when the opcode lives entirely in the value word
    #[must_use]
    pub const fn is_zero_code(self) -> bool {
        self.cmd_addr == 0
    }

    /// The zero-code opcode, or `None` for an undiscovered encoding.
    ///
    /// Only meaningful when [`Self::is_zero_code`] is true.
    #[must_use]
    pub fn zero_code(self) -> Option<ZeroCode> {
        num_traits::FromPrimitive::from_u32(self.value >> 29)
    }
}

impl fmt::Display for AREntry {
    /// Formats an instruction the way listings store it.
    ///
    /// ```
    /// # use arcode::AREntry;
    /// let entry = AREntry::new(0x0010_0000, 0x0000_0AFF);
    /// assert_eq!(entry.to_string(), "00100000 00000AFF");
    /// ```
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08X} {:08X}", self.cmd_addr, self.value)
    }
}

/// A named, ordered list of instructions from a code listing.
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ARCode {
    /// The name following the `$` in the listing
    pub name: String,
    /// True when the name appears in the enabled-names list
    pub active: bool,
    /// True when the code came from the user's local listing
    pub user_defined: bool,
    /// Instructions in listing order
    pub ops: Vec<AREntry>,
}

impl ARCode {
    /// An empty, inactive code with a name
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}
