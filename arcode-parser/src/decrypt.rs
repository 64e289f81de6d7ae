//! Decoding of encrypted code listings.
//!
//! Encrypted listings carry one instruction per 13-symbol block.  Each
//! symbol encodes five bits, giving 65 bits per block: one leading parity
//! bit followed by the 64 instruction bits.  After unpacking, each
//! `(cmd_addr, value)` pair is deciphered with a 32-round TEA pass under
//! the engine's fixed seed schedule.
//!
//! The cipher itself is a compatibility contract with the community
//! encoders; everything around it (symbol alphabet, block shape, parity,
//! batch handling) is checked here so that a corrupt listing is reported
//! against the block that carries the damage.

use core::fmt;

use arcode::AREntry;

/// The 32-symbol alphabet used by encrypted blocks.
///
/// The letters I, L, O, and S are absent; they are too easy to misread as
/// digits when codes circulate in print.
pub const SYMBOLS: &str = "0123456789ABCDEFGHJKMNPQRTUVWXYZ";

/// Number of symbols in one encrypted block
pub const BLOCK_SYMBOLS: usize = 13;

/// Golden-ratio round constant of the TEA cipher
const DELTA: u32 = 0x9E37_79B9;

/// Decipher starting sum: `DELTA` accumulated over all 32 rounds
const INITIAL_SUM: u32 = 0xC6EF_3720;

/// Seed schedule shared with the community encoders
const SEEDS: [u32; 4] = [0x09F4_CDB1, 0x7BEF_AA52, 0x3C27_889E, 0xD14A_6E7B];

/// Result type for block decoding
pub type DecryptResult<T> = core::result::Result<T, DecryptError>;

/// Possible failures while decoding a batch of encrypted blocks.
///
/// Block indices are zero-based positions within the batch being decoded,
/// which is the order the blocks appeared under their `$` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecryptError {
    /// A block did not hold exactly [`BLOCK_SYMBOLS`] symbols
    BadLength {
        /// Position of the offending block within the batch
        block: usize,
        /// Number of symbols the block actually held
        len: usize,
    },

    /// A block held a character outside the symbol alphabet
    BadSymbol {
        /// Position of the offending block within the batch
        block: usize,
        /// The character that is not a symbol
        symbol: char,
    },

    /// The leading parity bit contradicts the 64 payload bits
    ParityMismatch {
        /// Position of the offending block within the batch
        block: usize,
    },
}

impl fmt::Display for DecryptError {
    #[allow(clippy::pattern_type_mismatch)]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadLength { block, len } => write!(
                f,
                "encrypted block {block} holds {len} symbols instead of \
                 {BLOCK_SYMBOLS}"
            ),
            Self::BadSymbol { block, symbol } => write!(
                f,
                "encrypted block {block} holds '{symbol}' which is not a \
                 code symbol"
            ),
            Self::ParityMismatch { block } => {
                write!(f, "encrypted block {block} fails its parity check")
            }
        }
    }
}

/// The five bits encoded by one symbol, case-insensitive
fn symbol_value(symbol: char) -> Option<u32> {
    let upper = symbol.to_ascii_uppercase();
    SYMBOLS
        .chars()
        .position(|candidate| candidate == upper)
        .and_then(|position| u32::try_from(position).ok())
}

/// Unpack the 65 bits of one block and verify its parity.
///
/// Returns the 64 instruction bits, command-address word first.
///
/// # Errors
///
/// Returns a [`DecryptError`] naming `block_index` when the block has the
/// wrong shape or fails its parity check.
fn unpack_block(block: &str, block_index: usize) -> DecryptResult<u64> {
    if block.chars().count() != BLOCK_SYMBOLS {
        return Err(DecryptError::BadLength {
            block: block_index,
            len: block.chars().count(),
        });
    }
    let mut bits: u128 = 0;
    for symbol in block.chars() {
        let value = symbol_value(symbol).ok_or(DecryptError::BadSymbol {
            block: block_index,
            symbol,
        })?;
        bits = (bits << 5) | u128::from(value);
    }
    let parity = u32::try_from((bits >> 64) & 1).unwrap_or(0);
    #[allow(
        clippy::cast_possible_truncation,
        reason = "the payload is exactly the low 64 of the 65 block bits"
    )]
    let payload = bits as u64;
    // The parity bit makes the ones-count of the whole block even
    if (payload.count_ones() + parity) & 1 != 0 {
        return Err(DecryptError::ParityMismatch { block: block_index });
    }
    Ok(payload)
}

/// One 32-round TEA decipher pass over an instruction pair
fn decipher_pair(pair: &mut [u32; 2]) {
    let mut sum = INITIAL_SUM;
    let mut first = pair[0];
    let mut second = pair[1];
    for _ in 0..32 {
        second = second.wrapping_sub(
            (first << 4).wrapping_add(SEEDS[2])
                ^ first.wrapping_add(sum)
                ^ (first >> 5).wrapping_add(SEEDS[3]),
        );
        first = first.wrapping_sub(
            (second << 4).wrapping_add(SEEDS[0])
                ^ second.wrapping_add(sum)
                ^ (second >> 5).wrapping_add(SEEDS[1]),
        );
        sum = sum.wrapping_sub(DELTA);
    }
    pair[0] = first;
    pair[1] = second;
}

/// Decode a batch of encrypted blocks, appending the instructions to `out`.
///
/// The batch is all-or-nothing: on error nothing is appended, so a damaged
/// block never leaves a half-decoded code behind.
///
/// # Errors
///
/// Returns the first [`DecryptError`] encountered, naming the offending
/// block by its position in the batch.
pub fn batch_decrypt(
    blocks: &[String],
    out: &mut Vec<AREntry>,
) -> DecryptResult<()> {
    let mut decoded = Vec::with_capacity(blocks.len());
    for (block_index, block) in blocks.iter().enumerate() {
        let payload = unpack_block(block, block_index)?;
        let mut pair = [
            (payload >> 32) as u32,
            (payload & u64::from(u32::MAX)) as u32,
        ];
        decipher_pair(&mut pair);
        decoded.push(AREntry::new(pair[0], pair[1]));
    }
    out.append(&mut decoded);
    Ok(())
}
