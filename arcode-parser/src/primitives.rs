use nom::{
    bytes::complete::take_while_m_n,
    combinator::map_res,
    error::VerboseError,
    IResult,
};

/// True for the characters a plain instruction word may contain
fn is_hex_digit(c: char) -> bool {
    c.is_ascii_hexdigit()
}

/// True for the characters an encrypted block may contain.
///
/// Encrypted groups use an alphanumeric symbol alphabet wider than
/// hexadecimal; exact alphabet membership is checked by the decryptor so
/// that a bad symbol is reported against its block, not its line.
fn is_block_symbol(c: char) -> bool {
    c.is_ascii_alphanumeric()
}

/// Consumes exactly eight hex digits and returns their value
pub fn hex_word(input: &str) -> IResult<&str, u32, VerboseError<&str>> {
    map_res(take_while_m_n(8, 8, is_hex_digit), |digits: &str| {
        u32::from_str_radix(digits, 16)
    })(input)
}

/// Consumes exactly four encrypted-block symbols
pub fn symbol_group_4(input: &str) -> IResult<&str, &str, VerboseError<&str>> {
    take_while_m_n(4, 4, is_block_symbol)(input)
}

/// Consumes exactly five encrypted-block symbols
pub fn symbol_group_5(input: &str) -> IResult<&str, &str, VerboseError<&str>> {
    take_while_m_n(5, 5, is_block_symbol)(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_hex_word_parsing() {
        assert_eq!(hex_word("00100000"), Ok(("", 0x0010_0000)));
        assert_eq!(hex_word("deadBEEF"), Ok(("", 0xDEAD_BEEF)));
        assert_eq!(
            hex_word("123456789"),
            Ok(("9", 0x1234_5678)),
            "the word parser should stop after eight digits"
        );
        assert!(hex_word("0010000").is_err());
        assert!(hex_word("0010000G").is_err());
    }

    #[test]
    fn check_symbol_groups() {
        assert_eq!(symbol_group_4("JN3Q-"), Ok(("-", "JN3Q")));
        assert_eq!(symbol_group_5("W8YTZrest"), Ok(("rest", "W8YTZ")));
        assert!(symbol_group_4("J-3Q").is_err());
        assert!(symbol_group_5("W8YT").is_err());
    }
}
