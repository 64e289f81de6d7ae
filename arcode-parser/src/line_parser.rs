use arcode::AREntry;
use nom::{
    bytes::complete::tag,
    character::complete::{not_line_ending, space0, space1},
    combinator::map,
    error::VerboseError,
    sequence::{preceded, tuple},
    IResult,
};

use crate::primitives::{hex_word, symbol_group_4, symbol_group_5};

/// Parses the content of a `$` name line without consuming eol.
///
/// Returns the code name with surrounding whitespace removed.
pub fn name_line(input: &str) -> IResult<&str, &str, VerboseError<&str>> {
    map(
        preceded(preceded(space0, tag("$")), not_line_ending),
        str::trim,
    )(input)
}

/// Parses the content of a plain instruction line without consuming eol
pub fn instr_line(input: &str) -> IResult<&str, AREntry, VerboseError<&str>> {
    let tuple_instruction =
        tuple((space0, hex_word, space1, hex_word, space0))(input);
    match tuple_instruction {
        Ok((
            leftover,
            (
                _, // space0
                cmd_addr,
                _, // space1
                value,
                _, // space0
            ),
        )) => Ok((leftover, AREntry::new(cmd_addr, value))),
        Err(e) => Err(e),
    }
}

/// Parses the content of an encrypted block line without consuming eol.
///
/// Returns the 13-symbol concatenation of the three dash-separated groups.
pub fn encrypted_line(
    input: &str,
) -> IResult<&str, String, VerboseError<&str>> {
    let tuple_block = tuple((
        space0,
        symbol_group_4,
        tag("-"),
        symbol_group_4,
        tag("-"),
        symbol_group_5,
        space0,
    ))(input);
    match tuple_block {
        Ok((
            leftover,
            (
                _, // space0
                first,
                _, // "-"
                second,
                _, // "-"
                third,
                _, // space0
            ),
        )) => Ok((leftover, format!("{first}{second}{third}"))),
        Err(e) => Err(e),
    }
}

/// Matches the content of an empty line.
/// This is explicitly allowed to not consume any input and return success
pub fn empty_line(input: &str) -> IResult<&str, (), VerboseError<&str>> {
    map(space0, |_| ())(input)
}
