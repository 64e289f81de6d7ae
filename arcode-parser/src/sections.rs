//! Splitting a codes file into its named sections and emitting them back.
//!
//! A codes file is line-oriented: a `[Name]` header opens a section and the
//! lines that follow belong to it until the next header.  Lines before the
//! first header belong to no section and are ignored.

use nom::{
    bytes::complete::{is_not, tag},
    character::complete::space0,
    combinator::{all_consuming, map},
    error::VerboseError,
    sequence::{delimited, preceded, terminated},
    IResult,
};

/// Parses the content of a `[Name]` header line without consuming eol
fn header_line(input: &str) -> IResult<&str, &str, VerboseError<&str>> {
    map(
        terminated(
            preceded(space0, delimited(tag("["), is_not("]"), tag("]"))),
            space0,
        ),
        str::trim,
    )(input)
}

/// Split a codes file into `(section name, section body)` pairs in file
/// order.
///
/// Bodies keep their lines verbatim, joined with `\n` and without the
/// header line.  A name that appears twice produces two pairs; callers
/// that want merge semantics can concatenate.
#[must_use]
pub fn split_sections(input: &str) -> Vec<(String, String)> {
    let mut sections: Vec<(String, Vec<&str>)> = Vec::new();
    for line in input.lines() {
        if let Ok((_, name)) = all_consuming(header_line)(line) {
            sections.push((name.to_owned(), Vec::new()));
        } else if let Some((_, body)) = sections.last_mut() {
            body.push(line);
        }
        // Lines before the first header are ignored
    }
    sections
        .into_iter()
        .map(|(name, body)| (name, body.join("\n")))
        .collect()
}

/// The body of the first section with a name, or `None` when the file has
/// no such section
#[must_use]
pub fn find_section(input: &str, name: &str) -> Option<String> {
    split_sections(input)
        .into_iter()
        .find(|(candidate, _)| candidate == name)
        .map(|(_, body)| body)
}

/// Emit one section the way [`split_sections`] reads it back
#[must_use]
pub fn render_section(name: &str, body: &str) -> String {
    if body.is_empty() {
        format!("[{name}]\n")
    } else {
        format!("[{name}]\n{body}\n")
    }
}
