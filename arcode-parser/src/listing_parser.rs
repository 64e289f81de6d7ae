use core::fmt;

use arcode::{ARCode, AREntry};
use log::warn;
use nom::{branch::alt, combinator::all_consuming, combinator::map};

use crate::{
    decrypt,
    line_parser::{empty_line, encrypted_line, instr_line, name_line},
};

/// A diagnostic produced while parsing a listing.
///
/// Warnings are reported to the user but never abort a parse; the
/// offending line or block is skipped and parsing continues.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ParseWarning {
    /// One-based line number within the section body
    pub line: usize,
    /// What went wrong, phrased for a dialog
    pub message: String,
}

impl fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

/// The outcome of parsing a listing: the codes found plus any diagnostics
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ParsedListing {
    /// Codes in listing order
    pub codes: Vec<ARCode>,
    /// Diagnostics for lines and blocks that were skipped
    pub warnings: Vec<ParseWarning>,
}

/// The two persisted section bodies produced by [`save_codes`]
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SavedListing {
    /// Body of the code-listing section, holding user-defined codes only
    pub action_replay: String,
    /// Body of the enabled-names section
    pub enabled: String,
}

/// A container for the parsed content of one line of a listing
#[derive(Clone, Debug, Eq, PartialEq)]
enum LineContent {
    /// The name from a `$` line that opens a new code
    Name(String),
    /// A plain instruction
    Instr(AREntry),
    /// The 13-symbol concatenation of an encrypted block line
    Encrypted(String),
    /// A line holding only whitespace
    Empty,
}

/// Classify the content of one line.  Returns `Err` for a malformed line.
fn parse_line(line: &str) -> Result<LineContent, ()> {
    let classified = alt((
        map(all_consuming(name_line), |name| {
            LineContent::Name(name.to_owned())
        }),
        map(all_consuming(instr_line), LineContent::Instr),
        map(all_consuming(encrypted_line), LineContent::Encrypted),
        map(all_consuming(empty_line), |()| LineContent::Empty),
    ))(line);
    classified.map(|(_, content)| content).map_err(|_err| ())
}

/// Commit the in-progress code, sending any buffered encrypted blocks
/// through the decryptor first.
///
/// Each code is committed exactly once, on the `$` line that opens its
/// successor or at end of input.
fn commit_current(
    current: Option<ARCode>,
    encrypted: &mut Vec<String>,
    codes: &mut Vec<ARCode>,
    warnings: &mut Vec<ParseWarning>,
    line: usize,
) {
    let Some(mut code) = current else {
        return;
    };
    if !encrypted.is_empty() {
        if let Err(reason) = decrypt::batch_decrypt(encrypted, &mut code.ops) {
            warn!("discarding encrypted blocks of \"{}\": {reason}", code.name);
            warnings.push(ParseWarning {
                line,
                message: format!(
                    "encrypted blocks of \"{}\" were discarded: {reason}",
                    code.name
                ),
            });
        }
        encrypted.clear();
    }
    codes.push(code);
}

/// Parse the body of a code-listing section.
///
/// `user_defined` should be true when the body comes from the user's local
/// listing rather than the shared database.  Codes are returned inactive;
/// enablement is applied by [`load_codes`] from the enabled-names section.
///
/// Malformed lines are skipped and reported through
/// [`ParsedListing::warnings`]; they never abort the parse.
#[must_use]
pub fn parse_listing(input: &str, user_defined: bool) -> ParsedListing {
    let mut codes = Vec::new();
    let mut warnings = Vec::new();
    let mut current: Option<ARCode> = None;
    let mut encrypted: Vec<String> = Vec::new();
    let mut line_number = 0_usize;

    for (index, line) in input.lines().enumerate() {
        line_number = index.saturating_add(1);
        match parse_line(line) {
            Ok(LineContent::Empty) => {}
            Ok(LineContent::Name(name)) => {
                commit_current(
                    current.take(),
                    &mut encrypted,
                    &mut codes,
                    &mut warnings,
                    line_number,
                );
                let mut opened = ARCode::named(name);
                opened.user_defined = user_defined;
                current = Some(opened);
            }
            Ok(LineContent::Instr(entry)) => match current.as_mut() {
                Some(code) => code.ops.push(entry),
                None => {
                    warn!("instruction before any code name: {line}");
                    warnings.push(ParseWarning {
                        line: line_number,
                        message: String::from(
                            "instruction appears before any $ name line",
                        ),
                    });
                }
            },
            Ok(LineContent::Encrypted(block)) => {
                if current.is_some() {
                    encrypted.push(block);
                } else {
                    warn!("encrypted block before any code name: {line}");
                    warnings.push(ParseWarning {
                        line: line_number,
                        message: String::from(
                            "encrypted block appears before any $ name line",
                        ),
                    });
                }
            }
            Err(()) => {
                warn!("malformed listing line: {line}");
                warnings.push(ParseWarning {
                    line: line_number,
                    message: format!("malformed line was skipped: {line}"),
                });
            }
        }
    }
    commit_current(
        current,
        &mut encrypted,
        &mut codes,
        &mut warnings,
        line_number,
    );
    ParsedListing { codes, warnings }
}

/// Parse the body of an enabled-names section.
///
/// The section holds `$` name lines only; anything else is diagnosed and
/// skipped.  Returned names carry no `$`.
#[must_use]
pub fn parse_enabled_names(input: &str) -> (Vec<String>, Vec<ParseWarning>) {
    let mut names = Vec::new();
    let mut warnings = Vec::new();
    for (index, line) in input.lines().enumerate() {
        match parse_line(line) {
            Ok(LineContent::Name(name)) => names.push(name),
            Ok(LineContent::Empty) => {}
            Ok(LineContent::Instr(_) | LineContent::Encrypted(_))
            | Err(()) => {
                warnings.push(ParseWarning {
                    line: index.saturating_add(1),
                    message: format!(
                        "enabled-names entry is not a $ name line: {line}"
                    ),
                });
            }
        }
    }
    (names, warnings)
}

/// Parse the global and local listings and apply enablement.
///
/// Global codes come first, then local ones, preserving listing order
/// within each source.  A code is active exactly when its name appears in
/// the enabled-names body.
#[must_use]
pub fn load_codes(
    global: &str,
    local: &str,
    enabled: &str,
) -> ParsedListing {
    let mut merged = parse_listing(global, false);
    let mut local_parse = parse_listing(local, true);
    merged.codes.append(&mut local_parse.codes);
    merged.warnings.append(&mut local_parse.warnings);

    let (names, mut name_warnings) = parse_enabled_names(enabled);
    merged.warnings.append(&mut name_warnings);
    for code in &mut merged.codes {
        code.active = names.iter().any(|name| *name == code.name);
    }
    merged
}

/// Emit the persisted section bodies for a code list.
///
/// The enabled-names body lists every active code.  The listing body holds
/// user-defined codes only, each instruction as two 8-hex-digit words.
#[must_use]
pub fn save_codes(codes: &[ARCode]) -> SavedListing {
    let mut enabled = String::new();
    let mut action_replay = String::new();
    for code in codes {
        if code.active {
            enabled.push_str(&format!("${}\n", code.name));
        }
        if code.user_defined {
            action_replay.push_str(&format!("${}\n", code.name));
            for op in &code.ops {
                action_replay.push_str(&format!("{op}\n"));
            }
        }
    }
    SavedListing {
        action_replay,
        enabled,
    }
}

#[cfg(test)]
mod tests {
    use coverage_helper::test;

    use super::*;

    #[test]
    fn parse_two_codes_with_enablement() {
        let listing = "$A\n\
                       00100000 00000001\n\
                       $B\n\
                       00100004 00000002\n";
        let loaded = load_codes(listing, "", "$B\n");
        assert!(loaded.warnings.is_empty());
        assert_eq!(loaded.codes.len(), 2);
        let first = &loaded.codes[0];
        let second = &loaded.codes[1];
        assert_eq!(first.name, "A");
        assert!(!first.active);
        assert_eq!(first.ops, vec![AREntry::new(0x0010_0000, 0x0000_0001)]);
        assert_eq!(second.name, "B");
        assert!(second.active);
        assert_eq!(second.ops, vec![AREntry::new(0x0010_0004, 0x0000_0002)]);
    }

    #[test]
    fn local_codes_are_user_defined() {
        let loaded =
            load_codes("$Shared\n00100000 00000001\n", "$Mine\n00100004 00000002\n", "");
        assert_eq!(loaded.codes.len(), 2);
        assert!(!loaded.codes[0].user_defined);
        assert!(loaded.codes[1].user_defined);
    }

    #[test]
    fn malformed_lines_are_skipped_not_fatal() {
        let listing = "$A\n\
                       00100000 00000001\n\
                       this is not an instruction\n\
                       00100004 00000002\n";
        let parsed = parse_listing(listing, false);
        assert_eq!(parsed.codes.len(), 1);
        assert_eq!(
            parsed.codes[0].ops.len(),
            2,
            "the lines around a malformed one should survive"
        );
        assert_eq!(parsed.warnings.len(), 1);
        assert_eq!(parsed.warnings[0].line, 3);
    }

    #[test]
    fn instructions_before_a_name_are_diagnosed() {
        let parsed = parse_listing("00100000 00000001\n$A\n", false);
        assert_eq!(parsed.codes.len(), 1);
        assert!(parsed.codes[0].ops.is_empty());
        assert_eq!(parsed.warnings.len(), 1);
    }

    #[test]
    fn whitespace_and_blank_lines_are_ignored() {
        let listing = "\n  \n$A\n   00100000 00000001  \n\n";
        let parsed = parse_listing(listing, false);
        assert!(parsed.warnings.is_empty());
        assert_eq!(parsed.codes.len(), 1);
        assert_eq!(parsed.codes[0].ops.len(), 1);
    }

    #[test]
    fn hex_tokens_are_case_insensitive() {
        let parsed = parse_listing("$A\ndeadbeef CAFEF00D\n", false);
        assert_eq!(
            parsed.codes[0].ops,
            vec![AREntry::new(0xDEAD_BEEF, 0xCAFE_F00D)]
        );
    }

    #[test]
    fn a_code_with_no_ops_is_still_committed() {
        let parsed = parse_listing("$Placeholder\n", false);
        assert_eq!(parsed.codes.len(), 1);
        assert!(parsed.codes[0].ops.is_empty());
    }

    #[test]
    fn end_of_input_commits_exactly_once() {
        let parsed = parse_listing("$A\n00100000 00000001", false);
        assert_eq!(parsed.codes.len(), 1);
        assert_eq!(parsed.codes[0].ops.len(), 1);
    }

    #[test]
    fn save_emits_user_defined_codes_only() {
        let shared = ARCode {
            name: String::from("Shared"),
            active: true,
            user_defined: false,
            ops: vec![AREntry::new(0x0010_0000, 0x0000_0001)],
        };
        let mine = ARCode {
            name: String::from("Mine"),
            active: false,
            user_defined: true,
            ops: vec![AREntry::new(0x0010_0004, 0x0000_0002)],
        };
        let saved = save_codes(&[shared, mine]);
        assert_eq!(saved.enabled, "$Shared\n");
        assert_eq!(saved.action_replay, "$Mine\n00100004 00000002\n");
    }

    #[test]
    fn save_then_parse_round_trips_user_codes() {
        let listing = "$First\n\
                       00100000 00000AFF\n\
                       80600000 00000020\n\
                       $Second\n\
                       00400000 00000005\n";
        let first_parse = load_codes("", listing, "$First\n$Second\n");
        let saved = save_codes(&first_parse.codes);
        let second_parse =
            load_codes("", &saved.action_replay, &saved.enabled);
        assert_eq!(
            first_parse.codes, second_parse.codes,
            "user-defined plain codes should survive a save/load cycle"
        );
    }

    #[test]
    fn enabled_names_reject_other_content() {
        let (names, warnings) =
            parse_enabled_names("$Good\nnot a name\n\n$Also Good\n");
        assert_eq!(
            names,
            vec![String::from("Good"), String::from("Also Good")]
        );
        assert_eq!(warnings.len(), 1);
    }
}
