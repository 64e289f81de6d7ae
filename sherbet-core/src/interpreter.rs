use arcode::{ARCode, AREntry, WriteSubtype, ZeroCode};
use log::debug;

use crate::{
    engine::{CheatError, CheatResult},
    memory::GuestMemory,
    operations,
};

/// Skip the remainder of the code; the run still counts as a success
const SKIP_ALL: i32 = -3;

/// Skip instructions until an endif marker clears the state
const SKIP_UNTIL_ENDIF: i32 = -2;

/// A composite armed by a zero-code and consumed by the next instruction
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Composite {
    /// Walk guest memory writing an incrementing value
    FillAndSlide,
    /// Copy a span of bytes, optionally through pointers
    MemoryCopy,
}

/// Per-run interpreter state, reset for every code
struct RunState {
    /// Positive: instructions left to skip.  Negative: one of the
    /// sentinels above.
    skip_count: i32,
    /// Value word of the zero-code that armed the pending composite
    val_last: u32,
    /// One-shot composite armed by the previous instruction
    pending: Option<Composite>,
}

/// Collects trace lines for the engine's self-log.
///
/// Tracing is latched off after the first pass over a code set; when
/// latched, lines are neither formatted nor kept.
pub struct TraceSink<'a> {
    /// True once the first traced pass has completed
    latched: bool,
    /// Lines produced by this pass
    lines: &'a mut Vec<String>,
}

impl<'a> TraceSink<'a> {
    /// A sink writing into `lines` unless `latched`
    pub fn new(latched: bool, lines: &'a mut Vec<String>) -> Self {
        Self { latched, lines }
    }

    /// True when callers should bother formatting a line
    #[must_use]
    pub fn active(&self) -> bool {
        !self.latched
    }

    /// Record one line
    pub fn push(&mut self, line: String) {
        if self.latched {
            return;
        }
        debug!("{line}");
        self.lines.push(line);
    }
}

/// Run one code against guest memory.
///
/// Instructions execute in listing order.  Skip bookkeeping runs before
/// everything else, then consumption of a pending composite, then the
/// guard against codes that patch the engine itself, then zero-code and
/// normal dispatch.
///
/// # Errors
///
/// Returns a [`CheatError`] describing the first failing instruction.
/// Whatever the code wrote before the failure stays written.
pub fn run_code(
    memory: &mut dyn GuestMemory,
    code: &ARCode,
    trace: &mut TraceSink,
) -> CheatResult<()> {
    let mut state = RunState {
        skip_count: 0,
        val_last: 0,
        pending: None,
    };
    if trace.active() {
        trace.push(format!("running code \"{}\"", code.name));
    }

    for entry in &code.ops {
        // Skip bookkeeping takes precedence over everything, including
        // composite consumption
        if state.skip_count > 0 {
            state.skip_count = state.skip_count.saturating_sub(1);
            continue;
        }
        if state.skip_count == SKIP_ALL {
            return Ok(());
        }
        if state.skip_count == SKIP_UNTIL_ENDIF {
            if *entry == AREntry::ENDIF {
                // The marker itself is consumed silently
                state.skip_count = 0;
            }
            continue;
        }

        if let Some(composite) = state.pending.take() {
            match composite {
                Composite::FillAndSlide => operations::fill_and_slide(
                    memory,
                    state.val_last,
                    *entry,
                    trace,
                )?,
                Composite::MemoryCopy => operations::memory_copy(
                    memory,
                    state.val_last,
                    *entry,
                    trace,
                )?,
            }
            continue;
        }

        let addr = entry.addr();
        if (0x2000..0x3000).contains(&addr.gcaddr()) {
            return Err(CheatError::SelfModifying {
                gcaddr: addr.gcaddr(),
            });
        }

        if entry.is_zero_code() {
            match entry.zero_code() {
                Some(ZeroCode::End) => return Ok(()),
                // A physical device adjusts an internal register here
                Some(ZeroCode::Norm) => {}
                Some(ZeroCode::Row) => return Err(CheatError::RowCode),
                Some(ZeroCode::Composite) => {
                    let kind = if (entry.value >> 25) & 0x3 == 0x3 {
                        Composite::MemoryCopy
                    } else {
                        Composite::FillAndSlide
                    };
                    state.pending = Some(kind);
                    state.val_last = entry.value;
                }
                None => {
                    return Err(CheatError::UnknownZeroCode {
                        value: entry.value,
                    })
                }
            }
            continue;
        }

        match addr.cond_op() {
            None => match addr.write_subtype() {
                WriteSubtype::WriteFill => operations::ram_write_fill(
                    memory,
                    addr,
                    entry.value,
                    trace,
                )?,
                WriteSubtype::WritePointer => operations::write_to_pointer(
                    memory,
                    addr,
                    entry.value,
                    trace,
                )?,
                WriteSubtype::AddCode => operations::add_in_place(
                    memory,
                    addr,
                    entry.value,
                    trace,
                )?,
                WriteSubtype::MasterCode => {
                    return Err(CheatError::MasterCode)
                }
            },
            Some(op) => {
                let holds = operations::conditional(
                    memory,
                    addr,
                    entry.value,
                    op,
                    trace,
                );
                if !holds {
                    state.skip_count = match addr.cond_action() {
                        arcode::CondAction::SkipLine => 1,
                        arcode::CondAction::SkipTwoLines => 2,
                        arcode::CondAction::SkipUntilEndif => SKIP_UNTIL_ENDIF,
                        arcode::CondAction::SkipAllCodes => SKIP_ALL,
                    };
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use arcode::{ArAddr, CondAction, CondOp, DataSize, WriteSubtype};
    use coverage_helper::test;

    use super::*;
    use crate::memory::MainRam;

    fn code_of(ops: Vec<AREntry>) -> ARCode {
        ARCode {
            name: String::from("test code"),
            active: true,
            user_defined: false,
            ops,
        }
    }

    fn run(memory: &mut MainRam, ops: Vec<AREntry>) -> CheatResult<()> {
        let mut lines = Vec::new();
        let mut trace = TraceSink::new(true, &mut lines);
        run_code(memory, &code_of(ops), &mut trace)
    }

    /// A 32-bit write-and-fill entry
    fn write_word(gcaddr: u32, value: u32) -> AREntry {
        AREntry::new(
            ArAddr::write(WriteSubtype::WriteFill, DataSize::Word, gcaddr)
                .raw(),
            value,
        )
    }

    /// A 16-bit equality conditional entry
    fn halfword_eq(gcaddr: u32, action: CondAction, value: u32) -> AREntry {
        AREntry::new(
            ArAddr::conditional(
                CondOp::Equal,
                action,
                DataSize::Halfword,
                gcaddr,
            )
            .raw(),
            value,
        )
    }

    #[test]
    fn false_conditional_skips_exactly_one_line() {
        let mut ram = MainRam::new();
        ram.write_u16(0x8020_0000, 0x1234);
        run(
            &mut ram,
            vec![
                halfword_eq(0x0020_0000, CondAction::SkipLine, 0x4321),
                write_word(0x0030_0000, 0xAAAA_AAAA),
                write_word(0x0030_1000, 0xBBBB_BBBB),
            ],
        )
        .unwrap();
        assert_eq!(ram.read_u32(0x8030_0000), 0, "the next line is skipped");
        assert_eq!(
            ram.read_u32(0x8030_1000),
            0xBBBB_BBBB,
            "the line after next still runs"
        );
    }

    #[test]
    fn false_conditional_skips_exactly_two_lines() {
        let mut ram = MainRam::new();
        ram.write_u16(0x8020_0000, 0x1234);
        run(
            &mut ram,
            vec![
                halfword_eq(0x0020_0000, CondAction::SkipTwoLines, 0x4321),
                write_word(0x0030_0000, 0xAAAA_AAAA),
                write_word(0x0030_1000, 0xBBBB_BBBB),
                write_word(0x0030_2000, 0xCCCC_CCCC),
            ],
        )
        .unwrap();
        assert_eq!(ram.read_u32(0x8030_0000), 0);
        assert_eq!(ram.read_u32(0x8030_1000), 0);
        assert_eq!(ram.read_u32(0x8030_2000), 0xCCCC_CCCC);
    }

    #[test]
    fn true_conditional_skips_nothing() {
        let mut ram = MainRam::new();
        ram.write_u16(0x8020_0000, 0x1234);
        run(
            &mut ram,
            vec![
                halfword_eq(0x0020_0000, CondAction::SkipTwoLines, 0x1234),
                write_word(0x0030_0000, 0xAAAA_AAAA),
                write_word(0x0030_1000, 0xBBBB_BBBB),
            ],
        )
        .unwrap();
        assert_eq!(ram.read_u32(0x8030_0000), 0xAAAA_AAAA);
        assert_eq!(ram.read_u32(0x8030_1000), 0xBBBB_BBBB);
    }

    #[test]
    fn skip_until_endif_resumes_after_the_marker() {
        let mut ram = MainRam::new();
        // Condition is false: memory holds zero
        run(
            &mut ram,
            vec![
                halfword_eq(0x0020_0000, CondAction::SkipUntilEndif, 0x1234),
                write_word(0x0030_0000, 0xAAAA_AAAA),
                write_word(0x0030_1000, 0xBBBB_BBBB),
                AREntry::ENDIF,
                write_word(0x0030_2000, 0xCCCC_CCCC),
            ],
        )
        .unwrap();
        assert_eq!(ram.read_u32(0x8030_0000), 0);
        assert_eq!(ram.read_u32(0x8030_1000), 0);
        assert_eq!(
            ram.read_u32(0x8030_2000),
            0xCCCC_CCCC,
            "execution resumes after the marker"
        );
    }

    #[test]
    fn endif_equality_is_on_the_raw_words() {
        let mut ram = MainRam::new();
        // An entry that decodes like the marker but has an address bit set
        // must not clear the skip
        run(
            &mut ram,
            vec![
                halfword_eq(0x0020_0000, CondAction::SkipUntilEndif, 0x1234),
                AREntry::new(0x0000_0001, 0x4000_0000),
                write_word(0x0030_0000, 0xAAAA_AAAA),
            ],
        )
        .unwrap();
        assert_eq!(
            ram.read_u32(0x8030_0000),
            0,
            "a near-marker should not terminate the skip region"
        );
    }

    #[test]
    fn endif_outside_a_skip_region_is_inert() {
        let mut ram = MainRam::new();
        run(
            &mut ram,
            vec![AREntry::ENDIF, write_word(0x0030_0000, 0xAAAA_AAAA)],
        )
        .unwrap();
        assert_eq!(
            ram.read_u32(0x8030_0000),
            0xAAAA_AAAA,
            "the marker doubles as a no-op zero-code outside a skip"
        );
    }

    #[test]
    fn skip_all_abandons_the_rest_successfully() {
        let mut ram = MainRam::new();
        let result = run(
            &mut ram,
            vec![
                halfword_eq(0x0020_0000, CondAction::SkipAllCodes, 0x1234),
                write_word(0x0030_0000, 0xAAAA_AAAA),
                // Even an instruction that would fail is never reached
                AREntry::new(0x0400_2500, 0x0000_0001),
            ],
        );
        assert_eq!(result, Ok(()));
        assert_eq!(ram.read_u32(0x8030_0000), 0);
    }

    #[test]
    fn end_zero_code_stops_the_code() {
        let mut ram = MainRam::new();
        run(
            &mut ram,
            vec![
                write_word(0x0030_0000, 0xAAAA_AAAA),
                AREntry::new(0, 0),
                write_word(0x0030_1000, 0xBBBB_BBBB),
            ],
        )
        .unwrap();
        assert_eq!(ram.read_u32(0x8030_0000), 0xAAAA_AAAA);
        assert_eq!(ram.read_u32(0x8030_1000), 0);
    }

    #[test]
    fn unknown_zero_code_fails_and_keeps_prior_writes() {
        let mut ram = MainRam::new();
        let result = run(
            &mut ram,
            vec![
                write_word(0x0030_0000, 0xAAAA_AAAA),
                AREntry::new(0, 0x2000_0000),
            ],
        );
        assert_eq!(
            result,
            Err(CheatError::UnknownZeroCode {
                value: 0x2000_0000
            })
        );
        assert_eq!(
            ram.read_u32(0x8030_0000),
            0xAAAA_AAAA,
            "writes before the failure are not rolled back"
        );
    }

    #[test]
    fn row_and_master_codes_are_rejected() {
        let mut ram = MainRam::new();
        assert_eq!(
            run(&mut ram, vec![AREntry::new(0, 0x6000_0000)]),
            Err(CheatError::RowCode)
        );
        let master = AREntry::new(
            ArAddr::write(WriteSubtype::MasterCode, DataSize::Word, 0x100)
                .raw(),
            0,
        );
        assert_eq!(
            run(&mut ram, vec![master]),
            Err(CheatError::MasterCode)
        );
    }

    #[test]
    fn engine_region_writes_are_blocked() {
        let mut ram = MainRam::new();
        let result = run(&mut ram, vec![AREntry::new(0x0400_2500, 0x0000_0001)]);
        assert_eq!(
            result,
            Err(CheatError::SelfModifying { gcaddr: 0x2500 })
        );
        assert_eq!(
            ram.read_u32(0x8000_2500),
            0,
            "the blocked instruction must not write"
        );
    }

    #[test]
    fn composite_zero_code_consumes_the_next_line() {
        let mut ram = MainRam::new();
        run(
            &mut ram,
            vec![
                // Arm a byte-wide slide at 0x80700000
                AREntry::new(0, 0x8070_0000),
                // Start value 0x10, stride +1, step 0, three writes
                AREntry::new(0x0000_0010, 0x0003_0001),
                write_word(0x0030_0000, 0xDDDD_DDDD),
            ],
        )
        .unwrap();
        assert_eq!(ram.read_u8(0x8070_0000), 0x10);
        assert_eq!(ram.read_u8(0x8070_0001), 0x10);
        assert_eq!(ram.read_u8(0x8070_0002), 0x10);
        assert_eq!(
            ram.read_u32(0x8030_0000),
            0xDDDD_DDDD,
            "execution continues past the composite"
        );
    }

    #[test]
    fn memory_copy_selector_picks_the_copy_composite() {
        let mut ram = MainRam::new();
        for (offset, byte) in
            [0xDE, 0xAD, 0xBE, 0xEF, 0xCA].iter().enumerate()
        {
            ram.write_u8(0x8040_0000 + offset as u32, *byte);
        }
        run(
            &mut ram,
            vec![
                AREntry::new(0, 0x8650_0000),
                AREntry::new(0x0040_0000, 0x0000_0005),
            ],
        )
        .unwrap();
        assert_eq!(ram.read_u8(0x8050_0000), 0xDE);
        assert_eq!(ram.read_u8(0x8050_0004), 0xCA);
        assert_eq!(ram.read_u8(0x8050_0005), 0);
    }

    #[test]
    fn a_skipped_arm_line_never_arms_the_composite() {
        let mut ram = MainRam::new();
        // Condition is false, so the arming zero-code is skipped and the
        // would-be parameter line runs as a plain write instead
        run(
            &mut ram,
            vec![
                halfword_eq(0x0020_0000, CondAction::SkipLine, 0x1234),
                AREntry::new(0, 0x8070_0000),
                write_word(0x0030_0000, 0xAAAA_AAAA),
            ],
        )
        .unwrap();
        assert_eq!(
            ram.read_u32(0x8030_0000),
            0xAAAA_AAAA,
            "skip bookkeeping runs before composite arming"
        );
        assert_eq!(ram.read_u8(0x8070_0000), 0, "no slide ever runs");
    }

    #[test]
    fn empty_codes_run_successfully() {
        let mut ram = MainRam::new();
        assert_eq!(run(&mut ram, vec![]), Ok(()));
    }
}
