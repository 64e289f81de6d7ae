//! # Sherbet-Core
//!
//! Sherbet-Core runs Action Replay cheat codes against an emulated
//! GameCube's memory.  It is part of Sherbet, a collection of cheat-engine
//! tools for GameCube emulators.
//!
//! ## Usage
//!
//! The engine is a single owned object; the enclosing emulator holds one
//! instance, feeds it parsed codes, and calls [`CheatEngine::run_all_active`]
//! once per emulated tick with its memory bus.
//!
//! ```rust
//! # use arcode::{ARCode, AREntry};
//! # use sherbet_core::{CheatEngine, GuestMemory, MainRam};
//! let engine = CheatEngine::new(true);
//! let mut memory = MainRam::new();
//!
//! let code = ARCode {
//!     name: "Example fill".into(),
//!     active: true,
//!     user_defined: true,
//!     // Fill eleven bytes at 0x80100000 with 0xFF
//!     ops: vec![AREntry::new(0x0010_0000, 0x0000_0AFF)],
//! };
//!
//! engine.apply_codes(&[code]);
//! engine.run_all_active(&mut memory);
//! assert_eq!(memory.read_u8(0x8010_000A), 0xFF);
//! ```
//!
//! ## Memory
//!
//! The interpreter reaches guest memory only through the [`GuestMemory`]
//! trait.  [`MainRam`] is a flat heap-backed image of the console's 24 MiB
//! main-RAM window, suitable for tests and offline tooling; an emulator
//! supplies its own bus instead.  Out-of-range access is silent by
//! contract, and the interpreter guards pointer chases with [`mem_check`].
//!
//! ## Failure model
//!
//! A code that hits an unsupported or malformed instruction stops at that
//! instruction; whatever it already wrote stays written.  The executor
//! retires failing codes from the active set and reports them through the
//! engine's [`Reporter`], so one bad code never disturbs its siblings or
//! the emulator.
// Make clippy as annoying as possible
#![deny(
    // All typically enabled warnings are converted into errors
    // includes correctness, suspicious, style, complexity, and perf
    clippy::all,
    // Error on cargo lints
    clippy::cargo,
)]
#![warn(
    // Warn on pedantic and in-development nursery lints
    clippy::pedantic,
    clippy::nursery,
    // Lints from "restriction" group - enforce a consistent if arbitrary style
    clippy::alloc_instead_of_core,
    clippy::arithmetic_side_effects,
    clippy::unnecessary_cast,
    clippy::as_underscore,
    clippy::assertions_on_result_states,
    clippy::clone_on_ref_ptr,
    clippy::create_dir,
    clippy::dbg_macro,
    clippy::decimal_literal_representation,
    clippy::default_numeric_fallback,
    clippy::deref_by_slicing,
    clippy::empty_drop,
    clippy::empty_structs_with_brackets,
    clippy::exit,
    clippy::expect_used,
    clippy::filetype_is_file,
    clippy::float_arithmetic,
    clippy::fn_to_numeric_cast_any,
    clippy::format_push_string,
    clippy::get_unwrap,
    clippy::if_then_some_else_none,
    clippy::indexing_slicing,
    clippy::large_include_file,
    clippy::let_underscore_must_use,
    clippy::lossy_float_literal,
    clippy::map_err_ignore,
    clippy::mem_forget,
    clippy::missing_docs_in_private_items,
    clippy::missing_enforced_import_renames,
    clippy::mixed_read_write_in_expression,
    clippy::mod_module_files,
    clippy::multiple_inherent_impl,
    clippy::panic,
    clippy::panic_in_result_fn,
    clippy::partial_pub_fields,
    clippy::pattern_type_mismatch,
    clippy::print_stderr,
    clippy::print_stdout,
    clippy::rc_buffer,
    clippy::rc_mutex,
    clippy::rest_pat_in_fully_bound_structs,
    clippy::same_name_method,
    clippy::unseparated_literal_suffix,
    clippy::shadow_unrelated,
    clippy::str_to_string,
    clippy::string_slice,
    clippy::string_to_string,
    clippy::suspicious_xor_used_as_pow,
    clippy::todo,
    clippy::try_err,
    clippy::undocumented_unsafe_blocks,
    clippy::unimplemented,
    clippy::unnecessary_safety_comment,
    clippy::unnecessary_safety_doc,
    clippy::unnecessary_self_imports,
    clippy::unneeded_field_pattern,
    clippy::unreachable,
    clippy::unwrap_in_result,
    clippy::unwrap_used,
    clippy::use_debug,
    clippy::verbose_file_reads,
)]

/// The engine object: code store, per-tick executor, self-log, and the
/// error and reporting types shared with the interpreter
mod engine;
pub use engine::{
    CheatEngine, CheatError, CheatResult, LogReporter, Reporter,
};

/// Guest memory access: the adapter trait, the address window check, and a
/// flat RAM image
mod memory;
pub use memory::{mem_check, GuestMemory, MainRam, RAM_BASE, RAM_SIZE};

/// The per-code instruction walk: skip bookkeeping, composite deferral,
/// and dispatch
mod interpreter;

/// Implementations of the individual operations the interpreter dispatches
/// to
mod operations;
