use core::fmt;
use core::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use arcode::{ARCode, DataSize};
use itertools::Itertools;
use log::error;

use crate::{
    interpreter::{run_code, TraceSink},
    memory::GuestMemory,
};

/// Result type shared by the interpreter and the engine
pub type CheatResult<T> = core::result::Result<T, CheatError>;

/// Possible failures while running one code.
///
/// A failure retires the code from the active set; sibling codes keep
/// running and guest memory keeps whatever the code wrote before failing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheatError {
    /// A zero-code opcode outside the known encodings
    UnknownZeroCode {
        /// The full value word carrying the opcode
        value: u32,
    },

    /// The row-write zero-code, which only a physical device executes
    RowCode,

    /// A master code, which configures the hardware hook and is never
    /// executed by an emulated engine
    MasterCode,

    /// The code targets the engine's own patch region
    SelfModifying {
        /// The decoded guest-address field of the offending instruction
        gcaddr: u32,
    },

    /// Fill-and-slide over a width that has no slide semantics
    SlideWidth {
        /// The width selected by the arming zero-code
        size: DataSize,
    },

    /// A pointer chase landed outside the main-RAM window
    BadPointer {
        /// The pointer that was read from guest memory
        ptr: u32,
    },

    /// A memory-copy parameter word with its reserved byte set
    CopyReserved {
        /// The full parameter word
        value: u32,
    },
}

impl fmt::Display for CheatError {
    #[allow(clippy::pattern_type_mismatch)]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownZeroCode { value } => {
                write!(f, "unknown zero-code ({value:08x})")
            }
            Self::RowCode => {
                write!(f, "row-write zero-codes are not supported")
            }
            Self::MasterCode => write!(f, "master codes are not needed"),
            Self::SelfModifying { gcaddr } => write!(
                f,
                "the code tries to patch the cheat engine itself \
                 ({gcaddr:08x})"
            ),
            Self::SlideWidth { size } => {
                write!(f, "fill-and-slide cannot write {size} values")
            }
            Self::BadPointer { ptr } => {
                write!(f, "pointer {ptr:08x} is outside main RAM")
            }
            Self::CopyReserved { value } => write!(
                f,
                "memory-copy parameter {value:08x} sets its reserved byte"
            ),
        }
    }
}

/// Destination for user-visible failure reports.
///
/// The engine reports through this seam instead of raising dialogs itself,
/// so the interpreter stays testable and a frontend decides how loud to be.
pub trait Reporter: Send {
    /// Deliver one report to the user
    fn report(&mut self, message: &str);
}

/// The default [`Reporter`]: failures go to the log facade
#[derive(Copy, Clone, Debug, Default)]
pub struct LogReporter;

impl Reporter for LogReporter {
    fn report(&mut self, message: &str) {
        error!("{message}");
    }
}

/// The process-wide cheat engine: the active code set, the self-log, and
/// the per-tick executor.
///
/// The enclosing emulator holds exactly one instance.  Mutating operations
/// serialize on an internal mutex; the flags are relaxed atomics that other
/// threads may read slightly stale.  When the cheats gate is off, every
/// mutating operation and the tick run are no-ops.
pub struct CheatEngine {
    /// Active codes, in application order
    codes: Mutex<Vec<ARCode>>,
    /// Captured trace lines, appended while self-logging is on
    self_log: Mutex<Vec<String>>,
    /// Where failure reports go
    reporter: Mutex<Box<dyn Reporter>>,
    /// Whether trace lines are captured into the self-log
    use_internal_log: AtomicBool,
    /// Set after a tick pass so later passes stop tracing until the next
    /// [`Self::apply_codes`] re-arms it
    logging_latched: AtomicBool,
    /// The host's cheats-enabled gate
    cheats_enabled: AtomicBool,
}

impl CheatEngine {
    /// An engine with no active codes
    #[must_use]
    pub fn new(cheats_enabled: bool) -> Self {
        Self {
            codes: Mutex::new(Vec::new()),
            self_log: Mutex::new(Vec::new()),
            reporter: Mutex::new(Box::new(LogReporter)),
            use_internal_log: AtomicBool::new(false),
            logging_latched: AtomicBool::new(false),
            cheats_enabled: AtomicBool::new(cheats_enabled),
        }
    }

    /// Recover the guarded value even if a holder panicked; the code list
    /// and log stay usable because every mutation leaves them consistent
    fn lock<'a, T>(guarded: &'a Mutex<T>) -> MutexGuard<'a, T> {
        guarded.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Flip the host's cheats gate
    pub fn set_cheats_enabled(&self, enabled: bool) {
        self.cheats_enabled.store(enabled, Ordering::Relaxed);
    }

    /// Whether the host currently allows cheats
    #[must_use]
    pub fn cheats_enabled(&self) -> bool {
        self.cheats_enabled.load(Ordering::Relaxed)
    }

    /// Replace the active set with the `active` codes from a parsed list,
    /// preserving their order
    pub fn apply_codes(&self, codes: &[ARCode]) {
        if !self.cheats_enabled() {
            return;
        }
        let filtered = codes
            .iter()
            .filter(|code| code.active)
            .cloned()
            .collect_vec();
        *Self::lock(&self.codes) = filtered;
        self.logging_latched.store(false, Ordering::Relaxed);
    }

    /// Append one code to the active set if it is active.
    ///
    /// Unlike [`Self::apply_codes`] this does not re-arm tracing; the
    /// latch stays down until the next full application.
    pub fn add_code(&self, code: ARCode) {
        if !self.cheats_enabled() || !code.active {
            return;
        }
        Self::lock(&self.codes).push(code);
    }

    /// Number of codes currently in the active set
    #[must_use]
    pub fn active_code_count(&self) -> usize {
        Self::lock(&self.codes).len()
    }

    /// Names of the codes currently in the active set, in run order
    #[must_use]
    pub fn active_code_names(&self) -> Vec<String> {
        Self::lock(&self.codes)
            .iter()
            .map(|code| code.name.clone())
            .collect_vec()
    }

    /// Replace the failure-report destination
    pub fn set_reporter(&self, reporter: Box<dyn Reporter>) {
        *Self::lock(&self.reporter) = reporter;
    }

    /// Start or stop capturing trace lines into the self-log
    pub fn enable_self_logging(&self, enabled: bool) {
        self.use_internal_log.store(enabled, Ordering::Relaxed);
    }

    /// Whether trace lines are being captured
    #[must_use]
    pub fn is_self_logging_enabled(&self) -> bool {
        self.use_internal_log.load(Ordering::Relaxed)
    }

    /// A copy of the captured trace lines
    #[must_use]
    pub fn get_self_log(&self) -> Vec<String> {
        Self::lock(&self.self_log).clone()
    }

    /// Drop the captured trace lines
    pub fn clear_self_log(&self) {
        Self::lock(&self.self_log).clear();
    }

    /// The per-tick entry point: run every active code against guest
    /// memory, retiring codes whose run failed.
    ///
    /// Survivor order matches application order.  The whole pass happens
    /// under the store lock, so no mutation is observable mid-pass.
    pub fn run_all_active(&self, memory: &mut dyn GuestMemory) {
        if !self.cheats_enabled() {
            return;
        }
        let latched = self.logging_latched.load(Ordering::Relaxed);
        let capture = self.use_internal_log.load(Ordering::Relaxed);
        let mut trace_lines: Vec<String> = Vec::new();

        let mut codes = Self::lock(&self.codes);
        let mut survivors = Vec::with_capacity(codes.len());
        for code in codes.drain(..) {
            let mut trace = TraceSink::new(latched, &mut trace_lines);
            match run_code(memory, &code, &mut trace) {
                Ok(()) => survivors.push(code),
                Err(reason) => {
                    let message = format!(
                        "Action Replay code \"{}\" disabled: {reason}",
                        code.name
                    );
                    Self::lock(&self.reporter).report(&message);
                }
            }
        }
        *codes = survivors;
        drop(codes);

        if capture && !trace_lines.is_empty() {
            Self::lock(&self.self_log).append(&mut trace_lines);
        }
        // Trace only the first pass after apply_codes; every later tick
        // would repeat the same lines
        self.logging_latched.store(true, Ordering::Relaxed);
    }
}

impl Default for CheatEngine {
    fn default() -> Self {
        Self::new(false)
    }
}
