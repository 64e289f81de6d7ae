use arcode::{ArAddr, AREntry, CondOp, DataSize};

use crate::{
    engine::{CheatError, CheatResult},
    interpreter::TraceSink,
    memory::{mem_check, GuestMemory},
};

/// Write-and-fill: write the operand at the effective address, repeated
/// for the narrow widths by the count packed into the operand.
///
/// # Errors
///
/// Infallible today; kept fallible so the dispatch table treats every
/// operation uniformly.
pub fn ram_write_fill(
    memory: &mut dyn GuestMemory,
    addr: ArAddr,
    data: u32,
    trace: &mut TraceSink,
) -> CheatResult<()> {
    let base = addr.effective();
    match addr.size() {
        DataSize::Byte => {
            let repeat = data >> 8;
            for index in 0..=repeat {
                let target = base.wrapping_add(index);
                memory.write_u8(target, (data & 0xFF) as u8);
                if trace.active() {
                    trace.push(format!(
                        "write {:02x} to {target:08x}",
                        data & 0xFF
                    ));
                }
            }
        }
        DataSize::Halfword => {
            let repeat = data >> 16;
            for index in 0..=repeat {
                let target = base.wrapping_add(index.wrapping_mul(2));
                memory.write_u16(target, (data & 0xFFFF) as u16);
                if trace.active() {
                    trace.push(format!(
                        "write {:04x} to {target:08x}",
                        data & 0xFFFF
                    ));
                }
            }
        }
        DataSize::Word | DataSize::WordFloat => {
            memory.write_u32(base, data);
            if trace.active() {
                trace.push(format!("write {data:08x} to {base:08x}"));
            }
        }
    }
    Ok(())
}

/// Write-to-pointer: dereference the effective address and write the
/// operand relative to wherever it points.
///
/// # Errors
///
/// Returns [`CheatError::BadPointer`] when the stored pointer lies outside
/// main RAM.
pub fn write_to_pointer(
    memory: &mut dyn GuestMemory,
    addr: ArAddr,
    data: u32,
    trace: &mut TraceSink,
) -> CheatResult<()> {
    let ptr = memory.read_u32(addr.effective());
    if !mem_check(ptr) {
        return Err(CheatError::BadPointer { ptr });
    }
    match addr.size() {
        DataSize::Byte => {
            let target = ptr.wrapping_add(data >> 8);
            memory.write_u8(target, (data & 0xFF) as u8);
            if trace.active() {
                trace.push(format!(
                    "write {:02x} through {ptr:08x} at {target:08x}",
                    data & 0xFF
                ));
            }
        }
        DataSize::Halfword => {
            let target = ptr.wrapping_add((data >> 16) << 1);
            memory.write_u16(target, (data & 0xFFFF) as u16);
            if trace.active() {
                trace.push(format!(
                    "write {:04x} through {ptr:08x} at {target:08x}",
                    data & 0xFFFF
                ));
            }
        }
        DataSize::Word | DataSize::WordFloat => {
            memory.write_u32(ptr, data);
            if trace.active() {
                trace.push(format!("write {data:08x} through {ptr:08x}"));
            }
        }
    }
    Ok(())
}

/// In-place add at the effective address, wrapping at the native width.
/// The float width reinterprets storage as an IEEE-754 single and adds the
/// operand's numeric value.
///
/// # Errors
///
/// Infallible today; kept fallible so the dispatch table treats every
/// operation uniformly.
#[allow(
    clippy::float_arithmetic,
    reason = "the float width is defined as an IEEE-754 addition"
)]
pub fn add_in_place(
    memory: &mut dyn GuestMemory,
    addr: ArAddr,
    data: u32,
    trace: &mut TraceSink,
) -> CheatResult<()> {
    let target = addr.effective();
    match addr.size() {
        DataSize::Byte => {
            let sum = memory.read_u8(target).wrapping_add((data & 0xFF) as u8);
            memory.write_u8(target, sum);
            if trace.active() {
                trace.push(format!("add to {target:08x}, now {sum:02x}"));
            }
        }
        DataSize::Halfword => {
            let sum = memory
                .read_u16(target)
                .wrapping_add((data & 0xFFFF) as u16);
            memory.write_u16(target, sum);
            if trace.active() {
                trace.push(format!("add to {target:08x}, now {sum:04x}"));
            }
        }
        DataSize::Word => {
            let sum = memory.read_u32(target).wrapping_add(data);
            memory.write_u32(target, sum);
            if trace.active() {
                trace.push(format!("add to {target:08x}, now {sum:08x}"));
            }
        }
        DataSize::WordFloat => {
            let current = f32::from_bits(memory.read_u32(target));
            #[allow(
                clippy::cast_precision_loss,
                reason = "the operand is added by numeric value, as authored"
            )]
            let sum = current + data as f32;
            memory.write_u32(target, sum.to_bits());
            if trace.active() {
                trace.push(format!("add to {target:08x}, now {sum}"));
            }
        }
    }
    Ok(())
}

/// Fill-and-slide: walk guest memory from the armed address, writing a
/// value that steps by its own increment while the cursor strides.
///
/// The armed zero-code's value word supplies the start address and width.
/// The follow-up instruction supplies the start value (its full
/// command-address word) and the packed parameters: a signed 16-bit
/// address stride, a signed 8-bit value step, and the write count.
/// Each iteration writes, then advances the cursor, then steps the value.
///
/// # Errors
///
/// Returns [`CheatError::SlideWidth`] for the float width, which has no
/// slide semantics.
pub fn fill_and_slide(
    memory: &mut dyn GuestMemory,
    val_last: u32,
    entry: AREntry,
    trace: &mut TraceSink,
) -> CheatResult<()> {
    let armed = ArAddr::new(val_last);
    let size = armed.size();
    let mut cursor = armed.effective();
    let mut val = entry.cmd_addr;
    let data = entry.value;

    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_possible_wrap,
        reason = "the stride and step are defined as the signed low/high \
                  bits of the parameter word"
    )]
    let addr_incr = (data & 0xFFFF) as u16 as i16;
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_possible_wrap,
        reason = "the stride and step are defined as the signed low/high \
                  bits of the parameter word"
    )]
    let val_incr = (data >> 24) as u8 as i8;
    let write_num = (data >> 16) & 0xFF;

    let stride = match size {
        DataSize::Byte => i32::from(addr_incr),
        DataSize::Halfword => i32::from(addr_incr).wrapping_mul(2),
        DataSize::Word => i32::from(addr_incr).wrapping_mul(4),
        DataSize::WordFloat => {
            return Err(CheatError::SlideWidth { size })
        }
    };

    for _ in 0..write_num {
        match size {
            DataSize::Byte => memory.write_u8(cursor, (val & 0xFF) as u8),
            DataSize::Halfword => {
                memory.write_u16(cursor, (val & 0xFFFF) as u16);
            }
            DataSize::Word => memory.write_u32(cursor, val),
            // Rejected above
            DataSize::WordFloat => {}
        }
        let written = cursor;
        cursor = cursor.wrapping_add_signed(stride);
        if trace.active() {
            trace.push(format!(
                "slide wrote {val:08x} at {written:08x}, next {cursor:08x}"
            ));
        }
        val = val.wrapping_add_signed(i32::from(val_incr));
    }
    Ok(())
}

/// Memory-copy: move a span of bytes whose destination was armed by the
/// zero-code and whose source is this instruction's effective address.
/// A non-zero top byte in the parameter word dereferences both ends first.
///
/// # Errors
///
/// Returns [`CheatError::CopyReserved`] when the reserved byte of the
/// parameter word is set, or [`CheatError::BadPointer`] when an indirect
/// end lies outside main RAM.
pub fn memory_copy(
    memory: &mut dyn GuestMemory,
    val_last: u32,
    entry: AREntry,
    trace: &mut TraceSink,
) -> CheatResult<()> {
    let data = entry.value;
    if (data & 0x00FF_0000) != 0 {
        return Err(CheatError::CopyReserved { value: data });
    }
    let mut dest = val_last & !0x0600_0000;
    let mut src = entry.addr().effective();
    let num_bytes = data & 0x7FFF;

    if (data >> 24) != 0 {
        dest = memory.read_u32(dest);
        src = memory.read_u32(src);
        if !mem_check(dest) {
            return Err(CheatError::BadPointer { ptr: dest });
        }
        if !mem_check(src) {
            return Err(CheatError::BadPointer { ptr: src });
        }
    }

    for index in 0..num_bytes {
        let byte = memory.read_u8(src.wrapping_add(index));
        memory.write_u8(dest.wrapping_add(index), byte);
    }
    if trace.active() {
        trace.push(format!(
            "copied {num_bytes:#x} bytes from {src:08x} to {dest:08x}"
        ));
    }
    Ok(())
}

/// Sign a masked operand at the width the conditional selected
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    reason = "signing at the selected width is the point"
)]
const fn sign_at_width(value: u32, size: DataSize) -> i32 {
    match size {
        DataSize::Byte => value as u8 as i8 as i32,
        DataSize::Halfword => value as u16 as i16 as i32,
        DataSize::Word | DataSize::WordFloat => value as i32,
    }
}

/// Evaluate a conditional: compare the operand stored at the effective
/// address against the value word, both taken at the selected width.
/// The float width compares as a raw 32-bit word.
///
/// Returns true when the comparison holds.
pub fn conditional(
    memory: &mut dyn GuestMemory,
    addr: ArAddr,
    value: u32,
    op: CondOp,
    trace: &mut TraceSink,
) -> bool {
    let target = addr.effective();
    let size = addr.size();
    let (stored, operand) = match size {
        DataSize::Byte => (u32::from(memory.read_u8(target)), value & 0xFF),
        DataSize::Halfword => {
            (u32::from(memory.read_u16(target)), value & 0xFFFF)
        }
        DataSize::Word | DataSize::WordFloat => {
            (memory.read_u32(target), value)
        }
    };
    let holds = match op {
        CondOp::Equal => stored == operand,
        CondOp::NotEqual => stored != operand,
        CondOp::LessSigned => {
            sign_at_width(stored, size) < sign_at_width(operand, size)
        }
        CondOp::GreaterSigned => {
            sign_at_width(stored, size) > sign_at_width(operand, size)
        }
        CondOp::LessUnsigned => stored < operand,
        CondOp::GreaterUnsigned => stored > operand,
        CondOp::MaskSet => stored & operand != 0,
    };
    if trace.active() {
        trace.push(format!(
            "compare {stored:08x} {op} {operand:08x} at {target:08x}: {holds}"
        ));
    }
    holds
}
