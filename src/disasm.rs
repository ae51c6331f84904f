use crate::decoder::{Decoded, Op, Target};
use crate::instructions::{lookup_in, AddrMode, InstrDesc, TABLE};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    #[error("unknown instruction type {op:?} @ {at:#06x}")]
    UnknownInstruction { op: Op, at: u16 },
}

/// Renders one record as one line of assembly text.
pub fn fmt_decoded(d: &Decoded) -> Result<String, RenderError> {
    fmt_with(TABLE, d)
}

/// Renders against a caller-supplied descriptor table. A record whose tag has
/// no row fails instead of falling back to a placeholder.
pub fn fmt_with(table: &'static [InstrDesc], d: &Decoded) -> Result<String, RenderError> {
    let desc = lookup_in(table, d.op).ok_or(RenderError::UnknownInstruction { op: d.op, at: d.at })?;
    let mn = desc.mnemonic;
    let line = match desc.mode {
        AddrMode::Implied => mn.to_string(),
        AddrMode::Abs => format!("{mn} #{:#06x}", d.nnn),
        AddrMode::AbsV0 => format!("{mn} #{:#06x}+V0", d.nnn),
        AddrMode::Target => match d.target() {
            Target::Label(name) => format!("{mn} {name}"),
            Target::Abs(addr) => format!("{mn} #{addr:#06x}"),
        },
        AddrMode::RegImm => format!("{mn} V{:x}, #{}", d.vx, d.kk),
        AddrMode::RegReg => format!("{mn} V{:x}, V{:x}", d.vx, d.vy),
        AddrMode::Reg => format!("{mn} V{:x}", d.vx),
        AddrMode::IndexImm => format!("{mn} I, #{}", d.nnn),
        AddrMode::RegFrom(src) => format!("{mn} V{:x}, {src}", d.vx),
        AddrMode::IntoFrom(dst, suffix) => format!("{mn} {dst}, V{:x}{suffix}", d.vx),
        AddrMode::Raw => format!("{mn} {:#06x} @ {:#06x}", d.raw, d.at),
        AddrMode::Word => format!("{mn} {:#06x}", d.raw),
    };
    Ok(line)
}
