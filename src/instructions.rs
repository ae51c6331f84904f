use crate::decoder::Op;

/// Operand layout of a mnemonic, as printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddrMode {
    /// No operands.
    Implied,
    /// `#0x0nnn`
    Abs,
    /// `#0x0nnn+V0`
    AbsV0,
    /// Absolute address or a resolved label.
    Target,
    /// `Vx, #kk` with `kk` in decimal.
    RegImm,
    /// `Vx, Vy`
    RegReg,
    /// `Vx`
    Reg,
    /// `I, #nnn` with `nnn` in decimal.
    IndexImm,
    /// `Vx, <special>`
    RegFrom(&'static str),
    /// `<special>, Vx<suffix>`
    IntoFrom(&'static str, &'static str),
    /// Raw opcode and offset of an unrecognized word.
    Raw,
    /// `0xhhhh` literal.
    Word,
}

#[derive(Debug, Clone, Copy)]
pub struct InstrDesc {
    pub op: Op,
    pub mnemonic: &'static str,
    pub mode: AddrMode,
}

const fn desc(op: Op, mnemonic: &'static str, mode: AddrMode) -> InstrDesc {
    InstrDesc { op, mnemonic, mode }
}

pub const TABLE: &[InstrDesc] = &[
    desc(Op::Sys, "sys", AddrMode::Abs),
    desc(Op::Cls, "cls", AddrMode::Implied),
    desc(Op::Ret, "ret", AddrMode::Implied),
    desc(Op::Jmp, "jmp", AddrMode::Abs),
    desc(Op::Call, "call", AddrMode::Target),
    desc(Op::Se, "se", AddrMode::RegImm),
    desc(Op::Sne, "sne", AddrMode::RegImm),
    desc(Op::SeV, "se", AddrMode::RegReg),
    desc(Op::SneV, "sne", AddrMode::RegReg),
    desc(Op::Ld, "ld", AddrMode::RegImm),
    desc(Op::Add, "add", AddrMode::RegImm),
    desc(Op::LdV, "ld", AddrMode::RegReg),
    // upper case is part of the output format
    desc(Op::Or, "OR", AddrMode::RegReg),
    desc(Op::And, "and", AddrMode::RegReg),
    desc(Op::Xor, "xor", AddrMode::RegReg),
    desc(Op::AddV, "add", AddrMode::RegReg),
    desc(Op::Sub, "sub", AddrMode::RegReg),
    desc(Op::Shr, "shr", AddrMode::RegReg),
    desc(Op::SubN, "subn", AddrMode::RegReg),
    desc(Op::Shl, "shl", AddrMode::RegReg),
    desc(Op::LdI, "ld", AddrMode::IndexImm),
    desc(Op::JpV0, "jmp", AddrMode::AbsV0),
    desc(Op::Rnd, "rnd", AddrMode::RegImm),
    desc(Op::Drw, "drw", AddrMode::RegReg),
    desc(Op::Skp, "skp", AddrMode::Reg),
    desc(Op::Sknp, "sknp", AddrMode::Reg),
    desc(Op::LdVDt, "ld", AddrMode::RegFrom("DT")),
    desc(Op::LdVK, "ld", AddrMode::RegFrom("K")),
    desc(Op::LdDtV, "ld", AddrMode::IntoFrom("DT", "")),
    desc(Op::LdStV, "ld", AddrMode::IntoFrom("ST", "")),
    desc(Op::AddIV, "add", AddrMode::IntoFrom("I", "")),
    desc(Op::LdFV, "ld", AddrMode::IntoFrom("I", ".F")),
    desc(Op::LdBV, "ld", AddrMode::IntoFrom("I", ".B")),
    desc(Op::LdIV, "ld", AddrMode::IntoFrom("I", "")),
    desc(Op::LdVI, "ld", AddrMode::RegFrom("I")),
    desc(Op::Bad, "bad", AddrMode::Raw),
    desc(Op::Dat, "dat", AddrMode::Word),
];

/// Descriptor for `op`, or `None` if the table has no row for it.
pub fn lookup(op: Op) -> Option<&'static InstrDesc> {
    lookup_in(TABLE, op)
}

pub fn lookup_in(table: &'static [InstrDesc], op: Op) -> Option<&'static InstrDesc> {
    table.iter().find(|d| d.op == op)
}
