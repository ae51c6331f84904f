use serde::{Deserialize, Serialize};

use crate::isa::chip8::Chip8Decoder;

/// Instruction tag. `Bad` and `Dat` are synthetic: the former stands in for an
/// opcode outside the table, the latter for two bytes reclaimed as literal data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Op {
    Sys,
    Cls,
    Ret,
    Jmp,
    Call,
    Se,
    Sne,
    SeV,
    SneV,
    Ld,
    Add,
    LdV,
    Or,
    And,
    Xor,
    AddV,
    Sub,
    Shr,
    SubN,
    Shl,
    LdI,
    JpV0,
    Rnd,
    Drw,
    Skp,
    Sknp,
    LdVDt,
    LdVK,
    LdDtV,
    LdStV,
    AddIV,
    LdFV,
    LdBV,
    LdIV,
    LdVI,
    Bad,
    Dat,
}

/// Where a control transfer goes: a raw 12-bit address, or a label once the
/// target has been recovered as a subroutine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target<'a> {
    Abs(u16),
    Label(&'a str),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decoded {
    /// Byte offset within the loaded program; always even.
    pub at: u16,
    /// The big-endian word this record came from.
    pub raw: u16,
    pub op: Op,
    pub vx: u8,
    pub vy: u8,
    pub n: u8,
    pub kk: u8,
    pub nnn: u16,
    /// Symbolic CALL target, set once the callee is extracted as a subroutine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Decoded {
    /// Splits `raw` into the standard x/y/n/kk/nnn operand fields.
    pub fn new(op: Op, raw: u16, at: u16) -> Self {
        Self {
            at,
            raw,
            op,
            vx: ((raw & 0x0F00) >> 8) as u8,
            vy: ((raw & 0x00F0) >> 4) as u8,
            n: (raw & 0x000F) as u8,
            kk: (raw & 0x00FF) as u8,
            nnn: raw & 0x0FFF,
            label: None,
        }
    }

    pub fn bad(raw: u16, at: u16) -> Self {
        Self::new(Op::Bad, raw, at)
    }

    pub fn data(raw: u16, at: u16) -> Self {
        Self::new(Op::Dat, raw, at)
    }

    pub fn target(&self) -> Target<'_> {
        match &self.label {
            Some(name) => Target::Label(name),
            None => Target::Abs(self.nnn),
        }
    }

    /// Absolute CALL target, or `None` if this is not a call or the call has
    /// already been resolved to a label.
    pub fn call_target(&self) -> Option<u16> {
        match (self.op, self.target()) {
            (Op::Call, Target::Abs(addr)) => Some(addr),
            _ => None,
        }
    }

    pub fn jump_target(&self) -> Option<u16> {
        match self.op {
            Op::Jmp => Some(self.nnn),
            _ => None,
        }
    }
}

pub trait Decoder {
    /// Decodes one word found at offset `at`. `None` means the word matches no
    /// known instruction pattern.
    fn decode(&self, raw: u16, at: u16) -> Option<Decoded>;
}

/// Policy for words that match no known instruction pattern.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecodeMode {
    /// Abort with [`DecodeError::UnrecognizedInstruction`].
    Strict,
    /// Substitute an [`Op::Bad`] record and keep going.
    #[default]
    Lenient,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("unrecognized instruction {op:#06x} @ {at:#06x}")]
    UnrecognizedInstruction { op: u16, at: u16 },
}

/// Lazy decoder over a byte buffer, one record per 2-byte-aligned offset.
/// A trailing odd byte is ignored.
pub struct DecodeStream<'a, D> {
    bytes: &'a [u8],
    pc: usize,
    end: usize,
    mode: DecodeMode,
    dec: D,
    failed: bool,
}

impl<'a, D: Decoder> DecodeStream<'a, D> {
    pub fn new(dec: D, bytes: &'a [u8], mode: DecodeMode) -> Self {
        // Offsets are u16; anything past that is not addressable.
        let end = (bytes.len() & !1).min(u16::MAX as usize + 1);
        Self { bytes, pc: 0, end, mode, dec, failed: false }
    }

    /// Restarts the stream at `offset`, rounded down to an even offset.
    pub fn seek(mut self, offset: usize) -> Self {
        self.pc = offset & !1;
        self
    }
}

impl<D: Decoder> Iterator for DecodeStream<'_, D> {
    type Item = Result<Decoded, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.pc >= self.end {
            return None;
        }
        let pc = self.pc;
        self.pc += 2;
        let raw = u16::from_be_bytes([self.bytes[pc], self.bytes[pc + 1]]);
        let at = pc as u16;
        match self.dec.decode(raw, at) {
            Some(d) => Some(Ok(d)),
            None => match self.mode {
                DecodeMode::Lenient => {
                    tracing::trace!(op = raw, at, "unrecognized opcode kept as bad");
                    Some(Ok(Decoded::bad(raw, at)))
                }
                DecodeMode::Strict => {
                    self.failed = true;
                    Some(Err(DecodeError::UnrecognizedInstruction { op: raw, at }))
                }
            },
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = if self.failed { 0 } else { self.end.saturating_sub(self.pc) / 2 };
        (0, Some(left))
    }
}

pub fn decode_stream(bytes: &[u8], mode: DecodeMode) -> DecodeStream<'_, Chip8Decoder> {
    DecodeStream::new(Chip8Decoder::new(), bytes, mode)
}

/// Decodes the whole buffer, stopping at the first error in strict mode.
pub fn decode_all(bytes: &[u8], mode: DecodeMode) -> Result<Vec<Decoded>, DecodeError> {
    decode_stream(bytes, mode).collect()
}

/// Decodes the single record at `offset`, if the buffer holds a full word there.
pub fn decode_at(bytes: &[u8], offset: usize, mode: DecodeMode) -> Option<Result<Decoded, DecodeError>> {
    if offset % 2 != 0 {
        return None;
    }
    decode_stream(bytes, mode).seek(offset).next()
}
