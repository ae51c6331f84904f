pub mod decoder;
pub mod disasm;
pub mod instructions;

pub mod isa {
    pub mod chip8; // CHIP-8 standard opcode table
}

pub use decoder::{decode_all, decode_at, decode_stream, DecodeError, DecodeMode, Decoded, Decoder, Op, Target};
pub use disasm::{fmt_decoded, RenderError};
pub use isa::chip8::Chip8Decoder;
