use crate::decoder::{Decoded, Decoder, Op};

/// CHIP-8 decoder for the standard 35-opcode table.
/// Dispatches on the major nibble, then on the low nibble (`8xy_`) or the
/// low byte (`Ex__`, `Fx__`) where the family is shared.
#[derive(Debug, Clone, Copy, Default)]
pub struct Chip8Decoder;

impl Chip8Decoder {
    pub fn new() -> Self {
        Self
    }
}

impl Decoder for Chip8Decoder {
    fn decode(&self, raw: u16, at: u16) -> Option<Decoded> {
        let kk = (raw & 0xFF) as u8;

        let op = match raw & 0xF000 {
            0x0000 => match raw {
                0x00E0 => Op::Cls,
                0x00EE => Op::Ret,
                _ => Op::Sys,
            },
            0x1000 => Op::Jmp,
            0x2000 => Op::Call,
            0x3000 => Op::Se,
            0x4000 => Op::Sne,
            // 5xy0; the low nibble is not checked
            0x5000 => Op::SeV,
            0x6000 => Op::Ld,
            0x7000 => Op::Add,
            0x8000 => match raw & 0xF {
                0x0 => Op::LdV,
                0x1 => Op::Or,
                0x2 => Op::And,
                0x3 => Op::Xor,
                0x4 => Op::AddV,
                0x5 => Op::Sub,
                0x6 => Op::Shr,
                0x7 => Op::SubN,
                0xE => Op::Shl,
                _ => return None,
            },
            0x9000 => Op::SneV,
            0xA000 => Op::LdI,
            0xB000 => Op::JpV0,
            0xC000 => Op::Rnd,
            0xD000 => Op::Drw,
            0xE000 => match kk {
                0x9E => Op::Skp,
                0xA1 => Op::Sknp,
                _ => return None,
            },
            0xF000 => match kk {
                0x07 => Op::LdVDt,
                0x0A => Op::LdVK,
                0x15 => Op::LdDtV,
                0x18 => Op::LdStV,
                0x1E => Op::AddIV,
                0x29 => Op::LdFV,
                0x33 => Op::LdBV,
                0x55 => Op::LdIV,
                0x65 => Op::LdVI,
                _ => return None,
            },
            _ => return None,
        };

        Some(Decoded::new(op, raw, at))
    }
}
