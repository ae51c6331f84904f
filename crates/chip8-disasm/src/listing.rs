use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use chip8_rs::decoder::Decoded;
use chip8_rs::disasm::{fmt_decoded, RenderError};

use crate::analyze::{BlockKind, Labels};
use crate::model::{read_u16, Image};

bitflags! {
    /// Trailing comment fields appended to each instruction line.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Annotate: u8 {
        const ADDR = 1 << 0;
        const OPCODE = 1 << 1;
    }
}

impl Default for Annotate {
    fn default() -> Self {
        Annotate::ADDR | Annotate::OPCODE
    }
}

/// Column the `;` comment starts at, indentation included.
pub const COMMENT_COLUMN: usize = 30;
const INDENT: &str = "  ";

/// One indented instruction line, with the requested annotations.
pub fn fmt_line(d: &Decoded, img: &Image, annotate: Annotate) -> Result<String, RenderError> {
    let mut line = format!("{INDENT}{}", fmt_decoded(d)?);
    if annotate.is_empty() {
        return Ok(line);
    }
    line = format!("{line:<width$}; ", width = COMMENT_COLUMN);
    if annotate.contains(Annotate::OPCODE) {
        let op = read_u16(img, d.at).unwrap_or(d.raw);
        line.push_str(&format!("{op:#06x} "));
    }
    if annotate.contains(Annotate::ADDR) {
        line.push_str(&format!("@ {:#06x}", img.addr_of(d.at)));
    }
    Ok(line)
}

/// Label line followed by instruction lines, block by block.
pub fn assemble(labels: &Labels, img: &Image, annotate: Annotate) -> Result<Vec<String>, RenderError> {
    let mut out = Vec::with_capacity(labels.blocks.iter().map(|b| b.insns.len() + 1).sum());
    for b in &labels.blocks {
        out.push(format!("{}:", b.name));
        for d in &b.insns {
            out.push(fmt_line(d, img, annotate)?);
        }
    }
    Ok(out)
}

#[derive(Debug, Clone, Serialize)]
pub struct BlockOut {
    pub name: String,
    #[serde(flatten)]
    pub kind: BlockKind,
    /// Absolute address of the first record, if any.
    pub start: Option<u16>,
    pub insns: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub base: u16,
    pub blocks: Vec<BlockOut>,
}

/// Structured form of the listing for `--format json`.
pub fn report(labels: &Labels, img: &Image, annotate: Annotate) -> Result<Report, RenderError> {
    let mut blocks = Vec::with_capacity(labels.blocks.len());
    for b in &labels.blocks {
        let insns = b
            .insns
            .iter()
            .map(|d| fmt_line(d, img, annotate).map(|l| l.trim_start().to_string()))
            .collect::<Result<Vec<_>, _>>()?;
        blocks.push(BlockOut {
            name: b.name.clone(),
            kind: b.kind,
            start: b.insns.first().map(|d| img.addr_of(d.at)),
            insns,
        });
    }
    Ok(Report { base: img.base, blocks })
}
