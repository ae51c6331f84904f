pub mod analyze;
pub mod listing;
pub mod model;

// Re-export commonly used types/functions for consumers
pub use analyze::{reconstruct, Block, BlockKind, CallSite, Labels};
pub use listing::{assemble, report, Annotate, Report};
pub use model::{load_raw_bin, read_u16, read_u8, Image, LOAD_BASE};

use chip8_rs::decoder::{decode_all, DecodeError, DecodeMode};
use chip8_rs::disasm::RenderError;
use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Window(&'static str),
    #[error("program of {len} bytes does not fit at {base:#06x} ({room} bytes available)")]
    TooLarge { len: usize, base: u16, room: usize },
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Render(#[from] RenderError),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DisasmConfig {
    pub mode: DecodeMode,
    pub annotate: Annotate,
}

impl Default for DisasmConfig {
    fn default() -> Self {
        Self {
            mode: DecodeMode::Lenient,
            annotate: Annotate::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Listing {
    pub labels: Labels,
    pub lines: Vec<String>,
}

impl Listing {
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}

/// Decode, partition into labeled blocks, and render.
pub fn disassemble(img: &Image, cfg: &DisasmConfig) -> Result<Listing, Error> {
    let insns = decode_all(&img.bytes, cfg.mode)?;
    let labels = reconstruct(&insns, img);
    let lines = assemble(&labels, img, cfg.annotate)?;
    Ok(Listing { labels, lines })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn strict_config_surfaces_decode_errors() {
        let img = Image::new(LOAD_BASE, vec![0x00, 0xE0, 0x80, 0x08]);
        let cfg = DisasmConfig { mode: DecodeMode::Strict, annotate: Annotate::empty() };
        let err = disassemble(&img, &cfg).unwrap_err();
        assert!(matches!(err, Error::Decode(DecodeError::UnrecognizedInstruction { op: 0x8008, at: 2 })));

        let ok = disassemble(&img, &DisasmConfig { annotate: Annotate::empty(), ..Default::default() }).unwrap();
        assert_eq!(ok.text(), "main:\n  cls\n  bad 0x8008 @ 0x0002");
    }
}
