use std::path::Path;

use crate::Error;

/// Address the program is mapped at.
pub const LOAD_BASE: u16 = 0x200;
/// Size of the addressable memory.
pub const ADDR_SPACE: usize = 0x1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pub base: u16,
    pub bytes: Vec<u8>,
}

impl Image {
    pub fn new(base: u16, bytes: Vec<u8>) -> Self {
        Self { base, bytes }
    }

    /// Absolute address of a program offset.
    pub fn addr_of(&self, offset: u16) -> u16 {
        self.base.wrapping_add(offset)
    }

    /// Program offset of an absolute address, if it lies at or above the base.
    pub fn offset_of(&self, addr: u16) -> Option<u16> {
        addr.checked_sub(self.base)
    }
}

/// Reads `path`, drops `skip` leading bytes and keeps at most `len` of the
/// rest. The result must fit between `base` and the end of the address space.
pub fn load_raw_bin(path: &Path, base: u16, skip: usize, len: Option<usize>) -> Result<Image, Error> {
    let file = std::fs::read(path)?;
    if skip > file.len() {
        return Err(Error::Window("--skip exceeds file size"));
    }
    let mut payload = &file[skip..];
    if let Some(lim) = len {
        if lim > payload.len() {
            return Err(Error::Window("--len exceeds remaining file size after skip"));
        }
        payload = &payload[..lim];
    }
    let room = ADDR_SPACE.saturating_sub(base as usize);
    if payload.len() > room {
        return Err(Error::TooLarge { len: payload.len(), base, room });
    }
    tracing::debug!(path = %path.display(), base, len = payload.len(), "loaded program");
    Ok(Image::new(base, payload.to_vec()))
}

pub fn read_u8(img: &Image, offset: u16) -> Option<u8> {
    img.bytes.get(offset as usize).copied()
}

/// Big-endian word at `offset`.
pub fn read_u16(img: &Image, offset: u16) -> Option<u16> {
    let b0 = read_u8(img, offset)?;
    let b1 = read_u8(img, offset.wrapping_add(1))?;
    Some(u16::from_be_bytes([b0, b1]))
}

pub fn is_mapped(img: &Image, addr: u16) -> bool {
    img.offset_of(addr).map_or(false, |off| (off as usize) < img.bytes.len())
}
