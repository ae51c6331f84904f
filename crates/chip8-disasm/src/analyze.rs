use std::collections::HashMap;

use bitvec::vec::BitVec;
use serde::Serialize;
use tracing::{debug, trace};

use chip8_rs::decoder::{Decoded, Op};

use crate::model::{read_u16, Image};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BlockKind {
    Main,
    Subroutine { entry: u16 },
    Data,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Block {
    pub name: String,
    pub kind: BlockKind,
    pub insns: Vec<Decoded>,
}

impl Block {
    fn new(name: impl Into<String>, kind: BlockKind, insns: Vec<Decoded>) -> Self {
        Self { name: name.into(), kind, insns }
    }
}

/// A called address and everything known about it: the offsets of the CALLs
/// that reach it and the last offset of its body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallSite {
    pub target: u16,
    pub from: Vec<u16>,
    pub ends: u16,
}

impl CallSite {
    pub fn name(&self) -> String {
        subroutine_name(self.target)
    }
}

/// Labeled partition of a program. Subroutines come first in the order their
/// first CALL appears, then `main`, then `data` when present.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Labels {
    pub blocks: Vec<Block>,
    pub calls: Vec<CallSite>,
}

impl Labels {
    pub fn get(&self, name: &str) -> Option<&Block> {
        self.blocks.iter().find(|b| b.name == name)
    }

    pub fn main(&self) -> &Block {
        self.blocks
            .iter()
            .find(|b| b.kind == BlockKind::Main)
            .expect("partition always holds a main block")
    }

    pub fn data(&self) -> Option<&Block> {
        self.blocks.iter().find(|b| b.kind == BlockKind::Data)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.blocks.iter().map(|b| b.name.as_str())
    }
}

pub fn subroutine_name(target: u16) -> String {
    format!("fn_{target:04x}")
}

/// Groups CALLs by target offset in first-seen order and computes where each
/// target's body ends. Calls whose target is outside the stream are ignored.
pub fn find_calls(insns: &[Decoded], base: u16) -> Vec<CallSite> {
    let index: HashMap<u16, usize> = insns.iter().enumerate().map(|(i, d)| (d.at, i)).collect();
    let mut calls: Vec<CallSite> = Vec::new();
    let mut by_target: HashMap<u16, usize> = HashMap::new();

    for d in insns {
        let Some(target) = d.call_target().and_then(|addr| addr.checked_sub(base)) else { continue };
        if !index.contains_key(&target) {
            continue;
        }
        if let Some(&slot) = by_target.get(&target) {
            calls[slot].from.push(d.at);
            continue;
        }
        let ends = scan_to_ret(insns, &index, target);
        trace!(target, ends, "new call target");
        by_target.insert(target, calls.len());
        calls.push(CallSite { target, from: vec![d.at], ends });
    }
    calls
}

/// Walks forward from `start` while records are contiguous, stopping on the
/// first `ret` after the entry. Returns the offset of the last record in the run.
fn scan_to_ret(insns: &[Decoded], index: &HashMap<u16, usize>, start: u16) -> u16 {
    let mut ends = start;
    while let Some(next) = ends.checked_add(2) {
        let Some(&i) = index.get(&next) else { break };
        ends = next;
        if insns[i].op == Op::Ret {
            break;
        }
    }
    ends
}

/// Splits a decoded program into subroutine blocks, `main`, and an optional
/// trailing `data` block. Never fails: with no calls and no `jmp` the result
/// is a single `main` holding every record.
pub fn reconstruct(insns: &[Decoded], img: &Image) -> Labels {
    let calls = find_calls(insns, img.base);

    let names: HashMap<u16, String> = calls.iter().map(|c| (c.target, c.name())).collect();
    let mut records: Vec<Decoded> = insns.to_vec();
    for d in records.iter_mut() {
        let Some(target) = d.call_target().and_then(|addr| img.offset_of(addr)) else { continue };
        if let Some(name) = names.get(&target) {
            d.label = Some(name.clone());
        }
    }

    let slots = records.iter().map(|d| d.at as usize / 2 + 1).max().unwrap_or(0);
    let mut claimed: BitVec = BitVec::repeat(false, slots);
    let mut slot_of: HashMap<u16, usize> = HashMap::with_capacity(records.len());
    for (i, d) in records.iter().enumerate() {
        slot_of.insert(d.at, i);
    }

    let mut blocks: Vec<Block> = Vec::with_capacity(calls.len() + 2);
    for call in &calls {
        let mut body = Vec::new();
        for off in (call.target..=call.ends).step_by(2) {
            let Some(&i) = slot_of.get(&off) else { continue };
            let slot = off as usize / 2;
            if claimed[slot] {
                continue;
            }
            claimed.set(slot, true);
            body.push(records[i].clone());
        }
        debug!(
            name = %call.name(),
            start = call.target,
            ends = call.ends,
            len = body.len(),
            callers = call.from.len(),
            "subroutine"
        );
        blocks.push(Block::new(call.name(), BlockKind::Subroutine { entry: call.target }, body));
    }

    let mut main: Vec<Decoded> = records
        .into_iter()
        .filter(|d| !claimed[d.at as usize / 2])
        .collect();

    let data = split_trailing_data(&mut main, &blocks, img);
    blocks.push(Block::new("main", BlockKind::Main, main));
    if let Some(data) = data {
        blocks.push(Block::new("data", BlockKind::Data, data));
    }

    Labels { blocks, calls }
}

/// Detaches everything after the last `jmp` in `main` as literal data, unless
/// some direct jump or call anywhere in the program still targets it. A `jmp`
/// that ends `main` yields an empty region.
fn split_trailing_data(main: &mut Vec<Decoded>, subs: &[Block], img: &Image) -> Option<Vec<Decoded>> {
    let last_jmp = main.iter().rposition(|d| d.op == Op::Jmp)?;
    let candidates = &main[last_jmp + 1..];

    let reached = main
        .iter()
        .chain(subs.iter().flat_map(|b| b.insns.iter()))
        .filter_map(|d| d.jump_target().or_else(|| d.call_target()))
        .filter_map(|addr| img.offset_of(addr))
        .any(|target| candidates.iter().any(|c| c.at == target));
    if reached {
        trace!(start = ?candidates.first().map(|d| d.at), "trailing records are jump targets; kept as code");
        return None;
    }

    let data: Vec<Decoded> = main
        .drain(last_jmp + 1..)
        .map(|d| Decoded::data(read_u16(img, d.at).unwrap_or(d.raw), d.at))
        .collect();
    debug!(start = ?data.first().map(|d| d.at), len = data.len(), "trailing data region");
    Some(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chip8_rs::decoder::{decode_all, DecodeMode};
    use pretty_assertions::assert_eq;

    fn image(words: &[u16]) -> Image {
        Image::new(0x200, words.iter().flat_map(|w| w.to_be_bytes()).collect())
    }

    fn run(img: &Image) -> Labels {
        let insns = decode_all(&img.bytes, DecodeMode::Lenient).unwrap();
        reconstruct(&insns, img)
    }

    fn offsets(b: &Block) -> Vec<u16> {
        b.insns.iter().map(|d| d.at).collect()
    }

    #[test]
    fn no_calls_no_jump_is_a_single_main() {
        let img = image(&[0x00E0, 0x6005, 0x7001]);
        let labels = run(&img);
        assert_eq!(labels.names().collect::<Vec<_>>(), vec!["main"]);
        assert_eq!(offsets(labels.main()), vec![0, 2, 4]);
        assert!(labels.calls.is_empty());
    }

    #[test]
    fn empty_program_still_has_main() {
        let labels = run(&image(&[]));
        assert_eq!(labels.names().collect::<Vec<_>>(), vec!["main"]);
        assert!(labels.main().insns.is_empty());
    }

    #[test]
    fn call_extracts_body_through_ret() {
        // 0x00: call 0x210, then filler up to 0x10, body 0x10..=0x18 ending in ret
        let mut words = vec![0x2210, 0x00E0, 0x00E0, 0x00E0, 0x00E0, 0x00E0, 0x00E0, 0x00E0];
        words.extend([0x6001, 0x7001, 0x7002, 0x7003, 0x00EE]);
        let labels = run(&image(&words));

        assert_eq!(labels.names().collect::<Vec<_>>(), vec!["fn_0010", "main"]);
        let body = labels.get("fn_0010").unwrap();
        assert_eq!(body.kind, BlockKind::Subroutine { entry: 0x10 });
        assert_eq!(offsets(body), vec![0x10, 0x12, 0x14, 0x16, 0x18]);
        assert_eq!(offsets(labels.main()), vec![0, 2, 4, 6, 8, 10, 12, 14]);
        assert_eq!(labels.main().insns[0].label.as_deref(), Some("fn_0010"));
        assert_eq!(labels.main().insns[0].call_target(), None);
        assert_eq!(labels.calls, vec![CallSite { target: 0x10, from: vec![0], ends: 0x18 }]);
    }

    #[test]
    fn body_without_ret_runs_to_end_of_contiguous_stream() {
        let labels = run(&image(&[0x2204, 0x00E0, 0x6001, 0x6002]));
        assert_eq!(offsets(labels.get("fn_0004").unwrap()), vec![4, 6]);
        assert_eq!(offsets(labels.main()), vec![0, 2]);
    }

    #[test]
    fn calls_outside_the_program_are_left_numeric() {
        // below the base, and past the end
        let labels = run(&image(&[0x2100, 0x2300, 0x00EE]));
        assert_eq!(labels.names().collect::<Vec<_>>(), vec!["main"]);
        assert_eq!(labels.main().insns[0].call_target(), Some(0x100));
        assert_eq!(labels.main().insns[1].call_target(), Some(0x300));
    }

    #[test]
    fn subroutines_follow_first_call_order_and_share_callers() {
        let words = [0x220C, 0x2208, 0x220C, 0x1206, 0x6001, 0x00EE, 0x6002, 0x00EE];
        let labels = run(&image(&words));
        assert_eq!(labels.names().collect::<Vec<_>>(), vec!["fn_000c", "fn_0008", "main", "data"]);
        assert_eq!(labels.calls[0].from, vec![0, 4]);
        assert_eq!(offsets(labels.get("fn_000c").unwrap()), vec![0xc, 0xe]);
        assert_eq!(offsets(labels.get("fn_0008").unwrap()), vec![0x8, 0xa]);
        let main = labels.main();
        assert_eq!(main.insns[0].label.as_deref(), Some("fn_000c"));
        assert_eq!(main.insns[1].label.as_deref(), Some("fn_0008"));
        assert_eq!(main.insns[2].label.as_deref(), Some("fn_000c"));
    }

    #[test]
    fn calls_inside_subroutines_are_rewritten() {
        // fn_0004 calls fn_0008
        let words = [0x2204, 0x1202, 0x2208, 0x00EE, 0x00E0, 0x00EE];
        let labels = run(&image(&words));
        let outer = labels.get("fn_0004").unwrap();
        assert_eq!(outer.insns[0].label.as_deref(), Some("fn_0008"));
        assert_eq!(offsets(labels.get("fn_0008").unwrap()), vec![8, 10]);
    }

    #[test]
    fn nested_entry_gets_an_empty_block() {
        // second target lies inside the first body
        let words = [0x2206, 0x2208, 0x1204, 0x6001, 0x6002, 0x00EE];
        let labels = run(&image(&words));
        assert_eq!(offsets(labels.get("fn_0006").unwrap()), vec![6, 8, 10]);
        assert!(labels.get("fn_0008").unwrap().insns.is_empty());
        assert_eq!(labels.main().insns[1].label.as_deref(), Some("fn_0008"));
    }

    #[test]
    fn trailing_bytes_after_self_jump_become_data() {
        let img = image(&[0x00E0, 0x1202, 0xF0F0]);
        let labels = run(&img);
        assert_eq!(labels.names().collect::<Vec<_>>(), vec!["main", "data"]);
        assert_eq!(offsets(labels.main()), vec![0, 2]);
        let data = labels.data().unwrap();
        assert_eq!(data.insns, vec![Decoded::data(0xF0F0, 4)]);
    }

    #[test]
    fn jump_target_keeps_trailing_region_as_code() {
        // 0x00 jumps into what would be the data region
        let labels = run(&image(&[0x1206, 0x00E0, 0x1204, 0x6001]));
        assert!(labels.data().is_none());
        assert_eq!(offsets(labels.main()), vec![0, 2, 4, 6]);
    }

    #[test]
    fn call_from_subroutine_keeps_trailing_region_as_code() {
        // fn_0006 jumps to 0x0a, which follows main's last jmp
        let words = [0x2206, 0x1202, 0x1208, 0x120A, 0x00EE, 0x6001, 0x6002];
        let labels = run(&image(&words));
        assert!(labels.data().is_none());
    }

    #[test]
    fn jmp_as_last_record_yields_empty_data_block() {
        let labels = run(&image(&[0x00E0, 0x1202]));
        assert_eq!(labels.names().collect::<Vec<_>>(), vec!["main", "data"]);
        assert!(labels.data().unwrap().insns.is_empty());
        assert_eq!(offsets(labels.main()), vec![0, 2]);
    }

    #[test]
    fn ret_at_call_target_does_not_end_the_body() {
        let labels = run(&image(&[0x2204, 0x1202, 0x00EE, 0x00E0, 0x00EE]));
        assert_eq!(offsets(labels.get("fn_0004").unwrap()), vec![4, 6, 8]);
        assert_eq!(labels.calls, vec![CallSite { target: 4, from: vec![0], ends: 8 }]);
        assert_eq!(offsets(labels.main()), vec![0, 2]);
    }

    #[test]
    fn extraction_is_idempotent_on_main() {
        let words = [0x2206, 0x2206, 0x1204, 0x6001, 0x00EE, 0xABCD];
        let img = image(&words);
        let first = run(&img);
        assert_eq!(first.names().collect::<Vec<_>>(), vec!["fn_0006", "main", "data"]);

        let again = reconstruct(&first.main().insns, &img);
        assert!(again.calls.is_empty());
        assert_eq!(again.names().collect::<Vec<_>>(), vec!["main", "data"]);
        assert_eq!(again.main().insns, first.main().insns);
        assert!(again.data().unwrap().insns.is_empty());
    }
}
