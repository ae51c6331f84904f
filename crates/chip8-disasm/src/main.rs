use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use chip8_disasm::model::is_mapped;
use chip8_disasm::{disassemble, load_raw_bin, read_u8, report, Annotate, BlockKind, DisasmConfig, Image, LOAD_BASE};
use chip8_rs::decoder::{decode_at, DecodeMode};
use chip8_rs::disasm::fmt_decoded;

#[derive(Parser, Debug)]
#[command(author, version, about = "CHIP-8 disassembler CLI", long_about=None)]
struct Cli {
    /// Load address of the program (hex or dec)
    #[arg(long, default_value_t = LOAD_BASE, value_parser = parse_u16)]
    base: u16,
    /// Skip N bytes at start of file before loading
    #[arg(long, default_value_t = 0usize)]
    skip: usize,
    /// Limit bytes loaded (default: to EOF after --skip)
    #[arg(long)]
    len: Option<usize>,
    /// Fail on the first unrecognized opcode instead of emitting `bad`
    #[arg(long, global = true)]
    strict: bool,
    /// Input binary path
    #[arg(value_name = "BINFILE")]
    input: PathBuf,
    /// Subcommand
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the recovered blocks and their address ranges
    Sections,
    /// Linear disassembly of an address range [start, end)
    Range {
        /// Start address (hex or dec)
        start: String,
        /// End address (hex or dec, exclusive)
        end: String,
        /// Show instruction bytes
        #[arg(long)]
        show_bytes: bool,
        /// Write output to file instead of stdout
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
    },
    /// Full listing with subroutines and trailing data split out
    Listing {
        /// Omit the absolute address comment
        #[arg(long)]
        no_addr: bool,
        /// Omit the raw opcode comment
        #[arg(long)]
        no_op: bool,
        /// Output format: text or json
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
        /// Write listing to file instead of stdout
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat { Text, Json }

fn parse_u16(s: &str) -> Result<u16> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Ok(u16::from_str_radix(hex, 16)?)
    } else {
        Ok(s.parse::<u16>()?)
    }
}

fn emit(text: &str, out: Option<&Path>) -> Result<()> {
    match out {
        Some(path) => std::fs::write(path, text)?,
        None => println!("{text}"),
    }
    Ok(())
}

fn render_range(img: &Image, start: u16, end: u16, mode: DecodeMode, show_bytes: bool) -> Result<String> {
    anyhow::ensure!(is_mapped(img, start), "start {start:#06x} is outside the loaded program");
    let first = start - img.base;
    anyhow::ensure!(first % 2 == 0, "start must be 2-byte aligned");
    let last = img.offset_of(end).unwrap_or(0);

    let mut buf = String::new();
    let mut off = first;
    while off < last {
        let pc = img.addr_of(off);
        let Some(d) = decode_at(&img.bytes, off as usize, mode) else {
            let _ = writeln!(buf, "{pc:#06x}: <oob>");
            break;
        };
        let d = d?;
        let _ = write!(buf, "{pc:#06x}: ");
        if show_bytes {
            for i in 0..2 {
                let _ = write!(buf, "{:02x} ", read_u8(img, off + i).unwrap_or(0));
            }
            buf.push_str("  ");
        }
        let _ = writeln!(buf, "{}", fmt_decoded(&d)?);
        off += 2;
    }
    Ok(buf)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let img = load_raw_bin(&cli.input, cli.base, cli.skip, cli.len)?;
    let mode = if cli.strict { DecodeMode::Strict } else { DecodeMode::Lenient };

    match cli.cmd {
        Command::Sections => {
            let cfg = DisasmConfig { mode, annotate: Annotate::empty() };
            let listing = disassemble(&img, &cfg)?;
            println!("{:<10} {:<8} {:<8} {:<6} {:<10}", "name", "start", "end", "insns", "kind");
            for b in &listing.labels.blocks {
                let (start, end) = match (b.insns.first(), b.insns.last()) {
                    (Some(f), Some(l)) => (img.addr_of(f.at), img.addr_of(l.at) + 2),
                    _ => (0, 0),
                };
                let kind = match b.kind {
                    BlockKind::Main => "main",
                    BlockKind::Subroutine { .. } => "sub",
                    BlockKind::Data => "data",
                };
                println!("{:<10} {start:#06x}   {end:#06x}   {:<6} {kind:<10}", b.name, b.insns.len());
            }
        }
        Command::Range { start, end, show_bytes, out } => {
            let start = parse_u16(&start)?;
            let end = parse_u16(&end)?;
            anyhow::ensure!(end >= start, "end must be >= start");
            let buf = render_range(&img, start, end, mode, show_bytes)?;
            emit(buf.trim_end(), out.as_deref())?;
        }
        Command::Listing { no_addr, no_op, format, out } => {
            let mut annotate = Annotate::default();
            annotate.set(Annotate::ADDR, !no_addr);
            annotate.set(Annotate::OPCODE, !no_op);
            let listing = disassemble(&img, &DisasmConfig { mode, annotate })?;
            tracing::info!(blocks = listing.labels.blocks.len(), lines = listing.lines.len(), "listing ready");
            match format {
                OutputFormat::Text => emit(&listing.text(), out.as_deref())?,
                OutputFormat::Json => {
                    let r = report(&listing.labels, &img, annotate)?;
                    emit(&serde_json::to_string_pretty(&r)?, out.as_deref())?;
                }
            }
        }
    }

    Ok(())
}
