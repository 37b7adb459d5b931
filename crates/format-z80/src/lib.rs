//! ZX Spectrum .Z80 snapshots, versions 1 to 3.
//!
//! Version 1 is a 30-byte header and a single 48K memory image. Versions 2
//! and 3 zero the PC field at offset 6, add an extended header whose length
//! word at offset 30 identifies the version, and store memory as 16K pages,
//! each with its own length and page id.
//!
//! | Offset | Size | Field                                           |
//! |--------|------|-------------------------------------------------|
//! | 0      | 2    | A, F                                            |
//! | 2      | 6    | BC, HL, PC (0 for v2/v3)                        |
//! | 8      | 4    | SP, I, R (bits 0-6)                             |
//! | 12     | 1    | bit 0 R bit 7, bits 1-3 border, bit 5 compressed|
//! | 13     | 10   | DE, BC', DE', HL', A', F'                       |
//! | 23     | 4    | IY, IX                                          |
//! | 27     | 3    | IFF1, IFF2, interrupt mode                      |
//! | 30     | 2    | extended header length (23 or 54)               |
//! | 32     | 2    | PC                                              |
//! | 34     | 1    | hardware type                                   |
//! | 35     | 1    | last write to port $7FFD                        |
//! | 38     | 17   | AY selected register, AY registers 0-15         |
//! | 55     | 3    | v3 T-state counter                              |

mod rle;

pub use rle::{compress, decompress};

use emu_core::Registers;

/// Size of the version 1 header.
pub const BASE_HEADER_SIZE: usize = 30;

/// Extended header length written by version 2.
pub const V2_EXTENSION: u16 = 23;

/// Extended header length written by version 3.
pub const V3_EXTENSION: u16 = 54;

/// Bytes in one memory page.
pub const PAGE_SIZE: usize = 0x4000;

/// 48K of RAM from $4000.
pub const RAM_48K: usize = 3 * PAGE_SIZE;

/// Eight 128K banks, bank 0 first.
pub const RAM_128K: usize = 8 * PAGE_SIZE;

/// Page length marking an uncompressed 16K block.
const RAW_PAGE: u16 = 0xFFFF;

/// Terminator after a compressed version 1 image.
const V1_END_MARKER: [u8; 4] = [0x00, 0xED, 0xED, 0x00];

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum Z80Error {
    #[error("Z80 header truncated: need {needed} bytes, got {actual}")]
    TruncatedHeader { needed: usize, actual: usize },
    #[error("page {0} runs past the end of the file")]
    TruncatedPage(u8),
    #[error("compressed data ended before the block was filled")]
    TruncatedRun,
    #[error("version {0} cannot hold a 128K machine")]
    UnsupportedVersion(u8),
    #[error("RAM image must be {expected} bytes for this model, got {actual}")]
    WrongRamSize { expected: usize, actual: usize },
}

/// File format revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Version {
    V1,
    V2,
    #[default]
    V3,
}

impl Version {
    #[must_use]
    pub fn number(self) -> u8 {
        match self {
            Self::V1 => 1,
            Self::V2 => 2,
            Self::V3 => 3,
        }
    }
}

/// Machine a snapshot was taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotModel {
    Spectrum48K,
    Spectrum128K,
}

impl SnapshotModel {
    /// Size of the RAM image for this model.
    #[must_use]
    pub fn ram_size(self) -> usize {
        match self {
            Self::Spectrum48K => RAM_48K,
            Self::Spectrum128K => RAM_128K,
        }
    }
}

/// AY-3-8910 register state from the extended header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AyState {
    pub selected: u8,
    pub registers: [u8; 16],
}

/// Decoded .Z80 snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Z80Snapshot {
    pub version: Version,
    /// Raw hardware type byte (0 for version 1).
    pub hardware: u8,
    pub model: SnapshotModel,
    pub registers: Registers,
    pub border: u8,
    /// Last value written to $7FFD. Only meaningful on 128K.
    pub port_7ffd: u8,
    pub ay: Option<AyState>,
    /// Version 3 T-state counter as stored: `(low word, high byte)`.
    /// Decode it with [`decode_tstates`].
    pub tstate_counter: Option<(u16, u8)>,
    /// 48K: RAM from $4000. 128K: banks 0-7 back to back.
    pub ram: Vec<u8>,
}

/// Save settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeOptions {
    pub version: Version,
    pub compress: bool,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            version: Version::V3,
            compress: true,
        }
    }
}

/// Human-readable hardware type, as the format documents it.
#[must_use]
pub fn hardware_name(version: Version, hardware: u8) -> &'static str {
    match (version, hardware) {
        (Version::V1, _) | (_, 0) => "48k",
        (_, 1) => "48k + Interface 1",
        (Version::V2, 3) | (Version::V3, 4) => "128k",
        (Version::V2, 4) | (Version::V3, 5) => "128k + Interface 1",
        (Version::V3, 3) => "48k + M.G.T",
        (Version::V3, 6) => "128k + M.G.T",
        (Version::V3, 12) => "+2",
        _ => "unknown",
    }
}

fn model_for(version: Version, hardware: u8) -> SnapshotModel {
    match (version, hardware) {
        (Version::V1, _) | (Version::V2, 0 | 1) | (Version::V3, 0 | 1 | 3) => {
            SnapshotModel::Spectrum48K
        }
        (Version::V2, 3 | 4) | (Version::V3, 4 | 5 | 6 | 12) => SnapshotModel::Spectrum128K,
        _ => {
            tracing::warn!(
                "unrecognised hardware type {hardware} in Z80 v{}, assuming 48K",
                version.number()
            );
            SnapshotModel::Spectrum48K
        }
    }
}

fn hardware_for(version: Version, model: SnapshotModel) -> u8 {
    match (version, model) {
        (_, SnapshotModel::Spectrum48K) => 0,
        (Version::V3, SnapshotModel::Spectrum128K) => 4,
        (_, SnapshotModel::Spectrum128K) => 3,
    }
}

/// RAM image offset of a page id, or `None` for pages this model lacks.
fn page_offset(model: SnapshotModel, page: u8) -> Option<usize> {
    match model {
        SnapshotModel::Spectrum48K => match page {
            8 => Some(0),
            4 => Some(PAGE_SIZE),
            5 => Some(2 * PAGE_SIZE),
            _ => None,
        },
        SnapshotModel::Spectrum128K => {
            (3..=10).contains(&page).then(|| usize::from(page - 3) * PAGE_SIZE)
        }
    }
}

/// Page ids written for each model, in file order.
fn page_ids(model: SnapshotModel) -> &'static [u8] {
    match model {
        SnapshotModel::Spectrum48K => &[4, 5, 8],
        SnapshotModel::Spectrum128K => &[3, 4, 5, 6, 7, 8, 9, 10],
    }
}

fn word(data: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([data[offset], data[offset + 1]])
}

fn put_word(out: &mut [u8], offset: usize, value: u16) {
    out[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}

fn need(data: &[u8], needed: usize) -> Result<(), Z80Error> {
    if data.len() < needed {
        return Err(Z80Error::TruncatedHeader {
            needed,
            actual: data.len(),
        });
    }
    Ok(())
}

struct Header {
    version: Version,
    extension: usize,
    pc: u16,
    hardware: u8,
    model: SnapshotModel,
}

fn read_header(data: &[u8]) -> Result<Header, Z80Error> {
    need(data, BASE_HEADER_SIZE)?;
    let pc = word(data, 6);
    if pc != 0 {
        return Ok(Header {
            version: Version::V1,
            extension: 0,
            pc,
            hardware: 0,
            model: SnapshotModel::Spectrum48K,
        });
    }

    // PC of zero means an extended header follows. Anything other than
    // the v3 lengths is read as v2.
    need(data, BASE_HEADER_SIZE + 2)?;
    let extension = word(data, 30);
    let version = match extension {
        54 | 55 => Version::V3,
        _ => Version::V2,
    };
    let ext_end = BASE_HEADER_SIZE + 2 + usize::from(extension);
    need(data, ext_end.max(BASE_HEADER_SIZE + 2 + usize::from(V2_EXTENSION)))?;
    let hardware = data[34];
    Ok(Header {
        version,
        extension: usize::from(extension),
        pc: word(data, 32),
        hardware,
        model: model_for(version, hardware),
    })
}

/// Report which machine an image needs without decoding memory.
pub fn detect_model(data: &[u8]) -> Result<SnapshotModel, Z80Error> {
    read_header(data).map(|h| h.model)
}

/// Decode a .Z80 image.
pub fn parse(data: &[u8]) -> Result<Z80Snapshot, Z80Error> {
    let header = read_header(data)?;

    let mut flags = data[12];
    if flags == 0xFF {
        flags = 0x01;
    }

    let mut regs = Registers {
        a: data[0],
        f: data[1],
        pc: header.pc,
        sp: word(data, 8),
        i: data[10],
        r: (data[11] & 0x7F) | ((flags & 0x01) << 7),
        a_alt: data[21],
        f_alt: data[22],
        iy: word(data, 23),
        ix: word(data, 25),
        iff1: data[27] & 0x01 != 0,
        iff2: data[28] & 0x01 != 0,
        im: data[29] & 0x03,
        ..Registers::default()
    };
    regs.set_bc(word(data, 2));
    regs.set_hl(word(data, 4));
    regs.set_de(word(data, 13));
    regs.set_bc_alt(word(data, 15));
    regs.set_de_alt(word(data, 17));
    regs.set_hl_alt(word(data, 19));

    let border = (flags >> 1) & 0x07;
    let mut ram = vec![0u8; header.model.ram_size()];

    if header.version == Version::V1 {
        let body = &data[BASE_HEADER_SIZE..];
        if flags & 0x20 != 0 {
            decompress(body, &mut ram)?;
        } else {
            let image = body.get(..RAM_48K).ok_or(Z80Error::TruncatedRun)?;
            ram.copy_from_slice(image);
        }
        return Ok(Z80Snapshot {
            version: Version::V1,
            hardware: 0,
            model: SnapshotModel::Spectrum48K,
            registers: regs,
            border,
            port_7ffd: 0,
            ay: None,
            tstate_counter: None,
            ram,
        });
    }

    let ext_end = BASE_HEADER_SIZE + 2 + header.extension;
    let ay_present = header.model == SnapshotModel::Spectrum128K || data[37] & 0x04 != 0;
    let ay = ay_present.then(|| {
        let mut registers = [0u8; 16];
        registers.copy_from_slice(&data[39..55]);
        AyState {
            selected: data[38],
            registers,
        }
    });
    let tstate_counter =
        (header.version == Version::V3 && ext_end >= 58).then(|| (word(data, 55), data[57]));

    read_pages(&data[ext_end..], header.model, &mut ram)?;

    Ok(Z80Snapshot {
        version: header.version,
        hardware: header.hardware,
        model: header.model,
        registers: regs,
        border,
        port_7ffd: if header.model == SnapshotModel::Spectrum128K {
            data[35]
        } else {
            0
        },
        ay,
        tstate_counter,
        ram,
    })
}

fn read_pages(mut data: &[u8], model: SnapshotModel, ram: &mut [u8]) -> Result<(), Z80Error> {
    while data.len() >= 3 {
        let length = word(data, 0);
        let page = data[2];
        data = &data[3..];

        let (raw, size) = if length == RAW_PAGE {
            (true, PAGE_SIZE)
        } else {
            (false, usize::from(length))
        };
        let body = data.get(..size).ok_or(Z80Error::TruncatedPage(page))?;
        data = &data[size..];

        let Some(offset) = page_offset(model, page) else {
            tracing::debug!("skipping Z80 page {page} not present on this model");
            continue;
        };
        if size == 0 {
            continue;
        }
        let dest = &mut ram[offset..offset + PAGE_SIZE];
        if raw {
            dest.copy_from_slice(body);
        } else {
            decompress(body, dest)?;
        }
    }
    Ok(())
}

/// Encode a snapshot.
///
/// Version 1 only holds a 48K machine. Pages that would not shrink are
/// stored raw.
pub fn encode(snapshot: &Z80Snapshot, options: EncodeOptions) -> Result<Vec<u8>, Z80Error> {
    let expected = snapshot.model.ram_size();
    if snapshot.ram.len() != expected {
        return Err(Z80Error::WrongRamSize {
            expected,
            actual: snapshot.ram.len(),
        });
    }
    if options.version == Version::V1 && snapshot.model == SnapshotModel::Spectrum128K {
        return Err(Z80Error::UnsupportedVersion(1));
    }

    let extension = match options.version {
        Version::V1 => 0,
        Version::V2 => V2_EXTENSION,
        Version::V3 => V3_EXTENSION,
    };
    let header_size = if extension == 0 {
        BASE_HEADER_SIZE
    } else {
        BASE_HEADER_SIZE + 2 + usize::from(extension)
    };
    let mut out = vec![0u8; header_size];
    let regs = &snapshot.registers;

    out[0] = regs.a;
    out[1] = regs.f;
    out[2..4].copy_from_slice(&[regs.c, regs.b]);
    out[4..6].copy_from_slice(&[regs.l, regs.h]);
    if options.version == Version::V1 {
        put_word(&mut out, 6, regs.pc);
    }
    put_word(&mut out, 8, regs.sp);
    out[10] = regs.i;
    out[11] = regs.r & 0x7F;
    out[12] = (regs.r >> 7) | ((snapshot.border & 0x07) << 1);
    if options.version == Version::V1 && options.compress {
        out[12] |= 0x20;
    }
    out[13..15].copy_from_slice(&[regs.e, regs.d]);
    out[15..17].copy_from_slice(&[regs.c_alt, regs.b_alt]);
    out[17..19].copy_from_slice(&[regs.e_alt, regs.d_alt]);
    out[19..21].copy_from_slice(&[regs.l_alt, regs.h_alt]);
    out[21] = regs.a_alt;
    out[22] = regs.f_alt;
    put_word(&mut out, 23, regs.iy);
    put_word(&mut out, 25, regs.ix);
    out[27] = u8::from(regs.iff1);
    out[28] = u8::from(regs.iff2);
    out[29] = regs.im & 0x03;

    if options.version == Version::V1 {
        if options.compress {
            out.extend_from_slice(&compress(&snapshot.ram));
            out.extend_from_slice(&V1_END_MARKER);
        } else {
            out.extend_from_slice(&snapshot.ram);
        }
        return Ok(out);
    }

    put_word(&mut out, 30, extension);
    put_word(&mut out, 32, regs.pc);
    out[34] = hardware_for(options.version, snapshot.model);
    if snapshot.model == SnapshotModel::Spectrum128K {
        out[35] = snapshot.port_7ffd;
    }
    if let Some(ay) = &snapshot.ay {
        out[37] = 0x04;
        out[38] = ay.selected;
        out[39..55].copy_from_slice(&ay.registers);
    }
    if options.version == Version::V3 {
        if let Some((low, high)) = snapshot.tstate_counter {
            put_word(&mut out, 55, low);
            out[57] = high;
        }
    }

    for &page in page_ids(snapshot.model) {
        let Some(offset) = page_offset(snapshot.model, page) else {
            continue;
        };
        let data = &snapshot.ram[offset..offset + PAGE_SIZE];
        let packed = options.compress.then(|| compress(data));
        match packed {
            Some(packed) if packed.len() < PAGE_SIZE => {
                put_len(&mut out, packed.len() as u16, page);
                out.extend_from_slice(&packed);
            }
            _ => {
                put_len(&mut out, RAW_PAGE, page);
                out.extend_from_slice(data);
            }
        }
    }
    Ok(out)
}

fn put_len(out: &mut Vec<u8>, length: u16, page: u8) {
    out.extend_from_slice(&length.to_le_bytes());
    out.push(page);
}

/// Pack a frame position into the v3 T-state counter.
///
/// The counter counts down within quarter frames; the high byte holds the
/// quarter, offset by three.
#[must_use]
pub fn encode_tstates(tstates: u32, frame_length: u32) -> (u16, u8) {
    let quarter = (frame_length / 4).max(1);
    let tstates = tstates % frame_length.max(1);
    let low = quarter - (tstates % quarter) - 1;
    let high = ((tstates / quarter) + 3) % 4;
    (low as u16, high as u8)
}

/// Inverse of [`encode_tstates`].
#[must_use]
pub fn decode_tstates(low: u16, high: u8, frame_length: u32) -> u32 {
    let quarter = (frame_length / 4).max(1);
    let q = (u32::from(high) + 1) % 4;
    let within = quarter.saturating_sub(1).saturating_sub(u32::from(low).min(quarter - 1));
    q * quarter + within
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(model: SnapshotModel) -> Z80Snapshot {
        let mut registers = Registers {
            pc: 0x8000,
            sp: 0xFF40,
            r: 0x85,
            i: 0x3F,
            iff1: true,
            iff2: true,
            im: 1,
            ix: 0x1122,
            iy: 0x5C3A,
            ..Registers::default()
        };
        registers.set_bc(0x0102);
        registers.set_hl_alt(0xCAFE);
        Z80Snapshot {
            version: Version::V3,
            hardware: 0,
            model,
            registers,
            border: 3,
            port_7ffd: 0,
            ay: None,
            tstate_counter: None,
            ram: vec![0; model.ram_size()],
        }
    }

    #[test]
    fn v1_header_layout() {
        let snap = snapshot(SnapshotModel::Spectrum48K);
        let opts = EncodeOptions {
            version: Version::V1,
            compress: false,
        };
        let data = encode(&snap, opts).expect("encodes");
        assert_eq!(data.len(), BASE_HEADER_SIZE + RAM_48K);
        assert_eq!(&data[2..4], &[0x02, 0x01]);
        assert_eq!(word(&data, 6), 0x8000);
        assert_eq!(data[11], 0x05);
        assert_eq!(data[12], 0x01 | (3 << 1));
        assert_eq!(data[27], 1);
    }

    #[test]
    fn compressed_v1_ends_with_marker() {
        let snap = snapshot(SnapshotModel::Spectrum48K);
        let opts = EncodeOptions {
            version: Version::V1,
            compress: true,
        };
        let data = encode(&snap, opts).expect("encodes");
        assert_eq!(data[12] & 0x20, 0x20);
        assert_eq!(&data[data.len() - 4..], &V1_END_MARKER);
        assert_eq!(parse(&data).expect("parses"), Z80Snapshot {
            version: Version::V1,
            ..snap
        });
    }

    #[test]
    fn flags_byte_ff_reads_as_one() {
        let snap = snapshot(SnapshotModel::Spectrum48K);
        let opts = EncodeOptions {
            version: Version::V1,
            compress: false,
        };
        let mut data = encode(&snap, opts).expect("encodes");
        data[12] = 0xFF;
        let back = parse(&data).expect("parses");
        assert_eq!(back.border, 0);
        assert_eq!(back.registers.r & 0x80, 0x80);
        assert_eq!(back.ram, snap.ram);
    }

    #[test]
    fn v3_header_layout() {
        let mut snap = snapshot(SnapshotModel::Spectrum128K);
        snap.port_7ffd = 0x17;
        snap.ay = Some(AyState {
            selected: 7,
            registers: [0xAA; 16],
        });
        snap.tstate_counter = Some(encode_tstates(1000, 70_908));
        let data = encode(&snap, EncodeOptions::default()).expect("encodes");
        assert_eq!(word(&data, 6), 0);
        assert_eq!(word(&data, 30), V3_EXTENSION);
        assert_eq!(word(&data, 32), 0x8000);
        assert_eq!(data[34], 4);
        assert_eq!(data[35], 0x17);
        assert_eq!(data[38], 7);
        // First page block is bank 0.
        assert_eq!(data[86 + 2], 3);
    }

    #[test]
    fn hardware_types_map_to_models() {
        assert_eq!(model_for(Version::V2, 3), SnapshotModel::Spectrum128K);
        assert_eq!(model_for(Version::V3, 3), SnapshotModel::Spectrum48K);
        assert_eq!(model_for(Version::V3, 12), SnapshotModel::Spectrum128K);
        assert_eq!(model_for(Version::V2, 9), SnapshotModel::Spectrum48K);
        assert_eq!(hardware_name(Version::V3, 6), "128k + M.G.T");
        assert_eq!(hardware_name(Version::V2, 4), "128k + Interface 1");
        assert_eq!(hardware_name(Version::V3, 99), "unknown");
    }

    #[test]
    fn detect_model_reads_only_the_header() {
        let snap = snapshot(SnapshotModel::Spectrum128K);
        let data = encode(&snap, EncodeOptions::default()).expect("encodes");
        assert_eq!(detect_model(&data[..90]), Ok(SnapshotModel::Spectrum128K));
        assert_eq!(
            detect_model(&[0; 10]),
            Err(Z80Error::TruncatedHeader {
                needed: 30,
                actual: 10
            })
        );
    }

    #[test]
    fn v1_refuses_128k() {
        let snap = snapshot(SnapshotModel::Spectrum128K);
        let opts = EncodeOptions {
            version: Version::V1,
            compress: true,
        };
        assert_eq!(encode(&snap, opts), Err(Z80Error::UnsupportedVersion(1)));
    }

    #[test]
    fn truncated_page_is_an_error() {
        let snap = snapshot(SnapshotModel::Spectrum48K);
        let data = encode(&snap, EncodeOptions::default()).expect("encodes");
        let cut = &data[..data.len() - 2];
        assert!(matches!(parse(cut), Err(Z80Error::TruncatedPage(8))));
    }

    #[test]
    fn unknown_pages_are_skipped() {
        let snap = snapshot(SnapshotModel::Spectrum48K);
        let mut data = encode(&snap, EncodeOptions::default()).expect("encodes");
        data.extend_from_slice(&[2, 0, 11, 0xAA, 0xBB]);
        assert_eq!(parse(&data).expect("parses").ram, snap.ram);
    }

    #[test]
    fn tstate_counter_matches_known_values() {
        // Frame start: a full quarter to go in the last quarter slot.
        assert_eq!(encode_tstates(0, 69_888), (17_471, 3));
        assert_eq!(encode_tstates(17_472, 69_888), (17_471, 0));
        assert_eq!(decode_tstates(17_471, 3, 69_888), 0);
        assert_eq!(decode_tstates(0, 2, 69_888), 69_887);
    }
}
