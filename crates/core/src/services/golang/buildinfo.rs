//! Decoder for the build information the Go toolchain embeds in executables.
//!
//! The block starts with a 16-byte-aligned magic header in the binary's data
//! region. Go 1.18+ stores the toolchain version and module info inline as
//! length-prefixed strings; older toolchains store pointers to Go string
//! headers, which have to be resolved through the image's address map.

use std::fmt;
use std::ops::Range;

use goblin::elf::program_header::{PF_W, PF_X, PT_LOAD};
use goblin::elf::section_header::SHT_NOBITS;
use goblin::{elf, mach, pe, Object};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const BUILD_INFO_MAGIC: &[u8] = b"\xff Go buildinf:";
const BUILD_INFO_ALIGN: usize = 16;
const BUILD_INFO_HEADER_SIZE: usize = 32;
const MAX_DATA_WINDOW: usize = 64 * 1024;

const FLAGS_ENDIAN_BIG: u8 = 0x1;
const FLAGS_VERSION_INLINE: u8 = 0x2;

/// Modinfo is wrapped in 16-byte sentinels on both ends.
const MODINFO_SENTINEL_LEN: usize = 16;

const PE_SCN_CNT_INITIALIZED_DATA: u32 = 0x0000_0040;
const PE_SCN_MEM_READ: u32 = 0x4000_0000;
const PE_SCN_MEM_WRITE: u32 = 0x8000_0000;
const PE_SCN_ALIGN_MASK: u32 = 0x00f0_0000;

/// Why a file did not yield build info. None of these are scan failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildInfoError {
    #[error("unrecognized file format")]
    UnrecognizedFormat,
    #[error("not a Go executable")]
    NotGoExecutable,
    #[error("could not parse Go build info: line {line}: {reason}")]
    InvalidBuildInfo { line: usize, reason: String },
}

/// A module recorded in build info.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    pub path: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sum: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replace: Option<Box<Module>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildSetting {
    pub key: String,
    pub value: String,
}

/// Decoded build info of one executable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildInfo {
    /// Toolchain version, e.g. `go1.21.0`.
    pub go_version: String,
    /// Import path of the main package.
    pub path: String,
    pub main: Module,
    pub deps: Vec<Module>,
    pub settings: Vec<BuildSetting>,
}

impl fmt::Display for BuildInfo {
    /// The same line format the toolchain embeds, minus the framing.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn module(f: &mut fmt::Formatter<'_>, word: &str, m: &Module) -> fmt::Result {
            write!(f, "{word}\t{}\t{}", m.path, m.version)?;
            if !m.sum.is_empty() {
                write!(f, "\t{}", m.sum)?;
            }
            writeln!(f)?;
            if let Some(rep) = &m.replace {
                writeln!(f, "=>\t{}\t{}\t{}", rep.path, rep.version, rep.sum)?;
            }
            Ok(())
        }

        if !self.go_version.is_empty() {
            writeln!(f, "go\t{}", self.go_version)?;
        }
        if !self.path.is_empty() {
            writeln!(f, "path\t{}", self.path)?;
        }
        if !self.main.path.is_empty() {
            module(f, "mod", &self.main)?;
        }
        for dep in &self.deps {
            module(f, "dep", dep)?;
        }
        for setting in &self.settings {
            let key = if needs_quoting(&setting.key, true) {
                quote(&setting.key)
            } else {
                setting.key.clone()
            };
            let value = if needs_quoting(&setting.value, false) {
                quote(&setting.value)
            } else {
                setting.value.clone()
            };
            writeln!(f, "build\t{key}={value}")?;
        }
        Ok(())
    }
}

/// Decode the build info embedded in an executable image.
pub fn read(bytes: &[u8]) -> Result<BuildInfo, BuildInfoError> {
    let image = Image::parse(bytes)?;
    let (go_version, modinfo) = image.raw_build_info()?;
    let mut info = parse_modinfo(&modinfo)?;
    info.go_version = go_version;
    Ok(info)
}

/// Virtual address range backed by bytes in the file.
#[derive(Debug, Clone, Copy)]
struct Region {
    addr: u64,
    offset: u64,
    size: u64,
}

/// The pieces of an executable the decoder needs: where to search for the
/// header, and how to turn virtual addresses into file bytes.
struct Image<'a> {
    bytes: &'a [u8],
    window: Option<Range<usize>>,
    regions: Vec<Region>,
}

impl<'a> Image<'a> {
    fn parse(bytes: &'a [u8]) -> Result<Self, BuildInfoError> {
        match Object::parse(bytes) {
            Ok(Object::Elf(elf)) => Ok(Self::from_elf(bytes, &elf)),
            Ok(Object::PE(pe)) => Ok(Self::from_pe(bytes, &pe)),
            Ok(Object::Mach(mach::Mach::Binary(macho))) => Ok(Self::from_macho(bytes, &macho)),
            Ok(Object::Mach(mach::Mach::Fat(fat))) => Self::from_fat(bytes, &fat),
            _ => Err(BuildInfoError::UnrecognizedFormat),
        }
    }

    /// Universal binaries are read through their first architecture.
    fn from_fat(bytes: &'a [u8], fat: &mach::MultiArch) -> Result<Self, BuildInfoError> {
        let arch = match fat.iter_arches().next() {
            Some(Ok(arch)) => arch,
            _ => return Err(BuildInfoError::UnrecognizedFormat),
        };
        let start = arch.offset as usize;
        let slice = start
            .checked_add(arch.size as usize)
            .and_then(|end| bytes.get(start..end))
            .ok_or(BuildInfoError::UnrecognizedFormat)?;
        let macho = mach::MachO::parse(slice, 0).map_err(|_| BuildInfoError::UnrecognizedFormat)?;
        Ok(Self::from_macho(slice, &macho))
    }

    fn from_elf(bytes: &'a [u8], elf: &elf::Elf) -> Self {
        let regions = elf
            .program_headers
            .iter()
            .filter(|ph| ph.p_type == PT_LOAD)
            .map(|ph| Region { addr: ph.p_vaddr, offset: ph.p_offset, size: ph.p_filesz })
            .collect();

        let section = elf.section_headers.iter().find(|sh| {
            sh.sh_type != SHT_NOBITS && elf.shdr_strtab.get_at(sh.sh_name) == Some(".go.buildinfo")
        });
        let window = match section {
            Some(sh) => file_range(sh.sh_offset, sh.sh_size),
            None => elf
                .program_headers
                .iter()
                .find(|ph| ph.p_type == PT_LOAD && ph.p_flags & (PF_X | PF_W) == PF_W)
                .and_then(|ph| file_range(ph.p_offset, ph.p_filesz)),
        };
        Self { bytes, window, regions }
    }

    fn from_pe(bytes: &'a [u8], pe: &pe::PE) -> Self {
        let image_base = pe.image_base as u64;
        let regions = pe
            .sections
            .iter()
            .filter_map(|sec| {
                // Sections whose address does not fit in 64 bits cannot be mapped.
                let addr = image_base.checked_add(u64::from(sec.virtual_address))?;
                Some(Region {
                    addr,
                    offset: u64::from(sec.pointer_to_raw_data),
                    size: u64::from(sec.size_of_raw_data),
                })
            })
            .collect();

        let wanted = PE_SCN_CNT_INITIALIZED_DATA | PE_SCN_MEM_READ | PE_SCN_MEM_WRITE;
        let window = pe
            .sections
            .iter()
            .find(|sec| {
                sec.virtual_address != 0
                    && sec.size_of_raw_data != 0
                    && sec.characteristics & !PE_SCN_ALIGN_MASK == wanted
            })
            .and_then(|sec| {
                file_range(u64::from(sec.pointer_to_raw_data), u64::from(sec.size_of_raw_data))
            });
        Self { bytes, window, regions }
    }

    fn from_macho(bytes: &'a [u8], macho: &mach::MachO) -> Self {
        let regions = macho
            .segments
            .iter()
            .map(|seg| Region { addr: seg.vmaddr, offset: seg.fileoff, size: seg.filesize })
            .collect();

        let sections: Vec<mach::segment::Section> = macho
            .segments
            .sections()
            .flatten()
            .filter_map(Result::ok)
            .map(|(sec, _)| sec)
            .collect();
        let window = sections
            .iter()
            .find(|sec| sec.name().ok() == Some("__go_buildinfo"))
            .or_else(|| {
                sections.iter().find(|sec| {
                    sec.segname().ok() == Some("__DATA") && sec.name().ok() == Some("__data")
                })
            })
            .and_then(|sec| file_range(u64::from(sec.offset), sec.size));
        Self { bytes, window, regions }
    }

    /// The first bytes of the data window, capped at [`MAX_DATA_WINDOW`].
    fn data_window(&self) -> &'a [u8] {
        let Some(range) = self.window.clone() else {
            return &[];
        };
        let end = range.end.min(self.bytes.len()).min(range.start.saturating_add(MAX_DATA_WINDOW));
        self.bytes.get(range.start..end).unwrap_or(&[])
    }

    /// Exactly `len` bytes mapped at virtual address `addr`, if the image has them.
    fn read_at(&self, addr: u64, len: u64) -> Option<&'a [u8]> {
        let region = self
            .regions
            .iter()
            .find(|r| addr >= r.addr && addr - r.addr < r.size)?;
        let skip = addr - region.addr;
        if len > region.size - skip {
            return None;
        }
        let start = usize::try_from(region.offset.checked_add(skip)?).ok()?;
        let end = start.checked_add(usize::try_from(len).ok()?)?;
        self.bytes.get(start..end)
    }

    /// Locate the header and return the raw toolchain version and unframed modinfo.
    fn raw_build_info(&self) -> Result<(String, String), BuildInfoError> {
        let header = find_header(self.data_window()).ok_or(BuildInfoError::NotGoExecutable)?;
        let ptr_size = usize::from(header[14]);
        let flags = header[15];

        let (version, modinfo) = if flags & FLAGS_VERSION_INLINE != 0 {
            let (version, rest) = decode_string(&header[BUILD_INFO_HEADER_SIZE..]);
            let (modinfo, _) = decode_string(rest);
            (version.to_vec(), modinfo.to_vec())
        } else {
            if ptr_size != 4 && ptr_size != 8 {
                return Err(BuildInfoError::NotGoExecutable);
            }
            let big_endian = flags & FLAGS_ENDIAN_BIG != 0;
            let version_addr = read_ptr(&header[16..], ptr_size, big_endian);
            let modinfo_addr = read_ptr(&header[16 + ptr_size..], ptr_size, big_endian);
            (
                self.read_go_string(version_addr, ptr_size, big_endian).unwrap_or_default(),
                self.read_go_string(modinfo_addr, ptr_size, big_endian).unwrap_or_default(),
            )
        };

        if version.is_empty() {
            return Err(BuildInfoError::NotGoExecutable);
        }
        let modinfo = unframe_modinfo(&modinfo);
        Ok((
            String::from_utf8_lossy(&version).into_owned(),
            String::from_utf8_lossy(modinfo).into_owned(),
        ))
    }

    /// Follow a pointer to a Go string header `(data, len)` and read the string.
    fn read_go_string(&self, addr: u64, ptr_size: usize, big_endian: bool) -> Option<Vec<u8>> {
        let header = self.read_at(addr, 2 * ptr_size as u64)?;
        let data_addr = read_ptr(header, ptr_size, big_endian);
        let data_len = read_ptr(&header[ptr_size..], ptr_size, big_endian);
        if data_len > 1 << 32 {
            return None;
        }
        self.read_at(data_addr, data_len).map(<[u8]>::to_vec)
    }
}

fn file_range(offset: u64, size: u64) -> Option<Range<usize>> {
    let start = usize::try_from(offset).ok()?;
    let end = start.checked_add(usize::try_from(size).ok()?)?;
    Some(start..end)
}

/// Find the magic at a 16-byte-aligned offset with a full header after it.
fn find_header(data: &[u8]) -> Option<&[u8]> {
    let mut base = 0;
    while base < data.len() {
        let found = data[base..]
            .windows(BUILD_INFO_MAGIC.len())
            .position(|w| w == BUILD_INFO_MAGIC)?;
        let at = base + found;
        if data.len() - at < BUILD_INFO_HEADER_SIZE {
            return None;
        }
        if at % BUILD_INFO_ALIGN == 0 {
            return Some(&data[at..]);
        }
        base = (at + BUILD_INFO_ALIGN - 1) & !(BUILD_INFO_ALIGN - 1);
    }
    None
}

fn read_ptr(bytes: &[u8], ptr_size: usize, big_endian: bool) -> u64 {
    match (ptr_size, big_endian) {
        (4, false) => u64::from(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])),
        (4, true) => u64::from(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])),
        (_, false) => u64::from_le_bytes(bytes[..8].try_into().unwrap_or([0; 8])),
        (_, true) => u64::from_be_bytes(bytes[..8].try_into().unwrap_or([0; 8])),
    }
}

/// Unsigned LEB128, as written by Go's `binary.PutUvarint`.
fn read_uvarint(buf: &[u8]) -> Option<(u64, usize)> {
    let mut value = 0u64;
    let mut shift = 0u32;
    for (i, &byte) in buf.iter().enumerate().take(10) {
        if byte < 0x80 {
            if i == 9 && byte > 1 {
                return None;
            }
            return Some((value | u64::from(byte) << shift, i + 1));
        }
        value |= u64::from(byte & 0x7f) << shift;
        shift += 7;
    }
    None
}

/// Split a uvarint-prefixed string off the front of `data`. Malformed input
/// yields an empty string and no remainder.
fn decode_string(data: &[u8]) -> (&[u8], &[u8]) {
    let Some((len, n)) = read_uvarint(data) else {
        return (&[], &[]);
    };
    let rest = &data[n..];
    match usize::try_from(len) {
        Ok(len) if len <= rest.len() => rest.split_at(len),
        _ => (&[], &[]),
    }
}

fn unframe_modinfo(modinfo: &[u8]) -> &[u8] {
    let len = modinfo.len();
    if len > 2 * MODINFO_SENTINEL_LEN && modinfo[len - MODINFO_SENTINEL_LEN - 1] == b'\n' {
        &modinfo[MODINFO_SENTINEL_LEN..len - MODINFO_SENTINEL_LEN]
    } else {
        &[]
    }
}

fn invalid(line: usize, reason: impl Into<String>) -> BuildInfoError {
    BuildInfoError::InvalidBuildInfo { line, reason: reason.into() }
}

fn module_line(line: usize, columns: &str) -> Result<Module, BuildInfoError> {
    let elem: Vec<&str> = columns.split('\t').collect();
    if elem.len() != 2 && elem.len() != 3 {
        return Err(invalid(line, format!("expected 2 or 3 columns; got {}", elem.len())));
    }
    Ok(Module {
        path: elem[0].to_string(),
        version: elem[1].to_string(),
        sum: elem.get(2).map(|s| s.to_string()).unwrap_or_default(),
        replace: None,
    })
}

/// Which module a `=>` line would replace.
#[derive(Clone, Copy)]
enum Last {
    None,
    Main,
    Dep(usize),
}

/// Parse the textual module info. Only newline-terminated lines are read, and
/// lines with an unknown prefix are ignored.
fn parse_modinfo(data: &str) -> Result<BuildInfo, BuildInfoError> {
    let mut info = BuildInfo::default();
    let mut last = Last::None;
    let mut rest = data;
    let mut line_num = 1;

    while let Some((line, tail)) = rest.split_once('\n') {
        rest = tail;
        if let Some(pkg) = line.strip_prefix("path\t") {
            info.path = pkg.to_string();
        } else if let Some(cols) = line.strip_prefix("mod\t") {
            info.main = module_line(line_num, cols)?;
            last = Last::Main;
        } else if let Some(cols) = line.strip_prefix("dep\t") {
            info.deps.push(module_line(line_num, cols)?);
            last = Last::Dep(info.deps.len() - 1);
        } else if let Some(cols) = line.strip_prefix("=>\t") {
            let elem: Vec<&str> = cols.split('\t').collect();
            if elem.len() != 3 {
                return Err(invalid(
                    line_num,
                    format!("expected 3 columns for replacement; got {}", elem.len()),
                ));
            }
            let replacement = Box::new(Module {
                path: elem[0].to_string(),
                version: elem[1].to_string(),
                sum: elem[2].to_string(),
                replace: None,
            });
            match last {
                Last::Main => info.main.replace = Some(replacement),
                Last::Dep(idx) => info.deps[idx].replace = Some(replacement),
                Last::None => {
                    return Err(invalid(line_num, "replacement with no module on previous line"))
                }
            }
            last = Last::None;
        } else if let Some(kv) = line.strip_prefix("build\t") {
            info.settings.push(build_setting(line_num, kv)?);
        }
        line_num += 1;
    }
    Ok(info)
}

fn build_setting(line: usize, kv: &str) -> Result<BuildSetting, BuildInfoError> {
    let (key, raw_value) = match kv.as_bytes().first() {
        None => return Err(invalid(line, "build line missing '='")),
        Some(b'=') => return Err(invalid(line, "build line with missing key")),
        Some(b'"') | Some(b'`') => {
            let (key, used) = unquote_prefix(kv)
                .ok_or_else(|| invalid(line, "invalid quoted key in build line"))?;
            match kv.as_bytes().get(used) {
                None => return Err(invalid(line, "build line missing '=' after quoted key")),
                Some(b'=') => (key, &kv[used + 1..]),
                Some(c) => {
                    return Err(invalid(
                        line,
                        format!("unexpected character after quoted key: {:?}", *c as char),
                    ))
                }
            }
        }
        Some(_) => {
            let (key, value) = kv
                .split_once('=')
                .ok_or_else(|| invalid(line, "build line missing '=' after key"))?;
            if needs_quoting(key, true) {
                return Err(invalid(line, format!("unquoted key {key:?} must be quoted")));
            }
            (key.to_string(), value)
        }
    };

    let value = match raw_value.as_bytes().first() {
        None => String::new(),
        Some(b'"') | Some(b'`') => match unquote_prefix(raw_value) {
            Some((value, used)) if used == raw_value.len() => value,
            _ => return Err(invalid(line, "invalid quoted value in build line")),
        },
        Some(_) => {
            if needs_quoting(raw_value, false) {
                return Err(invalid(line, format!("unquoted value {raw_value:?} must be quoted")));
            }
            raw_value.to_string()
        }
    };
    Ok(BuildSetting { key, value })
}

fn needs_quoting(s: &str, is_key: bool) -> bool {
    s.chars().any(|c| matches!(c, ' ' | '\t' | '\r' | '\n' | '"' | '`') || (is_key && c == '='))
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Decode a Go string literal at the start of `s`, returning its value and the
/// number of bytes the literal spans.
fn unquote_prefix(s: &str) -> Option<(String, usize)> {
    let bytes = s.as_bytes();
    match bytes.first()? {
        b'`' => {
            let end = s[1..].find('`')? + 1;
            Some((s[1..end].replace('\r', ""), end + 1))
        }
        b'"' => {
            let mut out: Vec<u8> = Vec::new();
            let mut i = 1;
            loop {
                match *bytes.get(i)? {
                    b'"' => return Some((String::from_utf8_lossy(&out).into_owned(), i + 1)),
                    b'\n' => return None,
                    b'\\' => {
                        i += 1;
                        let esc = *bytes.get(i)?;
                        i += 1;
                        match esc {
                            b'a' => out.push(0x07),
                            b'b' => out.push(0x08),
                            b'f' => out.push(0x0c),
                            b'n' => out.push(b'\n'),
                            b'r' => out.push(b'\r'),
                            b't' => out.push(b'\t'),
                            b'v' => out.push(0x0b),
                            b'\\' | b'"' => out.push(esc),
                            b'x' => {
                                let hex = s.get(i..i + 2)?;
                                out.push(u8::from_str_radix(hex, 16).ok()?);
                                i += 2;
                            }
                            b'0'..=b'7' => {
                                let oct = s.get(i - 1..i + 2)?;
                                out.push(u8::from_str_radix(oct, 8).ok()?);
                                i += 2;
                            }
                            b'u' | b'U' => {
                                let width = if esc == b'u' { 4 } else { 8 };
                                let hex = s.get(i..i + width)?;
                                let c = char::from_u32(u32::from_str_radix(hex, 16).ok()?)?;
                                let mut buf = [0u8; 4];
                                out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
                                i += width;
                            }
                            _ => return None,
                        }
                    }
                    b => {
                        out.push(b);
                        i += 1;
                    }
                }
            }
        }
        _ => None,
    }
}
