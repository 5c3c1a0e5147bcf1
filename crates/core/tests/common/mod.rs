// Shared fixtures: in-memory layer archives and object files carrying Go build info.
#![allow(dead_code)]

use std::io::Write;

use flate2::write::GzEncoder;
use flate2::Compression;
use object::write::Object;
use object::{Architecture, BinaryFormat, Endianness, SectionKind};
use tar::{EntryType, Header};

pub const MAGIC: &[u8] = b"\xff Go buildinf:";

/// Builds a tar layer entry by entry.
pub struct LayerBuilder {
    builder: tar::Builder<Vec<u8>>,
}

impl LayerBuilder {
    pub fn new() -> Self {
        Self { builder: tar::Builder::new(Vec::new()) }
    }

    pub fn dir(mut self, path: &str) -> Self {
        let mut header = Header::new_gnu();
        header.set_entry_type(EntryType::Directory);
        header.set_mode(0o755);
        header.set_size(0);
        self.builder.append_data(&mut header, path, std::io::empty()).expect("append dir");
        self
    }

    pub fn file(mut self, path: &str, mode: u32, data: &[u8]) -> Self {
        let mut header = Header::new_gnu();
        header.set_entry_type(EntryType::Regular);
        header.set_mode(mode);
        header.set_size(data.len() as u64);
        self.builder.append_data(&mut header, path, data).expect("append file");
        self
    }

    pub fn symlink(mut self, path: &str, target: &str) -> Self {
        let mut header = Header::new_gnu();
        header.set_entry_type(EntryType::Symlink);
        header.set_mode(0o777);
        header.set_size(0);
        self.builder.append_link(&mut header, path, target).expect("append symlink");
        self
    }

    pub fn hardlink(mut self, path: &str, target: &str) -> Self {
        let mut header = Header::new_gnu();
        header.set_entry_type(EntryType::Link);
        header.set_mode(0o644);
        header.set_size(0);
        self.builder.append_link(&mut header, path, target).expect("append hardlink");
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.builder.into_inner().expect("finish tar")
    }

    pub fn build_gz(self) -> Vec<u8> {
        let tar_bytes = self.build();
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&tar_bytes).expect("gzip tar");
        encoder.finish().expect("finish gzip")
    }
}

fn put_uvarint(out: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        out.push((value as u8) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}

/// Module info text as the toolchain embeds it, sentinels included.
pub fn framed_modinfo(text: &str) -> Vec<u8> {
    let mut out = b"0w\xaf\x0c\x92t\x08\x02A\xe1\xc1\x07\xe6\xd6\x18\xe6".to_vec();
    out.extend_from_slice(text.as_bytes());
    out.extend_from_slice(b"\xf92C1\x86\x18 r\x00\x82B\x10A\x16\xd8\xf2");
    out
}

pub fn modinfo_text(main: (&str, &str), deps: &[(&str, &str)]) -> String {
    let mut text = format!("path\t{}\nmod\t{}\t{}\t\n", main.0, main.0, main.1);
    for (path, version) in deps {
        text.push_str(&format!("dep\t{path}\t{version}\th1:fixture=\n"));
    }
    text.push_str("build\t-compiler=gc\nbuild\tCGO_ENABLED=0\n");
    text
}

/// Contents of a Go 1.18+ `.go.buildinfo` section with inline strings.
pub fn buildinfo_blob(go_version: &str, modinfo: &[u8]) -> Vec<u8> {
    let mut data = MAGIC.to_vec();
    data.push(8);
    data.push(0x2);
    data.resize(32, 0);
    put_uvarint(&mut data, go_version.len() as u64);
    data.extend_from_slice(go_version.as_bytes());
    put_uvarint(&mut data, modinfo.len() as u64);
    data.extend_from_slice(modinfo);
    let padded = (data.len() + 15) & !15;
    data.resize(padded, 0);
    data
}

fn object_with_section(format: BinaryFormat, segment: &[u8], name: &[u8], data: &[u8]) -> Vec<u8> {
    let mut obj = Object::new(format, Architecture::X86_64, Endianness::Little);
    let text_id = obj.add_section(Vec::new(), b".text".to_vec(), SectionKind::Text);
    obj.section_mut(text_id).append_data(&[0xC3], 1);
    if !data.is_empty() {
        let id = obj.add_section(segment.to_vec(), name.to_vec(), SectionKind::Data);
        obj.section_mut(id).append_data(data, 16);
    }
    obj.write().expect("write object")
}

/// ELF image with a `.go.buildinfo` section declaring `main`, `go_version`, and `deps`.
pub fn go_elf(main: (&str, &str), go_version: &str, deps: &[(&str, &str)]) -> Vec<u8> {
    let modinfo = framed_modinfo(&modinfo_text(main, deps));
    go_elf_raw(&buildinfo_blob(go_version, &modinfo))
}

pub fn go_elf_raw(section: &[u8]) -> Vec<u8> {
    object_with_section(BinaryFormat::Elf, b"", b".go.buildinfo", section)
}

/// Mach-O image with a `__DATA,__go_buildinfo` section.
pub fn go_macho(main: (&str, &str), go_version: &str, deps: &[(&str, &str)]) -> Vec<u8> {
    let modinfo = framed_modinfo(&modinfo_text(main, deps));
    object_with_section(
        BinaryFormat::MachO,
        b"__DATA",
        b"__go_buildinfo",
        &buildinfo_blob(go_version, &modinfo),
    )
}

/// Universal binary wrapping `thin` as its only architecture.
pub fn fat_macho(thin: &[u8]) -> Vec<u8> {
    const ARCH_OFFSET: usize = 0x1000;
    let mut out = Vec::new();
    for word in [0xcafe_babe, 1, 0x0100_0007, 3, ARCH_OFFSET as u32, thin.len() as u32, 12] {
        out.extend_from_slice(&u32::to_be_bytes(word));
    }
    out.resize(ARCH_OFFSET, 0);
    out.extend_from_slice(thin);
    out
}

/// Bare ELF64 executable with program headers only: one `PT_LOAD` per
/// `(p_flags, contents)` pair and no section table.
pub fn elf_exec(segments: &[(u32, &[u8])]) -> Vec<u8> {
    const EHDR_SIZE: usize = 64;
    const PHDR_SIZE: usize = 56;
    const BASE_ADDR: u64 = 0x40_0000;

    let mut out = b"\x7fELF\x02\x01\x01".to_vec();
    out.resize(16, 0);
    out.extend_from_slice(&2u16.to_le_bytes()); // ET_EXEC
    out.extend_from_slice(&0x3eu16.to_le_bytes()); // EM_X86_64
    out.extend_from_slice(&1u32.to_le_bytes());
    out.extend_from_slice(&BASE_ADDR.to_le_bytes());
    out.extend_from_slice(&(EHDR_SIZE as u64).to_le_bytes());
    out.extend_from_slice(&0u64.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    for half in [EHDR_SIZE, PHDR_SIZE, segments.len(), 64, 0, 0] {
        out.extend_from_slice(&(half as u16).to_le_bytes());
    }

    let mut offset = (EHDR_SIZE + PHDR_SIZE * segments.len() + 15) & !15;
    let mut payload = Vec::new();
    for (flags, data) in segments {
        let size = data.len() as u64;
        let addr = BASE_ADDR + offset as u64;
        out.extend_from_slice(&1u32.to_le_bytes()); // PT_LOAD
        out.extend_from_slice(&flags.to_le_bytes());
        for word in [offset as u64, addr, addr, size, size, 0x1000] {
            out.extend_from_slice(&word.to_le_bytes());
        }
        payload.push((offset, *data));
        offset = (offset + data.len() + 15) & !15;
    }
    for (at, data) in payload {
        out.resize(at, 0);
        out.extend_from_slice(data);
    }
    out
}

/// Minimal PE32+ image with a single initialized read/write `.data` section
/// mapped at `image_base + 0x1000`.
pub fn pe_image(image_base: u64, data: &[u8]) -> Vec<u8> {
    const PE_OFFSET: usize = 0x80;
    const OPTIONAL_HEADER_SIZE: usize = 240;
    const FILE_ALIGN: usize = 0x200;
    const SECTION_VA: u32 = 0x1000;

    fn put(out: &mut [u8], at: usize, field: &[u8]) {
        out[at..at + field.len()].copy_from_slice(field);
    }

    let raw_size = (data.len().max(1) + FILE_ALIGN - 1) & !(FILE_ALIGN - 1);
    let mut out = vec![0u8; PE_OFFSET];
    put(&mut out, 0, b"MZ");
    put(&mut out, 0x3c, &(PE_OFFSET as u32).to_le_bytes());

    out.extend_from_slice(b"PE\0\0");
    out.extend_from_slice(&0x8664u16.to_le_bytes()); // AMD64
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&[0; 12]);
    out.extend_from_slice(&(OPTIONAL_HEADER_SIZE as u16).to_le_bytes());
    out.extend_from_slice(&0x22u16.to_le_bytes());

    let opt = out.len();
    out.resize(opt + OPTIONAL_HEADER_SIZE, 0);
    put(&mut out, opt, &0x20bu16.to_le_bytes());
    put(&mut out, opt + 24, &image_base.to_le_bytes());
    put(&mut out, opt + 32, &0x1000u32.to_le_bytes());
    put(&mut out, opt + 36, &(FILE_ALIGN as u32).to_le_bytes());
    put(&mut out, opt + 56, &(SECTION_VA + raw_size as u32).to_le_bytes());
    put(&mut out, opt + 60, &(FILE_ALIGN as u32).to_le_bytes());
    put(&mut out, opt + 68, &3u16.to_le_bytes()); // console subsystem
    put(&mut out, opt + 108, &16u32.to_le_bytes());

    out.extend_from_slice(b".data\0\0\0");
    for word in [data.len() as u32, SECTION_VA, raw_size as u32, FILE_ALIGN as u32, 0, 0, 0] {
        out.extend_from_slice(&word.to_le_bytes());
    }
    out.extend_from_slice(&0xc000_0040u32.to_le_bytes());

    out.resize(FILE_ALIGN, 0);
    out.extend_from_slice(data);
    out.resize(FILE_ALIGN + raw_size, 0);
    out
}

/// A valid ELF image with no Go build info at all.
pub fn plain_elf() -> Vec<u8> {
    object_with_section(BinaryFormat::Elf, b"", b"", &[])
}

pub fn shell_script() -> Vec<u8> {
    b"#!/bin/sh\nexec /usr/local/bin/app \"$@\"\n".to_vec()
}
