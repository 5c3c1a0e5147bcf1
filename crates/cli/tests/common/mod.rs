#![allow(dead_code)]

use std::path::{Path, PathBuf};

use object::write::Object;
use object::{Architecture, BinaryFormat, Endianness, SectionKind};
use tar::{EntryType, Header};

fn put_uvarint(out: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        out.push((value as u8) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}

/// ELF object carrying a `.go.buildinfo` section for `main` built with `go_version`.
pub fn go_elf(main: (&str, &str), go_version: &str, deps: &[(&str, &str)]) -> Vec<u8> {
    let mut text = format!("path\t{}\nmod\t{}\t{}\t\n", main.0, main.0, main.1);
    for (path, version) in deps {
        text.push_str(&format!("dep\t{path}\t{version}\th1:fixture=\n"));
    }
    text.push_str("build\tGOOS=linux\n");

    let mut modinfo = b"0w\xaf\x0c\x92t\x08\x02A\xe1\xc1\x07\xe6\xd6\x18\xe6".to_vec();
    modinfo.extend_from_slice(text.as_bytes());
    modinfo.extend_from_slice(b"\xf92C1\x86\x18 r\x00\x82B\x10A\x16\xd8\xf2");

    let mut data = b"\xff Go buildinf:".to_vec();
    data.extend_from_slice(&[8, 0x2]);
    data.resize(32, 0);
    put_uvarint(&mut data, go_version.len() as u64);
    data.extend_from_slice(go_version.as_bytes());
    put_uvarint(&mut data, modinfo.len() as u64);
    data.extend_from_slice(&modinfo);
    data.resize((data.len() + 15) & !15, 0);

    let mut obj = Object::new(BinaryFormat::Elf, Architecture::X86_64, Endianness::Little);
    let text_id = obj.add_section(Vec::new(), b".text".to_vec(), SectionKind::Text);
    obj.section_mut(text_id).append_data(&[0xC3], 1);
    let id = obj.add_section(Vec::new(), b".go.buildinfo".to_vec(), SectionKind::Data);
    obj.section_mut(id).append_data(&data, 16);
    obj.write().expect("write object")
}

/// Write a tar layer with the given `(path, mode, contents)` files into `dir`.
pub fn write_layer(dir: &Path, files: &[(&str, u32, &[u8])]) -> PathBuf {
    let mut builder = tar::Builder::new(Vec::new());
    for (path, mode, data) in files {
        let mut header = Header::new_gnu();
        header.set_entry_type(EntryType::Regular);
        header.set_mode(*mode);
        header.set_size(data.len() as u64);
        builder.append_data(&mut header, path, *data).expect("append file");
    }
    let bytes = builder.into_inner().expect("finish tar");
    let path = dir.join("layer.tar");
    std::fs::write(&path, bytes).expect("write layer");
    path
}

/// Layer holding one Go binary at `usr/local/bin/app`.
pub fn app_layer(dir: &Path) -> PathBuf {
    let app = go_elf(("example.com/app", "v1.2.0"), "go1.21.5", &[("example.com/lib", "v0.3.0")]);
    write_layer(
        dir,
        &[("usr/local/bin/app", 0o755, app.as_slice()), ("etc/motd", 0o644, &b"hi\n"[..])],
    )
}
