//! Fixture archives for unit and router tests.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use flate2::write::GzEncoder;
use flate2::Compression;
use tar::{Builder, EntryType, Header};

pub const TAR_REL: &str = "stg-modula-12345/23/12/31/123/01_10-10.tar.gz";

pub type ArchiveBuilder = Builder<GzEncoder<File>>;

/// Write a gzip tar archive at `path`, creating parent directories.
pub fn write_archive(path: &Path, fill: impl FnOnce(&mut ArchiveBuilder)) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    let file = File::create(path).unwrap();
    let mut builder = Builder::new(GzEncoder::new(file, Compression::default()));
    fill(&mut builder);
    builder.into_inner().unwrap().finish().unwrap();
}

/// Gzip `raw` as-is into `path`, for hand-assembled tar streams.
pub fn write_gzip(path: &Path, raw: &[u8]) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    let mut enc = GzEncoder::new(File::create(path).unwrap(), Compression::default());
    enc.write_all(raw).unwrap();
    enc.finish().unwrap();
}

pub fn append_file<W: Write>(builder: &mut Builder<W>, name: &str, data: &[u8]) {
    let mut header = Header::new_gnu();
    header.set_entry_type(EntryType::Regular);
    header.set_size(data.len() as u64);
    header.set_mode(0o644);
    builder.append_data(&mut header, name, data).unwrap();
}

pub fn append_dir<W: Write>(builder: &mut Builder<W>, name: &str) {
    let mut header = Header::new_gnu();
    header.set_entry_type(EntryType::Directory);
    header.set_size(0);
    header.set_mode(0o755);
    builder
        .append_data(&mut header, name, std::io::empty())
        .unwrap();
}

/// `kind` is `EntryType::Symlink` or `EntryType::Link`.
pub fn append_link<W: Write>(builder: &mut Builder<W>, kind: EntryType, name: &str, target: &str) {
    let mut header = Header::new_gnu();
    header.set_entry_type(kind);
    header.set_size(0);
    header.set_mode(0o777);
    builder.append_link(&mut header, name, target).unwrap();
}
