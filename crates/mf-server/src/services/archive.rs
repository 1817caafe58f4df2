//! Read-only access to gzip-compressed tar archives on the mounted bucket.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use mf_common::AppError;
use tar::EntryType;

pub const ARCHIVE_NOT_FOUND: &str = "Could not find the requested tar archive";
pub const MEMBER_NOT_FOUND: &str = "Could not find the requested file";
pub const ARCHIVE_CORRUPT: &str = "Error processing the tar archive";

/// Failure while reading a member out of an archive.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("archive not found: {}", .0.display())]
    ArchiveMissing(PathBuf),

    #[error("member not found: {0}")]
    MemberMissing(String),

    #[error("corrupt archive: {0}")]
    Corrupt(#[source] io::Error),

    #[error("{0}")]
    Io(#[source] io::Error),
}

impl From<ArchiveError> for AppError {
    fn from(err: ArchiveError) -> Self {
        match err {
            ArchiveError::ArchiveMissing(_) => AppError::NotFound(ARCHIVE_NOT_FOUND.into()),
            ArchiveError::MemberMissing(_) => AppError::NotFound(MEMBER_NOT_FOUND.into()),
            ArchiveError::Corrupt(_) => AppError::ArchiveCorrupt(ARCHIVE_CORRUPT.into()),
            ArchiveError::Io(e) => AppError::Internal(e.into()),
        }
    }
}

/// Errors raised by the gzip decoder or the tar parser.
fn classify(err: io::Error) -> ArchiveError {
    match err.kind() {
        io::ErrorKind::InvalidInput
        | io::ErrorKind::InvalidData
        | io::ErrorKind::UnexpectedEof
        | io::ErrorKind::Other => ArchiveError::Corrupt(err),
        _ => ArchiveError::Io(err),
    }
}

fn empty_stream() -> ArchiveError {
    ArchiveError::Corrupt(io::Error::new(io::ErrorKind::UnexpectedEof, "empty archive"))
}

/// Directory entries are stored as `name/`.
fn normalize_name(name: &[u8]) -> &[u8] {
    let mut name = name;
    while let [rest @ .., b'/'] = name {
        name = rest;
    }
    name
}

/// Lexical POSIX path normalisation: drops empty and `.` components and
/// folds `..` into its parent.
fn normpath(path: &[u8]) -> Vec<u8> {
    let absolute = path.first() == Some(&b'/');
    let mut parts: Vec<&[u8]> = Vec::new();
    for part in path.split(|&b| b == b'/') {
        match part {
            b"" | b"." => {}
            b".." => {
                if parts.last().is_some_and(|p| *p != &b".."[..]) {
                    parts.pop();
                } else if !absolute {
                    parts.push(part);
                }
            }
            _ => parts.push(part),
        }
    }

    let mut out = if absolute { vec![b'/'] } else { Vec::new() };
    out.extend_from_slice(&parts.join(&b'/'));
    if out.is_empty() {
        out.push(b'.');
    }
    out
}

/// Name a link entry points at. Symlink targets are relative to the
/// directory holding the link, hard link targets to the archive root.
fn link_target(entry_name: &[u8], link: &[u8], symlink: bool) -> Vec<u8> {
    if !symlink {
        return normpath(link);
    }
    let name = normalize_name(entry_name);
    let dir = match name.iter().rposition(|&b| b == b'/') {
        Some(i) => &name[..i],
        None => &[][..],
    };
    let mut joined = dir.to_vec();
    if !joined.is_empty() {
        joined.push(b'/');
    }
    joined.extend_from_slice(link);
    normpath(&joined)
}

fn is_extractable(entry_type: EntryType) -> bool {
    matches!(
        entry_type,
        EntryType::Regular | EntryType::Continuous | EntryType::GNUSparse
    )
}

/// Counts decompressed bytes so an empty gzip stream can be told apart from a
/// tar stream that holds only end-of-archive blocks.
struct CountingReader<R> {
    inner: R,
    read: u64,
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.read += n as u64;
        Ok(n)
    }
}

type TarStream = tar::Archive<CountingReader<GzDecoder<BufReader<File>>>>;

fn open(archive_path: &Path) -> Result<TarStream, ArchiveError> {
    let file = File::open(archive_path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => ArchiveError::ArchiveMissing(archive_path.to_path_buf()),
        _ => ArchiveError::Io(e),
    })?;

    let metadata = file.metadata().map_err(ArchiveError::Io)?;
    if metadata.is_dir() {
        return Err(ArchiveError::Io(io::Error::other(format!(
            "{} is a directory",
            archive_path.display()
        ))));
    }
    if metadata.len() == 0 {
        return Err(empty_stream());
    }

    Ok(tar::Archive::new(CountingReader {
        inner: GzDecoder::new(BufReader::new(file)),
        read: 0,
    }))
}

/// Which entry names a lookup accepts.
enum Target {
    /// The requested member, compared byte for byte.
    Exact(Vec<u8>),
    /// A link destination, compared after `normpath` on both sides.
    Normalized(Vec<u8>),
}

impl Target {
    fn matches(&self, name: &[u8]) -> bool {
        match self {
            Target::Exact(wanted) => normalize_name(name) == wanted.as_slice(),
            Target::Normalized(wanted) => normpath(name) == *wanted,
        }
    }
}

/// Last entry matching a lookup.
enum Lookup {
    Missing,
    File(Vec<u8>),
    Link { index: usize, target: Vec<u8> },
    Special,
}

/// One pass over the archive, considering only entries before `before`.
///
/// A header that fails to parse ends the archive once at least one entry has
/// been read. Failing on the very first header means the file is not a tar
/// archive at all.
fn scan(archive_path: &Path, target: &Target, before: usize) -> Result<Lookup, ArchiveError> {
    let mut archive = open(archive_path)?;
    let mut found = Lookup::Missing;
    let mut parsed = 0usize;

    for (index, entry) in archive.entries().map_err(classify)?.enumerate() {
        let mut entry = match entry {
            Ok(entry) => entry,
            Err(e) if parsed > 0 => {
                tracing::debug!(
                    archive = %archive_path.display(),
                    entries = parsed,
                    error = %e,
                    "Unreadable header after last entry, treating as end of archive"
                );
                break;
            }
            Err(e) => return Err(classify(e)),
        };
        parsed += 1;
        if index >= before {
            break;
        }

        let path = entry.path_bytes().into_owned();
        if !target.matches(&path) {
            continue;
        }

        let entry_type = entry.header().entry_type();
        found = if is_extractable(entry_type) {
            let size = entry.size();
            let mut data = Vec::with_capacity(usize::try_from(size).unwrap_or_default());
            entry.read_to_end(&mut data).map_err(classify)?;
            Lookup::File(data)
        } else if entry_type.is_symlink() || entry_type.is_hard_link() {
            match entry.link_name_bytes() {
                Some(link) => Lookup::Link {
                    index,
                    target: link_target(&path, &link, entry_type.is_symlink()),
                },
                None => Lookup::Special,
            }
        } else {
            Lookup::Special
        };
    }

    if parsed == 0 && archive.into_inner().read == 0 {
        return Err(empty_stream());
    }
    Ok(found)
}

/// Read the full contents of `member` from the archive at `archive_path`.
///
/// Member names are compared exactly, ignoring a trailing `/`. When the
/// archive holds the same name more than once the last entry wins. Symlinks
/// and hard links are followed to the last earlier entry with the target
/// name. Directories, special files and dangling links are reported as
/// missing.
pub fn read_member(archive_path: &Path, member: &str) -> Result<Vec<u8>, ArchiveError> {
    let mut target = Target::Exact(normalize_name(member.as_bytes()).to_vec());
    let mut before = usize::MAX;

    // `before` shrinks on every hop, so link chains always terminate.
    loop {
        match scan(archive_path, &target, before)? {
            Lookup::File(data) => {
                tracing::debug!(
                    archive = %archive_path.display(),
                    member,
                    bytes = data.len(),
                    "Extracted archive member"
                );
                return Ok(data);
            }
            Lookup::Link { index, target: link } => {
                tracing::debug!(
                    member,
                    target = %String::from_utf8_lossy(&link),
                    "Following archive link"
                );
                target = Target::Normalized(link);
                before = index;
            }
            Lookup::Special => {
                tracing::debug!(member, "Matched archive entry is not a regular file");
                return Err(ArchiveError::MemberMissing(member.to_string()));
            }
            Lookup::Missing => return Err(ArchiveError::MemberMissing(member.to_string())),
        }
    }
}
