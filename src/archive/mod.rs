//! Reading release archives.
//!
//! Two kinds of archives pass through the update core:
//!
//! - **Asset archives** (`.zip`, `.tar.gz`, `.tgz`) small enough to hold in
//!   memory, from which a single executable is pulled out
//!   ([`extract_executable`]).
//! - **Source archives** of a release, which can be large. They are spooled
//!   to an anonymous temporary file ([`SourceArchive`]) and walked one entry
//!   at a time ([`SourceArchive::for_each_entry`]); entries are forward-only
//!   and the walk cannot be restarted.
//!
//! Where entries end up on disk is decided by [`paths`], and the default
//! per-entry writer lives in [`extract`].

pub mod extract;
pub mod paths;

use std::fs::File;
use std::io::{Cursor, Read, Seek, SeekFrom, Write};

use flate2::read::GzDecoder;
use tracing::debug;
use zip::ZipArchive;

use crate::core::{UpkeepError, UpkeepResult};

pub use extract::{EntryOutcome, ExtractionReport, extract_entries, write_entry};
pub use paths::{Resolution, SkipReason};

/// One archive member, handed to a visitor while the archive is being read.
///
/// `content` is only valid during the visit; read it or drop it.
pub struct ArchiveEntry<'a> {
    /// Path as stored in the archive, unsanitized.
    pub path: String,
    /// Whether the member is a directory.
    pub is_dir: bool,
    /// Unix permission bits if the archive recorded them.
    pub mode: Option<u32>,
    /// Member content.
    pub content: &'a mut dyn Read,
}

/// Container formats the core can read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    TarGz,
}

impl ArchiveFormat {
    /// Guesses the format from a file name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.to_ascii_lowercase();
        if name.ends_with(".zip") {
            Some(Self::Zip)
        } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(Self::TarGz)
        } else {
            None
        }
    }

    /// Detects the format from the leading magic bytes.
    #[must_use]
    pub fn from_magic(header: &[u8]) -> Option<Self> {
        match header {
            [b'P', b'K', 3, 4, ..] | [b'P', b'K', 5, 6, ..] => Some(Self::Zip),
            [0x1f, 0x8b, ..] => Some(Self::TarGz),
            _ => None,
        }
    }
}

/// A release source archive spooled to disk.
///
/// ```rust
/// use upkeep_cli::archive::SourceArchive;
///
/// # fn example(zip_bytes: &[u8]) -> upkeep_cli::core::UpkeepResult<()> {
/// let archive = SourceArchive::from_bytes("templates.zip", zip_bytes)?;
/// archive.for_each_entry(|entry| {
///     println!("{} ({})", entry.path, if entry.is_dir { "dir" } else { "file" });
///     Ok(())
/// })?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct SourceArchive {
    name: String,
    format: ArchiveFormat,
    file: File,
}

impl SourceArchive {
    /// Wraps an already spooled file, detecting its format from its content.
    ///
    /// # Errors
    ///
    /// Returns [`UpkeepError::Archive`] if the file is neither a zip nor a
    /// gzipped tarball.
    pub fn from_file(name: impl Into<String>, mut file: File) -> UpkeepResult<Self> {
        let name = name.into();
        let mut header = [0u8; 4];
        file.seek(SeekFrom::Start(0))?;
        let read = read_prefix(&mut file, &mut header)?;
        file.seek(SeekFrom::Start(0))?;

        let format = ArchiveFormat::from_magic(&header[..read])
            .ok_or_else(|| UpkeepError::archive(&name, "not a zip or tar.gz archive"))?;
        debug!("Spooled source archive {} detected as {:?}", name, format);

        Ok(Self {
            name,
            format,
            file,
        })
    }

    /// Copies in-memory bytes into an anonymous temporary file.
    ///
    /// # Errors
    ///
    /// Fails if the temporary file cannot be written or the bytes are not an
    /// archive.
    pub fn from_bytes(name: impl Into<String>, bytes: &[u8]) -> UpkeepResult<Self> {
        let mut file = tempfile::tempfile()?;
        file.write_all(bytes)?;
        Self::from_file(name, file)
    }

    /// Name the archive was downloaded as.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn format(&self) -> ArchiveFormat {
        self.format
    }

    /// Visits every entry in archive order, consuming the archive.
    ///
    /// The first error returned by `visit` stops the walk and is returned
    /// unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`UpkeepError::Archive`] for corrupt archives, or whatever
    /// `visit` returned.
    pub fn for_each_entry<F>(self, visit: F) -> UpkeepResult<()>
    where
        F: FnMut(ArchiveEntry<'_>) -> UpkeepResult<()>,
    {
        visit_entries(&self.name, self.format, self.file, visit)
    }
}

/// Pulls the tool's executable out of a downloaded asset.
///
/// Archives are searched for a regular file named `tool` or `tool.exe` at any
/// depth (case-insensitive); the first one wins. Anything that is not a
/// recognized archive is taken to be the executable itself.
///
/// # Errors
///
/// Returns [`UpkeepError::ExecutableNotFound`] if an archive has no such
/// file and [`UpkeepError::Archive`] if it cannot be read.
pub fn extract_executable(asset_name: &str, bytes: Vec<u8>, tool: &str) -> UpkeepResult<Vec<u8>> {
    let Some(format) = ArchiveFormat::from_name(asset_name) else {
        debug!("Asset {} is not an archive, using it as the executable", asset_name);
        return Ok(bytes);
    };

    let wanted = [tool.to_string(), format!("{tool}.exe")];
    let mut found: Option<Vec<u8>> = None;

    visit_entries(asset_name, format, Cursor::new(bytes), |entry| {
        if found.is_some() || entry.is_dir {
            return Ok(());
        }
        let file_name = entry.path.rsplit(['/', '\\']).next().unwrap_or_default();
        if wanted.iter().any(|name| name.eq_ignore_ascii_case(file_name)) {
            debug!("Found executable {} in {}", entry.path, asset_name);
            let mut content = Vec::new();
            entry
                .content
                .read_to_end(&mut content)
                .map_err(|e| UpkeepError::archive(asset_name, e))?;
            found = Some(content);
        }
        Ok(())
    })?;

    found.ok_or_else(|| UpkeepError::ExecutableNotFound {
        executable: tool.to_string(),
        asset: asset_name.to_string(),
    })
}

fn visit_entries<R, F>(name: &str, format: ArchiveFormat, reader: R, mut visit: F) -> UpkeepResult<()>
where
    R: Read + Seek,
    F: FnMut(ArchiveEntry<'_>) -> UpkeepResult<()>,
{
    match format {
        ArchiveFormat::Zip => {
            let mut archive = ZipArchive::new(reader).map_err(|e| UpkeepError::archive(name, e))?;
            for index in 0..archive.len() {
                let mut file = archive.by_index(index).map_err(|e| UpkeepError::archive(name, e))?;
                let path = file.name().to_string();
                let is_dir = file.is_dir();
                let mode = file.unix_mode();
                visit(ArchiveEntry {
                    path,
                    is_dir,
                    mode,
                    content: &mut file,
                })?;
            }
        }
        ArchiveFormat::TarGz => {
            let mut archive = tar::Archive::new(GzDecoder::new(reader));
            let entries = archive.entries().map_err(|e| UpkeepError::archive(name, e))?;
            for entry in entries {
                let mut entry = entry.map_err(|e| UpkeepError::archive(name, e))?;
                let entry_type = entry.header().entry_type();
                // pax headers, links and devices carry no file content
                if !entry_type.is_file() && !entry_type.is_dir() {
                    continue;
                }
                let path = String::from_utf8_lossy(&entry.path_bytes()).into_owned();
                let mode = entry.header().mode().ok();
                visit(ArchiveEntry {
                    path,
                    is_dir: entry_type.is_dir(),
                    mode,
                    content: &mut entry,
                })?;
            }
        }
    }
    Ok(())
}

fn read_prefix(reader: &mut impl Read, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}
