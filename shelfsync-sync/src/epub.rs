//! EPUB section counting.
//!
//! An EPUB is a zip container. `META-INF/container.xml` names the OPF
//! package document, whose `<spine>` lists the reading order as one
//! `<itemref>` per section. The section count is the number of itemrefs.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use quick_xml::events::Event;
use quick_xml::Reader;

use shelfsync_core::{ArchiveError, ArchiveInspector};

const CONTAINER_PATH: &str = "META-INF/container.xml";

/// [`ArchiveInspector`] for EPUB files.
#[derive(Debug, Clone, Copy, Default)]
pub struct EpubInspector;

impl ArchiveInspector for EpubInspector {
    fn section_count(&self, path: &Path) -> Result<u32, ArchiveError> {
        let file = File::open(path).map_err(|source| ArchiveError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut archive = zip::ZipArchive::new(file)
            .map_err(|e| malformed(path, format!("not a zip container: {e}")))?;

        let container = read_entry(&mut archive, path, CONTAINER_PATH)?;
        let package_path = rootfile_path(&container).map_err(|reason| malformed(path, reason))?;
        let package = read_entry(&mut archive, path, &package_path)?;
        spine_item_count(&package).map_err(|reason| malformed(path, reason))
    }
}

fn read_entry(
    archive: &mut zip::ZipArchive<File>,
    path: &Path,
    name: &str,
) -> Result<String, ArchiveError> {
    let mut entry = archive
        .by_name(name)
        .map_err(|e| malformed(path, format!("{name}: {e}")))?;
    let mut contents = String::new();
    entry
        .read_to_string(&mut contents)
        .map_err(|e| malformed(path, format!("{name}: {e}")))?;
    Ok(contents)
}

fn malformed(path: &Path, reason: impl Into<String>) -> ArchiveError {
    ArchiveError::Malformed {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

/// `full-path` attribute of the first `<rootfile>` element, entities decoded.
fn rootfile_path(container: &str) -> Result<String, String> {
    let mut reader = Reader::from_str(container);
    loop {
        match reader.read_event().map_err(|e| format!("container.xml: {e}"))? {
            Event::Start(tag) | Event::Empty(tag) if tag.local_name().as_ref() == b"rootfile" => {
                let attr = tag
                    .try_get_attribute("full-path")
                    .map_err(|e| format!("container.xml: {e}"))?
                    .ok_or("rootfile has no full-path")?;
                let value = attr
                    .unescape_value()
                    .map_err(|e| format!("container.xml: {e}"))?;
                return Ok(value.into_owned());
            }
            Event::Eof => return Err("container.xml names no rootfile".into()),
            _ => {}
        }
    }
}

/// Number of `<itemref>` elements inside the first `<spine>`. Comments,
/// CDATA and processing instructions are not elements and never count.
fn spine_item_count(package: &str) -> Result<u32, String> {
    let mut reader = Reader::from_str(package);
    let mut in_spine = false;
    let mut count: u32 = 0;
    loop {
        match reader
            .read_event()
            .map_err(|e| format!("package document: {e}"))?
        {
            Event::Start(tag) if !in_spine && tag.local_name().as_ref() == b"spine" => {
                in_spine = true;
            }
            Event::Empty(tag) if !in_spine && tag.local_name().as_ref() == b"spine" => {
                return Ok(0);
            }
            Event::Start(tag) | Event::Empty(tag)
                if in_spine && tag.local_name().as_ref() == b"itemref" =>
            {
                count += 1;
            }
            Event::End(tag) if in_spine && tag.local_name().as_ref() == b"spine" => {
                return Ok(count);
            }
            Event::Eof if in_spine => return Err("spine is not closed".into()),
            Event::Eof => return Err("package has no spine".into()),
            _ => {}
        }
    }
}
