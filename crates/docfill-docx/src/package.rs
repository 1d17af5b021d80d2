//! OPC package (zip container) input and output.

use std::io::{Cursor, Read, Write};

use docfill_std::error::prelude::*;

use crate::xml::{Element, XmlTree};

/// The content types part.
pub const CONTENT_TYPES: &str = "[Content_Types].xml";

const CONTENT_TYPES_NS: &str = "http://schemas.openxmlformats.org/package/2006/content-types";

/// The largest uncompressed entry accepted from an archive.
pub const MAX_ENTRY_SIZE: u64 = 256 * 1024 * 1024;

#[derive(Debug, Clone)]
struct Entry {
    name: String,
    data: Vec<u8>,
    is_dir: bool,
}

/// The entries of a `.docx` zip archive, in archive order.
#[derive(Debug, Clone, Default)]
pub struct Package {
    entries: Vec<Entry>,
}

impl Package {
    /// Reads a package from zip bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::from_bytes_limited(bytes, MAX_ENTRY_SIZE)
    }

    /// Reads a package from zip bytes, rejecting entries larger than `limit`
    /// bytes once decompressed.
    pub fn from_bytes_limited(bytes: &[u8], limit: u64) -> Result<Self> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).context_ut("open docx archive")?;

        let mut entries = Vec::with_capacity(archive.len());
        for idx in 0..archive.len() {
            let mut file = archive.by_index(idx).context_ut("read docx entry")?;
            let name = file.name().to_owned();
            let is_dir = file.is_dir();
            // The declared size is untrusted, so it never sizes an allocation.
            let declared = file.size();
            if declared > limit {
                bail!("docx entry {name} declares {declared} bytes, over the {limit} byte limit");
            }

            let mut data = Vec::new();
            (&mut file)
                .take(limit + 1)
                .read_to_end(&mut data)
                .with_context("read docx entry", || {
                    Some(vec![("name", name.clone())].into_boxed_slice())
                })?;
            if data.len() as u64 > limit {
                bail!("docx entry {name} inflates past the {limit} byte limit");
            }
            entries.push(Entry { name, data, is_dir });
        }

        log::debug!("loaded docx package with {} entries", entries.len());
        Ok(Self { entries })
    }

    /// Checks whether the package has an entry.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|entry| entry.name == name)
    }

    /// Gets the bytes of an entry.
    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| entry.data.as_slice())
    }

    /// Iterates over the entry names in archive order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.name.as_str())
    }

    /// Replaces an entry, or appends it when missing.
    pub fn put(&mut self, name: &str, data: Vec<u8>) {
        match self.entries.iter_mut().find(|entry| entry.name == name) {
            Some(entry) => entry.data = data,
            None => self.entries.push(Entry {
                name: name.to_owned(),
                data,
                is_dir: false,
            }),
        }
    }

    /// Registers a default content type for an extension unless one exists.
    ///
    /// Extensions are compared case-insensitively, as OPC requires.
    pub fn ensure_default_content_type(&mut self, ext: &str, content_type: &str) -> Result<()> {
        let mut tree = match self.get(CONTENT_TYPES) {
            Some(bytes) => XmlTree::parse(bytes).context("parse content types")?,
            None => XmlTree::new(Element::new("Types").with_attr("xmlns", CONTENT_TYPES_NS)),
        };

        let exists = tree.root().elements().any(|el| {
            el.is("Default")
                && el
                    .attr("Extension")
                    .is_some_and(|e| e.eq_ignore_ascii_case(ext))
        });
        if exists {
            return Ok(());
        }

        let default = Element::new("Default")
            .with_attr("Extension", ext)
            .with_attr("ContentType", content_type);
        // Defaults conventionally precede overrides.
        let root = tree.root_mut();
        let at = root
            .children
            .iter()
            .position(|node| node.as_element().is_some_and(|el| el.is("Override")))
            .unwrap_or(root.children.len());
        root.children.insert(at, default.into());

        self.put(CONTENT_TYPES, tree.to_bytes()?);
        Ok(())
    }

    /// Writes the package as zip bytes.
    ///
    /// Media entries are stored, everything else is deflated.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let deflated = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated);
        let stored = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Stored);

        for entry in &self.entries {
            if entry.is_dir {
                zip.add_directory(entry.name.as_str(), stored)
                    .context_ut("write docx directory")?;
                continue;
            }

            let options = if is_media(&entry.name) {
                stored
            } else {
                deflated
            };
            zip.start_file(entry.name.as_str(), options)
                .context_ut("write docx entry")?;
            zip.write_all(&entry.data).context("write docx entry")?;
        }

        let cursor = zip.finish().context_ut("finish docx archive")?;
        Ok(cursor.into_inner())
    }
}

fn is_media(name: &str) -> bool {
    name.split('/').any(|segment| segment == "media")
}

/// Resolves a relationship target against the directory of its source part.
///
/// Absolute targets start at the package root.
pub fn resolve_part_name(source_dir: &str, target: &str) -> String {
    let mut segments: Vec<&str> = match target.strip_prefix('/') {
        Some(..) => Vec::new(),
        None => source_dir.split('/').filter(|s| !s.is_empty()).collect(),
    };

    for segment in target.trim_start_matches('/').split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            segment => segments.push(segment),
        }
    }

    segments.join("/")
}

/// Returns the directory of a part name, `word` for `word/document.xml`.
pub fn part_dir(part: &str) -> &str {
    part.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

/// Builds the target to reference `part` from a part living in `source_dir`.
pub fn relative_target(source_dir: &str, part: &str) -> String {
    if source_dir.is_empty() {
        return part.to_owned();
    }
    match part
        .strip_prefix(source_dir)
        .and_then(|rest| rest.strip_prefix('/'))
    {
        Some(rest) => rest.to_owned(),
        None => format!("/{part}"),
    }
}
