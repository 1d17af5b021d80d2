//! Relationship parts (`_rels/*.rels`).

use docfill_std::error::prelude::*;

use crate::xml::{Element, XmlTree};

const RELATIONSHIPS_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";

/// Relationship types the engine follows or creates.
pub mod rel_type {
    /// The main document part.
    pub const OFFICE_DOCUMENT: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";
    /// A header part.
    pub const HEADER: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/header";
    /// A footer part.
    pub const FOOTER: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/footer";
    /// An embedded picture.
    pub const IMAGE: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";
}

/// Returns the name of the relationship part belonging to `part`.
///
/// `word/document.xml` maps to `word/_rels/document.xml.rels`; the package
/// itself (an empty name) maps to `_rels/.rels`.
pub fn rels_part_name(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{dir}/_rels/{file}.rels"),
        None => format!("_rels/{part}.rels"),
    }
}

/// A relationship entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relationship<'a> {
    /// The relationship id, e.g. `rId4`.
    pub id: &'a str,
    /// The relationship type URI.
    pub rel_type: &'a str,
    /// The target, relative to the source part's directory.
    pub target: &'a str,
    /// Whether the target lives outside the package.
    pub external: bool,
}

/// The relationships of one source part.
#[derive(Debug, Clone)]
pub struct Relationships {
    tree: XmlTree,
    dirty: bool,
}

impl Default for Relationships {
    fn default() -> Self {
        Self {
            tree: XmlTree::new(Element::new("Relationships").with_attr("xmlns", RELATIONSHIPS_NS)),
            dirty: false,
        }
    }
}

impl Relationships {
    /// Parses a relationship part.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        Ok(Self {
            tree: XmlTree::parse(bytes).context("parse relationships")?,
            dirty: false,
        })
    }

    /// Whether relationships were added since loading.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Iterates over the relationships.
    pub fn iter(&self) -> impl Iterator<Item = Relationship<'_>> {
        self.tree
            .root()
            .elements()
            .filter(|el| el.is("Relationship"))
            .filter_map(|el| {
                Some(Relationship {
                    id: el.attr("Id")?,
                    rel_type: el.attr("Type")?,
                    target: el.attr("Target")?,
                    external: el.attr("TargetMode") == Some("External"),
                })
            })
    }

    /// Finds a relationship by id.
    pub fn get(&self, id: &str) -> Option<Relationship<'_>> {
        self.iter().find(|rel| rel.id == id)
    }

    /// Finds the first relationship of a type.
    pub fn by_type(&self, rel_type: &str) -> Option<Relationship<'_>> {
        self.iter().find(|rel| rel.rel_type == rel_type)
    }

    /// Adds an internal relationship and returns its fresh id.
    pub fn add(&mut self, rel_type: &str, target: &str) -> String {
        let next = self
            .iter()
            .filter_map(|rel| rel.id.strip_prefix("rId")?.parse::<u32>().ok())
            .max()
            .unwrap_or(0)
            + 1;
        let id = format!("rId{next}");

        let rel = Element::new("Relationship")
            .with_attr("Id", id.as_str())
            .with_attr("Type", rel_type)
            .with_attr("Target", target);
        self.tree.root_mut().children.push(rel.into());
        self.dirty = true;

        id
    }

    /// Serializes the relationship part.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        self.tree.to_bytes()
    }
}
