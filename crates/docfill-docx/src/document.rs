//! The in-memory word-processing document.

use std::path::Path;

use docfill_std::error::prelude::*;
use indexmap::IndexMap;

use crate::package::{Package, part_dir, resolve_part_name};
use crate::rels::{Relationships, rel_type, rels_part_name};
use crate::story::{Story, StoryKind, ns, w};
use crate::xml::{Element, XmlTree};

const DEFAULT_MAIN_PART: &str = "word/document.xml";

/// A loaded XML part together with its relationships.
#[derive(Debug, Clone)]
pub struct Part {
    name: String,
    xml: XmlTree,
    rels: Relationships,
    dirty: bool,
}

impl Part {
    fn load(package: &Package, name: &str) -> Result<Self> {
        let bytes = package
            .get(name)
            .ok_or_else(|| error_once!("missing document part", part: name))?;
        let mut xml = XmlTree::parse(bytes).with_context("parse document part", || {
            Some(vec![("part", name.to_owned())].into_boxed_slice())
        })?;
        if xml.canonicalize_prefixes(ns::PREFIXES) {
            log::debug!("renamed namespace prefixes of {name} to the conventional ones");
        }
        let rels = match package.get(&rels_part_name(name)) {
            Some(bytes) => Relationships::parse(bytes)?,
            None => Relationships::default(),
        };

        Ok(Self {
            name: name.to_owned(),
            xml,
            rels,
            dirty: false,
        })
    }

    /// The part name inside the package.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The parsed XML of the part.
    pub fn xml(&self) -> &XmlTree {
        &self.xml
    }

    /// The relationships whose source is this part.
    pub fn rels(&self) -> &Relationships {
        &self.rels
    }

    /// The relationships whose source is this part, mutably.
    pub fn rels_mut(&mut self) -> &mut Relationships {
        &mut self.rels
    }

    /// The block container of the part: `w:body` for the main document, the
    /// root element for headers and footers.
    pub fn container(&self) -> Option<&Element> {
        let root = self.xml.root();
        if root.is(w::DOCUMENT) {
            root.child(w::BODY)
        } else {
            Some(root)
        }
    }

    /// The block container of the part, mutably.
    pub fn container_mut(&mut self) -> Option<&mut Element> {
        let root = self.xml.root_mut();
        if root.is(w::DOCUMENT) {
            root.child_mut(w::BODY)
        } else {
            Some(root)
        }
    }

    /// Flags the XML as modified so that it is written back.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }
}

/// The header and footer parts a section displays.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Section {
    /// The default header part, if any.
    pub header: Option<String>,
    /// The default footer part, if any.
    pub footer: Option<String>,
}

/// A `.docx` document loaded for filling.
#[derive(Debug, Clone)]
pub struct Document {
    pub(crate) package: Package,
    main: String,
    parts: IndexMap<String, Part>,
    sections: Vec<Section>,
}

impl Document {
    /// Opens a document from a file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).with_context("read template", || {
            Some(vec![("path", path.display().to_string())].into_boxed_slice())
        })?;
        Self::from_bytes(&bytes)
    }

    /// Loads a document from `.docx` bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let package = Package::from_bytes(bytes)?;

        let main = match package.get(&rels_part_name("")) {
            Some(bytes) => Relationships::parse(bytes)?
                .by_type(rel_type::OFFICE_DOCUMENT)
                .map(|rel| resolve_part_name("", rel.target)),
            None => None,
        }
        .unwrap_or_else(|| DEFAULT_MAIN_PART.to_owned());

        let main_part = Part::load(&package, &main)?;
        if main_part.container().is_none() {
            bail!("document part {main} has no body");
        }

        let mut doc = Self {
            package,
            main: main.clone(),
            parts: IndexMap::new(),
            sections: Vec::new(),
        };
        doc.parts.insert(main, main_part);
        doc.load_sections()?;

        log::debug!(
            "loaded document with {} sections and {} parts",
            doc.sections.len(),
            doc.parts.len()
        );
        Ok(doc)
    }

    /// Resolves the default header and footer of every section, loading the
    /// referenced parts.
    fn load_sections(&mut self) -> Result<()> {
        let main = &self.parts[&self.main];
        let Some(body) = main.container() else {
            return Ok(());
        };

        let mut sections = Vec::new();
        let mut last = Section::default();
        for sect_pr in section_properties(body) {
            let header = default_reference(sect_pr, w::HEADER_REFERENCE)
                .and_then(|id| main.rels.get(id))
                .map(|rel| resolve_part_name(part_dir(&self.main), rel.target));
            let footer = default_reference(sect_pr, w::FOOTER_REFERENCE)
                .and_then(|id| main.rels.get(id))
                .map(|rel| resolve_part_name(part_dir(&self.main), rel.target));

            let section = Section {
                header: header.or_else(|| last.header.clone()),
                footer: footer.or_else(|| last.footer.clone()),
            };
            last = section.clone();
            sections.push(section);
        }

        for name in sections
            .iter()
            .flat_map(|section| [&section.header, &section.footer])
            .flatten()
        {
            if !self.parts.contains_key(name) {
                let part = Part::load(&self.package, name)?;
                self.parts.insert(name.clone(), part);
            }
        }

        self.sections = sections;
        Ok(())
    }

    /// The name of the main document part.
    pub fn main_part(&self) -> &str {
        &self.main
    }

    /// The sections in document order.
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Gets a loaded part.
    pub fn part(&self, name: &str) -> Option<&Part> {
        self.parts.get(name)
    }

    /// Gets a loaded part mutably.
    pub fn part_mut(&mut self, name: &str) -> Option<&mut Part> {
        self.parts.get_mut(name)
    }

    /// Iterates over the loaded parts.
    pub fn parts(&self) -> impl Iterator<Item = &Part> {
        self.parts.values()
    }

    /// The stories in visiting order: the body, then the header and footer
    /// of each section.
    ///
    /// A part shared by several sections is listed once, at its first
    /// occurrence.
    pub fn stories(&self) -> Vec<Story> {
        let mut stories = vec![Story {
            kind: StoryKind::Body,
            part: self.main.clone(),
        }];

        for section in &self.sections {
            let refs = [
                (StoryKind::Header, &section.header),
                (StoryKind::Footer, &section.footer),
            ];
            for (kind, part) in refs {
                let Some(part) = part else {
                    continue;
                };
                if stories.iter().all(|story| story.part != *part) {
                    stories.push(Story {
                        kind,
                        part: part.clone(),
                    });
                }
            }
        }

        stories
    }

    /// Serializes the document into `.docx` bytes.
    ///
    /// Parts that were not modified keep their original bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut package = self.package.clone();
        for part in self.parts.values() {
            if part.dirty {
                package.put(&part.name, part.xml.to_bytes()?);
            }
            if part.rels.is_dirty() {
                package.put(&rels_part_name(&part.name), part.rels.to_bytes()?);
            }
        }
        package.to_bytes()
    }

    /// Writes the document to a file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let bytes = self.to_bytes()?;
        std::fs::write(path, bytes).with_context("write document", || {
            Some(vec![("path", path.display().to_string())].into_boxed_slice())
        })
    }
}

/// Collects the section properties of a body in document order.
fn section_properties(body: &Element) -> Vec<&Element> {
    let mut found = Vec::new();
    for child in body.elements() {
        if child.is(w::P) {
            if let Some(sect_pr) = child.child(w::P_PR).and_then(|ppr| ppr.child(w::SECT_PR)) {
                found.push(sect_pr);
            }
        } else if child.is(w::SECT_PR) {
            found.push(child);
        }
    }
    found
}

/// Finds the relationship id of the default header or footer reference.
fn default_reference<'a>(sect_pr: &'a Element, reference: &str) -> Option<&'a str> {
    sect_pr
        .elements()
        .filter(|el| el.is(reference))
        .find(|el| matches!(el.attr("w:type"), None | Some("default")))
        .and_then(|el| el.attr("r:id"))
}
