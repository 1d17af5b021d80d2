//! Fills `.docx` templates: `{{NAME}}` placeholder substitution, logo
//! insertion at a marker, and placeholder discovery.
//!
//! ```no_run
//! use std::collections::BTreeMap;
//!
//! use docfill_docx::{Document, LogoImage, LogoOptions};
//!
//! # fn main() -> docfill_std::Result<()> {
//! let mut doc = Document::open("template.docx")?;
//! let values = BTreeMap::from([("NOME_CLIENTE".to_owned(), "ACME".to_owned())]);
//! doc.fill(&values);
//! doc.insert_logo(&LogoImage::open("logo.png")?, &LogoOptions::default())?;
//! doc.save("out.docx")?;
//! # Ok(())
//! # }
//! ```

pub mod document;
pub mod logo;
pub mod package;
pub mod paragraph;
pub mod placeholder;
pub mod rels;
pub mod story;
pub mod xml;

#[cfg(test)]
mod tests;

pub use document::{Document, Part, Section};
pub use logo::{LOGO_MARKER, LogoImage, LogoOptions};
pub use placeholder::{PLACEHOLDER_RE, Placeholders};
pub use story::{Story, StoryKind};

use docfill_std::Result;

/// Fills a template in one go: substitutes `values`, then inserts `logo` if
/// given, and returns the resulting `.docx` bytes.
pub fn render(
    template: &[u8],
    values: &impl Placeholders,
    logo: Option<&LogoImage>,
    options: &LogoOptions,
) -> Result<Vec<u8>> {
    let mut doc = Document::from_bytes(template)?;
    let changed = doc.fill(values);
    log::debug!("substituted placeholders in {changed} paragraphs");

    if let Some(logo) = logo {
        doc.insert_logo(logo, options)?;
    }

    doc.to_bytes()
}

/// Lists the placeholder names of a template, sorted and deduplicated.
pub fn scan(template: &[u8]) -> Result<Vec<String>> {
    Ok(Document::from_bytes(template)?.placeholders())
}
