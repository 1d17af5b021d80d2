//! `{{NAME}}` placeholder substitution and discovery.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::hash::BuildHasher;
use std::ops::ControlFlow;
use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::{Captures, Regex};

use crate::Document;
use crate::paragraph::{paragraph_text, replace_runs};
use crate::story::{walk_paragraphs, walk_paragraphs_mut};
use crate::xml::Element;

/// Matches a placeholder token, capturing its name.
pub static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{([A-Z0-9_]+)\}\}").expect("placeholder pattern is valid")
});

/// A lookup of placeholder values by name.
pub trait Placeholders {
    /// Returns the value for a placeholder name, if one is known.
    fn value(&self, name: &str) -> Option<&str>;
}

impl<S: BuildHasher> Placeholders for HashMap<String, String, S> {
    fn value(&self, name: &str) -> Option<&str> {
        self.get(name).map(String::as_str)
    }
}

impl Placeholders for BTreeMap<String, String> {
    fn value(&self, name: &str) -> Option<&str> {
        self.get(name).map(String::as_str)
    }
}

impl<S: BuildHasher> Placeholders for IndexMap<String, String, S> {
    fn value(&self, name: &str) -> Option<&str> {
        self.get(name).map(String::as_str)
    }
}

impl<P: Placeholders + ?Sized> Placeholders for &P {
    fn value(&self, name: &str) -> Option<&str> {
        (**self).value(name)
    }
}

/// Replaces every known placeholder in `text` in a single pass.
///
/// Returns `None` when nothing was replaced. Replacement values are inserted
/// literally, so a value that looks like a placeholder is not expanded.
pub fn substitute_text(text: &str, values: &impl Placeholders) -> Option<String> {
    let mut replaced = false;
    let out = PLACEHOLDER_RE.replace_all(text, |caps: &Captures| match values.value(&caps[1]) {
        Some(value) => {
            replaced = true;
            value.to_owned()
        }
        None => caps[0].to_owned(),
    });
    replaced.then(|| out.into_owned())
}

/// Substitutes placeholders in one paragraph.
///
/// A paragraph without a known placeholder is left untouched, runs included.
/// Otherwise its runs are collapsed into a single run holding the result.
pub fn substitute_paragraph(paragraph: &mut Element, values: &impl Placeholders) -> bool {
    let text = paragraph_text(paragraph);
    if text.is_empty() {
        return false;
    }
    match substitute_text(&text, values) {
        Some(filled) => {
            replace_runs(paragraph, &filled);
            true
        }
        None => false,
    }
}

/// Iterates over the placeholder names found in `text`.
pub fn placeholder_names(text: &str) -> impl Iterator<Item = &str> {
    PLACEHOLDER_RE
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|name| name.as_str())
}

impl Document {
    /// Substitutes placeholders in every story of the document.
    ///
    /// Returns the number of paragraphs that changed.
    pub fn fill(&mut self, values: &impl Placeholders) -> usize {
        let mut changed = 0;
        for story in self.stories() {
            let Some(part) = self.part_mut(&story.part) else {
                continue;
            };
            let mut part_changed = 0;
            if let Some(container) = part.container_mut() {
                let _ = walk_paragraphs_mut(container, &mut |p: &mut Element| {
                    if substitute_paragraph(p, values) {
                        part_changed += 1;
                    }
                    ControlFlow::<()>::Continue(())
                });
            }
            if part_changed > 0 {
                part.mark_dirty();
                log::debug!("filled {part_changed} paragraphs in {}", story.part);
            }
            changed += part_changed;
        }
        changed
    }

    /// Collects the distinct placeholder names of every story, sorted.
    pub fn placeholders(&self) -> Vec<String> {
        let mut found = BTreeSet::new();
        for story in self.stories() {
            let Some(container) = self.part(&story.part).and_then(|part| part.container()) else {
                continue;
            };
            let _ = walk_paragraphs(container, &mut |p: &Element| {
                let text = paragraph_text(p);
                found.extend(placeholder_names(&text).map(str::to_owned));
                ControlFlow::<()>::Continue(())
            });
        }
        found.into_iter().collect()
    }
}
