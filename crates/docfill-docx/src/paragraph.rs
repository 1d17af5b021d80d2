//! Paragraph text and run rewriting.

use crate::story::w;
use crate::xml::{Element, Node};

/// Whether a paragraph child carries text runs.
fn is_run_container(el: &Element) -> bool {
    el.is(w::R) || el.is(w::HYPERLINK)
}

/// Returns the visible text of a paragraph.
///
/// Text comes from direct runs and runs inside hyperlinks. Tabs, line breaks
/// and non-breaking hyphens are mapped to their characters so that a
/// placeholder is found even when a producer split it over several runs.
pub fn paragraph_text(paragraph: &Element) -> String {
    let mut out = String::new();
    for child in paragraph.elements() {
        if child.is(w::R) {
            push_run_text(child, &mut out);
        } else if child.is(w::HYPERLINK) {
            for run in child.elements().filter(|el| el.is(w::R)) {
                push_run_text(run, &mut out);
            }
        }
    }
    out
}

fn push_run_text(run: &Element, out: &mut String) {
    for item in run.elements() {
        match item.name.as_str() {
            w::T => out.push_str(&item.text()),
            w::TAB => out.push('\t'),
            w::CR => out.push('\n'),
            w::BR if matches!(item.attr("w:type"), None | Some("textWrapping")) => out.push('\n'),
            w::NO_BREAK_HYPHEN => out.push('-'),
            _ => {}
        }
    }
}

/// Removes every run of a paragraph, keeping its properties and markers.
///
/// Returns the child index where the first run was, or the end of the
/// paragraph when it had none.
pub fn clear_runs(paragraph: &mut Element) -> usize {
    let first = paragraph
        .children
        .iter()
        .position(|node| node.as_element().is_some_and(is_run_container));
    paragraph
        .children
        .retain(|node| !node.as_element().is_some_and(is_run_container));
    first.unwrap_or(paragraph.children.len())
}

/// Replaces all runs of a paragraph with one plain run carrying `text`.
pub fn replace_runs(paragraph: &mut Element, text: &str) {
    let at = clear_runs(paragraph);
    paragraph.children.insert(at, text_run(text).into());
}

/// Builds a run without properties for `text`.
///
/// Tabs become `w:tab` and newlines `w:br`, mirroring [`paragraph_text`].
pub fn text_run(text: &str) -> Element {
    let mut run = Element::new(w::R);
    let mut segment = String::new();

    let flush = |run: &mut Element, segment: &mut String| {
        if !segment.is_empty() {
            let t = Element::new(w::T)
                .with_attr("xml:space", "preserve")
                .with_text(std::mem::take(segment));
            run.children.push(t.into());
        }
    };

    for ch in text.chars() {
        match ch {
            '\t' => {
                flush(&mut run, &mut segment);
                run.children.push(Node::Element(Element::new(w::TAB)));
            }
            '\n' => {
                flush(&mut run, &mut segment);
                run.children.push(Node::Element(Element::new(w::BR)));
            }
            '\r' => {}
            ch => segment.push(ch),
        }
    }
    flush(&mut run, &mut segment);

    run
}
