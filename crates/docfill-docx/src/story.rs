//! Walking the block structure of a story.
//!
//! A story is a block container: `w:body`, `w:hdr` or `w:ftr`. Its
//! paragraphs are visited first, then its tables row by row and cell by cell.
//! A cell is itself a block container, so nested tables are walked the same
//! way.

use std::ops::ControlFlow;

use crate::xml::Element;

/// WordprocessingML element names.
/// Namespace URIs of the parts the engine edits.
pub mod ns {
    /// WordprocessingML.
    pub const W: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
    /// Relationship references (`r:id`, `r:embed`).
    pub const R: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
    /// DrawingML placement in a word-processing document.
    pub const WP: &str = "http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing";
    /// DrawingML.
    pub const A: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
    /// DrawingML pictures.
    pub const PIC: &str = "http://schemas.openxmlformats.org/drawingml/2006/picture";

    /// The conventional prefix of each namespace. Element names are matched
    /// with these prefixes.
    pub const PREFIXES: &[(&str, &str)] =
        &[("w", W), ("r", R), ("wp", WP), ("a", A), ("pic", PIC)];
}

pub mod w {
    /// The document root.
    pub const DOCUMENT: &str = "w:document";
    /// The main story.
    pub const BODY: &str = "w:body";
    /// A header story root.
    pub const HDR: &str = "w:hdr";
    /// A footer story root.
    pub const FTR: &str = "w:ftr";
    /// A paragraph.
    pub const P: &str = "w:p";
    /// Paragraph properties.
    pub const P_PR: &str = "w:pPr";
    /// A run.
    pub const R: &str = "w:r";
    /// Run properties.
    pub const R_PR: &str = "w:rPr";
    /// Run text.
    pub const T: &str = "w:t";
    /// A tab character.
    pub const TAB: &str = "w:tab";
    /// A break.
    pub const BR: &str = "w:br";
    /// A carriage return.
    pub const CR: &str = "w:cr";
    /// A non-breaking hyphen.
    pub const NO_BREAK_HYPHEN: &str = "w:noBreakHyphen";
    /// A hyperlink wrapping runs.
    pub const HYPERLINK: &str = "w:hyperlink";
    /// A table.
    pub const TBL: &str = "w:tbl";
    /// A table row.
    pub const TR: &str = "w:tr";
    /// A table cell.
    pub const TC: &str = "w:tc";
    /// Section properties.
    pub const SECT_PR: &str = "w:sectPr";
    /// A header reference inside section properties.
    pub const HEADER_REFERENCE: &str = "w:headerReference";
    /// A footer reference inside section properties.
    pub const FOOTER_REFERENCE: &str = "w:footerReference";
    /// A drawing.
    pub const DRAWING: &str = "w:drawing";
}

/// Which kind of story a part provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoryKind {
    /// The document body.
    Body,
    /// A section header.
    Header,
    /// A section footer.
    Footer,
}

/// A story to visit: its kind and the part that holds it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Story {
    /// The kind of story.
    pub kind: StoryKind,
    /// The part name, e.g. `word/footer1.xml`.
    pub part: String,
}

/// Visits every paragraph of a block container, depth first.
pub fn walk_paragraphs<'a, B>(
    container: &'a Element,
    f: &mut impl FnMut(&'a Element) -> ControlFlow<B>,
) -> ControlFlow<B> {
    for paragraph in container.elements().filter(|el| el.is(w::P)) {
        f(paragraph)?;
    }
    for table in container.elements().filter(|el| el.is(w::TBL)) {
        for cell in cells(table) {
            walk_paragraphs(cell, f)?;
        }
    }
    ControlFlow::Continue(())
}

/// Visits every paragraph of a block container mutably, depth first.
pub fn walk_paragraphs_mut<B>(
    container: &mut Element,
    f: &mut impl FnMut(&mut Element) -> ControlFlow<B>,
) -> ControlFlow<B> {
    for paragraph in container.elements_mut().filter(|el| el.is(w::P)) {
        f(paragraph)?;
    }
    for table in container.elements_mut().filter(|el| el.is(w::TBL)) {
        for row in table.elements_mut().filter(|el| el.is(w::TR)) {
            for cell in row.elements_mut().filter(|el| el.is(w::TC)) {
                walk_paragraphs_mut(cell, f)?;
            }
        }
    }
    ControlFlow::Continue(())
}

fn cells(table: &Element) -> impl Iterator<Item = &Element> {
    table
        .elements()
        .filter(|el| el.is(w::TR))
        .flat_map(|row| row.elements().filter(|el| el.is(w::TC)))
}

/// Finds the first paragraph of a block container matching a predicate, in
/// walking order.
pub fn find_paragraph_mut<'a>(
    container: &'a mut Element,
    pred: &impl Fn(&Element) -> bool,
) -> Option<&'a mut Element> {
    // Locate first so the mutable borrow is taken exactly once.
    let path = find_path(container, pred)?;
    let mut current = container;
    for idx in path {
        current = current.children[idx].as_element_mut()?;
    }
    Some(current)
}

/// Returns child indices leading from `container` to the first matching
/// paragraph.
fn find_path(container: &Element, pred: &impl Fn(&Element) -> bool) -> Option<Vec<usize>> {
    let children = || container.children.iter().enumerate();

    for (idx, node) in children() {
        if let Some(p) = node.as_element().filter(|el| el.is(w::P))
            && pred(p)
        {
            return Some(vec![idx]);
        }
    }

    for (tbl_idx, node) in children() {
        let Some(table) = node.as_element().filter(|el| el.is(w::TBL)) else {
            continue;
        };
        for (row_idx, row) in table.children.iter().enumerate() {
            let Some(row) = row.as_element().filter(|el| el.is(w::TR)) else {
                continue;
            };
            for (cell_idx, cell) in row.children.iter().enumerate() {
                let Some(cell) = cell.as_element().filter(|el| el.is(w::TC)) else {
                    continue;
                };
                if let Some(rest) = find_path(cell, pred) {
                    let mut path = vec![tbl_idx, row_idx, cell_idx];
                    path.extend(rest);
                    return Some(path);
                }
            }
        }
    }

    None
}
