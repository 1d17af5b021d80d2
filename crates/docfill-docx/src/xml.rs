//! A small owned XML tree.
//!
//! Parts are parsed into [`XmlTree`] with `quick-xml`, edited in place and
//! written back. Everything the engine does not understand (declarations,
//! comments, processing instructions, CDATA) is kept as the original event so
//! that a round trip does not lose content.

use std::borrow::Cow;

use docfill_std::error::prelude::*;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

/// A node of an XML tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// An element with its attributes and children.
    Element(Element),
    /// Character data, stored unescaped.
    Text(String),
    /// Any other event, kept verbatim.
    Other(Event<'static>),
}

impl Node {
    /// Returns the element if this node is one.
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(el) => Some(el),
            _ => None,
        }
    }

    /// Returns the element mutably if this node is one.
    pub fn as_element_mut(&mut self) -> Option<&mut Element> {
        match self {
            Node::Element(el) => Some(el),
            _ => None,
        }
    }
}

impl From<Element> for Node {
    fn from(el: Element) -> Self {
        Node::Element(el)
    }
}

/// An XML element.
///
/// Names are kept qualified (`w:p`, `r:id`) and matched literally. Parts that
/// bind a namespace to an unusual prefix are brought to the conventional one
/// with [`XmlTree::canonicalize_prefixes`] before any lookup.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Element {
    /// The qualified name.
    pub name: String,
    /// The attributes in document order, values unescaped.
    pub attrs: Vec<(String, String)>,
    /// The child nodes.
    pub children: Vec<Node>,
}

impl Element {
    /// Creates an element without attributes or children.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Adds an attribute, builder style.
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(key, value);
        self
    }

    /// Adds a child node, builder style.
    pub fn with_child(mut self, child: impl Into<Node>) -> Self {
        self.children.push(child.into());
        self
    }

    /// Adds a text child, builder style.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(Node::Text(text.into()));
        self
    }

    /// Checks the qualified name.
    pub fn is(&self, name: &str) -> bool {
        self.name == name
    }

    /// Gets an attribute value.
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Sets an attribute value, replacing an existing one.
    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.attrs.iter_mut().find(|(k, _)| *k == key) {
            Some((_, v)) => *v = value,
            None => self.attrs.push((key, value)),
        }
    }

    /// Iterates over child elements.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(Node::as_element)
    }

    /// Iterates over child elements mutably.
    pub fn elements_mut(&mut self) -> impl Iterator<Item = &mut Element> {
        self.children.iter_mut().filter_map(Node::as_element_mut)
    }

    /// Finds the first child element with the given name.
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.elements().find(|el| el.is(name))
    }

    /// Finds the first child element with the given name mutably.
    pub fn child_mut(&mut self, name: &str) -> Option<&mut Element> {
        self.elements_mut().find(|el| el.is(name))
    }

    /// Visits this element and all its descendants in document order.
    pub fn for_each_element<'a>(&'a self, f: &mut impl FnMut(&'a Element)) {
        f(self);
        for el in self.elements() {
            el.for_each_element(f);
        }
    }

    /// Concatenates all descendant text.
    pub fn text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        for child in &self.children {
            match child {
                Node::Text(text) => out.push_str(text),
                Node::Element(el) => el.collect_text(out),
                Node::Other(..) => {}
            }
        }
    }

    fn canonicalize_prefixes(
        &mut self,
        known: &[(&str, &str)],
        scope: &mut Vec<(String, String)>,
    ) -> bool {
        let depth = scope.len();
        let mut changed = false;

        let mut attrs = Vec::with_capacity(self.attrs.len());
        for (key, value) in std::mem::take(&mut self.attrs) {
            let declared = match key.as_str() {
                "xmlns" => Some(""),
                key => key.strip_prefix("xmlns:"),
            };
            let Some(prefix) = declared else {
                attrs.push((key, value));
                continue;
            };

            let canonical = known
                .iter()
                .find(|(_, uri)| *uri == value)
                .map_or(prefix, |&(canonical, _)| canonical);
            scope.push((prefix.to_owned(), canonical.to_owned()));
            if canonical == prefix {
                attrs.push((key, value));
                continue;
            }

            changed = true;
            let key = format!("xmlns:{canonical}");
            attrs.push((key, value));
        }

        // Two prefixes for one namespace collapse into one declaration.
        let mut declared = Vec::new();
        attrs.retain(|(key, _)| {
            if !key.starts_with("xmlns") {
                return true;
            }
            if declared.contains(key) {
                return false;
            }
            declared.push(key.clone());
            true
        });

        let rename = |name: &mut String, unprefixed: bool| -> bool {
            let (prefix, local) = match name.split_once(':') {
                Some((prefix, local)) => (prefix, local),
                None if unprefixed => ("", name.as_str()),
                None => return false,
            };
            let Some((_, canonical)) = scope.iter().rev().find(|(p, _)| p == prefix) else {
                return false;
            };
            if canonical == prefix {
                return false;
            }
            *name = format!("{canonical}:{local}");
            true
        };

        changed |= rename(&mut self.name, true);
        for (key, _) in &mut attrs {
            if !key.starts_with("xmlns") {
                changed |= rename(key, false);
            }
        }
        self.attrs = attrs;

        for el in self.elements_mut() {
            changed |= el.canonicalize_prefixes(known, scope);
        }
        scope.truncate(depth);
        changed
    }

    fn from_start(start: &BytesStart) -> Result<Self> {
        let name = std::str::from_utf8(start.name().as_ref())
            .context("xml element name")?
            .to_owned();
        let mut attrs = Vec::new();
        for attr in start.attributes() {
            let attr = attr.context_ut("xml attribute")?;
            let key = std::str::from_utf8(attr.key.as_ref())
                .context("xml attribute name")?
                .to_owned();
            let value = attr.unescape_value().context_ut("xml attribute value")?;
            attrs.push((key, value.into_owned()));
        }

        Ok(Self {
            name,
            attrs,
            children: Vec::new(),
        })
    }

    fn write<W: std::io::Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        let mut start = BytesStart::new(self.name.as_str());
        for (key, value) in &self.attrs {
            start.push_attribute((key.as_str(), value.as_str()));
        }

        if self.children.is_empty() {
            return writer
                .write_event(Event::Empty(start))
                .context_ut("write xml");
        }

        writer
            .write_event(Event::Start(start))
            .context_ut("write xml")?;
        for child in &self.children {
            write_node(child, writer)?;
        }
        writer
            .write_event(Event::End(BytesEnd::new(self.name.as_str())))
            .context_ut("write xml")
    }
}

fn write_node<W: std::io::Write>(node: &Node, writer: &mut Writer<W>) -> Result<()> {
    match node {
        Node::Element(el) => el.write(writer),
        Node::Text(text) => writer
            .write_event(Event::Text(BytesText::new(text)))
            .context_ut("write xml"),
        Node::Other(event) => writer.write_event(event.clone()).context_ut("write xml"),
    }
}

/// A parsed XML document: the prolog, one root element, and anything after
/// it.
#[derive(Debug, Clone, PartialEq)]
pub struct XmlTree {
    nodes: Vec<Node>,
    root: usize,
}

impl XmlTree {
    /// Creates a document holding only a declaration and the root element.
    pub fn new(root: Element) -> Self {
        let decl = quick_xml::events::BytesDecl::new("1.0", Some("UTF-8"), Some("yes"));
        Self {
            nodes: vec![Node::Other(Event::Decl(decl)), Node::Element(root)],
            root: 1,
        }
    }

    /// Parses a document from bytes.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader::from_reader(bytes);
        let mut buf = Vec::new();
        let mut stack: Vec<Element> = Vec::new();
        let mut nodes: Vec<Node> = Vec::new();

        loop {
            let event = reader
                .read_event_into(&mut buf)
                .with_context_ut("parse xml", || {
                    let position = reader.buffer_position().to_string();
                    Some(vec![("position", position)].into_boxed_slice())
                })?;

            let node = match event {
                Event::Start(start) => {
                    stack.push(Element::from_start(&start)?);
                    None
                }
                Event::End(..) => Some(Node::Element(
                    stack.pop().context("unbalanced xml end tag")?,
                )),
                Event::Empty(start) => Some(Node::Element(Element::from_start(&start)?)),
                Event::Text(text) => {
                    let text = text.unescape().context_ut("xml text")?;
                    Some(Node::Text(text.into_owned()))
                }
                Event::Eof => break,
                other => Some(Node::Other(other.into_owned())),
            };

            if let Some(node) = node {
                match stack.last_mut() {
                    Some(parent) => parent.children.push(node),
                    None => nodes.push(node),
                }
            }
            buf.clear();
        }

        if let Some(open) = stack.last() {
            bail!("unclosed xml element <{}>", open.name);
        }

        let root = nodes
            .iter()
            .position(|node| matches!(node, Node::Element(..)))
            .context("xml document without root element")?;

        Ok(Self { nodes, root })
    }

    /// Returns the root element.
    pub fn root(&self) -> &Element {
        match &self.nodes[self.root] {
            Node::Element(el) => el,
            _ => unreachable!("root index always points at an element"),
        }
    }

    /// Returns the root element mutably.
    pub fn root_mut(&mut self) -> &mut Element {
        match &mut self.nodes[self.root] {
            Node::Element(el) => el,
            _ => unreachable!("root index always points at an element"),
        }
    }

    /// Renames prefixes bound to a `known` namespace to its conventional
    /// prefix, together with their declarations.
    ///
    /// `known` pairs a conventional prefix with its namespace URI. A default
    /// namespace that is known gets the prefix too. Returns whether anything
    /// was renamed.
    pub fn canonicalize_prefixes(&mut self, known: &[(&str, &str)]) -> bool {
        self.root_mut().canonicalize_prefixes(known, &mut Vec::new())
    }

    /// Serializes the document.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut writer = Writer::new(Vec::new());
        for node in &self.nodes {
            write_node(node, &mut writer)?;
        }
        Ok(writer.into_inner())
    }

    /// Serializes the document into a string, for diagnostics and tests.
    pub fn to_string_lossy(&self) -> Result<String> {
        let bytes = self.to_bytes()?;
        Ok(match String::from_utf8_lossy(&bytes) {
            Cow::Borrowed(s) => s.to_owned(),
            Cow::Owned(s) => s,
        })
    }
}
