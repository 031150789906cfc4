//! Minimal owned XML tree.
//!
//! Both ILS dialects answer with small XML documents. They are parsed once
//! into [`XmlElement`] so drivers can navigate by element name instead of
//! walking a pull-parser. Namespace prefixes are dropped from element and
//! attribute names.

use crate::error::{IlsError, IlsResult};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::BTreeMap;

/// An element with its attributes, concatenated text and child elements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlElement {
    pub name: String,
    pub attributes: BTreeMap<String, String>,
    pub text: String,
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    /// Create an element without attributes or content.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Parse a document and return its root element.
    pub fn parse(xml: &str) -> IlsResult<Self> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root: Option<XmlElement> = None;

        loop {
            match reader.read_event() {
                Ok(Event::Start(ref e)) => {
                    stack.push(Self::from_start(e)?);
                }
                Ok(Event::Empty(ref e)) => {
                    let element = Self::from_start(e)?;
                    Self::attach(&mut stack, &mut root, element)?;
                }
                Ok(Event::Text(e)) => {
                    let text = e
                        .unescape()
                        .map_err(|err| IlsError::MalformedResponse(err.to_string()))?;
                    if let Some(current) = stack.last_mut() {
                        current.text.push_str(&text);
                    }
                }
                Ok(Event::CData(e)) => {
                    if let Some(current) = stack.last_mut() {
                        current
                            .text
                            .push_str(&String::from_utf8_lossy(&e.into_inner()));
                    }
                }
                Ok(Event::End(_)) => {
                    let element = stack.pop().ok_or_else(|| {
                        IlsError::MalformedResponse("unexpected closing tag".to_string())
                    })?;
                    Self::attach(&mut stack, &mut root, element)?;
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => {
                    return Err(IlsError::MalformedResponse(format!(
                        "XML error at position {}: {e}",
                        reader.buffer_position()
                    )))
                }
            }
        }

        if let Some(open) = stack.last() {
            return Err(IlsError::MalformedResponse(format!(
                "unclosed element <{}>",
                open.name
            )));
        }
        root.ok_or_else(|| IlsError::MalformedResponse("document has no root element".to_string()))
    }

    fn from_start(e: &BytesStart<'_>) -> IlsResult<Self> {
        let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
        let mut element = XmlElement::new(name);
        for attr in e.attributes() {
            let attr = attr.map_err(|err| IlsError::MalformedResponse(err.to_string()))?;
            let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map_err(|err| IlsError::MalformedResponse(err.to_string()))?;
            element.attributes.insert(key, value.into_owned());
        }
        Ok(element)
    }

    fn attach(
        stack: &mut [XmlElement],
        root: &mut Option<XmlElement>,
        element: XmlElement,
    ) -> IlsResult<()> {
        match stack.last_mut() {
            Some(parent) => {
                parent.children.push(element);
                Ok(())
            }
            None if root.is_none() => {
                *root = Some(element);
                Ok(())
            }
            None => Err(IlsError::MalformedResponse(
                "multiple root elements".to_string(),
            )),
        }
    }

    /// First direct child with the given name.
    #[must_use]
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.name == name)
    }

    /// All direct children with the given name, in document order.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Trimmed text of the element, `None` when blank.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        let text = self.text.trim();
        (!text.is_empty()).then_some(text)
    }

    /// Trimmed text of the first child with the given name.
    #[must_use]
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name).and_then(XmlElement::text)
    }

    /// Descend through `/`-separated child names.
    #[must_use]
    pub fn path(&self, path: &str) -> Option<&XmlElement> {
        path.split('/')
            .filter(|s| !s.is_empty())
            .try_fold(self, |node, name| node.child(name))
    }

    /// Trimmed text at a `/`-separated path.
    #[must_use]
    pub fn path_text(&self, path: &str) -> Option<&str> {
        self.path(path).and_then(XmlElement::text)
    }

    /// Attribute value by local name.
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

/// Escape a value for inclusion in element content.
pub(crate) fn escape(value: &str) -> std::borrow::Cow<'_, str> {
    quick_xml::escape::escape(value)
}

/// `<name>value</name>` with the value escaped.
pub(crate) fn text_element(name: &str, value: &str) -> String {
    format!("<{name}>{}</{name}>", escape(value))
}
