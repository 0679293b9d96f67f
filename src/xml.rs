//! Minimal namespace-aware XML tree.
//!
//! Both container manifests and RDF/XML metadata are small documents, so
//! they are read fully into an [`XmlElement`] tree and interpreted from
//! there. Qualified names are kept as written (`rdf:Description`) next to
//! the resolved namespace URI, which lets fragments be re-rooted under a
//! new document and written back without losing their prefixes.

use std::io::Cursor;

use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use crate::error::CaroError;

/// Namespace bound to the reserved `xml` prefix.
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// An attribute with its resolved namespace (unprefixed attributes have none).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct XmlAttribute {
    pub name: String,
    pub namespace: Option<String>,
    pub value: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct XmlElement {
    /// Qualified name as written, e.g. `dcterms:creator`.
    pub name: String,
    pub namespace: Option<String>,
    pub attributes: Vec<XmlAttribute>,
    pub children: Vec<XmlNode>,
}

impl XmlElement {
    pub fn new(name: impl Into<String>, namespace: Option<&str>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.map(str::to_string),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn local_name(&self) -> &str {
        local_part(&self.name)
    }

    /// Does this element have the given namespace and local name?
    pub fn is(&self, namespace: &str, local: &str) -> bool {
        self.namespace.as_deref() == Some(namespace) && self.local_name() == local
    }

    /// Look up an attribute by namespace and local name.
    pub fn attribute(&self, namespace: Option<&str>, local: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.namespace.as_deref() == namespace && local_part(&a.name) == local)
            .map(|a| a.value.as_str())
    }

    /// Replace the value of an attribute, adding it if missing.
    pub fn set_attribute(&mut self, name: &str, namespace: Option<&str>, value: impl Into<String>) {
        let value = value.into();
        let local = local_part(name);
        match self
            .attributes
            .iter_mut()
            .find(|a| a.namespace.as_deref() == namespace && local_part(&a.name) == local)
        {
            Some(attr) => attr.value = value,
            None => self.attributes.push(XmlAttribute {
                name: name.to_string(),
                namespace: namespace.map(str::to_string),
                value,
            }),
        }
    }

    pub fn with_attribute(mut self, name: &str, namespace: Option<&str>, value: impl Into<String>) -> Self {
        self.set_attribute(name, namespace, value);
        self
    }

    /// Declare a namespace prefix on this element.
    pub fn with_namespace_decl(self, prefix: &str, uri: &str) -> Self {
        let name = if prefix.is_empty() {
            "xmlns".to_string()
        } else {
            format!("xmlns:{prefix}")
        };
        self.with_attribute(&name, None, uri)
    }

    pub fn with_child(mut self, child: XmlElement) -> Self {
        self.children.push(XmlNode::Element(child));
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(XmlNode::Text(text.into()));
        self
    }

    pub fn push_child(&mut self, child: XmlElement) {
        self.children.push(XmlNode::Element(child));
    }

    /// Child elements in document order.
    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|n| match n {
            XmlNode::Element(e) => Some(e),
            XmlNode::Text(_) => None,
        })
    }

    /// Concatenated direct text content, trimmed.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for node in &self.children {
            if let XmlNode::Text(t) = node {
                out.push_str(t);
            }
        }
        out.trim().to_string()
    }

    /// Depth-first search for the first descendant matching namespace and local name.
    pub fn find(&self, namespace: &str, local: &str) -> Option<&XmlElement> {
        for child in self.elements() {
            if child.is(namespace, local) {
                return Some(child);
            }
            if let Some(found) = child.find(namespace, local) {
                return Some(found);
            }
        }
        None
    }

    /// Copy of this element that declares every namespace prefix used in its subtree.
    pub fn standalone(&self) -> XmlElement {
        let mut used = Vec::new();
        collect_prefixes(self, &mut used);

        let mut root = self.clone();
        for (prefix, uri) in used {
            let decl = if prefix.is_empty() {
                "xmlns".to_string()
            } else {
                format!("xmlns:{prefix}")
            };
            if !root.attributes.iter().any(|a| a.name == decl) {
                root.attributes.push(XmlAttribute {
                    name: decl,
                    namespace: None,
                    value: uri,
                });
            }
        }
        root
    }
}

fn collect_prefixes(element: &XmlElement, used: &mut Vec<(String, String)>) {
    let mut note = |name: &str, namespace: &Option<String>| {
        if let Some(uri) = namespace {
            let prefix = prefix_part(name).unwrap_or_default();
            if prefix == "xml" {
                return;
            }
            if !used.iter().any(|(p, _)| p == prefix) {
                used.push((prefix.to_string(), uri.clone()));
            }
        }
    };
    note(&element.name, &element.namespace);
    for attr in &element.attributes {
        if !is_namespace_decl(&attr.name) {
            note(&attr.name, &attr.namespace);
        }
    }
    for child in element.elements() {
        collect_prefixes(child, used);
    }
}

fn local_part(name: &str) -> &str {
    name.rsplit_once(':').map(|(_, l)| l).unwrap_or(name)
}

fn prefix_part(name: &str) -> Option<&str> {
    name.split_once(':').map(|(p, _)| p)
}

fn is_namespace_decl(name: &str) -> bool {
    name == "xmlns" || name.starts_with("xmlns:")
}

// ============================================================================
// READER
// ============================================================================

/// Parse a document into its root element.
pub fn parse(input: &[u8]) -> Result<XmlElement, CaroError> {
    let mut reader = Reader::from_reader(input);
    reader.config_mut().trim_text(true);

    // one scope of (prefix, uri) declarations per open element
    let mut scopes: Vec<Vec<(String, String)>> = Vec::new();
    let mut open: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let element = start_element(e, &mut scopes)?;
                open.push(element);
            }
            Ok(Event::Empty(ref e)) => {
                let element = start_element(e, &mut scopes)?;
                scopes.pop();
                attach(element, &mut open, &mut root)?;
            }
            Ok(Event::End(_)) => {
                let element = open
                    .pop()
                    .ok_or_else(|| CaroError::xml("Unbalanced end tag"))?;
                scopes.pop();
                attach(element, &mut open, &mut root)?;
            }
            Ok(Event::Text(ref e)) => {
                if let Some(parent) = open.last_mut() {
                    let text = e
                        .unescape()
                        .map_err(|e| CaroError::xml(format!("Invalid text: {e}")))?;
                    parent.children.push(XmlNode::Text(text.into_owned()));
                }
            }
            Ok(Event::CData(e)) => {
                if let Some(parent) = open.last_mut() {
                    let text = String::from_utf8_lossy(&e.into_inner()).into_owned();
                    parent.children.push(XmlNode::Text(text));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(CaroError::xml(format!(
                    "XML parse error at position {}: {e}",
                    reader.error_position()
                )));
            }
            _ => {}
        }
        buf.clear();
    }

    if !open.is_empty() {
        return Err(CaroError::xml("Unexpected end of document"));
    }
    root.ok_or_else(|| CaroError::xml("Document has no root element"))
}

fn attach(
    element: XmlElement,
    open: &mut [XmlElement],
    root: &mut Option<XmlElement>,
) -> Result<(), CaroError> {
    match open.last_mut() {
        Some(parent) => parent.children.push(XmlNode::Element(element)),
        None if root.is_none() => *root = Some(element),
        None => return Err(CaroError::xml("Multiple root elements")),
    }
    Ok(())
}

fn start_element(
    e: &BytesStart<'_>,
    scopes: &mut Vec<Vec<(String, String)>>,
) -> Result<XmlElement, CaroError> {
    let name = std::str::from_utf8(e.name().as_ref())
        .map_err(|e| CaroError::xml(format!("Invalid tag name: {e}")))?
        .to_string();

    let mut raw = Vec::new();
    let mut scope = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|e| CaroError::xml(format!("Invalid attribute: {e}")))?;
        let key = std::str::from_utf8(attr.key.as_ref())
            .map_err(|e| CaroError::xml(format!("Invalid attribute name: {e}")))?
            .to_string();
        let value = attr
            .unescape_value()
            .map_err(|e| CaroError::xml(format!("Invalid attribute value: {e}")))?
            .into_owned();
        if key == "xmlns" {
            scope.push((String::new(), value.clone()));
        } else if let Some(prefix) = key.strip_prefix("xmlns:") {
            scope.push((prefix.to_string(), value.clone()));
        }
        raw.push((key, value));
    }
    scopes.push(scope);

    let namespace = resolve(scopes, prefix_part(&name).unwrap_or_default());
    let attributes = raw
        .into_iter()
        .map(|(key, value)| {
            let namespace = match prefix_part(&key) {
                Some(_) if is_namespace_decl(&key) => None,
                Some(prefix) => resolve(scopes, prefix),
                None => None,
            };
            XmlAttribute {
                name: key,
                namespace,
                value,
            }
        })
        .collect();

    Ok(XmlElement {
        name,
        namespace,
        attributes,
        children: Vec::new(),
    })
}

fn resolve(scopes: &[Vec<(String, String)>], prefix: &str) -> Option<String> {
    if prefix == "xml" {
        return Some(XML_NAMESPACE.to_string());
    }
    scopes
        .iter()
        .rev()
        .flat_map(|scope| scope.iter().rev())
        .find(|(p, _)| p == prefix)
        .map(|(_, uri)| uri.clone())
}

// ============================================================================
// WRITER
// ============================================================================

/// Pretty-print a document rooted at `root`, with XML declaration.
pub fn to_pretty_string(root: &XmlElement) -> Result<String, CaroError> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(|e| CaroError::xml(format!("Write error: {e}")))?;
    write_element(&mut writer, root)?;

    let mut output = writer.into_inner().into_inner();
    output.push(b'\n');
    String::from_utf8(output).map_err(|e| CaroError::xml(format!("Invalid UTF-8: {e}")))
}

fn write_element<W: std::io::Write>(
    writer: &mut Writer<W>,
    element: &XmlElement,
) -> Result<(), CaroError> {
    let mut start = BytesStart::new(element.name.as_str());
    for attr in &element.attributes {
        start.push_attribute((attr.name.as_str(), attr.value.as_str()));
    }

    if element.children.is_empty() {
        writer
            .write_event(Event::Empty(start))
            .map_err(|e| CaroError::xml(format!("Write error: {e}")))?;
        return Ok(());
    }

    writer
        .write_event(Event::Start(start))
        .map_err(|e| CaroError::xml(format!("Write error: {e}")))?;
    for child in &element.children {
        match child {
            XmlNode::Element(e) => write_element(writer, e)?,
            XmlNode::Text(t) => writer
                .write_event(Event::Text(BytesText::new(t)))
                .map_err(|e| CaroError::xml(format!("Write error: {e}")))?,
        }
    }
    writer
        .write_event(Event::End(BytesEnd::new(element.name.as_str())))
        .map_err(|e| CaroError::xml(format!("Write error: {e}")))?;
    Ok(())
}
