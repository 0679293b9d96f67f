//! OMEX descriptions and their RDF/XML form.
//!
//! ## Structure
//!
//! ```xml
//! <rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#"
//!          xmlns:dcterms="http://purl.org/dc/terms/"
//!          xmlns:vCard="http://www.w3.org/2006/vcard/ns#">
//!   <rdf:Description rdf:about="./model.xml">
//!     <dcterms:creator rdf:parseType="Resource">
//!       <vCard:hasName rdf:parseType="Resource">
//!         <vCard:family-name>Doe</vCard:family-name>
//!         <vCard:given-name>Jane</vCard:given-name>
//!       </vCard:hasName>
//!       <vCard:hasEmail rdf:resource="mailto:jane@example.org"/>
//!     </dcterms:creator>
//!     <dcterms:created rdf:parseType="Resource">
//!       <dcterms:W3CDTF>2015-04-01T12:00:00Z</dcterms:W3CDTF>
//!     </dcterms:created>
//!     <dcterms:description>An example model</dcterms:description>
//!   </rdf:Description>
//! </rdf:RDF>
//! ```
//!
//! A description that uses anything beyond creators, dates and a free-text
//! description is kept verbatim as an XML fragment.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::error::CaroError;
use crate::person::VCard;
use crate::vocab::split_fragment;
use crate::xml::{self, XmlElement};

/// Namespace URIs used in OMEX metadata.
pub mod namespace {
    pub const RDF: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";
    pub const DCTERMS: &str = "http://purl.org/dc/terms/";
    pub const VCARD: &str = "http://www.w3.org/2006/vcard/ns#";
}

use namespace::{DCTERMS, RDF, VCARD};

/// Structured OMEX metadata.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OmexDescription {
    pub creators: Vec<VCard>,
    pub created: Option<DateTime<Utc>>,
    pub modified: Vec<DateTime<Utc>>,
    pub description: Option<String>,
}

impl OmexDescription {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_creator(mut self, creator: VCard) -> Self {
        self.creators.push(creator);
        self
    }

    pub fn with_created(mut self, created: DateTime<Utc>) -> Self {
        self.created = Some(created);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DescriptionBody {
    Omex(OmexDescription),
    /// Any other `rdf:Description`, kept as a standalone fragment.
    Xml(XmlElement),
}

/// A metadata record about an entry (or the container itself, `/`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Description {
    /// Entry path, optionally with `#fragment`.
    pub about: String,
    pub body: DescriptionBody,
}

impl Description {
    pub fn omex(about: impl Into<String>, omex: OmexDescription) -> Self {
        Self {
            about: about.into(),
            body: DescriptionBody::Omex(omex),
        }
    }

    pub fn xml(about: impl Into<String>, element: XmlElement) -> Self {
        Self {
            about: about.into(),
            body: DescriptionBody::Xml(element),
        }
    }

    /// The path part of `about`.
    pub fn path(&self) -> &str {
        split_fragment(&self.about).0
    }

    pub fn as_omex(&self) -> Option<&OmexDescription> {
        match &self.body {
            DescriptionBody::Omex(o) => Some(o),
            DescriptionBody::Xml(_) => None,
        }
    }

    /// Creators of a structured description; empty for XML fragments.
    pub fn creators(&self) -> &[VCard] {
        self.as_omex().map(|o| o.creators.as_slice()).unwrap_or_default()
    }

    /// Same description pointing at `path`, keeping any fragment.
    pub fn rebased(&self, path: &str) -> Description {
        let about = match split_fragment(&self.about).1 {
            Some(fragment) => format!("{path}#{fragment}"),
            None => path.to_string(),
        };
        Description {
            about,
            body: self.body.clone(),
        }
    }

    /// Build from an element carrying `rdf:about`. The about value is kept as written.
    pub fn from_element(element: &XmlElement) -> Option<Description> {
        let about = element.attribute(Some(RDF), "about")?.to_string();
        let body = match parse_omex(element) {
            Some(omex) => DescriptionBody::Omex(omex),
            None => DescriptionBody::Xml(element.standalone()),
        };
        Some(Description { about, body })
    }

    /// Serialize as an `rdf:Description` with `rdf:about` set to `about_ref`.
    pub fn to_element(&self, about_ref: &str) -> XmlElement {
        match &self.body {
            DescriptionBody::Omex(omex) => omex_element(omex, about_ref),
            DescriptionBody::Xml(element) => {
                let mut element = element.clone();
                element.set_attribute("rdf:about", Some(RDF), about_ref);
                element
            }
        }
    }
}

// ============================================================================
// READING
// ============================================================================

/// Parse an `rdf:RDF` document into descriptions (about values as written).
pub fn parse_rdf_document(input: &[u8]) -> Result<Vec<Description>, CaroError> {
    let root = xml::parse(input)?;
    if !root.is(RDF, "RDF") {
        return Err(CaroError::xml(format!(
            "Expected rdf:RDF root, found {}",
            root.name
        )));
    }
    Ok(root.elements().filter_map(Description::from_element).collect())
}

fn parse_omex(element: &XmlElement) -> Option<OmexDescription> {
    if !element.is(RDF, "Description") {
        return None;
    }
    let mut omex = OmexDescription::default();
    let mut recognised = false;

    for child in element.elements() {
        if child.namespace.as_deref() != Some(DCTERMS) {
            return None;
        }
        match child.local_name() {
            "creator" => omex.creators.extend(parse_creators(child)),
            "created" => omex.created = Some(parse_date(child)?),
            "modified" => omex.modified.push(parse_date(child)?),
            "description" => omex.description = Some(child.text()),
            _ => return None,
        }
        recognised = true;
    }

    recognised.then_some(omex)
}

fn parse_creators(creator: &XmlElement) -> Vec<VCard> {
    let container = creator
        .elements()
        .find(|e| e.is(RDF, "Bag") || e.is(RDF, "Seq") || e.is(RDF, "Alt"));
    let cards: Vec<&XmlElement> = match container {
        Some(list) => list.elements().filter(|e| e.is(RDF, "li")).collect(),
        None => vec![creator],
    };
    cards
        .into_iter()
        .map(parse_vcard)
        .filter(|card| !card.is_empty())
        .collect()
}

fn parse_vcard(element: &XmlElement) -> VCard {
    let text_of = |local: &str| {
        element
            .find(VCARD, local)
            .map(|e| e.text())
            .filter(|t| !t.is_empty())
    };
    let email = element
        .find(VCARD, "hasEmail")
        .or_else(|| element.find(VCARD, "email"))
        .and_then(|e| {
            let raw = e
                .attribute(Some(RDF), "resource")
                .map(str::to_string)
                .unwrap_or_else(|| e.text());
            let raw = raw.strip_prefix("mailto:").unwrap_or(&raw).trim().to_string();
            (!raw.is_empty()).then_some(raw)
        });

    VCard {
        given_name: text_of("given-name"),
        family_name: text_of("family-name"),
        organization: text_of("organization-name"),
        email,
    }
}

fn parse_date(element: &XmlElement) -> Option<DateTime<Utc>> {
    let text = match element.find(DCTERMS, "W3CDTF") {
        Some(inner) => inner.text(),
        None => element.text(),
    };
    DateTime::parse_from_rfc3339(text.trim())
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

// ============================================================================
// WRITING
// ============================================================================

/// An empty `rdf:RDF` root declaring the OMEX prefixes.
pub fn rdf_root() -> XmlElement {
    XmlElement::new("rdf:RDF", Some(RDF))
        .with_namespace_decl("rdf", RDF)
        .with_namespace_decl("dcterms", DCTERMS)
        .with_namespace_decl("vCard", VCARD)
}

/// Pretty-printed `rdf:RDF` document containing `elements`.
pub fn write_rdf_document(elements: Vec<XmlElement>) -> Result<String, CaroError> {
    let mut root = rdf_root();
    for element in elements {
        root.push_child(element);
    }
    xml::to_pretty_string(&root)
}

fn omex_element(omex: &OmexDescription, about_ref: &str) -> XmlElement {
    let mut element =
        XmlElement::new("rdf:Description", Some(RDF)).with_attribute("rdf:about", Some(RDF), about_ref);

    for creator in &omex.creators {
        element.push_child(vcard_element(creator));
    }
    if let Some(created) = omex.created {
        element.push_child(date_element("dcterms:created", created));
    }
    for modified in &omex.modified {
        element.push_child(date_element("dcterms:modified", *modified));
    }
    if let Some(description) = &omex.description {
        element.push_child(
            XmlElement::new("dcterms:description", Some(DCTERMS)).with_text(description.clone()),
        );
    }
    element
}

fn vcard_element(card: &VCard) -> XmlElement {
    let mut creator = XmlElement::new("dcterms:creator", Some(DCTERMS)).with_attribute(
        "rdf:parseType",
        Some(RDF),
        "Resource",
    );

    if card.given_name.is_some() || card.family_name.is_some() {
        let mut name = XmlElement::new("vCard:hasName", Some(VCARD)).with_attribute(
            "rdf:parseType",
            Some(RDF),
            "Resource",
        );
        if let Some(family) = &card.family_name {
            name.push_child(XmlElement::new("vCard:family-name", Some(VCARD)).with_text(family.clone()));
        }
        if let Some(given) = &card.given_name {
            name.push_child(XmlElement::new("vCard:given-name", Some(VCARD)).with_text(given.clone()));
        }
        creator.push_child(name);
    }
    if let Some(email) = &card.email {
        creator.push_child(XmlElement::new("vCard:hasEmail", Some(VCARD)).with_attribute(
            "rdf:resource",
            Some(RDF),
            format!("mailto:{email}"),
        ));
    }
    if let Some(org) = &card.organization {
        creator.push_child(
            XmlElement::new("vCard:organization-name", Some(VCARD)).with_text(org.clone()),
        );
    }
    creator
}

fn date_element(name: &str, date: DateTime<Utc>) -> XmlElement {
    XmlElement::new(name, Some(DCTERMS))
        .with_attribute("rdf:parseType", Some(RDF), "Resource")
        .with_child(
            XmlElement::new("dcterms:W3CDTF", Some(DCTERMS))
                .with_text(date.to_rfc3339_opts(SecondsFormat::Secs, true)),
        )
}
