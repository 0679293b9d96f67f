//! Mapping between Research Object agents and OMEX person cards.
//!
//! ```text
//! Agent { name: "Jane Doe", uri: "mailto:jane@example.org" }
//!        ▲                          │
//!        │ card_to_person           │ person_to_card
//!        │                          ▼
//! VCard { given: "Jane", family: "Doe", email: "jane@example.org" }
//! ```

use serde::{Deserialize, Serialize};

use crate::notification::Notifications;

const MAILTO: &str = "mailto:";

/// A person or software agent as recorded in a bundle manifest.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Contact URI, usually `mailto:`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orcid: Option<String>,
}

impl Agent {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }
}

/// A vCard-style contact record used by OMEX descriptions.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VCard {
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub organization: Option<String>,
    pub email: Option<String>,
}

impl VCard {
    pub fn new(given_name: impl Into<String>, family_name: impl Into<String>) -> Self {
        Self {
            given_name: Some(given_name.into()),
            family_name: Some(family_name.into()),
            ..Self::default()
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_organization(mut self, organization: impl Into<String>) -> Self {
        self.organization = Some(organization.into());
        self
    }

    /// `given family`, skipping absent parts.
    pub fn full_name(&self) -> Option<String> {
        let parts: Vec<&str> = [self.given_name.as_deref(), self.family_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }

    pub fn is_empty(&self) -> bool {
        [
            &self.given_name,
            &self.family_name,
            &self.organization,
            &self.email,
        ]
        .iter()
        .all(|f| non_blank(f).is_none())
    }
}

/// Convert an agent into a person card.
///
/// A multi-token name is split into given name (first token) and family
/// name (the rest). Only `mailto:` URIs contribute an email. Returns `None`
/// when neither a name nor an email could be extracted.
pub fn person_to_card(agent: &Agent) -> Option<VCard> {
    let mut card = VCard::default();

    if let Some(name) = non_blank(&agent.name) {
        let mut tokens = name.split_whitespace();
        card.given_name = tokens.next().map(str::to_string);
        let rest: Vec<&str> = tokens.collect();
        if !rest.is_empty() {
            card.family_name = Some(rest.join(" "));
        }
    }

    if let Some(uri) = non_blank(&agent.uri) {
        let scheme = uri.get(..MAILTO.len());
        if scheme.is_some_and(|s| s.eq_ignore_ascii_case(MAILTO)) {
            let address = uri[MAILTO.len()..].split('?').next().unwrap_or_default();
            if !address.is_empty() {
                card.email = Some(address.to_string());
            }
        }
    }

    if card.given_name.is_none() && card.email.is_none() {
        None
    } else {
        Some(card)
    }
}

/// Convert a person card into an agent.
///
/// A malformed email is reported as a warning and left out; the agent is
/// still returned with its name. Returns `None` when nothing usable remains.
pub fn card_to_person(card: &VCard, notifications: &mut Notifications) -> Option<Agent> {
    let mut agent = Agent {
        name: card.full_name(),
        ..Agent::default()
    };

    if let Some(email) = non_blank(&card.email) {
        match mailto_uri(email) {
            Some(uri) => agent.uri = Some(uri),
            None => notifications.warn(format!(
                "cannot create a mailto URI for {email}, dropping email of {}",
                agent.name.as_deref().unwrap_or("unnamed person")
            )),
        }
    }

    if agent.name.is_none() && agent.uri.is_none() {
        None
    } else {
        Some(agent)
    }
}

fn mailto_uri(email: &str) -> Option<String> {
    if email.chars().any(char::is_whitespace) {
        return None;
    }
    let (local, domain) = email.split_once('@')?;
    if local.is_empty() || domain.is_empty() {
        return None;
    }
    url::Url::parse(&format!("{MAILTO}{email}"))
        .ok()
        .map(|u| u.to_string())
}

/// Dedup predicate for person cards.
///
/// Two cards are the same person when both carry an email and the emails
/// are equal ignoring case, or when their names match. For names, each of
/// given and family name must be equal when present on both sides, an absent
/// value on either side matches anything, and at least one of the two must
/// be present and equal on both sides. Organization is ignored.
pub fn same_card(a: &VCard, b: &VCard) -> bool {
    if let (Some(x), Some(y)) = (non_blank(&a.email), non_blank(&b.email)) {
        if x.eq_ignore_ascii_case(y) {
            return true;
        }
    }

    let fields = [
        (non_blank(&a.given_name), non_blank(&b.given_name)),
        (non_blank(&a.family_name), non_blank(&b.family_name)),
    ];
    let mut anchored = false;
    for pair in fields {
        match pair {
            (Some(x), Some(y)) if x == y => anchored = true,
            (Some(_), Some(_)) => return false,
            _ => {}
        }
    }
    anchored
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}
