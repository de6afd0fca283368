use std::collections::HashMap;
use std::io::Read;

use serde::{Deserialize, Serialize};

use super::domain::LocalizedText;
use super::policy::PolicyError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    En,
    De,
}

impl Locale {
    pub const fn all() -> [Self; 2] {
        [Self::En, Self::De]
    }

    pub const fn code(self) -> &'static str {
        match self {
            Self::En => "en",
            Self::De => "de",
        }
    }

    /// Accepts bare codes as well as region-qualified tags such as `de-CH`.
    pub fn parse(raw: &str) -> Option<Self> {
        let primary = raw.trim().split(['-', '_']).next()?.to_ascii_lowercase();
        match primary.as_str() {
            "en" => Some(Self::En),
            "de" => Some(Self::De),
            _ => None,
        }
    }
}

/// Named interpolation parameters; `{name}` in a template is replaced by the value.
pub type Params<'a> = [(&'a str, String)];

pub trait Translator: Send + Sync {
    /// Returns `None` when the key has no template, which callers treat as
    /// "nothing to say" rather than an error.
    fn trans(&self, key: &str, params: &Params<'_>, locale: Locale) -> Option<String>;
}

/// Renders `key` in every supported locale, or `None` if any locale lacks it.
pub fn bilingual(
    translator: &dyn Translator,
    key: &str,
    params: &Params<'_>,
) -> Option<LocalizedText> {
    Some(LocalizedText {
        en: translator.trans(key, params, Locale::En)?,
        de: translator.trans(key, params, Locale::De)?,
    })
}

/// In-memory catalog of en/de templates.
#[derive(Debug, Clone, Default)]
pub struct CatalogTranslator {
    entries: HashMap<String, LocalizedText>,
}

impl CatalogTranslator {
    pub fn standard() -> Self {
        let mut catalog = Self::default();
        for (key, en, de) in STANDARD_CATALOG {
            catalog.insert(key, en, de);
        }
        catalog
    }

    pub fn insert(&mut self, key: &str, en: &str, de: &str) {
        self.entries.insert(
            key.to_string(),
            LocalizedText {
                en: en.to_string(),
                de: de.to_string(),
            },
        );
    }

    pub fn remove(&mut self, key: &str) {
        self.entries.remove(key);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Loads `key,en,de` rows; entries override the standard catalog.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self, PolicyError> {
        let mut catalog = Self::standard();
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        for row in csv_reader.deserialize::<CatalogRow>() {
            let row = row?;
            if row.key.is_empty() {
                return Err(PolicyError::InvalidRow("translation key is empty".to_string()));
            }
            catalog.insert(&row.key, &row.en, &row.de);
        }

        Ok(catalog)
    }
}

impl Translator for CatalogTranslator {
    fn trans(&self, key: &str, params: &Params<'_>, locale: Locale) -> Option<String> {
        let template = self.entries.get(key)?.get(locale);
        Some(interpolate(template, params))
    }
}

#[derive(Debug, Deserialize)]
struct CatalogRow {
    key: String,
    en: String,
    de: String,
}

/// Single pass over the template: inserted values are never scanned again,
/// and unknown `{tokens}` are kept as written. The first matching param wins.
fn interpolate(template: &str, params: &Params<'_>) -> String {
    let mut rendered = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        rendered.push_str(&rest[..open]);
        let tail = &rest[open + 1..];
        let Some(close) = tail.find('}') else {
            rendered.push_str(&rest[open..]);
            return rendered;
        };
        let name = &tail[..close];
        match params.iter().find(|(key, _)| *key == name) {
            Some((_, value)) => rendered.push_str(value),
            None => rendered.push_str(&rest[open..open + close + 2]),
        }
        rest = &tail[close + 1..];
    }
    rendered.push_str(rest);
    rendered
}

const STANDARD_CATALOG: &[(&str, &str, &str)] = &[
    (
        "damage.created",
        "{actor} reported a new damage for {apartment}: {title}",
        "{actor} hat einen neuen Schaden für {apartment} gemeldet: {title}",
    ),
    (
        "damage.created.self",
        "You reported the damage {title}.",
        "Sie haben den Schaden {title} gemeldet.",
    ),
    (
        "damage.accepted",
        "{actor} accepted the damage {title}.",
        "{actor} hat den Schaden {title} angenommen.",
    ),
    (
        "damage.rejected",
        "{actor} rejected the damage {title}: {comment}",
        "{actor} hat den Schaden {title} abgelehnt: {comment}",
    ),
    (
        "offer.requested",
        "{actor} requests an offer for {title} at {apartment}.",
        "{actor} bittet um ein Angebot für {title} in {apartment}.",
    ),
    (
        "offer.requested.summary",
        "Offers were requested from {companies}.",
        "Angebote wurden angefragt bei {companies}.",
    ),
    (
        "order.assigned",
        "{actor} ordered the repair of {title} at {apartment}.",
        "{actor} hat die Reparatur von {title} in {apartment} beauftragt.",
    ),
    (
        "order.assigned.summary",
        "The repair was ordered from {companies}.",
        "Die Reparatur wurde bei {companies} beauftragt.",
    ),
    (
        "company.accepted",
        "{company} accepted the repair order for {title}.",
        "{company} hat den Reparaturauftrag für {title} angenommen.",
    ),
    (
        "company.rejected",
        "{company} declined the repair order for {title}: {comment}",
        "{company} hat den Reparaturauftrag für {title} abgelehnt: {comment}",
    ),
    (
        "offer.given",
        "{company} submitted an offer of {amount} for {title}.",
        "{company} hat ein Angebot über {amount} für {title} abgegeben.",
    ),
    (
        "offer.given.self",
        "Your offer of {amount} was submitted.",
        "Ihr Angebot über {amount} wurde übermittelt.",
    ),
    (
        "offer.accepted",
        "{actor} accepted your offer of {amount} for {title}.",
        "{actor} hat Ihr Angebot über {amount} für {title} angenommen.",
    ),
    (
        "offer.accepted.summary",
        "The offer of {company} ({amount}) was accepted.",
        "Das Angebot von {company} ({amount}) wurde angenommen.",
    ),
    (
        "offer.rejected",
        "{actor} rejected your offer for {title}: {comment}",
        "{actor} hat Ihr Angebot für {title} abgelehnt: {comment}",
    ),
    (
        "offer.rejected.summary",
        "The offer of {company} was rejected: {comment}",
        "Das Angebot von {company} wurde abgelehnt: {comment}",
    ),
    (
        "appointmentFixed",
        "{company} fixed an appointment for {title} on {date}.",
        "{company} hat einen Termin für {title} am {date} vereinbart.",
    ),
    (
        "appointmentRescheduled",
        "{company} rescheduled the appointment for {title} to {date}.",
        "{company} hat den Termin für {title} auf den {date} verschoben.",
    ),
    (
        "appointment.confirmed",
        "{actor} confirmed the appointment on {date}.",
        "{actor} hat den Termin am {date} bestätigt.",
    ),
    (
        "appointment.rejected",
        "{actor} declined the appointment on {date}: {comment}",
        "{actor} hat den Termin am {date} abgelehnt: {comment}",
    ),
    (
        "repair.completed",
        "{company} completed the repair of {title}.",
        "{company} hat die Reparatur von {title} abgeschlossen.",
    ),
    (
        "damage.closed",
        "{actor} closed the damage {title}.",
        "{actor} hat den Schaden {title} abgeschlossen.",
    ),
    (
        "defect.raised",
        "{actor} reported a defect on {title}: {defect}",
        "{actor} hat einen Mangel an {title} gemeldet: {defect}",
    ),
    (
        "mail.subject.update",
        "Update on damage {public_id}: {title}",
        "Neuigkeiten zum Schaden {public_id}: {title}",
    ),
    (
        "mail.subject.offer_request",
        "Offer request for damage {public_id}",
        "Angebotsanfrage für Schaden {public_id}",
    ),
    (
        "mail.subject.invitation",
        "Invitation to quote for damage {public_id}",
        "Einladung zur Angebotsabgabe für Schaden {public_id}",
    ),
];
