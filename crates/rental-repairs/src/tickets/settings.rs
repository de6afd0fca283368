use chrono::Duration;

use super::i18n::Locale;

/// Runtime knobs for links, invitations and offer requests.
#[derive(Debug, Clone)]
pub struct WorkflowSettings {
    pub public_base_url: String,
    pub link_secret: Vec<u8>,
    pub link_ttl: Duration,
    pub invitation_ttl: Duration,
    pub offer_request_ttl: Duration,
    pub default_locale: Locale,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            public_base_url: "http://localhost:3000".to_string(),
            link_secret: b"rental-repairs-dev-secret".to_vec(),
            link_ttl: Duration::hours(72),
            invitation_ttl: Duration::days(14),
            offer_request_ttl: Duration::days(21),
            default_locale: Locale::De,
        }
    }
}
