//! The handful of strings the session core itself puts into the transcript.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Me,
}

impl Language {
    /// Anything other than `"me"` falls back to English.
    pub fn from_code(code: &str) -> Self {
        match code.trim().to_ascii_lowercase().as_str() {
            "me" => Language::Me,
            _ => Language::En,
        }
    }

    pub fn greeting(&self, name: Option<&str>) -> String {
        match (self, name.map(str::trim).filter(|n| !n.is_empty())) {
            (Language::En, Some(name)) => {
                format!("Hi {}! Thanks for reaching out. How can I help you today?", name)
            }
            (Language::En, None) => {
                "Hi! Thanks for reaching out. How can I help you today?".to_string()
            }
            (Language::Me, Some(name)) => format!(
                "Zdravo {}! Hvala sto ste nas kontaktirali. Kako vam mozemo pomoci?",
                name
            ),
            (Language::Me, None) => {
                "Zdravo! Hvala sto ste nas kontaktirali. Kako vam mozemo pomoci?".to_string()
            }
        }
    }

    pub fn auth_failed(&self) -> &'static str {
        match self {
            Language::En => "Authentication failed. Please refresh and try again.",
            Language::Me => "Autentifikacija neuspjesna. Osvjezite stranicu i pokusajte ponovo.",
        }
    }

    pub fn backend_not_configured(&self) -> &'static str {
        match self {
            Language::En => "Chat backend is not configured.",
            Language::Me => "Chat server nije konfigurisan.",
        }
    }

    pub fn could_not_connect(&self) -> &'static str {
        match self {
            Language::En => "Could not connect to support chat. Please try again later.",
            Language::Me => "Povezivanje sa chat podrskom nije uspjelo. Pokusajte ponovo kasnije.",
        }
    }

    pub fn connection_unavailable(&self) -> &'static str {
        match self {
            Language::En => "Message not sent. Connection is unavailable.",
            Language::Me => "Poruka nije poslata. Konekcija nije dostupna.",
        }
    }
}
