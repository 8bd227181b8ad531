use std::collections::HashMap;

use once_cell::sync::Lazy;

const EN_US: &str = include_str!("../locales/en_US.json");

/// The bundled English strings.
pub static DEFAULT_LOCALE: Lazy<Locale> = Lazy::new(||
    Locale::from_json(EN_US).unwrap_or_default()
);

#[derive(Debug, Default, Clone)]
pub struct Locale {
    strings: HashMap<String, String>,
}

impl Locale {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        Ok(Self {
            strings: serde_json::from_str(json)?,
        })
    }

    /// Missing keys come back as the key itself so a gap is visible in the UI.
    pub fn get(&self, key: &str) -> String {
        self.strings
            .get(key)
            .cloned()
            .unwrap_or_else(|| key.to_string())
    }
}
