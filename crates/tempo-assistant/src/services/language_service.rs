use std::collections::HashMap;

/// Translation lookup keyed by language code.
///
/// Resolution order is fixed: requested language → base language
/// (`pt-BR` → `pt`) → the raw key itself.
pub struct LanguageService {
    tables: HashMap<String, HashMap<String, String>>,
}

impl LanguageService {
    pub fn new() -> Self {
        Self {
            tables: HashMap::new(),
        }
    }

    /// Service preloaded with the built-in English notice copy.
    pub fn with_defaults() -> Self {
        let mut service = Self::new();
        service.insert_table(
            "en",
            [
                (
                    "assistant.notice.turn_failed",
                    "The assistant could not answer. Your message was not sent — please try again.",
                ),
                (
                    "assistant.notice.rate_limited",
                    "The assistant is busy right now. Your message is kept — resend it in a moment.",
                ),
                (
                    "assistant.notice.upgrade",
                    "You are out of AI credits. Upgrade your plan or buy more credits to continue.",
                ),
            ]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        );
        service
    }

    pub fn insert_table(&mut self, language: impl Into<String>, table: HashMap<String, String>) {
        self.tables.insert(language.into(), table);
    }

    pub fn translate(&self, language: &str, key: &str) -> String {
        if let Some(hit) = self.lookup(language, key) {
            return hit.to_string();
        }
        if let Some(base) = base_language(language)
            && let Some(hit) = self.lookup(base, key)
        {
            return hit.to_string();
        }
        key.to_string()
    }

    fn lookup(&self, language: &str, key: &str) -> Option<&str> {
        self.tables
            .get(language)
            .and_then(|table| table.get(key))
            .map(String::as_str)
    }
}

impl Default for LanguageService {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn base_language(code: &str) -> Option<&str> {
    code.split_once('-').map(|(base, _)| base)
}
