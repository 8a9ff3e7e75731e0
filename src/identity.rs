use serde::{Deserialize, Serialize};

pub const DEFAULT_LABEL: &str = "usuario";

/// Who is being analyzed. Only used to label exported artifacts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub name: Option<String>,
    pub email: Option<String>,
}

impl Identity {
    pub fn new(name: Option<String>, email: Option<String>) -> Self {
        Self { name, email }
    }

    /// Display name, else the local part of the email, else `"usuario"`.
    pub fn display_label(&self) -> String {
        let from_name = self
            .name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty());
        let from_email = || {
            self.email
                .as_deref()
                .and_then(|email| email.trim().split('@').next())
                .filter(|local| !local.is_empty())
        };

        from_name
            .or_else(from_email)
            .unwrap_or(DEFAULT_LABEL)
            .to_string()
    }

    /// [`Self::display_label`] reduced to characters safe in file names.
    pub fn file_label(&self) -> String {
        let cleaned: String = self
            .display_label()
            .chars()
            .map(|c| {
                if c.is_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        let trimmed = cleaned.trim_matches('_');
        if trimmed.is_empty() {
            DEFAULT_LABEL.to_string()
        } else {
            trimmed.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_name_then_email_then_default() {
        let both = Identity::new(Some("Ana".into()), Some("ana.p@example.com".into()));
        assert_eq!(both.display_label(), "Ana");

        let email_only = Identity::new(None, Some("ana.p@example.com".into()));
        assert_eq!(email_only.display_label(), "ana.p");

        let blank_name = Identity::new(Some("   ".into()), None);
        assert_eq!(blank_name.display_label(), "usuario");

        assert_eq!(Identity::default().display_label(), "usuario");
    }

    #[test]
    fn file_label_replaces_unsafe_characters() {
        let identity = Identity::new(Some("Ana María / QA".into()), None);
        assert_eq!(identity.file_label(), "Ana_María___QA");

        let punctuation = Identity::new(Some("???".into()), None);
        assert_eq!(punctuation.file_label(), "usuario");
    }
}
