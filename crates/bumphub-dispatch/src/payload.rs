//! Notification payload — the one shape every renderer produces and
//! every transport consumes. Explicit fields instead of loosely-typed
//! embed objects, so renderers stay testable without a transport.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a message previously created at a destination.
pub type MessageId = String;

/// One name/value pair rendered as an embed field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadField {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub inline: bool,
}

impl PayloadField {
    pub fn inline(name: &str, value: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            value: value.into(),
            inline: true,
        }
    }

    pub fn block(name: &str, value: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            value: value.into(),
            inline: false,
        }
    }
}

/// A rendered notification, independent of any chat platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub title: String,
    pub description: String,
    /// Embed accent color (0xRRGGBB).
    pub color: u32,
    #[serde(default)]
    pub fields: Vec<PayloadField>,
    /// Optional link action: (label, url).
    pub link: Option<(String, String)>,
    pub timestamp: DateTime<Utc>,
}

impl NotificationPayload {
    pub fn new(title: &str, description: &str, color: u32, timestamp: DateTime<Utc>) -> Self {
        Self {
            title: title.to_string(),
            description: description.to_string(),
            color,
            fields: Vec::new(),
            link: None,
            timestamp,
        }
    }

    pub fn field(mut self, field: PayloadField) -> Self {
        self.fields.push(field);
        self
    }

    pub fn link(mut self, label: &str, url: &str) -> Self {
        self.link = Some((label.to_string(), url.to_string()));
        self
    }

    /// The Discord-compatible embed body shared by send and edit.
    pub fn to_embed_json(&self) -> serde_json::Value {
        let mut description = self.description.clone();
        if let Some((label, url)) = &self.link {
            description.push_str(&format!("\n\n[{label}]({url})"));
        }
        serde_json::json!({
            "embeds": [{
                "title": self.title,
                "description": description,
                "color": self.color,
                "fields": self.fields.iter().map(|f| serde_json::json!({
                    "name": f.name,
                    "value": f.value,
                    "inline": f.inline,
                })).collect::<Vec<_>>(),
                "timestamp": self.timestamp.to_rfc3339(),
            }]
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embed_json_shape() {
        let payload = NotificationPayload::new("New listing", "Rust Hangout", 0x00AAFF, Utc::now())
            .field(PayloadField::inline("Owner", "m1"))
            .link("Open listing", "https://bumphub.example/l/42");
        let json = payload.to_embed_json();

        let embed = &json["embeds"][0];
        assert_eq!(embed["title"], "New listing");
        assert!(embed["description"]
            .as_str()
            .unwrap()
            .contains("[Open listing](https://bumphub.example/l/42)"));
        assert_eq!(embed["fields"][0]["name"], "Owner");
        assert_eq!(embed["fields"][0]["inline"], true);
    }
}
