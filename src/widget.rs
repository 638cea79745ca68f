use serde::{Deserialize, Deserializer, Serialize};
use serde_with::{DefaultOnNull, serde_as};
use std::collections::BTreeMap;

pub const DEFAULT_HEADER_TEXT: &str = "Refer a business to Clicki Referrals! 👋";
pub const DEFAULT_COLOR: &str = "#2563eb";

/// Appearance, content and behavior of one widget.
///
/// Decoding is lenient: missing fields take the builder defaults, `null`
/// values become empty and unknown keys are ignored. Nothing is validated
/// here; a bad webhook URL only surfaces when the form is submitted.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WidgetConfig {
    #[serde_as(deserialize_as = "DefaultOnNull")]
    pub video_url: String,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    pub rewards_text: String,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    pub header_text: String,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    pub form_fields: Vec<FieldSpec>,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    pub webhook_url: String,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    pub widget_color: String,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    pub button_color: String,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            video_url: String::new(),
            rewards_text: String::new(),
            header_text: DEFAULT_HEADER_TEXT.to_string(),
            form_fields: default_form_fields(),
            webhook_url: String::new(),
            widget_color: DEFAULT_COLOR.to_string(),
            button_color: DEFAULT_COLOR.to_string(),
        }
    }
}

impl WidgetConfig {
    pub fn has_video(&self) -> bool {
        !self.video_url.is_empty()
    }

    pub fn has_rewards(&self) -> bool {
        !self.rewards_text.is_empty()
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.form_fields.iter().find(|f| f.name == name)
    }
}

fn default_form_fields() -> Vec<FieldSpec> {
    vec![
        FieldSpec::new("What is your name?", FieldType::Text, "name"),
        FieldSpec::new("What is your email?", FieldType::Email, "email"),
        FieldSpec::new("What is your phone?", FieldType::Tel, "phone"),
        FieldSpec::new("Who do you want to refer?", FieldType::Text, "referral"),
        FieldSpec::new(
            "What is their best phone number?",
            FieldType::Tel,
            "referralPhone",
        ),
    ]
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldSpec {
    #[serde_as(deserialize_as = "DefaultOnNull")]
    pub label: String,
    #[serde(rename = "type")]
    #[serde_as(deserialize_as = "DefaultOnNull")]
    pub kind: FieldType,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    pub name: String,
}

impl Default for FieldSpec {
    fn default() -> Self {
        Self {
            label: String::new(),
            kind: FieldType::Text,
            name: String::new(),
        }
    }
}

impl FieldSpec {
    pub fn new(label: impl Into<String>, kind: FieldType, name: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            kind,
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    #[default]
    Text,
    Email,
    Tel,
    Number,
}

impl FieldType {
    pub fn as_str(self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Email => "email",
            FieldType::Tel => "tel",
            FieldType::Number => "number",
        }
    }

    /// Unknown input types fall back to `text`.
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "email" => FieldType::Email,
            "tel" => FieldType::Tel,
            "number" => FieldType::Number,
            _ => FieldType::Text,
        }
    }
}

impl<'de> Deserialize<'de> for FieldType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match serde_json::Value::deserialize(deserializer)? {
            serde_json::Value::String(raw) => Ok(FieldType::parse_lenient(&raw)),
            _ => Ok(FieldType::Text),
        }
    }
}

/// Values entered into an open popup, keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormData(BTreeMap<String, String>);

impl FormData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(|s| s.as_str())
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_fields_take_builder_defaults() {
        let cfg: WidgetConfig =
            serde_json::from_value(json!({ "webhookUrl": "https://example.com/hook" })).unwrap();
        assert_eq!(cfg.header_text, DEFAULT_HEADER_TEXT);
        assert_eq!(cfg.widget_color, DEFAULT_COLOR);
        assert_eq!(cfg.button_color, DEFAULT_COLOR);
        assert_eq!(cfg.form_fields.len(), 5);
        assert_eq!(cfg.form_fields[4].name, "referralPhone");
        assert_eq!(cfg.webhook_url, "https://example.com/hook");
        assert!(!cfg.has_video());
        assert!(!cfg.has_rewards());
    }

    #[test]
    fn nulls_and_unknown_keys_are_tolerated() {
        let cfg: WidgetConfig = serde_json::from_value(json!({
            "videoUrl": null,
            "headerText": "Refer Now",
            "formFields": [{ "label": "Age", "type": "range", "name": "age" }],
            "somethingElse": 42
        }))
        .unwrap();
        assert_eq!(cfg.video_url, "");
        assert_eq!(cfg.header_text, "Refer Now");
        assert_eq!(cfg.form_fields[0].kind, FieldType::Text);
        assert_eq!(cfg.field("age").map(|f| f.label.as_str()), Some("Age"));
    }

    #[test]
    fn non_string_field_type_becomes_text() {
        let cfg: WidgetConfig = serde_json::from_value(json!({
            "formFields": [
                { "label": "Age", "type": 3, "name": "age" },
                { "label": "Email", "type": "EMAIL", "name": "email" },
                { "label": "Phone", "type": { "kind": "tel" }, "name": "phone" }
            ]
        }))
        .unwrap();
        let kinds: Vec<_> = cfg.form_fields.iter().map(|f| f.kind).collect();
        assert_eq!(kinds, vec![FieldType::Text, FieldType::Email, FieldType::Text]);
    }

    #[test]
    fn serializes_with_camel_case_keys() {
        let value = serde_json::to_value(WidgetConfig::default()).unwrap();
        assert_eq!(value["widgetColor"], "#2563eb");
        assert_eq!(value["formFields"][1]["type"], "email");
        assert!(value.get("video_url").is_none());
    }

    #[test]
    fn form_data_serializes_as_plain_object() {
        let mut data = FormData::new();
        data.set("name", "Alice");
        data.set("email", "alice@example.com");
        assert_eq!(
            serde_json::to_value(&data).unwrap(),
            json!({ "email": "alice@example.com", "name": "Alice" })
        );
    }
}
