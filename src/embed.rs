use crate::widget::WidgetConfig;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

/// Same set `encodeURIComponent` escapes.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("config json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("encoded config is not valid utf-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
    #[error("no encoded config found in snippet")]
    MissingPayload,
}

pub fn encode_config(config: &WidgetConfig) -> Result<String, EmbedError> {
    let json = serde_json::to_string(config)?;
    Ok(utf8_percent_encode(&json, COMPONENT).to_string())
}

pub fn decode_config(encoded: &str) -> Result<WidgetConfig, EmbedError> {
    let json = percent_decode_str(encoded.trim()).decode_utf8()?;
    Ok(serde_json::from_str(&json)?)
}

/// Builds the snippet a host site pastes into its page.
///
/// The payload only contains characters from the unreserved set plus `%`,
/// so it can sit inside a double-quoted JS string within a `<script>` block.
pub fn embed_snippet(config: &WidgetConfig, loader_url: &str) -> Result<String, EmbedError> {
    let encoded = encode_config(config)?;
    Ok(format!(
        r#"<script>
  (function() {{
    var script = document.createElement('script');
    script.src = '{src}';
    script.async = true;
    document.body.appendChild(script);

    script.onload = function() {{
      window.initClickiWidget(JSON.parse(decodeURIComponent("{encoded}")));
    }};
  }})();
</script>"#,
        src = js_single_quoted(loader_url),
    ))
}

/// Pulls the encoded config back out of a previously generated snippet.
pub fn extract_encoded(snippet: &str) -> Option<&str> {
    static PAYLOAD: OnceLock<Regex> = OnceLock::new();
    let re = PAYLOAD.get_or_init(|| {
        Regex::new(r#"initClickiWidget\(\s*JSON\.parse\(\s*decodeURIComponent\(\s*"([A-Za-z0-9\-_.!~*'()%]*)"\s*\)\s*\)\s*\)"#)
            .expect("static regex")
    });
    re.captures(snippet)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Accepts either a full snippet or a bare encoded payload.
pub fn decode_snippet_or_payload(input: &str) -> Result<WidgetConfig, EmbedError> {
    let trimmed = input.trim();
    if trimmed.contains("initClickiWidget") {
        let encoded = extract_encoded(trimmed).ok_or(EmbedError::MissingPayload)?;
        decode_config(encoded)
    } else {
        decode_config(trimmed)
    }
}

pub(crate) fn js_single_quoted(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '<' => out.push_str("\\x3c"),
            '>' => out.push_str("\\x3e"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::widget::{FieldSpec, FieldType};

    const LOADER: &str = "https://quickreferralwidgetwithbuilder.vercel.app/widget.js";

    fn tricky_config() -> WidgetConfig {
        WidgetConfig {
            video_url: "https://www.youtube.com/embed/abc?x=1&y=2".into(),
            rewards_text: "Get $50 </script><script>alert('x')</script> & \"more\" 🎁".into(),
            header_text: "Réfère un ami <3".into(),
            form_fields: vec![
                FieldSpec::new("Name", FieldType::Text, "name"),
                FieldSpec::new("Business", FieldType::Number, "business"),
            ],
            webhook_url: "https://example.com/hook?a=b&c=d".into(),
            widget_color: "#ff0000".into(),
            button_color: "rgb(0, 0, 0)".into(),
        }
    }

    #[test]
    fn round_trips_through_encoding() {
        let cfg = tricky_config();
        let encoded = encode_config(&cfg).unwrap();
        assert_eq!(decode_config(&encoded).unwrap(), cfg);
    }

    #[test]
    fn encoded_payload_is_script_safe() {
        let encoded = encode_config(&tricky_config()).unwrap();
        for forbidden in ['<', '>', '&', '"', '\\', ' ', '\n', '/'] {
            assert!(!encoded.contains(forbidden), "payload contains {forbidden:?}");
        }
    }

    #[test]
    fn snippet_has_single_script_block() {
        let snippet = embed_snippet(&tricky_config(), LOADER).unwrap();
        assert!(snippet.starts_with("<script>"));
        assert!(snippet.ends_with("</script>"));
        assert_eq!(snippet.matches("</script").count(), 1);
        assert!(snippet.contains(&format!("script.src = '{LOADER}';")));
        assert!(snippet.contains("script.async = true;"));
    }

    #[test]
    fn snippet_is_deterministic() {
        let cfg = tricky_config();
        assert_eq!(
            embed_snippet(&cfg, LOADER).unwrap(),
            embed_snippet(&cfg, LOADER).unwrap()
        );
    }

    #[test]
    fn snippet_payload_can_be_recovered() {
        let cfg = tricky_config();
        let snippet = embed_snippet(&cfg, LOADER).unwrap();
        assert_eq!(extract_encoded(&snippet), Some(encode_config(&cfg).unwrap().as_str()));
        assert_eq!(decode_snippet_or_payload(&snippet).unwrap(), cfg);
    }

    #[test]
    fn snippet_without_payload_is_rejected() {
        let err = decode_snippet_or_payload("<script>window.initClickiWidget({})</script>")
            .unwrap_err();
        assert!(matches!(err, EmbedError::MissingPayload));
    }

    #[test]
    fn invalid_payload_reports_json_error() {
        let err = decode_config("%7Bnot-json").unwrap_err();
        assert!(matches!(err, EmbedError::Json(_)));
        let err = decode_config("%FF%FE").unwrap_err();
        assert!(matches!(err, EmbedError::Utf8(_)));
    }

    #[test]
    fn loader_url_is_escaped_for_js() {
        let snippet = embed_snippet(&WidgetConfig::default(), "https://x.test/it's</script>.js")
            .unwrap();
        assert!(snippet.contains(r"https://x.test/it\'s\x3c/script\x3e.js"));
        assert_eq!(snippet.matches("</script").count(), 1);
    }
}
