//! Pull JSON payloads out of chat replies.
//!
//! Models wrap JSON in markdown fences or `<request_accomplished>` tags more
//! often than not, so every structured reply goes through here.

use serde::de::DeserializeOwned;

use super::client::ModelError;

const WRAPPER_OPEN: &str = "<request_accomplished";
const WRAPPER_CLOSE: &str = "</request_accomplished>";

/// Return the JSON-looking core of `text`, trimmed.
///
/// Handles ```` ```json ```` fences, bare ```` ``` ```` fences and
/// `<request_accomplished …>…</request_accomplished>` wrappers. Text without
/// any framing is returned trimmed.
pub fn extract_json_block(text: &str) -> &str {
    let mut text = text.trim();

    if let Some(start) = text.find(WRAPPER_OPEN) {
        let after_open = &text[start + WRAPPER_OPEN.len()..];
        if let Some(gt) = after_open.find('>') {
            let inner = &after_open[gt + 1..];
            text = match inner.find(WRAPPER_CLOSE) {
                Some(end) => &inner[..end],
                None => inner,
            }
            .trim();
        }
    }

    if let Some(start) = text.find("```json") {
        let inner = &text[start + "```json".len()..];
        return match inner.find("```") {
            Some(end) => inner[..end].trim(),
            None => inner.trim(),
        };
    }

    if let Some(start) = text.find("```") {
        let inner = &text[start + 3..];
        let inner = match inner.find("```") {
            Some(end) => &inner[..end],
            None => inner,
        };
        // A bare fence may still carry a language tag on its first line.
        let inner = match inner.split_once('\n') {
            Some((first, rest)) if is_language_tag(first) => rest,
            _ => inner,
        };
        return inner.trim();
    }

    text
}

fn is_language_tag(line: &str) -> bool {
    let line = line.trim();
    !line.is_empty() && line.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Extract and deserialize a JSON payload.
pub fn parse_json<T: DeserializeOwned>(text: &str) -> Result<T, ModelError> {
    let block = extract_json_block(text);
    serde_json::from_str(block)
        .map_err(|e| ModelError::ParseError(format!("{} in {:?}", e, truncate(block, 200))))
}

/// Like [`parse_json`], but a literal `null` (any case) yields `Ok(None)`.
pub fn parse_optional_json<T: DeserializeOwned>(text: &str) -> Result<Option<T>, ModelError> {
    let block = extract_json_block(text);
    if block.eq_ignore_ascii_case("null") || block.is_empty() {
        return Ok(None);
    }
    parse_json(block).map(Some)
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn test_fenced_json() {
        let reply = "Here you go:\n```json\n{\"price\": \"₹129\"}\n```\nanything else?";
        assert_eq!(extract_json_block(reply), "{\"price\": \"₹129\"}");
    }

    #[test]
    fn test_bare_fence() {
        assert_eq!(extract_json_block("```\n[1, 2]\n```"), "[1, 2]");
        assert_eq!(extract_json_block("```javascript\n[3]\n```"), "[3]");
    }

    #[test]
    fn test_wrapper_tags() {
        let reply = "<request_accomplished success=\"true\">\n{\"a\": 1}\n</request_accomplished>";
        assert_eq!(extract_json_block(reply), "{\"a\": 1}");

        let reply = "<request_accomplished>```json\n{\"b\": 2}\n```</request_accomplished>";
        assert_eq!(extract_json_block(reply), "{\"b\": 2}");
    }

    #[test]
    fn test_plain_text_untouched() {
        assert_eq!(extract_json_block("  [\"open_app Settings\"] "), "[\"open_app Settings\"]");
    }

    #[test]
    fn test_parse_json() {
        let steps: Vec<String> = parse_json("```json\n[\"tap WiFi\"]\n```").unwrap();
        assert_eq!(steps, vec!["tap WiFi"]);

        let err = parse_json::<Value>("not json at all").unwrap_err();
        assert!(matches!(err, ModelError::ParseError(_)));
    }

    #[test]
    fn test_parse_optional_json() {
        assert!(parse_optional_json::<Value>("NULL").unwrap().is_none());
        assert!(parse_optional_json::<Value>("```json\nnull\n```").unwrap().is_none());
        let v: Option<Value> = parse_optional_json("{\"x\": true}").unwrap();
        assert_eq!(v.unwrap()["x"], true);
    }
}
