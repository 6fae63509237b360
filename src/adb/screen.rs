//! UI hierarchy dumps and the reduced textual screen view sent to the model.

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};

use super::connection::AdbError;

/// Remote path `uiautomator dump` writes to by default.
pub const WINDOW_DUMP_PATH: &str = "/sdcard/window_dump.xml";

/// Number of labelled elements kept in a screen summary.
pub const DEFAULT_SUMMARY_LIMIT: usize = 50;

/// Summary used when the dump is missing (secure screens, keyguard).
pub const EMPTY_SCREEN: &str = "Screen is empty or protected.";

/// Summary used when the dump cannot be parsed.
pub const PARSE_ERROR_SCREEN: &str = "XML Parse Error";

/// Status line printed by `uiautomator dump` (the typo is Android's).
pub(crate) const DUMP_BANNER: &str = "UI hierchary dumped";

static NODE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<node\b([^>]*)>").expect("valid regex"));
static ATTR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"([\w:.-]+)="([^"]*)""#).expect("valid regex"));
static BOUNDS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[(-?\d+),(-?\d+)\]\[(-?\d+),(-?\d+)\]").expect("valid regex")
});

/// Screen rectangle from a node's `bounds` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Bounds {
    /// Parse `[x1,y1][x2,y2]`.
    pub fn parse(raw: &str) -> Option<Self> {
        let caps = BOUNDS_RE.captures(raw)?;
        let n = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<i32>().ok());
        Some(Self {
            left: n(1)?,
            top: n(2)?,
            right: n(3)?,
            bottom: n(4)?,
        })
    }

    /// Integer centre point, used as the tap target.
    pub fn center(&self) -> (i32, i32) {
        let mid = |a: i32, b: i32| ((i64::from(a) + i64::from(b)) / 2) as i32;
        (mid(self.left, self.right), mid(self.top, self.bottom))
    }
}

/// A single `<node>` of the UI hierarchy.
#[derive(Debug, Clone, Default)]
pub struct UiNode {
    pub text: String,
    pub content_desc: String,
    pub class: String,
    pub resource_id: String,
    pub raw_bounds: String,
    pub bounds: Option<Bounds>,
    pub clickable: bool,
}

impl UiNode {
    /// Visible label: the text, falling back to the content description.
    pub fn label(&self) -> Option<&str> {
        if !self.text.is_empty() {
            Some(&self.text)
        } else if !self.content_desc.is_empty() {
            Some(&self.content_desc)
        } else {
            None
        }
    }

    fn matches_substring(&self, needle_lower: &str) -> bool {
        self.text.to_lowercase().contains(needle_lower)
            || self.content_desc.to_lowercase().contains(needle_lower)
    }

    fn matches_pattern(&self, pattern: &Regex) -> bool {
        (!self.text.is_empty() && pattern.is_match(&self.text))
            || (!self.content_desc.is_empty() && pattern.is_match(&self.content_desc))
    }
}

fn unescape_xml(value: &str) -> String {
    if !value.contains('&') {
        return value.to_string();
    }
    value
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&#10;", "\n")
        .replace("&#13;", "\r")
        .replace("&amp;", "&")
}

/// Whether a raw dump looks like a hierarchy document rather than tool chatter.
pub fn is_hierarchy(raw: &str) -> bool {
    let trimmed = raw.trim_start();
    trimmed.starts_with('<') && trimmed.contains("<hierarchy")
}

/// Extract all nodes, in document order.
pub fn parse_ui_nodes(xml: &str) -> Result<Vec<UiNode>, AdbError> {
    if !is_hierarchy(xml) {
        let preview: String = xml.trim().chars().take(80).collect();
        return Err(AdbError::InvalidDump(preview));
    }

    let nodes = NODE_RE
        .captures_iter(xml)
        .map(|caps| {
            let mut node = UiNode::default();
            for attr in ATTR_RE.captures_iter(&caps[1]) {
                let value = unescape_xml(&attr[2]);
                match &attr[1] {
                    "text" => node.text = value,
                    "content-desc" => node.content_desc = value,
                    "class" => node.class = value,
                    "resource-id" => node.resource_id = value,
                    "clickable" => node.clickable = value == "true",
                    "bounds" => {
                        node.bounds = Bounds::parse(&value);
                        node.raw_bounds = value;
                    }
                    _ => {}
                }
            }
            node
        })
        .collect();

    Ok(nodes)
}

/// First node whose text or content-desc contains `text`, case-insensitively.
pub fn find_element_by_text<'a>(nodes: &'a [UiNode], text: &str) -> Option<&'a UiNode> {
    let needle = text.to_lowercase();
    nodes
        .iter()
        .filter(|n| n.bounds.is_some())
        .find(|n| n.matches_substring(&needle))
}

/// First node whose text or content-desc matches `pattern` (case-insensitive).
pub fn find_element_by_pattern<'a>(
    nodes: &'a [UiNode],
    pattern: &str,
) -> Result<Option<&'a UiNode>, regex::Error> {
    let re = RegexBuilder::new(pattern).case_insensitive(true).build()?;
    Ok(nodes
        .iter()
        .filter(|n| n.bounds.is_some())
        .find(|n| n.matches_pattern(&re)))
}

/// Locate the centre of the element labelled `text` in a raw dump.
pub fn locate_text(xml: &str, text: &str, regex: bool) -> Option<(i32, i32)> {
    let nodes = match parse_ui_nodes(xml) {
        Ok(nodes) => nodes,
        Err(e) => {
            tracing::warn!("Cannot search UI dump: {}", e);
            return None;
        }
    };

    let found = if regex {
        match find_element_by_pattern(&nodes, text) {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!("Invalid element pattern '{}': {}", text, e);
                None
            }
        }
    } else {
        find_element_by_text(&nodes, text)
    };

    found.and_then(|n| n.bounds).map(|b| b.center())
}

/// Render the model-facing view of the screen: one line per labelled element,
/// keeping only the last `limit` of them.
pub fn summarize(xml: Option<&str>, limit: usize) -> String {
    let xml = match xml {
        Some(x) if !x.trim().is_empty() => x,
        _ => return EMPTY_SCREEN.to_string(),
    };

    let nodes = match parse_ui_nodes(xml) {
        Ok(nodes) => nodes,
        Err(_) => return PARSE_ERROR_SCREEN.to_string(),
    };

    let lines: Vec<String> = nodes
        .iter()
        .filter_map(|n| {
            n.label()
                .map(|label| format!("Element: '{}' Bounds: {}", label, n.raw_bounds))
        })
        .collect();

    let skip = lines.len().saturating_sub(limit);
    lines[skip..].join("\n")
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const SAMPLE_DUMP: &str = r#"<?xml version='1.0' encoding='UTF-8' standalone='yes' ?><hierarchy rotation="0"><node index="0" text="" resource-id="" class="android.widget.FrameLayout" content-desc="" clickable="false" bounds="[0,0][1080,2400]"><node index="0" text="Search for restaurants &amp; food" resource-id="in.swiggy.android:id/search" class="android.widget.EditText" content-desc="" clickable="true" bounds="[40,200][1040,320]" /><node index="1" text="" resource-id="" class="android.widget.ImageView" content-desc="Cart" clickable="true" bounds="[900,60][1040,180]" /><node index="2" text="Chicken McNuggets" resource-id="" class="android.widget.TextView" content-desc="" clickable="false" bounds="[40,800][700,880]" /><node index="3" text="₹ 129" resource-id="" class="android.widget.TextView" content-desc="" clickable="false" bounds="[720,800][1040,880]" /></node></hierarchy>"#;

    #[test]
    fn test_bounds_center() {
        let b = Bounds::parse("[40,200][1040,320]").unwrap();
        assert_eq!(b.center(), (540, 260));
        assert!(Bounds::parse("garbage").is_none());
    }

    #[test]
    fn test_bounds_center_extreme_values() {
        let bounds = Bounds::parse("[2147483600,-2147483600][2147483647,2147483647]").unwrap();
        assert_eq!(bounds.center(), (2147483623, 23));
        assert_eq!(Bounds::parse("[0,0][99999999999,10]"), None);
    }

    #[test]
    fn test_parse_nodes_unescapes_attributes() {
        let nodes = parse_ui_nodes(SAMPLE_DUMP).unwrap();
        assert_eq!(nodes.len(), 5);
        assert_eq!(nodes[1].text, "Search for restaurants & food");
        assert!(nodes[1].clickable);
        assert_eq!(nodes[2].label(), Some("Cart"));
        assert_eq!(nodes[0].label(), None);
    }

    #[test]
    fn test_parse_rejects_banner() {
        let err = parse_ui_nodes("UI hierchary dumped to: /sdcard/window_dump.xml").unwrap_err();
        assert!(matches!(err, AdbError::InvalidDump(_)));
    }

    #[test]
    fn test_find_by_text_is_case_insensitive() {
        let nodes = parse_ui_nodes(SAMPLE_DUMP).unwrap();
        let node = find_element_by_text(&nodes, "mcnuggets").unwrap();
        assert_eq!(node.bounds.unwrap().center(), (370, 840));

        // content-desc is searched too
        assert!(find_element_by_text(&nodes, "cart").is_some());
        assert!(find_element_by_text(&nodes, "pizza").is_none());
    }

    #[test]
    fn test_find_by_pattern() {
        let nodes = parse_ui_nodes(SAMPLE_DUMP).unwrap();
        let node = find_element_by_pattern(&nodes, r"₹\s*\d+").unwrap().unwrap();
        assert_eq!(node.text, "₹ 129");
        assert!(find_element_by_pattern(&nodes, "(").is_err());
    }

    #[test]
    fn test_locate_text() {
        assert_eq!(locate_text(SAMPLE_DUMP, "Cart", false), Some((970, 120)));
        assert_eq!(locate_text("not xml", "Cart", false), None);
    }

    #[test]
    fn test_summarize_lists_labelled_elements() {
        let summary = summarize(Some(SAMPLE_DUMP), DEFAULT_SUMMARY_LIMIT);
        let lines: Vec<&str> = summary.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[1], "Element: 'Cart' Bounds: [900,60][1040,180]");
    }

    #[test]
    fn test_summarize_keeps_last_elements() {
        let summary = summarize(Some(SAMPLE_DUMP), 2);
        assert_eq!(
            summary,
            "Element: 'Chicken McNuggets' Bounds: [40,800][700,880]\nElement: '₹ 129' Bounds: [720,800][1040,880]"
        );
    }

    #[test]
    fn test_summarize_fallbacks() {
        assert_eq!(summarize(None, 10), EMPTY_SCREEN);
        assert_eq!(summarize(Some("   "), 10), EMPTY_SCREEN);
        assert_eq!(summarize(Some("ERROR: null root node"), 10), PARSE_ERROR_SCREEN);
    }
}
