//! Parsing of the model's one-line action replies.

use std::fmt;
use thiserror::Error;

/// Action parsing errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActionError {
    #[error("Unrecognized action: {0}")]
    Unrecognized(String),
    #[error("{0} requires a quoted argument")]
    MissingArgument(&'static str),
}

/// One step the agent can take on the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Tap the first element whose text or content-desc contains the string.
    TapText(String),
    /// Type into the focused field.
    Type(String),
    Enter,
    Home,
    Back,
    Wait,
    /// Launch an app by display name or package.
    OpenApp(String),
    /// Stop with a final answer.
    Finish(String),
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::TapText(t) => write!(f, "TAP_TEXT(\"{}\")", t),
            Action::Type(t) => write!(f, "TYPE(\"{}\")", t),
            Action::Enter => f.write_str("ENTER"),
            Action::Home => f.write_str("HOME"),
            Action::Back => f.write_str("BACK"),
            Action::Wait => f.write_str("WAIT"),
            Action::OpenApp(a) => write!(f, "OPEN_APP(\"{}\")", a),
            Action::Finish(a) => write!(f, "FINISH(\"{}\")", a),
        }
    }
}

/// Vocabulary lines shown to the model.
///
/// This is display order. [`parse_action`] checks FINISH first, then
/// TAP_TEXT, TYPE, ENTER, HOME, WAIT, BACK and OPEN_APP.
pub const ACTION_VOCABULARY: &[(&str, &str)] = &[
    ("TAP_TEXT(\"text\")", "Tap element containing text"),
    ("TYPE(\"text\")", "Type text into the focused field"),
    ("ENTER", "Press Enter/Search"),
    ("HOME", "Go Home"),
    ("BACK", "Go back one screen"),
    ("WAIT", "Wait 2 seconds"),
    ("OPEN_APP(\"name\")", "Launch an app by name or package"),
    ("FINISH(\"answer\")", "Return final answer"),
];

/// Strip backticks, whitespace and a leading `Action:` label.
pub fn clean_action_line(line: &str) -> String {
    let cleaned = line.replace('`', "");
    let cleaned = cleaned.trim();
    let cleaned = match cleaned.get(..7) {
        Some(label) if label.eq_ignore_ascii_case("action:") => cleaned[7..].trim_start(),
        _ => cleaned,
    };
    cleaned.to_string()
}

/// Parse a model reply into an [`Action`].
///
/// Keywords are searched anywhere in the line, case-sensitively, with
/// FINISH taking precedence over TAP_TEXT, TYPE, ENTER, HOME, WAIT, BACK and
/// OPEN_APP in that order.
pub fn parse_action(line: &str) -> Result<Action, ActionError> {
    let line = clean_action_line(line);

    if let Some((_, rest)) = line.split_once("FINISH") {
        return Ok(Action::Finish(finish_answer(rest)));
    }
    if line.contains("TAP_TEXT") {
        return required_argument(&line, "TAP_TEXT").map(Action::TapText);
    }
    if line.contains("TYPE") {
        return quoted_argument(&line)
            .map(Action::Type)
            .ok_or(ActionError::MissingArgument("TYPE"));
    }
    if line.contains("ENTER") {
        return Ok(Action::Enter);
    }
    if line.contains("HOME") {
        return Ok(Action::Home);
    }
    if line.contains("WAIT") {
        return Ok(Action::Wait);
    }
    if line.contains("BACK") {
        return Ok(Action::Back);
    }
    if line.contains("OPEN_APP") {
        return required_argument(&line, "OPEN_APP").map(Action::OpenApp);
    }

    Err(ActionError::Unrecognized(line))
}

fn finish_answer(rest: &str) -> String {
    rest.trim()
        .trim_matches(|c| matches!(c, '(' | ')' | '"' | '\''))
        .trim()
        .to_string()
}

fn required_argument(line: &str, keyword: &'static str) -> Result<String, ActionError> {
    match quoted_argument(line) {
        Some(arg) if !arg.trim().is_empty() => Ok(arg),
        _ => Err(ActionError::MissingArgument(keyword)),
    }
}

/// First double-quoted string, else first single-quoted one.
///
/// An unterminated quote runs to the end of the line.
fn quoted_argument(line: &str) -> Option<String> {
    ['"', '\''].iter().find_map(|&quote| {
        let (_, after) = line.split_once(quote)?;
        let arg = match after.split_once(quote) {
            Some((inner, _)) => inner,
            None => after.trim_end_matches(')'),
        };
        Some(arg.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic_actions() {
        assert_eq!(
            parse_action("TAP_TEXT(\"Search\")").unwrap(),
            Action::TapText("Search".to_string())
        );
        assert_eq!(
            parse_action("TYPE(\"chicken nuggets\")").unwrap(),
            Action::Type("chicken nuggets".to_string())
        );
        assert_eq!(parse_action("ENTER").unwrap(), Action::Enter);
        assert_eq!(parse_action("HOME").unwrap(), Action::Home);
        assert_eq!(parse_action("WAIT").unwrap(), Action::Wait);
        assert_eq!(parse_action("BACK").unwrap(), Action::Back);
        assert_eq!(
            parse_action("OPEN_APP(\"Swiggy\")").unwrap(),
            Action::OpenApp("Swiggy".to_string())
        );
    }

    #[test]
    fn test_parse_finish() {
        assert_eq!(
            parse_action("FINISH(\"₹129\")").unwrap(),
            Action::Finish("₹129".to_string())
        );
        assert_eq!(
            parse_action("FINISH({\"price\": \"129\"})").unwrap(),
            Action::Finish("{\"price\": \"129\"}".to_string())
        );
    }

    #[test]
    fn test_cleaning() {
        assert_eq!(
            parse_action("  `Action: TAP_TEXT(\"Cart\")`\n").unwrap(),
            Action::TapText("Cart".to_string())
        );
        assert_eq!(clean_action_line("action:   HOME"), "HOME");
    }

    #[test]
    fn test_keyword_priority() {
        // FINISH outranks everything else on the line.
        assert_eq!(
            parse_action("TAP_TEXT(\"Pay\") then FINISH(\"done\")").unwrap(),
            Action::Finish("done".to_string())
        );
        // Quoted keywords do not steal the match from TAP_TEXT.
        assert_eq!(
            parse_action("TAP_TEXT(\"HOME\")").unwrap(),
            Action::TapText("HOME".to_string())
        );
        // ENTER wins over HOME when both appear.
        assert_eq!(parse_action("HOME or ENTER").unwrap(), Action::Enter);
        // WAIT is checked before BACK even though BACK is listed first.
        assert_eq!(parse_action("BACK, then WAIT").unwrap(), Action::Wait);
        assert_eq!(ACTION_VOCABULARY.last().map(|(form, _)| *form), Some("FINISH(\"answer\")"));
    }

    #[test]
    fn test_single_quote_fallback() {
        assert_eq!(
            parse_action("TAP_TEXT('Add to cart')").unwrap(),
            Action::TapText("Add to cart".to_string())
        );
    }

    #[test]
    fn test_unterminated_quote() {
        assert_eq!(
            parse_action("TYPE(\"paneer").unwrap(),
            Action::Type("paneer".to_string())
        );
    }

    #[test]
    fn test_errors() {
        assert_eq!(
            parse_action("scroll down please"),
            Err(ActionError::Unrecognized("scroll down please".to_string()))
        );
        assert_eq!(
            parse_action("TAP_TEXT()"),
            Err(ActionError::MissingArgument("TAP_TEXT"))
        );
        assert_eq!(
            parse_action("TYPE"),
            Err(ActionError::MissingArgument("TYPE"))
        );
        // Case-sensitive keywords.
        assert!(parse_action("finish(\"x\")").is_err());
    }

    #[test]
    fn test_display_round_trip() {
        let action = Action::TapText("Search".to_string());
        assert_eq!(parse_action(&action.to_string()).unwrap(), action);
    }
}
