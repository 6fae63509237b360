//! Text input helpers.
//!
//! Plain ASCII goes through `input text`, which needs spaces encoded as `%s`
//! and shell metacharacters escaped because adb hands the line to the device
//! shell. Anything else is sent through the ADB Keyboard IME as base64.

use base64::{engine::general_purpose::STANDARD, Engine};

/// IME id of ADB Keyboard (https://github.com/senzhk/ADBKeyBoard).
pub const ADB_KEYBOARD_IME: &str = "com.android.adbkeyboard/.AdbIME";

const SHELL_SPECIAL: &[char] = &[
    '\\', '\'', '"', '(', ')', '&', '<', '>', ';', '|', '*', '~', '$', '`', '?', '!', '#', '[',
    ']', '{', '}',
];

/// Escape text for `adb shell input text`.
pub fn escape_input_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    for c in text.chars() {
        match c {
            ' ' => out.push_str("%s"),
            c if SHELL_SPECIAL.contains(&c) => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out
}

/// Whether `input text` can type this string.
pub fn is_plain_input(text: &str) -> bool {
    text.is_ascii() && !text.contains('\n')
}

/// Shell arguments that type `text` through the ADB Keyboard broadcast.
pub fn adb_keyboard_args(text: &str) -> Vec<String> {
    vec![
        "am".to_string(),
        "broadcast".to_string(),
        "-a".to_string(),
        "ADB_INPUT_B64".to_string(),
        "--es".to_string(),
        "msg".to_string(),
        STANDARD.encode(text.as_bytes()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_spaces() {
        assert_eq!(escape_input_text("chicken nuggets"), "chicken%snuggets");
    }

    #[test]
    fn test_escape_shell_specials() {
        assert_eq!(escape_input_text("Tom's (cafe) & bar"), "Tom\\'s%s\\(cafe\\)%s\\&%sbar");
    }

    #[test]
    fn test_plain_input_detection() {
        assert!(is_plain_input("McDonalds"));
        assert!(!is_plain_input("Café"));
        assert!(!is_plain_input("line one\nline two"));
    }

    #[test]
    fn test_adb_keyboard_args() {
        let args = adb_keyboard_args("नमस्ते");
        assert_eq!(args[3], "ADB_INPUT_B64");
        assert_eq!(
            STANDARD.decode(&args[6]).unwrap(),
            "नमस्ते".as_bytes().to_vec()
        );
    }
}
