//! Compact callback-data tokens for inline keyboard buttons.
//!
//! A token is the command name and its positional parameters joined with
//! `_`. Command names themselves may contain the delimiter
//! (`select_channel_<id>`), so the decoder checks a known list of
//! multi-segment command names before falling back to "first segment is the
//! command".

use uuid::Uuid;

/// Callback command names used by the inline menus.
pub mod commands {
    // Main menu
    pub const NEW_POST: &str = "new_post";
    pub const MY_CHANNELS: &str = "my_channels";
    pub const CLAIM_CHANNEL: &str = "claim_channel";

    // Post creation
    pub const ADD_BUTTONS: &str = "add_buttons";
    pub const SKIP_BUTTONS: &str = "skip_buttons";
    pub const FINISH_BUTTONS: &str = "finish_buttons";
    pub const CANCEL_POST: &str = "cancel_post";

    // Button layout
    pub const LAYOUT_SINGLE: &str = "layout_single";
    pub const LAYOUT_DOUBLE: &str = "layout_double";
    pub const LAYOUT_TRIPLE: &str = "layout_triple";
    pub const LAYOUT_ONEROW: &str = "layout_onerow";
    pub const LAYOUT_CUSTOM: &str = "layout_custom";

    // Channel management
    pub const SELECT_CHANNEL: &str = "select_channel";
    pub const REMOVE_CHANNEL: &str = "remove_channel";

    // Back navigation
    pub const BACK_MENU: &str = "back_menu";
}

/// Delimiter between the command and its parameters.
const DELIMITER: char = '_';

/// Command names that contain the delimiter themselves. Checked first by the
/// decoder, longest names first, so their trailing segments are not
/// mistaken for parameters.
const MULTI_SEGMENT_COMMANDS: &[&str] = &[
    commands::SELECT_CHANNEL,
    commands::REMOVE_CHANNEL,
    commands::CLAIM_CHANNEL,
];

/// Joins a command and its parameters into a callback token.
pub fn encode(command: &str, params: &[&str]) -> String {
    let mut token = String::from(command);
    for param in params {
        token.push(DELIMITER);
        token.push_str(param);
    }
    token
}

/// A decoded callback token: the command plus positional parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackData {
    pub command: String,
    pub params: Vec<String>,
}

impl CallbackData {
    /// Splits a token into command and parameters.
    ///
    /// Known multi-segment command names win over the plain-split reading;
    /// otherwise the first `_`-separated segment is the command and the rest
    /// are parameters.
    pub fn parse(token: &str) -> Self {
        for command in MULTI_SEGMENT_COMMANDS {
            if token == *command {
                return Self {
                    command: (*command).to_string(),
                    params: Vec::new(),
                };
            }
            if let Some(rest) = token.strip_prefix(&format!("{command}{DELIMITER}")) {
                return Self {
                    command: (*command).to_string(),
                    params: rest.split(DELIMITER).map(str::to_string).collect(),
                };
            }
        }

        let mut segments = token.split(DELIMITER);
        let command = segments.next().unwrap_or_default().to_string();
        Self {
            command,
            params: segments.map(str::to_string).collect(),
        }
    }

    /// Positional parameter as a string; empty when absent.
    pub fn param(&self, index: usize) -> &str {
        self.params.get(index).map(String::as_str).unwrap_or_default()
    }

    /// Positional parameter as an integer; `0` when absent or unparsable.
    /// Callers treat zero as "absent" and re-prompt.
    pub fn int_param(&self, index: usize) -> i64 {
        self.param(index).parse().unwrap_or(0)
    }

    /// Positional parameter as a UUID; nil when absent or unparsable.
    pub fn uuid_param(&self, index: usize) -> Uuid {
        Uuid::parse_str(self.param(index)).unwrap_or(Uuid::nil())
    }

    pub fn has_param(&self, index: usize) -> bool {
        index < self.params.len()
    }
}
