//! Shared types for post drafts and button layouts.

use serde::{Deserialize, Serialize};

/// One inline button attached to a post draft.
///
/// `row` and `column` are only meaningful for [`ButtonLayout::Custom`]; the
/// other layouts ignore them and use input order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostButton {
    pub text: String,
    pub url: String,
    #[serde(default)]
    pub row: i32,
    #[serde(default)]
    pub column: i32,
}

impl PostButton {
    pub fn new(text: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            url: url.into(),
            row: 0,
            column: 0,
        }
    }
}

/// Strategy for arranging post buttons into keyboard rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, strum::Display, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ButtonLayout {
    /// One button per row, in input order
    #[default]
    SingleColumn,
    /// Consecutive pairs per row; a trailing odd button gets its own row
    TwoColumns,
    /// Consecutive triples per row; the remainder gets its own row
    ThreeColumns,
    /// All buttons in a single row
    AllInOneRow,
    /// Grouped by explicit `row`, ordered by explicit `column`
    Custom,
}

impl ButtonLayout {
    /// Human-readable layout name shown in menus.
    pub fn title(self) -> &'static str {
        match self {
            ButtonLayout::SingleColumn => "Каждая на своей строке",
            ButtonLayout::TwoColumns => "По две в строке",
            ButtonLayout::ThreeColumns => "По три в строке",
            ButtonLayout::AllInOneRow => "Все в одной строке",
            ButtonLayout::Custom => "Произвольная раскладка",
        }
    }
}

/// Draft of a channel post, kept in the `creating_post` session payload
/// while the user walks through the flow.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PostDraft {
    pub text: String,
    #[serde(default)]
    pub buttons: Vec<PostButton>,
    #[serde(default)]
    pub layout: ButtonLayout,
}

impl PostDraft {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            buttons: Vec::new(),
            layout: ButtonLayout::default(),
        }
    }
}
