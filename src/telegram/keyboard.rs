//! Arranges post buttons into inline keyboard rows.

use std::collections::BTreeMap;

use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};
use url::Url;

use crate::core::types::{ButtonLayout, PostButton, PostDraft};

/// Builds keyboard rows from an ordered button list and a layout strategy.
///
/// Empty input yields an empty row set, not an error.
pub fn build_button_rows(buttons: &[PostButton], layout: ButtonLayout) -> Vec<Vec<InlineKeyboardButton>> {
    if buttons.is_empty() {
        return Vec::new();
    }

    match layout {
        ButtonLayout::SingleColumn => buttons.iter().map(|b| vec![to_inline_button(b)]).collect(),
        ButtonLayout::TwoColumns => chunked_rows(buttons, 2),
        ButtonLayout::ThreeColumns => chunked_rows(buttons, 3),
        ButtonLayout::AllInOneRow => vec![buttons.iter().map(to_inline_button).collect()],
        ButtonLayout::Custom => custom_rows(buttons),
    }
}

/// Builds the full reply markup for a post draft.
pub fn build_post_markup(draft: &PostDraft) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(build_button_rows(&draft.buttons, draft.layout))
}

fn chunked_rows(buttons: &[PostButton], columns: usize) -> Vec<Vec<InlineKeyboardButton>> {
    buttons
        .chunks(columns)
        .map(|chunk| chunk.iter().map(to_inline_button).collect())
        .collect()
}

/// Groups by the explicit `row` attribute ascending; within a row orders by
/// the explicit `column` attribute ascending (ties keep input order). Rows
/// with no buttons simply do not appear.
fn custom_rows(buttons: &[PostButton]) -> Vec<Vec<InlineKeyboardButton>> {
    let mut grouped: BTreeMap<i32, Vec<&PostButton>> = BTreeMap::new();
    for button in buttons {
        grouped.entry(button.row).or_default().push(button);
    }

    grouped
        .into_values()
        .map(|mut row| {
            row.sort_by_key(|b| b.column);
            row.into_iter().map(to_inline_button).collect()
        })
        .collect()
}

/// Converts a draft button into a Telegram inline button.
///
/// Bare `t.me/...` targets are normalized to https first. A target that
/// still does not parse as a URL produces a callback-data button keyed on
/// the lower-cased label instead of a link button (observed legacy
/// behavior, kept as-is).
fn to_inline_button(button: &PostButton) -> InlineKeyboardButton {
    let target = if button.url.starts_with("t.me/") {
        format!("https://{}", button.url)
    } else {
        button.url.clone()
    };

    match Url::parse(&target) {
        Ok(url) => InlineKeyboardButton::url(button.text.clone(), url),
        Err(_) => InlineKeyboardButton::callback(button.text.clone(), button.text.to_lowercase()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use teloxide::types::InlineKeyboardButtonKind;

    fn buttons(n: usize) -> Vec<PostButton> {
        (0..n)
            .map(|i| PostButton::new(format!("b{i}"), format!("https://example.com/{i}")))
            .collect()
    }

    fn row_texts(rows: &[Vec<InlineKeyboardButton>]) -> Vec<Vec<String>> {
        rows.iter()
            .map(|row| row.iter().map(|b| b.text.clone()).collect())
            .collect()
    }

    #[test]
    fn empty_input_yields_no_rows() {
        for layout in [
            ButtonLayout::SingleColumn,
            ButtonLayout::TwoColumns,
            ButtonLayout::ThreeColumns,
            ButtonLayout::AllInOneRow,
            ButtonLayout::Custom,
        ] {
            assert!(build_button_rows(&[], layout).is_empty());
        }
    }

    #[test]
    fn single_column_one_button_per_row() {
        let input = buttons(4);
        let rows = build_button_rows(&input, ButtonLayout::SingleColumn);
        assert_eq!(rows.len(), 4);
        assert!(rows.iter().all(|r| r.len() == 1));
        assert_eq!(
            row_texts(&rows),
            vec![vec!["b0"], vec!["b1"], vec!["b2"], vec!["b3"]]
        );
    }

    #[test]
    fn two_columns_pairs_with_trailing_odd() {
        let input = buttons(5);
        let rows = build_button_rows(&input, ButtonLayout::TwoColumns);
        assert_eq!(rows.len(), 3); // ceil(5 / 2)
        assert_eq!(rows[0].len(), 2);
        assert_eq!(rows[1].len(), 2);
        assert_eq!(rows[2].len(), 1);
    }

    #[test]
    fn three_columns_triples_with_remainder() {
        let input = buttons(7);
        let rows = build_button_rows(&input, ButtonLayout::ThreeColumns);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].len(), 3);
        assert_eq!(rows[1].len(), 3);
        assert_eq!(rows[2].len(), 1);
    }

    #[test]
    fn all_in_one_row() {
        let input = buttons(6);
        let rows = build_button_rows(&input, ButtonLayout::AllInOneRow);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].len(), 6);
    }

    #[test]
    fn custom_groups_by_row_and_orders_by_column() {
        let mut a = PostButton::new("a", "https://example.com/a");
        a.row = 1;
        a.column = 2;
        let mut b = PostButton::new("b", "https://example.com/b");
        b.row = 0;
        b.column = 0;
        let mut c = PostButton::new("c", "https://example.com/c");
        c.row = 1;
        c.column = 1;

        let rows = build_button_rows(&[a, b, c], ButtonLayout::Custom);
        assert_eq!(row_texts(&rows), vec![vec!["b"], vec!["c", "a"]]);
    }

    #[test]
    fn custom_skips_empty_rows() {
        let mut a = PostButton::new("a", "https://example.com/a");
        a.row = 5;
        let mut b = PostButton::new("b", "https://example.com/b");
        b.row = 9;

        let rows = build_button_rows(&[a, b], ButtonLayout::Custom);
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn tme_target_becomes_https_link() {
        let rows = build_button_rows(
            &[PostButton::new("Канал", "t.me/somechannel")],
            ButtonLayout::SingleColumn,
        );
        match &rows[0][0].kind {
            InlineKeyboardButtonKind::Url(url) => assert_eq!(url.as_str(), "https://t.me/somechannel"),
            other => panic!("expected url button, got {other:?}"),
        }
    }

    #[test]
    fn invalid_url_falls_back_to_callback_button() {
        let rows = build_button_rows(&[PostButton::new("Tap Me", "not a url")], ButtonLayout::SingleColumn);
        match &rows[0][0].kind {
            InlineKeyboardButtonKind::CallbackData(data) => assert_eq!(data, "tap me"),
            other => panic!("expected callback button, got {other:?}"),
        }
    }
}
