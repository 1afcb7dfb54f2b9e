use super::models::{InlineKeyboardButton, KeyboardButton, ReplyMarkup};

/// Resizable reply keyboard from rows of button labels.
pub fn reply_keyboard<R, L>(rows: R) -> ReplyMarkup
where
    R: IntoIterator,
    R::Item: IntoIterator<Item = L>,
    L: Into<String>,
{
    ReplyMarkup::Keyboard {
        keyboard: rows
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|label| KeyboardButton { text: label.into() })
                    .collect()
            })
            .collect(),
        resize_keyboard: true,
    }
}

/// Inline keyboard from rows of `(label, callback_data)` pairs.
pub fn inline_keyboard<R, L, D>(rows: R) -> ReplyMarkup
where
    R: IntoIterator,
    R::Item: IntoIterator<Item = (L, D)>,
    L: Into<String>,
    D: Into<String>,
{
    ReplyMarkup::Inline {
        inline_keyboard: rows
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|(text, data)| InlineKeyboardButton {
                        text: text.into(),
                        callback_data: data.into(),
                    })
                    .collect()
            })
            .collect(),
    }
}

pub fn remove_keyboard() -> ReplyMarkup {
    ReplyMarkup::Remove {
        remove_keyboard: true,
    }
}
