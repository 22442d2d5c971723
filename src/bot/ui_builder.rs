//! UI Builder module for creating keyboards and formatting messages

use teloxide::types::{KeyboardButton, KeyboardMarkup, KeyboardRemove, ReplyMarkup};

use crate::conversation::{Keyboard, Reply};
use crate::dispatch::{menu_rows, Choice};
use crate::localization::{t_args_lang, t_lang};

/// Reply keyboard from rows of labels
pub fn create_reply_keyboard(rows: Vec<Vec<String>>) -> KeyboardMarkup {
    let buttons: Vec<Vec<KeyboardButton>> = rows
        .into_iter()
        .map(|row| row.into_iter().map(KeyboardButton::new).collect())
        .collect();

    KeyboardMarkup::new(buttons)
        .resize_keyboard()
        .one_time_keyboard()
}

/// Keyboard with a single button
pub fn create_single_button_keyboard(choice: Choice, language_code: Option<&str>) -> KeyboardMarkup {
    create_reply_keyboard(vec![vec![t_lang(choice.label_key(), language_code)]])
}

/// Markup for a reply, `None` to leave the current keyboard in place
pub fn create_markup(keyboard: Keyboard, language_code: Option<&str>) -> Option<ReplyMarkup> {
    match keyboard {
        Keyboard::Keep => None,
        Keyboard::Remove => Some(ReplyMarkup::KeyboardRemove(KeyboardRemove::new())),
        Keyboard::Menu(state) => match menu_rows(state, language_code) {
            Some(rows) => Some(ReplyMarkup::Keyboard(create_reply_keyboard(rows))),
            None => Some(ReplyMarkup::KeyboardRemove(KeyboardRemove::new())),
        },
        Keyboard::Back => Some(ReplyMarkup::Keyboard(create_single_button_keyboard(
            Choice::Back,
            language_code,
        ))),
        Keyboard::Cancel => Some(ReplyMarkup::Keyboard(create_single_button_keyboard(
            Choice::Cancel,
            language_code,
        ))),
    }
}

/// Localized text of a reply
pub fn format_reply(reply: &Reply, language_code: Option<&str>) -> String {
    if reply.args.is_empty() {
        return t_lang(reply.key, language_code);
    }
    let args: Vec<(&str, &str)> = reply
        .args
        .iter()
        .map(|(name, value)| (*name, value.as_str()))
        .collect();
    t_args_lang(reply.key, &args, language_code)
}

/// Header followed by a numbered list of file names
pub fn format_file_list(
    header_key: &str,
    names: &[Option<String>],
    language_code: Option<&str>,
) -> String {
    let mut result = t_lang(header_key, language_code);
    result.push('\n');

    for (i, name) in names.iter().enumerate() {
        let display = match name {
            Some(name) => name.clone(),
            None => t_lang("unnamed-file", language_code),
        };
        result.push_str(&format!("\n{}. {}", i + 1, display));
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialogue::WaitState;

    #[test]
    fn test_keep_sends_no_markup() {
        assert!(create_markup(Keyboard::Keep, None).is_none());
        assert!(matches!(
            create_markup(Keyboard::Remove, None),
            Some(ReplyMarkup::KeyboardRemove(_))
        ));
    }

    #[test]
    fn test_menu_markup_has_control_row_last() {
        let Some(ReplyMarkup::Keyboard(markup)) =
            create_markup(Keyboard::Menu(WaitState::WaitRotateDegree), Some("en"))
        else {
            panic!("expected a reply keyboard");
        };
        assert_eq!(markup.keyboard.len(), 2);
        assert_eq!(markup.keyboard[0].len(), 3);
        assert_eq!(markup.keyboard[1].len(), 1);
    }

    #[test]
    fn test_file_list_is_numbered() {
        let names = vec![Some("a.jpg".to_string()), None];
        let text = format_file_list("photo-collected", &names, Some("en"));
        assert!(text.contains("1. a.jpg"));
        assert!(text.contains("\n2. "));
    }
}
