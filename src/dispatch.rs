//! # Task Dispatch Table
//!
//! Maps menu selections to what the conversation does next. Localized
//! button text is resolved to a [`Choice`] once, at the message boundary;
//! the table itself is keyed by `(WaitState, Choice)` and does no I/O.

use crate::dialogue::WaitState;
use crate::localization::t_lang;
use crate::tasks::{CropMethod, Packaging, Rotation, ScaleMethod};

/// Number of buttons per keyboard row
pub const KEYBOARD_ROW_SIZE: usize = 3;

/// A menu button, independent of language
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Choice {
    Crop,
    Decrypt,
    Encrypt,
    ExtractImages,
    Preview,
    Rename,
    Rotate,
    Scale,
    Split,
    ToImages,
    Beautify,
    Convert,
    Rotate90,
    Rotate180,
    Rotate270,
    ScaleByPercent,
    ScaleToDimensions,
    CropByPercent,
    CropByMargin,
    Photos,
    Zipped,
    Back,
    Cancel,
}

impl Choice {
    pub const ALL: [Choice; 23] = [
        Choice::Crop,
        Choice::Decrypt,
        Choice::Encrypt,
        Choice::ExtractImages,
        Choice::Preview,
        Choice::Rename,
        Choice::Rotate,
        Choice::Scale,
        Choice::Split,
        Choice::ToImages,
        Choice::Beautify,
        Choice::Convert,
        Choice::Rotate90,
        Choice::Rotate180,
        Choice::Rotate270,
        Choice::ScaleByPercent,
        Choice::ScaleToDimensions,
        Choice::CropByPercent,
        Choice::CropByMargin,
        Choice::Photos,
        Choice::Zipped,
        Choice::Back,
        Choice::Cancel,
    ];

    /// Localization key of the button label
    pub fn label_key(self) -> &'static str {
        match self {
            Choice::Crop => "label-crop",
            Choice::Decrypt => "label-decrypt",
            Choice::Encrypt => "label-encrypt",
            Choice::ExtractImages => "label-extract-images",
            Choice::Preview => "label-preview",
            Choice::Rename => "label-rename",
            Choice::Rotate => "label-rotate",
            Choice::Scale => "label-scale",
            Choice::Split => "label-split",
            Choice::ToImages => "label-to-images",
            Choice::Beautify => "label-beautify",
            Choice::Convert => "label-convert",
            Choice::Rotate90 => "label-rotate-90",
            Choice::Rotate180 => "label-rotate-180",
            Choice::Rotate270 => "label-rotate-270",
            Choice::ScaleByPercent => "label-scale-by-percent",
            Choice::ScaleToDimensions => "label-scale-to-dimensions",
            Choice::CropByPercent => "label-crop-by-percent",
            Choice::CropByMargin => "label-crop-by-margin",
            Choice::Photos => "label-photos",
            Choice::Zipped => "label-zipped",
            Choice::Back => "label-back",
            Choice::Cancel => "label-cancel",
        }
    }
}

/// The buttons a menu state offers
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MenuSpec {
    pub options: &'static [Choice],
    /// Always shown alone on the last row
    pub control: Choice,
}

const DOC_TASKS: &[Choice] = &[
    Choice::Crop,
    Choice::Decrypt,
    Choice::Encrypt,
    Choice::ExtractImages,
    Choice::Preview,
    Choice::Rename,
    Choice::Rotate,
    Choice::Scale,
    Choice::Split,
    Choice::ToImages,
];
const PHOTO_TASKS: &[Choice] = &[Choice::Beautify, Choice::Convert];
const ROTATIONS: &[Choice] = &[Choice::Rotate90, Choice::Rotate180, Choice::Rotate270];
const SCALE_METHODS: &[Choice] = &[Choice::ScaleByPercent, Choice::ScaleToDimensions];
const CROP_METHODS: &[Choice] = &[Choice::CropByPercent, Choice::CropByMargin];
const PACKAGINGS: &[Choice] = &[Choice::Photos, Choice::Zipped];

/// Menu shown in `state`, `None` for states that expect free input
pub fn menu_for(state: WaitState) -> Option<MenuSpec> {
    let (options, control) = match state {
        WaitState::WaitDocTask => (DOC_TASKS, Choice::Cancel),
        WaitState::WaitPhotoTask => (PHOTO_TASKS, Choice::Cancel),
        WaitState::WaitRotateDegree => (ROTATIONS, Choice::Back),
        WaitState::WaitScaleType => (SCALE_METHODS, Choice::Back),
        WaitState::WaitCropType => (CROP_METHODS, Choice::Back),
        WaitState::WaitExtractPhotoType | WaitState::WaitToPhotoType => {
            (PACKAGINGS, Choice::Back)
        }
        _ => return None,
    };
    Some(MenuSpec { options, control })
}

/// What a menu selection leads to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Route {
    /// Move to another state and show its prompt
    Enter(WaitState),
    /// Record the scale method, then ask for values
    ChooseScale(ScaleMethod),
    /// Record the crop method, then ask for a value
    ChooseCrop(CropMethod),
    Rotate(Rotation),
    ExtractImages(Packaging),
    ToImages(Packaging),
    Preview,
    BeautifyPhotos,
    ConvertPhotos,
    /// Return to the document task menu
    Back,
    Cancel,
    /// Selection not valid here: show the current menu again
    Redisplay,
}

/// The dispatch table. Any combination not listed redisplays the menu.
pub fn route(state: WaitState, choice: Option<Choice>) -> Route {
    let Some(choice) = choice else {
        return Route::Redisplay;
    };

    match (state, choice) {
        (WaitState::WaitDocTask, Choice::Crop) => Route::Enter(WaitState::WaitCropType),
        (WaitState::WaitDocTask, Choice::Decrypt) => Route::Enter(WaitState::WaitDecryptPassword),
        (WaitState::WaitDocTask, Choice::Encrypt) => Route::Enter(WaitState::WaitEncryptPassword),
        (WaitState::WaitDocTask, Choice::ExtractImages) => {
            Route::Enter(WaitState::WaitExtractPhotoType)
        }
        (WaitState::WaitDocTask, Choice::ToImages) => Route::Enter(WaitState::WaitToPhotoType),
        (WaitState::WaitDocTask, Choice::Preview) => Route::Preview,
        (WaitState::WaitDocTask, Choice::Rename) => Route::Enter(WaitState::WaitFileName),
        (WaitState::WaitDocTask, Choice::Rotate) => Route::Enter(WaitState::WaitRotateDegree),
        (WaitState::WaitDocTask, Choice::Scale) => Route::Enter(WaitState::WaitScaleType),
        (WaitState::WaitDocTask, Choice::Split) => Route::Enter(WaitState::WaitSplitRange),

        (WaitState::WaitPhotoTask, Choice::Beautify) => Route::BeautifyPhotos,
        (WaitState::WaitPhotoTask, Choice::Convert) => Route::ConvertPhotos,

        (WaitState::WaitRotateDegree, Choice::Rotate90) => Route::Rotate(Rotation::Clockwise90),
        (WaitState::WaitRotateDegree, Choice::Rotate180) => Route::Rotate(Rotation::Clockwise180),
        (WaitState::WaitRotateDegree, Choice::Rotate270) => Route::Rotate(Rotation::Clockwise270),

        (WaitState::WaitScaleType, Choice::ScaleByPercent) => {
            Route::ChooseScale(ScaleMethod::ByPercent)
        }
        (WaitState::WaitScaleType, Choice::ScaleToDimensions) => {
            Route::ChooseScale(ScaleMethod::ToDimensions)
        }

        (WaitState::WaitCropType, Choice::CropByPercent) => Route::ChooseCrop(CropMethod::ByPercent),
        (WaitState::WaitCropType, Choice::CropByMargin) => Route::ChooseCrop(CropMethod::ByMargin),

        (WaitState::WaitExtractPhotoType, Choice::Photos) => {
            Route::ExtractImages(Packaging::Photos)
        }
        (WaitState::WaitExtractPhotoType, Choice::Zipped) => {
            Route::ExtractImages(Packaging::Zipped)
        }
        (WaitState::WaitToPhotoType, Choice::Photos) => Route::ToImages(Packaging::Photos),
        (WaitState::WaitToPhotoType, Choice::Zipped) => Route::ToImages(Packaging::Zipped),

        (state, Choice::Back) if menu_for(state).map(|m| m.control) == Some(Choice::Back) => {
            Route::Back
        }
        (state, Choice::Cancel) if menu_for(state).is_some() => Route::Cancel,

        _ => Route::Redisplay,
    }
}

/// Resolve message text to a button, in the user's language first, then English
pub fn resolve_choice(text: &str, language_code: Option<&str>) -> Option<Choice> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    Choice::ALL
        .iter()
        .find(|choice| t_lang(choice.label_key(), language_code) == text)
        .or_else(|| {
            Choice::ALL
                .iter()
                .find(|choice| t_lang(choice.label_key(), Some("en")) == text)
        })
        .copied()
}

/// Keyboard rows for a menu: localized option labels sorted
/// lexicographically in rows of [`KEYBOARD_ROW_SIZE`], control row last
pub fn menu_rows(state: WaitState, language_code: Option<&str>) -> Option<Vec<Vec<String>>> {
    let menu = menu_for(state)?;

    let mut labels: Vec<String> = menu
        .options
        .iter()
        .map(|choice| t_lang(choice.label_key(), language_code))
        .collect();
    labels.sort();

    let mut rows: Vec<Vec<String>> = labels
        .chunks(KEYBOARD_ROW_SIZE)
        .map(|row| row.to_vec())
        .collect();
    rows.push(vec![t_lang(menu.control.label_key(), language_code)]);

    Some(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_menu_option_is_routed() {
        let menu_states = [
            WaitState::WaitDocTask,
            WaitState::WaitPhotoTask,
            WaitState::WaitRotateDegree,
            WaitState::WaitScaleType,
            WaitState::WaitCropType,
            WaitState::WaitExtractPhotoType,
            WaitState::WaitToPhotoType,
        ];
        for state in menu_states {
            let menu = menu_for(state).unwrap();
            for option in menu.options {
                assert_ne!(
                    route(state, Some(*option)),
                    Route::Redisplay,
                    "{option:?} is not routed in {state:?}"
                );
            }
            assert_ne!(route(state, Some(menu.control)), Route::Redisplay);
        }
    }

    #[test]
    fn test_unlisted_combinations_redisplay() {
        assert_eq!(route(WaitState::WaitDocTask, None), Route::Redisplay);
        assert_eq!(
            route(WaitState::WaitDocTask, Some(Choice::Beautify)),
            Route::Redisplay
        );
        assert_eq!(
            route(WaitState::WaitPhotoTask, Some(Choice::Back)),
            Route::Redisplay
        );
        assert_eq!(
            route(WaitState::WaitRotateDegree, Some(Choice::Zipped)),
            Route::Redisplay
        );
    }

    #[test]
    fn test_back_and_cancel() {
        assert_eq!(route(WaitState::WaitCropType, Some(Choice::Back)), Route::Back);
        assert_eq!(route(WaitState::WaitDocTask, Some(Choice::Back)), Route::Redisplay);
        assert_eq!(route(WaitState::WaitDocTask, Some(Choice::Cancel)), Route::Cancel);
        assert_eq!(route(WaitState::WaitScaleType, Some(Choice::Cancel)), Route::Cancel);
    }

    #[test]
    fn test_same_button_different_states() {
        assert_eq!(
            route(WaitState::WaitExtractPhotoType, Some(Choice::Zipped)),
            Route::ExtractImages(Packaging::Zipped)
        );
        assert_eq!(
            route(WaitState::WaitToPhotoType, Some(Choice::Zipped)),
            Route::ToImages(Packaging::Zipped)
        );
    }

    #[test]
    fn test_no_menu_for_input_states() {
        assert!(menu_for(WaitState::Idle).is_none());
        assert!(menu_for(WaitState::WaitDecryptPassword).is_none());
        assert!(menu_for(WaitState::WaitSplitRange).is_none());
    }
}
