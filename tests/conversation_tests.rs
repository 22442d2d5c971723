//! # Conversation Machine Tests
//!
//! Whole-conversation properties of the transition function, checked
//! without any messaging or document backend.

use chrono::Utc;

use pdf_bot::conversation::{
    prompt_for, Command, ConversationMachine, Effect, Event, IncomingFile, Keyboard, Limits,
    TaskFailure,
};
use pdf_bot::dialogue::{Session, WaitState};
use pdf_bot::dispatch::{menu_for, Choice};
use pdf_bot::errors::PdfError;
use pdf_bot::tasks::{Crop, Packaging, Rotation, Task};

const MB: u64 = 1024 * 1024;

const ALL_STATES: [WaitState; 20] = [
    WaitState::Idle,
    WaitState::WaitDocTask,
    WaitState::WaitPhotoTask,
    WaitState::WaitDecryptPassword,
    WaitState::WaitEncryptPassword,
    WaitState::WaitRotateDegree,
    WaitState::WaitScaleType,
    WaitState::WaitScalePercent,
    WaitState::WaitScaleDimension,
    WaitState::WaitSplitRange,
    WaitState::WaitFileName,
    WaitState::WaitCropType,
    WaitState::WaitCropPercent,
    WaitState::WaitCropOffset,
    WaitState::WaitExtractPhotoType,
    WaitState::WaitToPhotoType,
    WaitState::WaitCompareFirst,
    WaitState::WaitCompareSecond,
    WaitState::WaitWatermarkSource,
    WaitState::WaitWatermarkDoc,
];

#[cfg(test)]
mod tests {
    use super::*;

    fn machine() -> ConversationMachine {
        ConversationMachine::new(Limits {
            max_download_size: 20 * MB,
            max_password_attempts: 5,
        })
    }

    fn pdf(id: &str) -> IncomingFile {
        IncomingFile {
            file_id: id.to_string(),
            file_name: Some(format!("{id}.pdf")),
            mime_type: Some("application/pdf".to_string()),
            size: MB,
        }
    }

    fn image(id: &str, size: u64) -> IncomingFile {
        IncomingFile {
            file_id: id.to_string(),
            file_name: None,
            mime_type: Some("image/jpeg".to_string()),
            size,
        }
    }

    fn choose(choice: Choice) -> Event {
        Event::Text {
            text: format!("{choice:?}"),
            choice: Some(choice),
        }
    }

    fn text(text: &str) -> Event {
        Event::Text {
            text: text.to_string(),
            choice: None,
        }
    }

    /// Apply events in order, returning the final transition's session and task
    fn walk(events: Vec<Event>) -> (Session, Option<Task>) {
        let m = machine();
        let mut session = Session::default();
        let mut task = None;
        for event in events {
            let t = m.transition(session, event, Utc::now());
            task = t.task().cloned();
            session = t.session;
        }
        (session, task)
    }

    fn in_state(state: WaitState) -> Session {
        let mut session = Session::begin(state, Utc::now());
        session.file = Some(pdf_bot::dialogue::FileRef::new("doc", Some("doc.pdf".to_string())));
        session
    }

    #[test]
    fn test_cancel_command_ends_every_state() {
        let m = machine();
        for state in ALL_STATES {
            let t = m.transition(in_state(state), Event::Command(Command::Cancel), Utc::now());
            assert!(t.session.is_idle(), "{state:?} did not end");
            assert!(t.session.is_empty(), "{state:?} kept data");
            assert!(t.task().is_none());
        }
    }

    #[test]
    fn test_menu_states_offer_their_control_button() {
        let m = machine();
        for state in ALL_STATES {
            let Some(menu) = menu_for(state) else {
                continue;
            };
            let t = m.transition(in_state(state), choose(menu.control), Utc::now());
            match menu.control {
                Choice::Cancel => assert!(t.session.is_idle(), "{state:?}"),
                Choice::Back => assert_eq!(t.session.state, WaitState::WaitDocTask, "{state:?}"),
                other => panic!("unexpected control {other:?}"),
            }
        }
    }

    #[test]
    fn test_menu_prompts_show_their_menu() {
        for state in ALL_STATES {
            let reply = prompt_for(state);
            if menu_for(state).is_some() {
                assert_eq!(reply.keyboard, Keyboard::Menu(state));
            } else {
                assert!(!matches!(reply.keyboard, Keyboard::Menu(_)), "{state:?}");
            }
        }
    }

    #[test]
    fn test_button_from_another_menu_is_ignored() {
        let m = machine();
        let t = m.transition(in_state(WaitState::WaitRotateDegree), choose(Choice::Zipped), Utc::now());
        assert_eq!(t.session.state, WaitState::WaitRotateDegree);
        assert!(t.task().is_none());
        assert_eq!(t.effects, vec![Effect::Reply(prompt_for(WaitState::WaitRotateDegree))]);
    }

    #[test]
    fn test_every_document_task_is_reachable() {
        let cases: Vec<(Vec<Event>, &str)> = vec![
            (vec![choose(Choice::Decrypt), text("pw")], "decrypt"),
            (vec![choose(Choice::Encrypt), text("pw")], "encrypt"),
            (vec![choose(Choice::Rotate), choose(Choice::Rotate270)], "rotate"),
            (vec![choose(Choice::Scale), choose(Choice::ScaleByPercent), text("50")], "scale"),
            (vec![choose(Choice::Split), text("1-3")], "split"),
            (vec![choose(Choice::Rename), text("new")], "rename"),
            (vec![choose(Choice::Crop), choose(Choice::CropByMargin), text("20")], "crop"),
            (vec![choose(Choice::Preview)], "preview"),
            (vec![choose(Choice::ExtractImages), choose(Choice::Zipped)], "extract_images"),
            (vec![choose(Choice::ToImages), choose(Choice::Photos)], "to_images"),
        ];

        for (steps, expected) in cases {
            let mut events = vec![Event::Document(pdf("doc"))];
            events.extend(steps);
            let (_, task) = walk(events);
            assert_eq!(task.map(|t| t.name()), Some(expected));
        }
    }

    #[test]
    fn test_task_parameters_are_carried() {
        let (_, task) = walk(vec![
            Event::Document(pdf("doc")),
            choose(Choice::Rotate),
            choose(Choice::Rotate180),
        ]);
        assert!(matches!(
            task,
            Some(Task::Rotate { rotation: Rotation::Clockwise180, .. })
        ));

        let (_, task) = walk(vec![
            Event::Document(pdf("doc")),
            choose(Choice::Crop),
            choose(Choice::CropByPercent),
            text("75%"),
        ]);
        assert!(matches!(task, Some(Task::Crop { crop: Crop::Percent(p), .. }) if p == 75.0));

        let (_, task) = walk(vec![
            Event::Document(pdf("doc")),
            choose(Choice::ExtractImages),
            choose(Choice::Photos),
        ]);
        assert!(matches!(
            task,
            Some(Task::ExtractImages { packaging: Packaging::Photos, .. })
        ));
    }

    #[test]
    fn test_crop_percent_above_hundred_is_rejected() {
        let (session, task) = walk(vec![
            Event::Document(pdf("doc")),
            choose(Choice::Crop),
            choose(Choice::CropByPercent),
            text("150"),
        ]);
        assert_eq!(session.state, WaitState::WaitCropPercent);
        assert!(task.is_none());
    }

    #[test]
    fn test_new_document_replaces_conversation() {
        let (session, _) = walk(vec![
            Event::Document(pdf("first")),
            choose(Choice::Split),
            Event::Document(pdf("second")),
        ]);
        assert_eq!(session.state, WaitState::WaitDocTask);
        assert_eq!(session.file.unwrap().file_id, "second");
    }

    #[test]
    fn test_photos_collect_until_a_task_is_chosen() {
        let (session, task) = walk(vec![
            Event::Photo(Some(image("p1", MB))),
            Event::Photo(Some(image("p2", MB))),
            Event::Document(image("p3", MB)),
        ]);
        assert_eq!(session.state, WaitState::WaitPhotoTask);
        assert_eq!(session.files.len(), 3);
        assert!(task.is_none());

        let (_, task) = walk(vec![
            Event::Photo(Some(image("p1", MB))),
            Event::Photo(Some(image("p2", MB))),
            choose(Choice::Beautify),
        ]);
        let Some(Task::BeautifyPhotos { photos }) = task else {
            panic!("expected beautify task");
        };
        let ids: Vec<_> = photos.iter().map(|p| p.file_id.as_str()).collect();
        assert_eq!(ids, vec!["p1", "p2"]);
    }

    #[test]
    fn test_oversized_photo_keeps_collection() {
        let (session, _) = walk(vec![
            Event::Photo(Some(image("p1", MB))),
            Event::Photo(Some(image("huge", 30 * MB))),
        ]);
        assert_eq!(session.state, WaitState::WaitPhotoTask);
        assert_eq!(session.files.len(), 1);

        let (session, _) = walk(vec![Event::Photo(Some(image("huge", 30 * MB)))]);
        assert!(session.is_idle());
        assert!(session.is_empty());
    }

    #[test]
    fn test_photo_message_without_image_ends() {
        let t = machine().transition(Session::default(), Event::Photo(None), Utc::now());
        assert!(t.session.is_idle());
        assert_eq!(
            t.effects,
            vec![Effect::Reply(pdf_bot::conversation::Reply::new(
                "error-image-not-found",
                Keyboard::Remove
            ))]
        );
    }

    #[test]
    fn test_watermark_flow() {
        let (session, task) = walk(vec![
            Event::Command(Command::Watermark),
            Event::Document(pdf("source")),
        ]);
        assert_eq!(session.state, WaitState::WaitWatermarkDoc);
        assert!(task.is_none());

        let (_, task) = walk(vec![
            Event::Command(Command::Watermark),
            Event::Document(pdf("source")),
            Event::Document(pdf("mark")),
        ]);
        assert!(matches!(
            task,
            Some(Task::Watermark { source, watermark })
                if source.file_id == "source" && watermark.file_id == "mark"
        ));
    }

    #[test]
    fn test_compare_rejects_non_pdf_and_keeps_waiting() {
        let mut other = pdf("notes");
        other.mime_type = Some("text/plain".to_string());
        let (session, task) = walk(vec![Event::Command(Command::Compare), Event::Document(other)]);
        assert_eq!(session.state, WaitState::WaitCompareFirst);
        assert!(task.is_none());
    }

    #[test]
    fn test_successful_task_ends_conversation() {
        let m = machine();
        for task in [
            Task::Preview {
                file: pdf_bot::dialogue::FileRef::new("doc", None),
            },
            Task::ConvertPhotos { photos: vec![] },
        ] {
            let t = m.transition(
                in_state(WaitState::WaitDocTask),
                Event::TaskFinished {
                    task,
                    result: Ok(()),
                },
                Utc::now(),
            );
            assert!(t.session.is_idle());
            assert!(t.session.is_empty());
            assert!(t.effects.is_empty());
        }
    }

    #[test]
    fn test_transport_failure_ends_conversation() {
        let t = machine().transition(
            in_state(WaitState::WaitSplitRange),
            Event::TaskFinished {
                task: Task::Preview {
                    file: pdf_bot::dialogue::FileRef::new("doc", None),
                },
                result: Err(TaskFailure::Transport("timeout".to_string())),
            },
            Utc::now(),
        );
        assert!(t.session.is_idle());
    }

    #[test]
    fn test_no_images_is_reported_and_ends() {
        let t = machine().transition(
            in_state(WaitState::WaitExtractPhotoType),
            Event::TaskFinished {
                task: Task::ExtractImages {
                    file: pdf_bot::dialogue::FileRef::new("doc", None),
                    packaging: Packaging::Zipped,
                },
                result: Err(TaskFailure::Pdf(PdfError::NoImages)),
            },
            Utc::now(),
        );
        assert!(t.session.is_idle());
        assert!(matches!(
            t.effects.as_slice(),
            [Effect::Reply(reply)] if reply.key == "error-no-images"
        ));
    }

    #[test]
    fn test_text_outside_conversation_gets_help_hint() {
        let t = machine().transition(Session::default(), text("hello"), Utc::now());
        assert!(t.session.is_idle());
        assert!(matches!(
            t.effects.as_slice(),
            [Effect::Reply(reply)] if reply.key == "text-response"
        ));
    }

    #[test]
    fn test_start_and_help_keep_conversation() {
        let m = machine();
        for command in [Command::Start, Command::Help] {
            let t = m.transition(in_state(WaitState::WaitSplitRange), Event::Command(command), Utc::now());
            assert_eq!(t.session.state, WaitState::WaitSplitRange);
            assert!(t.session.file.is_some());
        }
    }
}
