//! # Conversation State Machine
//!
//! A pure transition function `(Session, Event) -> Transition`. It decides
//! which replies to send, which task to run and which wait-state comes
//! next; it never touches the network or the filesystem. Task results are
//! fed back in as [`Event::TaskFinished`].

use chrono::{DateTime, Utc};
use reqwest::Url;
use tracing::debug;

use crate::config::BotConfig;
use crate::dialogue::{
    parse_positive_number, validate_file_name, FileRef, PendingParams, Session, WaitState,
};
use crate::dispatch::{self, Choice, Route};
use crate::errors::{PdfError, Recovery, TelegramError};
use crate::page_range::PageRange;
use crate::tasks::{Crop, CropMethod, Scale, ScaleMethod, Task};

/// File metadata of an inbound document or photo
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IncomingFile {
    pub file_id: String,
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
    pub size: u64,
}

impl IncomingFile {
    pub fn is_pdf(&self) -> bool {
        self.mime_type
            .as_deref()
            .is_some_and(|mime| mime.to_lowercase().ends_with("pdf"))
    }

    pub fn is_image(&self) -> bool {
        self.mime_type
            .as_deref()
            .is_some_and(|mime| mime.to_lowercase().starts_with("image"))
    }

    fn file_ref(&self) -> FileRef {
        FileRef::new(self.file_id.clone(), self.file_name.clone())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    Cancel,
    Compare,
    Watermark,
}

impl Command {
    pub fn parse(text: &str) -> Option<Self> {
        let command = text.trim().split_whitespace().next()?;
        // `/cancel@my_bot` in group chats
        let command = command.split('@').next().unwrap_or(command);
        match command {
            "/start" => Some(Command::Start),
            "/help" => Some(Command::Help),
            "/cancel" => Some(Command::Cancel),
            "/compare" => Some(Command::Compare),
            "/watermark" => Some(Command::Watermark),
            _ => None,
        }
    }
}

/// Why a task did not produce its result
#[derive(Debug)]
pub enum TaskFailure {
    Pdf(PdfError),
    /// Download or upload against the platform failed
    Transport(String),
}

/// Inbound events driving the machine
#[derive(Debug)]
pub enum Event {
    Document(IncomingFile),
    /// Largest photo size of a photo message, `None` if it carried none
    Photo(Option<IncomingFile>),
    /// Free text, with the menu button it matches in the user's language
    Text { text: String, choice: Option<Choice> },
    Command(Command),
    TaskFinished {
        task: Task,
        result: Result<(), TaskFailure>,
    },
    /// A reply of the previous transition could not be sent
    SendFailed,
}

/// Reply keyboard attached to a text reply
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Keyboard {
    /// Leave whatever keyboard the user has
    Keep,
    Remove,
    /// Menu of the given state
    Menu(WaitState),
    /// A single Back button
    Back,
    /// A single Cancel button
    Cancel,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reply {
    /// Localization key
    pub key: &'static str,
    pub args: Vec<(&'static str, String)>,
    pub keyboard: Keyboard,
}

impl Reply {
    pub fn new(key: &'static str, keyboard: Keyboard) -> Self {
        Self {
            key,
            args: Vec::new(),
            keyboard,
        }
    }

    pub fn with_arg(mut self, name: &'static str, value: impl ToString) -> Self {
        self.args.push((name, value.to_string()));
        self
    }
}

/// Side effects requested by a transition, executed in order
#[derive(Clone, Debug, PartialEq)]
pub enum Effect {
    Reply(Reply),
    /// Numbered list of file names under a localized header
    ListFiles {
        header_key: &'static str,
        names: Vec<Option<String>>,
    },
    Run(Task),
    /// Convert a web page, outside of any conversation
    ConvertUrl(String),
}

#[derive(Debug)]
pub struct Transition {
    pub session: Session,
    pub effects: Vec<Effect>,
}

impl Transition {
    fn stay(session: Session, effects: Vec<Effect>) -> Self {
        Self { session, effects }
    }

    fn end(effects: Vec<Effect>) -> Self {
        Self {
            session: Session::default(),
            effects,
        }
    }

    fn reply(session: Session, reply: Reply) -> Self {
        Self::stay(session, vec![Effect::Reply(reply)])
    }

    /// The task to run, if any
    pub fn task(&self) -> Option<&Task> {
        self.effects.iter().find_map(|effect| match effect {
            Effect::Run(task) => Some(task),
            _ => None,
        })
    }
}

/// Limits the machine enforces
#[derive(Clone, Debug)]
pub struct Limits {
    pub max_download_size: u64,
    pub max_password_attempts: u32,
}

impl From<&BotConfig> for Limits {
    fn from(config: &BotConfig) -> Self {
        Self {
            max_download_size: config.max_download_size,
            max_password_attempts: config.max_password_attempts,
        }
    }
}

/// Prompt shown when a conversation enters `state`
pub fn prompt_for(state: WaitState) -> Reply {
    let (key, keyboard) = match state {
        WaitState::Idle => ("cancelled", Keyboard::Remove),
        WaitState::WaitDocTask => ("doc-task-prompt", Keyboard::Menu(state)),
        WaitState::WaitPhotoTask => ("photo-task-prompt", Keyboard::Menu(state)),
        WaitState::WaitRotateDegree => ("rotate-prompt", Keyboard::Menu(state)),
        WaitState::WaitScaleType => ("scale-type-prompt", Keyboard::Menu(state)),
        WaitState::WaitCropType => ("crop-type-prompt", Keyboard::Menu(state)),
        WaitState::WaitExtractPhotoType | WaitState::WaitToPhotoType => {
            ("photo-type-prompt", Keyboard::Menu(state))
        }
        WaitState::WaitDecryptPassword => ("decrypt-prompt", Keyboard::Remove),
        WaitState::WaitEncryptPassword => ("encrypt-prompt", Keyboard::Remove),
        WaitState::WaitFileName => ("rename-prompt", Keyboard::Remove),
        WaitState::WaitSplitRange => ("split-prompt", Keyboard::Back),
        WaitState::WaitScalePercent => ("scale-percent-prompt", Keyboard::Back),
        WaitState::WaitScaleDimension => ("scale-width-prompt", Keyboard::Back),
        WaitState::WaitCropPercent => ("crop-percent-prompt", Keyboard::Back),
        WaitState::WaitCropOffset => ("crop-offset-prompt", Keyboard::Back),
        WaitState::WaitCompareFirst => ("compare-first-prompt", Keyboard::Cancel),
        WaitState::WaitCompareSecond => ("compare-second-prompt", Keyboard::Cancel),
        WaitState::WaitWatermarkSource => ("watermark-source-prompt", Keyboard::Cancel),
        WaitState::WaitWatermarkDoc => ("watermark-doc-prompt", Keyboard::Cancel),
    };
    Reply::new(key, keyboard)
}

/// The conversation state machine
#[derive(Clone, Debug)]
pub struct ConversationMachine {
    limits: Limits,
}

impl ConversationMachine {
    pub fn new(limits: Limits) -> Self {
        Self { limits }
    }

    /// Apply one event to a session
    pub fn transition(&self, session: Session, event: Event, now: DateTime<Utc>) -> Transition {
        let from = session.state;
        let transition = match event {
            Event::Command(command) => self.on_command(session, command, now),
            Event::Document(file) => self.on_document(session, file, now),
            Event::Photo(photo) => self.on_photo(session, photo, now),
            Event::Text { text, choice } => self.on_text(session, text, choice),
            Event::TaskFinished { task, result } => self.on_task_finished(session, task, result),
            Event::SendFailed => transport_failure(),
        };
        debug!(from = ?from, to = ?transition.session.state, effects = transition.effects.len(), "Conversation transition");
        transition
    }

    fn on_command(&self, session: Session, command: Command, now: DateTime<Utc>) -> Transition {
        match command {
            Command::Start => Transition::reply(session, Reply::new("welcome", Keyboard::Keep)),
            Command::Help => Transition::reply(session, Reply::new("help", Keyboard::Keep)),
            Command::Cancel => cancel(),
            Command::Compare => enter_fresh(WaitState::WaitCompareFirst, now),
            Command::Watermark => enter_fresh(WaitState::WaitWatermarkSource, now),
        }
    }

    fn on_document(&self, session: Session, file: IncomingFile, now: DateTime<Utc>) -> Transition {
        if session.state.awaits_document() {
            return self.on_awaited_document(session, file);
        }

        if file.is_image() {
            return self.on_image(session, Some(file), now);
        }

        if !file.is_pdf() {
            let err = TelegramError::MimeType(file.mime_type.clone().unwrap_or_default());
            return Transition::end(vec![error_reply(&err)]);
        }

        if let Err(err) = self.check_size(&file) {
            return Transition::end(vec![error_reply(&err)]);
        }

        let mut session = Session::begin(WaitState::WaitDocTask, now);
        session.file = Some(file.file_ref());
        Transition::stay(session, vec![Effect::Reply(prompt_for(WaitState::WaitDocTask))])
    }

    fn on_photo(
        &self,
        session: Session,
        photo: Option<IncomingFile>,
        now: DateTime<Utc>,
    ) -> Transition {
        if session.state.awaits_document() {
            return Transition::stay(
                session,
                vec![Effect::Reply(Reply::new("error-expected-pdf", Keyboard::Cancel))],
            );
        }
        self.on_image(session, photo, now)
    }

    /// Photo or image document: start a collection or add to it
    fn on_image(
        &self,
        session: Session,
        image: Option<IncomingFile>,
        now: DateTime<Utc>,
    ) -> Transition {
        let collecting = session.state == WaitState::WaitPhotoTask && !session.files.is_empty();

        let checked = image
            .ok_or(TelegramError::ImageNotFound)
            .and_then(|image| self.check_size(&image).map(|_| image));

        let image = match checked {
            Ok(image) => image,
            Err(err) if collecting => {
                let names = file_names(&session.files);
                return Transition::stay(
                    session,
                    vec![
                        error_reply(&err),
                        Effect::Reply(prompt_for(WaitState::WaitPhotoTask)),
                        Effect::ListFiles {
                            header_key: "photo-collected",
                            names,
                        },
                    ],
                );
            }
            Err(err) => return Transition::end(vec![error_reply(&err)]),
        };

        let mut session = if collecting {
            session
        } else {
            Session::begin(WaitState::WaitPhotoTask, now)
        };
        session.files.push(image.file_ref());

        let names = file_names(&session.files);
        Transition::stay(
            session,
            vec![
                Effect::Reply(prompt_for(WaitState::WaitPhotoTask)),
                Effect::ListFiles {
                    header_key: "photo-collected",
                    names,
                },
            ],
        )
    }

    /// Documents requested by compare and watermark
    fn on_awaited_document(&self, mut session: Session, file: IncomingFile) -> Transition {
        let state = session.state;
        if !file.is_pdf() {
            return Transition::reply(session, Reply::new("error-expected-pdf", Keyboard::Cancel));
        }
        if let Err(err) = self.check_size(&file) {
            return Transition::stay(session, vec![error_reply(&err), Effect::Reply(prompt_for(state))]);
        }

        match state {
            WaitState::WaitCompareFirst | WaitState::WaitWatermarkSource => {
                let next = if state == WaitState::WaitCompareFirst {
                    WaitState::WaitCompareSecond
                } else {
                    WaitState::WaitWatermarkDoc
                };
                session.files = vec![file.file_ref()];
                session.state = next;
                Transition::stay(session, vec![Effect::Reply(prompt_for(next))])
            }
            WaitState::WaitCompareSecond | WaitState::WaitWatermarkDoc => {
                let Some(first) = session.files.first().cloned() else {
                    return expired();
                };
                let second = file.file_ref();
                let task = if state == WaitState::WaitCompareSecond {
                    Task::Compare { first, second }
                } else {
                    Task::Watermark {
                        source: first,
                        watermark: second,
                    }
                };
                run(session, task)
            }
            _ => expired(),
        }
    }

    fn on_text(&self, session: Session, text: String, choice: Option<Choice>) -> Transition {
        let state = session.state;

        if state == WaitState::Idle {
            return on_idle_text(session, &text);
        }

        if dispatch::menu_for(state).is_some() {
            return self.on_menu_selection(session, dispatch::route(state, choice));
        }

        // Password and file name states take the raw text, so a button
        // label is only a control word in the remaining input states
        let raw_input = matches!(
            state,
            WaitState::WaitDecryptPassword | WaitState::WaitEncryptPassword | WaitState::WaitFileName
        );
        if !raw_input {
            match choice {
                Some(Choice::Cancel) => return cancel(),
                Some(Choice::Back) if !state.awaits_document() => return back_to_doc_menu(session),
                _ => {}
            }
        }

        if state.awaits_document() {
            return Transition::reply(session, prompt_for(state));
        }

        let Some(file) = session.file.clone() else {
            return expired();
        };

        match state {
            WaitState::WaitDecryptPassword => run(
                session,
                Task::Decrypt {
                    file,
                    password: text,
                },
            ),
            WaitState::WaitEncryptPassword => run(
                session,
                Task::Encrypt {
                    file,
                    password: text,
                },
            ),
            WaitState::WaitFileName => match validate_file_name(&text) {
                Ok(new_name) => run(session, Task::Rename { file, new_name }),
                Err(reason) => Transition::reply(
                    session,
                    Reply::new("rename-invalid-name", Keyboard::Remove).with_arg("reason", reason),
                ),
            },
            WaitState::WaitSplitRange => match PageRange::parse(&text) {
                Some(range) => run(session, Task::Split { file, range }),
                None => Transition::reply(session, Reply::new("split-invalid-range", Keyboard::Back)),
            },
            WaitState::WaitScalePercent => match parse_positive_number(&text) {
                Some(percent) => run(
                    session,
                    Task::Scale {
                        file,
                        scale: Scale::ByPercent(percent),
                    },
                ),
                None => invalid_number(session),
            },
            WaitState::WaitScaleDimension => self.on_dimension(session, file, &text),
            WaitState::WaitCropPercent => match parse_positive_number(&text) {
                Some(percent) if percent <= 100.0 => run(
                    session,
                    Task::Crop {
                        file,
                        crop: Crop::Percent(percent),
                    },
                ),
                _ => Transition::reply(session, Reply::new("crop-invalid-percent", Keyboard::Back)),
            },
            WaitState::WaitCropOffset => match parse_positive_number(&text) {
                Some(margin) => run(
                    session,
                    Task::Crop {
                        file,
                        crop: Crop::Margin(margin),
                    },
                ),
                None => invalid_number(session),
            },
            _ => Transition::reply(session, prompt_for(state)),
        }
    }

    /// Width first, then height
    fn on_dimension(&self, mut session: Session, file: FileRef, text: &str) -> Transition {
        let Some(value) = parse_positive_number(text) else {
            return invalid_number(session);
        };

        match session.params.width {
            None => {
                session.params.width = Some(value);
                Transition::reply(session, Reply::new("scale-height-prompt", Keyboard::Back))
            }
            Some(width) => run(
                session,
                Task::Scale {
                    file,
                    scale: Scale::ToDimensions {
                        width,
                        height: value,
                    },
                },
            ),
        }
    }

    fn on_menu_selection(&self, mut session: Session, route: Route) -> Transition {
        let state = session.state;

        match route {
            Route::Redisplay => return Transition::reply(session, prompt_for(state)),
            Route::Cancel => return cancel(),
            _ => {}
        }

        if matches!(route, Route::BeautifyPhotos | Route::ConvertPhotos) {
            if session.files.is_empty() {
                return expired();
            }
            let photos = session.files.clone();
            let task = if route == Route::BeautifyPhotos {
                Task::BeautifyPhotos { photos }
            } else {
                Task::ConvertPhotos { photos }
            };
            return run(session, task);
        }

        let Some(file) = session.file.clone() else {
            return expired();
        };

        match route {
            Route::Back => back_to_doc_menu(session),
            Route::Enter(next) => {
                session.params = PendingParams::default();
                session.state = next;
                Transition::stay(session, vec![Effect::Reply(prompt_for(next))])
            }
            Route::ChooseScale(method) => {
                let next = match method {
                    ScaleMethod::ByPercent => WaitState::WaitScalePercent,
                    ScaleMethod::ToDimensions => WaitState::WaitScaleDimension,
                };
                session.params = PendingParams {
                    scale_method: Some(method),
                    ..PendingParams::default()
                };
                session.state = next;
                Transition::stay(session, vec![Effect::Reply(prompt_for(next))])
            }
            Route::ChooseCrop(method) => {
                let next = match method {
                    CropMethod::ByPercent => WaitState::WaitCropPercent,
                    CropMethod::ByMargin => WaitState::WaitCropOffset,
                };
                session.params = PendingParams {
                    crop_method: Some(method),
                    ..PendingParams::default()
                };
                session.state = next;
                Transition::stay(session, vec![Effect::Reply(prompt_for(next))])
            }
            Route::Rotate(rotation) => run(session, Task::Rotate { file, rotation }),
            Route::Preview => run(session, Task::Preview { file }),
            Route::ExtractImages(packaging) => run(session, Task::ExtractImages { file, packaging }),
            Route::ToImages(packaging) => run(session, Task::ToImages { file, packaging }),
            Route::BeautifyPhotos | Route::ConvertPhotos | Route::Cancel | Route::Redisplay => {
                Transition::reply(session, prompt_for(state))
            }
        }
    }

    fn on_task_finished(
        &self,
        mut session: Session,
        task: Task,
        result: Result<(), TaskFailure>,
    ) -> Transition {
        let err = match result {
            Ok(()) => return Transition::end(vec![]),
            Err(TaskFailure::Transport(_)) => return transport_failure(),
            Err(TaskFailure::Pdf(err)) => err,
        };

        if let (PdfError::WrongPassword, Task::Decrypt { .. }) = (&err, &task) {
            session.params.password_attempts += 1;
            if session.params.password_attempts >= self.limits.max_password_attempts {
                return Transition::end(vec![Effect::Reply(
                    Reply::new("decrypt-too-many-attempts", Keyboard::Remove)
                        .with_arg("attempts", session.params.password_attempts),
                )]);
            }
            return Transition::reply(session, Reply::new(err.message_key(), Keyboard::Remove));
        }

        let mut reply = Reply::new(err.message_key(), Keyboard::Remove);
        if let PdfError::PageRangeOutOfBounds { page_count } = &err {
            reply = Reply::new(err.message_key(), Keyboard::Back).with_arg("pages", page_count);
        }

        match err.recovery() {
            Recovery::Reprompt => Transition::reply(session, reply),
            Recovery::End => Transition::end(vec![Effect::Reply(reply)]),
        }
    }

    fn check_size(&self, file: &IncomingFile) -> Result<(), TelegramError> {
        if file.size >= self.limits.max_download_size {
            return Err(TelegramError::FileTooLarge {
                size: file.size,
                limit: self.limits.max_download_size,
            });
        }
        Ok(())
    }
}

fn on_idle_text(session: Session, text: &str) -> Transition {
    match parse_web_url(text) {
        Some(url) => Transition::stay(session, vec![Effect::ConvertUrl(url)]),
        None => Transition::reply(session, Reply::new("text-response", Keyboard::Remove)),
    }
}

/// An http(s) URL with a host, as typed by the user
pub fn parse_web_url(text: &str) -> Option<String> {
    let url = Url::parse(text.trim()).ok()?;
    if matches!(url.scheme(), "http" | "https") && url.host_str().is_some() {
        Some(url.to_string())
    } else {
        None
    }
}

fn run(session: Session, task: Task) -> Transition {
    let progress = Reply::new(task.progress_key(), Keyboard::Remove);
    Transition::stay(session, vec![Effect::Reply(progress), Effect::Run(task)])
}

fn enter_fresh(state: WaitState, now: DateTime<Utc>) -> Transition {
    Transition::stay(
        Session::begin(state, now),
        vec![Effect::Reply(prompt_for(state))],
    )
}

fn back_to_doc_menu(mut session: Session) -> Transition {
    if session.file.is_none() {
        return expired();
    }
    session.params = PendingParams::default();
    session.state = WaitState::WaitDocTask;
    Transition::stay(session, vec![Effect::Reply(prompt_for(WaitState::WaitDocTask))])
}

fn cancel() -> Transition {
    Transition::end(vec![Effect::Reply(Reply::new("cancelled", Keyboard::Remove))])
}

fn transport_failure() -> Transition {
    Transition::end(vec![Effect::Reply(Reply::new(
        "error-transport",
        Keyboard::Remove,
    ))])
}

fn expired() -> Transition {
    Transition::end(vec![Effect::Reply(Reply::new(
        "error-session-expired",
        Keyboard::Remove,
    ))])
}

fn invalid_number(session: Session) -> Transition {
    Transition::reply(session, Reply::new("error-invalid-number", Keyboard::Back))
}

fn error_reply(err: &TelegramError) -> Effect {
    Effect::Reply(Reply::new(err.message_key(), Keyboard::Remove))
}

fn file_names(files: &[FileRef]) -> Vec<Option<String>> {
    files.iter().map(|file| file.file_name.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MB: u64 = 1024 * 1024;

    fn machine() -> ConversationMachine {
        ConversationMachine::new(Limits {
            max_download_size: 20 * MB,
            max_password_attempts: 3,
        })
    }

    fn pdf(size: u64) -> IncomingFile {
        IncomingFile {
            file_id: "pdf-id".to_string(),
            file_name: Some("report.pdf".to_string()),
            mime_type: Some("application/pdf".to_string()),
            size,
        }
    }

    fn text(text: &str, choice: Option<Choice>) -> Event {
        Event::Text {
            text: text.to_string(),
            choice,
        }
    }

    fn doc_session() -> Session {
        machine()
            .transition(Session::default(), Event::Document(pdf(MB)), Utc::now())
            .session
    }

    #[test]
    fn test_command_parsing() {
        assert_eq!(Command::parse("/cancel"), Some(Command::Cancel));
        assert_eq!(Command::parse("/cancel@pdf_bot"), Some(Command::Cancel));
        assert_eq!(Command::parse(" /compare now"), Some(Command::Compare));
        assert_eq!(Command::parse("cancel"), None);
    }

    #[test]
    fn test_pdf_opens_document_menu() {
        let t = machine().transition(Session::default(), Event::Document(pdf(MB)), Utc::now());
        assert_eq!(t.session.state, WaitState::WaitDocTask);
        assert_eq!(t.session.file.as_ref().unwrap().file_id, "pdf-id");
        assert_eq!(
            t.effects,
            vec![Effect::Reply(Reply::new(
                "doc-task-prompt",
                Keyboard::Menu(WaitState::WaitDocTask)
            ))]
        );
    }

    #[test]
    fn test_size_limit_is_inclusive() {
        let t = machine().transition(Session::default(), Event::Document(pdf(20 * MB)), Utc::now());
        assert!(t.session.is_idle());
        assert!(t.session.is_empty());

        let t = machine().transition(Session::default(), Event::Document(pdf(20 * MB - 1)), Utc::now());
        assert_eq!(t.session.state, WaitState::WaitDocTask);
    }

    #[test]
    fn test_unsupported_mime_type_ends() {
        let mut file = pdf(MB);
        file.mime_type = Some("text/plain".to_string());
        let t = machine().transition(Session::default(), Event::Document(file), Utc::now());
        assert!(t.session.is_idle());
        assert!(!t.effects.iter().any(|e| matches!(
            e,
            Effect::Reply(Reply { keyboard: Keyboard::Menu(_), .. })
        )));
    }

    #[test]
    fn test_unrecognized_menu_text_redisplays_menu() {
        let t = machine().transition(doc_session(), text("whatever", None), Utc::now());
        assert_eq!(t.session.state, WaitState::WaitDocTask);
        assert_eq!(t.effects, vec![Effect::Reply(prompt_for(WaitState::WaitDocTask))]);
    }

    #[test]
    fn test_back_returns_to_document_menu() {
        let m = machine();
        let session = m
            .transition(doc_session(), text("Crop", Some(Choice::Crop)), Utc::now())
            .session;
        assert_eq!(session.state, WaitState::WaitCropType);

        let t = m.transition(session, text("Back", Some(Choice::Back)), Utc::now());
        assert_eq!(t.session.state, WaitState::WaitDocTask);
        assert!(t.session.file.is_some());
    }

    #[test]
    fn test_cancel_clears_session() {
        let t = machine().transition(doc_session(), text("Cancel", Some(Choice::Cancel)), Utc::now());
        assert!(t.session.is_idle());
        assert!(t.session.is_empty());
    }

    #[test]
    fn test_missing_file_is_expired() {
        let session = Session::begin(WaitState::WaitSplitRange, Utc::now());
        let t = machine().transition(session, text("1-3", None), Utc::now());
        assert!(t.session.is_idle());
        assert_eq!(
            t.effects,
            vec![Effect::Reply(Reply::new("error-session-expired", Keyboard::Remove))]
        );
    }

    #[test]
    fn test_scale_to_dimensions_collects_width_then_height() {
        let m = machine();
        let mut session = m
            .transition(doc_session(), text("Scale", Some(Choice::Scale)), Utc::now())
            .session;
        session = m
            .transition(
                session,
                text("To dimensions", Some(Choice::ScaleToDimensions)),
                Utc::now(),
            )
            .session;
        assert_eq!(session.state, WaitState::WaitScaleDimension);

        let t = m.transition(session, text("abc", None), Utc::now());
        assert_eq!(t.session.state, WaitState::WaitScaleDimension);
        assert!(t.task().is_none());

        let t = m.transition(t.session, text("300", None), Utc::now());
        assert_eq!(t.session.params.width, Some(300.0));
        assert!(t.task().is_none());

        let t = m.transition(t.session, text("400", None), Utc::now());
        assert!(matches!(
            t.task(),
            Some(Task::Scale {
                scale: Scale::ToDimensions { width, height },
                ..
            }) if *width == 300.0 && *height == 400.0
        ));
    }

    #[test]
    fn test_wrong_password_is_bounded() {
        let m = machine();
        let mut session = m
            .transition(doc_session(), text("Decrypt", Some(Choice::Decrypt)), Utc::now())
            .session;

        for attempt in 1..=3u32 {
            let t = m.transition(session, text("guess", None), Utc::now());
            let task = t.task().cloned().unwrap();
            let t = m.transition(
                t.session,
                Event::TaskFinished {
                    task,
                    result: Err(TaskFailure::Pdf(PdfError::WrongPassword)),
                },
                Utc::now(),
            );
            if attempt < 3 {
                assert_eq!(t.session.state, WaitState::WaitDecryptPassword);
                assert_eq!(t.session.params.password_attempts, attempt);
            } else {
                assert!(t.session.is_idle());
            }
            session = t.session;
        }
    }

    #[test]
    fn test_integrity_error_ends() {
        let m = machine();
        let session = m
            .transition(doc_session(), text("Rotate", Some(Choice::Rotate)), Utc::now())
            .session;
        let t = m.transition(session, text("90", Some(Choice::Rotate90)), Utc::now());
        let task = t.task().cloned().unwrap();
        let t = m.transition(
            t.session,
            Event::TaskFinished {
                task,
                result: Err(TaskFailure::Pdf(PdfError::Encrypted)),
            },
            Utc::now(),
        );
        assert!(t.session.is_idle());
        assert_eq!(
            t.effects,
            vec![Effect::Reply(Reply::new("error-encrypted-pdf", Keyboard::Remove))]
        );
    }

    #[test]
    fn test_send_failure_ends_conversation() {
        let m = machine();
        let session = m
            .transition(doc_session(), text("Decrypt", Some(Choice::Decrypt)), Utc::now())
            .session;
        let t = m.transition(session, Event::SendFailed, Utc::now());
        assert!(t.session.is_idle());
        assert!(t.session.is_empty());
        assert_eq!(
            t.effects,
            vec![Effect::Reply(Reply::new("error-transport", Keyboard::Remove))]
        );
    }

    #[test]
    fn test_url_in_idle_converts() {
        let t = machine().transition(
            Session::default(),
            text("https://example.org/page", None),
            Utc::now(),
        );
        assert!(t.session.is_idle());
        assert_eq!(
            t.effects,
            vec![Effect::ConvertUrl("https://example.org/page".to_string())]
        );

        assert!(parse_web_url("ftp://example.org").is_none());
        assert!(parse_web_url("hello there").is_none());
    }

    #[test]
    fn test_compare_flow_waits_for_two_pdfs() {
        let m = machine();
        let t = m.transition(Session::default(), Event::Command(Command::Compare), Utc::now());
        assert_eq!(t.session.state, WaitState::WaitCompareFirst);

        let t = m.transition(t.session, Event::Photo(None), Utc::now());
        assert_eq!(t.session.state, WaitState::WaitCompareFirst);

        let t = m.transition(t.session, Event::Document(pdf(MB)), Utc::now());
        assert_eq!(t.session.state, WaitState::WaitCompareSecond);

        let mut second = pdf(MB);
        second.file_id = "other-id".to_string();
        let t = m.transition(t.session, Event::Document(second), Utc::now());
        assert!(matches!(
            t.task(),
            Some(Task::Compare { first, second }) if first.file_id == "pdf-id" && second.file_id == "other-id"
        ));
    }
}
