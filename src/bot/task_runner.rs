//! Runs a fully parameterised task: download inputs into a step workspace,
//! call the document engine, deliver the results, clean up.

use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use teloxide::types::ChatId;
use tracing::{debug, error, info, warn};

use super::dialogue_manager::BotContext;
use super::ui_builder::create_markup;
use crate::archive::zip_files;
use crate::conversation::{Keyboard, TaskFailure};
use crate::dialogue::FileRef;
use crate::errors::{PdfError, TelegramError};
use crate::localization::t_args_lang;
use crate::pdf::web;
use crate::tasks::{
    suffixed_file_name, Packaging, Task, BEAUTIFIED_FILE_NAME, CONVERTED_FILE_NAME,
    DIFFERENCES_FILE_NAME, WATERMARKED_FILE_NAME,
};
use crate::workspace::StepWorkspace;

/// A generated file and how it reaches the user
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    Document { path: PathBuf, file_name: String },
    Photo(PathBuf),
}

impl Delivery {
    fn path(&self) -> &Path {
        match self {
            Delivery::Document { path, .. } | Delivery::Photo(path) => path,
        }
    }
}

fn io_failure(err: std::io::Error) -> TaskFailure {
    TaskFailure::Pdf(PdfError::Io(err))
}

/// Run `task` for `chat_id`. The workspace is removed whatever the outcome.
pub async fn run_task(
    ctx: &BotContext,
    chat_id: ChatId,
    language_code: Option<&str>,
    task: &Task,
) -> Result<(), TaskFailure> {
    let started = Utc::now();
    let mut workspace = StepWorkspace::new(ctx.temp_root.as_deref()).map_err(io_failure)?;

    let result = async {
        let inputs = download_inputs(ctx, &mut workspace, task).await?;
        let deliveries = produce(ctx, &workspace, task, &inputs)
            .await
            .map_err(TaskFailure::Pdf)?;
        deliver(ctx, chat_id, language_code, &deliveries).await
    }
    .await;

    workspace.close();

    let elapsed_ms = (Utc::now() - started).num_milliseconds();
    match &result {
        Ok(()) => info!(user_id = %chat_id, task = %task, elapsed_ms, "Task completed"),
        Err(TaskFailure::Pdf(e)) if e.is_fault() => {
            error!(user_id = %chat_id, task = %task, error = %e, "Task failed")
        }
        Err(TaskFailure::Pdf(e)) => {
            info!(user_id = %chat_id, task = %task, error = %e, "Task rejected input")
        }
        Err(TaskFailure::Transport(e)) => {
            error!(user_id = %chat_id, task = %task, error = %e, "Task transport failed")
        }
    }
    result
}

async fn download_inputs(
    ctx: &BotContext,
    workspace: &mut StepWorkspace,
    task: &Task,
) -> Result<Vec<PathBuf>, TaskFailure> {
    let default_extension = match task {
        Task::BeautifyPhotos { .. } | Task::ConvertPhotos { .. } => "jpg",
        _ => "pdf",
    };

    let mut paths = Vec::new();
    for file in task.inputs() {
        let path = workspace.input_path(file.file_name.as_deref(), default_extension);
        ctx.messenger
            .download(&file.file_id, &path)
            .await
            .map_err(|e| TaskFailure::Transport(format!("{e:#}")))?;
        debug!(file_id = %file.file_id, path = %path.display(), "Input staged");
        paths.push(path);
    }
    Ok(paths)
}

fn first(inputs: &[PathBuf]) -> Result<&Path, PdfError> {
    inputs
        .first()
        .map(PathBuf::as_path)
        .ok_or_else(|| PdfError::tool("workspace", "missing input file"))
}

fn document(workspace: &StepWorkspace, file_name: String) -> Delivery {
    Delivery::Document {
        path: workspace.output_path(&file_name),
        file_name,
    }
}

fn suffixed(workspace: &StepWorkspace, file: &FileRef, suffix: &str) -> Delivery {
    document(workspace, suffixed_file_name(file, suffix, "pdf"))
}

/// Call the engine and describe what to send back
async fn produce(
    ctx: &BotContext,
    workspace: &StepWorkspace,
    task: &Task,
    inputs: &[PathBuf],
) -> Result<Vec<Delivery>, PdfError> {
    let engine = &ctx.engine;

    let single = match task {
        Task::Decrypt { file, password } => {
            let out = suffixed(workspace, file, "decrypted");
            engine.decrypt(first(inputs)?, password, out.path()).await?;
            out
        }
        Task::Encrypt { file, password } => {
            let out = suffixed(workspace, file, "encrypted");
            engine.encrypt(first(inputs)?, password, out.path()).await?;
            out
        }
        Task::Rotate { file, rotation } => {
            let out = suffixed(workspace, file, "rotated");
            engine.rotate(first(inputs)?, *rotation, out.path()).await?;
            out
        }
        Task::Scale { file, scale } => {
            let out = suffixed(workspace, file, "scaled");
            engine.scale(first(inputs)?, *scale, out.path()).await?;
            out
        }
        Task::Split { file, range } => {
            let out = suffixed(workspace, file, "split");
            engine.split(first(inputs)?, range, out.path()).await?;
            out
        }
        Task::Crop { file, crop } => {
            let out = suffixed(workspace, file, "cropped");
            engine.crop(first(inputs)?, *crop, out.path()).await?;
            out
        }
        Task::Rename { new_name, .. } => {
            let out = document(workspace, new_name.clone());
            tokio::fs::copy(first(inputs)?, out.path()).await?;
            out
        }
        Task::Preview { file } => {
            let path = workspace.output_path(&suffixed_file_name(file, "preview", "png"));
            engine.preview(first(inputs)?, &path).await?;
            Delivery::Photo(path)
        }
        Task::ExtractImages { file, packaging } => {
            let dir = workspace.scratch_dir("images")?;
            let images = engine.extract_images(first(inputs)?, &dir).await?;
            let archive = suffixed_file_name(file, "images", "zip");
            return package(workspace, images, *packaging, archive).await;
        }
        Task::ToImages { file, packaging } => {
            let dir = workspace.scratch_dir("pages")?;
            let pages = engine.to_images(first(inputs)?, &dir).await?;
            let archive = suffixed_file_name(file, "pages", "zip");
            return package(workspace, pages, *packaging, archive).await;
        }
        Task::BeautifyPhotos { .. } => {
            let out = document(workspace, BEAUTIFIED_FILE_NAME.to_string());
            engine.beautify_images(inputs, out.path()).await?;
            out
        }
        Task::ConvertPhotos { .. } => {
            let out = document(workspace, CONVERTED_FILE_NAME.to_string());
            engine.images_to_pdf(inputs, out.path()).await?;
            out
        }
        Task::Compare { .. } => {
            let out = document(workspace, DIFFERENCES_FILE_NAME.to_string());
            let second = inputs
                .get(1)
                .ok_or_else(|| PdfError::tool("workspace", "missing second document"))?;
            engine.compare(first(inputs)?, second, out.path()).await?;
            out
        }
        Task::Watermark { .. } => {
            let out = document(workspace, WATERMARKED_FILE_NAME.to_string());
            let mark = inputs
                .get(1)
                .ok_or_else(|| PdfError::tool("workspace", "missing watermark document"))?;
            engine.watermark(first(inputs)?, mark, out.path()).await?;
            out
        }
    };

    Ok(vec![single])
}

async fn package(
    workspace: &StepWorkspace,
    files: Vec<PathBuf>,
    packaging: Packaging,
    archive_name: String,
) -> Result<Vec<Delivery>, PdfError> {
    match packaging {
        Packaging::Photos => Ok(files.into_iter().map(Delivery::Photo).collect()),
        Packaging::Zipped => {
            let out = workspace.output_path(&archive_name);
            let zip_path = out.clone();
            tokio::task::spawn_blocking(move || zip_files(&files, &zip_path))
                .await
                .map_err(|e| PdfError::tool("zip", format!("task panicked: {e}")))??;
            Ok(vec![Delivery::Document {
                path: out,
                file_name: archive_name,
            }])
        }
    }
}

/// Send results; a result over the upload limit is reported instead
async fn deliver(
    ctx: &BotContext,
    chat_id: ChatId,
    language_code: Option<&str>,
    deliveries: &[Delivery],
) -> Result<(), TaskFailure> {
    for delivery in deliveries {
        let size = tokio::fs::metadata(delivery.path())
            .await
            .map_err(io_failure)?
            .len();

        if size > ctx.max_upload_size {
            let err = TelegramError::UploadTooLarge {
                size,
                limit: ctx.max_upload_size,
            };
            warn!(user_id = %chat_id, error = %err, "Result not sent");
            let limit_mb = (ctx.max_upload_size / (1024 * 1024)).to_string();
            ctx.messenger
                .send_text(
                    chat_id,
                    &t_args_lang(err.message_key(), &[("limit", limit_mb.as_str())], language_code),
                    create_markup(Keyboard::Remove, language_code),
                )
                .await
                .map_err(|e| TaskFailure::Transport(format!("{e:#}")))?;
            continue;
        }

        let sent = match delivery {
            Delivery::Document { path, file_name } => {
                ctx.messenger.send_document(chat_id, path, file_name).await
            }
            Delivery::Photo(path) => ctx.messenger.send_photo(chat_id, path).await,
        };
        sent.map_err(|e| TaskFailure::Transport(format!("{e:#}")))?;
    }
    Ok(())
}

/// Convert a web page and send it, outside of any conversation
pub async fn convert_url(ctx: Arc<BotContext>, chat_id: ChatId, language_code: Option<String>, url: String) {
    let language_code = language_code.as_deref();
    let _guard = match ctx.urls.begin(chat_id, &url) {
        Some(guard) => guard,
        None => {
            debug!(user_id = %chat_id, url = %url, "Conversion already running");
            send_notice(&ctx, chat_id, "url-in-progress", language_code).await;
            return;
        }
    };

    send_notice(&ctx, chat_id, "progress-url", language_code).await;

    let workspace = match StepWorkspace::new(ctx.temp_root.as_deref()) {
        Ok(workspace) => workspace,
        Err(e) => {
            error!(user_id = %chat_id, error = %e, "Failed to create workspace");
            send_notice(&ctx, chat_id, "error-processing-failed", language_code).await;
            return;
        }
    };

    let out = document(&workspace, web::file_name_for(&url));
    let result = async {
        ctx.engine
            .url_to_pdf(&url, out.path())
            .await
            .map_err(TaskFailure::Pdf)?;
        deliver(&ctx, chat_id, language_code, std::slice::from_ref(&out)).await
    }
    .await;
    workspace.close();

    match result {
        Ok(()) => info!(user_id = %chat_id, url = %url, "Web page converted"),
        Err(TaskFailure::Pdf(e)) => {
            warn!(user_id = %chat_id, url = %url, error = %e, "Web page conversion failed");
            send_notice(&ctx, chat_id, e.message_key(), language_code).await;
        }
        Err(TaskFailure::Transport(e)) => {
            error!(user_id = %chat_id, url = %url, error = %e, "Failed to send converted page");
        }
    }
}

async fn send_notice(ctx: &BotContext, chat_id: ChatId, key: &str, language_code: Option<&str>) {
    let text = crate::localization::t_lang(key, language_code);
    if let Err(e) = ctx.messenger.send_text(chat_id, &text, None).await {
        error!(user_id = %chat_id, error = %e, "Failed to send message");
    }
}
