use std::collections::HashMap;

use axum::{
    extract::{multipart::MultipartRejection, Multipart, Path, State},
    Json,
};
use serde::Serialize;

use crate::errors::AppError;
use crate::state::AppState;
use crate::upload::{list_files, upload_files, upload_prompt, UploadedFile};

#[derive(Debug, Serialize)]
pub struct UploadFilesResponse {
    pub message: String,
    pub customer_id: String,
    pub uploaded_files: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct UploadPromptResponse {
    pub message: String,
    pub customer_id: String,
    pub file_path: String,
}

#[derive(Debug, Serialize)]
pub struct ListFilesResponse {
    pub message: String,
    pub customer_id: String,
    pub files: Vec<String>,
}

/// A parsed multipart form: parts with a filename are files, the rest are
/// text fields keyed by part name.
#[derive(Debug, Default)]
pub(crate) struct UploadForm {
    pub fields: HashMap<String, String>,
    pub files: Vec<(String, UploadedFile)>,
}

impl UploadForm {
    pub fn customer_id(&self) -> Result<&str, AppError> {
        self.fields
            .get("customer_id")
            .map(String::as_str)
            .ok_or_else(|| AppError::Validation("customer_id field is required".to_string()))
    }

    /// Files sent under any of `names`, in the order they arrived.
    pub fn take_files(&mut self, names: &[&str]) -> Vec<UploadedFile> {
        let (matching, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut self.files)
            .into_iter()
            .partition(|(name, _)| names.contains(&name.as_str()));
        self.files = rest;
        matching.into_iter().map(|(_, file)| file).collect()
    }
}

pub(crate) async fn read_form(mut multipart: Multipart) -> Result<UploadForm, AppError> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        let filename = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);

        let body = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("Failed to read part '{name}': {e}")))?;

        match filename {
            Some(filename) => form.files.push((
                name,
                UploadedFile {
                    filename,
                    content_type,
                    body,
                },
            )),
            None => {
                let text = String::from_utf8(body.to_vec()).map_err(|_| {
                    AppError::Validation(format!("Field '{name}' must be UTF-8 text"))
                })?;
                form.fields.insert(name, text);
            }
        }
    }

    Ok(form)
}

/// POST /upload/files/
///
/// Multipart: `customer_id` plus one or more `files` parts.
pub async fn handle_upload_files(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadFilesResponse>, AppError> {
    let mut form = read_form(multipart?).await?;
    let customer_id = form.customer_id()?.trim().to_string();
    let files = form.take_files(&["files", "files[]", "file"]);

    let uploaded_files = upload_files(state.store.as_ref(), &customer_id, files).await?;

    Ok(Json(UploadFilesResponse {
        message: "Files uploaded successfully".to_string(),
        customer_id,
        uploaded_files,
    }))
}

/// POST /upload/prompt/
///
/// Multipart: `customer_id` plus a single `prompt_file` whose name ends in `.txt`.
pub async fn handle_upload_prompt(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadPromptResponse>, AppError> {
    let mut form = read_form(multipart?).await?;
    let customer_id = form.customer_id()?.trim().to_string();

    let prompt_file = form
        .take_files(&["prompt_file", "prompt", "file"])
        .into_iter()
        .next()
        .ok_or_else(|| AppError::Validation("prompt_file is required".to_string()))?;

    if !prompt_file.filename.to_lowercase().ends_with(".txt") {
        return Err(AppError::Validation(
            "Only text files with .txt extension are allowed for prompts".to_string(),
        ));
    }

    let file_path = upload_prompt(state.store.as_ref(), &customer_id, prompt_file.body).await?;

    Ok(Json(UploadPromptResponse {
        message: "Prompt file uploaded successfully".to_string(),
        customer_id,
        file_path,
    }))
}

/// GET /upload/files/:customer_id
pub async fn handle_list_files(
    State(state): State<AppState>,
    Path(customer_id): Path<String>,
) -> Result<Json<ListFilesResponse>, AppError> {
    let files = list_files(state.store.as_ref(), &customer_id).await?;
    let message = if files.is_empty() {
        format!("No files found for customer: {customer_id}")
    } else {
        format!("Files for customer: {customer_id}")
    };

    Ok(Json(ListFilesResponse {
        message,
        customer_id,
        files,
    }))
}
