use axum::{
    extract::{multipart::Multipart, Path, Query, State},
    http::header,
    response::{Html, IntoResponse},
    Json,
};
use bytes::Bytes;
use serde::Deserialize;
use uuid::Uuid;

use crate::errors::AppError;
use crate::export::mail_merge::{self, AddressRecord};
use crate::export::merge::{self, BinaryDocument};
use crate::export::printable;
use crate::generation::handlers::find_workspace;
use crate::generation::session::SessionError;
use crate::state::AppState;

const MERGED_FILENAME_PREFIX: &str = "Documentos_Unificados";

#[derive(Debug, Default, Deserialize)]
pub struct ExportQuery {
    #[serde(default)]
    pub case_reference: String,
}

#[derive(Debug, Deserialize)]
pub struct MailMergeRequest {
    pub record: AddressRecord,
    #[serde(default)]
    pub case_reference: String,
}

/// GET /api/v1/workspaces/:id/print
pub async fn handle_print(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<ExportQuery>,
) -> Result<Html<String>, AppError> {
    let (title, output) = current_output(&state, id)?;
    let document = printable::to_printable(&output, title, &query.case_reference);
    Ok(Html(document.html))
}

/// GET /api/v1/workspaces/:id/clipboard
pub async fn handle_clipboard(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let (_, output) = current_output(&state, id)?;
    let text = printable::to_clipboard_text(&output).to_string();
    Ok(([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], text))
}

/// POST /api/v1/documents/merge
///
/// Every file part is a PDF, merged in upload order. An optional text part
/// named `case_reference` names the download.
pub async fn handle_merge(mut multipart: Multipart) -> Result<impl IntoResponse, AppError> {
    let mut documents = Vec::new();
    let mut case_reference = String::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("invalid multipart body: {e}")))?
    {
        if field.name() == Some("case_reference") {
            case_reference = field
                .text()
                .await
                .map_err(|e| AppError::Validation(format!("invalid case_reference: {e}")))?;
            continue;
        }

        let name = field
            .file_name()
            .unwrap_or("documento.pdf")
            .to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("could not read '{name}': {e}")))?;
        documents.push(BinaryDocument { name, bytes });
    }

    let (merged, _) = merge::merge_documents_blocking(documents).await?;
    let filename = printable::export_filename(MERGED_FILENAME_PREFIX, &case_reference, "pdf");
    Ok(download("application/pdf", &filename, merged))
}

/// POST /api/v1/mail-merge
pub async fn handle_mail_merge(
    Json(request): Json<MailMergeRequest>,
) -> Result<impl IntoResponse, AppError> {
    if request.record.name.trim().is_empty() {
        return Err(AppError::Validation(
            "the recipient name is required".to_string(),
        ));
    }
    let line = mail_merge::build_record(&request.record, &request.case_reference);
    let filename = mail_merge::record_filename(&request.record);
    Ok(download("text/csv; charset=utf-8", &filename, Bytes::from(line)))
}

/// Tool title and current draft of a workspace, or NotReady when there is none.
fn current_output(state: &AppState, id: Uuid) -> Result<(&'static str, String), AppError> {
    let workspace = find_workspace(state, id)?;
    let ws = workspace.lock();
    let output = ws
        .session
        .current_output()
        .ok_or(SessionError::NotReady)?
        .to_string();
    Ok((ws.profile.title, output))
}

fn download(content_type: &str, filename: &str, body: Bytes) -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CONTENT_DISPOSITION, attachment_disposition(filename)),
        ],
        body,
    )
}

/// Header-safe `attachment` disposition; non-ASCII characters become `_`.
fn attachment_disposition(filename: &str) -> String {
    let ascii: String = filename
        .chars()
        .map(|c| {
            if c.is_ascii_graphic() && c != '"' && c != '\\' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("attachment; filename=\"{ascii}\"")
}
