//! Attachment Ingestor: turns raw uploads into transport-encoded, role-tagged sources.
//!
//! The aggregate ceiling is checked for the whole batch before anything is read or
//! encoded: either the batch fits next to what the workspace already holds, or nothing
//! is ingested. Past that gate each file succeeds or fails on its own.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use base64::{engine::general_purpose, Engine as _};
use bytes::Bytes;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::context::models::{AttachmentSource, ProvenanceRole};

/// One user-supplied file, before ingestion.
#[derive(Debug, Clone)]
pub struct RawFile {
    pub role: ProvenanceRole,
    pub file_name: String,
    pub media_type: Option<String>,
    pub bytes: Bytes,
}

impl RawFile {
    pub fn from_bytes(
        role: ProvenanceRole,
        file_name: impl Into<String>,
        media_type: Option<String>,
        bytes: Bytes,
    ) -> Self {
        Self {
            role,
            file_name: file_name.into(),
            media_type,
            bytes,
        }
    }

    pub fn declared_size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// The batch would push the workspace over its aggregate ceiling.
#[derive(Debug, Clone, Error, Serialize)]
#[error("attachments would total {attempted_bytes} bytes, above the {limit_bytes} byte limit")]
pub struct SizeLimitError {
    pub attempted_bytes: u64,
    pub limit_bytes: u64,
}

/// Why a single file could not be ingested.
#[derive(Debug, Clone, Error, Serialize)]
#[serde(tag = "code", content = "detail", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IngestError {
    #[error("unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("file is empty")]
    EmptyFile,

    #[error("encoding failed: {0}")]
    Encoding(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestFailure {
    pub file_name: String,
    pub role: ProvenanceRole,
    pub error: IngestError,
}

#[derive(Debug, Default)]
pub struct IngestOutcome {
    pub accepted: Vec<AttachmentSource>,
    pub failures: Vec<IngestFailure>,
}

/// Ingests a batch of files next to `existing`.
///
/// Ordinals continue each role's existing sequence; files that fail do not consume one.
pub async fn ingest(
    files: Vec<RawFile>,
    existing: &[Arc<AttachmentSource>],
    limit_bytes: u64,
) -> Result<IngestOutcome, SizeLimitError> {
    let existing_bytes: u64 = existing.iter().map(|a| a.size_bytes).sum();
    let incoming_bytes: u64 = files.iter().map(RawFile::declared_size).sum();
    let attempted_bytes = existing_bytes + incoming_bytes;

    if attempted_bytes > limit_bytes {
        warn!(
            attempted_bytes,
            limit_bytes,
            files = files.len(),
            "Attachment batch rejected: aggregate size limit exceeded"
        );
        return Err(SizeLimitError {
            attempted_bytes,
            limit_bytes,
        });
    }

    let mut next_ordinal: HashMap<ProvenanceRole, u32> = HashMap::new();
    for source in existing {
        let next = next_ordinal.entry(source.provenance_role).or_insert(0);
        *next = (*next).max(source.ordinal + 1);
    }

    let mut outcome = IngestOutcome::default();
    for file in files {
        let role = file.role;
        let file_name = file.file_name.clone();
        match encode_file(file).await {
            Ok((media_type, payload, size_bytes)) => {
                let ordinal = next_ordinal.entry(role).or_insert(0);
                debug!(%role, ordinal = *ordinal, size_bytes, "Attachment ingested");
                outcome.accepted.push(AttachmentSource {
                    id: Uuid::new_v4(),
                    provenance_role: role,
                    ordinal: *ordinal,
                    file_name,
                    media_type,
                    payload,
                    size_bytes,
                });
                *ordinal += 1;
            }
            Err(error) => {
                warn!(%role, file = %file_name, "Attachment failed ingestion: {error}");
                outcome.failures.push(IngestFailure {
                    file_name,
                    role,
                    error,
                });
            }
        }
    }

    Ok(outcome)
}

/// Appends an ingested batch to the live attachment list.
///
/// Encoding runs outside the workspace lock, so the list may have changed since
/// `ingest` saw it: the ceiling is checked again and ordinals are reassigned to
/// continue the current sequence. Nothing is appended when the check fails.
pub fn commit(
    attachments: &mut Vec<Arc<AttachmentSource>>,
    accepted: Vec<AttachmentSource>,
    limit_bytes: u64,
) -> Result<Vec<Arc<AttachmentSource>>, SizeLimitError> {
    let attempted_bytes: u64 = attachments
        .iter()
        .map(|a| a.size_bytes)
        .chain(accepted.iter().map(|a| a.size_bytes))
        .sum();
    if attempted_bytes > limit_bytes {
        return Err(SizeLimitError {
            attempted_bytes,
            limit_bytes,
        });
    }

    let mut next_ordinal: HashMap<ProvenanceRole, u32> = HashMap::new();
    for source in attachments.iter() {
        let next = next_ordinal.entry(source.provenance_role).or_insert(0);
        *next = (*next).max(source.ordinal + 1);
    }

    let mut committed = Vec::with_capacity(accepted.len());
    for mut source in accepted {
        let ordinal = next_ordinal.entry(source.provenance_role).or_insert(0);
        source.ordinal = *ordinal;
        *ordinal += 1;
        let source = Arc::new(source);
        attachments.push(Arc::clone(&source));
        committed.push(source);
    }
    Ok(committed)
}

/// Removes one attachment and re-packs the ordinals of its role group.
pub fn remove_attachment(
    attachments: &mut Vec<Arc<AttachmentSource>>,
    id: Uuid,
) -> Option<Arc<AttachmentSource>> {
    let index = attachments.iter().position(|a| a.id == id)?;
    let removed = attachments.remove(index);

    let mut group: Vec<&mut Arc<AttachmentSource>> = attachments
        .iter_mut()
        .filter(|a| a.provenance_role == removed.provenance_role)
        .collect();
    group.sort_by_key(|a| a.ordinal);
    for (ordinal, source) in group.into_iter().enumerate() {
        if source.ordinal != ordinal as u32 {
            Arc::make_mut(source).ordinal = ordinal as u32;
        }
    }

    Some(removed)
}

async fn encode_file(file: RawFile) -> Result<(String, String, u64), IngestError> {
    let media_type = resolve_media_type(file.media_type.as_deref(), &file.file_name)?;

    let bytes = file.bytes;

    if bytes.is_empty() {
        return Err(IngestError::EmptyFile);
    }

    let size_bytes = bytes.len() as u64;
    let payload = tokio::task::spawn_blocking(move || general_purpose::STANDARD.encode(&bytes))
        .await
        .map_err(|e| IngestError::Encoding(e.to_string()))?;

    Ok((media_type, payload, size_bytes))
}

/// Uses the declared content type when it is one the service reads, otherwise
/// falls back to the file extension.
fn resolve_media_type(declared: Option<&str>, file_name: &str) -> Result<String, IngestError> {
    if let Some(declared) = declared {
        let declared = declared.trim().to_ascii_lowercase();
        if is_supported(&declared) {
            return Ok(declared);
        }
        if !declared.is_empty() && declared != "application/octet-stream" {
            return Err(IngestError::UnsupportedMediaType(declared));
        }
    }

    let extension = Path::new(file_name)
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();

    let inferred = match extension.as_str() {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "txt" => "text/plain",
        _ => {
            return Err(IngestError::UnsupportedMediaType(format!(
                "cannot infer a media type for '{file_name}'"
            )))
        }
    };
    Ok(inferred.to_string())
}

fn is_supported(media_type: &str) -> bool {
    media_type == "application/pdf" || media_type.starts_with("image/") || media_type.starts_with("text/")
}
