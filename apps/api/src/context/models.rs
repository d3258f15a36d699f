use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Where a piece of evidence came from. Drives ordering and the separator
/// markers the generation service sees between groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProvenanceRole {
    /// Exemplar documents: target style, layout and register.
    StyleModel,
    /// Structured case fields typed into the form.
    CaseFields,
    /// Factual sources for the case at hand.
    DataContent,
    /// Initial procedure record (complaint, police report).
    ProcedureRecord,
    /// Evidence of contact attempts (messages, e-mails, screenshots).
    ContactEvidence,
    /// Records about the subject or victim.
    SubjectRecord,
    /// The task the operator is asking for.
    Instruction,
    /// The output under correction, resent on every refinement.
    CurrentDraft,
    /// Fixed directive closing a refinement request.
    RefinementDirective,
}

impl ProvenanceRole {
    /// Ordering tier. Style exemplars come first, then facts, then the task.
    pub fn tier(self) -> u8 {
        match self {
            ProvenanceRole::StyleModel => 0,
            ProvenanceRole::CaseFields
            | ProvenanceRole::DataContent
            | ProvenanceRole::ProcedureRecord
            | ProvenanceRole::ContactEvidence
            | ProvenanceRole::SubjectRecord => 1,
            ProvenanceRole::Instruction => 2,
            ProvenanceRole::CurrentDraft | ProvenanceRole::RefinementDirective => 3,
        }
    }

    /// Whether operators may upload files under this role.
    pub fn accepts_attachments(self) -> bool {
        self.tier() <= 1 && self != ProvenanceRole::CaseFields
    }

    /// Label used inside separator markers.
    pub fn marker_label(self) -> &'static str {
        match self {
            ProvenanceRole::StyleModel => "MODELOS (exemplos de estilo, formatação e linguagem)",
            ProvenanceRole::CaseFields => "DADOS DO CASO",
            ProvenanceRole::DataContent => "FONTES DE DADOS (conteúdo do caso real)",
            ProvenanceRole::ProcedureRecord => "ARQUIVOS DO PROCEDIMENTO (peça inicial / BO)",
            ProvenanceRole::ContactEvidence => {
                "ARQUIVOS DE TENTATIVA DE CONTATO (WhatsApp / e-mail / print)"
            }
            ProvenanceRole::SubjectRecord => "ARQUIVOS COM DADOS DA VÍTIMA (relatos / PDFs)",
            ProvenanceRole::Instruction => "INSTRUÇÃO",
            ProvenanceRole::CurrentDraft => "DOCUMENTO ATUAL",
            ProvenanceRole::RefinementDirective => "DIRETRIZES DE REVISÃO",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ProvenanceRole::StyleModel => "STYLE_MODEL",
            ProvenanceRole::CaseFields => "CASE_FIELDS",
            ProvenanceRole::DataContent => "DATA_CONTENT",
            ProvenanceRole::ProcedureRecord => "PROCEDURE_RECORD",
            ProvenanceRole::ContactEvidence => "CONTACT_EVIDENCE",
            ProvenanceRole::SubjectRecord => "SUBJECT_RECORD",
            ProvenanceRole::Instruction => "INSTRUCTION",
            ProvenanceRole::CurrentDraft => "CURRENT_DRAFT",
            ProvenanceRole::RefinementDirective => "REFINEMENT_DIRECTIVE",
        }
    }
}

impl fmt::Display for ProvenanceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProvenanceRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace('-', "_");
        let role = match normalized.as_str() {
            "STYLE_MODEL" => ProvenanceRole::StyleModel,
            "CASE_FIELDS" => ProvenanceRole::CaseFields,
            "DATA_CONTENT" => ProvenanceRole::DataContent,
            "PROCEDURE_RECORD" => ProvenanceRole::ProcedureRecord,
            "CONTACT_EVIDENCE" => ProvenanceRole::ContactEvidence,
            "SUBJECT_RECORD" => ProvenanceRole::SubjectRecord,
            "INSTRUCTION" => ProvenanceRole::Instruction,
            "CURRENT_DRAFT" => ProvenanceRole::CurrentDraft,
            "REFINEMENT_DIRECTIVE" => ProvenanceRole::RefinementDirective,
            _ => return Err(format!("unknown provenance role '{s}'")),
        };
        Ok(role)
    }
}

/// One ingested, transport-encoded attachment.
#[derive(Debug, Clone, Serialize)]
pub struct AttachmentSource {
    pub id: Uuid,
    pub provenance_role: ProvenanceRole,
    /// Position inside its role group, insertion order.
    pub ordinal: u32,
    pub file_name: String,
    pub media_type: String,
    /// Base64 of the original bytes. Never serialized back to clients.
    #[serde(skip_serializing)]
    pub payload: String,
    pub size_bytes: u64,
}

/// Generation request mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GenerationMode {
    Generation,
    Extraction,
}

/// One ordered unit of an outgoing request.
#[derive(Debug, Clone)]
pub enum Segment {
    Text {
        role: ProvenanceRole,
        body: String,
    },
    /// Marker injected at a role-group boundary. Sent to the service as text.
    Separator {
        closes: ProvenanceRole,
        opens: ProvenanceRole,
        body: String,
    },
    Attachment(Arc<AttachmentSource>),
}

impl Segment {
    pub fn text(role: ProvenanceRole, body: impl Into<String>) -> Self {
        Segment::Text {
            role,
            body: body.into(),
        }
    }

    /// Role of the segment; separators report the group they open.
    #[cfg(test)]
    pub fn role(&self) -> ProvenanceRole {
        match self {
            Segment::Text { role, .. } => *role,
            Segment::Separator { opens, .. } => *opens,
            Segment::Attachment(source) => source.provenance_role,
        }
    }

    #[cfg(test)]
    pub fn is_separator(&self) -> bool {
        matches!(self, Segment::Separator { .. })
    }
}

/// Lightweight view of a segment for API responses and logs (no payloads).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SegmentSummary {
    Text { role: ProvenanceRole, chars: usize },
    Separator {
        closes: ProvenanceRole,
        opens: ProvenanceRole,
        body: String,
    },
    Attachment { role: ProvenanceRole, file_name: String, media_type: String },
}

impl From<&Segment> for SegmentSummary {
    fn from(segment: &Segment) -> Self {
        match segment {
            Segment::Text { role, body } => SegmentSummary::Text {
                role: *role,
                chars: body.chars().count(),
            },
            Segment::Separator {
                closes,
                opens,
                body,
            } => SegmentSummary::Separator {
                closes: *closes,
                opens: *opens,
                body: body.clone(),
            },
            Segment::Attachment(source) => SegmentSummary::Attachment {
                role: source.provenance_role,
                file_name: source.file_name.clone(),
                media_type: source.media_type.clone(),
            },
        }
    }
}

/// One role a tool accepts, with the heading operators see.
#[derive(Debug, Clone, Serialize)]
pub struct RoleSpec {
    pub role: ProvenanceRole,
    pub label: &'static str,
}

/// Ordered role groups of one tool. Construction sorts by tier (stable), so a
/// tool's own order is kept inside a tier but style always precedes data.
#[derive(Debug, Clone, Serialize)]
pub struct RoleSchema {
    roles: Vec<RoleSpec>,
}

impl RoleSchema {
    pub fn new(mut roles: Vec<RoleSpec>) -> Self {
        let mut seen = Vec::with_capacity(roles.len());
        roles.retain(|spec| {
            let keep = spec.role.tier() <= 1 && !seen.contains(&spec.role);
            seen.push(spec.role);
            keep
        });
        roles.sort_by_key(|spec| spec.role.tier());
        Self { roles }
    }

    pub fn roles(&self) -> impl Iterator<Item = ProvenanceRole> + '_ {
        self.roles.iter().map(|spec| spec.role)
    }

    pub fn contains(&self, role: ProvenanceRole) -> bool {
        self.roles.iter().any(|spec| spec.role == role)
    }
}
