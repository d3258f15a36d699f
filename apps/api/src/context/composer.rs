//! Segment Composer: orders role groups and marks every group boundary.
//!
//! Output order: role groups by tier (style exemplars, then case fields and data
//! sources, in the tool's own order), then the instruction group. Inside a group,
//! attachments in ordinal order come first, followed by the typed text for that role.
//! Exactly one separator sits between two consecutive non-empty groups.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::context::models::{AttachmentSource, GenerationMode, ProvenanceRole, RoleSchema, Segment};
use crate::llm_client::schema::ExtractionSchema;

/// Everything a single request is assembled from.
pub struct ComposeInput<'a> {
    pub schema: &'a RoleSchema,
    pub attachments: &'a [Arc<AttachmentSource>],
    pub text_fields: &'a BTreeMap<ProvenanceRole, String>,
    pub instruction: &'a str,
    pub mode: GenerationMode,
    pub extraction_schema: Option<&'a ExtractionSchema>,
}

/// Composes the ordered segment list. Pure: same input, same output.
pub fn compose(input: &ComposeInput<'_>) -> Vec<Segment> {
    let mut groups: Vec<(ProvenanceRole, Vec<Segment>)> = Vec::new();

    for role in group_order(input) {
        let mut members: Vec<&Arc<AttachmentSource>> = input
            .attachments
            .iter()
            .filter(|a| a.provenance_role == role)
            .collect();
        members.sort_by_key(|a| a.ordinal);

        let mut segments: Vec<Segment> = members
            .into_iter()
            .map(|a| Segment::Attachment(Arc::clone(a)))
            .collect();

        if let Some(text) = input.text_fields.get(&role) {
            if !text.trim().is_empty() {
                segments.push(Segment::text(role, text.trim()));
            }
        }

        if !segments.is_empty() {
            groups.push((role, segments));
        }
    }

    if let Some(body) = instruction_body(input) {
        groups.push((
            ProvenanceRole::Instruction,
            vec![Segment::text(ProvenanceRole::Instruction, body)],
        ));
    }

    let mut composed = Vec::new();
    let mut previous: Option<ProvenanceRole> = None;
    for (role, segments) in groups {
        if let Some(closes) = previous {
            composed.push(separator(closes, role));
        }
        composed.extend(segments);
        previous = Some(role);
    }
    composed
}

/// Boundary marker between two groups, worded for the receiving model.
pub fn separator(closes: ProvenanceRole, opens: ProvenanceRole) -> Segment {
    Segment::Separator {
        closes,
        opens,
        body: format!(
            "--- FIM: {} | INÍCIO: {} ---",
            closes.marker_label(),
            opens.marker_label()
        ),
    }
}

/// Source roles present in the input, ordered by tier, then by the tool's schema.
/// Roles a schema does not list still keep their tier.
fn group_order(input: &ComposeInput<'_>) -> Vec<ProvenanceRole> {
    let schema_roles: Vec<ProvenanceRole> = input.schema.roles().collect();

    let mut present: Vec<ProvenanceRole> = input
        .attachments
        .iter()
        .map(|a| a.provenance_role)
        .chain(input.text_fields.keys().copied())
        .filter(|role| role.tier() <= 1)
        .collect();
    present.sort();
    present.dedup();

    present.sort_by_key(|role| {
        let position = schema_roles
            .iter()
            .position(|r| r == role)
            .unwrap_or(usize::MAX);
        (role.tier(), position, *role)
    });
    present
}

/// Extraction ends with the schema descriptor in place of the freeform instruction.
fn instruction_body(input: &ComposeInput<'_>) -> Option<String> {
    let instruction = input.instruction.trim();
    match (input.mode, input.extraction_schema) {
        (GenerationMode::Extraction, Some(schema)) => Some(schema.describe()),
        _ if instruction.is_empty() => None,
        _ => Some(instruction.to_string()),
    }
}
