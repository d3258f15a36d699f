//! Tool profiles: each drafting tool is a value that parameterises the shared
//! compose → generate → refine pipeline.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use crate::context::models::{GenerationMode, ProvenanceRole, RoleSchema, RoleSpec, Segment};
use crate::generation::prompts::*;
use crate::llm_client::prompts::{JSON_ONLY_SYSTEM, PLAIN_OUTPUT_RULE};
use crate::llm_client::schema::{ExtractionSchema, FieldType, SchemaField};
use crate::llm_client::{GenerationRequest, ModelTier};

const MB: u64 = 1024 * 1024;

/// One labelled form field rendered into the CASE_FIELDS group.
#[derive(Debug, Clone, Serialize)]
pub struct CaseField {
    pub key: &'static str,
    pub label: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolProfile {
    pub id: &'static str,
    pub title: &'static str,
    pub mode: GenerationMode,
    pub roles: RoleSchema,
    pub case_fields: Vec<CaseField>,
    #[serde(skip)]
    pub system_prompt: &'static str,
    pub default_instruction: &'static str,
    pub model: ModelTier,
    /// Overrides the configured default ceiling when set.
    pub attachment_limit_bytes: Option<u64>,
    pub extraction_schema: Option<ExtractionSchema>,
}

impl ToolProfile {
    pub fn attachment_limit(&self, default_bytes: u64) -> u64 {
        self.attachment_limit_bytes.unwrap_or(default_bytes)
    }

    /// Builds the request for a composed segment list.
    pub fn request(&self, segments: Vec<Segment>) -> GenerationRequest {
        match (&self.mode, &self.extraction_schema) {
            (GenerationMode::Extraction, Some(schema)) => {
                GenerationRequest::extraction(segments, schema.clone(), self.model)
                    .with_system_prompt(JSON_ONLY_SYSTEM)
            }
            _ => GenerationRequest::generation(segments, self.model)
                .with_system_prompt(format!("{}\n\n{}", self.system_prompt, PLAIN_OUTPUT_RULE)),
        }
    }

    /// Extraction request. The composed list ends with the field descriptor, so
    /// the task statement travels in the system prompt.
    pub fn extraction_request(&self, segments: Vec<Segment>, task: &str) -> GenerationRequest {
        self.request(segments)
            .with_system_prompt(format!("{JSON_ONLY_SYSTEM}\n\n{}", task.trim()))
    }

    /// Renders submitted form values as one CASE_FIELDS block, in profile order.
    /// Unknown keys are an error; blank values are skipped.
    pub fn render_case_fields(
        &self,
        values: &BTreeMap<String, String>,
    ) -> Result<Option<String>, String> {
        if let Some(unknown) = values
            .keys()
            .find(|key| !self.case_fields.iter().any(|f| f.key == key.as_str()))
        {
            return Err(format!(
                "field '{unknown}' is not used by the '{}' tool",
                self.id
            ));
        }

        let lines: Vec<String> = self
            .case_fields
            .iter()
            .filter_map(|field| {
                let value = values.get(field.key)?.trim();
                (!value.is_empty()).then(|| format!("- {}: {}", field.label, value))
            })
            .collect();

        if lines.is_empty() {
            return Ok(None);
        }
        Ok(Some(format!("DADOS INFORMADOS:\n{}", lines.join("\n"))))
    }
}

/// The built-in tool profiles, keyed by id.
#[derive(Debug, Clone)]
pub struct ToolCatalog {
    profiles: BTreeMap<&'static str, Arc<ToolProfile>>,
}

impl ToolCatalog {
    pub fn builtin() -> Self {
        Self::from_profiles(builtin_profiles())
    }

    pub fn from_profiles(profiles: Vec<ToolProfile>) -> Self {
        Self {
            profiles: profiles
                .into_iter()
                .map(|p| (p.id, Arc::new(p)))
                .collect(),
        }
    }

    pub fn get(&self, id: &str) -> Option<Arc<ToolProfile>> {
        self.profiles.get(id).cloned()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<ToolProfile>> {
        self.profiles.values()
    }
}

fn role(role: ProvenanceRole, label: &'static str) -> RoleSpec {
    RoleSpec { role, label }
}

fn field(key: &'static str, label: &'static str) -> CaseField {
    CaseField { key, label }
}

fn party_schema() -> ExtractionSchema {
    let mut fields = vec![SchemaField::required("nome", FieldType::String)];
    fields.extend(
        [
            "endereco",
            "numero",
            "complemento",
            "bairro",
            "cidade",
            "uf",
            "cep",
            "email",
            "telefone",
            "folha",
        ]
        .into_iter()
        .map(|name| SchemaField::optional(name, FieldType::String)),
    );
    fields.push(
        SchemaField::optional("tipoParte", FieldType::String).with_enum(&[
            "Vítima",
            "Investigado",
            "Representante da Vítima",
        ]),
    );
    ExtractionSchema::new(fields)
}

fn penalty_schema() -> ExtractionSchema {
    ExtractionSchema::new(vec![
        SchemaField::required("numeroProcesso", FieldType::String),
        SchemaField::required("nomeParte", FieldType::String),
        SchemaField::required("cpf", FieldType::String),
        SchemaField::optional("cep", FieldType::String),
        SchemaField::optional("endereco", FieldType::String),
        SchemaField::optional("numero", FieldType::String),
        SchemaField::optional("estaPreso", FieldType::String),
    ])
}

fn background_check_schema() -> ExtractionSchema {
    let mut fields = vec![SchemaField::required("nome", FieldType::String)];
    fields.extend(
        [
            "folha",
            "nacionalidade",
            "cpf",
            "rg",
            "pai",
            "mae",
            "dataNascimento",
        ]
        .into_iter()
        .map(|name| SchemaField::optional(name, FieldType::String)),
    );
    ExtractionSchema::new(fields)
}

fn builtin_profiles() -> Vec<ToolProfile> {
    vec![
        ToolProfile {
            id: "certidao",
            title: "Gerador de Certidões",
            mode: GenerationMode::Generation,
            roles: RoleSchema::new(vec![
                role(ProvenanceRole::StyleModel, "Modelos de certidão"),
                role(ProvenanceRole::DataContent, "Arquivos de dados (conteúdo)"),
            ]),
            case_fields: vec![],
            system_prompt: CERTIDAO_SYSTEM,
            default_instruction: CERTIDAO_INSTRUCTION,
            model: ModelTier::Reasoning,
            attachment_limit_bytes: None,
            extraction_schema: None,
        },
        ToolProfile {
            id: "providencias",
            title: "Certidão de Providências",
            mode: GenerationMode::Generation,
            roles: RoleSchema::new(vec![
                role(ProvenanceRole::CaseFields, "Dados informados"),
                role(ProvenanceRole::DataContent, "Documentos anexos"),
            ]),
            case_fields: vec![
                field("ordem", "Ordem do Promotor"),
                field("providencia", "Providência/Ação Tomada"),
                field("resultado", "Resposta/Resultado Obtido"),
            ],
            system_prompt: PROVIDENCIAS_SYSTEM,
            default_instruction: PROVIDENCIAS_INSTRUCTION,
            model: ModelTier::Fast,
            attachment_limit_bytes: None,
            extraction_schema: None,
        },
        ToolProfile {
            id: "noticia_fato",
            title: "Notícia de Fato: Relatório de Diligências",
            mode: GenerationMode::Generation,
            roles: RoleSchema::new(vec![
                role(ProvenanceRole::ProcedureRecord, "Procedimento / peça inicial"),
                role(ProvenanceRole::ContactEvidence, "Tentativas de contato"),
                role(ProvenanceRole::SubjectRecord, "Dados da vítima"),
                role(ProvenanceRole::DataContent, "Contexto adicional"),
            ]),
            case_fields: vec![],
            system_prompt: NOTICIA_FATO_SYSTEM,
            default_instruction: NOTICIA_FATO_INSTRUCTION,
            model: ModelTier::Reasoning,
            attachment_limit_bytes: None,
            extraction_schema: None,
        },
        ToolProfile {
            id: "oficio",
            title: "Ofício",
            mode: GenerationMode::Generation,
            roles: RoleSchema::new(vec![
                role(ProvenanceRole::CaseFields, "Destinatário"),
                role(ProvenanceRole::DataContent, "Documentos de apoio"),
            ]),
            case_fields: vec![
                field("orgao", "Órgão"),
                field("destinatario", "Responsável"),
            ],
            system_prompt: OFICIO_SYSTEM,
            default_instruction: OFICIO_INSTRUCTION,
            model: ModelTier::Fast,
            attachment_limit_bytes: Some(25 * MB),
            extraction_schema: None,
        },
        ToolProfile {
            id: "activity_analysis",
            title: "Análise de Atividade",
            mode: GenerationMode::Generation,
            roles: RoleSchema::new(vec![
                role(ProvenanceRole::CaseFields, "Dados da atividade"),
                role(ProvenanceRole::DataContent, "Documentos da atividade"),
            ]),
            case_fields: vec![
                field("processo", "Processo"),
                field("tipo", "Tipo de Atividade"),
                field("cargo", "Cargo/Promotoria"),
                field("promotor", "Promotor(a) Designado(a)"),
                field("observacao", "Observações Originais"),
            ],
            system_prompt: ACTIVITY_ANALYSIS_SYSTEM,
            default_instruction: ACTIVITY_ANALYSIS_INSTRUCTION,
            model: ModelTier::Reasoning,
            attachment_limit_bytes: None,
            extraction_schema: None,
        },
        ToolProfile {
            id: "promotion_format",
            title: "Formatador de Promoção de Arquivamento",
            mode: GenerationMode::Generation,
            roles: RoleSchema::new(vec![role(
                ProvenanceRole::DataContent,
                "Páginas digitalizadas",
            )]),
            case_fields: vec![],
            system_prompt: PROMOTION_FORMAT_SYSTEM,
            default_instruction: PROMOTION_FORMAT_INSTRUCTION,
            model: ModelTier::Reasoning,
            attachment_limit_bytes: None,
            extraction_schema: None,
        },
        ToolProfile {
            id: "party_extraction",
            title: "Qualificação de Partes",
            mode: GenerationMode::Extraction,
            roles: RoleSchema::new(vec![role(
                ProvenanceRole::DataContent,
                "B.O., documento ou qualificação",
            )]),
            case_fields: vec![],
            system_prompt: JSON_ONLY_SYSTEM,
            default_instruction: PARTY_EXTRACTION_INSTRUCTION,
            model: ModelTier::Fast,
            attachment_limit_bytes: None,
            extraction_schema: Some(party_schema()),
        },
        ToolProfile {
            id: "penalty_extraction",
            title: "Multa Penal",
            mode: GenerationMode::Extraction,
            roles: RoleSchema::new(vec![role(
                ProvenanceRole::DataContent,
                "Certidões de multa penal",
            )]),
            case_fields: vec![],
            system_prompt: JSON_ONLY_SYSTEM,
            default_instruction: PENALTY_EXTRACTION_INSTRUCTION,
            model: ModelTier::Fast,
            attachment_limit_bytes: None,
            extraction_schema: Some(penalty_schema()),
        },
        ToolProfile {
            id: "mentor",
            title: "Mentor Jurídico",
            mode: GenerationMode::Generation,
            roles: RoleSchema::new(vec![role(
                ProvenanceRole::DataContent,
                "Documentos da consulta",
            )]),
            case_fields: vec![],
            system_prompt: MENTOR_SYSTEM,
            default_instruction: MENTOR_INSTRUCTION,
            model: ModelTier::Reasoning,
            attachment_limit_bytes: None,
            extraction_schema: None,
        },
        ToolProfile {
            id: "data_extractor",
            title: "Extrator Inteligente",
            mode: GenerationMode::Generation,
            roles: RoleSchema::new(vec![role(
                ProvenanceRole::DataContent,
                "Documentos de origem",
            )]),
            case_fields: vec![],
            system_prompt: DATA_EXTRACTOR_SYSTEM,
            default_instruction: DATA_EXTRACTOR_INSTRUCTION,
            model: ModelTier::Fast,
            attachment_limit_bytes: None,
            extraction_schema: None,
        },
        ToolProfile {
            id: "background_check",
            title: "Pesquisa de Antecedentes",
            mode: GenerationMode::Extraction,
            roles: RoleSchema::new(vec![role(
                ProvenanceRole::DataContent,
                "Qualificação da pessoa",
            )]),
            case_fields: vec![],
            system_prompt: JSON_ONLY_SYSTEM,
            default_instruction: BACKGROUND_CHECK_INSTRUCTION,
            model: ModelTier::Fast,
            attachment_limit_bytes: None,
            extraction_schema: Some(background_check_schema()),
        },
    ]
}
