// Shared prompt fragments.
// Each tool's own wording lives in generation/prompts.rs; this file holds the
// pieces every tool reuses, chiefly the refinement turn.

/// Heading placed before the output under correction.
pub const CURRENT_DRAFT_HEADING: &str = "DOCUMENTO ATUAL (A SER CORRIGIDO):";

/// Heading placed before the operator's correction request.
pub const NEW_INSTRUCTION_HEADING: &str = "NOVA INSTRUÇÃO DE CORREÇÃO/REFINAMENTO:";

/// Closing directive of every refinement request.
pub const REFINEMENT_DIRECTIVE: &str = "\
DIRETRIZES PARA REVISÃO:
- Aplique a correção solicitada mantendo o estilo e a formatação do modelo original.
- Se a instrução pedir um dado que não estava no texto anterior, REVISE OS ARQUIVOS ANEXOS (FONTES DE DADOS) novamente.
- Retorne o documento completo reescrito.";

/// Appended to every drafting system prompt.
pub const PLAIN_OUTPUT_RULE: &str = "\
Retorne apenas o texto final do documento, sem comentários adicionais. \
NÃO coloque o texto entre aspas. \
Se faltar alguma informação essencial, indique entre colchetes [DADO FALTANTE].";

/// System prompt fragment for schema-constrained extraction.
pub const JSON_ONLY_SYSTEM: &str = "\
Você extrai dados de documentos jurídicos com precisão. \
Responda SOMENTE com um objeto JSON válido, sem blocos de código markdown e sem explicações. \
Nunca invente valores: omita campos opcionais que não constem dos documentos.";

pub fn current_draft_segment(output: &str) -> String {
    format!("{CURRENT_DRAFT_HEADING}\n{output}")
}

pub fn new_instruction_segment(instruction: &str) -> String {
    format!("{NEW_INSTRUCTION_HEADING}\n\"{}\"", instruction.trim())
}
