//! Document Exporter: printable page, clipboard text and download filenames.

use serde::Serialize;

/// Placeholder used when a case reference has nothing filesystem-safe in it.
pub const MISSING_REFERENCE: &str = "Sem_Numero";

const PAGE_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="pt-BR">
<head>
<meta charset="utf-8">
<title>{title}</title>
<style>
  @page { margin: 20mm; size: A4; }
  html, body { background: white; color: black; margin: 0; }
  body { font-family: "Times New Roman", Times, serif; font-size: 12pt; line-height: 1.5; }
  .printable-content { width: 170mm; margin: 0 auto; white-space: pre-wrap; text-align: justify; }
  @media screen { .printable-content { padding: 20mm 0; } }
</style>
</head>
<body onload="window.print()">
<main class="printable-content">{body}</main>
</body>
</html>
"#;

#[derive(Debug, Clone, Serialize)]
pub struct PrintableDocument {
    pub title: String,
    pub html: String,
}

/// Wraps `output` in the fixed A4 page. The output is placed as-is: drafts may
/// already carry the basic markup the tools ask for (`<p>`, `<b>`).
pub fn to_printable(output: &str, title_prefix: &str, case_reference: &str) -> PrintableDocument {
    let title = format!("{} {}", title_prefix, sanitize_case_reference(case_reference));
    let html = PAGE_TEMPLATE
        .replacen("{title}", &escape_text(&title), 1)
        .replacen("{body}", output, 1);
    PrintableDocument { title, html }
}

/// Clipboard export is the identity: generation output is already plain text.
pub fn to_clipboard_text(output: &str) -> &str {
    output
}

/// Keeps digits, hyphens and dots. Falls back to the placeholder when nothing is left.
pub fn sanitize_case_reference(reference: &str) -> String {
    let clean: String = reference
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '-' || *c == '.')
        .collect();
    if clean.is_empty() {
        MISSING_REFERENCE.to_string()
    } else {
        clean
    }
}

/// `<prefix>_<sanitized reference>.<extension>`
pub fn export_filename(prefix: &str, case_reference: &str, extension: &str) -> String {
    format!(
        "{}_{}.{}",
        prefix,
        sanitize_case_reference(case_reference),
        extension
    )
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_keeps_digits_hyphens_and_dots() {
        assert_eq!(
            sanitize_case_reference("Proc. nº 1500123-45.2024.8.26.0050"),
            ".1500123-45.2024.8.26.0050"
        );
        assert_eq!(sanitize_case_reference("IP 12/2024"), "122024");
    }

    #[test]
    fn test_sanitize_falls_back_to_placeholder() {
        assert_eq!(sanitize_case_reference(""), MISSING_REFERENCE);
        assert_eq!(sanitize_case_reference("sem número"), MISSING_REFERENCE);
    }

    #[test]
    fn test_export_filename() {
        assert_eq!(
            export_filename("Documentos_Unificados", "1500123-45.2024", "pdf"),
            "Documentos_Unificados_1500123-45.2024.pdf"
        );
        assert_eq!(
            export_filename("Documentos_Unificados", "", "pdf"),
            "Documentos_Unificados_Sem_Numero.pdf"
        );
    }

    #[test]
    fn test_printable_embeds_output_unchanged() {
        let output = "CERTIDÃO\n\nCertifico e dou fé que <b>JOÃO</b> foi intimado.";
        let doc = to_printable(output, "Certidão de Arquivamento", "0001234-56.2024");
        assert_eq!(doc.title, "Certidão de Arquivamento 0001234-56.2024");
        assert!(doc.html.contains(output));
        assert!(doc.html.contains("<title>Certidão de Arquivamento 0001234-56.2024</title>"));
        assert!(doc.html.contains("size: A4"));
    }

    #[test]
    fn test_clipboard_is_identity() {
        let output = "  texto\ncom quebras  ";
        assert_eq!(to_clipboard_text(output), output);
    }
}
