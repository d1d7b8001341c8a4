//! PDF text extraction.
//!
//! Two strategies are tried in order: `pdf-extract` (whole-document layout
//! text) and then `lopdf` (per-page content-stream text, pages joined with a
//! form feed so page counting still works). When both fail, the returned
//! [`ExtractError::Failed`] carries both underlying messages.

use thiserror::Error;

/// Page separator emitted between pages by the secondary strategy.
pub const PAGE_BREAK: char = '\u{000C}';

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Failed to extract text with both methods: {primary}, {secondary}")]
    Failed { primary: String, secondary: String },
}

/// Extracts plain text from PDF bytes.
pub fn extract_pdf_text(bytes: &[u8]) -> Result<String, ExtractError> {
    match extract_primary(bytes) {
        Ok(text) => Ok(text),
        Err(primary) => {
            tracing::warn!(error = %primary, "primary PDF extraction failed, trying lopdf");
            extract_secondary(bytes).map_err(|secondary| ExtractError::Failed { primary, secondary })
        }
    }
}

fn extract_primary(bytes: &[u8]) -> Result<String, String> {
    // pdf-extract panics on some malformed streams instead of returning Err.
    match std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes)) {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err("pdf-extract panicked while parsing".to_string()),
    }
}

fn extract_secondary(bytes: &[u8]) -> Result<String, String> {
    let doc = lopdf::Document::load_mem(bytes).map_err(|e| e.to_string())?;
    let mut out = String::new();
    for (i, page) in doc.get_pages().keys().enumerate() {
        if i > 0 {
            out.push(PAGE_BREAK);
        }
        let text = doc.extract_text(&[*page]).map_err(|e| e.to_string())?;
        out.push_str(&text);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn garbage_fails_with_both_messages() {
        let err = extract_pdf_text(b"not a pdf").unwrap_err();
        let ExtractError::Failed { primary, secondary } = &err;
        assert!(!primary.is_empty());
        assert!(!secondary.is_empty());
        assert!(err.to_string().contains("both methods"));
    }

    #[test]
    fn empty_input_is_an_error() {
        assert!(extract_pdf_text(b"").is_err());
    }
}
