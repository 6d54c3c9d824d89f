use serde::{Deserialize, Serialize};

/// One row of the output table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryRecord {
    pub file_path: String,
    pub summary: String,
}

/// A document handed to the summarization provider.
#[derive(Debug, Clone)]
pub struct DocumentPayload {
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl DocumentPayload {
    pub fn pdf(data: Vec<u8>) -> Self {
        Self {
            mime_type: "application/pdf".to_string(),
            data,
        }
    }
}

/// How the generated text is written into the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SummaryFormat {
    /// Trimmed text, line breaks kept; the CSV writer quotes the field.
    #[default]
    Multiline,
    /// Older table layout: line breaks become `\r` and the text is wrapped in literal quotes.
    LegacyCarriageReturn,
}

impl SummaryFormat {
    pub fn apply(self, raw: &str) -> String {
        let trimmed = raw.trim();
        match self {
            SummaryFormat::Multiline => trimmed.to_string(),
            SummaryFormat::LegacyCarriageReturn => {
                format!("\"{}\"", trimmed.replace('\n', "\r"))
            }
        }
    }
}

/// Counters for one pass of the batch driver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub summarized: usize,
    pub skipped: usize,
    pub failed: usize,
}
