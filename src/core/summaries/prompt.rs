use std::path::Path;

/// Version tag of the built-in prompt; bump together with the file name.
pub const PROMPT_VERSION: &str = "v1";

const BUILTIN_PROMPT: &str = include_str!("../../../prompts/course_eval_summary.v1.txt");

/// The instruction sent with every document.
#[derive(Debug, Clone)]
pub struct SummaryPrompt {
    pub text: String,
    pub source: String,
}

impl SummaryPrompt {
    pub fn builtin() -> Self {
        Self {
            text: BUILTIN_PROMPT.to_string(),
            source: format!("built-in course evaluation prompt {}", PROMPT_VERSION),
        }
    }

    pub async fn from_file(path: &Path) -> std::io::Result<Self> {
        let text = tokio::fs::read_to_string(path).await?;
        if text.trim().is_empty() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("prompt file '{}' is empty", path.display()),
            ));
        }
        Ok(Self {
            text,
            source: path.display().to_string(),
        })
    }
}
