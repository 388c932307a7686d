//! Text-generation seam.
//!
//! The Q&A engine, documentation generator and comparison engine hand a
//! finished prompt to a [`Generator`]. Backends (OpenAI-compatible chat
//! completions, a disabled stub) live in the `gitsage` app crate.

use anyhow::Result;
use async_trait::async_trait;

/// Answer used whenever the repository context cannot support one.
pub const NO_ANSWER: &str = "I don't know based on the repository.";

#[async_trait]
pub trait Generator: Send + Sync {
    fn name(&self) -> &str;
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Run `prompt` and substitute [`NO_ANSWER`] for empty output.
pub async fn generate_or_default(generator: &dyn Generator, prompt: &str) -> Result<String> {
    let out = generator.generate(prompt).await?;
    let out = out.trim();
    if out.is_empty() {
        tracing::debug!(generator = generator.name(), "empty generation; using fallback answer");
        return Ok(NO_ANSWER.to_string());
    }
    Ok(out.to_string())
}


#[cfg(test)]
mod tests {
    use super::testing::Scripted;
    use super::*;

    #[tokio::test]
    async fn test_empty_output_becomes_no_answer() {
        let g = Scripted::new(&["   \n"]);
        assert_eq!(generate_or_default(&g, "p").await.unwrap(), NO_ANSWER);
    }

    #[tokio::test]
    async fn test_output_is_trimmed() {
        let g = Scripted::new(&["  It parses TOML.\n"]);
        assert_eq!(generate_or_default(&g, "p").await.unwrap(), "It parses TOML.");
    }
}
