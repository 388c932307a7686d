//! Repository comparison.
//!
//! Each repository gets a short technical profile written by the generator
//! from retrieved context. Profiles are classified against a fixed feature
//! list and compared in a structured verdict. Generator output that is not
//! valid JSON falls back to fixed defaults, so a comparison always renders.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::generate::{generate_or_default, Generator};
use crate::models::RepoId;
use crate::qa::{build_context, ensure_ready};
use crate::retrieve::Retriever;

const PROFILE_QUERY: &str = "Describe the tech stack, architecture, and purpose of this repository";
const PROFILE_TOP_K: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Support {
    Yes,
    Partial,
    No,
}

impl fmt::Display for Support {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Support::Yes => "yes",
            Support::Partial => "partial",
            Support::No => "no",
        })
    }
}

/// Features compared between repositories, with the value used when the
/// classifier gives no usable answer.
pub const FEATURES: &[(&str, Support)] = &[
    ("TypeScript Support", Support::Partial),
    ("Server-Side Rendering", Support::No),
    ("Hot Module Replacement", Support::Partial),
    ("Built-in Testing", Support::Partial),
    ("Mobile Support", Support::Partial),
    ("GraphQL Integration", Support::No),
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SideBySide {
    #[serde(default)]
    pub repo_a: Vec<String>,
    #[serde(default)]
    pub repo_b: Vec<String>,
}

/// The generator's structured verdict.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    #[serde(default)]
    pub overview: Vec<String>,
    #[serde(default)]
    pub architecture: Vec<String>,
    #[serde(default)]
    pub strengths: SideBySide,
    #[serde(default)]
    pub tradeoffs: Vec<String>,
    #[serde(default)]
    pub ideal_use_cases: SideBySide,
    #[serde(default)]
    pub verdict: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeatureRow {
    pub feature: String,
    pub repo_a: Support,
    pub repo_b: Support,
}

#[derive(Debug, Clone, Serialize)]
pub struct Comparison {
    pub repo_a: RepoId,
    pub repo_b: RepoId,
    pub profile_a: String,
    pub profile_b: String,
    pub features: Vec<FeatureRow>,
    pub verdict: Verdict,
}

pub struct ComparisonEngine {
    retriever: Retriever,
    generator: Arc<dyn Generator>,
}

impl ComparisonEngine {
    pub fn new(retriever: Retriever, generator: Arc<dyn Generator>) -> Self {
        Self {
            retriever,
            generator,
        }
    }

    pub async fn compare(&self, repo_a: &RepoId, repo_b: &RepoId) -> Result<Comparison> {
        let store = self.retriever.store().as_ref();
        ensure_ready(store, repo_a, None).await?;
        ensure_ready(store, repo_b, None).await?;

        let profile_a = self.profile(repo_a).await?;
        let profile_b = self.profile(repo_b).await?;

        let features_a = self.classify(&profile_a).await?;
        let features_b = self.classify(&profile_b).await?;
        let features = FEATURES
            .iter()
            .zip(features_a.into_iter().zip(features_b))
            .map(|((name, _), (a, b))| FeatureRow {
                feature: name.to_string(),
                repo_a: a,
                repo_b: b,
            })
            .collect();

        let raw = self
            .generator
            .generate(&verdict_prompt(&profile_a, &profile_b))
            .await?;
        let verdict = parse_verdict(&raw);

        Ok(Comparison {
            repo_a: repo_a.clone(),
            repo_b: repo_b.clone(),
            profile_a,
            profile_b,
            features,
            verdict,
        })
    }

    /// A concise technical profile of one repository.
    pub async fn profile(&self, repo: &RepoId) -> Result<String> {
        let results = self
            .retriever
            .retrieve(PROFILE_QUERY, PROFILE_TOP_K, Some(repo))
            .await?;
        let prompt = format!(
            "You are analyzing a GitHub repository.

Using ONLY the context below, write a concise technical profile covering:
- Purpose
- Tech stack
- Architecture
- Notable features

Repository Context:
{}
",
            build_context(&results)
        );
        generate_or_default(self.generator.as_ref(), &prompt).await
    }

    /// Support level per entry of [`FEATURES`], in order.
    pub async fn classify(&self, profile: &str) -> Result<Vec<Support>> {
        let feature_list: Vec<String> = FEATURES.iter().map(|(f, _)| format!("- {}", f)).collect();
        let prompt = format!(
            "Given the repository description below, classify whether
each feature is supported as:
- yes
- partial
- no

Return STRICT JSON only, an object mapping each feature name to its value.

Features:
{}

Repository Description:
{}
",
            feature_list.join("\n"),
            profile
        );
        let raw = self.generator.generate(&prompt).await?;
        Ok(parse_features(&raw))
    }
}

/// Parse classifier output, falling back per feature on anything unusable.
pub fn parse_features(raw: &str) -> Vec<Support> {
    let parsed: BTreeMap<String, serde_json::Value> = match serde_json::from_str(strip_fences(raw)) {
        Ok(map) => map,
        Err(e) => {
            tracing::debug!(error = %e, "feature classification was not JSON; using defaults");
            BTreeMap::new()
        }
    };
    FEATURES
        .iter()
        .map(|(name, fallback)| {
            let value = parsed
                .get(*name)
                .and_then(|v| v.as_str())
                .map(|v| v.trim().to_lowercase());
            match value.as_deref() {
                Some("yes") => Support::Yes,
                Some("partial") => Support::Partial,
                Some("no") => Support::No,
                _ => *fallback,
            }
        })
        .collect()
}

/// Parse the structured verdict; non-JSON output becomes the overview.
pub fn parse_verdict(raw: &str) -> Verdict {
    match serde_json::from_str(strip_fences(raw)) {
        Ok(v) => v,
        Err(_) => Verdict {
            overview: vec![raw.trim().to_string()]
                .into_iter()
                .filter(|s| !s.is_empty())
                .collect(),
            ..Verdict::default()
        },
    }
}

/// Models often wrap JSON in a Markdown code fence.
fn strip_fences(raw: &str) -> &str {
    let t = raw.trim();
    let Some(rest) = t.strip_prefix("```") else {
        return t;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

fn verdict_prompt(profile_a: &str, profile_b: &str) -> String {
    format!(
        r#"You are an expert software architect.

Compare the following two repositories.

Return the result STRICTLY in valid JSON with this structure:

{{
  "overview": [string],
  "architecture": [string],
  "strengths": {{ "repo_a": [string], "repo_b": [string] }},
  "tradeoffs": [string],
  "ideal_use_cases": {{ "repo_a": [string], "repo_b": [string] }},
  "verdict": [string]
}}

Rules:
- Each array item must be 1 clear bullet point
- Be detailed but concise
- Do NOT include markdown
- Do NOT include extra text outside JSON

Repository A:
{profile_a}

Repository B:
{profile_b}
"#
    )
}
