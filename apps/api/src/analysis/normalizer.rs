use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::engine_client::engine_message;
use crate::errors::PipelineError;
use crate::models::report::{AnalysisReport, KeywordHit, ReportDetails};

const INCOMPLETE_ANALYSIS_MESSAGE: &str = "AI model returned an incomplete analysis";

/// Engine payload as far as the report contract cares. Every field is
/// optional and anything not listed here is ignored, so an engine that adds
/// fields never breaks the contract.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAnalysis {
    score: Option<f64>,
    match_percentage: Option<f64>,
    skills_found: Option<f64>,
    suggestions: Option<f64>,
    details: Option<RawDetails>,
    #[serde(rename = "_mock")]
    mock: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct RawDetails {
    strengths: Option<Vec<String>>,
    improvements: Option<Vec<String>>,
    keywords: Option<Vec<RawKeyword>>,
}

#[derive(Debug, Deserialize)]
struct RawKeyword {
    word: Option<String>,
    found: Option<bool>,
}

/// Maps the engine's raw answer onto [`AnalysisReport`].
///
/// - `score` and `matchPercentage` are required; floats are rounded and
///   out-of-range values clamped into 0–100.
/// - Counts default to 0, lists to empty; keywords without a word are dropped.
/// - A payload without the required fields is an engine error, carrying the
///   engine's own `message`/`error` text when it sent one.
pub fn normalize(raw: &Value) -> Result<AnalysisReport, PipelineError> {
    let parsed: RawAnalysis = serde_json::from_value(raw.clone()).map_err(|e| {
        PipelineError::EngineError(format!("AI model returned a malformed analysis: {e}"))
    })?;

    let (Some(score), Some(match_percentage)) = (parsed.score, parsed.match_percentage) else {
        let message =
            engine_message(raw).unwrap_or_else(|| INCOMPLETE_ANALYSIS_MESSAGE.to_string());
        return Err(PipelineError::EngineError(message));
    };

    if parsed.mock == Some(true) {
        warn!("Analysis engine returned simulated results (model not loaded)");
    }

    let details = parsed.details.unwrap_or_default();

    Ok(AnalysisReport {
        score: percent("score", score),
        match_percentage: percent("matchPercentage", match_percentage),
        skills_found: count(parsed.skills_found),
        suggestions: count(parsed.suggestions),
        details: ReportDetails {
            strengths: details.strengths.unwrap_or_default(),
            improvements: details.improvements.unwrap_or_default(),
            keywords: details
                .keywords
                .unwrap_or_default()
                .into_iter()
                .filter_map(|k| {
                    k.word.map(|word| KeywordHit {
                        word,
                        found: k.found.unwrap_or(false),
                    })
                })
                .collect(),
        },
    })
}

fn percent(field: &str, value: f64) -> u8 {
    if !value.is_finite() {
        warn!("Engine sent non-finite {field}; reporting 0");
        return 0;
    }
    let rounded = value.round();
    if !(0.0..=100.0).contains(&rounded) {
        warn!("Engine sent out-of-range {field}={value}; clamping to 0-100");
    }
    rounded.clamp(0.0, 100.0) as u8
}

fn count(value: Option<f64>) -> u32 {
    match value {
        Some(v) if v.is_finite() => v.round().clamp(0.0, u32::MAX as f64) as u32,
        _ => 0,
    }
}
