use serde::{Deserialize, Serialize};

/// The stable analysis contract returned by `POST /api/analyze`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub score: u8,            // 0 – 100
    pub match_percentage: u8, // 0 – 100
    pub skills_found: u32,
    pub suggestions: u32,
    pub details: ReportDetails,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportDetails {
    pub strengths: Vec<String>,
    pub improvements: Vec<String>,
    pub keywords: Vec<KeywordHit>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordHit {
    pub word: String,
    pub found: bool,
}

/// Skills the engine knows how to detect, as served by `GET /api/skills`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillCatalog {
    pub technical_skills: Vec<String>,
    pub soft_skills: Vec<String>,
    pub total: usize,
}
