use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// AI backends that can sit in the fallback chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Cerebras,
    Mistral,
    Gemini,
}

impl ProviderKind {
    pub fn label(&self) -> &'static str {
        match self {
            ProviderKind::Cerebras => "Cerebras",
            ProviderKind::Mistral => "Mistral AI",
            ProviderKind::Gemini => "Gemini AI",
        }
    }
}

impl TryFrom<&str> for ProviderKind {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_lowercase().as_str() {
            "cerebras" => Ok(ProviderKind::Cerebras),
            "mistral" => Ok(ProviderKind::Mistral),
            "gemini" => Ok(ProviderKind::Gemini),
            other => Err(format!("unknown AI provider '{other}'")),
        }
    }
}

/// Which stage of the fallback chain produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ApiUsed {
    Cerebras,
    Mistral,
    Gemini,
    SimpleAnalyzer,
    #[default]
    Fallback,
}

impl From<ProviderKind> for ApiUsed {
    fn from(kind: ProviderKind) -> Self {
        match kind {
            ProviderKind::Cerebras => ApiUsed::Cerebras,
            ProviderKind::Mistral => ApiUsed::Mistral,
            ProviderKind::Gemini => ApiUsed::Gemini,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub title: String,
    #[serde(default, alias = "content")]
    pub description: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<String>,
}

impl Article {
    pub fn text(&self) -> String {
        format!("{} {}", self.title, self.description)
    }
}

/// Emotion category percentages (0-100 each).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct EmotionBreakdown {
    #[serde(default, deserialize_with = "lenient_percent")]
    pub calm: u8,
    #[serde(default, deserialize_with = "lenient_percent")]
    pub angry: u8,
    #[serde(default, deserialize_with = "lenient_percent")]
    pub depressed: u8,
    #[serde(default, deserialize_with = "lenient_percent")]
    pub fear: u8,
    #[serde(default, deserialize_with = "lenient_percent")]
    pub happy: u8,
}

impl EmotionBreakdown {
    pub const fn uniform() -> Self {
        Self {
            calm: 20,
            angry: 20,
            depressed: 20,
            fear: 20,
            happy: 20,
        }
    }

    /// Distribution used when no emotional signal is present in the text.
    pub const fn keyword_default() -> Self {
        Self {
            calm: 30,
            angry: 15,
            depressed: 15,
            fear: 20,
            happy: 20,
        }
    }

    pub fn total(&self) -> u32 {
        [self.calm, self.angry, self.depressed, self.fear, self.happy]
            .iter()
            .map(|v| *v as u32)
            .sum()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct CrimeStats {
    #[serde(default, deserialize_with = "lenient_count")]
    pub theft: u32,
    #[serde(default, deserialize_with = "lenient_count")]
    pub assault: u32,
    #[serde(default, deserialize_with = "lenient_count")]
    pub harassment: u32,
    #[serde(default, deserialize_with = "lenient_count")]
    pub robbery: u32,
    #[serde(default, deserialize_with = "lenient_count")]
    pub vandalism: u32,
    #[serde(default, deserialize_with = "lenient_count")]
    pub other: u32,
}

impl CrimeStats {
    pub const CATEGORIES: [&'static str; 6] = [
        "theft",
        "assault",
        "harassment",
        "robbery",
        "vandalism",
        "other",
    ];

    pub fn total(&self) -> u32 {
        self.entries().iter().map(|(_, v)| *v).sum()
    }

    /// Counts in category order.
    pub fn entries(&self) -> [(&'static str, u32); 6] {
        [
            ("theft", self.theft),
            ("assault", self.assault),
            ("harassment", self.harassment),
            ("robbery", self.robbery),
            ("vandalism", self.vandalism),
            ("other", self.other),
        ]
    }

    pub fn get_mut(&mut self, category: &str) -> Option<&mut u32> {
        match category {
            "theft" => Some(&mut self.theft),
            "assault" => Some(&mut self.assault),
            "harassment" => Some(&mut self.harassment),
            "robbery" => Some(&mut self.robbery),
            "vandalism" => Some(&mut self.vandalism),
            "other" => Some(&mut self.other),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyTrend {
    #[serde(default)]
    pub month: String,
    #[serde(default, deserialize_with = "lenient_count")]
    pub total_crimes: u32,
    #[serde(default, alias = "crimeTypes")]
    pub crime_breakdown: CrimeStats,
    #[serde(default = "neutral_safety", deserialize_with = "lenient_safety")]
    pub safety_index: u8,
    #[serde(default = "stable")]
    pub trend: String,
    #[serde(default, deserialize_with = "lenient_strings")]
    pub peak_hours: Vec<String>,
    #[serde(default, deserialize_with = "lenient_strings")]
    pub safest_hours: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CurrentPeriod {
    #[serde(default, alias = "month")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_count")]
    pub total_crimes: u32,
    #[serde(default, deserialize_with = "lenient_number")]
    pub compared_to_last_month: f64,
    #[serde(default = "unknown")]
    pub status: String,
}

impl Default for CurrentPeriod {
    fn default() -> Self {
        Self {
            name: String::new(),
            total_crimes: 0,
            compared_to_last_month: 0.0,
            status: unknown(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OverallTrend {
    #[serde(default = "stable")]
    pub direction: String,
    #[serde(default, deserialize_with = "lenient_number")]
    pub percentage_change: f64,
    #[serde(default = "not_available")]
    pub most_common_crime: String,
    #[serde(default = "not_available")]
    pub least_common_crime: String,
}

impl Default for OverallTrend {
    fn default() -> Self {
        Self {
            direction: stable(),
            percentage_change: 0.0,
            most_common_crime: not_available(),
            least_common_crime: not_available(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SentimentAnalysis {
    #[serde(default)]
    pub location: String,
    #[serde(default = "neutral_safety", deserialize_with = "lenient_safety")]
    pub safety_index: u8,
    #[serde(default)]
    pub aggregated_emotions: EmotionBreakdown,
    #[serde(default)]
    pub crime_stats: CrimeStats,
    #[serde(default)]
    pub monthly_trends: Vec<MonthlyTrend>,
    #[serde(default)]
    pub current_period: CurrentPeriod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub safety_concerns: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default)]
    pub api_used: ApiUsed,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CrimeTimeline {
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub timeframe: String,
    #[serde(default)]
    pub monthly_data: Vec<MonthlyTrend>,
    #[serde(default)]
    pub overall_trend: OverallTrend,
    #[serde(default)]
    pub current_month: CurrentPeriod,
    #[serde(default, deserialize_with = "lenient_strings")]
    pub recommendations: Vec<String>,
    #[serde(default)]
    pub api_used: ApiUsed,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum LocationType {
    State,
    UnionTerritory,
    City,
    District,
    Neighborhood,
    #[serde(other)]
    Invalid,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Coordinates {
    #[serde(default, deserialize_with = "lenient_number")]
    pub lat: f64,
    #[serde(default, alias = "lng", deserialize_with = "lenient_number")]
    pub lon: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LocationVerification {
    #[serde(default)]
    pub valid: bool,
    #[serde(default = "invalid_location")]
    pub location_type: LocationType,
    #[serde(default)]
    pub location_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub district: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient_percent")]
    pub confidence: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default)]
    pub api_used: ApiUsed,
}

impl LocationVerification {
    pub fn invalid(location_name: &str, note: &str) -> Self {
        Self {
            valid: false,
            location_type: LocationType::Invalid,
            location_name: location_name.to_string(),
            state: None,
            district: None,
            coordinates: None,
            description: None,
            confidence: 0,
            note: Some(note.to_string()),
            api_used: ApiUsed::Fallback,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Insights {
    #[serde(default, deserialize_with = "lenient_strings")]
    pub insights: Vec<String>,
    #[serde(default, deserialize_with = "lenient_strings")]
    pub recommendations: Vec<String>,
    #[serde(default, deserialize_with = "lenient_strings")]
    pub trends: Vec<String>,
    #[serde(default, deserialize_with = "lenient_strings")]
    pub concerns: Vec<String>,
    #[serde(default)]
    pub api_used: ApiUsed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct CrowdEmotions {
    #[serde(default, deserialize_with = "lenient_percent")]
    pub calm: u8,
    #[serde(default, deserialize_with = "lenient_percent")]
    pub angry: u8,
    #[serde(default, deserialize_with = "lenient_percent")]
    pub fear: u8,
    #[serde(default, deserialize_with = "lenient_percent")]
    pub happy: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ImageAnalysis {
    #[serde(default)]
    pub crowd_emotions: CrowdEmotions,
    #[serde(default = "unknown")]
    pub crowd_density: String,
    #[serde(default, deserialize_with = "lenient_strings")]
    pub safety_indicators: Vec<String>,
    #[serde(default, deserialize_with = "lenient_strings")]
    pub concerns: Vec<String>,
    #[serde(default)]
    pub overall_mood: String,
    #[serde(default)]
    pub api_used: ApiUsed,
}

/// Stored wrapper around any persisted analysis payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub location: String,
    pub timestamp: DateTime<Utc>,
    pub data: Value,
}

fn neutral_safety() -> u8 {
    50
}

fn stable() -> String {
    "stable".to_string()
}

fn unknown() -> String {
    "unknown".to_string()
}

fn not_available() -> String {
    "N/A".to_string()
}

fn invalid_location() -> LocationType {
    LocationType::Invalid
}

/// Reads numbers the way LLMs tend to emit them: plain numbers, numeric
/// strings, or strings with a trailing percent sign.
pub fn number_from_value(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|n| n.is_finite())
}

fn lenient_number<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(number_from_value(&value).unwrap_or(0.0))
}

fn lenient_count<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let n = number_from_value(&value).unwrap_or(0.0);
    Ok(n.round().clamp(0.0, u32::MAX as f64) as u32)
}

fn lenient_percent<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let n = number_from_value(&value).unwrap_or(0.0);
    Ok(n.round().clamp(0.0, 100.0) as u8)
}

fn lenient_safety<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let n = number_from_value(&value).unwrap_or(50.0);
    Ok(n.round().clamp(0.0, 100.0) as u8)
}

fn lenient_strings<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect(),
        Value::String(s) if !s.trim().is_empty() => vec![s],
        _ => Vec::new(),
    })
}
