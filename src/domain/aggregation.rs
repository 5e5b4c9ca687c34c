use crate::domain::models::{
    AnalysisRecord, ApiUsed, CrimeStats, EmotionBreakdown, SentimentAnalysis,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Emotional aggregation of several sentiment results.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedAnalysis {
    pub location: String,
    pub safety_index: u8,
    pub aggregated_emotions: EmotionBreakdown,
    pub crime_stats: CrimeStats,
    pub ai_providers: Vec<ApiUsed>,
    pub confidence: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LocationSummary {
    pub location: String,
    pub total_analyses: usize,
    pub average_safety: f64,
    pub average_emotions: EmotionAverages,
    pub last_analysis: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct EmotionAverages {
    pub calm: f64,
    pub angry: f64,
    pub depressed: f64,
    pub fear: f64,
    pub happy: f64,
}

/// Safety index heuristic shared by the keyword analyzer and its timeline.
pub fn safety_index(emotions: &EmotionBreakdown, crime_total: u32) -> u8 {
    let mut index = 100.0;

    index -= emotions.angry as f64 * 0.3;
    index -= emotions.fear as f64 * 0.4;
    index -= emotions.depressed as f64 * 0.2;

    index += emotions.happy as f64 * 0.2;
    index += emotions.calm as f64 * 0.3;

    // Each reported crime costs a point, capped at 30.
    index -= crime_total.min(30) as f64;

    index.round().clamp(0.0, 100.0) as u8
}

fn rounded_mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        0.0
    } else {
        (sum / count as f64).round()
    }
}

fn mean_crime_stats(stats: &[CrimeStats]) -> CrimeStats {
    let mut merged = CrimeStats::default();
    for category in CrimeStats::CATEGORIES {
        let mean = rounded_mean(stats.iter().map(|s| {
            s.entries()
                .iter()
                .find(|(name, _)| *name == category)
                .map(|(_, v)| *v as f64)
                .unwrap_or(0.0)
        }));
        if let Some(slot) = merged.get_mut(category) {
            *slot = mean as u32;
        }
    }
    merged
}

fn mean_emotions(items: &[EmotionBreakdown]) -> EmotionBreakdown {
    let mean = |f: fn(&EmotionBreakdown) -> u8| -> u8 {
        rounded_mean(items.iter().map(|e| f(e) as f64)).clamp(0.0, 100.0) as u8
    };
    EmotionBreakdown {
        calm: mean(|e| e.calm),
        angry: mean(|e| e.angry),
        depressed: mean(|e| e.depressed),
        fear: mean(|e| e.fear),
        happy: mean(|e| e.happy),
    }
}

/// Averages results from several sources. `None` for an empty slice.
pub fn average_analyses(analyses: &[SentimentAnalysis]) -> Option<AggregatedAnalysis> {
    let first = analyses.first()?;

    let emotions: Vec<EmotionBreakdown> =
        analyses.iter().map(|a| a.aggregated_emotions).collect();
    let crimes: Vec<CrimeStats> = analyses.iter().map(|a| a.crime_stats).collect();
    let safety = rounded_mean(analyses.iter().map(|a| a.safety_index as f64));

    let confidence = if analyses.len() > 1 { "high" } else { "medium" };

    Some(AggregatedAnalysis {
        location: first.location.clone(),
        safety_index: safety.clamp(0.0, 100.0) as u8,
        aggregated_emotions: mean_emotions(&emotions),
        crime_stats: mean_crime_stats(&crimes),
        ai_providers: analyses.iter().map(|a| a.api_used).collect(),
        confidence: confidence.to_string(),
    })
}

/// Rescales the five categories so they sum to 100. All-zero input is
/// returned untouched.
pub fn normalize(emotions: EmotionBreakdown) -> EmotionBreakdown {
    let total = emotions.total();
    if total == 0 || total == 100 {
        return emotions;
    }

    let scale = |v: u8| ((v as f64) * 100.0 / total as f64).round() as u8;
    let mut normalized = EmotionBreakdown {
        calm: scale(emotions.calm),
        angry: scale(emotions.angry),
        depressed: scale(emotions.depressed),
        fear: scale(emotions.fear),
        happy: scale(emotions.happy),
    };

    // Push rounding drift onto the largest bucket.
    let drift = 100i32 - normalized.total() as i32;
    if drift != 0 {
        let largest = [
            &mut normalized.calm,
            &mut normalized.angry,
            &mut normalized.depressed,
            &mut normalized.fear,
            &mut normalized.happy,
        ]
        .into_iter()
        .max_by_key(|v| **v);
        if let Some(slot) = largest {
            *slot = (*slot as i32 + drift).clamp(0, 100) as u8;
        }
    }
    normalized
}

/// Per-location averages over stored analysis records. Records whose payload
/// is not a sentiment analysis are ignored.
pub fn location_summary(location: &str, history: &[AnalysisRecord]) -> LocationSummary {
    let analyses: Vec<(DateTime<Utc>, SentimentAnalysis)> = history
        .iter()
        .filter_map(|record| {
            serde_json::from_value::<SentimentAnalysis>(record.data.clone())
                .ok()
                .map(|a| (record.timestamp, a))
        })
        .collect();

    let avg = |f: fn(&SentimentAnalysis) -> f64| -> f64 {
        if analyses.is_empty() {
            return 0.0;
        }
        let sum: f64 = analyses.iter().map(|(_, a)| f(a)).sum();
        (sum / analyses.len() as f64 * 10.0).round() / 10.0
    };

    LocationSummary {
        location: location.to_string(),
        total_analyses: analyses.len(),
        average_safety: avg(|a| a.safety_index as f64),
        average_emotions: EmotionAverages {
            calm: avg(|a| a.aggregated_emotions.calm as f64),
            angry: avg(|a| a.aggregated_emotions.angry as f64),
            depressed: avg(|a| a.aggregated_emotions.depressed as f64),
            fear: avg(|a| a.aggregated_emotions.fear as f64),
            happy: avg(|a| a.aggregated_emotions.happy as f64),
        },
        last_analysis: analyses.iter().map(|(ts, _)| *ts).max(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn analysis(safety: u8, emotions: EmotionBreakdown, crimes: CrimeStats, used: ApiUsed) -> SentimentAnalysis {
        let mut a: SentimentAnalysis = serde_json::from_value(json!({ "location": "Pune" })).unwrap();
        a.safety_index = safety;
        a.aggregated_emotions = emotions;
        a.crime_stats = crimes;
        a.api_used = used;
        a
    }

    #[test]
    fn test_safety_index_bounds() {
        let calm = EmotionBreakdown { calm: 100, ..Default::default() };
        assert_eq!(safety_index(&calm, 0), 100);

        let fearful = EmotionBreakdown { fear: 100, angry: 100, ..Default::default() };
        assert_eq!(safety_index(&fearful, 500), 0);

        let mixed = EmotionBreakdown { calm: 40, angry: 10, depressed: 10, fear: 20, happy: 20 };
        // 100 - 3 - 8 - 2 + 4 + 12 - 10
        assert_eq!(safety_index(&mixed, 10), 93);
    }

    #[test]
    fn test_crime_penalty_is_capped() {
        let neutral = EmotionBreakdown::default();
        assert_eq!(safety_index(&neutral, 30), 70);
        assert_eq!(safety_index(&neutral, 90), 70);
    }

    #[test]
    fn test_average_two_providers() {
        let a = analysis(
            60,
            EmotionBreakdown { calm: 40, angry: 10, depressed: 10, fear: 20, happy: 20 },
            CrimeStats { theft: 3, assault: 1, ..Default::default() },
            ApiUsed::Gemini,
        );
        let b = analysis(
            71,
            EmotionBreakdown { calm: 21, angry: 30, depressed: 10, fear: 20, happy: 19 },
            CrimeStats { theft: 4, robbery: 2, ..Default::default() },
            ApiUsed::Mistral,
        );

        let merged = average_analyses(&[a, b]).unwrap();
        assert_eq!(merged.safety_index, 66);
        assert_eq!(merged.aggregated_emotions.calm, 31);
        assert_eq!(merged.aggregated_emotions.angry, 20);
        assert_eq!(merged.crime_stats.theft, 4);
        assert_eq!(merged.crime_stats.robbery, 1);
        assert_eq!(merged.ai_providers, vec![ApiUsed::Gemini, ApiUsed::Mistral]);
        assert_eq!(merged.confidence, "high");

        assert!(average_analyses(&[]).is_none());
    }

    #[test]
    fn test_crime_stats_mean_rounds() {
        let merged = average_analyses(&[
            analysis(
                50,
                EmotionBreakdown::uniform(),
                CrimeStats { theft: 1, other: 5, ..Default::default() },
                ApiUsed::Cerebras,
            ),
            analysis(
                50,
                EmotionBreakdown::uniform(),
                CrimeStats { theft: 2, other: 0, ..Default::default() },
                ApiUsed::Mistral,
            ),
        ])
        .unwrap();
        assert_eq!(merged.crime_stats.theft, 2);
        assert_eq!(merged.crime_stats.other, 3);
    }

    #[test]
    fn test_normalize_sums_to_hundred() {
        let raw = EmotionBreakdown { calm: 50, angry: 50, depressed: 50, fear: 0, happy: 0 };
        let normalized = normalize(raw);
        assert_eq!(normalized.total(), 100);
        assert_eq!(normalized.angry, 33);

        assert_eq!(normalize(EmotionBreakdown::default()), EmotionBreakdown::default());
    }

    #[test]
    fn test_location_summary_skips_foreign_payloads() {
        let now = Utc::now();
        let history = vec![
            AnalysisRecord {
                location: "Pune".into(),
                timestamp: now,
                data: json!({ "safetyIndex": 80, "aggregatedEmotions": { "calm": 50 } }),
            },
            AnalysisRecord {
                location: "Pune".into(),
                timestamp: now - chrono::Duration::days(1),
                data: json!({ "safetyIndex": 61, "aggregatedEmotions": { "calm": 25 } }),
            },
            AnalysisRecord {
                location: "Pune".into(),
                timestamp: now,
                data: json!("not an analysis"),
            },
        ];

        let summary = location_summary("Pune", &history);
        assert_eq!(summary.total_analyses, 2);
        assert_eq!(summary.average_safety, 70.5);
        assert_eq!(summary.average_emotions.calm, 37.5);
        assert_eq!(summary.last_analysis, Some(now));
    }
}
