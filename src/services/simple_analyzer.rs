//! Keyword-based analyzer used when every AI provider has failed.
//! Counts emotion and crime vocabulary in news headlines and snippets.

use crate::domain::aggregation::safety_index;
use crate::domain::calendar;
use crate::domain::models::{
    ApiUsed, Article, CrimeStats, CrimeTimeline, CurrentPeriod, EmotionBreakdown, MonthlyTrend,
    OverallTrend, SentimentAnalysis,
};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

const EMOTION_KEYWORDS: [(&str, &[&str]); 5] = [
    (
        "calm",
        &["peaceful", "calm", "stable", "normal", "routine", "safe", "secure", "tranquil", "quiet"],
    ),
    (
        "angry",
        &["protest", "outrage", "angry", "furious", "riot", "clash", "violence", "mob", "rage"],
    ),
    (
        "depressed",
        &["tragic", "sad", "victim", "loss", "grief", "death", "killed", "died", "mourning"],
    ),
    (
        "fear",
        &["fear", "danger", "threat", "unsafe", "scared", "terror", "panic", "worried", "concern"],
    ),
    (
        "happy",
        &["improved", "success", "celebration", "positive", "better", "progress", "achievement", "good"],
    ),
];

const CRIME_KEYWORDS: [(&str, &[&str]); 6] = [
    (
        "theft",
        &["theft", "stolen", "robbery", "burglary", "loot", "steal", "robbed", "burglar"],
    ),
    (
        "assault",
        &["assault", "attack", "beaten", "violence", "fight", "hit", "injured", "hurt"],
    ),
    (
        "harassment",
        &["harassment", "stalking", "abuse", "molest", "harass", "stalker", "abused"],
    ),
    (
        "robbery",
        &["robbery", "dacoity", "armed", "gunpoint", "robbed", "loot", "heist"],
    ),
    (
        "vandalism",
        &["vandalism", "damage", "destroyed", "broken", "vandal", "graffiti", "defaced"],
    ),
    (
        "other",
        &["fraud", "scam", "cybercrime", "cheating", "forgery", "bribery", "corruption"],
    ),
];

const PEAK_HOURS: &str = "10 PM - 2 AM";
const SAFEST_HOURS: &str = "6 AM - 10 AM";

struct KeywordPattern {
    category: &'static str,
    whole_word: Regex,
    with_count: Regex,
}

fn compile(table: &[(&'static str, &[&str])]) -> Vec<KeywordPattern> {
    table
        .iter()
        .flat_map(|&(category, words)| {
            words.iter().map(move |word| KeywordPattern {
                category,
                whole_word: Regex::new(&format!(r"(?i)\b{}\b", regex::escape(word)))
                    .expect("keyword pattern"),
                with_count: Regex::new(&format!(r"(?i)(\d+)\s+{}", regex::escape(word)))
                    .expect("keyword count pattern"),
            })
        })
        .collect()
}

static EMOTION_PATTERNS: Lazy<Vec<KeywordPattern>> = Lazy::new(|| compile(&EMOTION_KEYWORDS));
static CRIME_PATTERNS: Lazy<Vec<KeywordPattern>> = Lazy::new(|| compile(&CRIME_KEYWORDS));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EmotionCounts {
    pub calm: u32,
    pub angry: u32,
    pub depressed: u32,
    pub fear: u32,
    pub happy: u32,
}

impl EmotionCounts {
    fn slot(&mut self, category: &str) -> Option<&mut u32> {
        match category {
            "calm" => Some(&mut self.calm),
            "angry" => Some(&mut self.angry),
            "depressed" => Some(&mut self.depressed),
            "fear" => Some(&mut self.fear),
            "happy" => Some(&mut self.happy),
            _ => None,
        }
    }

    fn total(&self) -> u32 {
        self.calm + self.angry + self.depressed + self.fear + self.happy
    }
}

fn combined_text(articles: &[Article]) -> String {
    articles
        .iter()
        .map(Article::text)
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

pub fn count_emotions(text: &str) -> EmotionCounts {
    let mut counts = EmotionCounts::default();
    for pattern in EMOTION_PATTERNS.iter() {
        let hits = pattern.whole_word.find_iter(text).count() as u32;
        if let Some(slot) = counts.slot(pattern.category) {
            *slot += hits;
        }
    }
    counts
}

/// Converts raw counts to rounded percentages, or the default distribution
/// when nothing matched.
pub fn emotion_percentages(counts: &EmotionCounts) -> EmotionBreakdown {
    let total = counts.total();
    if total == 0 {
        return EmotionBreakdown::keyword_default();
    }
    let pct = |count: u32| ((count as f64 / total as f64) * 100.0).round() as u8;
    EmotionBreakdown {
        calm: pct(counts.calm),
        angry: pct(counts.angry),
        depressed: pct(counts.depressed),
        fear: pct(counts.fear),
        happy: pct(counts.happy),
    }
}

/// Keyword hits over the combined text, plus explicit figures such as
/// "5 thefts" found in individual articles.
pub fn count_crimes(text: &str, articles: &[Article]) -> CrimeStats {
    let mut stats = CrimeStats::default();

    for pattern in CRIME_PATTERNS.iter() {
        let hits = pattern.whole_word.find_iter(text).count() as u32;
        if let Some(slot) = stats.get_mut(pattern.category) {
            *slot += hits;
        }
    }

    for article in articles {
        let article_text = article.text().to_lowercase();
        for pattern in CRIME_PATTERNS.iter() {
            for caps in pattern.with_count.captures_iter(&article_text) {
                let figure = caps
                    .get(1)
                    .and_then(|m| m.as_str().parse::<u32>().ok())
                    .unwrap_or(0);
                // Larger figures are usually years, prices or totals.
                if figure > 0 && figure < 100 {
                    if let Some(slot) = stats.get_mut(pattern.category) {
                        *slot += figure;
                    }
                }
            }
        }
    }

    stats
}

pub fn most_common_crime(stats: &CrimeStats) -> String {
    let mut best = ("theft", 0u32);
    for (category, count) in stats.entries() {
        if count > best.1 {
            best = (category, count);
        }
    }
    if best.1 > 0 {
        best.0.to_string()
    } else {
        "N/A".to_string()
    }
}

pub fn least_common_crime(stats: &CrimeStats) -> String {
    let mut least: Option<(&str, u32)> = None;
    for (category, count) in stats.entries() {
        if count > 0 && least.map_or(true, |(_, min)| count < min) {
            least = Some((category, count));
        }
    }
    least
        .map(|(category, _)| category.to_string())
        .unwrap_or_else(|| "N/A".to_string())
}

pub fn recommendations(stats: &CrimeStats) -> Vec<String> {
    let mut recs = Vec::new();
    if stats.theft > 5 {
        recs.push("Be vigilant about personal belongings in crowded areas".to_string());
    }
    if stats.assault > 3 {
        recs.push("Avoid isolated areas, especially during late hours".to_string());
    }
    if stats.harassment > 2 {
        recs.push("Use well-lit and populated routes".to_string());
    }
    if stats.total() > 15 {
        recs.push("Stay informed about local safety alerts".to_string());
    }
    if recs.is_empty() {
        recs.push("Continue following general safety precautions".to_string());
    }
    recs
}

struct KeywordReport {
    emotions: EmotionBreakdown,
    crimes: CrimeStats,
    safety: u8,
    month: String,
}

fn build_report(articles: &[Article], now: DateTime<Utc>) -> KeywordReport {
    let text = combined_text(articles);
    let emotions = emotion_percentages(&count_emotions(&text));
    let crimes = count_crimes(&text, articles);
    let safety = safety_index(&emotions, crimes.total());
    KeywordReport {
        emotions,
        crimes,
        safety,
        month: calendar::month_label(now),
    }
}

fn current_trend(report: &KeywordReport) -> MonthlyTrend {
    MonthlyTrend {
        month: report.month.clone(),
        total_crimes: report.crimes.total(),
        crime_breakdown: report.crimes,
        safety_index: safety_index(&EmotionBreakdown::keyword_default(), report.crimes.total()),
        trend: "stable".to_string(),
        peak_hours: vec![PEAK_HOURS.to_string()],
        safest_hours: vec![SAFEST_HOURS.to_string()],
    }
}

fn current_period(report: &KeywordReport) -> CurrentPeriod {
    CurrentPeriod {
        name: report.month.clone(),
        total_crimes: report.crimes.total(),
        compared_to_last_month: 0.0,
        status: "stable".to_string(),
    }
}

pub fn analyze(articles: &[Article], location: &str) -> SentimentAnalysis {
    analyze_at(articles, location, Utc::now())
}

pub fn analyze_at(articles: &[Article], location: &str, now: DateTime<Utc>) -> SentimentAnalysis {
    tracing::info!(
        "Using keyword analyzer for {} articles about {}",
        articles.len(),
        location
    );
    let report = build_report(articles, now);

    tracing::debug!(
        "Keyword analysis complete: safety {}, crimes {}",
        report.safety,
        report.crimes.total()
    );

    SentimentAnalysis {
        location: location.to_string(),
        safety_index: report.safety,
        aggregated_emotions: report.emotions,
        crime_stats: report.crimes,
        monthly_trends: vec![current_trend(&report)],
        current_period: current_period(&report),
        summary: Some(format!(
            "Analysis based on {} news articles from {}",
            articles.len(),
            location
        )),
        safety_concerns: None,
        method: Some("keyword-based".to_string()),
        api_used: ApiUsed::SimpleAnalyzer,
        warning: None,
    }
}

pub fn timeline(articles: &[Article], location: &str, months: u32) -> CrimeTimeline {
    timeline_at(articles, location, months, Utc::now())
}

pub fn timeline_at(
    articles: &[Article],
    location: &str,
    months: u32,
    now: DateTime<Utc>,
) -> CrimeTimeline {
    tracing::info!("Building keyword timeline for {}", location);
    let report = build_report(articles, now);

    CrimeTimeline {
        location: location.to_string(),
        timeframe: format!("{months} month(s)"),
        monthly_data: vec![current_trend(&report)],
        overall_trend: OverallTrend {
            direction: "stable".to_string(),
            percentage_change: 0.0,
            most_common_crime: most_common_crime(&report.crimes),
            least_common_crime: least_common_crime(&report.crimes),
        },
        current_month: current_period(&report),
        recommendations: recommendations(&report.crimes),
        api_used: ApiUsed::SimpleAnalyzer,
        warning: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn article(title: &str, description: &str) -> Article {
        Article {
            title: title.to_string(),
            description: description.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_whole_word_matching() {
        let counts = count_emotions("calm calmness Calm recalm, calm.");
        assert_eq!(counts.calm, 3);
        assert_eq!(counts.total(), 3);
    }

    #[test]
    fn test_default_distribution_without_keywords() {
        let counts = count_emotions("weather update for the weekend");
        assert_eq!(emotion_percentages(&counts), EmotionBreakdown::keyword_default());
    }

    #[test]
    fn test_percentages_are_rounded() {
        let counts = EmotionCounts {
            calm: 1,
            angry: 1,
            fear: 1,
            ..Default::default()
        };
        let pct = emotion_percentages(&counts);
        assert_eq!(pct.calm, 33);
        assert_eq!(pct.angry, 33);
        assert_eq!(pct.fear, 33);
        assert_eq!(pct.happy, 0);
    }

    #[test]
    fn test_crime_figures_are_added() {
        let articles = vec![article("Police log 5 thefts in Andheri", "one theft solved")];
        let text = combined_text(&articles);
        let stats = count_crimes(&text, &articles);
        // "theft" as a whole word once, plus the figure 5 before "thefts"
        assert_eq!(stats.theft, 6);
    }

    #[test]
    fn test_implausible_figures_are_ignored() {
        let articles = vec![article("2024 theft report", "150 theft cases")];
        let text = combined_text(&articles);
        let stats = count_crimes(&text, &articles);
        assert_eq!(stats.theft, 2);
    }

    #[test]
    fn test_shared_keywords_count_in_every_category() {
        let articles = vec![article("Armed robbery near station", "")];
        let text = combined_text(&articles);
        let stats = count_crimes(&text, &articles);
        assert_eq!(stats.theft, 1);
        assert_eq!(stats.robbery, 2);
    }

    #[test]
    fn test_most_and_least_common() {
        let stats = CrimeStats {
            theft: 4,
            assault: 1,
            robbery: 4,
            other: 2,
            ..Default::default()
        };
        assert_eq!(most_common_crime(&stats), "theft");
        assert_eq!(least_common_crime(&stats), "assault");

        let empty = CrimeStats::default();
        assert_eq!(most_common_crime(&empty), "N/A");
        assert_eq!(least_common_crime(&empty), "N/A");
    }

    #[test]
    fn test_recommendation_rules() {
        let quiet = CrimeStats::default();
        assert_eq!(
            recommendations(&quiet),
            vec!["Continue following general safety precautions".to_string()]
        );

        let busy = CrimeStats {
            theft: 6,
            assault: 4,
            harassment: 3,
            robbery: 3,
            ..Default::default()
        };
        let recs = recommendations(&busy);
        assert_eq!(recs.len(), 4);
        assert_eq!(recs[3], "Stay informed about local safety alerts");
    }

    #[test]
    fn test_analyze_builds_full_result() {
        let now = Utc.with_ymd_and_hms(2025, 6, 15, 10, 0, 0).unwrap();
        let articles = vec![
            article("Protest turns violent in Kolkata", "Mob clash leaves two injured"),
            article("Residents feel safe after patrols", "Peaceful evening in the market"),
        ];

        let result = analyze_at(&articles, "Kolkata", now);
        assert_eq!(result.api_used, ApiUsed::SimpleAnalyzer);
        assert_eq!(result.method.as_deref(), Some("keyword-based"));
        assert_eq!(result.location, "Kolkata");
        assert_eq!(result.monthly_trends.len(), 1);
        assert_eq!(result.monthly_trends[0].month, "June 2025");
        assert_eq!(result.current_period.status, "stable");
        // protest, mob, clash -> angry; safe, peaceful -> calm
        assert_eq!(result.aggregated_emotions.angry, 60);
        assert_eq!(result.aggregated_emotions.calm, 40);
        assert_eq!(result.crime_stats.assault, 1);
        assert!(result.safety_index <= 100);
    }

    #[test]
    fn test_timeline_from_keywords() {
        let now = Utc.with_ymd_and_hms(2025, 1, 5, 10, 0, 0).unwrap();
        let articles = vec![article("Burglary and theft in Sector Five", "fraud ring busted")];
        let timeline = timeline_at(&articles, "Noida", 3, now);

        assert_eq!(timeline.timeframe, "3 month(s)");
        assert_eq!(timeline.monthly_data[0].peak_hours, vec!["10 PM - 2 AM"]);
        assert_eq!(timeline.overall_trend.most_common_crime, "theft");
        assert_eq!(timeline.overall_trend.least_common_crime, "other");
        assert_eq!(timeline.current_month.name, "January 2025");
        assert_eq!(timeline.api_used, ApiUsed::SimpleAnalyzer);
    }
}
