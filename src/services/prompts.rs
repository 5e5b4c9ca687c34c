use crate::domain::models::Article;

pub fn articles_digest(articles: &[Article]) -> String {
    articles
        .iter()
        .map(|a| {
            format!(
                "Date: {}\nTitle: {}\nContent: {}",
                a.published_at.as_deref().unwrap_or("recent"),
                a.title,
                a.description
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn sentiment(text: &str, location: &str) -> String {
    format!(
        r#"Analyze the emotional sentiment and safety metrics for {location} based on these news articles:

{text}

Classify emotions into: calm, angry, depressed, fear, happy. Percentages should sum to 100.

Respond ONLY with JSON in this format:
{{
  "location": "{location}",
  "safetyIndex": number (0-100),
  "aggregatedEmotions": {{
    "calm": percentage,
    "angry": percentage,
    "depressed": percentage,
    "fear": percentage,
    "happy": percentage
  }},
  "crimeStats": {{
    "theft": count,
    "assault": count,
    "harassment": count,
    "robbery": count,
    "vandalism": count,
    "other": count
  }},
  "monthlyTrends": [],
  "currentPeriod": {{
    "name": "current month",
    "totalCrimes": number,
    "comparedToLastMonth": number (percentage),
    "status": "better/worse/same"
  }},
  "safetyConcerns": boolean,
  "summary": "brief summary"
}}"#
    )
}

pub fn crime_timeline(location: &str, articles: &[Article], months: u32) -> String {
    let digest = articles_digest(articles);
    format!(
        r#"Analyze crime patterns and trends for {location} over the past {months} month(s) based on these news articles:

{digest}

Respond ONLY with JSON giving a monthly breakdown, oldest month first:
{{
  "location": "{location}",
  "timeframe": "{months} month(s)",
  "monthlyData": [
    {{
      "month": "Month Year",
      "totalCrimes": number,
      "crimeBreakdown": {{
        "theft": number,
        "assault": number,
        "harassment": number,
        "robbery": number,
        "vandalism": number,
        "other": number
      }},
      "safetyIndex": number (0-100),
      "trend": "increasing/decreasing/stable",
      "peakHours": ["hour1", "hour2"],
      "safestHours": ["hour1", "hour2"]
    }}
  ],
  "overallTrend": {{
    "direction": "improving/worsening/stable",
    "percentageChange": number,
    "mostCommonCrime": "crime type",
    "leastCommonCrime": "crime type"
  }},
  "currentMonth": {{
    "name": "current month",
    "totalCrimes": number,
    "comparedToLastMonth": number (percentage),
    "status": "better/worse/same"
  }},
  "recommendations": ["recommendation 1", "recommendation 2"]
}}"#
    )
}

pub fn verify_location(location_name: &str) -> String {
    format!(
        r#"Classify and verify the following location: "{location_name}"

1. Determine if this is a valid location in India
2. Classify it as: state, union-territory, city, district, or neighborhood
3. Return its hierarchical information

Respond ONLY in valid JSON (no markdown, no backticks):
{{
  "valid": true/false,
  "locationType": "state|union-territory|city|district|neighborhood|invalid",
  "locationName": "verified exact name",
  "state": "parent state name if applicable",
  "district": "district name if applicable",
  "coordinates": {{ "lat": approximate latitude, "lon": approximate longitude }},
  "description": "brief description of the location",
  "confidence": 0-100,
  "note": "any clarification or ambiguity note"
}}"#
    )
}

pub fn insights(analysis_json: &str, location: &str) -> String {
    format!(
        r#"Based on this emotional analysis data for {location}:
{analysis_json}

Provide key insights about the emotional state, safety recommendations, trending patterns and areas of concern.

Respond ONLY with JSON:
{{
  "insights": ["insight1", "insight2"],
  "recommendations": ["rec1", "rec2"],
  "trends": ["trend1", "trend2"],
  "concerns": ["concern1", "concern2"]
}}"#
    )
}

pub fn image(location: &str) -> String {
    format!(
        r#"Analyze this image from {location} for crowd emotions and behavior, safety indicators and any visible concerns.

Respond ONLY with JSON:
{{
  "crowdEmotions": {{ "calm": number, "angry": number, "fear": number, "happy": number }},
  "crowdDensity": "low/medium/high",
  "safetyIndicators": ["indicator1", "indicator2"],
  "concerns": ["concern1", "concern2"],
  "overallMood": "description"
}}"#
    )
}
