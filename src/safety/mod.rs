use serde::{ Deserialize, Serialize };
use std::fmt;

const CRITICAL_KEYWORDS: &[&str] = &[
    "hurt",
    "pain",
    "bleeding",
    "unconscious",
    "not breathing",
    "choking",
    "fire",
    "explosion",
    "weapon",
    "gun",
    "knife",
    "attack",
    "assault",
    "kidnapping",
    "missing",
    "lost",
];

const HIGH_KEYWORDS: &[&str] = &[
    "scared",
    "afraid",
    "threat",
    "danger",
    "bully",
    "harassment",
    "abuse",
    "touch",
    "private",
    "secret",
    "follow",
    "stranger",
];

const HIGH_TYPE_HINTS: &[&str] = &["immediate", "danger", "medical", "abuse"];
const MEDIUM_TYPE_HINTS: &[&str] = &["lost", "missing", "bullying"];

const HIGH_RISK_KEYWORDS: &[&str] = &[
    "immediate danger",
    "emergency",
    "hurt",
    "pain",
    "bleeding",
    "unconscious",
    "choking",
    "poison",
    "fire",
    "weapon",
];

const MEDIUM_RISK_KEYWORDS: &[&str] = &[
    "uncomfortable",
    "scared",
    "worried",
    "strange",
    "suspicious",
    "bullying",
    "harassment",
    "inappropriate",
    "touch",
];

const RECOMMENDATION_MARKERS: &[&str] = &["-", "\u{2022}", "*", "1.", "2.", "3."];
const MAX_RECOMMENDATIONS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmergencyLevel {
    Critical,
    High,
    Medium,
    Low,
}

impl EmergencyLevel {
    pub const ALL: [EmergencyLevel; 4] = [
        EmergencyLevel::Critical,
        EmergencyLevel::High,
        EmergencyLevel::Medium,
        EmergencyLevel::Low,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EmergencyLevel::Critical => "critical",
            EmergencyLevel::High => "high",
            EmergencyLevel::Medium => "medium",
            EmergencyLevel::Low => "low",
        }
    }

    pub fn info(&self) -> LevelInfo {
        match self {
            EmergencyLevel::Critical =>
                LevelInfo {
                    level: *self,
                    description: "Immediate danger to life or safety",
                    response_time: "immediate",
                    authorities_notified: true,
                    sms_priority: "high",
                },
            EmergencyLevel::High =>
                LevelInfo {
                    level: *self,
                    description: "Significant safety concern",
                    response_time: "within_15_minutes",
                    authorities_notified: false,
                    sms_priority: "high",
                },
            EmergencyLevel::Medium =>
                LevelInfo {
                    level: *self,
                    description: "Moderate safety concern",
                    response_time: "within_1_hour",
                    authorities_notified: false,
                    sms_priority: "normal",
                },
            EmergencyLevel::Low =>
                LevelInfo {
                    level: *self,
                    description: "Minor safety concern",
                    response_time: "within_24_hours",
                    authorities_notified: false,
                    sms_priority: "normal",
                },
        }
    }

    /// Guidance shown to the reporter once an alert is raised.
    pub fn next_steps(&self) -> Vec<String> {
        let steps: &[&str] = match self {
            EmergencyLevel::Critical =>
                &[
                    "\u{1F6A8} Call 911 immediately",
                    "\u{1F4F1} Stay on the line with emergency services",
                    "\u{1F4CD} Provide exact location details",
                    "\u{1F465} Keep all emergency contacts informed",
                    "\u{1F4CB} Document everything that happens",
                ],
            EmergencyLevel::High =>
                &[
                    "\u{1F4DE} Contact emergency services if needed",
                    "\u{1F465} Notify all emergency contacts",
                    "\u{1F4F1} Keep phone charged and accessible",
                    "\u{1F4CD} Stay in safe location",
                    "\u{1F4CB} Document incident details",
                ],
            EmergencyLevel::Medium =>
                &[
                    "\u{1F465} Contact emergency contacts",
                    "\u{1F4F1} Monitor situation closely",
                    "\u{1F4CD} Note location and time",
                    "\u{1F4CB} Document what happened",
                    "\u{1F504} Follow up with authorities if needed",
                ],
            EmergencyLevel::Low =>
                &[
                    "\u{1F465} Inform emergency contacts",
                    "\u{1F4F1} Monitor situation",
                    "\u{1F4CB} Document incident",
                    "\u{1F504} Follow up as needed",
                ],
        };
        steps
            .iter()
            .map(|s| s.to_string())
            .collect()
    }
}

impl fmt::Display for EmergencyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LevelInfo {
    pub level: EmergencyLevel,
    pub description: &'static str,
    pub response_time: &'static str,
    pub authorities_notified: bool,
    pub sms_priority: &'static str,
}

/// First match wins: critical keywords, then high keywords, then the type
/// hint. Anything unmatched is medium.
pub fn classify_emergency(description: &str, emergency_type: Option<&str>) -> EmergencyLevel {
    let text = description.to_lowercase();

    if contains_any(&text, CRITICAL_KEYWORDS) {
        return EmergencyLevel::Critical;
    }
    if contains_any(&text, HIGH_KEYWORDS) {
        return EmergencyLevel::High;
    }

    if let Some(hint) = emergency_type {
        let hint = hint.to_lowercase();
        if contains_any(&hint, HIGH_TYPE_HINTS) {
            return EmergencyLevel::High;
        }
        if contains_any(&hint, MEDIUM_TYPE_HINTS) {
            return EmergencyLevel::Medium;
        }
    }

    EmergencyLevel::Medium
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    High,
    Medium,
    Low,
}

pub fn assess_risk(text: &str) -> RiskLevel {
    let text = text.to_lowercase();
    if contains_any(&text, HIGH_RISK_KEYWORDS) {
        RiskLevel::High
    } else if contains_any(&text, MEDIUM_RISK_KEYWORDS) {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

/// Pulls bulleted or numbered lines out of a free-form analysis.
pub fn extract_recommendations(analysis: &str) -> Vec<String> {
    analysis
        .lines()
        .map(str::trim)
        .filter(|line| RECOMMENDATION_MARKERS.iter().any(|m| line.starts_with(m)))
        .map(|line| {
            line.trim_start_matches(|c: char| {
                c == '-' || c == '\u{2022}' || c == '*' || c == '.' || c == ' ' || c.is_ascii_digit()
            }).to_string()
        })
        .take(MAX_RECOMMENDATIONS)
        .collect()
}

fn contains_any(text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| text.contains(k))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn critical_keyword_wins_over_everything() {
        assert_eq!(
            classify_emergency("I'm scared and my friend is BLEEDING", Some("bullying")),
            EmergencyLevel::Critical
        );
    }

    #[test]
    fn high_keyword_beats_type_hint() {
        assert_eq!(
            classify_emergency("a stranger keeps waiting outside", Some("lost")),
            EmergencyLevel::High
        );
    }

    #[test]
    fn type_hint_decides_when_text_is_neutral() {
        assert_eq!(classify_emergency("need help now", Some("missing child")), EmergencyLevel::Medium);
        assert_eq!(classify_emergency("need help now", Some("Medical")), EmergencyLevel::High);
        assert_eq!(classify_emergency("need help now", None), EmergencyLevel::Medium);
    }

    #[test]
    fn level_catalogue_matches_levels() {
        let critical = EmergencyLevel::Critical.info();
        assert!(critical.authorities_notified);
        assert_eq!(critical.response_time, "immediate");
        assert_eq!(EmergencyLevel::Medium.info().sms_priority, "normal");
        assert_eq!(EmergencyLevel::Low.next_steps().len(), 4);
        assert!(EmergencyLevel::Critical.next_steps()[0].ends_with("Call 911 immediately"));
    }

    #[test]
    fn risk_levels() {
        assert_eq!(assess_risk("There was a FIRE"), RiskLevel::High);
        assert_eq!(assess_risk("I feel uncomfortable"), RiskLevel::Medium);
        assert_eq!(assess_risk("what is a good password"), RiskLevel::Low);
    }

    #[test]
    fn recommendations_are_stripped_and_capped() {
        let analysis = "Summary\n- Tell an adult\n\u{2022} Stay calm\n* Write it down\n1. Call\n2. Wait\n3. Report\nDone";
        let recs = extract_recommendations(analysis);
        assert_eq!(recs, vec!["Tell an adult", "Stay calm", "Write it down", "Call", "Wait"]);
    }
}
