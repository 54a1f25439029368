use chrono::{ NaiveDate, NaiveTime };
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{ Deserialize, Serialize };
use std::collections::BTreeMap;

static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap()
});

pub const STATUS_DRAFT_GENERATED: &str = "Draft Generated";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComplaintRequest {
    pub child_name: String,
    pub child_age: i64,
    #[serde(default)]
    pub child_gender: Option<String>,
    #[serde(default)]
    pub child_school: Option<String>,
    #[serde(default)]
    pub child_grade: Option<String>,
    #[serde(default)]
    pub child_contact: Option<String>,
    pub incident_date: String,
    pub incident_time: String,
    pub location: String,
    pub incident_type: String,
    pub incident_description: String,
    pub guardian_name: String,
    pub guardian_phone: String,
    #[serde(default)]
    pub guardian_email: Option<String>,
    #[serde(default)]
    pub guardian_address: Option<String>,
    #[serde(default)]
    pub witnesses: Option<String>,
    #[serde(default)]
    pub evidence: Option<String>,
    #[serde(default)]
    pub previous_incidents: Option<String>,
    #[serde(default)]
    pub wants_legal_action: bool,
    #[serde(default)]
    pub wants_mediation: bool,
    #[serde(default)]
    pub wants_restraining_order: bool,
    #[serde(default)]
    pub wants_compensation: bool,
    #[serde(default)]
    pub additional_requests: Option<String>,
    #[serde(default)]
    pub submission_timestamp: Option<String>,
}

fn blank(value: &str) -> bool {
    value.trim().is_empty()
}

/// Present and non-blank.
pub fn provided(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

impl ComplaintRequest {
    /// Every violated rule, in a stable order. Empty means valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if blank(&self.child_name) {
            errors.push("Child's name is required".to_string());
        }
        if !(1..=18).contains(&self.child_age) {
            errors.push("Child's age must be between 1 and 18".to_string());
        }
        if blank(&self.incident_description) {
            errors.push("Incident description is required".to_string());
        }
        if blank(&self.location) {
            errors.push("Location is required".to_string());
        }
        if blank(&self.guardian_name) {
            errors.push("Guardian's name is required".to_string());
        }
        if blank(&self.guardian_phone) {
            errors.push("Guardian's phone number is required".to_string());
        } else if self.guardian_phone.chars().filter(char::is_ascii_digit).count() < 10 {
            errors.push("Guardian's phone number must contain at least 10 digits".to_string());
        }
        if let Some(email) = provided(&self.guardian_email) {
            if !EMAIL.is_match(email) {
                errors.push("Guardian's email address is invalid".to_string());
            }
        }
        if NaiveDate::parse_from_str(self.incident_date.trim(), "%Y-%m-%d").is_err() {
            errors.push("Incident date must be in YYYY-MM-DD format".to_string());
        }
        if NaiveTime::parse_from_str(self.incident_time.trim(), "%H:%M").is_err() {
            errors.push("Incident time must be in HH:MM format".to_string());
        }

        errors
    }

    /// The "Requested Actions" sentence built from the legal preference flags.
    pub fn requested_actions(&self) -> Option<String> {
        let mut actions = Vec::new();
        if self.wants_legal_action {
            actions.push("pursue legal action");
        }
        if self.wants_mediation {
            actions.push("mediate this matter");
        }
        if self.wants_restraining_order {
            actions.push("obtain a restraining order");
        }
        if self.wants_compensation {
            actions.push("seek appropriate compensation");
        }
        if actions.is_empty() {
            None
        } else {
            Some(format!("Requested Actions: We request to {}.", actions.join(", ")))
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplaintRecord {
    pub complaint_id: String,
    pub status: String,
    pub complaint_text: String,
    pub submission_timestamp: String,
    pub generated_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    pub fallback: bool,
    pub request_data: ComplaintRequest,
    pub download_urls: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComplaintResponse {
    pub complaint_id: String,
    pub status: String,
    pub complaint_text: String,
    pub submission_timestamp: String,
    pub generated_at: String,
    pub download_urls: BTreeMap<String, String>,
    pub fallback: bool,
}

impl From<&ComplaintRecord> for ComplaintResponse {
    fn from(record: &ComplaintRecord) -> Self {
        Self {
            complaint_id: record.complaint_id.clone(),
            status: record.status.clone(),
            complaint_text: record.complaint_text.clone(),
            submission_timestamp: record.submission_timestamp.clone(),
            generated_at: record.generated_at.clone(),
            download_urls: record.download_urls.clone(),
            fallback: record.fallback,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn valid() -> ComplaintRequest {
        ComplaintRequest {
            child_name: "Ava".into(),
            child_age: 10,
            incident_date: "2024-04-02".into(),
            incident_time: "15:30".into(),
            location: "School playground".into(),
            incident_type: "bullying".into(),
            incident_description: "Repeated pushing during recess".into(),
            guardian_name: "Jordan".into(),
            guardian_phone: "555-123-4567".into(),
            ..Default::default()
        }
    }

    #[test]
    fn valid_request_has_no_errors() {
        assert!(valid().validate().is_empty());
    }

    #[test]
    fn collects_every_violation() {
        let req = ComplaintRequest {
            child_name: " ".into(),
            child_age: 19,
            guardian_phone: "12345".into(),
            guardian_email: Some("not-an-email".into()),
            incident_date: "02/04/2024".into(),
            incident_time: "3pm".into(),
            ..valid()
        };
        let errors = req.validate();
        assert_eq!(
            errors,
            vec![
                "Child's name is required",
                "Child's age must be between 1 and 18",
                "Guardian's phone number must contain at least 10 digits",
                "Guardian's email address is invalid",
                "Incident date must be in YYYY-MM-DD format",
                "Incident time must be in HH:MM format"
            ]
        );
    }

    #[test]
    fn requested_actions_lists_selected_flags_only() {
        let req = ComplaintRequest { wants_mediation: true, wants_compensation: true, ..valid() };
        assert_eq!(
            req.requested_actions().as_deref(),
            Some("Requested Actions: We request to mediate this matter, seek appropriate compensation.")
        );
        assert_eq!(valid().requested_actions(), None);
    }
}
