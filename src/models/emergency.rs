use serde::{ Deserialize, Serialize };
use std::collections::BTreeMap;

use crate::safety::EmergencyLevel;

pub const STATUS_ACTIVE: &str = "active";
pub const STATUS_RESOLVED: &str = "resolved";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmergencyContact {
    pub name: String,
    pub phone: String,
    #[serde(default)]
    pub relationship: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmergencyRequest {
    pub location: String,
    pub description: String,
    pub contacts: Vec<EmergencyContact>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub emergency_type: Option<String>,
    #[serde(default)]
    pub coordinates: Option<BTreeMap<String, f64>>,
}

impl EmergencyRequest {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.location.trim().is_empty() {
            errors.push("Location is required".to_string());
        }
        if self.description.trim().is_empty() {
            errors.push("Emergency description is required".to_string());
        }
        if self.contacts.is_empty() {
            errors.push("At least one emergency contact is required".to_string());
        }
        for contact in &self.contacts {
            if contact.name.trim().is_empty() {
                errors.push("Contact name is required".to_string());
            }
            if contact.phone.trim().is_empty() {
                errors.push("Contact phone number is required".to_string());
            }
        }
        errors
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactNotification {
    pub name: String,
    pub phone: String,
    pub relationship: String,
    pub status: String,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmergencyAlert {
    pub alert_id: String,
    pub user_id: String,
    pub location: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emergency_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<BTreeMap<String, f64>>,
    pub contacts: Vec<EmergencyContact>,
    pub timestamp: String,
    pub status: String,
    pub emergency_level: EmergencyLevel,
    pub contacts_notified: Vec<ContactNotification>,
    pub next_steps: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmergencyResponse {
    pub alert_id: String,
    pub status: String,
    pub timestamp: String,
    pub contacts_notified: Vec<ContactNotification>,
    pub emergency_level: EmergencyLevel,
    pub next_steps: Vec<String>,
}

impl From<&EmergencyAlert> for EmergencyResponse {
    fn from(alert: &EmergencyAlert) -> Self {
        Self {
            alert_id: alert.alert_id.clone(),
            status: alert.status.clone(),
            timestamp: alert.timestamp.clone(),
            contacts_notified: alert.contacts_notified.clone(),
            emergency_level: alert.emergency_level,
            next_steps: alert.next_steps.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EmergencyStatistics {
    pub total_alerts: usize,
    pub active_alerts: usize,
    pub resolved_alerts: usize,
    pub level_distribution: BTreeMap<String, usize>,
    pub last_24_hours: usize,
    pub timestamp: String,
}
