use chrono::{ DateTime, Duration as ChronoDuration, Local, Utc };
use log::info;
use std::collections::{ BTreeMap, HashMap };
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::emergency::{
    ContactNotification,
    EmergencyAlert,
    EmergencyRequest,
    EmergencyStatistics,
    STATUS_ACTIVE,
};
use crate::safety::classify_emergency;
use crate::services::sms::{ BatchOutcome, SmsService, SmsTemplate };

/// `EMG_YYYYMMDD_HHMMSS_` followed by six uppercase hex digits.
pub fn new_alert_id() -> String {
    let suffix: String = Uuid::new_v4().simple().to_string().chars().take(6).collect();
    format!("EMG_{}_{}", Local::now().format("%Y%m%d_%H%M%S"), suffix.to_uppercase())
}

fn within_last_day(timestamp: &str, now: DateTime<Utc>) -> bool {
    match DateTime::parse_from_rfc3339(timestamp) {
        Ok(ts) => {
            let age = now.signed_duration_since(ts.with_timezone(&Utc));
            age <= ChronoDuration::hours(24) && age >= -ChronoDuration::hours(24)
        }
        Err(_) => false,
    }
}

fn sos_payload(alert: &EmergencyAlert, recipients: &[String]) -> HashMap<String, String> {
    let child_name = if alert.user_id.trim().is_empty() { "Child" } else { alert.user_id.as_str() };
    HashMap::from([
        ("child_name".to_string(), child_name.to_string()),
        ("location".to_string(), alert.location.clone()),
        ("contact_number".to_string(), recipients.first().cloned().unwrap_or_default()),
        ("priority".to_string(), alert.emergency_level.to_string()),
        ("description".to_string(), alert.description.clone()),
        ("incident_type".to_string(), alert.emergency_level.to_string()),
        ("status".to_string(), alert.status.clone()),
        ("update_type".to_string(), "emergency".to_string()),
    ])
}

/// Reports each contact `sent` or `failed` by its position in the batch.
fn map_notifications(alert: &EmergencyAlert, outcome: &BatchOutcome) -> Vec<ContactNotification> {
    let now = Utc::now().to_rfc3339();
    alert.contacts
        .iter()
        .enumerate()
        .map(|(idx, contact)| {
            let result = outcome.results.get(idx);
            let sent = result.map(|r| r.success).unwrap_or(false);
            ContactNotification {
                name: contact.name.clone(),
                phone: contact.phone.clone(),
                relationship: contact.relationship.clone(),
                status: (if sent { "sent" } else { "failed" }).to_string(),
                timestamp: now.clone(),
                error: if sent {
                    None
                } else {
                    result.and_then(|r| r.error.clone()).or_else(|| outcome.error.clone())
                },
            }
        })
        .collect()
}

pub struct EmergencyService {
    sms: Arc<SmsService>,
    alerts: RwLock<HashMap<String, EmergencyAlert>>,
}

impl EmergencyService {
    pub fn new(sms: Arc<SmsService>) -> Self {
        Self {
            sms,
            alerts: RwLock::new(HashMap::new()),
        }
    }

    /// Classifies, stores and notifies. `Err` carries the violated rules.
    pub async fn trigger(&self, req: EmergencyRequest) -> Result<EmergencyAlert, Vec<String>> {
        let errors = req.validate();
        if !errors.is_empty() {
            return Err(errors);
        }

        let alert_id = new_alert_id();
        let emergency_level = classify_emergency(&req.description, req.emergency_type.as_deref());
        let mut alert = EmergencyAlert {
            alert_id: alert_id.clone(),
            user_id: req.user_id
                .filter(|u| !u.trim().is_empty())
                .unwrap_or_else(|| "anonymous".to_string()),
            location: req.location,
            description: req.description,
            emergency_type: req.emergency_type,
            coordinates: req.coordinates,
            contacts: req.contacts,
            timestamp: req.timestamp
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| Utc::now().to_rfc3339()),
            status: STATUS_ACTIVE.to_string(),
            emergency_level,
            contacts_notified: Vec::new(),
            next_steps: emergency_level.next_steps(),
            updated_at: None,
        };
        self.alerts.write().await.insert(alert_id.clone(), alert.clone());

        let recipients: Vec<String> = alert.contacts
            .iter()
            .map(|c| c.phone.clone())
            .filter(|p| !p.trim().is_empty())
            .collect();
        let outcome = self.sms.send_emergency_alert(
            &sos_payload(&alert, &recipients),
            &recipients,
            SmsTemplate::SosAlert
        ).await;
        alert.contacts_notified = map_notifications(&alert, &outcome);

        if let Some(stored) = self.alerts.write().await.get_mut(&alert_id) {
            stored.contacts_notified = alert.contacts_notified.clone();
        }
        info!(
            "Emergency alert processed: {}, level: {}, notified {}/{}",
            alert_id,
            emergency_level,
            outcome.sent_count,
            alert.contacts.len()
        );
        Ok(alert)
    }

    pub async fn get(&self, alert_id: &str) -> Option<EmergencyAlert> {
        self.alerts.read().await.get(alert_id).cloned()
    }

    /// Oldest first.
    pub async fn list(&self) -> Vec<EmergencyAlert> {
        let mut all: Vec<EmergencyAlert> = self.alerts.read().await.values().cloned().collect();
        all.sort_by(|a, b| a.alert_id.cmp(&b.alert_id));
        all
    }

    pub async fn update_status(&self, alert_id: &str, status: &str) -> Option<EmergencyAlert> {
        let mut alerts = self.alerts.write().await;
        let alert = alerts.get_mut(alert_id)?;
        alert.status = status.to_string();
        alert.updated_at = Some(Utc::now().to_rfc3339());
        Some(alert.clone())
    }

    pub async fn delete(&self, alert_id: &str) -> bool {
        self.alerts.write().await.remove(alert_id).is_some()
    }

    pub async fn statistics(&self) -> EmergencyStatistics {
        let alerts = self.alerts.read().await;
        let now = Utc::now();
        let total_alerts = alerts.len();
        let active_alerts = alerts
            .values()
            .filter(|a| a.status == STATUS_ACTIVE)
            .count();

        let mut level_distribution = BTreeMap::new();
        for alert in alerts.values() {
            *level_distribution.entry(alert.emergency_level.to_string()).or_insert(0) += 1;
        }

        EmergencyStatistics {
            total_alerts,
            active_alerts,
            resolved_alerts: total_alerts - active_alerts,
            level_distribution,
            last_24_hours: alerts
                .values()
                .filter(|a| within_last_day(&a.timestamp, now))
                .count(),
            timestamp: now.to_rfc3339(),
        }
    }

    /// `(active, total)`.
    pub async fn counts(&self) -> (usize, usize) {
        let alerts = self.alerts.read().await;
        let active = alerts
            .values()
            .filter(|a| a.status == STATUS_ACTIVE)
            .count();
        (active, alerts.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::emergency::{ EmergencyContact, STATUS_RESOLVED };
    use crate::safety::EmergencyLevel;
    use crate::services::sms::{ GatewayReceipt, SmsGateway, SmsSettings };
    use async_trait::async_trait;
    use std::error::Error as StdError;

    /// Rejects any number ending in 0, accepts the rest.
    struct PickyGateway;

    #[async_trait]
    impl SmsGateway for PickyGateway {
        async fn send(&self, to: &str, _body: &str) -> Result<GatewayReceipt, Box<dyn StdError + Send + Sync>> {
            if to.ends_with('0') {
                Err("undeliverable".into())
            } else {
                Ok(GatewayReceipt { message_sid: "SM1".into(), status: "queued".into() })
            }
        }

        async fn health(&self) -> Result<(), Box<dyn StdError + Send + Sync>> {
            Ok(())
        }

        fn name(&self) -> &'static str {
            "picky"
        }
    }

    fn service() -> EmergencyService {
        let sms = SmsService::new(Some(Arc::new(PickyGateway)), SmsSettings::default());
        EmergencyService::new(Arc::new(sms))
    }

    fn contact(name: &str, phone: &str) -> EmergencyContact {
        EmergencyContact { name: name.into(), phone: phone.into(), relationship: "parent".into() }
    }

    fn request(description: &str, contacts: Vec<EmergencyContact>) -> EmergencyRequest {
        EmergencyRequest {
            location: "Central Park".into(),
            description: description.into(),
            contacts,
            timestamp: None,
            user_id: Some("kid-1".into()),
            emergency_type: None,
            coordinates: None,
        }
    }

    #[test]
    fn alert_id_shape() {
        let id = new_alert_id();
        let parts: Vec<&str> = id.split('_').collect();
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[0], "EMG");
        assert_eq!(parts[1].len(), 8);
        assert_eq!(parts[2].len(), 6);
        assert_eq!(parts[3].len(), 6);
    }

    #[tokio::test]
    async fn classifies_and_notifies_each_contact() {
        let svc = service();
        let alert = svc
            .trigger(request("Someone has a knife", vec![contact("Mom", "5551234567"), contact("Dad", "abc")]))
            .await
            .unwrap();

        assert_eq!(alert.emergency_level, EmergencyLevel::Critical);
        assert_eq!(alert.status, STATUS_ACTIVE);
        assert_eq!(alert.next_steps, EmergencyLevel::Critical.next_steps());
        assert_eq!(alert.contacts_notified.len(), 2);
        assert_eq!(alert.contacts_notified[0].status, "sent");
        assert_eq!(alert.contacts_notified[1].status, "failed");
        assert!(alert.contacts_notified[1].error.is_some());

        let stored = svc.get(&alert.alert_id).await.unwrap();
        assert_eq!(stored.contacts_notified.len(), 2);
    }

    #[tokio::test]
    async fn gateway_failure_still_counts_as_sent_through_fallback() {
        let svc = service();
        let alert = svc.trigger(request("I feel unsafe", vec![contact("Aunt", "5551234560")])).await.unwrap();
        assert_eq!(alert.emergency_level, EmergencyLevel::Medium);
        assert_eq!(alert.contacts_notified[0].status, "sent");
    }

    #[tokio::test]
    async fn type_hint_raises_level() {
        let svc = service();
        let mut req = request("please come", vec![contact("Mom", "5551234567")]);
        req.emergency_type = Some("medical".into());
        assert_eq!(svc.trigger(req).await.unwrap().emergency_level, EmergencyLevel::High);
    }

    #[tokio::test]
    async fn validation_errors_are_returned() {
        let svc = service();
        let errors = svc.trigger(request("help", vec![])).await.unwrap_err();
        assert_eq!(errors, vec!["At least one emergency contact is required"]);
        assert_eq!(svc.counts().await, (0, 0));
    }

    #[tokio::test]
    async fn statistics_track_status_changes() {
        let svc = service();
        let first = svc.trigger(request("bleeding badly", vec![contact("Mom", "5551234567")])).await.unwrap();
        svc.trigger(request("a stranger followed me", vec![contact("Mom", "5551234567")])).await.unwrap();

        svc.update_status(&first.alert_id, STATUS_RESOLVED).await.unwrap();
        let stats = svc.statistics().await;
        assert_eq!(stats.total_alerts, 2);
        assert_eq!(stats.active_alerts, 1);
        assert_eq!(stats.resolved_alerts, 1);
        assert_eq!(stats.level_distribution.get("critical"), Some(&1));
        assert_eq!(stats.level_distribution.get("high"), Some(&1));
        assert_eq!(stats.last_24_hours, 2);

        assert!(svc.delete(&first.alert_id).await);
        assert!(svc.get(&first.alert_id).await.is_none());
    }

    #[test]
    fn stale_or_unparseable_timestamps_are_outside_the_window() {
        let now = Utc::now();
        assert!(within_last_day(&now.to_rfc3339(), now));
        assert!(!within_last_day(&(now - ChronoDuration::hours(30)).to_rfc3339(), now));
        assert!(!within_last_day("yesterday", now));
    }
}
