use async_trait::async_trait;
use chrono::Utc;
use log::{ error, info, warn };
use reqwest::Client as HttpClient;
use serde::{ Deserialize, Serialize };
use std::collections::HashMap;
use std::error::Error as StdError;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use super::rate_limit::{ RateLimitSnapshot, SmsRateLimiter };
use crate::cli::Args;
use crate::text::TextCleaner;

const TWILIO_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SmsTemplate {
    SosAlert,
    SafetyConcern,
    IncidentReport,
    StatusUpdate,
}

impl SmsTemplate {
    pub fn as_str(&self) -> &'static str {
        match self {
            SmsTemplate::SosAlert => "sos_alert",
            SmsTemplate::SafetyConcern => "safety_concern",
            SmsTemplate::IncidentReport => "incident_report",
            SmsTemplate::StatusUpdate => "status_update",
        }
    }

    pub fn body(&self) -> &'static str {
        match self {
            SmsTemplate::SosAlert =>
                "\u{1F6A8} EMERGENCY ALERT: {child_name} needs immediate assistance at {location}. Contact: {contact_number}. Priority: {priority}",
            SmsTemplate::SafetyConcern =>
                "\u{26A0}\u{FE0F} SAFETY CONCERN: {description}. Location: {location}. Contact: {contact_number}",
            SmsTemplate::IncidentReport =>
                "\u{1F4DD} INCIDENT REPORT: {incident_type} reported at {location}. Status: {status}. Contact: {contact_number}",
            SmsTemplate::StatusUpdate =>
                "\u{1F4CA} STATUS UPDATE: {update_type} - {description}. Contact: {contact_number}",
        }
    }

    /// Substitutes `{name}` placeholders from `data`, then from `defaults`.
    pub fn render(&self, data: &HashMap<String, String>, defaults: &[(&str, &str)]) -> String {
        let mut message = self.body().to_string();
        for (key, fallback) in defaults {
            let value = data
                .get(*key)
                .map(String::as_str)
                .unwrap_or(fallback);
            message = message.replace(&format!("{{{}}}", key), value);
        }
        message
    }
}

impl FromStr for SmsTemplate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sos_alert" => Ok(SmsTemplate::SosAlert),
            "safety_concern" => Ok(SmsTemplate::SafetyConcern),
            "incident_report" => Ok(SmsTemplate::IncidentReport),
            "status_update" => Ok(SmsTemplate::StatusUpdate),
            other => Err(format!("Unknown SMS template: {}", other)),
        }
    }
}

const ALERT_DEFAULTS: &[(&str, &str)] = &[
    ("child_name", "Child"),
    ("location", "Unknown location"),
    ("contact_number", "Unknown"),
    ("priority", "High"),
    ("description", "Safety concern"),
    ("incident_type", "Incident"),
    ("status", "Reported"),
    ("update_type", "Update"),
];

const NOTIFICATION_DEFAULTS: &[(&str, &str)] = &[
    ("description", "Safety notification"),
    ("location", "Unknown location"),
    ("contact_number", "Unknown"),
    ("incident_type", "Incident"),
    ("status", "Reported"),
    ("update_type", "Update"),
];

const STATUS_DEFAULTS: &[(&str, &str)] = &[
    ("update_type", "Status update"),
    ("description", "No details provided"),
    ("contact_number", "Unknown"),
];

pub fn is_valid_phone(phone: &str) -> bool {
    let digits = phone.chars().filter(char::is_ascii_digit).count();
    (7..=15).contains(&digits)
}

/// E.164-style formatting for the gateway.
pub fn format_phone(phone: &str) -> String {
    if phone.starts_with('+') {
        return phone.to_string();
    }
    let digits: String = phone.chars().filter(char::is_ascii_digit).collect();
    if digits.len() == 10 {
        format!("+1{}", digits)
    } else {
        format!("+{}", digits)
    }
}

fn truncate(message: &str, max_length: usize) -> String {
    if message.chars().count() <= max_length {
        return message.to_string();
    }
    let keep = max_length.saturating_sub(3);
    let mut out: String = message.chars().take(keep).collect();
    out.push_str("...");
    out
}

#[derive(Debug, Clone)]
pub struct GatewayReceipt {
    pub message_sid: String,
    pub status: String,
}

#[async_trait]
pub trait SmsGateway: Send + Sync {
    async fn send(&self, to: &str, body: &str) -> Result<GatewayReceipt, Box<dyn StdError + Send + Sync>>;
    async fn health(&self) -> Result<(), Box<dyn StdError + Send + Sync>>;
    fn name(&self) -> &'static str;
}

/// Twilio REST messaging API.
pub struct TwilioGateway {
    http: HttpClient,
    base_url: String,
    account_sid: String,
    auth_token: String,
    from_number: String,
}

#[derive(Deserialize)]
struct TwilioMessage {
    sid: String,
    #[serde(default)]
    status: Option<String>,
}

impl TwilioGateway {
    pub fn new(
        base_url: &str,
        account_sid: &str,
        auth_token: &str,
        from_number: &str
    ) -> Result<Self, Box<dyn StdError + Send + Sync>> {
        let http = HttpClient::builder().timeout(TWILIO_TIMEOUT).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            account_sid: account_sid.to_string(),
            auth_token: auth_token.to_string(),
            from_number: from_number.to_string(),
        })
    }
}

#[async_trait]
impl SmsGateway for TwilioGateway {
    async fn send(&self, to: &str, body: &str) -> Result<GatewayReceipt, Box<dyn StdError + Send + Sync>> {
        let url = format!("{}/2010-04-01/Accounts/{}/Messages.json", self.base_url, self.account_sid);
        let form = [
            ("To", to),
            ("From", self.from_number.as_str()),
            ("Body", body),
        ];
        let message = self.http
            .post(&url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&form)
            .send().await?
            .error_for_status()?
            .json::<TwilioMessage>().await?;

        Ok(GatewayReceipt {
            message_sid: message.sid,
            status: message.status.unwrap_or_else(|| "queued".to_string()),
        })
    }

    async fn health(&self) -> Result<(), Box<dyn StdError + Send + Sync>> {
        let url = format!("{}/2010-04-01/Accounts/{}.json", self.base_url, self.account_sid);
        self.http
            .get(&url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .send().await?
            .error_for_status()?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "twilio"
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SmsResult {
    pub success: bool,
    pub recipient: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_sid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl SmsResult {
    fn failed(recipient: &str, error: impl Into<String>, provider: Option<&str>) -> Self {
        Self {
            success: false,
            recipient: recipient.to_string(),
            provider: provider.map(String::from),
            message_sid: None,
            status: None,
            error: Some(error.into()),
            timestamp: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchOutcome {
    pub success: bool,
    pub sent_count: u32,
    pub total_recipients: usize,
    pub failed_count: usize,
    pub results: Vec<SmsResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: String,
}

impl BatchOutcome {
    fn rejected(error: &str, total_recipients: usize) -> Self {
        Self {
            success: false,
            sent_count: 0,
            total_recipients,
            failed_count: total_recipients,
            results: Vec::new(),
            error: Some(error.to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SmsHealth {
    pub status: String,
    pub service: String,
    pub twilio_status: String,
    pub fallback_methods: Vec<String>,
    pub rate_limits: RateLimitSnapshot,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SmsUsageStats {
    pub twilio_configured: bool,
    pub max_message_length: usize,
    pub default_country_code: String,
    pub retry_attempts: u32,
    pub max_sms_per_hour: u32,
    pub max_sms_per_day: u32,
    pub sms_sent_count: u32,
    pub sms_sent_today: u32,
}

#[derive(Debug, Clone)]
pub struct SmsSettings {
    pub max_length: usize,
    pub default_country: String,
    pub retry_attempts: u32,
    pub max_per_hour: u32,
    pub max_per_day: u32,
    pub send_delay: Duration,
}

impl SmsSettings {
    pub fn from_args(args: &Args) -> Self {
        Self {
            max_length: args.sms_max_length,
            default_country: args.sms_default_country.clone(),
            retry_attempts: args.sms_retry_attempts,
            max_per_hour: args.sms_max_per_hour,
            max_per_day: args.sms_max_per_day,
            send_delay: Duration::from_millis(args.sms_send_delay_ms),
        }
    }
}

impl Default for SmsSettings {
    fn default() -> Self {
        Self {
            max_length: 160,
            default_country: "+1".to_string(),
            retry_attempts: 3,
            max_per_hour: 100,
            max_per_day: 1000,
            send_delay: Duration::ZERO,
        }
    }
}

pub struct SmsService {
    gateway: Option<Arc<dyn SmsGateway>>,
    cleaner: TextCleaner,
    settings: SmsSettings,
    limiter: Mutex<SmsRateLimiter>,
}

impl SmsService {
    pub fn new(gateway: Option<Arc<dyn SmsGateway>>, settings: SmsSettings) -> Self {
        if gateway.is_none() {
            warn!("Twilio configuration incomplete. SMS service will use the log fallback.");
        }
        let limiter = SmsRateLimiter::new(settings.max_per_hour, settings.max_per_day);
        Self {
            gateway,
            cleaner: TextCleaner::new(),
            settings,
            limiter: Mutex::new(limiter),
        }
    }

    pub fn from_args(args: &Args) -> Result<Self, Box<dyn StdError + Send + Sync>> {
        let gateway: Option<Arc<dyn SmsGateway>> = if args.twilio_configured() {
            let twilio = TwilioGateway::new(
                &args.twilio_base_url,
                &args.twilio_account_sid,
                &args.twilio_auth_token,
                &args.twilio_phone_number
            )?;
            info!("Twilio client initialized");
            Some(Arc::new(twilio))
        } else {
            None
        };
        Ok(Self::new(gateway, SmsSettings::from_args(args)))
    }

    pub async fn send_emergency_alert(
        &self,
        alert_data: &HashMap<String, String>,
        recipients: &[String],
        template: SmsTemplate
    ) -> BatchOutcome {
        if recipients.is_empty() {
            return BatchOutcome::rejected("No recipients specified", 0);
        }
        if !alert_data.contains_key("location") || !alert_data.contains_key("contact_number") {
            return BatchOutcome::rejected("Invalid alert data", recipients.len());
        }
        if !self.limiter.lock().await.check(recipients.len() as u32) {
            warn!("SMS rate limit exceeded for batch of {}", recipients.len());
            return BatchOutcome::rejected("Rate limit exceeded", recipients.len());
        }

        let message = template.render(alert_data, ALERT_DEFAULTS);
        self.send_batch(recipients, &message, template).await
    }

    pub async fn send_safety_notification(
        &self,
        notification_data: &HashMap<String, String>,
        recipients: &[String],
        template: SmsTemplate
    ) -> BatchOutcome {
        if recipients.is_empty() {
            return BatchOutcome::rejected("No recipients specified", 0);
        }
        let message = template.render(notification_data, NOTIFICATION_DEFAULTS);
        self.send_batch(recipients, &message, template).await
    }

    pub async fn send_status_update(
        &self,
        update_data: &HashMap<String, String>,
        recipients: &[String]
    ) -> BatchOutcome {
        if recipients.is_empty() {
            return BatchOutcome::rejected("No recipients specified", 0);
        }
        let message = SmsTemplate::StatusUpdate.render(update_data, STATUS_DEFAULTS);
        self.send_batch(recipients, &message, SmsTemplate::StatusUpdate).await
    }

    async fn send_batch(&self, recipients: &[String], message: &str, template: SmsTemplate) -> BatchOutcome {
        let mut results = Vec::with_capacity(recipients.len());
        for (i, recipient) in recipients.iter().enumerate() {
            if i > 0 && !self.settings.send_delay.is_zero() {
                tokio::time::sleep(self.settings.send_delay).await;
            }
            results.push(self.send_single(recipient, message, template).await);
        }

        let sent = results
            .iter()
            .filter(|r| r.success)
            .count();
        self.limiter.lock().await.record(sent as u32);

        BatchOutcome {
            success: sent > 0,
            sent_count: sent as u32,
            total_recipients: recipients.len(),
            failed_count: recipients.len() - sent,
            results,
            error: None,
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    async fn send_single(&self, recipient: &str, message: &str, template: SmsTemplate) -> SmsResult {
        if !is_valid_phone(recipient) {
            return SmsResult::failed(recipient, format!("Invalid phone number: {}", recipient), None);
        }

        let cleaned = self.cleaner.clean_outbound(message);
        if cleaned.is_empty() {
            return SmsResult::failed(recipient, "Empty or invalid message content", None);
        }
        let body = truncate(&cleaned, self.settings.max_length);

        if let Some(gateway) = &self.gateway {
            match gateway.send(&format_phone(recipient), &body).await {
                Ok(receipt) => {
                    return SmsResult {
                        success: true,
                        recipient: recipient.to_string(),
                        provider: Some(gateway.name().to_string()),
                        message_sid: Some(receipt.message_sid),
                        status: Some(receipt.status),
                        error: None,
                        timestamp: Some(Utc::now().to_rfc3339()),
                    };
                }
                Err(e) => {
                    warn!("{} send failed, trying fallback: {}", gateway.name(), e);
                }
            }
        }

        self.send_via_log(recipient, &body, template)
    }

    fn send_via_log(&self, recipient: &str, body: &str, template: SmsTemplate) -> SmsResult {
        let preview: String = body.chars().take(50).collect();
        info!("FALLBACK SMS - To: {}, Type: {}, Message: {}...", recipient, template.as_str(), preview);
        SmsResult {
            success: true,
            recipient: recipient.to_string(),
            provider: Some("fallback".to_string()),
            message_sid: None,
            status: Some("logged".to_string()),
            error: None,
            timestamp: Some(Utc::now().to_rfc3339()),
        }
    }

    pub async fn health(&self) -> SmsHealth {
        let twilio_status = match &self.gateway {
            None => "unavailable".to_string(),
            Some(gateway) =>
                match gateway.health().await {
                    Ok(()) => "healthy".to_string(),
                    Err(e) => {
                        error!("SMS gateway health probe failed: {}", e);
                        "unhealthy".to_string()
                    }
                }
        };
        SmsHealth {
            // The log fallback keeps the service usable without Twilio.
            status: "healthy".to_string(),
            service: "SMS Service".to_string(),
            twilio_status,
            fallback_methods: vec!["log".to_string()],
            rate_limits: self.limiter.lock().await.snapshot(),
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    pub async fn usage_stats(&self) -> SmsUsageStats {
        let snapshot = self.limiter.lock().await.snapshot();
        SmsUsageStats {
            twilio_configured: self.gateway.is_some(),
            max_message_length: self.settings.max_length,
            default_country_code: self.settings.default_country.clone(),
            retry_attempts: self.settings.retry_attempts,
            max_sms_per_hour: snapshot.max_per_hour,
            max_sms_per_day: snapshot.max_per_day,
            sms_sent_count: snapshot.sms_sent_hour,
            sms_sent_today: snapshot.sms_sent_today,
        }
    }

    pub async fn reset_counters(&self) {
        self.limiter.lock().await.reset_counters();
    }
}
