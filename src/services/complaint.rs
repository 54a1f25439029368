use chrono::{ Local, Utc };
use log::{ info, warn };
use std::collections::{ BTreeMap, HashMap };
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::complaint::{
    provided,
    ComplaintRecord,
    ComplaintRequest,
    STATUS_DRAFT_GENERATED,
};
use crate::services::document::{ ComplaintDocument, DocumentError, DocumentFormat };
use crate::services::gpt::{ GptService, IncidentSummary };

const OFFICIAL_TEMPLATE: &str =
    "OFFICIAL COMPLAINT

Date: {INCIDENT_DATE}
Time: {INCIDENT_TIME}
Location: {LOCATION}

COMPLAINANT INFORMATION:
Name: {GUARDIAN_NAME}
Phone: {GUARDIAN_PHONE}
Email: {GUARDIAN_EMAIL}
Address: {GUARDIAN_ADDRESS}

VICTIM INFORMATION:
Name: {CHILD_NAME}
Age: {CHILD_AGE}
Relationship to Complainant: Child

INCIDENT DETAILS:
Type of Incident: {INCIDENT_TYPE}
Date of Incident: {INCIDENT_DATE}
Time of Incident: {INCIDENT_TIME}
Location of Incident: {LOCATION}

DESCRIPTION OF INCIDENT:
{INCIDENT_DESCRIPTION}

WITNESSES:
{WITNESSES}

EVIDENCE:
{EVIDENCE}

PREVIOUS INCIDENTS:
{PREVIOUS_INCIDENTS}

REQUESTED ACTIONS:
We request a thorough investigation of this matter and appropriate action to ensure the safety and well-being of our child.

We are available for any additional information or interviews that may be required.

Sincerely,
{GUARDIAN_NAME}
Date: {INCIDENT_DATE}";

/// `COMP_YYYYMMDD_` followed by eight uppercase hex digits.
pub fn new_complaint_id() -> String {
    let suffix: String = Uuid::new_v4().simple().to_string().chars().take(8).collect();
    format!("COMP_{}_{}", Local::now().format("%Y%m%d"), suffix.to_uppercase())
}

/// Fills the built-in complaint letter from the request.
pub fn render_template(req: &ComplaintRequest) -> String {
    let replacements = [
        ("{CHILD_NAME}", req.child_name.clone()),
        ("{CHILD_AGE}", req.child_age.to_string()),
        ("{INCIDENT_TYPE}", req.incident_type.clone()),
        ("{INCIDENT_DATE}", req.incident_date.clone()),
        ("{INCIDENT_TIME}", req.incident_time.clone()),
        ("{LOCATION}", req.location.clone()),
        ("{INCIDENT_DESCRIPTION}", req.incident_description.clone()),
        ("{GUARDIAN_NAME}", req.guardian_name.clone()),
        ("{GUARDIAN_PHONE}", req.guardian_phone.clone()),
        ("{GUARDIAN_EMAIL}", provided(&req.guardian_email).unwrap_or("Not provided").to_string()),
        ("{GUARDIAN_ADDRESS}", provided(&req.guardian_address).unwrap_or("Not provided").to_string()),
        ("{WITNESSES}", provided(&req.witnesses).unwrap_or("None reported").to_string()),
        ("{EVIDENCE}", provided(&req.evidence).unwrap_or("None provided").to_string()),
        (
            "{PREVIOUS_INCIDENTS}",
            provided(&req.previous_incidents).unwrap_or("None reported").to_string(),
        ),
    ];

    let mut text = OFFICIAL_TEMPLATE.to_string();
    for (placeholder, value) in replacements {
        text = text.replace(placeholder, &value);
    }

    if let Some(actions) = req.requested_actions() {
        text.push_str("\n\n");
        text.push_str(&actions);
    }
    if let Some(extra) = provided(&req.additional_requests) {
        text.push_str(&format!("\n\nAdditional Requests: {}", extra));
    }
    text
}

fn incident_summary(req: &ComplaintRequest) -> IncidentSummary {
    IncidentSummary {
        incident_type: req.incident_type.clone(),
        priority: "medium".to_string(),
        date: req.incident_date.clone(),
        child_age: req.child_age.clamp(0, u32::MAX as i64) as u32,
        child_gender: req.child_gender.clone().unwrap_or_default(),
        description: req.incident_description.clone(),
        guardian_name: req.guardian_name.clone(),
        guardian_contact: req.guardian_phone.clone(),
    }
}

/// In-memory complaint registry; drafts come from the chat provider with the
/// built-in letter as fallback.
pub struct ComplaintService {
    gpt: Arc<GptService>,
    complaints: RwLock<HashMap<String, ComplaintRecord>>,
}

impl ComplaintService {
    pub fn new(gpt: Arc<GptService>) -> Self {
        Self {
            gpt,
            complaints: RwLock::new(HashMap::new()),
        }
    }

    /// Returns `(text, fallback)`.
    async fn draft(&self, req: &ComplaintRequest) -> (String, bool) {
        let result = self.gpt.complaint_draft(&incident_summary(req), "formal").await;
        if result.success && !result.complaint_draft.trim().is_empty() {
            (result.complaint_draft, false)
        } else {
            warn!("Complaint draft unavailable from provider, filling built-in template");
            (render_template(req), true)
        }
    }

    /// Validates, drafts and stores. `Err` carries the violated rules.
    pub async fn submit(&self, req: ComplaintRequest) -> Result<ComplaintRecord, Vec<String>> {
        let errors = req.validate();
        if !errors.is_empty() {
            return Err(errors);
        }

        let complaint_id = new_complaint_id();
        let (complaint_text, fallback) = self.draft(&req).await;
        let now = Utc::now().to_rfc3339();

        let mut download_urls = BTreeMap::new();
        for format in [DocumentFormat::Pdf, DocumentFormat::Docx] {
            download_urls.insert(
                format.extension().to_string(),
                format!("/api/complaint/{}/download/{}", complaint_id, format.extension())
            );
        }

        let record = ComplaintRecord {
            complaint_id: complaint_id.clone(),
            status: STATUS_DRAFT_GENERATED.to_string(),
            complaint_text,
            submission_timestamp: provided(&req.submission_timestamp)
                .map(str::to_string)
                .unwrap_or_else(|| now.clone()),
            generated_at: now,
            updated_at: None,
            fallback,
            request_data: req,
            download_urls,
        };

        self.complaints.write().await.insert(complaint_id.clone(), record.clone());
        info!("Generated complaint draft: {}", complaint_id);
        Ok(record)
    }

    pub async fn get(&self, complaint_id: &str) -> Option<ComplaintRecord> {
        self.complaints.read().await.get(complaint_id).cloned()
    }

    /// Oldest first.
    pub async fn list(&self) -> Vec<ComplaintRecord> {
        let mut all: Vec<ComplaintRecord> = self.complaints.read().await.values().cloned().collect();
        all.sort_by(|a, b| a.generated_at.cmp(&b.generated_at).then(a.complaint_id.cmp(&b.complaint_id)));
        all
    }

    pub async fn update_status(&self, complaint_id: &str, status: &str) -> Option<ComplaintRecord> {
        let mut complaints = self.complaints.write().await;
        let record = complaints.get_mut(complaint_id)?;
        record.status = status.to_string();
        record.updated_at = Some(Utc::now().to_rfc3339());
        Some(record.clone())
    }

    pub async fn delete(&self, complaint_id: &str) -> bool {
        self.complaints.write().await.remove(complaint_id).is_some()
    }

    pub async fn count(&self) -> usize {
        self.complaints.read().await.len()
    }

    /// `Ok(None)` when the complaint does not exist.
    pub async fn render(
        &self,
        complaint_id: &str,
        format: DocumentFormat
    ) -> Result<Option<Vec<u8>>, DocumentError> {
        let Some(record) = self.get(complaint_id).await else {
            return Ok(None);
        };
        let bytes = ComplaintDocument::from_record(&record).render(format)?;
        info!("Rendered {} for complaint {} ({} bytes)", format.extension(), complaint_id, bytes.len());
        Ok(Some(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::chat::{ ChatClient, ChatCompletion, ChatMessage, ChatOptions, ProviderHealth };
    use crate::llm::manager::AiManager;
    use crate::llm::LlmType;
    use async_trait::async_trait;
    use std::error::Error as StdError;

    struct FixedClient(Option<&'static str>);

    #[async_trait]
    impl ChatClient for FixedClient {
        async fn chat(
            &self,
            _messages: &[ChatMessage],
            _options: &ChatOptions
        ) -> Result<ChatCompletion, Box<dyn StdError + Send + Sync>> {
            match self.0 {
                Some(text) => Ok(ChatCompletion { content: text.into(), model: "fixed".into(), total_tokens: None }),
                None => Err("offline".into()),
            }
        }

        async fn health(&self) -> ProviderHealth {
            ProviderHealth { status: "healthy".into(), model: None, error: None }
        }

        fn get_model(&self) -> String {
            "fixed".into()
        }

        fn get_base_url(&self) -> Option<String> {
            None
        }

        fn llm_type(&self) -> LlmType {
            LlmType::OpenAI
        }

        fn has_api_key(&self) -> bool {
            true
        }
    }

    fn service(reply: Option<&'static str>) -> ComplaintService {
        let ai = Arc::new(AiManager::with_client(Arc::new(FixedClient(reply))));
        ComplaintService::new(Arc::new(GptService::new(ai, 1000, 0.7)))
    }

    fn request() -> ComplaintRequest {
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
            wants_legal_action: true,
            additional_requests: Some("Weekly check-ins".into()),
            ..Default::default()
        }
    }

    #[test]
    fn id_has_date_and_hex_suffix() {
        let id = new_complaint_id();
        let parts: Vec<&str> = id.split('_').collect();
        assert_eq!(parts[0], "COMP");
        assert_eq!(parts[1].len(), 8);
        assert_eq!(parts[2].len(), 8);
        assert!(parts[2].chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
    }

    #[test]
    fn template_fills_every_placeholder() {
        let text = render_template(&request());
        assert!(!text.contains('{'));
        assert!(text.starts_with("OFFICIAL COMPLAINT"));
        assert!(text.contains("Name: Ava"));
        assert!(text.contains("Email: Not provided"));
        assert!(text.contains("Requested Actions: We request to pursue legal action."));
        assert!(text.ends_with("Additional Requests: Weekly check-ins"));
    }

    #[tokio::test]
    async fn provider_draft_is_used_when_available() {
        let svc = service(Some("Formal complaint text"));
        let record = svc.submit(request()).await.unwrap();
        assert!(!record.fallback);
        assert_eq!(record.complaint_text, "Formal complaint text");
        assert_eq!(record.status, STATUS_DRAFT_GENERATED);
        assert_eq!(
            record.download_urls.get("pdf").map(String::as_str),
            Some(format!("/api/complaint/{}/download/pdf", record.complaint_id).as_str())
        );
    }

    #[tokio::test]
    async fn provider_failure_falls_back_to_template() {
        let svc = service(None);
        let record = svc.submit(request()).await.unwrap();
        assert!(record.fallback);
        assert!(record.complaint_text.starts_with("OFFICIAL COMPLAINT"));
    }

    #[tokio::test]
    async fn invalid_request_is_not_stored() {
        let svc = service(None);
        let errors = svc.submit(ComplaintRequest { child_age: 0, ..request() }).await.unwrap_err();
        assert_eq!(errors, vec!["Child's age must be between 1 and 18"]);
        assert_eq!(svc.count().await, 0);
    }

    #[tokio::test]
    async fn status_update_and_delete() {
        let svc = service(None);
        let id = svc.submit(request()).await.unwrap().complaint_id;

        let updated = svc.update_status(&id, "Submitted").await.unwrap();
        assert_eq!(updated.status, "Submitted");
        assert!(updated.updated_at.is_some());
        assert!(svc.update_status("COMP_missing", "x").await.is_none());

        assert!(svc.render(&id, DocumentFormat::Pdf).await.unwrap().is_some());
        assert!(svc.delete(&id).await);
        assert!(!svc.delete(&id).await);
        assert!(svc.render(&id, DocumentFormat::Pdf).await.unwrap().is_none());
    }
}
