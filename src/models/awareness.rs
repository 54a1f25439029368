use serde::{ Deserialize, Serialize };
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyStory {
    pub id: String,
    pub title: String,
    pub description: String,
    pub age_group: String,
    pub difficulty_level: String,
    pub content: Vec<Value>,
    pub tags: Vec<String>,
    /// Minutes.
    pub estimated_duration: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyQuiz {
    pub id: String,
    pub title: String,
    pub description: String,
    pub age_group: String,
    #[serde(default = "default_difficulty")]
    pub difficulty_level: String,
    pub questions: Vec<Value>,
    pub passing_score: u32,
    pub estimated_duration: u32,
    #[serde(default)]
    pub tags: Vec<String>,
}

fn default_difficulty() -> String {
    "beginner".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AwarenessCatalogue {
    pub stories: Vec<SafetyStory>,
    pub quizzes: Vec<SafetyQuiz>,
    pub resources: Vec<Value>,
    #[serde(default)]
    pub last_updated: String,
}

/// Stories and quizzes selected for one view; resources are always included.
#[derive(Debug, Clone, Serialize)]
pub struct ContentSelection {
    pub stories: Vec<SafetyStory>,
    pub quizzes: Vec<SafetyQuiz>,
    pub resources: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age_group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    pub last_updated: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProgressRecord {
    pub user_id: String,
    pub content_id: String,
    pub progress: u32,
    pub completed: bool,
    pub score: Option<i64>,
    pub last_accessed: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Recommendations {
    pub user_id: String,
    pub recommended_stories: Vec<SafetyStory>,
    pub recommended_quizzes: Vec<SafetyQuiz>,
    pub reasoning: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResults {
    pub query: String,
    pub stories: Vec<SafetyStory>,
    pub quizzes: Vec<SafetyQuiz>,
    pub total_results: usize,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContentFilter {
    #[serde(default)]
    pub age_group: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub difficulty: Option<String>,
    #[serde(default)]
    pub q: Option<String>,
}
