use chrono::Utc;
use log::info;
use std::collections::HashMap;
use std::error::Error;
use std::fs;
use tokio::sync::RwLock;

use crate::models::awareness::{
    AwarenessCatalogue,
    ContentFilter,
    ContentSelection,
    ProgressRecord,
    Recommendations,
    SafetyQuiz,
    SafetyStory,
    SearchResults,
};

const BUILTIN_CATALOGUE: &str = include_str!("../../json/awareness.json");

const YOUNG_GROUP: &str = "5-12";
const OLDER_GROUP: &str = "8-16";

pub fn parse_catalogue(json: &str) -> Result<AwarenessCatalogue, Box<dyn Error + Send + Sync>> {
    let mut catalogue: AwarenessCatalogue = serde_json
        ::from_str(json)
        .map_err(|e| format!("Failed to parse awareness catalogue: {}", e))?;
    if catalogue.last_updated.is_empty() {
        catalogue.last_updated = Utc::now().to_rfc3339();
    }
    Ok(catalogue)
}

/// The file at `path` when given, the built-in copy otherwise.
pub fn load_catalogue(path: Option<&str>) -> Result<AwarenessCatalogue, Box<dyn Error + Send + Sync>> {
    match path {
        Some(path) => {
            let file_content = fs
                ::read_to_string(path)
                .map_err(|e| format!("Failed to read awareness file '{}': {}", path, e))?;
            let catalogue = parse_catalogue(&file_content)?;
            info!("Loaded awareness catalogue from {}", path);
            Ok(catalogue)
        }
        None => parse_catalogue(BUILTIN_CATALOGUE),
    }
}

/// Numeric ages map to the catalogue's two bands; anything else means "all".
pub fn age_band(age_group: &str) -> Option<&'static str> {
    let age: i64 = age_group.trim().parse().ok()?;
    Some(if age <= 12 { YOUNG_GROUP } else { OLDER_GROUP })
}

fn difficulty_rank(level: &str) -> u8 {
    match level {
        "beginner" => 0,
        "intermediate" => 1,
        "advanced" => 2,
        _ => 3,
    }
}

fn story_matches(story: &SafetyStory, needle: &str) -> bool {
    story.title.to_lowercase().contains(needle) ||
        story.description.to_lowercase().contains(needle) ||
        story.tags.iter().any(|t| t.to_lowercase().contains(needle))
}

fn quiz_matches(quiz: &SafetyQuiz, needle: &str) -> bool {
    quiz.title.to_lowercase().contains(needle) ||
        quiz.description.to_lowercase().contains(needle) ||
        quiz.tags.iter().any(|t| t.to_lowercase().contains(needle))
}

/// Stories, quizzes and resources, plus per-user progress kept in memory.
pub struct AwarenessService {
    catalogue: AwarenessCatalogue,
    progress: RwLock<HashMap<(String, String), ProgressRecord>>,
}

impl AwarenessService {
    pub fn new(catalogue: AwarenessCatalogue) -> Self {
        Self {
            catalogue,
            progress: RwLock::new(HashMap::new()),
        }
    }

    pub fn catalogue(&self) -> &AwarenessCatalogue {
        &self.catalogue
    }

    fn select(&self, stories: Vec<SafetyStory>, quizzes: Vec<SafetyQuiz>) -> ContentSelection {
        ContentSelection {
            stories,
            quizzes,
            resources: self.catalogue.resources.clone(),
            age_group: None,
            tags: None,
            last_updated: self.catalogue.last_updated.clone(),
        }
    }

    fn in_group(&self, group: &str) -> (Vec<SafetyStory>, Vec<SafetyQuiz>) {
        (
            self.catalogue.stories
                .iter()
                .filter(|s| s.age_group == group)
                .cloned()
                .collect(),
            self.catalogue.quizzes
                .iter()
                .filter(|q| q.age_group == group)
                .cloned()
                .collect(),
        )
    }

    pub fn by_age_group(&self, age_group: &str) -> ContentSelection {
        match age_band(age_group) {
            Some(band) => {
                let (stories, quizzes) = self.in_group(band);
                ContentSelection { age_group: Some(band.to_string()), ..self.select(stories, quizzes) }
            }
            None =>
                ContentSelection {
                    age_group: Some("all".to_string()),
                    ..self.select(self.catalogue.stories.clone(), self.catalogue.quizzes.clone())
                },
        }
    }

    /// Items carrying at least one of `tags`.
    pub fn by_tags(&self, tags: &[String]) -> ContentSelection {
        let stories = self.catalogue.stories
            .iter()
            .filter(|s| s.tags.iter().any(|t| tags.contains(t)))
            .cloned()
            .collect();
        let quizzes = self.catalogue.quizzes
            .iter()
            .filter(|q| q.tags.iter().any(|t| tags.contains(t)))
            .cloned()
            .collect();
        ContentSelection { tags: Some(tags.to_vec()), ..self.select(stories, quizzes) }
    }

    pub fn story(&self, id: &str) -> Option<&SafetyStory> {
        self.catalogue.stories.iter().find(|s| s.id == id)
    }

    pub fn quiz(&self, id: &str) -> Option<&SafetyQuiz> {
        self.catalogue.quizzes.iter().find(|q| q.id == id)
    }

    pub async fn progress(&self, user_id: &str, content_id: &str) -> ProgressRecord {
        let key = (user_id.to_string(), content_id.to_string());
        if let Some(record) = self.progress.write().await.get_mut(&key) {
            record.last_accessed = Some(Utc::now().to_rfc3339());
            return record.clone();
        }
        ProgressRecord {
            user_id: user_id.to_string(),
            content_id: content_id.to_string(),
            progress: 0,
            completed: false,
            score: None,
            last_accessed: None,
            last_updated: None,
        }
    }

    pub async fn update_progress(
        &self,
        user_id: &str,
        content_id: &str,
        progress: u32,
        score: Option<i64>
    ) -> ProgressRecord {
        let now = Utc::now().to_rfc3339();
        let record = ProgressRecord {
            user_id: user_id.to_string(),
            content_id: content_id.to_string(),
            progress,
            completed: progress >= 100,
            score,
            last_accessed: Some(now.clone()),
            last_updated: Some(now),
        };
        self.progress
            .write().await
            .insert((user_id.to_string(), content_id.to_string()), record.clone());
        record
    }

    /// Up to three stories and two quizzes from `age_group` that are not yet
    /// completed, easiest and shortest first.
    pub fn recommendations(&self, user_id: &str, age_group: &str, completed: &[String]) -> Recommendations {
        let mut stories: Vec<SafetyStory> = self.catalogue.stories
            .iter()
            .filter(|s| s.age_group == age_group && !completed.contains(&s.id))
            .cloned()
            .collect();
        stories.sort_by_key(|s| (difficulty_rank(&s.difficulty_level), s.estimated_duration));
        stories.truncate(3);

        let mut quizzes: Vec<SafetyQuiz> = self.catalogue.quizzes
            .iter()
            .filter(|q| q.age_group == age_group && !completed.contains(&q.id))
            .cloned()
            .collect();
        quizzes.sort_by_key(|q| (difficulty_rank(&q.difficulty_level), q.estimated_duration));
        quizzes.truncate(2);

        Recommendations {
            user_id: user_id.to_string(),
            recommended_stories: stories,
            recommended_quizzes: quizzes,
            reasoning: "Based on your age group and learning progress".to_string(),
        }
    }

    /// Case-insensitive substring search over titles, descriptions and tags.
    pub fn search(&self, query: &str) -> SearchResults {
        let needle = query.to_lowercase();
        let stories: Vec<SafetyStory> = self.catalogue.stories
            .iter()
            .filter(|s| story_matches(s, &needle))
            .cloned()
            .collect();
        let quizzes: Vec<SafetyQuiz> = self.catalogue.quizzes
            .iter()
            .filter(|q| quiz_matches(q, &needle))
            .cloned()
            .collect();
        SearchResults {
            query: query.to_string(),
            total_results: stories.len() + quizzes.len(),
            stories,
            quizzes,
        }
    }

    /// Applies every given filter in turn.
    pub fn filtered(&self, filter: &ContentFilter) -> ContentSelection {
        let mut stories = self.catalogue.stories.clone();
        let mut quizzes = self.catalogue.quizzes.clone();
        let mut resources = self.catalogue.resources.clone();

        if let Some(group) = filter.age_group.as_deref().map(str::trim).filter(|g| !g.is_empty()) {
            let wanted = match age_band(group) {
                Some(band) => Some(band.to_string()),
                None if group.eq_ignore_ascii_case("all") || group.eq_ignore_ascii_case("all ages") => None,
                None => Some(group.to_string()),
            };
            if let Some(wanted) = wanted {
                stories.retain(|s| s.age_group == wanted);
                quizzes.retain(|q| q.age_group == wanted);
            }
        }

        if let Some(difficulty) = filter.difficulty.as_deref().filter(|d| !d.is_empty()) {
            stories.retain(|s| s.difficulty_level.eq_ignore_ascii_case(difficulty));
            quizzes.retain(|q| q.difficulty_level.eq_ignore_ascii_case(difficulty));
        }

        if let Some(q) = filter.q.as_deref().filter(|q| !q.trim().is_empty()) {
            let needle = q.to_lowercase();
            stories.retain(|s| story_matches(s, &needle));
            quizzes.retain(|quiz| quiz_matches(quiz, &needle));
        }

        if let Some(kind) = filter.kind.as_deref().map(str::to_lowercase) {
            match kind.as_str() {
                "story" | "stories" => {
                    quizzes.clear();
                    resources.clear();
                }
                "quiz" | "quizzes" => {
                    stories.clear();
                    resources.clear();
                }
                "resource" | "resources" => {
                    stories.clear();
                    quizzes.clear();
                }
                _ => {}
            }
        }

        ContentSelection {
            stories,
            quizzes,
            resources,
            age_group: None,
            tags: None,
            last_updated: self.catalogue.last_updated.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> AwarenessService {
        AwarenessService::new(load_catalogue(None).unwrap())
    }

    fn ids<T>(items: &[T], id: impl Fn(&T) -> &str) -> Vec<String> {
        items.iter().map(|i| id(i).to_string()).collect()
    }

    #[test]
    fn builtin_catalogue_parses() {
        let svc = service();
        assert_eq!(svc.catalogue().stories.len(), 4);
        assert_eq!(svc.catalogue().quizzes.len(), 2);
        assert_eq!(svc.catalogue().resources.len(), 3);
        assert!(!svc.catalogue().last_updated.is_empty());
    }

    #[test]
    fn ages_map_to_bands() {
        assert_eq!(age_band("3"), Some("5-12"));
        assert_eq!(age_band("12"), Some("5-12"));
        assert_eq!(age_band("13"), Some("8-16"));
        assert_eq!(age_band("40"), Some("8-16"));
        assert_eq!(age_band("teen"), None);

        let svc = service();
        let older = svc.by_age_group("14");
        assert_eq!(older.age_group.as_deref(), Some("8-16"));
        assert_eq!(ids(&older.stories, |s| &s.id), vec!["online_safety"]);
        assert!(older.quizzes.is_empty());

        let all = svc.by_age_group("unknown");
        assert_eq!(all.age_group.as_deref(), Some("all"));
        assert_eq!(all.stories.len(), 4);
    }

    #[test]
    fn recommendations_skip_completed_and_sort() {
        let svc = service();
        let recs = svc.recommendations("u1", "5-12", &["good_touch_bad_touch".to_string()]);
        assert_eq!(ids(&recs.recommended_stories, |s| &s.id), vec!["body_safety_rules", "stranger_danger"]);
        assert_eq!(ids(&recs.recommended_quizzes, |q| &q.id), vec!["body_safety_rules", "touch_identification"]);
    }

    #[test]
    fn search_and_tags() {
        let svc = service();
        let found = svc.search("ONLINE");
        assert_eq!(found.total_results, 1);
        assert_eq!(found.stories[0].id, "online_safety");

        let tagged = svc.by_tags(&["stranger_danger".to_string()]);
        assert_eq!(ids(&tagged.stories, |s| &s.id), vec!["stranger_danger"]);
        assert!(tagged.quizzes.is_empty());
    }

    #[test]
    fn filters_combine() {
        let svc = service();
        let only_quizzes = svc.filtered(&ContentFilter {
            kind: Some("quiz".into()),
            age_group: Some("All Ages".into()),
            ..Default::default()
        });
        assert!(only_quizzes.stories.is_empty());
        assert!(only_quizzes.resources.is_empty());
        assert_eq!(only_quizzes.quizzes.len(), 2);

        let intermediate = svc.filtered(&ContentFilter { difficulty: Some("intermediate".into()), ..Default::default() });
        assert_eq!(ids(&intermediate.stories, |s| &s.id), vec!["online_safety"]);

        let banded = svc.filtered(&ContentFilter { age_group: Some("8-16".into()), ..Default::default() });
        assert_eq!(banded.stories.len(), 1);
    }

    #[tokio::test]
    async fn progress_round_trip() {
        let svc = service();
        let fresh = svc.progress("u1", "online_safety").await;
        assert_eq!(fresh.progress, 0);
        assert!(fresh.last_accessed.is_none());

        let partial = svc.update_progress("u1", "online_safety", 40, None).await;
        assert!(!partial.completed);
        let done = svc.update_progress("u1", "online_safety", 100, Some(3)).await;
        assert!(done.completed);

        let read = svc.progress("u1", "online_safety").await;
        assert_eq!(read.progress, 100);
        assert_eq!(read.score, Some(3));
        assert!(read.completed);
    }
}
