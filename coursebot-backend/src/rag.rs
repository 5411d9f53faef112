//! Top-level RAG system: wires the course index, tools, sessions and the
//! response generator behind one query interface

use crate::ai::{ChatModel, ClaudeClient, ResponseGenerator, DEFAULT_MAX_TOOL_ROUNDS};
use crate::config::Config;
use crate::ingest::DocumentProcessor;
use crate::session::SessionManager;
use crate::store::{CourseIndex, SqliteCourseStore};
use crate::tools::{self, Citation, ToolRegistry};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub struct CourseAnalytics {
    pub total_courses: usize,
    pub course_titles: Vec<String>,
}

pub struct RagSystem {
    store: Arc<dyn CourseIndex>,
    generator: ResponseGenerator,
    processor: DocumentProcessor,
    pub sessions: SessionManager,
    tool_manager: ToolRegistry,
}

impl RagSystem {
    pub fn new(config: &Config) -> Result<Self, String> {
        let store: Arc<dyn CourseIndex> = Arc::new(SqliteCourseStore::new(
            &config.database_url,
            config.max_results,
        )?);
        let client = ClaudeClient::new(&config.anthropic_api_key, &config.anthropic_model)?;
        Ok(Self::with_components(config, Arc::new(client), store))
    }

    /// Assemble from explicit collaborators (used by tests with fakes)
    pub fn with_components(
        config: &Config,
        model: Arc<dyn ChatModel>,
        store: Arc<dyn CourseIndex>,
    ) -> Self {
        let tool_manager = tools::create_default_registry(store.clone());
        log::info!("Registered {} course tool(s)", tool_manager.len());

        RagSystem {
            generator: ResponseGenerator::new(model),
            processor: DocumentProcessor::new(config.chunk_size, config.chunk_overlap),
            sessions: SessionManager::new(config.max_history),
            tool_manager,
            store,
        }
    }

    /// Answer a question, optionally within a session whose history is fed
    /// to the model as context. Returns the answer plus the citations the
    /// tools recorded while producing it; citation state is reset afterwards
    /// so it cannot leak into the next question.
    pub async fn query(
        &self,
        question: &str,
        session_id: Option<&str>,
    ) -> Result<(String, Vec<Citation>), String> {
        let prompt = format!("Answer this question about course materials: {}", question);
        let history = session_id.and_then(|id| self.sessions.get_conversation_history(id));

        let answer = self
            .generator
            .generate_response(
                &prompt,
                history.as_deref(),
                Some(self.tool_manager.get_tool_definitions()),
                Some(&self.tool_manager),
                DEFAULT_MAX_TOOL_ROUNDS,
            )
            .await?;

        let sources = self.tool_manager.get_last_sources();

        if let Some(id) = session_id {
            self.sessions.add_exchange(id, question, &answer);
        }
        self.tool_manager.reset_sources();

        Ok((answer, sources))
    }

    /// Ingest every course document in `folder`, skipping titles already in
    /// the index. Returns (courses added, chunks added).
    pub fn add_course_folder(
        &self,
        folder: &Path,
        clear_existing: bool,
    ) -> Result<(usize, usize), String> {
        if clear_existing {
            log::info!("Clearing existing course index");
            self.store.clear_all_data()?;
        }

        if !folder.exists() {
            log::warn!("Course documents folder '{}' does not exist", folder.display());
            return Ok((0, 0));
        }

        let mut entries: Vec<_> = std::fs::read_dir(folder)
            .map_err(|e| format!("Failed to read '{}': {}", folder.display(), e))?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                matches!(
                    p.extension().and_then(|e| e.to_str()),
                    Some("txt") | Some("md")
                )
            })
            .collect();
        entries.sort();

        let existing = self.store.get_existing_course_titles();
        let mut courses_added = 0;
        let mut chunks_added = 0;

        for path in entries {
            let (course, chunks) = match self.processor.process_document(&path) {
                Ok(parsed) => parsed,
                Err(e) => {
                    log::error!("Skipping '{}': {}", path.display(), e);
                    continue;
                }
            };

            if existing.contains(&course.title) {
                log::info!("Course '{}' already indexed, skipping", course.title);
                continue;
            }

            self.store.add_course_metadata(&course)?;
            self.store.add_course_content(&chunks)?;
            log::info!(
                "Indexed course '{}' ({} chunks)",
                course.title,
                chunks.len()
            );
            courses_added += 1;
            chunks_added += chunks.len();
        }

        Ok((courses_added, chunks_added))
    }

    pub fn get_course_analytics(&self) -> CourseAnalytics {
        CourseAnalytics {
            total_courses: self.store.get_course_count(),
            course_titles: self.store.get_existing_course_titles(),
        }
    }
}
