pub mod sqlite;

pub use sqlite::SqliteCourseStore;

use crate::models::{Course, CourseChunk};

/// One matched passage with the metadata needed for labels and links
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub content: String,
    pub course_title: String,
    pub lesson_number: Option<i64>,
}

/// Container for search results. `error` distinguishes a failed lookup
/// (e.g. an unresolvable course name) from a structurally valid search that
/// simply matched nothing.
#[derive(Debug, Clone, Default)]
pub struct SearchResults {
    pub hits: Vec<SearchHit>,
    pub error: Option<String>,
}

impl SearchResults {
    /// Empty results carrying an error message
    pub fn empty(error: impl Into<String>) -> Self {
        SearchResults {
            hits: Vec::new(),
            error: Some(error.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }
}

/// Indexed store of course metadata and content chunks.
///
/// The search contract: an optional fuzzy course name is resolved to a
/// canonical title first; resolution failure is reported via
/// `SearchResults::error`, never as a panic or empty match. Calls are
/// synchronous and safe to issue sequentially from async contexts.
pub trait CourseIndex: Send + Sync {
    /// Resolve a fuzzy course name to the canonical catalog title
    fn resolve_course_name(&self, course_name: &str) -> Option<String>;

    /// Search content chunks, optionally filtered by course and lesson
    fn search(
        &self,
        query: &str,
        course_name: Option<&str>,
        lesson_number: Option<i64>,
    ) -> SearchResults;

    fn get_course_link(&self, course_title: &str) -> Option<String>;

    fn get_lesson_link(&self, course_title: &str, lesson_number: i64) -> Option<String>;

    fn get_all_courses_metadata(&self) -> Vec<Course>;

    fn get_existing_course_titles(&self) -> Vec<String>;

    fn get_course_count(&self) -> usize;

    fn add_course_metadata(&self, course: &Course) -> Result<(), String>;

    fn add_course_content(&self, chunks: &[CourseChunk]) -> Result<(), String>;

    fn clear_all_data(&self) -> Result<(), String>;
}
