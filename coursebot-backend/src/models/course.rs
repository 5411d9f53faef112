use serde::{Deserialize, Serialize};

/// A single lesson within a course
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lesson {
    pub lesson_number: i64,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lesson_link: Option<String>,
}

/// A course parsed from a structured course document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    /// Course title, also the unique identifier in the catalog
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub course_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructor: Option<String>,
    pub lessons: Vec<Lesson>,
}

/// A chunk of course content ready for indexing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseChunk {
    pub content: String,
    pub course_title: String,
    pub lesson_number: Option<i64>,
    pub chunk_index: usize,
}
