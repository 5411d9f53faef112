use crate::store::CourseIndex;
use crate::tools::registry::Tool;
use crate::tools::types::{Citation, PropertySchema, ToolDefinition, ToolInputSchema};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Search tool over indexed course content, with fuzzy course name matching
/// and optional lesson filtering
pub struct CourseSearchTool {
    index: Arc<dyn CourseIndex>,
    definition: ToolDefinition,
    last_sources: Mutex<Vec<Citation>>,
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    query: String,
    course_name: Option<String>,
    lesson_number: Option<i64>,
}

impl CourseSearchTool {
    pub fn new(index: Arc<dyn CourseIndex>) -> Self {
        let mut properties = HashMap::new();
        properties.insert(
            "query".to_string(),
            PropertySchema::string("What to search for in the course content"),
        );
        properties.insert(
            "course_name".to_string(),
            PropertySchema::string(
                "Course title (partial matches work, e.g. 'MCP', 'Introduction')",
            ),
        );
        properties.insert(
            "lesson_number".to_string(),
            PropertySchema::integer("Specific lesson number to search within (e.g. 1, 2, 3)"),
        );

        CourseSearchTool {
            index,
            definition: ToolDefinition {
                name: "search_course_content".to_string(),
                description:
                    "Search course materials with smart course name matching and lesson filtering"
                        .to_string(),
                input_schema: ToolInputSchema::object(properties, vec!["query"]),
            },
            last_sources: Mutex::new(Vec::new()),
        }
    }

    /// Message for a structurally valid search that matched nothing; the
    /// wording depends on which filters were active and is relayed verbatim
    /// by the model
    fn empty_message(course_name: Option<&str>, lesson_number: Option<i64>) -> String {
        let mut filter_info = String::new();
        if let Some(name) = course_name {
            filter_info.push_str(&format!(" in course '{}'", name));
        }
        if let Some(lesson) = lesson_number {
            filter_info.push_str(&format!(" in lesson {}", lesson));
        }
        format!("No relevant content found{}.", filter_info)
    }
}

#[async_trait]
impl Tool for CourseSearchTool {
    fn definition(&self) -> ToolDefinition {
        self.definition.clone()
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        // Every invocation overwrites citation state, matched or not
        self.last_sources.lock().clear();

        let params: SearchParams = serde_json::from_value(args)
            .map_err(|e| format!("Invalid parameters: {}", e))?;

        let results = self.index.search(
            &params.query,
            params.course_name.as_deref(),
            params.lesson_number,
        );

        // Lookup errors (unresolvable course, bad query) go back verbatim
        if let Some(error) = results.error {
            return Ok(error);
        }

        if results.is_empty() {
            return Ok(Self::empty_message(
                params.course_name.as_deref(),
                params.lesson_number,
            ));
        }

        let mut formatted = Vec::new();
        let mut sources = Vec::new();

        for hit in &results.hits {
            let label = match hit.lesson_number {
                Some(lesson) => format!("{} - Lesson {}", hit.course_title, lesson),
                None => hit.course_title.clone(),
            };

            let link = match hit.lesson_number {
                Some(lesson) => self.index.get_lesson_link(&hit.course_title, lesson),
                None => self.index.get_course_link(&hit.course_title),
            };

            formatted.push(format!("[{}]\n{}", label, hit.content));
            sources.push(Citation::new(label, link));
        }

        *self.last_sources.lock() = sources;
        Ok(formatted.join("\n\n"))
    }

    fn last_sources(&self) -> Vec<Citation> {
        self.last_sources.lock().clone()
    }

    fn reset_sources(&self) {
        self.last_sources.lock().clear();
    }
}
