//! SQLite-backed course index - schema, catalog and content search
//!
//! Ranking is deliberately plain: case-insensitive token overlap between the
//! query and chunk text, ties broken by insertion order. The store contract
//! (resolve, filter, link lookup) is what the tools depend on, not the
//! scoring function.

use crate::models::{Course, CourseChunk, Lesson};
use crate::store::{CourseIndex, SearchHit, SearchResults};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Mutex;

#[derive(Debug)]
pub struct SqliteCourseStore {
    conn: Mutex<Connection>,
    max_results: usize,
}

impl SqliteCourseStore {
    /// Open (or create) the store at `database_url` and initialize schema
    pub fn new(database_url: &str, max_results: usize) -> Result<Self, String> {
        if max_results == 0 {
            return Err("max_results must be > 0, this would cause search failures".to_string());
        }

        // Create parent directory if it doesn't exist
        if let Some(parent) = Path::new(database_url).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).ok();
            }
        }

        let conn = Connection::open(database_url)
            .map_err(|e| format!("Failed to open course store: {}", e))?;

        let store = Self {
            conn: Mutex::new(conn),
            max_results,
        };
        store.init()?;
        Ok(store)
    }

    fn init(&self) -> Result<(), String> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            "CREATE TABLE IF NOT EXISTS course_catalog (
                title TEXT PRIMARY KEY,
                instructor TEXT,
                course_link TEXT,
                lessons_json TEXT NOT NULL,
                lesson_count INTEGER NOT NULL
            )",
            [],
        )
        .map_err(|e| format!("Failed to create course_catalog table: {}", e))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS course_content (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                course_title TEXT NOT NULL,
                lesson_number INTEGER,
                chunk_index INTEGER NOT NULL,
                content TEXT NOT NULL
            )",
            [],
        )
        .map_err(|e| format!("Failed to create course_content table: {}", e))?;

        Ok(())
    }

    fn load_catalog_row(&self, course_title: &str) -> Option<Course> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT title, instructor, course_link, lessons_json FROM course_catalog WHERE title = ?1",
            params![course_title],
            |row| {
                let lessons_json: String = row.get(3)?;
                Ok(Course {
                    title: row.get(0)?,
                    instructor: row.get(1)?,
                    course_link: row.get(2)?,
                    lessons: serde_json::from_str(&lessons_json).unwrap_or_default(),
                })
            },
        )
        .ok()
    }
}

impl CourseIndex for SqliteCourseStore {
    fn resolve_course_name(&self, course_name: &str) -> Option<String> {
        let titles = self.get_existing_course_titles();
        let needle = course_name.trim().to_lowercase();
        if needle.is_empty() {
            return None;
        }

        // Exact match first, then substring, then best token overlap
        if let Some(title) = titles.iter().find(|t| t.to_lowercase() == needle) {
            return Some(title.clone());
        }

        if let Some(title) = titles.iter().find(|t| {
            let lower = t.to_lowercase();
            lower.contains(&needle) || needle.contains(&lower)
        }) {
            return Some(title.clone());
        }

        let needle_tokens = tokenize(&needle);
        titles
            .iter()
            .map(|t| (t, overlap_score(&needle_tokens, &tokenize(&t.to_lowercase()))))
            .filter(|(_, score)| *score > 0)
            .max_by_key(|(_, score)| *score)
            .map(|(t, _)| t.clone())
    }

    fn search(
        &self,
        query: &str,
        course_name: Option<&str>,
        lesson_number: Option<i64>,
    ) -> SearchResults {
        if query.trim().is_empty() {
            log::warn!("[STORE] Empty query provided to search");
            return SearchResults::empty("Query cannot be empty");
        }

        // Step 1: resolve the course name if provided
        let course_title = match course_name {
            Some(name) => match self.resolve_course_name(name) {
                Some(title) => Some(title),
                None => {
                    log::info!("[STORE] No course found matching '{}'", name);
                    return SearchResults::empty(format!("No course found matching '{}'", name));
                }
            },
            None => None,
        };

        // Step 2: load candidate chunks under the active filters
        let conn = self.conn.lock().unwrap();
        let mut sql =
            "SELECT content, course_title, lesson_number FROM course_content WHERE 1=1".to_string();
        let mut args: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        if let Some(ref title) = course_title {
            sql.push_str(" AND course_title = ?");
            args.push(Box::new(title.clone()));
        }
        if let Some(lesson) = lesson_number {
            sql.push_str(" AND lesson_number = ?");
            args.push(Box::new(lesson));
        }
        sql.push_str(" ORDER BY id");

        let mut stmt = match conn.prepare(&sql) {
            Ok(s) => s,
            Err(e) => {
                log::error!("[STORE] Search failed: {}", e);
                return SearchResults::empty(format!("Search error: {}", e));
            }
        };

        let rows = stmt.query_map(
            rusqlite::params_from_iter(args.iter().map(|a| a.as_ref())),
            |row| {
                Ok(SearchHit {
                    content: row.get(0)?,
                    course_title: row.get(1)?,
                    lesson_number: row.get(2)?,
                })
            },
        );

        let candidates: Vec<SearchHit> = match rows {
            Ok(mapped) => mapped.filter_map(|r| r.ok()).collect(),
            Err(e) => {
                log::error!("[STORE] Search failed: {}", e);
                return SearchResults::empty(format!("Search error: {}", e));
            }
        };

        // Step 3: rank by token overlap and keep the top max_results
        let query_tokens = tokenize(&query.to_lowercase());
        let mut scored: Vec<(usize, SearchHit)> = candidates
            .into_iter()
            .map(|hit| {
                let score = overlap_score(&query_tokens, &tokenize(&hit.content.to_lowercase()));
                (score, hit)
            })
            .filter(|(score, _)| *score > 0)
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        scored.truncate(self.max_results);

        let hits: Vec<SearchHit> = scored.into_iter().map(|(_, hit)| hit).collect();
        log::info!("[STORE] Search for '{}' matched {} chunk(s)", query, hits.len());

        SearchResults { hits, error: None }
    }

    fn get_course_link(&self, course_title: &str) -> Option<String> {
        self.load_catalog_row(course_title)?.course_link
    }

    fn get_lesson_link(&self, course_title: &str, lesson_number: i64) -> Option<String> {
        self.load_catalog_row(course_title)?
            .lessons
            .into_iter()
            .find(|l| l.lesson_number == lesson_number)?
            .lesson_link
    }

    fn get_all_courses_metadata(&self) -> Vec<Course> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = match conn
            .prepare("SELECT title, instructor, course_link, lessons_json FROM course_catalog")
        {
            Ok(s) => s,
            Err(e) => {
                log::error!("[STORE] Failed to load catalog: {}", e);
                return Vec::new();
            }
        };

        let rows = stmt.query_map([], |row| {
            let lessons_json: String = row.get(3)?;
            Ok(Course {
                title: row.get(0)?,
                instructor: row.get(1)?,
                course_link: row.get(2)?,
                lessons: serde_json::from_str::<Vec<Lesson>>(&lessons_json).unwrap_or_default(),
            })
        });

        match rows {
            Ok(mapped) => mapped.filter_map(|r| r.ok()).collect(),
            Err(e) => {
                log::error!("[STORE] Failed to load catalog: {}", e);
                Vec::new()
            }
        }
    }

    fn get_existing_course_titles(&self) -> Vec<String> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = match conn.prepare("SELECT title FROM course_catalog") {
            Ok(s) => s,
            Err(e) => {
                log::error!("[STORE] Failed to list course titles: {}", e);
                return Vec::new();
            }
        };

        match stmt.query_map([], |row| row.get::<_, String>(0)) {
            Ok(mapped) => mapped.filter_map(|r| r.ok()).collect(),
            Err(e) => {
                log::error!("[STORE] Failed to list course titles: {}", e);
                Vec::new()
            }
        }
    }

    fn get_course_count(&self) -> usize {
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT COUNT(*) FROM course_catalog", [], |row| {
            row.get::<_, i64>(0)
        })
        .map(|c| c as usize)
        .unwrap_or(0)
    }

    fn add_course_metadata(&self, course: &Course) -> Result<(), String> {
        let lessons_json = serde_json::to_string(&course.lessons)
            .map_err(|e| format!("Failed to serialize lessons: {}", e))?;

        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO course_catalog (title, instructor, course_link, lessons_json, lesson_count)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                course.title,
                course.instructor,
                course.course_link,
                lessons_json,
                course.lessons.len() as i64
            ],
        )
        .map_err(|e| format!("Failed to store course metadata: {}", e))?;
        Ok(())
    }

    fn add_course_content(&self, chunks: &[CourseChunk]) -> Result<(), String> {
        if chunks.is_empty() {
            return Ok(());
        }

        let conn = self.conn.lock().unwrap();
        for chunk in chunks {
            conn.execute(
                "INSERT INTO course_content (course_title, lesson_number, chunk_index, content)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    chunk.course_title,
                    chunk.lesson_number,
                    chunk.chunk_index as i64,
                    chunk.content
                ],
            )
            .map_err(|e| format!("Failed to store course content: {}", e))?;
        }
        Ok(())
    }

    fn clear_all_data(&self) -> Result<(), String> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM course_content", [])
            .map_err(|e| format!("Failed to clear course content: {}", e))?;
        conn.execute("DELETE FROM course_catalog", [])
            .map_err(|e| format!("Failed to clear course catalog: {}", e))?;
        Ok(())
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() > 1)
        .map(String::from)
        .collect()
}

/// Number of distinct query tokens present in the candidate tokens
fn overlap_score(query_tokens: &[String], candidate_tokens: &[String]) -> usize {
    let mut matched: Vec<&String> = Vec::new();
    for token in query_tokens {
        if matched.contains(&token) {
            continue;
        }
        if candidate_tokens.contains(token) {
            matched.push(token);
        }
    }
    matched.len()
}
