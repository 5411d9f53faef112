//! Course document parsing and chunking
//!
//! Documents follow a structured format: a header of `Course Title:` /
//! `Course Link:` / `Course Instructor:` lines, then `Lesson N: Title`
//! sections, each optionally followed by a `Lesson Link:` line and the
//! lesson's prose.

use crate::models::{Course, CourseChunk, Lesson};
use std::fs;
use std::path::Path;

pub struct DocumentProcessor {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl DocumentProcessor {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        DocumentProcessor {
            chunk_size,
            chunk_overlap,
        }
    }

    /// Read and parse one course document into its course record and
    /// indexable chunks
    pub fn process_document(&self, path: &Path) -> Result<(Course, Vec<CourseChunk>), String> {
        let text = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read '{}': {}", path.display(), e))?;

        let fallback_title = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("Untitled Course")
            .to_string();

        Ok(self.parse_course_text(&text, &fallback_title))
    }

    pub fn parse_course_text(&self, text: &str, fallback_title: &str) -> (Course, Vec<CourseChunk>) {
        let mut title = fallback_title.to_string();
        let mut course_link = None;
        let mut instructor = None;

        let mut lessons: Vec<Lesson> = Vec::new();
        // (lesson_number, accumulated prose) per section; None = preamble
        let mut sections: Vec<(Option<i64>, Vec<String>)> = vec![(None, Vec::new())];

        for line in text.lines() {
            let trimmed = line.trim();

            if let Some(value) = trimmed.strip_prefix("Course Title:") {
                title = value.trim().to_string();
                continue;
            }
            if let Some(value) = trimmed.strip_prefix("Course Link:") {
                course_link = non_empty(value);
                continue;
            }
            if let Some(value) = trimmed.strip_prefix("Course Instructor:") {
                instructor = non_empty(value);
                continue;
            }
            if let Some(value) = trimmed.strip_prefix("Lesson Link:") {
                if let Some(lesson) = lessons.last_mut() {
                    lesson.lesson_link = non_empty(value);
                }
                continue;
            }

            if let Some((number, lesson_title)) = parse_lesson_header(trimmed) {
                lessons.push(Lesson {
                    lesson_number: number,
                    title: lesson_title,
                    lesson_link: None,
                });
                sections.push((Some(number), Vec::new()));
                continue;
            }

            if !trimmed.is_empty() {
                if let Some((_, content)) = sections.last_mut() {
                    content.push(trimmed.to_string());
                }
            }
        }

        let mut chunks = Vec::new();
        let mut chunk_index = 0;

        for (lesson_number, content_lines) in sections {
            if content_lines.is_empty() {
                continue;
            }
            let content = content_lines.join(" ");

            for (i, chunk) in self.chunk_text(&content).into_iter().enumerate() {
                // First chunk of each section carries course/lesson context so
                // it stays searchable on its own
                let content = if i == 0 {
                    match lesson_number {
                        Some(n) => format!("Course {} Lesson {} content: {}", title, n, chunk),
                        None => format!("Course {} content: {}", title, chunk),
                    }
                } else {
                    chunk
                };

                chunks.push(CourseChunk {
                    content,
                    course_title: title.clone(),
                    lesson_number,
                    chunk_index,
                });
                chunk_index += 1;
            }
        }

        let course = Course {
            title,
            course_link,
            instructor,
            lessons,
        };

        (course, chunks)
    }

    /// Sentence-aware chunking: greedily pack whole sentences up to
    /// `chunk_size` characters, carrying up to `chunk_overlap` trailing
    /// characters of sentences into the next chunk
    fn chunk_text(&self, text: &str) -> Vec<String> {
        let sentences = split_sentences(text);
        if sentences.is_empty() {
            return Vec::new();
        }

        let mut chunks = Vec::new();
        let mut current: Vec<&str> = Vec::new();
        let mut current_len = 0;

        for &sentence in &sentences {
            let added_len = sentence.len() + if current.is_empty() { 0 } else { 1 };
            if !current.is_empty() && current_len + added_len > self.chunk_size {
                chunks.push(current.join(" "));

                // Seed the next chunk with trailing overlap sentences
                let mut overlap: Vec<&str> = Vec::new();
                let mut overlap_len = 0;
                for &prev in current.iter().rev() {
                    if overlap_len + prev.len() > self.chunk_overlap {
                        break;
                    }
                    overlap_len += prev.len() + 1;
                    overlap.insert(0, prev);
                }
                current = overlap;
                current_len = overlap_len;
            }
            current_len += sentence.len() + if current.is_empty() { 0 } else { 1 };
            current.push(sentence);
        }

        if !current.is_empty() {
            chunks.push(current.join(" "));
        }

        chunks
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Parse a `Lesson N: Title` section header
fn parse_lesson_header(line: &str) -> Option<(i64, String)> {
    let rest = line.strip_prefix("Lesson ")?;
    let colon = rest.find(':')?;
    let number: i64 = rest[..colon].trim().parse().ok()?;
    let title = rest[colon + 1..].trim();
    if title.is_empty() {
        return None;
    }
    Some((number, title.to_string()))
}

/// Split on sentence-ending punctuation followed by whitespace
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let bytes = text.as_bytes();
    let mut start = 0;

    for (i, c) in text.char_indices() {
        if matches!(c, '.' | '!' | '?') {
            let next = i + c.len_utf8();
            if next >= bytes.len() || bytes[next].is_ascii_whitespace() {
                let sentence = text[start..next].trim();
                if !sentence.is_empty() {
                    sentences.push(sentence);
                }
                start = next;
            }
        }
    }

    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }

    sentences
}
