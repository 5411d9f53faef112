use std::env;

#[derive(Clone)]
pub struct Config {
    pub anthropic_api_key: String,
    pub anthropic_model: String,
    pub port: u16,
    pub database_url: String,
    pub docs_dir: String,
    /// Size of text chunks for indexing, in characters
    pub chunk_size: usize,
    /// Characters of overlap between consecutive chunks
    pub chunk_overlap: usize,
    /// Maximum search results returned per query
    pub max_results: usize,
    /// Number of past question/answer exchanges kept per session
    pub max_history: usize,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            anthropic_api_key: env::var("ANTHROPIC_API_KEY").unwrap_or_default(),
            anthropic_model: env::var("ANTHROPIC_MODEL")
                .unwrap_or_else(|_| "claude-sonnet-4-20250514".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8000".to_string())
                .parse()
                .expect("PORT must be a valid number"),
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "./.db/coursebot.db".to_string()),
            docs_dir: env::var("COURSE_DOCS_DIR").unwrap_or_else(|_| "./docs".to_string()),
            chunk_size: env_usize("CHUNK_SIZE", 800),
            chunk_overlap: env_usize("CHUNK_OVERLAP", 100),
            max_results: env_usize("MAX_RESULTS", 5),
            max_history: env_usize("MAX_HISTORY", 2),
        }
    }

    /// Validate settings and return the list of issues found (empty if valid).
    /// Issues containing "must be" or "will fail" are critical.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if self.anthropic_api_key.is_empty() {
            issues.push("ANTHROPIC_API_KEY is not set - API calls will fail".to_string());
        } else if !self.anthropic_api_key.starts_with("sk-") {
            issues.push("ANTHROPIC_API_KEY format appears invalid".to_string());
        }

        if self.max_results == 0 {
            issues.push(format!(
                "MAX_RESULTS ({}) must be > 0 - this will cause search failures",
                self.max_results
            ));
        }

        if self.chunk_size == 0 {
            issues.push(format!("CHUNK_SIZE ({}) must be > 0", self.chunk_size));
        }

        if self.chunk_size > 0 && self.chunk_overlap >= self.chunk_size {
            issues.push(format!(
                "CHUNK_OVERLAP ({}) should be < CHUNK_SIZE ({})",
                self.chunk_overlap, self.chunk_size
            ));
        }

        if self.max_results > 20 {
            issues.push(format!(
                "MAX_RESULTS ({}) is very high - may impact performance",
                self.max_results
            ));
        }

        issues
    }

    /// Validate and log all issues. Returns false if any critical issue was found.
    pub fn validate_and_log(&self) -> bool {
        let issues = self.validate();
        if issues.is_empty() {
            log::info!("Configuration validation passed");
            return true;
        }

        let mut critical = 0;
        for issue in &issues {
            if issue.contains("must be") || issue.contains("will fail") {
                critical += 1;
                log::error!("Config error: {}", issue);
            } else {
                log::warn!("Config warning: {}", issue);
            }
        }

        if critical > 0 {
            log::error!("Configuration has {} critical issue(s)", critical);
            false
        } else {
            log::info!(
                "Configuration validation passed with {} warning(s)",
                issues.len()
            );
            true
        }
    }
}

fn env_usize(key: &str, default: usize) -> usize {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
