use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

/// One past question/answer pair
#[derive(Debug, Clone)]
struct Exchange {
    question: String,
    answer: String,
}

#[derive(Debug, Default)]
struct Session {
    exchanges: Vec<Exchange>,
}

/// In-memory conversation sessions, each bounded to `max_history` exchange
/// pairs. History is rendered as plain text for the model's system context;
/// the orchestration layer treats it as opaque.
pub struct SessionManager {
    max_history: usize,
    sessions: RwLock<HashMap<String, Session>>,
}

impl SessionManager {
    pub fn new(max_history: usize) -> Self {
        SessionManager {
            max_history,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn create_session(&self) -> String {
        let session_id = Uuid::new_v4().to_string();
        self.sessions
            .write()
            .insert(session_id.clone(), Session::default());
        session_id
    }

    /// Rendered history for a session, or None if the session is unknown or
    /// has no exchanges yet
    pub fn get_conversation_history(&self, session_id: &str) -> Option<String> {
        let sessions = self.sessions.read();
        let session = sessions.get(session_id)?;
        if session.exchanges.is_empty() {
            return None;
        }

        let rendered = session
            .exchanges
            .iter()
            .map(|e| format!("User: {}\nAssistant: {}", e.question, e.answer))
            .collect::<Vec<_>>()
            .join("\n");
        Some(rendered)
    }

    /// Record a completed exchange, creating the session entry if needed and
    /// dropping the oldest pairs beyond the history bound
    pub fn add_exchange(&self, session_id: &str, question: &str, answer: &str) {
        if self.max_history == 0 {
            return;
        }

        let mut sessions = self.sessions.write();
        let session = sessions.entry(session_id.to_string()).or_default();

        session.exchanges.push(Exchange {
            question: question.to_string(),
            answer: answer.to_string(),
        });

        let len = session.exchanges.len();
        if len > self.max_history {
            session.exchanges.drain(..len - self.max_history);
        }
    }

    pub fn clear_session(&self, session_id: &str) {
        if let Some(session) = self.sessions.write().get_mut(session_id) {
            session.exchanges.clear();
        }
    }
}
