use crate::aggregator::{aggregate_all, loaded_months};
use crate::config::Settings;
use crate::error::{InsightsError, Result};
use crate::ingestion::{self, IngestionReport};
use crate::llm::InsightProvider;
use crate::prompt::build_prompt;
use crate::schema::{ChatMessage, Month};
use crate::store::KeyValueStore;
use log::{info, warn};

/// Where the session stands between user actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No month has been uploaded yet.
    NoData,
    Uploading,
    /// At least one month is loaded and no question has been asked since.
    Ready,
    Asking,
    Answered,
    /// The last question failed; its message was removed from the transcript.
    Failed,
}

/// One user's analysis session: stored month data, settings and the chat transcript.
///
/// The transcript lives only as long as the session. Every mutating operation takes
/// `&mut self`, so a second question cannot start while one is in flight.
pub struct ChatSession<S, P> {
    store: S,
    provider: P,
    settings: Settings,
    messages: Vec<ChatMessage>,
    state: SessionState,
}

impl<S: KeyValueStore, P: InsightProvider> ChatSession<S, P> {
    /// Opens a session, loading (and on first run seeding) the stored settings.
    pub fn new(mut store: S, provider: P) -> Result<Self> {
        let settings = Settings::load(&mut store)?;
        Self::with_settings(store, provider, settings)
    }

    pub fn with_settings(store: S, provider: P, settings: Settings) -> Result<Self> {
        let mut session = Self {
            store,
            provider,
            settings,
            messages: Vec::new(),
            state: SessionState::NoData,
        };
        session.state = session.idle_state()?;
        Ok(session)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn loaded_months(&self) -> Result<Vec<Month>> {
        loaded_months(&self.store)
    }

    pub fn set_api_key(&mut self, api_key: impl Into<String>) -> Result<()> {
        self.settings.save_api_key(&mut self.store, api_key)
    }

    /// Persists the model name. The provider keeps the model it was built with,
    /// so the change applies to the next session.
    pub fn set_model(&mut self, model: impl Into<String>) -> Result<()> {
        self.settings.save_model(&mut self.store, model)
    }

    /// Uploads one month's spreadsheet. The session returns to an idle state
    /// whether or not the upload succeeds.
    pub fn upload(&mut self, month: Month, file_name: &str, bytes: &[u8]) -> Result<IngestionReport> {
        self.state = SessionState::Uploading;
        let outcome = ingestion::ingest(&mut self.store, month, file_name, bytes);
        if let Err(e) = &outcome {
            warn!("Upload for {} failed: {}", month, e);
        }
        self.state = self.idle_state()?;
        outcome
    }

    pub fn clear_month(&mut self, month: Month) -> Result<()> {
        ingestion::clear_month(&mut self.store, month)?;
        self.state = self.idle_state()?;
        Ok(())
    }

    /// Asks a question about every loaded month.
    ///
    /// A blank question is ignored and returns `Ok(None)`. A missing API key fails
    /// before anything is recorded. Any later failure removes the question from the
    /// transcript again, so the log only holds questions that were answered.
    pub async fn ask(&mut self, question: &str) -> Result<Option<String>> {
        if question.trim().is_empty() {
            return Ok(None);
        }

        let api_key = self.settings.require_api_key()?.to_string();

        self.messages.push(ChatMessage::user(question));
        self.state = SessionState::Asking;

        match self.answer(question, &api_key).await {
            Ok(answer) => {
                self.messages.push(ChatMessage::assistant(answer.clone()));
                self.state = SessionState::Answered;
                Ok(Some(answer))
            }
            Err(e) => {
                warn!("Question failed: {}", e);
                self.messages.pop();
                self.state = SessionState::Failed;
                Err(e)
            }
        }
    }

    async fn answer(&self, question: &str, api_key: &str) -> Result<String> {
        let rows = aggregate_all(&self.store)?;
        if rows.is_empty() {
            return Err(InsightsError::NoData);
        }

        let months = loaded_months(&self.store)?;
        let prompt = build_prompt(&rows, question, &months)?;

        info!(
            "Asking about {} rows across {} months",
            rows.len(),
            months.len()
        );
        self.provider.ask(&prompt, api_key).await
    }

    fn idle_state(&self) -> Result<SessionState> {
        if loaded_months(&self.store)?.is_empty() {
            Ok(SessionState::NoData)
        } else {
            Ok(SessionState::Ready)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_MODEL;
    use crate::schema::Role;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Replays canned answers and records the prompts it receives.
    struct ScriptedProvider {
        answers: Mutex<Vec<Result<String>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedProvider {
        fn new(answers: Vec<Result<String>>) -> Self {
            Self {
                answers: Mutex::new(answers),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl InsightProvider for ScriptedProvider {
        async fn ask(&self, prompt: &str, _api_key: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.answers.lock().unwrap().remove(0)
        }
    }

    fn settings(key: &str) -> Settings {
        Settings {
            api_key: key.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    const JANUARY: &[u8] = b"Data,Produto,Receita\n2024-01-02,Caneta,10\n";

    #[tokio::test]
    async fn test_upload_moves_to_ready() {
        let provider = ScriptedProvider::new(vec![]);
        let mut session =
            ChatSession::with_settings(MemoryStore::new(), provider, settings("k")).unwrap();
        assert_eq!(session.state(), SessionState::NoData);

        assert!(session
            .upload(Month::new(0).unwrap(), "jan.csv", b"a,b\n1,2\n")
            .is_err());
        assert_eq!(session.state(), SessionState::NoData);

        session.upload(Month::new(0).unwrap(), "jan.csv", JANUARY).unwrap();
        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(session.loaded_months().unwrap().len(), 1);

        session.clear_month(Month::new(0).unwrap()).unwrap();
        assert_eq!(session.state(), SessionState::NoData);
    }

    #[tokio::test]
    async fn test_successful_question_is_recorded() {
        let provider = ScriptedProvider::new(vec![Ok("Receita total: 10".to_string())]);
        let mut session =
            ChatSession::with_settings(MemoryStore::new(), provider, settings("k")).unwrap();
        session.upload(Month::new(0).unwrap(), "jan.csv", JANUARY).unwrap();

        let answer = session.ask("Qual a receita?").await.unwrap();

        assert_eq!(answer.as_deref(), Some("Receita total: 10"));
        assert_eq!(session.state(), SessionState::Answered);
        let roles: Vec<Role> = session.messages().iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant]);

        let prompts = session.provider.prompts.lock().unwrap();
        assert!(prompts[0].contains("Meses com dados: Janeiro"));
        assert!(prompts[0].contains("Qual a receita?"));
    }

    #[tokio::test]
    async fn test_failed_request_rolls_back_question() {
        let provider = ScriptedProvider::new(vec![
            Ok("primeira".to_string()),
            Err(InsightsError::Request("boom".to_string())),
        ]);
        let mut session =
            ChatSession::with_settings(MemoryStore::new(), provider, settings("k")).unwrap();
        session.upload(Month::new(0).unwrap(), "jan.csv", JANUARY).unwrap();

        session.ask("Pergunta 1").await.unwrap();
        let err = session.ask("Pergunta 2").await.unwrap_err();

        assert!(matches!(err, InsightsError::Request(_)));
        assert_eq!(session.state(), SessionState::Failed);
        assert_eq!(session.messages().len(), 2);
        assert_eq!(session.messages()[1].content, "primeira");
    }

    #[tokio::test]
    async fn test_no_data_never_reaches_provider() {
        let provider = ScriptedProvider::new(vec![]);
        let mut session =
            ChatSession::with_settings(MemoryStore::new(), provider, settings("k")).unwrap();

        let err = session.ask("Qual a receita?").await.unwrap_err();

        assert!(matches!(err, InsightsError::NoData));
        assert!(session.messages().is_empty());
        assert!(session.provider.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_key_and_blank_question() {
        let provider = ScriptedProvider::new(vec![]);
        let mut session =
            ChatSession::with_settings(MemoryStore::new(), provider, settings("  ")).unwrap();
        session.upload(Month::new(0).unwrap(), "jan.csv", JANUARY).unwrap();

        assert_eq!(session.ask("   ").await.unwrap(), None);

        let err = session.ask("Qual a receita?").await.unwrap_err();
        assert!(matches!(err, InsightsError::MissingApiKey));
        assert!(session.messages().is_empty());
        assert_eq!(session.state(), SessionState::Ready);

        session.set_api_key("new-key").unwrap();
        assert_eq!(session.settings().api_key, "new-key");
    }
}
