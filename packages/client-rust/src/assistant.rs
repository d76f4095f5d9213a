//! Portfolio chat assistant over a pluggable text-completion client.

use std::collections::VecDeque;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use folio_core::{Experience, Profile, Project, Skill};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Single-shot prompt/response text completion.
///
/// Used as `Arc<dyn CompletionClient>` so the backing model can be swapped
/// or faked.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> anyhow::Result<String>;
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    prompt: &'a str,
}

#[derive(Deserialize)]
struct CompletionResponse {
    text: String,
}

/// Completion endpoint that accepts `{"prompt": ...}` and answers
/// `{"text": ...}`.
#[derive(Debug, Clone)]
pub struct HttpCompletionClient {
    client: reqwest::Client,
    endpoint: Url,
    api_key: Option<String>,
}

impl HttpCompletionClient {
    /// # Errors
    ///
    /// Returns an error if `endpoint` does not parse or the HTTP client
    /// cannot be built.
    pub fn new(endpoint: &str, api_key: Option<String>, timeout: Duration) -> anyhow::Result<Self> {
        let endpoint =
            Url::parse(endpoint).with_context(|| format!("invalid completion endpoint `{endpoint}`"))?;
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint,
            api_key,
        })
    }
}

#[async_trait]
impl CompletionClient for HttpCompletionClient {
    async fn complete(&self, prompt: &str) -> anyhow::Result<String> {
        let mut request = self
            .client
            .post(self.endpoint.clone())
            .json(&CompletionRequest { prompt });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request.send().await.context("completion request failed")?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("completion endpoint returned {status}: {body}");
        }
        let body: CompletionResponse = response
            .json()
            .await
            .context("completion response is not {\"text\": ...}")?;
        Ok(body.text)
    }
}

/// One question and its answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub question: String,
    pub answer: String,
}

/// Answers visitor questions about the portfolio owner.
///
/// Every prompt carries the portfolio context and the most recent turns;
/// older turns are forgotten.
pub struct ChatAssistant {
    client: Arc<dyn CompletionClient>,
    context: String,
    history: VecDeque<Turn>,
    max_turns: usize,
}

impl ChatAssistant {
    pub const DEFAULT_MAX_TURNS: usize = 6;

    #[must_use]
    pub fn new(client: Arc<dyn CompletionClient>, context: impl Into<String>) -> Self {
        Self {
            client,
            context: context.into(),
            history: VecDeque::new(),
            max_turns: Self::DEFAULT_MAX_TURNS,
        }
    }

    /// Assistant whose context describes the given portfolio content.
    #[must_use]
    pub fn from_portfolio(
        client: Arc<dyn CompletionClient>,
        profile: &Profile,
        skills: &[Skill],
        experience: &[Experience],
        projects: &[Project],
    ) -> Self {
        Self::new(client, portfolio_context(profile, skills, experience, projects))
    }

    #[must_use]
    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns;
        self.trim();
        self
    }

    #[must_use]
    pub fn history(&self) -> &VecDeque<Turn> {
        &self.history
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }

    /// Asks `question` and records the answer.
    ///
    /// # Errors
    ///
    /// Returns an error for a blank question or a failed completion. A
    /// failed turn is not recorded.
    pub async fn ask(&mut self, question: &str) -> anyhow::Result<String> {
        let question = question.trim();
        if question.is_empty() {
            anyhow::bail!("question is empty");
        }
        let prompt = self.prompt(question);
        debug!(prompt_len = prompt.len(), turns = self.history.len(), "asking assistant");
        let answer = self.client.complete(&prompt).await?.trim().to_owned();
        self.history.push_back(Turn {
            question: question.to_owned(),
            answer: answer.clone(),
        });
        self.trim();
        Ok(answer)
    }

    fn prompt(&self, question: &str) -> String {
        let mut prompt = String::with_capacity(self.context.len() + 256);
        prompt.push_str(
            "You answer questions about the person described below, using only this information.\n\n",
        );
        prompt.push_str(&self.context);
        prompt.push_str("\n\n");
        for turn in &self.history {
            let _ = writeln!(prompt, "User: {}\nAssistant: {}", turn.question, turn.answer);
        }
        let _ = write!(prompt, "User: {question}\nAssistant:");
        prompt
    }

    fn trim(&mut self) {
        while self.history.len() > self.max_turns {
            self.history.pop_front();
        }
    }
}

fn portfolio_context(
    profile: &Profile,
    skills: &[Skill],
    experience: &[Experience],
    projects: &[Project],
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Name: {}", profile.full_name);
    if !profile.headline.is_empty() {
        let _ = writeln!(out, "Headline: {}", profile.headline);
    }
    if !profile.bio.is_empty() {
        let _ = writeln!(out, "Bio: {}", profile.bio);
    }
    let _ = writeln!(
        out,
        "Available for hire: {}",
        if profile.available_for_hire { "yes" } else { "no" }
    );

    if !skills.is_empty() {
        out.push_str("Skills:\n");
        for skill in skills {
            let _ = writeln!(out, "- {} ({}, {}%)", skill.name, skill.category, skill.proficiency);
        }
    }
    if !experience.is_empty() {
        out.push_str("Experience:\n");
        for job in experience {
            let until = job.end_date.as_deref().unwrap_or("present");
            let _ = writeln!(out, "- {} at {}, {} to {}", job.role, job.company, job.start_date, until);
        }
    }
    if !projects.is_empty() {
        out.push_str("Projects:\n");
        for project in projects {
            let _ = writeln!(
                out,
                "- {}: {} [{}]",
                project.title,
                project.description,
                project.tech_stack.join(", ")
            );
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;

    use super::*;

    /// Echoes a canned answer and remembers every prompt.
    #[derive(Default)]
    struct FakeClient {
        prompts: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl CompletionClient for FakeClient {
        async fn complete(&self, prompt: &str) -> anyhow::Result<String> {
            self.prompts.lock().push(prompt.to_owned());
            if self.fail {
                anyhow::bail!("model unavailable");
            }
            Ok(format!("  answer {}  ", self.prompts.lock().len()))
        }
    }

    fn profile() -> Profile {
        Profile {
            full_name: "Ada Lovelace".into(),
            headline: "Analyst".into(),
            email: "ada@example.com".into(),
            available_for_hire: true,
            ..Profile::default()
        }
    }

    #[test]
    fn context_lists_portfolio_content() {
        let skills = vec![Skill {
            name: "Rust".into(),
            category: "backend".into(),
            proficiency: 90,
            ..Skill::default()
        }];
        let experience = vec![Experience {
            company: "Analytical Engines".into(),
            role: "Programmer".into(),
            start_date: "1842-01".into(),
            ..Experience::default()
        }];
        let context = portfolio_context(&profile(), &skills, &experience, &[]);
        assert!(context.contains("Name: Ada Lovelace"));
        assert!(context.contains("- Rust (backend, 90%)"));
        assert!(context.contains("Programmer at Analytical Engines, 1842-01 to present"));
        assert!(!context.contains("Projects:"));
    }

    #[tokio::test]
    async fn ask_includes_context_and_history() {
        let client = Arc::new(FakeClient::default());
        let mut assistant =
            ChatAssistant::from_portfolio(client.clone(), &profile(), &[], &[], &[]);

        assert_eq!(assistant.ask("Who are you?").await.unwrap(), "answer 1");
        assistant.ask("  Hiring?  ").await.unwrap();

        let prompts = client.prompts.lock().clone();
        assert!(prompts[0].contains("Name: Ada Lovelace"));
        assert!(prompts[0].ends_with("User: Who are you?\nAssistant:"));
        assert!(prompts[1].contains("User: Who are you?\nAssistant: answer 1\n"));
        assert!(prompts[1].ends_with("User: Hiring?\nAssistant:"));
    }

    #[tokio::test]
    async fn history_is_bounded() {
        let client = Arc::new(FakeClient::default());
        let mut assistant = ChatAssistant::new(client, "ctx").with_max_turns(2);
        for q in ["a", "b", "c"] {
            assistant.ask(q).await.unwrap();
        }
        let questions: Vec<_> = assistant.history().iter().map(|t| t.question.as_str()).collect();
        assert_eq!(questions, vec!["b", "c"]);
    }

    #[tokio::test]
    async fn failed_or_blank_questions_leave_history_untouched() {
        let client = Arc::new(FakeClient {
            fail: true,
            ..FakeClient::default()
        });
        let mut assistant = ChatAssistant::new(client.clone(), "ctx");
        assert!(assistant.ask("   ").await.is_err());
        assert!(client.prompts.lock().is_empty());
        let err = assistant.ask("hello").await.unwrap_err();
        assert_eq!(err.to_string(), "model unavailable");
        assert!(assistant.history().is_empty());
    }

    #[test]
    fn http_client_rejects_bad_endpoint() {
        assert!(HttpCompletionClient::new("nope", None, Duration::from_secs(1)).is_err());
    }
}
