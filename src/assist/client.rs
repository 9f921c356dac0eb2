//! Assist clients: the transport behind the escalation gate.
//!
//! A client receives one self-contained request (purpose, step framing,
//! the user's words) and returns one composed line. The HTTP client talks
//! to any OpenAI-compatible chat endpoint; the scripted client answers
//! from canned lines and exists for tests and offline runs.

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::catalog::WorkType;
use crate::validation::EscalationCategory;

/// What the gate is asking the client to compose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssistPurpose {
    /// Rephrase the corrective for a named escalation category.
    Clarify(EscalationCategory),
    /// Nudge the user to restate an overlong answer in fewer words.
    Rephrase,
}

/// One guidance request: enough session framing for a single-turn
/// completion, nothing more.
#[derive(Debug, Clone)]
pub struct AssistRequest {
    pub purpose: AssistPurpose,
    pub work_type: WorkType,
    pub step_prompt: String,
    pub user_input: String,
    pub statement: Option<String>,
}

/// Composes one guidance line per request.
#[async_trait]
pub trait AssistClient: Send + Sync {
    async fn complete(&self, request: &AssistRequest) -> Result<String>;
}

/// Client for OpenAI-compatible `/v1/chat/completions` endpoints.
pub struct HttpAssistClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl HttpAssistClient {
    pub fn new(base_url: &str, model: &str, api_key: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("mindshift")
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
        })
    }

    fn system_prompt(request: &AssistRequest) -> String {
        let mut prompt = String::from(
            "You are the voice of a Mind Shifting guide. Reply with exactly one short, warm, \
             plain-English sentence or question. Never give advice, never analyse, never \
             mention being an AI.",
        );
        match request.purpose {
            AssistPurpose::Clarify(category) => {
                prompt.push_str(&format!(
                    " The user's answer was classified as {} while a {} statement is needed. \
                     Ask them to restate it in the needed form.",
                    category.as_str().replace('_', " "),
                    request.work_type.noun(),
                ));
            }
            AssistPurpose::Rephrase => {
                prompt.push_str(
                    " The user's answer is too long to work with. Ask them to say it again \
                     in just a few words, keeping their own language.",
                );
            }
        }
        prompt
    }

    fn user_prompt(request: &AssistRequest) -> String {
        let mut prompt = format!(
            "Current prompt: {}\nUser answered: {}",
            request.step_prompt, request.user_input
        );
        if let Some(statement) = &request.statement {
            prompt.push_str(&format!("\nWorking statement: {statement}"));
        }
        prompt
    }
}

#[async_trait]
impl AssistClient for HttpAssistClient {
    async fn complete(&self, request: &AssistRequest) -> Result<String> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": Self::system_prompt(request)},
                {"role": "user", "content": Self::user_prompt(request)},
            ],
            "temperature": 0.2,
            "max_tokens": 120,
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("Assist request failed to send")?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("Assist endpoint returned {}: {}", status, text);
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .context("Assist response was not valid JSON")?;
        let content = payload["choices"][0]["message"]["content"]
            .as_str()
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .context("Assist response carried no message content")?;
        Ok(content.to_string())
    }
}

/// Canned guidance for tests and offline runs: deterministic, no I/O.
pub struct ScriptedAssistClient;

#[async_trait]
impl AssistClient for ScriptedAssistClient {
    async fn complete(&self, request: &AssistRequest) -> Result<String> {
        let line = match request.purpose {
            AssistPurpose::Clarify(EscalationCategory::ProblemVsQuestion) => {
                "That sounds like a question. Try naming what the problem is for you right \
                 now, in a few words."
            }
            AssistPurpose::Clarify(EscalationCategory::ProblemVsGoal) => {
                "That sounds like where you want to get to. What is in the way of it right \
                 now? Say that as the problem."
            }
            AssistPurpose::Clarify(EscalationCategory::GoalVsProblem) => {
                "That sounds like what is wrong right now. What would you like instead? Say \
                 that as the goal."
            }
            AssistPurpose::Clarify(EscalationCategory::GoalVsQuestion) => {
                "That sounds like a question. Try naming the goal you want, in a few words."
            }
            AssistPurpose::Clarify(EscalationCategory::SingleNegativeExperience) => {
                "That sounds like it happened more than once. Pick one specific moment and \
                 tell me about that one."
            }
            AssistPurpose::Rephrase => {
                "That was a lot of words. Try saying it again in just a few."
            }
        };
        Ok(line.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(purpose: AssistPurpose) -> AssistRequest {
        AssistRequest {
            purpose,
            work_type: WorkType::Problem,
            step_prompt: "Tell me what the problem is in a few words.".to_string(),
            user_input: "why am I like this?".to_string(),
            statement: None,
        }
    }

    #[test]
    fn test_system_prompt_names_the_category() {
        let prompt = HttpAssistClient::system_prompt(&request(AssistPurpose::Clarify(
            EscalationCategory::ProblemVsQuestion,
        )));
        assert!(prompt.contains("problem vs question"));
        assert!(prompt.contains("problem statement"));
    }

    #[test]
    fn test_user_prompt_includes_statement_when_set() {
        let mut req = request(AssistPurpose::Rephrase);
        req.statement = Some("I freeze up in meetings".to_string());
        let prompt = HttpAssistClient::user_prompt(&req);
        assert!(prompt.contains("Working statement: I freeze up in meetings"));
    }

    #[tokio::test]
    async fn test_scripted_client_covers_every_category() {
        for category in EscalationCategory::all() {
            let line = ScriptedAssistClient
                .complete(&request(AssistPurpose::Clarify(category)))
                .await
                .unwrap();
            assert!(!line.is_empty(), "{category}");
        }
    }

    #[tokio::test]
    async fn test_scripted_client_rephrase_line() {
        let line = ScriptedAssistClient
            .complete(&request(AssistPurpose::Rephrase))
            .await
            .unwrap();
        assert!(line.contains("a few"));
    }
}
