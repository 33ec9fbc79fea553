/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Memory-store and retrieval-augmented answering collaborators.
//!
//! The palette depends on [`MemoryBackend`] only; [`HttpBackend`] is the
//! production implementation over `POST /memory/save` and `POST /rag`.

use std::fmt;

use futures_util::future::BoxFuture;
use ghostshell_core::ScrapedMemory;
use serde::{Deserialize, Serialize};
use url::Url;

const SAVE_PATH: &str = "memory/save";
const RAG_PATH: &str = "rag";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BackendError {
    /// The request never produced an HTTP response.
    Transport(String),
    /// Non-2xx status.
    Status(u16),
    /// 2xx, but the body reports a failure.
    Rejected(String),
    /// 2xx with a body we could not read.
    Decode(String),
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::Transport(e) => write!(f, "{e}"),
            BackendError::Status(code) => write!(f, "HTTP error! status: {code}"),
            BackendError::Rejected(message) => write!(f, "{message}"),
            BackendError::Decode(e) => write!(f, "Malformed response: {e}"),
        }
    }
}

impl std::error::Error for BackendError {}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SaveReceipt {
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RagAnswer {
    pub answer: String,
    pub source: String,
    pub hallucinated: bool,
}

pub trait MemoryBackend: Send + Sync {
    fn save_memory<'a>(
        &'a self,
        memory: &'a ScrapedMemory,
    ) -> BoxFuture<'a, Result<SaveReceipt, BackendError>>;

    fn query<'a>(&'a self, question: &'a str) -> BoxFuture<'a, Result<RagAnswer, BackendError>>;
}

#[derive(Deserialize)]
struct SaveReply {
    status: String,
    #[serde(default)]
    message: String,
}

#[derive(Serialize)]
struct RagRequest<'a> {
    question: &'a str,
}

#[derive(Deserialize)]
struct RagReply {
    answer: Option<String>,
    #[serde(default)]
    source: String,
    #[serde(default)]
    hallucinated: bool,
    error: Option<String>,
}

/// Classify a `/memory/save` reply.
pub fn interpret_save_reply(status: u16, body: &str) -> Result<SaveReceipt, BackendError> {
    if !(200..300).contains(&status) {
        return Err(BackendError::Status(status));
    }
    let reply: SaveReply =
        serde_json::from_str(body).map_err(|e| BackendError::Decode(e.to_string()))?;
    if reply.status == "success" {
        Ok(SaveReceipt {
            message: reply.message,
        })
    } else if reply.message.is_empty() {
        Err(BackendError::Rejected("Unknown error occurred".to_string()))
    } else {
        Err(BackendError::Rejected(reply.message))
    }
}

/// Classify a `/rag` reply.
pub fn interpret_rag_reply(status: u16, body: &str) -> Result<RagAnswer, BackendError> {
    if !(200..300).contains(&status) {
        return Err(BackendError::Status(status));
    }
    let reply: RagReply =
        serde_json::from_str(body).map_err(|e| BackendError::Decode(e.to_string()))?;
    if let Some(error) = reply.error {
        return Err(BackendError::Rejected(error));
    }
    let answer = reply
        .answer
        .ok_or_else(|| BackendError::Decode("missing field `answer`".to_string()))?;
    Ok(RagAnswer {
        answer,
        source: reply.source,
        hallucinated: reply.hallucinated,
    })
}

pub struct HttpBackend {
    client: reqwest::Client,
    save_url: Url,
    rag_url: Url,
}

impl HttpBackend {
    pub fn new(base: &Url) -> Result<Self, url::ParseError> {
        // `join` replaces the last path segment unless the base ends in '/'.
        let mut base = base.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self {
            client: reqwest::Client::new(),
            save_url: base.join(SAVE_PATH)?,
            rag_url: base.join(RAG_PATH)?,
        })
    }

    pub fn save_url(&self) -> &Url {
        &self.save_url
    }

    pub fn rag_url(&self) -> &Url {
        &self.rag_url
    }

    async fn post_json<T: Serialize + ?Sized>(
        &self,
        url: &Url,
        body: &T,
    ) -> Result<(u16, String), BackendError> {
        let response = self
            .client
            .post(url.clone())
            .json(body)
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        Ok((status, text))
    }
}

impl MemoryBackend for HttpBackend {
    fn save_memory<'a>(
        &'a self,
        memory: &'a ScrapedMemory,
    ) -> BoxFuture<'a, Result<SaveReceipt, BackendError>> {
        Box::pin(async move {
            let (status, body) = self.post_json(&self.save_url, memory).await?;
            interpret_save_reply(status, &body)
        })
    }

    fn query<'a>(&'a self, question: &'a str) -> BoxFuture<'a, Result<RagAnswer, BackendError>> {
        Box::pin(async move {
            let (status, body) = self
                .post_json(&self.rag_url, &RagRequest { question })
                .await?;
            interpret_rag_reply(status, &body)
        })
    }
}

#[cfg(any(test, feature = "test-support"))]
pub mod test_support {
    //! Scripted in-memory backend.

    use std::collections::VecDeque;
    use std::sync::Arc;
    use std::time::Duration;

    use parking_lot::Mutex;

    use super::*;

    #[derive(Default)]
    struct Script {
        saves: VecDeque<Result<SaveReceipt, BackendError>>,
        queries: VecDeque<(Duration, Result<RagAnswer, BackendError>)>,
        saved: Vec<ScrapedMemory>,
        questions: Vec<String>,
    }

    /// Replies are consumed in order; when the script runs dry saves succeed
    /// and queries echo the question.
    #[derive(Clone, Default)]
    pub struct ScriptedBackend {
        script: Arc<Mutex<Script>>,
    }

    impl ScriptedBackend {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn push_save(&self, reply: Result<SaveReceipt, BackendError>) {
            self.script.lock().saves.push_back(reply);
        }

        pub fn push_query(&self, reply: Result<RagAnswer, BackendError>) {
            self.push_query_after(Duration::ZERO, reply);
        }

        pub fn push_query_after(&self, delay: Duration, reply: Result<RagAnswer, BackendError>) {
            self.script.lock().queries.push_back((delay, reply));
        }

        pub fn save_calls(&self) -> usize {
            self.script.lock().saved.len()
        }

        pub fn saved(&self) -> Vec<ScrapedMemory> {
            self.script.lock().saved.clone()
        }

        pub fn questions(&self) -> Vec<String> {
            self.script.lock().questions.clone()
        }
    }

    impl MemoryBackend for ScriptedBackend {
        fn save_memory<'a>(
            &'a self,
            memory: &'a ScrapedMemory,
        ) -> BoxFuture<'a, Result<SaveReceipt, BackendError>> {
            Box::pin(async move {
                let reply = {
                    let mut script = self.script.lock();
                    script.saved.push(memory.clone());
                    script.saves.pop_front()
                };
                reply.unwrap_or_else(|| {
                    Ok(SaveReceipt {
                        message: "Memory saved successfully!".to_string(),
                    })
                })
            })
        }

        fn query<'a>(
            &'a self,
            question: &'a str,
        ) -> BoxFuture<'a, Result<RagAnswer, BackendError>> {
            Box::pin(async move {
                let scripted = {
                    let mut script = self.script.lock();
                    script.questions.push(question.to_string());
                    script.queries.pop_front()
                };
                match scripted {
                    Some((delay, reply)) => {
                        if !delay.is_zero() {
                            tokio::time::sleep(delay).await;
                        }
                        reply
                    }
                    None => Ok(RagAnswer {
                        answer: format!("echo: {question}"),
                        source: "scripted_backend".to_string(),
                        hallucinated: false,
                    }),
                }
            })
        }
    }
}
