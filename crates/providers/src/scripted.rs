//! A provider that replays canned responses.
//!
//! Each model call consumes the next scripted reply, in either variant.
//! Every request is recorded so callers can inspect what was sent (e.g.
//! whether tools were offered on a given iteration).

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use futures::StreamExt;
use wela_core::error::ProviderError;
use wela_core::fragment::FragmentBatch;
use wela_core::message::Message;
use wela_core::provider::{CompletionProvider, ProviderRequest, RawFragmentStream, StreamingProvider};

/// One scripted reply.
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    /// Complete messages, one per completion
    Messages(Vec<Message>),
    /// Fragment batches replayed in order
    Fragments(Vec<FragmentBatch>),
    /// Fragment batches followed by a mid-stream failure
    FragmentsThenError(Vec<FragmentBatch>, ProviderError),
    Error(ProviderError),
}

impl ScriptedReply {
    pub fn message(message: Message) -> Self {
        ScriptedReply::Messages(vec![message])
    }
}

/// Replays a fixed script of replies, one per call.
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<ScriptedReply>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(replies: impl IntoIterator<Item = ScriptedReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Number of calls made so far.
    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or_default()
    }

    /// Snapshot of every request received, in call order.
    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    fn next_reply(&self, request: ProviderRequest) -> Result<ScriptedReply, ProviderError> {
        let call = {
            let mut requests = self.requests.lock().map_err(poisoned)?;
            requests.push(request);
            requests.len()
        };
        self.replies
            .lock()
            .map_err(poisoned)?
            .pop_front()
            .ok_or_else(|| ProviderError::NotConfigured(format!("script exhausted at call #{call}")))
    }
}

fn poisoned<T>(_: T) -> ProviderError {
    ProviderError::NotConfigured("scripted provider lock poisoned".into())
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<Vec<Message>, ProviderError> {
        match self.next_reply(request)? {
            ScriptedReply::Messages(messages) => Ok(messages),
            ScriptedReply::Error(err) | ScriptedReply::FragmentsThenError(_, err) => Err(err),
            ScriptedReply::Fragments(_) => Err(ProviderError::NotConfigured(
                "fragment reply scripted for a batch call".into(),
            )),
        }
    }
}

#[async_trait]
impl StreamingProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn stream(&self, request: ProviderRequest) -> Result<RawFragmentStream, ProviderError> {
        let items: Vec<Result<FragmentBatch, ProviderError>> = match self.next_reply(request)? {
            ScriptedReply::Fragments(batches) => batches.into_iter().map(Ok).collect(),
            ScriptedReply::FragmentsThenError(batches, err) => batches
                .into_iter()
                .map(Ok)
                .chain(std::iter::once(Err(err)))
                .collect(),
            ScriptedReply::Error(err) => return Err(err),
            ScriptedReply::Messages(_) => {
                return Err(ProviderError::NotConfigured(
                    "message reply scripted for a streaming call".into(),
                ));
            }
        };
        Ok(futures::stream::iter(items).boxed())
    }
}
