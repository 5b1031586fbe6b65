//! Base HTTP client with shared streaming logic

use crate::infrastructure::model::types::{FinishReason, ModelChunk, ModelError, ModelStream};
use futures::StreamExt;
use reqwest::{Client, RequestBuilder};
use reqwest_eventsource::{Error as EventError, Event, EventSource};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

/// Base HTTP client with shared functionality
#[derive(Clone)]
pub struct HttpClientBase {
    pub id: String,
    pub endpoint: String,
    pub api_key: Option<String>,
    pub http: Client,
}

impl HttpClientBase {
    pub fn new(id: String, endpoint: String, api_key: Option<String>) -> Self {
        Self {
            id,
            endpoint,
            api_key,
            http: Client::new(),
        }
    }

    /// Build URL from endpoint and path
    pub fn build_url(&self, path: &str) -> String {
        let base = self.endpoint.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{base}/{path}")
    }

    /// SSE POST with bearer auth
    pub async fn stream_with_bearer<Req, F>(
        &self,
        url: &str,
        body: &Req,
        parse: F,
    ) -> Result<ModelStream, ModelError>
    where
        Req: Serialize,
        F: FnMut(&str) -> Result<Vec<ModelChunk>, ModelError> + Send + 'static,
    {
        let api_key = self.require_api_key()?;
        let request = self
            .http
            .post(url)
            .header("Authorization", format!("Bearer {api_key}"))
            .json(body);
        self.open(request, parse).await
    }

    /// SSE POST with query param auth (for Gemini)
    pub async fn stream_with_query_key<Req, F>(
        &self,
        url: &str,
        body: &Req,
        parse: F,
    ) -> Result<ModelStream, ModelError>
    where
        Req: Serialize,
        F: FnMut(&str) -> Result<Vec<ModelChunk>, ModelError> + Send + 'static,
    {
        let api_key = self.require_api_key()?;
        let request = self
            .http
            .post(url)
            .query(&[("alt", "sse"), ("key", api_key)])
            .json(body);
        self.open(request, parse).await
    }

    /// Wait for the stream to open, then pump decoded chunks through a channel.
    ///
    /// HTTP errors surface here rather than as the first stream item. A turn
    /// that ends without a finish reason gets a synthetic `Stop`.
    async fn open<F>(&self, request: RequestBuilder, mut parse: F) -> Result<ModelStream, ModelError>
    where
        F: FnMut(&str) -> Result<Vec<ModelChunk>, ModelError> + Send + 'static,
    {
        let mut source = EventSource::new(request.header("Accept", "text/event-stream"))
            .map_err(|err| ModelError::stream(&self.id, err.to_string()))?;

        match source.next().await {
            Some(Ok(Event::Open)) => debug!(provider = self.id.as_str(), "Model stream opened"),
            Some(Ok(Event::Message(_))) => {
                source.close();
                return Err(ModelError::invalid_response(
                    &self.id,
                    "stream delivered data before opening",
                ));
            }
            Some(Err(err)) => {
                source.close();
                return Err(event_error(&self.id, err).await);
            }
            None => {
                return Err(ModelError::stream(&self.id, "stream closed before opening"));
            }
        }

        let (tx, rx) = mpsc::channel(64);
        let provider = self.id.clone();

        tokio::spawn(async move {
            let mut finished = false;
            while let Some(event) = source.next().await {
                match event {
                    Ok(Event::Open) => continue,
                    Ok(Event::Message(message)) => {
                        let data = message.data.trim();
                        if data.is_empty() {
                            continue;
                        }
                        if data == "[DONE]" {
                            break;
                        }
                        match parse(data) {
                            Ok(chunks) => {
                                for chunk in chunks {
                                    finished |= chunk.is_final();
                                    if tx.send(Ok(chunk)).await.is_err() {
                                        source.close();
                                        return;
                                    }
                                }
                            }
                            Err(err) => {
                                let _ = tx.send(Err(err)).await;
                                source.close();
                                return;
                            }
                        }
                    }
                    Err(EventError::StreamEnded) => break,
                    Err(err) => {
                        let err = event_error(&provider, err).await;
                        warn!(provider = provider.as_str(), %err, "Model stream failed");
                        let _ = tx.send(Err(err)).await;
                        source.close();
                        return;
                    }
                }
            }
            source.close();
            if !finished {
                let _ = tx.send(Ok(ModelChunk::finished(FinishReason::Stop))).await;
            }
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }

    fn require_api_key(&self) -> Result<&str, ModelError> {
        self.api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ModelError::missing_api_key(&self.id))
    }
}

async fn event_error(provider: &str, err: EventError) -> ModelError {
    match err {
        EventError::InvalidStatusCode(status, response) => {
            let body = response.text().await.unwrap_or_default();
            ModelError::status(provider, status, body)
        }
        EventError::Transport(source) => ModelError::network(provider, source),
        other => ModelError::stream(provider, other.to_string()),
    }
}
