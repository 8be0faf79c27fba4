//! Copilot Studio Direct-to-Engine transport (HTTP + server-sent events)

use std::sync::Arc;

use async_stream::stream;
use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest_eventsource::{Event, EventSource, retry};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::{ActivityStream, Transport};
use crate::{
    InboundActivity, OutboundActivity,
    auth::{TokenProvider, bearer_header},
    error::{Error, Result},
};

const API_VERSION: &str = "2022-03-01-preview";

/// Power Platform cloud hosting the agent
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerPlatformCloud {
    #[default]
    Prod,
    FirstRelease,
    Preprod,
    Test,
    Gov,
    High,
    DoD,
    Mooncake,
}

impl PowerPlatformCloud {
    /// Power Platform API host for this cloud
    pub fn api_host(&self) -> &'static str {
        match self {
            PowerPlatformCloud::Prod | PowerPlatformCloud::FirstRelease => "api.powerplatform.com",
            PowerPlatformCloud::Preprod => "api.preprod.powerplatform.com",
            PowerPlatformCloud::Test => "api.test.powerplatform.com",
            PowerPlatformCloud::Gov => "gov.api.powerplatform.microsoft.us",
            PowerPlatformCloud::High => "high.api.powerplatform.microsoft.us",
            PowerPlatformCloud::DoD => "api.powerplatform.appsplatform.us",
            PowerPlatformCloud::Mooncake => "api.powerplatform.partner.microsoftonline.cn",
        }
    }

    fn id_suffix_length(&self) -> usize {
        match self {
            PowerPlatformCloud::Prod | PowerPlatformCloud::FirstRelease => 2,
            _ => 1,
        }
    }
}

/// Where and how to reach a Copilot Studio agent
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    /// Power Platform environment id hosting the agent
    pub environment_id: Option<String>,
    /// Schema name of the agent
    pub schema_name: Option<String>,
    /// Cloud the environment lives in
    pub cloud: PowerPlatformCloud,
    /// Full conversations URL, bypassing environment-based discovery
    pub direct_connect_url: Option<String>,
}

impl ConnectionSettings {
    /// Check that enough is configured to locate the agent
    pub fn validate(&self) -> Result<()> {
        self.conversations_url().map(|_| ())
    }

    /// Get the URL conversations are created under
    pub fn conversations_url(&self) -> Result<String> {
        if let Some(url) = non_empty(&self.direct_connect_url) {
            return Ok(url.trim_end_matches('/').to_string());
        }

        let environment_id = non_empty(&self.environment_id).ok_or_else(|| {
            Error::InvalidConfig("environment_id or direct_connect_url is required".into())
        })?;
        let schema_name = non_empty(&self.schema_name).ok_or_else(|| {
            Error::InvalidConfig("schema_name or direct_connect_url is required".into())
        })?;

        let host = environment_host(environment_id, self.cloud)?;
        Ok(format!(
            "https://{}/copilotstudio/dataverse-backed/authenticated/bots/{}/conversations",
            host, schema_name
        ))
    }

    /// Get the token scope to request for this agent
    pub fn scope(&self) -> String {
        format!("https://{}/.default", self.cloud.api_host())
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Derive the environment-specific API host from an environment id
fn environment_host(environment_id: &str, cloud: PowerPlatformCloud) -> Result<String> {
    let normalized: String = environment_id
        .chars()
        .filter(|c| *c != '-')
        .collect::<String>()
        .to_lowercase();

    let suffix_len = cloud.id_suffix_length();
    if normalized.len() <= suffix_len || !normalized.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(Error::InvalidConfig(format!(
            "invalid environment id: {}",
            environment_id
        )));
    }

    let (prefix, suffix) = normalized.split_at(normalized.len() - suffix_len);
    Ok(format!("{}.{}.environment.{}", prefix, suffix, cloud.api_host()))
}

/// Transport speaking the Copilot Studio Direct-to-Engine protocol
pub struct CopilotStudioTransport {
    client: reqwest::Client,
    conversations_url: String,
    scope: String,
    tokens: Arc<dyn TokenProvider>,
    conversation_id: Arc<Mutex<Option<String>>>,
}

impl CopilotStudioTransport {
    /// Create a transport for the configured agent
    pub fn new(settings: &ConnectionSettings, tokens: Arc<dyn TokenProvider>) -> Result<Self> {
        Ok(Self {
            client: reqwest::Client::new(),
            conversations_url: settings.conversations_url()?,
            scope: settings.scope(),
            tokens,
            conversation_id: Arc::new(Mutex::new(None)),
        })
    }

    /// Id of the current conversation, once the agent has reported it
    pub fn conversation_id(&self) -> Option<String> {
        self.conversation_id.lock().clone()
    }

    async fn open(
        &self,
        url: &str,
        body: serde_json::Value,
        cancel: CancellationToken,
    ) -> Result<ActivityStream> {
        let authorization = bearer_header(self.tokens.as_ref(), &self.scope).await?;

        let request = self
            .client
            .post(url)
            .query(&[("api-version", API_VERSION)])
            .header(AUTHORIZATION, authorization)
            .header(ACCEPT, "text/event-stream")
            .json(&body);

        let mut event_source = EventSource::new(request)
            .map_err(|e| Error::Sse(format!("Failed to create event source: {}", e)))?;
        event_source.set_retry_policy(Box::new(retry::Never));

        Ok(Box::pin(create_stream(
            event_source,
            Arc::clone(&self.conversation_id),
            cancel,
        )))
    }
}

#[async_trait]
impl Transport for CopilotStudioTransport {
    async fn start_conversation(
        &self,
        emit_start_event: bool,
        cancel: CancellationToken,
    ) -> Result<ActivityStream> {
        *self.conversation_id.lock() = None;
        tracing::debug!("Starting conversation at {}", self.conversations_url);

        let body = serde_json::json!({ "emitStartConversationEvent": emit_start_event });
        self.open(&self.conversations_url, body, cancel).await
    }

    async fn send_activity(
        &self,
        activity: OutboundActivity,
        cancel: CancellationToken,
    ) -> Result<ActivityStream> {
        let conversation_id = self
            .conversation_id()
            .ok_or(Error::ConversationNotStarted)?;
        let url = format!("{}/{}", self.conversations_url, conversation_id);

        let body = serde_json::json!({ "activity": activity });
        self.open(&url, body, cancel).await
    }
}

fn status_error(status: u16, body: String) -> Error {
    match status {
        401 | 403 => {
            tracing::warn!("Agent rejected the credential ({}): {}", status, body);
            Error::SessionExpired
        }
        _ => Error::api(status, body),
    }
}

fn create_stream(
    mut event_source: EventSource,
    conversation_id: Arc<Mutex<Option<String>>>,
    cancel: CancellationToken,
) -> impl futures::Stream<Item = Result<InboundActivity>> {
    stream! {
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                event = event_source.next() => Some(event),
            };

            let Some(event) = next else {
                event_source.close();
                yield Err(Error::Cancelled);
                return;
            };
            let Some(event) = event else {
                break;
            };

            match event {
                Ok(Event::Open) => {}
                Ok(Event::Message(msg)) => match msg.event.as_str() {
                    "activity" | "message" => {
                        match serde_json::from_str::<InboundActivity>(&msg.data) {
                            Ok(activity) => {
                                if let Some(ref conversation) = activity.conversation {
                                    let mut current = conversation_id.lock();
                                    if current.is_none() {
                                        *current = Some(conversation.id.clone());
                                    }
                                }
                                yield Ok(activity);
                            }
                            Err(e) => {
                                tracing::warn!("Skipping undecodable activity: {}", e);
                            }
                        }
                    }
                    "end" => break,
                    other => {
                        tracing::debug!("Ignoring SSE event '{}'", other);
                    }
                },
                Err(reqwest_eventsource::Error::StreamEnded) => break,
                Err(reqwest_eventsource::Error::InvalidStatusCode(status, response)) => {
                    let body = response.text().await.unwrap_or_default();
                    yield Err(status_error(status.as_u16(), body));
                    break;
                }
                Err(e) => {
                    yield Err(Error::Sse(e.to_string()));
                    break;
                }
            }
        }

        event_source.close();
    }
}
