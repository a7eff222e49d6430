//! D-ID talks API

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info};

use ava_cancel::CancellationToken;
use ava_config::Config;
use ava_protocol::TalkStatus;

use super::Animator;
use crate::error::{AvaError, Result};
use crate::http::{create_client, join_url, read_json};
use crate::poll::{PollPolicy, poll_until};

/// A talk as reported by the API
#[derive(Debug, Clone, Deserialize)]
pub struct TalkObject {
  pub id: String,
  pub status: TalkStatus,
  #[serde(default)]
  pub result_url: Option<String>,
  #[serde(default)]
  pub error: Option<Value>,
}

impl TalkObject {
  fn failure_reason(&self) -> Option<String> {
    let error = self.error.as_ref()?;
    error
      .get("description")
      .or_else(|| error.get("kind"))
      .and_then(Value::as_str)
      .map(str::to_string)
      .or_else(|| Some(error.to_string()))
  }
}

#[derive(Clone)]
enum DidAuth {
  /// `user:password`, encoded by the client
  Credentials { user: String, password: String },
  /// Already base64-encoded key, sent verbatim
  Encoded(String),
}

impl DidAuth {
  fn parse(key: &str) -> Self {
    match key.split_once(':') {
      Some((user, password)) => DidAuth::Credentials {
        user: user.to_string(),
        password: password.to_string(),
      },
      None => DidAuth::Encoded(key.to_string()),
    }
  }
}

/// Animator backed by D-ID talks
#[derive(Clone)]
pub struct DidAnimator {
  client: Client,
  base_url: String,
  auth: DidAuth,
  source_url: String,
  voice_id: Option<String>,
  policy: PollPolicy,
}

impl DidAnimator {
  pub fn new(
    api_key: &str,
    base_url: impl Into<String>,
    source_url: impl Into<String>,
    policy: PollPolicy,
  ) -> Result<Self> {
    Ok(Self {
      client: create_client(60)?,
      base_url: base_url.into(),
      auth: DidAuth::parse(api_key),
      source_url: source_url.into(),
      voice_id: None,
      policy,
    })
  }

  pub fn from_config(config: &Config) -> Result<Self> {
    let avatar = &config.avatar;
    Ok(Self {
      client: create_client(config.http.timeout_secs)?,
      base_url: avatar.base_url.clone(),
      auth: DidAuth::parse(&avatar.api_key()?),
      source_url: avatar.source_url.clone(),
      voice_id: avatar.voice_id.clone(),
      policy: PollPolicy::from(&config.polling.talk),
    })
  }

  pub fn with_voice(mut self, voice_id: impl Into<String>) -> Self {
    self.voice_id = Some(voice_id.into());
    self
  }

  fn request(&self, method: Method, path: &str) -> RequestBuilder {
    let builder = self.client.request(method, join_url(&self.base_url, path));
    match &self.auth {
      DidAuth::Credentials { user, password } => builder.basic_auth(user, Some(password)),
      DidAuth::Encoded(key) => builder.header("Authorization", format!("Basic {key}")),
    }
  }

  fn talk_body(&self, text: &str) -> Value {
    let mut script = json!({
      "type": "text",
      "input": text,
    });
    if let Some(voice_id) = &self.voice_id {
      script["provider"] = json!({ "type": "microsoft", "voice_id": voice_id });
    }
    json!({
      "script": script,
      "source_url": self.source_url,
      "config": { "stitch": true },
    })
  }

  /// Submit a render job
  pub async fn create_talk(&self, text: &str) -> Result<TalkObject> {
    let response = self
      .request(Method::POST, "talks")
      .json(&self.talk_body(text))
      .send()
      .await?;
    let talk: TalkObject = read_json(response).await?;
    debug!(talk_id = %talk.id, status = %talk.status, "created talk");
    Ok(talk)
  }

  pub async fn get_talk(&self, talk_id: &str) -> Result<TalkObject> {
    let response = self
      .request(Method::GET, &format!("talks/{talk_id}"))
      .send()
      .await?;
    read_json(response).await
  }
}

#[async_trait]
impl Animator for DidAnimator {
  async fn animate(&self, text: &str, cancel: &CancellationToken) -> Result<String> {
    let talk = self.create_talk(text).await?;
    let talk = poll_until(
      &self.policy,
      cancel,
      &format!("talk {}", talk.id),
      || self.get_talk(&talk.id),
      |t| t.status.is_terminal(),
    )
    .await?;

    if talk.status != TalkStatus::Done {
      return Err(AvaError::TalkFailed {
        reason: talk.failure_reason(),
        talk_id: talk.id,
        status: talk.status,
      });
    }

    let url = talk.result_url.ok_or_else(|| {
      AvaError::MalformedResponse(format!("talk {} is done but has no result_url", talk.id))
    })?;
    info!(talk_id = %talk.id, "talk rendered");
    Ok(url)
  }
}
