//! Talking-head rendering of assistant replies

pub mod did;

use async_trait::async_trait;

use ava_cancel::CancellationToken;

use crate::error::Result;

pub use did::DidAnimator;

/// Renders text as a playable talking-head video
#[async_trait]
pub trait Animator: Send + Sync {
  /// Render `text` and return the video URL once it is playable
  async fn animate(&self, text: &str, cancel: &CancellationToken) -> Result<String>;
}
