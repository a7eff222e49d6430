// Ava Protocol Layer
// Core protocol definitions

pub mod facility;
pub mod models;
pub mod realtime;

pub use facility::{CareType, Facility, MapFilters, filter_facilities};
pub use models::{ChatMessage, MessageRole, RunStatus, TalkStatus, ThreadId};
pub use realtime::FunctionCallDone;

/// Events emitted while a conversation turn progresses.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnEvent {
    /// User message appended to the transcript
    UserMessage(ChatMessage),
    /// Assistant reply appended to the transcript
    AssistantMessage(ChatMessage),
    /// Talking-head video for an assistant reply is playable
    VideoReady(VideoReadyEvent),
    /// Avatar rendering failed; the turn itself still succeeded
    AvatarFailed(TurnErrorEvent),
    /// Turn ended without an assistant reply
    TurnFailed(TurnErrorEvent),
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct VideoReadyEvent {
    pub message_id: String,
    pub video_url: String,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TurnErrorEvent {
    pub message_id: String,
    pub error: String,
}
