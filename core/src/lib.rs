//! Ava core
//!
//! Assistant thread sessions, run polling and avatar rendering behind a
//! single [`Conversation`] handle.

pub mod assistants;
pub mod ava;
pub mod avatar;
pub mod conversation;
pub mod error;
pub mod event;
pub mod http;
pub mod poll;
pub mod session;

pub use assistants::AssistantsClient;
pub use ava::{Ava, open_store};
pub use avatar::{Animator, DidAnimator};
pub use conversation::{Conversation, TurnOutcome};
pub use error::{AvaError, Result};
pub use event::EventBroadcaster;
pub use poll::{PollPolicy, poll_until};
pub use session::ThreadSession;
