/*!
Channels, boards, and the state container that owns them.

[`Channel`] and [`Board`] are plain serde-friendly domain types; all
mutation flows through [`ConversationState`], which loads entities lazily
from the configured [`Store`](crate::store::Store) and writes every change
back through it before returning.
*/

mod board;
mod channel;
mod state;

pub use board::{Board, Thread};
pub use channel::Channel;
pub use state::{ConversationState, StateError};
