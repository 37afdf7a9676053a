pub mod conversation;
pub mod message;
pub mod user;

pub use conversation::{ConversationId, ConversationListItem, ConversationSummary};
pub use message::{
    next_timestamp, summary_preview, HistoryPage, Message, MessageId, MessageKind, NewMessage,
};
pub use user::{ParticipantRole, UserId, UserIdentity, UserRole};
