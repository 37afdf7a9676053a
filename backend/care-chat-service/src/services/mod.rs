pub mod conversation_service;
pub mod message_router;
pub mod upload_service;

pub use conversation_service::ConversationService;
pub use message_router::MessageRouter;
pub use upload_service::UploadStore;
