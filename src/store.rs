//! Client-side state: the conversation log and the active estimate.

pub mod conversation;
pub mod estimate;
pub mod persist;

pub use conversation::{ChatMessage, ConversationStore, MessageRole};
pub use estimate::EstimateStore;
pub use persist::{FilePersistence, MemoryPersistence, Persistence, SharedPersistence};
