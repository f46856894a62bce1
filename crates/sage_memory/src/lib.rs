pub mod buffer;

pub use buffer::ConversationMemory;
