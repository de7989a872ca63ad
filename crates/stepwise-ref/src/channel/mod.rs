//! Reference `ConversationChannel` implementations.

pub mod console;
pub mod scripted;

pub use console::ConsoleChannel;
pub use scripted::ScriptedChannel;
