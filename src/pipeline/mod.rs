//! Voice pipeline: utterance segmentation, the message log and the
//! coordinator that ties capture, dispatch and speech output together.

pub mod coordinator;
pub mod messages;
pub mod segmenter;

pub use coordinator::AssistantCoordinator;
pub use messages::{Message, MessageLog, Sender};
pub use segmenter::UtteranceSegmenter;
