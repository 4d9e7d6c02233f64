mod component;
mod decision;
mod event;
mod file_kind;
mod message;
mod module_id;

pub use component::{ComponentAnalysis, ComponentInfo};
pub use decision::{UpdateDecision, UpdateStrategy};
pub use event::{ChangeKind, FileChangeEvent};
pub use file_kind::FileKind;
pub use message::{BroadcastMessage, StampedMessage};
pub use module_id::ModuleId;
