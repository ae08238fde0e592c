use super::resources::ResourceId;
use std::sync::mpsc;

/// Notifications delivered to the session controller on the control thread
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    PlayerFinished { id: ResourceId, successfully: bool },
    PlayerDecodeError { id: ResourceId, message: String },
    RecorderFinished { id: ResourceId, successfully: bool },
    RecorderEncodeError { id: ResourceId, message: String },
    PermissionResolved { granted: bool },
}

pub type EventSender = mpsc::Sender<SessionEvent>;
pub type EventReceiver = mpsc::Receiver<SessionEvent>;

pub fn channel() -> (EventSender, EventReceiver) {
    mpsc::channel()
}
