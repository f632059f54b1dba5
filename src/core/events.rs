use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Block coordinates in the world.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Handle of an in-world object that can be interacted with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityId(pub u32);

/// Where a selector label was seen.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LabelSource {
    pub entity: EntityId,
    pub position: Position,
}

/// Everything the world feed tells us.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedEvent {
    LabelObserved { text: String, source: LabelSource },
    DataLineObserved { text: String },
    ArrivedAtGoal,
    Disconnected { reason: String },
    Connected,
}

/// Deferred work. Handlers re-check the current state when one fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timer {
    AdvanceCategory { generation: u64 },
    Reconnect { attempt: u32 },
}

/// Actions the board asks its surroundings to carry out.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    MoveTo(Position),
    InteractWith(EntityId),
    Connect,
    Disconnect(String),
    Schedule { after: Duration, timer: Timer },
}

impl fmt::Display for FeedEvent {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FeedEvent::LabelObserved { text, source } => {
                write!(f, "label {:?} on entity {}", text, source.entity.0)
            }
            FeedEvent::DataLineObserved { text } => write!(f, "line {:?}", text),
            FeedEvent::ArrivedAtGoal => write!(f, "arrived at goal"),
            FeedEvent::Disconnected { reason } => write!(f, "disconnected ({})", reason),
            FeedEvent::Connected => write!(f, "connected"),
        }
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Request::MoveTo(p) => write!(f, "move to ({:.1}, {:.1}, {:.1})", p.x, p.y, p.z),
            Request::InteractWith(entity) => write!(f, "interact with entity {}", entity.0),
            Request::Connect => write!(f, "connect"),
            Request::Disconnect(reason) => write!(f, "disconnect ({})", reason),
            Request::Schedule { after, timer } => {
                write!(f, "schedule {:?} in {}ms", timer, after.as_millis())
            }
        }
    }
}
