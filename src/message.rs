use crate::error::ClientError;
use crate::model::{Collection, CreateSpec, MutateOp, ResourceKind, Target};
use crossterm::event::KeyEvent;
use std::time::Duration;

/// Everything the update loop reacts to. One message per step.
#[derive(Debug, Clone)]
pub enum Message {
    Key(KeyEvent),
    Resize {
        width: u16,
        height: u16,
    },
    Tick,
    AnimationTick,
    Fetched {
        kind: ResourceKind,
        result: Result<Collection, ClientError>,
    },
    ActionDone {
        action: PendingAction,
        result: Result<String, ClientError>,
    },
    LogsLoaded {
        target_id: String,
        result: Result<String, ClientError>,
    },
    Inspected {
        target_id: String,
        result: Result<String, ClientError>,
    },
    UrlOpened {
        url: String,
        result: Result<(), ClientError>,
    },
}

/// Deferred work returned by the update loop. Each command yields exactly one
/// [`Message`] when it finishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Fetch(ResourceKind),
    Mutate { target: Target, op: MutateOp },
    FetchLogs { target: Target, tail: usize },
    Inspect { target: Target },
    Create { spec: CreateSpec },
    Pull { reference: String },
    Console { target: Target },
    OpenUrl { url: String },
    ScheduleTick(Duration),
}

impl Command {
    /// Commands guarded by the action lock.
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            Self::Mutate { .. } | Self::Create { .. } | Self::Pull { .. } | Self::Console { .. }
        )
    }

    /// `None` for commands that are not bounded by a client deadline.
    pub fn deadline_class(&self) -> Option<DeadlineClass> {
        match self {
            Self::Fetch(_) | Self::FetchLogs { .. } | Self::Inspect { .. } | Self::OpenUrl { .. } => {
                Some(DeadlineClass::Short)
            }
            Self::Mutate { .. } => Some(DeadlineClass::Medium),
            Self::Create { .. } | Self::Pull { .. } => Some(DeadlineClass::Long),
            Self::Console { .. } | Self::ScheduleTick(_) => None,
        }
    }

    /// Describes a mutating command for status text and its result message.
    pub fn pending_action(&self) -> Option<PendingAction> {
        match self {
            Self::Mutate { target, op } => Some(PendingAction {
                op: ActionOp::from_mutate(*op),
                kind: target.kind,
                name: target.name.clone(),
            }),
            Self::Console { target } => Some(PendingAction {
                op: ActionOp::Console,
                kind: target.kind,
                name: target.name.clone(),
            }),
            Self::Create { spec } => Some(PendingAction {
                op: ActionOp::Create,
                kind: ResourceKind::Images,
                name: spec.image.clone(),
            }),
            Self::Pull { reference } => Some(PendingAction {
                op: ActionOp::Pull,
                kind: ResourceKind::Images,
                name: reference.clone(),
            }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum DeadlineClass {
    Short,
    Medium,
    Long,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum ActionOp {
    Start,
    Stop,
    Restart,
    Delete,
    Console,
    Create,
    Pull,
}

impl ActionOp {
    pub fn from_mutate(op: MutateOp) -> Self {
        match op {
            MutateOp::Start => Self::Start,
            MutateOp::Stop => Self::Stop,
            MutateOp::Restart => Self::Restart,
            MutateOp::Delete => Self::Delete,
        }
    }

    pub fn verb(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Restart => "restart",
            Self::Delete => "delete",
            Self::Console => "open console in",
            Self::Create => "run",
            Self::Pull => "pull",
        }
    }

    pub fn progressive(self) -> &'static str {
        match self {
            Self::Start => "Starting",
            Self::Stop => "Stopping",
            Self::Restart => "Restarting",
            Self::Delete => "Deleting",
            Self::Console => "Opening console in",
            Self::Create => "Running",
            Self::Pull => "Pulling",
        }
    }

    pub fn past(self) -> &'static str {
        match self {
            Self::Start => "Started",
            Self::Stop => "Stopped",
            Self::Restart => "Restarted",
            Self::Delete => "Deleted",
            Self::Console => "Console closed for",
            Self::Create => "Started container from",
            Self::Pull => "Pulled",
        }
    }
}

/// What an in-flight mutating command is doing, echoed back in its result.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct PendingAction {
    pub op: ActionOp,
    pub kind: ResourceKind,
    pub name: String,
}

impl PendingAction {
    pub fn in_progress_text(&self) -> String {
        format!("{} {}...", self.op.progressive(), self.name)
    }

    pub fn done_text(&self) -> String {
        format!("{} {}", self.op.past(), self.name)
    }

    pub fn failed_text(&self, error: &ClientError) -> String {
        format!("failed to {} {}: {error}", self.op.verb(), self.name)
    }
}
