use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The closed set of domain events that can trigger webhook deliveries.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum EventType {
    #[serde(rename = "ticket.created")]
    TicketCreated,
    #[serde(rename = "ticket.updated")]
    TicketUpdated,
    #[serde(rename = "ticket.status_changed")]
    TicketStatusChanged,
    #[serde(rename = "ticket.assigned")]
    TicketAssigned,
    #[serde(rename = "ticket.priority_changed")]
    TicketPriorityChanged,
    #[serde(rename = "ticket.comment_added")]
    TicketCommentAdded,
    #[serde(rename = "ticket.attachment_added")]
    TicketAttachmentAdded,
    #[serde(rename = "ticket.closed")]
    TicketClosed,
    #[serde(rename = "ticket.reopened")]
    TicketReopened,
    #[serde(rename = "ticket.deleted")]
    TicketDeleted,
    #[serde(rename = "user.created")]
    UserCreated,
    #[serde(rename = "user.updated")]
    UserUpdated,
    #[serde(rename = "user.deleted")]
    UserDeleted,
    #[serde(rename = "team.created")]
    TeamCreated,
    #[serde(rename = "team.updated")]
    TeamUpdated,
    #[serde(rename = "team.deleted")]
    TeamDeleted,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::TicketCreated => "ticket.created",
            EventType::TicketUpdated => "ticket.updated",
            EventType::TicketStatusChanged => "ticket.status_changed",
            EventType::TicketAssigned => "ticket.assigned",
            EventType::TicketPriorityChanged => "ticket.priority_changed",
            EventType::TicketCommentAdded => "ticket.comment_added",
            EventType::TicketAttachmentAdded => "ticket.attachment_added",
            EventType::TicketClosed => "ticket.closed",
            EventType::TicketReopened => "ticket.reopened",
            EventType::TicketDeleted => "ticket.deleted",
            EventType::UserCreated => "user.created",
            EventType::UserUpdated => "user.updated",
            EventType::UserDeleted => "user.deleted",
            EventType::TeamCreated => "team.created",
            EventType::TeamUpdated => "team.updated",
            EventType::TeamDeleted => "team.deleted",
        }
    }

    /// Parse a dotted event name; returns None for unknown names.
    pub fn parse(s: &str) -> Option<Self> {
        Self::all().iter().copied().find(|e| e.as_str() == s)
    }

    pub fn all() -> &'static [EventType] {
        &[
            EventType::TicketCreated,
            EventType::TicketUpdated,
            EventType::TicketStatusChanged,
            EventType::TicketAssigned,
            EventType::TicketPriorityChanged,
            EventType::TicketCommentAdded,
            EventType::TicketAttachmentAdded,
            EventType::TicketClosed,
            EventType::TicketReopened,
            EventType::TicketDeleted,
            EventType::UserCreated,
            EventType::UserUpdated,
            EventType::UserDeleted,
            EventType::TeamCreated,
            EventType::TeamUpdated,
            EventType::TeamDeleted,
        ]
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The envelope POSTed to subscriber endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event: EventType,
    pub data: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl EventEnvelope {
    pub fn new(event: EventType, data: serde_json::Value) -> Self {
        Self {
            event,
            data,
            timestamp: Utc::now(),
        }
    }
}
