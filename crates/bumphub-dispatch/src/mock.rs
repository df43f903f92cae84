//! In-memory dispatcher test double.
//!
//! Records every send/edit and can fail per destination id, which is
//! how the engine tests exercise partial-failure isolation without a
//! network.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use bumphub_core::error::{BumpHubError, Result};
use bumphub_core::types::Destination;

use crate::payload::{MessageId, NotificationPayload};
use crate::webhook::Dispatcher;

/// One recorded dispatcher call.
#[derive(Debug, Clone)]
pub enum MockCall {
    Send {
        destination_id: String,
        message_id: MessageId,
        payload: NotificationPayload,
    },
    Edit {
        destination_id: String,
        message_id: MessageId,
        payload: NotificationPayload,
    },
}

#[derive(Default)]
pub struct MockDispatcher {
    calls: Mutex<Vec<MockCall>>,
    fail_send: Mutex<HashSet<String>>,
    fail_edit: Mutex<HashSet<String>>,
    next_id: AtomicU64,
}

impl MockDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `send` to this destination id fail.
    pub fn fail_send_for(&self, destination_id: &str) {
        self.fail_send
            .lock()
            .unwrap()
            .insert(destination_id.to_string());
    }

    /// Make every `edit` to this destination id fail (send still
    /// works — the create-fallback path).
    pub fn fail_edit_for(&self, destination_id: &str) {
        self.fail_edit
            .lock()
            .unwrap()
            .insert(destination_id.to_string());
    }

    pub fn clear_failures(&self) {
        self.fail_send.lock().unwrap().clear();
        self.fail_edit.lock().unwrap().clear();
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Count of sends to one destination.
    pub fn sends_to(&self, destination_id: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, MockCall::Send { destination_id: d, .. } if d == destination_id))
            .count()
    }

    /// Count of edits to one destination.
    pub fn edits_to(&self, destination_id: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, MockCall::Edit { destination_id: d, .. } if d == destination_id))
            .count()
    }
}

#[async_trait]
impl Dispatcher for MockDispatcher {
    async fn send(&self, dest: &Destination, payload: &NotificationPayload) -> Result<MessageId> {
        if self.fail_send.lock().unwrap().contains(&dest.id) {
            return Err(BumpHubError::Dispatch(format!("{}: injected failure", dest.id)));
        }
        let message_id = format!("msg-{}", self.next_id.fetch_add(1, Ordering::Relaxed));
        self.calls.lock().unwrap().push(MockCall::Send {
            destination_id: dest.id.clone(),
            message_id: message_id.clone(),
            payload: payload.clone(),
        });
        Ok(message_id)
    }

    async fn edit(
        &self,
        dest: &Destination,
        message_id: &MessageId,
        payload: &NotificationPayload,
    ) -> Result<()> {
        if self.fail_edit.lock().unwrap().contains(&dest.id) {
            return Err(BumpHubError::Dispatch(format!("{}: injected failure", dest.id)));
        }
        self.calls.lock().unwrap().push(MockCall::Edit {
            destination_id: dest.id.clone(),
            message_id: message_id.clone(),
            payload: payload.clone(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bumphub_core::types::DestinationKind;
    use chrono::Utc;

    #[tokio::test]
    async fn records_calls_and_injects_failures() {
        let mock = MockDispatcher::new();
        let dest = Destination::new("d1", "https://h/1", DestinationKind::Bump);
        let payload = NotificationPayload::new("t", "d", 0, Utc::now());

        let id = mock.send(&dest, &payload).await.unwrap();
        mock.edit(&dest, &id, &payload).await.unwrap();
        assert_eq!(mock.sends_to("d1"), 1);
        assert_eq!(mock.edits_to("d1"), 1);

        mock.fail_send_for("d1");
        assert!(mock.send(&dest, &payload).await.is_err());
        assert_eq!(mock.sends_to("d1"), 1);
    }
}
