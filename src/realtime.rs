use anyhow::Context;
use serde::Deserialize;
use sqlx::postgres::PgListener;
use sqlx::PgPool;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::db;
use crate::store::WorkingSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
enum Operation {
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Deserialize)]
struct Payload {
    op: Operation,
    id: Uuid,
}

/// A change pushed by the `survey_responses` notify trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeEvent {
    Upsert(Uuid),
    Delete(Uuid),
}

impl ChangeEvent {
    pub fn parse(payload: &str) -> Result<Self, serde_json::Error> {
        let payload: Payload = serde_json::from_str(payload)?;
        Ok(match payload.op {
            Operation::Insert | Operation::Update => ChangeEvent::Upsert(payload.id),
            Operation::Delete => ChangeEvent::Delete(payload.id),
        })
    }

    pub fn id(&self) -> Uuid {
        match self {
            ChangeEvent::Upsert(id) | ChangeEvent::Delete(id) => *id,
        }
    }
}

pub struct Subscription {
    listener: PgListener,
    channel: String,
}

impl Subscription {
    pub async fn connect(pool: &PgPool, channel: &str) -> anyhow::Result<Self> {
        let mut listener = PgListener::connect_with(pool)
            .await
            .context("failed to open realtime listener")?;
        listener
            .listen(channel)
            .await
            .with_context(|| format!("failed to listen on channel {channel}"))?;
        info!(channel, "subscribed to response changes");

        Ok(Self {
            listener,
            channel: channel.to_string(),
        })
    }

    /// Wait for the next well-formed change. Malformed payloads are skipped.
    pub async fn next(&mut self) -> anyhow::Result<ChangeEvent> {
        loop {
            let notification = self.listener.recv().await?;
            match ChangeEvent::parse(notification.payload()) {
                Ok(event) => {
                    debug!(?event, "response change received");
                    return Ok(event);
                }
                Err(err) => warn!(
                    channel = %self.channel,
                    payload = notification.payload(),
                    error = %err,
                    "ignoring malformed change payload"
                ),
            }
        }
    }

    pub async fn close(mut self) -> anyhow::Result<()> {
        self.listener.unlisten_all().await?;
        info!(channel = %self.channel, "realtime listener detached");
        Ok(())
    }
}

/// Merge one change into the working set. Upserts re-read the joined row so
/// the set always holds the same shape `fetch_responses` returns.
pub async fn apply(pool: &PgPool, set: &mut WorkingSet, event: ChangeEvent) -> anyhow::Result<bool> {
    match event {
        ChangeEvent::Upsert(id) => match db::fetch_response(pool, id).await? {
            Some(record) => Ok(set.upsert(record)),
            None => Ok(set.remove(&id).is_some()),
        },
        ChangeEvent::Delete(id) => Ok(set.remove(&id).is_some()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "6a1f0c2e-3b4d-4e5f-8a9b-0c1d2e3f4a5b";

    #[test]
    fn inserts_and_updates_become_upserts() {
        let insert = ChangeEvent::parse(&format!(r#"{{"op":"INSERT","id":"{ID}"}}"#)).unwrap();
        let update = ChangeEvent::parse(&format!(r#"{{"op":"UPDATE","id":"{ID}"}}"#)).unwrap();
        let id = Uuid::parse_str(ID).unwrap();
        assert_eq!(insert, ChangeEvent::Upsert(id));
        assert_eq!(update, ChangeEvent::Upsert(id));
    }

    #[test]
    fn deletes_carry_the_old_id() {
        let event = ChangeEvent::parse(&format!(
            r#"{{"op":"DELETE","id":"{ID}","table":"survey_responses"}}"#
        ))
        .unwrap();
        assert_eq!(event, ChangeEvent::Delete(Uuid::parse_str(ID).unwrap()));
        assert_eq!(event.id().to_string(), ID);
    }

    #[test]
    fn rejects_unknown_operations_and_bad_ids() {
        assert!(ChangeEvent::parse(&format!(r#"{{"op":"TRUNCATE","id":"{ID}"}}"#)).is_err());
        assert!(ChangeEvent::parse(r#"{"op":"INSERT","id":"not-a-uuid"}"#).is_err());
        assert!(ChangeEvent::parse("").is_err());
    }
}
