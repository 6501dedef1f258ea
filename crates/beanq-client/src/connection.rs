use crate::Result;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::time::Duration;

/// Tube names keyed by the server address that reported them
pub type TubeMap = BTreeMap<String, Vec<String>>;

/// The queue operations a worker or producer needs from a beanstalkd
/// connection.
///
/// Every method may fail with [`ClientError::ConnectionLost`](crate::ClientError::ConnectionLost)
/// when the transport goes away; callers decide whether that is fatal.
#[async_trait]
pub trait Connection: Send {
    /// Address of the server this connection talks to
    fn address(&self) -> &str;

    /// Add a tube to the watch list, returning the number of watched tubes
    async fn watch(&mut self, tube: &str) -> Result<u32>;

    /// Drop a tube from the watch list. Returns `false` if the server refused
    /// because it is the last watched tube.
    async fn ignore(&mut self, tube: &str) -> Result<bool>;

    /// Select the tube subsequent `put`s go to
    async fn use_tube(&mut self, tube: &str) -> Result<()>;

    /// Submit a job body to the used tube, returning its id
    async fn put(&mut self, body: Bytes, priority: u32, delay: u32, ttr: u32) -> Result<u64>;

    /// Block until a job is available on any watched tube
    async fn reserve(&mut self) -> Result<ReservedJob>;

    async fn delete(&mut self, id: u64) -> Result<()>;

    async fn bury(&mut self, id: u64, priority: u32) -> Result<()>;

    /// Kick up to `bound` buried jobs on the used tube back to ready
    async fn kick(&mut self, bound: u32) -> Result<u32>;

    async fn list_tubes_watched(&mut self) -> Result<TubeMap>;

    async fn list_tubes(&mut self) -> Result<TubeMap>;
}

/// A job claimed by `reserve`, owned by whoever reserved it until it is
/// deleted or buried.
///
/// `delete` and `bury` consume the handle, so a reservation is resolved at
/// most once. Dropping it without either leaves the job reserved until the
/// server's TTR expires.
#[derive(Debug, Clone)]
pub struct ReservedJob {
    id: u64,
    body: Bytes,
    ttr: u32,
    priority: u32,
    reserved_at: DateTime<Utc>,
}

impl ReservedJob {
    pub fn new(id: u64, body: Bytes, ttr: u32, priority: u32) -> Self {
        ReservedJob {
            id,
            body,
            ttr,
            priority,
            reserved_at: Utc::now(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Raw job body as it was put
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Seconds the server allows before re-releasing the job
    pub fn ttr(&self) -> u32 {
        self.ttr
    }

    pub fn priority(&self) -> u32 {
        self.priority
    }

    pub fn reserved_at(&self) -> DateTime<Utc> {
        self.reserved_at
    }

    /// Time since the job was reserved, counted against its TTR
    pub fn held_for(&self) -> Duration {
        (Utc::now() - self.reserved_at).to_std().unwrap_or_default()
    }

    /// Acknowledge the job, removing it from the server
    pub async fn delete<C: Connection + ?Sized>(self, conn: &mut C) -> Result<()> {
        conn.delete(self.id).await
    }

    /// Bury the job at its current priority
    pub async fn bury<C: Connection + ?Sized>(self, conn: &mut C) -> Result<()> {
        conn.bury(self.id, self.priority).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_held_for_counts_from_reservation() {
        let job = ReservedJob::new(3, Bytes::from_static(b"{}"), 120, 10);

        assert!(job.reserved_at() <= Utc::now());
        assert!(job.held_for() < Duration::from_secs(5));
        assert_eq!((job.id(), job.ttr(), job.priority()), (3, 120, 10));
    }
}
