//! In-memory stand-in for a beanstalkd connection, recording every call.

use async_trait::async_trait;
use beanq_client::{ClientError, Connection, ReservedJob, TubeMap};
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

pub const MOCK_ADDRESS: &str = "mock:11300";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Watch(String),
    Ignore(String),
    Use(String),
    Put {
        tube: String,
        body: String,
        priority: u32,
        delay: u32,
        ttr: u32,
    },
    Reserve,
    Delete(u64),
    Bury(u64, u32),
    Kick(u32),
    ListTubesWatched,
    ListTubes,
}

struct MockState {
    calls: Vec<Call>,
    ready: VecDeque<ReservedJob>,
    watched: Vec<String>,
    tubes: Vec<String>,
    used: String,
    next_id: u64,
    lost: bool,
}

/// Clones share state, so a test can keep one handle while the worker owns
/// another. `reserve` on an empty queue reports a lost connection instead of
/// blocking.
#[derive(Clone)]
pub struct MockConnection {
    state: Arc<Mutex<MockState>>,
}

impl MockConnection {
    pub fn new() -> Self {
        MockConnection {
            state: Arc::new(Mutex::new(MockState {
                calls: Vec::new(),
                ready: VecDeque::new(),
                watched: vec!["default".to_string()],
                tubes: vec!["default".to_string()],
                used: "default".to_string(),
                next_id: 1,
                lost: false,
            })),
        }
    }

    /// Queue a raw job body for the next `reserve`
    pub fn push_job(&self, body: &str, ttr: u32) -> u64 {
        let mut state = self.state.lock();
        let id = state.next_id;
        state.next_id += 1;
        state
            .ready
            .push_back(ReservedJob::new(id, Bytes::from(body.to_string()), ttr, 100));
        id
    }

    pub fn set_watched(&self, tubes: &[&str]) {
        let mut state = self.state.lock();
        state.watched = tubes.iter().map(|t| t.to_string()).collect();
        for tube in tubes {
            if !state.tubes.iter().any(|t| t == tube) {
                state.tubes.push(tube.to_string());
            }
        }
    }

    pub fn add_tubes(&self, tubes: &[&str]) {
        let mut state = self.state.lock();
        state.tubes.extend(tubes.iter().map(|t| t.to_string()));
    }

    pub fn watched(&self) -> Vec<String> {
        self.state.lock().watched.clone()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    pub fn ready_ids(&self) -> Vec<u64> {
        self.state.lock().ready.iter().map(|j| j.id()).collect()
    }

    pub fn deletes(&self) -> Vec<u64> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Delete(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    pub fn buries(&self) -> Vec<u64> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Bury(id, _) => Some(id),
                _ => None,
            })
            .collect()
    }

    /// Every later call fails with `ConnectionLost`
    pub fn lose_connection(&self) {
        self.state.lock().lost = true;
    }

    fn record(&self, call: Call) -> Result<(), ClientError> {
        let mut state = self.state.lock();
        if state.lost {
            return Err(ClientError::ConnectionLost("mock connection reset".to_string()));
        }
        state.calls.push(call);
        Ok(())
    }
}

#[async_trait]
impl Connection for MockConnection {
    fn address(&self) -> &str {
        MOCK_ADDRESS
    }

    async fn watch(&mut self, tube: &str) -> Result<u32, ClientError> {
        self.record(Call::Watch(tube.to_string()))?;
        let mut state = self.state.lock();
        if !state.watched.iter().any(|t| t == tube) {
            state.watched.push(tube.to_string());
        }
        Ok(state.watched.len() as u32)
    }

    async fn ignore(&mut self, tube: &str) -> Result<bool, ClientError> {
        self.record(Call::Ignore(tube.to_string()))?;
        let mut state = self.state.lock();
        if state.watched.len() == 1 && state.watched[0] == tube {
            return Ok(false);
        }
        state.watched.retain(|t| t != tube);
        Ok(true)
    }

    async fn use_tube(&mut self, tube: &str) -> Result<(), ClientError> {
        self.record(Call::Use(tube.to_string()))?;
        self.state.lock().used = tube.to_string();
        Ok(())
    }

    async fn put(&mut self, body: Bytes, priority: u32, delay: u32, ttr: u32) -> Result<u64, ClientError> {
        let tube = self.state.lock().used.clone();
        self.record(Call::Put {
            tube,
            body: String::from_utf8_lossy(&body).into_owned(),
            priority,
            delay,
            ttr,
        })?;

        let mut state = self.state.lock();
        let id = state.next_id;
        state.next_id += 1;
        state.ready.push_back(ReservedJob::new(id, body, ttr, priority));
        Ok(id)
    }

    async fn reserve(&mut self) -> Result<ReservedJob, ClientError> {
        self.record(Call::Reserve)?;
        self.state
            .lock()
            .ready
            .pop_front()
            .ok_or_else(|| ClientError::ConnectionLost("mock queue drained".to_string()))
    }

    async fn delete(&mut self, id: u64) -> Result<(), ClientError> {
        self.record(Call::Delete(id))
    }

    async fn bury(&mut self, id: u64, priority: u32) -> Result<(), ClientError> {
        self.record(Call::Bury(id, priority))
    }

    async fn kick(&mut self, bound: u32) -> Result<u32, ClientError> {
        self.record(Call::Kick(bound))?;
        Ok(0)
    }

    async fn list_tubes_watched(&mut self) -> Result<TubeMap, ClientError> {
        self.record(Call::ListTubesWatched)?;
        let watched = self.state.lock().watched.clone();
        Ok(TubeMap::from([(MOCK_ADDRESS.to_string(), watched)]))
    }

    async fn list_tubes(&mut self) -> Result<TubeMap, ClientError> {
        self.record(Call::ListTubes)?;
        let tubes = self.state.lock().tubes.clone();
        Ok(TubeMap::from([(MOCK_ADDRESS.to_string(), tubes)]))
    }
}
