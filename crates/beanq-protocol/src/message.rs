use crate::Result;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Requests a client sends to beanstalkd
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Select the tube subsequent `put`s go to
    Use(String),

    /// Submit a job body
    Put {
        priority: u32,
        delay: u32,
        ttr: u32,
        body: Bytes,
    },

    /// Block until a job is available on a watched tube
    Reserve,

    /// Acknowledge a reserved job
    Delete(u64),

    /// Move a reserved job into the buried state
    Bury { id: u64, priority: u32 },

    /// Add a tube to the watch list
    Watch(String),

    /// Remove a tube from the watch list
    Ignore(String),

    /// Move up to `bound` buried jobs on the used tube back to ready
    Kick(u32),

    /// List every tube on the server
    ListTubes,

    /// List tubes on this connection's watch list
    ListTubesWatched,

    /// Fetch a job's statistics
    StatsJob(u64),
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Use(_) => "use",
            Command::Put { .. } => "put",
            Command::Reserve => "reserve",
            Command::Delete(_) => "delete",
            Command::Bury { .. } => "bury",
            Command::Watch(_) => "watch",
            Command::Ignore(_) => "ignore",
            Command::Kick(_) => "kick",
            Command::ListTubes => "list-tubes",
            Command::ListTubesWatched => "list-tubes-watched",
            Command::StatsJob(_) => "stats-job",
        }
    }

    /// The tube this command names, if any
    pub fn tube(&self) -> Option<&str> {
        match self {
            Command::Use(tube) | Command::Watch(tube) | Command::Ignore(tube) => Some(tube),
            _ => None,
        }
    }
}

/// Replies beanstalkd sends back
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Using(String),
    Inserted(u64),
    /// `BURIED <id>` after a put, bare `BURIED` after a bury
    Buried(Option<u64>),
    Reserved { id: u64, body: Bytes },
    DeadlineSoon,
    TimedOut,
    Deleted,
    NotFound,
    Watching(u32),
    NotIgnored,
    Kicked(u32),
    /// YAML body of a listing or stats command
    Ok(Bytes),
    ExpectedCrlf,
    JobTooBig,
    Draining,
    OutOfMemory,
    InternalError,
    BadFormat,
    UnknownCommand,
}

impl Response {
    pub fn name(&self) -> &'static str {
        match self {
            Response::Using(_) => "USING",
            Response::Inserted(_) => "INSERTED",
            Response::Buried(_) => "BURIED",
            Response::Reserved { .. } => "RESERVED",
            Response::DeadlineSoon => "DEADLINE_SOON",
            Response::TimedOut => "TIMED_OUT",
            Response::Deleted => "DELETED",
            Response::NotFound => "NOT_FOUND",
            Response::Watching(_) => "WATCHING",
            Response::NotIgnored => "NOT_IGNORED",
            Response::Kicked(_) => "KICKED",
            Response::Ok(_) => "OK",
            Response::ExpectedCrlf => "EXPECTED_CRLF",
            Response::JobTooBig => "JOB_TOO_BIG",
            Response::Draining => "DRAINING",
            Response::OutOfMemory => "OUT_OF_MEMORY",
            Response::InternalError => "INTERNAL_ERROR",
            Response::BadFormat => "BAD_FORMAT",
            Response::UnknownCommand => "UNKNOWN_COMMAND",
        }
    }

    /// Server-side failures that are never a valid answer to any command
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            Response::OutOfMemory
                | Response::InternalError
                | Response::BadFormat
                | Response::UnknownCommand
        )
    }
}

/// Parse the YAML list body of `list-tubes` / `list-tubes-watched`
pub fn parse_tube_list(body: &[u8]) -> Result<Vec<String>> {
    let content = String::from_utf8_lossy(body);
    if content.trim().trim_start_matches("---").trim().is_empty() {
        return Ok(Vec::new());
    }

    let tubes: Option<Vec<String>> = serde_yaml::from_slice(body)?;
    Ok(tubes.unwrap_or_default())
}

/// The subset of `stats-job` the client cares about
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStats {
    pub id: u64,
    pub tube: String,
    pub state: String,
    pub pri: u32,
    pub age: u64,
    pub delay: u64,
    pub ttr: u32,
    #[serde(rename = "time-left")]
    pub time_left: u64,
    #[serde(default)]
    pub reserves: u64,
    #[serde(default)]
    pub buries: u64,
    #[serde(default)]
    pub kicks: u64,
}

impl JobStats {
    pub fn from_yaml(body: &[u8]) -> Result<Self> {
        Ok(serde_yaml::from_slice(body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tube_list() {
        let body = b"---\n- default\n- backburner.worker.queue.mail\n";
        let tubes = parse_tube_list(body).unwrap();
        assert_eq!(tubes, vec!["default", "backburner.worker.queue.mail"]);

        assert!(parse_tube_list(b"---\n").unwrap().is_empty());
    }

    #[test]
    fn test_parse_job_stats() {
        let body = b"---\nid: 7\ntube: default\nstate: reserved\npri: 65536\nage: 3\n\
delay: 0\nttr: 120\ntime-left: 118\nfile: 0\nreserves: 1\ntimeouts: 0\n\
releases: 0\nburies: 0\nkicks: 0\n";
        let stats = JobStats::from_yaml(body).unwrap();

        assert_eq!(stats.id, 7);
        assert_eq!(stats.pri, 65536);
        assert_eq!(stats.ttr, 120);
        assert_eq!(stats.time_left, 118);
        assert_eq!(stats.state, "reserved");
    }

    #[test]
    fn test_command_names() {
        assert_eq!(Command::ListTubesWatched.name(), "list-tubes-watched");
        assert_eq!(Command::Watch("mail".into()).tube(), Some("mail"));
        assert_eq!(Command::Reserve.tube(), None);
        assert!(Response::UnknownCommand.is_server_error());
        assert!(!Response::NotFound.is_server_error());
    }
}
