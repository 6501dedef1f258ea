use crate::{ClientError, Connection, ReservedJob, Result, TubeMap};
use async_trait::async_trait;
use beanq_protocol::{parse_tube_list, BeanstalkCodec, Command, JobStats, Response, DEFAULT_PORT};
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tracing::{debug, warn};

const URL_SCHEME: &str = "beanstalk://";

/// TTR reported for a reserved job whose stats could not be read; the worker
/// runs it without a deadline of its own
const UNKNOWN_TTR: u32 = 0;

/// Priority a job is buried at when its stats could not be read
const UNKNOWN_PRIORITY: u32 = 65_536;

/// Turn `beanstalk://host[:port]` (scheme optional) into `host:port`
pub fn parse_address(url: &str) -> Result<String> {
    let rest = url.trim();
    let rest = rest.strip_prefix(URL_SCHEME).unwrap_or(rest);
    let rest = rest.trim_end_matches('/');

    if rest.is_empty() || rest.contains('/') || rest.contains("://") {
        return Err(ClientError::InvalidUrl(url.to_string()));
    }

    match rest.rsplit_once(':') {
        Some((host, port)) => {
            if host.is_empty() || port.parse::<u16>().is_err() {
                return Err(ClientError::InvalidUrl(url.to_string()));
            }
            Ok(rest.to_string())
        }
        None => Ok(format!("{}:{}", rest, DEFAULT_PORT)),
    }
}

/// A single TCP connection to a beanstalkd server
pub struct BeanstalkConnection {
    address: String,
    framed: Framed<TcpStream, BeanstalkCodec>,
}

impl BeanstalkConnection {
    /// Connect to a server given as `beanstalk://host[:port]`
    pub async fn connect(url: &str) -> Result<Self> {
        let address = parse_address(url)?;

        let stream = TcpStream::connect(&address)
            .await
            .map_err(|e| ClientError::ConnectionLost(format!("{}: {}", address, e)))?;

        debug!("Connected to beanstalkd at {}", address);

        Ok(BeanstalkConnection {
            address,
            framed: Framed::new(stream, BeanstalkCodec),
        })
    }

    /// Send one command and wait for its reply
    async fn request(&mut self, command: Command) -> Result<Response> {
        let name = command.name();
        self.framed.send(command).await?;

        match self.framed.next().await {
            Some(Ok(response)) if response.is_server_error() => {
                Err(ClientError::ServerError(format!("{} in reply to {}", response.name(), name)))
            }
            Some(Ok(response)) => Ok(response),
            Some(Err(e)) => Err(e.into()),
            None => Err(ClientError::ConnectionLost(format!(
                "{} closed the connection",
                self.address
            ))),
        }
    }

    async fn list(&mut self, command: Command) -> Result<TubeMap> {
        let name = command.name();
        match self.request(command).await? {
            Response::Ok(body) => {
                let tubes = parse_tube_list(&body)?;
                Ok(TubeMap::from([(self.address.clone(), tubes)]))
            }
            other => Err(unexpected(name, &other)),
        }
    }

    /// Fetch `stats-job` for a job
    pub async fn stats_job(&mut self, id: u64) -> Result<JobStats> {
        match self.request(Command::StatsJob(id)).await? {
            Response::Ok(body) => Ok(JobStats::from_yaml(&body)?),
            Response::NotFound => Err(ClientError::JobNotFound(id)),
            other => Err(unexpected("stats-job", &other)),
        }
    }
}

fn unexpected(command: &'static str, response: &Response) -> ClientError {
    ClientError::UnexpectedResponse {
        command,
        response: response.name(),
    }
}

#[async_trait]
impl Connection for BeanstalkConnection {
    fn address(&self) -> &str {
        &self.address
    }

    async fn watch(&mut self, tube: &str) -> Result<u32> {
        match self.request(Command::Watch(tube.to_string())).await? {
            Response::Watching(count) => Ok(count),
            other => Err(unexpected("watch", &other)),
        }
    }

    async fn ignore(&mut self, tube: &str) -> Result<bool> {
        match self.request(Command::Ignore(tube.to_string())).await? {
            Response::Watching(_) => Ok(true),
            Response::NotIgnored => Ok(false),
            other => Err(unexpected("ignore", &other)),
        }
    }

    async fn use_tube(&mut self, tube: &str) -> Result<()> {
        match self.request(Command::Use(tube.to_string())).await? {
            Response::Using(_) => Ok(()),
            other => Err(unexpected("use", &other)),
        }
    }

    async fn put(&mut self, body: Bytes, priority: u32, delay: u32, ttr: u32) -> Result<u64> {
        let command = Command::Put {
            priority,
            delay,
            ttr,
            body,
        };

        match self.request(command).await? {
            Response::Inserted(id) => Ok(id),
            Response::Buried(Some(id)) => {
                warn!("Server buried job {} on insert (out of memory)", id);
                Ok(id)
            }
            Response::JobTooBig => Err(ClientError::ServerError("JOB_TOO_BIG".to_string())),
            Response::Draining => Err(ClientError::ServerError("DRAINING".to_string())),
            Response::ExpectedCrlf => Err(ClientError::ServerError("EXPECTED_CRLF".to_string())),
            other => Err(unexpected("put", &other)),
        }
    }

    async fn reserve(&mut self) -> Result<ReservedJob> {
        loop {
            match self.request(Command::Reserve).await? {
                Response::Reserved { id, body } => {
                    let (ttr, priority) = match self.stats_job(id).await {
                        Ok(stats) => (stats.ttr, stats.pri),
                        Err(e) if e.is_connection_lost() => return Err(e),
                        Err(e) => {
                            warn!("stats-job {} failed ({}); handing the job over without a TTR", id, e);
                            (UNKNOWN_TTR, UNKNOWN_PRIORITY)
                        }
                    };
                    return Ok(ReservedJob::new(id, body, ttr, priority));
                }
                Response::DeadlineSoon => {
                    debug!("Reserve answered DEADLINE_SOON, retrying");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
                other => return Err(unexpected("reserve", &other)),
            }
        }
    }

    async fn delete(&mut self, id: u64) -> Result<()> {
        match self.request(Command::Delete(id)).await? {
            Response::Deleted => Ok(()),
            Response::NotFound => Err(ClientError::JobNotFound(id)),
            other => Err(unexpected("delete", &other)),
        }
    }

    async fn bury(&mut self, id: u64, priority: u32) -> Result<()> {
        match self.request(Command::Bury { id, priority }).await? {
            Response::Buried(_) => Ok(()),
            Response::NotFound => Err(ClientError::JobNotFound(id)),
            other => Err(unexpected("bury", &other)),
        }
    }

    async fn kick(&mut self, bound: u32) -> Result<u32> {
        match self.request(Command::Kick(bound)).await? {
            Response::Kicked(count) => Ok(count),
            other => Err(unexpected("kick", &other)),
        }
    }

    async fn list_tubes_watched(&mut self) -> Result<TubeMap> {
        self.list(Command::ListTubesWatched).await
    }

    async fn list_tubes(&mut self) -> Result<TubeMap> {
        self.list(Command::ListTubes).await
    }
}
