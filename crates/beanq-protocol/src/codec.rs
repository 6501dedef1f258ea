use crate::{
    Command, ProtocolError, Response, Result, MAX_BODY_SIZE, MAX_LINE_LENGTH,
    MAX_TUBE_NAME_LENGTH,
};
use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// Codec for the beanstalkd text protocol
///
/// Frame format: `<line>\r\n`, followed by `<body>\r\n` for `put` requests and
/// for `RESERVED <id> <bytes>` / `OK <bytes>` replies.
#[derive(Debug, Default)]
pub struct BeanstalkCodec;

enum Header {
    Complete(Response),
    Reserved { id: u64, len: usize },
    Ok { len: usize },
}

fn find_crlf(src: &[u8]) -> Option<usize> {
    src.windows(2).position(|w| w == b"\r\n")
}

fn parse_num<T: std::str::FromStr>(line: &str, field: Option<&str>) -> Result<T> {
    field
        .and_then(|f| f.parse().ok())
        .ok_or_else(|| ProtocolError::MalformedResponse(line.to_string()))
}

fn parse_header(line: &str) -> Result<Header> {
    let mut parts = line.split(' ');
    let word = parts.next().unwrap_or_default();

    let response = match word {
        "RESERVED" => {
            let id = parse_num(line, parts.next())?;
            let len = parse_num(line, parts.next())?;
            return Ok(Header::Reserved { id, len });
        }
        "OK" => {
            let len = parse_num(line, parts.next())?;
            return Ok(Header::Ok { len });
        }
        "USING" => Response::Using(parse_num(line, parts.next())?),
        "INSERTED" => Response::Inserted(parse_num(line, parts.next())?),
        "BURIED" => match parts.next() {
            Some(id) => Response::Buried(Some(parse_num(line, Some(id))?)),
            None => Response::Buried(None),
        },
        "WATCHING" => Response::Watching(parse_num(line, parts.next())?),
        "KICKED" => Response::Kicked(parse_num(line, parts.next())?),
        "DEADLINE_SOON" => Response::DeadlineSoon,
        "TIMED_OUT" => Response::TimedOut,
        "DELETED" => Response::Deleted,
        "NOT_FOUND" => Response::NotFound,
        "NOT_IGNORED" => Response::NotIgnored,
        "EXPECTED_CRLF" => Response::ExpectedCrlf,
        "JOB_TOO_BIG" => Response::JobTooBig,
        "DRAINING" => Response::Draining,
        "OUT_OF_MEMORY" => Response::OutOfMemory,
        "INTERNAL_ERROR" => Response::InternalError,
        "BAD_FORMAT" => Response::BadFormat,
        "UNKNOWN_COMMAND" => Response::UnknownCommand,
        _ => return Err(ProtocolError::MalformedResponse(line.to_string())),
    };

    Ok(Header::Complete(response))
}

fn check_tube_name(tube: &str) -> Result<()> {
    let valid_char = |c: char| c.is_ascii_alphanumeric() || "-+/;.$_()".contains(c);
    if tube.is_empty()
        || tube.len() > MAX_TUBE_NAME_LENGTH
        || tube.starts_with('-')
        || !tube.chars().all(valid_char)
    {
        return Err(ProtocolError::InvalidTubeName(tube.to_string()));
    }
    Ok(())
}

impl Decoder for BeanstalkCodec {
    type Item = Response;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        let line_end = match find_crlf(src) {
            Some(pos) => pos,
            None if src.len() > MAX_LINE_LENGTH => {
                return Err(ProtocolError::LineTooLong(src.len()));
            }
            None => return Ok(None),
        };

        let header = {
            let line = std::str::from_utf8(&src[..line_end]).map_err(|_| {
                ProtocolError::MalformedResponse(String::from_utf8_lossy(&src[..line_end]).into_owned())
            })?;
            parse_header(line)?
        };

        let (id, len) = match header {
            Header::Complete(response) => {
                src.advance(line_end + 2);
                return Ok(Some(response));
            }
            Header::Reserved { id, len } => (Some(id), len),
            Header::Ok { len } => (None, len),
        };

        if len > MAX_BODY_SIZE {
            return Err(ProtocolError::BodyTooLarge(len));
        }

        // Wait for the body and its trailing CRLF
        let frame_len = line_end + 2 + len + 2;
        if src.len() < frame_len {
            src.reserve(frame_len - src.len());
            return Ok(None);
        }

        if &src[frame_len - 2..frame_len] != b"\r\n" {
            return Err(ProtocolError::MalformedResponse(
                "body not terminated by CRLF".to_string(),
            ));
        }

        src.advance(line_end + 2);
        let body = src.split_to(len).freeze();
        src.advance(2);

        Ok(Some(match id {
            Some(id) => Response::Reserved { id, body },
            None => Response::Ok(body),
        }))
    }
}

impl Encoder<Command> for BeanstalkCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: Command, dst: &mut BytesMut) -> Result<()> {
        if let Some(tube) = item.tube() {
            check_tube_name(tube)?;
        }

        let line = match &item {
            Command::Use(tube) => format!("use {}", tube),
            Command::Put {
                priority,
                delay,
                ttr,
                body,
            } => format!("put {} {} {} {}", priority, delay, ttr, body.len()),
            Command::Reserve => "reserve".to_string(),
            Command::Delete(id) => format!("delete {}", id),
            Command::Bury { id, priority } => format!("bury {} {}", id, priority),
            Command::Watch(tube) => format!("watch {}", tube),
            Command::Ignore(tube) => format!("ignore {}", tube),
            Command::Kick(bound) => format!("kick {}", bound),
            Command::ListTubes => "list-tubes".to_string(),
            Command::ListTubesWatched => "list-tubes-watched".to_string(),
            Command::StatsJob(id) => format!("stats-job {}", id),
        };

        dst.reserve(line.len() + 2);
        dst.put_slice(line.as_bytes());
        dst.put_slice(b"\r\n");

        if let Command::Put { body, .. } = &item {
            dst.reserve(body.len() + 2);
            dst.put_slice(body);
            dst.put_slice(b"\r\n");
        }

        Ok(())
    }
}
