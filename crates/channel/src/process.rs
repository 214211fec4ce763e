use std::io;
use std::marker::PhantomData;
use std::os::unix::io::AsRawFd;
use std::os::unix::net::UnixDatagram;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use nix::sys::socket::{setsockopt, sockopt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use jobpool_core::{JobError, JobId, JobResult};

use crate::error::ChannelError;
use crate::message::Envelope;
use crate::traits::ResultChannel;

/// Largest result frame the channel carries.
pub const MAX_FRAME: usize = 4 * 1024 * 1024;

/// Socket timeouts of zero mean "block forever", so shorter waits are
/// rounded up.
const MIN_TIMEOUT: Duration = Duration::from_millis(1);

/// Result channel shared with forked workers.
///
/// Backed by a connected pair of Unix datagram sockets created before any
/// worker is forked. Every child inherits the sending end; each result is a
/// single datagram, so concurrent posts from different processes never
/// interleave.
pub struct ProcessChannel<T> {
    tx: UnixDatagram,
    rx: UnixDatagram,
    buf: Mutex<Vec<u8>>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> ProcessChannel<T> {
    pub fn new() -> Result<Self, ChannelError> {
        let (tx, rx) = UnixDatagram::pair()?;
        resize_buffers(&tx, &rx);
        debug!(tx = tx.as_raw_fd(), rx = rx.as_raw_fd(), "process channel opened");
        Ok(Self {
            tx,
            rx,
            buf: Mutex::new(vec![0; MAX_FRAME]),
            _marker: PhantomData,
        })
    }
}

/// Raise kernel buffers so large results fit in one datagram. Best effort:
/// an unprivileged process may be capped below the requested size.
fn resize_buffers(tx: &UnixDatagram, rx: &UnixDatagram) {
    if let Err(e) = setsockopt(tx.as_raw_fd(), sockopt::SndBuf, &MAX_FRAME) {
        warn!("could not raise send buffer: {e}");
    }
    if let Err(e) = setsockopt(rx.as_raw_fd(), sockopt::RcvBuf, &MAX_FRAME) {
        warn!("could not raise receive buffer: {e}");
    }
}

impl<T> ResultChannel<T> for ProcessChannel<T>
where
    T: Serialize + DeserializeOwned,
{
    fn put(&self, job_id: JobId, result: JobResult<T>) -> Result<(), ChannelError> {
        let frame = Envelope::new(job_id, &result)?.to_bytes()?;
        if frame.len() > MAX_FRAME {
            return Err(ChannelError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("result frame of {} bytes exceeds {MAX_FRAME}", frame.len()),
            )));
        }
        self.tx.send(&frame)?;
        Ok(())
    }

    fn get(&self, timeout: Duration) -> Result<(JobId, JobResult<T>), ChannelError> {
        let mut buf = self.buf.lock().unwrap_or_else(PoisonError::into_inner);
        self.rx.set_read_timeout(Some(timeout.max(MIN_TIMEOUT)))?;

        let len = match self.rx.recv(&mut buf) {
            Ok(len) => len,
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                return Err(ChannelError::Empty);
            }
            Err(e) => return Err(e.into()),
        };

        let envelope = Envelope::from_bytes(&buf[..len])?;
        match envelope.decode::<JobResult<T>>() {
            Ok(result) => Ok((envelope.job_id, result)),
            Err(e) => {
                warn!(job = %envelope.job_id, pid = envelope.sender_pid, "undecodable result: {e}");
                Ok((
                    envelope.job_id,
                    JobResult::error(JobError::runtime(format!("result decode failed: {e}"))),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    const TIMEOUT: Duration = Duration::from_millis(20);

    #[test]
    fn get_times_out_when_empty() {
        let channel: ProcessChannel<u32> = ProcessChannel::new().unwrap();
        assert!(channel.get(TIMEOUT).unwrap_err().is_empty());
    }

    #[test]
    fn zero_timeout_does_not_block_forever() {
        let channel: ProcessChannel<u32> = ProcessChannel::new().unwrap();
        assert!(channel.get(Duration::ZERO).unwrap_err().is_empty());
    }

    #[test]
    fn results_arrive_in_order() {
        let channel: ProcessChannel<String> = ProcessChannel::new().unwrap();
        let first = JobId::new();
        let second = JobId::new();
        channel.put(first, JobResult::success("a".into())).unwrap();
        channel
            .put(second, JobResult::error(JobError::new("ValueError", "boom")))
            .unwrap();

        let (id, result) = channel.get(TIMEOUT).unwrap();
        assert_eq!(id, first);
        assert_eq!(result.value().map(String::as_str), Some("a"));

        let (id, result) = channel.get(TIMEOUT).unwrap();
        assert_eq!(id, second);
        assert_eq!(result.err(), Some(&JobError::new("ValueError", "boom")));
    }

    #[test]
    fn mismatched_payload_still_names_the_job() {
        let channel: ProcessChannel<u64> = ProcessChannel::new().unwrap();
        let id = JobId::new();
        let frame = Envelope::new(id, &JobResult::success("not a number".to_string()))
            .unwrap()
            .to_bytes()
            .unwrap();
        channel.tx.send(&frame).unwrap();

        let (got, result) = channel.get(TIMEOUT).unwrap();
        assert_eq!(got, id);
        let error = result.err().unwrap();
        assert!(error.is_kind(JobError::RUNTIME));
        assert!(error.message().starts_with("result decode failed"));
    }

    #[test]
    fn garbage_frame_is_a_decode_error() {
        let channel: ProcessChannel<u64> = ProcessChannel::new().unwrap();
        channel.tx.send(&[0xc1, 0x00, 0xff]).unwrap();
        assert!(matches!(
            channel.get(TIMEOUT),
            Err(ChannelError::Deserialization(_))
        ));
    }

    #[test]
    fn oversized_result_is_rejected() {
        let channel: ProcessChannel<Vec<u8>> = ProcessChannel::new().unwrap();
        let result = channel.put(JobId::new(), JobResult::success(vec![7; MAX_FRAME + 1]));
        assert!(matches!(result, Err(ChannelError::Io(_))));
    }

    #[test]
    fn concurrent_producers() {
        let channel: Arc<ProcessChannel<usize>> = Arc::new(ProcessChannel::new().unwrap());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let channel = Arc::clone(&channel);
                thread::spawn(move || {
                    for j in 0..10 {
                        channel.put(JobId::new(), JobResult::success(i * 10 + j)).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let mut values = Vec::new();
        while let Ok((_, result)) = channel.get(TIMEOUT) {
            values.push(result.into_result().unwrap());
        }
        values.sort_unstable();
        assert_eq!(values, (0..40).collect::<Vec<_>>());
    }
}
