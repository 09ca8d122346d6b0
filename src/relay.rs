// Response relay: copies the service reply to the invoker as it arrives.
// No buffering beyond one read, no line-ending normalization.

use std::error::Error as StdError;
use std::io::{self, Read, Write};

const CHUNK_SIZE: usize = 8 * 1024;

/// Which side of the copy broke.
#[derive(Debug)]
pub enum RelayError {
    /// Reading the reply failed (connection reset, timeout).
    Read(io::Error),
    /// Writing to the invoker failed (closed pipe, full disk).
    Write(io::Error),
}

/// Streams `reply` into `out` until end-of-stream, flushing after every
/// chunk so that long grading runs show progress. Returns the byte count.
pub fn relay<R: Read, W: Write>(mut reply: R, mut out: W) -> Result<u64, RelayError> {
    let mut buf = [0u8; CHUNK_SIZE];
    let mut total = 0u64;
    loop {
        let n = match reply.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(RelayError::Read(e)),
        };
        out.write_all(&buf[..n]).map_err(RelayError::Write)?;
        out.flush().map_err(RelayError::Write)?;
        total += n as u64;
    }
    Ok(total)
}

/// True when `e`, or anything it wraps, is a timeout. reqwest's blocking
/// reader reports an elapsed timeout as `ErrorKind::Other` around a
/// `reqwest::Error`.
pub fn is_timeout(e: &io::Error) -> bool {
    if e.kind() == io::ErrorKind::TimedOut {
        return true;
    }
    let mut source: Option<&(dyn StdError + 'static)> = match e.get_ref() {
        Some(inner) => Some(inner as &(dyn StdError + 'static)),
        None => None,
    };
    while let Some(err) = source {
        if let Some(re) = err.downcast_ref::<reqwest::Error>() {
            if re.is_timeout() {
                return true;
            }
        }
        if let Some(io) = err.downcast_ref::<io::Error>() {
            if io.kind() == io::ErrorKind::TimedOut {
                return true;
            }
        }
        source = err.source();
    }
    false
}
