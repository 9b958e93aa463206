//! Byte-stream transports a session drives its ciphertext over.
//!
//! A [`Transport`] never reports "would block" as an error: partial and
//! blocked I/O come back as [`IoOutcome`] values, and readiness waits are
//! explicit so the session can apply its timeout and per-wait hook.

use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::os::fd::{AsFd, AsRawFd, RawFd};
use std::time::Duration;

use nix::fcntl::{fcntl, FcntlArg, OFlag};
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};

/// Result of one send or receive attempt.
#[derive(Debug)]
pub enum IoOutcome {
    /// `n > 0` bytes were transferred.
    Data(usize),
    /// Nothing could be transferred without blocking.
    WouldBlock,
    /// The peer closed its side of the stream.
    Eof,
    Failed(io::Error),
}

/// Direction a session waits in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interest {
    Readable,
    Writable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    TimedOut,
}

/// A caller-supplied byte stream.
pub trait Transport: Send {
    /// Send a prefix of `buf`.
    fn send(&mut self, buf: &[u8]) -> IoOutcome;

    /// Receive into `buf`.
    fn recv(&mut self, buf: &mut [u8]) -> IoOutcome;

    /// Block until the stream is ready in `interest`, or `timeout` elapses.
    /// `None` waits indefinitely.
    fn wait(&mut self, interest: Interest, timeout: Option<Duration>) -> io::Result<Readiness>;

    fn is_nonblocking(&self) -> io::Result<bool>;

    fn set_nonblocking(&mut self, nonblocking: bool) -> io::Result<()>;

    /// OS descriptor behind the stream. In-memory transports have none.
    fn raw_fd(&self) -> Option<RawFd> {
        None
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&mut self, buf: &[u8]) -> IoOutcome {
        (**self).send(buf)
    }

    fn recv(&mut self, buf: &mut [u8]) -> IoOutcome {
        (**self).recv(buf)
    }

    fn wait(&mut self, interest: Interest, timeout: Option<Duration>) -> io::Result<Readiness> {
        (**self).wait(interest, timeout)
    }

    fn is_nonblocking(&self) -> io::Result<bool> {
        (**self).is_nonblocking()
    }

    fn set_nonblocking(&mut self, nonblocking: bool) -> io::Result<()> {
        (**self).set_nonblocking(nonblocking)
    }

    fn raw_fd(&self) -> Option<RawFd> {
        (**self).raw_fd()
    }
}

fn classify(result: io::Result<usize>, requested: usize) -> Option<IoOutcome> {
    match result {
        Ok(0) if requested > 0 => Some(IoOutcome::Eof),
        Ok(n) => Some(IoOutcome::Data(n)),
        Err(e) if e.kind() == io::ErrorKind::Interrupted => None,
        Err(e) if e.kind() == io::ErrorKind::WouldBlock => Some(IoOutcome::WouldBlock),
        Err(e) => Some(IoOutcome::Failed(e)),
    }
}

impl Transport for TcpStream {
    fn send(&mut self, buf: &[u8]) -> IoOutcome {
        loop {
            match classify(Write::write(self, buf), buf.len()) {
                // a zero-length write on a live socket means the peer is gone
                Some(IoOutcome::Eof) => {
                    return IoOutcome::Failed(io::ErrorKind::WriteZero.into())
                }
                Some(outcome) => return outcome,
                None => continue,
            }
        }
    }

    fn recv(&mut self, buf: &mut [u8]) -> IoOutcome {
        loop {
            if let Some(outcome) = classify(Read::read(self, buf), buf.len()) {
                return outcome;
            }
        }
    }

    fn wait(&mut self, interest: Interest, timeout: Option<Duration>) -> io::Result<Readiness> {
        let flags = match interest {
            Interest::Readable => PollFlags::POLLIN,
            Interest::Writable => PollFlags::POLLOUT,
        };
        let timeout = match timeout {
            None => PollTimeout::NONE,
            Some(d) => PollTimeout::try_from(d).unwrap_or(PollTimeout::MAX),
        };
        loop {
            let mut fds = [PollFd::new(self.as_fd(), flags)];
            match poll(&mut fds, timeout) {
                Ok(0) => return Ok(Readiness::TimedOut),
                // POLLHUP/POLLERR count as ready: the next recv/send reports it
                Ok(_) => return Ok(Readiness::Ready),
                Err(nix::errno::Errno::EINTR) => continue,
                Err(errno) => return Err(errno.into()),
            }
        }
    }

    fn is_nonblocking(&self) -> io::Result<bool> {
        let flags = fcntl(self.as_fd(), FcntlArg::F_GETFL)?;
        Ok(OFlag::from_bits_truncate(flags).contains(OFlag::O_NONBLOCK))
    }

    fn set_nonblocking(&mut self, nonblocking: bool) -> io::Result<()> {
        TcpStream::set_nonblocking(self, nonblocking)
    }

    fn raw_fd(&self) -> Option<RawFd> {
        Some(self.as_raw_fd())
    }
}
