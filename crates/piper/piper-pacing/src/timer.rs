//! A `timerfd`-backed periodic tick source. The kernel hands back an 8-byte
//! overrun count on each successful read, but a read can be interrupted
//! mid-way, so a cursor into a local buffer is kept across calls and only
//! applied to the tick counter once all 8 bytes have landed.

use std::os::unix::io::RawFd;
use std::time::Duration;

use crate::error::{PacingError, Result};

const OVERRUN_BYTES: usize = 8;

pub struct Timer {
    fd: RawFd,
    period: Duration,
    ticks: u32,
    buf: [u8; OVERRUN_BYTES],
    filled: usize,
}

impl Timer {
    pub fn new(period: Duration) -> Result<Self> {
        if period.is_zero() {
            return Err(PacingError::InvalidArgument("period must be nonzero".into()));
        }
        let fd = unsafe { libc::timerfd_create(libc::CLOCK_MONOTONIC, libc::TFD_CLOEXEC | libc::TFD_NONBLOCK) };
        if fd < 0 {
            return Err(PacingError::Timer(std::io::Error::last_os_error()));
        }
        Ok(Timer {
            fd,
            period,
            ticks: 0,
            buf: [0u8; OVERRUN_BYTES],
            filled: 0,
        })
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Arm a periodic timer: first fire at `now + period`, then every
    /// `period` thereafter. Clears the tick count.
    pub fn start(&mut self) -> Result<()> {
        let spec = to_itimerspec(self.period, self.period);
        self.arm(&spec)?;
        self.ticks = 0;
        self.filled = 0;
        Ok(())
    }

    /// Disarm the timer and clear the tick count.
    pub fn stop(&mut self) -> Result<()> {
        let spec = to_itimerspec(Duration::ZERO, Duration::ZERO);
        self.arm(&spec)?;
        self.ticks = 0;
        self.filled = 0;
        Ok(())
    }

    fn arm(&self, spec: &libc::itimerspec) -> Result<()> {
        let rc = unsafe { libc::timerfd_settime(self.fd, 0, spec, std::ptr::null_mut()) };
        if rc < 0 {
            return Err(PacingError::Timer(std::io::Error::last_os_error()));
        }
        Ok(())
    }

    /// Block until at least one tick has fired, then fold it into the count.
    pub fn accumulate(&mut self) -> Result<()> {
        while self.ticks == 0 {
            self.try_accumulate(-1)?;
        }
        Ok(())
    }

    /// Equivalent to `try_accumulate(-1)`.
    pub fn refill_blocking(&mut self) -> Result<()> {
        self.try_accumulate(-1)
    }

    /// Poll the timer's wait handle with `timeout_ms` (0 = immediate, -1 =
    /// indefinite). A signal interrupting the poll or the read returns
    /// `Ok(())` having added no ticks; the partial-read cursor is preserved
    /// so a later call resumes rather than restarting.
    pub fn try_accumulate(&mut self, timeout_ms: i32) -> Result<()> {
        let mut pollfd = libc::pollfd {
            fd: self.fd,
            events: libc::POLLIN,
            revents: 0,
        };
        let rc = unsafe { libc::poll(&mut pollfd, 1, timeout_ms) };
        if rc < 0 {
            let err = std::io::Error::last_os_error();
            if err.kind() == std::io::ErrorKind::Interrupted {
                return Ok(());
            }
            return Err(PacingError::Timer(err));
        }
        if rc == 0 {
            return Ok(());
        }

        loop {
            let remaining = OVERRUN_BYTES - self.filled;
            let ptr = unsafe { self.buf.as_mut_ptr().add(self.filled) as *mut libc::c_void };
            let n = unsafe { libc::read(self.fd, ptr, remaining) };
            if n < 0 {
                let err = std::io::Error::last_os_error();
                match err.kind() {
                    std::io::ErrorKind::Interrupted => return Ok(()),
                    std::io::ErrorKind::WouldBlock => return Ok(()),
                    _ => return Err(PacingError::Timer(err)),
                }
            }
            self.filled += n as usize;
            if self.filled < OVERRUN_BYTES {
                // partial read; resume on the next call
                return Ok(());
            }
            let overrun = u64::from_ne_bytes(self.buf);
            self.ticks = self.ticks.saturating_add(overrun as u32);
            self.filled = 0;
            self.buf = [0u8; OVERRUN_BYTES];
            return Ok(());
        }
    }

    /// Return the current tick count and zero it.
    pub fn consume(&mut self) -> u32 {
        let t = self.ticks;
        self.ticks = 0;
        t
    }

    /// Peek at the current tick count without consuming it.
    pub fn ticks(&self) -> u32 {
        self.ticks
    }

    pub fn clear(&mut self) {
        self.ticks = 0;
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.fd);
        }
    }
}

fn to_itimerspec(value: Duration, interval: Duration) -> libc::itimerspec {
    libc::itimerspec {
        it_value: to_timespec(value),
        it_interval: to_timespec(interval),
    }
}

fn to_timespec(d: Duration) -> libc::timespec {
    libc::timespec {
        tv_sec: d.as_secs() as libc::time_t,
        tv_nsec: d.subsec_nanos() as libc::c_long,
    }
}
