//! The application-opaque metadata blob for the audio use case: PCM format,
//! channel/rate/framing parameters, and the readable/writable window sizes
//! the pipe was created with. Written once at create time (§ 6).

use crate::error::{Result, TransportError};

pub const MAX_FORMAT_SIZE: usize = 28;
pub const METADATA_BYTES: usize = 4 + MAX_FORMAT_SIZE + 4 + 4 + 4 + 4 + 8 + 4 + 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    pub version: u32,
    pub format: [u8; MAX_FORMAT_SIZE],
    pub channels: u32,
    pub rate: u32,
    pub frame_size: u32,
    pub period_size: u32,
    pub period_time: u64,
    pub readable: u32,
    pub writable: u32,
}

impl Metadata {
    pub fn new(
        format: &str,
        channels: u32,
        rate: u32,
        frame_size: u32,
        period_size: u32,
        period_time: u64,
        readable: u32,
        writable: u32,
    ) -> Result<Self> {
        if format.len() >= MAX_FORMAT_SIZE {
            return Err(TransportError::InvalidArgument(format!(
                "format name '{format}' exceeds {} bytes",
                MAX_FORMAT_SIZE - 1
            )));
        }
        let mut bytes = [0u8; MAX_FORMAT_SIZE];
        bytes[..format.len()].copy_from_slice(format.as_bytes());

        let metadata = Metadata {
            version: 1,
            format: bytes,
            channels,
            rate,
            frame_size,
            period_size,
            period_time,
            readable,
            writable,
        };
        metadata.validate()?;
        Ok(metadata)
    }

    fn validate(&self) -> Result<()> {
        if self.channels == 0 {
            return Err(TransportError::InvalidArgument("channels must be nonzero".into()));
        }
        if self.rate == 0 {
            return Err(TransportError::InvalidArgument("rate must be nonzero".into()));
        }
        let expected_period_time =
            (self.period_size as u64 * 1_000_000_000) / (self.frame_size as u64 * self.rate as u64);
        if self.period_size as u64 * 1_000_000_000 != self.frame_size as u64 * self.rate as u64 * expected_period_time
        {
            return Err(TransportError::InvalidArgument(
                "period_size, frame_size, rate and period_time are inconsistent".into(),
            ));
        }
        Ok(())
    }

    pub fn format_name(&self) -> &str {
        let nul = self.format.iter().position(|&b| b == 0).unwrap_or(self.format.len());
        std::str::from_utf8(&self.format[..nul]).unwrap_or("")
    }

    pub fn to_bytes(&self) -> [u8; METADATA_BYTES] {
        let mut buf = [0u8; METADATA_BYTES];
        let mut off = 0;
        buf[off..off + 4].copy_from_slice(&self.version.to_le_bytes());
        off += 4;
        buf[off..off + MAX_FORMAT_SIZE].copy_from_slice(&self.format);
        off += MAX_FORMAT_SIZE;
        buf[off..off + 4].copy_from_slice(&self.channels.to_le_bytes());
        off += 4;
        buf[off..off + 4].copy_from_slice(&self.rate.to_le_bytes());
        off += 4;
        buf[off..off + 4].copy_from_slice(&self.frame_size.to_le_bytes());
        off += 4;
        buf[off..off + 4].copy_from_slice(&self.period_size.to_le_bytes());
        off += 4;
        buf[off..off + 8].copy_from_slice(&self.period_time.to_le_bytes());
        off += 8;
        buf[off..off + 4].copy_from_slice(&self.readable.to_le_bytes());
        off += 4;
        buf[off..off + 4].copy_from_slice(&self.writable.to_le_bytes());
        buf
    }

    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        if buf.len() < METADATA_BYTES {
            return Err(TransportError::InvalidLayout(format!(
                "metadata blob too small: {} < {METADATA_BYTES}",
                buf.len()
            )));
        }
        let mut off = 0;
        let version = u32::from_le_bytes(buf[off..off + 4].try_into().unwrap());
        off += 4;
        let mut format = [0u8; MAX_FORMAT_SIZE];
        format.copy_from_slice(&buf[off..off + MAX_FORMAT_SIZE]);
        off += MAX_FORMAT_SIZE;
        let channels = u32::from_le_bytes(buf[off..off + 4].try_into().unwrap());
        off += 4;
        let rate = u32::from_le_bytes(buf[off..off + 4].try_into().unwrap());
        off += 4;
        let frame_size = u32::from_le_bytes(buf[off..off + 4].try_into().unwrap());
        off += 4;
        let period_size = u32::from_le_bytes(buf[off..off + 4].try_into().unwrap());
        off += 4;
        let period_time = u64::from_le_bytes(buf[off..off + 8].try_into().unwrap());
        off += 8;
        let readable = u32::from_le_bytes(buf[off..off + 4].try_into().unwrap());
        off += 4;
        let writable = u32::from_le_bytes(buf[off..off + 4].try_into().unwrap());

        if version != 1 {
            return Err(TransportError::InvalidLayout(format!(
                "unsupported metadata version {version}"
            )));
        }

        Ok(Metadata {
            version,
            format,
            channels,
            rate,
            frame_size,
            period_size,
            period_time,
            readable,
            writable,
        })
    }
}
