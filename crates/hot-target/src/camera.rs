//! Frame sources: the [`FrameSource`] trait and an MJPEG-over-HTTP camera.

use std::io::{self, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use image::{ImageFormat, RgbImage};
use log::{debug, info};
use reqwest::blocking::{Client, Response};

/// A reconnectable producer of frames, driven by the capture thread.
///
/// `read_frame` must return within a bounded time even when the device stops
/// sending data, and must return `Ok(None)` promptly once `abort` is set.
pub trait FrameSource: Send + 'static {
    type Frame: Send + Sync + 'static;
    type Error: std::error::Error + Send + Sync + 'static;

    fn connect(&mut self) -> Result<(), Self::Error>;

    /// Next frame, or `None` if none arrived before an abort or a read
    /// timeout. An error means the connection is gone.
    fn read_frame(&mut self, abort: &AtomicBool) -> Result<Option<Self::Frame>, Self::Error>;

    /// Drop the connection. Safe to call when not connected.
    fn release(&mut self);
}

#[derive(thiserror::Error, Debug)]
pub enum CameraError {
    #[error("camera request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("camera stream read failed: {0}")]
    Io(#[from] io::Error),
    #[error("no frame for {0:?}")]
    Stalled(Duration),
    #[error("camera closed the stream")]
    StreamEnded,
    #[error("camera is not connected")]
    NotConnected,
}

/// Axis camera address for an FRC team: `10.TE.AM.11`.
pub fn team_camera_address(team: u16) -> String {
    format!("10.{}.{}.11", team / 100, team % 100)
}

/// Connection parameters for [`MjpegCamera`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CameraSettings {
    pub url: String,
    /// Bounds the TCP connect and the wait for response headers.
    pub connect_timeout: Duration,
    /// Longest `read_frame` waits for new stream bytes before rechecking
    /// the abort flag and the stall deadline.
    pub read_timeout: Duration,
    /// Time without a complete frame after which the stream counts as lost.
    pub stall_timeout: Duration,
}

impl CameraSettings {
    pub fn for_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            connect_timeout: Duration::from_secs(2),
            read_timeout: Duration::from_millis(250),
            stall_timeout: Duration::from_secs(3),
        }
    }
}

/// Largest amount of unterminated JPEG data kept before it is discarded.
const MAX_BUFFERED: usize = 8 * 1024 * 1024;
/// Bytes kept while no SOI marker is in sight, enough for a part header.
const MAX_PART_HEADER: usize = 4 * 1024;
const READ_CHUNK: usize = 16 * 1024;
/// Chunks the body reader may run ahead of `read_frame`.
const CHUNK_QUEUE: usize = 64;

const SOI: [u8; 2] = [0xFF, 0xD8];

/// Cuts JPEG images out of a byte stream.
///
/// A part that declares `Content-Length` is cut at that length, so JPEGs
/// carrying an embedded thumbnail come out whole. Otherwise the image ends at
/// the first EOI marker after its SOI. Multipart boundaries and part headers
/// between images are skipped, so the splitter works on any MJPEG transport.
#[derive(Debug, Default)]
pub struct JpegSplitter {
    buf: Vec<u8>,
    /// Declared length of the part whose body starts at `buf[0]`.
    declared: Option<usize>,
}

impl JpegSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
        if self.buf.len() > MAX_BUFFERED {
            debug!("dropping {} bytes without a complete jpeg", self.buf.len());
            self.clear();
        }
    }

    /// Next complete JPEG, markers included.
    pub fn next_frame(&mut self) -> Option<Vec<u8>> {
        if !self.buf.starts_with(&SOI) {
            let Some(start) = find_marker(&self.buf, 0xD8, 0) else {
                // The tail may hold a part header or half a marker.
                let cut = self.buf.len().saturating_sub(MAX_PART_HEADER);
                self.buf.drain(..cut);
                return None;
            };
            self.declared = content_length(&self.buf[..start]);
            self.buf.drain(..start);
        }

        let end = match self.declared {
            Some(len) => {
                if self.buf.len() < len {
                    return None;
                }
                // Some cameras count the CRLF after the image.
                rfind_marker(&self.buf[..len], 0xD9).map_or(len, |p| p + 2)
            }
            None => find_marker(&self.buf, 0xD9, 2)? + 2,
        };
        self.declared = None;
        Some(self.buf.drain(..end).collect())
    }

    pub fn clear(&mut self) {
        self.buf.clear();
        self.declared = None;
    }

    pub fn buffered(&self) -> usize {
        self.buf.len()
    }
}

fn find_marker(buf: &[u8], code: u8, from: usize) -> Option<usize> {
    buf.get(from..)?
        .windows(2)
        .position(|w| w[0] == 0xFF && w[1] == code)
        .map(|p| p + from)
}

fn rfind_marker(buf: &[u8], code: u8) -> Option<usize> {
    buf.windows(2).rposition(|w| w[0] == 0xFF && w[1] == code)
}

/// `Content-Length` from the part header closest to the image.
fn content_length(header: &[u8]) -> Option<usize> {
    String::from_utf8_lossy(header)
        .lines()
        .rev()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            if !name.trim().eq_ignore_ascii_case("content-length") {
                return None;
            }
            value.trim().parse::<usize>().ok()
        })
        .filter(|len| (4..=MAX_BUFFERED).contains(len))
}

fn is_timeout(err: &io::Error) -> bool {
    if matches!(err.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) {
        return true;
    }
    err.get_ref()
        .and_then(|inner| inner.downcast_ref::<reqwest::Error>())
        .is_some_and(|e| e.is_timeout())
}

/// Response body pumped by a `camera-reader` thread.
///
/// The blocking client applies one timeout to both the header wait and each
/// body read, so the body is read off-thread with that (long) timeout while
/// `read_frame` polls the queue with the short one.
struct BodyReader {
    chunks: Receiver<io::Result<Vec<u8>>>,
    stop: Arc<AtomicBool>,
}

impl BodyReader {
    fn spawn(mut response: Response) -> io::Result<Self> {
        let (tx, chunks) = mpsc::sync_channel(CHUNK_QUEUE);
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        thread::Builder::new()
            .name("camera-reader".into())
            .spawn(move || {
                let mut chunk = vec![0; READ_CHUNK];
                while !flag.load(Ordering::Acquire) {
                    let item = match response.read(&mut chunk) {
                        Ok(0) => break,
                        Ok(n) => Ok(chunk[..n].to_vec()),
                        Err(e) if is_timeout(&e) => continue,
                        Err(e) => Err(e),
                    };
                    let failed = item.is_err();
                    if tx.send(item).is_err() || failed {
                        break;
                    }
                }
            })?;
        Ok(Self { chunks, stop })
    }
}

impl Drop for BodyReader {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
    }
}

/// MJPEG stream served over HTTP, as Axis network cameras do.
pub struct MjpegCamera {
    settings: CameraSettings,
    client: Option<Client>,
    reader: Option<BodyReader>,
    splitter: JpegSplitter,
}

impl MjpegCamera {
    pub fn new(settings: CameraSettings) -> Self {
        Self {
            settings,
            client: None,
            reader: None,
            splitter: JpegSplitter::new(),
        }
    }

    pub fn settings(&self) -> &CameraSettings {
        &self.settings
    }

    pub fn is_connected(&self) -> bool {
        self.reader.is_some()
    }

    fn client(&mut self) -> Result<&Client, CameraError> {
        if self.client.is_none() {
            let wait = self.settings.connect_timeout.max(self.settings.read_timeout);
            let client = Client::builder()
                .connect_timeout(self.settings.connect_timeout)
                .timeout(wait)
                .no_proxy()
                .build()?;
            self.client = Some(client);
        }
        self.client.as_ref().ok_or(CameraError::NotConnected)
    }
}

impl FrameSource for MjpegCamera {
    type Frame = RgbImage;
    type Error = CameraError;

    fn connect(&mut self) -> Result<(), CameraError> {
        self.release();
        info!("connecting to camera at {}", self.settings.url);
        let url = self.settings.url.clone();
        let response = self.client()?.get(url).send()?.error_for_status()?;
        self.reader = Some(BodyReader::spawn(response)?);
        info!("connected to camera");
        Ok(())
    }

    fn read_frame(&mut self, abort: &AtomicBool) -> Result<Option<RgbImage>, CameraError> {
        let reader = self.reader.as_ref().ok_or(CameraError::NotConnected)?;
        let deadline = Instant::now() + self.settings.stall_timeout;
        loop {
            while let Some(jpeg) = self.splitter.next_frame() {
                match image::load_from_memory_with_format(&jpeg, ImageFormat::Jpeg) {
                    Ok(img) => return Ok(Some(img.to_rgb8())),
                    Err(e) => debug!("skipping undecodable frame ({} bytes): {e}", jpeg.len()),
                }
            }
            if abort.load(Ordering::Acquire) {
                return Ok(None);
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(CameraError::Stalled(self.settings.stall_timeout));
            }
            let wait = self.settings.read_timeout.min(deadline - now);
            match reader.chunks.recv_timeout(wait) {
                Ok(Ok(bytes)) => self.splitter.push(&bytes),
                Ok(Err(e)) => return Err(CameraError::Io(e)),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => return Err(CameraError::StreamEnded),
            }
        }
    }

    fn release(&mut self) {
        if self.reader.take().is_some() {
            info!("disconnected from camera");
        }
        self.splitter.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_jpeg(body: &[u8]) -> Vec<u8> {
        let mut v = vec![0xFF, 0xD8];
        v.extend_from_slice(body);
        v.extend_from_slice(&[0xFF, 0xD9]);
        v
    }

    #[test]
    fn team_numbers_map_to_camera_addresses() {
        assert_eq!(team_camera_address(2084), "10.20.84.11");
        assert_eq!(team_camera_address(254), "10.2.54.11");
        assert_eq!(team_camera_address(9), "10.0.9.11");
    }

    #[test]
    fn splitter_skips_multipart_headers() {
        let a = fake_jpeg(b"first");
        let b = fake_jpeg(b"second");
        let mut s = JpegSplitter::new();
        s.push(b"--myboundary\r\nContent-Type: image/jpeg\r\n\r\n");
        s.push(&a);
        s.push(b"\r\n--myboundary\r\nContent-Type: image/jpeg\r\n\r\n");
        s.push(&b);
        assert_eq!(s.next_frame(), Some(a));
        assert_eq!(s.next_frame(), Some(b));
        assert_eq!(s.next_frame(), None);
    }

    #[test]
    fn splitter_waits_for_split_markers() {
        let jpeg = fake_jpeg(b"payload");
        let mut s = JpegSplitter::new();
        s.push(b"junk\xFF");
        assert_eq!(s.next_frame(), None);
        assert_eq!(s.buffered(), 5);
        s.push(&jpeg[1..jpeg.len() - 1]);
        assert_eq!(s.next_frame(), None);
        s.push(&jpeg[jpeg.len() - 1..]);
        assert_eq!(s.next_frame(), Some(jpeg));
        assert_eq!(s.buffered(), 0);
    }

    fn part(headers: &str, body: &[u8]) -> Vec<u8> {
        let mut v = format!("--myboundary\r\n{headers}\r\n\r\n").into_bytes();
        v.extend_from_slice(body);
        v.extend_from_slice(b"\r\n");
        v
    }

    #[test]
    fn content_length_keeps_embedded_thumbnail() {
        let mut jpeg = vec![0xFF, 0xD8, 0xFF, 0xE9, 0x00, 0x0C];
        jpeg.extend_from_slice(&fake_jpeg(b"thumb"));
        jpeg.extend_from_slice(b"main image");
        jpeg.extend_from_slice(&[0xFF, 0xD9]);
        let next = fake_jpeg(b"next");

        let mut s = JpegSplitter::new();
        let first = part(&format!("Content-Length: {}", jpeg.len()), &jpeg);
        s.push(&first[..20]);
        assert_eq!(s.next_frame(), None);
        s.push(&first[20..40]);
        assert_eq!(s.next_frame(), None);
        s.push(&first[40..]);
        s.push(&part(&format!("content-length:{}", next.len()), &next));
        assert_eq!(s.next_frame(), Some(jpeg));
        assert_eq!(s.next_frame(), Some(next));
        assert_eq!(s.next_frame(), None);
    }

    #[test]
    fn content_length_may_cover_trailing_crlf() {
        let jpeg = fake_jpeg(b"payload");
        let mut s = JpegSplitter::new();
        s.push(&part(&format!("Content-Length: {}", jpeg.len() + 2), &jpeg));
        assert_eq!(s.next_frame(), Some(jpeg));
    }

    #[test]
    fn implausible_content_length_falls_back_to_markers() {
        let jpeg = fake_jpeg(b"payload");
        let mut s = JpegSplitter::new();
        s.push(&part("Content-Length: 0", &jpeg));
        assert_eq!(s.next_frame(), Some(jpeg));
    }

    #[test]
    fn read_without_connection_fails() {
        let mut cam = MjpegCamera::new(CameraSettings::for_url("http://127.0.0.1:9/"));
        let abort = AtomicBool::new(false);
        assert!(matches!(
            cam.read_frame(&abort),
            Err(CameraError::NotConnected)
        ));
        assert!(!cam.is_connected());
        cam.release();
    }

    #[test]
    fn io_timeouts_are_recognized() {
        assert!(is_timeout(&io::Error::from(io::ErrorKind::TimedOut)));
        assert!(is_timeout(&io::Error::from(io::ErrorKind::WouldBlock)));
        assert!(!is_timeout(&io::Error::from(io::ErrorKind::ConnectionReset)));
    }
}
