//! A single connection attempt
//!
//! Issues one GET (ranged when resuming), streams the body into the
//! working file in fixed-size pieces and reports how far it got. Failures
//! that the retry loop can act on are folded into the report; only local
//! I/O failures escape as errors.

use crate::engine::watchdog::ThroughputWatchdog;
use crate::engine::TransferEngine;
use crate::error::SteadygetError;
use futures::StreamExt;
use reqwest::header::{HeaderMap, ACCEPT_RANGES, RANGE};
use reqwest::StatusCode;
use std::io::SeekFrom;
use steadyget_types::ErrorClass;
use tokio::fs::File;
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tokio::time::timeout;
use tracing::{debug, warn};

/// What one attempt achieved
#[derive(Debug)]
pub struct AttemptReport {
    /// Every declared byte arrived, or the undeclared body ended cleanly
    pub complete: bool,
    pub class: ErrorClass,
    /// Bytes written during this attempt
    pub received: u64,
    /// Response headers, empty if no response arrived
    pub headers: HeaderMap,
}

/// How the body loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamEnd {
    /// The server closed the body
    Natural,
    /// The watchdog hung up on a slow connection
    Stalled,
}

#[derive(Debug, Default)]
struct Progress {
    offset: u64,
    received: u64,
    /// Body length declared for this response
    remaining: Option<u64>,
    headers: HeaderMap,
}

impl TransferEngine {
    /// Run one attempt against the working file
    pub(crate) async fn fetch_once(&mut self, file: &mut File) -> Result<AttemptReport, SteadygetError> {
        let mut progress = Progress::default();
        let result = self.stream_body(file, &mut progress).await;
        file.flush().await?;

        let (complete, class) = match result {
            Ok(end) => {
                let complete = match progress.remaining {
                    Some(len) => progress.received == len,
                    None => end == StreamEnd::Natural,
                };
                let class = if complete {
                    ErrorClass::None
                } else if end == StreamEnd::Stalled || progress.received == 0 {
                    ErrorClass::Soft
                } else {
                    ErrorClass::Transient
                };
                (complete, class)
            }
            Err(e) => match e.class(progress.received) {
                Some(class) => {
                    warn!(
                        "Attempt for {} failed after {} bytes ({}): {}",
                        self.task.url,
                        progress.received,
                        class.label(),
                        e
                    );
                    (false, class)
                }
                None => return Err(e),
            },
        };

        Ok(AttemptReport {
            complete,
            class,
            received: progress.received,
            headers: progress.headers,
        })
    }

    async fn stream_body(
        &mut self,
        file: &mut File,
        progress: &mut Progress,
    ) -> Result<StreamEnd, SteadygetError> {
        let mut offset = self.resume_offset(file).await?;

        let mut request = self.client.get(&self.task.url);
        if offset > 0 {
            debug!("Resuming {} from byte {}", self.task.url, offset);
            request = request.header(RANGE, format!("bytes={}-", offset));
        }

        let wait = self.config.connect_timeout() + self.config.read_timeout();
        let response = timeout(wait, request.send())
            .await
            .map_err(|_| SteadygetError::Timeout)??;

        progress.headers = response.headers().clone();

        let status = response.status();
        if !status.is_success() {
            return Err(SteadygetError::ServerError {
                status: status.as_u16(),
                message: status
                    .canonical_reason()
                    .unwrap_or("unexpected status")
                    .to_string(),
            });
        }

        if !self.resume_learned {
            self.resume_learned = true;
            self.state.can_resume = accepts_ranges(response.headers());
            debug!("{} resumable: {}", self.task.url, self.state.can_resume);
        }

        // A server that ignores ranges cannot resume, whatever it advertises
        if offset > 0 && status != StatusCode::PARTIAL_CONTENT {
            debug!("Server ignored the range request, restarting {}", self.task.url);
            self.state.can_resume = false;
            file.set_len(0).await?;
            offset = 0;
        }
        file.seek(SeekFrom::Start(offset)).await?;

        progress.offset = offset;
        progress.remaining = response.content_length();
        self.state.bytes_downloaded = offset;
        self.state.bytes_total = progress.remaining.map(|len| offset + len);
        self.emit();

        let chunk_size = self.config.chunk_size;
        let mut pending: Vec<u8> = Vec::with_capacity(chunk_size);
        let mut watchdog = ThroughputWatchdog::new(self.config.min_rate);
        let mut stream = response.bytes_stream();

        loop {
            let next = match timeout(self.config.read_timeout(), stream.next()).await {
                Ok(next) => next.map(|r| r.map_err(SteadygetError::from)),
                Err(_) => Some(Err(SteadygetError::Timeout)),
            };

            match next {
                Some(Ok(bytes)) => pending.extend_from_slice(&bytes),
                Some(Err(e)) => {
                    self.write_piece(file, &pending, progress).await?;
                    return Err(e);
                }
                None => {
                    self.write_piece(file, &pending, progress).await?;
                    return Ok(StreamEnd::Natural);
                }
            }

            while pending.len() >= chunk_size {
                let piece: Vec<u8> = pending.drain(..chunk_size).collect();
                self.write_piece(file, &piece, progress).await?;

                if watchdog.is_too_slow(piece.len()) {
                    debug!(
                        "{} fell below {} B/s, dropping the connection",
                        self.task.url, self.config.min_rate
                    );
                    return Ok(StreamEnd::Stalled);
                }
            }
        }
    }

    /// Where the next attempt starts; clears the file when resume is off
    async fn resume_offset(&mut self, file: &mut File) -> Result<u64, SteadygetError> {
        if self.state.can_resume {
            return Ok(file.metadata().await?.len());
        }
        file.set_len(0).await?;
        Ok(0)
    }

    async fn write_piece(
        &mut self,
        file: &mut File,
        piece: &[u8],
        progress: &mut Progress,
    ) -> Result<(), SteadygetError> {
        if piece.is_empty() {
            return Ok(());
        }
        file.write_all(piece).await?;
        progress.received += piece.len() as u64;
        self.state.bytes_downloaded = progress.offset + progress.received;
        self.emit();
        Ok(())
    }
}

fn accepts_ranges(headers: &HeaderMap) -> bool {
    headers
        .get(ACCEPT_RANGES)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim().eq_ignore_ascii_case("bytes"))
        .unwrap_or(false)
}
