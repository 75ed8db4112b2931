//! Progress events emitted by a generation run.

use bytes::Bytes;
use serde::Serialize;
use tokio::sync::mpsc;

/// Lifecycle state carried by every event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Processing,
    Success,
    Error,
}

/// One line of the generation stream.
///
/// Optional members are left out of the serialized form when unset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressEvent {
    pub status: EventStatus,
    pub message: String,

    /// Completion percentage, 0-100
    pub progress: u8,

    /// Planned resolutions, on the first event
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolutions: Option<Vec<u8>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_area_km2: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_area_km2: Option<f64>,

    /// Resolution being worked on
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<u8>,

    /// Cells produced by tessellation at `resolution`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cells: Option<usize>,

    /// Cells persisted so far (final total on success)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,

    /// Resolutions that produced cells, on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolutions_created: Option<Vec<u8>>,
}

impl ProgressEvent {
    fn new(status: EventStatus, message: impl Into<String>, progress: u8) -> Self {
        Self {
            status,
            message: message.into(),
            progress: progress.min(100),
            resolutions: None,
            min_area_km2: None,
            max_area_km2: None,
            resolution: None,
            cells: None,
            count: None,
            resolutions_created: None,
        }
    }

    pub fn processing(message: impl Into<String>, progress: u8) -> Self {
        Self::new(EventStatus::Processing, message, progress)
    }

    /// Terminal success event.
    pub fn success(count: usize, resolutions_created: Vec<u8>) -> Self {
        let message = format!(
            "Created {} cells across {} resolutions",
            count,
            resolutions_created.len()
        );
        let mut event = Self::new(EventStatus::Success, message, 100);
        event.count = Some(count);
        event.resolutions_created = Some(resolutions_created);
        event
    }

    /// Terminal error event, keeping the progress reached so far.
    pub fn error(message: impl Into<String>, progress: u8) -> Self {
        Self::new(EventStatus::Error, message, progress)
    }

    pub fn with_plan(mut self, resolutions: Vec<u8>, min_area_km2: f64, max_area_km2: f64) -> Self {
        self.resolutions = Some(resolutions);
        self.min_area_km2 = Some(min_area_km2);
        self.max_area_km2 = Some(max_area_km2);
        self
    }

    pub fn with_resolution(mut self, resolution: u8) -> Self {
        self.resolution = Some(resolution);
        self
    }

    pub fn with_cells(mut self, cells: usize) -> Self {
        self.cells = Some(cells);
        self
    }

    pub fn with_count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }

    /// Whether this event ends the stream.
    pub fn is_terminal(&self) -> bool {
        self.status != EventStatus::Processing
    }

    /// Serialize as one NDJSON line, newline included.
    pub fn to_ndjson(&self) -> Bytes {
        // Plain data with string keys; serialization cannot fail
        let mut line = serde_json::to_vec(self).unwrap_or_default();
        line.push(b'\n');
        Bytes::from(line)
    }
}

// =============================================================================
// Progress Stream
// =============================================================================

/// Receiving end of a generation run.
///
/// Finite and ordered; dropping it tells the producer to stop at its next
/// event.
#[derive(Debug)]
pub struct ProgressStream {
    rx: mpsc::Receiver<ProgressEvent>,
}

impl ProgressStream {
    pub(crate) fn new(rx: mpsc::Receiver<ProgressEvent>) -> Self {
        Self { rx }
    }

    /// Next event, or `None` once the run has finished.
    pub async fn recv(&mut self) -> Option<ProgressEvent> {
        self.rx.recv().await
    }

    /// Drain the stream, returning every event in order.
    pub async fn collect_all(mut self) -> Vec<ProgressEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.recv().await {
            events.push(event);
        }
        events
    }
}
