use crate::{Device, DeviceError};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// An in-flight screen recording running on a blocking task.
///
/// `screenrecord` blocks for its whole time limit, so the recording is
/// parked on the blocking pool while the control loop keeps tapping the
/// screen through its own device handle.
pub struct RecordingTask {
    handle: JoinHandle<Result<(), DeviceError>>,
    seconds: u64,
}

/// Start a screen recording of `seconds` on the blocking pool.
pub fn start(device: Arc<dyn Device>, seconds: u64) -> RecordingTask {
    debug!("starting {}s screen recording", seconds);
    let handle = tokio::task::spawn_blocking(move || device.record_screen(seconds));
    RecordingTask { handle, seconds }
}

impl RecordingTask {
    /// Wait for the recording to finish, allowing `margin` beyond its
    /// nominal duration before giving up on the device.
    pub async fn finish(self, margin: Duration) -> Result<(), DeviceError> {
        let budget = Duration::from_secs(self.seconds) + margin;
        match tokio::time::timeout(budget, self.handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => {
                warn!("recording task panicked: {}", join_err);
                Err(DeviceError::CommandFailed(format!(
                    "recording task panicked: {join_err}"
                )))
            }
            Err(_) => Err(DeviceError::RecordingTimeout {
                seconds: budget.as_secs(),
            }),
        }
    }
}
