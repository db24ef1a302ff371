use cammap_capture::DeviceError;
use cammap_vision::ParseError;

/// The single recorded session error. Whatever an entry action raises is
/// stored here and consumed exactly once by the terminal error state.
#[derive(Debug, thiserror::Error)]
pub enum MapperError {
    #[error("device unreachable: {0}")]
    Connection(String),
    #[error("camera app failed to launch after {attempts} attempts")]
    CameraAppLaunch { attempts: u32 },
    #[error("required ui feature '{0}' could not be located")]
    RegionNotFound(String),
    #[error("screen had no usable clickable elements")]
    EmptyScreen,
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("checkpoint persistence failed: {0}")]
    Persistence(String),
    #[error(transparent)]
    Device(#[from] DeviceError),
    #[error("{0}")]
    Other(String),
}

impl From<anyhow::Error> for MapperError {
    fn from(e: anyhow::Error) -> Self {
        MapperError::Other(format!("{e:#}"))
    }
}
