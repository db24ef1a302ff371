use cammap_capture::Device;
use cammap_data::requirements::{ASPECT_RATIO_NAMES, FLASH_NAMES, PORTRAIT_NAMES};
use cammap_data::{CommandCatalogue, ItemKind};
use tracing::{error, info, warn};

use crate::checkpoint;
use crate::error::MapperError;
use crate::mapping;
use crate::session::SessionContext;

/// The exploration states. Linear flow with one bounded retry loop
/// (`CameraOpen` ⇄ `CameraAppCheck`) and `GeneralError` as the terminal
/// sink reachable from every non-terminal state after `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    DeviceConnection,
    CameraOpen,
    CameraAppCheck,
    ScreenCapture,
    BasicMapping,
    AspectRatioMapping,
    FlashMapping,
    PortraitMapping,
    Finished,
    GeneralError,
}

impl State {
    pub fn is_terminal(&self) -> bool {
        matches!(self, State::Finished | State::GeneralError)
    }

    /// Checkpoint step index of a mapping state.
    fn step_index(&self) -> Option<u32> {
        match self {
            State::BasicMapping => Some(0),
            State::AspectRatioMapping => Some(1),
            State::FlashMapping => Some(2),
            State::PortraitMapping => Some(3),
            _ => None,
        }
    }
}

/// The driver. Repeatedly computes the next state from pure guards and
/// fires entry actions until a terminal state is reached. Guards never
/// mutate; all catalogue and session mutation happens in entry actions,
/// plus `ScreenCapture`'s exit action.
pub struct Explorer {
    session: SessionContext,
    state: State,
}

impl Explorer {
    pub fn new(session: SessionContext) -> Self {
        Self {
            session,
            state: State::Idle,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Drive the machine to completion. Returns the accumulated
    /// catalogue from a clean `Finished`, or the recorded session error
    /// after a best-effort camera-app close.
    pub async fn run(mut self) -> Result<CommandCatalogue, MapperError> {
        while !self.state.is_terminal() {
            self.step().await;
        }
        match (self.state, self.session.error.take()) {
            (State::Finished, None) => Ok(self.session.catalogue),
            // A failed save action in `Finished` surfaces as the run
            // error and gets the same device cleanup as the sink.
            (_, err) => {
                let err = err.unwrap_or_else(|| MapperError::Other("unknown error".into()));
                error!("exploration aborted: {}", err);
                if let Err(e) = self.session.device.close_camera_app() {
                    warn!("could not close camera app: {}", e);
                }
                Err(err)
            }
        }
    }

    /// One transition: evaluate guards, run the exit action of the
    /// current state, re-route to the error sink if the exit action
    /// recorded an error, then run the entry action of the new state.
    pub async fn step(&mut self) {
        let mut next = self.next_state();
        self.run_exit_action();
        if self.session.has_error() && next != State::GeneralError {
            next = State::GeneralError;
        }

        info!("{:?} -> {:?}", self.state, next);
        self.state = next;
        if let Err(e) = self.run_entry_action().await {
            self.session.record_error(e);
        }
    }

    /// Pure guard evaluation, in declared priority order. An existing
    /// session error always routes to the sink first.
    fn next_state(&self) -> State {
        let s = &self.session;
        if s.has_error() && self.state != State::Idle {
            return State::GeneralError;
        }
        match self.state {
            State::Idle => State::DeviceConnection,
            State::DeviceConnection => {
                if s.properties.is_some() {
                    State::CameraOpen
                } else {
                    State::GeneralError
                }
            }
            State::CameraOpen => State::CameraAppCheck,
            State::CameraAppCheck => {
                if s.camera_foregrounded {
                    State::ScreenCapture
                } else {
                    State::CameraOpen
                }
            }
            State::ScreenCapture => State::BasicMapping,
            State::BasicMapping => State::AspectRatioMapping,
            State::AspectRatioMapping => State::FlashMapping,
            State::FlashMapping => State::PortraitMapping,
            State::PortraitMapping => State::Finished,
            State::Finished | State::GeneralError => self.state,
        }
    }

    fn run_exit_action(&mut self) {
        if self.state == State::ScreenCapture {
            if let Err(e) = self.session.capture_and_process() {
                self.session.record_error(e);
            }
        }
    }

    async fn run_entry_action(&mut self) -> Result<(), MapperError> {
        match self.state {
            State::Idle | State::ScreenCapture | State::GeneralError => Ok(()),
            State::DeviceConnection => self.enter_device_connection(),
            State::CameraOpen => {
                self.enter_camera_open()?;
                tokio::time::sleep(self.session.config.camera_open_wait).await;
                Ok(())
            }
            State::CameraAppCheck => self.enter_camera_app_check(),
            State::BasicMapping => {
                if self.should_skip() {
                    return Ok(());
                }
                mapping::mark_basic(&mut self.session)?;
                mapping::map_touch(&mut self.session);
                mapping::label_visual_elements(&mut self.session)?;
                checkpoint::save_step(&mut self.session)
            }
            State::AspectRatioMapping => {
                self.enter_menu_mapping(ItemKind::AspectRatio, ASPECT_RATIO_NAMES)
                    .await
            }
            State::FlashMapping => self.enter_menu_mapping(ItemKind::Flash, FLASH_NAMES).await,
            State::PortraitMapping => {
                self.enter_menu_mapping(ItemKind::Mode, PORTRAIT_NAMES).await
            }
            State::Finished => self.enter_finished(),
        }
    }

    fn enter_device_connection(&mut self) -> Result<(), MapperError> {
        let address = self.session.config.device_address.clone();
        let props = self
            .session
            .device
            .connect(&address)
            .map_err(|e| MapperError::Connection(e.to_string()))?;
        self.session.properties = Some(props);
        Ok(())
    }

    /// Bring the camera app to the foreground. An already-foregrounded
    /// app is closed first so every attempt is a clean launch.
    fn enter_camera_open(&mut self) -> Result<(), MapperError> {
        let hint = self.session.config.camera_activity_hint.clone();
        if let Ok(activity) = self.session.device.foreground_activity() {
            if activity.contains(&hint) {
                self.session.device.close_camera_app()?;
            }
        }
        self.session.device.open_camera_app()?;
        Ok(())
    }

    fn enter_camera_app_check(&mut self) -> Result<(), MapperError> {
        self.session.open_attempts += 1;
        let hint = &self.session.config.camera_activity_hint;
        let activity = self.session.device.foreground_activity()?;
        self.session.camera_foregrounded = activity.contains(hint.as_str());
        if self.session.camera_foregrounded {
            info!("camera app foregrounded: {}", activity);
            return Ok(());
        }
        let attempts = self.session.open_attempts;
        warn!(
            "camera app not foregrounded (attempt {}/{}), saw {}",
            attempts, self.session.config.max_open_attempts, activity
        );
        if attempts >= self.session.config.max_open_attempts {
            return Err(MapperError::CameraAppLaunch { attempts });
        }
        Ok(())
    }

    async fn enter_menu_mapping(
        &mut self,
        item: ItemKind,
        patterns: &[&str],
    ) -> Result<(), MapperError> {
        if self.should_skip() {
            return Ok(());
        }
        if !self.session.config.requirements.items.contains(&item) {
            info!("{} not in requirements, skipping", item.label());
        } else {
            mapping::map_menu_feature(&mut self.session, item, patterns).await?;
        }
        checkpoint::save_step(&mut self.session)
    }

    /// True when resuming past this state: its checkpoint was already
    /// written by a previous run.
    fn should_skip(&self) -> bool {
        match self.state.step_index() {
            Some(index) if self.session.step > index => {
                info!("{:?} already checkpointed, skipping", self.state);
                true
            }
            _ => false,
        }
    }

    fn enter_finished(&mut self) -> Result<(), MapperError> {
        checkpoint::save_final(&self.session)?;
        if let Err(e) = self.session.device.close_camera_app() {
            warn!("could not close camera app: {}", e);
        }
        self.session.clean_tmp_dir();
        info!("exploration finished: {} commands", self.session.catalogue.commands.len());
        Ok(())
    }
}
