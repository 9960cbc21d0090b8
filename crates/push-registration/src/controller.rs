//! Registration state machine.

use crate::error::{StageError, TransportError};
use crate::executor::RequestExecutor;
use crate::stages::registration::RegistrationInput;
use crate::stages::{checkin, installation, registration};
use crate::transport::{HttpRequest, Transport};
use crate::types::*;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

const EVENT_CAPACITY: usize = 64;

/// Current wall-clock time in milliseconds since the epoch.
pub(crate) fn now_ms() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0)
}

/// A finished request and what it was sent for.
pub(crate) type Completion = (Dispatch, Result<Vec<u8>, TransportError>);

/// What an in-flight request was sent for.
#[derive(Debug)]
pub(crate) enum Dispatch {
    Checkin,
    Installation {
        existing: Option<InstallationRecord>,
    },
    TokenRegistration {
        platform_token: Vec<u8>,
    },
}

impl Dispatch {
    fn stage(&self) -> Stage {
        match self {
            Self::Checkin => Stage::Checkin,
            Self::Installation { .. } => Stage::Installation,
            Self::TokenRegistration { .. } => Stage::TokenRegistration,
        }
    }
}

/// Owns the cached handshake state and decides which stage runs next.
///
/// Every method must be called from a single task; `RegistrationClient`
/// provides that task. A stage success re-drives the handshake with the
/// latest platform token, a stage failure invalidates the state that stage
/// was establishing and stops until the next `register` call.
pub struct RegistrationController {
    config: ServiceConfig,
    system_info: SystemInfo,
    environment: Environment,
    endpoints: Endpoints,
    state: HandshakeState,
    pending: Option<Vec<u8>>,
    executor: RequestExecutor<Dispatch>,
    events: broadcast::Sender<RegistrationEvent>,
}

impl RegistrationController {
    pub fn new(
        config: ServiceConfig,
        environment: Environment,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            config,
            system_info: SystemInfo::default(),
            environment,
            endpoints: Endpoints::default(),
            state: HandshakeState::default(),
            pending: None,
            executor: RequestExecutor::new(transport),
            events,
        }
    }

    pub fn with_system_info(mut self, info: SystemInfo) -> Self {
        self.system_info = info;
        self
    }

    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Restore state persisted from an earlier session.
    pub fn with_state(mut self, state: HandshakeState) -> Self {
        self.state = state;
        self
    }

    pub fn state(&self) -> &HandshakeState {
        &self.state
    }

    pub fn pending_platform_token(&self) -> Option<&[u8]> {
        self.pending.as_deref()
    }

    pub fn is_in_flight(&self) -> bool {
        self.executor.is_in_flight()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RegistrationEvent> {
        self.events.subscribe()
    }

    pub(crate) fn event_sender(&self) -> broadcast::Sender<RegistrationEvent> {
        self.events.clone()
    }

    /// Replace the device metadata used by subsequent requests.
    pub fn set_system_info(&mut self, info: SystemInfo) {
        self.system_info = info;
    }

    /// Record `platform_token` as the latest token and advance the handshake.
    ///
    /// While a request is in flight this only replaces the pending token;
    /// the completion of that request picks it up.
    pub fn register(&mut self, platform_token: Vec<u8>) {
        self.pending = Some(platform_token);
        self.advance();
    }

    /// Re-drive the handshake with the pending token, if there is one.
    pub fn resume(&mut self) {
        self.advance();
    }

    /// Wait for the in-flight request and apply its outcome.
    ///
    /// Returns `false` immediately when nothing is in flight.
    pub async fn process_completion(&mut self) -> bool {
        match self.wait_completion().await {
            Some(completion) => {
                self.apply_completion(completion);
                true
            }
            None => false,
        }
    }

    /// Wait for the in-flight request without applying its outcome. Cancel safe.
    pub(crate) async fn wait_completion(&mut self) -> Option<Completion> {
        self.executor.completion().await
    }

    pub(crate) fn apply_completion(&mut self, (dispatch, result): Completion) {
        self.complete(dispatch, result);
    }

    fn advance(&mut self) {
        let Some(platform_token) = self.pending.clone() else {
            return;
        };
        if self.executor.is_in_flight() {
            debug!("Request in flight, pending token updated");
            return;
        }

        let now = now_ms();
        if let Some(record) = self.state.checkin.as_mut() {
            if record.timestamp.is_some() && !record.is_valid_at(now) {
                info!(device_id = record.device_id, "Check-in expired");
                record.timestamp = None;
            }
        }

        let has_checkin = self
            .state
            .checkin
            .as_ref()
            .is_some_and(|c| c.timestamp.is_some());
        let has_auth_token = self
            .state
            .installation
            .as_ref()
            .is_some_and(InstallationRecord::has_auth_token);

        let dispatch = if !has_checkin {
            Dispatch::Checkin
        } else if !has_auth_token {
            Dispatch::Installation {
                existing: self.state.installation.clone(),
            }
        } else {
            Dispatch::TokenRegistration { platform_token }
        };

        match self.build_request(&dispatch) {
            Ok(request) => {
                debug!(stage = %dispatch.stage(), "Starting stage");
                self.executor.dispatch(dispatch, request);
            }
            Err(e) => self.fail(dispatch.stage(), e),
        }
    }

    fn build_request(&self, dispatch: &Dispatch) -> Result<HttpRequest, StageError> {
        match dispatch {
            Dispatch::Checkin => checkin::build_request(
                &self.endpoints.checkin_url,
                &self.system_info,
                self.state.checkin.as_ref(),
            ),
            Dispatch::Installation { existing } => {
                installation::build_request(&self.endpoints, &self.config, existing.as_ref())
            }
            Dispatch::TokenRegistration { platform_token } => {
                registration::build_request(RegistrationInput {
                    url: &self.endpoints.register_url,
                    config: &self.config,
                    info: &self.system_info,
                    environment: self.environment,
                    checkin: self.state.checkin.as_ref(),
                    installation: self.state.installation.as_ref(),
                    platform_token,
                })
            }
        }
    }

    fn complete(&mut self, dispatch: Dispatch, result: Result<Vec<u8>, TransportError>) {
        let stage = dispatch.stage();
        let body = match result {
            Ok(body) => body,
            Err(e) => return self.fail(stage, e.into()),
        };

        match dispatch {
            Dispatch::Checkin => match checkin::parse_response(&body) {
                Ok(record) => {
                    info!(device_id = record.device_id, "Check-in complete");
                    if record.timestamp.is_none() {
                        warn!(
                            device_id = record.device_id,
                            "Check-in response has no time_msec, record is already expired"
                        );
                    }
                    self.state.checkin = Some(record.clone());
                    self.emit(RegistrationEvent::CheckinUpdated(record));
                    self.advance();
                }
                Err(e) => self.fail(stage, e),
            },
            Dispatch::Installation { existing } => {
                match installation::parse_response(&body, existing.as_ref()) {
                    Ok(record) => {
                        info!(fid = %record.app_instance_id, "Installation auth token obtained");
                        self.state.installation = Some(record.clone());
                        self.emit(RegistrationEvent::InstallationUpdated(record));
                        self.advance();
                    }
                    Err(e) => self.fail(stage, e),
                }
            }
            Dispatch::TokenRegistration { platform_token } => {
                match registration::parse_response(&body) {
                    Ok(push_token) => {
                        info!("Push token registered");
                        self.state.push_token = Some(push_token.clone());
                        let settled = self.pending.as_deref() == Some(platform_token.as_slice());
                        self.emit(RegistrationEvent::PushTokenUpdated {
                            push_token,
                            platform_token,
                        });
                        if settled {
                            self.pending = None;
                        } else {
                            debug!("Platform token changed during registration");
                            self.advance();
                        }
                    }
                    Err(e) => self.fail(stage, e),
                }
            }
        }
    }

    /// Invalidate what `stage` was trying to establish. No retry is scheduled.
    fn fail(&mut self, stage: Stage, error: StageError) {
        warn!(stage = %stage, error = %error, "Stage failed");

        match stage {
            Stage::Checkin => {
                self.state.checkin = None;
            }
            Stage::Installation => {
                if let Some(record) = self.state.checkin.as_mut() {
                    record.timestamp = None;
                }
                self.state.installation = None;
            }
            Stage::TokenRegistration => {
                if let Some(record) = self.state.installation.as_mut() {
                    record.auth_token = None;
                }
            }
        }
    }

    fn emit(&self, event: RegistrationEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}
