//! Async handle running the controller on its own task.

use crate::controller::RegistrationController;
use crate::error::RegistrationError;
use crate::types::{HandshakeState, RegistrationEvent, SystemInfo};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, warn};

enum Command {
    Register(Vec<u8>),
    Resume,
    UpdateSystemInfo(SystemInfo),
    Snapshot(oneshot::Sender<HandshakeState>),
}

/// Cloneable handle to a running registration handshake.
///
/// All state lives on a single driver task. Once every handle is dropped the
/// driver stops, and a request still in flight is abandoned without its
/// completion being applied.
#[derive(Clone)]
pub struct RegistrationClient {
    commands: mpsc::UnboundedSender<Command>,
    events: broadcast::Sender<RegistrationEvent>,
}

impl RegistrationClient {
    /// Move `controller` onto a new tokio task.
    pub fn spawn(controller: RegistrationController) -> Self {
        let (commands, receiver) = mpsc::unbounded_channel();
        let events = controller.event_sender();
        tokio::spawn(drive(controller, receiver));
        Self { commands, events }
    }

    /// Submit the latest platform token. Never blocks.
    pub fn register(&self, platform_token: impl Into<Vec<u8>>) -> Result<(), RegistrationError> {
        self.send(Command::Register(platform_token.into()))
    }

    /// Re-drive the handshake with the last submitted token.
    pub fn resume(&self) -> Result<(), RegistrationError> {
        self.send(Command::Resume)
    }

    pub fn update_system_info(&self, info: SystemInfo) -> Result<(), RegistrationError> {
        self.send(Command::UpdateSystemInfo(info))
    }

    /// Current cached handshake state.
    pub async fn snapshot(&self) -> Result<HandshakeState, RegistrationError> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Snapshot(reply))?;
        response.await.map_err(|_| RegistrationError::Stopped)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RegistrationEvent> {
        self.events.subscribe()
    }

    /// Notifications as a stream. Events dropped by a lagging consumer are skipped.
    pub fn events(&self) -> impl Stream<Item = RegistrationEvent> {
        BroadcastStream::new(self.events.subscribe()).filter_map(|event| match event {
            Ok(event) => Some(event),
            Err(e) => {
                warn!("Event stream lagged: {}", e);
                None
            }
        })
    }

    fn send(&self, command: Command) -> Result<(), RegistrationError> {
        self.commands
            .send(command)
            .map_err(|_| RegistrationError::Stopped)
    }
}

async fn drive(
    mut controller: RegistrationController,
    mut commands: mpsc::UnboundedReceiver<Command>,
) {
    loop {
        tokio::select! {
            // A closed command channel wins over a ready response
            biased;

            command = commands.recv() => match command {
                Some(Command::Register(token)) => controller.register(token),
                Some(Command::Resume) => controller.resume(),
                Some(Command::UpdateSystemInfo(info)) => controller.set_system_info(info),
                Some(Command::Snapshot(reply)) => {
                    let _ = reply.send(controller.state().clone());
                }
                None => break,
            },
            Some(completion) = controller.wait_completion(), if controller.is_in_flight() => {
                if commands.is_closed() {
                    break;
                }
                controller.apply_completion(completion);
            }
        }
    }

    debug!("All registration handles dropped, driver stopped");
}
