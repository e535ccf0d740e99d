//! Hexagonal ports: everything this component consumes but does not own.

use async_trait::async_trait;

use crate::{
    domain::{
        ActuatorMode, ActuatorState, ActuatorType, AppUser, ChatId, Ecosystem,
        EcosystemSelector, Measure, MessageRef, SensorReading, UserId, UserUpdate,
    },
    Result,
};

// ============== Data access ==============

/// Entry point of the platform data API.
///
/// Every command invocation opens its own session; sessions are never shared
/// between concurrent invocations and are released when dropped, whatever the
/// exit path.
#[async_trait]
pub trait Platform: Send + Sync {
    async fn session(&self) -> Result<Box<dyn PlatformSession>>;
}

/// A scoped data-access session.
///
/// Values returned by a session are owned snapshots; they stay valid after the
/// session is dropped.
#[async_trait]
pub trait PlatformSession: Send + Sync {
    /// User linked to a Telegram identity, if any.
    async fn lookup_user(&self, telegram_id: UserId) -> Result<Option<AppUser>>;

    async fn get_user(&self, user_id: i64) -> Result<Option<AppUser>>;

    async fn update_user(&self, user_id: i64, update: UserUpdate) -> Result<()>;

    async fn get_ecosystems(&self, selector: &EcosystemSelector) -> Result<Vec<Ecosystem>>;

    async fn get_ecosystem(&self, name: &str) -> Result<Option<Ecosystem>>;

    async fn get_current_sensor_data(&self, ecosystem: &Ecosystem) -> Result<Vec<SensorReading>>;

    async fn get_actuator_states(&self, ecosystem: &Ecosystem) -> Result<Vec<ActuatorState>>;

    async fn get_actuator_state(
        &self,
        ecosystem: &Ecosystem,
        actuator: ActuatorType,
    ) -> Result<Option<ActuatorState>>;

    async fn get_measures(&self) -> Result<Vec<Measure>>;
}

// ============== Control ==============

/// Forwards actuator-control requests to the hardware agents.
///
/// Fire-and-forget: `Ok` means the request was handed over, not that the
/// actuator changed.
#[async_trait]
pub trait ControlDispatcher: Send + Sync {
    async fn dispatch_control(
        &self,
        ecosystem: &Ecosystem,
        actuator: ActuatorType,
        mode: ActuatorMode,
        countdown: f64,
    ) -> Result<()>;
}

// ============== Tokens ==============

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("token invalid: {0}")]
    Invalid(String),
}

/// Verifies signed, time-limited tokens issued by the platform.
///
/// Returns the decoded claims; interpreting them is up to the caller.
pub trait TokenVerifier: Send + Sync {
    fn verify(
        &self,
        token: &str,
    ) -> std::result::Result<serde_json::Map<String, serde_json::Value>, TokenError>;
}

// ============== Messaging ==============

/// Capabilities of a messenger implementation.
#[derive(Clone, Copy, Debug)]
pub struct MessagingCapabilities {
    pub supports_html: bool,
    pub max_message_len: usize,
}

/// Outbound messaging port.
#[async_trait]
pub trait MessagingPort: Send + Sync {
    fn capabilities(&self) -> MessagingCapabilities;

    async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<MessageRef>;
    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<MessageRef>;
}
