//! In-memory port implementations shared by the unit tests.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use serde_json::json;

use crate::{
    auth::UserCache,
    commands::{CommandContext, CommandRegistry, Invocation, Reply, Services},
    domain::{
        ActuatorMode, ActuatorState, ActuatorType, AppUser, ChatId, Ecosystem,
        EcosystemSelector, Measure, MessageId, MessageRef, Permission, Permissions,
        SensorReading, UserId, UserUpdate,
    },
    errors::Error,
    ports::{
        ControlDispatcher, MessagingCapabilities, MessagingPort, Platform, PlatformSession,
        TokenError, TokenVerifier,
    },
    templates::Templates,
    Result,
};

pub fn user(id: i64, username: &str) -> AppUser {
    AppUser {
        id,
        username: username.to_string(),
        firstname: None,
        lastname: None,
        permissions: [Permission::View].into_iter().collect(),
    }
}

pub fn operator(id: i64, username: &str) -> AppUser {
    AppUser {
        permissions: [Permission::View, Permission::Edit, Permission::Operate]
            .into_iter()
            .collect::<Permissions>(),
        ..user(id, username)
    }
}

pub fn ecosystem(uid: &str, name: &str) -> Ecosystem {
    Ecosystem {
        uid: uid.to_string(),
        name: name.to_string(),
        status: true,
        connected: true,
        last_seen: None,
    }
}

pub fn reading(measure: &str, value: f64) -> SensorReading {
    SensorReading {
        sensor_uid: format!("sensor-{measure}"),
        measure: measure.to_string(),
        value,
        timestamp: None,
    }
}

pub fn actuator(actuator_type: ActuatorType, active: bool) -> ActuatorState {
    ActuatorState {
        actuator_type,
        active,
        mode: ActuatorMode::Automatic,
        status: false,
    }
}

pub fn link_claims(sub: &str, user_id: i64) -> serde_json::Map<String, serde_json::Value> {
    let mut claims = serde_json::Map::new();
    claims.insert("sub".to_string(), json!(sub));
    claims.insert("user_id".to_string(), json!(user_id));
    claims
}

// ============== Platform ==============

#[derive(Default)]
struct PlatformData {
    by_telegram: HashMap<i64, AppUser>,
    accounts: HashMap<i64, AppUser>,
    ecosystems: Vec<Ecosystem>,
    recent: Vec<String>,
    readings: HashMap<String, Vec<SensorReading>>,
    actuators: HashMap<String, Vec<ActuatorState>>,
    measures: Vec<Measure>,
}

#[derive(Default)]
struct PlatformInner {
    data: Mutex<PlatformData>,
    calls: Mutex<HashMap<&'static str, usize>>,
    updates: Mutex<Vec<(i64, UserUpdate)>>,
    fail_lookups: Mutex<bool>,
    fail_data: Mutex<bool>,
    sessions_opened: Mutex<usize>,
    sessions_closed: Mutex<usize>,
}

impl PlatformInner {
    fn record(&self, call: &'static str) {
        *self.calls.lock().unwrap().entry(call).or_default() += 1;
    }

    fn data_call(&self, call: &'static str) -> Result<()> {
        self.record(call);
        if *self.fail_data.lock().unwrap() {
            return Err(Error::External(format!("{call} failed")));
        }
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct FakePlatform {
    inner: Arc<PlatformInner>,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account reachable both by Telegram id and by account id.
    pub fn with_user(self, telegram_id: i64, user: AppUser) -> Self {
        {
            let mut data = self.inner.data.lock().unwrap();
            data.accounts.insert(user.id, user.clone());
            data.by_telegram.insert(telegram_id, user);
        }
        self
    }

    /// Account with no Telegram identity yet.
    pub fn with_account(self, user: AppUser) -> Self {
        self.inner
            .data
            .lock()
            .unwrap()
            .accounts
            .insert(user.id, user);
        self
    }

    /// Ecosystem that is also part of the "recent" set.
    pub fn with_ecosystem(self, eco: Ecosystem) -> Self {
        {
            let mut data = self.inner.data.lock().unwrap();
            data.recent.push(eco.name.clone());
            data.ecosystems.push(eco);
        }
        self
    }

    pub fn with_stale_ecosystem(self, eco: Ecosystem) -> Self {
        self.inner.data.lock().unwrap().ecosystems.push(eco);
        self
    }

    pub fn with_readings(self, uid: &str, readings: Vec<SensorReading>) -> Self {
        self.inner
            .data
            .lock()
            .unwrap()
            .readings
            .insert(uid.to_string(), readings);
        self
    }

    pub fn with_actuators(self, uid: &str, states: Vec<ActuatorState>) -> Self {
        self.inner
            .data
            .lock()
            .unwrap()
            .actuators
            .insert(uid.to_string(), states);
        self
    }

    pub fn with_measure(self, name: &str, unit: Option<&str>) -> Self {
        self.inner.data.lock().unwrap().measures.push(Measure {
            name: name.to_string(),
            unit: unit.map(str::to_string),
        });
        self
    }

    pub fn fail_lookups(&self, fail: bool) {
        *self.inner.fail_lookups.lock().unwrap() = fail;
    }

    pub fn fail_data(&self, fail: bool) {
        *self.inner.fail_data.lock().unwrap() = fail;
    }

    pub fn open(&self) -> FakeSession {
        *self.inner.sessions_opened.lock().unwrap() += 1;
        FakeSession {
            inner: Arc::clone(&self.inner),
        }
    }

    pub fn calls(&self, call: &str) -> usize {
        self.inner
            .calls
            .lock()
            .unwrap()
            .get(call)
            .copied()
            .unwrap_or(0)
    }

    /// Calls other than user resolution.
    pub fn data_calls(&self) -> usize {
        self.inner
            .calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _)| **k != "lookup_user")
            .map(|(_, v)| *v)
            .sum()
    }

    pub fn updates(&self) -> Vec<(i64, UserUpdate)> {
        self.inner.updates.lock().unwrap().clone()
    }

    pub fn sessions(&self) -> (usize, usize) {
        (
            *self.inner.sessions_opened.lock().unwrap(),
            *self.inner.sessions_closed.lock().unwrap(),
        )
    }
}

#[async_trait]
impl Platform for FakePlatform {
    async fn session(&self) -> Result<Box<dyn PlatformSession>> {
        Ok(Box::new(self.open()))
    }
}

pub struct FakeSession {
    inner: Arc<PlatformInner>,
}

impl Drop for FakeSession {
    fn drop(&mut self) {
        *self.inner.sessions_closed.lock().unwrap() += 1;
    }
}

#[async_trait]
impl PlatformSession for FakeSession {
    async fn lookup_user(&self, telegram_id: UserId) -> Result<Option<AppUser>> {
        self.inner.record("lookup_user");
        if *self.inner.fail_lookups.lock().unwrap() {
            return Err(Error::External("user store unavailable".to_string()));
        }
        Ok(self
            .inner
            .data
            .lock()
            .unwrap()
            .by_telegram
            .get(&telegram_id.0)
            .cloned())
    }

    async fn get_user(&self, user_id: i64) -> Result<Option<AppUser>> {
        self.inner.data_call("get_user")?;
        Ok(self
            .inner
            .data
            .lock()
            .unwrap()
            .accounts
            .get(&user_id)
            .cloned())
    }

    async fn update_user(&self, user_id: i64, update: UserUpdate) -> Result<()> {
        self.inner.data_call("update_user")?;
        self.inner.updates.lock().unwrap().push((user_id, update));
        Ok(())
    }

    async fn get_ecosystems(&self, selector: &EcosystemSelector) -> Result<Vec<Ecosystem>> {
        self.inner.data_call("get_ecosystems")?;
        let data = self.inner.data.lock().unwrap();
        let wanted: &[String] = match selector {
            EcosystemSelector::Recent => &data.recent,
            EcosystemSelector::Named(names) => names,
        };
        Ok(data
            .ecosystems
            .iter()
            .filter(|e| wanted.contains(&e.name))
            .cloned()
            .collect())
    }

    async fn get_ecosystem(&self, name: &str) -> Result<Option<Ecosystem>> {
        self.inner.data_call("get_ecosystem")?;
        Ok(self
            .inner
            .data
            .lock()
            .unwrap()
            .ecosystems
            .iter()
            .find(|e| e.name == name)
            .cloned())
    }

    async fn get_current_sensor_data(&self, ecosystem: &Ecosystem) -> Result<Vec<SensorReading>> {
        self.inner.data_call("get_current_sensor_data")?;
        Ok(self
            .inner
            .data
            .lock()
            .unwrap()
            .readings
            .get(&ecosystem.uid)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_actuator_states(&self, ecosystem: &Ecosystem) -> Result<Vec<ActuatorState>> {
        self.inner.data_call("get_actuator_states")?;
        Ok(self
            .inner
            .data
            .lock()
            .unwrap()
            .actuators
            .get(&ecosystem.uid)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_actuator_state(
        &self,
        ecosystem: &Ecosystem,
        actuator: ActuatorType,
    ) -> Result<Option<ActuatorState>> {
        self.inner.data_call("get_actuator_state")?;
        Ok(self
            .inner
            .data
            .lock()
            .unwrap()
            .actuators
            .get(&ecosystem.uid)
            .and_then(|states| states.iter().find(|s| s.actuator_type == actuator).cloned()))
    }

    async fn get_measures(&self) -> Result<Vec<Measure>> {
        self.inner.data_call("get_measures")?;
        Ok(self.inner.data.lock().unwrap().measures.clone())
    }
}

// ============== Dispatcher ==============

#[derive(Clone, Debug, PartialEq)]
pub struct Dispatched {
    pub ecosystem: String,
    pub actuator: ActuatorType,
    pub mode: ActuatorMode,
    pub countdown: f64,
}

#[derive(Default)]
pub struct FakeDispatcher {
    sent: Mutex<Vec<Dispatched>>,
    fail: Mutex<bool>,
}

impl FakeDispatcher {
    pub fn sent(&self) -> Vec<Dispatched> {
        self.sent.lock().unwrap().clone()
    }

    pub fn fail(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }
}

#[async_trait]
impl ControlDispatcher for FakeDispatcher {
    async fn dispatch_control(
        &self,
        ecosystem: &Ecosystem,
        actuator: ActuatorType,
        mode: ActuatorMode,
        countdown: f64,
    ) -> Result<()> {
        if *self.fail.lock().unwrap() {
            return Err(Error::External("dispatch_control failed".to_string()));
        }
        self.sent.lock().unwrap().push(Dispatched {
            ecosystem: ecosystem.uid.clone(),
            actuator,
            mode,
            countdown,
        });
        Ok(())
    }
}

// ============== Tokens ==============

#[derive(Default)]
pub struct FakeVerifier {
    tokens: HashMap<String, std::result::Result<serde_json::Map<String, serde_json::Value>, TokenError>>,
}

impl FakeVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accept(mut self, token: &str, claims: serde_json::Map<String, serde_json::Value>) -> Self {
        self.tokens.insert(token.to_string(), Ok(claims));
        self
    }

    pub fn reject(mut self, token: &str, err: TokenError) -> Self {
        self.tokens.insert(token.to_string(), Err(err));
        self
    }
}

impl TokenVerifier for FakeVerifier {
    fn verify(
        &self,
        token: &str,
    ) -> std::result::Result<serde_json::Map<String, serde_json::Value>, TokenError> {
        self.tokens
            .get(token)
            .cloned()
            .unwrap_or_else(|| Err(TokenError::Invalid("malformed".to_string())))
    }
}

// ============== Messaging ==============

pub struct FakeMessenger {
    pub max_len: usize,
    next_id: Mutex<i32>,
    pub sends: Mutex<Vec<(ChatId, bool, String)>>,
}

impl FakeMessenger {
    pub fn new(max_len: usize) -> Self {
        Self {
            max_len,
            next_id: Mutex::new(1),
            sends: Mutex::new(Vec::new()),
        }
    }

    fn push(&self, chat_id: ChatId, html: bool, text: &str) -> MessageRef {
        self.sends
            .lock()
            .unwrap()
            .push((chat_id, html, text.to_string()));
        let mut guard = self.next_id.lock().unwrap();
        let id = *guard;
        *guard += 1;
        MessageRef {
            chat_id,
            message_id: MessageId(id),
        }
    }
}

#[async_trait]
impl MessagingPort for FakeMessenger {
    fn capabilities(&self) -> MessagingCapabilities {
        MessagingCapabilities {
            supports_html: true,
            max_message_len: self.max_len,
        }
    }

    async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<MessageRef> {
        Ok(self.push(chat_id, true, html))
    }

    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<MessageRef> {
        Ok(self.push(chat_id, false, text))
    }
}

// ============== Command harness ==============

pub const BOT_USERNAME: &str = "gaia_bot";

/// Standard registry wired to fakes.
pub struct Harness {
    pub platform: FakePlatform,
    pub dispatcher: Arc<FakeDispatcher>,
    pub services: Services,
    registry: CommandRegistry,
}

impl Harness {
    pub fn new(platform: FakePlatform) -> Self {
        Self::with_verifier(platform, FakeVerifier::new())
    }

    pub fn with_verifier(platform: FakePlatform, verifier: FakeVerifier) -> Self {
        let dispatcher = Arc::new(FakeDispatcher::default());
        let services = Services {
            platform: Arc::new(platform.clone()),
            dispatcher: dispatcher.clone(),
            tokens: Arc::new(verifier),
            templates: Arc::new(Templates::builtin().unwrap()),
            users: UserCache::default(),
            link_token_subject: "link_telegram".to_string(),
        };
        Self {
            platform,
            dispatcher,
            services,
            registry: CommandRegistry::standard(),
        }
    }

    pub fn context<'a>(&'a self, user_id: i64, args: &'a [String]) -> CommandContext<'a> {
        CommandContext {
            services: &self.services,
            chat_id: ChatId(user_id),
            user_id: UserId(user_id),
            args,
        }
    }

    /// Run `text` as if sent by `user_id` in a private chat.
    pub async fn run(&self, user_id: i64, text: &str) -> Reply {
        let invocation =
            Invocation::parse(text, ChatId(user_id), UserId(user_id), Some(BOT_USERNAME)).unwrap();
        self.registry.execute(&self.services, &invocation).await
    }
}
