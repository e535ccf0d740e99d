use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, trace};

use ocb_core::{
    config::Config,
    domain::{
        ActuatorMode, ActuatorState, ActuatorType, AppUser, Ecosystem, EcosystemSelector,
        Measure, SensorReading, UserId, UserUpdate,
    },
    errors::Error,
    ports::{ControlDispatcher, Platform, PlatformSession},
    Result,
};

#[derive(Debug)]
struct Inner {
    base_url: String,
    api_key: Option<String>,
    http: reqwest::Client,
}

impl Inner {
    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.http.request(method, self.url(path));
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder, path: &str) -> Result<Response> {
        trace!(path, "Ouranos request");
        builder
            .send()
            .await
            .map_err(|e| Error::External(format!("ouranos request error ({path}): {e}")))
    }

    /// `None` on 404.
    async fn get_optional<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Option<T>> {
        let resp = self
            .send(self.request(Method::GET, path).query(query), path)
            .await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let resp = check_status(resp, path).await?;
        let value = resp
            .json::<T>()
            .await
            .map_err(|e| Error::External(format!("ouranos json error ({path}): {e}")))?;
        Ok(Some(value))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        self.get_optional(path, query)
            .await?
            .ok_or_else(|| Error::External(format!("ouranos: {path} not found")))
    }

    async fn send_json<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<()> {
        let resp = self
            .send(self.request(method, path).json(body), path)
            .await?;
        check_status(resp, path).await?;
        Ok(())
    }
}

async fn check_status(resp: Response, path: &str) -> Result<Response> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    Err(Error::External(format!(
        "ouranos {path} failed: {status} {}",
        body.chars().take(200).collect::<String>()
    )))
}

fn ecosystems_query(selector: &EcosystemSelector) -> Vec<(&'static str, String)> {
    match selector {
        EcosystemSelector::Recent => vec![("ecosystems_id", "recent".to_string())],
        EcosystemSelector::Named(names) => names.iter().map(|n| ("name", n.clone())).collect(),
    }
}

fn ecosystem_path(ecosystem: &Ecosystem, tail: &str) -> String {
    format!("/api/gaia/ecosystem/u/{}/{tail}", ecosystem.uid)
}

#[derive(Debug, Deserialize)]
struct CurrentData {
    #[serde(default)]
    values: Vec<SensorReading>,
}

#[derive(Debug, Deserialize)]
struct ActuatorsStates {
    #[serde(default)]
    actuators_state: Vec<ActuatorState>,
}

#[derive(Debug, Serialize)]
struct TurnActuator {
    actuator: ActuatorType,
    mode: ActuatorMode,
    countdown: f64,
}

// ============== Platform ==============

/// Entry point of the Ouranos data API.
#[derive(Clone, Debug)]
pub struct HttpPlatform {
    inner: Arc<Inner>,
}

impl HttpPlatform {
    pub fn new(cfg: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(cfg.http_timeout)
            .build()
            .map_err(|e| Error::Config(format!("http client: {e}")))?;
        Ok(Self {
            inner: Arc::new(Inner {
                base_url: cfg.api_url.trim_end_matches('/').to_string(),
                api_key: cfg.api_key.clone(),
                http,
            }),
        })
    }

    /// Control requests go through the same client and credentials.
    pub fn dispatcher(&self) -> HttpDispatcher {
        HttpDispatcher {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[async_trait]
impl Platform for HttpPlatform {
    async fn session(&self) -> Result<Box<dyn PlatformSession>> {
        Ok(Box::new(HttpSession {
            inner: Arc::clone(&self.inner),
        }))
    }
}

/// Per-invocation handle on the Ouranos API.
///
/// Requests share the platform's connection pool; nothing outlives the handle.
pub struct HttpSession {
    inner: Arc<Inner>,
}

#[async_trait]
impl PlatformSession for HttpSession {
    async fn lookup_user(&self, telegram_id: UserId) -> Result<Option<AppUser>> {
        self.inner
            .get_optional(&format!("/api/user/telegram/{}", telegram_id.0), &[])
            .await
    }

    async fn get_user(&self, user_id: i64) -> Result<Option<AppUser>> {
        self.inner
            .get_optional(&format!("/api/user/u/{user_id}"), &[])
            .await
    }

    async fn update_user(&self, user_id: i64, update: UserUpdate) -> Result<()> {
        self.inner
            .send_json(Method::PATCH, &format!("/api/user/u/{user_id}"), &update)
            .await
    }

    async fn get_ecosystems(&self, selector: &EcosystemSelector) -> Result<Vec<Ecosystem>> {
        let found: Option<Vec<Ecosystem>> = self
            .inner
            .get_optional("/api/gaia/ecosystem", &ecosystems_query(selector))
            .await?;
        Ok(found.unwrap_or_default())
    }

    async fn get_ecosystem(&self, name: &str) -> Result<Option<Ecosystem>> {
        let found = self
            .get_ecosystems(&EcosystemSelector::Named(vec![name.to_string()]))
            .await?;
        Ok(found.into_iter().find(|e| e.name == name))
    }

    async fn get_current_sensor_data(&self, ecosystem: &Ecosystem) -> Result<Vec<SensorReading>> {
        let data: Option<CurrentData> = self
            .inner
            .get_optional(&ecosystem_path(ecosystem, "current_data"), &[])
            .await?;
        Ok(data.map(|d| d.values).unwrap_or_default())
    }

    async fn get_actuator_states(&self, ecosystem: &Ecosystem) -> Result<Vec<ActuatorState>> {
        let data: Option<ActuatorsStates> = self
            .inner
            .get_optional(&ecosystem_path(ecosystem, "actuators_state"), &[])
            .await?;
        Ok(data.map(|d| d.actuators_state).unwrap_or_default())
    }

    async fn get_actuator_state(
        &self,
        ecosystem: &Ecosystem,
        actuator: ActuatorType,
    ) -> Result<Option<ActuatorState>> {
        let states = self.get_actuator_states(ecosystem).await?;
        Ok(states.into_iter().find(|s| s.actuator_type == actuator))
    }

    async fn get_measures(&self) -> Result<Vec<Measure>> {
        self.inner.get("/api/gaia/measure", &[]).await
    }
}

// ============== Control ==============

/// Hands actuator requests to Ouranos, which relays them to the ecosystem.
#[derive(Clone, Debug)]
pub struct HttpDispatcher {
    inner: Arc<Inner>,
}

#[async_trait]
impl ControlDispatcher for HttpDispatcher {
    async fn dispatch_control(
        &self,
        ecosystem: &Ecosystem,
        actuator: ActuatorType,
        mode: ActuatorMode,
        countdown: f64,
    ) -> Result<()> {
        let body = TurnActuator {
            actuator,
            mode,
            countdown,
        };
        self.inner
            .send_json(
                Method::POST,
                &ecosystem_path(ecosystem, "turn_actuator"),
                &body,
            )
            .await?;
        debug!(ecosystem = %ecosystem.uid, %actuator, %mode, "Actuator request accepted");
        Ok(())
    }
}
