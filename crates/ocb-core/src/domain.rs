use std::{fmt, str::FromStr, sync::Arc};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Telegram user id (numeric). This is the chat identity users are resolved by.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub i64);

/// Telegram chat id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatId(pub i64);

/// Telegram message id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageId(pub i32);

/// A stable reference to a sent Telegram message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub chat_id: ChatId,
    pub message_id: MessageId,
}

// ============== Users & permissions ==============

/// Named capability granted to an application user through its role.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Permission {
    View,
    Edit,
    Operate,
    Admin,
}

impl Permission {
    /// Bit used by the platform to encode this permission.
    pub const fn bit(self) -> u32 {
        match self {
            Permission::View => 1,
            Permission::Edit => 2,
            Permission::Operate => 4,
            Permission::Admin => 8,
        }
    }
}

/// Permission set, stored as the platform's bit flags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permissions(pub u32);

impl Permissions {
    pub fn contains(self, permission: Permission) -> bool {
        self.0 & permission.bit() == permission.bit()
    }
}

impl FromIterator<Permission> for Permissions {
    fn from_iter<I: IntoIterator<Item = Permission>>(iter: I) -> Self {
        Permissions(iter.into_iter().fold(0, |acc, p| acc | p.bit()))
    }
}

/// Snapshot of an application account, detached from whatever produced it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AppUser {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub firstname: Option<String>,
    #[serde(default)]
    pub lastname: Option<String>,
    #[serde(default)]
    pub permissions: Permissions,
}

impl AppUser {
    pub fn can(&self, permission: Permission) -> bool {
        self.permissions.contains(permission)
    }
}

/// The user behind an incoming update.
///
/// `Anonymous` stands for "no linked account"; lookups never yield "nothing".
#[derive(Clone, Debug)]
pub enum CurrentUser {
    Anonymous,
    Linked(Arc<AppUser>),
}

impl CurrentUser {
    pub fn is_anonymous(&self) -> bool {
        matches!(self, CurrentUser::Anonymous)
    }

    pub fn is_authenticated(&self) -> bool {
        !self.is_anonymous()
    }

    pub fn can(&self, permission: Permission) -> bool {
        match self {
            CurrentUser::Anonymous => false,
            CurrentUser::Linked(user) => user.can(permission),
        }
    }

    pub fn account(&self) -> Option<&AppUser> {
        match self {
            CurrentUser::Anonymous => None,
            CurrentUser::Linked(user) => Some(user),
        }
    }

    pub fn username(&self) -> Option<&str> {
        self.account().map(|u| u.username.as_str())
    }

    /// First name when known, username otherwise.
    pub fn display_name(&self) -> Option<&str> {
        self.account()
            .map(|u| u.firstname.as_deref().unwrap_or(u.username.as_str()))
    }
}

/// Fields of a user record that this component is allowed to write.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct UserUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telegram_id: Option<i64>,
}

// ============== Ecosystems ==============

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Ecosystem {
    pub uid: String,
    pub name: String,
    /// Whether the ecosystem is switched on.
    pub status: bool,
    #[serde(default)]
    pub connected: bool,
    #[serde(default)]
    pub last_seen: Option<DateTime<Utc>>,
}

/// Which ecosystems a query targets.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EcosystemSelector {
    /// Ecosystems that reported recently.
    Recent,
    Named(Vec<String>),
}

impl EcosystemSelector {
    /// Command arguments name ecosystems; no arguments means "recent".
    pub fn from_args(args: &[String]) -> Self {
        if args.is_empty() {
            EcosystemSelector::Recent
        } else {
            EcosystemSelector::Named(args.to_vec())
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub sensor_uid: String,
    pub measure: String,
    pub value: f64,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Measure {
    pub name: String,
    #[serde(default)]
    pub unit: Option<String>,
}

// ============== Actuators ==============

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActuatorType {
    Light,
    Cooler,
    Heater,
    Humidifier,
    Dehumidifier,
    Fan,
}

impl ActuatorType {
    pub const ALL: [ActuatorType; 6] = [
        ActuatorType::Light,
        ActuatorType::Cooler,
        ActuatorType::Heater,
        ActuatorType::Humidifier,
        ActuatorType::Dehumidifier,
        ActuatorType::Fan,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ActuatorType::Light => "light",
            ActuatorType::Cooler => "cooler",
            ActuatorType::Heater => "heater",
            ActuatorType::Humidifier => "humidifier",
            ActuatorType::Dehumidifier => "dehumidifier",
            ActuatorType::Fan => "fan",
        }
    }

    /// Comma separated list of every valid name.
    pub fn valid_names() -> String {
        Self::ALL.map(Self::name).join(", ")
    }
}

impl fmt::Display for ActuatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ActuatorType {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|a| a.name() == wanted)
            .ok_or(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActuatorMode {
    On,
    Off,
    Automatic,
}

impl ActuatorMode {
    pub fn name(self) -> &'static str {
        match self {
            ActuatorMode::On => "on",
            ActuatorMode::Off => "off",
            ActuatorMode::Automatic => "automatic",
        }
    }
}

impl fmt::Display for ActuatorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ActuatorMode {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "on" => Ok(ActuatorMode::On),
            "off" => Ok(ActuatorMode::Off),
            "automatic" => Ok(ActuatorMode::Automatic),
            _ => Err(()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActuatorState {
    #[serde(rename = "type")]
    pub actuator_type: ActuatorType,
    pub active: bool,
    pub mode: ActuatorMode,
    pub status: bool,
}
