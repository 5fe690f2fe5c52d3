//! Bot records: the operator's declared exposure for one pair.

use crate::error::CoreError;
use crate::market::Pair;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Bot identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BotId(pub Uuid);

impl BotId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for BotId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for BotId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| CoreError::InvalidBotId(s.to_string()))
    }
}

/// A bot as stored in the bot store.
///
/// `desired_direction` is a signed multiplier of the base leverage:
/// `0` is flat, `1` is fully long, `-0.5` is half short.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bot {
    pub id: BotId,
    pub name: String,
    pub pair: Pair,
    pub desired_direction: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Bot {
    /// Whether the bot wants no exposure.
    pub fn is_flat(&self) -> bool {
        self.desired_direction.is_zero()
    }

    /// Apply a partial update, bumping `updated_at`.
    pub fn apply(&mut self, update: &BotUpdate, now: DateTime<Utc>) {
        if let Some(name) = &update.name {
            self.name = name.clone();
        }
        if let Some(pair) = &update.pair {
            self.pair = pair.clone();
        }
        if let Some(direction) = update.desired_direction {
            self.desired_direction = direction;
        }
        self.updated_at = now;
    }
}

/// Fields accepted when creating a bot.
///
/// New bots always start flat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewBot {
    pub name: String,
    pub pair: Pair,
}

impl NewBot {
    pub fn new(name: impl Into<String>, pair: Pair) -> Self {
        Self {
            name: name.into(),
            pair,
        }
    }

    /// Name and pair are both required.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.name.trim().is_empty() {
            return Err(CoreError::InvalidBotField("name is required".to_string()));
        }
        self.pair.validate()
    }

    /// Materialize into a flat bot.
    pub fn into_bot(self, id: BotId, now: DateTime<Utc>) -> Bot {
        Bot {
            id,
            name: self.name.trim().to_string(),
            pair: self.pair,
            desired_direction: Decimal::ZERO,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update of a bot. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BotUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pair: Option<Pair>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desired_direction: Option<Decimal>,
}

impl BotUpdate {
    pub fn direction(direction: Decimal) -> Self {
        Self {
            desired_direction: Some(direction),
            ..Default::default()
        }
    }

    /// Whether applying this update changes what the reconciler targets.
    pub fn touches_direction(&self) -> bool {
        self.desired_direction.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.pair.is_none() && self.desired_direction.is_none()
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(CoreError::InvalidBotField("name must not be empty".to_string()));
            }
        }
        if let Some(pair) = &self.pair {
            pair.validate()?;
        }
        Ok(())
    }
}
