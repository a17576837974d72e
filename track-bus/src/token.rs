use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde::{Deserialize, Serialize};

use crate::error::{BusError, Result};

pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(6 * 60 * 60);

/// Room permissions carried in the `video` claim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoGrant {
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub room_join: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub room: String,
    #[serde(default)]
    pub can_publish: bool,
    #[serde(default)]
    pub can_subscribe: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub can_publish_data: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub iss: String,
    pub sub: String,
    pub nbf: u64,
    pub exp: u64,
    pub jti: String,
    pub video: VideoGrant,
}

/// Builder for the join token presented to the room server.
#[derive(Debug, Clone)]
pub struct AccessToken {
    api_key: String,
    api_secret: String,
    identity: String,
    ttl: Duration,
    grant: VideoGrant,
}

impl AccessToken {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            identity: String::new(),
            ttl: DEFAULT_TOKEN_TTL,
            grant: VideoGrant::default(),
        }
    }

    pub fn identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = identity.into();
        self
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Join `room` with publish, subscribe and data permissions.
    pub fn room_join(mut self, room: impl Into<String>) -> Self {
        self.grant = VideoGrant {
            room_join: true,
            room: room.into(),
            can_publish: true,
            can_subscribe: true,
            can_publish_data: true,
        };
        self
    }

    pub fn claims(&self) -> Result<Claims> {
        if self.api_key.is_empty() || self.api_secret.is_empty() {
            return Err(BusError::connection("api key and secret are required"));
        }
        if self.grant.room_join && self.identity.is_empty() {
            return Err(BusError::connection("identity is required to join a room"));
        }
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| BusError::connection(format!("system clock: {}", e)))?
            .as_secs();
        Ok(Claims {
            iss: self.api_key.clone(),
            sub: self.identity.clone(),
            nbf: now,
            exp: now + self.ttl.as_secs(),
            jti: self.identity.clone(),
            video: self.grant.clone(),
        })
    }

    /// Signs the claims with HS256.
    pub fn to_jwt(&self) -> Result<String> {
        let claims = self.claims()?;
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.api_secret.as_bytes()),
        )
        .map_err(|e| BusError::connection(format!("signing access token: {}", e)))
    }
}

#[cfg(test)]
#[path = "token_test.rs"]
mod token_test;
