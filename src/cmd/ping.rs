use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::server::message::IntoMessage;

/// Liveness probe. Carries no payload.
#[derive(Debug, Serialize, Deserialize)]
pub struct Ping;

impl Ping {
    pub async fn execute(self) -> Result<PingResponse> {
        Ok(PingResponse {
            message: "PONG".to_string(),
        })
    }
}

impl IntoMessage for Ping {
    fn id(&self) -> u32 {
        super::PING_CMD
    }

    fn payload(&self) -> Option<Bytes> {
        None
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PingResponse {
    pub message: String,
}
