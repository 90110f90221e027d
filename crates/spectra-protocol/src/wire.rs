//! Bodies exchanged with the local control plane. Every response carries
//! a logical `result` flag that is independent of the HTTP status; both
//! are checked by the client.

use serde::{Deserialize, Serialize};

use crate::effect::{EffectId, GenericEffect};
use crate::DeviceUid;

/// Discovery endpoint probed before a session exists.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:54235";
/// Route of the handshake POST on the discovery endpoint.
pub const HANDSHAKE_PATH: &str = "spectra";
/// Route of the keep-alive PUT on the session base address.
pub const HEARTBEAT_PATH: &str = "heartbeat";
/// Route for applying and deleting effects by id.
pub const EFFECT_PATH: &str = "effect";

/// Result of the handshake POST. `uri` is the freshly allocated base
/// address every later call must target.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HandshakeResponse {
    pub session: i64,
    pub uri: String,
}

/// Logical-result envelope used by teardown, apply-effect, and
/// delete-effect responses.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ResultBody {
    pub result: bool,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct CreateEffectResponse {
    pub result: bool,
    #[serde(default)]
    pub effect_id: Option<EffectId>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct HeartbeatResponse {
    pub tick: u64,
}

/// Request body for `PUT /effect` and `DELETE /effect`.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct EffectIdBody {
    pub id: EffectId,
}

/// Create-effect body for the generic-device route, which has to name
/// the target device explicitly.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct GenericEffectBody {
    pub device: DeviceUid,
    #[serde(flatten)]
    pub effect: GenericEffect,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handshake_parses() {
        let body: HandshakeResponse =
            serde_json::from_str(r#"{"session":5,"uri":"http://localhost:54236"}"#).unwrap();
        assert_eq!(body.session, 5);
        assert_eq!(body.uri, "http://localhost:54236");
    }

    #[test]
    fn create_response_tolerates_missing_id() {
        let body: CreateEffectResponse = serde_json::from_str(r#"{"result":false}"#).unwrap();
        assert!(!body.result);
        assert!(body.effect_id.is_none());

        let body: CreateEffectResponse = serde_json::from_str(
            r#"{"result":true,"effect_id":"11111111-1111-1111-1111-111111111111"}"#,
        )
        .unwrap();
        assert_eq!(
            body.effect_id,
            Some(EffectId::from_u128(0x11111111_1111_1111_1111_111111111111))
        );
    }

    #[test]
    fn generic_body_flattens_effect() {
        let body = GenericEffectBody {
            device: DeviceUid::from_u128(3),
            effect: GenericEffect::None,
        };
        let json = serde_json::to_value(body).unwrap();
        assert_eq!(json["effect"], "NONE");
        assert!(json["device"].is_string());
    }
}
