//! Signed policies for secured Filestack applications

use crate::{ClientError, Result};
use base64::{engine::general_purpose::URL_SAFE, Engine as _};
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Policy describing what a signature authorizes
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    /// Expiration as unix seconds
    pub expiry: i64,
    /// Allowed calls (e.g. `pick`, `read`, `store`, `convert`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,
    /// Regex the external URL must match
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(rename = "maxSize", skip_serializing_if = "Option::is_none")]
    pub max_size: Option<u64>,
    #[serde(rename = "minSize", skip_serializing_if = "Option::is_none")]
    pub min_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,
}

impl Policy {
    /// Policy expiring `seconds` from now
    pub fn expires_in(seconds: i64) -> Self {
        Self {
            expiry: Utc::now().timestamp() + seconds,
            ..Default::default()
        }
    }

    pub fn with_calls<I, S>(mut self, calls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.call = Some(calls.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_handle(mut self, handle: impl Into<String>) -> Self {
        self.handle = Some(handle.into());
        self
    }
}

/// Encoded policy plus its signature
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Security {
    policy: String,
    signature: String,
}

impl Security {
    /// Encode and sign a policy with the application secret
    pub fn new(policy: &Policy, secret: &str) -> Result<Self> {
        let json = serde_json::to_vec(policy)?;
        let encoded = URL_SAFE.encode(json);

        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| ClientError::Security(e.to_string()))?;
        mac.update(encoded.as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());

        Ok(Self {
            policy: encoded,
            signature,
        })
    }

    /// Use a policy/signature pair generated elsewhere (e.g. by a backend)
    pub fn from_parts(policy: impl Into<String>, signature: impl Into<String>) -> Self {
        Self {
            policy: policy.into(),
            signature: signature.into(),
        }
    }

    pub fn policy(&self) -> &str {
        &self.policy
    }

    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// Decode the policy JSON
    pub fn decode_policy(&self) -> Result<Policy> {
        let json = URL_SAFE
            .decode(&self.policy)
            .map_err(|e| ClientError::Security(format!("policy is not base64: {}", e)))?;
        Ok(serde_json::from_slice(&json)?)
    }

    /// `policy`/`signature` pairs for forms and query strings
    pub fn params(&self) -> [(&'static str, &str); 2] {
        [("policy", self.policy.as_str()), ("signature", self.signature.as_str())]
    }

    /// Path segment used by processing URLs
    pub fn path_segment(&self) -> String {
        format!("security=p:{},s:{}", self.policy, self.signature)
    }

    /// Query string suffix used by CDN URLs
    pub fn query_string(&self) -> String {
        format!("policy={}&signature={}", self.policy, self.signature)
    }
}
