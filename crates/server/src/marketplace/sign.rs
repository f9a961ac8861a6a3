//! Request signing for the marketplace Open Platform.
//!
//! Every call carries `partner_id`, `timestamp` and `sign` query parameters.
//! The signature is HMAC-SHA256 over the concatenation
//! `partner_id + path + timestamp [+ access_token + shop_id]`, keyed with the
//! partner key and rendered as lowercase hex. Public endpoints (token
//! exchange) omit the access token and shop id; shop endpoints include both.
//! The order is fixed by the marketplace and must not change.

use hmac::{Hmac, Mac};
use marketsync_core::ShopId;
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;

use super::MarketplaceError;

type HmacSha256 = Hmac<Sha256>;

/// Signs marketplace requests for one partner application.
///
/// Implements `Debug` manually to redact the partner key.
#[derive(Clone)]
pub struct Signer {
    partner_id: i64,
    partner_key: SecretString,
}

impl std::fmt::Debug for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signer")
            .field("partner_id", &self.partner_id)
            .field("partner_key", &"[REDACTED]")
            .finish()
    }
}

impl Signer {
    /// Create a signer for a partner application.
    #[must_use]
    pub const fn new(partner_id: i64, partner_key: SecretString) -> Self {
        Self {
            partner_id,
            partner_key,
        }
    }

    /// The partner ID included in every request.
    #[must_use]
    pub const fn partner_id(&self) -> i64 {
        self.partner_id
    }

    /// Compute the signature for an API path.
    ///
    /// `access_token` and `shop_id` are appended only when present.
    ///
    /// # Errors
    ///
    /// Returns `MarketplaceError::Signing` if the key cannot be used for HMAC.
    pub fn sign(
        &self,
        path: &str,
        timestamp: i64,
        access_token: Option<&str>,
        shop_id: Option<ShopId>,
    ) -> Result<String, MarketplaceError> {
        let base = canonical_string(self.partner_id, path, timestamp, access_token, shop_id);

        let mut mac = HmacSha256::new_from_slice(self.partner_key.expose_secret().as_bytes())
            .map_err(|e| MarketplaceError::Signing(e.to_string()))?;
        mac.update(base.as_bytes());

        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}

fn canonical_string(
    partner_id: i64,
    path: &str,
    timestamp: i64,
    access_token: Option<&str>,
    shop_id: Option<ShopId>,
) -> String {
    let mut base = format!("{partner_id}{path}{timestamp}");
    if let Some(token) = access_token {
        base.push_str(token);
    }
    if let Some(shop_id) = shop_id {
        base.push_str(&shop_id.to_string());
    }
    base
}
