//! User authentication

use super::XiamiApi;
use crate::error::{Result, XiamiError};
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

const LOGIN_ACTION: &str = "mtop.alimusic.xuser.facade.xiamiuserservice.login";

/// Authentication data returned by a successful login
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthInfo {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default, deserialize_with = "crate::models::deserialize_opt_id")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub nick_name: Option<String>,
}

/// MD5 hex digest of a clear password, the form the login action expects
pub fn password_digest(password: &str) -> String {
    format!("{:x}", Md5::digest(password.as_bytes()))
}

impl XiamiApi {
    /// Logs in and stores the returned access token
    ///
    /// # Arguments
    ///
    /// * `account` - Email or phone number
    /// * `password_md5` - MD5 digest of the password, see [`password_digest`]
    ///
    /// # Errors
    ///
    /// * `XiamiError::LoginFailed` - The server refused the credentials
    pub fn login(&self, account: &str, password_md5: &str) -> Result<AuthInfo> {
        info!("Attempting to login to Xiami as {}", account);

        let payload = json!({
            "account": account,
            "password": password_md5,
        });
        let response = self.request(LOGIN_ACTION, payload)?;

        if !response.is_success() {
            warn!("Xiami login refused: {}", response.message);
            return Err(XiamiError::LoginFailed(response.message));
        }

        let auth: AuthInfo = serde_json::from_value(response.into_data()?)?;
        debug!("Login successful - User ID: {:?}", auth.user_id);

        self.set_access_token(auth.access_token.clone());
        Ok(auth)
    }

    /// True once an access token is set
    pub fn is_authenticated(&self) -> bool {
        self.access_token().is_some()
    }

    /// Forgets the access token
    pub fn logout(&self) {
        debug!("Logging out");
        self.clear_access_token();
    }
}
