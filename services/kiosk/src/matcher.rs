//! Face-match capability client

use anyhow::{Context, Result};
use async_trait::async_trait;
use common::Profile;
use serde_json::{Value, json};
use tracing::debug;

/// Identifies the person in a captured still
#[async_trait]
pub trait FaceMatcher: Send + Sync {
    /// `Ok(None)` when the face is not recognized; `Err` when the capability failed
    async fn match_face(&self, image_data_url: &str) -> Result<Option<Profile>>;
}

/// Face matcher backed by the `compare-image` HTTP endpoint
#[derive(Clone)]
pub struct HttpFaceMatcher {
    client: reqwest::Client,
    url: String,
}

impl HttpFaceMatcher {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl FaceMatcher for HttpFaceMatcher {
    async fn match_face(&self, image_data_url: &str) -> Result<Option<Profile>> {
        let response = self
            .client
            .post(&self.url)
            .json(&json!({ "image": image_data_url }))
            .send()
            .await
            .context("Face-match request failed")?;

        let status = response.status();
        let body: Value = response
            .json()
            .await
            .with_context(|| format!("Unreadable face-match reply ({})", status))?;

        parse_match_reply(body)
    }
}

/// Interpret a `compare-image` reply
///
/// A successful reply carries the profile fields at its top level.
pub fn parse_match_reply(body: Value) -> Result<Option<Profile>> {
    if !body.get("success").and_then(Value::as_bool).unwrap_or(false) {
        debug!(
            "Face not matched: {}",
            body.get("message").and_then(serde_json::Value::as_str).unwrap_or("")
        );
        return Ok(None);
    }

    let profile: Profile =
        serde_json::from_value(body).context("Face-match reply is missing profile fields")?;
    Ok(Some(profile))
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::Role;

    #[test]
    fn test_successful_reply_carries_profile() {
        let body = json!({
            "success": true,
            "name": "Asha",
            "email": "asha@example.com",
            "phone_number": "5551234567",
            "designation": "Engineer",
            "photo": "uploads/asha.png",
            "isAdmin": 1,
            "id": 1
        });

        let profile = parse_match_reply(body).unwrap().unwrap();
        assert_eq!(profile.id, 1);
        assert_eq!(profile.phone_number, "5551234567");
        assert_eq!(profile.role, Role::Admin);
        assert_eq!(profile.photo.as_deref(), Some("uploads/asha.png"));
    }

    #[test]
    fn test_unsuccessful_reply_is_no_match() {
        let body = json!({ "success": false, "message": "No matching user found" });
        assert!(parse_match_reply(body).unwrap().is_none());

        assert!(parse_match_reply(json!({})).unwrap().is_none());
    }

    #[test]
    fn test_success_without_profile_is_an_error() {
        assert!(parse_match_reply(json!({ "success": true })).is_err());
    }
}
