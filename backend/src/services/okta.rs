use std::time::Duration;

use serde_json::{json, Value};

use crate::config::OktaSettings;

/// Best-effort mirror of owner accounts into an external Okta directory.
/// Every call degrades to `None` when federation is unconfigured, the
/// directory errors, or the bounded timeout elapses; registration and login
/// never block on it.
pub struct OktaDirectory {
    client: reqwest::Client,
    domain: Option<String>,
    api_token: Option<String>,
}

impl OktaDirectory {
    pub fn new(settings: &OktaSettings) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .expect("Failed to build HTTP client for identity federation");

        Self {
            client,
            domain: settings.domain.clone(),
            api_token: settings.api_token.clone(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.credentials().is_some()
    }

    /// Create the user in the external directory, returning its directory id.
    pub async fn provision_user(
        &self,
        email: &str,
        password: &str,
        first_name: &str,
        last_name: &str,
    ) -> Option<String> {
        let (domain, token) = self.credentials()?;

        let payload = json!({
            "profile": {
                "firstName": first_name,
                "lastName": last_name,
                "email": email,
                "login": email,
            },
            "credentials": {
                "password": { "value": password },
            },
        });

        let response = self
            .client
            .post(format!("{}/api/v1/users?activate=true", domain))
            .header("Authorization", format!("SSWS {}", token))
            .json(&payload)
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => {
                let body: Value = resp.json().await.ok()?;
                let id = body.get("id")?.as_str()?.to_string();
                log::info!("Provisioned Okta user {}", id);
                Some(id)
            }
            Ok(resp) => {
                log::warn!(
                    "Unable to provision Okta user {}. Status {}",
                    email,
                    resp.status()
                );
                None
            }
            Err(err) => {
                log::warn!("Okta unreachable while provisioning {}: {}", email, err);
                None
            }
        }
    }

    /// Find or create the directory group for an owner tenant.
    pub async fn ensure_owner_group(&self, company_name: &str) -> Option<String> {
        let (domain, token) = self.credentials()?;
        let normalized_name = format!("fleet-{}", company_name.trim().to_lowercase());

        let search = self
            .client
            .get(format!(
                "{}/api/v1/groups?q={}&limit=1",
                domain, normalized_name
            ))
            .header("Authorization", format!("SSWS {}", token))
            .send()
            .await;

        if let Ok(resp) = search {
            if resp.status().is_success() {
                if let Ok(body) = resp.json::<Value>().await {
                    if let Some(existing) = body.as_array().and_then(|groups| groups.first()) {
                        return existing.get("id")?.as_str().map(|id| id.to_string());
                    }
                }
            }
        }

        let payload = json!({
            "profile": {
                "name": normalized_name,
                "description": format!("Fleet owner group for {}", company_name),
            },
        });

        let response = self
            .client
            .post(format!("{}/api/v1/groups", domain))
            .header("Authorization", format!("SSWS {}", token))
            .json(&payload)
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => {
                let body: Value = resp.json().await.ok()?;
                body.get("id")?.as_str().map(|id| id.to_string())
            }
            Ok(resp) => {
                log::warn!(
                    "Failed to create Okta group for {}. Status {}",
                    company_name,
                    resp.status()
                );
                None
            }
            Err(err) => {
                log::warn!("Okta unreachable for group {}: {}", company_name, err);
                None
            }
        }
    }

    fn credentials(&self) -> Option<(&str, &str)> {
        match (self.domain.as_deref(), self.api_token.as_deref()) {
            (Some(domain), Some(token)) if !domain.is_empty() && !token.is_empty() => {
                Some((domain, token))
            }
            _ => None,
        }
    }
}
