//! Best-effort notifications to the upstream service index.
//!
//! Created and deleted users, organizations and teams are mirrored into the
//! upstream's resource registry so it sees the same shared objects the proxy
//! issues claims for. Calls run on spawned tasks and only log failures.

use reqwest::Client;
use serde::Serialize;

use crate::config::ProxyConfig;
use crate::models::{Organization, Team, User};
use crate::proxy::transport::ASSERTION_HEADER;
use crate::services::claims::ClaimsService;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct IndexedResource {
    pub ansible_id: String,
    pub service_id: String,
    pub resource_type: &'static str,
    pub resource_data: ResourceData,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct ResourceData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_superuser: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// `ansible_id` of the owning organization.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

#[derive(Clone)]
pub struct ServiceIndexClient {
    http: Client,
    endpoint: String,
    service_id: String,
    enabled: bool,
    claims: ClaimsService,
}

impl ServiceIndexClient {
    pub fn new(config: &ProxyConfig, claims: ClaimsService) -> Self {
        Self {
            http: Client::new(),
            endpoint: format!(
                "{}{}/service-index/resources/",
                config.upstream.url, config.upstream.api_prefix
            ),
            service_id: config.service_index.service_id.clone(),
            enabled: config.service_index.enabled,
            claims,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn user_resource(&self, user: &User) -> IndexedResource {
        IndexedResource {
            ansible_id: user.sub.clone(),
            service_id: self.service_id.clone(),
            resource_type: "shared.user",
            resource_data: ResourceData {
                username: non_empty(&user.username),
                email: non_empty(&user.email),
                first_name: non_empty(&user.first_name),
                last_name: non_empty(&user.last_name),
                is_superuser: Some(user.is_superuser),
                ..Default::default()
            },
        }
    }

    pub fn organization_resource(&self, org: &Organization) -> IndexedResource {
        IndexedResource {
            ansible_id: org.ansible_id.clone(),
            service_id: self.service_id.clone(),
            resource_type: "shared.organization",
            resource_data: ResourceData {
                name: non_empty(&org.name),
                ..Default::default()
            },
        }
    }

    pub fn team_resource(&self, team: &Team, org: Option<&Organization>) -> IndexedResource {
        IndexedResource {
            ansible_id: team.ansible_id.clone(),
            service_id: self.service_id.clone(),
            resource_type: "shared.team",
            resource_data: ResourceData {
                name: non_empty(&team.name),
                organization: org.map(|o| o.ansible_id.clone()),
                ..Default::default()
            },
        }
    }

    /// Queue a create notification. No-op when disabled or anonymous.
    pub fn notify_created(&self, requester: Option<String>, resource: IndexedResource) {
        let Some(requester) = self.should_notify(requester) else {
            return;
        };
        let client = self.clone();
        tokio::spawn(async move {
            if let Err(e) = client.send_created(&requester, &resource).await {
                tracing::warn!(
                    ansible_id = %resource.ansible_id,
                    error = %e,
                    "Service index create notification failed"
                );
            }
        });
    }

    /// Queue a delete notification. No-op when disabled or anonymous.
    pub fn notify_deleted(&self, requester: Option<String>, ansible_id: String) {
        let Some(requester) = self.should_notify(requester) else {
            return;
        };
        let client = self.clone();
        tokio::spawn(async move {
            if let Err(e) = client.send_deleted(&requester, &ansible_id).await {
                tracing::warn!(
                    ansible_id = %ansible_id,
                    error = %e,
                    "Service index delete notification failed"
                );
            }
        });
    }

    fn should_notify(&self, requester: Option<String>) -> Option<String> {
        if !self.enabled {
            return None;
        }
        if requester.is_none() {
            tracing::debug!("Skipping service index notification without a requester");
        }
        requester
    }

    pub async fn send_created(
        &self,
        requester: &str,
        resource: &IndexedResource,
    ) -> Result<(), anyhow::Error> {
        let token = self.claims.issue(requester, None).await?;

        let response = self
            .http
            .post(&self.endpoint)
            .header(ASSERTION_HEADER, token)
            .json(resource)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("service index returned {}", status);
        }

        tracing::info!(
            ansible_id = %resource.ansible_id,
            resource_type = resource.resource_type,
            "Registered resource with service index"
        );
        Ok(())
    }

    pub async fn send_deleted(&self, requester: &str, ansible_id: &str) -> Result<(), anyhow::Error> {
        let token = self.claims.issue(requester, None).await?;

        let response = self
            .http
            .delete(format!("{}{}/", self.endpoint, ansible_id))
            .header(ASSERTION_HEADER, token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() && status != reqwest::StatusCode::NOT_FOUND {
            anyhow::bail!("service index returned {}", status);
        }

        tracing::info!(ansible_id = %ansible_id, "Removed resource from service index");
        Ok(())
    }
}
