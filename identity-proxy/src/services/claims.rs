//! Claim document construction and assertion issuance.
//!
//! The document references organizations and teams by their position in
//! `objects`, so a team's `org` and every `object_roles` entry are indices,
//! never store identifiers.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::models::{Organization, RoleKind, Team, User};
use crate::services::error::ServiceError;
use crate::services::jwt::JwtService;
use crate::services::resolver::{resolve, Resolution};
use crate::services::store::Store;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClaimDocument {
    pub sub: String,
    pub user_data: UserData,
    pub global_roles: Vec<String>,
    pub object_roles: BTreeMap<String, ObjectRoles>,
    pub objects: ClaimObjects,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserData {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_superuser: bool,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ObjectRoles {
    pub content_type: String,
    pub objects: Vec<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ClaimObjects {
    pub organization: Vec<OrgClaim>,
    pub team: Vec<TeamClaim>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrgClaim {
    pub ansible_id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TeamClaim {
    pub ansible_id: String,
    pub name: String,
    /// Index into `objects.organization`.
    pub org: usize,
}

fn indices<T>(items: &[T], index: &HashMap<i64, usize>, id: impl Fn(&T) -> i64) -> Vec<usize> {
    items
        .iter()
        .filter_map(|item| index.get(&id(item)).copied())
        .collect()
}

impl ClaimDocument {
    /// Flatten a resolution. Admin entries come before member entries and the
    /// first occurrence of an object fixes its index.
    pub fn build(user: &User, resolution: &Resolution) -> Self {
        let mut orgs: Vec<&Organization> = Vec::new();
        let mut org_index: HashMap<i64, usize> = HashMap::new();
        for org in resolution
            .admin_orgs
            .iter()
            .chain(&resolution.member_orgs)
            .chain(&resolution.implied_orgs)
        {
            if !org_index.contains_key(&org.id) {
                org_index.insert(org.id, orgs.len());
                orgs.push(org);
            }
        }

        let mut teams: Vec<TeamClaim> = Vec::new();
        let mut team_index: HashMap<i64, usize> = HashMap::new();
        for team in resolution.admin_teams.iter().chain(&resolution.member_teams) {
            if team_index.contains_key(&team.id) {
                continue;
            }
            let Some(org) = org_index.get(&team.organization).copied() else {
                continue;
            };
            team_index.insert(team.id, teams.len());
            teams.push(TeamClaim {
                ansible_id: team.ansible_id.clone(),
                name: team.name.clone(),
                org,
            });
        }

        let org_id = |o: &Organization| o.id;
        let team_id = |t: &Team| t.id;
        let mut object_roles = BTreeMap::new();
        for (role, content_type, objects) in [
            (
                RoleKind::ORGANIZATION_ADMIN,
                "organization",
                indices(&resolution.admin_orgs, &org_index, org_id),
            ),
            (
                RoleKind::ORGANIZATION_MEMBER,
                "organization",
                indices(&resolution.member_orgs, &org_index, org_id),
            ),
            (
                RoleKind::TEAM_ADMIN,
                "team",
                indices(&resolution.admin_teams, &team_index, team_id),
            ),
            (
                RoleKind::TEAM_MEMBER,
                "team",
                indices(&resolution.member_teams, &team_index, team_id),
            ),
        ] {
            if !objects.is_empty() {
                object_roles.insert(
                    role.to_string(),
                    ObjectRoles {
                        content_type: content_type.to_string(),
                        objects,
                    },
                );
            }
        }

        Self {
            sub: user.sub.clone(),
            user_data: UserData {
                username: user.username.clone(),
                first_name: user.first_name.clone(),
                last_name: user.last_name.clone(),
                is_superuser: user.is_superuser,
                email: user.email.clone(),
            },
            global_roles: resolution.global_roles.iter().cloned().collect(),
            object_roles,
            objects: ClaimObjects {
                organization: orgs
                    .into_iter()
                    .map(|o| OrgClaim {
                        ansible_id: o.ansible_id.clone(),
                        name: o.name.clone(),
                    })
                    .collect(),
                team: teams,
            },
        }
    }
}

/// Computes claims from live store state and signs them. Nothing is cached.
#[derive(Clone)]
pub struct ClaimsService {
    store: Arc<Store>,
    jwt: Arc<JwtService>,
}

impl ClaimsService {
    pub fn new(store: Arc<Store>, jwt: Arc<JwtService>) -> Self {
        Self { store, jwt }
    }

    /// Build the claim document for `username`, checking `password` when given.
    pub async fn document_for(
        &self,
        username: &str,
        password: Option<&str>,
    ) -> Result<ClaimDocument, ServiceError> {
        let snapshot = self.store.snapshot().await;

        let user = snapshot
            .user_by_username(username)
            .ok_or(ServiceError::InvalidCredentials)?;
        if let Some(password) = password {
            if !user.password_matches(password) {
                return Err(ServiceError::InvalidCredentials);
            }
        }

        let resolution = resolve(&snapshot, user);
        Ok(ClaimDocument::build(user, &resolution))
    }

    /// Signed identity assertion for `username`.
    ///
    /// Store locks are released before signing.
    pub async fn issue(
        &self,
        username: &str,
        password: Option<&str>,
    ) -> Result<String, ServiceError> {
        let document = self.document_for(username, password).await?;
        Ok(self.jwt.sign(document)?)
    }
}
