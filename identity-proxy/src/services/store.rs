//! In-memory entity store.
//!
//! Every table sits behind its own `RwLock`. Operations spanning several
//! tables acquire their locks up front in one global order:
//! users, organizations, teams, role_definitions, user_assignments,
//! team_assignments.

use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::{RwLock, RwLockReadGuard};
use uuid::Uuid;

use crate::models::{
    CreateRoleTeamAssignmentRequest, CreateRoleUserAssignmentRequest, CreateTeamRequest,
    CreateUserRequest, ObjectKind, ObjectRef, Organization, RoleDefinition, RoleKind,
    RoleTeamAssignment, RoleUserAssignment, Team, UpdateUserRequest, User,
};
use crate::services::error::ServiceError;

/// Identifier-keyed rows plus the identifiers of every deleted row.
#[derive(Debug, Clone)]
pub struct Table<T> {
    rows: BTreeMap<i64, T>,
    tombstones: BTreeSet<i64>,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
            tombstones: BTreeSet::new(),
        }
    }
}

impl<T> Table<T> {
    pub fn from_rows(rows: impl IntoIterator<Item = (i64, T)>) -> Self {
        Self {
            rows: rows.into_iter().collect(),
            tombstones: BTreeSet::new(),
        }
    }

    pub fn get(&self, id: i64) -> Option<&T> {
        self.rows.get(&id)
    }

    pub fn contains(&self, id: i64) -> bool {
        self.rows.contains_key(&id)
    }

    /// Rows in ascending identifier order.
    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.rows.values()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// One past the highest identifier ever issued, live or deleted.
    pub fn next_id(&self) -> i64 {
        let live = self.rows.keys().next_back().copied();
        let dead = self.tombstones.iter().next_back().copied();
        live.max(dead).map_or(1, |max| max + 1)
    }

    fn get_mut(&mut self, id: i64) -> Option<&mut T> {
        self.rows.get_mut(&id)
    }

    fn insert(&mut self, id: i64, row: T) {
        self.rows.insert(id, row);
    }

    fn remove(&mut self, id: i64) -> Option<T> {
        let row = self.rows.remove(&id)?;
        self.tombstones.insert(id);
        Some(row)
    }

    fn remove_where(&mut self, pred: impl Fn(&T) -> bool) -> Vec<T> {
        let ids: Vec<i64> = self
            .rows
            .iter()
            .filter(|(_, row)| pred(row))
            .map(|(id, _)| *id)
            .collect();
        ids.into_iter().filter_map(|id| self.remove(id)).collect()
    }
}

/// Initial contents for a [`Store`].
#[derive(Debug, Default)]
pub struct Tables {
    pub users: Table<User>,
    pub organizations: Table<Organization>,
    pub teams: Table<Team>,
    pub role_definitions: Table<RoleDefinition>,
    pub user_assignments: Table<RoleUserAssignment>,
    pub team_assignments: Table<RoleTeamAssignment>,
}

/// Consistent read view across every table, held for the duration of a
/// claims computation.
pub struct Snapshot<'a> {
    pub users: RwLockReadGuard<'a, Table<User>>,
    pub organizations: RwLockReadGuard<'a, Table<Organization>>,
    pub teams: RwLockReadGuard<'a, Table<Team>>,
    pub role_definitions: RwLockReadGuard<'a, Table<RoleDefinition>>,
    pub user_assignments: RwLockReadGuard<'a, Table<RoleUserAssignment>>,
    pub team_assignments: RwLockReadGuard<'a, Table<RoleTeamAssignment>>,
}

impl Snapshot<'_> {
    pub fn user_by_username(&self, username: &str) -> Option<&User> {
        self.users.values().find(|u| u.username == username)
    }
}

#[derive(Debug, Default)]
pub struct Store {
    users: RwLock<Table<User>>,
    organizations: RwLock<Table<Organization>>,
    teams: RwLock<Table<Team>>,
    role_definitions: RwLock<Table<RoleDefinition>>,
    user_assignments: RwLock<Table<RoleUserAssignment>>,
    team_assignments: RwLock<Table<RoleTeamAssignment>>,
}

impl From<Tables> for Store {
    fn from(tables: Tables) -> Self {
        Self {
            users: RwLock::new(tables.users),
            organizations: RwLock::new(tables.organizations),
            teams: RwLock::new(tables.teams),
            role_definitions: RwLock::new(tables.role_definitions),
            user_assignments: RwLock::new(tables.user_assignments),
            team_assignments: RwLock::new(tables.team_assignments),
        }
    }
}

fn cascade_team(
    team_id: i64,
    teams: &mut Table<Team>,
    user_assignments: &mut Table<RoleUserAssignment>,
    team_assignments: &mut Table<RoleTeamAssignment>,
) -> Option<Team> {
    let target = Some(ObjectRef::Team(team_id));
    user_assignments.remove_where(|a| a.object == target);
    team_assignments.remove_where(|a| a.team == team_id || a.object == target);
    teams.remove(team_id)
}

/// Work out the typed target of a new assignment.
fn resolve_object(
    role: &RoleDefinition,
    object_id: Option<i64>,
    content_type: Option<&str>,
    organizations: &Table<Organization>,
    teams: &Table<Team>,
) -> Result<Option<ObjectRef>, ServiceError> {
    if role.kind() == RoleKind::PlatformAuditor {
        if object_id.is_some() {
            return Err(ServiceError::InvalidInput(format!(
                "'{}' is a global role and takes no object",
                role.name
            )));
        }
        return Ok(None);
    }

    let declared = content_type
        .map(|raw| {
            ObjectKind::parse(raw)
                .ok_or_else(|| ServiceError::InvalidInput(format!("unknown content_type '{}'", raw)))
        })
        .transpose()?;

    let kind = match (role.kind().object_kind(), declared) {
        (Some(implied), Some(declared)) if implied != declared => {
            return Err(ServiceError::InvalidInput(format!(
                "'{}' only applies to {} objects",
                role.name,
                implied.content_type()
            )));
        }
        (Some(implied), _) => Some(implied),
        (None, declared) => declared,
    };

    match (kind, object_id) {
        (None, None) => Ok(None),
        (None, Some(_)) => Err(ServiceError::InvalidInput(format!(
            "content_type is required to assign '{}' on an object",
            role.name
        ))),
        (Some(_), None) => Err(ServiceError::InvalidInput(format!(
            "object_id is required for '{}'",
            role.name
        ))),
        (Some(kind), Some(id)) => {
            let exists = match kind {
                ObjectKind::Organization => organizations.contains(id),
                ObjectKind::Team => teams.contains(id),
            };
            if !exists {
                return Err(ServiceError::InvalidInput(format!(
                    "{} {} does not exist",
                    kind.content_type(),
                    id
                )));
            }
            Ok(Some(ObjectRef::new(kind, id)))
        }
    }
}

fn grant_user_role(
    assignments: &mut Table<RoleUserAssignment>,
    user: i64,
    role_definition: i64,
    object: Option<ObjectRef>,
) -> (RoleUserAssignment, bool) {
    if let Some(existing) = assignments
        .values()
        .find(|a| a.user == user && a.role_definition == role_definition && a.object == object)
    {
        return (existing.clone(), false);
    }

    let assignment = RoleUserAssignment {
        id: assignments.next_id(),
        user,
        role_definition,
        object,
    };
    assignments.insert(assignment.id, assignment.clone());
    (assignment, true)
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read-lock every table in the global order.
    pub async fn snapshot(&self) -> Snapshot<'_> {
        let users = self.users.read().await;
        let organizations = self.organizations.read().await;
        let teams = self.teams.read().await;
        let role_definitions = self.role_definitions.read().await;
        let user_assignments = self.user_assignments.read().await;
        let team_assignments = self.team_assignments.read().await;

        Snapshot {
            users,
            organizations,
            teams,
            role_definitions,
            user_assignments,
            team_assignments,
        }
    }

    // Users

    pub async fn list_users(&self) -> Vec<User> {
        self.users.read().await.values().cloned().collect()
    }

    pub async fn get_user(&self, id: i64) -> Option<User> {
        self.users.read().await.get(id).cloned()
    }

    pub async fn find_user_by_username(&self, username: &str) -> Option<User> {
        self.users
            .read()
            .await
            .values()
            .find(|u| u.username == username)
            .cloned()
    }

    pub async fn create_user(&self, req: CreateUserRequest) -> Result<User, ServiceError> {
        if req.username.is_empty() {
            return Err(ServiceError::InvalidInput(
                "username can not be blank.".to_string(),
            ));
        }

        let mut users = self.users.write().await;
        if users.values().any(|u| u.username == req.username) {
            return Err(ServiceError::Conflict("User already exists".to_string()));
        }

        let user = User {
            id: users.next_id(),
            username: req.username,
            password: req.password,
            first_name: req.first_name,
            last_name: req.last_name,
            email: req.email,
            is_superuser: req.is_superuser,
            sub: Uuid::new_v4().to_string(),
        };
        users.insert(user.id, user.clone());

        Ok(user)
    }

    pub async fn update_user(
        &self,
        id: i64,
        patch: UpdateUserRequest,
    ) -> Result<User, ServiceError> {
        let mut users = self.users.write().await;

        if let Some(username) = patch.username.as_deref().filter(|u| !u.is_empty()) {
            if users.values().any(|u| u.username == username && u.id != id) {
                return Err(ServiceError::Conflict("User already exists".to_string()));
            }
        }

        let user = users
            .get_mut(id)
            .ok_or_else(|| ServiceError::NotFound("User".to_string()))?;
        patch.apply(user);

        Ok(user.clone())
    }

    /// Remove the user's role assignments, then tombstone the user.
    pub async fn delete_user(&self, id: i64) -> Result<User, ServiceError> {
        let mut users = self.users.write().await;
        let mut user_assignments = self.user_assignments.write().await;

        if !users.contains(id) {
            return Err(ServiceError::NotFound("User".to_string()));
        }

        user_assignments.remove_where(|a| a.user == id);
        users
            .remove(id)
            .ok_or_else(|| ServiceError::NotFound("User".to_string()))
    }

    // Organizations

    pub async fn list_organizations(&self) -> Vec<Organization> {
        self.organizations.read().await.values().cloned().collect()
    }

    pub async fn get_organization(&self, id: i64) -> Option<Organization> {
        self.organizations.read().await.get(id).cloned()
    }

    pub async fn create_organization(&self, name: &str) -> Result<Organization, ServiceError> {
        if name.is_empty() {
            return Err(ServiceError::InvalidInput(
                "Org name can not be blank".to_string(),
            ));
        }

        let mut organizations = self.organizations.write().await;
        if organizations.values().any(|o| o.answers_to(name)) {
            return Err(ServiceError::Conflict(
                "org name is already taken".to_string(),
            ));
        }

        let org = Organization {
            id: organizations.next_id(),
            ansible_id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            code_name: name.to_string(),
        };
        organizations.insert(org.id, org.clone());

        Ok(org)
    }

    /// Delete the organization's teams, then every assignment that targets
    /// the organization, then tombstone the organization.
    pub async fn delete_organization(&self, id: i64) -> Result<Organization, ServiceError> {
        let mut organizations = self.organizations.write().await;
        let mut teams = self.teams.write().await;
        let mut user_assignments = self.user_assignments.write().await;
        let mut team_assignments = self.team_assignments.write().await;

        if !organizations.contains(id) {
            return Err(ServiceError::NotFound("Organization".to_string()));
        }

        let owned: Vec<i64> = teams
            .values()
            .filter(|t| t.organization == id)
            .map(|t| t.id)
            .collect();
        for team_id in owned {
            cascade_team(
                team_id,
                &mut teams,
                &mut user_assignments,
                &mut team_assignments,
            );
        }

        let target = Some(ObjectRef::Organization(id));
        user_assignments.remove_where(|a| a.object == target);
        team_assignments.remove_where(|a| a.object == target);

        organizations
            .remove(id)
            .ok_or_else(|| ServiceError::NotFound("Organization".to_string()))
    }

    // Teams

    pub async fn list_teams(&self) -> Vec<Team> {
        self.teams.read().await.values().cloned().collect()
    }

    pub async fn get_team(&self, id: i64) -> Option<Team> {
        self.teams.read().await.get(id).cloned()
    }

    pub async fn create_team(&self, req: CreateTeamRequest) -> Result<Team, ServiceError> {
        if req.name.is_empty() {
            return Err(ServiceError::InvalidInput(
                "Team name can not be blank".to_string(),
            ));
        }

        let organizations = self.organizations.read().await;
        let mut teams = self.teams.write().await;

        if !organizations.contains(req.organization) {
            return Err(ServiceError::InvalidInput(format!(
                "organization {} does not exist",
                req.organization
            )));
        }
        if teams.values().any(|t| t.name == req.name) {
            return Err(ServiceError::Conflict("Team already exists".to_string()));
        }

        let team = Team {
            id: teams.next_id(),
            ansible_id: Uuid::new_v4().to_string(),
            name: req.name,
            organization: req.organization,
        };
        teams.insert(team.id, team.clone());

        Ok(team)
    }

    /// Remove the team's role assignments, then tombstone the team.
    pub async fn delete_team(&self, id: i64) -> Result<Team, ServiceError> {
        let mut teams = self.teams.write().await;
        let mut user_assignments = self.user_assignments.write().await;
        let mut team_assignments = self.team_assignments.write().await;

        cascade_team(id, &mut teams, &mut user_assignments, &mut team_assignments)
            .ok_or_else(|| ServiceError::NotFound("Team".to_string()))
    }

    /// Grant "Team Member" on the team to each user. Existing grants are reused.
    pub async fn associate_users(
        &self,
        team_id: i64,
        user_ids: &[i64],
    ) -> Result<Vec<RoleUserAssignment>, ServiceError> {
        let users = self.users.read().await;
        let teams = self.teams.read().await;
        let role_definitions = self.role_definitions.read().await;
        let mut user_assignments = self.user_assignments.write().await;

        if !teams.contains(team_id) {
            return Err(ServiceError::NotFound("Team".to_string()));
        }
        let role = role_definitions
            .values()
            .find(|r| r.kind() == RoleKind::TeamMember)
            .ok_or_else(|| ServiceError::NotFound("Team Member role definition".to_string()))?;
        if let Some(missing) = user_ids.iter().find(|id| !users.contains(**id)) {
            return Err(ServiceError::InvalidInput(format!(
                "user {} does not exist",
                missing
            )));
        }

        Ok(user_ids
            .iter()
            .map(|user_id| {
                grant_user_role(
                    &mut user_assignments,
                    *user_id,
                    role.id,
                    Some(ObjectRef::Team(team_id)),
                )
                .0
            })
            .collect())
    }

    // Roles

    pub async fn list_role_definitions(&self) -> Vec<RoleDefinition> {
        self.role_definitions.read().await.values().cloned().collect()
    }

    pub async fn list_user_assignments(&self) -> Vec<RoleUserAssignment> {
        self.user_assignments.read().await.values().cloned().collect()
    }

    pub async fn list_team_assignments(&self) -> Vec<RoleTeamAssignment> {
        self.team_assignments.read().await.values().cloned().collect()
    }

    /// Returns the assignment and whether it was newly created.
    pub async fn create_user_assignment(
        &self,
        req: CreateRoleUserAssignmentRequest,
    ) -> Result<(RoleUserAssignment, bool), ServiceError> {
        let users = self.users.read().await;
        let organizations = self.organizations.read().await;
        let teams = self.teams.read().await;
        let role_definitions = self.role_definitions.read().await;
        let mut user_assignments = self.user_assignments.write().await;

        if !users.contains(req.user) {
            return Err(ServiceError::InvalidInput(format!(
                "user {} does not exist",
                req.user
            )));
        }
        let role = role_definitions.get(req.role_definition).ok_or_else(|| {
            ServiceError::InvalidInput(format!(
                "role definition {} does not exist",
                req.role_definition
            ))
        })?;
        let object = resolve_object(
            role,
            req.object_id,
            req.content_type.as_deref(),
            &organizations,
            &teams,
        )?;

        Ok(grant_user_role(
            &mut user_assignments,
            req.user,
            role.id,
            object,
        ))
    }

    pub async fn delete_user_assignment(&self, id: i64) -> Result<RoleUserAssignment, ServiceError> {
        self.user_assignments
            .write()
            .await
            .remove(id)
            .ok_or_else(|| ServiceError::NotFound("Role user assignment".to_string()))
    }

    /// Returns the assignment and whether it was newly created.
    pub async fn create_team_assignment(
        &self,
        req: CreateRoleTeamAssignmentRequest,
    ) -> Result<(RoleTeamAssignment, bool), ServiceError> {
        let organizations = self.organizations.read().await;
        let teams = self.teams.read().await;
        let role_definitions = self.role_definitions.read().await;
        let mut team_assignments = self.team_assignments.write().await;

        if !teams.contains(req.team) {
            return Err(ServiceError::InvalidInput(format!(
                "team {} does not exist",
                req.team
            )));
        }
        let role = role_definitions.get(req.role_definition).ok_or_else(|| {
            ServiceError::InvalidInput(format!(
                "role definition {} does not exist",
                req.role_definition
            ))
        })?;
        let object = resolve_object(
            role,
            req.object_id,
            req.content_type.as_deref(),
            &organizations,
            &teams,
        )?;

        if let Some(existing) = team_assignments.values().find(|a| {
            a.team == req.team && a.role_definition == role.id && a.object == object
        }) {
            return Ok((existing.clone(), false));
        }

        let assignment = RoleTeamAssignment {
            id: team_assignments.next_id(),
            team: req.team,
            role_definition: role.id,
            object,
        };
        team_assignments.insert(assignment.id, assignment.clone());

        Ok((assignment, true))
    }

    pub async fn delete_team_assignment(&self, id: i64) -> Result<RoleTeamAssignment, ServiceError> {
        self.team_assignments
            .write()
            .await
            .remove(id)
            .ok_or_else(|| ServiceError::NotFound("Role team assignment".to_string()))
    }
}
