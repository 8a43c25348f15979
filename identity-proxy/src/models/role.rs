//! Role definitions and the assignments that grant them.

use serde::{Deserialize, Serialize};

/// Role semantics recognised by the claims resolver, keyed by exact name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoleKind {
    PlatformAuditor,
    TeamMember,
    TeamAdmin,
    OrganizationMember,
    OrganizationAdmin,
    Other,
}

/// Which kind of object an assignment targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Organization,
    Team,
}

impl ObjectKind {
    pub fn content_type(&self) -> &'static str {
        match self {
            ObjectKind::Organization => "shared.organization",
            ObjectKind::Team => "shared.team",
        }
    }

    /// Accepts both the bare (`team`) and namespaced (`shared.team`) forms.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "organization" | "shared.organization" => Some(ObjectKind::Organization),
            "team" | "shared.team" => Some(ObjectKind::Team),
            _ => None,
        }
    }
}

impl RoleKind {
    pub const PLATFORM_AUDITOR: &'static str = "Platform Auditor";
    pub const TEAM_MEMBER: &'static str = "Team Member";
    pub const TEAM_ADMIN: &'static str = "Team Admin";
    pub const ORGANIZATION_MEMBER: &'static str = "Organization Member";
    pub const ORGANIZATION_ADMIN: &'static str = "Organization Admin";

    pub fn from_name(name: &str) -> Self {
        match name {
            Self::PLATFORM_AUDITOR => RoleKind::PlatformAuditor,
            Self::TEAM_MEMBER => RoleKind::TeamMember,
            Self::TEAM_ADMIN => RoleKind::TeamAdmin,
            Self::ORGANIZATION_MEMBER => RoleKind::OrganizationMember,
            Self::ORGANIZATION_ADMIN => RoleKind::OrganizationAdmin,
            _ => RoleKind::Other,
        }
    }

    /// The object kind this role is scoped to. `None` for global roles.
    pub fn object_kind(&self) -> Option<ObjectKind> {
        match self {
            RoleKind::TeamMember | RoleKind::TeamAdmin => Some(ObjectKind::Team),
            RoleKind::OrganizationMember | RoleKind::OrganizationAdmin => {
                Some(ObjectKind::Organization)
            }
            RoleKind::PlatformAuditor | RoleKind::Other => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RoleDefinition {
    pub id: i64,
    pub name: String,
    pub managed: bool,
    pub permissions: Vec<String>,
}

impl RoleDefinition {
    pub fn kind(&self) -> RoleKind {
        RoleKind::from_name(&self.name)
    }
}

/// Typed assignment target. The kind is fixed when the assignment is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectRef {
    Organization(i64),
    Team(i64),
}

impl ObjectRef {
    pub fn new(kind: ObjectKind, id: i64) -> Self {
        match kind {
            ObjectKind::Organization => ObjectRef::Organization(id),
            ObjectKind::Team => ObjectRef::Team(id),
        }
    }

    pub fn kind(&self) -> ObjectKind {
        match self {
            ObjectRef::Organization(_) => ObjectKind::Organization,
            ObjectRef::Team(_) => ObjectKind::Team,
        }
    }

    pub fn id(&self) -> i64 {
        match self {
            ObjectRef::Organization(id) | ObjectRef::Team(id) => *id,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoleUserAssignment {
    pub id: i64,
    pub user: i64,
    pub role_definition: i64,
    pub object: Option<ObjectRef>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoleTeamAssignment {
    pub id: i64,
    pub team: i64,
    pub role_definition: i64,
    pub object: Option<ObjectRef>,
}

#[derive(Debug, Deserialize)]
pub struct CreateRoleUserAssignmentRequest {
    pub user: i64,
    pub role_definition: i64,
    pub object_id: Option<i64>,
    /// Required only for roles whose object kind is not implied by their name.
    pub content_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateRoleTeamAssignmentRequest {
    pub team: i64,
    pub role_definition: i64,
    pub object_id: Option<i64>,
    pub content_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AssociateUsersRequest {
    pub instances: Vec<i64>,
}

#[derive(Debug, Serialize)]
pub struct RoleUserAssignmentResponse {
    pub id: i64,
    pub content_type: Option<&'static str>,
    pub role_definition: i64,
    pub user: i64,
    pub object_id: Option<i64>,
}

impl From<&RoleUserAssignment> for RoleUserAssignmentResponse {
    fn from(a: &RoleUserAssignment) -> Self {
        Self {
            id: a.id,
            content_type: a.object.map(|o| o.kind().content_type()),
            role_definition: a.role_definition,
            user: a.user,
            object_id: a.object.map(|o| o.id()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RoleTeamAssignmentResponse {
    pub id: i64,
    pub content_type: Option<&'static str>,
    pub role_definition: i64,
    pub team: i64,
    pub object_id: Option<i64>,
}

impl From<&RoleTeamAssignment> for RoleTeamAssignmentResponse {
    fn from(a: &RoleTeamAssignment) -> Self {
        Self {
            id: a.id,
            content_type: a.object.map(|o| o.kind().content_type()),
            role_definition: a.role_definition,
            team: a.team,
            object_id: a.object.map(|o| o.id()),
        }
    }
}
