pub mod organization;
pub mod role;
pub mod team;
pub mod user;

pub use organization::{CreateOrganizationRequest, OrgResponse, Organization};
pub use role::{
    AssociateUsersRequest, CreateRoleTeamAssignmentRequest, CreateRoleUserAssignmentRequest,
    ObjectKind, ObjectRef, RoleDefinition, RoleKind, RoleTeamAssignment,
    RoleTeamAssignmentResponse, RoleUserAssignment, RoleUserAssignmentResponse,
};
pub use team::{CreateTeamRequest, Team, TeamResponse};
pub use user::{CreateUserRequest, UpdateUserRequest, User, UserResponse};

use serde::Serialize;

/// `summary_fields` block shared by every shared-resource response.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SummaryFields {
    pub resource: ResourceSummary,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ResourceSummary {
    pub ansible_id: String,
    pub resource_type: &'static str,
}

impl SummaryFields {
    pub fn new(ansible_id: &str, resource_type: &'static str) -> Self {
        Self {
            resource: ResourceSummary {
                ansible_id: ansible_id.to_string(),
                resource_type,
            },
        }
    }
}

/// `{"results": [...]}` list envelope.
#[derive(Debug, Serialize)]
pub struct ListResponse<T> {
    pub results: Vec<T>,
}

impl<T> From<Vec<T>> for ListResponse<T> {
    fn from(results: Vec<T>) -> Self {
        Self { results }
    }
}
