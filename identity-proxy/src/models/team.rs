use serde::{Deserialize, Serialize};
use validator::Validate;

use super::SummaryFields;

pub const TEAM_RESOURCE_TYPE: &str = "shared.team";

/// A team always belongs to exactly one organization.
#[derive(Debug, Clone, PartialEq)]
pub struct Team {
    pub id: i64,
    pub ansible_id: String,
    pub name: String,
    pub organization: i64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTeamRequest {
    #[validate(length(min = 1, message = "Team name can not be blank"))]
    pub name: String,
    pub organization: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TeamResponse {
    pub id: i64,
    pub name: String,
    pub organization: i64,
    pub summary_fields: SummaryFields,
}

impl From<&Team> for TeamResponse {
    fn from(team: &Team) -> Self {
        Self {
            id: team.id,
            name: team.name.clone(),
            organization: team.organization,
            summary_fields: SummaryFields::new(&team.ansible_id, TEAM_RESOURCE_TYPE),
        }
    }
}
