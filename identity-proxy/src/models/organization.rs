use serde::{Deserialize, Serialize};
use validator::Validate;

use super::SummaryFields;

pub const ORGANIZATION_RESOURCE_TYPE: &str = "shared.organization";

#[derive(Debug, Clone, PartialEq)]
pub struct Organization {
    pub id: i64,
    pub ansible_id: String,
    pub name: String,
    /// Short alias used by fixtures (`org1`, `pe`); matched like a name.
    pub code_name: String,
}

impl Organization {
    pub fn answers_to(&self, name: &str) -> bool {
        self.name == name || self.code_name == name
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrganizationRequest {
    #[validate(length(min = 1, message = "Org name can not be blank"))]
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrgResponse {
    pub id: i64,
    pub name: String,
    pub summary_fields: SummaryFields,
}

impl From<&Organization> for OrgResponse {
    fn from(org: &Organization) -> Self {
        Self {
            id: org.id,
            name: org.name.clone(),
            summary_fields: SummaryFields::new(&org.ansible_id, ORGANIZATION_RESOURCE_TYPE),
        }
    }
}
