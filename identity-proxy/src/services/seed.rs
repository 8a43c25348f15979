//! Fixture data loaded into the store at startup.

use crate::models::{
    ObjectRef, Organization, RoleDefinition, RoleKind, RoleUserAssignment, Team, User,
};
use crate::services::store::{Table, Tables};

struct OrgFixture {
    id: i64,
    ansible_id: &'static str,
    name: &'static str,
    code_name: &'static str,
}

struct TeamFixture {
    id: i64,
    ansible_id: &'static str,
    name: &'static str,
    org: &'static str,
}

struct UserFixture {
    username: &'static str,
    password: &'static str,
    first_name: &'static str,
    last_name: &'static str,
    email: &'static str,
    is_superuser: bool,
    is_system_auditor: bool,
    sub: &'static str,
    orgs: &'static [&'static str],
    teams: &'static [&'static str],
}

const ORGS: &[OrgFixture] = &[
    OrgFixture {
        id: 1,
        ansible_id: "bc243368-a9d4-4f8f-9ffe-5d2d921fcee0",
        name: "Default",
        code_name: "default",
    },
    OrgFixture {
        id: 2,
        ansible_id: "bc243368-a9d4-4f8f-9ffe-5d2d921fcee1",
        name: "Organization 1",
        code_name: "org1",
    },
    OrgFixture {
        id: 3,
        ansible_id: "bc243368-a9d4-4f8f-9ffe-5d2d921fcee2",
        name: "Organization 2",
        code_name: "org2",
    },
    OrgFixture {
        id: 4,
        ansible_id: "bc243368-a9d4-4f8f-9ffe-5d2d921fcee3",
        name: "system:partner-engineers",
        code_name: "pe",
    },
];

const TEAMS: &[TeamFixture] = &[
    TeamFixture {
        id: 1,
        ansible_id: "34a58292-1e0f-49f0-9383-fb7e63d771aa",
        name: "ateam",
        org: "org2",
    },
    TeamFixture {
        id: 2,
        ansible_id: "34a58292-1e0f-49f0-9383-fb7e63d771ab",
        name: "bteam",
        org: "org1",
    },
    TeamFixture {
        id: 3,
        ansible_id: "34a58292-1e0f-49f0-9383-fb7e63d771ac",
        name: "peteam",
        org: "pe",
    },
];

const USERS: &[UserFixture] = &[
    UserFixture {
        username: "admin",
        password: "admin",
        first_name: "ad",
        last_name: "min",
        email: "admin@example.com",
        is_superuser: true,
        is_system_auditor: true,
        sub: "bc243368-a9d4-4f8f-9ffe-5d2d921fce99",
        orgs: &["default"],
        teams: &[],
    },
    UserFixture {
        username: "notifications_admin",
        password: "redhat",
        first_name: "notifications",
        last_name: "admin",
        email: "notifications_admin@example.com",
        is_superuser: true,
        is_system_auditor: true,
        sub: "bc243368-a9d4-4f8f-9ffe-5d2d921fce98",
        orgs: &["default"],
        teams: &[],
    },
    UserFixture {
        username: "ee_admin",
        password: "redhat",
        first_name: "ee",
        last_name: "admin",
        email: "ee_admin@example.com",
        is_superuser: true,
        is_system_auditor: true,
        sub: "bc243368-a9d4-4f8f-9ffe-5d2d921fce97",
        orgs: &["default"],
        teams: &[],
    },
    UserFixture {
        username: "jdoe",
        password: "redhat",
        first_name: "John",
        last_name: "Doe",
        email: "john.doe@example.com",
        is_superuser: true,
        is_system_auditor: false,
        sub: "bc243368-a9d4-4f8f-9ffe-5d2d921fce96",
        orgs: &["default", "org1", "org2", "pe"],
        teams: &["peteam"],
    },
    UserFixture {
        username: "iqe_normal_user",
        password: "redhat",
        first_name: "iqe",
        last_name: "normal_user",
        email: "iqe_normal_user@example.com",
        is_superuser: false,
        is_system_auditor: false,
        sub: "bc243368-a9d4-4f8f-9ffe-5d2d921fce95",
        orgs: &["default", "org1", "org2"],
        teams: &[],
    },
];

const ROLE_DEFINITIONS: &[(i64, &str, bool, &[&str])] = &[
    (
        1,
        RoleKind::PLATFORM_AUDITOR,
        true,
        &["shared.view_organization", "shared.view_team"],
    ),
    (
        2,
        RoleKind::TEAM_MEMBER,
        false,
        &["shared.member_team", "shared.view_team"],
    ),
    (
        3,
        RoleKind::TEAM_ADMIN,
        false,
        &[
            "shared.change_team",
            "shared.delete_team",
            "shared.member_team",
            "shared.view_team",
        ],
    ),
    (
        4,
        RoleKind::ORGANIZATION_ADMIN,
        true,
        &[
            "shared.change_organization",
            "shared.delete_organization",
            "shared.member_organization",
            "shared.view_organization",
            "shared.add_team",
            "shared.change_team",
            "shared.delete_team",
            "shared.member_team",
            "shared.view_team",
        ],
    ),
    (
        5,
        RoleKind::ORGANIZATION_MEMBER,
        true,
        &["shared.member_organization", "shared.view_organization"],
    ),
];

fn role_id(kind: RoleKind) -> Option<i64> {
    ROLE_DEFINITIONS
        .iter()
        .find(|(_, name, _, _)| RoleKind::from_name(name) == kind)
        .map(|(id, _, _, _)| *id)
}

/// Tables holding the default organizations, teams, users and role
/// definitions, plus the role assignments implied by each user's fixture.
pub fn fixtures() -> Tables {
    let organizations = Table::from_rows(ORGS.iter().map(|o| {
        (
            o.id,
            Organization {
                id: o.id,
                ansible_id: o.ansible_id.to_string(),
                name: o.name.to_string(),
                code_name: o.code_name.to_string(),
            },
        )
    }));

    let teams = Table::from_rows(TEAMS.iter().filter_map(|t| {
        let org = ORGS.iter().find(|o| o.code_name == t.org)?;
        Some((
            t.id,
            Team {
                id: t.id,
                ansible_id: t.ansible_id.to_string(),
                name: t.name.to_string(),
                organization: org.id,
            },
        ))
    }));

    let role_definitions = Table::from_rows(ROLE_DEFINITIONS.iter().map(
        |(id, name, managed, permissions)| {
            (
                *id,
                RoleDefinition {
                    id: *id,
                    name: name.to_string(),
                    managed: *managed,
                    permissions: permissions.iter().map(|p| p.to_string()).collect(),
                },
            )
        },
    ));

    let users = Table::from_rows(USERS.iter().zip(1..).map(|(u, id)| {
        (
            id,
            User {
                id,
                username: u.username.to_string(),
                password: u.password.to_string(),
                first_name: u.first_name.to_string(),
                last_name: u.last_name.to_string(),
                email: u.email.to_string(),
                is_superuser: u.is_superuser,
                sub: u.sub.to_string(),
            },
        )
    }));

    let mut grants: Vec<(i64, i64, Option<ObjectRef>)> = Vec::new();
    for (fixture, user_id) in USERS.iter().zip(1..) {
        if let Some(role) = role_id(RoleKind::OrganizationMember) {
            for code_name in fixture.orgs {
                if let Some(org) = ORGS.iter().find(|o| o.code_name == *code_name) {
                    grants.push((user_id, role, Some(ObjectRef::Organization(org.id))));
                }
            }
        }
        if let Some(role) = role_id(RoleKind::TeamMember) {
            for name in fixture.teams {
                if let Some(team) = TEAMS.iter().find(|t| t.name == *name) {
                    grants.push((user_id, role, Some(ObjectRef::Team(team.id))));
                }
            }
        }
        if fixture.is_system_auditor {
            if let Some(role) = role_id(RoleKind::PlatformAuditor) {
                grants.push((user_id, role, None));
            }
        }
    }

    let user_assignments = Table::from_rows(grants.into_iter().zip(1..).map(
        |((user, role_definition, object), id)| {
            (
                id,
                RoleUserAssignment {
                    id,
                    user,
                    role_definition,
                    object,
                },
            )
        },
    ));

    Tables {
        users,
        organizations,
        teams,
        role_definitions,
        user_assignments,
        team_assignments: Table::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_counts() {
        let tables = fixtures();
        assert_eq!(tables.organizations.len(), 4);
        assert_eq!(tables.teams.len(), 3);
        assert_eq!(tables.users.len(), 5);
        assert_eq!(tables.role_definitions.len(), 5);
        assert!(tables.team_assignments.is_empty());
    }

    #[test]
    fn test_teams_point_at_their_orgs() {
        let tables = fixtures();
        let ateam = tables.teams.values().find(|t| t.name == "ateam").unwrap();
        assert_eq!(ateam.organization, 3);
        let peteam = tables.teams.values().find(|t| t.name == "peteam").unwrap();
        assert_eq!(peteam.organization, 4);
    }

    #[test]
    fn test_system_auditors_hold_platform_auditor() {
        let tables = fixtures();
        let auditors: Vec<&str> = tables
            .user_assignments
            .values()
            .filter(|a| a.role_definition == 1)
            .filter_map(|a| tables.users.get(a.user))
            .map(|u| u.username.as_str())
            .collect();

        assert_eq!(auditors, vec!["admin", "notifications_admin", "ee_admin"]);
    }

    #[test]
    fn test_jdoe_memberships() {
        let tables = fixtures();
        let jdoe = tables.users.values().find(|u| u.username == "jdoe").unwrap();
        let grants: Vec<_> = tables
            .user_assignments
            .values()
            .filter(|a| a.user == jdoe.id)
            .collect();

        assert_eq!(grants.len(), 5);
        assert!(grants
            .iter()
            .any(|a| a.role_definition == 2 && a.object == Some(ObjectRef::Team(3))));
    }
}
