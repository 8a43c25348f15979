//! Role resolution: turns a user's role assignments into the organizations
//! and teams they belong to or administer, plus any global roles.

use std::collections::BTreeSet;

use crate::models::{ObjectRef, Organization, RoleKind, Team, User};
use crate::services::store::Snapshot;

/// Everything a user holds, in assignment order, each list free of repeats.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resolution {
    pub global_roles: BTreeSet<String>,
    pub admin_orgs: Vec<Organization>,
    pub member_orgs: Vec<Organization>,
    /// Organizations reached only because one of the user's teams lives there.
    pub implied_orgs: Vec<Organization>,
    pub admin_teams: Vec<Team>,
    pub member_teams: Vec<Team>,
}

impl Resolution {
    fn holds_team(&self, team_id: i64) -> bool {
        self.admin_teams
            .iter()
            .chain(&self.member_teams)
            .any(|t| t.id == team_id)
    }
}

fn push_org(list: &mut Vec<Organization>, org: &Organization) {
    if !list.iter().any(|o| o.id == org.id) {
        list.push(org.clone());
    }
}

fn push_team(list: &mut Vec<Team>, team: &Team) {
    if !list.iter().any(|t| t.id == team.id) {
        list.push(team.clone());
    }
}

/// Resolve `user` against a consistent snapshot of the store.
///
/// Assignments whose role, team or organization no longer exists are skipped.
pub fn resolve(snapshot: &Snapshot<'_>, user: &User) -> Resolution {
    let mut resolution = Resolution::default();

    for assignment in snapshot.user_assignments.values() {
        if assignment.user != user.id {
            continue;
        }
        let Some(role) = snapshot.role_definitions.get(assignment.role_definition) else {
            tracing::debug!(
                assignment_id = assignment.id,
                role_definition = assignment.role_definition,
                "Skipping assignment with dangling role definition"
            );
            continue;
        };

        match role.kind() {
            RoleKind::PlatformAuditor => {
                resolution.global_roles.insert(role.name.clone());
            }
            kind @ (RoleKind::TeamMember | RoleKind::TeamAdmin) => {
                let Some(ObjectRef::Team(team_id)) = assignment.object else {
                    continue;
                };
                let Some(team) = snapshot.teams.get(team_id) else {
                    continue;
                };
                let Some(org) = snapshot.organizations.get(team.organization) else {
                    continue;
                };

                if kind == RoleKind::TeamAdmin {
                    push_team(&mut resolution.admin_teams, team);
                } else {
                    push_team(&mut resolution.member_teams, team);
                }
                push_org(&mut resolution.implied_orgs, org);
            }
            kind @ (RoleKind::OrganizationMember | RoleKind::OrganizationAdmin) => {
                let Some(ObjectRef::Organization(org_id)) = assignment.object else {
                    continue;
                };
                let Some(org) = snapshot.organizations.get(org_id) else {
                    continue;
                };

                if kind == RoleKind::OrganizationAdmin {
                    push_org(&mut resolution.admin_orgs, org);
                } else {
                    push_org(&mut resolution.member_orgs, org);
                }
            }
            RoleKind::Other => {}
        }
    }

    // Global roles granted to a whole team reach every member.
    for assignment in snapshot.team_assignments.values() {
        if !resolution.holds_team(assignment.team) {
            continue;
        }
        if let Some(role) = snapshot.role_definitions.get(assignment.role_definition) {
            if role.kind() == RoleKind::PlatformAuditor {
                resolution.global_roles.insert(role.name.clone());
            }
        }
    }

    resolution
}
