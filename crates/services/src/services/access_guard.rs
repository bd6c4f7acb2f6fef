//! Team-membership checks in front of every board operation.
//!
//! Membership itself lives in a team directory behind [`TeamDirectory`];
//! the guard only turns its answers into allow or deny.

use std::sync::Arc;

use async_trait::async_trait;
use db::models::team_member::{TeamMember, TeamRole};
use sqlx::SqlitePool;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum AccessError {
    #[error("{0}")]
    PermissionDenied(&'static str),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Source of truth for who belongs to which team.
#[async_trait]
pub trait TeamDirectory: Send + Sync {
    /// `None` when the user is not a member.
    async fn role_of(&self, team_id: Uuid, user_id: Uuid) -> Result<Option<TeamRole>, sqlx::Error>;
}

/// Directory backed by the local `team_members` table.
#[derive(Clone)]
pub struct SqliteTeamDirectory {
    pool: SqlitePool,
}

impl SqliteTeamDirectory {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TeamDirectory for SqliteTeamDirectory {
    async fn role_of(&self, team_id: Uuid, user_id: Uuid) -> Result<Option<TeamRole>, sqlx::Error> {
        TeamMember::role_of(&self.pool, team_id, user_id).await
    }
}

#[derive(Clone)]
pub struct BoardAccessGuard {
    directory: Arc<dyn TeamDirectory>,
}

impl BoardAccessGuard {
    pub fn new(directory: Arc<dyn TeamDirectory>) -> Self {
        Self { directory }
    }

    pub fn sqlite(pool: SqlitePool) -> Self {
        Self::new(Arc::new(SqliteTeamDirectory::new(pool)))
    }

    pub async fn is_member(&self, team_id: Uuid, user_id: Uuid) -> Result<bool, AccessError> {
        Ok(self.directory.role_of(team_id, user_id).await?.is_some())
    }

    /// Owner or admin of the team.
    pub async fn has_elevated_role(&self, team_id: Uuid, user_id: Uuid) -> Result<bool, AccessError> {
        Ok(self
            .directory
            .role_of(team_id, user_id)
            .await?
            .is_some_and(TeamRole::is_elevated))
    }

    pub async fn require_member(&self, team_id: Uuid, user_id: Uuid) -> Result<(), AccessError> {
        if self.is_member(team_id, user_id).await? {
            Ok(())
        } else {
            Err(AccessError::PermissionDenied("not a member of this team"))
        }
    }

    pub async fn require_elevated(&self, team_id: Uuid, user_id: Uuid) -> Result<(), AccessError> {
        if self.has_elevated_role(team_id, user_id).await? {
            Ok(())
        } else {
            Err(AccessError::PermissionDenied(
                "only team owners and admins can do this",
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    struct StaticDirectory(HashMap<(Uuid, Uuid), TeamRole>);

    #[async_trait]
    impl TeamDirectory for StaticDirectory {
        async fn role_of(
            &self,
            team_id: Uuid,
            user_id: Uuid,
        ) -> Result<Option<TeamRole>, sqlx::Error> {
            Ok(self.0.get(&(team_id, user_id)).copied())
        }
    }

    fn guard_with(entries: &[(Uuid, Uuid, TeamRole)]) -> BoardAccessGuard {
        let map = entries
            .iter()
            .map(|(team, user, role)| ((*team, *user), *role))
            .collect();
        BoardAccessGuard::new(Arc::new(StaticDirectory(map)))
    }

    #[tokio::test]
    async fn test_membership_gates_access() {
        let team = Uuid::new_v4();
        let member = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        let guard = guard_with(&[(team, member, TeamRole::Member)]);

        assert!(guard.is_member(team, member).await.unwrap());
        assert!(!guard.is_member(team, stranger).await.unwrap());
        assert!(guard.require_member(team, member).await.is_ok());
        assert!(matches!(
            guard.require_member(team, stranger).await,
            Err(AccessError::PermissionDenied(_))
        ));
        // Membership in one team says nothing about another.
        assert!(!guard.is_member(Uuid::new_v4(), member).await.unwrap());
    }

    #[tokio::test]
    async fn test_elevated_role_requires_owner_or_admin() {
        let team = Uuid::new_v4();
        let owner = Uuid::new_v4();
        let admin = Uuid::new_v4();
        let member = Uuid::new_v4();
        let guard = guard_with(&[
            (team, owner, TeamRole::Owner),
            (team, admin, TeamRole::Admin),
            (team, member, TeamRole::Member),
        ]);

        assert!(guard.require_elevated(team, owner).await.is_ok());
        assert!(guard.require_elevated(team, admin).await.is_ok());
        assert!(guard.require_elevated(team, member).await.is_err());
        assert!(!guard.has_elevated_role(team, Uuid::new_v4()).await.unwrap());
    }
}
