use crate::{jwt::SessionData, schema::UserRole};

const ACTION_TABLE: &[(UserRole, &[ActionType])] = &[
    (
        UserRole::User,
        &[
            ActionType::ManageOwnRecipes,
            ActionType::ManageOwnFolders,
            ActionType::ManageOwnFavorites,
        ],
    ),
    (
        UserRole::Admin,
        &[
            ActionType::ManageOwnRecipes,
            ActionType::ManageOwnFolders,
            ActionType::ManageOwnFavorites,
            ActionType::ManageUsers,
        ],
    ),
];

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum ActionType {
    ManageOwnRecipes,
    ManageOwnFolders,
    ManageOwnFavorites,

    ManageUsers,
}

impl ActionType {
    pub fn permitted(self, session: &SessionData) -> bool {
        let role = &session.role;

        ACTION_TABLE
            .iter()
            .find_map(|(table_role, actions)| {
                if role != table_role {
                    return None;
                }

                Some(actions.contains(&self))
            })
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::UserRole;

    fn session(role: UserRole) -> SessionData {
        SessionData {
            user_id: 1,
            username: String::from("tester"),
            role,
            is_admin: role == UserRole::Admin,
        }
    }

    #[test]
    fn regular_users_cannot_manage_users() {
        let session = session(UserRole::User);
        assert!(ActionType::ManageOwnRecipes.permitted(&session));
        assert!(ActionType::ManageOwnFolders.permitted(&session));
        assert!(!ActionType::ManageUsers.permitted(&session));
    }

    #[test]
    fn admins_can_manage_users() {
        let session = session(UserRole::Admin);
        assert!(ActionType::ManageUsers.permitted(&session));
        assert!(ActionType::ManageOwnFavorites.permitted(&session));
    }
}
