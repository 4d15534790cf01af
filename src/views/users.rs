use std::borrow::Cow;

use crate::models::UserProfile;
use crate::report::TableRow;
use crate::search::{filter_records, Searchable};

/// At most this many matching accounts are listed.
pub const USER_LIST_LIMIT: usize = 10;

impl Searchable for UserProfile {
    fn search_fields(&self) -> Vec<Cow<'_, str>> {
        vec![
            Cow::Owned(self.id.to_string()),
            Cow::Borrowed(&self.username),
            Cow::Borrowed(&self.email),
        ]
    }
}

impl TableRow for UserProfile {
    fn headers() -> &'static [&'static str] {
        &["ID", "Username", "Email", "Role"]
    }

    fn cells(&self) -> Vec<String> {
        let role = if self.is_superuser {
            "Admin"
        } else if self.is_staff {
            "Staff"
        } else {
            "User"
        };
        vec![
            self.id.to_string(),
            self.username.clone(),
            self.email.clone(),
            role.to_string(),
        ]
    }
}

/// Matching users in server order, capped at `USER_LIST_LIMIT`.
pub fn visible_users<'r>(users: &'r [UserProfile], query: &str) -> Vec<&'r UserProfile> {
    let mut found = filter_records(users, query, &[]);
    found.truncate(USER_LIST_LIMIT);
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: i64, username: &str) -> UserProfile {
        UserProfile {
            id,
            username: username.to_string(),
            email: format!("{username}@example.com"),
            is_superuser: false,
            is_staff: false,
            content_toggles: Default::default(),
        }
    }

    #[test]
    fn search_covers_id_username_and_email() {
        let users = vec![user(1, "aoi"), user(22, "mika"), user(3, "ren")];
        let ids: Vec<i64> = visible_users(&users, "22 ren")
            .iter()
            .map(|u| u.id)
            .collect();
        assert_eq!(ids, vec![22, 3]);
        assert_eq!(visible_users(&users, "example.com").len(), 3);
    }

    #[test]
    fn list_is_capped() {
        let users: Vec<UserProfile> = (1..=15).map(|id| user(id, &format!("user{id}"))).collect();
        let shown = visible_users(&users, "");
        assert_eq!(shown.len(), USER_LIST_LIMIT);
        assert_eq!(shown[9].id, 10);
    }
}
