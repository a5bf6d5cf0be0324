// ── User profile ──

use serde::{Deserialize, Serialize};

/// The signed-in account, as persisted under the `user` credential key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl UserProfile {
    /// "First Last" when either is set, else the username.
    pub fn display_name(&self) -> String {
        let full = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if full.is_empty() {
            self.username.clone()
        } else {
            full
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn persisted_shape_is_camel_case() {
        let user = UserProfile {
            id: "7".into(),
            username: "ana".into(),
            email: Some("ana@example.com".into()),
            first_name: Some("Ana".into()),
            last_name: None,
            role: Some("admin".into()),
        };
        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "id": "7",
                "username": "ana",
                "email": "ana@example.com",
                "firstName": "Ana",
                "role": "admin",
            })
        );
        let back: UserProfile = serde_json::from_value(json).unwrap();
        assert_eq!(back, user);
    }

    #[test]
    fn display_name_falls_back_to_username() {
        let mut user = UserProfile {
            username: "ana".into(),
            ..UserProfile::default()
        };
        assert_eq!(user.display_name(), "ana");
        user.first_name = Some("Ana".into());
        user.last_name = Some("Silva".into());
        assert_eq!(user.display_name(), "Ana Silva");
    }
}
