use serde::{Deserialize, Serialize};

/// The signed-in identity. "Signed out" is `Option::<Session>::None`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Session {
    pub user_id: String,
    pub email: String,
}

impl Session {
    pub fn new(user_id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: email.into(),
        }
    }
}
