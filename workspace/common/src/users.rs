use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

/// Denormalized view of a user: account, profile and role joined.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct UserView {
    pub id: i32,
    pub full_name: String,
    pub email: String,
    pub role: String,
    pub status: bool,
    pub is_temp_password: bool,
}

/// Body used both to create a user and to replace its editable fields.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct AddUserRequest {
    #[validate(length(min = 1, max = 255, message = "Full name is required"))]
    pub full_name: String,
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    /// Role name, e.g. `admin` or `user`.
    #[validate(length(min = 1, message = "Role is required"))]
    pub role: String,
    /// Active flag.
    pub status: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(email: &str, full_name: &str) -> AddUserRequest {
        AddUserRequest {
            full_name: full_name.to_string(),
            email: email.to_string(),
            role: "user".to_string(),
            status: true,
        }
    }

    #[test]
    fn test_add_user_request_validation() {
        assert!(request("jane@example.com", "Jane Doe").validate().is_ok());

        let errors = request("not-an-email", "Jane Doe").validate().unwrap_err();
        assert!(errors.field_errors().contains_key("email"));

        let errors = request("jane@example.com", "").validate().unwrap_err();
        assert!(errors.field_errors().contains_key("full_name"));
    }
}
