//! Subjects and bodies of the emails sent to users.

use super::mailer::Email;

fn email(to: &str, subject: &str, body: String) -> Email {
    Email {
        to: to.to_string(),
        subject: subject.to_string(),
        body,
    }
}

pub fn welcome(full_name: &str, to: &str, temp_password: &str) -> Email {
    email(
        to,
        "[Polit] Welcome: Your Temporary Credentials",
        format!(
            "Hello {full_name},\n\n\
             Username: {to}\n\
             Temporary password: {temp_password}\n\n\
             Please log in and change your password.\n"
        ),
    )
}

pub fn initial_admin(full_name: &str, to: &str, temp_password: &str) -> Email {
    email(
        to,
        "Your Initial Admin Account",
        format!(
            "Hello {full_name},\n\n\
             An administrator account has been created for you.\n\n\
             Username: {to}\n\
             Temporary password: {temp_password}\n\n\
             Please change it after logging in.\n"
        ),
    )
}

/// Sent to the previous address when an admin changes a user's email.
pub fn email_updated(full_name: &str, old_email: &str, new_email: &str) -> Email {
    email(
        old_email,
        "Your Email has been Successfully Updated",
        format!(
            "Dear {full_name},\n\n\
             Your email has been updated by admin to {new_email}.\n\
             If this wasn't you, please contact support immediately.\n\n\
             Best regards,\n\
             Support Team\n"
        ),
    )
}

pub fn temp_password(full_name: &str, to: &str, temp_password: &str) -> Email {
    email(
        to,
        "Temporary Password for Your Updated Account",
        format!(
            "Dear {full_name},\n\n\
             A temporary password has been generated for your account. \
             Please use the following password to log in:\n\n\
             Temporary Password: {temp_password}\n\n\
             For security reasons, we recommend updating your password immediately after logging in.\n\n\
             Best regards,\n\
             Support Team\n"
        ),
    )
}

pub fn account_deactivated(full_name: &str, to: &str) -> Email {
    email(
        to,
        "Account Deactivated",
        format!(
            "Dear {full_name},\n\n\
             We would like to inform you that your account has been deactivated by an administrator.\n\
             If you believe this was done in error or require further assistance, \
             please contact our support team.\n\n\
             Sincerely,\n\
             Support Team\n"
        ),
    )
}

pub fn password_reset(to: &str, reset_url: &str) -> Email {
    email(
        to,
        "[Polit] Password Reset Request",
        format!(
            "Hello,\n\n\
             We received a request to reset your password. \
             Click the link below to set a new password:\n\n\
             {reset_url}\n\n\
             If you didn't request this, you can ignore this email.\n\n\
             Polit App Team\n"
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_welcome_contains_credentials() {
        let mail = welcome("Jane Doe", "jane@example.com", "Tmp12345abcd");
        assert_eq!(mail.to, "jane@example.com");
        assert!(mail.body.starts_with("Hello Jane Doe,"));
        assert!(mail.body.contains("Username: jane@example.com"));
        assert!(mail.body.contains("Temporary password: Tmp12345abcd"));
    }

    #[test]
    fn test_email_updated_goes_to_old_address() {
        let mail = email_updated("Jane Doe", "old@example.com", "new@example.com");
        assert_eq!(mail.to, "old@example.com");
        assert!(mail.body.contains("updated by admin to new@example.com"));
    }

    #[test]
    fn test_password_reset_carries_link() {
        let mail = password_reset("jane@example.com", "https://app/reset-password?token=abc");
        assert!(mail.body.contains("https://app/reset-password?token=abc"));
    }
}
