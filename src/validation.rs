use crate::errors::ValidationError;
use crate::models::RegisterRequest;

pub const MIN_NAME_LEN: usize = 2;
pub const MIN_PASSWORD_LEN: usize = 6;

/// Shape check only: something@something.something, no whitespace.
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && !tld.is_empty(),
        None => false,
    }
}

/// Scores a password from 0 to 5: length of eight or more, lowercase, uppercase,
/// digit, and symbol each add one.
pub fn password_strength(password: &str) -> u8 {
    let checks = [
        password.chars().count() >= 8,
        password.chars().any(|c| c.is_ascii_lowercase()),
        password.chars().any(|c| c.is_ascii_uppercase()),
        password.chars().any(|c| c.is_ascii_digit()),
        password.chars().any(|c| !c.is_ascii_alphanumeric()),
    ];
    checks.iter().filter(|passed| **passed).count() as u8
}

pub fn strength_label(strength: u8) -> &'static str {
    match strength {
        0 | 1 => "Very Weak",
        2 => "Weak",
        3 => "Fair",
        4 => "Good",
        _ => "Strong",
    }
}

pub fn validate_registration(request: &RegisterRequest) -> Result<(), ValidationError> {
    if request.name.trim().chars().count() < MIN_NAME_LEN {
        return Err(ValidationError::Field {
            field: "name",
            message: "Name must be at least 2 characters".to_owned(),
        });
    }
    if !is_valid_email(&request.email) {
        return Err(ValidationError::Field {
            field: "email",
            message: "Please enter a valid email address".to_owned(),
        });
    }
    if request.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ValidationError::Field {
            field: "password",
            message: "Password must be at least 6 characters".to_owned(),
        });
    }
    if request.password != request.confirm_password {
        return Err(ValidationError::Field {
            field: "confirmPassword",
            message: "Passwords do not match".to_owned(),
        });
    }
    if !request.agreed_to_terms {
        return Err(ValidationError::TermsNotAccepted);
    }
    Ok(())
}
