use rowdit_types::api::{FieldError, RegisterRequest};

const MIN_USERNAME_LEN: usize = 3;
const MIN_PASSWORD_LEN: usize = 4;

/// Checks run in a fixed order and only the first failure is reported.
pub fn validate_register(req: &RegisterRequest) -> Option<FieldError> {
    if !req.email.contains('@') {
        return Some(FieldError::new("email", "invalid email"));
    }
    if req.username.chars().count() < MIN_USERNAME_LEN {
        return Some(FieldError::new("username", "length must be greater than 2"));
    }
    if req.username.contains('@') {
        return Some(FieldError::new("username", "cannot include an @"));
    }
    validate_password("password", &req.password)
}

pub fn validate_password(field: &str, password: &str) -> Option<FieldError> {
    (password.chars().count() < MIN_PASSWORD_LEN)
        .then(|| FieldError::new(field, "length must be greater than 3"))
}
