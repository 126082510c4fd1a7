pub const MIN_PASSWORD_LENGTH: usize = 6;
pub const MAX_PASSWORD_LENGTH: usize = 512;
pub const MAX_USERNAME_LENGTH: usize = 64;
pub const MAX_NAME_LENGTH: usize = 100;
pub const MAX_TITLE_LENGTH: usize = 200;
pub const MAX_DESCRIPTION_LENGTH: usize = 4000;
pub const MAX_FEEDBACK_LENGTH: usize = 4000;

#[derive(Debug)]
pub enum Validity {
    Valid,
    Invalid(String),
}

impl Validity {
    pub fn is_valid(&self) -> bool {
        match &self {
            Validity::Valid => true,
            Validity::Invalid(_) => false,
        }
    }
}

pub fn validate_email_address(email: &str) -> Validity {
    if email.chars().count() > 320 {
        return Validity::Invalid(String::from("Email address is too long."));
    }

    for c in email.chars() {
        if c == ' ' || !c.is_ascii() {
            return Validity::Invalid(String::from(
                "Email address cannot contain a space or non-ASCII characters.",
            ));
        }
    }

    if email.contains("@.") {
        return Validity::Invalid(String::from(
            "Domain name in email address cannot begin with a period.",
        ));
    }

    let email = match email.split_once('@') {
        Some(s) => s,
        None => {
            return Validity::Invalid(String::from("Email address must contain an at symbol (@)."))
        }
    };

    if email.0.is_empty() || email.1.len() < 3 {
        return Validity::Invalid(String::from("Email username or domain name is too short."));
    }

    if email.1.contains('@') || !email.1.contains('.') {
        return Validity::Invalid(String::from(
            "Email address must have only one at symbol (@) and the domain must contain a period.",
        ));
    }

    if email.1.ends_with('.') {
        return Validity::Invalid(String::from("Email address cannot end with a period."));
    }

    Validity::Valid
}

pub fn validate_password(password: &str) -> Validity {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Validity::Invalid(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters long."
        ));
    }

    if password.len() > MAX_PASSWORD_LENGTH {
        return Validity::Invalid(String::from("Password is too long."));
    }

    Validity::Valid
}

/// Usernames double as login identifiers, so they may not look like an email address.
pub fn validate_username(username: &str) -> Validity {
    if username.is_empty() {
        return Validity::Invalid(String::from("Username cannot be empty."));
    }

    if username.chars().count() > MAX_USERNAME_LENGTH {
        return Validity::Invalid(String::from("Username is too long."));
    }

    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
    {
        return Validity::Invalid(String::from(
            "Username may only contain letters, digits, periods, dashes, and underscores.",
        ));
    }

    Validity::Valid
}

pub fn validate_name(name: &str) -> Validity {
    if name.trim().is_empty() {
        return Validity::Invalid(String::from("Name cannot be blank."));
    }

    if name.chars().count() > MAX_NAME_LENGTH {
        return Validity::Invalid(String::from("Name is too long."));
    }

    Validity::Valid
}

pub fn validate_title(title: &str) -> Validity {
    if title.trim().is_empty() {
        return Validity::Invalid(String::from("Title cannot be blank."));
    }

    if title.chars().count() > MAX_TITLE_LENGTH {
        return Validity::Invalid(String::from("Title is too long."));
    }

    Validity::Valid
}

pub fn validate_text(text: &str, max_chars: usize, field: &str) -> Validity {
    if text.chars().count() > max_chars {
        return Validity::Invalid(format!("{field} is too long."));
    }

    Validity::Valid
}
