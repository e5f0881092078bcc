use lazy_static::lazy_static;
use regex::Regex;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::auth::{
    dto::{LoginRequest, PublicUser, RegisterRequest, TokenResponse},
    jwt::JwtKeys,
    password::{burn_verification, hash_password, password_matches},
    repo::UserRepo,
    repo_types::{NewUser, User},
};
use crate::db::DbError;
use crate::error::AppError;

const BAD_CREDENTIALS: &str = "Incorrect email or password";

lazy_static! {
    static ref EMAIL_RE: Regex =
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email regex is valid");
    static ref PHONE_RE: Regex =
        Regex::new(r"^\+?[\d\s\-\(\)]{10,15}$").expect("phone regex is valid");
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

pub(crate) fn is_valid_phone(phone: &str) -> bool {
    PHONE_RE.is_match(phone)
}

fn check_len(field: &str, value: &str, min: usize, max: usize) -> Result<(), AppError> {
    let n = value.chars().count();
    if n < min || n > max {
        return Err(AppError::Validation(format!(
            "{field} must be between {min} and {max} characters"
        )));
    }
    Ok(())
}

/// Trims and lower-cases where appropriate, then validates every field.
pub fn validate_registration(req: RegisterRequest) -> Result<RegisterRequest, AppError> {
    let req = RegisterRequest {
        name: req.name.trim().to_string(),
        email: req.email.trim().to_lowercase(),
        phone_number: req.phone_number.trim().to_string(),
        region: req.region.trim().to_string(),
        password: req.password,
    };

    check_len("name", &req.name, 2, 100)?;
    if !is_valid_email(&req.email) {
        return Err(AppError::Validation("Invalid email address".into()));
    }
    if !is_valid_phone(&req.phone_number) {
        return Err(AppError::Validation("Invalid phone number format".into()));
    }
    check_len("region", &req.region, 2, 100)?;
    if req.password.chars().count() < 6 {
        return Err(AppError::Validation(
            "Password must be at least 6 characters".into(),
        ));
    }
    Ok(req)
}

#[instrument(skip_all)]
pub async fn register(users: &dyn UserRepo, req: RegisterRequest) -> Result<PublicUser, AppError> {
    let req = validate_registration(req)?;

    let password_hash = hash_password(&req.password)?;
    let created = users
        .create(NewUser {
            name: req.name,
            email: req.email,
            phone_number: req.phone_number,
            region: req.region,
            password_hash,
        })
        .await;

    match created {
        Ok(user) => {
            info!(user_id = %user.id, email = %user.email, "user registered");
            Ok(user.into())
        }
        Err(DbError::Conflict(constraint)) => {
            warn!(%constraint, "duplicate registration");
            Err(AppError::Conflict(
                "Email or phone number already registered".into(),
            ))
        }
        Err(e) => {
            error!(error = %e, "create user failed");
            Err(e.into())
        }
    }
}

#[instrument(skip_all)]
pub async fn login(
    users: &dyn UserRepo,
    keys: &JwtKeys,
    req: LoginRequest,
) -> Result<TokenResponse, AppError> {
    let email = req.email.trim().to_lowercase();

    let user = match users.find_by_email(&email).await? {
        Some(u) => u,
        None => {
            burn_verification(&req.password);
            warn!(email = %email, "login unknown email");
            return Err(AppError::Unauthorized(BAD_CREDENTIALS.into()));
        }
    };

    if !password_matches(&req.password, &user.password_hash) {
        warn!(user_id = %user.id, "login invalid password");
        return Err(AppError::Unauthorized(BAD_CREDENTIALS.into()));
    }
    if !user.is_active {
        warn!(user_id = %user.id, "login for inactive account");
        return Err(AppError::Unauthorized(BAD_CREDENTIALS.into()));
    }

    let access_token = keys.sign(user.id)?;
    info!(user_id = %user.id, "user logged in");
    Ok(TokenResponse {
        access_token,
        token_type: "bearer",
        expires_in: keys.ttl_secs(),
        user: user.into(),
    })
}

/// Loads the caller; a deleted or inactive account is treated as unauthenticated.
pub async fn current_user(users: &dyn UserRepo, user_id: Uuid) -> Result<User, AppError> {
    match users.find_by_id(user_id).await? {
        Some(u) if u.is_active => Ok(u),
        Some(_) => Err(AppError::Unauthorized("Inactive user".into())),
        None => Err(AppError::Unauthorized(
            "Could not validate credentials".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JwtConfig;
    use crate::testing::MemoryUserRepo;

    fn keys() -> JwtKeys {
        JwtKeys::from(&JwtConfig {
            secret: "test-secret".into(),
            issuer: "test-issuer".into(),
            audience: "test-aud".into(),
            ttl_minutes: 30,
        })
    }

    fn registration(email: &str, phone: &str) -> RegisterRequest {
        RegisterRequest {
            name: "Amina Wanjiru".into(),
            email: email.into(),
            phone_number: phone.into(),
            region: "Nakuru".into(),
            password: "maize-2024".into(),
        }
    }

    #[test]
    fn validation_rules() {
        assert!(validate_registration(registration("a@b.co", "+254 712 345 678")).is_ok());
        assert!(validate_registration(registration("not-an-email", "+254712345678")).is_err());
        assert!(validate_registration(registration("a@b.co", "12345")).is_err());
        assert!(validate_registration(registration("a@b.co", "0712abc345")).is_err());

        let mut short = registration("a@b.co", "0712345678");
        short.password = "12345".into();
        assert!(matches!(validate_registration(short), Err(AppError::Validation(_))));

        let mut tiny = registration("a@b.co", "0712345678");
        tiny.name = " A ".into();
        assert!(validate_registration(tiny).is_err());
    }

    #[test]
    fn email_is_normalized() {
        let req = validate_registration(registration("  Farmer@Example.COM ", "0712345678")).unwrap();
        assert_eq!(req.email, "farmer@example.com");
    }

    #[tokio::test]
    async fn register_hides_hash_and_rejects_duplicates() {
        let users = MemoryUserRepo::default();
        let user = register(&users, registration("f@example.com", "0712345678"))
            .await
            .unwrap();
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["email"], "f@example.com");

        let dup_email = register(&users, registration("F@example.com", "0799999999")).await;
        assert!(matches!(dup_email, Err(AppError::Conflict(_))));
        let dup_phone = register(&users, registration("g@example.com", "0712345678")).await;
        assert!(matches!(dup_phone, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn login_failures_are_indistinguishable() {
        let users = MemoryUserRepo::default();
        let keys = keys();
        let user = register(&users, registration("f@example.com", "0712345678"))
            .await
            .unwrap();

        let unknown = login(
            &users,
            &keys,
            LoginRequest { email: "nobody@example.com".into(), password: "maize-2024".into() },
        )
        .await
        .unwrap_err();
        let wrong = login(
            &users,
            &keys,
            LoginRequest { email: "f@example.com".into(), password: "wrong-pass".into() },
        )
        .await
        .unwrap_err();
        users.deactivate(user.id);
        let inactive = login(
            &users,
            &keys,
            LoginRequest { email: "f@example.com".into(), password: "maize-2024".into() },
        )
        .await
        .unwrap_err();

        for err in [unknown, wrong, inactive] {
            match err {
                AppError::Unauthorized(msg) => assert_eq!(msg, BAD_CREDENTIALS),
                other => panic!("unexpected error: {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn login_with_corrupt_stored_hash_is_bad_credentials() {
        let users = MemoryUserRepo::default();
        users
            .create(NewUser {
                name: "Amina Wanjiru".into(),
                email: "f@example.com".into(),
                phone_number: "0712345678".into(),
                region: "Nakuru".into(),
                password_hash: "legacy$not$argon".into(),
            })
            .await
            .unwrap();

        let err = login(
            &users,
            &keys(),
            LoginRequest { email: "f@example.com".into(), password: "maize-2024".into() },
        )
        .await
        .unwrap_err();
        match err {
            AppError::Unauthorized(msg) => assert_eq!(msg, BAD_CREDENTIALS),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn login_issues_token_for_user() {
        let users = MemoryUserRepo::default();
        let keys = keys();
        let user = register(&users, registration("f@example.com", "0712345678"))
            .await
            .unwrap();

        let res = login(
            &users,
            &keys,
            LoginRequest { email: " F@Example.com".into(), password: "maize-2024".into() },
        )
        .await
        .unwrap();
        assert_eq!(res.token_type, "bearer");
        assert_eq!(res.expires_in, 30 * 60);
        assert_eq!(keys.verify(&res.access_token).unwrap().sub, user.id);

        let me = current_user(&users, user.id).await.unwrap();
        assert_eq!(me.email, "f@example.com");
        users.deactivate(user.id);
        assert!(matches!(
            current_user(&users, user.id).await,
            Err(AppError::Unauthorized(_))
        ));
    }
}
