//! Roles, password hashing and bearer tokens.
//!
//! A command authenticates by presenting a JWT issued by `user login`. The
//! token carries the user id and role; permission checks happen against the
//! role without another database round trip.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::EngagementError;
use crate::models::{Role, User};

pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Create,
    Read,
    Update,
    Delete,
    ManageUsers,
    ManageCampaigns,
    CreateInteraction,
    CreateTask,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::Create => "create",
            Permission::Read => "read",
            Permission::Update => "update",
            Permission::Delete => "delete",
            Permission::ManageUsers => "manage_users",
            Permission::ManageCampaigns => "manage_campaigns",
            Permission::CreateInteraction => "create_interaction",
            Permission::CreateTask => "create_task",
        }
    }
}

impl Role {
    pub fn permissions(&self) -> &'static [Permission] {
        use Permission::*;
        match self {
            Role::Admin => &[Create, Read, Update, Delete, ManageUsers],
            Role::Manager => &[Create, Read, Update, ManageCampaigns],
            Role::Member => &[Read, CreateInteraction, CreateTask],
            Role::Viewer => &[Read],
        }
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        self.permissions().contains(&permission)
    }
}

/// The caller resolved from a verified token.
#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    pub user_id: Uuid,
    pub role: Role,
}

impl Identity {
    /// Passes when the role holds any of `accepted`.
    pub fn require(&self, accepted: &[Permission]) -> Result<(), EngagementError> {
        if accepted.iter().any(|permission| self.role.has_permission(*permission)) {
            return Ok(());
        }
        let wanted = accepted
            .iter()
            .map(Permission::as_str)
            .collect::<Vec<_>>()
            .join(" or ");
        Err(EngagementError::PermissionDenied {
            role: self.role.to_string(),
            permission: wanted,
        })
    }

    /// Passes for the owner of a record, or for a role holding `permission`.
    pub fn require_owner_or(&self, owner: Uuid, permission: Permission) -> Result<(), EngagementError> {
        if self.user_id == owner {
            return Ok(());
        }
        self.require(&[permission])
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub iat: i64,
    pub exp: i64,
}

pub struct TokenManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl TokenManager {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    pub fn issue(&self, user: &User, now: DateTime<Utc>) -> Result<String, EngagementError> {
        let claims = Claims {
            sub: user.id.to_string(),
            role: user.role.to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|err| EngagementError::Unauthorized(format!("failed to sign token: {err}")))
    }

    pub fn verify(&self, token: &str) -> Result<Identity, EngagementError> {
        let data = decode::<Claims>(token.trim(), &self.decoding_key, &Validation::default())
            .map_err(|err| match err.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    EngagementError::Unauthorized("token expired".to_string())
                }
                _ => EngagementError::Unauthorized("invalid token".to_string()),
            })?;

        let user_id = Uuid::parse_str(&data.claims.sub)
            .map_err(|_| EngagementError::Unauthorized("invalid token subject".to_string()))?;
        let role = data
            .claims
            .role
            .parse::<Role>()
            .map_err(|_| EngagementError::Unauthorized("invalid token role".to_string()))?;

        Ok(Identity { user_id, role })
    }
}

/// Argon2id with a random salt, encoded as a PHC string.
pub fn hash_password(password: &str) -> Result<String, EngagementError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| EngagementError::invalid(format!("failed to hash password: {err}")))
}

/// False for a wrong password and for anything that is not a PHC hash.
pub fn verify_password(password: &str, stored: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

pub fn validate_new_password(password: &str) -> Result<(), EngagementError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(EngagementError::invalid(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

/// Replaces the stored hash once `current` checks out.
pub fn change_password(user: &mut User, current: &str, new: &str) -> Result<(), EngagementError> {
    if !verify_password(current, &user.password_hash) {
        return Err(EngagementError::invalid("current password is incorrect"));
    }
    validate_new_password(new)?;
    user.password_hash = hash_password(new)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role) -> User {
        User {
            id: Uuid::new_v4(),
            email: "morgan@example.org".to_string(),
            password_hash: hash_password("correct horse").unwrap(),
            first_name: "Morgan".to_string(),
            last_name: "Reyes".to_string(),
            role,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn role_permissions() {
        assert!(Role::Admin.has_permission(Permission::Delete));
        assert!(Role::Admin.has_permission(Permission::ManageUsers));
        assert!(!Role::Manager.has_permission(Permission::Delete));
        assert!(Role::Manager.has_permission(Permission::ManageCampaigns));
        assert!(Role::Member.has_permission(Permission::CreateInteraction));
        assert!(!Role::Member.has_permission(Permission::Update));
        assert!(Role::Viewer.has_permission(Permission::Read));
        assert!(!Role::Viewer.has_permission(Permission::CreateTask));
    }

    #[test]
    fn require_accepts_any_listed_permission() {
        let member = Identity {
            user_id: Uuid::new_v4(),
            role: Role::Member,
        };
        assert!(member
            .require(&[Permission::Create, Permission::CreateInteraction])
            .is_ok());
        let err = member.require(&[Permission::Delete]).unwrap_err();
        assert_eq!(
            err,
            EngagementError::PermissionDenied {
                role: "member".to_string(),
                permission: "delete".to_string(),
            }
        );
    }

    #[test]
    fn passwords_verify_against_their_hash() {
        let stored = hash_password("correct horse").unwrap();
        assert!(stored.starts_with("$argon2id$"));
        assert!(verify_password("correct horse", &stored));
        assert!(!verify_password("battery staple", &stored));
        assert!(!verify_password("correct horse", "not-a-hash"));
        assert_ne!(stored, hash_password("correct horse").unwrap());
    }

    #[test]
    fn change_password_checks_the_current_one() {
        let mut morgan = user(Role::Member);
        let before = morgan.password_hash.clone();

        let err = change_password(&mut morgan, "battery staple", "new passphrase").unwrap_err();
        assert_eq!(err, EngagementError::invalid("current password is incorrect"));
        assert!(change_password(&mut morgan, "correct horse", "short").is_err());
        assert_eq!(morgan.password_hash, before);

        change_password(&mut morgan, "correct horse", "new passphrase").unwrap();
        assert!(verify_password("new passphrase", &morgan.password_hash));
        assert!(!verify_password("correct horse", &morgan.password_hash));
    }

    #[test]
    fn owners_may_act_without_the_broader_permission() {
        let member = Identity {
            user_id: Uuid::new_v4(),
            role: Role::Member,
        };
        assert!(member.require_owner_or(member.user_id, Permission::Update).is_ok());
        assert!(member.require_owner_or(Uuid::new_v4(), Permission::Update).is_err());

        let manager = Identity {
            user_id: Uuid::new_v4(),
            role: Role::Manager,
        };
        assert!(manager.require_owner_or(Uuid::new_v4(), Permission::Update).is_ok());
    }

    #[test]
    fn token_round_trip() {
        let manager = TokenManager::new("test-secret", Duration::hours(1));
        let user = user(Role::Manager);
        let token = manager.issue(&user, Utc::now()).unwrap();
        let identity = manager.verify(&token).unwrap();
        assert_eq!(identity.user_id, user.id);
        assert_eq!(identity.role, Role::Manager);
    }

    #[test]
    fn expired_token_is_rejected() {
        let manager = TokenManager::new("test-secret", Duration::hours(1));
        let issued = Utc::now() - Duration::hours(3);
        let token = manager.issue(&user(Role::Viewer), issued).unwrap();
        assert_eq!(
            manager.verify(&token),
            Err(EngagementError::Unauthorized("token expired".to_string()))
        );
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let issuer = TokenManager::new("secret-one", Duration::hours(1));
        let verifier = TokenManager::new("secret-two", Duration::hours(1));
        let token = issuer.issue(&user(Role::Admin), Utc::now()).unwrap();
        assert!(verifier.verify(&token).is_err());
        assert!(verifier.verify("garbage").is_err());
    }
}
