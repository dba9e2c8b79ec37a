use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use rand::rngs::OsRng;
use redis::AsyncCommands;

use crate::config::Config;
use crate::db::Database;
use crate::error::{conflict_on_unique, AppError, Result};
use crate::middleware::{Claims, TokenKind};
use crate::models::{Profile, RegisterProfile};
use crate::utils::sha256_hex;

pub struct AuthService {
    db: Database,
    config: Config,
}

pub struct IssuedTokens {
    pub access_token: String,
    pub refresh_token: String,
}

pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);

    Ok(Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Password hashing failed: {}", e)))?
        .to_string())
}

pub fn verify_password(password: &str, hash: &str) -> Result<()> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Invalid password hash: {}", e)))?;

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AppError::Unauthorized)
}

fn revocation_key(token: &str) -> String {
    format!("token_blacklist:{}", sha256_hex(token.as_bytes()))
}

impl AuthService {
    pub fn new(db: Database, config: Config) -> Self {
        Self { db, config }
    }

    pub async fn register(&self, input: &RegisterProfile) -> Result<(Profile, IssuedTokens)> {
        let password_hash = hash_password(&input.password)?;

        let profile: Profile = sqlx::query_as(
            r#"
            INSERT INTO profiles (email, password_hash, full_name, university, career)
            VALUES (LOWER($1), $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(input.email.trim())
        .bind(&password_hash)
        .bind(input.full_name.trim())
        .bind(&input.university)
        .bind(&input.career)
        .fetch_one(&self.db.pg)
        .await
        .map_err(|e| conflict_on_unique(e, "Ya existe una cuenta con ese correo"))?;

        tracing::info!(user_id = %profile.id, "Profile registered");

        let tokens = self.issue_tokens(&profile)?;
        Ok((profile, tokens))
    }

    pub async fn authenticate(&self, email: &str, password: &str) -> Result<(Profile, IssuedTokens)> {
        let profile: Profile = sqlx::query_as("SELECT * FROM profiles WHERE email = LOWER($1)")
            .bind(email.trim())
            .fetch_optional(&self.db.pg)
            .await?
            .ok_or(AppError::Unauthorized)?;

        verify_password(password, &profile.password_hash)?;

        if profile.is_banned {
            tracing::info!(user_id = %profile.id, "Banned profile attempted login");
            return Err(AppError::Forbidden);
        }

        let tokens = self.issue_tokens(&profile)?;
        Ok((profile, tokens))
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<String> {
        let claims = crate::middleware::auth::decode_claims(&self.config.jwt.secret, refresh_token)?;
        if claims.kind != TokenKind::Refresh || self.is_revoked(refresh_token).await? {
            return Err(AppError::Unauthorized);
        }

        let user_id = uuid::Uuid::parse_str(&claims.sub).map_err(|_| AppError::Unauthorized)?;
        let profile: Profile = sqlx::query_as("SELECT * FROM profiles WHERE id = $1 AND is_banned = false")
            .bind(user_id)
            .fetch_optional(&self.db.pg)
            .await?
            .ok_or(AppError::Unauthorized)?;

        self.generate_token(&profile, TokenKind::Access)
    }

    fn issue_tokens(&self, profile: &Profile) -> Result<IssuedTokens> {
        Ok(IssuedTokens {
            access_token: self.generate_token(profile, TokenKind::Access)?,
            refresh_token: self.generate_token(profile, TokenKind::Refresh)?,
        })
    }

    pub fn generate_token(&self, profile: &Profile, kind: TokenKind) -> Result<String> {
        let now = Utc::now();
        let exp = match kind {
            TokenKind::Access => now + Duration::hours(self.config.jwt.expiry_hours as i64),
            TokenKind::Refresh => now + Duration::days(self.config.jwt.refresh_expiry_days as i64),
        };

        let claims = Claims {
            sub: profile.id.to_string(),
            email: profile.email.clone(),
            role: profile.role(),
            kind,
            iat: now.timestamp() as usize,
            exp: exp.timestamp() as usize,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.config.jwt.secret.as_bytes()),
        )
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Token generation failed: {}", e)))
    }

    /// Blacklists a token until its own expiry.
    pub async fn revoke(&self, token: &str, expires_at: usize) -> Result<()> {
        let ttl = (expires_at as i64 - Utc::now().timestamp()).max(1) as u64;

        let mut conn = self.db.get_redis_conn().await?;
        conn.set_ex::<_, _, ()>(revocation_key(token), "1", ttl).await?;

        Ok(())
    }

    pub async fn is_revoked(&self, token: &str) -> Result<bool> {
        let mut conn = self.db.get_redis_conn().await?;
        Ok(conn.exists(revocation_key(token)).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_round_trip() {
        let hash = hash_password("apuntes-2026").unwrap();
        assert!(verify_password("apuntes-2026", &hash).is_ok());
        assert!(matches!(
            verify_password("otra-clave", &hash),
            Err(AppError::Unauthorized)
        ));
    }

    #[test]
    fn revocation_keys_do_not_embed_the_token() {
        let key = revocation_key("header.payload.signature");
        assert!(key.starts_with("token_blacklist:"));
        assert!(!key.contains("payload"));
    }
}
