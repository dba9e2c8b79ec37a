//! Creates the initial admin profile and refreshes the membership plan catalog.
//! Run with: cargo run --bin seed

use studydocu_api::config::Config;
use studydocu_api::db::Database;
use studydocu_api::services::hash_password;

/// (code, name, price_cents, currency, duration_days)
const PLANS: &[(&str, &str, i64, &str, i32)] = &[
    ("mensual", "Premium Mensual", 499, "USD", 30),
    ("trimestral", "Premium Trimestral", 1299, "USD", 90),
    ("anual", "Premium Anual", 3999, "USD", 365),
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load()?;

    println!("Connecting to database...");
    let db = Database::connect(&config).await?;
    db.run_migrations().await?;
    println!("Connected successfully!");

    let email = std::env::var("ADMIN_EMAIL")
        .unwrap_or_else(|_| "admin@studydocu.app".to_string())
        .trim()
        .to_lowercase();
    let password = std::env::var("ADMIN_PASSWORD").unwrap_or_else(|_| "Admin@123".to_string());
    let name = std::env::var("ADMIN_NAME").unwrap_or_else(|_| "Administrador".to_string());

    println!("Hashing password...");
    let password_hash =
        hash_password(&password).map_err(|e| anyhow::anyhow!("Password hashing failed: {}", e))?;

    let created: bool = sqlx::query_scalar(
        r#"
        INSERT INTO profiles (id, email, password_hash, full_name, role, onboarding_completed)
        VALUES ($1, $2, $3, $4, 'admin', TRUE)
        ON CONFLICT (email) DO UPDATE
            SET password_hash = EXCLUDED.password_hash,
                role = 'admin',
                is_banned = FALSE,
                ban_reason = NULL,
                updated_at = NOW()
        RETURNING (xmax = 0)
        "#,
    )
    .bind(uuid::Uuid::new_v4())
    .bind(&email)
    .bind(&password_hash)
    .bind(&name)
    .fetch_one(&db.pg)
    .await?;

    if created {
        println!("Admin created successfully!");
    } else {
        println!("Existing admin password reset.");
    }

    for &(code, plan_name, price_cents, currency, duration_days) in PLANS {
        sqlx::query(
            r#"
            INSERT INTO membership_plans (code, name, price_cents, currency, duration_days)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (code) DO UPDATE
                SET name = EXCLUDED.name,
                    price_cents = EXCLUDED.price_cents,
                    currency = EXCLUDED.currency,
                    duration_days = EXCLUDED.duration_days
            "#,
        )
        .bind(code)
        .bind(plan_name)
        .bind(price_cents)
        .bind(currency)
        .bind(duration_days)
        .execute(&db.pg)
        .await?;
    }
    println!("{} membership plans up to date", PLANS.len());

    println!("\n========================================");
    println!("Admin Account Ready!");
    println!("========================================");
    println!("Email:    {}", email);
    println!("Password: {}", password);
    println!("Role:     admin");
    println!("========================================");

    Ok(())
}
