use argon2::{
    Argon2, PasswordHasher,
    password_hash::{SaltString, rand_core::OsRng},
};
use rust_decimal::Decimal;
use uuid::Uuid;

use carbnb_api::{
    config::AppConfig,
    db::{create_orm_conn, create_pool, run_migrations},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let orm = create_orm_conn(&config.database_url).await?;
    run_migrations(&orm).await?;

    let pool = create_pool(&config.database_url).await?;

    let owner_id = ensure_user(
        &pool,
        "owner@example.com",
        "owner123",
        Some("+91 98765 00001"),
    )
    .await?;
    let renter_id = ensure_user(
        &pool,
        "renter@example.com",
        "renter123",
        Some("+91 98765 00002"),
    )
    .await?;
    seed_cars(&pool, owner_id).await?;

    println!("Seed completed. Owner ID: {owner_id}, Renter ID: {renter_id}");
    Ok(())
}

async fn ensure_user(
    pool: &sqlx::PgPool,
    email: &str,
    password: &str,
    phone: Option<&str>,
) -> anyhow::Result<Uuid> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!(e.to_string()))?
        .to_string();

    let name = email.split('@').next().unwrap_or("user");
    let row: Option<(Uuid,)> = sqlx::query_as(
        r#"
        INSERT INTO users (id, name, email, password_hash, phone)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (email) DO NOTHING
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(name)
    .bind(email)
    .bind(password_hash)
    .bind(phone)
    .fetch_optional(pool)
    .await?;

    // If user already exists, fetch id
    let user_id = match row {
        Some((id,)) => id,
        None => {
            let existing: (Uuid,) = sqlx::query_as("SELECT id FROM users WHERE email = $1")
                .bind(email)
                .fetch_one(pool)
                .await?;
            existing.0
        }
    };

    println!("Ensured user {email}");
    Ok(user_id)
}

async fn seed_cars(pool: &sqlx::PgPool, owner_id: Uuid) -> anyhow::Result<()> {
    let cars = vec![
        (
            "Maruti",
            "Swift",
            "1.2L petrol",
            "petrol",
            "red",
            "1800.00",
            "Pune",
            Some((18.5204, 73.8567)),
            "manual",
            5,
        ),
        (
            "Hyundai",
            "Creta",
            "1.5L diesel",
            "diesel",
            "white",
            "3200.00",
            "Mumbai",
            Some((19.0760, 72.8777)),
            "automatic",
            5,
        ),
        (
            "Tata",
            "Nexon EV",
            "electric",
            "electric",
            "blue",
            "2800.00",
            "Bengaluru",
            Some((12.9716, 77.5946)),
            "automatic",
            5,
        ),
    ];

    for (brand, model, engine, fuel_type, color, price, location, coords, transmission, seats) in
        cars
    {
        let existing: Option<(Uuid,)> = sqlx::query_as(
            "SELECT id FROM cars WHERE owner_id = $1 AND brand = $2 AND model = $3",
        )
        .bind(owner_id)
        .bind(brand)
        .bind(model)
        .fetch_optional(pool)
        .await?;
        if existing.is_some() {
            continue;
        }

        let (latitude, longitude) = match coords {
            Some((lat, lng)) => (Some(lat), Some(lng)),
            None => (None, None),
        };
        sqlx::query(
            r#"
            INSERT INTO cars (id, owner_id, brand, model, engine, fuel_type, color,
                              price_per_day, location, latitude, longitude, transmission, seats)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(owner_id)
        .bind(brand)
        .bind(model)
        .bind(engine)
        .bind(fuel_type)
        .bind(color)
        .bind(price.parse::<Decimal>()?)
        .bind(location)
        .bind(latitude)
        .bind(longitude)
        .bind(transmission)
        .bind(seats)
        .execute(pool)
        .await?;
    }

    println!("Seeded cars");
    Ok(())
}
