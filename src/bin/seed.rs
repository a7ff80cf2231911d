use handcraft_store_api::{
    db::{create_pool, orm_from_pool, run_migrations},
    models::{ROLE_ADMIN, ROLE_USER},
    services::{
        auth_service::hash_password,
        product_intake::{DEFAULT_CARE_INSTRUCTION, DEFAULT_DETAIL},
    },
};
use uuid::Uuid;

struct SeedProduct {
    sku: &'static str,
    name: &'static str,
    price: f64,
    size: &'static str,
    tone: &'static str,
    product_type: &'static str,
    category: &'static str,
    description: &'static str,
}

const PRODUCTS: [SeedProduct; 4] = [
    SeedProduct {
        sku: "SB-001",
        name: "Hand-Hammered Singing Bowl",
        price: 129.0,
        size: "6 inch",
        tone: "C",
        product_type: "singing-bowl",
        category: "Singing Bowls",
        description: "Seven-metal bowl hammered by hand, with a long resonant sustain.",
    },
    SeedProduct {
        sku: "SB-002",
        name: "Full Moon Singing Bowl",
        price: 189.0,
        size: "8 inch",
        tone: "F",
        product_type: "singing-bowl",
        category: "Singing Bowls",
        description: "Bowl forged during the full moon, deep warm tone.",
    },
    SeedProduct {
        sku: "TB-001",
        name: "Tingsha Bells",
        price: 39.5,
        size: "2.5 inch",
        tone: "G",
        product_type: "bells",
        category: "Accessories",
        description: "Pair of cymbals on a leather strap for clearing space.",
    },
    SeedProduct {
        sku: "MS-001",
        name: "Wooden Mallet",
        price: 14.0,
        size: "7 inch",
        tone: "",
        product_type: "mallet",
        category: "Accessories",
        description: "Suede-wrapped rosewood mallet for rimming and striking.",
    },
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let database_url = std::env::var("DATABASE_URL")?;

    let pool = create_pool(&database_url).await?;
    // Ensure migrations are applied.
    run_migrations(&orm_from_pool(pool.clone())).await?;

    let admin_id = ensure_user(&pool, "admin", "admin@example.com", "admin12345", ROLE_ADMIN).await?;
    let user_id = ensure_user(&pool, "shopper", "user@example.com", "user12345", ROLE_USER).await?;
    seed_products(&pool).await?;

    println!("Seed completed. Admin ID: {admin_id}, User ID: {user_id}");
    Ok(())
}

async fn ensure_user(
    pool: &sqlx::PgPool,
    username: &str,
    email: &str,
    password: &str,
    role: &str,
) -> anyhow::Result<Uuid> {
    let password_hash = hash_password(password).map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let (user_id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO users (id, username, email, password_hash, role)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (email) DO UPDATE SET role = EXCLUDED.role
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(username)
    .bind(email)
    .bind(password_hash)
    .bind(role)
    .fetch_one(pool)
    .await?;

    println!("Ensured user {email} (role={role})");
    Ok(user_id)
}

async fn seed_products(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    for product in &PRODUCTS {
        let tone = (!product.tone.is_empty()).then_some(product.tone);
        sqlx::query(
            r#"
            INSERT INTO products
                (id, sku, name, price, size, tone, product_type, category, brand,
                 images, description, details, care_instructions)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (sku) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(product.sku)
        .bind(product.name)
        .bind(product.price)
        .bind(product.size)
        .bind(tone)
        .bind(product.product_type)
        .bind(product.category)
        .bind("Himalayan Handcraft")
        .bind(vec![format!("/media/products/{}.jpg", product.sku.to_lowercase())])
        .bind(product.description)
        .bind(vec![DEFAULT_DETAIL.to_string()])
        .bind(vec![DEFAULT_CARE_INSTRUCTION.to_string()])
        .execute(pool)
        .await?;
    }

    println!("Seeded products");
    Ok(())
}
