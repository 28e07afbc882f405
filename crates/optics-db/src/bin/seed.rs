//! # Seed Data Generator
//!
//! Fills a fresh database with a demo optics shop: catalog, partners,
//! customers, a few invoices and an admin login.
//!
//! ## Usage
//! ```bash
//! # Seed the default database
//! cargo run -p optics-db --bin seed
//!
//! # Custom database path and admin password
//! cargo run -p optics-db --bin seed -- --db ./data/demo.db --admin-password s3cret
//! ```
//!
//! Running it twice is harmless: a database that already has products is
//! left untouched.

use anyhow::{anyhow, Context, Result};
use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHasher};
use chrono::Utc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use optics_core::admin::{CompanySettings, PermissionSet};
use optics_core::invoice::{ProductLine, ServiceLine};
use optics_core::{Gender, PaymentMethod};
use optics_db::repository::category::CategoryInput;
use optics_db::repository::customer::CustomerInput;
use optics_db::repository::group::GroupInput;
use optics_db::repository::partner::PartnerInput;
use optics_db::repository::product::{ProductFilter, ProductInput};
use optics_db::repository::sale::SaleInput;
use optics_db::repository::service::ServiceInput;
use optics_db::repository::user::NewUser;
use optics_db::{Database, DbConfig};

const DEFAULT_DB: &str = "data/optics.db";
const DEFAULT_ADMIN_PASSWORD: &str = "admin123";

/// (category, name, barcode, quantity, cost, price) in halalas.
const PRODUCTS: &[(&str, &str, &str, i64, i64, i64)] = &[
    ("Frames", "Ray-Ban RB5154 Clubmaster", "8053672000010", 12, 32_000, 59_000),
    ("Frames", "Oakley Holbrook OX8156", "8053672000027", 8, 28_000, 52_000),
    ("Frames", "Classic Metal Round", "6281000000013", 25, 6_000, 15_000),
    ("Frames", "Kids Flex TR90", "6281000000020", 3, 4_500, 12_000),
    ("Lenses", "Single Vision 1.56 AR", "6281000000037", 60, 3_000, 9_000),
    ("Lenses", "Blue Cut 1.60", "6281000000044", 40, 5_500, 16_000),
    ("Lenses", "Progressive 1.67", "6281000000051", 15, 22_000, 65_000),
    ("Lenses", "Photochromic 1.56", "6281000000068", 0, 9_000, 24_000),
    ("Contact Lenses", "Acuvue Oasys 2-Week (6)", "0733905563004", 20, 9_500, 17_500),
    ("Contact Lenses", "Dailies Total1 (30)", "0300650364007", 4, 14_000, 23_000),
    ("Solutions", "Opti-Free PureMoist 300ml", "0300650277008", 30, 2_200, 4_500),
    ("Accessories", "Microfiber Cleaning Cloth", "6281000000075", 100, 300, 1_500),
    ("Accessories", "Hard Case Black", "6281000000082", 45, 800, 2_500),
];

/// (code, name, cost, price) in halalas.
const SERVICES: &[(&str, &str, i64, i64)] = &[
    ("SRV-EXAM", "Comprehensive eye exam", 0, 10_000),
    ("SRV-FIT", "Frame fitting and adjustment", 500, 3_000),
    ("SRV-CL", "Contact lens fitting", 1_500, 7_500),
];

const CUSTOMERS: &[(&str, &str, Gender)] = &[
    ("Mohammed Al-Qahtani", "512345678", Gender::Male),
    ("Noura Al-Harbi", "523456789", Gender::Female),
    ("Khalid Al-Otaibi", "534567890", Gender::Male),
    ("Sara Al-Zahrani", "545678901", Gender::Female),
    ("Abdullah Al-Shehri", "556789012", Gender::Male),
];

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = std::env::args().collect();
    let mut db_path = DEFAULT_DB.to_string();
    let mut admin_password = DEFAULT_ADMIN_PASSWORD.to_string();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" => {
                i += 1;
                db_path = args.get(i).cloned().context("--db needs a path")?;
            }
            "--admin-password" => {
                i += 1;
                admin_password = args.get(i).cloned().context("--admin-password needs a value")?;
            }
            "--help" | "-h" => {
                println!("Usage: seed [--db PATH] [--admin-password PASSWORD]");
                println!();
                println!("Options:");
                println!("  --db PATH                  Database file (default: {DEFAULT_DB})");
                println!("  --admin-password PASSWORD  Password for the 'admin' login (default: {DEFAULT_ADMIN_PASSWORD})");
                return Ok(());
            }
            other => return Err(anyhow!("unknown argument: {other}")),
        }
        i += 1;
    }

    if let Some(parent) = std::path::Path::new(&db_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
        }
    }

    info!(path = %db_path, "Opening database");
    let db = Database::new(DbConfig::new(&db_path)).await?;

    let existing = db.products().list(&ProductFilter { include_inactive: true, ..Default::default() }).await?;
    if !existing.is_empty() {
        info!(products = existing.len(), "Database already has data, skipping seed");
        return Ok(());
    }

    seed_company(&db).await?;
    let admin_id = seed_admin(&db, &admin_password).await?;
    seed_groups(&db).await?;
    seed_catalog(&db, &admin_id).await?;
    seed_sales(&db, &admin_id).await?;

    info!("Seed complete. Log in as 'admin'");
    db.close().await;
    Ok(())
}

async fn seed_company(db: &Database) -> Result<()> {
    let settings = CompanySettings {
        company_name_ar: "نظارات البصر".to_string(),
        company_name_en: "Al-Basar Optics".to_string(),
        unified_number: "7001234567".to_string(),
        commercial_register: "1010123456".to_string(),
        tax_number: "300123456700003".to_string(),
        national_address: "King Fahd Road, Riyadh 12211".to_string(),
        contact_phone: "0112345678".to_string(),
        contact_email: "info@albasar.example".to_string(),
        owner_name: "Fahad Al-Dosari".to_string(),
        owner_phone: "0501234567".to_string(),
        ..Default::default()
    };
    db.settings().update_company(&settings).await?;
    info!("Company settings saved");
    Ok(())
}

async fn seed_admin(db: &Database, password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow!("failed to hash admin password: {e}"))?
        .to_string();

    let admin = db
        .users()
        .create(&NewUser {
            username: "admin",
            password_hash: &hash,
            email: Some("admin@albasar.example"),
            is_superuser: true,
        })
        .await?;
    info!(user_id = %admin.id, "Admin account created");
    Ok(admin.id)
}

async fn seed_groups(db: &Database) -> Result<()> {
    let groups = [
        (
            "Sales",
            "المبيعات",
            PermissionSet { manage_sales: true, manage_customers: true, ..Default::default() },
        ),
        (
            "Inventory",
            "المخزون",
            PermissionSet { manage_inventory: true, manage_suppliers: true, ..Default::default() },
        ),
        (
            "Accounting",
            "المحاسبة",
            PermissionSet { view_reports: true, view_financial: true, ..Default::default() },
        ),
    ];

    for (name, name_arabic, permissions) in groups {
        db.groups()
            .create(&GroupInput {
                name: name.to_string(),
                name_arabic: name_arabic.to_string(),
                description: None,
                permissions,
            })
            .await?;
    }
    info!(count = 3, "Groups created");
    Ok(())
}

async fn seed_catalog(db: &Database, admin_id: &str) -> Result<()> {
    let mut category_ids = std::collections::HashMap::new();
    for (name, icon, color) in [
        ("Frames", "glasses", "#3B82F6"),
        ("Lenses", "eye", "#10B981"),
        ("Contact Lenses", "circle", "#8B5CF6"),
        ("Solutions", "droplet", "#06B6D4"),
        ("Accessories", "box", "#F59E0B"),
    ] {
        let category = db
            .categories()
            .create(&CategoryInput {
                name: name.to_string(),
                icon: Some(icon.to_string()),
                color: Some(color.to_string()),
                is_active: true,
                ..Default::default()
            })
            .await?;
        category_ids.insert(name, category.id);
    }

    let supplier = db
        .suppliers()
        .create(&PartnerInput {
            company_name: "Gulf Optical Trading".to_string(),
            phone: "511111111".to_string(),
            representative_name: Some("Omar".to_string()),
            ..Default::default()
        })
        .await?;
    db.laboratories()
        .create(&PartnerInput {
            company_name: "Precision Lens Lab".to_string(),
            phone: "522222222".to_string(),
            ..Default::default()
        })
        .await?;

    for (category, name, barcode, quantity, cost, price) in PRODUCTS {
        db.products()
            .create(
                &ProductInput {
                    item_name: name.to_string(),
                    barcode: barcode.to_string(),
                    category_id: category_ids.get(category).cloned(),
                    supplier_id: Some(supplier.id.clone()),
                    quantity: *quantity,
                    cost_price_cents: *cost,
                    selling_price_cents: *price,
                    ..Default::default()
                },
                Some(admin_id),
            )
            .await?;
    }
    info!(count = PRODUCTS.len(), "Products created");

    for (code, name, cost, price) in SERVICES {
        db.services()
            .create(&ServiceInput {
                service_code: code.to_string(),
                service_name: name.to_string(),
                cost_cents: *cost,
                price_cents: *price,
                ..Default::default()
            })
            .await?;
    }

    for (name, phone, gender) in CUSTOMERS {
        db.customers()
            .create(&CustomerInput {
                name: name.to_string(),
                phone: phone.to_string(),
                gender: Some(*gender),
                ..Default::default()
            })
            .await?;
    }
    info!(services = SERVICES.len(), customers = CUSTOMERS.len(), "Services and customers created");
    Ok(())
}

async fn seed_sales(db: &Database, admin_id: &str) -> Result<()> {
    let products = db.products().list(&ProductFilter::default()).await?;
    let customers = db.customers().list(&Default::default()).await?;
    let lab = db.laboratories().list(false).await?.into_iter().next();

    let frame = products.iter().find(|p| p.product.barcode == "6281000000013");
    let lens = products.iter().find(|p| p.product.barcode == "6281000000044");
    let (Some(frame), Some(lens)) = (frame, lens) else {
        return Ok(());
    };

    for (n, entry) in customers.items.iter().take(3).enumerate() {
        let input = SaleInput {
            customer_id: entry.customer.id.clone(),
            laboratory_id: lab.as_ref().map(|l| l.id.clone()),
            products: vec![
                ProductLine {
                    product_id: frame.product.id.clone(),
                    quantity: 1,
                    unit_price_cents: frame.product.selling_price_cents,
                    prescription_right: None,
                    prescription_left: None,
                },
                ProductLine {
                    product_id: lens.product.id.clone(),
                    quantity: 2,
                    unit_price_cents: lens.product.selling_price_cents,
                    prescription_right: Some("-1.25 / -0.50 x 180".to_string()),
                    prescription_left: Some("-1.00 / -0.25 x 170".to_string()),
                },
            ],
            services: vec![ServiceLine {
                service_name: "Comprehensive eye exam".to_string(),
                price_cents: 10_000,
            }],
            paid_cents: if n == 0 { 0 } else { 20_000 },
            payment_method: if n % 2 == 0 { PaymentMethod::Cash } else { PaymentMethod::Mada },
            delivery_date: Some(Utc::now().date_naive() + chrono::Duration::days(3)),
            ..Default::default()
        };
        let sale = db.sales().create(&input, Some(admin_id)).await?;
        info!(order_number = %sale.header.sale.order_number, "Invoice created");
    }
    Ok(())
}
