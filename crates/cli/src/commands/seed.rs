//! Catalog seeding.
//!
//! Clears the product table and inserts the sample catalog. Intended for
//! development and demo environments only.

use super::CommandError;

struct SeedProduct {
    name: &'static str,
    price: i64,
    digital: bool,
    category: &'static str,
    stock: i32,
    description: &'static str,
}

const PRODUCTS: &[SeedProduct] = &[
    // Electronics
    SeedProduct {
        name: "Wireless Headphones",
        price: 2499,
        digital: false,
        category: "Electronics",
        stock: 45,
        description: "Premium wireless headphones with noise cancellation",
    },
    SeedProduct {
        name: "Smartwatch",
        price: 3999,
        digital: false,
        category: "Electronics",
        stock: 30,
        description: "Fitness tracking smartwatch with heart rate monitor",
    },
    SeedProduct {
        name: "Bluetooth Speaker",
        price: 1899,
        digital: false,
        category: "Electronics",
        stock: 50,
        description: "Portable wireless speaker with rich bass",
    },
    SeedProduct {
        name: "Laptop",
        price: 54999,
        digital: false,
        category: "Electronics",
        stock: 15,
        description: "High-performance laptop for work and gaming",
    },
    SeedProduct {
        name: "Smartphone",
        price: 29999,
        digital: false,
        category: "Electronics",
        stock: 25,
        description: "Latest smartphone with advanced camera system",
    },
    SeedProduct {
        name: "Wireless Mouse",
        price: 799,
        digital: false,
        category: "Electronics",
        stock: 60,
        description: "Ergonomic wireless mouse with precision tracking",
    },
    // Clothing & fashion
    SeedProduct {
        name: "Cotton T-Shirt",
        price: 599,
        digital: false,
        category: "Clothing",
        stock: 100,
        description: "Comfortable cotton t-shirt for everyday wear",
    },
    SeedProduct {
        name: "Denim Jeans",
        price: 1499,
        digital: false,
        category: "Clothing",
        stock: 75,
        description: "Classic fit denim jeans with premium fabric",
    },
    SeedProduct {
        name: "Hoodie",
        price: 1899,
        digital: false,
        category: "Clothing",
        stock: 50,
        description: "Warm and cozy hoodie for winter",
    },
    // Footwear
    SeedProduct {
        name: "Running Shoes",
        price: 3499,
        digital: false,
        category: "Footwear",
        stock: 40,
        description: "Lightweight running shoes with cushioned sole",
    },
    SeedProduct {
        name: "Sneakers",
        price: 2999,
        digital: false,
        category: "Footwear",
        stock: 55,
        description: "Trendy sneakers for casual wear",
    },
    // Accessories
    SeedProduct {
        name: "Sunglasses",
        price: 1299,
        digital: false,
        category: "Accessories",
        stock: 70,
        description: "UV protection sunglasses with stylish design",
    },
    SeedProduct {
        name: "Travel Backpack",
        price: 1999,
        digital: false,
        category: "Accessories",
        stock: 35,
        description: "Durable backpack with multiple compartments",
    },
    // Home & kitchen
    SeedProduct {
        name: "Coffee Mug",
        price: 299,
        digital: false,
        category: "Home & Kitchen",
        stock: 100,
        description: "Ceramic coffee mug with elegant design",
    },
    SeedProduct {
        name: "Desk Lamp",
        price: 1499,
        digital: false,
        category: "Home & Kitchen",
        stock: 45,
        description: "LED desk lamp with adjustable brightness",
    },
    // Digital goods
    SeedProduct {
        name: "Programming Book",
        price: 499,
        digital: true,
        category: "Books",
        stock: 999,
        description: "Complete guide to modern programming",
    },
    SeedProduct {
        name: "Source Code Package",
        price: 1999,
        digital: true,
        category: "Digital",
        stock: 999,
        description: "Premium source code templates and projects",
    },
];

/// Replace the catalog with the sample products.
///
/// # Errors
///
/// Returns `CommandError` when the database is unreachable or an insert
/// fails.
pub async fn run() -> Result<(), CommandError> {
    let pool = super::connect().await?;

    sqlx::query("DELETE FROM store.products").execute(&pool).await?;
    tracing::info!("Cleared existing products");

    for product in PRODUCTS {
        sqlx::query(
            "INSERT INTO store.products (name, price, digital, description, stock, category) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(product.name)
        .bind(product.price)
        .bind(product.digital)
        .bind(product.description)
        .bind(product.stock)
        .bind(product.category)
        .execute(&pool)
        .await?;

        tracing::info!(name = product.name, price = product.price, "created product");
    }

    tracing::info!(total = PRODUCTS.len(), "seeding complete");
    Ok(())
}
