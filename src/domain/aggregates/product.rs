//! Product Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::domain::value_objects::{ProductStatus, Sku};

/// Prices are stored as `NUMERIC(12, 2)`.
const PRICE_SCALE: u32 = 2;
const PRICE_LIMIT: Decimal = Decimal::from_parts(1_410_065_408, 2, 0, false, 0); // 10^10

/// Keys owned by the store; never accepted from a request body.
const RESERVED_KEYS: &[&str] = &["_id", "id", "createdAt", "updatedAt"];

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub sku: Sku,
    pub product_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_category: Option<String>,
    #[serde(default)]
    pub sizes: Vec<String>,
    #[serde(default)]
    pub colors: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub images: Vec<String>,
    #[serde(default, with = "rust_decimal::serde::float_option", skip_serializing_if = "Option::is_none")]
    pub old_price: Option<Decimal>,
    #[serde(with = "rust_decimal::serde::float")]
    pub new_price: Decimal,
    pub stock: u32,
    pub status: ProductStatus,
    /// Free-form catalog attributes (sub-category, fabric, care notes...).
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn set_status(&mut self, status: ProductStatus) {
        self.status = status;
        self.touch();
    }

    pub fn matches(&self, filter: &ProductFilter) -> bool {
        let has = |values: &[String], wanted: &Option<String>| {
            wanted.as_ref().map_or(true, |w| values.iter().any(|v| v == w))
        };
        filter.category.as_ref().map_or(true, |c| self.main_category.as_ref() == Some(c))
            && has(&self.sizes, &filter.size)
            && has(&self.colors, &filter.color)
            && has(&self.tags, &filter.tag)
            && filter.price_range.map_or(true, |(min, max)| self.new_price >= min && self.new_price <= max)
    }

    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

/// Listing filter; every set field must match.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProductFilter {
    pub category: Option<String>,
    pub size: Option<String>,
    pub color: Option<String>,
    pub tag: Option<String>,
    /// Inclusive bounds on `newPrice`.
    pub price_range: Option<(Decimal, Decimal)>,
}

/// Create/replace payload.
#[derive(Clone, Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_prices"))]
pub struct ProductInput {
    #[serde(default)]
    #[validate(length(min = 1, message = "Missing required field: sku"))]
    pub sku: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "Missing required field: productName"))]
    pub product_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub main_category: Option<String>,
    #[serde(default)]
    pub sizes: Vec<String>,
    #[serde(default)]
    pub colors: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    #[validate(length(min = 1, message = "At least one product image is required"))]
    pub images: Vec<String>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub old_price: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub new_price: Option<Decimal>,
    #[serde(default)]
    #[validate(
        required(message = "Missing required field: stock"),
        range(min = 0, message = "Stock cannot be negative")
    )]
    pub stock: Option<i64>,
    #[serde(default)]
    pub status: Option<ProductStatus>,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

fn validate_prices(input: &ProductInput) -> Result<(), ValidationError> {
    let fail = |code: &'static str, message: &'static str| {
        let mut err = ValidationError::new(code);
        err.message = Some(message.into());
        Err(err)
    };
    let Some(new_price) = input.new_price else {
        return fail("required", "Missing required field: newPrice");
    };
    if new_price <= Decimal::ZERO {
        return fail("range", "Price must be greater than 0");
    }
    for price in [Some(new_price), input.old_price].into_iter().flatten() {
        if price.normalize().scale() > PRICE_SCALE {
            return fail("precision", "Price cannot have more than 2 decimal places");
        }
        if price.abs() >= PRICE_LIMIT {
            return fail("range", "Price is too large");
        }
    }
    match input.old_price {
        Some(old) if old < new_price => fail("price_order", "Old price must be greater than new price"),
        _ => Ok(()),
    }
}

/// Field order the first reported error is picked from.
const FIELD_ORDER: &[&str] = &["sku", "product_name", "stock", "images", "__all__"];

fn first_message(errors: &ValidationErrors) -> String {
    let fields = errors.field_errors();
    FIELD_ORDER
        .iter()
        .filter_map(|name| fields.get(name))
        .flat_map(|errs| errs.iter())
        .find_map(|e| e.message.as_ref().map(|m| m.to_string()))
        .unwrap_or_else(|| errors.to_string())
}

impl ProductInput {
    pub fn check(&self) -> Result<(), ProductError> {
        self.validate().map_err(|e| ProductError::Invalid(first_message(&e)))
    }

    /// Validates and builds the stored product. `created_at` is preserved on replace.
    pub fn into_product(self, id: Uuid, created_at: DateTime<Utc>) -> Result<Product, ProductError> {
        self.check()?;
        let sku = Sku::new(self.sku).map_err(|e| ProductError::Invalid(e.to_string()))?;
        let stock = self
            .stock
            .map_or(Ok(0), u32::try_from)
            .map_err(|_| ProductError::Invalid("Stock is too large".into()))?;
        let new_price = self.new_price.unwrap_or_default();
        let mut attributes = self.attributes;
        for key in RESERVED_KEYS { attributes.remove(*key); }
        Ok(Product {
            id,
            sku,
            product_name: self.product_name,
            description: self.description,
            main_category: self.main_category,
            sizes: self.sizes,
            colors: self.colors,
            tags: self.tags,
            images: self.images,
            old_price: self.old_price,
            new_price,
            stock,
            status: self.status.unwrap_or_default(),
            attributes,
            created_at,
            updated_at: Utc::now(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProductError {
    #[error("{0}")]
    Invalid(String),
}
