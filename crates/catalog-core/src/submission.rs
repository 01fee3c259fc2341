// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Product submissions awaiting delivery to the catalog service.
//!
//! A [`Submission`] is validated once, at construction, and never changes
//! afterwards. Raw text from an entry form goes through [`ProductForm`]
//! first.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

/// Product category, as named by the catalog service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Shoes,
    Electronics,
    Service,
    Product,
    Clothing,
    Others,
}

impl Category {
    /// All categories in the order an entry form offers them.
    pub const ALL: [Category; 6] = [
        Category::Shoes,
        Category::Electronics,
        Category::Service,
        Category::Product,
        Category::Clothing,
        Category::Others,
    ];

    /// Returns the exact name sent in the `product_type` field.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Shoes => "Shoes",
            Category::Electronics => "Electronics",
            Category::Service => "Service",
            Category::Product => "Product",
            Category::Clothing => "Clothing",
            Category::Others => "Others",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Category {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ValidationError::UnknownCategory(s.to_string()))
    }
}

/// One product-creation request.
///
/// Fields are private: once built, a submission is only ever read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    name: String,
    price: Decimal,
    tax_rate: Decimal,
    category: Category,
    image: Option<Vec<u8>>,
    created_at: DateTime<Utc>,
}

impl Submission {
    /// Creates a submission stamped with the current time.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] if the name is blank, the price is not
    /// positive, or the tax rate is negative.
    pub fn new(
        name: impl Into<String>,
        price: Decimal,
        tax_rate: Decimal,
        category: Category,
        image: Option<Vec<u8>>,
    ) -> Result<Self, ValidationError> {
        Self::from_parts(name, price, tax_rate, category, image, Utc::now())
    }

    /// Rebuilds a submission with a known creation time, e.g. when loading
    /// it back from durable storage. The same checks as [`Submission::new`]
    /// apply.
    pub fn from_parts(
        name: impl Into<String>,
        price: Decimal,
        tax_rate: Decimal,
        category: Category,
        image: Option<Vec<u8>>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        let name = name.into().trim().to_string();
        if name.is_empty() {
            return Err(ValidationError::FieldEmpty {
                field: "product name",
            });
        }
        if price <= Decimal::ZERO {
            return Err(ValidationError::NotPositive { field: "price" });
        }
        if tax_rate < Decimal::ZERO {
            return Err(ValidationError::Negative { field: "tax" });
        }

        Ok(Submission {
            name,
            price,
            tax_rate,
            category,
            image,
            created_at,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn price(&self) -> Decimal {
        self.price
    }

    pub fn tax_rate(&self) -> Decimal {
        self.tax_rate
    }

    pub fn category(&self) -> Category {
        self.category
    }

    /// JPEG bytes attached to the product, if any.
    pub fn image(&self) -> Option<&[u8]> {
        self.image.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Raw, unvalidated product input as typed into an entry form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductForm {
    pub name: String,
    pub price: String,
    pub tax: String,
    pub product_type: String,
    pub image: Option<Vec<u8>>,
}

impl ProductForm {
    /// True when every text field has been filled in.
    ///
    /// This is the cheap check a form runs before enabling its submit
    /// action; [`ProductForm::into_submission`] does the full validation.
    pub fn is_complete(&self) -> bool {
        [&self.name, &self.price, &self.tax, &self.product_type]
            .iter()
            .all(|field| !field.trim().is_empty())
    }

    /// Parses and validates the form into a [`Submission`].
    pub fn into_submission(self) -> Result<Submission, ValidationError> {
        let price = parse_decimal("price", &self.price)?;
        let tax = parse_decimal("tax", &self.tax)?;
        if self.product_type.trim().is_empty() {
            return Err(ValidationError::FieldEmpty {
                field: "product type",
            });
        }
        let category = self.product_type.parse()?;

        Submission::new(self.name, price, tax, category, self.image)
    }
}

fn parse_decimal(field: &'static str, raw: &str) -> Result<Decimal, ValidationError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ValidationError::FieldEmpty { field });
    }
    Decimal::from_str(raw).map_err(|_| ValidationError::InvalidNumber {
        field,
        value: raw.to_string(),
    })
}

#[cfg(test)]
#[path = "submission_tests.rs"]
mod tests;
