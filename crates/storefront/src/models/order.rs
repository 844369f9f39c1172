//! Order types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use kharnak_core::{Email, OrderId, OrderStatus, PaymentMethod, ProductId, UserId};

use super::{ValidationError, optional_text, require_text};

/// One purchased line, priced at the time the order was placed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product_id: ProductId,
    pub name: String,
    pub size: String,
    pub quantity: u32,
    pub unit_price: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl OrderItem {
    /// `unit_price * quantity`.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Delivery address captured at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub email: String,
    pub street: String,
    pub city: String,
    #[serde(default)]
    pub state: String,
    pub zipcode: String,
    pub country: String,
    pub phone: String,
}

impl Address {
    /// Validate and trim the address.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] naming the first missing field, or for
    /// an invalid email or phone number.
    pub fn validate(self) -> Result<Self, ValidationError> {
        let email = Email::parse(&self.email)
            .map_err(|_| ValidationError::new("Enter a valid email address"))?;

        let phone = require_text(&self.phone, "Phone")?;
        let digits = phone.chars().filter(char::is_ascii_digit).count();
        let allowed = phone
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '+' | ' ' | '-' | '(' | ')'));
        if !allowed || !(7..=15).contains(&digits) {
            return Err(ValidationError::new("Enter a valid phone number"));
        }

        Ok(Self {
            first_name: require_text(&self.first_name, "First name")?,
            last_name: optional_text(Some(&self.last_name)).unwrap_or_default(),
            email: email.into_inner(),
            street: require_text(&self.street, "Street")?,
            city: require_text(&self.city, "City")?,
            state: optional_text(Some(&self.state)).unwrap_or_default(),
            zipcode: require_text(&self.zipcode, "Zipcode")?,
            country: require_text(&self.country, "Country")?,
            phone,
        })
    }
}

/// A placed order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub items: Vec<OrderItem>,
    pub subtotal: Decimal,
    pub delivery_fee: Decimal,
    /// `subtotal + delivery_fee`.
    pub amount: Decimal,
    pub address: Address,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    /// Whether payment has been received.
    pub payment: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway_order_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway_payment_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn address() -> Address {
        Address {
            first_name: " Stanzin ".into(),
            last_name: String::new(),
            email: "Stanzin@Example.com".into(),
            street: "Old Road".into(),
            city: "Leh".into(),
            state: "Ladakh".into(),
            zipcode: "194101".into(),
            country: "India".into(),
            phone: "+91 98765 43210".into(),
        }
    }

    #[test]
    fn test_address_validate_normalizes() {
        let addr = address().validate().unwrap();
        assert_eq!(addr.first_name, "Stanzin");
        assert_eq!(addr.email, "stanzin@example.com");
    }

    #[test]
    fn test_address_validate_rejects_bad_phone() {
        let mut addr = address();
        addr.phone = "call me".into();
        assert_eq!(
            addr.validate().unwrap_err().to_string(),
            "Enter a valid phone number"
        );
    }

    #[test]
    fn test_address_validate_requires_city() {
        let mut addr = address();
        addr.city = " ".into();
        assert_eq!(addr.validate().unwrap_err().to_string(), "City is required");
    }

    #[test]
    fn test_line_total() {
        let item = OrderItem {
            product_id: ProductId::new(1),
            name: "Apricot Jam".into(),
            size: "Standard".into(),
            quantity: 3,
            unit_price: Decimal::new(24_950, 2),
            image: None,
        };
        assert_eq!(item.line_total(), Decimal::new(74_850, 2));
    }
}
