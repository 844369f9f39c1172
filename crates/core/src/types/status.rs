//! Status enums for orders, bookings, payments, and accounts.
//!
//! These are stored as `TEXT` columns. Each enum round-trips through
//! `Display`/`FromStr` using the same spelling the JSON API uses, so the
//! database and the wire format never disagree.

use serde::{Deserialize, Serialize};

/// Error returned when a stored or submitted status string is unknown.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind}: {value}")]
pub struct InvalidStatus {
    /// Which enum was being parsed.
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
}

macro_rules! text_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// The canonical string form used in the database and API.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ::core::str::FromStr for $name {
            type Err = InvalidStatus;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(InvalidStatus {
                        kind: $kind,
                        value: other.to_owned(),
                    }),
                }
            }
        }
    };
}

/// Lifecycle of a product order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderStatus {
    #[default]
    #[serde(rename = "Order Placed")]
    OrderPlaced,
    Packing,
    Shipped,
    #[serde(rename = "Out for delivery")]
    OutForDelivery,
    Delivered,
    Cancelled,
    #[serde(rename = "Payment Failed")]
    PaymentFailed,
}

text_enum!(OrderStatus, "order status", {
    OrderPlaced => "Order Placed",
    Packing => "Packing",
    Shipped => "Shipped",
    OutForDelivery => "Out for delivery",
    Delivered => "Delivered",
    Cancelled => "Cancelled",
    PaymentFailed => "Payment Failed",
});

impl OrderStatus {
    /// Whether stock held by the order has been returned to the catalog.
    #[must_use]
    pub const fn releases_stock(self) -> bool {
        matches!(self, Self::Cancelled | Self::PaymentFailed)
    }
}

/// How an order is paid for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    /// Cash on delivery.
    Cod,
    /// Razorpay checkout widget.
    Razorpay,
}

text_enum!(PaymentMethod, "payment method", {
    Cod => "cod",
    Razorpay => "razorpay",
});

impl PaymentMethod {
    /// Whether the method needs a gateway order before the customer pays.
    #[must_use]
    pub const fn is_online(self) -> bool {
        matches!(self, Self::Razorpay)
    }
}

/// Lifecycle of a tour or stay booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    /// Created, seats held, payment not yet confirmed.
    #[default]
    Pending,
    /// Paid (or accepted by an admin).
    Confirmed,
    /// Cancelled by the guest, an admin, or a failed payment.
    Cancelled,
    /// The trip or stay has taken place.
    Completed,
}

text_enum!(BookingStatus, "booking status", {
    Pending => "pending",
    Confirmed => "confirmed",
    Cancelled => "cancelled",
    Completed => "completed",
});

impl BookingStatus {
    /// Whether a booking in this state still occupies capacity.
    #[must_use]
    pub const fn holds_capacity(self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed)
    }

    /// Whether the booking can move to `next`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Confirmed | Self::Cancelled)
                | (Self::Confirmed, Self::Cancelled | Self::Completed)
        )
    }
}

/// What a booking reserves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingKind {
    Tour,
    Stay,
}

text_enum!(BookingKind, "booking kind", {
    Tour => "tour",
    Stay => "stay",
});

/// Account role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    #[default]
    Customer,
    /// Back-office access.
    Admin,
}

text_enum!(UserRole, "user role", {
    Customer => "customer",
    Admin => "admin",
});
