//! Domain primitives.
//!
//! Validate-at-construction newtypes for values that cross trust boundaries.
//! An instance of any of these types is, by construction, valid — callers
//! never need to re-check a `Money` for negativity or an `EmailAddress` for
//! shape after it has been built.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Field length/value limits shared across domain primitives.
pub mod limits {
    pub const MAX_EMAIL_LENGTH: usize = 320;
    pub const MAX_MONEY_MINOR_UNITS: i64 = 1_000_000_000_00;
}

/// Error constants for validation failures, kept as named constants so
/// tests and callers can match on stable text rather than ad-hoc strings.
pub mod errmsg {
    pub const EMAIL_EMPTY: &str = "customer_email cannot be empty";
    pub const EMAIL_TOO_LONG: &str = "customer_email exceeds maximum length";
    pub const EMAIL_MISSING_AT: &str = "customer_email must contain exactly one '@'";
    pub const EMAIL_EMPTY_LOCAL_OR_DOMAIN: &str =
        "customer_email local and domain parts must be non-empty";
    pub const EMAIL_DOMAIN_NO_DOT: &str = "customer_email domain must contain a '.'";

    pub const MONEY_NEGATIVE: &str = "monetary amount cannot be negative";
    pub const MONEY_TOO_LARGE: &str = "monetary amount exceeds maximum representable value";

    pub const QUANTITY_ZERO: &str = "quantity must be greater than zero";

    pub const IDEMPOTENCY_KEY_EMPTY: &str = "idempotency key cannot be empty";
    pub const IDEMPOTENCY_KEY_INVALID_UUID: &str = "idempotency key must be a valid UUID";
}

/// Errors raised when constructing or validating a domain primitive.
#[derive(Debug, thiserror::Error, PartialEq, Eq, Clone)]
pub enum DomainError {
    #[error("{0}")]
    InvalidEmail(&'static str),
    #[error("{0}")]
    InvalidMoney(&'static str),
    #[error("{0}")]
    InvalidQuantity(&'static str),
    #[error("{0}")]
    InvalidIdempotencyKey(&'static str),
}

/// A validated email address. Construction enforces a minimal, pragmatic
/// shape check (non-empty local and domain parts, a dot in the domain) —
/// this is not a full RFC 5321 parser, matching what a ticketing system's
/// trust boundary actually needs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EmailAddress(String);

impl EmailAddress {
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        if raw.is_empty() {
            return Err(DomainError::InvalidEmail(errmsg::EMAIL_EMPTY));
        }
        if raw.len() > limits::MAX_EMAIL_LENGTH {
            return Err(DomainError::InvalidEmail(errmsg::EMAIL_TOO_LONG));
        }
        let mut parts = raw.splitn(2, '@');
        let local = parts.next().unwrap_or("");
        let domain = match parts.next() {
            Some(d) if !d.contains('@') => d,
            _ => return Err(DomainError::InvalidEmail(errmsg::EMAIL_MISSING_AT)),
        };
        if local.is_empty() || domain.is_empty() {
            return Err(DomainError::InvalidEmail(
                errmsg::EMAIL_EMPTY_LOCAL_OR_DOMAIN,
            ));
        }
        if !domain.contains('.') {
            return Err(DomainError::InvalidEmail(errmsg::EMAIL_DOMAIN_NO_DOT));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for EmailAddress {
    type Err = DomainError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for EmailAddress {
    type Error = DomainError;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<EmailAddress> for String {
    fn from(value: EmailAddress) -> Self {
        value.0
    }
}

/// A non-negative monetary amount stored as integer minor units (cents),
/// never as a float, so sums across order items are always exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub fn from_minor_units(minor_units: i64) -> Result<Self, DomainError> {
        if minor_units < 0 {
            return Err(DomainError::InvalidMoney(errmsg::MONEY_NEGATIVE));
        }
        if minor_units > limits::MAX_MONEY_MINOR_UNITS {
            return Err(DomainError::InvalidMoney(errmsg::MONEY_TOO_LARGE));
        }
        Ok(Self(minor_units))
    }

    pub fn minor_units(&self) -> i64 {
        self.0
    }

    pub fn checked_add(&self, other: Money) -> Result<Money, DomainError> {
        Money::from_minor_units(self.0.saturating_add(other.0))
    }

    pub fn checked_mul_quantity(&self, quantity: Quantity) -> Result<Money, DomainError> {
        Money::from_minor_units(self.0.saturating_mul(quantity.get() as i64))
    }
}

impl TryFrom<i64> for Money {
    type Error = DomainError;
    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::from_minor_units(value)
    }
}

impl From<Money> for i64 {
    fn from(value: Money) -> Self {
        value.0
    }
}

/// A strictly positive quantity of tickets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Quantity(u32);

impl Quantity {
    pub fn new(value: u32) -> Result<Self, DomainError> {
        if value == 0 {
            return Err(DomainError::InvalidQuantity(errmsg::QUANTITY_ZERO));
        }
        Ok(Self(value))
    }

    pub fn get(&self) -> u32 {
        self.0
    }
}

impl TryFrom<u32> for Quantity {
    type Error = DomainError;
    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Quantity> for u32 {
    fn from(value: Quantity) -> Self {
        value.0
    }
}

/// Caller-supplied idempotency key. Accepted as any non-empty string on the
/// wire but normalized to a UUID internally, matching the data model's
/// unique-index-on-UUID expectation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Uuid", into = "Uuid")]
pub struct IdempotencyKey(Uuid);

impl IdempotencyKey {
    pub fn new(id: Uuid) -> Self {
        Self(id)
    }

    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        if raw.is_empty() {
            return Err(DomainError::InvalidIdempotencyKey(
                errmsg::IDEMPOTENCY_KEY_EMPTY,
            ));
        }
        Uuid::parse_str(raw)
            .map(Self)
            .map_err(|_| DomainError::InvalidIdempotencyKey(errmsg::IDEMPOTENCY_KEY_INVALID_UUID))
    }

    pub fn get(&self) -> Uuid {
        self.0
    }
}

impl From<Uuid> for IdempotencyKey {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl From<IdempotencyKey> for Uuid {
    fn from(value: IdempotencyKey) -> Self {
        value.0
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

macro_rules! uuid_id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new(id: Uuid) -> Self {
                Self(id)
            }

            pub fn get(&self) -> Uuid {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }

        impl From<Uuid> for $name {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }

        impl From<$name> for Uuid {
            fn from(value: $name) -> Self {
                value.0
            }
        }
    };
}

uuid_id_newtype!(HoldId);
uuid_id_newtype!(OrderId);
uuid_id_newtype!(SessionId);
uuid_id_newtype!(TicketTypeId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_accepts_plausible_addresses() {
        assert!(EmailAddress::parse("user@example.com").is_ok());
        assert!(EmailAddress::parse("a.b+c@sub.example.co").is_ok());
    }

    #[test]
    fn email_rejects_missing_at_or_dot() {
        assert!(EmailAddress::parse("").is_err());
        assert!(EmailAddress::parse("no-at-sign").is_err());
        assert!(EmailAddress::parse("user@localhost").is_err());
        assert!(EmailAddress::parse("@example.com").is_err());
        assert!(EmailAddress::parse("user@").is_err());
        assert!(EmailAddress::parse("a@b@example.com").is_err());
    }

    #[test]
    fn money_rejects_negative() {
        assert!(Money::from_minor_units(-1).is_err());
        assert!(Money::from_minor_units(0).is_ok());
    }

    #[test]
    fn money_checked_mul_quantity() {
        let unit_price = Money::from_minor_units(5000).unwrap();
        let quantity = Quantity::new(3).unwrap();
        let total = unit_price.checked_mul_quantity(quantity).unwrap();
        assert_eq!(total.minor_units(), 15000);
    }

    #[test]
    fn quantity_rejects_zero() {
        assert!(Quantity::new(0).is_err());
        assert!(Quantity::new(1).is_ok());
    }

    #[test]
    fn idempotency_key_requires_valid_uuid() {
        assert!(IdempotencyKey::parse("").is_err());
        assert!(IdempotencyKey::parse("not-a-uuid").is_err());
        assert!(IdempotencyKey::parse(&Uuid::new_v4().to_string()).is_ok());
    }
}
