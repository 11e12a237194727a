use serde::{Deserialize, Serialize};

/// Declares a string-backed identifier assigned by the commerce backend.
///
/// Each identifier is its own type so a transaction id can never be passed
/// where an estimate id is expected.
macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates the identifier from any string-like value.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Returns true if the identifier is the empty string.
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Identifier of a checkout transaction.
    TransactionId
);

string_id!(
    /// Identifier of an estimate (quote). Draft estimates use a `draft-` prefix.
    EstimateId
);

string_id!(
    /// Identifier of a persisted order.
    OrderId
);

string_id!(
    /// Public identifier of a sellable service.
    ServiceId
);

string_id!(
    /// Identifier of a sellable asset; unique per order line.
    AssetId
);

string_id!(
    /// Identifier of a seller or buyer organization.
    OrganizationId
);

string_id!(
    /// Identifier of a buyer user account.
    UserId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_compare_by_value() {
        assert_eq!(AssetId::new("A"), AssetId::from("A"));
        assert_ne!(AssetId::new("A"), AssetId::new("B"));
    }

    #[test]
    fn ids_serialize_as_plain_strings() {
        let id = TransactionId::new("txn-42");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"txn-42\"");

        let back: TransactionId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn display_matches_inner_value() {
        let id = EstimateId::new("est-1");
        assert_eq!(id.to_string(), "est-1");
        assert_eq!(id.as_str(), "est-1");
        assert!(!id.is_empty());
        assert!(EstimateId::new("").is_empty());
    }
}
