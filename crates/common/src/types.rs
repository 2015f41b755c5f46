use serde::{Deserialize, Serialize};

/// Declares a numeric row identifier.
///
/// Every identifier wraps the `BIGSERIAL` key of its table, so a cart line id
/// can never be passed where a product id is expected.
macro_rules! row_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Creates an identifier from its raw database value.
            pub fn new(id: i64) -> Self {
                Self(id)
            }

            /// Returns the raw database value.
            pub fn as_i64(&self) -> i64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

row_id!(
    /// Identifier of an authenticated user. Opaque to the core and always positive.
    UserId
);

row_id!(
    /// Identifier of a catalog product.
    ProductId
);

row_id!(
    /// Identifier of a user's cart. Each user owns at most one.
    CartId
);

row_id!(
    /// Identifier of a single (product, quantity) line inside a cart.
    CartLineId
);

row_id!(
    /// Identifier of a placed order.
    OrderId
);

impl UserId {
    /// Returns true if the id could belong to a real user.
    pub fn is_valid(&self) -> bool {
        self.0 > 0
    }
}
