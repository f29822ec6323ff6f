//! Persisted store key names.
//!
//! Each store owns a disjoint set of keys, so there is no cross-store
//! contention on the shared backend.

use campus_market_core::{Section, UserId};

/// Cart key for anonymous visitors, and for every visitor when the cart is
/// shared across users.
pub const CART: &str = "cart";

/// Order payload kept across the redirect to the payment provider.
pub const PENDING_ORDER_PAYLOAD: &str = "pending-order-payload";

/// Cart key for a signed-in user.
#[must_use]
pub fn user_cart(user: &UserId) -> String {
    format!("{CART}:{user}")
}

/// Favorites key for a user.
#[must_use]
pub fn favorites(user: &UserId) -> String {
    format!("favorites:{user}")
}

/// Last delivery address used for a marketplace section.
#[must_use]
pub fn delivery_address(section: Section) -> String {
    format!("delivery-address:{section}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_names() {
        let user = UserId::new("u1");
        assert_eq!(user_cart(&user), "cart:u1");
        assert_eq!(favorites(&user), "favorites:u1");
        assert_eq!(
            delivery_address(Section::StudyMaterials),
            "delivery-address:study-materials"
        );
    }
}
