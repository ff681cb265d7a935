//! Typed button commands.
//!
//! Every inline button carries a `ShopAction`, encoded to a compact
//! `prefix:payload` string for the wire and decoded exactly once at the
//! transport boundary. Handlers never see raw callback strings.

/// A button press in the storefront UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShopAction {
    SelectCategory(i64),
    SelectProduct(i64),
    InitiateOrder(i64),
    BackToCategories,
    /// Back to the product list of the given category.
    BackToProducts(i64),
}

impl ShopAction {
    /// Encode for a callback payload.
    pub fn encode(&self) -> String {
        match self {
            ShopAction::SelectCategory(id) => format!("cat:{}", id),
            ShopAction::SelectProduct(id) => format!("prod:{}", id),
            ShopAction::InitiateOrder(id) => format!("order:{}", id),
            ShopAction::BackToCategories => "back:cats".to_string(),
            ShopAction::BackToProducts(id) => format!("back:prods:{}", id),
        }
    }

    /// Decode a callback payload. Returns `None` for anything malformed or
    /// unknown; the caller logs and ignores those.
    pub fn parse(data: &str) -> Option<Self> {
        if data == "back:cats" {
            return Some(ShopAction::BackToCategories);
        }
        if let Some(rest) = data.strip_prefix("back:prods:") {
            return rest.parse().ok().map(ShopAction::BackToProducts);
        }
        if let Some(rest) = data.strip_prefix("cat:") {
            return rest.parse().ok().map(ShopAction::SelectCategory);
        }
        if let Some(rest) = data.strip_prefix("prod:") {
            return rest.parse().ok().map(ShopAction::SelectProduct);
        }
        if let Some(rest) = data.strip_prefix("order:") {
            return rest.parse().ok().map(ShopAction::InitiateOrder);
        }
        None
    }
}
