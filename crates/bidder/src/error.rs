use rust_decimal::Decimal;
use thiserror::Error;

use adx_core::ValidationError;

/// Errors produced by the bidding engine and campaign store.
#[derive(Debug, Error)]
pub enum BidderError {
    /// A win would push a campaign past its budget.
    #[error("campaign {campaign_id} budget exceeded: spent {spent} + price {price} > budget {budget}")]
    BudgetExceeded {
        campaign_id: String,
        budget: Decimal,
        spent: Decimal,
        price: Decimal,
    },

    /// The referenced campaign does not exist.
    #[error("campaign {0} not found")]
    UnknownCampaign(String),

    /// A campaign with the same id already exists.
    #[error("campaign {0} already exists")]
    DuplicateCampaign(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn budget_exceeded_display_names_campaign() {
        let err = BidderError::BudgetExceeded {
            campaign_id: "camp-1".to_string(),
            budget: dec!(10),
            spent: dec!(9.5),
            price: dec!(1),
        };
        assert!(err.to_string().contains("camp-1"));
        assert!(err.to_string().contains("budget exceeded"));
    }
}
