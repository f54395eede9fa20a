//! Bid price computation.
//!
//! Starts from the configured base price, raises it over the slot floor when
//! one is set, scales by device class and profile richness, then clamps to
//! the configured bounds and rounds to exactly four decimal places.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use adx_core::models::PRICE_SCALE;
use adx_core::{BidRequest, BiddingConfig, DeviceType, UserProfile};

/// Margin applied over a slot floor price.
const FLOOR_MARGIN: Decimal = dec!(1.1);
/// Price uplift per profile interest or segment.
const RICHNESS_STEP: Decimal = dec!(0.05);

fn device_multiplier(device_type: DeviceType) -> Decimal {
    match device_type {
        DeviceType::Mobile => dec!(1.2),
        DeviceType::Desktop => dec!(1.1),
        DeviceType::Tablet => dec!(1.0),
    }
}

/// Computes the price to bid for this request.
#[must_use]
pub fn compute(config: &BiddingConfig, request: &BidRequest, profile: Option<&UserProfile>) -> Decimal {
    let mut price = config.base_price;

    let floor = request.ad_slot.floor_price;
    if floor > Decimal::ZERO {
        price = price.max(floor * FLOOR_MARGIN);
    }

    price *= device_multiplier(request.device.device_type);

    if let Some(profile) = profile {
        let richness = Decimal::from(profile.richness() as u64);
        price *= Decimal::ONE + RICHNESS_STEP * richness;
    }

    price.clamp(config.min_bid, config.max_bid).round_dp(PRICE_SCALE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use adx_core::{AdSlot, Device, Geo};
    use chrono::Utc;

    fn request(device_type: DeviceType, floor: Decimal) -> BidRequest {
        BidRequest {
            id: "req-1".to_string(),
            user_id: "user-1".to_string(),
            ad_slot: AdSlot {
                id: "slot-1".to_string(),
                width: 300,
                height: 250,
                position: "top".to_string(),
                floor_price: floor,
            },
            device: Device {
                device_type,
                os: "Android".to_string(),
                browser: "Chrome".to_string(),
                ip: "198.51.100.4".to_string(),
            },
            geo: Geo {
                country: "US".to_string(),
                region: "TX".to_string(),
                city: "Austin".to_string(),
            },
            timestamp: Utc::now(),
        }
    }

    fn profile(richness: usize) -> UserProfile {
        UserProfile {
            user_id: "user-1".to_string(),
            interests: (0..richness).map(|i| format!("interest-{i}")).collect(),
            behaviors: vec![],
            segments: vec![],
            last_updated: Utc::now(),
        }
    }

    #[test]
    fn price_stays_above_a_high_floor() {
        let config = BiddingConfig::default();
        let price = compute(&config, &request(DeviceType::Tablet, dec!(2.00)), None);
        assert!(price > dec!(2.00));
        assert_eq!(price, dec!(2.20));
    }

    #[test]
    fn zero_floor_uses_base_price() {
        let config = BiddingConfig::default();
        let price = compute(&config, &request(DeviceType::Tablet, Decimal::ZERO), None);
        assert_eq!(price, config.base_price);
    }

    #[test]
    fn mobile_outbids_desktop_outbids_tablet() {
        let config = BiddingConfig::default();
        let mobile = compute(&config, &request(DeviceType::Mobile, Decimal::ZERO), None);
        let desktop = compute(&config, &request(DeviceType::Desktop, Decimal::ZERO), None);
        let tablet = compute(&config, &request(DeviceType::Tablet, Decimal::ZERO), None);
        assert!(mobile > desktop);
        assert!(desktop > tablet);
    }

    #[test]
    fn richer_profiles_raise_the_price() {
        let config = BiddingConfig::default();
        let req = request(DeviceType::Tablet, Decimal::ZERO);
        let sparse = compute(&config, &req, Some(&profile(1)));
        let rich = compute(&config, &req, Some(&profile(4)));
        assert!(rich > sparse);
        assert_eq!(sparse, dec!(0.525));
        assert_eq!(rich, dec!(0.60));
    }

    #[test]
    fn price_is_clamped_to_max_bid() {
        let config = BiddingConfig::default();
        let price = compute(&config, &request(DeviceType::Mobile, dec!(50.00)), None);
        assert_eq!(price, config.max_bid);
    }

    #[test]
    fn price_is_clamped_to_min_bid() {
        let config = BiddingConfig::default().with_price_bounds(dec!(1.00), dec!(10.00));
        let price = compute(&config, &request(DeviceType::Tablet, Decimal::ZERO), None);
        assert_eq!(price, dec!(1.00));
    }

    #[test]
    fn price_has_at_most_four_decimals() {
        let config = BiddingConfig::default();
        let price = compute(
            &config,
            &request(DeviceType::Mobile, dec!(0.3333)),
            Some(&profile(3)),
        );
        assert_eq!(price.round_dp(PRICE_SCALE), price);
    }
}
