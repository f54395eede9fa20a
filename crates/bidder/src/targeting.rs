//! Campaign targeting predicate.
//!
//! Each rule dimension is optional; `None` always passes. Audience rules
//! (interests, segments) need a profile to match, so unprofiled users only
//! qualify for campaigns without audience constraints.

use adx_core::{BidRequest, Targeting, UserProfile};

/// Whether a campaign's targeting accepts this request and profile.
#[must_use]
pub fn matches(targeting: &Targeting, request: &BidRequest, profile: Option<&UserProfile>) -> bool {
    if let Some(devices) = &targeting.device_types {
        if !devices.contains(&request.device.device_type) {
            return false;
        }
    }
    if let Some(countries) = &targeting.countries {
        if !countries.iter().any(|c| c == &request.geo.country) {
            return false;
        }
    }
    if let Some(interests) = &targeting.interests {
        let Some(profile) = profile else { return false };
        if !overlaps(interests, &profile.interests) {
            return false;
        }
    }
    if let Some(segments) = &targeting.segments {
        let Some(profile) = profile else { return false };
        if !overlaps(segments, &profile.segments) {
            return false;
        }
    }
    true
}

fn overlaps(wanted: &[String], held: &[String]) -> bool {
    wanted.iter().any(|w| held.iter().any(|h| h == w))
}

#[cfg(test)]
mod tests {
    use super::*;
    use adx_core::{AdSlot, Device, DeviceType, Geo};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn request(device_type: DeviceType, country: &str) -> BidRequest {
        BidRequest {
            id: "req-1".to_string(),
            user_id: "user-1".to_string(),
            ad_slot: AdSlot {
                id: "slot-1".to_string(),
                width: 300,
                height: 250,
                position: "top".to_string(),
                floor_price: dec!(0.10),
            },
            device: Device {
                device_type,
                os: "Android".to_string(),
                browser: "Chrome".to_string(),
                ip: "198.51.100.4".to_string(),
            },
            geo: Geo {
                country: country.to_string(),
                region: "TX".to_string(),
                city: "Austin".to_string(),
            },
            timestamp: Utc::now(),
        }
    }

    fn profile(interests: &[&str], segments: &[&str]) -> UserProfile {
        UserProfile {
            user_id: "user-1".to_string(),
            interests: interests.iter().map(ToString::to_string).collect(),
            behaviors: vec![],
            segments: segments.iter().map(ToString::to_string).collect(),
            last_updated: Utc::now(),
        }
    }

    #[test]
    fn empty_targeting_matches_everything() {
        let t = Targeting::default();
        assert!(matches(&t, &request(DeviceType::Mobile, "US"), None));
    }

    #[test]
    fn device_rule_filters() {
        let t = Targeting {
            device_types: Some(vec![DeviceType::Desktop]),
            ..Targeting::default()
        };
        assert!(!matches(&t, &request(DeviceType::Mobile, "US"), None));
        assert!(matches(&t, &request(DeviceType::Desktop, "US"), None));
    }

    #[test]
    fn country_rule_filters() {
        let t = Targeting {
            countries: Some(vec!["US".to_string(), "CA".to_string()]),
            ..Targeting::default()
        };
        assert!(matches(&t, &request(DeviceType::Mobile, "CA"), None));
        assert!(!matches(&t, &request(DeviceType::Mobile, "DE"), None));
    }

    #[test]
    fn interest_rule_requires_overlap() {
        let t = Targeting {
            interests: Some(vec!["sports".to_string()]),
            ..Targeting::default()
        };
        let sporty = profile(&["sports", "tech"], &[]);
        let bookish = profile(&["books"], &[]);
        assert!(matches(&t, &request(DeviceType::Mobile, "US"), Some(&sporty)));
        assert!(!matches(&t, &request(DeviceType::Mobile, "US"), Some(&bookish)));
    }

    #[test]
    fn audience_rule_without_profile_does_not_match() {
        let t = Targeting {
            segments: Some(vec!["high_value".to_string()]),
            ..Targeting::default()
        };
        assert!(!matches(&t, &request(DeviceType::Mobile, "US"), None));
    }

    #[test]
    fn all_rules_must_pass() {
        let t = Targeting {
            device_types: Some(vec![DeviceType::Mobile]),
            countries: Some(vec!["US".to_string()]),
            interests: Some(vec!["tech".to_string()]),
            segments: None,
        };
        let p = profile(&["tech"], &[]);
        assert!(matches(&t, &request(DeviceType::Mobile, "US"), Some(&p)));
        assert!(!matches(&t, &request(DeviceType::Mobile, "DE"), Some(&p)));
    }
}
