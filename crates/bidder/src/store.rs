//! Campaign storage with budget-safe win accounting.
//!
//! All mutation happens under one write lock, so a win notice either fully
//! applies (spend, stats, frequency counter) or is rejected. Applying the
//! same notice twice is a no-op keyed by request id, which makes
//! at-least-once win delivery safe.

use std::collections::{HashMap, HashSet};

use chrono::{NaiveDate, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;

use adx_core::{Campaign, CampaignStats, WinNotice};

use crate::error::BidderError;

type FrequencyKey = (String, String, NaiveDate);

#[derive(Debug, Default)]
struct Inner {
    campaigns: HashMap<String, Campaign>,
    stats: HashMap<String, CampaignStats>,
    frequency: HashMap<FrequencyKey, u32>,
    applied_wins: HashSet<String>,
}

/// Thread-safe store for campaigns and their delivery counters.
#[derive(Debug, Default)]
pub struct CampaignStore {
    inner: RwLock<Inner>,
}

impl CampaignStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a new campaign.
    ///
    /// # Errors
    /// Returns `DuplicateCampaign` if the id is taken, or the campaign's own
    /// validation error.
    pub fn insert(&self, campaign: Campaign) -> Result<(), BidderError> {
        campaign.validate()?;
        let mut inner = self.inner.write();
        if inner.campaigns.contains_key(&campaign.id) {
            return Err(BidderError::DuplicateCampaign(campaign.id));
        }
        let id = campaign.id.clone();
        inner.stats.insert(id.clone(), CampaignStats::empty(&id));
        inner.campaigns.insert(id.clone(), campaign);
        tracing::info!(campaign = %id, "campaign created");
        Ok(())
    }

    /// Removes a campaign and its stats.
    ///
    /// # Errors
    /// Returns `UnknownCampaign` if no such campaign exists.
    pub fn remove(&self, campaign_id: &str) -> Result<Campaign, BidderError> {
        let mut inner = self.inner.write();
        let campaign = inner
            .campaigns
            .remove(campaign_id)
            .ok_or_else(|| BidderError::UnknownCampaign(campaign_id.to_string()))?;
        inner.stats.remove(campaign_id);
        tracing::info!(campaign = %campaign_id, "campaign removed");
        Ok(campaign)
    }

    #[must_use]
    pub fn get(&self, campaign_id: &str) -> Option<Campaign> {
        self.inner.read().campaigns.get(campaign_id).cloned()
    }

    #[must_use]
    pub fn list(&self) -> Vec<Campaign> {
        let mut campaigns: Vec<_> = self.inner.read().campaigns.values().cloned().collect();
        campaigns.sort_by(|a, b| a.id.cmp(&b.id));
        campaigns
    }

    /// Campaigns that are active with budget remaining.
    #[must_use]
    pub fn serving(&self) -> Vec<Campaign> {
        self.list().into_iter().filter(Campaign::is_serving).collect()
    }

    #[must_use]
    pub fn stats(&self, campaign_id: &str) -> Option<CampaignStats> {
        self.inner.read().stats.get(campaign_id).cloned()
    }

    #[must_use]
    pub fn all_stats(&self) -> Vec<CampaignStats> {
        let mut stats: Vec<_> = self.inner.read().stats.values().cloned().collect();
        stats.sort_by(|a, b| a.campaign_id.cmp(&b.campaign_id));
        stats
    }

    /// Total spend across all campaigns.
    #[must_use]
    pub fn total_spend(&self) -> Decimal {
        self.inner
            .read()
            .campaigns
            .values()
            .map(|c| c.spent)
            .sum()
    }

    /// Impressions served to a user for a campaign on the given day.
    #[must_use]
    pub fn frequency_count(&self, user_id: &str, campaign_id: &str, date: NaiveDate) -> u32 {
        self.inner
            .read()
            .frequency
            .get(&(user_id.to_string(), campaign_id.to_string(), date))
            .copied()
            .unwrap_or(0)
    }

    /// Applies a win notice: bumps spend, impression stats, and the user's
    /// frequency counter, all under one lock.
    ///
    /// Duplicate notices (same request id) are acknowledged without effect.
    ///
    /// # Errors
    /// Returns `UnknownCampaign` or `BudgetExceeded`; a rejected win leaves
    /// the store untouched.
    pub fn record_win(&self, notice: &WinNotice, date: NaiveDate) -> Result<(), BidderError> {
        notice.validate()?;
        let mut inner = self.inner.write();

        if inner.applied_wins.contains(&notice.request_id) {
            tracing::debug!(request = %notice.request_id, "duplicate win notice ignored");
            return Ok(());
        }

        let campaign = inner
            .campaigns
            .get(&notice.campaign_id)
            .ok_or_else(|| BidderError::UnknownCampaign(notice.campaign_id.clone()))?;

        if campaign.spent + notice.price > campaign.budget {
            return Err(BidderError::BudgetExceeded {
                campaign_id: campaign.id.clone(),
                budget: campaign.budget,
                spent: campaign.spent,
                price: notice.price,
            });
        }

        let now = Utc::now();
        if let Some(campaign) = inner.campaigns.get_mut(&notice.campaign_id) {
            campaign.spent += notice.price;
            campaign.updated_at = now;
        }
        let stats = inner
            .stats
            .entry(notice.campaign_id.clone())
            .or_insert_with(|| CampaignStats::empty(&notice.campaign_id));
        stats.impressions += 1;
        stats.spend += notice.price;
        stats.updated_at = now;

        let key = (
            notice.user_id.clone(),
            notice.campaign_id.clone(),
            date,
        );
        *inner.frequency.entry(key).or_insert(0) += 1;
        inner.applied_wins.insert(notice.request_id.clone());

        tracing::info!(
            campaign = %notice.campaign_id,
            user = %notice.user_id,
            price = %notice.price,
            "win recorded"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adx_core::{CampaignStatus, Creative, Targeting};
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn campaign(id: &str, budget: Decimal) -> Campaign {
        Campaign {
            id: id.to_string(),
            name: format!("campaign {id}"),
            advertiser_id: "adv-1".to_string(),
            budget,
            spent: Decimal::ZERO,
            targeting: Targeting::default(),
            creative: Creative {
                title: "Creative".to_string(),
                description: None,
                image_url: None,
            },
            status: CampaignStatus::Active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn notice(request_id: &str, campaign_id: &str, price: Decimal) -> WinNotice {
        WinNotice {
            request_id: request_id.to_string(),
            campaign_id: campaign_id.to_string(),
            user_id: "user-1".to_string(),
            price,
        }
    }

    fn today() -> NaiveDate {
        Utc::now().date_naive()
    }

    // ============================================
    // CRUD
    // ============================================

    #[test]
    fn insert_and_get() {
        let store = CampaignStore::new();
        store.insert(campaign("camp-1", dec!(100))).unwrap();
        assert_eq!(store.get("camp-1").unwrap().budget, dec!(100));
        assert_eq!(store.stats("camp-1").unwrap().impressions, 0);
    }

    #[test]
    fn duplicate_insert_rejected() {
        let store = CampaignStore::new();
        store.insert(campaign("camp-1", dec!(100))).unwrap();
        let err = store.insert(campaign("camp-1", dec!(50))).unwrap_err();
        assert!(matches!(err, BidderError::DuplicateCampaign(_)));
    }

    #[test]
    fn remove_unknown_campaign_errors() {
        let store = CampaignStore::new();
        assert!(matches!(
            store.remove("ghost"),
            Err(BidderError::UnknownCampaign(_))
        ));
    }

    #[test]
    fn serving_excludes_paused_and_exhausted() {
        let store = CampaignStore::new();
        store.insert(campaign("active", dec!(100))).unwrap();
        let mut paused = campaign("paused", dec!(100));
        paused.status = CampaignStatus::Paused;
        store.insert(paused).unwrap();
        let mut spent = campaign("spent", dec!(10));
        spent.spent = dec!(10);
        store.insert(spent).unwrap();

        let serving: Vec<_> = store.serving().into_iter().map(|c| c.id).collect();
        assert_eq!(serving, vec!["active"]);
    }

    // ============================================
    // Win accounting
    // ============================================

    #[test]
    fn win_updates_spend_stats_and_frequency() {
        let store = CampaignStore::new();
        store.insert(campaign("camp-1", dec!(100))).unwrap();

        store.record_win(&notice("req-1", "camp-1", dec!(0.61)), today()).unwrap();

        let campaign = store.get("camp-1").unwrap();
        assert_eq!(campaign.spent, dec!(0.61));
        let stats = store.stats("camp-1").unwrap();
        assert_eq!(stats.impressions, 1);
        assert_eq!(stats.spend, dec!(0.61));
        assert_eq!(store.frequency_count("user-1", "camp-1", today()), 1);
    }

    #[test]
    fn duplicate_win_notice_is_a_noop() {
        let store = CampaignStore::new();
        store.insert(campaign("camp-1", dec!(100))).unwrap();

        let n = notice("req-1", "camp-1", dec!(0.61));
        store.record_win(&n, today()).unwrap();
        store.record_win(&n, today()).unwrap();

        assert_eq!(store.get("camp-1").unwrap().spent, dec!(0.61));
        assert_eq!(store.stats("camp-1").unwrap().impressions, 1);
        assert_eq!(store.frequency_count("user-1", "camp-1", today()), 1);
    }

    #[test]
    fn win_past_budget_is_rejected_without_side_effects() {
        let store = CampaignStore::new();
        let mut c = campaign("camp-1", dec!(1.00));
        c.spent = dec!(0.80);
        store.insert(c).unwrap();

        let err = store
            .record_win(&notice("req-1", "camp-1", dec!(0.30)), today())
            .unwrap_err();
        assert!(matches!(err, BidderError::BudgetExceeded { .. }));
        assert_eq!(store.get("camp-1").unwrap().spent, dec!(0.80));
        assert_eq!(store.stats("camp-1").unwrap().impressions, 0);
    }

    #[test]
    fn win_for_unknown_campaign_is_rejected() {
        let store = CampaignStore::new();
        let err = store
            .record_win(&notice("req-1", "ghost", dec!(0.30)), today())
            .unwrap_err();
        assert!(matches!(err, BidderError::UnknownCampaign(_)));
    }

    #[test]
    fn frequency_counts_are_per_day() {
        let store = CampaignStore::new();
        store.insert(campaign("camp-1", dec!(100))).unwrap();
        store.record_win(&notice("req-1", "camp-1", dec!(0.50)), today()).unwrap();

        let tomorrow = today().succ_opt().unwrap();
        assert_eq!(store.frequency_count("user-1", "camp-1", today()), 1);
        assert_eq!(store.frequency_count("user-1", "camp-1", tomorrow), 0);
    }

    #[test]
    fn concurrent_wins_never_oversell_the_budget() {
        let store = Arc::new(CampaignStore::new());
        store.insert(campaign("camp-1", dec!(5.00))).unwrap();

        let mut handles = Vec::new();
        for i in 0..20 {
            let store = Arc::clone(&store);
            handles.push(std::thread::spawn(move || {
                let n = notice(&format!("req-{i}"), "camp-1", dec!(1.00));
                store.record_win(&n, today())
            }));
        }
        let outcomes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let accepted = outcomes.iter().filter(|r| r.is_ok()).count();
        assert_eq!(accepted, 5);
        let campaign = store.get("camp-1").unwrap();
        assert_eq!(campaign.spent, dec!(5.00));
        assert!(campaign.spent <= campaign.budget);
    }
}
