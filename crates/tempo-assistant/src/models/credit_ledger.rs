use tracing::debug;

use tempo_client::types::{SubscriptionTier, UserProfile};

/// Cost of one conversational turn, in credit units.
pub const CHAT_TURN_COST: u32 = 2;

/// Cost of one file-analysis turn, in credit units.
pub const FILE_ANALYSIS_TURN_COST: u32 = 3;

/// Local view of the two-pool credit balance. Pure accounting, no I/O.
///
/// The backend owns post-request balances: the client never decrements
/// optimistically (retries would double-count), it only replaces its view
/// wholesale via [`CreditLedger::reconcile`] or a profile refresh. The
/// monthly pool is the one drawn down first server-side.
#[derive(Debug, Clone)]
pub struct CreditLedger {
    tier: SubscriptionTier,
    monthly_credits: u32,
    purchased_credits: u32,
}

impl CreditLedger {
    pub fn new(tier: SubscriptionTier, monthly_credits: u32, purchased_credits: u32) -> Self {
        Self {
            tier,
            monthly_credits,
            purchased_credits,
        }
    }

    /// Ledger used before the first profile load. Free tier with empty pools
    /// blocks sends until real figures arrive.
    pub fn empty() -> Self {
        Self::new(SubscriptionTier::Free, 0, 0)
    }

    /// Replace the whole ledger with authoritative profile figures.
    pub fn apply_profile(&mut self, profile: &UserProfile) {
        self.tier = profile.subscription_tier;
        self.monthly_credits = profile.ai_credits_monthly;
        self.purchased_credits = profile.ai_credits_purchased;
        debug!(
            tier = ?self.tier,
            monthly = self.monthly_credits,
            purchased = self.purchased_credits,
            "ledger initialized from profile"
        );
    }

    /// Whether a request of `cost` units may be dispatched.
    ///
    /// Free tier requires the combined pools to cover the cost. Non-free
    /// tiers may have monthly allotments refreshed server-side even when the
    /// local view is stale, so they only block on a fully empty balance —
    /// never on tier alone.
    pub fn can_afford(&self, cost: u32) -> bool {
        let total = self.total_credits();
        match self.tier {
            SubscriptionTier::Free => total >= cost,
            _ => total > 0,
        }
    }

    /// Adopt authoritative remaining counts returned by the backend. Present
    /// values fully replace the local ones; absent values are left untouched,
    /// never guessed.
    pub fn reconcile(&mut self, remaining_monthly: Option<u32>, remaining_purchased: Option<u32>) {
        if let Some(monthly) = remaining_monthly {
            self.monthly_credits = monthly;
        }
        if let Some(purchased) = remaining_purchased {
            self.purchased_credits = purchased;
        }
        debug!(
            monthly = self.monthly_credits,
            purchased = self.purchased_credits,
            "ledger reconciled"
        );
    }

    pub fn tier(&self) -> SubscriptionTier {
        self.tier
    }

    pub fn monthly_credits(&self) -> u32 {
        self.monthly_credits
    }

    pub fn purchased_credits(&self) -> u32 {
        self.purchased_credits
    }

    pub fn total_credits(&self) -> u32 {
        self.monthly_credits + self.purchased_credits
    }
}

impl Default for CreditLedger {
    fn default() -> Self {
        Self::empty()
    }
}
