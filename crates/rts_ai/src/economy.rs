//! Two-resource ledger with passive regeneration.
//!
//! All balances are clamped integers: every operation is total and a
//! ledger can never hold a negative or over-cap amount.

use serde::{Deserialize, Serialize};

use crate::math::{consume_interval, fixed_decimal, Fixed};

/// The two depletable resource kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceKind {
    /// First resource kind. Mined at bases, regenerates passively.
    Gold,
    /// Second resource kind. Harvested from the field.
    Lumber,
}

impl ResourceKind {
    /// The other resource kind.
    #[must_use]
    pub const fn other(self) -> Self {
        match self {
            Self::Gold => Self::Lumber,
            Self::Lumber => Self::Gold,
        }
    }
}

/// A price (or an amount) in both resource kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Cost {
    /// Gold component.
    pub gold: i32,
    /// Lumber component.
    pub lumber: i32,
}

impl Cost {
    /// Create a new cost.
    #[must_use]
    pub const fn new(gold: i32, lumber: i32) -> Self {
        Self { gold, lumber }
    }

    /// Zero cost.
    pub const ZERO: Self = Self { gold: 0, lumber: 0 };

    /// Amount of one resource kind.
    #[must_use]
    pub const fn of(&self, kind: ResourceKind) -> i32 {
        match kind {
            ResourceKind::Gold => self.gold,
            ResourceKind::Lumber => self.lumber,
        }
    }
}

impl std::ops::Add for Cost {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            gold: self.gold.saturating_add(rhs.gold),
            lumber: self.lumber.saturating_add(rhs.lumber),
        }
    }
}

/// Static ledger configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Starting gold.
    pub starting_gold: i32,
    /// Starting lumber.
    pub starting_lumber: i32,
    /// Maximum gold that can be held.
    pub gold_cap: i32,
    /// Maximum lumber that can be held.
    pub lumber_cap: i32,
    /// Seconds between passive gold payments. Zero disables regeneration.
    #[serde(with = "fixed_decimal")]
    pub regen_interval: Fixed,
    /// Gold paid per regeneration interval.
    pub regen_amount: i32,
    /// Multiplier applied to the regeneration amount while in Siege.
    pub siege_multiplier: i32,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            starting_gold: 400,
            starting_lumber: 200,
            gold_cap: 20_000,
            lumber_cap: 20_000,
            regen_interval: Fixed::from_num(5),
            regen_amount: 5,
            siege_multiplier: 5,
        }
    }
}

/// Per-faction resource store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLedger {
    gold: i32,
    lumber: i32,
    gold_cap: i32,
    lumber_cap: i32,
    #[serde(with = "crate::math::fixed_serde")]
    regen_interval: Fixed,
    regen_amount: i32,
    siege_multiplier: i32,
    #[serde(with = "crate::math::fixed_serde")]
    regen_timer: Fixed,
}

impl ResourceLedger {
    /// Create a ledger from configuration.
    #[must_use]
    pub fn new(config: &LedgerConfig) -> Self {
        let gold_cap = config.gold_cap.max(0);
        let lumber_cap = config.lumber_cap.max(0);
        Self {
            gold: config.starting_gold.clamp(0, gold_cap),
            lumber: config.starting_lumber.clamp(0, lumber_cap),
            gold_cap,
            lumber_cap,
            regen_interval: config.regen_interval,
            regen_amount: config.regen_amount,
            siege_multiplier: config.siege_multiplier,
            regen_timer: Fixed::ZERO,
        }
    }

    /// Current gold balance.
    #[must_use]
    pub const fn gold(&self) -> i32 {
        self.gold
    }

    /// Current lumber balance.
    #[must_use]
    pub const fn lumber(&self) -> i32 {
        self.lumber
    }

    /// Both balances as a [`Cost`].
    #[must_use]
    pub const fn balance(&self) -> Cost {
        Cost::new(self.gold, self.lumber)
    }

    /// Balance of one resource kind.
    #[must_use]
    pub const fn amount(&self, kind: ResourceKind) -> i32 {
        match kind {
            ResourceKind::Gold => self.gold,
            ResourceKind::Lumber => self.lumber,
        }
    }

    /// Check whether both components of a cost are covered.
    #[must_use]
    pub const fn check_afford(&self, gold: i32, lumber: i32) -> bool {
        self.gold >= gold && self.lumber >= lumber
    }

    /// Check whether a [`Cost`] is covered.
    #[must_use]
    pub const fn can_afford(&self, cost: Cost) -> bool {
        self.check_afford(cost.gold, cost.lumber)
    }

    /// Resource kinds the ledger is currently short of for `cost`.
    #[must_use]
    pub const fn shortfall(&self, cost: Cost) -> (bool, bool) {
        (self.gold < cost.gold, self.lumber < cost.lumber)
    }

    /// Deduct a cost.
    ///
    /// Callers check affordability first; the balance is floored at zero
    /// rather than rejected.
    pub fn spend(&mut self, gold: i32, lumber: i32) {
        self.gold = self.gold.saturating_sub(gold).max(0);
        self.lumber = self.lumber.saturating_sub(lumber).max(0);
    }

    /// Deduct a [`Cost`].
    pub fn spend_cost(&mut self, cost: Cost) {
        self.spend(cost.gold, cost.lumber);
    }

    /// Credit both resource kinds, clamped to the caps.
    pub fn add(&mut self, gold: i32, lumber: i32) {
        self.gold = self.gold.saturating_add(gold).clamp(0, self.gold_cap);
        self.lumber = self.lumber.saturating_add(lumber).clamp(0, self.lumber_cap);
    }

    /// Advance the passive regeneration timer.
    ///
    /// Each time the timer crosses the configured interval, gold is
    /// credited; the payment is multiplied while `in_siege`. Returns the
    /// gold credited during this call (before clamping).
    pub fn tick_regen(&mut self, dt: Fixed, in_siege: bool) -> i32 {
        if self.regen_interval <= Fixed::ZERO {
            return 0;
        }

        self.regen_timer = self.regen_timer.saturating_add(dt);

        let per_payment = if in_siege {
            self.regen_amount.saturating_mul(self.siege_multiplier)
        } else {
            self.regen_amount
        };

        let mut paid = 0i32;
        while consume_interval(&mut self.regen_timer, self.regen_interval) {
            self.add(per_payment, 0);
            paid = paid.saturating_add(per_payment);
        }
        paid
    }
}

impl Default for ResourceLedger {
    fn default() -> Self {
        Self::new(&LedgerConfig::default())
    }
}
