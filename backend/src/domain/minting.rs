//! Mint policy and coupon-code generation.
//!
//! When the pool has no eligible coupon, the allocation engine synthesises a
//! new one from this policy: a discount drawn from a fixed menu, a generated
//! human-readable code, a default expiry window, and a default redemption
//! bound. Code uniqueness is enforced by the store; callers regenerate on a
//! `DuplicateCode` collision.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use rand::seq::SliceRandom;

use crate::domain::coupon::{CouponDraft, RedemptionPolicy};

/// Discount percentages a minted coupon may carry.
pub const DISCOUNT_MENU: [u8; 4] = [10, 15, 20, 25];

/// Fallback discount when the configured menu is empty.
const DEFAULT_DISCOUNT: u8 = 15;

/// Code suffix alphabet: uppercase letters and digits minus the ambiguous
/// `I`, `O`, `0`, `1`.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

const CODE_SUFFIX_LEN: usize = 6;

/// Policy governing on-demand coupon minting.
#[derive(Debug, Clone)]
pub struct MintPolicy {
    /// Menu of discount percentages to draw from.
    pub discount_menu: Vec<u8>,
    /// How long a minted coupon stays claimable.
    pub expiry: Duration,
    /// Redemption bound stamped on minted coupons; `None` is unbounded.
    pub max_redemptions: Option<i32>,
    /// Duration semantics stamped on minted coupons.
    pub redemption_policy: RedemptionPolicy,
}

impl Default for MintPolicy {
    fn default() -> Self {
        Self {
            discount_menu: DISCOUNT_MENU.to_vec(),
            expiry: Duration::days(90),
            max_redemptions: Some(25),
            redemption_policy: RedemptionPolicy::Once,
        }
    }
}

impl MintPolicy {
    /// Draw a fresh draft from the policy.
    ///
    /// Each call picks a new discount and code; drafts are not reproducible.
    pub fn draft(&self, now: DateTime<Utc>) -> CouponDraft {
        let mut rng = rand::thread_rng();
        let discount = self
            .discount_menu
            .choose(&mut rng)
            .copied()
            .unwrap_or(DEFAULT_DISCOUNT);

        CouponDraft {
            code: generate_code(discount),
            description: format!("{discount}% off your order"),
            discount_percent: discount,
            expires_at: now + self.expiry,
            redemption_policy: self.redemption_policy,
            max_redemptions: self.max_redemptions,
        }
    }
}

/// Generate a coupon code such as `SAVE15-7KQ2XM`.
///
/// The prefix encodes the discount for human readability; the random suffix
/// carries the uniqueness. Collisions are possible and handled by the store's
/// unique constraint.
pub fn generate_code(discount_percent: u8) -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..CODE_SUFFIX_LEN)
        .map(|_| {
            let idx = rng.gen_range(0..CODE_ALPHABET.len());
            char::from(CODE_ALPHABET[idx])
        })
        .collect();
    format!("SAVE{discount_percent}-{suffix}")
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn generated_code_has_expected_shape() {
        let code = generate_code(15);
        let (prefix, suffix) = code.split_once('-').expect("code contains separator");
        assert_eq!(prefix, "SAVE15");
        assert_eq!(suffix.len(), CODE_SUFFIX_LEN);
        assert!(
            suffix.bytes().all(|b| CODE_ALPHABET.contains(&b)),
            "suffix must stay within the unambiguous alphabet: {suffix}"
        );
    }

    #[rstest]
    fn generated_codes_vary() {
        let codes: std::collections::HashSet<String> =
            (0..32).map(|_| generate_code(10)).collect();
        // 32^6 suffixes; 32 draws colliding entirely would indicate a broken RNG.
        assert!(codes.len() > 1);
    }

    #[rstest]
    fn default_policy_draft_is_valid_and_on_menu() {
        let now = Utc::now();
        let policy = MintPolicy::default();
        let draft = policy.draft(now);

        assert!(DISCOUNT_MENU.contains(&draft.discount_percent));
        assert_eq!(draft.expires_at, now + Duration::days(90));
        assert_eq!(draft.max_redemptions, Some(25));
        assert_eq!(draft.redemption_policy, RedemptionPolicy::Once);
        assert!(
            draft
                .description
                .starts_with(&format!("{}%", draft.discount_percent))
        );

        crate::domain::Coupon::from_draft(draft, uuid::Uuid::new_v4(), now)
            .expect("minted drafts satisfy coupon validation");
    }

    #[rstest]
    fn empty_menu_falls_back_to_default_discount() {
        let policy = MintPolicy {
            discount_menu: Vec::new(),
            ..MintPolicy::default()
        };
        let draft = policy.draft(Utc::now());
        assert_eq!(draft.discount_percent, DEFAULT_DISCOUNT);
    }
}
