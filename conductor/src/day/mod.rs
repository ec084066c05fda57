//! Day advancement and validator-set membership changes (§4.7, §4.8).

pub mod advancement;
pub mod membership;

pub use advancement::{DayAdvancementError, DayAdvancementTracker};
pub use membership::{
    apply_blacklist_removal, apply_change, reshare_required, trigger_reshare, validate_change,
    MembershipChange, MembershipError, MIN_EFFECTIVE_DAY_LEAD,
};
