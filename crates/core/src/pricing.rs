//! Credit and real-money cost tables for generation attempts.
//!
//! Credits are what approvers prepay from their ledger balance. The real
//! cost is what the generation provider bills the project owner and is only
//! recorded in the attempt log.

use crate::media::Resolution;
use crate::regeneration::TargetType;

/// Credits charged per attempt for a target type at a resolution tier.
pub fn credits_per_attempt(target: TargetType, resolution: Resolution) -> i64 {
    match (target, resolution) {
        (TargetType::Image, Resolution::Hd) => 1,
        (TargetType::Image, Resolution::TwoK) => 2,
        (TargetType::Image, Resolution::FourK) => 4,
        (TargetType::Video, Resolution::Hd) => 5,
        (TargetType::Video, Resolution::TwoK) => 8,
        (TargetType::Video, Resolution::FourK) => 12,
    }
}

/// Total prepayment for an attempt budget.
pub fn approval_cost(target: TargetType, resolution: Resolution, max_attempts: i32) -> i64 {
    credits_per_attempt(target, resolution) * i64::from(max_attempts.max(0))
}

/// Provider cost of one successful attempt, in US cents.
pub fn real_cost_cents(target: TargetType, resolution: Resolution) -> i64 {
    match (target, resolution) {
        (TargetType::Image, Resolution::Hd) => 2,
        (TargetType::Image, Resolution::TwoK) => 4,
        (TargetType::Image, Resolution::FourK) => 8,
        (TargetType::Video, Resolution::Hd) => 25,
        (TargetType::Video, Resolution::TwoK) => 40,
        (TargetType::Video, Resolution::FourK) => 80,
    }
}

/// Render cents as a dollar string, e.g. `"$0.04"`.
pub fn format_cents(cents: i64) -> String {
    format!("${}.{:02}", cents / 100, cents % 100)
}
