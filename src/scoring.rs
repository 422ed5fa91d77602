//! Scoring engine for opportunities.
//!
//! Base score = revenue*0.40 + timeline*0.25 + skill*0.20 + momentum*0.10 + competition*0.05
//! where `timeline` is the day count mapped onto 0..100 (1 day -> 100, 30+ days -> 0).
//!
//! Modifiers are step functions on single dimensions:
//! - improvement margin: +20 above 70, +10 above 40
//! - distribution leverage: +15 above 70
//! - margin potential: +10 above 50
//! - time to market: +5 under 7 days
//!
//! Final score = min(100, base + modifiers), rounded to cents.

use serde::{Deserialize, Serialize};

pub const WEIGHT_REVENUE: f64 = 0.40;
pub const WEIGHT_TIMELINE: f64 = 0.25;
pub const WEIGHT_SKILL: f64 = 0.20;
pub const WEIGHT_MOMENTUM: f64 = 0.10;
pub const WEIGHT_COMPETITION: f64 = 0.05;

/// The eight fully-resolved signal dimensions. Everything except
/// `timeline_days` lives in [0,100].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    pub revenue_potential: f64,
    pub timeline_days: f64,
    pub skill_match: f64,
    pub momentum: f64,
    pub competition: f64,
    pub improvement_margin: f64,
    pub distribution_leverage: f64,
    pub margin_potential: f64,
}

impl Dimensions {
    /// Values used when a source cannot derive a dimension.
    pub const DOMAIN_DEFAULT: Dimensions = Dimensions {
        revenue_potential: 50.0,
        timeline_days: 14.0,
        skill_match: 70.0,
        momentum: 40.0,
        competition: 50.0,
        improvement_margin: 60.0,
        distribution_leverage: 50.0,
        margin_potential: 60.0,
    };
}

impl Default for Dimensions {
    fn default() -> Self {
        Self::DOMAIN_DEFAULT
    }
}

/// Itemized contribution of every term. Reproduces exactly from the same inputs.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub revenue_potential: f64,
    pub timeline: f64,
    pub skill_match: f64,
    pub momentum: f64,
    pub competition: f64,
    pub base_score: f64,
    pub improvement_margin_bonus: f64,
    pub distribution_leverage_bonus: f64,
    pub margin_potential_bonus: f64,
    pub time_to_market_bonus: f64,
    pub total_modifiers: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub final_score: f64,
    pub breakdown: ScoreBreakdown,
    pub time_to_market_bonus: f64,
}

/// Map a day count onto 0..100. Faster is better.
pub fn normalize_timeline(days: f64) -> f64 {
    if days <= 1.0 {
        return 100.0;
    }
    if days >= 30.0 {
        return 0.0;
    }
    (100.0 - (days - 1.0) * (100.0 / 29.0)).clamp(0.0, 100.0)
}

/// Round to two decimals, half away from zero on the cent digit.
pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

fn improvement_margin_bonus(v: f64) -> f64 {
    if v > 70.0 {
        20.0
    } else if v > 40.0 {
        10.0
    } else {
        0.0
    }
}

fn distribution_leverage_bonus(v: f64) -> f64 {
    if v > 70.0 {
        15.0
    } else {
        0.0
    }
}

fn margin_potential_bonus(v: f64) -> f64 {
    if v > 50.0 {
        10.0
    } else {
        0.0
    }
}

fn time_to_market_bonus(days: f64) -> f64 {
    if days < 7.0 {
        5.0
    } else {
        0.0
    }
}

/// Compute the final score and its breakdown. Pure and deterministic.
pub fn score(d: &Dimensions) -> ScoreResult {
    let timeline = normalize_timeline(d.timeline_days);

    let base = d.revenue_potential * WEIGHT_REVENUE
        + timeline * WEIGHT_TIMELINE
        + d.skill_match * WEIGHT_SKILL
        + d.momentum * WEIGHT_MOMENTUM
        + d.competition * WEIGHT_COMPETITION;

    let im = improvement_margin_bonus(d.improvement_margin);
    let dl = distribution_leverage_bonus(d.distribution_leverage);
    let mp = margin_potential_bonus(d.margin_potential);
    let ttm = time_to_market_bonus(d.timeline_days);
    let total_modifiers = im + dl + mp + ttm;

    let final_score = round2((base + total_modifiers).clamp(0.0, 100.0));

    ScoreResult {
        final_score,
        breakdown: ScoreBreakdown {
            revenue_potential: d.revenue_potential,
            timeline,
            skill_match: d.skill_match,
            momentum: d.momentum,
            competition: d.competition,
            base_score: round2(base),
            improvement_margin_bonus: im,
            distribution_leverage_bonus: dl,
            margin_potential_bonus: mp,
            time_to_market_bonus: ttm,
            total_modifiers,
        },
        time_to_market_bonus: ttm,
    }
}
