//! Historical query coordination
//!
//! Walks tiers from finest to coarsest. Each tier is asked for rows ending
//! before the oldest timestamp the previous tier returned, so the stitched
//! result has recent data at full resolution and older data from coarser
//! tiers with no overlap.

use crate::error::Result;
use crate::tier::{HistoricalPage, Tier};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use timestrata_shared::Series;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistoricalQuery {
    /// Row budget for each tier
    pub max_points_per_tier: usize,
    /// Exclusive upper bound, Unix seconds
    pub end_time: f64,
}

/// What one tier contributed to a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierCoverage {
    pub tier: String,
    pub rows: usize,
    /// Cutoff the tier was queried with
    pub end_time: f64,
    /// Oldest window end it returned (`end_time` when empty)
    pub earliest: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryResult {
    /// One series per variable, oldest point first
    pub series: Vec<Series>,
    /// Oldest timestamp covered by any tier
    pub earliest: f64,
    /// Finest tier first
    pub coverage: Vec<TierCoverage>,
}

/// Query `tiers` (finest first) and stitch the pages into chronological
/// series.
pub fn reconstruct(tiers: &[Arc<Tier>], query: &HistoricalQuery) -> Result<HistoryResult> {
    let mut end_time = query.end_time;
    let mut pages: Vec<HistoricalPage> = Vec::with_capacity(tiers.len());
    let mut coverage = Vec::with_capacity(tiers.len());

    for tier in tiers {
        let page = tier.append_historical_values(query.max_points_per_tier, end_time)?;
        debug!(
            "History: tier {} gave {} rows before {}",
            tier.name(),
            page.rows,
            end_time
        );
        coverage.push(TierCoverage {
            tier: tier.name().to_string(),
            rows: page.rows,
            end_time,
            earliest: page.earliest,
        });
        end_time = page.earliest;
        pages.push(page);
    }

    let mut series: Vec<Series> = match tiers.first() {
        Some(tier) => tier
            .variables()
            .iter()
            .map(|v| Series::new(v.name()))
            .collect(),
        None => Vec::new(),
    };
    // Coarsest page holds the oldest windows; each page is newest first.
    for page in pages.iter().rev() {
        for (out, part) in series.iter_mut().zip(&page.series) {
            out.points.extend(part.points.iter().rev().cloned());
        }
    }

    Ok(HistoryResult {
        series,
        earliest: end_time,
        coverage,
    })
}
