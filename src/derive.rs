//! Presentation state derived from loaded records.
//!
//! Nothing here is stored: views are recomputed from the records on every
//! load.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::format::{parse_date, Formatter};
use crate::models::{Availability, Closure, Document, InformationItem, Program};

/// Capacity band used to color the enrollment bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CapacityTier {
    /// Below 70%.
    Low,
    /// 70% up to (not including) 95%.
    Medium,
    High,
}

/// Badge style for a program's status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusBadge {
    Open,
    Waitlist,
    Full,
    /// Any status outside the known vocabulary.
    Neutral,
}

impl StatusBadge {
    pub fn color(&self) -> &'static str {
        match self {
            StatusBadge::Open => "green",
            StatusBadge::Waitlist => "amber",
            StatusBadge::Full => "red",
            StatusBadge::Neutral => "slate",
        }
    }
}

/// Display label for a stored status. `Openings` reads as `Open`.
pub fn status_label(status: &str) -> &str {
    match status.trim() {
        "Openings" => "Open",
        _ => status,
    }
}

pub fn status_badge(status: &str) -> StatusBadge {
    match status.trim() {
        "Open" | "Openings" => StatusBadge::Open,
        "Waitlist" => StatusBadge::Waitlist,
        "Full" => StatusBadge::Full,
        _ => StatusBadge::Neutral,
    }
}

/// Stored open spots, or `max(0, max_capacity - enrolled)` when not set.
pub fn open_spots(availability: &Availability) -> i64 {
    availability.open_spots.unwrap_or_else(|| {
        (i64::from(availability.max_capacity) - i64::from(availability.enrolled)).max(0)
    })
}

/// `round(100 * enrolled / max(1, max_capacity))`, clamped to `0..=100`.
pub fn capacity_percentage(enrolled: u32, max_capacity: u32) -> u8 {
    let capacity = u64::from(max_capacity.max(1));
    // Integer round-half-up of 100 * enrolled / capacity
    let pct = (200 * u64::from(enrolled) + capacity) / (2 * capacity);
    pct.min(100) as u8
}

pub fn capacity_tier(percentage: u8) -> CapacityTier {
    if percentage < 70 {
        CapacityTier::Low
    } else if percentage < 95 {
        CapacityTier::Medium
    } else {
        CapacityTier::High
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Program view
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TuitionView {
    pub full_time: String,
    pub part_time: String,
    pub drop_in: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgramView {
    pub title: String,
    pub age_range: String,
    pub description: String,
    pub ratio: String,
    pub tuition: TuitionView,
    pub status: String,
    pub status_label: String,
    pub badge: StatusBadge,
    pub badge_color: &'static str,
    pub max_capacity: u32,
    pub enrolled: u32,
    pub open_spots: i64,
    pub capacity_percent: u8,
    pub capacity_tier: CapacityTier,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_opening: Option<String>,
}

pub fn derive_program_view(program: &Program, fmt: &Formatter) -> ProgramView {
    let availability = &program.availability;
    let percent = capacity_percentage(availability.enrolled, availability.max_capacity);
    let badge = status_badge(&availability.status);

    ProgramView {
        title: program.title.clone(),
        age_range: program.age_range.clone(),
        description: program.description.clone(),
        ratio: program.ratio.clone(),
        tuition: TuitionView {
            full_time: fmt.currency(Some(program.tuition.full_time)),
            part_time: fmt.currency(program.tuition.part_time),
            drop_in: fmt.currency(program.tuition.drop_in),
        },
        status: availability.status.clone(),
        status_label: status_label(&availability.status).to_string(),
        badge,
        badge_color: badge.color(),
        max_capacity: availability.max_capacity,
        enrolled: availability.enrolled,
        open_spots: open_spots(availability),
        capacity_percent: percent,
        capacity_tier: capacity_tier(percent),
        next_opening: availability
            .next_opening
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(|s| fmt.date(s)),
    }
}

/// Program views ordered by title.
pub fn program_views(mut programs: Vec<Program>, fmt: &Formatter) -> Vec<ProgramView> {
    programs.sort_by_cached_key(|p| p.title.to_lowercase());
    programs.iter().map(|p| derive_program_view(p, fmt)).collect()
}

// ═══════════════════════════════════════════════════════════════════════
// Closures
// ═══════════════════════════════════════════════════════════════════════

/// Closures split around a point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct ClosurePartition {
    /// Soonest first.
    pub upcoming: Vec<Closure>,
    /// Most recent first.
    pub past: Vec<Closure>,
}

/// Sort key for a closure's start. Unparseable starts count as the epoch.
fn start_instant(closure: &Closure) -> DateTime<Utc> {
    parse_date(&closure.start)
        .map(|d| d.start())
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// Last instant of a closure: `end` if it parses, else `start`, else the epoch.
pub fn effective_end(closure: &Closure) -> DateTime<Utc> {
    closure
        .end
        .as_deref()
        .and_then(parse_date)
        .or_else(|| parse_date(&closure.start))
        .map(|d| d.end())
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// Split closures into upcoming (effective end at or after `now`) and past.
pub fn partition_closures(closures: Vec<Closure>, now: DateTime<Utc>) -> ClosurePartition {
    let (mut upcoming, mut past): (Vec<Closure>, Vec<Closure>) = closures
        .into_iter()
        .partition(|c| effective_end(c) >= now);

    upcoming.sort_by_key(start_instant);
    past.sort_by_key(|c| std::cmp::Reverse(start_instant(c)));

    ClosurePartition { upcoming, past }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClosureView {
    pub title: String,
    pub start: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
    /// Formatted date or date range.
    pub dates: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClosureBoard {
    pub upcoming: Vec<ClosureView>,
    pub past: Vec<ClosureView>,
}

fn closure_view(closure: Closure, fmt: &Formatter) -> ClosureView {
    ClosureView {
        dates: fmt.date_range(&closure.start, closure.end.as_deref()),
        title: closure.title,
        start: closure.start,
        end: closure.end,
        description: closure.description,
    }
}

pub fn closure_board(closures: Vec<Closure>, now: DateTime<Utc>, fmt: &Formatter) -> ClosureBoard {
    let partition = partition_closures(closures, now);
    ClosureBoard {
        upcoming: partition
            .upcoming
            .into_iter()
            .map(|c| closure_view(c, fmt))
            .collect(),
        past: partition
            .past
            .into_iter()
            .map(|c| closure_view(c, fmt))
            .collect(),
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Documents and information
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentView {
    pub title: String,
    pub file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Documents keep manifest order.
pub fn document_views(documents: Vec<Document>) -> Vec<DocumentView> {
    documents
        .into_iter()
        .map(|d| DocumentView {
            title: d.title,
            file: d.file,
            description: d.description,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InformationView {
    pub title: String,
    /// Verbatim text; line breaks are significant.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Bulletin board items ordered by title.
pub fn information_views(mut items: Vec<InformationItem>) -> Vec<InformationView> {
    items.sort_by_cached_key(|i| i.title.to_lowercase());
    items
        .into_iter()
        .map(|i| InformationView {
            title: i.title,
            description: i.description,
        })
        .collect()
}
