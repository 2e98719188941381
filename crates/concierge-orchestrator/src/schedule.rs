//! Greedy day scheduling and itinerary rendering for the planner.
//!
//! Times are minutes since midnight internally and zero-padded `HH:MM` at the edges.
use super::*;

use thiserror::Error;

pub const HOME_LOCATION: &str = "Home (Sunnyvale)";
/// Travel minutes assumed when no fixture pair covers a leg.
pub const DEFAULT_LEG_MINUTES: u32 = 15;
const MINUTES_PER_DAY: u32 = 24 * 60;

fn default_duration_minutes() -> u32 {
    60
}

fn unknown_activity() -> String {
    "Unknown Activity".to_string()
}

fn unnamed_entry() -> String {
    "Activity".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlannedActivity {
    #[serde(default = "unknown_activity")]
    pub name: String,
    #[serde(default)]
    pub location: String,
    #[serde(default = "default_duration_minutes")]
    pub duration_minutes: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScheduledActivity {
    #[serde(default = "unnamed_entry")]
    pub activity_name: String,
    #[serde(default)]
    pub location: String,
    pub start_time: String,
    pub end_time: String,
    #[serde(default)]
    pub travel_time_minutes: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error("Invalid start time format. Please use HH:MM format.")]
    InvalidStartTime,
    #[error("Invalid end time format. Please use HH:MM format.")]
    InvalidEndTime,
    #[error("Activity '{0}' is too long to fit in the schedule.")]
    DurationOverflow(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Itinerary {
    pub narrative_itinerary: String,
    pub schedule_summary: String,
}

fn parse_clock(text: &str) -> Option<u32> {
    let (hours, minutes) = text.trim().split_once(':')?;
    let hours: u32 = hours.trim().parse().ok()?;
    let minutes: u32 = minutes.trim().parse().ok()?;
    (hours < 24 && minutes < 60).then_some(hours * 60 + minutes)
}

fn format_clock(minutes: u32) -> String {
    let minutes = minutes % MINUTES_PER_DAY;
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

/// Walks `activities` in order from `start_time`, inserting travel before each leg.
///
/// `travel_minutes(from, to)` returns `None` when the pair is unknown; such legs take
/// [`DEFAULT_LEG_MINUTES`]. The first activity that would end after `end_time` and everything after
/// it are dropped.
pub fn optimize_schedule<F>(
    activities: &[PlannedActivity],
    start_time: &str,
    end_time: Option<&str>,
    mut travel_minutes: F,
) -> Result<Vec<ScheduledActivity>, ScheduleError>
where
    F: FnMut(&str, &str) -> Option<u32>,
{
    let mut current = parse_clock(start_time).ok_or(ScheduleError::InvalidStartTime)?;
    let limit = match end_time.filter(|text| !text.trim().is_empty()) {
        Some(text) => Some(parse_clock(text).ok_or(ScheduleError::InvalidEndTime)?),
        None => None,
    };

    let mut last_location = HOME_LOCATION.to_string();
    let mut schedule = Vec::with_capacity(activities.len());
    for activity in activities {
        let travel =
            travel_minutes(&last_location, &activity.location).unwrap_or(DEFAULT_LEG_MINUTES);
        let overflow = || ScheduleError::DurationOverflow(activity.name.clone());
        let start = current.checked_add(travel).ok_or_else(overflow)?;
        let end = start
            .checked_add(activity.duration_minutes)
            .ok_or_else(overflow)?;
        if limit.is_some_and(|limit| end > limit) {
            tracing::debug!(
                activity = %activity.name,
                "schedule truncated at end time"
            );
            break;
        }

        schedule.push(ScheduledActivity {
            activity_name: activity.name.clone(),
            location: activity.location.clone(),
            start_time: format_clock(start),
            end_time: format_clock(end),
            travel_time_minutes: travel,
        });
        current = end;
        last_location = activity.location.clone();
    }
    Ok(schedule)
}

fn entry_tips(index: usize, entry: &ScheduledActivity) -> Vec<&'static str> {
    let name = entry.activity_name.as_str();
    let mut tips = Vec::new();
    if name.contains("Park") {
        tips.push("Bring sunscreen and water");
    }
    if name.contains("Museum") {
        tips.push("Check for any special exhibits");
    }
    if name.contains("Zoo") {
        tips.push("The animal feeding times are usually mid-morning");
    }
    if tips.is_empty() {
        let lowered = name.to_lowercase();
        if lowered.contains("lunch") || lowered.contains("dinner") {
            tips.push("Consider making a reservation ahead of time");
        } else if index == 0 {
            tips.push("Plan to arrive on time to make the most of your day");
        }
    }
    tips
}

/// Renders a schedule as markdown plus a one-line summary.
pub fn render_itinerary(schedule: &[ScheduledActivity], include_tips: bool) -> Itinerary {
    let mut sections = Vec::new();
    match (schedule.first(), schedule.last()) {
        (Some(first), Some(last)) => sections.push(format!(
            "# Itinerary ({} - {})\n",
            first.start_time, last.end_time
        )),
        _ => sections.push("# Itinerary\n".to_string()),
    }
    sections.push("Here's your plan for the day:\n".to_string());

    for (index, entry) in schedule.iter().enumerate() {
        let mut section = format!(
            "## {} - {}: {}\n**Location**: {}\n",
            entry.start_time, entry.end_time, entry.activity_name, entry.location
        );
        if index > 0 && entry.travel_time_minutes > 0 {
            section.push_str(&format!(
                "**Travel Time**: {} minutes from previous location\n",
                entry.travel_time_minutes
            ));
        }
        if include_tips {
            let tips = entry_tips(index, entry);
            if !tips.is_empty() {
                section.push_str("\n**Tips:**\n");
                for tip in tips {
                    section.push_str(&format!("- {tip}\n"));
                }
            }
        }
        sections.push(section);
    }

    sections.push(
        "## Notes\n\
         - All times include travel time from the previous location\n\
         - Keep your phone charged and have maps available for directions\n\
         - Have a great day!\n"
            .to_string(),
    );

    let first = schedule.first().map_or("N/A", |entry| entry.start_time.as_str());
    let last = schedule.last().map_or("N/A", |entry| entry.end_time.as_str());
    Itinerary {
        narrative_itinerary: sections.join("\n"),
        schedule_summary: format!(
            "Plan includes {} activities spanning from {first} to {last}",
            schedule.len()
        ),
    }
}
