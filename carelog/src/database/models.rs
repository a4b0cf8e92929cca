//! Database models
//!
//! Rust structs representing database entities.
//! All models use serde for serialization to the UI layer.

use crate::auth::Role;
use crate::error::AppError;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;

/// Account profile; also the role store
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Profile {
    pub user_id: String,
    pub email: String,
    pub role: Role,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create profile request
#[derive(Debug, Clone, Deserialize)]
pub struct CreateProfileRequest {
    pub email: String,
    pub role: Role,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

/// Contact details editable on a profile. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

/// A care recipient
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Client {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub notes: Option<String>,
    /// Weak reference to a guardian profile
    pub guardian_id: Option<String>,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Client {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// Create client request
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateClientRequest {
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub notes: Option<String>,
    pub guardian_id: Option<String>,
}

/// Partial client update. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateClientRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub notes: Option<String>,
}

/// A note about a client with a tracked edit history
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Log {
    pub id: String,
    pub client_id: String,
    pub author_id: String,
    /// Author display name as it was when the log was written
    pub author_name: String,
    pub content: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub place_name: Option<String>,
    pub place_address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated location attached to a log
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Geolocation {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub place_name: Option<String>,
    pub place_address: Option<String>,
}

/// Validated log insert
#[derive(Debug, Clone)]
pub struct NewLog {
    pub client_id: String,
    pub author_id: String,
    pub author_name: String,
    pub content: String,
    pub geo: Geolocation,
}

/// Immutable snapshot of a log's content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Revision {
    pub log_id: String,
    pub version: i64,
    pub editor_id: String,
    /// Editor display name as it was at edit time
    pub editor_name: String,
    pub content: String,
    pub edited_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum GoalStatus {
    InProgress,
    Completed,
}

impl FromStr for GoalStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "in_progress" => Ok(GoalStatus::InProgress),
            "completed" => Ok(GoalStatus::Completed),
            other => Err(AppError::validation(format!("unknown goal status '{}'", other))),
        }
    }
}

/// Declares a closed set of labelled values stored by label
macro_rules! labelled_enum {
    ($(#[$meta:meta])* $name:ident, $what:literal { $($variant:ident => $label:literal,)+ }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
        pub enum $name {
            $(
                #[serde(rename = $label)]
                #[sqlx(rename = $label)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn label(self) -> &'static str {
                match self {
                    $($name::$variant => $label,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        }

        impl FromStr for $name {
            type Err = AppError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let s = s.trim();
                $name::ALL
                    .iter()
                    .copied()
                    .find(|value| value.label() == s)
                    .ok_or_else(|| AppError::validation(format!(concat!("unknown ", $what, " '{}'"), s)))
            }
        }
    };
}

labelled_enum! {
    /// Life domain a goal belongs to
    GoalDomain, "goal domain" {
        Physical => "Physical",
        Material => "Material",
        Emotional => "Emotional",
        PersonalDevelopment => "Personal development",
        SelfDetermination => "Self determination",
        Rights => "Rights",
        SocialInclusion => "Social Inclusion",
        InterpersonalRelations => "Interpersonal relations",
    }
}

labelled_enum! {
    /// Why an overdue goal was not met
    NotMetReason, "not-met reason" {
        LeftProgram => "Left program",
        IllOrHospitalized => "Ill/hospitalized",
        CrisisOrChallenge => "Crisis/challenge",
        GuardianDirective => "Guardian directive",
        TimeSpecific => "Time specific",
        HomeInstability => "Home instability",
        NotCommitted => "Person not committed to goal",
        FamilyResponsibilityNotMet => "Guardian/family responsibility not met",
        SkillsMismatch => "Person’s current skills do not match",
        FinancialConstraints => "Individual’s financial constraints",
        StaffingShortages => "Staffing/manpower shortages",
        Other => "Other reasons",
    }
}

/// A client goal
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Goal {
    pub id: String,
    pub client_id: String,
    pub title: String,
    pub domain: GoalDomain,
    pub status: GoalStatus,
    pub target_date: NaiveDate,
    pub not_met_reason: Option<NotMetReason>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Goal {
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        is_overdue(self.status, self.target_date, today)
    }
}

/// A goal is overdue when it is not completed and its target date has passed
pub fn is_overdue(status: GoalStatus, target_date: NaiveDate, today: NaiveDate) -> bool {
    status != GoalStatus::Completed && target_date < today
}

/// Validated goal columns shared by insert and update
#[derive(Debug, Clone)]
pub struct GoalFields {
    pub title: String,
    pub domain: GoalDomain,
    pub status: GoalStatus,
    pub target_date: NaiveDate,
    pub not_met_reason: Option<NotMetReason>,
}

/// An ordered step of a goal
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Subgoal {
    pub id: String,
    pub goal_id: String,
    pub title: String,
    pub order_index: i64,
    pub is_done: bool,
    pub created_at: DateTime<Utc>,
}

/// Goal with its subgoals in display order
#[derive(Debug, Clone, Serialize)]
pub struct GoalWithSubgoals {
    #[serde(flatten)]
    pub goal: Goal,
    /// Whether the goal was overdue when listed
    pub overdue: bool,
    pub subgoals: Vec<Subgoal>,
}

/// A calendar event
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Schedule {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Shared with everyone; such events have no participants
    pub is_all_users: bool,
    pub created_by: Option<String>,
    pub assigned_staff_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A client taking part in an individual event
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ScheduleParticipant {
    pub id: String,
    pub schedule_id: String,
    pub client_id: String,
    pub created_at: DateTime<Utc>,
}

/// Validated schedule insert
#[derive(Debug, Clone)]
pub struct NewSchedule {
    pub title: String,
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub is_all_users: bool,
    pub assigned_staff_id: Option<String>,
    pub participant_ids: Vec<String>,
}

/// Schedule with its participants
#[derive(Debug, Clone, Serialize)]
pub struct ScheduleWithParticipants {
    #[serde(flatten)]
    pub schedule: Schedule,
    pub participants: Vec<ScheduleParticipant>,
}
