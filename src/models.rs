//! Request payloads and their stored shapes for users, teams and tasks.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{AppError, AppResult};
use crate::identity::split_usernames;
use crate::storage::{attr_str, Item};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub user_type: String,
}

impl NewUser {
    pub fn check(&self) -> AppResult<()> {
        if self.username.trim().is_empty() { return Err(AppError::validation("username is required")); }
        if self.username.contains(',') { return Err(AppError::validation("username may not contain ','")); }
        if self.email.trim().is_empty() { return Err(AppError::validation("email is required")); }
        if self.password.is_empty() { return Err(AppError::validation("password is required")); }
        Ok(())
    }

    /// Stored credential record; `password_hash` replaces the plaintext.
    pub fn into_item(self, password_hash: String) -> Item {
        let mut m = Item::new();
        m.insert("username".into(), json!(self.username));
        m.insert("email".into(), json!(self.email));
        m.insert("password".into(), json!(password_hash));
        m.insert("firstName".into(), json!(self.first_name));
        m.insert("lastName".into(), json!(self.last_name));
        m.insert("userType".into(), json!(self.user_type));
        m.insert("teamIds".into(), json!([]));
        m
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub message: String,
    pub token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewTeam {
    pub name: String,
    #[serde(default)]
    pub admins: Vec<String>,
    #[serde(default)]
    pub members: Vec<String>,
}

impl NewTeam {
    pub fn into_item(self, team_id: &str, created: &str) -> Item {
        let mut m = Item::new();
        m.insert("team_id".into(), json!(team_id));
        m.insert("name".into(), json!(self.name));
        m.insert("created_timestamp".into(), json!(created));
        m.insert("admins".into(), json!(self.admins.join(",")));
        m.insert("members".into(), json!(self.members.join(",")));
        m
    }
}

/// Team as returned by the listing endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TeamView {
    pub team_id: String,
    pub name: String,
    pub admins: Vec<String>,
    pub members: Vec<String>,
}

impl TeamView {
    pub fn from_item(item: &Item) -> Option<Self> {
        Some(Self {
            team_id: attr_str(item, "team_id")?.to_string(),
            name: attr_str(item, "name").unwrap_or_default().to_string(),
            admins: attr_str(item, "admins").map(split_usernames).unwrap_or_default(),
            members: attr_str(item, "members").map(split_usernames).unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeSlot {
    pub begin_time: String,
    pub end_time: String,
}

impl TimeSlot {
    fn check(&self, day: &str) -> AppResult<()> {
        let parse = |s: &str| NaiveTime::parse_from_str(s, "%H:%M");
        let (Ok(begin), Ok(end)) = (parse(&self.begin_time), parse(&self.end_time)) else {
            return Err(AppError::validation(format!("{day}: times must be HH:MM")));
        };
        if begin >= end {
            return Err(AppError::validation(format!("{day}: begin_time must be before end_time")));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct WeeklySchedule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monday: Option<TimeSlot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tuesday: Option<TimeSlot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wednesday: Option<TimeSlot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thursday: Option<TimeSlot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub friday: Option<TimeSlot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saturday: Option<TimeSlot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sunday: Option<TimeSlot>,
}

impl WeeklySchedule {
    pub fn days(&self) -> [(&'static str, Option<&TimeSlot>); 7] {
        [
            ("monday", self.monday.as_ref()),
            ("tuesday", self.tuesday.as_ref()),
            ("wednesday", self.wednesday.as_ref()),
            ("thursday", self.thursday.as_ref()),
            ("friday", self.friday.as_ref()),
            ("saturday", self.saturday.as_ref()),
            ("sunday", self.sunday.as_ref()),
        ]
    }

    pub fn check(&self) -> AppResult<()> {
        for (day, slot) in self.days() {
            if let Some(s) = slot { s.check(day)?; }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewTask {
    pub title: String,
    pub team_id: String,
    #[serde(default)]
    pub schedule: Option<WeeklySchedule>,
    #[serde(default)]
    pub task_type: String,
    /// Accepted for compatibility; always replaced by the authenticated caller.
    #[serde(default)]
    pub requester: String,
}

impl NewTask {
    pub fn check(&self) -> AppResult<()> {
        if self.team_id.trim().is_empty() { return Err(AppError::validation("team_id is required")); }
        if self.title.trim().is_empty() { return Err(AppError::validation("title is required")); }
        match &self.schedule {
            Some(s) => s.check(),
            None => Ok(()),
        }
    }

    pub fn into_item(self, task_id: &str, created: &str) -> Item {
        let mut m = Item::new();
        m.insert("task_id".into(), json!(task_id));
        m.insert("title".into(), json!(self.title));
        m.insert("team_id".into(), json!(self.team_id));
        m.insert("created_timestamp".into(), json!(created));
        m.insert("schedule".into(), json!(self.schedule.unwrap_or_default()));
        m.insert("task_type".into(), json!(self.task_type));
        m.insert("requester".into(), json!(self.requester));
        m
    }
}
