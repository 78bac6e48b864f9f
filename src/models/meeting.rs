use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

/// One meeting occurrence. Durations are stored as whole minutes since
/// upstream servers only ever report hour/minute precision.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Meeting {
    pub id: i64,
    pub source_id: i64,
    pub root_server_id: i64,
    pub service_body_id: i64,
    pub name: String,
    pub weekday: i16,
    pub venue_type: Option<String>,
    pub start_time: Option<NaiveTime>,
    pub duration_minutes: Option<i32>,
    pub language: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub published: bool,
    pub deleted: bool,
}

/// One-to-one companion of [`Meeting`] carrying the contact/location text
/// columns.
#[derive(Debug, Clone, Default, Serialize, Deserialize, sqlx::FromRow)]
pub struct MeetingInfo {
    pub meeting_id: i64,
    pub email: Option<String>,
    pub location_text: Option<String>,
    pub location_info: Option<String>,
    pub location_street: Option<String>,
    pub location_city_subsection: Option<String>,
    pub location_neighborhood: Option<String>,
    pub location_municipality: Option<String>,
    pub location_sub_province: Option<String>,
    pub location_province: Option<String>,
    pub location_postal_code_1: Option<String>,
    pub location_nation: Option<String>,
    pub train_lines: Option<String>,
    pub bus_lines: Option<String>,
    pub world_id: Option<String>,
    pub comments: Option<String>,
    pub virtual_meeting_link: Option<String>,
    pub phone_meeting_number: Option<String>,
    pub virtual_meeting_additional_info: Option<String>,
}
