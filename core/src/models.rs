//! Resource models shared by the crag, route, post and climb-log services.

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

use crate::date;
use crate::mapping::{FieldMapped, FieldMapping};
use crate::model::nested;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserModel {
    pub user_id: Option<String>,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub profile_picture: Option<String>,
    /// `"admin"` or `"member"`.
    pub role: Option<String>,
    pub status: bool,
}

impl FieldMapped for UserModel {
    fn field_mapping() -> FieldMapping {
        FieldMapping::new(&[
            ("user_id", "user_id"),
            ("full_name", "full_name"),
            ("email", "email"),
            ("profile_picture", "profile_picture"),
            ("role", "role"),
            ("status", "status"),
        ])
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CragModel {
    pub crag_id: Option<String>,
    pub name: Option<String>,
    pub location_lat: Option<f64>,
    pub location_lon: Option<f64>,
    pub description: Option<String>,
    pub image_urls: Vec<String>,
}

impl FieldMapped for CragModel {
    fn field_mapping() -> FieldMapping {
        FieldMapping::new(&[
            ("crag_id", "crag_id"),
            ("name", "name"),
            ("location_lat", "location_lat"),
            ("location_lon", "location_lon"),
            ("description", "description"),
            ("image_urls", "image_urls"),
        ])
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteModel {
    pub route_id: Option<i64>,
    pub formatted_id: Option<String>,
    pub route_name: Option<String>,
    pub route_grade: Option<i64>,
    pub route_type: Option<String>,
    #[serde(with = "nested")]
    pub crag: Option<CragModel>,
}

impl FieldMapped for RouteModel {
    fn field_mapping() -> FieldMapping {
        FieldMapping::new(&[
            ("route_id", "route_id"),
            ("formatted_id", "formatted_id"),
            ("route_name", "route_name"),
            ("route_grade", "route_grade"),
            ("route_type", "route_type"),
            ("crag", "crag"),
        ])
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostModel {
    pub post_id: Option<String>,
    #[serde(with = "nested")]
    pub user: Option<UserModel>,
    pub content: Option<String>,
    pub tags: Vec<String>,
    pub image_urls: Vec<String>,
    pub status: Option<String>,
    #[serde(with = "date::serde_opt")]
    pub created_at_utc: Option<DateTime<Utc>>,
}

impl PostModel {
    pub fn created_at_local(&self) -> Option<DateTime<Local>> {
        self.created_at_utc.map(|instant| instant.with_timezone(&Local))
    }
}

impl FieldMapped for PostModel {
    fn field_mapping() -> FieldMapping {
        FieldMapping::new(&[
            ("post_id", "post_id"),
            ("user", "user"),
            ("content", "content"),
            ("tags", "tags"),
            ("image_urls", "image_urls"),
            ("status", "status"),
            ("created_at_utc", "created_at"),
        ])
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClimbLogModel {
    pub log_id: Option<String>,
    #[serde(with = "nested")]
    pub user: Option<UserModel>,
    #[serde(with = "nested")]
    pub route: Option<RouteModel>,
    #[serde(with = "date::serde_opt")]
    pub date_climbed: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

impl FieldMapped for ClimbLogModel {
    fn field_mapping() -> FieldMapping {
        FieldMapping::new(&[
            ("log_id", "log_id"),
            ("user", "user"),
            ("route", "route"),
            ("date_climbed", "date_climbed"),
            ("notes", "notes"),
        ])
    }
}
