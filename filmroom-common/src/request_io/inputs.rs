use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::user::UserRole;
use crate::policy::relation::RelationAction;
use crate::validators::{self, Validity};

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InputRegister {
    pub user_name: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub role: UserRole,
}

impl InputRegister {
    /// Returns the first problem found, checking fields in the order a form would show them.
    pub fn validate(&self) -> Validity {
        let checks = [
            validators::validate_username(&self.user_name),
            validators::validate_name(&self.first_name),
            validators::validate_name(&self.last_name),
            validators::validate_email_address(&self.email),
            validators::validate_password(&self.password),
        ];

        checks
            .into_iter()
            .find(|v| !v.is_valid())
            .unwrap_or(Validity::Valid)
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InputLogin {
    /// Email address or username.
    #[serde(rename = "userData")]
    pub identifier: String,
    pub password: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InputRelationRequest {
    pub requester_id: Uuid,
    pub target_id: Uuid,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InputRelationAction {
    pub approver_id: Uuid,
    pub requester_id: Uuid,
    pub action: RelationAction,
    pub feedback: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InputVideoListParams {
    pub user_id: Uuid,
    pub student_id: Option<Uuid>,
    pub coach_id: Option<Uuid>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct InputVideoList {
    pub params: InputVideoListParams,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InputVideoUpload {
    pub student_id: Uuid,
    pub coach_id: Option<Uuid>,
    pub original_name: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InputFavourite {
    pub user_id: Uuid,
    pub is_favourite: bool,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InputDeleteItems {
    pub user_id: Uuid,
    pub ids: Vec<Uuid>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InputAnnotation {
    pub coach_id: Uuid,
    pub data: serde_json::Value,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct InputAnnotationData {
    pub data: serde_json::Value,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InputUserUpdate {
    pub user_name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl InputUserUpdate {
    pub fn is_empty(&self) -> bool {
        self.user_name.is_none() && self.first_name.is_none() && self.last_name.is_none()
    }

    pub fn validate(&self) -> Validity {
        if self.is_empty() {
            return Validity::Invalid(String::from("No changes were provided."));
        }

        if let Some(user_name) = &self.user_name {
            if let Validity::Invalid(msg) = validators::validate_username(user_name) {
                return Validity::Invalid(msg);
            }
        }

        for name in [&self.first_name, &self.last_name].into_iter().flatten() {
            if let Validity::Invalid(msg) = validators::validate_name(name) {
                return Validity::Invalid(msg);
            }
        }

        Validity::Valid
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InputUserFilter {
    pub role: Option<UserRole>,
    pub user_name: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InputDrillUpload {
    pub user_id: Uuid,
    pub title: String,
    #[serde(default, alias = "desc")]
    pub description: String,
    #[serde(default)]
    pub is_private: bool,
    pub original_name: String,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InputDrillFilter {
    pub user_id: Option<Uuid>,
    pub is_private: Option<bool>,
    pub title: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InputDrillUpdate {
    pub title: Option<String>,
    #[serde(alias = "desc")]
    pub description: Option<String>,
    pub is_private: Option<bool>,
}

impl InputDrillUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.is_private.is_none()
    }
}
