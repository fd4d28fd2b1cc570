use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::User;

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateUserRoleRequest {
    pub role: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserList {
    pub items: Vec<User>,
}
