use chrono::NaiveDate;
use mongodb::bson::{oid::ObjectId, DateTime as BsonDateTime};
use serde::{Deserialize, Serialize};

/// A user document in the `users` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub name: String,
    pub email: String,
    /// Unique handle derived at registration.
    pub username: String,
    /// bcrypt hash, never the plain secret.
    #[serde(rename = "password")]
    pub password_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<i32>,
    #[serde(rename = "dateOfBirth", default, skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(rename = "profileImage", default, skip_serializing_if = "Option::is_none")]
    pub profile_image: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: BsonDateTime,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileChanges {
    pub name: Option<String>,
    pub age: Option<i32>,
    pub date_of_birth: Option<NaiveDate>,
    pub profile_image: Option<String>,
}

impl ProfileChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.age.is_none()
            && self.date_of_birth.is_none()
            && self.profile_image.is_none()
    }

    pub fn apply(&self, user: &mut User) {
        if let Some(name) = &self.name {
            user.name = name.clone();
        }
        if let Some(age) = self.age {
            user.age = Some(age);
        }
        if let Some(date_of_birth) = self.date_of_birth {
            user.date_of_birth = Some(date_of_birth);
        }
        if let Some(image) = &self.profile_image {
            user.profile_image = Some(image.clone());
        }
    }
}

/// Profile fields safe to hand to the owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub username: String,
    pub age: Option<i32>,
    #[serde(rename = "dateOfBirth")]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(rename = "profileImage")]
    pub profile_image: Option<String>,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        PublicUser {
            id: user.id.to_hex(),
            name: user.name.clone(),
            email: user.email.clone(),
            username: user.username.clone(),
            age: user.age,
            date_of_birth: user.date_of_birth,
            profile_image: user.profile_image.clone(),
        }
    }
}
