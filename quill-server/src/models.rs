//! Blog entities

use quill_orm::defaults::{next_id, now_timestamp};
use quill_orm::{Entity, EntityDefinition, Error, Field, FromValue, Record, Result, Value};
use serde::Serialize;

/// Placeholder written over password hashes in responses
pub const MASKED_PASSWORD: &str = "******";

fn assign<T: FromValue>(slot: &mut T, column: &str, value: Value) -> Result<()> {
    *slot = T::from_value(column, value)?;
    Ok(())
}

fn unknown(column: &str) -> Result<()> {
    Err(Error::UnknownColumn(column.to_string()))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct User {
    pub id: Option<String>,
    pub email: String,
    pub password: String,
    pub admin: bool,
    pub name: String,
    pub image: String,
    pub created_at: Option<f64>,
}

impl Entity for User {
    fn definition() -> EntityDefinition {
        EntityDefinition::new("users")
            .field("id", Field::string().primary_key().generated(next_id))
            .field("email", Field::string())
            .field("password", Field::string())
            .field("admin", Field::boolean())
            .field("name", Field::string())
            .field("image", Field::string())
            .field("created_at", Field::float().generated(now_timestamp))
    }

    fn from_record(mut record: Record) -> Result<Self> {
        Ok(Self {
            id: record.take("id")?,
            email: record.take("email")?,
            password: record.take("password")?,
            admin: record.take("admin")?,
            name: record.take("name")?,
            image: record.take("image")?,
            created_at: record.take("created_at")?,
        })
    }

    fn get(&self, column: &str) -> Value {
        match column {
            "id" => self.id.clone().into(),
            "email" => self.email.clone().into(),
            "password" => self.password.clone().into(),
            "admin" => self.admin.into(),
            "name" => self.name.clone().into(),
            "image" => self.image.clone().into(),
            "created_at" => self.created_at.into(),
            _ => Value::Null,
        }
    }

    fn set(&mut self, column: &str, value: Value) -> Result<()> {
        match column {
            "id" => assign(&mut self.id, column, value),
            "email" => assign(&mut self.email, column, value),
            "password" => assign(&mut self.password, column, value),
            "admin" => assign(&mut self.admin, column, value),
            "name" => assign(&mut self.name, column, value),
            "image" => assign(&mut self.image, column, value),
            "created_at" => assign(&mut self.created_at, column, value),
            _ => unknown(column),
        }
    }
}

impl User {
    pub fn masked(mut self) -> Self {
        self.password = MASKED_PASSWORD.to_string();
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Blog {
    pub id: Option<String>,
    pub user_id: String,
    pub user_name: String,
    pub user_image: String,
    pub name: String,
    pub summary: String,
    pub content: String,
    pub created_at: Option<f64>,
}

impl Entity for Blog {
    fn definition() -> EntityDefinition {
        EntityDefinition::new("blogs")
            .field("id", Field::string().primary_key().generated(next_id))
            .field("user_id", Field::string())
            .field("user_name", Field::string())
            .field("user_image", Field::string())
            .field("name", Field::string())
            .field("summary", Field::string())
            .field("content", Field::text())
            .field("created_at", Field::float().generated(now_timestamp))
    }

    fn from_record(mut record: Record) -> Result<Self> {
        Ok(Self {
            id: record.take("id")?,
            user_id: record.take("user_id")?,
            user_name: record.take("user_name")?,
            user_image: record.take("user_image")?,
            name: record.take("name")?,
            summary: record.take("summary")?,
            content: record.take("content")?,
            created_at: record.take("created_at")?,
        })
    }

    fn get(&self, column: &str) -> Value {
        match column {
            "id" => self.id.clone().into(),
            "user_id" => self.user_id.clone().into(),
            "user_name" => self.user_name.clone().into(),
            "user_image" => self.user_image.clone().into(),
            "name" => self.name.clone().into(),
            "summary" => self.summary.clone().into(),
            "content" => self.content.clone().into(),
            "created_at" => self.created_at.into(),
            _ => Value::Null,
        }
    }

    fn set(&mut self, column: &str, value: Value) -> Result<()> {
        match column {
            "id" => assign(&mut self.id, column, value),
            "user_id" => assign(&mut self.user_id, column, value),
            "user_name" => assign(&mut self.user_name, column, value),
            "user_image" => assign(&mut self.user_image, column, value),
            "name" => assign(&mut self.name, column, value),
            "summary" => assign(&mut self.summary, column, value),
            "content" => assign(&mut self.content, column, value),
            "created_at" => assign(&mut self.created_at, column, value),
            _ => unknown(column),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Comment {
    pub id: Option<String>,
    pub blog_id: String,
    pub user_id: String,
    pub user_name: String,
    pub user_image: String,
    pub content: String,
    pub created_at: Option<f64>,
}

impl Entity for Comment {
    fn definition() -> EntityDefinition {
        EntityDefinition::new("comments")
            .field("id", Field::string().primary_key().generated(next_id))
            .field("blog_id", Field::string())
            .field("user_id", Field::string())
            .field("user_name", Field::string())
            .field("user_image", Field::string())
            .field("content", Field::text())
            .field("created_at", Field::float().generated(now_timestamp))
    }

    fn from_record(mut record: Record) -> Result<Self> {
        Ok(Self {
            id: record.take("id")?,
            blog_id: record.take("blog_id")?,
            user_id: record.take("user_id")?,
            user_name: record.take("user_name")?,
            user_image: record.take("user_image")?,
            content: record.take("content")?,
            created_at: record.take("created_at")?,
        })
    }

    fn get(&self, column: &str) -> Value {
        match column {
            "id" => self.id.clone().into(),
            "blog_id" => self.blog_id.clone().into(),
            "user_id" => self.user_id.clone().into(),
            "user_name" => self.user_name.clone().into(),
            "user_image" => self.user_image.clone().into(),
            "content" => self.content.clone().into(),
            "created_at" => self.created_at.into(),
            _ => Value::Null,
        }
    }

    fn set(&mut self, column: &str, value: Value) -> Result<()> {
        match column {
            "id" => assign(&mut self.id, column, value),
            "blog_id" => assign(&mut self.blog_id, column, value),
            "user_id" => assign(&mut self.user_id, column, value),
            "user_name" => assign(&mut self.user_name, column, value),
            "user_image" => assign(&mut self.user_image, column, value),
            "content" => assign(&mut self.content, column, value),
            "created_at" => assign(&mut self.created_at, column, value),
            _ => unknown(column),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Image {
    pub id: Option<String>,
    pub url: String,
    pub created_at: Option<f64>,
}

impl Entity for Image {
    fn definition() -> EntityDefinition {
        EntityDefinition::new("images")
            .field("id", Field::string().primary_key().generated(next_id))
            .field("url", Field::string())
            .field("created_at", Field::float().generated(now_timestamp))
    }

    fn from_record(mut record: Record) -> Result<Self> {
        Ok(Self {
            id: record.take("id")?,
            url: record.take("url")?,
            created_at: record.take("created_at")?,
        })
    }

    fn get(&self, column: &str) -> Value {
        match column {
            "id" => self.id.clone().into(),
            "url" => self.url.clone().into(),
            "created_at" => self.created_at.into(),
            _ => Value::Null,
        }
    }

    fn set(&mut self, column: &str, value: Value) -> Result<()> {
        match column {
            "id" => assign(&mut self.id, column, value),
            "url" => assign(&mut self.url, column, value),
            "created_at" => assign(&mut self.created_at, column, value),
            _ => unknown(column),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_definitions_build() {
        let user = User::definition().build().unwrap();
        assert_eq!(user.primary_key(), "id");
        assert_eq!(user.columns().len(), 6);

        let blog = Blog::definition().build().unwrap();
        assert_eq!(blog.table(), "blogs");
        Comment::definition().build().unwrap();
        Image::definition().build().unwrap();
    }

    #[test]
    fn test_get_set_agree() {
        let mut blog = Blog::default();
        blog.set("summary", Value::from("short")).unwrap();
        blog.set("created_at", Value::Float(3.5)).unwrap();
        assert_eq!(blog.get("summary"), Value::from("short"));
        assert_eq!(blog.get("created_at"), Value::Float(3.5));
        assert!(blog.get("id").is_null());
        assert!(matches!(blog.set("nope", Value::Null), Err(Error::UnknownColumn(_))));
    }

    #[test]
    fn test_boolean_reads_integer_cells() {
        let record: Record = [
            ("id", Value::from("u1")),
            ("email", Value::from("a@example.com")),
            ("password", Value::from("hash")),
            ("admin", Value::Integer(1)),
            ("name", Value::from("Ann")),
            ("image", Value::from("about:blank")),
            ("created_at", Value::Float(1.0)),
        ]
        .into_iter()
        .map(|(column, value)| (column.to_string(), value))
        .collect();

        let user = User::from_record(record).unwrap().masked();
        assert!(user.admin);
        assert_eq!(user.password, MASKED_PASSWORD);
    }
}
