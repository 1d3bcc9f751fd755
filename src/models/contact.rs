//! Contact entity served by the demo API.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::expr::{FieldAccess, Value};
use crate::repository::Entity;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    /// Zero until the repository assigns a key
    #[serde(default)]
    pub id: i32,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
}

impl Contact {
    pub fn new(name: impl Into<String>, email: Option<String>) -> Self {
        Self {
            id: 0,
            name: name.into(),
            email,
        }
    }
}

impl FieldAccess for Contact {
    fn field(&self, name: &str) -> Option<Value> {
        match name {
            "id" => Some(self.id.into()),
            "name" => Some(self.name.as_str().into()),
            "email" => Some(self.email.clone().into()),
            _ => None,
        }
    }

    fn as_value(&self) -> Result<Value> {
        Ok(Value::record([
            ("id", Value::from(self.id)),
            ("name", Value::from(self.name.as_str())),
            ("email", Value::from(self.email.clone())),
        ]))
    }
}

impl Entity for Contact {
    type Key = i32;

    fn type_name() -> &'static str {
        "Contact"
    }

    fn primary_key(&self) -> i32 {
        self.id
    }

    fn set_primary_key(&mut self, key: i32) {
        self.id = key;
    }
}
