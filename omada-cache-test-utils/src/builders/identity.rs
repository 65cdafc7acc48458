use serde_json::{Map, Value, json};

/// Builder for identity records as returned by the Omada OData API
#[derive(Debug, Clone)]
pub struct IdentityBuilder {
    uid: Option<String>,
    email: Option<String>,
    identity_id: Option<String>,
    first_name: String,
    last_name: String,
    extra: Map<String, Value>,
}

impl IdentityBuilder {
    /// Start a record with the given `UId`
    pub fn new(uid: &str) -> Self {
        Self {
            uid: Some(uid.to_string()),
            email: None,
            identity_id: None,
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            extra: Map::new(),
        }
    }

    /// Start a record with no `UId`, which the identity index rejects
    pub fn without_uid() -> Self {
        Self {
            uid: None,
            ..Self::new("")
        }
    }

    pub fn with_email(mut self, email: &str) -> Self {
        self.email = Some(email.to_string());
        self
    }

    pub fn with_identity_id(mut self, identity_id: &str) -> Self {
        self.identity_id = Some(identity_id.to_string());
        self
    }

    pub fn with_name(mut self, first_name: &str, last_name: &str) -> Self {
        self.first_name = first_name.to_string();
        self.last_name = last_name.to_string();
        self
    }

    /// Add any other attribute to the record
    pub fn with_field(mut self, field: &str, value: Value) -> Self {
        self.extra.insert(field.to_string(), value);
        self
    }

    pub fn build(self) -> Value {
        let mut record = self.extra;
        if let Some(uid) = self.uid {
            record.insert("UId".to_string(), json!(uid));
        }
        if let Some(email) = self.email {
            record.insert("EMAIL".to_string(), json!(email));
        }
        if let Some(identity_id) = self.identity_id {
            record.insert("IDENTITYID".to_string(), json!(identity_id));
        }
        record.insert(
            "DISPLAYNAME".to_string(),
            json!(format!("{} {}", self.first_name, self.last_name)),
        );
        record.insert("FIRSTNAME".to_string(), json!(self.first_name));
        record.insert("LASTNAME".to_string(), json!(self.last_name));
        Value::Object(record)
    }
}
