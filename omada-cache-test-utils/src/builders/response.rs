use serde_json::{Value, json};

/// Builder for OData collection responses (`{"value": [...], "@odata.count": n}`)
#[derive(Debug, Clone, Default)]
pub struct ResponseBuilder {
    items: Vec<Value>,
    with_count: bool,
}

impl ResponseBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_item(mut self, item: Value) -> Self {
        self.items.push(item);
        self
    }

    /// Add `n` numbered items of the form `{"Id": i, "Name": "<prefix> i"}`
    pub fn with_items(mut self, prefix: &str, n: usize) -> Self {
        let start = self.items.len();
        self.items.extend(
            (start..start + n).map(|i| json!({"Id": i, "Name": format!("{prefix} {i}")})),
        );
        self
    }

    pub fn with_count(mut self) -> Self {
        self.with_count = true;
        self
    }

    pub fn build(self) -> Value {
        let count = self.items.len();
        let mut response = json!({ "value": self.items });
        if self.with_count {
            response["@odata.count"] = json!(count);
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_collection() {
        let response = ResponseBuilder::new()
            .with_items("Role", 3)
            .with_count()
            .build();

        assert_eq!(response["value"].as_array().unwrap().len(), 3);
        assert_eq!(response["@odata.count"], 3);
        assert_eq!(response["value"][2]["Name"], "Role 2");
    }
}
