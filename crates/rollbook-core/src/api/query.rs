//! Document list queries.
//!
//! The service takes each query as a JSON string in a repeated `queries[]`
//! parameter, e.g. `{"method":"orderDesc","attribute":"$createdAt"}`.

use serde::Serialize;

/// Creation timestamp attribute maintained by the service.
pub const CREATED_AT: &str = "$createdAt";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "method", rename_all = "camelCase")]
pub enum Query {
    OrderDesc { attribute: String },
}

impl Query {
    pub fn order_desc(attribute: &str) -> Self {
        Query::OrderDesc { attribute: attribute.to_string() }
    }

    /// Wire form of this query.
    pub fn to_param(&self) -> String {
        // Serializing a tagged enum of strings cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}
