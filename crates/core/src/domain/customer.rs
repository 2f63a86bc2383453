//! Read-only customer projection as returned by the CRM.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Customer {
    pub id: i64,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phones: Vec<PhoneRecord>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PhoneRecord {
    pub number: Option<String>,
}

impl Customer {
    pub fn has_phone(&self, phone: &str) -> bool {
        self.phones.iter().any(|record| record.number.as_deref() == Some(phone))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::Customer;

    #[test]
    fn deserializes_crm_payload() {
        let customer: Customer = serde_json::from_value(json!({
            "id": 7,
            "firstName": "Anna",
            "lastName": "K",
            "phones": [{"number": "+79161234567"}]
        }))
        .expect("payload should decode");

        assert_eq!(customer.id, 7);
        assert!(customer.has_phone("+79161234567"));
        assert!(!customer.has_phone("+70000000000"));
    }
}
