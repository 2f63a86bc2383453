//! Read-only order projection as returned by the CRM.
//!
//! Only the fields the bot actually reads are typed. Delivery details and
//! custom fields stay as raw JSON because CRM deployments disagree about
//! where (and under what name) values such as the tracking number live;
//! those are probed through an ordered extraction table instead.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Order {
    pub id: i64,
    pub number: Option<String>,
    pub status: Option<String>,
    pub status_comment: Option<String>,
    /// CRM timestamp in `YYYY-MM-DD HH:MM:SS` form. Kept as a string; the
    /// fixed format makes lexicographic order chronological.
    pub created_at: Option<String>,
    /// Multi-tenant partition key. Required on writes when known.
    pub site: Option<String>,
    pub customer: Option<CustomerRef>,
    pub delivery: Value,
    pub custom_fields: Value,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CustomerRef {
    pub id: Option<i64>,
}

/// Where to look for a tracking number, in priority order.
enum TrackingPath {
    Delivery(&'static str),
    DeliveryData(&'static str),
    DeliveryTracks(&'static str),
    CustomField(&'static str),
}

const TRACKING_PATHS: &[TrackingPath] = &[
    TrackingPath::Delivery("number"),
    TrackingPath::Delivery("trackNumber"),
    TrackingPath::Delivery("trackingNumber"),
    TrackingPath::Delivery("track_number"),
    TrackingPath::Delivery("tracking_number"),
    TrackingPath::DeliveryData("number"),
    TrackingPath::DeliveryData("trackNumber"),
    TrackingPath::DeliveryData("trackingNumber"),
    TrackingPath::DeliveryData("track_number"),
    TrackingPath::DeliveryData("tracking_number"),
    TrackingPath::DeliveryData("barcode"),
    TrackingPath::DeliveryTracks("number"),
    TrackingPath::DeliveryTracks("trackNumber"),
    TrackingPath::DeliveryTracks("trackingNumber"),
    TrackingPath::DeliveryTracks("code"),
    TrackingPath::CustomField("track"),
    TrackingPath::CustomField("track_number"),
    TrackingPath::CustomField("tracking_number"),
    TrackingPath::CustomField("ttn"),
    TrackingPath::CustomField("awb"),
    TrackingPath::CustomField("awb_number"),
];

fn non_empty_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
        _ => None,
    }
}

impl Order {
    /// Human-readable status: the operator comment when present, otherwise
    /// the raw status code.
    pub fn display_status(&self) -> Option<&str> {
        self.status_comment
            .as_deref()
            .filter(|text| !text.trim().is_empty())
            .or(self.status.as_deref())
    }

    pub fn custom_field(&self, name: &str) -> Option<&Value> {
        self.custom_fields.get(name)
    }

    /// Custom field value rendered as text. String and numeric values are
    /// accepted; anything else is treated as absent.
    pub fn custom_field_text(&self, name: &str) -> Option<String> {
        match self.custom_field(name)? {
            Value::String(text) => Some(text.trim().to_string()),
            Value::Number(number) => Some(number.to_string()),
            _ => None,
        }
    }

    /// First non-empty tracking number candidate, following the extraction
    /// table above.
    pub fn tracking_number(&self) -> Option<String> {
        TRACKING_PATHS.iter().find_map(|path| match path {
            TrackingPath::Delivery(key) => self.delivery.get(key).and_then(non_empty_text),
            TrackingPath::DeliveryData(key) => {
                self.delivery.get("data").and_then(|data| data.get(key)).and_then(non_empty_text)
            }
            TrackingPath::DeliveryTracks(key) => self
                .delivery
                .get("tracks")
                .and_then(Value::as_array)
                .and_then(|tracks| {
                    tracks.iter().find_map(|track| track.get(key).and_then(non_empty_text))
                }),
            TrackingPath::CustomField(key) => self.custom_field(key).and_then(non_empty_text),
        })
    }
}

/// Orders the slice by creation time, newest first. Orders without a
/// creation timestamp sort last.
pub fn sort_newest_first(orders: &mut [Order]) {
    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{sort_newest_first, Order};

    fn order_with_delivery(delivery: serde_json::Value) -> Order {
        Order { delivery, ..Order::default() }
    }

    #[test]
    fn deserializes_crm_payload() {
        let order: Order = serde_json::from_value(json!({
            "id": 42,
            "number": "A-42",
            "status": "assembling",
            "statusComment": "Being packed",
            "createdAt": "2024-05-01 10:00:00",
            "site": "main",
            "customer": {"id": 7},
            "customFields": {"bot_code": "7488"}
        }))
        .expect("payload should decode");

        assert_eq!(order.id, 42);
        assert_eq!(order.number.as_deref(), Some("A-42"));
        assert_eq!(order.customer.as_ref().and_then(|c| c.id), Some(7));
        assert_eq!(order.custom_field_text("bot_code").as_deref(), Some("7488"));
        assert_eq!(order.display_status(), Some("Being packed"));
    }

    #[test]
    fn display_status_falls_back_to_raw_status() {
        let order = Order {
            status: Some("shipped".to_string()),
            status_comment: Some("  ".to_string()),
            ..Order::default()
        };
        assert_eq!(order.display_status(), Some("shipped"));
    }

    #[test]
    fn tracking_prefers_top_level_delivery_number() {
        let order = order_with_delivery(json!({
            "number": "CD123",
            "data": {"trackNumber": "nested"}
        }));
        assert_eq!(order.tracking_number().as_deref(), Some("CD123"));
    }

    #[test]
    fn tracking_falls_through_to_nested_delivery_data() {
        let order = order_with_delivery(json!({
            "number": "",
            "data": {"barcode": "BAR-9"}
        }));
        assert_eq!(order.tracking_number().as_deref(), Some("BAR-9"));
    }

    #[test]
    fn tracking_reads_track_list_entries() {
        let order = order_with_delivery(json!({
            "tracks": [{"code": ""}, {"number": "TRK-1"}]
        }));
        assert_eq!(order.tracking_number().as_deref(), Some("TRK-1"));
    }

    #[test]
    fn tracking_reads_order_custom_fields_last() {
        let order = Order {
            custom_fields: json!({"ttn": " 1020304050 "}),
            ..Order::default()
        };
        assert_eq!(order.tracking_number().as_deref(), Some("1020304050"));
    }

    #[test]
    fn tracking_absent_when_all_candidates_empty() {
        let order = order_with_delivery(json!({"number": "", "data": {}}));
        assert_eq!(order.tracking_number(), None);
    }

    #[test]
    fn sorting_puts_newest_first_and_undated_last() {
        let mut orders = vec![
            Order { id: 1, created_at: Some("2024-01-01 09:00:00".to_string()), ..Order::default() },
            Order { id: 2, created_at: None, ..Order::default() },
            Order { id: 3, created_at: Some("2024-06-01 09:00:00".to_string()), ..Order::default() },
        ];
        sort_newest_first(&mut orders);
        let ids: Vec<i64> = orders.iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![3, 1, 2]);
    }
}
