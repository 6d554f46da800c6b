//! Reads records and continuation cursors out of upstream listing responses.
use crate::config::{FieldPath, RecordFields};
use crate::types::ItemRecord;
use serde_json::Value as JsonValue;

/// One page of a cursor-paginated listing.
#[derive(Clone, Debug, PartialEq)]
pub struct Page {
    pub records: Vec<ItemRecord>,
    pub next_cursor: Option<String>,
}

impl Page {
    /// Fails only when the record list itself is missing or not an array.
    /// Individual entries without a usable id are skipped.
    pub fn parse(body: &JsonValue, fields: &RecordFields) -> Result<Self, String> {
        let list = fields
            .list
            .lookup(body)
            .and_then(JsonValue::as_array)
            .ok_or_else(|| format!("expected an array at `{}`", fields.list))?;

        let mut records = Vec::with_capacity(list.len());
        for entry in list {
            match parse_record(entry, fields) {
                Some(record) => records.push(record),
                None => tracing::debug!(entry = %entry, "skipping record without a valid id"),
            }
        }

        let next_cursor = fields
            .cursor
            .lookup(body)
            .and_then(JsonValue::as_str)
            .filter(|cursor| !cursor.is_empty())
            .map(String::from);

        Ok(Page {
            records,
            next_cursor,
        })
    }
}

fn parse_record(entry: &JsonValue, fields: &RecordFields) -> Option<ItemRecord> {
    let id = read_id(entry, &fields.id)?;
    let name = fields
        .name
        .lookup(entry)
        .and_then(JsonValue::as_str)
        .filter(|name| !name.is_empty())
        .map(String::from);
    let place_id = fields
        .place_id
        .as_ref()
        .and_then(|path| read_id(entry, path));

    Some(ItemRecord { id, name, place_id })
}

/// Ids arrive either as JSON numbers or as numeric strings.
fn read_id(entry: &JsonValue, path: &FieldPath) -> Option<u64> {
    let id = match path.lookup(entry)? {
        JsonValue::Number(number) => number.as_u64(),
        JsonValue::String(text) => text.parse().ok(),
        _ => None,
    };
    id.filter(|id| *id > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn experience_fields() -> RecordFields {
        RecordFields {
            place_id: Some("rootPlace.id".into()),
            ..RecordFields::default()
        }
    }

    #[test]
    fn test_parse_page() {
        let body = json!({
            "data": [
                {"id": 1, "name": "Obby", "rootPlace": {"id": 10}},
                {"id": "2", "name": "", "rootPlace": null},
                {"name": "no id"},
                {"id": 0, "name": "zero id"}
            ],
            "nextPageCursor": "abc"
        });

        let page = Page::parse(&body, &experience_fields()).unwrap();
        assert_eq!(
            page.records,
            vec![
                ItemRecord {
                    id: 1,
                    name: Some("Obby".into()),
                    place_id: Some(10)
                },
                ItemRecord {
                    id: 2,
                    name: None,
                    place_id: None
                },
            ]
        );
        assert_eq!(page.next_cursor.as_deref(), Some("abc"));
    }

    #[test]
    fn test_absent_and_empty_cursor() {
        let fields = RecordFields::default();

        let page = Page::parse(&json!({"data": [], "nextPageCursor": null}), &fields).unwrap();
        assert_eq!(page.next_cursor, None);

        let page = Page::parse(&json!({"data": [], "nextPageCursor": ""}), &fields).unwrap();
        assert_eq!(page.next_cursor, None);

        let page = Page::parse(&json!({"data": []}), &fields).unwrap();
        assert_eq!(page.next_cursor, None);
    }

    #[test]
    fn test_custom_list_field() {
        let fields = RecordFields {
            list: "gamePasses".into(),
            name: "displayName".into(),
            ..RecordFields::default()
        };
        let body = json!({"gamePasses": [{"id": 5, "displayName": "VIP"}]});

        let page = Page::parse(&body, &fields).unwrap();
        assert_eq!(page.records[0].name.as_deref(), Some("VIP"));
    }

    #[test]
    fn test_missing_list_is_an_error() {
        let err = Page::parse(&json!({"errors": [{"code": 0}]}), &RecordFields::default())
            .unwrap_err();
        assert!(err.contains("`data`"));
    }
}
