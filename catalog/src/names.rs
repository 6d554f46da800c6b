use crate::config::NameLookup;
use crate::errors::UpstreamError;
use crate::fetch::Fetch;
use crate::metrics_defs::NAME_LOOKUP_FAILURES;
use crate::records::Page;
use crate::types::ItemRecord;
use shared::counter;
use std::collections::HashMap;
use tokio::time::{Duration, sleep};

/// Best-effort lookup of the names the listings left out.
///
/// Items whose name cannot be found keep `None` and are later rendered with
/// the unknown-name placeholder. Failures are logged, never returned.
pub async fn resolve_names(
    fetcher: &dyn Fetch,
    lookup: &NameLookup,
    items: &mut [ItemRecord],
    delay: Duration,
) {
    let missing: Vec<u64> = items
        .iter()
        .filter(|item| item.name.is_none())
        .map(|item| item.id)
        .collect();

    if missing.is_empty() {
        return;
    }

    let mut names: HashMap<u64, String> = HashMap::new();
    for (index, batch) in missing.chunks(lookup.batch_size.max(1)).enumerate() {
        if index > 0 && !delay.is_zero() {
            sleep(delay).await;
        }

        match fetch_batch(fetcher, lookup, batch).await {
            Ok(records) => names.extend(
                records
                    .into_iter()
                    .filter_map(|record| record.name.map(|name| (record.id, name))),
            ),
            Err(error) => {
                tracing::warn!(
                    ids = batch.len(),
                    error = %error,
                    "name lookup failed, using placeholder names"
                );
                counter!(NAME_LOOKUP_FAILURES).increment(1);
            }
        }
    }

    let mut unresolved = 0;
    for item in items.iter_mut().filter(|item| item.name.is_none()) {
        item.name = names.remove(&item.id);
        if item.name.is_none() {
            unresolved += 1;
        }
    }

    tracing::debug!(
        missing = missing.len(),
        unresolved,
        "name lookup complete"
    );
}

async fn fetch_batch(
    fetcher: &dyn Fetch,
    lookup: &NameLookup,
    batch: &[u64],
) -> Result<Vec<ItemRecord>, UpstreamError> {
    let ids = batch
        .iter()
        .map(u64::to_string)
        .collect::<Vec<_>>()
        .join(",");
    let url = lookup.url.render(&[("ids", ids.as_str())])?;
    let url_string = url.to_string();

    let body = fetcher.get_json(url, false).await?;
    let page = Page::parse(&body, &lookup.records).map_err(|message| UpstreamError::Decode {
        url: url_string,
        message,
    })?;

    Ok(page.records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RecordFields;
    use crate::testutils::{BASE, ScriptedFetcher};
    use serde_json::json;

    fn lookup(batch_size: usize) -> NameLookup {
        NameLookup {
            url: format!("{BASE}/v1/games?universeIds={{ids}}").into(),
            batch_size,
            records: RecordFields::default(),
        }
    }

    fn item(id: u64, name: Option<&str>) -> ItemRecord {
        ItemRecord {
            id,
            name: name.map(String::from),
            place_id: None,
        }
    }

    #[tokio::test]
    async fn test_fills_missing_names_in_batches() {
        let fetcher = ScriptedFetcher::new()
            .respond(
                &format!("{BASE}/v1/games?universeIds=1,3"),
                json!({"data": [{"id": 1, "name": "Obby"}, {"id": 3, "name": "Tycoon"}]}),
            )
            .respond(
                &format!("{BASE}/v1/games?universeIds=4"),
                json!({"data": []}),
            );

        let mut items = vec![
            item(1, None),
            item(2, Some("Named")),
            item(3, None),
            item(4, None),
        ];
        resolve_names(&fetcher, &lookup(2), &mut items, Duration::ZERO).await;

        assert_eq!(items[0].name.as_deref(), Some("Obby"));
        assert_eq!(items[1].name.as_deref(), Some("Named"));
        assert_eq!(items[2].name.as_deref(), Some("Tycoon"));
        assert_eq!(items[3].name, None);
        assert_eq!(items[3].display_name(), "Unknown");
        assert_eq!(fetcher.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_failure_keeps_placeholders() {
        let fetcher = ScriptedFetcher::new().fail(&format!("{BASE}/v1/games?universeIds=1"), 503);

        let mut items = vec![item(1, None)];
        resolve_names(&fetcher, &lookup(50), &mut items, Duration::ZERO).await;

        assert_eq!(items[0].display_name(), "Unknown");
    }

    #[tokio::test]
    async fn test_nothing_missing_makes_no_calls() {
        let fetcher = ScriptedFetcher::new();

        let mut items = vec![item(1, Some("Obby"))];
        resolve_names(&fetcher, &lookup(50), &mut items, Duration::ZERO).await;

        assert!(fetcher.calls().is_empty());
    }
}
