//! DynamoDB-backed [`KeyValueStore`].

use std::collections::HashMap;
use std::str::FromStr;

use async_trait::async_trait;
use aws_sdk_dynamodb::Client;
use aws_sdk_dynamodb::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_dynamodb::types::AttributeValue;
use bigdecimal::BigDecimal;
use tracing::debug;

use super::{AttrValue, Item, KeyValueStore, ScanPage, StoreError};

/// Talks to DynamoDB through the AWS SDK.
///
/// The SDK's own retry policy is the only retrying that happens.
#[derive(Clone)]
pub struct DynamoStore {
    client: Client,
}

impl std::fmt::Debug for DynamoStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamoStore").finish_non_exhaustive()
    }
}

impl DynamoStore {
    /// Builds a client from the ambient AWS configuration, pinned to
    /// `region` and optionally pointed at `endpoint` (e.g. LocalStack).
    pub async fn connect(region: &str, endpoint: Option<&str>) -> Self {
        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_sdk_dynamodb::config::Region::new(region.to_owned()))
            .load()
            .await;

        let mut builder = aws_sdk_dynamodb::config::Builder::from(&sdk_config);
        if let Some(endpoint) = endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        Self { client: Client::from_conf(builder.build()) }
    }
}

#[async_trait]
impl KeyValueStore for DynamoStore {
    async fn get_item(&self, table: &str, key: &Item) -> Result<Option<Item>, StoreError> {
        let response = self.client
            .get_item()
            .table_name(table)
            .set_key(Some(to_dynamo_map(key)))
            .send()
            .await
            .map_err(classify)?;

        response.item().map(from_dynamo_map).transpose()
    }

    async fn put_item(&self, table: &str, item: Item) -> Result<(), StoreError> {
        self.client
            .put_item()
            .table_name(table)
            .set_item(Some(to_dynamo_map(&item)))
            .send()
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn scan(
        &self,
        table: &str,
        exclusive_start_key: Option<Item>,
    ) -> Result<ScanPage, StoreError> {
        let response = self.client
            .scan()
            .table_name(table)
            .set_exclusive_start_key(exclusive_start_key.as_ref().map(to_dynamo_map))
            .send()
            .await
            .map_err(classify)?;

        let items = response.items()
            .iter()
            .map(from_dynamo_map)
            .collect::<Result<Vec<_>, _>>()?;

        let last_evaluated_key = match response.last_evaluated_key() {
            Some(key) if !key.is_empty() => Some(from_dynamo_map(key)?),
            _ => None,
        };

        debug!(table, items = items.len(), more = last_evaluated_key.is_some(), "scan page");
        Ok(ScanPage { items, last_evaluated_key })
    }
}

// ── Error classification ─────────────────────────────────────────────────────

/// Maps an SDK failure onto a [`StoreError`] kind by its service error code,
/// keeping the service's message as the diagnostic.
fn classify<E>(err: SdkError<E>) -> StoreError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
{
    let message = err.message()
        .map(str::to_owned)
        .unwrap_or_else(|| DisplayErrorContext(&err).to_string());

    match err.code() {
        Some(
            "ProvisionedThroughputExceededException"
            | "ThrottlingException"
            | "RequestLimitExceeded",
        ) => StoreError::Throttled(message),
        Some("AccessDeniedException" | "UnrecognizedClientException") => {
            StoreError::AccessDenied(message)
        }
        Some("ValidationException" | "SerializationException") => StoreError::Validation(message),
        Some("ResourceNotFoundException") => StoreError::ResourceNotFound(message),
        _ => StoreError::Service(message),
    }
}

// ── Attribute conversion ─────────────────────────────────────────────────────

fn to_dynamo_map(item: &Item) -> HashMap<String, AttributeValue> {
    item.iter().map(|(k, v)| (k.clone(), to_dynamo(v))).collect()
}

fn to_dynamo(value: &AttrValue) -> AttributeValue {
    match value {
        AttrValue::Null    => AttributeValue::Null(true),
        AttrValue::Bool(b) => AttributeValue::Bool(*b),
        AttrValue::S(s)    => AttributeValue::S(s.clone()),
        AttrValue::N(n)    => AttributeValue::N(n.to_string()),
        AttrValue::L(list) => AttributeValue::L(list.iter().map(to_dynamo).collect()),
        AttrValue::M(map)  => AttributeValue::M(to_dynamo_map(map)),
    }
}

fn from_dynamo_map(map: &HashMap<String, AttributeValue>) -> Result<Item, StoreError> {
    map.iter()
        .map(|(k, v)| from_dynamo(v).map(|v| (k.clone(), v)))
        .collect()
}

/// Sets come back as plain lists; binary attributes are not part of any
/// collection this system serves.
fn from_dynamo(value: &AttributeValue) -> Result<AttrValue, StoreError> {
    Ok(match value {
        AttributeValue::Null(_)  => AttrValue::Null,
        AttributeValue::Bool(b)  => AttrValue::Bool(*b),
        AttributeValue::S(s)     => AttrValue::S(s.clone()),
        AttributeValue::N(n)     => AttrValue::N(parse_number(n)?),
        AttributeValue::Ss(set)  => AttrValue::L(set.iter().cloned().map(AttrValue::S).collect()),
        AttributeValue::Ns(set)  => AttrValue::L(
            set.iter().map(|n| parse_number(n).map(AttrValue::N)).collect::<Result<_, _>>()?,
        ),
        AttributeValue::L(list)  => AttrValue::L(
            list.iter().map(from_dynamo).collect::<Result<_, _>>()?,
        ),
        AttributeValue::M(map)   => AttrValue::M(from_dynamo_map(map)?),
        other => {
            return Err(StoreError::Service(format!("unsupported attribute value: {other:?}")));
        }
    })
}

fn parse_number(text: &str) -> Result<BigDecimal, StoreError> {
    BigDecimal::from_str(text)
        .map_err(|e| StoreError::Service(format!("malformed number `{text}`: {e}")))
}

#[cfg(test)]
mod tests {
    use aws_sdk_dynamodb::operation::get_item::GetItemError;
    use aws_smithy_runtime_api::client::orchestrator::HttpResponse;
    use aws_smithy_runtime_api::http::StatusCode;
    use aws_smithy_types::body::SdkBody;
    use aws_smithy_types::error::ErrorMetadata;

    use super::*;

    fn service_error(code: &str, message: &str) -> SdkError<GetItemError> {
        let meta = ErrorMetadata::builder().code(code).message(message).build();
        let raw = HttpResponse::new(StatusCode::try_from(400).unwrap(), SdkBody::empty());
        SdkError::service_error(GetItemError::generic(meta), raw)
    }

    #[test]
    fn throttling_codes_are_throttled() {
        for code in ["ProvisionedThroughputExceededException", "ThrottlingException"] {
            let err = classify(service_error(code, "Rate of requests exceeds the allowed throughput."));
            assert!(matches!(err, StoreError::Throttled(_)), "{code}: {err:?}");
            assert_eq!(err.message(), "Rate of requests exceeds the allowed throughput.");
        }
    }

    #[test]
    fn access_denied_keeps_service_message() {
        let err = classify(service_error(
            "AccessDeniedException",
            "User is not authorized to perform: dynamodb:GetItem",
        ));
        assert!(matches!(err, StoreError::AccessDenied(_)));
        assert_eq!(err.message(), "User is not authorized to perform: dynamodb:GetItem");
    }

    #[test]
    fn validation_keeps_service_message() {
        let err = classify(service_error(
            "ValidationException",
            "The provided key element does not match the schema",
        ));
        assert!(matches!(err, StoreError::Validation(_)));
        assert_eq!(err.message(), "The provided key element does not match the schema");
    }

    #[test]
    fn unknown_codes_are_service_errors() {
        let err = classify(service_error("InternalServerError", "Internal server error"));
        assert!(matches!(err, StoreError::Service(_)));
        assert_eq!(err.message(), "Internal server error");
    }

    #[test]
    fn attributes_convert_both_ways() {
        let item = Item::from([
            ("mandirName".to_owned(), AttrValue::S("Edison".into())),
            ("count".to_owned(), AttrValue::N(BigDecimal::from(12))),
            ("active".to_owned(), AttrValue::Bool(true)),
            ("notes".to_owned(), AttrValue::Null),
            ("tags".to_owned(), AttrValue::L(vec![AttrValue::S("x".into())])),
        ]);

        let dynamo = to_dynamo_map(&item);
        assert_eq!(dynamo["count"], AttributeValue::N("12".into()));
        assert_eq!(from_dynamo_map(&dynamo).unwrap(), item);
    }

    #[test]
    fn number_sets_become_lists() {
        let value = AttributeValue::Ns(vec!["1".into(), "2.5".into()]);
        let AttrValue::L(list) = from_dynamo(&value).unwrap() else {
            panic!("expected list");
        };
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn malformed_numbers_are_service_errors() {
        let err = from_dynamo(&AttributeValue::N("twelve".into())).unwrap_err();
        assert!(matches!(err, StoreError::Service(_)));
    }
}
