//! Wire representations of Dwolla request and response bodies.

use serde::{Deserialize, Serialize};

use crate::domain::gateway::{rel, HalLink, HalLinks, Money, TransferRecord, TransferRequest, TransferStatus};

/// Body of `POST /transfers`.
#[derive(Debug, Serialize)]
pub struct CreateTransferBody<'a> {
    #[serde(rename = "_links")]
    pub links: TransferBodyLinks<'a>,
    pub amount: &'a Money,
}

#[derive(Debug, Serialize)]
pub struct TransferBodyLinks<'a> {
    pub source: &'a HalLink,
    pub destination: &'a HalLink,
}

impl<'a> From<&'a TransferRequest> for CreateTransferBody<'a> {
    fn from(request: &'a TransferRequest) -> Self {
        Self {
            links: TransferBodyLinks {
                source: &request.source,
                destination: &request.destination,
            },
            amount: &request.amount,
        }
    }
}

/// A transfer resource as returned by `GET /transfers/{id}`.
#[derive(Debug, Deserialize)]
pub struct TransferResource {
    pub id: String,
    pub status: TransferStatus,
    #[serde(default)]
    pub amount: Option<Money>,
    #[serde(rename = "_links", default)]
    pub links: HalLinks,
}

impl TransferResource {
    pub fn into_record(self, snapshot: serde_json::Value) -> TransferRecord {
        TransferRecord {
            id: self.id,
            status: self.status,
            links: self.links,
            amount: self.amount,
            failure: None,
            snapshot,
        }
    }
}

/// Builds a transfer resource body the way Dwolla renders one.
pub fn transfer_json(
    base_url: &str,
    id: &str,
    status: &str,
    request: &TransferRequest,
) -> serde_json::Value {
    let self_href = format!("{}/transfers/{}", base_url.trim_end_matches('/'), id);
    let mut links = serde_json::json!({
        "self": { "href": self_href },
        "source": { "href": request.source.href },
        "destination": { "href": request.destination.href },
    });
    if TransferStatus::parse(status).is_failed() {
        links[rel::FAILURE] = serde_json::json!({ "href": format!("{}/failure", self_href) });
    }
    serde_json::json!({
        "_links": links,
        "id": id,
        "status": status,
        "amount": request.amount,
        "created": chrono::Utc::now().to_rfc3339(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn request() -> TransferRequest {
        TransferRequest {
            amount: Money::new(Decimal::new(2500, 2), "USD"),
            source: HalLink::new("https://api-sandbox.dwolla.com/funding-sources/a"),
            destination: HalLink::new("https://api-sandbox.dwolla.com/accounts/b"),
        }
    }

    #[test]
    fn create_body_matches_dwolla_shape() {
        let request = request();
        let body = serde_json::to_value(CreateTransferBody::from(&request)).unwrap();
        assert_eq!(body["_links"]["source"]["href"], "https://api-sandbox.dwolla.com/funding-sources/a");
        assert_eq!(body["_links"]["destination"]["href"], "https://api-sandbox.dwolla.com/accounts/b");
        assert_eq!(body["amount"]["value"], "25.00");
        assert_eq!(body["amount"]["currency"], "USD");
    }

    #[test]
    fn transfer_resource_parses_into_record() {
        let json = transfer_json("https://api-sandbox.dwolla.com", "t-1", "failed", &request());
        let resource: TransferResource = serde_json::from_value(json.clone()).unwrap();
        let record = resource.into_record(json);
        assert_eq!(record.id, "t-1");
        assert_eq!(record.status, TransferStatus::Failed);
        assert!(record.failure_link().is_some());
        assert_eq!(record.amount.unwrap().value, Decimal::new(2500, 2));
    }
}
