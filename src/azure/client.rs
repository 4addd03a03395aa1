use async_trait::async_trait;
use serde_json::json;

use crate::models::{AzureCredentials, DiscoveredResource};

use super::{ProviderClient, ProviderError, TokenCache};

const LOGIN_BASE: &str = "https://login.microsoftonline.com";
const MANAGEMENT_BASE: &str = "https://management.azure.com";
const MANAGEMENT_SCOPE: &str = "https://management.azure.com/.default";

const GRAPH_API_VERSION: &str = "2021-03-01";
const METRICS_API_VERSION: &str = "2018-01-01";
const COST_API_VERSION: &str = "2023-03-01";

pub struct AzureClient {
    http: reqwest::Client,
    credentials: AzureCredentials,
    tokens: TokenCache,
    login_base: String,
    management_base: String,
}

impl AzureClient {
    pub fn new(credentials: AzureCredentials) -> Self {
        Self {
            http: reqwest::Client::new(),
            credentials,
            tokens: TokenCache::new(),
            login_base: LOGIN_BASE.into(),
            management_base: MANAGEMENT_BASE.into(),
        }
    }

    async fn access_token(&self) -> Result<String, ProviderError> {
        if let Some(token) = self.tokens.get().await {
            return Ok(token);
        }

        let url = format!(
            "{}/{}/oauth2/v2.0/token",
            self.login_base, self.credentials.tenant_id
        );
        let response = self
            .http
            .post(&url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.credentials.client_id.as_str()),
                ("client_secret", self.credentials.client_secret.as_str()),
                ("scope", MANAGEMENT_SCOPE),
            ])
            .send()
            .await
            .map_err(|e| ProviderError::Transient(format!("token request: {e}")))?;

        if !response.status().is_success() {
            return Err(ProviderError::Auth(format!(
                "token endpoint returned {}",
                response.status()
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("token body: {e}")))?;

        let token = body
            .get("access_token")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ProviderError::InvalidResponse("token body missing access_token".into()))?
            .to_string();
        let expires_in = body
            .get("expires_in")
            .and_then(|v| v.as_i64())
            .unwrap_or(3600);

        self.tokens.store(token.clone(), expires_in).await;
        Ok(token)
    }

    async fn management_post(
        &self,
        url: &str,
        body: serde_json::Value,
    ) -> Result<serde_json::Value, ProviderError> {
        let token = self.access_token().await?;
        let response = self
            .http
            .post(url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Transient(format!("request failed: {e}")))?;
        Self::parse_management_response(response).await
    }

    async fn management_get(&self, url: &str) -> Result<serde_json::Value, ProviderError> {
        let token = self.access_token().await?;
        let response = self
            .http
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| ProviderError::Transient(format!("request failed: {e}")))?;
        Self::parse_management_response(response).await
    }

    async fn parse_management_response(
        response: reqwest::Response,
    ) -> Result<serde_json::Value, ProviderError> {
        let status = response.status();
        if status.is_success() {
            return response
                .json()
                .await
                .map_err(|e| ProviderError::InvalidResponse(format!("response body: {e}")));
        }
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(ProviderError::Auth(format!("management API returned {status}")));
        }
        if status.as_u16() == 429 || status.is_server_error() {
            return Err(ProviderError::Transient(format!("management API returned {status}")));
        }
        Err(ProviderError::InvalidResponse(format!(
            "management API returned {status}"
        )))
    }

    async fn graph_query(&self, query: &str) -> Result<Vec<DiscoveredResource>, ProviderError> {
        let url = format!(
            "{}/providers/Microsoft.ResourceGraph/resources?api-version={GRAPH_API_VERSION}",
            self.management_base
        );
        let body = json!({
            "subscriptions": [self.credentials.subscription_id],
            "query": query,
        });

        let result = self.management_post(&url, body).await?;
        let rows = result
            .get("data")
            .and_then(|v| v.as_array())
            .ok_or_else(|| ProviderError::InvalidResponse("graph result missing data".into()))?;

        Ok(rows.iter().filter_map(discovered_from_row).collect())
    }
}

#[async_trait]
impl ProviderClient for AzureClient {
    async fn list_resources_of_type(
        &self,
        resource_type: &str,
    ) -> Result<Vec<DiscoveredResource>, ProviderError> {
        let graph_type = graph_type_for(resource_type);
        let query =
            format!("Resources | where type =~ '{graph_type}' | project id, name, type, subscriptionId, tags, sku, properties");
        self.graph_query(&query).await
    }

    async fn get_metric_average(
        &self,
        resource_id: &str,
        metric_name: &str,
        lookback_days: u32,
    ) -> Result<Option<f64>, ProviderError> {
        let end = chrono::Utc::now();
        let start = end - chrono::Duration::days(i64::from(lookback_days));
        let url = format!(
            "{}{}/providers/microsoft.insights/metrics?api-version={METRICS_API_VERSION}\
             &metricnames={metric_name}&aggregation=Average&interval=P1D&timespan={}/{}",
            self.management_base,
            resource_id,
            start.format("%Y-%m-%dT%H:%M:%SZ"),
            end.format("%Y-%m-%dT%H:%M:%SZ"),
        );

        let body = self.management_get(&url).await?;
        Ok(average_from_metrics_response(&body))
    }

    async fn get_monthly_spend(&self, scope: &str) -> Result<f64, ProviderError> {
        let url = format!(
            "{}{}/providers/Microsoft.CostManagement/query?api-version={COST_API_VERSION}",
            self.management_base, scope
        );
        let body = json!({
            "type": "ActualCost",
            "timeframe": "MonthToDate",
            "dataset": {
                "granularity": "None",
                "aggregation": { "totalCost": { "name": "Cost", "function": "Sum" } }
            }
        });

        let result = self.management_post(&url, body).await?;
        let total = result
            .pointer("/properties/rows")
            .and_then(|v| v.as_array())
            .map(|rows| {
                rows.iter()
                    .filter_map(|row| row.get(0).and_then(|v| v.as_f64()))
                    .sum()
            })
            .unwrap_or(0.0);
        Ok(total)
    }

    async fn list_unattached_disks(&self) -> Result<Vec<DiscoveredResource>, ProviderError> {
        let query = "Resources | where type =~ 'microsoft.compute/disks' \
                     | where properties.diskState =~ 'Unattached' \
                     | project id, name, type, subscriptionId, tags, sku, properties";
        self.graph_query(query).await
    }
}

fn graph_type_for(resource_type: &str) -> &str {
    match resource_type {
        "virtualMachines" => "microsoft.compute/virtualmachines",
        "disks" => "microsoft.compute/disks",
        "storageAccounts" => "microsoft.storage/storageaccounts",
        "sqlDatabases" => "microsoft.sql/servers/databases",
        "serverFarms" => "microsoft.web/serverfarms",
        other => other,
    }
}

/// Flatten a Resource Graph row into a `DiscoveredResource`. Well-known
/// configuration properties land in the tag map under their canonical names
/// so rules can probe them uniformly; numeric capacity lands in metrics.
fn discovered_from_row(row: &serde_json::Value) -> Option<DiscoveredResource> {
    let resource_id = row.get("id")?.as_str()?.to_string();
    let name = row.get("name")?.as_str()?.to_string();
    let resource_type = short_type(row.get("type").and_then(|v| v.as_str()).unwrap_or_default());
    let subscription_id = row
        .get("subscriptionId")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();

    let mut tags = crate::models::Tags::new();
    if let Some(map) = row.get("tags").and_then(|v| v.as_object()) {
        for (key, value) in map {
            if let Some(s) = value.as_str() {
                tags.insert(key.clone(), s.to_string());
            }
        }
    }

    for (tag_key, pointer) in [
        ("vmSize", "/properties/hardwareProfile/vmSize"),
        ("skuName", "/sku/name"),
        ("accessTier", "/properties/accessTier"),
        ("serviceTier", "/properties/currentServiceObjectiveName"),
        ("diskState", "/properties/diskState"),
        ("createdAt", "/properties/timeCreated"),
    ] {
        if let Some(value) = row.pointer(pointer).and_then(|v| v.as_str()) {
            tags.entry(tag_key.to_string()).or_insert_with(|| value.to_string());
        }
    }

    let mut metrics = crate::models::Metrics::new();
    if let Some(size) = row.pointer("/properties/diskSizeGB").and_then(|v| v.as_f64()) {
        metrics.insert("sizeGb".into(), size);
    }

    Some(DiscoveredResource {
        resource_id,
        name,
        resource_type,
        subscription_id,
        tags,
        metrics,
        monthly_cost: None,
    })
}

fn short_type(full: &str) -> String {
    match full.to_ascii_lowercase().as_str() {
        "microsoft.compute/virtualmachines" => "virtualMachines".into(),
        "microsoft.compute/disks" => "disks".into(),
        "microsoft.storage/storageaccounts" => "storageAccounts".into(),
        "microsoft.sql/servers/databases" => "sqlDatabases".into(),
        "microsoft.web/serverfarms" => "serverFarms".into(),
        other => other.rsplit('/').next().unwrap_or(other).to_string(),
    }
}

fn average_from_metrics_response(body: &serde_json::Value) -> Option<f64> {
    let points = body
        .pointer("/value/0/timeseries/0/data")?
        .as_array()?;

    let averages: Vec<f64> = points
        .iter()
        .filter_map(|p| p.get("average").and_then(|v| v.as_f64()))
        .collect();

    if averages.is_empty() {
        return None;
    }
    Some(averages.iter().sum::<f64>() / averages.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discovered_from_graph_row() {
        let row = json!({
            "id": "/subscriptions/sub-1/resourceGroups/rg/providers/Microsoft.Compute/virtualMachines/vm-1",
            "name": "vm-1",
            "type": "microsoft.compute/virtualmachines",
            "subscriptionId": "sub-1",
            "tags": { "env": "prod" },
            "properties": { "hardwareProfile": { "vmSize": "Standard_D8s_v3" } }
        });

        let resource = discovered_from_row(&row).unwrap();
        assert_eq!(resource.resource_type, "virtualMachines");
        assert_eq!(resource.subscription_id, "sub-1");
        assert_eq!(resource.tags.get("env").map(String::as_str), Some("prod"));
        assert_eq!(
            resource.tags.get("vmSize").map(String::as_str),
            Some("Standard_D8s_v3")
        );
    }

    #[test]
    fn test_explicit_tag_wins_over_property() {
        let row = json!({
            "id": "/x/disks/d1",
            "name": "d1",
            "type": "microsoft.compute/disks",
            "subscriptionId": "sub-1",
            "tags": { "skuName": "Premium_LRS" },
            "sku": { "name": "StandardSSD_LRS" },
            "properties": { "diskSizeGB": 100 }
        });

        let resource = discovered_from_row(&row).unwrap();
        assert_eq!(
            resource.tags.get("skuName").map(String::as_str),
            Some("Premium_LRS")
        );
        assert_eq!(resource.metrics.get("sizeGb"), Some(&100.0));
    }

    #[test]
    fn test_metrics_average_over_timeseries() {
        let body = json!({
            "value": [{ "timeseries": [{ "data": [
                { "timeStamp": "2026-01-01T00:00:00Z", "average": 10.0 },
                { "timeStamp": "2026-01-02T00:00:00Z", "average": 14.0 }
            ]}]}]
        });
        assert_eq!(average_from_metrics_response(&body), Some(12.0));
    }

    #[test]
    fn test_metrics_average_empty_is_no_data() {
        let body = json!({ "value": [{ "timeseries": [{ "data": [] }] }] });
        assert_eq!(average_from_metrics_response(&body), None);
        assert_eq!(average_from_metrics_response(&json!({})), None);
    }
}
