use async_trait::async_trait;
use geojson::FeatureCollection;
use thiserror::Error;
use tracing::debug;
use url::Url;

use super::bounds::BoundingBox;
use crate::config::PoiConfig;

/// CRS the WFS bbox is expressed in. EPSG:4326 in URN form means lat/lng axis order.
const BBOX_CRS: &str = "urn:ogc:def:crs:EPSG::4326";

#[derive(Debug, Error)]
pub enum PoiError {
    #[error("Invalid POI service URL: {0}")]
    InvalidUrl(String),

    #[error("POI request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("POI service returned status {0}")]
    Status(reqwest::StatusCode),

    #[error("POI response could not be decoded: {0}")]
    Decode(String),
}

/// A feature service that can be queried by bounding box.
#[async_trait]
pub trait PoiSource: Send + Sync {
    async fn query(&self, bbox: &BoundingBox, max_features: u32) -> Result<FeatureCollection, PoiError>;
}

/// WFS 2.0 `GetFeature` client returning GeoJSON.
#[derive(Debug, Clone)]
pub struct WfsPoiClient {
    client: reqwest::Client,
    base_url: Url,
    type_name: String,
}

impl WfsPoiClient {
    pub fn new(base_url: &str, type_name: impl Into<String>) -> Result<Self, PoiError> {
        let base_url = Url::parse(base_url).map_err(|e| PoiError::InvalidUrl(format!("{}: {}", base_url, e)))?;

        // No request timeout: a hung fetch simply leaves the loading flag on
        let client = reqwest::Client::builder().build()?;

        Ok(Self {
            client,
            base_url,
            type_name: type_name.into(),
        })
    }

    pub fn from_config(config: &PoiConfig) -> Result<Self, PoiError> {
        Self::new(&config.base_url, config.type_name.clone())
    }

    /// Full request URL for a bbox query.
    pub fn query_url(&self, bbox: &BoundingBox, max_features: u32) -> Url {
        let mut url = self.base_url.clone();
        url.query_pairs_mut()
            .append_pair("service", "WFS")
            .append_pair("version", "2.0.0")
            .append_pair("request", "GetFeature")
            .append_pair("typeNames", &self.type_name)
            .append_pair("outputFormat", "application/json")
            .append_pair("count", &max_features.to_string())
            .append_pair(
                "bbox",
                &format!(
                    "{},{},{},{},{}",
                    bbox.south, bbox.west, bbox.north, bbox.east, BBOX_CRS
                ),
            );
        url
    }
}

#[async_trait]
impl PoiSource for WfsPoiClient {
    async fn query(&self, bbox: &BoundingBox, max_features: u32) -> Result<FeatureCollection, PoiError> {
        let url = self.query_url(bbox, max_features);
        debug!("POI query: {}", url);

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(PoiError::Status(status));
        }

        let body = response.bytes().await?;
        serde_json::from_slice::<FeatureCollection>(&body).map_err(|e| PoiError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_url_uses_lat_lng_order() {
        let client = WfsPoiClient::new("http://localhost:8080/geoserver/wfs", "osm:poi").unwrap();
        let url = client.query_url(&BoundingBox::new(-1.5, 50.25, -1.25, 50.5), 1000);

        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        let get = |k: &str| pairs.iter().find(|(key, _)| key == k).map(|(_, v)| v.as_str());

        assert_eq!(get("request"), Some("GetFeature"));
        assert_eq!(get("typeNames"), Some("osm:poi"));
        assert_eq!(get("outputFormat"), Some("application/json"));
        assert_eq!(get("count"), Some("1000"));
        assert_eq!(get("bbox"), Some("50.25,-1.5,50.5,-1.25,urn:ogc:def:crs:EPSG::4326"));
    }

    #[test]
    fn query_url_keeps_existing_parameters() {
        let client = WfsPoiClient::new("http://localhost/wfs?map=poi.map", "poi").unwrap();
        let url = client.query_url(&BoundingBox::new(0.0, 0.0, 1.0, 1.0), 10);
        assert!(url.as_str().starts_with("http://localhost/wfs?map=poi.map&service=WFS"));
    }

    #[test]
    fn rejects_invalid_base_url() {
        assert!(matches!(
            WfsPoiClient::new("not a url", "poi"),
            Err(PoiError::InvalidUrl(_))
        ));
    }
}
