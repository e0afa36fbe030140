//! Nominatim / OpenStreetMap reverse geocoder client.
//!
//! Nominatim has strict rate limits: **1 request per second** maximum on
//! the public instance.
//!
//! See <https://nominatim.org/release-docs/develop/api/Reverse/>

use sidewalk_measurement_models::Coordinate;

use crate::GeocodeError;

/// Builds an HTTP client that identifies itself with `user_agent`.
///
/// # Errors
///
/// Returns [`GeocodeError::Http`] if the client cannot be constructed.
pub fn client(user_agent: &str) -> Result<reqwest::Client, GeocodeError> {
    Ok(reqwest::Client::builder().user_agent(user_agent).build()?)
}

/// Reverse-geocodes a single coordinate to street address text.
///
/// The caller is responsible for rate limiting.
///
/// # Errors
///
/// Returns [`GeocodeError`] if the HTTP request or response parsing fails.
pub async fn reverse_geocode(
    client: &reqwest::Client,
    base_url: &str,
    coordinate: Coordinate,
) -> Result<Option<String>, GeocodeError> {
    let lat = coordinate.latitude.to_string();
    let lon = coordinate.longitude.to_string();

    let resp = client
        .get(base_url)
        .query(&[
            ("lat", lat.as_str()),
            ("lon", lon.as_str()),
            ("format", "jsonv2"),
            ("addressdetails", "1"),
            ("zoom", "18"),
        ])
        .send()
        .await?;

    if resp.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(GeocodeError::RateLimited);
    }

    let body: serde_json::Value = resp.error_for_status()?.json().await?;
    parse_response(&body)
}

/// Extracts `house_number road` from a reverse response.
///
/// A point with no road yields `None`, as does Nominatim's
/// `{"error": "Unable to geocode"}` body.
pub(crate) fn parse_response(body: &serde_json::Value) -> Result<Option<String>, GeocodeError> {
    let object = body.as_object().ok_or_else(|| GeocodeError::Parse {
        message: "Nominatim response is not an object".to_string(),
    })?;

    if object.contains_key("error") {
        return Ok(None);
    }

    let Some(address) = object.get("address") else {
        return Ok(None);
    };

    let Some(road) = address["road"].as_str().filter(|s| !s.is_empty()) else {
        return Ok(None);
    };

    Ok(Some(match address["house_number"].as_str() {
        Some(number) if !number.is_empty() => format!("{number} {road}"),
        _ => road.to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_house_number_and_road() {
        let body = serde_json::json!({
            "lat": "37.7749",
            "lon": "-122.4194",
            "display_name": "1 Dr Carlton B Goodlett Place, San Francisco, CA, USA",
            "address": {
                "house_number": "1",
                "road": "Dr Carlton B Goodlett Place",
                "city": "San Francisco"
            }
        });
        assert_eq!(
            parse_response(&body).unwrap().as_deref(),
            Some("1 Dr Carlton B Goodlett Place")
        );
    }

    #[test]
    fn road_without_house_number() {
        let body = serde_json::json!({"address": {"road": "Market Street"}});
        assert_eq!(
            parse_response(&body).unwrap().as_deref(),
            Some("Market Street")
        );
    }

    #[test]
    fn unresolvable_points_have_no_address() {
        let error = serde_json::json!({"error": "Unable to geocode"});
        assert!(parse_response(&error).unwrap().is_none());

        let no_road = serde_json::json!({"address": {"city": "San Francisco"}});
        assert!(parse_response(&no_road).unwrap().is_none());
    }

    #[test]
    fn rejects_non_object_body() {
        let body = serde_json::json!([]);
        assert!(matches!(
            parse_response(&body),
            Err(GeocodeError::Parse { .. })
        ));
    }
}
