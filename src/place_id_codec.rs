// Opaque place tokens: a provider place id packed into a string that is safe
// inside HTML attributes and URL components

use base64::prelude::*;
use serde::Deserialize;
use tracing::debug;

use crate::rent_abstraction::{RentProviderPlaceId, RentSearchResult};

// What a caller can hand to `encode`
#[derive(Debug, Clone, Copy)]
pub enum PlaceIdSource<'a> {
    PlaceId(&'a RentProviderPlaceId),
    SearchResult(&'a RentSearchResult),
}

impl<'a> PlaceIdSource<'a> {
    pub fn place_id(&self) -> &'a RentProviderPlaceId {
        match *self {
            PlaceIdSource::PlaceId(place_id) => place_id,
            PlaceIdSource::SearchResult(result) => &result.provider_place_id,
        }
    }
}

impl<'a> From<&'a RentProviderPlaceId> for PlaceIdSource<'a> {
    fn from(place_id: &'a RentProviderPlaceId) -> Self {
        PlaceIdSource::PlaceId(place_id)
    }
}

impl<'a> From<&'a RentSearchResult> for PlaceIdSource<'a> {
    fn from(result: &'a RentSearchResult) -> Self {
        PlaceIdSource::SearchResult(result)
    }
}

// Both fields are required; unknown fields are ignored
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenBody {
    provider_id: String,
    place_id: String,
}

pub fn encode<'a>(source: impl Into<PlaceIdSource<'a>>) -> String {
    let source: PlaceIdSource<'a> = source.into();
    let place_id = source.place_id();
    let body = serde_json::json!({
        "providerId": place_id.provider_id,
        "placeId": place_id.place_id,
    });
    BASE64_URL_SAFE_NO_PAD.encode(body.to_string())
}

// Tokens come from markup the user can edit; any defect yields None
pub fn decode(token: &str) -> Option<RentProviderPlaceId> {
    let bytes = match BASE64_URL_SAFE_NO_PAD.decode(token.trim()) {
        Ok(bytes) => bytes,
        Err(e) => {
            debug!("Rejected place token {:?}: {}", token, e);
            return None;
        }
    };

    let body: TokenBody = match serde_json::from_slice(&bytes) {
        Ok(body) => body,
        Err(e) => {
            debug!("Rejected place token {:?}: {}", token, e);
            return None;
        }
    };

    if body.provider_id.is_empty() || body.place_id.is_empty() {
        debug!("Rejected place token {:?}: empty field", token);
        return None;
    }

    Some(RentProviderPlaceId {
        provider_id: body.provider_id,
        place_id: body.place_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rent_abstraction::Location;
    use std::collections::BTreeSet;
    use test_case::test_case;

    #[test_case("homy", "1"; "numeric place id")]
    #[test_case("flat-rent", "vnd331"; "dashed provider id")]
    #[test_case("homy", "Санкт-Петербург #3"; "non ascii place id")]
    #[test_case("quotes", "\"<tag attr='x'>&amp;\""; "markup characters")]
    #[test_case("homy", "??>>"; "bytes that map to plus and slash")]
    #[test_case("homy", "a/b?c=d&e+f"; "url reserved characters")]
    fn test_round_trip(provider_id: &str, place_id: &str) {
        let original = RentProviderPlaceId::new(provider_id, place_id);
        let token = encode(&original);

        assert!(token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        assert_eq!(decode(&token), Some(original));
    }

    #[test]
    fn test_token_is_url_safe_where_standard_base64_is_not() {
        let place_id = RentProviderPlaceId::new("homy", "??>>");
        let standard = BASE64_STANDARD.encode(
            serde_json::json!({"providerId": "homy", "placeId": "??>>"}).to_string(),
        );
        assert!(standard.contains('+') || standard.contains('/') || standard.contains('='));

        let token = encode(&place_id);
        assert!(!token.contains(|c| matches!(c, '+' | '/' | '=')));
        assert_eq!(decode(&token), Some(place_id));
    }

    #[test]
    fn test_search_result_encodes_like_its_place_id() {
        let place_id = RentProviderPlaceId::new("flat-rent", "ab2e2");
        let result = RentSearchResult {
            provider_place_id: place_id.clone(),
            name: "Studio".to_string(),
            description: String::new(),
            image: vec![],
            location: Location::Unknown,
            booked_dates: BTreeSet::new(),
            price: 2100.0,
        };

        assert_eq!(encode(&result), encode(&place_id));
        assert_eq!(PlaceIdSource::from(&result).place_id(), &place_id);
    }

    #[test_case("not a valid token"; "plain text")]
    #[test_case(""; "empty")]
    #[test_case("////"; "standard alphabet characters")]
    #[test_case("bnVsbA=="; "padded token")]
    #[test_case("bnVsbA"; "json null")]
    #[test_case("eyJwcm92aWRlcklkIjoiaG9teSJ9"; "missing place id")]
    #[test_case("eyJwcm92aWRlcklkIjoiaG9teSIsInBsYWNlSWQiOjF9"; "numeric place id")]
    #[test_case("eyJwcm92aWRlcklkIjoiIiwicGxhY2VJZCI6IjEifQ"; "empty provider id")]
    fn test_decode_rejects(token: &str) {
        assert_eq!(decode(token), None);
    }

    #[test]
    fn test_decode_accepts_hand_made_token_with_extra_fields() {
        let token =
            BASE64_URL_SAFE_NO_PAD.encode(r#"{"placeId":"7","providerId":"homy","x":true}"#);
        assert_eq!(decode(&token), Some(RentProviderPlaceId::new("homy", "7")));
    }
}
