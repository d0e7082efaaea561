use crate::providers::{PageRequest, ProviderError, ValidationSnafu};

/// Largest `limit` the klines endpoint accepts.
pub const MAX_LIMIT: u32 = 1000;

/// Reject requests the endpoint would refuse anyway.
pub fn validate_request(request: &PageRequest) -> Result<(), ProviderError> {
    if request.symbol.trim().is_empty() {
        return ValidationSnafu { message: "symbol must not be empty" }.fail();
    }
    if request.limit == 0 || request.limit > MAX_LIMIT {
        return ValidationSnafu {
            message: format!("limit must be within 1..={MAX_LIMIT}, got {}", request.limit),
        }
        .fail();
    }
    if let Some(end_ms) = request.end_ms {
        if end_ms < request.start_ms {
            return ValidationSnafu {
                message: format!("endTime {end_ms} precedes startTime {}", request.start_ms),
            }
            .fail();
        }
    }
    Ok(())
}

/// Query string for `GET /api/v3/klines`. `endTime` is omitted for
/// open-ended requests.
pub fn construct_params(request: &PageRequest) -> Vec<(&'static str, String)> {
    let mut query = vec![
        ("symbol", request.symbol.clone()),
        ("interval", request.interval.to_string()),
        ("limit", request.limit.to_string()),
        ("startTime", request.start_ms.to_string()),
    ];
    if let Some(end_ms) = request.end_ms {
        query.push(("endTime", end_ms.to_string()));
    }
    query
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> PageRequest {
        PageRequest {
            symbol: "ETHBTC".into(),
            interval: "30m".parse().unwrap(),
            limit: 500,
            start_ms: 1_518_400_000_000,
            end_ms: Some(1_518_486_400_000),
        }
    }

    #[test]
    fn builds_query() {
        let q = construct_params(&request());
        assert_eq!(
            q,
            vec![
                ("symbol", "ETHBTC".to_string()),
                ("interval", "30m".to_string()),
                ("limit", "500".to_string()),
                ("startTime", "1518400000000".to_string()),
                ("endTime", "1518486400000".to_string()),
            ]
        );

        let open = PageRequest { end_ms: None, ..request() };
        assert!(construct_params(&open).iter().all(|(k, _)| *k != "endTime"));
    }

    #[test]
    fn validation() {
        assert!(validate_request(&request()).is_ok());
        assert!(validate_request(&PageRequest { limit: 0, ..request() }).is_err());
        assert!(validate_request(&PageRequest { limit: 1001, ..request() }).is_err());
        assert!(validate_request(&PageRequest { symbol: " ".into(), ..request() }).is_err());
        assert!(validate_request(&PageRequest { end_ms: Some(0), ..request() }).is_err());
    }
}
