use validator::ValidationError;

pub const SUPPORTED_INTERVALS: [&str; 15] = [
    "1m", "3m", "5m", "15m", "30m", "1h", "2h", "4h", "6h", "8h", "12h", "1d", "3d", "1w", "1M",
];

fn is_supported_interval(interval: &str) -> bool {
    SUPPORTED_INTERVALS.contains(&interval)
}

pub fn validate_interval(value: &str) -> Result<(), ValidationError> {
    if is_supported_interval(value) {
        return Ok(());
    }

    let mut error = ValidationError::new("unsupported_interval");
    error.message = Some(
        format!(
            "interval must be one of: {}",
            SUPPORTED_INTERVALS.join(", ")
        )
        .into(),
    );
    Err(error)
}
