//! Built-in sample error records.
//!
//! A small fleet of representative incidents used by the `seed` command
//! and smoke tests, so search and analysis have something to ground
//! against before a real telemetry source is wired up.

use crate::models::LogRecord;

fn record(
    trace_id: &str,
    message: &str,
    timestamp: &str,
    service: &str,
    error_code: &str,
    error_type: &str,
    resolution: &str,
) -> LogRecord {
    LogRecord {
        trace_id: trace_id.to_string(),
        message: message.to_string(),
        timestamp: timestamp.to_string(),
        service: service.to_string(),
        error_code: error_code.to_string(),
        error_type: error_type.to_string(),
        host: "test-host".to_string(),
        environment: "staging".to_string(),
        resolution: Some(resolution.to_string()),
        ..LogRecord::default()
    }
}

/// Sample incidents covering the common failure families.
pub fn sample_records() -> Vec<LogRecord> {
    vec![
        record(
            "test-trace-12345",
            "Database connection failed due to invalid credentials",
            "2024-02-15T12:34:56Z",
            "database-service",
            "500",
            "DatabaseError",
            "Check and update database credentials in environment variables",
        ),
        record(
            "test-trace-67890",
            "Connection timeout while connecting to database",
            "2024-02-15T12:35:10Z",
            "database-service",
            "504",
            "TimeoutError",
            "Verify database connection settings and network stability",
        ),
        record(
            "test-trace-24680",
            "API rate limit exceeded",
            "2024-02-15T12:36:15Z",
            "api-gateway",
            "429",
            "RateLimitError",
            "Implement rate limiting or request throttling",
        ),
        record(
            "test-trace-13579",
            "Invalid JWT token in authorization header",
            "2024-02-15T12:37:20Z",
            "auth-service",
            "401",
            "AuthenticationError",
            "Verify token generation and expiration settings",
        ),
        record(
            "test-trace-97531",
            "Failed to process payment: Invalid card number",
            "2024-02-15T12:38:25Z",
            "payment-service",
            "400",
            "PaymentValidationError",
            "Validate card number format before processing",
        ),
        record(
            "test-trace-11111",
            "Failed to connect to Redis cache",
            "2024-02-15T12:40:35Z",
            "cache-service",
            "503",
            "CacheConnectionError",
            "Check Redis connection settings and service health",
        ),
        record(
            "test-trace-33333",
            "Database deadlock detected",
            "2024-02-15T12:42:45Z",
            "database-service",
            "500",
            "DeadlockError",
            "Implement retry logic with exponential backoff",
        ),
    ]
}
