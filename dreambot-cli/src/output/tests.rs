//! CLI output formatting tests.
//!
//! These tests verify that CLI output is correctly formatted for both
//! text and JSON output modes.

#[cfg(test)]
mod text_formatter_tests {
    use super::super::text::TextFormatter;
    use crate::commands::Payload;
    use crate::commands::watch::PollResult;
    use chrono::{Local, TimeZone};
    use dreambot_net::{BackoffSnapshot, FetchError};

    fn suppressed() -> FetchError {
        FetchError::BackoffSuppressed {
            url: "https://down.example/".to_string(),
            pattern: "https://down\\.example/".to_string(),
            failure_count: 2,
            remaining_secs: 40,
            remaining: "40 seconds".to_string(),
        }
    }

    #[test]
    fn test_format_text_payload_is_verbatim() {
        let formatter = TextFormatter::new(false);
        let out = formatter.format_payload(&Payload::Text("hello\nworld".to_string()));
        assert_eq!(out, "hello\nworld");
    }

    #[test]
    fn test_format_json_payload_is_pretty() {
        let formatter = TextFormatter::new(false);
        let out = formatter.format_payload(&Payload::Json(serde_json::json!({"a": 1})));
        assert!(out.contains("\"a\": 1"));
    }

    #[test]
    fn test_format_bytes_payload_shows_length() {
        let formatter = TextFormatter::new(false);
        assert_eq!(formatter.format_payload(&Payload::Bytes(vec![0; 3])), "<3 bytes>");
    }

    #[test]
    fn test_format_suppressed_error() {
        let formatter = TextFormatter::new(false);
        let out = formatter.format_error(&suppressed());
        assert_eq!(out, "suppressed (2 failures, 40 seconds left)");
    }

    #[test]
    fn test_format_backoff_line() {
        let formatter = TextFormatter::new(false);
        let snapshot = BackoffSnapshot {
            pattern: "api\\.example".to_string(),
            failure_count: 2,
            total_backoff_secs: 64,
            remaining_backoff_secs: 0,
        };
        let out = formatter.format_backoff(&snapshot);
        assert!(out.contains("failures: 2"));
        assert!(out.contains("1 minute, 4 seconds"));
        assert!(out.contains("window elapsed"));
    }

    #[test]
    fn test_format_tick_lists_only_failing_rules() {
        let formatter = TextFormatter::new(false);
        let now = Local.with_ymd_and_hms(2024, 1, 1, 12, 30, 5).unwrap();
        let results = vec![
            PollResult {
                url: "https://up.example/".to_string(),
                result: Ok(Some(Payload::Text("up".to_string()))),
            },
            PollResult {
                url: "https://down.example/".to_string(),
                result: Err(suppressed()),
            },
        ];
        let backoff = vec![
            BackoffSnapshot {
                pattern: "https://up\\.example/".to_string(),
                failure_count: 0,
                total_backoff_secs: 32,
                remaining_backoff_secs: 0,
            },
            BackoffSnapshot {
                pattern: "https://down\\.example/".to_string(),
                failure_count: 2,
                total_backoff_secs: 64,
                remaining_backoff_secs: 40,
            },
        ];

        let out = formatter.format_tick(now, &results, &backoff);
        assert!(out.starts_with("Tick at 12:30:05"));
        assert!(out.contains("ok up"));
        assert!(out.contains("suppressed"));
        assert!(out.contains("https://down\\.example/"));
        assert!(!out.contains("https://up\\.example/"));
    }

    #[test]
    fn test_no_colors_when_disabled() {
        let formatter = TextFormatter::new(false);
        let out = formatter.format_error(&suppressed());
        assert!(!out.contains("\x1b["));
    }

    #[test]
    fn test_colors_when_enabled() {
        let formatter = TextFormatter::new(true);
        let out = formatter.format_error(&suppressed());
        assert!(out.contains("\x1b[33m"));
    }
}

#[cfg(test)]
mod json_formatter_tests {
    use super::super::json::JsonFormatter;
    use crate::commands::Payload;
    use crate::commands::watch::PollResult;
    use chrono::{Local, TimeZone};
    use dreambot_net::{BackoffSnapshot, FetchError};

    #[test]
    fn test_format_pretty() {
        let formatter = JsonFormatter::new(true);
        let out = formatter.format(&serde_json::json!({"a": 1})).unwrap();
        assert!(out.contains('\n'));
    }

    #[test]
    fn test_format_compact() {
        let formatter = JsonFormatter::new(false);
        let out = formatter.format(&serde_json::json!({"a": 1})).unwrap();
        assert_eq!(out, r#"{"a":1}"#);
    }

    #[test]
    fn test_format_payload_embeds_json_body() {
        let formatter = JsonFormatter::new(false);
        let out = formatter
            .format_payload("https://api.example/", &Payload::Json(serde_json::json!([1, 2])))
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["url"], "https://api.example/");
        assert_eq!(value["status"], "ok");
        assert_eq!(value["kind"], "json");
        assert_eq!(value["body"], serde_json::json!([1, 2]));
        assert!(value.get("error").is_none());
    }

    #[test]
    fn test_format_tick_classifies_results() {
        let formatter = JsonFormatter::new(false);
        let now = Local.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let results = vec![
            PollResult {
                url: "https://a.example/".to_string(),
                result: Ok(None),
            },
            PollResult {
                url: "https://b.example/".to_string(),
                result: Err(FetchError::Status {
                    url: "https://b.example/".to_string(),
                    status: 503,
                    reason: "Service Unavailable".to_string(),
                }),
            },
        ];
        let backoff = vec![BackoffSnapshot {
            pattern: "https://b\\.example/".to_string(),
            failure_count: 1,
            total_backoff_secs: 32,
            remaining_backoff_secs: 32,
        }];

        let out = formatter.format_tick(now, &results, &backoff).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["results"][0]["status"], "empty");
        assert_eq!(value["results"][1]["status"], "http_error");
        assert!(value["results"][1]["error"].as_str().unwrap().contains("503"));
        assert_eq!(value["backoff"][0]["failureCount"], 1);
        assert_eq!(value["backoff"][0]["remainingBackoffSecs"], 32);
        assert!(value["at"].as_str().unwrap().starts_with("2024-01-01T00:00:00"));
    }
}
