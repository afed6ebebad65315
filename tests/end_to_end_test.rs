use anyhow::Result;
use httpmock::prelude::*;
use profile_enricher::adapters::{GoogleSheets, StaticToken};
use profile_enricher::core::formatter::format_row;
use profile_enricher::core::pipeline::PipelineSettings;
use profile_enricher::{EnrichmentEngine, EnrichmentPipeline, ProfileFetcher, RetryPolicy};
use std::time::Duration;

fn bob_payload() -> serde_json::Value {
    serde_json::json!({
        "success": true,
        "person": {
            "publicIdentifier": "bob",
            "firstName": "Bob",
            "lastName": "Jones",
            "headline": "Staff Engineer",
            "positions": {
                "positionHistory": [{
                    "title": "Staff Engineer",
                    "companyName": "Globex",
                    "description": "Infra",
                    "startEndDate": {"start": {"month": 9, "year": 2021}}
                }]
            },
            "skills": ["Go", "Rust"]
        },
        "company": {
            "name": "Globex",
            "headquarter": {"city": "Springfield", "country": "US"},
            "employeeCount": 1200
        }
    })
}

/// Alice is not found, Bob is enriched: exactly one row lands in Status_200.
#[tokio::test]
async fn test_only_successful_profiles_are_appended() -> Result<()> {
    let scrapin = MockServer::start();
    let sheets = MockServer::start();

    let alice_mock = scrapin.mock(|when, then| {
        when.method(GET)
            .path("/enrichment/profile")
            .query_param("apikey", "scrapin-key")
            .query_param("linkedinUrl", "https://linkedin.com/in/alice/");
        then.status(404)
            .json_body(serde_json::json!({"success": false, "msg": "Profile not found"}));
    });
    let bob_mock = scrapin.mock(|when, then| {
        when.method(GET)
            .path("/enrichment/profile")
            .query_param("apikey", "scrapin-key")
            .query_param("linkedinUrl", "https://linkedin.com/in/bob/");
        then.status(200).json_body(bob_payload());
    });

    let read_mock = sheets.mock(|when, then| {
        when.method(GET)
            .path("/v4/spreadsheets/sheet-123/values/URLs!A:A")
            .header("Authorization", "Bearer sheets-token");
        then.status(200).json_body(serde_json::json!({
            "range": "URLs!A1:A2",
            "majorDimension": "ROWS",
            "values": [["https://linkedin.com/in/alice"], ["https://linkedin.com/in/bob/"]]
        }));
    });

    let expected_row = format_row(&bob_payload());
    assert_eq!(expected_row.values()[0], "bob");
    let append_mock = sheets.mock(|when, then| {
        when.method(POST)
            .path("/v4/spreadsheets/sheet-123/values/Status_200!A2:append")
            .query_param("valueInputOption", "USER_ENTERED")
            .query_param("insertDataOption", "INSERT_ROWS")
            .json_body(serde_json::json!({"values": [expected_row.values()]}));
        then.status(200).json_body(serde_json::json!({"spreadsheetId": "sheet-123"}));
    });

    let gateway = GoogleSheets::new(
        &sheets.base_url(),
        "sheet-123",
        StaticToken::new("sheets-token"),
        Duration::from_secs(5),
    )?;
    let retry = RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(5));
    let fetcher = ProfileFetcher::new(
        scrapin.url("/enrichment/profile"),
        "scrapin-key",
        Duration::from_secs(5),
        retry,
    )?;
    let pipeline = EnrichmentPipeline::new(gateway, fetcher, PipelineSettings::default(), retry);

    let report = EnrichmentEngine::new(pipeline).run().await?;

    read_mock.assert();
    alice_mock.assert_hits(1);
    bob_mock.assert_hits(1);
    append_mock.assert_hits(1);
    assert_eq!(report.urls_read, 2);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.rows_written, 1);
    Ok(())
}

#[tokio::test]
async fn test_rejected_append_stops_the_run() -> Result<()> {
    let scrapin = MockServer::start();
    let sheets = MockServer::start();

    scrapin.mock(|when, then| {
        when.method(GET).path("/enrichment/profile");
        then.status(200).json_body(bob_payload());
    });
    sheets.mock(|when, then| {
        when.method(GET).path("/v4/spreadsheets/sheet-123/values/URLs!A:A");
        then.status(200).json_body(serde_json::json!({
            "values": [["https://linkedin.com/in/a"], ["https://linkedin.com/in/b"]]
        }));
    });
    let append_mock = sheets.mock(|when, then| {
        when.method(POST);
        then.status(403).json_body(serde_json::json!({
            "error": {"code": 403, "message": "The caller does not have permission"}
        }));
    });

    let gateway = GoogleSheets::new(
        &sheets.base_url(),
        "sheet-123",
        StaticToken::new("sheets-token"),
        Duration::from_secs(5),
    )?;
    let retry = RetryPolicy::new(4, Duration::from_millis(1), Duration::from_millis(2));
    let fetcher = ProfileFetcher::new(
        scrapin.url("/enrichment/profile"),
        "scrapin-key",
        Duration::from_secs(5),
        retry,
    )?;
    let pipeline = EnrichmentPipeline::new(gateway, fetcher, PipelineSettings::default(), retry);

    let result = EnrichmentEngine::new(pipeline).run().await;

    let err = result.expect_err("a 403 from the sheet must halt the run");
    assert!(err.to_string().contains("does not have permission"));
    // 非暫時性錯誤不重試，第二筆也不會送出
    append_mock.assert_hits(1);
    Ok(())
}
