//! Integration tests for uploads, file inspection, filters, metadata and states

mod common;

use axum::http::StatusCode;
use bloom_api::services::MetadataManager;
use common::{spawn_python_stub, test_app, test_app_with};
use serde_json::json;

#[tokio::test]
async fn test_upload_csv() {
    let app = test_app();
    let (status, json) = app
        .upload("Weekly Sales.csv", b"Region,Channel,Volume Acme\nNorth,Retail,10\nSouth,Online,12\n")
        .await;

    assert_eq!(status, StatusCode::OK);
    let data = &json["data"];
    assert_eq!(data["originalName"], "Weekly Sales.csv");
    assert_eq!(data["extension"], "csv");
    assert_eq!(data["columns"], json!(["Region", "Channel", "Volume Acme"]));
    assert_eq!(data["sheets"][0]["sheetName"], "Sheet1");
    assert_eq!(data["sheets"][0]["rowCount"], 2);

    let stored = data["storedName"].as_str().unwrap();
    assert!(stored.starts_with("Weekly_Sales_"));
    assert!(app.config.uploads_dir().join(stored).is_file());
}

#[tokio::test]
async fn test_upload_rejects_bad_extension() {
    let app = test_app();
    let (status, json) = app.upload("notes.txt", b"hello").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("Invalid file type"));

    let (status, _) = app.upload("empty.csv", b"").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_upload_rejects_oversize() {
    let app = test_app_with(|config| config.max_upload_bytes = 1024);
    let contents = vec![b'a'; 2048];
    let (status, json) = app.upload("big.csv", &contents).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(json["success"], false);

    let remaining = std::fs::read_dir(app.config.uploads_dir()).unwrap().count();
    assert_eq!(remaining, 0);
}

#[tokio::test]
async fn test_workbook_inspection() {
    let app = test_app();
    let name = app.install_sales_workbook();

    let (status, json) = app.get(&format!("/api/files/{}/sheets", name)).await;
    assert_eq!(status, StatusCode::OK);
    let sheets = json["data"]["sheets"].as_array().unwrap();
    assert_eq!(sheets.len(), 2);
    assert_eq!(sheets[0]["sheetName"], "Q1");
    assert_eq!(sheets[0]["rowCount"], 4);
    assert_eq!(sheets[1]["isEmpty"], true);

    let (_, json) = app.get(&format!("/api/files/{}/columns", name)).await;
    assert_eq!(json["data"]["columnCount"], 7);
    assert_eq!(json["data"]["columns"][3], "Volume Acme");

    let (_, json) = app.get(&format!("/api/files/{}/sample?rows=2", name)).await;
    let rows = json["data"]["rows"].as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["Region"], "North");
    assert_eq!(rows[1]["Volume Acme"], 120);
    assert_eq!(json["data"]["totalRows"], 4);

    let (_, json) = app.get(&format!("/api/files/{}/info", name)).await;
    assert_eq!(json["data"]["sheetCount"], 2);
    assert_eq!(json["data"]["location"], "uploads");
    assert_eq!(json["data"]["extension"], "xlsx");
}

#[tokio::test]
async fn test_file_lookup_errors() {
    let app = test_app();
    app.install_sales_workbook();

    let (status, _) = app.get("/api/files/missing.xlsx/columns").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.get("/api/files/..%2Fsecret.xlsx/columns").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .get(&format!("/api/files/{}/columns?sheet=Nope", common::SALES_WORKBOOK))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_filter_suggestions_and_targets() {
    let app = test_app();
    let name = app.install_sales_workbook();

    let (status, json) = app.get(&format!("/api/filters/{}/suggestions", name)).await;
    assert_eq!(status, StatusCode::OK);
    let columns: Vec<&str> = json["data"]["suggestions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["column"].as_str().unwrap())
        .collect();
    assert_eq!(columns, vec!["Region", "Channel"]);

    let (_, json) = app.get(&format!("/api/filters/{}/available", name)).await;
    let available = json["data"]["columns"].as_array().unwrap();
    assert_eq!(available.len(), 2);
    assert_eq!(available[0]["column"], "Region");
    assert_eq!(available[0]["uniqueValues"], 3);

    let (_, json) = app.get(&format!("/api/filters/{}/targets", name)).await;
    assert_eq!(json["data"]["targets"][0]["column"], "Volume Acme");
}

#[tokio::test]
async fn test_filter_validation() {
    let app = test_app();
    let name = app.install_sales_workbook();

    let (status, json) = app
        .request(
            "POST",
            &format!("/api/filters/{}/validate", name),
            Some(json!({"selectedFilters": ["Region", "Store", "Region"]})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["isValid"], false);
    assert_eq!(json["data"]["errors"].as_array().unwrap().len(), 2);

    let (status, _) = app
        .request(
            "POST",
            &format!("/api/filters/{}/save", name),
            Some(json!({"selectedFilters": ["Store"]})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_filters_follow_the_selected_sheet() {
    let app = test_app();
    let name = app.install_regional_workbook();
    let body = json!({"selectedFilters": ["Store"], "sheet": "Q2"});

    let (status, json) = app
        .request("POST", &format!("/api/filters/{}/validate", name), Some(body.clone()))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["isValid"], true);

    let (status, json) = app
        .request("POST", &format!("/api/filters/{}/save", name), Some(body))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["state"]["selectedFilters"], json!(["Store"]));
    assert_eq!(json["data"]["state"]["sheet"], "Q2");

    // Without a sheet the first sheet (Q1) applies, which has no Store column
    let (status, _) = app
        .request(
            "POST",
            &format!("/api/filters/{}/save", name),
            Some(json!({"selectedFilters": ["Store"]})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .request(
            "POST",
            &format!("/api/filters/{}/save", name),
            Some(json!({"selectedFilters": ["Store"], "sheet": "Q9"})),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_metadata_workbook_lifecycle() {
    let app = test_app();
    let name = app.install_sales_workbook();

    let (status, json) = app
        .request(
            "POST",
            "/api/metadata/create",
            Some(json!({"originalFileName": name, "brandName": "Acme", "analysisType": "mmm"})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let metadata_file = json["data"]["metadataFile"].as_str().unwrap().to_string();
    assert_eq!(metadata_file, MetadataManager::workbook_name(&name));
    assert!(metadata_file.starts_with("Sales_20240101_120000_000_xlsx_"));
    assert!(metadata_file.ends_with("_metadata.xlsx"));
    assert!(app.config.metadata_dir().join(&metadata_file).is_file());

    // Saving filters mirrors them into the workbook
    let (status, json) = app
        .request(
            "POST",
            &format!("/api/filters/{}/save", name),
            Some(json!({"selectedFilters": ["Region", "Channel"]})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["metadataFile"], metadata_file.as_str());

    let (status, _) = app
        .request(
            "POST",
            &format!("/api/metadata/file/{}/log", metadata_file),
            Some(json!({"step": "concatenation", "details": "2 sheets"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .request(
            "PUT",
            &format!("/api/metadata/file/{}/brand", metadata_file),
            Some(json!({"clientBrand": "Acme", "competitors": ["Globex"], "targetVariable": "Volume Acme"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, json) = app.get(&format!("/api/metadata/file/{}", metadata_file)).await;
    assert_eq!(status, StatusCode::OK);
    let data = &json["data"];
    assert_eq!(data["fileInfo"]["storedFileName"], name.as_str());
    assert_eq!(data["fileInfo"]["sheetCount"], 2);
    assert_eq!(data["fileInfo"]["brandName"], "Acme");
    assert_eq!(data["filterColumns"][1]["columnName"], "Channel");
    assert_eq!(data["filterColumns"][1]["order"], 2);
    assert_eq!(data["brandInfo"]["competitors"], json!(["Globex"]));
    assert_eq!(data["brandInfo"]["targetVariable"], "Volume Acme");

    let steps: Vec<&str> = data["processingLog"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["step"].as_str().unwrap())
        .collect();
    assert_eq!(steps, vec!["created", "filters", "concatenation", "brand_categorization"]);
}

#[tokio::test]
async fn test_metadata_errors() {
    let app = test_app();
    let (status, _) = app
        .request("POST", "/api/metadata/create", Some(json!({"originalFileName": "nope.xlsx"})))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.get("/api/metadata/file/nope_metadata.xlsx").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_categorize_updates_metadata() {
    let app = test_app();
    let name = app.install_sales_workbook();
    app.request("POST", "/api/metadata/create", Some(json!({"originalFileName": name})))
        .await;

    let (status, json) = app
        .request(
            "POST",
            "/api/brands/categorize",
            Some(json!({"fileName": name, "clientBrand": "Acme"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["competitors"], json!(["Globex"]));
    assert_eq!(json["data"]["rpiColumns"], json!(["RPI Acme vs Globex"]));
    let metadata_file = json["data"]["metadataFile"].as_str().unwrap().to_string();

    let (_, json) = app.get(&format!("/api/metadata/file/{}", metadata_file)).await;
    assert_eq!(json["data"]["brandInfo"]["clientBrand"], "Acme");
}

#[tokio::test]
async fn test_concatenation_state_crud() {
    let app = test_app();
    let uri = "/api/metadata/state/Sales.xlsx";

    let (status, _) = app.get(uri).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, json) = app
        .request(
            "POST",
            uri,
            Some(json!({
                "selectedSheets": ["Q1", "Q2"],
                "targetVariable": "Volume Acme",
                "columnCategories": {"Revenue": ["Volume Acme"]},
                "sheetOrder": [1, 2]
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["originalFileName"], "Sales.xlsx");
    assert!(json["data"]["savedAt"].is_string());

    let (status, json) = app
        .request("PUT", uri, Some(json!({"selectedFilters": ["Region"]})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["selectedFilters"], json!(["Region"]));
    assert_eq!(json["data"]["targetVariable"], "Volume Acme");
    assert_eq!(json["data"]["sheetOrder"], json!([1, 2]));

    let (_, json) = app.get("/api/metadata/states").await;
    assert_eq!(json["data"].as_array().unwrap().len(), 1);

    let (status, _) = app.request("DELETE", uri, None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.request("DELETE", uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app
        .request("PUT", uri, Some(json!({"selectedFilters": []})))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_concatenate_with_unreachable_backend() {
    let app = test_app();
    let name = app.install_sales_workbook();

    let (status, json) = app
        .request(
            "POST",
            "/api/files/concatenate",
            Some(json!({"fileName": name, "selectedSheets": ["Q1"]})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(json["error"].as_str().unwrap().starts_with("Python backend error"));

    // Nothing is recorded when the backend fails
    let (status, _) = app.get(&format!("/api/metadata/state/{}", name)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .request(
            "POST",
            "/api/files/concatenate",
            Some(json!({"fileName": name, "selectedSheets": []})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_concatenate_records_state() {
    let stub = spawn_python_stub(json!({
        "success": true,
        "data": {
            "concatenatedFileName": "Sales_concatenated.xlsx",
            "columnCategories": {"Revenue": ["Volume Acme"], "Pricing": ["Price Acme"]},
            "previewData": [{"Week": 1, "Volume Acme": 100}],
            "totalRows": 8
        }
    }))
    .await;
    let url = stub.base_url.clone();
    let app = test_app_with(move |config| config.python_base_url = url);
    let name = app.install_sales_workbook();

    let (status, json) = app
        .request(
            "POST",
            "/api/files/concatenate",
            Some(json!({"fileName": name, "selectedSheets": ["Q1", "Notes"]})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["result"]["success"], true);

    let forwarded = stub.received.lock().unwrap().clone().unwrap();
    assert_eq!(forwarded["fileName"], name.as_str());
    assert_eq!(forwarded["selectedSheets"], json!(["Q1", "Notes"]));

    let (status, json) = app.get(&format!("/api/metadata/state/{}", name)).await;
    assert_eq!(status, StatusCode::OK);
    let state = &json["data"];
    assert_eq!(state["originalFileName"], name.as_str());
    assert_eq!(state["concatenatedFileName"], "Sales_concatenated.xlsx");
    assert_eq!(state["selectedSheets"], json!(["Q1", "Notes"]));
    assert_eq!(state["status"], "completed");
    assert_eq!(state["totalRows"], 8);
    assert_eq!(state["columnCategories"]["Pricing"], json!(["Price Acme"]));
    assert_eq!(state["previewData"][0]["Volume Acme"], 100);
    assert!(state["processedAt"].is_string());
}

#[tokio::test]
async fn test_concatenate_keeps_minimal_state_on_odd_backend_fields() {
    let stub = spawn_python_stub(json!({
        "concatenatedFileName": "Sales_concatenated.xlsx",
        "totalRows": "about eight",
        "columnCategories": {"Revenue": ["Volume Acme"]}
    }))
    .await;
    let url = stub.base_url.clone();
    let app = test_app_with(move |config| config.python_base_url = url);
    let name = app.install_sales_workbook();

    let (status, json) = app
        .request(
            "POST",
            "/api/files/concatenate",
            Some(json!({"fileName": name, "selectedSheets": ["Q1"]})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    // The backend answer is still returned verbatim
    assert_eq!(json["data"]["result"]["totalRows"], "about eight");

    let (_, json) = app.get(&format!("/api/metadata/state/{}", name)).await;
    let state = &json["data"];
    assert_eq!(state["concatenatedFileName"], "Sales_concatenated.xlsx");
    assert_eq!(state["selectedSheets"], json!(["Q1"]));
    assert_eq!(state["totalRows"], serde_json::Value::Null);
    assert_eq!(state["columnCategories"], json!({}));
}

#[tokio::test]
async fn test_nonmmm_summary_and_trendline() {
    let app = test_app();
    let name = app.install_sales_workbook();

    let (status, json) = app.get(&format!("/api/nonmmm/{}/summary", name)).await;
    assert_eq!(status, StatusCode::OK);
    let summaries = json["data"]["numericColumns"].as_array().unwrap();
    assert_eq!(summaries.len(), 5);
    assert_eq!(summaries[1]["column"], "Volume Acme");
    assert_eq!(summaries[1]["mean"], 130.0);
    assert_eq!(summaries[1]["min"], 100.0);

    let (status, json) = app
        .get(&format!("/api/nonmmm/{}/trendline?x=Week&y=Volume%20Acme", name))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["slope"], 20.0);
    assert_eq!(json["data"]["intercept"], 80.0);
    assert_eq!(json["data"]["points"], 4);

    let (status, _) = app
        .get(&format!("/api/nonmmm/{}/trendline?x=Region&y=Volume%20Acme", name))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.get(&format!("/api/nonmmm/{}/trendline?x=Week", name)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
