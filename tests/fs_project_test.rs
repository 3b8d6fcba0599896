//! Filesystem host end-to-end: write a small mixed Java/Kotlin project
//! to a temp directory, open it, and run the full pipeline.

use std::fs;

use apiscout::{FsProject, Project, ProjectContext, Provenance};
use tempfile::tempdir;

fn write_sample_project(root: &std::path::Path) {
    fs::create_dir_all(root.join("src/main/kotlin/com/shop")).unwrap();
    fs::create_dir_all(root.join("src/main/java/com/shop")).unwrap();

    fs::write(
        root.join("src/main/kotlin/com/shop/OrderApi.kt"),
        r#"package com.shop

interface OrderApi {
    @GET("orders/{id}")
    suspend fun getOrder(@Path("id") id: String): Order

    @POST("orders")
    fun createOrder(@Body order: NewOrder): Call<Order>
}
"#,
    )
    .unwrap();

    fs::write(
        root.join("src/main/kotlin/com/shop/Order.kt"),
        "package com.shop\n\ndata class Order(val orderId: String, val total: Double)\n",
    )
    .unwrap();

    fs::write(
        root.join("src/main/java/com/shop/LegacyClient.java"),
        r#"package com.shop;

public class LegacyClient {
    public Response ping() {
        Request request = new Request.Builder()
            .url("/health")
            .get()
            .build();
        return client.newCall(request).execute();
    }
}
"#,
    )
    .unwrap();
}

#[test]
fn test_full_pipeline_over_filesystem() {
    // Given: a project with annotated Kotlin, imperative Java, and an
    // override document.
    let dir = tempdir().unwrap();
    write_sample_project(dir.path());
    fs::write(
        dir.path().join("apiscout.yaml"),
        "baseUrl: https://shop.example.com\n",
    )
    .unwrap();

    // When: opened and scanned.
    let project = FsProject::open(dir.path()).unwrap();
    let mut context = ProjectContext::new();
    let endpoints = context.endpoints(&project);

    // Then: all three operations discovered, base applied everywhere.
    let summary: Vec<_> = endpoints
        .iter()
        .map(|e| format!("{} {}", e.http_method, e.path))
        .collect();
    assert_eq!(
        summary,
        vec!["GET /health", "POST /orders", "GET /orders/{id}"],
        "unexpected endpoint set: {:?}",
        endpoints
    );
    for endpoint in &endpoints {
        assert_eq!(
            endpoint.base_url.as_deref(),
            Some("https://shop.example.com")
        );
    }

    let base = context.resolve_base_url(&project);
    assert_eq!(base.provenance, Provenance::Config);
}

#[test]
fn test_annotated_kotlin_response_types_via_filesystem_index() {
    let dir = tempdir().unwrap();
    write_sample_project(dir.path());

    let project = FsProject::open(dir.path()).unwrap();
    let endpoints = ProjectContext::new().endpoints(&project);

    let get_order = endpoints
        .iter()
        .find(|e| e.function_name == "getOrder")
        .expect("getOrder discovered");
    assert_eq!(get_order.response_type.as_deref(), Some("Order"));

    let create = endpoints
        .iter()
        .find(|e| e.function_name == "createOrder")
        .expect("createOrder discovered");
    assert_eq!(create.request_type.as_deref(), Some("NewOrder"));
    assert_eq!(create.response_type.as_deref(), Some("Order"));
}

#[test]
fn test_details_and_samples_from_filesystem_symbols() {
    let dir = tempdir().unwrap();
    write_sample_project(dir.path());

    let project = FsProject::open(dir.path()).unwrap();
    let mut context = ProjectContext::new();
    let endpoints = context.endpoints(&project);
    let get_order = endpoints
        .iter()
        .find(|e| e.function_name == "getOrder")
        .unwrap();

    let details = context.resolve_details(&project, get_order);
    assert_eq!(details.provider, "annotation");
    assert_eq!(details.path_params.entries[0].name, "id");

    let sample: serde_json::Value =
        serde_json::from_str(details.response_sample.as_deref().unwrap()).unwrap();
    assert_eq!(sample["orderId"], serde_json::json!("1"));
    assert_eq!(sample["total"], serde_json::json!(1.0));
}

#[test]
fn test_missing_config_is_not_an_error() {
    let dir = tempdir().unwrap();
    write_sample_project(dir.path());

    let project = FsProject::open(dir.path()).unwrap();
    assert!(project.config_file().is_none());

    // Inferred provenance is None here: no baseUrl(...) in source.
    let mut context = ProjectContext::new();
    let base = context.resolve_base_url(&project);
    assert_eq!(base.provenance, Provenance::None);
    assert_eq!(base.url, None);
}
