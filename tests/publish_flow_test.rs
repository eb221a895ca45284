//! End-to-end publishing against mock mirrors
//!
//! Configuration is loaded from YAML, resources come from a temporary
//! directory or zip archive, and every upload goes over HTTP to a
//! wiremock mirror.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use mirrorpub_core::config::AppConfig;
use mirrorpub_core::types::{Device, DeviceId, MirrorState, TemplateConfig};
use mirrorpub_publisher::{PublishingRegistry, RegistrySettings};
use mirrorpub_resources::ResourceSource;
use mirrorpub_upload::HttpTransport;

const RESOURCES: &[(&str, &str)] = &[
    ("views/quote.html", "<html>loading</html>"),
    ("views/quote.png", "png"),
    ("views/style.css", "body {}"),
    ("templates/quote.template", "<p>{QUOTE}</p><i>{AUTHOR}</i>"),
];

// ── Helpers ─────────────────────────────────────────────────────────

fn config_yaml(root_type: &str, root_path: &Path) -> String {
    format!(
        r#"
app:
  app_id: app1
  user_id: u1
package:
  roots:
    - type: {root_type}
      path: {root}
  base_path: views/
  views:
    - view_id: QuoteView
      main_page: views/quote.html
      icon: views/quote.png
discovery:
  enabled: false
"#,
        root_type = root_type,
        root = root_path.display()
    )
}

fn write_directory(root: &Path) {
    for (name, content) in RESOURCES {
        let path = root.join(name);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }
}

fn write_archive(path: &Path) {
    let mut zip = ZipWriter::new(std::fs::File::create(path).unwrap());
    for (name, content) in RESOURCES {
        zip.start_file(*name, SimpleFileOptions::default()).unwrap();
        zip.write_all(content.as_bytes()).unwrap();
    }
    zip.finish().unwrap();
}

fn registry_from(yaml: &str) -> Arc<PublishingRegistry> {
    let config = AppConfig::from_yaml(yaml).unwrap();
    config.validate().unwrap();

    let transport = HttpTransport::from_config(&config.upload).unwrap();
    Arc::new(PublishingRegistry::new(
        RegistrySettings::from_config(&config).unwrap(),
        Arc::new(ResourceSource::from_config(&config.package.roots)),
        Arc::new(transport),
    ))
}

async fn mock_mirror() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/staticResourceUpload"))
        .respond_with(|request: &Request| {
            let file = request
                .url
                .query_pairs()
                .find(|(key, _)| key == "filePath")
                .map(|(_, value)| value.into_owned())
                .unwrap_or_default();
            ResponseTemplate::new(200).set_body_string(format!("/apps/app1/{file}\n"))
        })
        .mount(&server)
        .await;
    server
}

fn upload_log(requests: &[Request]) -> Vec<(String, bool, bool)> {
    requests
        .iter()
        .map(|request| {
            let param = |name: &str| {
                request
                    .url
                    .query_pairs()
                    .find(|(key, _)| key == name)
                    .map(|(_, value)| value.into_owned())
                    .unwrap_or_default()
            };
            (
                param("filePath"),
                param("mainPage") == "true",
                param("icon") == "true",
            )
        })
        .collect()
}

fn quote_page(quote: &str) -> TemplateConfig {
    let mut page = TemplateConfig::new("templates/quote.template", "quote-of-the-day.html")
        .unwrap()
        .with_view_id("QuoteOfTheDay");
    page.put_replacement("{QUOTE}", quote).unwrap();
    page.put_replacement("{AUTHOR}", "Unknown").unwrap();
    page
}

// ── Scenarios ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_directory_package_reaches_mirror() {
    let temp = TempDir::new().unwrap();
    write_directory(temp.path());
    let registry = registry_from(&config_yaml("directory", temp.path()));
    let mirror = mock_mirror().await;

    registry
        .device_added(Device::mirror("hall", "Hallway", format!("{}/api", mirror.uri())))
        .await
        .unwrap();

    let requests = mirror.received_requests().await.unwrap();
    assert_eq!(
        upload_log(&requests),
        vec![
            ("quote.html".to_string(), false, false),
            ("quote.png".to_string(), false, true),
            ("style.css".to_string(), false, false),
            ("quote.html".to_string(), true, false),
        ]
    );
    assert_eq!(requests[3].body, b"<html>loading</html>");
    assert_eq!(
        registry.mirror_state(&DeviceId::new("hall")),
        MirrorState::Published
    );
}

#[tokio::test]
async fn test_archive_package_matches_directory_package() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("bundle.zip");
    write_archive(&archive);
    let registry = registry_from(&config_yaml("archive", &archive));
    let mirror = mock_mirror().await;

    registry
        .device_added(Device::mirror("hall", "Hallway", format!("{}/api", mirror.uri())))
        .await
        .unwrap();

    let mut uploaded = upload_log(&mirror.received_requests().await.unwrap());
    assert_eq!(uploaded.len(), 4);
    assert_eq!(uploaded.last().unwrap(), &("quote.html".to_string(), true, false));

    uploaded.sort();
    assert_eq!(
        uploaded,
        vec![
            ("quote.html".to_string(), false, false),
            ("quote.html".to_string(), true, false),
            ("quote.png".to_string(), false, true),
            ("style.css".to_string(), false, false),
        ]
    );
}

#[tokio::test]
async fn test_template_fan_out_skips_released_mirror() {
    let temp = TempDir::new().unwrap();
    write_directory(temp.path());
    let registry = registry_from(&config_yaml("directory", temp.path()));
    let hall = mock_mirror().await;
    let kitchen = mock_mirror().await;

    registry
        .device_added(Device::mirror("hall", "Hallway", format!("{}/api", hall.uri())))
        .await
        .unwrap();
    registry
        .device_added(Device::mirror("kitchen", "Kitchen", format!("{}/api", kitchen.uri())))
        .await
        .unwrap();

    registry
        .api_url_changed(&DeviceId::new("hall"), None)
        .await
        .unwrap();
    hall.reset().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("/unexpected"))
        .expect(0)
        .mount(&hall)
        .await;

    let fan_out = registry
        .update_template_page(quote_page("Stay hungry"))
        .await
        .unwrap();
    assert_eq!(fan_out.delivered, 1);

    let requests = kitchen.received_requests().await.unwrap();
    let last = requests.last().unwrap();
    assert_eq!(last.body, b"<p>Stay hungry</p><i>Unknown</i>");
    assert!(last.url.query().unwrap().contains("appViewId=QuoteOfTheDay"));
}

#[tokio::test]
async fn test_new_mirror_receives_registered_templates() {
    let temp = TempDir::new().unwrap();
    write_directory(temp.path());
    let registry = registry_from(&config_yaml("directory", temp.path()));

    registry
        .update_template_page(quote_page("first"))
        .await
        .unwrap();
    registry
        .update_template_page(quote_page("second"))
        .await
        .unwrap();
    assert_eq!(registry.registered_templates().len(), 1);

    let mirror = mock_mirror().await;
    registry
        .device_added(Device::mirror("hall", "Hallway", format!("{}/api", mirror.uri())))
        .await
        .unwrap();

    let requests = mirror.received_requests().await.unwrap();
    assert_eq!(requests.len(), 5);
    assert_eq!(requests[4].body, b"<p>second</p><i>Unknown</i>");
}

#[tokio::test]
async fn test_failing_mirror_stays_address_known() {
    let temp = TempDir::new().unwrap();
    write_directory(temp.path());
    let registry = registry_from(&config_yaml("directory", temp.path()));

    let broken = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/staticResourceUpload"))
        .and(query_param("filePath", "style.css"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&broken)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/staticResourceUpload"))
        .respond_with(ResponseTemplate::new(200).set_body_string("/ok"))
        .mount(&broken)
        .await;

    let result = registry
        .device_added(Device::mirror("hall", "Hallway", format!("{}/api", broken.uri())))
        .await;

    assert!(result.unwrap_err().is_transfer_failure());
    assert_eq!(
        registry.mirror_state(&DeviceId::new("hall")),
        MirrorState::AddressKnown
    );
    assert!(registry.live_mirrors().is_empty());

    // quote.html and quote.png went out before the failure, the deferred
    // main page never did
    let uploaded = upload_log(&broken.received_requests().await.unwrap());
    assert_eq!(uploaded.len(), 3);
    assert!(uploaded.iter().all(|(_, main_page, _)| !main_page));
}

#[test]
fn test_shipped_config_is_valid() {
    let config = AppConfig::from_file(Path::new(env!("CARGO_MANIFEST_DIR")).join("config/config.yaml"))
        .unwrap();
    config.validate().unwrap();
    assert!(config.refresh.quotes.is_some());
    assert_eq!(config.package_config().unwrap().main_pages().len(), 1);
}
