//! Archive Module Tests
//!
//! ## Test Scopes
//! - **Importers**: input selection per data source.
//! - **Filenames**: naming, sanitizing and reservation.
//! - **Build pipeline**: readiness, single download, skipped inputs, and no
//!   partial artifact after a failure or an abort.

#[cfg(test)]
mod tests {
    use crate::archive::builder::*;
    use crate::archive::fetcher::InputFetcher;
    use crate::archive::importer::*;
    use crate::archive::types::TaskIdList;
    use crate::client::memory::InMemoryClient;
    use crate::client::types::*;
    use crate::error::AnalystError;

    use async_trait::async_trait;
    use dashmap::DashMap;
    use std::io::Read;
    use std::path::Path;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::io::AsyncReadExt;

    /// Serves input bytes from memory; unknown URLs are 404s.
    #[derive(Default)]
    struct MemoryFetcher {
        files: DashMap<String, Vec<u8>>,
        broken: DashMap<String, ()>,
        hang: bool,
    }

    impl MemoryFetcher {
        fn with(files: &[(&str, &str)]) -> Self {
            let fetcher = Self::default();
            for (url, content) in files {
                fetcher.files.insert(url.to_string(), content.as_bytes().to_vec());
            }
            fetcher
        }
    }

    #[async_trait]
    impl InputFetcher for MemoryFetcher {
        async fn fetch(&self, url: &str) -> Result<Vec<u8>, AnalystError> {
            if self.hang {
                std::future::pending::<()>().await;
            }
            if self.broken.contains_key(url) {
                return Err(AnalystError::Transient(format!("{} reset the connection", url)));
            }
            self.files
                .get(url)
                .map(|bytes| bytes.clone())
                .ok_or_else(|| AnalystError::NotFound(url.to_string()))
        }
    }

    fn creds() -> ApiCredentials {
        ApiCredentials {
            endpoint: "http://crowd.test".to_string(),
            api_key: "key".to_string(),
        }
    }

    fn task(id: u64, info: serde_json::Value) -> Task {
        Task {
            id,
            project_id: 1,
            state: Some("completed".to_string()),
            info,
        }
    }

    fn client() -> Arc<InMemoryClient> {
        let client = Arc::new(InMemoryClient::new());
        client.add_project(Project {
            id: 1,
            short_name: "maps".to_string(),
            name: "Maps".to_string(),
            category_id: None,
        });
        client.add_task(task(1, serde_json::json!({"url_b": "http://img.test/1_b.jpg"})));
        client.add_task(task(2, serde_json::json!({"url_m": "http://img.test/2_m.png"})));
        client.add_task(task(3, serde_json::json!({"link": "http://img.test/3"})));
        client
    }

    fn zip_job(filename: &str, task_ids: Vec<u64>) -> ZipJob {
        ZipJob {
            credentials: creds(),
            short_name: "maps".to_string(),
            task_ids,
            filename: filename.to_string(),
            importer: "flickr".to_string(),
        }
    }

    fn dir_entries(path: &Path) -> Vec<String> {
        let mut names: Vec<String> = match std::fs::read_dir(path) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().to_string())
                .collect(),
            Err(_) => Vec::new(),
        };
        names.sort();
        names
    }

    // ============================================================
    // IMPORTERS
    // ============================================================

    #[test]
    fn test_flickr_prefers_large_rendition() {
        let t = task(
            7,
            serde_json::json!({
                "url": "http://img.test/7.gif",
                "url_m": "http://img.test/7_m.jpg",
                "url_b": "http://img.test/7_b.JPG"
            }),
        );
        let input = FlickrImporter.select(&t).unwrap();
        assert_eq!(input.url, "http://img.test/7_b.JPG");
        assert_eq!(input.entry_name, "7.jpg");

        let fallback = task(8, serde_json::json!({"url_b": "", "url": "http://img.test/8"}));
        let input = FlickrImporter.select(&fallback).unwrap();
        assert_eq!(input.url, "http://img.test/8");
        assert_eq!(input.entry_name, "8.jpg");

        assert!(FlickrImporter.select(&task(9, serde_json::json!({}))).is_none());
    }

    #[test]
    fn test_iiif_full_image() {
        let t = task(
            4,
            serde_json::json!({"tileSource": "https://iiif.test/iiif/abc/info.json"}),
        );
        let input = IiifImporter.select(&t).unwrap();
        assert_eq!(input.url, "https://iiif.test/iiif/abc/full/full/0/default.jpg");
        assert_eq!(input.entry_name, "4.jpg");
    }

    #[test]
    fn test_pdf_and_field_importers() {
        let t = task(
            5,
            serde_json::json!({"pdf_url": "https://docs.test/a/b.pdf?dl=1", "scan": "https://docs.test/scan.tiff"}),
        );
        assert_eq!(PdfImporter.select(&t).unwrap().entry_name, "5.pdf");

        let field = importer_for("field:scan").unwrap();
        assert_eq!(field.name(), "field:scan");
        assert_eq!(field.select(&t).unwrap().entry_name, "5.tiff");

        assert!(importer_for("field:").is_err());
        assert!(importer_for("dropbox").is_err());
    }

    #[test]
    fn test_url_extension() {
        assert_eq!(url_extension("http://a.test/x/y.PNG#top").as_deref(), Some(".png"));
        assert_eq!(url_extension("http://a.test/x/y"), None);
        assert_eq!(url_extension("http://host.test"), None);
        assert_eq!(url_extension("not a url"), None);
    }

    // ============================================================
    // FILENAMES
    // ============================================================

    #[test]
    fn test_filename_helpers() {
        assert_eq!(archive_filename("maps", 1700000000), "maps_input_1700000000.zip");
        assert_eq!(sanitize_filename("my project/../x.zip"), "my_project_.._x.zip");
        assert_eq!(sanitize_filename("../../etc/passwd"), "etc_passwd");
        assert_eq!(sanitize_filename("  .hidden "), "hidden");
        assert_eq!(sanitize_filename("plain-name_1.zip"), "plain-name_1.zip");
    }

    #[test]
    fn test_reserved_filenames_never_collide() {
        let dir = tempfile::tempdir().unwrap();
        let builder = ZipBuilder::new(dir.path(), client(), Arc::new(MemoryFetcher::default()));

        let first = builder.reserve_filename("maps");
        let second = builder.reserve_filename("maps");
        assert_ne!(first, second);
        assert!(first.starts_with("maps_input_"));
        assert!(second.ends_with(".zip"));
    }

    #[test]
    fn test_task_id_list_forms() {
        let text: TaskIdList = serde_json::from_value(serde_json::json!("1 2\n3")).unwrap();
        assert_eq!(text.into_ids().unwrap(), vec![1, 2, 3]);

        let list: TaskIdList = serde_json::from_value(serde_json::json!([4, 5])).unwrap();
        assert_eq!(list.into_ids().unwrap(), vec![4, 5]);

        let bad: TaskIdList = serde_json::from_value(serde_json::json!("1 two")).unwrap();
        assert!(bad.into_ids().is_err());

        let repeated: TaskIdList = serde_json::from_value(serde_json::json!("3 1 3\n1 2")).unwrap();
        assert_eq!(repeated.into_ids().unwrap(), vec![3, 1, 2]);
        let repeated: TaskIdList = serde_json::from_value(serde_json::json!([5, 5])).unwrap();
        assert_eq!(repeated.into_ids().unwrap(), vec![5]);
    }

    // ============================================================
    // BUILD PIPELINE
    // ============================================================

    #[tokio::test]
    async fn test_build_check_and_respond_once() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = MemoryFetcher::with(&[
            ("http://img.test/1_b.jpg", "one"),
            ("http://img.test/2_m.png", "two"),
        ]);
        let builder = ZipBuilder::new(dir.path(), client(), Arc::new(fetcher));
        let filename = "maps_input_1700000000.zip";

        assert!(!builder.check(filename).await);
        assert!(builder.respond(filename).await.unwrap().is_none());

        // Task 3 has no flickr url, task 99 does not exist.
        let report = builder.build(&zip_job(filename, vec![1, 2, 3, 99])).await.unwrap();
        assert_eq!(report, BuildReport { entries: 2, skipped: 2 });
        assert!(builder.check(filename).await);

        let mut download = builder.respond(filename).await.unwrap().unwrap();
        let mut bytes = Vec::new();
        download.file.read_to_end(&mut bytes).await.unwrap();
        assert_eq!(bytes.len() as u64, download.len);

        let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 2);
        let mut content = String::new();
        archive.by_name("2.png").unwrap().read_to_string(&mut content).unwrap();
        assert_eq!(content, "two");

        // Handed out once: gone afterwards.
        assert!(!builder.check(filename).await);
        assert!(builder.respond(filename).await.unwrap().is_none());
        assert!(dir_entries(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_responders_get_one_download() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = MemoryFetcher::with(&[("http://img.test/1_b.jpg", "one")]);
        let builder = ZipBuilder::new(dir.path(), client(), Arc::new(fetcher));
        let filename = "maps_input_1.zip";
        builder.build(&zip_job(filename, vec![1])).await.unwrap();

        let (a, b) = tokio::join!(builder.respond(filename), builder.respond(filename));
        let served = [a.unwrap(), b.unwrap()].iter().filter(|d| d.is_some()).count();
        assert_eq!(served, 1);
    }

    #[tokio::test]
    async fn test_failed_build_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = MemoryFetcher::with(&[("http://img.test/1_b.jpg", "one")]);
        fetcher.broken.insert("http://img.test/2_m.png".to_string(), ());
        let builder = ZipBuilder::new(dir.path(), client(), Arc::new(fetcher));
        let filename = "maps_input_2.zip";

        let err = builder.build(&zip_job(filename, vec![1, 2])).await.unwrap_err();
        assert!(err.is_retryable());
        assert!(!builder.check(filename).await);
        assert!(dir_entries(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_aborted_build_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = MemoryFetcher {
            hang: true,
            ..MemoryFetcher::default()
        };
        let builder = ZipBuilder::new(dir.path(), client(), Arc::new(fetcher));
        let filename = "maps_input_3.zip";

        let job = zip_job(filename, vec![1]);
        let outcome = tokio::time::timeout(Duration::from_millis(200), builder.build(&job)).await;
        assert!(outcome.is_err());
        assert!(!builder.check(filename).await);
        assert!(dir_entries(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_aborted_build_releases_its_filename() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = MemoryFetcher {
            hang: true,
            ..MemoryFetcher::default()
        };
        let builder = ZipBuilder::new(dir.path(), client(), Arc::new(fetcher));

        let first = builder.reserve_filename("maps");
        let job = zip_job(&first, vec![1]);
        let outcome = tokio::time::timeout(Duration::from_millis(100), builder.build(&job)).await;
        assert!(outcome.is_err());

        // Same second: the released name is handed out again, unsuffixed.
        let next = builder.reserve_filename("maps");
        assert!(!next.ends_with("_1.zip"), "{}", next);
    }

    #[tokio::test]
    async fn test_repeated_task_ids_are_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = MemoryFetcher::with(&[("http://img.test/1_b.jpg", "one")]);
        let builder = ZipBuilder::new(dir.path(), client(), Arc::new(fetcher));
        let filename = "maps_input_5.zip";

        let report = builder.build(&zip_job(filename, vec![1, 1, 1])).await.unwrap();
        assert_eq!(report.entries, 1);
        assert!(builder.check(filename).await);

        let download = builder.respond(filename).await.unwrap().unwrap();
        let archive = zip::ZipArchive::new(download.file.into_std().await).unwrap();
        assert_eq!(archive.len(), 1);
    }

    #[tokio::test]
    async fn test_no_resolvable_inputs_still_produces_archive() {
        let dir = tempfile::tempdir().unwrap();
        let builder = ZipBuilder::new(dir.path(), client(), Arc::new(MemoryFetcher::default()));
        let filename = "maps_input_4.zip";

        let report = builder.build(&zip_job(filename, vec![1, 3])).await.unwrap();
        assert_eq!(report.entries, 0);
        assert!(builder.check(filename).await);
    }

    #[tokio::test]
    async fn test_unsafe_filenames_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let builder = ZipBuilder::new(dir.path(), client(), Arc::new(MemoryFetcher::default()));

        for filename in ["../escape.zip", "maps input.zip", "notazip", ""] {
            let err = builder.build(&zip_job(filename, vec![1])).await.unwrap_err();
            assert!(matches!(err, AnalystError::Validation(_)), "{:?}", filename);
            assert!(!builder.check(filename).await);
        }
    }
}
