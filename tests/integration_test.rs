/// End-to-end tests for the install pipeline.
///
/// The network is replaced by in-memory fakes; everything else (archive
/// extraction, the tool cache, running the binary for its version) is real.
/// Run with `cargo test -- --include-ignored` to include the network test.
#[cfg(test)]
mod tests {
    use std::fs;
    use std::io::Write;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex, MutexGuard};

    use async_trait::async_trait;
    use setup_wash::{
        Api, AssetDownloader, CacheStore, InstallError, InstallPipeline, PlatformDescriptor,
        ReleaseIndex, Result, ToolSpec,
    };
    use tempfile::TempDir;

    /// Tests that write and then execute scripts run one at a time, so a
    /// concurrent fork cannot hold a script open for writing ("text file busy").
    static EXEC_LOCK: Mutex<()> = Mutex::new(());

    fn exec_lock() -> MutexGuard<'static, ()> {
        EXEC_LOCK.lock().unwrap_or_else(|e| e.into_inner())
    }

    struct FakeIndex(Vec<&'static str>);

    #[async_trait]
    impl ReleaseIndex for FakeIndex {
        async fn release_tags(&self) -> Result<Vec<String>> {
            Ok(self.0.iter().map(|t| t.to_string()).collect())
        }
    }

    struct FakeDownloader {
        payload: Option<Vec<u8>>,
        urls: Mutex<Vec<String>>,
        calls: AtomicUsize,
    }

    impl FakeDownloader {
        fn serving(payload: Vec<u8>) -> Arc<Self> {
            Arc::new(Self {
                payload: Some(payload),
                urls: Mutex::new(Vec::new()),
                calls: AtomicUsize::new(0),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                payload: None,
                urls: Mutex::new(Vec::new()),
                calls: AtomicUsize::new(0),
            })
        }

        fn urls(&self) -> Vec<String> {
            self.urls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl AssetDownloader for FakeDownloader {
        async fn download(&self, url: &str, dest: &Path) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.urls.lock().unwrap().push(url.to_owned());
            match &self.payload {
                Some(bytes) => fs::write(dest, bytes).map_err(|e| InstallError::io("write", dest, e)),
                None => Err(InstallError::download(url, "download failed with status 404 Not Found")),
            }
        }
    }

    struct Harness {
        cache: TempDir,
        temp: TempDir,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                cache: tempfile::tempdir().unwrap(),
                temp: tempfile::tempdir().unwrap(),
            }
        }

        fn api(&self, downloader: Arc<FakeDownloader>) -> Api {
            let tool = ToolSpec::wash();
            let platform = PlatformDescriptor::resolve(&tool, "linux", "x86_64").unwrap();
            Api::new()
                .tool(tool)
                .platform(platform)
                .cache_dir(self.cache.path())
                .temp_dir(self.temp.path())
                .no_progress()
                .release_index(Arc::new(FakeIndex(vec!["v0.50.0", "v1.0.0", "v1.2.0", "v2.0.0"])))
                .downloader(downloader)
        }

        fn pipeline(&self, downloader: Arc<FakeDownloader>) -> InstallPipeline {
            self.api(downloader).pipeline().unwrap()
        }

        fn store(&self) -> CacheStore {
            CacheStore::new(self.cache.path(), "x64")
        }
    }

    fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        let options = zip::write::SimpleFileOptions::default().unix_permissions(0o755);
        for (name, data) in entries {
            zip.start_file(*name, options).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    fn version_script(output: &str) -> Vec<u8> {
        format!("#!/bin/sh\necho \"{output}\"\n").into_bytes()
    }

    /// `latest` + empty cache + zip download: the probed version becomes the cache key.
    #[cfg(unix)]
    #[tokio::test]
    async fn test_latest_zip_is_cached_under_probed_version() {
        let _guard = exec_lock();
        let harness = Harness::new();
        let downloader = FakeDownloader::serving(zip_bytes(&[("wash", &version_script("wash 0.50.1"))]));

        let installed = harness.api(downloader.clone()).install("latest").await.unwrap();

        assert_eq!(installed.result.version, "0.50.1");
        assert!(!installed.result.cache_hit);
        assert_eq!(installed.reported_version.as_deref(), Some("0.50.1"));
        assert!(installed.result.bin_path.ends_with("wash"));
        assert_eq!(
            downloader.urls(),
            ["https://github.com/cosmonic-labs/wash/releases/latest/download/wash-x86_64-unknown-linux-musl"]
        );

        let cached = harness.store().lookup("wash", "0.50.1").expect("cache entry");
        assert_eq!(installed.result.bin_path, cached.join("wash"));
        assert!(installed.result.bin_path.is_file());
    }

    /// Exact version already cached: no download happens.
    #[tokio::test]
    async fn test_cache_hit_skips_download() {
        let harness = Harness::new();
        let seeded = tempfile::tempdir().unwrap();
        fs::write(seeded.path().join("wash"), b"cached").unwrap();
        let cached = harness.store().store(seeded.path(), "wash", "1.0.0").unwrap();

        let downloader = FakeDownloader::failing();
        let result = harness.pipeline(downloader.clone()).install("1.0.0").await.unwrap();

        assert!(result.cache_hit);
        assert_eq!(result.bin_path, cached.join("wash"));
        assert_eq!(result.version, "1.0.0");
        assert_eq!(downloader.calls.load(Ordering::SeqCst), 0);
    }

    /// A download that is not an archive is installed as the binary itself.
    #[tokio::test]
    async fn test_raw_binary_download() {
        let harness = Harness::new();
        let downloader = FakeDownloader::serving(b"\x7fELF\x02\x01\x01 raw wash".to_vec());

        let result = harness.pipeline(downloader).install("1.0.0").await.unwrap();

        assert_eq!(result.version, "1.0.0");
        assert_eq!(fs::read(&result.bin_path).unwrap(), b"\x7fELF\x02\x01\x01 raw wash");
        assert_eq!(harness.store().lookup("wash", "1.0.0"), result.bin_path.parent().map(Path::to_path_buf));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&result.bin_path).unwrap().permissions().mode();
            assert_eq!(mode & 0o111, 0o111);
        }
    }

    /// Archives that nest the binary in `wash-v1.0.0/` are found one level down.
    #[tokio::test]
    async fn test_nested_archive_layout() {
        let harness = Harness::new();
        let downloader = FakeDownloader::serving(zip_bytes(&[
            ("wash-v1.0.0/wash", b"nested wash"),
            ("wash-v1.0.0/README.md", b"readme"),
        ]));

        let result = harness.pipeline(downloader.clone()).install("1.0.0").await.unwrap();

        let cached = harness.store().lookup("wash", "1.0.0").expect("cache entry");
        assert_eq!(result.bin_path, cached.join("wash"));
        assert_eq!(fs::read(&result.bin_path).unwrap(), b"nested wash");
        assert!(cached.join("README.md").is_file());
        assert_eq!(
            downloader.urls(),
            ["https://github.com/cosmonic-labs/wash/releases/download/v1.0.0/wash-x86_64-unknown-linux-musl"]
        );
    }

    #[tokio::test]
    async fn test_range_resolves_before_download() {
        let harness = Harness::new();
        let downloader = FakeDownloader::serving(b"raw".to_vec());

        let result = harness.pipeline(downloader.clone()).install("^1.0.0").await.unwrap();

        assert_eq!(result.version, "1.2.0");
        assert_eq!(
            downloader.urls(),
            ["https://github.com/cosmonic-labs/wash/releases/download/v1.2.0/wash-x86_64-unknown-linux-musl"]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unsatisfiable_range_installs_latest() {
        let _guard = exec_lock();
        let harness = Harness::new();
        let downloader = FakeDownloader::serving(zip_bytes(&[("wash", &version_script("wash v3.1.4"))]));

        let result = harness.pipeline(downloader.clone()).install("^3.0.0").await.unwrap();

        assert_eq!(result.version, "3.1.4");
        assert!(downloader.urls()[0].contains("/releases/latest/download/"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unprobeable_latest_gets_timestamp_version() {
        let _guard = exec_lock();
        let harness = Harness::new();
        let downloader = FakeDownloader::serving(zip_bytes(&[("wash", &version_script("something else"))]));

        let result = harness.pipeline(downloader).install("latest").await.unwrap();

        assert!(result.version.starts_with("latest-"), "got {}", result.version);
        assert_eq!(harness.store().lookup("wash", &result.version), result.bin_path.parent().map(Path::to_path_buf));
    }

    #[tokio::test]
    async fn test_download_failure_is_fatal() {
        let harness = Harness::new();
        let err = harness
            .pipeline(FakeDownloader::failing())
            .install("1.0.0")
            .await
            .unwrap_err();

        assert!(matches!(err, InstallError::Download { .. }));
        assert_eq!(harness.store().lookup("wash", "1.0.0"), None);
    }

    #[tokio::test]
    async fn test_non_semver_version_is_rejected_before_download() {
        let harness = Harness::new();
        let downloader = FakeDownloader::serving(b"raw".to_vec());

        let err = harness
            .pipeline(downloader.clone())
            .install("../../x")
            .await
            .unwrap_err();

        assert!(matches!(err, InstallError::InvalidVersion { .. }));
        assert_eq!(downloader.calls.load(Ordering::SeqCst), 0);
        assert_eq!(fs::read_dir(harness.cache.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_v_prefixed_version_is_normalized() {
        let harness = Harness::new();
        let downloader = FakeDownloader::serving(b"raw".to_vec());

        let result = harness.pipeline(downloader.clone()).install("v1.0.0").await.unwrap();

        assert_eq!(result.version, "1.0.0");
        assert!(harness.store().lookup("wash", "1.0.0").is_some());
        assert_eq!(
            downloader.urls(),
            ["https://github.com/cosmonic-labs/wash/releases/download/v1.0.0/wash-x86_64-unknown-linux-musl"]
        );
    }

    #[tokio::test]
    async fn test_missing_binary_is_fatal() {
        let harness = Harness::new();
        let downloader = FakeDownloader::serving(zip_bytes(&[("docs/wash.md", b"not a binary")]));

        let err = harness.pipeline(downloader).install("1.0.0").await.unwrap_err();

        assert!(matches!(err, InstallError::BinaryNotFound { .. }));
        assert_eq!(harness.store().lookup("wash", "1.0.0"), None);
    }

    #[test]
    fn test_unsupported_platform() {
        let err = PlatformDescriptor::resolve(&ToolSpec::wash(), "freebsd", "x86_64").unwrap_err();
        assert_eq!(err.to_string(), "Unsupported platform: freebsd x86_64");
    }

    #[tokio::test]
    #[ignore = "requires network access"]
    async fn test_install_latest_wash() {
        let cache = tempfile::tempdir().unwrap();
        let installed = Api::new()
            .cache_dir(cache.path())
            .no_progress()
            .install("latest")
            .await;

        assert!(installed.is_ok(), "error installing wash: {:?}", installed);
    }
}
