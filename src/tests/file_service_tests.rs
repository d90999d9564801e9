use crate::file_service::FileService;
use tempfile::TempDir;

#[test]
fn test_sanitize_filename_keeps_safe_characters() {
    assert_eq!(
        FileService::sanitize_filename("report_2024-01.v2.pdf"),
        "report_2024-01.v2.pdf"
    );
}

#[test]
fn test_sanitize_filename_strips_path_separators() {
    assert_eq!(
        FileService::sanitize_filename("../../etc/passwd"),
        "....etcpasswd"
    );
    assert_eq!(
        FileService::sanitize_filename("dir\\sub\\scan.png"),
        "dirsubscan.png"
    );
}

#[test]
fn test_sanitize_filename_empty_gets_replacement() {
    let name = FileService::sanitize_filename("///");
    assert!(name.starts_with("uploaded_file_"));
    assert_eq!(name.len(), "uploaded_file_".len() + 8);

    // Dots alone are not a usable name either.
    let dots = FileService::sanitize_filename("...");
    assert!(dots.starts_with("uploaded_file_"));
}

#[tokio::test]
async fn test_save_upload_writes_into_upload_dir() {
    let dir = TempDir::new().unwrap();
    let service = FileService::new(dir.path().to_string_lossy().to_string());

    let saved = service.save_upload("report.txt", b"hello").await.unwrap();
    let content = std::fs::read_to_string(&saved).unwrap();
    assert_eq!(content, "hello");
    assert!(saved.contains("report.txt"));
}

#[tokio::test]
async fn test_resolve_path_prefers_exact_path() {
    let dir = TempDir::new().unwrap();
    let service = FileService::new(dir.path().to_string_lossy().to_string());
    let saved = service.save_upload("report.txt", b"hello").await.unwrap();

    let resolved = service.resolve_path(&saved, "report.txt").unwrap();
    assert_eq!(resolved, std::path::PathBuf::from(&saved));
}

#[tokio::test]
async fn test_resolve_path_falls_back_to_upload_dir() {
    let dir = TempDir::new().unwrap();
    let service = FileService::new(dir.path().to_string_lossy().to_string());
    service.save_upload("report.txt", b"hello").await.unwrap();

    // A stale path from another deployment still resolves by filename.
    let resolved = service
        .resolve_path("/old/location/report.txt", "report.txt")
        .unwrap();
    assert_eq!(resolved, dir.path().join("report.txt"));
}

#[tokio::test]
async fn test_resolve_path_ignores_client_directories() {
    let dir = TempDir::new().unwrap();
    let service = FileService::new(dir.path().to_string_lossy().to_string());
    service.save_upload("report.txt", b"hello").await.unwrap();

    let resolved = service
        .resolve_path("/nope/report.txt", "../../report.txt")
        .unwrap();
    assert_eq!(resolved, dir.path().join("report.txt"));
}

#[test]
fn test_resolve_path_missing_file_is_none() {
    let dir = TempDir::new().unwrap();
    let service = FileService::new(dir.path().to_string_lossy().to_string());

    assert!(service.resolve_path("/nope/missing.txt", "missing.txt").is_none());
}
